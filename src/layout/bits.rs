use crate::layout::{LayoutError, Result};

/// Byte order for multi-byte scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
	/// Most significant byte first (`>` prefix, the default).
	#[default]
	Big,
	/// Least significant byte first (`<` prefix).
	Little,
}

impl Endianness {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Little => "little",
			Self::Big => "big",
		}
	}
}

/// Which end of a byte sub-byte reads start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitOrder {
	/// Least significant bit is bit 0.
	#[default]
	Lsb0,
	/// Most significant bit is bit 0.
	Msb0,
}

impl BitOrder {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lsb0 => "lsb0",
			Self::Msb0 => "msb0",
		}
	}
}

/// Bit-addressable input consumed by the layout interpreter.
///
/// Multi-byte reads that start in the middle of a byte continue from the
/// buffered bits, so a byte read after `bit:3` spans two input bytes.
pub trait BitSource {
	/// Bit order used by [`BitSource::read_bits`].
	fn bit_order(&self) -> BitOrder;

	/// Read `count` bits (`1..=8`) as an unsigned value.
	fn read_bits(&mut self, count: u8) -> Result<u8>;

	/// Read one byte.
	fn read_u8(&mut self) -> Result<u8>;

	/// Whether at least one more bit can be read.
	fn has_more(&self) -> bool;

	/// Bits consumed since start, including bits dropped by alignment.
	///
	/// Unlike [`BitSource::byte_counter`] this never goes back.
	fn bits_consumed(&self) -> u64;

	/// Bytes consumed since start or the last counter reset.
	fn byte_counter(&self) -> u64;

	/// Drop buffered bits so the next read starts on a byte boundary.
	fn align_byte(&mut self);

	/// Drop buffered bits and restart the byte counter at zero.
	fn reset_counter(&mut self);

	/// Read up to `count` bits, stopping early at the end of input.
	///
	/// Returns the value together with the number of bits it holds and fails
	/// only when no bit is left. The default reads exactly `count` bits.
	fn read_bits_upto(&mut self, count: u8) -> Result<(u8, u8)> {
		self.read_bits(count).map(|value| (value, count))
	}

	/// Read a `u16` using the selected endianness.
	fn read_u16(&mut self, endianness: Endianness) -> Result<u16> {
		let mut buf = [0_u8; 2];
		self.read_into(&mut buf)?;
		Ok(match endianness {
			Endianness::Little => u16::from_le_bytes(buf),
			Endianness::Big => u16::from_be_bytes(buf),
		})
	}

	/// Read a `u32` using the selected endianness.
	fn read_u32(&mut self, endianness: Endianness) -> Result<u32> {
		let mut buf = [0_u8; 4];
		self.read_into(&mut buf)?;
		Ok(match endianness {
			Endianness::Little => u32::from_le_bytes(buf),
			Endianness::Big => u32::from_be_bytes(buf),
		})
	}

	/// Read a `u64` using the selected endianness.
	fn read_u64(&mut self, endianness: Endianness) -> Result<u64> {
		let mut buf = [0_u8; 8];
		self.read_into(&mut buf)?;
		Ok(match endianness {
			Endianness::Little => u64::from_le_bytes(buf),
			Endianness::Big => u64::from_be_bytes(buf),
		})
	}

	/// Fill `buf` with consecutive bytes.
	fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
		for slot in buf.iter_mut() {
			*slot = self.read_u8()?;
		}
		Ok(())
	}

	/// Skip `count` bytes.
	fn skip_bytes(&mut self, count: u64) -> Result<()> {
		for _ in 0..count {
			self.read_u8()?;
		}
		Ok(())
	}

	/// Align to a byte boundary, then to a multiple of `bytes` on the byte counter.
	fn align_to(&mut self, bytes: u64) -> Result<()> {
		self.align_byte();
		if bytes > 1 {
			while self.byte_counter() % bytes != 0 {
				self.read_u8()?;
			}
		}
		Ok(())
	}
}

/// Bounded bit reader over an immutable byte slice.
pub struct BitReader<'a> {
	bytes: &'a [u8],
	pos: usize,
	counter_base: usize,
	bit_buf: u8,
	bit_count: u8,
	order: BitOrder,
}

impl<'a> BitReader<'a> {
	/// Create a reader at position 0.
	pub fn new(bytes: &'a [u8], order: BitOrder) -> Self {
		Self {
			bytes,
			pos: 0,
			counter_base: 0,
			bit_buf: 0,
			bit_count: 0,
			order,
		}
	}

	/// Absolute offset of the next unread byte.
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Return remaining unread whole bytes.
	pub fn remaining(&self) -> usize {
		self.bytes.len().saturating_sub(self.pos)
	}

	/// Number of bits still buffered from a partially read byte.
	pub fn buffered_bits(&self) -> u8 {
		self.bit_count
	}

	fn next_byte(&mut self, need_bits: u32) -> Result<u8> {
		let Some(byte) = self.bytes.get(self.pos).copied() else {
			return Err(LayoutError::UnexpectedEof {
				at: self.byte_counter(),
				need_bits,
			});
		};
		self.pos += 1;
		Ok(byte)
	}

	fn take_bits(&mut self, count: u8, partial: bool) -> Result<(u8, u8)> {
		if !(1..=8).contains(&count) {
			return Err(LayoutError::InvalidBitWidth {
				at: self.pos,
				width: i32::from(count),
			});
		}

		let mut result = 0_u16;
		let mut filled = 0_u8;
		while filled < count {
			if self.bit_count == 0 {
				if partial && filled > 0 && self.pos >= self.bytes.len() {
					break;
				}
				self.bit_buf = self.next_byte(u32::from(count - filled))?;
				self.bit_count = 8;
			}

			let take = (count - filled).min(self.bit_count);
			let mask = (1_u16 << take) - 1;
			let buf = u16::from(self.bit_buf);
			match self.order {
				BitOrder::Lsb0 => {
					result |= (buf & mask) << filled;
					self.bit_buf = (buf >> take) as u8;
				}
				BitOrder::Msb0 => {
					result = (result << take) | ((buf >> (8 - take)) & mask);
					self.bit_buf = ((buf << take) & 0xFF) as u8;
				}
			}
			self.bit_count -= take;
			filled += take;
		}

		Ok((result as u8, filled))
	}
}

impl BitSource for BitReader<'_> {
	fn bit_order(&self) -> BitOrder {
		self.order
	}

	fn read_bits(&mut self, count: u8) -> Result<u8> {
		self.take_bits(count, false).map(|(value, _)| value)
	}

	fn read_bits_upto(&mut self, count: u8) -> Result<(u8, u8)> {
		self.take_bits(count, true)
	}

	fn read_u8(&mut self) -> Result<u8> {
		if self.bit_count == 0 {
			return self.next_byte(8);
		}
		self.read_bits(8)
	}

	fn has_more(&self) -> bool {
		self.bit_count > 0 || self.pos < self.bytes.len()
	}

	fn bits_consumed(&self) -> u64 {
		self.pos as u64 * 8 - u64::from(self.bit_count)
	}

	fn byte_counter(&self) -> u64 {
		(self.pos - self.counter_base) as u64
	}

	fn align_byte(&mut self) {
		self.bit_buf = 0;
		self.bit_count = 0;
	}

	fn reset_counter(&mut self) {
		self.align_byte();
		self.counter_base = self.pos;
	}

	fn skip_bytes(&mut self, count: u64) -> Result<()> {
		if self.bit_count > 0 {
			for _ in 0..count {
				self.read_u8()?;
			}
			return Ok(());
		}

		let count = usize::try_from(count).unwrap_or(usize::MAX);
		if count > self.remaining() {
			let at = self.byte_counter() + self.remaining() as u64;
			self.pos = self.bytes.len();
			return Err(LayoutError::UnexpectedEof { at, need_bits: 8 });
		}
		self.pos += count;
		Ok(())
	}
}

/// Bit writer mirroring [`BitReader`], used to re-encode decoded values.
pub struct BitWriter {
	bytes: Vec<u8>,
	acc: u16,
	acc_bits: u8,
	order: BitOrder,
}

impl BitWriter {
	/// Create an empty writer.
	pub fn new(order: BitOrder) -> Self {
		Self {
			bytes: Vec::new(),
			acc: 0,
			acc_bits: 0,
			order,
		}
	}

	/// Write the low `count` bits (`1..=8`) of `value`.
	pub fn write_bits(&mut self, value: u8, count: u8) {
		let count = count.clamp(1, 8);
		let value = u16::from(value) & ((1_u16 << count) - 1);
		match self.order {
			BitOrder::Lsb0 => {
				self.acc |= value << self.acc_bits;
				self.acc_bits += count;
				if self.acc_bits >= 8 {
					self.bytes.push((self.acc & 0xFF) as u8);
					self.acc >>= 8;
					self.acc_bits -= 8;
				}
			}
			BitOrder::Msb0 => {
				self.acc = (self.acc << count) | value;
				self.acc_bits += count;
				if self.acc_bits >= 8 {
					self.acc_bits -= 8;
					self.bytes.push(((self.acc >> self.acc_bits) & 0xFF) as u8);
					self.acc &= (1_u16 << self.acc_bits) - 1;
				}
			}
		}
	}

	/// Write one byte.
	pub fn write_u8(&mut self, value: u8) {
		if self.acc_bits == 0 {
			self.bytes.push(value);
		} else {
			self.write_bits(value, 8);
		}
	}

	/// Write a `u16` using the selected endianness.
	pub fn write_u16(&mut self, value: u16, endianness: Endianness) {
		match endianness {
			Endianness::Little => self.write_all(&value.to_le_bytes()),
			Endianness::Big => self.write_all(&value.to_be_bytes()),
		}
	}

	/// Write a `u32` using the selected endianness.
	pub fn write_u32(&mut self, value: u32, endianness: Endianness) {
		match endianness {
			Endianness::Little => self.write_all(&value.to_le_bytes()),
			Endianness::Big => self.write_all(&value.to_be_bytes()),
		}
	}

	/// Write a `u64` using the selected endianness.
	pub fn write_u64(&mut self, value: u64, endianness: Endianness) {
		match endianness {
			Endianness::Little => self.write_all(&value.to_le_bytes()),
			Endianness::Big => self.write_all(&value.to_be_bytes()),
		}
	}

	/// Pad the pending partial byte with zero bits.
	pub fn align_byte(&mut self) {
		if self.acc_bits == 0 {
			return;
		}
		let byte = match self.order {
			BitOrder::Lsb0 => self.acc & 0xFF,
			BitOrder::Msb0 => (self.acc << (8 - self.acc_bits)) & 0xFF,
		};
		self.bytes.push(byte as u8);
		self.acc = 0;
		self.acc_bits = 0;
	}

	/// Flush pending bits and return the written bytes.
	pub fn into_bytes(mut self) -> Vec<u8> {
		self.align_byte();
		self.bytes
	}

	fn write_all(&mut self, bytes: &[u8]) {
		for byte in bytes {
			self.write_u8(*byte);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{BitOrder, BitReader, BitSource, BitWriter, Endianness};

	#[test]
	fn lsb0_bits_come_from_low_end() {
		let data = [0xDD];
		let mut reader = BitReader::new(&data, BitOrder::Lsb0);
		assert_eq!(reader.read_bits(3).expect("a"), 5);
		assert_eq!(reader.read_bits(2).expect("b"), 3);
		assert_eq!(reader.read_bits(3).expect("c"), 6);
		assert!(!reader.has_more());
	}

	#[test]
	fn msb0_bits_come_from_high_end() {
		let data = [0xDD];
		let mut reader = BitReader::new(&data, BitOrder::Msb0);
		assert_eq!(reader.read_bits(3).expect("a"), 6);
		assert_eq!(reader.read_bits(2).expect("b"), 3);
		assert_eq!(reader.read_bits(3).expect("c"), 5);
	}

	#[test]
	fn unaligned_byte_read_spans_two_bytes() {
		let data = [0xF1, 0x0A];
		let mut reader = BitReader::new(&data, BitOrder::Lsb0);
		assert_eq!(reader.read_bits(4).expect("nibble"), 0x1);
		assert_eq!(reader.read_u8().expect("byte"), 0xAF);
		assert_eq!(reader.buffered_bits(), 4);
	}

	#[test]
	fn bounded_bit_reads_return_what_is_left() {
		let data = [0xDD];
		let mut reader = BitReader::new(&data, BitOrder::Lsb0);
		assert_eq!(reader.read_bits_upto(3).expect("a"), (5, 3));
		assert_eq!(reader.read_bits_upto(3).expect("b"), (3, 3));
		assert_eq!(reader.bits_consumed(), 6);
		assert_eq!(reader.read_bits_upto(3).expect("tail"), (3, 2));
		assert_eq!(reader.bits_consumed(), 8);
		assert!(reader.read_bits_upto(3).expect_err("nothing left").is_eof());

		let mut reader = BitReader::new(&data, BitOrder::Lsb0);
		reader.read_bits(6).expect("head");
		assert!(reader.read_bits(3).expect_err("strict read").is_eof());
	}

	#[test]
	fn multi_byte_reads_honor_endianness() {
		let data = [0x01, 0x02, 0x01, 0x02];
		let mut reader = BitReader::new(&data, BitOrder::Lsb0);
		assert_eq!(reader.read_u16(Endianness::Big).expect("big"), 0x0102);
		assert_eq!(reader.read_u16(Endianness::Little).expect("little"), 0x0201);
	}

	#[test]
	fn eof_reports_counter_position() {
		let data = [0x01];
		let mut reader = BitReader::new(&data, BitOrder::Lsb0);
		let err = reader.read_u32(Endianness::Big).expect_err("short input");
		assert!(err.is_eof());
	}

	#[test]
	fn align_and_reset_use_byte_counter() {
		let data = [0_u8; 8];
		let mut reader = BitReader::new(&data, BitOrder::Lsb0);
		reader.read_bits(1).expect("bit");
		reader.align_to(4).expect("align");
		assert_eq!(reader.byte_counter(), 4);
		reader.reset_counter();
		assert_eq!(reader.byte_counter(), 0);
		reader.skip_bytes(3).expect("skip");
		assert_eq!(reader.byte_counter(), 3);
		assert!(reader.skip_bytes(2).expect_err("past end").is_eof());
	}

	#[test]
	fn writer_mirrors_reader_in_both_orders() {
		for order in [BitOrder::Lsb0, BitOrder::Msb0] {
			let mut writer = BitWriter::new(order);
			writer.write_bits(5, 3);
			writer.write_bits(3, 2);
			writer.write_u8(0xA5);
			writer.write_bits(6, 3);
			writer.write_u16(0xBEEF, Endianness::Little);
			let bytes = writer.into_bytes();

			let mut reader = BitReader::new(&bytes, order);
			assert_eq!(reader.read_bits(3).expect("a"), 5);
			assert_eq!(reader.read_bits(2).expect("b"), 3);
			assert_eq!(reader.read_u8().expect("byte"), 0xA5);
			assert_eq!(reader.read_bits(3).expect("c"), 6);
			assert_eq!(reader.read_u16(Endianness::Little).expect("short"), 0xBEEF);
		}
	}
}
