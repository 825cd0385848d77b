use std::io::Read;
use std::path::Path;

use crate::layout::{LayoutError, Result};

/// Default ceiling on decompressed input size.
pub const MAX_DECOMPRESSED_BYTES: usize = 512 * 1024 * 1024;
/// zstd frame magic.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Encoding detected for an input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEncoding {
	/// Bytes are used as-is.
	Raw,
	/// zstd-compressed stream.
	Zstd,
}

impl InputEncoding {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Raw => "raw",
			Self::Zstd => "zstd",
		}
	}
}

/// Read a data file, transparently decoding zstd.
pub fn load_input(path: impl AsRef<Path>) -> Result<(InputEncoding, Vec<u8>)> {
	decode_input(std::fs::read(path)?)
}

/// Detect and decode compression with the default size ceiling.
pub fn decode_input(raw: Vec<u8>) -> Result<(InputEncoding, Vec<u8>)> {
	decode_input_with_limit(raw, MAX_DECOMPRESSED_BYTES)
}

/// Detect and decode compression, failing once output grows past `limit` bytes.
pub fn decode_input_with_limit(raw: Vec<u8>, limit: usize) -> Result<(InputEncoding, Vec<u8>)> {
	if !raw.starts_with(&ZSTD_MAGIC) {
		return Ok((InputEncoding::Raw, raw));
	}

	let mut decoder = zstd::stream::read::Decoder::new(raw.as_slice())?;
	let mut out = Vec::new();
	let mut buf = [0_u8; 8192];

	loop {
		let read = decoder.read(&mut buf)?;
		if read == 0 {
			break;
		}

		if out.len() + read > limit {
			return Err(LayoutError::DecompressedTooLarge { limit });
		}

		out.extend_from_slice(&buf[..read]);
	}

	log::debug!("decoded zstd input: {}B -> {}B", raw.len(), out.len());
	Ok((InputEncoding::Zstd, out))
}

#[cfg(test)]
mod tests {
	use super::{InputEncoding, decode_input, decode_input_with_limit};
	use crate::layout::LayoutError;

	#[test]
	fn raw_bytes_pass_through() {
		let (encoding, out) = decode_input(vec![1, 2, 3]).expect("raw");
		assert_eq!(encoding, InputEncoding::Raw);
		assert_eq!(out, vec![1, 2, 3]);
	}

	#[test]
	fn zstd_frames_are_decoded() {
		let payload: Vec<u8> = (0..=255).cycle().take(4096).collect();
		let packed = zstd::encode_all(payload.as_slice(), 3).expect("encodes");

		let (encoding, out) = decode_input(packed.clone()).expect("decodes");
		assert_eq!(encoding.as_str(), "zstd");
		assert_eq!(out, payload);

		let err = decode_input_with_limit(packed, 1024).expect_err("over limit");
		assert!(matches!(err, LayoutError::DecompressedTooLarge { limit: 1024 }));
	}
}
