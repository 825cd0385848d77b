//! Binary layout scripts.
//!
//! A script such as `ubyte len; byte[len] data;` is compiled once into a
//! [`layout::CompiledBlock`] and then applied to any number of inputs,
//! producing a tree of named, typed field values.

pub mod layout;
