//! Fixed-layout record codecs for GBA tileset and map data.
//!
//! Each submodule decodes one binary or text structure into a typed record.
//! Truncated input surfaces as `io::ErrorKind::UnexpectedEof`, malformed
//! input as `InvalidData`; nothing here reads out of bounds.

pub mod blockdata;
pub mod metatile;
pub mod palette;
pub mod tileset;
