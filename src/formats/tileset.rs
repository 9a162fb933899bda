//! # Tileset Header Records
//!
//! The header structure a ROM uses to describe one tileset: a secondary
//! flag followed by bus pointers to the tile bitmap, palettes, metatiles,
//! metatile attributes and the animation callback.
//!
//! Two layout generations exist. They differ only in the order of the two
//! trailing pointers, so the generation is decided once (from the ROM game
//! code or a CLI flag) and threaded through as [`RomLayout`].

use std::io::{self, Cursor};

use crate::binary_utils::{read_u32_le, read_u8, seek_to};

pub const TILESET_HEADER_LEN: usize = 22;

/// Which generation of header/ID-space layout a ROM uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RomLayout {
    FireRedStyle,
    RubyStyle,
}

impl RomLayout {
    /// Number of metatile IDs reserved for a primary tileset. Secondary
    /// metatile positions start here even when the primary defines fewer.
    pub fn primary_metatile_space(self) -> usize {
        match self {
            RomLayout::FireRedStyle => 640,
            RomLayout::RubyStyle => 512,
        }
    }

    pub fn secondary_metatile_space(self) -> usize {
        1024 - self.primary_metatile_space()
    }

    /// Number of 8x8 tiles reserved for a primary tileset's bitmap.
    pub fn primary_tile_space(self) -> usize {
        match self {
            RomLayout::FireRedStyle => 640,
            RomLayout::RubyStyle => 512,
        }
    }

    pub fn secondary_tile_space(self) -> usize {
        1024 - self.primary_tile_space()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TilesetHeader {
    pub is_secondary: bool,
    pub tiles_ptr: u32,
    pub palettes_ptr: u32,
    pub metatiles_ptr: u32,
    pub attributes_ptr: u32,
    pub callback_ptr: u32,
}

impl TilesetHeader {
    /// Decode one 22-byte header record at `offset`.
    pub fn from_bytes(data: &[u8], offset: usize, layout: RomLayout) -> io::Result<Self> {
        let mut cursor = Cursor::new(data);
        seek_to(&mut cursor, offset as u64)?;

        let is_secondary = read_u8(&mut cursor)? != 0;
        let _pad = read_u8(&mut cursor)?;
        let tiles_ptr = read_u32_le(&mut cursor)?;
        let palettes_ptr = read_u32_le(&mut cursor)?;
        let metatiles_ptr = read_u32_le(&mut cursor)?;
        let (attributes_ptr, callback_ptr) = match layout {
            RomLayout::FireRedStyle => (read_u32_le(&mut cursor)?, read_u32_le(&mut cursor)?),
            RomLayout::RubyStyle => {
                let callback = read_u32_le(&mut cursor)?;
                let attributes = read_u32_le(&mut cursor)?;
                (attributes, callback)
            }
        };

        Ok(TilesetHeader {
            is_secondary,
            tiles_ptr,
            palettes_ptr,
            metatiles_ptr,
            attributes_ptr,
            callback_ptr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes() -> Vec<u8> {
        let mut data = vec![0x01, 0x00];
        for ptr in [0x0800_0000u32, 0x0810_0000, 0x0820_0000, 0x0830_0000, 0x0840_0000] {
            data.extend_from_slice(&ptr.to_le_bytes());
        }
        data
    }

    #[test]
    fn firered_layout_reads_attributes_before_callback() {
        let header = TilesetHeader::from_bytes(&header_bytes(), 0, RomLayout::FireRedStyle).unwrap();
        assert!(header.is_secondary);
        assert_eq!(header.tiles_ptr, 0x0800_0000);
        assert_eq!(header.metatiles_ptr, 0x0820_0000);
        assert_eq!(header.attributes_ptr, 0x0830_0000);
        assert_eq!(header.callback_ptr, 0x0840_0000);
    }

    #[test]
    fn ruby_layout_swaps_trailing_pointers() {
        let header = TilesetHeader::from_bytes(&header_bytes(), 0, RomLayout::RubyStyle).unwrap();
        assert_eq!(header.callback_ptr, 0x0830_0000);
        assert_eq!(header.attributes_ptr, 0x0840_0000);
    }

    #[test]
    fn short_buffer_is_truncated_data() {
        let data = header_bytes();
        let err = TilesetHeader::from_bytes(&data[..TILESET_HEADER_LEN - 1], 0, RomLayout::RubyStyle)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn header_can_sit_at_an_offset() {
        let mut data = vec![0xFF; 10];
        data.extend_from_slice(&header_bytes());
        let header = TilesetHeader::from_bytes(&data, 10, RomLayout::FireRedStyle).unwrap();
        assert_eq!(header.palettes_ptr, 0x0810_0000);
    }

    #[test]
    fn metatile_spaces_cover_the_full_id_range() {
        for layout in [RomLayout::FireRedStyle, RomLayout::RubyStyle] {
            assert_eq!(
                layout.primary_metatile_space() + layout.secondary_metatile_space(),
                1024
            );
            assert_eq!(layout.primary_tile_space() + layout.secondary_tile_space(), 1024);
        }
        assert_eq!(RomLayout::FireRedStyle.primary_metatile_space(), 640);
        assert_eq!(RomLayout::RubyStyle.primary_metatile_space(), 512);
    }
}
