//! # ROM-Side Tileset Ingestion
//!
//! Reads tileset structures straight out of a GBA ROM image: the header
//! record, the 4bpp tile bitmap, the BGR555 palettes, and the metatile and
//! attribute tables the header points at.

use std::io::{self, Cursor};

use crate::binary_utils::{read_bytes, read_u16_le, seek_to};
use crate::formats::metatile::{
    attributes_from_bytes, metatiles_from_bytes, ATTRIBUTE_BYTES, METATILE_BYTES,
};
use crate::formats::palette::{rgb_from_bgr555, Palette, Rgb, COLOURS_PER_PALETTE, PALETTE_SLOTS};
use crate::formats::tileset::{RomLayout, TilesetHeader};
use crate::tileset::{TilePixels, Tileset, TILE_DIM};

const GAME_CODE_OFFSET: usize = 0xAC;
const ROM_BASE: u32 = 0x0800_0000;
const BYTES_PER_TILE: usize = 32; // 8x8 pixels at 4bpp
const BITMAP_TILES_PER_ROW: usize = 16;

/// The 4-character game code from the ROM header, if present and ASCII.
pub fn game_code(rom: &[u8]) -> Option<&str> {
    let raw = rom.get(GAME_CODE_OFFSET..GAME_CODE_OFFSET + 4)?;
    std::str::from_utf8(raw).ok()
}

/// Pick the header layout from the game code. `BPR`/`BPG` prefixes are the
/// FireRed/LeafGreen family; everything else uses the Ruby-era layout.
pub fn detect_layout(rom: &[u8]) -> RomLayout {
    match game_code(rom) {
        Some(code) if code.starts_with("BPR") || code.starts_with("BPG") => RomLayout::FireRedStyle,
        _ => RomLayout::RubyStyle,
    }
}

/// Translate a GBA bus pointer into an offset within the ROM buffer.
fn resolve_ptr(ptr: u32, rom_len: usize) -> io::Result<usize> {
    if ptr < ROM_BASE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("0x{:08X} is not a ROM-mapped pointer", ptr),
        ));
    }
    let offset = (ptr - ROM_BASE) as usize;
    if offset >= rom_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Pointer 0x{:08X} lies past the end of the ROM", ptr),
        ));
    }
    Ok(offset)
}

/// Load one tileset from a ROM image, given its header offset.
pub fn load_tileset(rom: &[u8], header_offset: usize, layout: RomLayout) -> io::Result<Tileset> {
    let header = TilesetHeader::from_bytes(rom, header_offset, layout)?;

    let tiles_offset = resolve_ptr(header.tiles_ptr, rom.len())?;
    let palettes_offset = resolve_ptr(header.palettes_ptr, rom.len())?;
    let metatiles_offset = resolve_ptr(header.metatiles_ptr, rom.len())?;
    let attributes_offset = resolve_ptr(header.attributes_ptr, rom.len()).ok();

    // The header does not store a tile count; bound the bitmap by the
    // nearest structure that follows it, capped at the layout's tile space.
    let tile_space = if header.is_secondary {
        layout.secondary_tile_space()
    } else {
        layout.primary_tile_space()
    };
    let mut bitmap_end = rom.len();
    for offset in [Some(palettes_offset), Some(metatiles_offset), attributes_offset]
        .into_iter()
        .flatten()
    {
        if offset > tiles_offset && offset < bitmap_end {
            bitmap_end = offset;
        }
    }
    let tile_count = ((bitmap_end - tiles_offset) / BYTES_PER_TILE).min(tile_space);
    let mut cursor = Cursor::new(rom);
    seek_to(&mut cursor, tiles_offset as u64)?;
    let bitmap = read_bytes(&mut cursor, tile_count * BYTES_PER_TILE)?;
    let pixels = pixels_from_4bpp(&bitmap, tile_count);

    let palettes = palettes_from_bgr555(rom, palettes_offset)?;

    let metatile_space = if header.is_secondary {
        layout.secondary_metatile_space()
    } else {
        layout.primary_metatile_space()
    };
    let metatile_count = metatile_space.min((rom.len() - metatiles_offset) / METATILE_BYTES);
    let metatiles =
        metatiles_from_bytes(&rom[metatiles_offset..metatiles_offset + metatile_count * METATILE_BYTES])?;

    let attributes = match attributes_offset {
        Some(offset) => {
            let count = metatile_space.min((rom.len() - offset) / ATTRIBUTE_BYTES);
            attributes_from_bytes(&rom[offset..offset + count * ATTRIBUTE_BYTES])?
        }
        None => Vec::new(),
    };

    Ok(Tileset {
        name: format!("rom_{:07X}", header_offset),
        is_secondary: header.is_secondary,
        has_animations: header.callback_ptr != 0,
        palettes,
        pixels,
        metatiles,
        attributes,
    })
}

/// Unpack a GBA 4bpp bitmap into a row-major index matrix, 16 tiles per
/// row. Within each byte the low nibble is the left pixel.
fn pixels_from_4bpp(data: &[u8], tile_count: usize) -> TilePixels {
    if tile_count == 0 {
        return TilePixels::empty();
    }
    let width = BITMAP_TILES_PER_ROW * TILE_DIM;
    let rows = (tile_count + BITMAP_TILES_PER_ROW - 1) / BITMAP_TILES_PER_ROW;
    let height = rows * TILE_DIM;
    let mut indices = vec![0u8; width * height];

    for tile in 0..tile_count {
        let base = tile * BYTES_PER_TILE;
        let origin_x = (tile % BITMAP_TILES_PER_ROW) * TILE_DIM;
        let origin_y = (tile / BITMAP_TILES_PER_ROW) * TILE_DIM;
        for y in 0..TILE_DIM {
            for x in 0..TILE_DIM {
                let byte = data[base + y * 4 + x / 2];
                let index = if x % 2 == 0 { byte & 0x0F } else { byte >> 4 };
                indices[(origin_y + y) * width + origin_x + x] = index;
            }
        }
    }

    TilePixels {
        width,
        height,
        indices,
    }
}

fn palettes_from_bgr555(rom: &[u8], offset: usize) -> io::Result<Vec<Palette>> {
    let mut cursor = Cursor::new(rom);
    seek_to(&mut cursor, offset as u64)?;

    let mut palettes = Vec::with_capacity(PALETTE_SLOTS);
    for _ in 0..PALETTE_SLOTS {
        let mut palette = [Rgb::default(); COLOURS_PER_PALETTE];
        for colour in palette.iter_mut() {
            *colour = rgb_from_bgr555(read_u16_le(&mut cursor)?);
        }
        palettes.push(palette);
    }
    Ok(palettes)
}
