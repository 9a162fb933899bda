//! # Decoded Tilesets
//!
//! [`TilePixels`] is the raw-index view of a tileset bitmap: one palette
//! index in [0,15] per pixel, tiles packed left-to-right in rows of
//! `width / 8`. [`Tileset`] bundles the pixels with the tileset's own
//! palette slots, metatile table and attribute table.
//!
//! A tileset is built once per identity and never mutated afterwards.

use std::{fs, io, path::Path};

use crate::export::ExportError;
use crate::formats::metatile::{attributes_from_bytes, metatiles_from_bytes, Metatile, MetatileAttribute};
use crate::formats::palette::{load_jasc_palette, Palette, PALETTE_SLOTS};
use crate::project::TilesetResolver;

pub const TILE_DIM: usize = 8;

pub struct TilePixels {
    pub width: usize,
    pub height: usize,
    pub indices: Vec<u8>,
}

impl TilePixels {
    pub fn empty() -> Self {
        TilePixels {
            width: 0,
            height: 0,
            indices: Vec::new(),
        }
    }

    pub fn tile_count(&self) -> usize {
        (self.width / TILE_DIM) * (self.height / TILE_DIM)
    }

    /// Palette index of pixel (x, y) within an 8x8 tile.
    pub fn tile_pixel(&self, tile: usize, x: usize, y: usize) -> u8 {
        let tiles_per_row = self.width / TILE_DIM;
        let px = (tile % tiles_per_row) * TILE_DIM + x;
        let py = (tile / tiles_per_row) * TILE_DIM + y;
        self.indices[py * self.width + px]
    }
}

/// Decode a tileset bitmap from an indexed PNG without expanding its
/// palette. Non-indexed input falls back to an opaque/transparent
/// approximation from alpha, with a warning: palette fidelity is lost on
/// that path, but a degraded bitmap beats a failed tileset.
pub fn decode_tile_image(path: &Path) -> Result<TilePixels, ExportError> {
    let file = fs::File::open(path)?;
    let mut decoder = png::Decoder::new(file);
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder
        .read_info()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    let (colour_type, bit_depth) = reader.output_color_type();
    if colour_type != png::ColorType::Indexed {
        return decode_alpha_fallback(path, "not an indexed raster");
    }
    let bits = match bit_depth {
        png::BitDepth::One => 1usize,
        png::BitDepth::Two => 2,
        png::BitDepth::Four => 4,
        png::BitDepth::Eight => 8,
        png::BitDepth::Sixteen => return decode_alpha_fallback(path, "16-bit indexed raster"),
    };

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    let width = frame.width as usize;
    let height = frame.height as usize;
    let per_byte = 8 / bits;
    let mut indices = Vec::with_capacity(width * height);
    for row in buf[..frame.buffer_size()].chunks_exact(frame.line_size) {
        for x in 0..width {
            let byte = row[x / per_byte];
            let shift = 8 - bits * (x % per_byte + 1);
            indices.push((byte >> shift) as u8 & ((1u16 << bits) - 1) as u8 & 0x0F);
        }
    }

    Ok(TilePixels {
        width,
        height,
        indices,
    })
}

fn decode_alpha_fallback(path: &Path, reason: &str) -> Result<TilePixels, ExportError> {
    eprintln!(
        "Warning: {} is {}; approximating opacity from alpha (palette fidelity lost)",
        path.display(),
        reason
    );
    let img = image::open(path)?.to_rgba8();
    let indices = img
        .pixels()
        .map(|p| if p.0[3] >= 128 { 1 } else { 0 })
        .collect();
    Ok(TilePixels {
        width: img.width() as usize,
        height: img.height() as usize,
        indices,
    })
}

/// Immutable decoded view of one tileset.
pub struct Tileset {
    pub name: String,
    pub is_secondary: bool,
    pub has_animations: bool,
    pub palettes: Vec<Palette>,
    pub pixels: TilePixels,
    pub metatiles: Vec<Metatile>,
    pub attributes: Vec<MetatileAttribute>,
}

impl Tileset {
    /// Load a tileset from a project tree, honouring cross-references:
    /// pixel data comes from the tiles-borrow source and palettes from the
    /// palettes-borrow source when the resolver reports one.
    pub fn load(resolver: &dyn TilesetResolver, label: &str) -> Result<Tileset, ExportError> {
        let source = resolver.resolve(label)?;

        let tiles_dir = match &source.tiles_from {
            Some(other) => resolver.resolve(other)?.path,
            None => source.path.clone(),
        };
        let palettes_dir = match &source.palettes_from {
            Some(other) => resolver.resolve(other)?.path,
            None => source.path.clone(),
        }
        .join("palettes");

        let pixels = decode_tile_image(&tiles_dir.join("tiles.png"))?;

        let mut palettes = Vec::with_capacity(PALETTE_SLOTS);
        for slot in 0..PALETTE_SLOTS {
            palettes.push(load_jasc_palette(&palettes_dir.join(format!("{:02}.pal", slot)))?);
        }

        let metatiles = metatiles_from_bytes(&fs::read(source.path.join("metatiles.bin"))?)?;
        let attributes_path = source.path.join("metatile_attributes.bin");
        let attributes = if attributes_path.exists() {
            attributes_from_bytes(&fs::read(attributes_path)?)?
        } else {
            Vec::new()
        };

        Ok(Tileset {
            name: source.label,
            is_secondary: source.is_secondary,
            has_animations: source.path.join("anim").is_dir(),
            palettes,
            pixels,
            metatiles,
            attributes,
        })
    }
}
