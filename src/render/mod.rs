//! # Metatile Atlas Rendering
//!
//! Composites the ground and overlay atlases for a (primary, secondary)
//! tileset pair.
//!
//! ## Responsibilities
//! - Position mapping: metatile positions below the layout's fixed primary
//!   ID space index the primary table; the rest index the secondary table.
//! - Rasterisation: resolves each 8x8 tile reference to a pixel source and
//!   palette slot and paints it with its flips applied.
//! - Metadata: per-pair JSON describing atlas geometry, attributes and
//!   palettes for downstream consumers.

use image::{Rgba, RgbaImage};
use serde::Serialize;

use crate::formats::metatile::{Metatile, MetatileAttribute, TileEntry};
use crate::formats::palette::PaletteTable;
use crate::formats::tileset::RomLayout;
use crate::tileset::{TilePixels, Tileset, TILE_DIM};

pub mod collision;

pub const METATILE_PX: usize = 16;
pub const DEFAULT_ATLAS_COLUMNS: usize = 8;

#[derive(Clone, Copy, Debug)]
pub struct RenderConfig {
    pub columns: usize,
    pub layout: RomLayout,
}

impl RenderConfig {
    pub fn new(columns: usize, layout: RomLayout) -> Self {
        RenderConfig {
            columns: columns.max(1),
            layout,
        }
    }
}

/// The two rendered atlases for one tileset pair.
pub struct PairAtlases {
    pub ground: RgbaImage,
    pub overlay: RgbaImage,
    pub columns: usize,
    pub total_positions: usize,
}

/// Render both layer atlases for a tileset pair. Bad references degrade to
/// transparent cells; nothing here aborts the atlas.
pub fn render_pair(
    primary: &Tileset,
    secondary: Option<&Tileset>,
    config: &RenderConfig,
) -> PairAtlases {
    let primary_space = config.layout.primary_metatile_space();
    let total_positions = match secondary {
        Some(secondary) => primary_space + secondary.metatiles.len(),
        None => primary.metatiles.len(),
    };

    let rows = (total_positions + config.columns - 1) / config.columns;
    let width = (config.columns * METATILE_PX) as u32;
    // an empty pair keeps one row; the encoder rejects zero-height images
    let height = (rows.max(1) * METATILE_PX) as u32;
    let mut ground = RgbaImage::new(width, height);
    let mut overlay = RgbaImage::new(width, height);

    let palettes = PaletteTable::from_pair(
        &primary.palettes,
        secondary.map(|s| s.palettes.as_slice()),
    );

    let tile_boundary = config.layout.primary_tile_space();
    for position in 0..total_positions {
        let metatile = match metatile_at(primary, secondary, primary_space, position) {
            Some(metatile) => metatile,
            None => continue, // reserved hole in the primary ID space
        };
        let base_x = (position % config.columns) * METATILE_PX;
        let base_y = (position / config.columns) * METATILE_PX;
        paint_layer(&mut ground, metatile.ground(), primary, secondary, &palettes, tile_boundary, base_x, base_y);
        paint_layer(&mut overlay, metatile.overlay(), primary, secondary, &palettes, tile_boundary, base_x, base_y);
    }

    PairAtlases {
        ground,
        overlay,
        columns: config.columns,
        total_positions,
    }
}

/// Positions below the fixed primary ID space index the primary table, the
/// rest index the secondary table. The boundary is the ID-space size, not
/// the decoded primary count.
fn metatile_at<'a>(
    primary: &'a Tileset,
    secondary: Option<&'a Tileset>,
    primary_space: usize,
    position: usize,
) -> Option<&'a Metatile> {
    if position < primary_space {
        primary.metatiles.get(position)
    } else {
        secondary?.metatiles.get(position - primary_space)
    }
}

fn attribute_at(
    primary: &Tileset,
    secondary: Option<&Tileset>,
    primary_space: usize,
    position: usize,
) -> Option<MetatileAttribute> {
    if position < primary_space {
        primary.attributes.get(position).copied()
    } else {
        secondary?.attributes.get(position - primary_space).copied()
    }
}

fn paint_layer(
    img: &mut RgbaImage,
    entries: &[TileEntry],
    primary: &Tileset,
    secondary: Option<&Tileset>,
    palettes: &PaletteTable,
    tile_boundary: usize,
    base_x: usize,
    base_y: usize,
) {
    for (quadrant, entry) in entries.iter().enumerate() {
        let dest_x = base_x + (quadrant % 2) * TILE_DIM;
        let dest_y = base_y + (quadrant / 2) * TILE_DIM;
        paint_tile(img, entry, primary, secondary, palettes, tile_boundary, dest_x, dest_y);
    }
}

fn paint_tile(
    img: &mut RgbaImage,
    entry: &TileEntry,
    primary: &Tileset,
    secondary: Option<&Tileset>,
    palettes: &PaletteTable,
    tile_boundary: usize,
    dest_x: usize,
    dest_y: usize,
) {
    let tile_id = entry.tile_id as usize;
    // secondary tile ids start at the layout's reserved primary tile
    // space, even when the primary bitmap holds fewer tiles
    let (pixels, local_id): (&TilePixels, usize) = if tile_id < tile_boundary {
        (&primary.pixels, tile_id)
    } else {
        match secondary {
            Some(secondary) => (&secondary.pixels, tile_id - tile_boundary),
            None => return, // dangling secondary reference, leave transparent
        }
    };
    if pixels.width == 0 || local_id >= pixels.tile_count() {
        return;
    }

    let palette = palettes.get(entry.palette as usize);
    for y in 0..TILE_DIM {
        for x in 0..TILE_DIM {
            // flips mirror the read coordinates, never the write side
            let src_x = if entry.h_flip { TILE_DIM - 1 - x } else { x };
            let src_y = if entry.v_flip { TILE_DIM - 1 - y } else { y };
            let index = pixels.tile_pixel(local_id, src_x, src_y) as usize;
            if index == 0 {
                continue; // index 0 is transparent by convention
            }
            let colour = palette[index];
            img.put_pixel(
                (dest_x + x) as u32,
                (dest_y + y) as u32,
                Rgba([colour.r, colour.g, colour.b, 255]),
            );
        }
    }
}

/// Per-pair sidecar metadata, serialised as JSON next to the atlases.
#[derive(Serialize)]
pub struct PairMetadata {
    pub primary: String,
    pub secondary: Option<String>,
    pub animated: bool,
    pub columns: usize,
    pub total_metatiles: usize,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub behaviors: Vec<u16>,
    pub terrains: Vec<u8>,
    pub encounters: Vec<u8>,
    pub layer_types: Vec<u8>,
    pub palettes: Vec<Vec<[u8; 3]>>,
}

pub fn build_metadata(
    primary: &Tileset,
    secondary: Option<&Tileset>,
    config: &RenderConfig,
    atlases: &PairAtlases,
) -> PairMetadata {
    let primary_space = config.layout.primary_metatile_space();
    let attributes: Vec<MetatileAttribute> = (0..atlases.total_positions)
        .map(|position| {
            attribute_at(primary, secondary, primary_space, position).unwrap_or_default()
        })
        .collect();

    let palettes = PaletteTable::from_pair(
        &primary.palettes,
        secondary.map(|s| s.palettes.as_slice()),
    );

    PairMetadata {
        primary: primary.name.clone(),
        secondary: secondary.map(|s| s.name.clone()),
        animated: primary.has_animations || secondary.map_or(false, |s| s.has_animations),
        columns: atlases.columns,
        total_metatiles: atlases.total_positions,
        atlas_width: atlases.ground.width(),
        atlas_height: atlases.ground.height(),
        behaviors: attributes.iter().map(|a| a.behavior()).collect(),
        terrains: attributes.iter().map(|a| a.terrain()).collect(),
        encounters: attributes.iter().map(|a| a.encounter()).collect(),
        layer_types: attributes.iter().map(|a| a.layer_type()).collect(),
        palettes: (0..16)
            .map(|slot| palettes.get(slot).iter().map(|c| [c.r, c.g, c.b]).collect())
            .collect(),
    }
}
