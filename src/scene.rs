//! # Scene Serialization
//!
//! Packs per-cell tile placements into the target engine's binary cell
//! array and wraps everything in its text resource formats: a shared
//! tile-set resource pointing at the atlas PNGs, and one scene per map
//! whose layer nodes embed the packed cells as decimal byte literals.
//!
//! The cell record layout is fixed at 12 bytes (six little-endian u16
//! fields) behind a 2-byte format version; the engine misreads anything
//! else.

use std::fmt::Write;

use crate::formats::blockdata::MapBlock;
use crate::render::collision::{COLLISION_COLS, COLLISION_ROWS};

pub const CELL_FORMAT_VERSION: u16 = 0;
pub const CELL_RECORD_BYTES: usize = 12;

pub const SOURCE_GROUND: u16 = 0;
pub const SOURCE_OVERLAY: u16 = 1;
pub const SOURCE_COLLISION: u16 = 2;

/// One cell placement: map position plus the atlas cell it displays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneCell {
    pub x: u16,
    pub y: u16,
    pub source: u16,
    pub column: u16,
    pub row: u16,
}

/// Cells for a ground or overlay layer: the linear atlas index is the
/// cell's metatile id, decomposed by the atlas column count.
pub fn layer_cells(blocks: &[MapBlock], width: usize, columns: usize, source: u16) -> Vec<SceneCell> {
    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let index = block.metatile_id() as usize;
            SceneCell {
                x: (i % width) as u16,
                y: (i / width) as u16,
                source,
                column: (index % columns) as u16,
                row: (index / columns) as u16,
            }
        })
        .collect()
}

/// Cells for the collision layer: column is the collision value, row the
/// elevation.
pub fn collision_cells(blocks: &[MapBlock], width: usize) -> Vec<SceneCell> {
    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| SceneCell {
            x: (i % width) as u16,
            y: (i / width) as u16,
            source: SOURCE_COLLISION,
            column: u16::from(block.collision()),
            row: u16::from(block.elevation()),
        })
        .collect()
}

/// Pack cells into the engine's binary array: a format version word, then
/// per cell x, y, source id, atlas column, atlas row and a zero
/// "alternate tile" field, all little-endian u16.
pub fn pack_cells(cells: &[SceneCell]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + cells.len() * CELL_RECORD_BYTES);
    out.extend_from_slice(&CELL_FORMAT_VERSION.to_le_bytes());
    for cell in cells {
        for field in [cell.x, cell.y, cell.source, cell.column, cell.row, 0u16] {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
    out
}

fn byte_list(bytes: &[u8]) -> String {
    let mut list = String::with_capacity(bytes.len() * 4);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            list.push_str(", ");
        }
        let _ = write!(list, "{}", byte);
    }
    list
}

fn declare_atlas_tiles(out: &mut String, positions: usize, columns: usize) {
    for position in 0..positions {
        let _ = writeln!(out, "{}:{}/0 = 0", position % columns, position / columns);
    }
}

/// The shared tile-set resource for one tileset pair: three atlas sources
/// (ground, overlay, collision) with 16x16 tile regions.
pub fn tile_set_resource(
    ground_png: &str,
    overlay_png: &str,
    collision_png: &str,
    columns: usize,
    total_positions: usize,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[gd_resource type=\"TileSet\" load_steps=7 format=3]");
    let _ = writeln!(out);
    for (id, path) in [(1, ground_png), (2, overlay_png), (3, collision_png)] {
        let _ = writeln!(
            out,
            "[ext_resource type=\"Texture2D\" path=\"{}\" id=\"{}\"]",
            path, id
        );
    }

    for (name, texture_id, positions, columns) in [
        ("ground", 1, total_positions, columns),
        ("overlay", 2, total_positions, columns),
        ("collision", 3, COLLISION_COLS * COLLISION_ROWS, COLLISION_COLS),
    ] {
        let _ = writeln!(out);
        let _ = writeln!(out, "[sub_resource type=\"TileSetAtlasSource\" id=\"atlas_{}\"]", name);
        let _ = writeln!(out, "texture = ExtResource(\"{}\")", texture_id);
        let _ = writeln!(out, "texture_region_size = Vector2i(16, 16)");
        declare_atlas_tiles(&mut out, positions, columns);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[resource]");
    let _ = writeln!(out, "tile_size = Vector2i(16, 16)");
    let _ = writeln!(out, "sources/{} = SubResource(\"atlas_ground\")", SOURCE_GROUND);
    let _ = writeln!(out, "sources/{} = SubResource(\"atlas_overlay\")", SOURCE_OVERLAY);
    let _ = writeln!(out, "sources/{} = SubResource(\"atlas_collision\")", SOURCE_COLLISION);
    out
}

/// One map scene: a root node with one tile-map layer per packed cell
/// blob, all sharing the pair's tile-set resource.
pub fn map_scene(map_name: &str, tile_set_path: &str, layers: &[(&str, Vec<u8>)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[gd_scene load_steps=2 format=3]");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "[ext_resource type=\"TileSet\" path=\"{}\" id=\"1\"]",
        tile_set_path
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "[node name=\"{}\" type=\"Node2D\"]", map_name);
    for (name, cells) in layers {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "[node name=\"{}\" type=\"TileMapLayer\" parent=\".\"]",
            name
        );
        let _ = writeln!(out, "tile_set = ExtResource(\"1\")");
        let _ = writeln!(out, "tile_data = PackedByteArray({})", byte_list(cells));
    }
    out
}
