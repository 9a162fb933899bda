//! # Project-Tree Collaborators
//!
//! The exporter consumes two things from a decomp project: the layout
//! table (`data/layouts/layouts.json`) and a way to turn a tileset label
//! like `gTileset_General` into an asset directory.
//!
//! Resolution is behind the [`TilesetResolver`] trait so the lookup
//! strategy (directory scan, header-file scan, or a ROM table) can be
//! swapped without touching the compositor.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::export::ExportError;

#[derive(Debug, Deserialize)]
struct LayoutTable {
    layouts: Vec<MapLayout>,
}

/// One entry of the layout table. Width and height are in metatiles.
#[derive(Debug, Clone, Deserialize)]
pub struct MapLayout {
    pub id: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub primary_tileset: String,
    #[serde(default)]
    pub secondary_tileset: Option<String>,
    pub blockdata_filepath: String,
}

pub fn load_layouts(project_root: &Path) -> Result<Vec<MapLayout>, ExportError> {
    let path = project_root.join("data/layouts/layouts.json");
    let table: LayoutTable = serde_json::from_str(&fs::read_to_string(path)?)?;
    Ok(table.layouts)
}

/// Where a tileset's assets live, and whose assets it borrows.
///
/// `tiles_from` / `palettes_from` name another tileset whose pixel or
/// palette source replaces this tileset's own; a self-reference is never
/// reported as a borrow.
#[derive(Debug, Clone)]
pub struct TilesetSource {
    pub label: String,
    pub path: PathBuf,
    pub is_secondary: bool,
    pub tiles_from: Option<String>,
    pub palettes_from: Option<String>,
}

pub trait TilesetResolver {
    fn resolve(&self, label: &str) -> Result<TilesetSource, ExportError>;
}

/// Resolver backed by a project tree: tileset directories under
/// `data/tilesets/{primary,secondary}`, matched case-insensitively against
/// the label, with cross-references scraped from the tileset header file
/// when the project carries one.
pub struct ProjectResolver {
    primary_dirs: Vec<(String, PathBuf)>,
    secondary_dirs: Vec<(String, PathBuf)>,
    cross_refs: HashMap<String, CrossRefs>,
}

#[derive(Debug, Clone, Default)]
struct CrossRefs {
    tiles_from: Option<String>,
    palettes_from: Option<String>,
}

impl ProjectResolver {
    pub fn new(project_root: &Path) -> io::Result<Self> {
        let primary_dirs = scan_tileset_dirs(&project_root.join("data/tilesets/primary"))?;
        let secondary_dirs = scan_tileset_dirs(&project_root.join("data/tilesets/secondary"))?;

        let mut cross_refs = HashMap::new();
        let headers = project_root.join("src/data/tilesets/headers.h");
        if headers.exists() {
            scan_header_cross_refs(&fs::read_to_string(headers)?, &mut cross_refs);
        }

        Ok(ProjectResolver {
            primary_dirs,
            secondary_dirs,
            cross_refs,
        })
    }
}

impl TilesetResolver for ProjectResolver {
    fn resolve(&self, label: &str) -> Result<TilesetSource, ExportError> {
        let key = normalise_label(label);
        let (path, is_secondary) = self
            .primary_dirs
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, path)| (path.clone(), false))
            .or_else(|| {
                self.secondary_dirs
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, path)| (path.clone(), true))
            })
            .ok_or_else(|| ExportError::UnresolvedReference(label.to_string()))?;

        let refs = self.cross_refs.get(&key).cloned().unwrap_or_default();
        Ok(TilesetSource {
            label: label.to_string(),
            path,
            is_secondary,
            tiles_from: refs.tiles_from,
            palettes_from: refs.palettes_from,
        })
    }
}

fn scan_tileset_dirs(root: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    if !root.is_dir() {
        return Ok(dirs);
    }
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            dirs.push((normalise_label(&name), entry.path()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Fold a label or directory name to a comparison key: the `gTileset_`
/// prefix, case and underscores all vary between the C headers and the
/// asset tree, so all three are erased.
fn normalise_label(label: &str) -> String {
    let label = label.strip_prefix("gTileset_").unwrap_or(label);
    label
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Scan tileset header declarations for borrowed tile/palette sources.
/// The text scan only needs `.tiles = gTilesetTiles_X` and
/// `.palettes = gTilesetPalettes_X` assignments inside each
/// `gTileset_Y = { ... };` block.
fn scan_header_cross_refs(text: &str, refs: &mut HashMap<String, CrossRefs>) {
    let mut rest = text;
    while let Some(start) = rest.find("gTileset_") {
        let block = &rest[start..];
        let label = ident_at(&block["gTileset_".len()..]);
        let end = block.find("};").map(|i| i + 2).unwrap_or(block.len());
        let body = &block[..end];

        let entry = CrossRefs {
            tiles_from: assigned_ident(body, ".tiles", "gTilesetTiles_")
                .filter(|other| normalise_label(other) != normalise_label(label)),
            palettes_from: assigned_ident(body, ".palettes", "gTilesetPalettes_")
                .filter(|other| normalise_label(other) != normalise_label(label)),
        };
        if entry.tiles_from.is_some() || entry.palettes_from.is_some() {
            refs.insert(normalise_label(label), entry);
        }

        rest = &rest[start + end..];
    }
}

fn ident_at(text: &str) -> &str {
    let end = text
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(text.len());
    &text[..end]
}

/// Find `field = <prefix>Name` in a header block and return `Name`.
fn assigned_ident(body: &str, field: &str, prefix: &str) -> Option<String> {
    let at = body.find(field)?;
    let after = &body[at + field.len()..];
    let eq = after.find('=')?;
    let value = &after[eq + 1..];
    let ident_start = value.find(prefix)?;
    Some(ident_at(&value[ident_start + prefix.len()..]).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_and_directory_names_normalise_alike() {
        assert_eq!(normalise_label("gTileset_MauvilleCity"), "mauvillecity");
        assert_eq!(normalise_label("mauville_city"), "mauvillecity");
        assert_eq!(normalise_label("General"), "general");
    }

    const HEADERS: &str = r#"
const struct Tileset gTileset_General = {
    .isSecondary = FALSE,
    .tiles = gTilesetTiles_General,
    .palettes = gTilesetPalettes_General,
    .metatiles = gMetatiles_General,
};

const struct Tileset gTileset_MauvilleGym = {
    .isSecondary = TRUE,
    .tiles = gTilesetTiles_Mauville,
    .palettes = gTilesetPalettes_MauvilleGym,
    .metatiles = gMetatiles_MauvilleGym,
};
"#;

    #[test]
    fn header_scan_reports_borrows_but_not_self_references() {
        let mut refs = HashMap::new();
        scan_header_cross_refs(HEADERS, &mut refs);

        // General references only its own sources
        assert!(!refs.contains_key("general"));

        let gym = refs.get("mauvillegym").unwrap();
        assert_eq!(gym.tiles_from.as_deref(), Some("Mauville"));
        assert_eq!(gym.palettes_from, None);
    }

    #[test]
    fn unresolvable_label_is_an_unresolved_reference() {
        let resolver = ProjectResolver {
            primary_dirs: vec![("general".into(), PathBuf::from("/tmp/general"))],
            secondary_dirs: Vec::new(),
            cross_refs: HashMap::new(),
        };
        let found = resolver.resolve("gTileset_General").unwrap();
        assert!(!found.is_secondary);

        let err = resolver.resolve("gTileset_Missing").unwrap_err();
        assert!(matches!(err, ExportError::UnresolvedReference(_)));
    }
}
