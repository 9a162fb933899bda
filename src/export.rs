//! # Map Export Pipeline
//!
//! Drives the whole conversion: layouts in, atlases and scene files out.
//! Failures are contained per map; one bad tileset reference never aborts
//! the run.

use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::formats::blockdata::blocks_from_bytes;
use crate::png_out;
use crate::project::{self, MapLayout, ProjectResolver};
use crate::render::{self, collision, RenderConfig};
use crate::rom;
use crate::scene::{self, SOURCE_GROUND, SOURCE_OVERLAY};
use crate::tileset::Tileset;

#[derive(Debug)]
pub enum ExportError {
    Io(io::Error),
    Image(image::ImageError),
    Json(serde_json::Error),
    UnresolvedReference(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Image(e) => write!(f, "Image error: {}", e),
            ExportError::Json(e) => write!(f, "JSON error: {}", e),
            ExportError::UnresolvedReference(label) => {
                write!(f, "Cannot resolve tileset {:?}", label)
            }
        }
    }
}

impl std::error::Error for ExportError {}

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}
impl From<image::ImageError> for ExportError {
    fn from(err: image::ImageError) -> Self {
        ExportError::Image(err)
    }
}
impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err)
    }
}

pub struct ExportSummary {
    pub exported: usize,
    pub skipped: usize,
}

/// Artifacts shared by every map using one tileset pair.
struct ExportedPair {
    tile_set_rel: String,
}

pub struct MapExporter<'a> {
    project_root: &'a Path,
    output_dir: &'a Path,
    resolver: ProjectResolver,
    config: RenderConfig,
    tilesets: HashMap<String, Rc<Tileset>>,
    pairs: HashMap<(String, String), Rc<ExportedPair>>,
}

impl<'a> MapExporter<'a> {
    pub fn new(
        project_root: &'a Path,
        output_dir: &'a Path,
        config: RenderConfig,
    ) -> Result<Self, ExportError> {
        Ok(MapExporter {
            project_root,
            output_dir,
            resolver: ProjectResolver::new(project_root)?,
            config,
            tilesets: HashMap::new(),
            pairs: HashMap::new(),
        })
    }

    /// Export every layout (or only those named in `filter`). Per-map
    /// failures are logged and counted; the loop always runs to the end.
    pub fn export_all(&mut self, filter: &[String]) -> Result<ExportSummary, ExportError> {
        let layouts = project::load_layouts(self.project_root)?;

        fs::create_dir_all(self.output_dir.join("tilesets"))?;
        fs::create_dir_all(self.output_dir.join("maps"))?;

        // the collision atlas is shared by every map; drawn exactly once.
        // A failed write loses only this file; per-map writes report
        // their own failures.
        let collision_path = self.output_dir.join("tilesets").join("collision.png");
        if let Err(e) = png_out::write_image(&collision_path, &collision::render_collision_atlas()) {
            eprintln!("Failed to write {}: {}", collision_path.display(), e);
        }

        let mut summary = ExportSummary {
            exported: 0,
            skipped: 0,
        };
        for layout in &layouts {
            if !filter.is_empty()
                && !filter
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&layout.name) || name.eq_ignore_ascii_case(&layout.id))
            {
                continue;
            }
            println!("Exporting {}...", layout.name);
            match self.export_layout(layout) {
                Ok(path) => {
                    println!("  -> {}", path.display());
                    summary.exported += 1;
                }
                Err(e) => {
                    eprintln!("  -> Skipping {}: {}", layout.name, e);
                    summary.skipped += 1;
                }
            }
        }
        Ok(summary)
    }

    fn export_layout(&mut self, layout: &MapLayout) -> Result<PathBuf, ExportError> {
        let pair = self.pair_for(&layout.primary_tileset, layout.secondary_tileset.as_deref())?;

        let blocks = blocks_from_bytes(&fs::read(self.project_root.join(&layout.blockdata_filepath))?)?;
        let width = layout.width as usize;
        let expected = width * layout.height as usize;
        if width == 0 || blocks.len() < expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Blockdata holds {} cells but the layout is {}x{}",
                    blocks.len(),
                    layout.width,
                    layout.height
                ),
            )
            .into());
        }
        let blocks = &blocks[..expected];

        let columns = self.config.columns;
        let layers = [
            (
                "Ground",
                scene::pack_cells(&scene::layer_cells(blocks, width, columns, SOURCE_GROUND)),
            ),
            (
                "Overlay",
                scene::pack_cells(&scene::layer_cells(blocks, width, columns, SOURCE_OVERLAY)),
            ),
            (
                "Collision",
                scene::pack_cells(&scene::collision_cells(blocks, width)),
            ),
        ];

        let scene_text = scene::map_scene(
            &layout.name,
            &format!("../{}", pair.tile_set_rel),
            &layers,
        );
        let path = self.output_dir.join("maps").join(format!("{}.tscn", layout.name));
        fs::write(&path, scene_text)?;
        Ok(path)
    }

    /// Fetch or build the rendered artifacts for a tileset pair. Failed
    /// builds are not cached, so a later map retries resolution instead of
    /// reusing a poisoned entry.
    fn pair_for(
        &mut self,
        primary_label: &str,
        secondary_label: Option<&str>,
    ) -> Result<Rc<ExportedPair>, ExportError> {
        let key = (
            primary_label.to_string(),
            secondary_label.unwrap_or("").to_string(),
        );
        if let Some(pair) = self.pairs.get(&key) {
            return Ok(pair.clone());
        }

        let primary = self.tileset(primary_label)?;
        let secondary = match secondary_label {
            Some(label) => Some(self.tileset(label)?),
            None => None,
        };
        let atlases = render::render_pair(&primary, secondary.as_deref(), &self.config);

        let stem = pair_stem(primary_label, secondary_label);
        let tilesets_dir = self.output_dir.join("tilesets");
        png_out::write_image(&tilesets_dir.join(format!("{}_ground.png", stem)), &atlases.ground)?;
        png_out::write_image(&tilesets_dir.join(format!("{}_overlay.png", stem)), &atlases.overlay)?;

        let metadata = render::build_metadata(&primary, secondary.as_deref(), &self.config, &atlases);
        fs::write(
            tilesets_dir.join(format!("{}.json", stem)),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        let resource = scene::tile_set_resource(
            &format!("{}_ground.png", stem),
            &format!("{}_overlay.png", stem),
            "collision.png",
            atlases.columns,
            atlases.total_positions,
        );
        fs::write(tilesets_dir.join(format!("{}.tres", stem)), resource)?;

        let pair = Rc::new(ExportedPair {
            tile_set_rel: format!("tilesets/{}.tres", stem),
        });
        self.pairs.insert(key, pair.clone());
        Ok(pair)
    }

    fn tileset(&mut self, label: &str) -> Result<Rc<Tileset>, ExportError> {
        if let Some(tileset) = self.tilesets.get(label) {
            return Ok(tileset.clone());
        }
        let tileset = Rc::new(Tileset::load(&self.resolver, label)?);
        self.tilesets.insert(label.to_string(), tileset.clone());
        Ok(tileset)
    }
}

fn pair_stem(primary_label: &str, secondary_label: Option<&str>) -> String {
    let trim = |label: &str| {
        label
            .strip_prefix("gTileset_")
            .unwrap_or(label)
            .to_ascii_lowercase()
    };
    match secondary_label {
        Some(secondary) => format!("{}_{}", trim(primary_label), trim(secondary)),
        None => trim(primary_label),
    }
}

/// Decode a tileset pair straight out of a ROM image and write its
/// atlases; the header layout is picked from the ROM game code.
pub fn dump_rom_tileset(
    rom_path: &Path,
    header_offset: usize,
    secondary_offset: Option<usize>,
    output_dir: &Path,
    columns: usize,
) -> Result<(), ExportError> {
    let rom_data = fs::read(rom_path)?;
    let layout = rom::detect_layout(&rom_data);
    println!(
        "Game code {} -> {:?}",
        rom::game_code(&rom_data).unwrap_or("????"),
        layout
    );

    let primary = rom::load_tileset(&rom_data, header_offset, layout)?;
    let secondary = match secondary_offset {
        Some(offset) => Some(rom::load_tileset(&rom_data, offset, layout)?),
        None => None,
    };

    let config = RenderConfig::new(columns, layout);
    let atlases = render::render_pair(&primary, secondary.as_ref(), &config);

    fs::create_dir_all(output_dir)?;
    let stem = match &secondary {
        Some(secondary) => format!("{}_{}", primary.name, secondary.name),
        None => primary.name.clone(),
    };
    for (suffix, img) in [("ground", &atlases.ground), ("overlay", &atlases.overlay)] {
        let path = output_dir.join(format!("{}_{}.png", stem, suffix));
        png_out::write_image(&path, img)?;
        println!("  -> {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_stems_drop_the_label_prefix() {
        assert_eq!(
            pair_stem("gTileset_General", Some("gTileset_Petalburg")),
            "general_petalburg"
        );
        assert_eq!(pair_stem("gTileset_General", None), "general");
    }

    const LAYOUTS_JSON: &str = r#"{
  "layouts": [
    {
      "id": "LAYOUT_GOOD",
      "name": "MapGood",
      "width": 2,
      "height": 1,
      "primary_tileset": "gTileset_General",
      "secondary_tileset": null,
      "blockdata_filepath": "data/layouts/MapGood/map.bin"
    },
    {
      "id": "LAYOUT_BAD",
      "name": "MapBad",
      "width": 1,
      "height": 1,
      "primary_tileset": "gTileset_Missing",
      "secondary_tileset": null,
      "blockdata_filepath": "data/layouts/MapBad/map.bin"
    }
  ]
}"#;

    fn write_indexed_tiles_png(path: &Path) {
        let file = fs::File::create(path).unwrap();
        let mut encoder = png::Encoder::new(file, 8, 8);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Four);
        encoder.set_palette((0..48u8).collect::<Vec<u8>>());
        let mut writer = encoder.write_header().unwrap();
        let mut data = vec![0u8; 32];
        data[0] = 0x11;
        writer.write_image_data(&data).unwrap();
        writer.finish().unwrap();
    }

    fn build_test_project(root: &Path) {
        let general = root.join("data/tilesets/primary/general");
        fs::create_dir_all(general.join("palettes")).unwrap();
        write_indexed_tiles_png(&general.join("tiles.png"));
        fs::write(
            general.join("palettes/00.pal"),
            "JASC-PAL\n0100\n16\n".to_string() + &"8 8 8\n".repeat(16),
        )
        .unwrap();
        fs::write(general.join("metatiles.bin"), [0u8; 16]).unwrap();
        fs::write(general.join("metatile_attributes.bin"), [0u8; 4]).unwrap();

        fs::create_dir_all(root.join("data/layouts/MapGood")).unwrap();
        fs::write(root.join("data/layouts/layouts.json"), LAYOUTS_JSON).unwrap();
        fs::write(root.join("data/layouts/MapGood/map.bin"), [0u8, 0, 0, 0]).unwrap();
    }

    #[test]
    fn unresolved_tileset_skips_one_map_and_the_rest_export() {
        let base = std::env::temp_dir().join(format!("gba_map_exporter_e2e_{}", std::process::id()));
        let project = base.join("project");
        let output = base.join("output");
        let _ = fs::remove_dir_all(&base);
        build_test_project(&project);
        fs::create_dir_all(&output).unwrap();

        let config = RenderConfig::new(8, crate::formats::tileset::RomLayout::RubyStyle);
        let mut exporter = MapExporter::new(&project, &output, config).unwrap();
        let summary = exporter.export_all(&[]).unwrap();

        assert_eq!(summary.exported, 1);
        assert_eq!(summary.skipped, 1);
        assert!(output.join("maps/MapGood.tscn").is_file());
        assert!(!output.join("maps/MapBad.tscn").exists());
        assert!(output.join("tilesets/general_ground.png").is_file());
        assert!(output.join("tilesets/general_overlay.png").is_file());
        assert!(output.join("tilesets/general.tres").is_file());
        assert!(output.join("tilesets/general.json").is_file());
        assert!(output.join("tilesets/collision.png").is_file());

        let scene = fs::read_to_string(output.join("maps/MapGood.tscn")).unwrap();
        assert!(scene.contains("tile_data = PackedByteArray("));
        assert!(scene.contains("path=\"../tilesets/general.tres\""));

        let _ = fs::remove_dir_all(&base);
    }

    #[test]
    fn unwritable_collision_atlas_does_not_abort_the_run() {
        let base = std::env::temp_dir()
            .join(format!("gba_map_exporter_collision_{}", std::process::id()));
        let project = base.join("project");
        let output = base.join("output");
        let _ = fs::remove_dir_all(&base);
        build_test_project(&project);
        // a directory squatting on the atlas path makes its write fail
        fs::create_dir_all(output.join("tilesets/collision.png")).unwrap();

        let config = RenderConfig::new(8, crate::formats::tileset::RomLayout::RubyStyle);
        let mut exporter = MapExporter::new(&project, &output, config).unwrap();
        let summary = exporter.export_all(&[]).unwrap();

        assert_eq!(summary.exported, 1);
        assert!(output.join("maps/MapGood.tscn").is_file());

        let _ = fs::remove_dir_all(&base);
    }
}
