mod binary_utils;
mod export;
mod formats;
mod png_out;
mod project;
mod render;
mod rom;
mod scene;
mod tileset;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use export::MapExporter;
use formats::tileset::RomLayout;
use render::{RenderConfig, DEFAULT_ATLAS_COLUMNS};

#[derive(Parser)]
#[command(
    name = "gba_map_exporter",
    about = "Convert GBA-style tile maps into atlas PNGs and engine scene files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export every map layout of a decomp project tree
    Export {
        /// Project root (the directory holding data/ and src/)
        #[arg(long)]
        project: PathBuf,
        /// Output directory for maps/ and tilesets/
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// Only export layouts with this name or id (repeatable)
        #[arg(long = "map")]
        maps: Vec<String>,
        /// Metatiles per atlas row
        #[arg(long, default_value_t = DEFAULT_ATLAS_COLUMNS)]
        columns: usize,
        /// Header/ID-space generation of the source data
        #[arg(long, value_enum, default_value_t = LayoutArg::Ruby)]
        layout: LayoutArg,
    },
    /// Render the atlases of a tileset read straight from a ROM image
    DumpTileset {
        #[arg(long)]
        rom: PathBuf,
        /// Tileset header offset, decimal or 0x-prefixed hex
        #[arg(long, value_parser = parse_offset)]
        offset: usize,
        /// Optional secondary tileset header offset
        #[arg(long, value_parser = parse_offset)]
        secondary_offset: Option<usize>,
        #[arg(long, default_value = "output")]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_ATLAS_COLUMNS)]
        columns: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Firered,
    Ruby,
}

impl From<LayoutArg> for RomLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Firered => RomLayout::FireRedStyle,
            LayoutArg::Ruby => RomLayout::RubyStyle,
        }
    }
}

fn parse_offset(value: &str) -> Result<usize, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| format!("{:?} is not a valid offset", value))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Export {
            project,
            output,
            maps,
            columns,
            layout,
        } => {
            let config = RenderConfig::new(columns, layout.into());
            let mut exporter = match MapExporter::new(&project, &output, config) {
                Ok(exporter) => exporter,
                Err(e) => {
                    eprintln!("Failed to open project {}: {}", project.display(), e);
                    return ExitCode::FAILURE;
                }
            };
            match exporter.export_all(&maps) {
                Ok(summary) => {
                    println!(
                        "Exported {} map(s), skipped {}",
                        summary.exported, summary.skipped
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Export failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::DumpTileset {
            rom,
            offset,
            secondary_offset,
            output,
            columns,
        } => match export::dump_rom_tileset(&rom, offset, secondary_offset, &output, columns) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to dump tileset: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_parse_in_hex_and_decimal() {
        assert_eq!(parse_offset("0x2D49B8").unwrap(), 0x2D49B8);
        assert_eq!(parse_offset("1024").unwrap(), 1024);
        assert!(parse_offset("xyz").is_err());
    }
}
