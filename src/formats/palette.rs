//! # Palettes
//!
//! 16-colour palettes from two sources: JASC-PAL text files in a project
//! tree, and raw BGR555 words in a ROM. [`PaletteTable`] merges the sixteen
//! render-time slots from a primary/secondary tileset pair.

use std::{fs, io, path::Path};

pub const COLOURS_PER_PALETTE: usize = 16;
pub const PALETTE_SLOTS: usize = 16;

/// First slot owned by the secondary tileset.
pub const SECONDARY_SLOT_START: usize = 7;
/// One past the last slot owned by the secondary tileset.
pub const SECONDARY_SLOT_END: usize = 13;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub type Palette = [Rgb; COLOURS_PER_PALETTE];

/// Expand a 15-bit BGR word to 8-bit channels.
pub fn rgb_from_bgr555(raw: u16) -> Rgb {
    let expand = |v: u16| ((v << 3) | (v >> 2)) as u8;
    Rgb {
        r: expand(raw & 0x1F),
        g: expand((raw >> 5) & 0x1F),
        b: expand((raw >> 10) & 0x1F),
    }
}

/// Load one JASC-PAL file. A missing file is not an error: sparse palette
/// sets are valid, so it yields 16 default entries instead.
pub fn load_jasc_palette(path: &Path) -> io::Result<Palette> {
    if !path.exists() {
        return Ok([Rgb::default(); COLOURS_PER_PALETTE]);
    }
    parse_jasc_palette(&fs::read_to_string(path)?)
}

/// Parse the fixed JASC-PAL layout: `JASC-PAL`, `0100`, a count line, then
/// 16 lines of `R G B` decimal triples.
pub fn parse_jasc_palette(text: &str) -> io::Result<Palette> {
    let mut lines = text.lines().map(str::trim_end);

    if lines.next() != Some("JASC-PAL") || lines.next() != Some("0100") {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Palette file is missing the JASC-PAL/0100 header",
        ));
    }
    let _count = lines.next();

    let mut palette = [Rgb::default(); COLOURS_PER_PALETTE];
    for (index, colour) in palette.iter_mut().enumerate() {
        let line = lines.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Palette file ends at colour {} of 16", index),
            )
        })?;
        let mut channels = line.split_whitespace().map(|v| {
            v.parse::<u8>().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Bad colour component {:?} on line {:?}", v, line),
                )
            })
        });
        let mut next = |name: &str| {
            channels.next().unwrap_or_else(|| {
                Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Colour line {:?} is missing the {} component", line, name),
                ))
            })
        };
        *colour = Rgb {
            r: next("red")?,
            g: next("green")?,
            b: next("blue")?,
        };
    }
    Ok(palette)
}

/// The 16 render-time palette slots for one tileset pair.
///
/// The primary tileset owns slots [0,7), the secondary slots [7,13); slots
/// [13,16) stay default. An out-of-range lookup falls back to slot 0 --
/// a defined degradation, not a fault.
pub struct PaletteTable {
    slots: [Palette; PALETTE_SLOTS],
}

impl PaletteTable {
    pub fn from_pair(primary: &[Palette], secondary: Option<&[Palette]>) -> Self {
        let mut slots = [[Rgb::default(); COLOURS_PER_PALETTE]; PALETTE_SLOTS];
        for (slot, palette) in slots.iter_mut().take(SECONDARY_SLOT_START).enumerate() {
            if let Some(source) = primary.get(slot) {
                *palette = *source;
            }
        }
        if let Some(secondary) = secondary {
            for slot in SECONDARY_SLOT_START..SECONDARY_SLOT_END {
                if let Some(source) = secondary.get(slot) {
                    slots[slot] = *source;
                }
            }
        }
        PaletteTable { slots }
    }

    pub fn get(&self, index: usize) -> &Palette {
        self.slots.get(index).unwrap_or(&self.slots[0])
    }
}
