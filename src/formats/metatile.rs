//! # Metatile Records
//!
//! A metatile is a 16x16 map unit built from eight 8x8 tile references:
//! entries 0-3 form the ground layer, entries 4-7 the overlay. Each entry
//! packs into one little-endian `u16`; a whole metatile is 16 bytes.
//!
//! Alongside the metatile table lives an attribute table, one packed
//! little-endian `u32` per metatile.

use std::io;

pub const TILES_PER_METATILE: usize = 8;
pub const METATILE_BYTES: usize = 16;
pub const ATTRIBUTE_BYTES: usize = 4;

/// One 8x8 tile reference inside a metatile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileEntry {
    pub tile_id: u16,
    pub h_flip: bool,
    pub v_flip: bool,
    pub palette: u8,
}

impl TileEntry {
    /// Bits 0-9 tile id, bit 10 horizontal flip, bit 11 vertical flip,
    /// bits 12-15 palette index.
    pub fn from_raw(raw: u16) -> Self {
        TileEntry {
            tile_id: raw & 0x03FF,
            h_flip: raw & 0x0400 != 0,
            v_flip: raw & 0x0800 != 0,
            palette: (raw >> 12) as u8,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Metatile {
    pub entries: [TileEntry; TILES_PER_METATILE],
}

impl Metatile {
    /// Ground-layer quadrants, in TL, TR, BL, BR order.
    pub fn ground(&self) -> &[TileEntry] {
        &self.entries[..4]
    }

    /// Overlay-layer quadrants, in TL, TR, BL, BR order.
    pub fn overlay(&self) -> &[TileEntry] {
        &self.entries[4..]
    }
}

pub fn metatiles_from_bytes(data: &[u8]) -> io::Result<Vec<Metatile>> {
    if data.len() % METATILE_BYTES != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Metatile data length {} not divisible by {}",
                data.len(),
                METATILE_BYTES
            ),
        ));
    }

    Ok(data
        .chunks_exact(METATILE_BYTES)
        .map(|chunk| {
            let mut metatile = Metatile::default();
            for (entry, raw) in metatile.entries.iter_mut().zip(chunk.chunks_exact(2)) {
                *entry = TileEntry::from_raw(u16::from_le_bytes([raw[0], raw[1]]));
            }
            metatile
        })
        .collect())
}

/// Packed per-metatile attribute word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetatileAttribute(pub u32);

impl MetatileAttribute {
    pub fn behavior(self) -> u16 {
        (self.0 & 0x1FF) as u16
    }

    pub fn terrain(self) -> u8 {
        ((self.0 >> 9) & 0x1F) as u8
    }

    pub fn encounter(self) -> u8 {
        ((self.0 >> 24) & 0x7) as u8
    }

    pub fn layer_type(self) -> u8 {
        ((self.0 >> 29) & 0x3) as u8
    }
}

pub fn attributes_from_bytes(data: &[u8]) -> io::Result<Vec<MetatileAttribute>> {
    if data.len() % ATTRIBUTE_BYTES != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Attribute data length {} not divisible by {}",
                data.len(),
                ATTRIBUTE_BYTES
            ),
        ));
    }

    Ok(data
        .chunks_exact(ATTRIBUTE_BYTES)
        .map(|chunk| MetatileAttribute(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_entry_unpacks_all_fields() {
        // palette 5, v-flip, h-flip, tile 0x234
        let entry = TileEntry::from_raw(0x5E34);
        assert_eq!(entry.tile_id, 0x234);
        assert!(entry.h_flip);
        assert!(entry.v_flip);
        assert_eq!(entry.palette, 5);

        let plain = TileEntry::from_raw(0x0042);
        assert_eq!(plain.tile_id, 0x42);
        assert!(!plain.h_flip);
        assert!(!plain.v_flip);
        assert_eq!(plain.palette, 0);
    }

    #[test]
    fn metatile_splits_ground_and_overlay() {
        let mut data = Vec::new();
        for raw in [1u16, 2, 3, 4, 5, 6, 7, 8] {
            data.extend_from_slice(&raw.to_le_bytes());
        }
        let metatiles = metatiles_from_bytes(&data).unwrap();
        assert_eq!(metatiles.len(), 1);
        assert_eq!(metatiles[0].ground()[0].tile_id, 1);
        assert_eq!(metatiles[0].ground()[3].tile_id, 4);
        assert_eq!(metatiles[0].overlay()[0].tile_id, 5);
        assert_eq!(metatiles[0].overlay()[3].tile_id, 8);
    }

    #[test]
    fn ragged_metatile_data_is_rejected() {
        assert!(metatiles_from_bytes(&[0u8; 17]).is_err());
        assert!(metatiles_from_bytes(&[]).unwrap().is_empty());
    }

    #[test]
    fn attribute_bitfields_unpack() {
        // layer type 2, encounter 3, terrain 0x11, behavior 0x155
        let word = (2u32 << 29) | (3 << 24) | (0x11 << 9) | 0x155;
        let attr = attributes_from_bytes(&word.to_le_bytes()).unwrap()[0];
        assert_eq!(attr.behavior(), 0x155);
        assert_eq!(attr.terrain(), 0x11);
        assert_eq!(attr.encounter(), 3);
        assert_eq!(attr.layer_type(), 2);
    }

    #[test]
    fn ragged_attribute_data_is_rejected() {
        assert!(attributes_from_bytes(&[0u8; 6]).is_err());
    }
}
