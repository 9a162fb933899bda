//! # Map Block Data
//!
//! A map is a grid of 16-bit cells: metatile id in bits 0-9, collision in
//! bits 10-11, elevation in bits 12-15. Blockdata files store the grid
//! row-major, two little-endian bytes per cell.

use std::io;

pub const BLOCK_BYTES: usize = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapBlock(pub u16);

impl MapBlock {
    pub fn metatile_id(self) -> u16 {
        self.0 & 0x03FF
    }

    pub fn collision(self) -> u8 {
        ((self.0 >> 10) & 0x3) as u8
    }

    pub fn elevation(self) -> u8 {
        (self.0 >> 12) as u8
    }
}

pub fn blocks_from_bytes(data: &[u8]) -> io::Result<Vec<MapBlock>> {
    if data.len() % BLOCK_BYTES != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Blockdata length {} is not a whole number of cells", data.len()),
        ));
    }
    Ok(data
        .chunks_exact(BLOCK_BYTES)
        .map(|chunk| MapBlock(u16::from_le_bytes([chunk[0], chunk[1]])))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_bitfields_unpack() {
        // elevation 3, collision 1, metatile 0x285
        let block = MapBlock((3 << 12) | (1 << 10) | 0x285);
        assert_eq!(block.metatile_id(), 0x285);
        assert_eq!(block.collision(), 1);
        assert_eq!(block.elevation(), 3);
    }

    #[test]
    fn decodes_little_endian_cells() {
        let blocks = blocks_from_bytes(&[0x34, 0x12, 0xFF, 0xFF]).unwrap();
        assert_eq!(blocks, vec![MapBlock(0x1234), MapBlock(0xFFFF)]);
    }

    #[test]
    fn odd_length_is_rejected() {
        assert!(blocks_from_bytes(&[0x00]).is_err());
    }
}
