//! # PNG Encoder
//!
//! Self-contained writer for 8-bit RGBA PNGs: chunk framing with CRC-32,
//! filter type None per scanline, and a zlib stream built from a
//! fixed-Huffman DEFLATE compressor with greedy LZ77 matching.
//!
//! Output is deterministic: no timestamps, no ancillary chunks, and the
//! same pixels always produce the same bytes.

use std::{fs, io, path::Path};

use image::RgbaImage;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const BYTES_PER_PIXEL: usize = 4;

pub fn write_image(path: &Path, img: &RgbaImage) -> io::Result<()> {
    write_png(path, img.width(), img.height(), img.as_raw())
}

pub fn write_png(path: &Path, width: u32, height: u32, rgba: &[u8]) -> io::Result<()> {
    fs::write(path, encode_png(width, height, rgba)?)
}

pub fn encode_png(width: u32, height: u32, rgba: &[u8]) -> io::Result<Vec<u8>> {
    let stride = width as usize * BYTES_PER_PIXEL;
    if width == 0 || height == 0 || rgba.len() != stride * height as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Buffer of {} bytes does not hold a {}x{} RGBA image",
                rgba.len(),
                width,
                height
            ),
        ));
    }

    // filter type None: one 0 byte in front of every scanline
    let mut filtered = Vec::with_capacity(rgba.len() + height as usize);
    for row in rgba.chunks_exact(stride) {
        filtered.push(0);
        filtered.extend_from_slice(row);
    }

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // bit depth 8, colour type RGBA, deflate, filter method 0, no interlace
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);

    let mut out = Vec::with_capacity(filtered.len() / 2 + 64);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &zlib_compress(&filtered));
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(data);
    let mut crc = crc32_update(0xFFFF_FFFF, tag);
    crc = crc32_update(crc, data);
    out.extend_from_slice(&(!crc).to_be_bytes());
}

/// Bitwise CRC-32, reflected, polynomial 0xEDB88320. Callers start from
/// 0xFFFFFFFF and invert the final value.
fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    crc
}

fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65_521;
    let mut a = 1u32;
    let mut b = 0u32;
    // 5552 is the largest run that cannot overflow u32 between reductions
    for chunk in data.chunks(5552) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

/// zlib wrapper: the fixed 0x78 0x9C header, one DEFLATE stream, then the
/// big-endian Adler-32 of the uncompressed input.
fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x9C];
    deflate_fixed(data, &mut out);
    out.extend_from_slice(&adler32(data).to_be_bytes());
    out
}

struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    bits: u32,
    count: u32,
}

impl BitWriter<'_> {
    /// Append `count` bits, LSB first.
    fn push(&mut self, bits: u32, count: u32) {
        self.bits |= bits << self.count;
        self.count += count;
        while self.count >= 8 {
            self.out.push(self.bits as u8);
            self.bits >>= 8;
            self.count -= 8;
        }
    }

    /// Huffman codes go on the wire most-significant bit first.
    fn push_code(&mut self, code: u32, len: u32) {
        let mut reversed = 0u32;
        for bit in 0..len {
            reversed |= ((code >> bit) & 1) << (len - 1 - bit);
        }
        self.push(reversed, len);
    }

    fn finish(self) {
        if self.count > 0 {
            self.out.push(self.bits as u8);
        }
    }
}

const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 258;
const WINDOW: usize = 32 * 1024;
const HASH_BITS: u32 = 15;
const MAX_CHAIN: usize = 64;

const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
    131, 163, 195, 227, 258,
];
const LENGTH_EXTRA: [u32; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DIST_EXTRA: [u32; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12,
    13, 13,
];

/// Emit one literal/length symbol with the fixed Huffman code table.
fn put_symbol(bw: &mut BitWriter, symbol: u32) {
    match symbol {
        0..=143 => bw.push_code(0x30 + symbol, 8),
        144..=255 => bw.push_code(0x190 + (symbol - 144), 9),
        256..=279 => bw.push_code(symbol - 256, 7),
        _ => bw.push_code(0xC0 + (symbol - 280), 8),
    }
}

fn put_length(bw: &mut BitWriter, length: usize) {
    let index = LENGTH_BASE.partition_point(|&base| usize::from(base) <= length) - 1;
    put_symbol(bw, 257 + index as u32);
    if LENGTH_EXTRA[index] > 0 {
        bw.push((length - usize::from(LENGTH_BASE[index])) as u32, LENGTH_EXTRA[index]);
    }
}

fn put_distance(bw: &mut BitWriter, distance: usize) {
    let index = DIST_BASE.partition_point(|&base| usize::from(base) <= distance) - 1;
    bw.push_code(index as u32, 5);
    if DIST_EXTRA[index] > 0 {
        bw.push((distance - usize::from(DIST_BASE[index])) as u32, DIST_EXTRA[index]);
    }
}

fn hash3(data: &[u8], at: usize) -> usize {
    let word =
        u32::from(data[at]) | (u32::from(data[at + 1]) << 8) | (u32::from(data[at + 2]) << 16);
    (word.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize
}

fn match_len(data: &[u8], candidate: usize, at: usize) -> usize {
    let limit = (data.len() - at).min(MAX_MATCH);
    let mut len = 0;
    while len < limit && data[candidate + len] == data[at + len] {
        len += 1;
    }
    len
}

/// One final DEFLATE block with the fixed Huffman tables and a greedy
/// hash-chained LZ77 matcher.
fn deflate_fixed(data: &[u8], out: &mut Vec<u8>) {
    let mut bw = BitWriter {
        out,
        bits: 0,
        count: 0,
    };
    bw.push(1, 1); // final block
    bw.push(1, 2); // fixed Huffman tables

    let mut head = vec![usize::MAX; 1 << HASH_BITS];
    let mut prev = vec![usize::MAX; data.len()];
    let mut insert = |head: &mut Vec<usize>, prev: &mut Vec<usize>, at: usize| {
        if at + MIN_MATCH <= data.len() {
            let hash = hash3(data, at);
            prev[at] = head[hash];
            head[hash] = at;
        }
    };

    let mut at = 0;
    while at < data.len() {
        let mut best_len = 0;
        let mut best_dist = 0;
        if at + MIN_MATCH <= data.len() {
            let mut candidate = head[hash3(data, at)];
            let mut chain = 0;
            while candidate != usize::MAX && chain < MAX_CHAIN {
                if at - candidate > WINDOW {
                    break;
                }
                let len = match_len(data, candidate, at);
                if len > best_len {
                    best_len = len;
                    best_dist = at - candidate;
                    if len >= MAX_MATCH {
                        break;
                    }
                }
                candidate = prev[candidate];
                chain += 1;
            }
        }

        if best_len >= MIN_MATCH {
            put_length(&mut bw, best_len);
            put_distance(&mut bw, best_dist);
            for offset in 0..best_len {
                insert(&mut head, &mut prev, at + offset);
            }
            at += best_len;
        } else {
            put_symbol(&mut bw, u32::from(data[at]));
            insert(&mut head, &mut prev, at);
            at += 1;
        }
    }

    put_symbol(&mut bw, 256); // end of block
    bw.finish();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_matches_the_known_iend_value() {
        assert_eq!(!crc32_update(0xFFFF_FFFF, b"IEND"), 0xAE42_6082);
    }

    #[test]
    fn adler32_matches_the_known_wikipedia_value() {
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    }

    fn decode(bytes: &[u8]) -> (png::OutputInfo, Vec<u8>) {
        let decoder = png::Decoder::new(bytes);
        let mut reader = decoder.read_info().expect("own output must parse");
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).expect("own output must decode");
        buf.truncate(info.buffer_size());
        (info, buf)
    }

    fn test_pixels(width: u32, height: u32) -> Vec<u8> {
        // noisy enough to force literals above symbol 143, plus repetition
        (0..width * height * 4)
            .map(|i| (i.wrapping_mul(197) % 251) as u8)
            .collect()
    }

    #[test]
    fn noisy_image_round_trips() {
        let rgba = test_pixels(13, 7);
        let bytes = encode_png(13, 7, &rgba).unwrap();
        let (info, decoded) = decode(&bytes);
        assert_eq!((info.width, info.height), (13, 7));
        assert_eq!(info.color_type, png::ColorType::Rgba);
        assert_eq!(info.bit_depth, png::BitDepth::Eight);
        assert_eq!(decoded, rgba);
    }

    #[test]
    fn flat_image_round_trips_through_long_matches() {
        let rgba = vec![0x7Fu8; 64 * 64 * 4];
        let bytes = encode_png(64, 64, &rgba).unwrap();
        assert!(bytes.len() < rgba.len() / 4, "flat input should compress well");
        let (_, decoded) = decode(&bytes);
        assert_eq!(decoded, rgba);
    }

    #[test]
    fn single_pixel_round_trips() {
        let rgba = [1u8, 2, 3, 4];
        let bytes = encode_png(1, 1, &rgba).unwrap();
        let (_, decoded) = decode(&bytes);
        assert_eq!(decoded, rgba);
    }

    #[test]
    fn identical_input_is_byte_identical_output() {
        let rgba = test_pixels(24, 9);
        assert_eq!(encode_png(24, 9, &rgba).unwrap(), encode_png(24, 9, &rgba).unwrap());
    }

    #[test]
    fn idat_payload_is_a_zlib_stream() {
        let rgba = test_pixels(4, 4);
        let bytes = encode_png(4, 4, &rgba).unwrap();
        // signature, then IHDR (25 bytes), then the IDAT header
        let idat = &bytes[8 + 25..];
        assert_eq!(&idat[4..8], b"IDAT");
        assert_eq!(&idat[8..10], &[0x78, 0x9C]);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert!(encode_png(2, 2, &[0u8; 15]).is_err());
        assert!(encode_png(0, 2, &[]).is_err());
    }
}
