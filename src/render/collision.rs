//! # Collision Atlas
//!
//! A procedurally drawn grid of swatches, one per (collision, elevation)
//! pair, shared by every exported map. Elevation picks the hue, collision
//! picks the opacity and the "X" mark, and a small hex glyph makes the
//! elevation readable in an editor.

use image::{Rgba, RgbaImage};

pub const COLLISION_COLS: usize = 4;
pub const COLLISION_ROWS: usize = 16;
pub const SWATCH_PX: usize = 16;

const PASSABLE_ALPHA: u8 = 128;
const BLOCKED_ALPHA: u8 = 192;

/// 3x5 hex digit glyphs, one row per byte, low 3 bits used.
const HEX_GLYPHS: [[u8; 5]; 16] = [
    [0b111, 0b101, 0b101, 0b101, 0b111], // 0
    [0b010, 0b110, 0b010, 0b010, 0b111], // 1
    [0b111, 0b001, 0b111, 0b100, 0b111], // 2
    [0b111, 0b001, 0b111, 0b001, 0b111], // 3
    [0b101, 0b101, 0b111, 0b001, 0b001], // 4
    [0b111, 0b100, 0b111, 0b001, 0b111], // 5
    [0b111, 0b100, 0b111, 0b101, 0b111], // 6
    [0b111, 0b001, 0b001, 0b001, 0b001], // 7
    [0b111, 0b101, 0b111, 0b101, 0b111], // 8
    [0b111, 0b101, 0b111, 0b001, 0b111], // 9
    [0b111, 0b101, 0b111, 0b101, 0b101], // A
    [0b110, 0b101, 0b110, 0b101, 0b110], // B
    [0b111, 0b100, 0b100, 0b100, 0b111], // C
    [0b110, 0b101, 0b101, 0b101, 0b110], // D
    [0b111, 0b100, 0b111, 0b100, 0b111], // E
    [0b111, 0b100, 0b111, 0b100, 0b100], // F
];

/// Render the shared collision/elevation atlas: `COLLISION_COLS` columns of
/// collision values by `COLLISION_ROWS` rows of elevation values.
pub fn render_collision_atlas() -> RgbaImage {
    let mut img = RgbaImage::new(
        (COLLISION_COLS * SWATCH_PX) as u32,
        (COLLISION_ROWS * SWATCH_PX) as u32,
    );
    for elevation in 0..COLLISION_ROWS as u8 {
        for collision in 0..COLLISION_COLS as u8 {
            draw_swatch(&mut img, collision, elevation);
        }
    }
    img
}

fn draw_swatch(img: &mut RgbaImage, collision: u8, elevation: u8) {
    let base_x = collision as usize * SWATCH_PX;
    let base_y = elevation as usize * SWATCH_PX;
    let (r, g, b) = hsv_to_rgb(f32::from(elevation) * 22.5, 0.5, 1.0);
    let alpha = if collision == 0 { PASSABLE_ALPHA } else { BLOCKED_ALPHA };

    let fill = Rgba([r, g, b, alpha]);
    let border = Rgba([r / 2, g / 2, b / 2, alpha]);
    for y in 0..SWATCH_PX {
        for x in 0..SWATCH_PX {
            let edge = x == 0 || y == 0 || x == SWATCH_PX - 1 || y == SWATCH_PX - 1;
            let colour = if edge { border } else { fill };
            img.put_pixel((base_x + x) as u32, (base_y + y) as u32, colour);
        }
    }

    if collision > 0 {
        let mark = Rgba([r / 3, g / 3, b / 3, 255]);
        for i in 0..SWATCH_PX {
            img.put_pixel((base_x + i) as u32, (base_y + i) as u32, mark);
            img.put_pixel((base_x + SWATCH_PX - 1 - i) as u32, (base_y + i) as u32, mark);
        }
    }

    draw_glyph(img, base_x + 6, base_y + 5, elevation);
}

/// Centered 3x5 glyph with a 1px black outline and white fill.
fn draw_glyph(img: &mut RgbaImage, origin_x: usize, origin_y: usize, digit: u8) {
    let glyph = &HEX_GLYPHS[digit as usize & 0xF];
    let lit = |x: i32, y: i32| -> bool {
        (0..3).contains(&x) && (0..5).contains(&y) && glyph[y as usize] >> (2 - x) & 1 != 0
    };

    for y in -1..6i32 {
        for x in -1..4i32 {
            let outline = (-1..=1).any(|dy| (-1..=1).any(|dx| lit(x + dx, y + dy)));
            if outline {
                img.put_pixel(
                    (origin_x as i32 + x) as u32,
                    (origin_y as i32 + y) as u32,
                    Rgba([0, 0, 0, 255]),
                );
            }
        }
    }
    for y in 0..5i32 {
        for x in 0..3i32 {
            if lit(x, y) {
                img.put_pixel(
                    (origin_x as i32 + x) as u32,
                    (origin_y as i32 + y) as u32,
                    Rgba([255, 255, 255, 255]),
                );
            }
        }
    }
}

fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> (u8, u8, u8) {
    let hue = hue.rem_euclid(360.0) / 60.0;
    let chroma = value * saturation;
    let x = chroma * (1.0 - (hue % 2.0 - 1.0).abs());
    let (r, g, b) = match hue as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let to_byte = |v: f32| ((v + m) * 255.0).round() as u8;
    (to_byte(r), to_byte(g), to_byte(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atlas_covers_the_full_grid() {
        let img = render_collision_atlas();
        assert_eq!(img.width(), 64);
        assert_eq!(img.height(), 256);
    }

    #[test]
    fn passable_swatch_is_half_transparent_with_no_mark() {
        let img = render_collision_atlas();
        // interior pixel of (collision 0, elevation 0), off the diagonals
        // and outside the glyph box
        let pixel = img.get_pixel(4, 1);
        assert_eq!(pixel.0[3], PASSABLE_ALPHA);
        // on-diagonal pixel keeps the fill alpha: no "X" drawn
        assert_eq!(img.get_pixel(2, 2).0[3], PASSABLE_ALPHA);
    }

    #[test]
    fn blocked_swatch_is_more_opaque_and_marked() {
        let img = render_collision_atlas();
        // (collision 1, elevation 15) sits at (16, 240)
        assert_eq!(img.get_pixel(16 + 4, 240 + 1).0[3], BLOCKED_ALPHA);
        // diagonal "X" mark is fully opaque
        assert_eq!(img.get_pixel(16 + 2, 240 + 2).0[3], 255);
    }

    #[test]
    fn elevation_glyph_is_white_on_black() {
        let img = render_collision_atlas();
        // glyph for elevation 0 starts at (6, 5); its top-left pixel is lit
        assert_eq!(img.get_pixel(6, 5).0, [255, 255, 255, 255]);
        // outline pixel just above it
        assert_eq!(img.get_pixel(6, 4).0, [0, 0, 0, 255]);
    }

    #[test]
    fn hue_sweeps_with_elevation() {
        assert_eq!(hsv_to_rgb(0.0, 0.5, 1.0), (255, 128, 128));
        let (r, g, b) = hsv_to_rgb(8.0 * 22.5, 0.5, 1.0); // 180 degrees: cyan-ish
        assert!(b > r && g > r, "expected cyan-ish, got ({}, {}, {})", r, g, b);
    }
}
