//! Minimal text rasterizer on top of the 8x8 bitmap glyphs from `font8x8`.

use anyhow::{Context, Result};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::{Cursor, Write};
use std::path::Path;

pub const GLYPH_SIZE: u32 = 8;

/// One line of text placed on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub x: u32,
    /// Top edge of the line.
    pub y: u32,
    /// Integer glyph scale; 2 draws each font pixel as a 2x2 block.
    pub scale: u32,
    pub color: Rgba<u8>,
}

fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Draw `line` onto `canvas`, clipping anything past the edges.
pub fn draw_text(canvas: &mut RgbaImage, line: &TextLine) {
    let (width, height) = canvas.dimensions();
    let advance = GLYPH_SIZE * line.scale;
    for (i, c) in line.text.chars().enumerate() {
        let origin_x = line.x + i as u32 * advance;
        if origin_x >= width {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                if bits & (1 << col) == 0 {
                    continue;
                }
                for dy in 0..line.scale {
                    for dx in 0..line.scale {
                        let px = origin_x + col * line.scale + dx;
                        let py = line.y + row as u32 * line.scale + dy;
                        if px < width && py < height {
                            canvas.put_pixel(px, py, line.color);
                        }
                    }
                }
            }
        }
    }
}

pub fn rasterize(width: u32, height: u32, background: Rgba<u8>, lines: &[TextLine]) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, background);
    for line in lines {
        draw_text(&mut canvas, line);
    }
    canvas
}

pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    canvas
        .write_to(&mut buf, ImageFormat::Png)
        .context("encoding summary PNG")?;
    Ok(buf.into_inner())
}

/// Write `bytes` to `path` through a temp file in the same directory and a
/// rename, so readers never see a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("writing summary image")?;
    tmp.as_file().sync_all().context("syncing summary image")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn inked(canvas: &RgbaImage) -> usize {
        canvas.pixels().filter(|p| **p != WHITE).count()
    }

    #[test]
    fn draws_scaled_glyphs_inside_their_cell() {
        let line = TextLine {
            text: "A".into(),
            x: 4,
            y: 4,
            scale: 2,
            color: BLACK,
        };
        let canvas = rasterize(40, 40, WHITE, &[line]);

        let set_bits: u32 = glyph('A').iter().map(|b| b.count_ones()).sum();
        assert_eq!(inked(&canvas) as u32, set_bits * 4);
        for (x, y, p) in canvas.enumerate_pixels() {
            if *p != WHITE {
                assert!((4..20).contains(&x) && (4..20).contains(&y), "ink at {x},{y}");
            }
        }
    }

    #[test]
    fn clips_at_canvas_edge() {
        let line = TextLine {
            text: "WWWWWWWWWWWWWWWWWWWW".into(),
            x: 0,
            y: 0,
            scale: 3,
            color: BLACK,
        };
        let canvas = rasterize(30, 10, WHITE, &[line]);
        assert_eq!(canvas.dimensions(), (30, 10));
        assert!(inked(&canvas) > 0);
    }

    #[test]
    fn unknown_characters_fall_back_to_a_glyph() {
        assert_eq!(glyph('é'), LATIN_FONTS.get('é').unwrap());
        assert_eq!(glyph('漢'), BASIC_FONTS.get('?').unwrap());
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
