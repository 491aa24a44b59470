//! Export rendering: burns cluster labels into a full-resolution plan image.
//!
//! Each cluster becomes a yellow box with a red outline, centred on the
//! cluster centroid, with its label (`"3"`, `"1,2,5"`) drawn in black. Box and
//! text sizes scale with the image width so labels stay legible on large
//! scans. Text uses a built-in 5×7 bitmap face covering the only characters
//! labels contain: digits and commas.
//!
//! This module works on pixels only. Choosing which plans to render and where
//! the results go belongs to [`crate::export`].

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgba, RgbaImage};

use crate::cluster::{self, export_marker_size, export_threshold};
use crate::consts::{EXPORT_FONT_RATIO, EXPORT_PADDING_RATIO, EXPORT_STROKE_RATIO, EXPORT_TEXT_NUDGE_RATIO};
use crate::decode::{DecodeError, ImageDecoder};
use crate::doc::{ImageSize, Marker};

/// Label box fill (`#FACC15`).
pub const FILL: Rgba<u8> = Rgba([0xFA, 0xCC, 0x15, 0xFF]);
/// Label box outline (`#DC2626`).
pub const STROKE: Rgba<u8> = Rgba([0xDC, 0x26, 0x26, 0xFF]);
/// Label text.
pub const INK: Rgba<u8> = Rgba([0, 0, 0, 0xFF]);

/// Glyph rows are drawn this many units tall; the font size spans ten units.
const GLYPH_ROWS: usize = 7;
const UNITS_PER_EM: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("jpeg encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Geometry of one drawn label, in image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelBox {
    pub label: String,
    /// Left edge of the box.
    pub left: f64,
    /// Top edge of the box.
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl LabelBox {
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

struct Glyph {
    width: u8,
    rows: [u8; GLYPH_ROWS],
}

#[rustfmt::skip]
const DIGITS: [Glyph; 10] = [
    Glyph { width: 5, rows: [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110] },
    Glyph { width: 5, rows: [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110] },
    Glyph { width: 5, rows: [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111] },
    Glyph { width: 5, rows: [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110] },
    Glyph { width: 5, rows: [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010] },
    Glyph { width: 5, rows: [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110] },
    Glyph { width: 5, rows: [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110] },
    Glyph { width: 5, rows: [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000] },
    Glyph { width: 5, rows: [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110] },
    Glyph { width: 5, rows: [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100] },
];

const COMMA: Glyph = Glyph { width: 2, rows: [0b00, 0b00, 0b00, 0b00, 0b11, 0b01, 0b10] };

fn glyph(c: char) -> Option<&'static Glyph> {
    match c {
        ',' => Some(&COMMA),
        _ => c.to_digit(10).and_then(|d| DIGITS.get(d as usize)),
    }
}

/// Rendered width of `text` at `font_px`. Characters without a glyph take no space.
#[must_use]
pub fn text_width(text: &str, font_px: f64) -> f64 {
    let unit = font_px / UNITS_PER_EM;
    let units: u32 = text.chars().filter_map(glyph).map(|g| u32::from(g.width) + 1).sum();
    f64::from(units.saturating_sub(1)) * unit
}

/// Decode a plan, label its markers and encode the result as JPEG.
///
/// # Errors
///
/// Returns a [`RenderError`] if the plan cannot be decoded or the result
/// cannot be encoded.
pub fn render_plan<'a, D, I>(decoder: &D, plan_bytes: &[u8], markers: I, quality: u8) -> Result<Vec<u8>, RenderError>
where
    D: ImageDecoder + ?Sized,
    I: IntoIterator<Item = &'a Marker>,
{
    let mut image = decoder.decode(plan_bytes)?;
    mark_plan(&mut image, markers);
    encode_jpeg(image, quality)
}

/// Cluster `markers` at export scale and draw one label per cluster.
pub fn mark_plan<'a, I>(image: &mut RgbaImage, markers: I) -> Vec<LabelBox>
where
    I: IntoIterator<Item = &'a Marker>,
{
    let size = ImageSize::new(image.width(), image.height());
    let marker_size = export_marker_size(size.width);
    let clusters = cluster::cluster(markers, size, export_threshold(size.width));

    clusters
        .iter()
        .map(|c| {
            let center = c.position.to_image_point(size);
            draw_label(image, &c.label, center.x, center.y, marker_size)
        })
        .collect()
}

/// Draw a single label box centred on `(cx, cy)`.
pub fn draw_label(image: &mut RgbaImage, label: &str, cx: f64, cy: f64, marker_size: f64) -> LabelBox {
    let font_px = marker_size * EXPORT_FONT_RATIO;
    let text_w = text_width(label, font_px);
    let width = marker_size.max(text_w + marker_size * EXPORT_PADDING_RATIO);
    let height = marker_size;
    let left = cx - width / 2.0;
    let top = cy - height / 2.0;

    fill_rect(image, left, top, left + width, top + height, FILL);
    stroke_rect(image, left, top, width, height, marker_size * EXPORT_STROKE_RATIO, STROKE);
    draw_text(image, label, cx, cy + marker_size * EXPORT_TEXT_NUDGE_RATIO, font_px, INK);

    LabelBox { label: label.to_owned(), left, top, width, height }
}

/// Draw `text` centred on `(cx, cy)`.
fn draw_text(image: &mut RgbaImage, text: &str, cx: f64, cy: f64, font_px: f64, color: Rgba<u8>) {
    let unit = font_px / UNITS_PER_EM;
    let mut x = cx - text_width(text, font_px) / 2.0;
    #[allow(clippy::cast_precision_loss)]
    let top = cy - GLYPH_ROWS as f64 * unit / 2.0;

    for g in text.chars().filter_map(glyph) {
        for (row, bits) in g.rows.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let y0 = top + row as f64 * unit;
            for col in 0..g.width {
                if bits & (1 << (g.width - 1 - col)) != 0 {
                    let x0 = x + f64::from(col) * unit;
                    fill_rect(image, x0, y0, x0 + unit, y0 + unit, color);
                }
            }
        }
        x += f64::from(g.width + 1) * unit;
    }
}

/// Outline a rectangle with a stroke of `line_width` centred on its edges.
fn stroke_rect(image: &mut RgbaImage, left: f64, top: f64, width: f64, height: f64, line_width: f64, color: Rgba<u8>) {
    let half = line_width / 2.0;
    let (right, bottom) = (left + width, top + height);
    fill_rect(image, left - half, top - half, right + half, top + half, color);
    fill_rect(image, left - half, bottom - half, right + half, bottom + half, color);
    fill_rect(image, left - half, top - half, left + half, bottom + half, color);
    fill_rect(image, right - half, top - half, right + half, bottom + half, color);
}

/// Fill the pixels whose centres fall in `[x0, x1) × [y0, y1)`, clipped to the image.
fn fill_rect(image: &mut RgbaImage, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba<u8>) {
    let (cols, rows) = (pixel_span(x0, x1, image.width()), pixel_span(y0, y1, image.height()));
    for y in rows {
        for x in cols.clone() {
            image.put_pixel(x, y, color);
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixel_span(from: f64, to: f64, limit: u32) -> std::ops::Range<u32> {
    let clamp = |v: f64| v.round().clamp(0.0, f64::from(limit)) as u32;
    clamp(from)..clamp(to)
}

/// Encode as baseline JPEG. Alpha is dropped.
///
/// # Errors
///
/// Returns a [`RenderError::Encode`] if the encoder fails.
pub fn encode_jpeg(image: RgbaImage, quality: u8) -> Result<Vec<u8>, RenderError> {
    let rgb = DynamicImage::ImageRgba8(image).into_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality).write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)?;
    Ok(out.into_inner())
}
