//! Dominant-color extraction for artwork.
//!
//! The primary path shrinks the artwork to a thumbnail, builds an
//! [`PALETTE_SIZE`]-entry palette with median cut, maps every pixel to its
//! nearest palette entry and returns the most populated entry. When no
//! palette can be built (e.g. a fully transparent image) the fallback averages
//! the pixels that are neither near-black nor near-white.

use std::fmt;

use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

pub const THUMBNAIL_EDGE: u32 = 100;
pub const PALETTE_SIZE: usize = 8;
/// Luma below this counts as letterboxing in the fallback average.
pub const DARK_LUMA_CUTOFF: f32 = 20.0;
/// Luma above this counts as paper-white background in the fallback average.
pub const LIGHT_LUMA_CUTOFF: f32 = 235.0;

const OPAQUE_ALPHA: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Sentinel for "unknown"; callers must not read it as a real color.
    pub const BLACK: Self = Self(0, 0, 0);

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn luma(self) -> f32 {
        0.299 * f32::from(self.0) + 0.587 * f32::from(self.1) + 0.114 * f32::from(self.2)
    }

    fn distance_sq(self, other: Self) -> u32 {
        let d = |a: u8, b: u8| {
            let v = i32::from(a) - i32::from(b);
            (v * v) as u32
        };
        d(self.0, other.0) + d(self.1, other.1) + d(self.2, other.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Rgba<u8>> for Rgb {
    fn from(px: Rgba<u8>) -> Self {
        Self(px[0], px[1], px[2])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub color: Rgb,
    pub count: usize,
}

pub fn dominant_color(img: &DynamicImage) -> Rgb {
    let thumb = if img.width() > THUMBNAIL_EDGE || img.height() > THUMBNAIL_EDGE {
        img.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE).to_rgba8()
    } else {
        img.to_rgba8()
    };
    let palette = quantize(&thumb, PALETTE_SIZE);
    let winner = palette
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.count > 0)
        .max_by(|(ia, a), (ib, b)| a.count.cmp(&b.count).then(ib.cmp(ia)))
        .map(|(idx, _)| idx);
    match winner {
        Some(idx) => palette[idx].color,
        None => average_color_filtered(&thumb).unwrap_or(Rgb::BLACK),
    }
}

/// Median-cut palette with per-entry pixel counts after nearest-entry mapping.
///
/// Returns an empty palette when the image has no opaque pixels.
pub fn quantize(img: &RgbaImage, colors: usize) -> Vec<PaletteEntry> {
    let pixels: Vec<Rgb> = opaque_pixels(img).collect();
    if pixels.is_empty() || colors == 0 {
        return Vec::new();
    }

    let mut boxes: Vec<Vec<Rgb>> = vec![pixels.clone()];
    while boxes.len() < colors {
        let Some((idx, channel)) = widest_box(&boxes) else {
            break;
        };
        let mut bucket = boxes.swap_remove(idx);
        bucket.sort_unstable_by_key(|px| channel_of(*px, channel));
        let upper = bucket.split_off(bucket.len() / 2);
        boxes.push(bucket);
        boxes.push(upper);
    }

    let mut palette: Vec<PaletteEntry> = boxes
        .iter()
        .map(|bucket| PaletteEntry {
            color: mean(bucket),
            count: 0,
        })
        .collect();

    for px in pixels {
        let nearest = palette
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.color.distance_sq(px))
            .map(|(idx, _)| idx);
        if let Some(idx) = nearest {
            palette[idx].count += 1;
        }
    }
    palette
}

/// Average of opaque pixels whose luma lies inside the dark/light cutoffs.
pub fn average_color_filtered(img: &RgbaImage) -> Option<Rgb> {
    let mut accum = [0u64; 3];
    let mut total = 0u64;
    for px in opaque_pixels(img) {
        let luma = px.luma();
        if !(DARK_LUMA_CUTOFF..=LIGHT_LUMA_CUTOFF).contains(&luma) {
            continue;
        }
        accum[0] += u64::from(px.0);
        accum[1] += u64::from(px.1);
        accum[2] += u64::from(px.2);
        total += 1;
    }
    if total == 0 {
        return None;
    }
    Some(Rgb(
        (accum[0] / total) as u8,
        (accum[1] / total) as u8,
        (accum[2] / total) as u8,
    ))
}

fn opaque_pixels(img: &RgbaImage) -> impl Iterator<Item = Rgb> + '_ {
    img.pixels()
        .filter(|px| px[3] >= OPAQUE_ALPHA)
        .map(|px| Rgb::from(*px))
}

fn channel_of(px: Rgb, channel: usize) -> u8 {
    match channel {
        0 => px.0,
        1 => px.1,
        _ => px.2,
    }
}

// Box with the largest single-channel spread, and that channel.
fn widest_box(boxes: &[Vec<Rgb>]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, u8)> = None;
    for (idx, bucket) in boxes.iter().enumerate() {
        if bucket.len() < 2 {
            continue;
        }
        for channel in 0..3 {
            let (min, max) = bucket.iter().fold((u8::MAX, u8::MIN), |(lo, hi), px| {
                let v = channel_of(*px, channel);
                (lo.min(v), hi.max(v))
            });
            let range = max - min;
            if range > 0 && best.is_none_or(|(_, _, r)| range > r) {
                best = Some((idx, channel, range));
            }
        }
    }
    best.map(|(idx, channel, _)| (idx, channel))
}

fn mean(bucket: &[Rgb]) -> Rgb {
    if bucket.is_empty() {
        return Rgb::BLACK;
    }
    let n = bucket.len() as u64;
    let sum = bucket.iter().fold([0u64; 3], |mut acc, px| {
        acc[0] += u64::from(px.0);
        acc[1] += u64::from(px.1);
        acc[2] += u64::from(px.2);
        acc
    });
    Rgb((sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_image(width: u32, height: u32, split_x: u32, left: [u8; 4], right: [u8; 4]) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            if x < split_x { Rgba(left) } else { Rgba(right) }
        })
    }

    #[test]
    fn majority_color_wins() {
        let img = split_image(100, 40, 70, [0, 0, 255, 255], [255, 0, 0, 255]);
        let color = dominant_color(&DynamicImage::ImageRgba8(img));
        assert_eq!(color, Rgb(0, 0, 255));
    }

    #[test]
    fn single_color_image_yields_that_color() {
        let img = RgbaImage::from_pixel(30, 30, Rgba([12, 200, 99, 255]));
        assert_eq!(dominant_color(&DynamicImage::ImageRgba8(img)), Rgb(12, 200, 99));
    }

    #[test]
    fn palette_counts_cover_every_opaque_pixel() {
        let img = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 128, 255]));
        let palette = quantize(&img, PALETTE_SIZE);
        assert_eq!(palette.len(), PALETTE_SIZE);
        assert_eq!(palette.iter().map(|e| e.count).sum::<usize>(), 256);
    }

    #[test]
    fn transparent_image_has_no_palette_and_falls_back_to_black() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 0]));
        assert!(quantize(&img, PALETTE_SIZE).is_empty());
        assert_eq!(dominant_color(&DynamicImage::ImageRgba8(img)), Rgb::BLACK);
    }

    #[test]
    fn fallback_average_ignores_letterbox_and_white() {
        let img = RgbaImage::from_fn(30, 1, |x, _| match x {
            0..=9 => Rgba([0, 0, 0, 255]),
            10..=19 => Rgba([255, 255, 255, 255]),
            _ => Rgba([100, 50, 150, 255]),
        });
        assert_eq!(average_color_filtered(&img), Some(Rgb(100, 50, 150)));

        let only_extremes = split_image(4, 1, 2, [0, 0, 0, 255], [250, 250, 250, 255]);
        assert_eq!(average_color_filtered(&only_extremes), None);
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(Rgb(255, 8, 0).to_hex(), "#ff0800");
    }
}
