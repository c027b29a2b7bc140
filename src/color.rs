//! Dominant color extraction and color naming for the info label.
//!
//! Counts exact RGB triples (alpha is dropped, the same as converting to a
//! 24-bit RGB buffer first) and returns the most frequent one.  Ties go to the
//! color that appears first in raster order (row by row, left to right), so
//! the result never depends on hash iteration order.

use std::collections::HashMap;
use std::fmt;

use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("image has no pixels")]
    EmptyImage,
}

/// A 24-bit color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb`, lowercase.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Name of the closest CSS basic color (squared RGB distance).
    pub fn nearest_name(self) -> &'static str {
        let mut best = BASIC_COLORS[0];
        let mut best_dist = u32::MAX;
        for entry in BASIC_COLORS {
            let d = self.distance_sq(entry.1);
            if d < best_dist {
                best = entry;
                best_dist = d;
            }
        }
        best.0
    }

    fn distance_sq(self, other: Rgb) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Rgb> for egui::Color32 {
    fn from(c: Rgb) -> Self {
        egui::Color32::from_rgb(c.r, c.g, c.b)
    }
}

/// The 16 CSS 2.1 basic color keywords.
const BASIC_COLORS: [(&str, Rgb); 16] = [
    ("black", Rgb::new(0, 0, 0)),
    ("silver", Rgb::new(192, 192, 192)),
    ("gray", Rgb::new(128, 128, 128)),
    ("white", Rgb::new(255, 255, 255)),
    ("maroon", Rgb::new(128, 0, 0)),
    ("red", Rgb::new(255, 0, 0)),
    ("purple", Rgb::new(128, 0, 128)),
    ("fuchsia", Rgb::new(255, 0, 255)),
    ("green", Rgb::new(0, 128, 0)),
    ("lime", Rgb::new(0, 255, 0)),
    ("olive", Rgb::new(128, 128, 0)),
    ("yellow", Rgb::new(255, 255, 0)),
    ("navy", Rgb::new(0, 0, 128)),
    ("blue", Rgb::new(0, 0, 255)),
    ("teal", Rgb::new(0, 128, 128)),
    ("aqua", Rgb::new(0, 255, 255)),
];

/// Most frequent RGB triple in `image`.
pub fn dominant_color(image: &RgbaImage) -> Result<Rgb, ColorError> {
    most_frequent(image.pixels().map(|px| Rgb::new(px[0], px[1], px[2])))
}

fn most_frequent(pixels: impl Iterator<Item = Rgb>) -> Result<Rgb, ColorError> {
    // Distinct colors in first-seen order, with an index into it for counting.
    let mut seen: Vec<(Rgb, u32)> = Vec::new();
    let mut index: HashMap<Rgb, usize> = HashMap::new();

    for rgb in pixels {
        match index.get(&rgb) {
            Some(&i) => seen[i].1 += 1,
            None => {
                index.insert(rgb, seen.len());
                seen.push((rgb, 1));
            }
        }
    }

    let mut best: Option<(Rgb, u32)> = None;
    for &(rgb, count) in &seen {
        // Strictly greater keeps the earliest color on ties.
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((rgb, count));
        }
    }
    best.map(|(rgb, _)| rgb).ok_or(ColorError::EmptyImage)
}

/// Size and dominant color of one decoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub dominant: Rgb,
}

impl ImageInfo {
    pub fn from_image(image: &RgbaImage) -> Result<Self, ColorError> {
        Ok(Self {
            width: image.width(),
            height: image.height(),
            dominant: dominant_color(image)?,
        })
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Size: {}x{} pixels | Color: {} ({})",
            self.width,
            self.height,
            self.dominant.to_hex(),
            self.dominant.nearest_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn majority_color_beats_single_outlier() {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]));
        img.put_pixel(3, 5, Rgba([0, 0, 0, 255]));
        assert_eq!(dominant_color(&img), Ok(Rgb::new(10, 20, 30)));
    }

    #[test]
    fn single_pixel_image() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        assert_eq!(dominant_color(&img), Ok(Rgb::new(255, 0, 0)));
    }

    #[test]
    fn empty_image_is_an_error() {
        let img = RgbaImage::new(0, 0);
        assert_eq!(dominant_color(&img), Err(ColorError::EmptyImage));
    }

    #[test]
    fn ties_go_to_first_color_in_scan_order() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([9, 9, 9, 255]));
        img.put_pixel(1, 0, Rgba([1, 1, 1, 255]));
        img.put_pixel(0, 1, Rgba([1, 1, 1, 255]));
        img.put_pixel(1, 1, Rgba([9, 9, 9, 255]));
        assert_eq!(dominant_color(&img), Ok(Rgb::new(9, 9, 9)));
    }

    #[test]
    fn alpha_is_ignored_when_counting() {
        let mut img = RgbaImage::from_pixel(3, 1, Rgba([5, 6, 7, 0]));
        img.put_pixel(2, 0, Rgba([5, 6, 7, 255]));
        assert_eq!(dominant_color(&img), Ok(Rgb::new(5, 6, 7)));
    }

    #[test]
    fn hex_and_names() {
        assert_eq!(Rgb::new(255, 0, 16).to_hex(), "#ff0010");
        assert_eq!(Rgb::new(250, 5, 5).nearest_name(), "red");
        assert_eq!(Rgb::new(20, 20, 20).nearest_name(), "black");
        assert_eq!(Rgb::new(0, 120, 130).nearest_name(), "teal");
    }

    #[test]
    fn info_line() {
        let img = RgbaImage::from_pixel(72, 36, Rgba([255, 255, 255, 255]));
        let info = ImageInfo::from_image(&img).unwrap();
        assert_eq!(
            info.to_string(),
            "Size: 72x36 pixels | Color: #ffffff (white)"
        );
    }
}
