//! Region cropping and local thresholding on the canonical image.

use image::{GrayImage, imageops};
use serde::Serialize;

use crate::imaging::{ImagingError, otsu_threshold, threshold_ink};
use crate::template::Bubble;

/// Pixel box with exclusive right/bottom edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    fn clipped(self, width: u32, height: u32) -> Self {
        let x1 = self.x1.min(width);
        let y1 = self.y1.min(height);
        Self {
            x0: self.x0.min(x1),
            y0: self.y0.min(y1),
            x1,
            y1,
        }
    }
}

/// Box covering every bubble disc, padded by the largest radius on all
/// sides and clipped to a `width x height` image.
pub fn bubble_bounds(bubbles: &[Bubble], width: u32, height: u32) -> PixelRect {
    if bubbles.is_empty() {
        return PixelRect::default();
    }

    let max_r = bubbles.iter().map(|b| b.radius).fold(0.0f32, f32::max);
    let min_x = bubbles.iter().map(|b| b.position.0).fold(f32::INFINITY, f32::min);
    let max_x = bubbles.iter().map(|b| b.position.0).fold(f32::NEG_INFINITY, f32::max);
    let min_y = bubbles.iter().map(|b| b.position.1).fold(f32::INFINITY, f32::min);
    let max_y = bubbles.iter().map(|b| b.position.1).fold(f32::NEG_INFINITY, f32::max);

    let clamp = |v: f32, limit: u32| (v.trunc() as i64).clamp(0, limit as i64) as u32;
    PixelRect {
        x0: clamp(min_x - max_r, width),
        y0: clamp(min_y - max_r, height),
        x1: clamp(max_x + max_r, width),
        y1: clamp(max_y + max_r, height),
    }
}

/// Ink mask of one region. `origin` is the top-left of the crop in the
/// source image; mask pixels are 255 for ink and 0 for paper.
#[derive(Debug, Clone)]
pub struct RegionMask {
    pub mask: GrayImage,
    pub origin: (u32, u32),
    pub threshold: u8,
}

impl RegionMask {
    pub fn is_empty(&self) -> bool {
        self.mask.width() == 0 || self.mask.height() == 0
    }
}

/// Crops `rect` out of `gray` and binarizes it at the crop's own Otsu level.
/// An empty rectangle yields an empty mask.
pub fn threshold_region(gray: &GrayImage, rect: PixelRect) -> Result<RegionMask, ImagingError> {
    let rect = rect.clipped(gray.width(), gray.height());
    let origin = (rect.x0, rect.y0);
    if rect.is_empty() {
        return Ok(RegionMask {
            mask: GrayImage::new(0, 0),
            origin,
            threshold: 0,
        });
    }

    let crop = imageops::crop_imm(gray, rect.x0, rect.y0, rect.width(), rect.height()).to_image();
    let threshold = otsu_threshold(crop.as_raw());
    let mask = threshold_ink(&crop, threshold)?;
    Ok(RegionMask {
        mask,
        origin,
        threshold,
    })
}
