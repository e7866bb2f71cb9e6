//! Ink coverage of bubble discs inside a thresholded region.

use serde::Serialize;

use crate::region::RegionMask;
use crate::template::Bubble;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleReading {
    /// Position of the bubble within its question or column.
    pub index: usize,
    pub ink_count: u32,
    pub filled: bool,
}

/// Ink pixels of `region` under the disc of `bubble`.
///
/// The disc is centered at the bubble position relative to the region origin
/// (truncated to whole pixels) with the radius truncated likewise; a pixel is
/// inside when `dx² + dy² <= r²`. Parts of the disc outside the mask count
/// as paper.
pub fn ink_count(region: &RegionMask, bubble: &Bubble) -> u32 {
    if region.is_empty() {
        return 0;
    }

    let cx = (bubble.position.0 - region.origin.0 as f32).trunc() as i64;
    let cy = (bubble.position.1 - region.origin.1 as f32).trunc() as i64;
    let r = bubble.radius.trunc().max(0.0) as i64;
    let (width, height) = (region.mask.width() as i64, region.mask.height() as i64);

    let mut count = 0u32;
    for y in (cy - r).max(0)..=(cy + r).min(height - 1) {
        let dy = y - cy;
        for x in (cx - r).max(0)..=(cx + r).min(width - 1) {
            let dx = x - cx;
            if dx * dx + dy * dy <= r * r && region.mask.get_pixel(x as u32, y as u32)[0] != 0 {
                count += 1;
            }
        }
    }
    count
}

/// Measures every bubble; a bubble is filled when its ink count reaches `min_pixels`.
pub fn classify_bubbles(region: &RegionMask, bubbles: &[Bubble], min_pixels: u32) -> Vec<BubbleReading> {
    bubbles
        .iter()
        .enumerate()
        .map(|(index, bubble)| {
            let ink = ink_count(region, bubble);
            BubbleReading {
                index,
                ink_count: ink,
                filled: ink >= min_pixels,
            }
        })
        .collect()
}

pub fn filled_indices(readings: &[BubbleReading]) -> Vec<usize> {
    readings.iter().filter(|r| r.filled).map(|r| r.index).collect()
}

/// The filled bubble with the most ink; the earliest one wins a tie.
pub fn strongest_filled(readings: &[BubbleReading]) -> Option<&BubbleReading> {
    readings
        .iter()
        .filter(|r| r.filled)
        .fold(None, |best: Option<&BubbleReading>, r| match best {
            Some(b) if b.ink_count >= r.ink_count => Some(b),
            _ => Some(r),
        })
}
