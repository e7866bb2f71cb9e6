//! Contrast-limited adaptive histogram equalization.
//!
//! The image is split into a `tiles x tiles` grid; each tile gets a clipped,
//! redistributed histogram and its own lookup table, and every pixel is mapped
//! by bilinear interpolation between the four nearest tile tables.

use image::{GrayImage, Luma};

/// Equalizes `gray` tile by tile.
///
/// `clip_limit` is relative to a flat histogram (2.0 lets a bin hold twice the
/// uniform share before it is clipped); zero or less disables clipping.
pub fn clahe(gray: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(tiles.clamp(1, width));
    let tile_h = height.div_ceil(tiles.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            luts.push(tile_lut(&mut histogram, (x1 - x0) * (y1 - y0), clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        let (ty0, ty1, wy) = tile_neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx0, tx1, wx) = tile_neighbours(x, tile_w, tiles_x);
            let v = gray.get_pixel(x, y)[0] as usize;

            let top = lut_at(tx0, ty0)[v] as f32 * (1.0 - wx) + lut_at(tx1, ty0)[v] as f32 * wx;
            let bottom = lut_at(tx0, ty1)[v] as f32 * (1.0 - wx) + lut_at(tx1, ty1)[v] as f32 * wx;
            let value = top * (1.0 - wy) + bottom * wy;

            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

/// Lower/upper tile index along one axis and the weight of the upper one.
fn tile_neighbours(pos: u32, tile: u32, count: u32) -> (u32, u32, f32) {
    let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
    let lo = (f.floor().max(0.0) as u32).min(count - 1);
    let hi = (lo + 1).min(count - 1);
    let weight = if hi == lo { 0.0 } else { (f - lo as f32).clamp(0.0, 1.0) };
    (lo, hi, weight)
}

fn tile_lut(histogram: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut clipped = 0u32;
        for bin in histogram.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }

        let batch = clipped / 256;
        let residual = (clipped % 256) as usize;
        for bin in histogram.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1);
            for bin in histogram.iter_mut().step_by(step).take(residual) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (value, &count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[value] = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}
