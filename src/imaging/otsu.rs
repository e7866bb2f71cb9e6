//! Global Otsu level for ink/paper separation.

/// Picks the gray level that best splits `pixels` into a dark class
/// (`value <= level`) and a light class, scoring each split by
/// `w_dark * w_light * (mean_dark - mean_light)^2`.
///
/// Returns 0 for an empty sample and for one holding a single gray value,
/// since neither has a split to choose. Ties keep the lowest level.
pub fn otsu_threshold(pixels: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &value in pixels {
        histogram[usize::from(value)] += 1;
    }

    let occupied = histogram.iter().filter(|&&count| count > 0).count();
    if occupied < 2 {
        return 0;
    }

    let total = pixels.len() as f64;
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut dark_count = 0u64;
    let mut dark_weighted = 0f64;
    let mut best = (0u8, 0f64);
    for (level, &count) in histogram.iter().enumerate().take(255) {
        dark_count += count;
        dark_weighted += level as f64 * count as f64;
        if dark_count == 0 {
            continue;
        }
        let light_count = total - dark_count as f64;
        if light_count == 0.0 {
            break;
        }
        let gap = dark_weighted / dark_count as f64 - (weighted_total - dark_weighted) / light_count;
        let spread = dark_count as f64 * light_count * gap * gap;
        if spread > best.1 {
            best = (level as u8, spread);
        }
    }
    best.0
}
