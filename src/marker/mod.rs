//! Fiducial marker detection on raw sheet photographs.

mod candidates;
pub mod dictionary;

use image::{DynamicImage, GrayImage};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};

use crate::imaging::{ImagingError, clahe, otsu_threshold, threshold_ink, to_gray};
use crate::rectify::homography::Homography;
use candidates::{Candidate, find_candidates};
pub use dictionary::{CodeMatch, MARKER_CELLS, MarkerDictionary, render_marker};

const BLUR_SIGMA: f32 = 1.1;
const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_TILES: u32 = 8;
const MIN_SIDE_PX: u32 = 16;
const MAX_SIDE_FRACTION: f32 = 0.3;
const MAX_ASPECT: f32 = 2.5;
const MIN_FILL_RATIO: f32 = 0.35;
const MAX_FILL_RATIO: f32 = 1.3;
const MAX_BORDER_ERRORS: u32 = 0;
const MAX_BIT_ERRORS: u32 = 1;

/// Parameters of the marker detector.
///
/// Side lengths are in raw image pixels. The fill ratio compares the dark
/// pixel count of a component with the area of its corner quad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub blur_sigma: f32,
    pub clahe_clip_limit: f32,
    pub clahe_tiles: u32,
    pub min_side_px: u32,
    pub max_side_fraction: f32,
    pub max_aspect: f32,
    pub min_fill_ratio: f32,
    pub max_fill_ratio: f32,
    pub max_border_errors: u32,
    pub max_bit_errors: u32,
    pub dictionary: MarkerDictionary,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            blur_sigma: BLUR_SIGMA,
            clahe_clip_limit: CLAHE_CLIP_LIMIT,
            clahe_tiles: CLAHE_TILES,
            min_side_px: MIN_SIDE_PX,
            max_side_fraction: MAX_SIDE_FRACTION,
            max_aspect: MAX_ASPECT,
            min_fill_ratio: MIN_FILL_RATIO,
            max_fill_ratio: MAX_FILL_RATIO,
            max_border_errors: MAX_BORDER_ERRORS,
            max_bit_errors: MAX_BIT_ERRORS,
            dictionary: MarkerDictionary::default(),
        }
    }
}

/// A decoded marker in raw image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedMarker {
    pub id: u32,
    /// Intersection of the quad diagonals.
    pub position: (f32, f32),
    /// Outer corners in image order: top-left, top-right, bottom-right, bottom-left.
    pub corners: [(f32, f32); 4],
    pub rotation: u8,
    pub bit_errors: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error(transparent)]
    Imaging(#[from] ImagingError),
}

/// Blur then CLAHE, the normalization applied before binarizing for markers.
pub fn normalize_lighting(gray: &GrayImage, config: &MarkerConfig) -> GrayImage {
    let blurred = if config.blur_sigma > 0.0 {
        gaussian_blur_f32(gray, config.blur_sigma)
    } else {
        gray.clone()
    };
    clahe(&blurred, config.clahe_clip_limit, config.clahe_tiles)
}

/// Finds every dictionary marker in `source`. No markers is not an error.
pub fn detect_markers(
    source: &DynamicImage,
    config: &MarkerConfig,
) -> Result<Vec<DetectedMarker>, DetectionError> {
    let gray = to_gray(source)?;
    detect_markers_gray(&gray, config)
}

pub fn detect_markers_gray(
    gray: &GrayImage,
    config: &MarkerConfig,
) -> Result<Vec<DetectedMarker>, DetectionError> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }

    let equalized = normalize_lighting(gray, config);
    let level = otsu_threshold(equalized.as_raw());
    let mask = threshold_ink(&equalized, level)?;

    let candidates = find_candidates(mask.as_raw(), width as usize, height as usize, config);
    tracing::debug!(candidates = candidates.len(), level, "marker candidates");

    let mut markers: Vec<DetectedMarker> = candidates
        .iter()
        .filter_map(|c| decode_candidate(&mask, c, config))
        .collect();
    markers.sort_by(|a, b| a.id.cmp(&b.id).then(a.bit_errors.cmp(&b.bit_errors)));
    tracing::debug!(markers = markers.len(), "markers decoded");

    Ok(markers)
}

fn decode_candidate(mask: &GrayImage, candidate: &Candidate, config: &MarkerConfig) -> Option<DetectedMarker> {
    let cells = sample_cells(mask, &candidate.corners)?;

    let last = MARKER_CELLS - 1;
    let mut border_errors = 0u32;
    let mut payload = 0u16;
    for (row, line) in cells.iter().enumerate() {
        for (col, &dark) in line.iter().enumerate() {
            if row == 0 || col == 0 || row == last || col == last {
                if !dark {
                    border_errors += 1;
                }
            } else if !dark {
                let bit = (row - 1) * dictionary::PAYLOAD_SIDE + (col - 1);
                payload |= 1 << (15 - bit);
            }
        }
    }
    if border_errors > config.max_border_errors {
        return None;
    }

    let found = config.dictionary.decode(payload, config.max_bit_errors)?;
    let position = diagonal_intersection(&candidate.corners);
    tracing::trace!(
        id = found.id,
        bit_errors = found.bit_errors,
        pixels = candidate.pixel_count,
        area = candidate.area,
        "marker"
    );

    Some(DetectedMarker {
        id: found.id,
        position: (position.0 as f32, position.1 as f32),
        corners: candidate.corners.map(|(x, y)| (x as f32, y as f32)),
        rotation: found.rotation,
        bit_errors: found.bit_errors,
    })
}

/// Majority vote of ink in a small window around each of the 6x6 cell centers.
fn sample_cells(mask: &GrayImage, corners: &[(f64, f64); 4]) -> Option<[[bool; MARKER_CELLS]; MARKER_CELLS]> {
    let n = MARKER_CELLS as f64;
    let grid = [(0.0, 0.0), (n, 0.0), (n, n), (0.0, n)];
    let to_image = Homography::estimate(&grid, corners).ok()?;

    let cell_px = candidates::quad_area(corners).sqrt() / n;
    let half = ((cell_px * 0.2).round() as i64).max(1);
    let (width, height) = (mask.width() as i64, mask.height() as i64);

    let mut cells = [[false; MARKER_CELLS]; MARKER_CELLS];
    for (row, line) in cells.iter_mut().enumerate() {
        for (col, cell) in line.iter_mut().enumerate() {
            let (cx, cy) = to_image.project((col as f64 + 0.5, row as f64 + 0.5))?;
            let (cx, cy) = (cx.round() as i64, cy.round() as i64);

            let mut dark = 0u32;
            let mut total = 0u32;
            for y in (cy - half).max(0)..=(cy + half).min(height - 1) {
                for x in (cx - half).max(0)..=(cx + half).min(width - 1) {
                    total += 1;
                    if mask.get_pixel(x as u32, y as u32)[0] != 0 {
                        dark += 1;
                    }
                }
            }
            *cell = total > 0 && dark * 2 > total;
        }
    }
    Some(cells)
}

fn diagonal_intersection(q: &[(f64, f64); 4]) -> (f64, f64) {
    let (p, r) = (q[0], (q[2].0 - q[0].0, q[2].1 - q[0].1));
    let (s, d) = (q[1], (q[3].0 - q[1].0, q[3].1 - q[1].1));
    let denom = r.0 * d.1 - r.1 * d.0;
    if denom.abs() < 1e-9 {
        let cx = q.iter().map(|c| c.0).sum::<f64>() / 4.0;
        let cy = q.iter().map(|c| c.1).sum::<f64>() / 4.0;
        return (cx, cy);
    }
    let t = ((s.0 - p.0) * d.1 - (s.1 - p.1) * d.0) / denom;
    (p.0 + t * r.0, p.1 + t * r.1)
}
