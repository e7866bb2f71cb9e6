//! Maps a photographed sheet into canonical template coordinates.
//!
//! Detected markers are paired with template markers by id, a homography is
//! fitted robustly over the pairs, and the photograph is warped into the
//! template's page size.

pub mod homography;
pub mod ransac;

use std::collections::BTreeMap;

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use serde::{Deserialize, Serialize};

use crate::marker::DetectedMarker;
use crate::template::Marker;
use homography::{Homography, Point, collinear};
use ransac::{Estimator, RansacConfig, ransac};

pub const MIN_CORRESPONDENCES: usize = 4;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlignmentError {
    #[error("found {found} marker correspondences, at least {MIN_CORRESPONDENCES} are required")]
    TooFewCorrespondences { found: usize },

    #[error("no consistent homography among {correspondences} marker correspondences")]
    NoConsensus { correspondences: usize },

    #[error("estimated homography cannot be inverted")]
    Singular,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarpInterpolation {
    Nearest,
    #[default]
    Bilinear,
}

impl From<WarpInterpolation> for Interpolation {
    fn from(value: WarpInterpolation) -> Self {
        match value {
            WarpInterpolation::Nearest => Interpolation::Nearest,
            WarpInterpolation::Bilinear => Interpolation::Bilinear,
        }
    }
}

/// One marker seen in the photograph and placed in the template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Correspondence {
    pub id: u32,
    pub detected: Point,
    pub canonical: Point,
}

#[derive(Debug, Clone)]
pub struct Alignment {
    /// Raw image pixels to canonical pixels.
    pub homography: Homography,
    pub correspondences: Vec<Correspondence>,
    /// Indices into `correspondences`.
    pub inliers: Vec<usize>,
    pub rms_px: f64,
}

#[derive(Debug, Clone)]
pub struct Rectified {
    pub image: RgbImage,
    pub alignment: Alignment,
}

/// Pairs detections with template markers by id. A duplicated id keeps the
/// detection with fewer corrected bits.
pub fn match_markers(detected: &[DetectedMarker], template: &[Marker]) -> Vec<Correspondence> {
    let mut best: BTreeMap<u32, &DetectedMarker> = BTreeMap::new();
    for marker in detected {
        match best.get(&marker.id) {
            Some(kept) => {
                tracing::warn!(id = marker.id, "marker id detected more than once");
                if marker.bit_errors < kept.bit_errors {
                    best.insert(marker.id, marker);
                }
            }
            None => {
                best.insert(marker.id, marker);
            }
        }
    }

    template
        .iter()
        .filter_map(|t| {
            best.get(&t.id).map(|d| Correspondence {
                id: t.id,
                detected: (d.position.0 as f64, d.position.1 as f64),
                canonical: (t.position.0 as f64, t.position.1 as f64),
            })
        })
        .collect()
}

struct MarkerHomography;

impl Estimator for MarkerHomography {
    type Datum = Correspondence;
    type Model = Homography;

    const MIN_SAMPLES: usize = 4;

    fn fit(data: &[Correspondence], sample: &[usize]) -> Option<Homography> {
        Self::refit(data, sample)
    }

    fn residual(model: &Homography, datum: &Correspondence) -> f64 {
        model.transfer_error(datum.detected, datum.canonical)
    }

    fn is_degenerate(data: &[Correspondence], sample: &[usize]) -> bool {
        let detected: Vec<Point> = sample.iter().map(|&i| data[i].detected).collect();
        let canonical: Vec<Point> = sample.iter().map(|&i| data[i].canonical).collect();
        any_three_collinear(&detected) || any_three_collinear(&canonical)
    }

    fn refit(data: &[Correspondence], inliers: &[usize]) -> Option<Homography> {
        let src: Vec<Point> = inliers.iter().map(|&i| data[i].detected).collect();
        let dst: Vec<Point> = inliers.iter().map(|&i| data[i].canonical).collect();
        Homography::estimate(&src, &dst).ok()
    }
}

fn any_three_collinear(points: &[Point]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                if collinear(points[i], points[j], points[k]) {
                    return true;
                }
            }
        }
    }
    false
}

/// Robust raw-to-canonical homography from id-matched markers.
pub fn estimate_alignment(
    detected: &[DetectedMarker],
    template: &[Marker],
    config: &RansacConfig,
) -> Result<Alignment, AlignmentError> {
    let correspondences = match_markers(detected, template);
    if correspondences.len() < MIN_CORRESPONDENCES {
        return Err(AlignmentError::TooFewCorrespondences {
            found: correspondences.len(),
        });
    }

    let outcome = ransac::<MarkerHomography>(&correspondences, config).ok_or(
        AlignmentError::NoConsensus {
            correspondences: correspondences.len(),
        },
    )?;

    let outliers = correspondences.len() - outcome.inliers.len();
    if outliers > 0 {
        tracing::warn!(outliers, "markers rejected as outliers");
    }
    tracing::debug!(
        correspondences = correspondences.len(),
        inliers = outcome.inliers.len(),
        rms_px = outcome.inlier_rms,
        iterations = outcome.iterations,
        "homography estimated"
    );

    Ok(Alignment {
        homography: outcome.model,
        correspondences,
        inliers: outcome.inliers,
        rms_px: outcome.inlier_rms,
    })
}

/// Resamples `source` into a `size` canvas through `homography`
/// (source to canvas). Pixels mapping outside the source are black.
pub fn warp_to_canonical(
    source: &DynamicImage,
    homography: &Homography,
    size: (u32, u32),
    interpolation: WarpInterpolation,
) -> Result<RgbImage, AlignmentError> {
    let projection =
        Projection::from_matrix(homography.to_row_major_f32()).ok_or(AlignmentError::Singular)?;
    let mut canvas = RgbImage::new(size.0, size.1);
    let rgb = source.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Ok(canvas);
    }
    let rgb = match interpolation {
        WarpInterpolation::Bilinear => replicate_far_edges(&rgb),
        WarpInterpolation::Nearest => rgb,
    };
    warp_into(&rgb, &projection, interpolation.into(), Rgb([0, 0, 0]), &mut canvas);
    Ok(canvas)
}

/// Repeats the last column and row once so every source pixel has the right
/// and lower neighbour the bilinear sampler reads.
fn replicate_far_edges(rgb: &RgbImage) -> RgbImage {
    let (w, h) = rgb.dimensions();
    RgbImage::from_fn(w + 1, h + 1, |x, y| *rgb.get_pixel(x.min(w - 1), y.min(h - 1)))
}

/// Estimates the alignment and warps `source` into a `page_size` canvas.
pub fn rectify(
    source: &DynamicImage,
    detected: &[DetectedMarker],
    template: &[Marker],
    page_size: (u32, u32),
    ransac_config: &RansacConfig,
    interpolation: WarpInterpolation,
) -> Result<Rectified, AlignmentError> {
    let alignment = estimate_alignment(detected, template, ransac_config)?;
    let image = warp_to_canonical(source, &alignment.homography, page_size, interpolation)?;
    Ok(Rectified { image, alignment })
}
