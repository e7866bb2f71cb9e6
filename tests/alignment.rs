use image::{DynamicImage, Rgb, RgbImage};
use omr_sheet_reader::marker::DetectedMarker;
use omr_sheet_reader::rectify::homography::Homography;
use omr_sheet_reader::rectify::ransac::RansacConfig;
use omr_sheet_reader::rectify::{WarpInterpolation, estimate_alignment, warp_to_canonical};
use omr_sheet_reader::template::Marker;
use omr_sheet_reader::GraderConfig;

use nalgebra::Matrix3;

fn keystone() -> Homography {
    Homography::from_matrix(Matrix3::new(
        0.92, 0.04, 35.0, //
        -0.03, 0.95, 22.0, //
        2.0e-5, -1.5e-5, 1.0,
    ))
}

fn canonical_layout() -> Vec<(f64, f64)> {
    vec![
        (75.0, 75.0),
        (1240.0, 75.0),
        (2405.0, 75.0),
        (75.0, 1754.0),
        (2405.0, 1754.0),
        (75.0, 3433.0),
        (2405.0, 3433.0),
    ]
}

/// Markers as they would be detected in a photo taken through `to_photo`.
fn observed(to_photo: &Homography, layout: &[(f64, f64)]) -> (Vec<DetectedMarker>, Vec<Marker>) {
    let mut detected = Vec::new();
    let mut template = Vec::new();
    for (id, &p) in layout.iter().enumerate() {
        let (x, y) = to_photo.project(p).expect("layout stays in front of the camera");
        detected.push(DetectedMarker {
            id: id as u32,
            position: (x as f32, y as f32),
            corners: [(x as f32, y as f32); 4],
            rotation: 0,
            bit_errors: 0,
        });
        template.push(Marker {
            id: id as u32,
            position: (p.0 as f32, p.1 as f32),
            size: 50.0,
        });
    }
    (detected, template)
}

#[test]
fn noise_free_markers_recover_the_mapping() {
    let to_photo = keystone();
    let layout = canonical_layout();
    let (detected, template) = observed(&to_photo, &layout);

    let alignment =
        estimate_alignment(&detected, &template, &RansacConfig::default()).expect("aligns");
    assert_eq!(alignment.inliers.len(), layout.len());
    assert!(alignment.rms_px < 0.05, "rms {}", alignment.rms_px);

    for (m, &p) in detected.iter().zip(&layout) {
        let back = alignment
            .homography
            .project((m.position.0 as f64, m.position.1 as f64))
            .expect("finite");
        assert!((back.0 - p.0).abs() < 0.1 && (back.1 - p.1).abs() < 0.1, "{back:?} vs {p:?}");
    }

    // Pages outside the marker hull map consistently too.
    let photo_corner = to_photo.project((2481.0, 3508.0)).expect("finite");
    let canonical = alignment.homography.project(photo_corner).expect("finite");
    assert!((canonical.0 - 2481.0).abs() < 0.5 && (canonical.1 - 3508.0).abs() < 0.5);
}

#[test]
fn one_displaced_marker_is_rejected() {
    let layout = canonical_layout();
    let (mut detected, template) = observed(&keystone(), &layout);
    detected[3].position.0 += 120.0;
    detected[3].position.1 -= 60.0;

    let alignment =
        estimate_alignment(&detected, &template, &RansacConfig::default()).expect("aligns");
    assert_eq!(alignment.inliers, vec![0, 1, 2, 4, 5, 6]);
    assert!(alignment.rms_px < 0.05);
}

#[test]
fn identity_warp_reproduces_the_input() {
    let mut source = RgbImage::from_pixel(64, 48, Rgb([250, 250, 250]));
    for y in 10..20 {
        for x in 5..40 {
            source.put_pixel(x, y, Rgb([(x * 6) as u8, 0, (y * 10) as u8]));
        }
    }
    // The far column and row must survive too.
    for y in 0..48 {
        source.put_pixel(63, y, Rgb([10, 200, (y * 5) as u8]));
    }
    for x in 0..64 {
        source.put_pixel(x, 47, Rgb([(x * 3) as u8, 90, 30]));
    }

    let default_mode = GraderConfig::default().interpolation;
    for interpolation in [default_mode, WarpInterpolation::Bilinear, WarpInterpolation::Nearest] {
        let warped = warp_to_canonical(
            &DynamicImage::ImageRgb8(source.clone()),
            &Homography::identity(),
            (64, 48),
            interpolation,
        )
        .expect("identity is invertible");
        let differing = warped
            .enumerate_pixels()
            .filter(|&(x, y, p)| p != source.get_pixel(x, y))
            .count();
        assert_eq!(differing, 0, "{interpolation:?} changed {differing} pixels");
    }
}

#[test]
fn warp_fills_unmapped_pixels_with_black() {
    let source = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
    let shift = Homography::from_matrix(Matrix3::new(
        1.0, 0.0, 10.0, //
        0.0, 1.0, 0.0, //
        0.0, 0.0, 1.0,
    ));
    let warped = warp_to_canonical(
        &DynamicImage::ImageRgb8(source),
        &shift,
        (20, 20),
        WarpInterpolation::Nearest,
    )
    .expect("translation is invertible");
    assert_eq!(*warped.get_pixel(2, 10), Rgb([0, 0, 0]));
    assert_eq!(*warped.get_pixel(15, 10), Rgb([255, 255, 255]));
}
