//! Planar homography estimation via DLT with Hartley normalization.

use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};

pub type Point = (f64, f64);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HomographyError {
    #[error("need at least 4 point correspondences, got {0}")]
    NotEnoughPoints(usize),

    #[error("source and destination differ in length ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },

    #[error("degenerate point configuration")]
    Degenerate,
}

/// A 3x3 projective transform normalized so that `H[2,2] == 1` where possible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        let scale = m[(2, 2)];
        if scale.abs() > 1e-12 {
            Self(m / scale)
        } else {
            Self(m)
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Maps `p` through the transform; `None` for points sent to infinity.
    pub fn project(&self, p: Point) -> Option<Point> {
        let v = self.0 * Vector3::new(p.0, p.1, 1.0);
        if v[2].abs() < 1e-12 {
            return None;
        }
        Some((v[0] / v[2], v[1] / v[2]))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self::from_matrix)
    }

    /// Euclidean distance between `H * src` and `dst`.
    pub fn transfer_error(&self, src: Point, dst: Point) -> f64 {
        match self.project(src) {
            Some((x, y)) => ((x - dst.0).powi(2) + (y - dst.1).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }

    pub fn to_row_major_f32(&self) -> [f32; 9] {
        let m = &self.0;
        [
            m[(0, 0)] as f32,
            m[(0, 1)] as f32,
            m[(0, 2)] as f32,
            m[(1, 0)] as f32,
            m[(1, 1)] as f32,
            m[(1, 2)] as f32,
            m[(2, 0)] as f32,
            m[(2, 1)] as f32,
            m[(2, 2)] as f32,
        ]
    }

    /// Least-squares `H` with `dst ~ H * src` from four or more pairs.
    pub fn estimate(src: &[Point], dst: &[Point]) -> Result<Self, HomographyError> {
        if src.len() != dst.len() {
            return Err(HomographyError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        let n = src.len();
        if n < 4 {
            return Err(HomographyError::NotEnoughPoints(n));
        }

        let (t_src, src_n) = normalize_points(src);
        let (t_dst, dst_n) = normalize_points(dst);

        let mut a = DMatrix::<f64>::zeros(2 * n, 9);
        for i in 0..n {
            let (sx, sy) = src_n[i];
            let (dx, dy) = dst_n[i];

            a[(2 * i, 3)] = -sx;
            a[(2 * i, 4)] = -sy;
            a[(2 * i, 5)] = -1.0;
            a[(2 * i, 6)] = dy * sx;
            a[(2 * i, 7)] = dy * sy;
            a[(2 * i, 8)] = dy;

            a[(2 * i + 1, 0)] = sx;
            a[(2 * i + 1, 1)] = sy;
            a[(2 * i + 1, 2)] = 1.0;
            a[(2 * i + 1, 6)] = -dx * sx;
            a[(2 * i + 1, 7)] = -dx * sy;
            a[(2 * i + 1, 8)] = -dx;
        }

        // Null vector of A from the 9x9 normal matrix; a thin SVD of an 8x9
        // system would drop it.
        let ata = a.transpose() * &a;
        let eig = SymmetricEigen::new(ata);
        let mut min_idx = 0;
        for i in 1..eig.eigenvalues.len() {
            if eig.eigenvalues[i] < eig.eigenvalues[min_idx] {
                min_idx = i;
            }
        }
        let h = eig.eigenvectors.column(min_idx);
        let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        let t_dst_inv = t_dst.try_inverse().ok_or(HomographyError::Degenerate)?;
        let m = t_dst_inv * h_norm * t_src;
        if !m.iter().all(|v| v.is_finite()) || m.determinant().abs() < 1e-12 {
            return Err(HomographyError::Degenerate);
        }

        Ok(Self::from_matrix(m))
    }
}

/// Translates the centroid to the origin and scales the mean distance to sqrt(2).
fn normalize_points(pts: &[Point]) -> (Matrix3<f64>, Vec<Point>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| (s * (p.0 - cx), s * (p.1 - cy))).collect();
    (t, normalized)
}

/// True when three points are (nearly) collinear relative to their spread.
pub fn collinear(a: Point, b: Point, c: Point) -> bool {
    let cross = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
    let scale = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2))
        .max((c.0 - a.0).powi(2) + (c.1 - a.1).powi(2))
        .max(1e-12);
    cross.abs() / scale < 1e-6
}
