//! Plane-to-plane homographies.
//!
//! - [`Homography::fit_dlt`]: direct linear transform with Hartley normalization (>= 4 pairs).
//! - [`Homography::fit_ransac`]: outlier-robust wrapper with a pixel reprojection threshold.
//! - [`Homography::project`]: homogeneous projection that refuses points mapped to infinity.

use crate::foundation::core::Point;
use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Homogeneous scale below which a projected point is treated as being at infinity.
pub const PROJECTION_EPSILON: f64 = 1e-9;

/// Minimum number of correspondences for a homography.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Fitting failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HomographyError {
    /// Not enough correspondences.
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    /// `src` and `dst` lengths differ.
    #[error("point count mismatch: {src} source vs {dst} destination points")]
    LengthMismatch { src: usize, dst: usize },
    /// The solver produced a singular or non-finite matrix.
    #[error("numerical failure: {0}")]
    NumericalFailure(String),
    /// RANSAC found no model with enough support.
    #[error("insufficient inliers: need {needed}, found {found}")]
    InsufficientInliers { needed: usize, found: usize },
}

/// A 3x3 projective transform acting on `[x, y, 1]` column vectors.
///
/// Serialized as a row-major `[[f64; 3]; 3]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography(Matrix3<f64>);

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[[f64; 3]; 3]> for Homography {
    fn from(m: [[f64; 3]; 3]) -> Self {
        Self(Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        ))
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        let m = h.0;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

impl Homography {
    /// The identity transform.
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// Wrap a raw matrix.
    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        Self(m)
    }

    /// Pure translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self(Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0))
    }

    /// Borrow the underlying matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// `self ∘ inner`: apply `inner` first, then `self`.
    ///
    /// The per-frame total transform of an intersection is `relative.compose(&baseline)`.
    pub fn compose(&self, inner: &Homography) -> Homography {
        Homography(self.0 * inner.0).normalized()
    }

    /// Inverse transform, `None` when singular.
    pub fn inverse(&self) -> Option<Homography> {
        let inv = self.0.try_inverse()?;
        let h = Homography(inv).normalized();
        h.is_finite().then_some(h)
    }

    /// Return `true` when every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Scale so that `h[2][2] == 1` when that entry is not (near) zero.
    pub fn normalized(self) -> Self {
        let s = self.0[(2, 2)];
        if s.abs() < 1e-15 || !s.is_finite() {
            self
        } else {
            Self(self.0 / s)
        }
    }

    /// Project `p`. `None` when the homogeneous scale is within [`PROJECTION_EPSILON`] of zero or
    /// the result is not finite.
    pub fn project(&self, p: Point) -> Option<Point> {
        let v = self.0 * Vector3::new(p.x, p.y, 1.0);
        if v[2].abs() < PROJECTION_EPSILON {
            return None;
        }
        let out = Point::new(v[0] / v[2], v[1] / v[2]);
        (out.x.is_finite() && out.y.is_finite()).then_some(out)
    }

    /// Euclidean distance between `project(src)` and `dst`; infinite when `src` does not project.
    pub fn reprojection_error(&self, src: Point, dst: Point) -> f64 {
        self.project(src)
            .map(|p| p.distance(dst))
            .unwrap_or(f64::INFINITY)
    }

    /// Fit `H` with `dst ≈ H(src)` from at least four correspondences.
    pub fn fit_dlt(src: &[Point], dst: &[Point]) -> Result<Homography, HomographyError> {
        if src.len() != dst.len() {
            return Err(HomographyError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        let n = src.len();
        if n < MIN_CORRESPONDENCES {
            return Err(HomographyError::TooFewPoints {
                needed: MIN_CORRESPONDENCES,
                got: n,
            });
        }

        let (Some((t_src, src_n)), Some((t_dst, dst_n))) =
            (normalize_points(src), normalize_points(dst))
        else {
            return Err(HomographyError::NumericalFailure(
                "correspondences collapse to a single point".into(),
            ));
        };

        let mut a = DMatrix::<f64>::zeros(2 * n, 9);
        for i in 0..n {
            let (sx, sy) = (src_n[i].x, src_n[i].y);
            let (dx, dy) = (dst_n[i].x, dst_n[i].y);

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

        // Null vector of A = eigenvector of AᵀA with the smallest eigenvalue.
        let ata = a.transpose() * &a;
        let eig = nalgebra::SymmetricEigen::new(ata);
        let mut min_idx = 0;
        for i in 1..9 {
            if eig.eigenvalues[i].abs() < eig.eigenvalues[min_idx].abs() {
                min_idx = i;
            }
        }
        let h = |j: usize| eig.eigenvectors[(j, min_idx)];
        let h_norm = Matrix3::new(h(0), h(1), h(2), h(3), h(4), h(5), h(6), h(7), h(8));

        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
        let out = Homography(t_dst_inv * h_norm * t_src).normalized();

        if !out.is_finite() {
            return Err(HomographyError::NumericalFailure(
                "non-finite homography".into(),
            ));
        }
        let det = out.0.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(HomographyError::NumericalFailure(format!(
                "singular homography (det = {det:e})"
            )));
        }
        Ok(out)
    }

    /// Fit `H` with `dst ≈ H(src)` while rejecting outliers.
    ///
    /// Minimal four-point samples are drawn from a seeded RNG, so results are reproducible. The
    /// best model is refit on all of its inliers.
    pub fn fit_ransac(
        src: &[Point],
        dst: &[Point],
        cfg: &RansacConfig,
    ) -> Result<RansacFit, HomographyError> {
        if src.len() != dst.len() {
            return Err(HomographyError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        let n = src.len();
        if n < MIN_CORRESPONDENCES {
            return Err(HomographyError::TooFewPoints {
                needed: MIN_CORRESPONDENCES,
                got: n,
            });
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(cfg.seed);
        let mut best: Option<(Homography, Vec<bool>, usize)> = None;

        for _ in 0..cfg.max_iters {
            let idx = rand::seq::index::sample(&mut rng, n, MIN_CORRESPONDENCES).into_vec();
            let s4: Vec<Point> = idx.iter().map(|&i| src[i]).collect();
            let d4: Vec<Point> = idx.iter().map(|&i| dst[i]).collect();
            if has_collinear_triple(&s4) || has_collinear_triple(&d4) {
                continue;
            }
            let Ok(h) = Homography::fit_dlt(&s4, &d4) else {
                continue;
            };

            let mask: Vec<bool> = src
                .iter()
                .zip(dst)
                .map(|(&s, &d)| h.reprojection_error(s, d) < cfg.inlier_threshold)
                .collect();
            let count = mask.iter().filter(|&&m| m).count();

            if best.as_ref().is_none_or(|(_, _, c)| count > *c) {
                best = Some((h, mask, count));
                if count * 10 > n * 9 {
                    break;
                }
            }
        }

        let Some((best_h, best_mask, best_count)) = best else {
            return Err(HomographyError::NumericalFailure(
                "no non-degenerate minimal sample".into(),
            ));
        };
        if best_count < cfg.min_inliers.max(MIN_CORRESPONDENCES) {
            return Err(HomographyError::InsufficientInliers {
                needed: cfg.min_inliers.max(MIN_CORRESPONDENCES),
                found: best_count,
            });
        }

        let (s_in, d_in): (Vec<Point>, Vec<Point>) = src
            .iter()
            .zip(dst)
            .zip(&best_mask)
            .filter(|&(_, &m)| m)
            .map(|((&s, &d), _)| (s, d))
            .unzip();
        let refit = Homography::fit_dlt(&s_in, &d_in).unwrap_or(best_h);

        let inlier_mask: Vec<bool> = src
            .iter()
            .zip(dst)
            .map(|(&s, &d)| refit.reprojection_error(s, d) < cfg.inlier_threshold)
            .collect();
        let n_inliers = inlier_mask.iter().filter(|&&m| m).count();
        // A refit that lost support falls back to the sampled model.
        if n_inliers < best_count {
            return Ok(RansacFit {
                homography: best_h,
                inlier_mask: best_mask,
                n_inliers: best_count,
            });
        }
        Ok(RansacFit {
            homography: refit,
            inlier_mask,
            n_inliers,
        })
    }
}

/// RANSAC parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Maximum number of sampling iterations.
    pub max_iters: usize,
    /// Inlier threshold on reprojection error, in pixels.
    pub inlier_threshold: f64,
    /// Minimum support for a valid model.
    pub min_inliers: usize,
    /// RNG seed.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 5.0,
            min_inliers: MIN_CORRESPONDENCES,
            seed: 0,
        }
    }
}

/// Result of [`Homography::fit_ransac`].
#[derive(Debug, Clone)]
pub struct RansacFit {
    /// The fitted transform.
    pub homography: Homography,
    /// `true` for correspondences within the inlier threshold.
    pub inlier_mask: Vec<bool>,
    /// Number of inliers.
    pub n_inliers: usize,
}

/// Translate the centroid to the origin and scale the mean distance to sqrt(2).
fn normalize_points(pts: &[Point]) -> Option<(Matrix3<f64>, Vec<Point>)> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !(mean_dist > 1e-9) {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let out = pts
        .iter()
        .map(|p| Point::new(s * (p.x - cx), s * (p.y - cy)))
        .collect();
    Some((t, out))
}

fn has_collinear_triple(p: &[Point]) -> bool {
    const MIN_AREA2: f64 = 1e-6;
    for i in 0..p.len() {
        for j in (i + 1)..p.len() {
            for k in (j + 1)..p.len() {
                let area2 = (p[j] - p[i]).cross(p[k] - p[i]);
                if area2.abs() < MIN_AREA2 {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/homography.rs"]
mod tests;
