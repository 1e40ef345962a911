//! Scale-invariant keypoints and descriptors.
//!
//! Pipeline per image:
//!
//! 1. Gaussian scale space (`octaves` x `scales_per_octave + 3` levels, halved resolution per
//!    octave) and its difference-of-Gaussians stack.
//! 2. 3x3x3 DoG extrema, refined to sub-pixel/sub-scale accuracy, filtered by contrast and by
//!    the principal-curvature ratio (edge response).
//! 3. Dominant gradient orientation(s) from a 36-bin histogram.
//! 4. 4x4x8 gradient-orientation histograms in the rotated keypoint frame (128 floats,
//!    normalized, clamped at 0.2, renormalized).

use crate::foundation::core::Point;
use image::{GrayImage, ImageBuffer, Luma};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Single-channel `f32` image in `[0, 1]`.
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Length of one descriptor.
pub const DESCRIPTOR_LEN: usize = 128;

/// One descriptor vector.
pub type Descriptor = [f32; DESCRIPTOR_LEN];

/// Environment variable overriding [`ScaleSpaceConfig::max_features`].
pub const MAX_FEATURES_ENV: &str = "INTERSIGHT_MAX_FEATURES";

const DESC_WIDTH: usize = 4;
const DESC_BINS: usize = 8;
const ORI_BINS: usize = 36;
const ORI_PEAK_RATIO: f32 = 0.8;
const ORI_SIGMA_FACTOR: f32 = 1.5;
const DESC_MAG_CLAMP: f32 = 0.2;
const MIN_OCTAVE_DIM: u32 = 16;
const MAX_REFINE_STEPS: usize = 5;

/// Scale-space and detector parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleSpaceConfig {
    /// Maximum number of octaves (fewer when the image gets too small).
    pub octaves: usize,
    /// Sampled scales per octave.
    pub scales_per_octave: usize,
    /// Blur of the first level of each octave.
    pub base_sigma: f32,
    /// Blur assumed to be already present in the input.
    pub assumed_blur: f32,
    /// DoG contrast threshold on `[0, 1]` intensities (divided by `scales_per_octave`).
    pub contrast_threshold: f32,
    /// Maximum ratio of principal curvatures.
    pub edge_ratio: f32,
    /// Keep at most this many keypoints, strongest first.
    pub max_features: usize,
    /// Pixels near the octave border where no extrema are searched.
    pub border: u32,
}

impl Default for ScaleSpaceConfig {
    fn default() -> Self {
        Self {
            octaves: 4,
            scales_per_octave: 3,
            base_sigma: 1.6,
            assumed_blur: 0.5,
            contrast_threshold: 0.04,
            edge_ratio: 10.0,
            max_features: 2000,
            border: 5,
        }
    }
}

impl ScaleSpaceConfig {
    /// Apply `INTERSIGHT_MAX_FEATURES` when it is set to a positive integer.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = std::env::var(MAX_FEATURES_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            self.max_features = n;
        }
        self
    }
}

/// A detected keypoint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    /// Position in input-image pixels.
    pub position: Point,
    /// Scale (Gaussian sigma) in input-image pixels.
    pub sigma: f64,
    /// Dominant gradient orientation in radians, `[0, 2π)`.
    pub orientation: f32,
    /// Absolute interpolated DoG response.
    pub response: f32,
}

/// Keypoints and their descriptors, index-aligned.
#[derive(Clone, Debug, Default)]
pub struct FeatureSet {
    /// Keypoints.
    pub keypoints: Vec<Keypoint>,
    /// Descriptors; `descriptors[i]` describes `keypoints[i]`.
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    /// Number of features.
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Return `true` when no features were found.
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Multiply every keypoint position and scale by `factor`.
    pub fn rescale(&mut self, factor: f64) {
        for k in &mut self.keypoints {
            k.position = Point::new(k.position.x * factor, k.position.y * factor);
            k.sigma *= factor;
        }
    }
}

/// Convert 8-bit intensity to `[0, 1]` floats.
pub fn to_float(gray: &GrayImage) -> FloatImage {
    let (w, h) = gray.dimensions();
    let data = gray.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
    FloatImage::from_raw(w, h, data).unwrap_or_else(|| FloatImage::new(w, h))
}

/// Detect keypoints and compute descriptors.
#[tracing::instrument(skip_all, fields(w = gray.width(), h = gray.height()))]
pub fn detect_and_describe(gray: &GrayImage, cfg: &ScaleSpaceConfig) -> FeatureSet {
    if cfg.scales_per_octave == 0 || cfg.octaves == 0 {
        return FeatureSet::default();
    }
    let octaves = build_pyramid(&to_float(gray), cfg);

    let mut candidates = Vec::<Candidate>::new();
    for (o, oct) in octaves.iter().enumerate() {
        find_extrema(oct, o, cfg, &mut candidates);
    }

    // Orientation assignment may split a candidate into several oriented keypoints.
    let mut oriented: Vec<(Candidate, f32)> = candidates
        .par_iter()
        .flat_map_iter(|c| {
            let img = &octaves[c.octave].gauss[c.layer_index()];
            dominant_orientations(img, c, cfg)
                .into_iter()
                .map(move |a| (*c, a))
        })
        .collect();

    oriented.sort_by(|a, b| b.0.response.total_cmp(&a.0.response));
    oriented.truncate(cfg.max_features);

    let described: Vec<(Keypoint, Descriptor)> = oriented
        .par_iter()
        .map(|(c, angle)| {
            let img = &octaves[c.octave].gauss[c.layer_index()];
            let desc = describe(img, c, *angle, cfg);
            let scale = f64::from(1u32 << c.octave);
            let kp = Keypoint {
                position: Point::new(f64::from(c.x) * scale, f64::from(c.y) * scale),
                sigma: f64::from(c.sigma_octave(cfg)) * scale,
                orientation: *angle,
                response: c.response,
            };
            (kp, desc)
        })
        .collect();

    let (keypoints, descriptors) = described.into_iter().unzip();
    let set = FeatureSet {
        keypoints,
        descriptors,
    };
    tracing::trace!(features = set.len(), octaves = octaves.len(), "extracted features");
    set
}

struct Octave {
    gauss: Vec<FloatImage>,
    dog: Vec<FloatImage>,
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    octave: usize,
    /// Sub-pixel position in octave pixels.
    x: f32,
    y: f32,
    /// Sub-scale DoG layer.
    layer: f32,
    response: f32,
}

impl Candidate {
    fn layer_index(&self) -> usize {
        self.layer.round().max(0.0) as usize
    }

    fn sigma_octave(&self, cfg: &ScaleSpaceConfig) -> f32 {
        cfg.base_sigma * 2f32.powf(self.layer / cfg.scales_per_octave as f32)
    }
}

fn blur(img: &FloatImage, sigma: f32) -> FloatImage {
    if sigma < 0.01 {
        return img.clone();
    }
    imageproc::filter::gaussian_blur_f32(img, sigma)
}

fn downsample(img: &FloatImage) -> FloatImage {
    let (w, h) = (img.width() / 2, img.height() / 2);
    FloatImage::from_fn(w, h, |x, y| *img.get_pixel(2 * x, 2 * y))
}

fn build_pyramid(base: &FloatImage, cfg: &ScaleSpaceConfig) -> Vec<Octave> {
    let s = cfg.scales_per_octave;
    let levels = s + 3;
    let k = 2f32.powf(1.0 / s as f32);

    // Incremental blur taking level i-1 to level i.
    let increments: Vec<f32> = (1..levels)
        .map(|i| {
            let prev = cfg.base_sigma * k.powi(i as i32 - 1);
            let total = prev * k;
            (total * total - prev * prev).sqrt()
        })
        .collect();

    let init = (cfg.base_sigma.powi(2) - cfg.assumed_blur.powi(2)).max(0.0001).sqrt();
    let mut first = blur(base, init);

    let mut out = Vec::with_capacity(cfg.octaves);
    for o in 0..cfg.octaves {
        if o > 0 {
            let prev: &Octave = &out[o - 1];
            first = downsample(&prev.gauss[s]);
        }
        if first.width() < MIN_OCTAVE_DIM || first.height() < MIN_OCTAVE_DIM {
            break;
        }

        let mut gauss = Vec::with_capacity(levels);
        gauss.push(first.clone());
        for inc in &increments {
            let next = blur(&gauss[gauss.len() - 1], *inc);
            gauss.push(next);
        }

        let dog = gauss
            .windows(2)
            .map(|pair| {
                let (w, h) = pair[0].dimensions();
                let data = pair[1]
                    .as_raw()
                    .iter()
                    .zip(pair[0].as_raw())
                    .map(|(b, a)| b - a)
                    .collect();
                FloatImage::from_raw(w, h, data).unwrap_or_else(|| FloatImage::new(w, h))
            })
            .collect();

        out.push(Octave { gauss, dog });
    }
    out
}

#[inline]
fn at(img: &FloatImage, x: i32, y: i32) -> f32 {
    img.as_raw()[(y as u32 * img.width() + x as u32) as usize]
}

fn is_extremum(dog: &[FloatImage], l: usize, x: i32, y: i32) -> bool {
    let v = at(&dog[l], x, y);
    let mut is_max = true;
    let mut is_min = true;
    for layer in &dog[l - 1..=l + 1] {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if std::ptr::eq(layer, &dog[l]) && dx == 0 && dy == 0 {
                    continue;
                }
                let n = at(layer, x + dx, y + dy);
                is_max &= v > n;
                is_min &= v < n;
                if !is_max && !is_min {
                    return false;
                }
            }
        }
    }
    true
}

fn find_extrema(oct: &Octave, o: usize, cfg: &ScaleSpaceConfig, out: &mut Vec<Candidate>) {
    let s = cfg.scales_per_octave;
    let (w, h) = oct.dog[0].dimensions();
    let b = cfg.border.max(1);
    if w <= 2 * b || h <= 2 * b {
        return;
    }
    let prefilter = 0.5 * cfg.contrast_threshold / s as f32;

    for l in 1..=s {
        for y in b..h - b {
            for x in b..w - b {
                let (xi, yi) = (x as i32, y as i32);
                if at(&oct.dog[l], xi, yi).abs() <= prefilter {
                    continue;
                }
                if !is_extremum(&oct.dog, l, xi, yi) {
                    continue;
                }
                if let Some(c) = refine(&oct.dog, o, l, xi, yi, cfg) {
                    out.push(c);
                }
            }
        }
    }
}

/// Quadratic sub-pixel refinement plus contrast and edge rejection.
fn refine(
    dog: &[FloatImage],
    octave: usize,
    mut l: usize,
    mut x: i32,
    mut y: i32,
    cfg: &ScaleSpaceConfig,
) -> Option<Candidate> {
    let s = cfg.scales_per_octave;
    let (w, h) = dog[0].dimensions();
    let b = cfg.border.max(1) as i32;

    for _ in 0..MAX_REFINE_STEPS {
        let (d, g, hess) = derivatives(dog, l, x, y);
        let offset = hess.try_inverse().map(|inv| -(inv * g))?;
        if !offset.iter().all(|v| v.is_finite()) {
            return None;
        }

        if offset.iter().all(|v| v.abs() < 0.5) {
            let contrast = d + 0.5 * g.dot(&offset);
            if contrast.abs() < cfg.contrast_threshold / s as f32 {
                return None;
            }
            let (dxx, dyy, dxy) = (hess[(0, 0)], hess[(1, 1)], hess[(0, 1)]);
            let tr = dxx + dyy;
            let det = dxx * dyy - dxy * dxy;
            let r = cfg.edge_ratio;
            if det <= 0.0 || tr * tr * r >= (r + 1.0) * (r + 1.0) * det {
                return None;
            }
            return Some(Candidate {
                octave,
                x: x as f32 + offset[0],
                y: y as f32 + offset[1],
                layer: l as f32 + offset[2],
                response: contrast.abs(),
            });
        }

        x += offset[0].round() as i32;
        y += offset[1].round() as i32;
        let nl = l as i32 + offset[2].round() as i32;
        if nl < 1 || nl > s as i32 || x < b || y < b || x >= w as i32 - b || y >= h as i32 - b {
            return None;
        }
        l = nl as usize;
    }
    None
}

fn derivatives(dog: &[FloatImage], l: usize, x: i32, y: i32) -> (f32, Vector3<f32>, Matrix3<f32>) {
    let (prev, cur, next) = (&dog[l - 1], &dog[l], &dog[l + 1]);
    let v = at(cur, x, y);

    let dx = 0.5 * (at(cur, x + 1, y) - at(cur, x - 1, y));
    let dy = 0.5 * (at(cur, x, y + 1) - at(cur, x, y - 1));
    let ds = 0.5 * (at(next, x, y) - at(prev, x, y));

    let dxx = at(cur, x + 1, y) + at(cur, x - 1, y) - 2.0 * v;
    let dyy = at(cur, x, y + 1) + at(cur, x, y - 1) - 2.0 * v;
    let dss = at(next, x, y) + at(prev, x, y) - 2.0 * v;
    let dxy = 0.25
        * (at(cur, x + 1, y + 1) - at(cur, x - 1, y + 1) - at(cur, x + 1, y - 1)
            + at(cur, x - 1, y - 1));
    let dxs = 0.25
        * (at(next, x + 1, y) - at(next, x - 1, y) - at(prev, x + 1, y) + at(prev, x - 1, y));
    let dys = 0.25
        * (at(next, x, y + 1) - at(next, x, y - 1) - at(prev, x, y + 1) + at(prev, x, y - 1));

    let g = Vector3::new(dx, dy, ds);
    let hess = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
    (v, g, hess)
}

/// Central-difference gradient `(magnitude, angle)` at an interior pixel.
fn gradient(img: &FloatImage, x: i32, y: i32) -> Option<(f32, f32)> {
    let (w, h) = img.dimensions();
    if x < 1 || y < 1 || x >= w as i32 - 1 || y >= h as i32 - 1 {
        return None;
    }
    let gx = at(img, x + 1, y) - at(img, x - 1, y);
    let gy = at(img, x, y + 1) - at(img, x, y - 1);
    Some(((gx * gx + gy * gy).sqrt(), gy.atan2(gx)))
}

fn wrap_angle(a: f32) -> f32 {
    let r = a.rem_euclid(TAU);
    if r >= TAU { 0.0 } else { r }
}

fn dominant_orientations(img: &FloatImage, c: &Candidate, cfg: &ScaleSpaceConfig) -> Vec<f32> {
    let sigma = ORI_SIGMA_FACTOR * c.sigma_octave(cfg);
    let radius = (3.0 * sigma).round() as i32;
    let (cx, cy) = (c.x.round() as i32, c.y.round() as i32);
    let denom = 2.0 * sigma * sigma;

    let mut hist = [0f32; ORI_BINS];
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let Some((mag, ang)) = gradient(img, cx + dx, cy + dy) else {
                continue;
            };
            let weight = (-((dx * dx + dy * dy) as f32) / denom).exp();
            let bin = (wrap_angle(ang) / TAU * ORI_BINS as f32).round() as usize % ORI_BINS;
            hist[bin] += weight * mag;
        }
    }

    // Two passes of a [1 4 6 4 1] circular smoothing.
    for _ in 0..2 {
        let src = hist;
        for i in 0..ORI_BINS {
            let p = |o: isize| src[(i as isize + o).rem_euclid(ORI_BINS as isize) as usize];
            hist[i] = (p(-2) + p(2) + 4.0 * (p(-1) + p(1)) + 6.0 * p(0)) / 16.0;
        }
    }

    let max = hist.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0.0];
    }
    let mut out = Vec::new();
    for i in 0..ORI_BINS {
        let left = hist[(i + ORI_BINS - 1) % ORI_BINS];
        let right = hist[(i + 1) % ORI_BINS];
        let v = hist[i];
        if v > left && v > right && v >= ORI_PEAK_RATIO * max {
            let curvature = left - 2.0 * v + right;
            let shift = if curvature.abs() > f32::EPSILON {
                0.5 * (left - right) / curvature
            } else {
                0.0
            };
            out.push(wrap_angle((i as f32 + shift) * TAU / ORI_BINS as f32));
        }
    }
    if out.is_empty() {
        out.push(0.0);
    }
    out
}

fn describe(img: &FloatImage, c: &Candidate, angle: f32, cfg: &ScaleSpaceConfig) -> Descriptor {
    let d = DESC_WIDTH as f32;
    let hist_width = 3.0 * c.sigma_octave(cfg);
    let (w, h) = img.dimensions();
    let max_radius = (w as f32).hypot(h as f32);
    let radius = (hist_width * std::f32::consts::SQRT_2 * (d + 1.0) * 0.5)
        .round()
        .min(max_radius) as i32;
    let (cos_t, sin_t) = (angle.cos() / hist_width, angle.sin() / hist_width);
    let (cx, cy) = (c.x.round() as i32, c.y.round() as i32);
    let win_denom = 2.0 * (0.5 * d) * (0.5 * d);
    let bins_per_rad = DESC_BINS as f32 / TAU;

    let mut hist = [0f32; DESCRIPTOR_LEN];
    for i in -radius..=radius {
        for j in -radius..=radius {
            // Offset expressed in the keypoint frame, in histogram-cell units.
            let c_rot = j as f32 * cos_t + i as f32 * sin_t;
            let r_rot = -(j as f32) * sin_t + i as f32 * cos_t;
            let rbin = r_rot + 0.5 * d - 0.5;
            let cbin = c_rot + 0.5 * d - 0.5;
            if rbin <= -1.0 || rbin >= d || cbin <= -1.0 || cbin >= d {
                continue;
            }
            let Some((mag, ang)) = gradient(img, cx + j, cy + i) else {
                continue;
            };
            let weight = (-(c_rot * c_rot + r_rot * r_rot) / win_denom).exp() * mag;
            let obin = wrap_angle(ang - angle) * bins_per_rad;

            let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
            let (dr, dc, dob) = (rbin - r0, cbin - c0, obin - o0);
            for (ri, wr) in [(0, 1.0 - dr), (1, dr)] {
                let r = r0 as i32 + ri;
                if r < 0 || r >= DESC_WIDTH as i32 {
                    continue;
                }
                for (ci, wc) in [(0, 1.0 - dc), (1, dc)] {
                    let cc = c0 as i32 + ci;
                    if cc < 0 || cc >= DESC_WIDTH as i32 {
                        continue;
                    }
                    for (oi, wo) in [(0, 1.0 - dob), (1, dob)] {
                        let o = (o0 as usize + oi) % DESC_BINS;
                        let idx = (r as usize * DESC_WIDTH + cc as usize) * DESC_BINS + o;
                        hist[idx] += weight * wr * wc * wo;
                    }
                }
            }
        }
    }

    normalize_descriptor(&mut hist);
    hist
}

fn normalize_descriptor(v: &mut Descriptor) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    for x in v.iter_mut() {
        *x = (*x / norm).min(DESC_MAG_CLAMP);
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/tracking/features.rs"]
mod tests;
