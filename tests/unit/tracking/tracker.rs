use super::*;
use image::{Rgba, RgbaImage};
use rand::{Rng, SeedableRng};

fn texture(w: u32, h: u32, seed: u64) -> RgbaImage {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut img = RgbaImage::from_pixel(w, h, Rgba([120, 120, 120, 255]));
    for _ in 0..(w * h / 400) {
        let x0 = rng.gen_range(0..w);
        let y0 = rng.gen_range(0..h);
        let rw = rng.gen_range(4..30);
        let rh = rng.gen_range(4..30);
        let v = rng.gen_range(0..=255u8);
        for y in y0..(y0 + rh).min(h) {
            for x in x0..(x0 + rw).min(w) {
                img.put_pixel(x, y, Rgba([v, v, v, 255]));
            }
        }
    }
    img
}

fn crop(img: &RgbaImage, x: u32, y: u32) -> FrameRGBA {
    FrameRGBA::from_rgba_image(image::imageops::crop_imm(img, x, y, 256, 256).to_image())
}

#[test]
fn translation_is_recovered() {
    let big = texture(320, 320, 11);
    let reference = crop(&big, 0, 0);
    let current = crop(&big, 8, 16);

    let tracker = HomographyTracker::new(&reference, TrackerConfig::default()).unwrap();
    let motion = tracker.estimate_detailed(&current).unwrap();
    assert!(motion.matches >= 10);
    assert!(motion.inliers >= 10);

    // Reference pixel (x, y) shows up at (x - 8, y - 16) in the current frame.
    for p in [Point::new(64.0, 64.0), Point::new(128.0, 200.0), Point::new(200.0, 90.0)] {
        let q = motion.homography.project(p).unwrap();
        assert!((q.x - (p.x - 8.0)).abs() < 1.0, "{p:?} -> {q:?}");
        assert!((q.y - (p.y - 16.0)).abs() < 1.0, "{p:?} -> {q:?}");
    }
}

#[test]
fn unrelated_frame_fails_to_track() {
    let reference = FrameRGBA::from_rgba_image(texture(256, 256, 1));
    let blank = FrameRGBA::solid(256, 256, [40, 40, 40]);
    let tracker = HomographyTracker::new(&reference, TrackerConfig::default()).unwrap();
    assert!(matches!(
        tracker.estimate_detailed(&blank),
        Err(TrackingFailure::TooFewMatches { found: 0, .. })
    ));
    assert!(tracker.estimate(&blank).is_none());
}

#[test]
fn working_resolution_downscale_keeps_full_resolution_coordinates() {
    let gray = image::imageops::grayscale(&texture(512, 256, 5));
    let cfg = TrackerConfig {
        max_working_dim: Some(256),
        ..TrackerConfig::default()
    };
    let set = extract_features(&gray, &cfg);
    assert!(set.keypoints.iter().any(|k| k.position.x > 256.0));
}
