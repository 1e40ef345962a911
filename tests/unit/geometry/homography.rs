use super::*;
use approx::assert_relative_eq;
use rand::Rng;

fn sample_h() -> Homography {
    Homography::from([[1.02, 0.05, 12.0], [-0.03, 0.98, -7.5], [1.0e-5, 2.0e-5, 1.0]])
}

fn grid() -> Vec<Point> {
    let mut pts = Vec::new();
    for y in 0..5 {
        for x in 0..6 {
            pts.push(Point::new(40.0 + 90.0 * x as f64, 30.0 + 70.0 * y as f64));
        }
    }
    pts
}

#[test]
fn compose_with_inverse_roundtrips_points() {
    let h = sample_h();
    let inv = h.inverse().unwrap();
    let id = h.compose(&inv);
    for p in grid() {
        let q = id.project(p).unwrap();
        assert!((q - p).hypot() < 1e-3, "{p:?} -> {q:?}");
        let back = inv.project(h.project(p).unwrap()).unwrap();
        assert!((back - p).hypot() < 1e-3);
    }
}

#[test]
fn compose_applies_inner_first() {
    let a = Homography::translation(10.0, 0.0);
    let b = Homography::from([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]]);
    let p = a.compose(&b).project(Point::new(1.0, 1.0)).unwrap();
    assert_relative_eq!(p.x, 12.0, epsilon = 1e-12);
    assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
}

#[test]
fn project_rejects_points_at_infinity() {
    let h = Homography::from([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]);
    assert!(h.project(Point::new(0.0, 5.0)).is_none());
    assert!(h.project(Point::new(1.0, 5.0)).is_some());
}

#[test]
fn dlt_recovers_exact_transform() {
    let h = sample_h();
    let src = grid();
    let dst: Vec<Point> = src.iter().map(|&p| h.project(p).unwrap()).collect();
    let fit = Homography::fit_dlt(&src, &dst).unwrap();
    for (s, d) in src.iter().zip(&dst) {
        assert!(fit.reprojection_error(*s, *d) < 1e-6);
    }
}

#[test]
fn dlt_rejects_too_few_and_mismatched() {
    let p = [Point::ZERO; 3];
    assert_eq!(
        Homography::fit_dlt(&p, &p),
        Err(HomographyError::TooFewPoints { needed: 4, got: 3 })
    );
    assert!(matches!(
        Homography::fit_dlt(&[Point::ZERO; 4], &[Point::ZERO; 5]),
        Err(HomographyError::LengthMismatch { .. })
    ));
}

#[test]
fn dlt_rejects_collapsed_points() {
    let src = [Point::new(1.0, 1.0); 4];
    let dst = [
        Point::new(0.0, 0.0),
        Point::new(1.0, 0.0),
        Point::new(1.0, 1.0),
        Point::new(0.0, 1.0),
    ];
    assert!(Homography::fit_dlt(&src, &dst).is_err());
}

#[test]
fn ransac_ignores_outliers() {
    let h = sample_h();
    let src = grid();
    let mut dst: Vec<Point> = src.iter().map(|&p| h.project(p).unwrap()).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    // Corrupt a fifth of the correspondences.
    for d in dst.iter_mut().step_by(5) {
        *d = Point::new(rng.gen_range(0.0..600.0), rng.gen_range(0.0..400.0));
    }
    let fit = Homography::fit_ransac(&src, &dst, &RansacConfig::default()).unwrap();
    assert!(fit.n_inliers >= 24);
    for (i, s) in src.iter().enumerate() {
        if i % 5 != 0 {
            let expected = h.project(*s).unwrap();
            let got = fit.homography.project(*s).unwrap();
            assert!((expected - got).hypot() < 1e-3);
        }
    }
}

#[test]
fn ransac_reports_insufficient_support() {
    let src = grid();
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    let dst: Vec<Point> = src
        .iter()
        .map(|_| Point::new(rng.gen_range(0.0..600.0), rng.gen_range(0.0..400.0)))
        .collect();
    let cfg = RansacConfig {
        min_inliers: 20,
        max_iters: 200,
        ..RansacConfig::default()
    };
    assert!(Homography::fit_ransac(&src, &dst, &cfg).is_err());
}

#[test]
fn serde_uses_row_major_nested_arrays() {
    let h: Homography = serde_json::from_str("[[1,0,5],[0,1,-3],[0,0,1]]").unwrap();
    assert_eq!(h, Homography::translation(5.0, -3.0));
    let s = serde_json::to_string(&h).unwrap();
    assert_eq!(s, "[[1.0,0.0,5.0],[0.0,1.0,-3.0],[0.0,0.0,1.0]]");
}
