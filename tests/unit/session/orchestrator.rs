use super::*;
use crate::calibration::scene::Intersection;
use crate::foundation::core::Point;
use crate::schedule::clock::GreenWindow;
use crate::session::sticky::FallbackPolicy;

/// Shifts by a fixed offset, failing on listed frames.
struct Scripted {
    shift: (f64, f64),
    fail_on: Vec<u64>,
}

impl MotionEstimator for Scripted {
    fn track(&self, frame: FrameIndex, _current: &FrameRGBA) -> Result<TrackedMotion, TrackingFailure> {
        if self.fail_on.contains(&frame.0) {
            return Err(TrackingFailure::TooFewMatches { needed: 10, found: 0 });
        }
        Ok(TrackedMotion {
            homography: Homography::translation(self.shift.0 * frame.0 as f64, self.shift.1),
            matches: 50,
            inliers: 40,
        })
    }
}

fn scene(fallback: FallbackPolicy) -> Scene {
    let mut s = Scene::default();
    let mut i = Intersection::new(
        "A",
        [
            Point::new(10.0, 10.0),
            Point::new(40.0, 10.0),
            Point::new(40.0, 40.0),
            Point::new(10.0, 40.0),
        ],
    );
    i.baseline = Some(Homography::identity());
    s.intersections.push(i);
    s.schedule.insert("A", vec![GreenWindow::new(1, 3)]);
    s.policy.transition_frames = 1;
    s.policy.fallback = fallback;
    s
}

fn session(fallback: FallbackPolicy, fail_on: Vec<u64>) -> OverlaySession {
    OverlaySession::new(
        scene(fallback),
        Arc::new(Scripted {
            shift: (1.0, 0.0),
            fail_on,
        }),
        SessionOpts {
            stamp: false,
            ..SessionOpts::default()
        },
    )
    .unwrap()
}

#[test]
fn cursor_starts_at_origin() {
    let mut c = FrameCursor::new(1);
    assert_eq!(c.advance(), FrameIndex(1));
    assert_eq!(c.advance(), FrameIndex(2));
    assert_eq!(c.peek(), FrameIndex(3));
}

#[test]
fn cancel_token_is_shared() {
    let t = CancelToken::new();
    let t2 = t.clone();
    t2.cancel();
    assert!(t.is_cancelled());
}

#[test]
fn pool_and_chunk_helpers() {
    assert!(build_thread_pool(Some(0)).is_err());
    assert!(build_thread_pool(Some(2)).is_ok());
    assert_eq!(normalized_chunk_size(0), 1);
    assert_eq!(normalized_chunk_size(8), 8);
}

#[test]
fn fresh_frame_projects_and_classifies() {
    let mut s = session(FallbackPolicy::ReuseStale, vec![]);
    let mut frame = FrameRGBA::solid(64, 64, [0, 0, 0]);
    let r = s.process_frame(&mut frame).unwrap();
    assert_eq!(r.frame, FrameIndex(1));
    assert_eq!(r.tracking, TrackingStatus::Fresh);
    assert_eq!(r.matches, Some((50, 40)));
    let a = r.intersection("A").unwrap();
    assert_eq!(a.status, Some(TrackingStatus::Fresh));
    assert_eq!(a.polygon.as_ref().unwrap()[0], Point::new(11.0, 10.0));
    assert_eq!(a.color(), CrossingColor::Pass);
    let line = a.crossing.unwrap();
    assert!((line.start.y - 19.0).abs() < 1e-9);
    assert_eq!(r.lights.get("A"), Some(&LightState::Green));
}

#[test]
fn failure_reuses_previous_transform() {
    let mut s = session(FallbackPolicy::ReuseStale, vec![2]);
    let mut f1 = FrameRGBA::solid(64, 64, [0, 0, 0]);
    let r1 = s.process_frame(&mut f1).unwrap();
    let mut f2 = FrameRGBA::solid(64, 64, [0, 0, 0]);
    let r2 = s.process_frame(&mut f2).unwrap();
    assert_eq!(r2.tracking, TrackingStatus::Stale);
    let a2 = r2.intersection("A").unwrap();
    assert_eq!(a2.status, Some(TrackingStatus::Stale));
    assert_eq!(a2.polygon, r1.intersection("A").unwrap().polygon);
}

#[test]
fn failure_skips_under_skip_policy() {
    let mut s = session(FallbackPolicy::SkipOnFailure, vec![2]);
    let mut f1 = FrameRGBA::solid(64, 64, [0, 0, 0]);
    s.process_frame(&mut f1).unwrap();
    let mut f2 = FrameRGBA::solid(64, 64, [0, 0, 0]);
    let r2 = s.process_frame(&mut f2).unwrap();
    assert_eq!(r2.tracking, TrackingStatus::Lost);
    let a2 = r2.intersection("A").unwrap();
    assert_eq!(a2.skipped, Some(SkipReason::TransformUnavailable));
    assert!(a2.polygon.is_none());
    // Nothing drawn at all.
    assert!(f2.data.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
}

#[test]
fn missing_baseline_is_reported() {
    let mut sc = scene(FallbackPolicy::ReuseStale);
    sc.intersections[0].baseline = None;
    let mut s = OverlaySession::new(
        sc,
        Arc::new(Scripted {
            shift: (0.0, 0.0),
            fail_on: vec![],
        }),
        SessionOpts::default(),
    )
    .unwrap();
    let mut f = FrameRGBA::solid(64, 64, [0, 0, 0]);
    let r = s.process_frame(&mut f).unwrap();
    let a = r.intersection("A").unwrap();
    assert_eq!(a.skipped, Some(SkipReason::CalibrationMissing));
    assert_eq!(a.status, None);
}

#[test]
fn stats_count_statuses() {
    let mut st = RunStats::default();
    st.record(TrackingStatus::Fresh);
    st.record(TrackingStatus::Stale);
    st.record(TrackingStatus::Lost);
    assert_eq!((st.frames_total, st.fresh, st.stale, st.lost), (3, 1, 1, 1));
}
