use super::*;
use crate::schedule::clock::{GreenWindow, LightState};
use crate::foundation::core::FrameIndex;

fn quad() -> [Point; 4] {
    [
        Point::new(0.0, 0.0),
        Point::new(10.0, 0.0),
        Point::new(10.0, 10.0),
        Point::new(0.0, 10.0),
    ]
}

fn scene() -> Scene {
    let mut s = Scene::default();
    let mut i = Intersection::new("ID-1", quad());
    i.baseline = Some(Homography::identity());
    s.intersections.push(i);
    s.schedule.insert("ID-1", vec![GreenWindow::new(100, 200)]);
    s
}

#[test]
fn minimal_json_uses_defaults() {
    let json = r#"{
        "intersections": [{
            "id": "ID-2",
            "world": [{"x":0,"y":0},{"x":1,"y":0},{"x":1,"y":1},{"x":0,"y":1}],
            "signal": {"single": {"light": "ID-2"}}
        }],
        "schedule": {"ID-2": [[10, 20]]}
    }"#;
    let s = Scene::from_reader(json.as_bytes()).unwrap();
    assert_eq!(s.policy, OverlayPolicy::default());
    assert_eq!(s.policy.transition_frames, 75);
    assert_eq!(s.policy.frame_origin, 1);
    let i = s.intersection("ID-2").unwrap();
    assert!(!i.is_calibrated());
    assert!(!i.flip_crossing);
    assert_eq!(i.color, Rgb8::WHITE);
    s.validate().unwrap();
}

#[test]
fn json_round_trip() {
    let mut s = scene();
    s.masks.push(MaskPolygon {
        vertices: quad().to_vec(),
        space: MaskSpace::Intersection("ID-1".into()),
    });
    let json = s.to_json_pretty().unwrap();
    let back = Scene::from_reader(json.as_bytes()).unwrap();
    assert_eq!(back, s);
}

#[test]
fn clock_follows_policy() {
    let mut s = scene();
    s.policy.transition_frames = 10;
    let clock = s.clock();
    assert_eq!(clock.state("ID-1", FrameIndex(95)), LightState::Yellow);
    s.policy.pre_green = false;
    assert_eq!(s.clock().state("ID-1", FrameIndex(95)), LightState::Red);
}

#[test]
fn validate_rejects_duplicate_ids() {
    let mut s = scene();
    s.intersections.push(Intersection::new("ID-1", quad()));
    assert!(matches!(s.validate(), Err(OverlayError::Calibration(_))));
}

#[test]
fn validate_rejects_small_masks() {
    let mut s = scene();
    s.masks.push(MaskPolygon {
        vertices: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        space: MaskSpace::Reference,
    });
    assert!(s.validate().is_err());
}

#[test]
fn validate_rejects_unknown_mask_space() {
    let mut s = scene();
    s.masks.push(MaskPolygon {
        vertices: quad().to_vec(),
        space: MaskSpace::Intersection("ID-9".into()),
    });
    assert!(s.validate().is_err());
}

#[test]
fn validate_rejects_bad_schedule() {
    let mut s = scene();
    s.schedule.insert("ID-1", vec![GreenWindow::new(50, 10)]);
    assert!(matches!(s.validate(), Err(OverlayError::Validation(_))));
}

#[test]
fn missing_baseline_is_not_an_error() {
    let mut s = scene();
    s.intersections[0].baseline = None;
    s.validate().unwrap();
}
