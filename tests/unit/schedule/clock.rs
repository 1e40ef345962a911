use super::*;

fn clock(y: u64, windows: &[(u64, u64)]) -> ScheduleClock {
    let mut s = LightSchedule::new();
    s.insert(
        "X",
        windows.iter().map(|&(a, b)| GreenWindow::new(a, b)).collect(),
    );
    ScheduleClock::new(s, y)
}

#[test]
fn worked_example_holds() {
    let c = clock(75, &[(1020, 2250)]);
    let at = |f| c.state("X", FrameIndex(f));
    assert_eq!(at(1019), LightState::Yellow);
    assert_eq!(at(945), LightState::Red);
    assert_eq!(at(946), LightState::Yellow);
    assert_eq!(at(1020), LightState::Green);
    assert_eq!(at(2249), LightState::Green);
    assert_eq!(at(2250), LightState::Yellow);
    assert_eq!(at(2324), LightState::Yellow);
    assert_eq!(at(2325), LightState::Red);
}

#[test]
fn unknown_light_and_gaps_are_red() {
    let c = clock(50, &[(100, 200)]);
    assert_eq!(c.state("nope", FrameIndex(150)), LightState::Red);
    assert_eq!(c.state("X", FrameIndex(0)), LightState::Red);
    assert_eq!(c.state("X", FrameIndex(10_000)), LightState::Red);
}

#[test]
fn window_boundaries_for_several_transition_lengths() {
    for y in [0u64, 1, 2, 50, 75] {
        let c = clock(y, &[(500, 900), (2000, 2100)]);
        for &(s, e) in &[(500u64, 900u64), (2000, 2100)] {
            assert_eq!(c.state("X", FrameIndex(s)), LightState::Green);
            assert_eq!(c.state("X", FrameIndex(e - 1)), LightState::Green);
            if y > 1 {
                assert_eq!(c.state("X", FrameIndex(s - 1)), LightState::Yellow);
                assert_eq!(c.state("X", FrameIndex(e)), LightState::Yellow);
            } else if y == 1 {
                // The pre-green band is Y - 1 frames long; the post-green band is Y.
                assert_eq!(c.state("X", FrameIndex(s - 1)), LightState::Red);
                assert_eq!(c.state("X", FrameIndex(e)), LightState::Yellow);
                assert_eq!(c.state("X", FrameIndex(e + 1)), LightState::Red);
            } else {
                assert_eq!(c.state("X", FrameIndex(s - 1)), LightState::Red);
                assert_eq!(c.state("X", FrameIndex(e)), LightState::Red);
            }
        }
    }
}

#[test]
fn early_window_clearance_starts_at_frame_zero() {
    let c = clock(75, &[(30, 60)]);
    assert_eq!(c.state("X", FrameIndex(0)), LightState::Yellow);
    assert_eq!(c.state("X", FrameIndex(29)), LightState::Yellow);
}

#[test]
fn pre_green_band_can_be_disabled() {
    let c = clock(50, &[(1000, 1100)]).with_pre_green(false);
    assert_eq!(c.state("X", FrameIndex(999)), LightState::Red);
    assert_eq!(c.state("X", FrameIndex(1100)), LightState::Yellow);
    assert_eq!(c.state("X", FrameIndex(1149)), LightState::Yellow);
    assert_eq!(c.state("X", FrameIndex(1150)), LightState::Red);
}

#[test]
fn first_matching_window_wins() {
    // Post-green band of the first window overlaps the pre-green band of the second.
    let c = clock(75, &[(100, 200), (250, 300)]);
    assert_eq!(c.state("X", FrameIndex(240)), LightState::Yellow);
    assert_eq!(c.state("X", FrameIndex(260)), LightState::Green);
}

#[test]
fn panel_lights_exactly_one_lamp() {
    let c = clock(75, &[(1020, 2250)]);
    assert_eq!(
        c.panel("X", FrameIndex(1500)),
        PanelLamps {
            red: false,
            yellow: false,
            green: true
        }
    );
    assert!(c.panel("X", FrameIndex(0)).red);
    assert!(c.panel("X", FrameIndex(2260)).yellow);
}

#[test]
fn schedule_json_roundtrips_pairs() {
    let s = LightSchedule::from_json(r#"{"ID-2": [[1020, 2250], [5000, 6000]], "ID-4": []}"#)
        .unwrap();
    assert_eq!(s.windows("ID-2").len(), 2);
    assert_eq!(s.windows("ID-2")[1], GreenWindow::new(5000, 6000));
    assert!(s.contains("ID-4"));
    assert!(s.windows("ID-9").is_empty());
    let back = serde_json::to_string(&s).unwrap();
    assert!(back.contains("[1020,2250]"));
}

#[test]
fn validate_rejects_inverted_and_unsorted_windows() {
    let mut s = LightSchedule::new();
    s.insert("A", vec![GreenWindow::new(10, 5)]);
    assert!(s.validate(75).is_err());

    let mut s = LightSchedule::new();
    s.insert("A", vec![GreenWindow::new(500, 600), GreenWindow::new(100, 200)]);
    assert!(s.validate(75).is_err());

    let mut s = LightSchedule::new();
    s.insert("A", vec![GreenWindow::new(100, 200), GreenWindow::new(220, 300)]);
    assert!(s.validate(75).is_ok());
}
