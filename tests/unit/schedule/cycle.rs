use super::*;

#[test]
fn default_plan_first_cycle_matches_survey() {
    let s = CyclePlan::four_arm_default().build().unwrap();
    assert_eq!(s.windows("ID-2")[0], GreenWindow::new(0, 360));
    assert_eq!(s.windows("ID-4")[0], GreenWindow::new(510, 870));
    assert_eq!(s.windows("ID-1-L")[0], GreenWindow::new(1020, 1470));
    assert_eq!(s.windows("ID-1-F")[0], GreenWindow::new(1020, 2250));
    assert_eq!(s.windows("ID-3-F")[0], GreenWindow::new(1620, 2850));
    assert_eq!(s.windows("ID-3-L")[0], GreenWindow::new(2400, 2850));
    // Second cycle starts one gap after the longest window of the first.
    assert_eq!(s.windows("ID-2")[1].start, 3000);
}

#[test]
fn switch_applies_to_later_cycles_only() {
    let plan = CyclePlan::four_arm_default();
    let s = plan.build().unwrap();
    for w in s.windows("ID-2") {
        let len = w.end - w.start;
        if w.end == plan.total_frames {
            continue;
        }
        if w.start >= 11_250 {
            assert_eq!(len, 390);
        } else {
            assert_eq!(len, 360);
        }
    }
}

#[test]
fn windows_are_clipped_to_total() {
    let plan = CyclePlan {
        steps: vec![PhaseStep {
            light: "A".into(),
            start: PhaseStart::CycleStart,
            duration: 100,
        }],
        gap_frames: 50,
        total_frames: 320,
        switch: None,
    };
    let s = plan.build().unwrap();
    assert_eq!(
        s.windows("A"),
        &[
            GreenWindow::new(0, 100),
            GreenWindow::new(150, 250),
            GreenWindow::new(300, 320)
        ]
    );
}

#[test]
fn forward_references_are_rejected() {
    let plan = CyclePlan {
        steps: vec![PhaseStep {
            light: "A".into(),
            start: PhaseStart::After("B".into()),
            duration: 10,
        }],
        gap_frames: 0,
        total_frames: 100,
        switch: None,
    };
    assert!(plan.build().is_err());
}

#[test]
fn stalled_plan_is_an_error() {
    let plan = CyclePlan {
        steps: vec![PhaseStep {
            light: "A".into(),
            start: PhaseStart::CycleStart,
            duration: 0,
        }],
        gap_frames: 0,
        total_frames: 100,
        switch: None,
    };
    assert!(plan.build().is_err());
}

#[test]
fn plan_parses_from_json() {
    let plan: CyclePlan = serde_json::from_str(
        r#"{
            "steps": [
                {"light": "A", "start": "cycle_start", "duration": 10},
                {"light": "B", "start": {"after": "A"}, "duration": 5},
                {"light": "C", "start": {"with": "B"}, "duration": 7}
            ],
            "gap_frames": 2,
            "total_frames": 40
        }"#,
    )
    .unwrap();
    let s = plan.build().unwrap();
    assert_eq!(s.windows("B")[0], GreenWindow::new(12, 17));
    assert_eq!(s.windows("C")[0], GreenWindow::new(12, 19));
    assert_eq!(s.windows("A")[1].start, 21);
}
