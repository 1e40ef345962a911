use super::*;

fn run_args(extra: &[&str]) -> RunArgs {
    let mut argv = vec!["intersight", "run", "--scene", "scene.json", "--png-dir", "out"];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).unwrap().cmd {
        Command::Run(args) => args,
        other => panic!("unexpected subcommand {other:?}"),
    }
}

#[test]
fn run_flags_override_scene_policy() {
    let mut policy = intersight::OverlayPolicy::default();
    apply_overrides(
        &run_args(&["--no-pre-green", "--transition-frames", "3", "--fallback", "skip"]),
        &mut policy,
    );
    assert!(!policy.pre_green);
    assert_eq!(policy.transition_frames, 3);
    assert_eq!(policy.fallback, intersight::FallbackPolicy::SkipOnFailure);
}

#[test]
fn run_without_flags_keeps_scene_policy() {
    let mut policy = intersight::OverlayPolicy::default();
    policy.transition_frames = 9;
    apply_overrides(&run_args(&[]), &mut policy);
    assert!(policy.pre_green);
    assert_eq!(policy.transition_frames, 9);
}

#[test]
fn crf_requires_mp4_output() {
    let err = Cli::try_parse_from([
        "intersight", "run", "--scene", "s.json", "--png-dir", "out", "--crf", "20",
    ])
    .unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}
