use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "intersight", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Overlay a video or image sequence and write MP4/PNGs plus a JSONL report.
    Run(RunArgs),
    /// Print the state of a light at one or more frames.
    State(StateArgs),
    /// Generate a cycle schedule JSON.
    Schedule(ScheduleArgs),
    /// Replay an annotation event log into a scene file.
    Calibrate(CalibrateArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Input video (decoded with `ffmpeg`).
    #[arg(long, conflicts_with = "images")]
    video: Option<PathBuf>,

    /// Input directory of still images.
    #[arg(long)]
    images: Option<PathBuf>,

    /// Frame rate for image sequences.
    #[arg(long, default_value = "30")]
    fps: String,

    /// Output MP4 path (requires `ffmpeg` on PATH).
    #[arg(long, conflicts_with = "png_dir")]
    out: Option<PathBuf>,

    /// x264 constant rate factor for `--out`.
    #[arg(long, requires = "out")]
    crf: Option<u8>,

    /// x264 preset for `--out`.
    #[arg(long, requires = "out")]
    preset: Option<String>,

    /// Output directory for a PNG sequence.
    #[arg(long)]
    png_dir: Option<PathBuf>,

    /// Per-frame JSON Lines report.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Reference image, overriding the scene's.
    #[arg(long, conflicts_with = "reference_frame")]
    reference: Option<PathBuf>,

    /// Use this zero-based frame of the input as the reference image.
    #[arg(long)]
    reference_frame: Option<u64>,

    /// Tracker config JSON.
    #[arg(long)]
    tracker: Option<PathBuf>,

    /// Estimate chunks of frames in parallel before drawing them.
    #[arg(long)]
    batch: bool,

    /// Frames per batch chunk.
    #[arg(long, default_value_t = 32)]
    chunk_size: usize,

    /// Worker threads for batch mode.
    #[arg(long)]
    threads: Option<usize>,

    /// Transition window in frames.
    #[arg(long)]
    transition_frames: Option<u64>,

    #[arg(long, value_enum)]
    yellow: Option<YellowArg>,

    #[arg(long, value_enum)]
    split: Option<SplitArg>,

    #[arg(long, value_enum)]
    fallback: Option<FallbackArg>,

    /// Do not draw the frame index stamp.
    #[arg(long)]
    no_stamp: bool,

    /// Do not draw light and intersection id labels.
    #[arg(long)]
    no_labels: bool,

    /// Disable the pre-green clearance band.
    #[arg(long)]
    no_pre_green: bool,
}

#[derive(Parser, Debug)]
struct StateArgs {
    /// Schedule JSON (`{"ID-1": [[start, end], ...]}`) or a scene JSON with `--scene`.
    #[arg(long)]
    schedule: PathBuf,

    /// Treat `--schedule` as a scene file and use its policy.
    #[arg(long)]
    scene: bool,

    #[arg(long)]
    light: String,

    /// Frames to query.
    #[arg(long, num_args = 1.., required = true)]
    frame: Vec<u64>,

    #[arg(long, default_value_t = intersight::schedule::clock::DEFAULT_TRANSITION_FRAMES)]
    transition_frames: u64,

    /// Disable the pre-green clearance band.
    #[arg(long)]
    no_pre_green: bool,
}

#[derive(Parser, Debug)]
struct ScheduleArgs {
    /// Cycle plan JSON. Uses the built-in four-arm plan when omitted.
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Override the plan's total frame count.
    #[arg(long)]
    total_frames: Option<u64>,

    /// Output schedule JSON.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct CalibrateArgs {
    /// Scene JSON with intersections' world quads.
    #[arg(long)]
    scene: PathBuf,

    /// JSON array of annotation events.
    #[arg(long)]
    events: PathBuf,

    /// Output scene JSON.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum YellowArg {
    Pass,
    Stop,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SplitArg {
    AllRedStops,
    AnyPassable,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FallbackArg {
    ReuseStale,
    Skip,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::State(args) => cmd_state(args),
        Command::Schedule(args) => cmd_schedule(args),
        Command::Calibrate(args) => cmd_calibrate(args),
    }
}

fn open_source(args: &RunArgs) -> anyhow::Result<Box<dyn intersight::FrameSource>> {
    match (&args.video, &args.images) {
        (Some(video), _) => Ok(Box::new(intersight::FfmpegSource::open(video)?)),
        (None, Some(dir)) => {
            let fps = intersight::Fps::parse_ratio(&args.fps)?;
            Ok(Box::new(intersight::ImageSequenceSource::from_dir(dir, fps)?))
        }
        (None, None) => anyhow::bail!("one of --video or --images is required"),
    }
}

fn load_reference(args: &RunArgs, scene: &intersight::Scene) -> anyhow::Result<intersight::FrameRGBA> {
    if let Some(n) = args.reference_frame {
        let mut src = open_source(args)?;
        return intersight::source::capture_frame(src.as_mut(), n)
            .with_context(|| format!("capture reference frame {n}"));
    }
    let path = args
        .reference
        .as_ref()
        .or(scene.reference_image.as_ref())
        .context("no reference image: pass --reference, --reference-frame or set reference_image")?;
    intersight::FrameRGBA::from_path(path)
        .with_context(|| format!("load reference image '{}'", path.display()))
}

fn apply_overrides(args: &RunArgs, policy: &mut intersight::OverlayPolicy) {
    if let Some(y) = args.transition_frames {
        policy.transition_frames = y;
    }
    if let Some(y) = args.yellow {
        policy.classifier.yellow = match y {
            YellowArg::Pass => intersight::YellowPolicy::Pass,
            YellowArg::Stop => intersight::YellowPolicy::Stop,
        };
    }
    if let Some(s) = args.split {
        policy.classifier.split = match s {
            SplitArg::AllRedStops => intersight::SplitRule::AllRedStops,
            SplitArg::AnyPassable => intersight::SplitRule::AnyPassable,
        };
    }
    if let Some(f) = args.fallback {
        policy.fallback = match f {
            FallbackArg::ReuseStale => intersight::FallbackPolicy::ReuseStale,
            FallbackArg::Skip => intersight::FallbackPolicy::SkipOnFailure,
        };
    }
    if args.no_pre_green {
        policy.pre_green = false;
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut scene = intersight::Scene::from_path(&args.scene)?;
    apply_overrides(&args, &mut scene.policy);

    let mut tracker_cfg = match &args.tracker {
        Some(p) => read_json::<intersight::TrackerConfig>(p)?,
        None => intersight::TrackerConfig::default(),
    };
    tracker_cfg.scale_space = tracker_cfg.scale_space.with_env_overrides();

    let reference = load_reference(&args, &scene)?;
    let tracker = intersight::HomographyTracker::new(&reference, tracker_cfg)
        .map_err(|e| anyhow::anyhow!("reference image is unusable: {e}"))?;

    let opts = intersight::SessionOpts {
        mode: if args.batch {
            intersight::ScheduleMode::Batch
        } else {
            intersight::ScheduleMode::Streaming
        },
        chunk_size: args.chunk_size,
        threads: args.threads,
        stamp: !args.no_stamp,
        labels: !args.no_labels,
        ..intersight::SessionOpts::default()
    };
    let mut session = intersight::OverlaySession::new(scene, Arc::new(tracker), opts)?;

    let mut source = open_source(&args)?;
    let mut sink: Box<dyn intersight::FrameSink> = match (&args.out, &args.png_dir) {
        (Some(out), _) => {
            let mut opts = intersight::FfmpegSinkOpts::new(out);
            opts.crf = args.crf;
            opts.preset = args.preset.clone();
            Box::new(intersight::FfmpegSink::new(opts))
        }
        (None, Some(dir)) => Box::new(intersight::PngSequenceSink::new(dir, "frame_")),
        (None, None) => anyhow::bail!("one of --out or --png-dir is required"),
    };

    let mut writer = args
        .report
        .as_ref()
        .map(intersight::ReportWriter::<std::fs::File>::create)
        .transpose()?;
    let mut on_report = |r: &intersight::FrameReport| -> intersight::OverlayResult<()> {
        match writer.as_mut() {
            Some(w) => w.write(r),
            None => Ok(()),
        }
    };

    let stats = session.run(source.as_mut(), sink.as_mut(), &mut on_report)?;
    if let Some(w) = writer {
        w.finish()?;
    }

    eprintln!(
        "frames {} (fresh {}, stale {}, lost {})",
        stats.frames_total, stats.fresh, stats.stale, stats.lost
    );
    for out in [&args.out, &args.png_dir, &args.report].into_iter().flatten() {
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

fn cmd_state(args: StateArgs) -> anyhow::Result<()> {
    let clock = if args.scene {
        intersight::Scene::from_path(&args.schedule)?.clock()
    } else {
        let schedule: intersight::LightSchedule = read_json(&args.schedule)?;
        intersight::ScheduleClock::new(schedule, args.transition_frames)
            .with_pre_green(!args.no_pre_green)
    };
    if !clock.schedule().contains(&args.light) {
        tracing::warn!(light = %args.light, "light not in schedule, every frame reads as red");
    }
    for f in args.frame {
        let state = clock.state(&args.light, intersight::FrameIndex(f));
        println!("{f}\t{state}");
    }
    Ok(())
}

fn cmd_schedule(args: ScheduleArgs) -> anyhow::Result<()> {
    let mut plan = match &args.plan {
        Some(p) => intersight::CyclePlan::from_path(p)?,
        None => intersight::CyclePlan::four_arm_default(),
    };
    if let Some(n) = args.total_frames {
        plan.total_frames = n;
    }
    let schedule = plan.build()?;
    write_json(&args.out, &schedule)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_calibrate(args: CalibrateArgs) -> anyhow::Result<()> {
    let scene = intersight::Scene::from_path(&args.scene)?;
    let events = intersight::calibration::annotate::read_event_log(&args.events)?;
    let mut draft = intersight::CalibrationDraft::new(scene);
    let end = intersight::calibration::annotate::replay(events, &mut draft);
    if end != intersight::AnnotationState::Idle {
        tracing::warn!(state = ?end, pending = draft.pending().len(), "event log ended mid-shape, pending clicks dropped");
    }
    let scene = draft.into_scene();
    let uncalibrated: Vec<&str> = scene
        .intersections
        .iter()
        .filter(|i| !i.is_calibrated())
        .map(|i| i.id.as_str())
        .collect();
    if !uncalibrated.is_empty() {
        tracing::warn!(?uncalibrated, "intersections without baseline");
    }
    std::fs::write(&args.out, scene.to_json_pretty()?)
        .with_context(|| format!("write scene '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let f = std::fs::File::open(path).with_context(|| format!("open '{}'", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(f))
        .with_context(|| format!("parse JSON '{}'", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("serialize JSON")?;
    std::fs::write(path, json).with_context(|| format!("write '{}'", path.display()))
}

#[cfg(test)]
#[path = "../../tests/unit/bin/intersight.rs"]
mod tests;
