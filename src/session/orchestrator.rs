use crate::calibration::scene::{MaskSpace, Scene};
use crate::classify::violation::{CrossingColor, classify};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, Point, Rgb8};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::geometry::homography::Homography;
use crate::geometry::projector::{CrossingLine, ProjectedPolygon};
use crate::render::canvas::OverlayCanvas;
use crate::render::frame::FrameRGBA;
use crate::render::lights::{PanelStyle, draw_light_panels};
use crate::render::mask::MaskCompositor;
use crate::render::stamp::FrameStamp;
use crate::schedule::clock::{LightState, ScheduleClock};
use crate::session::report::{FrameReport, IntersectionReport, SkipReason, TrackingStatus};
use crate::session::sticky::{ComposedTransform, StickyTransforms, TransformKey};
use crate::source::FrameSource;
use crate::tracking::tracker::{MotionEstimator, TrackedMotion, TrackingFailure};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};

/// Consecutive lost frames before a warning is logged.
const LOST_STREAK_WARN: u64 = 30;

const BOUNDARY_WIDTH: f64 = 1.5;
const CROSSING_WIDTH: f64 = 3.0;

/// How estimation is scheduled relative to drawing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Estimate and draw one frame at a time.
    #[default]
    Streaming,
    /// Read a chunk, estimate it in parallel, then draw it in order.
    Batch,
}

/// Options controlling [`OverlaySession::run`].
#[derive(Clone, Debug)]
pub struct SessionOpts {
    pub mode: ScheduleMode,
    /// Frames per batch chunk.
    pub chunk_size: usize,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Bounded channel capacity between the drawing loop and the encoder thread.
    pub channel_capacity: usize,
    /// Draw the frame index stamp.
    pub stamp: bool,
    /// Draw light and intersection ids next to panels and projected polygons.
    pub labels: bool,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            mode: ScheduleMode::Streaming,
            chunk_size: 32,
            threads: None,
            channel_capacity: 4,
            stamp: true,
            labels: true,
        }
    }
}

/// Monotonic frame counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameCursor {
    next: FrameIndex,
}

impl FrameCursor {
    pub fn new(origin: u64) -> Self {
        Self {
            next: FrameIndex(origin),
        }
    }

    /// Index the next frame will get.
    pub fn peek(&self) -> FrameIndex {
        self.next
    }

    /// Claim the next index.
    pub fn advance(&mut self) -> FrameIndex {
        let idx = self.next;
        self.next = idx.next();
        idx
    }
}

/// Cooperative cancellation flag, checked between frames.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Frames emitted to the sink.
    pub frames_total: u64,
    pub fresh: u64,
    pub stale: u64,
    pub lost: u64,
    /// The run stopped early on a [`CancelToken`].
    pub cancelled: bool,
}

impl RunStats {
    fn record(&mut self, status: TrackingStatus) {
        self.frames_total += 1;
        match status {
            TrackingStatus::Fresh => self.fresh += 1,
            TrackingStatus::Stale => self.stale += 1,
            TrackingStatus::Lost => self.lost += 1,
        }
    }
}

struct FrameMsg {
    idx: FrameIndex,
    frame: FrameRGBA,
}

/// Per-frame overlay pipeline.
///
/// Owns the sticky transform cells and the frame cursor; both are mutated only while drawing,
/// which always happens in frame order. Estimation may run ahead in parallel in
/// [`ScheduleMode::Batch`] because every estimate is taken against the fixed reference.
pub struct OverlaySession {
    scene: Scene,
    clock: ScheduleClock,
    estimator: Arc<dyn MotionEstimator>,
    sticky: StickyTransforms,
    cursor: FrameCursor,
    opts: SessionOpts,
    panel_style: PanelStyle,
    masks: MaskCompositor,
    stamp: FrameStamp,
    cancel: CancelToken,
    lost_streak: u64,
}

impl OverlaySession {
    /// Validate `scene` and set up a session.
    pub fn new(
        scene: Scene,
        estimator: Arc<dyn MotionEstimator>,
        opts: SessionOpts,
    ) -> OverlayResult<Self> {
        scene.validate()?;
        let mut panel_style = PanelStyle::default();
        if !opts.labels {
            panel_style.label = None;
        }
        Ok(Self {
            clock: scene.clock(),
            cursor: FrameCursor::new(scene.policy.frame_origin),
            scene,
            estimator,
            sticky: StickyTransforms::new(),
            opts,
            panel_style,
            masks: MaskCompositor::default(),
            stamp: FrameStamp::default(),
            cancel: CancelToken::new(),
            lost_streak: 0,
        })
    }

    /// Handle that cancels [`OverlaySession::run`] from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Index the next processed frame will get.
    pub fn next_frame_index(&self) -> FrameIndex {
        self.cursor.peek()
    }

    /// Override the panel look. Panel labels stay off when [`SessionOpts::labels`] is unset.
    pub fn set_panel_style(&mut self, mut style: PanelStyle) {
        if !self.opts.labels {
            style.label = None;
        }
        self.panel_style = style;
    }

    /// Estimate and draw one frame in place (streaming step).
    #[tracing::instrument(skip_all, fields(frame = self.cursor.peek().0))]
    pub fn process_frame(&mut self, frame: &mut FrameRGBA) -> OverlayResult<FrameReport> {
        let idx = self.cursor.advance();
        let motion = self.estimator.track(idx, frame);
        self.draw(idx, frame, motion)
    }

    /// Decode every frame of `source`, overlay it, and push it into `sink`.
    ///
    /// `on_report` receives each frame's report before the frame is handed to the sink. The
    /// sink is always ended, also when the source fails or the run is cancelled; a source
    /// error is returned after that.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        on_report: &mut dyn FnMut(&FrameReport) -> OverlayResult<()>,
    ) -> OverlayResult<RunStats> {
        let info = source.info();
        if let Some(c) = self.scene.canvas
            && c != info.canvas
        {
            return Err(OverlayError::validation(format!(
                "scene expects {}x{} frames, source is {}x{}",
                c.width, c.height, info.canvas.width, info.canvas.height
            )));
        }
        let cfg = SinkConfig {
            width: info.canvas.width,
            height: info.canvas.height,
            fps: info.fps,
        };
        let pool = match self.opts.mode {
            ScheduleMode::Batch => Some(build_thread_pool(self.opts.threads)?),
            ScheduleMode::Streaming => None,
        };
        let cap = self.opts.channel_capacity.max(1);
        tracing::info!(
            mode = ?self.opts.mode,
            width = cfg.width,
            height = cfg.height,
            first_frame = self.cursor.peek().0,
            "overlay run started"
        );

        let stats = std::thread::scope(|scope| -> OverlayResult<RunStats> {
            let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);

            let sink_ref: &mut dyn FrameSink = sink;

            let enc = scope.spawn(move || -> OverlayResult<()> {
                sink_ref.begin(cfg)?;
                let mut res = Ok(());
                for msg in rx {
                    if let Err(e) = sink_ref.push_frame(msg.idx, &msg.frame) {
                        res = Err(e);
                        break;
                    }
                }
                let end = sink_ref.end();
                res.and(end)
            });

            let produced = match pool.as_ref() {
                Some(pool) => self.produce_batch(source, pool, &tx, on_report),
                None => self.produce_streaming(source, &tx, on_report),
            };

            drop(tx);
            let enc_res = enc
                .join()
                .map_err(|_| OverlayError::encode("encoder thread panicked"))?;
            // A sink failure shows up on the producer side as a closed channel.
            enc_res?;
            produced
        })?;

        tracing::info!(
            frames = stats.frames_total,
            fresh = stats.fresh,
            stale = stats.stale,
            lost = stats.lost,
            cancelled = stats.cancelled,
            "overlay run finished"
        );
        Ok(stats)
    }

    fn produce_streaming(
        &mut self,
        source: &mut dyn FrameSource,
        tx: &mpsc::SyncSender<FrameMsg>,
        on_report: &mut dyn FnMut(&FrameReport) -> OverlayResult<()>,
    ) -> OverlayResult<RunStats> {
        let mut stats = RunStats::default();
        loop {
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
            let Some(mut frame) = source.next_frame()? else {
                break;
            };
            let report = self.process_frame(&mut frame)?;
            emit(report, frame, tx, on_report, &mut stats)?;
        }
        Ok(stats)
    }

    fn produce_batch(
        &mut self,
        source: &mut dyn FrameSource,
        pool: &rayon::ThreadPool,
        tx: &mpsc::SyncSender<FrameMsg>,
        on_report: &mut dyn FnMut(&FrameReport) -> OverlayResult<()>,
    ) -> OverlayResult<RunStats> {
        let chunk_size = normalized_chunk_size(self.opts.chunk_size);
        let mut stats = RunStats::default();
        let mut exhausted = false;
        // A read error ends the run only after the frames decoded before it are emitted.
        let mut read_err: Option<OverlayError> = None;
        while !exhausted {
            let mut chunk = Vec::with_capacity(chunk_size);
            while chunk.len() < chunk_size {
                if self.cancel.is_cancelled() {
                    break;
                }
                match source.next_frame() {
                    Ok(Some(frame)) => chunk.push((self.cursor.advance(), frame)),
                    Ok(None) => {
                        exhausted = true;
                        break;
                    }
                    Err(e) => {
                        read_err = Some(e);
                        exhausted = true;
                        break;
                    }
                }
            }
            if chunk.is_empty() {
                stats.cancelled = self.cancel.is_cancelled();
                break;
            }

            let estimator = &self.estimator;
            let mut estimates: Vec<(FrameIndex, Result<TrackedMotion, TrackingFailure>)> =
                pool.install(|| {
                    chunk
                        .par_iter()
                        .map(|(idx, frame)| (*idx, estimator.track(*idx, frame)))
                        .collect()
                });
            estimates.sort_unstable_by_key(|(idx, _)| *idx);
            tracing::debug!(frames = chunk.len(), "batch chunk estimated");

            for ((idx, mut frame), (est_idx, motion)) in chunk.into_iter().zip(estimates) {
                debug_assert_eq!(idx, est_idx);
                if self.cancel.is_cancelled() {
                    stats.cancelled = true;
                    return Ok(stats);
                }
                let report = self.draw(idx, &mut frame, motion)?;
                emit(report, frame, tx, on_report, &mut stats)?;
            }
            if self.cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }
        }
        match read_err {
            Some(e) if !stats.cancelled => Err(e),
            _ => Ok(stats),
        }
    }

    /// Resolve transforms and draw every overlay layer onto `frame`.
    fn draw(
        &mut self,
        idx: FrameIndex,
        frame: &mut FrameRGBA,
        motion: Result<TrackedMotion, TrackingFailure>,
    ) -> OverlayResult<FrameReport> {
        let policy = self.scene.policy.clone();
        let (relative, matches) = match &motion {
            Ok(m) => (Some(m.homography), Some((m.matches, m.inliers))),
            Err(e) => {
                tracing::debug!(frame = idx.0, error = %e, "tracking failed");
                (None, None)
            }
        };

        let global = self
            .sticky
            .resolve(TransformKey::Global, relative, idx, policy.fallback);
        let mut composed: HashMap<String, ComposedTransform> = HashMap::new();
        let mut skips: HashMap<String, SkipReason> = HashMap::new();
        for inter in &self.scene.intersections {
            let Some(baseline) = inter.baseline else {
                skips.insert(inter.id.clone(), SkipReason::CalibrationMissing);
                continue;
            };
            let fresh = relative.map(|rel| rel.compose(&baseline));
            let key = TransformKey::Intersection(inter.id.clone());
            match self.sticky.resolve(key, fresh, idx, policy.fallback) {
                Some(t) => {
                    if t.stale {
                        tracing::debug!(frame = idx.0, id = %inter.id, from = t.source_frame.0, "reusing stale transform");
                    }
                    composed.insert(inter.id.clone(), t);
                }
                None => {
                    tracing::debug!(frame = idx.0, id = %inter.id, "intersection skipped, no transform");
                    skips.insert(inter.id.clone(), SkipReason::TransformUnavailable);
                }
            }
        }

        let tracking = if relative.is_some() {
            TrackingStatus::Fresh
        } else if global.is_some() || !composed.is_empty() {
            TrackingStatus::Stale
        } else {
            TrackingStatus::Lost
        };
        self.note_tracking(idx, tracking);

        let mut canvas = OverlayCanvas::new(frame.width, frame.height)?;

        // Panels do not depend on tracking.
        draw_light_panels(
            &mut canvas,
            &self.scene.light_panels,
            &self.clock,
            idx,
            &self.panel_style,
        );

        let mut intersections = Vec::with_capacity(self.scene.intersections.len());
        for inter in &self.scene.intersections {
            let classification = classify(&inter.signal, &self.clock, idx, &policy.classifier);
            let mut rep = IntersectionReport {
                id: inter.id.clone(),
                status: None,
                polygon: None,
                crossing: None,
                classification,
                skipped: skips.get(&inter.id).copied(),
            };
            if let Some(t) = composed.get(&inter.id) {
                rep.status = Some(if t.stale {
                    TrackingStatus::Stale
                } else {
                    TrackingStatus::Fresh
                });
                match ProjectedPolygon::project(&inter.world, &t.homography) {
                    Some(poly) => {
                        canvas.stroke_path(&poly.to_path(), inter.color, BOUNDARY_WIDTH);
                        if self.opts.labels {
                            draw_polygon_label(&mut canvas, &poly, &inter.id, inter.color);
                        }
                        let crossing = match inter.crossing {
                            Some(ends) => CrossingLine::project_explicit(
                                ends,
                                &t.homography,
                                policy.crossing_offset_px,
                                inter.flip_crossing,
                            ),
                            None => CrossingLine::from_polygon(
                                &poly,
                                policy.crossing_offset_px,
                                inter.flip_crossing,
                            ),
                        };
                        if let Some(line) = &crossing {
                            canvas.stroke_path(
                                &line.to_path(),
                                crossing_rgb(rep.classification.color),
                                CROSSING_WIDTH,
                            );
                        }
                        rep.crossing = crossing;
                        rep.polygon = Some(poly.vertices);
                    }
                    None => {
                        tracing::debug!(frame = idx.0, id = %inter.id, "degenerate projection");
                        rep.skipped = Some(SkipReason::DegenerateProjection);
                    }
                }
            } else if skips.get(&inter.id) == Some(&SkipReason::TransformUnavailable) {
                rep.status = Some(TrackingStatus::Lost);
            }
            intersections.push(rep);
        }

        let global_h = global.map(|t| t.homography);
        let by_id: HashMap<&str, Homography> = composed
            .iter()
            .map(|(id, t)| (id.as_str(), t.homography))
            .collect();
        let masks = self
            .masks
            .apply(&mut canvas, &self.scene.masks, |space| match space {
                MaskSpace::Reference => global_h,
                MaskSpace::Intersection(id) => by_id.get(id.as_str()).copied(),
            });

        if self.opts.stamp {
            self.stamp.draw(&mut canvas, idx);
        }
        canvas.composite_onto(frame)?;

        Ok(FrameReport {
            frame: idx,
            tracking,
            matches,
            intersections,
            lights: self.light_states(idx),
            masks_drawn: masks.drawn,
            masks_skipped: masks.skipped,
        })
    }

    fn light_states(&self, idx: FrameIndex) -> BTreeMap<String, LightState> {
        let panel_lights = self.scene.light_panels.iter().map(|p| p.light.as_str());
        let signal_lights = self
            .scene
            .intersections
            .iter()
            .flat_map(|i| i.signal.lights().into_iter().map(|(_, l)| l));
        panel_lights
            .chain(signal_lights)
            .map(|l| (l.to_string(), self.clock.state(l, idx)))
            .collect()
    }

    fn note_tracking(&mut self, idx: FrameIndex, status: TrackingStatus) {
        if status == TrackingStatus::Fresh {
            if self.lost_streak >= LOST_STREAK_WARN {
                tracing::info!(frame = idx.0, after = self.lost_streak, "tracking recovered");
            }
            self.lost_streak = 0;
            return;
        }
        self.lost_streak += 1;
        if self.lost_streak == LOST_STREAK_WARN {
            tracing::warn!(frame = idx.0, frames = self.lost_streak, ?status, "tracking failing repeatedly");
        }
    }
}

fn emit(
    report: FrameReport,
    frame: FrameRGBA,
    tx: &mpsc::SyncSender<FrameMsg>,
    on_report: &mut dyn FnMut(&FrameReport) -> OverlayResult<()>,
    stats: &mut RunStats,
) -> OverlayResult<()> {
    on_report(&report)?;
    tx.send(FrameMsg {
        idx: report.frame,
        frame,
    })
    .map_err(|_| OverlayError::encode("encoder thread is not accepting frames"))?;
    stats.record(report.tracking);
    Ok(())
}

/// Id label centered on the polygon's vertex mean.
fn draw_polygon_label(
    canvas: &mut OverlayCanvas,
    poly: &ProjectedPolygon,
    id: &str,
    color: Rgb8,
) {
    let n = poly.vertices.len() as f64;
    if n == 0.0 {
        return;
    }
    let (sx, sy) = poly
        .vertices
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    let label = FrameStamp::label(color);
    let origin = Point::new(
        sx / n - label.text_width(id) / 2.0,
        sy / n + label.digit_height / 2.0,
    );
    label.at(origin).draw_text(canvas, id);
}

fn crossing_rgb(c: CrossingColor) -> Rgb8 {
    match c {
        CrossingColor::Pass => Rgb8::GREEN,
        CrossingColor::Stop => Rgb8::RED,
    }
}

fn normalized_chunk_size(chunk_size: usize) -> usize {
    chunk_size.max(1)
}

fn build_thread_pool(threads: Option<usize>) -> OverlayResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(OverlayError::validation(
            "session 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| OverlayError::validation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/session/orchestrator.rs"]
mod tests;
