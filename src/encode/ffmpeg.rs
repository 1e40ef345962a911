use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::frame::FrameRGBA;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 path.
    pub out_path: PathBuf,
    /// Replace an existing file at `out_path`.
    pub overwrite: bool,
    /// x264 constant rate factor; encoder default when `None`.
    pub crf: Option<u8>,
    /// x264 preset name, e.g. `"veryfast"`.
    pub preset: Option<String>,
    /// Color under translucent pixels. Decoded frames are opaque, so this only matters for
    /// synthetic input.
    pub bg_rgb: [u8; 3],
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            crf: None,
            preset: None,
            bg_rgb: [0, 0, 0],
        }
    }
}

struct Encoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: JoinHandle<std::io::Result<Vec<u8>>>,
}

/// Encodes overlaid frames to H.264 MP4 by piping raw RGBA into the system `ffmpeg`.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    encoder: Option<Encoder>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    row: Vec<u8>,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            encoder: None,
            cfg: None,
            last_idx: None,
            row: Vec::new(),
        }
    }

    /// Command-line arguments for an encoder fed with `cfg`-sized frames.
    pub fn ffmpeg_args(&self, cfg: SinkConfig) -> Vec<String> {
        let mut args: Vec<String> = vec![
            if self.opts.overwrite { "-y" } else { "-n" }.into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgba".into(),
            "-s".into(),
            format!("{}x{}", cfg.width, cfg.height),
            // Input rate must precede `-i` for rawvideo.
            "-r".into(),
            format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i".into(),
            "pipe:0".into(),
            "-an".into(),
            "-c:v".into(),
            "libx264".into(),
        ];
        if let Some(preset) = &self.opts.preset {
            args.extend(["-preset".into(), preset.clone()]);
        }
        if let Some(crf) = self.opts.crf {
            args.extend(["-crf".into(), crf.to_string()]);
        }
        args.extend(
            ["-pix_fmt", "yuv420p", "-movflags", "+faststart"]
                .into_iter()
                .map(String::from),
        );
        args.push(self.opts.out_path.display().to_string());
        args
    }

    fn check_config(&self, cfg: SinkConfig) -> OverlayResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(OverlayError::validation("output frame size must be non-zero"));
        }
        // yuv420p subsamples chroma 2x2.
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(OverlayError::validation(format!(
                "MP4 output needs even frame dimensions, got {}x{}",
                cfg.width, cfg.height
            )));
        }
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(OverlayError::validation(format!(
                "output file '{}' already exists",
                self.opts.out_path.display()
            )));
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> OverlayResult<()> {
        self.check_config(cfg)?;
        ensure_parent_dir(&self.opts.out_path)?;
        if !is_ffmpeg_on_path() {
            return Err(OverlayError::encode("ffmpeg not found on PATH"));
        }

        let mut child = Command::new("ffmpeg")
            .args(self.ffmpeg_args(cfg))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| OverlayError::encode(format!("spawn ffmpeg encoder: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OverlayError::encode("ffmpeg encoder stdin unavailable"))?;
        let mut err_pipe = child
            .stderr
            .take()
            .ok_or_else(|| OverlayError::encode("ffmpeg encoder stderr unavailable"))?;
        let stderr = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            err_pipe.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        tracing::info!(
            out = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            fps = cfg.fps.as_f64(),
            "mp4 encoder started"
        );
        self.encoder = Some(Encoder {
            child,
            stdin: Some(stdin),
            stderr,
        });
        self.row = vec![0u8; cfg.width as usize * 4];
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> OverlayResult<()> {
        let (Some(cfg), Some(enc)) = (self.cfg, self.encoder.as_mut()) else {
            return Err(OverlayError::encode("mp4 sink not started"));
        };
        if self.last_idx.is_some_and(|last| idx <= last) {
            return Err(OverlayError::encode(format!(
                "frame {idx} arrived after frame {}",
                self.last_idx.map_or(0, |l| l.0)
            )));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(OverlayError::validation(format!(
                "frame {idx} is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        let stdin = enc
            .stdin
            .as_mut()
            .ok_or_else(|| OverlayError::encode("mp4 sink already ended"))?;

        let stride = cfg.width as usize * 4;
        for src in frame.data.chunks_exact(stride) {
            flatten_straight_over_bg(&mut self.row, src, self.opts.bg_rgb)?;
            stdin
                .write_all(&self.row)
                .map_err(|e| OverlayError::encode(format!("write frame {idx} to ffmpeg: {e}")))?;
        }
        self.last_idx = Some(idx);
        Ok(())
    }

    fn end(&mut self) -> OverlayResult<()> {
        let mut enc = self
            .encoder
            .take()
            .ok_or_else(|| OverlayError::encode("mp4 sink not started"))?;
        self.cfg = None;
        drop(enc.stdin.take());

        let status = enc
            .child
            .wait()
            .map_err(|e| OverlayError::encode(format!("wait for ffmpeg encoder: {e}")))?;
        let log = enc
            .stderr
            .join()
            .map_err(|_| OverlayError::encode("ffmpeg stderr reader panicked"))?
            .map_err(|e| OverlayError::encode(format!("read ffmpeg stderr: {e}")))?;
        if !status.success() {
            return Err(OverlayError::encode(format!(
                "ffmpeg encoder exited with {status}: {}",
                String::from_utf8_lossy(&log).trim()
            )));
        }
        tracing::info!(
            out = %self.opts.out_path.display(),
            last_frame = self.last_idx.map(|i| i.0),
            "mp4 written"
        );
        Ok(())
    }
}

/// Composite straight-alpha RGBA8 over an opaque background.
fn flatten_straight_over_bg(dst: &mut [u8], src: &[u8], bg: [u8; 3]) -> OverlayResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(OverlayError::validation("RGBA buffer length mismatch"));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u32::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        for c in 0..3 {
            let v = u32::from(s[c]) * a + u32::from(bg[c]) * (255 - a);
            d[c] = ((v + 127) / 255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

/// Create the parent directory of an output file.
pub fn ensure_parent_dir(path: &Path) -> OverlayResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
