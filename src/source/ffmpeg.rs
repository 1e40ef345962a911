use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::frame::FrameRGBA;
use crate::source::{FrameSource, SourceInfo};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Metadata of a video file as reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    /// Frame count when the container records one.
    pub frame_count: Option<u64>,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    streams: Vec<ProbeStream>,
}

/// Probe the first video stream of `path`.
pub fn probe_video(path: &Path) -> OverlayResult<VideoInfo> {
    let out = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| OverlayError::source(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(OverlayError::source(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_probe(path, &out.stdout)
}

fn parse_probe(path: &Path, json: &[u8]) -> OverlayResult<VideoInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| OverlayError::source(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| OverlayError::source("no video stream found"))?;
    let width = video
        .width
        .ok_or_else(|| OverlayError::source("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| OverlayError::source("missing video height from ffprobe"))?;
    // r_frame_rate is "0/0" for some containers.
    let fps = [&video.avg_frame_rate, &video.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|r| Fps::parse_ratio(r).ok())
        .ok_or_else(|| OverlayError::source("missing or invalid frame rate from ffprobe"))?;
    let frame_count = video.nb_frames.as_deref().and_then(|n| n.parse().ok());
    Ok(VideoInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps,
        frame_count,
    })
}

/// Streams decoded RGBA frames from a long-running `ffmpeg` process.
pub struct FfmpegSource {
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    frame_len: usize,
    finished: bool,
}

impl FfmpegSource {
    /// Probe `path` and start decoding.
    pub fn open(path: impl AsRef<Path>) -> OverlayResult<Self> {
        let path = path.as_ref();
        let info = probe_video(path)?;
        let frame_len = Canvas {
            width: info.width,
            height: info.height,
        }
        .rgba_len();
        if frame_len == 0 {
            return Err(OverlayError::source(
                "decoded video frame size is zero (invalid source dimensions)",
            ));
        }

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                OverlayError::source(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OverlayError::source("failed to open ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| OverlayError::source("failed to open ffmpeg stderr"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        tracing::info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps.as_f64(),
            frames = ?info.frame_count,
            "video source opened"
        );
        Ok(Self {
            info,
            child,
            stdout,
            stderr_drain: Some(stderr_drain),
            frame_len,
            finished: false,
        })
    }

    /// Probed metadata.
    pub fn video_info(&self) -> &VideoInfo {
        &self.info
    }

    fn finish(&mut self) -> OverlayResult<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| OverlayError::source(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = match self.stderr_drain.take() {
            Some(h) => h
                .join()
                .map_err(|_| OverlayError::source("ffmpeg stderr drain thread panicked"))?
                .unwrap_or_default(),
            None => Vec::new(),
        };
        if !status.success() {
            return Err(OverlayError::source(format!(
                "ffmpeg decode failed for '{}': {}",
                self.info.path.display(),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            canvas: Canvas {
                width: self.info.width,
                height: self.info.height,
            },
            fps: self.info.fps,
        }
    }

    fn next_frame(&mut self) -> OverlayResult<Option<FrameRGBA>> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.frame_len];
        let got = read_full(&mut self.stdout, &mut buf)
            .map_err(|e| OverlayError::source(format!("read from ffmpeg: {e}")))?;
        if got == 0 {
            self.finish()?;
            return Ok(None);
        }
        if got < self.frame_len {
            self.finish()?;
            return Err(OverlayError::source(format!(
                "truncated frame from ffmpeg: got {got} of {} bytes",
                self.frame_len
            )));
        }
        FrameRGBA::new(self.info.width, self.info.height, buf).map(Some)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read.
fn read_full(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
#[path = "../../tests/unit/source/ffmpeg.rs"]
mod tests;
