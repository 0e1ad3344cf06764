//! FFmpeg-backed video encoding for text-to-video.
//!
//! Frames are decoded from disk, converted to raw RGB24 and piped into a
//! system `ffmpeg` process that writes an H.264 MP4.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};

use image::imageops::FilterType;
use image::RgbImage;

use crate::frames::{load_rgb, SkippedFrame};

/// Errors that can occur while encoding a video
#[derive(Debug)]
pub enum EncodeError {
    /// The frame list was empty
    NoFrames,
    /// The first frame, which fixes the output resolution, could not be decoded
    UnreadableFirstFrame {
        path: PathBuf,
        source: image::ImageError,
    },
    /// Frame rate of zero
    InvalidFps,
    /// FFmpeg executable not found
    FfmpegNotFound,
    /// Failed to spawn FFmpeg process
    SpawnFailed(std::io::Error),
    /// Output directory could not be created
    OutputDir(std::io::Error),
    /// FFmpeg process exited with non-zero status or stopped reading frames
    ProcessFailed { exit_code: Option<i32>, stderr: String },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::NoFrames => write!(f, "No images provided for video creation"),
            EncodeError::UnreadableFirstFrame { path, source } => {
                write!(f, "Could not read the first frame {}: {}", path.display(), source)
            }
            EncodeError::InvalidFps => write!(f, "Frame rate must be greater than zero"),
            EncodeError::FfmpegNotFound => {
                write!(
                    f,
                    "FFmpeg not found. Install it and make sure `ffmpeg` is on PATH."
                )
            }
            EncodeError::SpawnFailed(e) => write!(f, "Failed to spawn FFmpeg: {}", e),
            EncodeError::OutputDir(e) => write!(f, "Failed to create output directory: {}", e),
            EncodeError::ProcessFailed { exit_code, stderr } => {
                write!(f, "FFmpeg exited with code {:?}\n{}", exit_code, stderr)
            }
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::UnreadableFirstFrame { source, .. } => Some(source),
            EncodeError::SpawnFailed(e) | EncodeError::OutputDir(e) => Some(e),
            _ => None,
        }
    }
}

/// What an encoder wrote and what it had to leave out.
#[derive(Debug, Default)]
pub struct EncodeReport {
    pub frames_written: usize,
    pub skipped: Vec<SkippedFrame>,
    /// Output resolution, taken from the first frame.
    pub dimensions: (u32, u32),
}

/// Turns an ordered list of frame images into a single video file.
pub trait VideoEncoder {
    /// Encode `frames` in order into `output` at `fps`.
    ///
    /// Implementations must fail without creating `output` when `frames` is
    /// empty or the first frame cannot be decoded.
    fn encode(&self, frames: &[PathBuf], output: &Path, fps: u32)
        -> Result<EncodeReport, EncodeError>;
}

/// Check whether an `ffmpeg` binary can be launched.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Build the FFmpeg argument list for a raw RGB24 stream on stdin.
///
/// The output profile is fixed: H.264, yuv420p, faststart MP4, no audio.
/// yuv420p needs even dimensions, so the scale filter rounds them down.
pub fn build_ffmpeg_args(width: u32, height: u32, fps: u32, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-s".to_string(),
        format!("{}x{}", width, height),
        "-r".to_string(),
        fps.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-an".to_string(),
        "-vf".to_string(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        "mp4".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Encoder that drives the system `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific ffmpeg executable instead of the one on PATH.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(
        &self,
        frames: &[PathBuf],
        output: &Path,
        fps: u32,
    ) -> Result<EncodeReport, EncodeError> {
        let Some((first_path, rest)) = frames.split_first() else {
            return Err(EncodeError::NoFrames);
        };
        if fps == 0 {
            return Err(EncodeError::InvalidFps);
        }

        let first = load_rgb(first_path).map_err(|source| EncodeError::UnreadableFirstFrame {
            path: first_path.clone(),
            source,
        })?;
        let (width, height) = first.dimensions();

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(EncodeError::OutputDir)?;
        }

        log::info!(
            "Encoding {} frames at {}x{} @ {} fps to {}",
            frames.len(),
            width,
            height,
            fps,
            output.display()
        );

        let args = build_ffmpeg_args(width, height, fps, output);
        let mut process = FfmpegProcess::spawn(&self.program, &args)?;
        let mut report = EncodeReport {
            dimensions: (width, height),
            ..EncodeReport::default()
        };

        let result = write_frames(&mut process, &first, rest, &mut report);
        let result = result.and_then(|()| process.finish());
        if let Err(e) = result {
            log::error!("Video encoding failed: {}", e);
            if output.exists() {
                let _ = std::fs::remove_file(output);
            }
            return Err(e);
        }

        log::info!(
            "Wrote {} frames ({} skipped) to {}",
            report.frames_written,
            report.skipped.len(),
            output.display()
        );
        Ok(report)
    }
}

/// Pipe the already decoded first frame and then every remaining frame.
fn write_frames(
    process: &mut FfmpegProcess,
    first: &RgbImage,
    rest: &[PathBuf],
    report: &mut EncodeReport,
) -> Result<(), EncodeError> {
    let (width, height) = first.dimensions();
    process.write_frame(first.as_raw())?;
    report.frames_written += 1;

    for path in rest {
        let frame = match load_rgb(path) {
            Ok(frame) => fit_to(frame, width, height, path),
            Err(e) => {
                log::warn!("Could not read frame: {} ({})", path.display(), e);
                report.skipped.push(SkippedFrame {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        process.write_frame(frame.as_raw())?;
        report.frames_written += 1;
    }

    Ok(())
}

/// Resize `frame` to the stream resolution if it differs.
fn fit_to(frame: RgbImage, width: u32, height: u32, path: &Path) -> RgbImage {
    if frame.dimensions() == (width, height) {
        return frame;
    }
    log::warn!(
        "Frame {} is {}x{}, resizing to {}x{}",
        path.display(),
        frame.width(),
        frame.height(),
        width,
        height
    );
    image::imageops::resize(&frame, width, height, FilterType::Triangle)
}

/// A running FFmpeg process fed through stdin.
struct FfmpegProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    /// Handle for the stderr reader thread
    stderr_thread: Option<JoinHandle<Vec<String>>>,
}

impl FfmpegProcess {
    fn spawn(program: &Path, args: &[String]) -> Result<Self, EncodeError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EncodeError::FfmpegNotFound
            } else {
                EncodeError::SpawnFailed(e)
            }
        })?;

        // Drain stderr so a chatty ffmpeg never blocks on a full pipe.
        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                let mut lines = Vec::new();
                for line in reader.lines() {
                    match line {
                        Ok(l) => {
                            log::debug!("[ffmpeg] {}", l);
                            lines.push(l);
                        }
                        Err(_) => break,
                    }
                }
                lines
            })
        });

        let stdin = child.stdin.take();

        Ok(Self {
            child,
            stdin,
            stderr_thread,
        })
    }

    fn write_frame(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.failure(None));
        };
        if let Err(e) = stdin.write_all(data) {
            log::debug!("ffmpeg stdin closed: {}", e);
            drop(self.stdin.take());
            let status = self.child.wait().ok();
            return Err(self.failure(status.and_then(|s| s.code())));
        }
        Ok(())
    }

    /// Close stdin and wait for ffmpeg to flush the file.
    fn finish(&mut self) -> Result<(), EncodeError> {
        drop(self.stdin.take());
        let status = self.child.wait().map_err(EncodeError::SpawnFailed)?;
        if status.success() {
            let _ = self.take_stderr_output();
            Ok(())
        } else {
            Err(self.failure(status.code()))
        }
    }

    fn failure(&mut self, exit_code: Option<i32>) -> EncodeError {
        EncodeError::ProcessFailed {
            exit_code,
            stderr: self.take_stderr_output().join("\n"),
        }
    }

    /// Get the collected stderr output after the process has finished.
    fn take_stderr_output(&mut self) -> Vec<String> {
        self.stderr_thread
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frame(dir: &Path, name: &str, width: u32, height: u32, value: u8) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([value, value / 2, 255 - value]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_empty_frame_list_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("videos").join("video_1.mp4");

        let result = FfmpegEncoder::new().encode(&[], &output, 12);

        assert!(matches!(result, Err(EncodeError::NoFrames)));
        assert!(!output.exists());
        assert!(!dir.path().join("videos").exists());
    }

    #[test]
    fn test_unreadable_first_frame_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("frame_000.png");
        std::fs::write(&bad, b"definitely not a png").unwrap();
        let output = dir.path().join("video_1.mp4");

        let result = FfmpegEncoder::new().encode(&[bad], &output, 12);

        assert!(matches!(
            result,
            Err(EncodeError::UnreadableFirstFrame { .. })
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_zero_fps_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let frame = write_frame(dir.path(), "a.png", 4, 4, 10);
        let output = dir.path().join("video_1.mp4");

        let result = FfmpegEncoder::new().encode(&[frame], &output, 0);
        assert!(matches!(result, Err(EncodeError::InvalidFps)));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_program_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let frame = write_frame(dir.path(), "a.png", 4, 4, 10);
        let output = dir.path().join("video_1.mp4");

        let encoder = FfmpegEncoder::with_program(dir.path().join("no-such-ffmpeg"));
        let result = encoder.encode(&[frame], &output, 12);

        assert!(matches!(result, Err(EncodeError::FfmpegNotFound)));
        assert!(!output.exists());
    }

    #[test]
    fn test_build_ffmpeg_args() {
        let args = build_ffmpeg_args(1024, 768, 12, Path::new("/out/video_1.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s 1024x768 -r 12 -i pipe:0"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("+faststart"));
        assert_eq!(args.last().map(String::as_str), Some("/out/video_1.mp4"));
    }

    #[test]
    fn test_fit_to_resizes_mismatched_frame() {
        let frame = RgbImage::from_pixel(8, 6, Rgb([1, 2, 3]));
        let fitted = fit_to(frame, 4, 4, Path::new("x.png"));
        assert_eq!(fitted.dimensions(), (4, 4));

        let frame = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let same = fit_to(frame.clone(), 4, 4, Path::new("x.png"));
        assert_eq!(same, frame);
    }

    #[test]
    fn test_encode_error_display() {
        assert!(EncodeError::NoFrames.to_string().contains("No images"));
        assert!(EncodeError::FfmpegNotFound.to_string().contains("FFmpeg not found"));
        let err = EncodeError::ProcessFailed {
            exit_code: Some(1),
            stderr: "Error message".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("1"));
        assert!(msg.contains("Error message"));
    }

    #[test]
    fn test_encode_writes_mp4_and_skips_unreadable_frames() {
        if !is_ffmpeg_on_path() {
            eprintln!("skipping: ffmpeg not on PATH");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let mut frames = vec![
            write_frame(dir.path(), "f0.png", 32, 32, 0),
            write_frame(dir.path(), "f1.png", 32, 32, 80),
        ];
        let broken = dir.path().join("f2.png");
        std::fs::write(&broken, b"garbage").unwrap();
        frames.push(broken.clone());
        frames.push(write_frame(dir.path(), "f3.png", 64, 48, 160));

        let output = dir.path().join("out").join("video_1.mp4");
        let report = FfmpegEncoder::new().encode(&frames, &output, 12).unwrap();

        assert_eq!(report.frames_written, 3);
        assert_eq!(report.dimensions, (32, 32));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, broken);
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }
}
