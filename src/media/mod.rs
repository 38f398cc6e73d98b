//! `MediaBackend`: clip loading, frame composition, text rasterization,
//! and muxing are abstracted behind this trait — the concrete video encoder
//! and compositing library are external collaborators. [`FfmpegBackend`]
//! drives them as an FFmpeg subprocess (xfade filter graphs, subtitle
//! burn-in via the `subtitles` filter) built from an arbitrary filter
//! graph addressing a layered timeline rather than fixed scene cards.

use crate::error::{TetoError, TetoResult};
use crate::project::OutputConfig;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub has_audio: bool,
}

/// One input file plus any flags that must precede its `-i` (e.g. `-loop 1`
/// for a still image, `-stream_loop -1` for a looped BGM bed).
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub path: PathBuf,
    pub pre_args: Vec<String>,
}

impl InputSpec {
    pub fn plain(path: PathBuf) -> Self {
        Self {
            path,
            pre_args: Vec::new(),
        }
    }

    pub fn looped_image(path: PathBuf) -> Self {
        Self {
            path,
            pre_args: vec!["-loop".into(), "1".into()],
        }
    }

    pub fn looped_audio(path: PathBuf) -> Self {
        Self {
            path,
            pre_args: vec!["-stream_loop".into(), "-1".into()],
        }
    }
}

/// A fully built FFmpeg filter graph ready to encode: inputs, the joined
/// `filter_complex` string, and the labels to `-map` out.
pub struct EncodeSpec {
    pub inputs: Vec<InputSpec>,
    pub filter_complex: String,
    pub video_label: String,
    pub audio_label: Option<String>,
}

pub trait MediaBackend: Send + Sync {
    fn probe(&self, path: &Path) -> TetoResult<MediaInfo>;
    fn encode(&self, spec: &EncodeSpec, output: &OutputConfig, verbose: bool) -> TetoResult<()>;
}

pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    fn probe(&self, path: &Path) -> TetoResult<MediaInfo> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(path.as_os_str())
            .output()
            .map_err(|e| TetoError::EncoderIo(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(TetoError::EncoderIo(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| TetoError::EncoderIo(format!("parsing ffprobe output: {e}")))?;
        let stream = json
            .get("streams")
            .and_then(|s| s.as_array())
            .and_then(|a| a.first());
        let width = stream
            .and_then(|s| s.get("width"))
            .and_then(|w| w.as_u64())
            .unwrap_or(0) as u32;
        let height = stream
            .and_then(|s| s.get("height"))
            .and_then(|h| h.as_u64())
            .unwrap_or(0) as u32;
        let duration = json
            .get("format")
            .and_then(|f| f.get("duration"))
            .and_then(|d| d.as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(MediaInfo {
            width,
            height,
            duration,
            has_audio: has_audio_stream(path),
        })
    }

    fn encode(&self, spec: &EncodeSpec, output: &OutputConfig, verbose: bool) -> TetoResult<()> {
        if let Some(parent) = output.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y");
        for input in &spec.inputs {
            for arg in &input.pre_args {
                cmd.arg(arg);
            }
            cmd.args(["-i"]).arg(input.path.as_os_str());
        }

        cmd.args(["-filter_complex", &spec.filter_complex]);
        cmd.args(["-map", &spec.video_label]);
        if let Some(audio_label) = &spec.audio_label {
            cmd.args(["-map", audio_label]);
        }

        cmd.args([
            "-r",
            &output.fps.to_string(),
            "-c:v",
            &output.codec,
            "-preset",
            &output.preset,
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]);
        if spec.audio_label.is_some() {
            cmd.args(["-c:a", "aac"]);
        }
        cmd.arg(&output.path);

        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        debug!(
            "Spawning FFmpeg: {}x{} @ {}fps -> {}",
            output.width,
            output.height,
            output.fps,
            output.path.display()
        );
        if !verbose {
            debug!("verbose=false: ffmpeg stderr chatter suppressed unless the run fails");
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| TetoError::EncoderIo(format!("failed to spawn ffmpeg: {e}")))?;
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        let status = child
            .wait()
            .map_err(|e| TetoError::EncoderIo(format!("ffmpeg wait failed: {e}")))?;

        if !status.success() {
            let last_line = stderr.lines().last().unwrap_or("unknown error");
            return Err(TetoError::EncoderIo(format!(
                "ffmpeg encoding failed (exit {status}): {last_line}"
            )));
        }
        Ok(())
    }
}

fn has_audio_stream(path: &Path) -> bool {
    Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "a",
            "-show_entries",
            "stream=codec_type",
            "-of",
            "csv=p=0",
        ])
        .arg(path.as_os_str())
        .output()
        .map(|o| !String::from_utf8_lossy(&o.stdout).trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_spec_plain_has_no_pre_args() {
        let spec = InputSpec::plain(PathBuf::from("a.mp4"));
        assert!(spec.pre_args.is_empty());
    }

    #[test]
    fn test_input_spec_looped_image() {
        let spec = InputSpec::looped_image(PathBuf::from("a.png"));
        assert_eq!(spec.pre_args, vec!["-loop", "1"]);
    }

    #[test]
    fn test_input_spec_looped_audio() {
        let spec = InputSpec::looped_audio(PathBuf::from("a.mp3"));
        assert_eq!(spec.pre_args, vec!["-stream_loop", "-1"]);
    }
}
