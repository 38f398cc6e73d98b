//! The `Project` intermediate: an explicit, time-addressed layer
//! timeline with no relative timing left.

use crate::script::{ObjectFit, SubtitleMode, SubtitleStyleConfig, PartialStyle};
use std::collections::HashMap;
use std::path::PathBuf;

/// A single named, time-parameterized effect application.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationEffect {
    pub name: String,
    pub duration: Option<f64>,
    pub params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSpec {
    pub kind: String,
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub struct VideoLayer {
    pub path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
    pub duration_override: Option<f64>,
    pub volume: f64,
    pub looped: bool,
    pub effects: Vec<AnimationEffect>,
    pub transition: Option<TransitionSpec>,
}

#[derive(Debug, Clone)]
pub struct ImageLayer {
    pub path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
    pub effects: Vec<AnimationEffect>,
    pub transition: Option<TransitionSpec>,
}

/// Tagged union over the base track's per-scene visual.
#[derive(Debug, Clone)]
pub enum VideoTrackLayer {
    Video(VideoLayer),
    Image(ImageLayer),
}

impl VideoTrackLayer {
    pub fn start_time(&self) -> f64 {
        match self {
            VideoTrackLayer::Video(v) => v.start_time,
            VideoTrackLayer::Image(i) => i.start_time,
        }
    }

    pub fn end_time(&self) -> f64 {
        match self {
            VideoTrackLayer::Video(v) => v.end_time,
            VideoTrackLayer::Image(i) => i.end_time,
        }
    }
}

/// Narration segment, sound effect, or BGM clip; these may overlap freely.
#[derive(Debug, Clone)]
pub struct AudioLayer {
    pub path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
    pub duration_override: Option<f64>,
    pub volume: f64,
    pub kind: AudioLayerKind,
    /// BGM fade-in duration in seconds from the clip's own start; 0 for no fade.
    pub fade_in: f64,
    /// BGM fade-out duration in seconds into the clip's own end; 0 for no fade.
    pub fade_out: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioLayerKind {
    Narration,
    SoundEffect,
    Bgm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleItem {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone)]
pub struct SubtitleLayer {
    pub items: Vec<SubtitleItem>,
    pub style: SubtitleStyleConfig,
    pub partial_styles: HashMap<String, PartialStyle>,
}

#[derive(Debug, Clone)]
pub struct StampLayer {
    pub path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
    pub position: StampPosition,
    pub scale: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StampPosition {
    Preset(StampCorner),
    Custom { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampCorner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

/// The four ordered layer sequences that make up a compiled timeline.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub video_layers: Vec<VideoTrackLayer>,
    pub audio_layers: Vec<AudioLayer>,
    pub subtitle_layers: Vec<SubtitleLayer>,
    pub stamp_layers: Vec<StampLayer>,
}

impl Timeline {
    /// Total project duration: the last video layer's `end_time`.
    pub fn duration(&self) -> f64 {
        self.video_layers
            .iter()
            .map(|l| l.end_time())
            .fold(0.0, f64::max)
    }
}

/// Explicit, file-path-bearing output configuration, resolved from
/// an `OutputSettings` plus the caller-supplied output path.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub name: Option<String>,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub preset: String,
    pub subtitle_mode: SubtitleMode,
    pub object_fit: ObjectFit,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub output: OutputConfig,
    pub timeline: Timeline,
}

/// Per-scene timing plus generated-asset bookkeeping, returned alongside
/// each `Project`.
#[derive(Debug, Clone)]
pub struct SceneTiming {
    pub start: f64,
    pub end: f64,
    pub segments: Vec<SegmentTiming>,
}

#[derive(Debug, Clone)]
pub struct SegmentTiming {
    pub start: f64,
    pub end: f64,
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompileMetadata {
    pub total_duration: f64,
    pub scene_timings: Vec<SceneTiming>,
    pub generated_assets: Vec<PathBuf>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

#[derive(Debug)]
pub struct CompileResult {
    pub project: Project,
    pub metadata: CompileMetadata,
}
