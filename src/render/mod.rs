//! `RenderContext` and the `ProcessingStep` chain: the Chain of
//! Responsibility that turns a compiled `Project` into an encoded file.
//! Each step either extends the shared filter graph or forwards the
//! context unchanged.

pub mod layers;

use crate::effects::EffectRegistry;
use crate::error::{TetoError, TetoResult};
use crate::media::{EncodeSpec, InputSpec, MediaBackend};
use crate::project::Project;
use crate::script::{SubtitleAppearance, SubtitleMode, SubtitlePosition};
use crate::subtitle::sidecar;
use std::path::PathBuf;

/// Where pipeline steps report per-completed-step progress. Frame-level progress is a `MediaBackend` concern.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

pub struct NoopProgress;
impl ProgressSink for NoopProgress {
    fn report(&self, _message: &str) {}
}

/// Shared mutable state threaded through the chain by unique reference.
/// `inputs`/`filters` accumulate the FFmpeg filter graph; `video_label`/
/// `audio_label` name the current heads of the video and audio chains
/// respectively.
pub struct RenderContext<'a> {
    pub project: &'a Project,
    pub effects: &'a EffectRegistry,
    pub verbose: bool,
    pub progress: &'a dyn ProgressSink,

    pub inputs: Vec<InputSpec>,
    pub filters: Vec<String>,
    pub video_label: Option<String>,
    pub audio_label: Option<String>,
    pub sidecar_path: Option<PathBuf>,
}

impl<'a> RenderContext<'a> {
    pub fn new(project: &'a Project, effects: &'a EffectRegistry) -> Self {
        Self {
            project,
            effects,
            verbose: false,
            progress: &NoopProgress,
            inputs: Vec::new(),
            filters: Vec::new(),
            video_label: None,
            audio_label: None,
            sidecar_path: None,
        }
    }
}

pub trait ProcessingStep: Send + Sync {
    fn process(&self, ctx: &mut RenderContext) -> TetoResult<()>;
    fn name(&self) -> &'static str;
}

pub struct VideoLayerProcessingStep;
impl ProcessingStep for VideoLayerProcessingStep {
    fn name(&self) -> &'static str {
        "VideoLayerProcessingStep"
    }

    fn process(&self, ctx: &mut RenderContext) -> TetoResult<()> {
        let output = &ctx.project.output;
        let track = layers::build_video_track(
            &ctx.project.timeline,
            ctx.effects,
            output.object_fit,
            output.width,
            output.height,
            output.fps,
        )?;
        ctx.inputs.extend(track.inputs);
        ctx.filters.extend(track.filters);
        ctx.video_label = Some(track.label);
        ctx.progress.report("video layers processed");
        Ok(())
    }
}

pub struct AudioLayerProcessingStep;
impl ProcessingStep for AudioLayerProcessingStep {
    fn name(&self) -> &'static str {
        "AudioLayerProcessingStep"
    }

    fn process(&self, ctx: &mut RenderContext) -> TetoResult<()> {
        let offset = layers::audio_input_offset(&ctx.project.timeline);
        let project_duration = ctx.project.timeline.duration();
        if let Some(track) =
            layers::build_audio_track(&ctx.project.timeline, offset, project_duration)?
        {
            ctx.inputs.extend(track.inputs);
            ctx.filters.extend(track.filters);
            ctx.audio_label = Some(track.label);
        }
        ctx.progress.report("audio layers processed");
        Ok(())
    }
}

/// The `amix` merge is folded into `build_audio_track` itself — this step
/// exists so a custom chain can still insert work between layer processing
/// and stamping without renumbering every other step.
pub struct AudioMergingStep;
impl ProcessingStep for AudioMergingStep {
    fn name(&self) -> &'static str {
        "AudioMergingStep"
    }

    fn process(&self, ctx: &mut RenderContext) -> TetoResult<()> {
        ctx.progress.report("audio merged");
        Ok(())
    }
}

pub struct StampLayerProcessingStep;
impl ProcessingStep for StampLayerProcessingStep {
    fn name(&self) -> &'static str {
        "StampLayerProcessingStep"
    }

    fn process(&self, ctx: &mut RenderContext) -> TetoResult<()> {
        if ctx.project.timeline.stamp_layers.is_empty() {
            return Ok(());
        }
        let video_label = ctx
            .video_label
            .clone()
            .ok_or_else(|| TetoError::InternalBug("no video stream to stamp onto".into()))?;
        let offset = layers::stamp_input_offset(&ctx.project.timeline);
        let (inputs, filters, label) = layers::build_stamp_overlays(
            &ctx.project.timeline.stamp_layers,
            &format!("[{video_label}]"),
            offset,
        );
        ctx.inputs.extend(inputs);
        ctx.filters.extend(filters);
        ctx.video_label = Some(label);
        ctx.progress.report("stamps composited");
        Ok(())
    }
}

pub struct SubtitleProcessingStep;
impl ProcessingStep for SubtitleProcessingStep {
    fn name(&self) -> &'static str {
        "SubtitleProcessingStep"
    }

    fn process(&self, ctx: &mut RenderContext) -> TetoResult<()> {
        let Some(layer) = ctx.project.timeline.subtitle_layers.first() else {
            return Ok(());
        };
        match ctx.project.output.subtitle_mode {
            SubtitleMode::None => {}
            SubtitleMode::Srt => {
                let path = ctx.project.output.path.with_extension("srt");
                std::fs::write(&path, sidecar::render_srt(&layer.items))?;
                ctx.sidecar_path = Some(path);
            }
            SubtitleMode::Vtt => {
                let path = ctx.project.output.path.with_extension("vtt");
                std::fs::write(&path, sidecar::render_vtt(&layer.items))?;
                ctx.sidecar_path = Some(path);
            }
            SubtitleMode::Burn => {
                let ass_path = ctx.project.output.path.with_extension("ass");
                let (width, height) = (ctx.project.output.width, ctx.project.output.height);
                std::fs::write(&ass_path, build_ass(layer, width, height))?;
                let video_label = ctx.video_label.clone().ok_or_else(|| {
                    TetoError::InternalBug("no video stream to burn subtitles onto".into())
                })?;
                ctx.filters.push(format!(
                    "[{video_label}]subtitles=filename='{}'[vsubbed]",
                    ass_path.display()
                ));
                ctx.video_label = Some("vsubbed".to_string());
            }
        }
        ctx.progress.report("subtitles processed");
        Ok(())
    }
}

/// Build a minimal ASS subtitle file with per-span color overrides, so
/// burned-in text can honor `subtitle_styles` per markup tag — generalizing
/// plain SRT burn-in to support colored runs via ASS override tags. The
/// layer's `stroke`/`background`/`appearance`/`position` map onto ASS's
/// OutlineColour/Outline, BorderStyle/BackColour, Shadow, and Alignment
/// fields respectively. Each item's text is wrapped with
/// [`crate::subtitle::layout_lines`] and clamped with
/// [`crate::subtitle::clamp_lines_to_height`] before being joined into the
/// Dialogue text with explicit `\N` breaks, rather than leaving wrapping to
/// the backend's own renderer.
fn build_ass(layer: &crate::project::SubtitleLayer, width: u32, height: u32) -> String {
    let style = &layer.style;
    const MARGIN: f64 = 40.0;
    let max_width = (width as f64 - 2.0 * MARGIN).max(10.0);
    let line_height = style.font_size * 1.2;
    let max_height = (height as f64 * 0.3).max(line_height);

    let (outline_color, outline_width) = match &style.stroke {
        Some(stroke) => (ass_color(&stroke.color), stroke.width),
        None => ("&H00000000&".to_string(), 0.0),
    };

    let (border_style, back_colour, shadow) = match style.appearance {
        SubtitleAppearance::Plain => (1, "&H00000000&".to_string(), 0.0),
        SubtitleAppearance::Background => {
            let color = style.background.as_ref().map(|b| b.color.as_str()).unwrap_or("#000000");
            let opacity = style.background.as_ref().map(|b| b.opacity).unwrap_or(0.6);
            (3, ass_color_alpha(color, opacity), 0.0)
        }
        SubtitleAppearance::Shadow => (1, "&H64000000&".to_string(), 2.0),
        SubtitleAppearance::DropShadow => (1, "&H64000000&".to_string(), 3.0),
    };

    let bold = if style.font_weight == "bold" || style.font_weight == "700" { -1 } else { 0 };

    let alignment = match style.position {
        SubtitlePosition::Top => 8,
        SubtitlePosition::Bottom => 2,
        SubtitlePosition::Center => 5,
    };

    let mut out = String::new();
    out.push_str("[Script Info]\nScriptType: v4.00+\n\n[V4+ Styles]\n");
    out.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, OutlineColour, BackColour, Bold, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    out.push_str(&format!(
        "Style: Default,{},{},{},{outline_color},{back_colour},{bold},{border_style},{outline_width:.1},{shadow:.1},{alignment},10,10,20,1\n\n",
        style.font_family,
        style.font_size,
        ass_color(&style.font_color),
    ));
    out.push_str("[Events]\nFormat: Layer, Start, End, Style, Text\n");
    for item in &layer.items {
        let spans = crate::subtitle::parse_markup(&item.text);
        let lines = crate::subtitle::layout_lines(&spans, style, &layer.partial_styles, max_width);
        let lines = crate::subtitle::clamp_lines_to_height(lines, line_height, max_height);
        let text = lines
            .iter()
            .map(|line| {
                line.runs
                    .iter()
                    .map(|run| format!("{{\\c{}}}{}", ass_color(&run.style.font_color), run.text.replace('\n', "\\N")))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\\N");
        out.push_str(&format!(
            "Dialogue: 0,{},{},Default,{}\n",
            ass_timestamp(item.start),
            ass_timestamp(item.end),
            text
        ));
    }
    out
}

fn ass_timestamp(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_secs = total_cs / 100;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;
    format!("{hours}:{mins:02}:{secs:02}.{cs:02}")
}

/// `#RRGGBB` to ASS's `&HBBGGRR&` order.
fn ass_color(hex: &str) -> String {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return "&H00FFFFFF&".to_string();
    }
    let r = &hex[0..2];
    let g = &hex[2..4];
    let b = &hex[4..6];
    format!("&H00{b}{g}{r}&")
}

/// `#RRGGBB` plus an opacity in `[0,1]` to ASS's `&HAABBGGRR&` order, where
/// ASS alpha is inverted (`00` opaque, `FF` fully transparent).
fn ass_color_alpha(hex: &str, opacity: f64) -> String {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return "&H00FFFFFF&".to_string();
    }
    let r = &hex[0..2];
    let g = &hex[2..4];
    let b = &hex[4..6];
    let alpha = ((1.0 - opacity.clamp(0.0, 1.0)) * 255.0).round() as u8;
    format!("&H{alpha:02X}{b}{g}{r}&")
}

pub struct VideoOutputStep {
    pub backend: Box<dyn MediaBackend>,
}

impl ProcessingStep for VideoOutputStep {
    fn name(&self) -> &'static str {
        "VideoOutputStep"
    }

    fn process(&self, ctx: &mut RenderContext) -> TetoResult<()> {
        let video_label = ctx
            .video_label
            .clone()
            .ok_or_else(|| TetoError::InternalBug("no video stream to encode".into()))?;
        let spec = EncodeSpec {
            inputs: std::mem::take(&mut ctx.inputs),
            filter_complex: ctx.filters.join(";"),
            video_label: format!("[{video_label}]"),
            audio_label: ctx.audio_label.clone().map(|l| format!("[{l}]")),
        };
        self.backend.encode(&spec, &ctx.project.output, ctx.verbose)?;
        ctx.progress.report("encode complete");
        Ok(())
    }
}

pub struct CleanupStep;
impl ProcessingStep for CleanupStep {
    fn name(&self) -> &'static str {
        "CleanupStep"
    }

    fn process(&self, ctx: &mut RenderContext) -> TetoResult<()> {
        ctx.inputs.clear();
        ctx.filters.clear();
        ctx.progress.report("cleanup complete");
        Ok(())
    }
}

/// The default chain, run in order against a shared `RenderContext`.
/// Any step may be swapped out by building a custom `Vec<Box<dyn
/// ProcessingStep>>` instead of calling this constructor.
pub fn default_pipeline(backend: Box<dyn MediaBackend>) -> Vec<Box<dyn ProcessingStep>> {
    vec![
        Box::new(VideoLayerProcessingStep),
        Box::new(AudioLayerProcessingStep),
        Box::new(AudioMergingStep),
        Box::new(StampLayerProcessingStep),
        Box::new(SubtitleProcessingStep),
        Box::new(VideoOutputStep { backend }),
        Box::new(CleanupStep),
    ]
}

pub fn run_pipeline(steps: &[Box<dyn ProcessingStep>], ctx: &mut RenderContext) -> TetoResult<()> {
    for step in steps {
        step.process(ctx)?;
    }
    Ok(())
}
