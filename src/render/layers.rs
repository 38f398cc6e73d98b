//! Per-layer-kind filter graph builders. Each function turns its
//! slice of the [`Timeline`](crate::project::Timeline) into FFmpeg inputs
//! plus `filter_complex` fragments addressing arbitrary start/end layers
//! rather than a fixed scene-card layout.

use crate::effects::{EffectContext, EffectRegistry};
use crate::error::{TetoError, TetoResult};
use crate::media::InputSpec;
use crate::project::{
    AudioLayerKind, ImageLayer, StampCorner, StampLayer, StampPosition, Timeline, VideoLayer,
    VideoTrackLayer,
};
use crate::script::ObjectFit;

/// The built video track: base-track inputs, the filter fragments producing
/// each clip's labeled stream, and the label of the concatenated result.
pub struct BuiltTrack {
    pub inputs: Vec<InputSpec>,
    pub filters: Vec<String>,
    pub label: String,
}

fn object_fit_filter(fit: ObjectFit, width: u32, height: u32) -> String {
    match fit {
        ObjectFit::Contain => format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black"
        ),
        ObjectFit::Cover => format!(
            "scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height}"
        ),
        ObjectFit::Fill => format!("scale={width}:{height}"),
    }
}

fn effects_chain(
    registry: &EffectRegistry,
    effects: &[crate::project::AnimationEffect],
    width: u32,
    height: u32,
    clip_duration: f64,
) -> TetoResult<Vec<String>> {
    let ctx = EffectContext {
        width,
        height,
        clip_duration,
    };
    let mut parts = Vec::with_capacity(effects.len());
    for effect in effects {
        let strategy = registry.get(&effect.name).ok_or_else(|| {
            TetoError::Validation(vec![crate::error::ValidationIssue {
                location: crate::error::Location::TopLevel,
                message: format!("unknown effect \"{}\"", effect.name),
            }])
        })?;
        parts.push(strategy.filter_expr(&ctx, &effect.params)?);
    }
    Ok(parts)
}

/// Build the base video track: sequential concat of image/video layers,
/// each trimmed to its own `end_time - start_time` span so absolute timing
/// is preserved without any overlay compositing.
pub fn build_video_track(
    timeline: &Timeline,
    registry: &EffectRegistry,
    object_fit: ObjectFit,
    width: u32,
    height: u32,
    fps: u32,
) -> TetoResult<BuiltTrack> {
    let mut inputs = Vec::new();
    let mut filters = Vec::new();
    let mut clip_labels = Vec::new();

    for (i, layer) in timeline.video_layers.iter().enumerate() {
        let span = layer.end_time() - layer.start_time();
        let label = format!("v{i}");
        match layer {
            VideoTrackLayer::Image(ImageLayer { path, effects, .. }) => {
                inputs.push(InputSpec::looped_image(path.clone()));
                let mut chain = vec![
                    format!("[{i}:v]trim=duration={span:.3}"),
                    "setpts=PTS-STARTPTS".to_string(),
                    format!("fps={fps}"),
                    object_fit_filter(object_fit, width, height),
                ];
                chain.extend(effects_chain(registry, effects, width, height, span)?);
                filters.push(format!("{}[{label}]", chain.join(",")));
            }
            VideoTrackLayer::Video(VideoLayer {
                path,
                effects,
                looped,
                ..
            }) => {
                if *looped {
                    inputs.push(InputSpec::looped_audio(path.clone()));
                } else {
                    inputs.push(InputSpec::plain(path.clone()));
                }
                let mut chain = vec![
                    format!("[{i}:v]trim=duration={span:.3}"),
                    "setpts=PTS-STARTPTS".to_string(),
                    format!("fps={fps}"),
                    object_fit_filter(object_fit, width, height),
                ];
                chain.extend(effects_chain(registry, effects, width, height, span)?);
                filters.push(format!("{}[{label}]", chain.join(",")));
            }
        }
        clip_labels.push(format!("[{label}]"));
    }

    if clip_labels.is_empty() {
        return Err(TetoError::InternalBug(
            "cannot build a video track with zero layers".into(),
        ));
    }

    let label = "vout".to_string();
    if clip_labels.len() == 1 {
        // A single-clip "concat" is a no-op relabel.
        let only = clip_labels[0].trim_start_matches('[').trim_end_matches(']');
        filters.push(format!("[{only}]null[{label}]"));
    } else {
        filters.push(format!(
            "{}concat=n={}:v=1:a=0[{label}]",
            clip_labels.join(""),
            clip_labels.len()
        ));
    }

    Ok(BuiltTrack {
        inputs,
        filters,
        label,
    })
}

/// Build the audio track: every narration/sfx/bgm layer delayed to its
/// absolute start time and mixed, then clamped to `project_duration`
///. BGM shorter than
/// the project is looped to cover it rather than padded with silence.
pub fn build_audio_track(
    timeline: &Timeline,
    input_offset: usize,
    project_duration: f64,
) -> TetoResult<Option<BuiltTrack>> {
    if timeline.audio_layers.is_empty() {
        return Ok(None);
    }

    let mut inputs = Vec::new();
    let mut filters = Vec::new();
    let mut labels = Vec::new();

    for (i, layer) in timeline.audio_layers.iter().enumerate() {
        let idx = input_offset + i;
        let label = format!("a{i}");
        let delay_ms = (layer.start_time * 1000.0).round() as i64;
        let span = layer.duration_override.unwrap_or(layer.end_time - layer.start_time);

        if layer.kind == AudioLayerKind::Bgm {
            inputs.push(InputSpec::looped_audio(layer.path.clone()));
        } else {
            inputs.push(InputSpec::plain(layer.path.clone()));
        }

        let mut fade = String::new();
        if layer.fade_in > 0.0 {
            fade.push_str(&format!(",afade=t=in:st=0:d={:.3}", layer.fade_in));
        }
        if layer.fade_out > 0.0 {
            let fade_out_start = (span - layer.fade_out).max(0.0);
            fade.push_str(&format!(",afade=t=out:st={fade_out_start:.3}:d={:.3}", layer.fade_out));
        }

        filters.push(format!(
            "[{idx}:a]atrim=duration={span:.3},asetpts=PTS-STARTPTS,volume={volume:.3}{fade},adelay={delay_ms}|{delay_ms}[{label}]",
            volume = layer.volume,
        ));
        labels.push(format!("[{label}]"));
    }

    let mixed = if labels.len() == 1 {
        labels[0].clone()
    } else {
        let label = "amixed".to_string();
        filters.push(format!(
            "{}amix=inputs={}:duration=longest:dropout_transition=0[{label}]",
            labels.join(""),
            labels.len()
        ));
        format!("[{label}]")
    };

    let final_label = "aout".to_string();
    filters.push(format!(
        "{mixed}atrim=duration={project_duration:.3},asetpts=PTS-STARTPTS[{final_label}]"
    ));

    Ok(Some(BuiltTrack {
        inputs,
        filters,
        label: final_label,
    }))
}

fn stamp_position_expr(position: StampPosition, margin: &str) -> (String, String) {
    match position {
        StampPosition::Preset(StampCorner::TopLeft) => (margin.into(), margin.into()),
        StampPosition::Preset(StampCorner::TopRight) => {
            (format!("W-w-{margin}"), margin.into())
        }
        StampPosition::Preset(StampCorner::BottomLeft) => {
            (margin.into(), format!("H-h-{margin}"))
        }
        StampPosition::Preset(StampCorner::BottomRight) => {
            (format!("W-w-{margin}"), format!("H-h-{margin}"))
        }
        StampPosition::Preset(StampCorner::Center) => {
            ("(W-w)/2".into(), "(H-h)/2".into())
        }
        StampPosition::Custom { x, y } => (format!("{x}"), format!("{y}")),
    }
}

/// Overlay each stamp layer onto `base_label` within its `[start, end]`
/// window, returning the filter fragments and the label of the final
/// composited stream.
pub fn build_stamp_overlays(
    stamps: &[StampLayer],
    base_label: &str,
    input_offset: usize,
) -> (Vec<InputSpec>, Vec<String>, String) {
    let mut inputs = Vec::new();
    let mut filters = Vec::new();
    let mut current = base_label.trim_start_matches('[').trim_end_matches(']').to_string();

    for (i, stamp) in stamps.iter().enumerate() {
        let idx = input_offset + i;
        inputs.push(InputSpec::looped_image(stamp.path.clone()));
        let scaled_label = format!("stamp{i}");
        filters.push(format!(
            "[{idx}:v]scale=iw*{scale:.3}:ih*{scale:.3},format=rgba,colorchannelmixer=aa={opacity:.3}[{scaled_label}]",
            scale = stamp.scale,
            opacity = stamp.opacity,
        ));
        let (x, y) = stamp_position_expr(stamp.position, "16");
        let out_label = format!("vstamp{i}");
        filters.push(format!(
            "[{current}][{scaled_label}]overlay=x={x}:y={y}:enable='between(t,{start:.3},{end:.3})'[{out_label}]",
            start = stamp.start_time,
            end = stamp.end_time,
        ));
        current = out_label;
    }

    (inputs, filters, current)
}

fn layer_count(timeline: &Timeline) -> (usize, usize, usize) {
    (
        timeline.video_layers.len(),
        timeline.audio_layers.len(),
        timeline.stamp_layers.len(),
    )
}

/// Input index where the audio layers begin, given the video track was
/// built first.
pub fn audio_input_offset(timeline: &Timeline) -> usize {
    layer_count(timeline).0
}

/// Input index where the stamp layers begin, given video then audio inputs
/// were already allocated.
pub fn stamp_input_offset(timeline: &Timeline) -> usize {
    let (video, audio, _) = layer_count(timeline);
    video + audio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectRegistry;
    use crate::project::{AnimationEffect, AudioLayer, ImageLayer, VideoTrackLayer};
    use std::path::PathBuf;

    fn img_layer(start: f64, end: f64) -> VideoTrackLayer {
        VideoTrackLayer::Image(ImageLayer {
            path: PathBuf::from("a.png"),
            start_time: start,
            end_time: end,
            effects: vec![],
            transition: None,
        })
    }

    #[test]
    fn test_build_video_track_single_layer_uses_null_relabel() {
        let mut timeline = Timeline::default();
        timeline.video_layers.push(img_layer(0.0, 3.0));
        let registry = EffectRegistry::with_builtins();
        let track = build_video_track(&timeline, &registry, ObjectFit::Contain, 1080, 1920, 30).unwrap();
        assert_eq!(track.inputs.len(), 1);
        assert!(track.filters.iter().any(|f| f.contains("null[vout]")));
    }

    #[test]
    fn test_build_video_track_concatenates_multiple_layers() {
        let mut timeline = Timeline::default();
        timeline.video_layers.push(img_layer(0.0, 3.0));
        timeline.video_layers.push(img_layer(3.0, 6.0));
        let registry = EffectRegistry::with_builtins();
        let track = build_video_track(&timeline, &registry, ObjectFit::Cover, 1080, 1920, 30).unwrap();
        assert_eq!(track.inputs.len(), 2);
        assert!(track.filters.last().unwrap().contains("concat=n=2"));
    }

    #[test]
    fn test_build_video_track_rejects_unknown_effect() {
        let mut timeline = Timeline::default();
        let mut layer = match img_layer(0.0, 2.0) {
            VideoTrackLayer::Image(l) => l,
            _ => unreachable!(),
        };
        layer.effects.push(AnimationEffect {
            name: "doesNotExist".into(),
            duration: None,
            params: serde_json::Map::new(),
        });
        timeline.video_layers.push(VideoTrackLayer::Image(layer));
        let registry = EffectRegistry::with_builtins();
        assert!(build_video_track(&timeline, &registry, ObjectFit::Fill, 1080, 1920, 30).is_err());
    }

    #[test]
    fn test_build_audio_track_none_when_empty() {
        let timeline = Timeline::default();
        assert!(build_audio_track(&timeline, 1, 10.0).unwrap().is_none());
    }

    #[test]
    fn test_build_audio_track_delays_by_start_time() {
        let mut timeline = Timeline::default();
        timeline.audio_layers.push(AudioLayer {
            path: PathBuf::from("v.wav"),
            start_time: 2.0,
            end_time: 5.0,
            duration_override: None,
            volume: 1.0,
            kind: AudioLayerKind::Narration,
            fade_in: 0.0,
            fade_out: 0.0,
        });
        let track = build_audio_track(&timeline, 1, 5.0).unwrap().unwrap();
        assert!(track.filters[0].contains("adelay=2000|2000"));
    }

    #[test]
    fn test_build_audio_track_clamps_to_project_duration() {
        let mut timeline = Timeline::default();
        timeline.audio_layers.push(AudioLayer {
            path: PathBuf::from("bgm.mp3"),
            start_time: 0.0,
            end_time: 120.0,
            duration_override: None,
            volume: 0.5,
            kind: AudioLayerKind::Bgm,
            fade_in: 0.0,
            fade_out: 0.0,
        });
        let track = build_audio_track(&timeline, 0, 9.5).unwrap().unwrap();
        assert!(track.filters.last().unwrap().contains("atrim=duration=9.500"));
        assert!(matches!(track.inputs[0].pre_args.first().map(String::as_str), Some("-stream_loop")));
    }

    #[test]
    fn test_build_audio_track_emits_bgm_fades() {
        let mut timeline = Timeline::default();
        timeline.audio_layers.push(AudioLayer {
            path: PathBuf::from("bgm.mp3"),
            start_time: 0.0,
            end_time: 10.0,
            duration_override: None,
            volume: 0.5,
            kind: AudioLayerKind::Bgm,
            fade_in: 1.5,
            fade_out: 2.0,
        });
        let track = build_audio_track(&timeline, 0, 10.0).unwrap().unwrap();
        assert!(track.filters[0].contains("afade=t=in:st=0:d=1.500"));
        assert!(track.filters[0].contains("afade=t=out:st=8.000:d=2.000"));
    }

    #[test]
    fn test_stamp_overlay_positions_bottom_right_corner() {
        let stamps = vec![StampLayer {
            path: PathBuf::from("logo.png"),
            start_time: 0.0,
            end_time: 5.0,
            position: StampPosition::Preset(StampCorner::BottomRight),
            scale: 0.2,
            opacity: 0.8,
        }];
        let (inputs, filters, label) = build_stamp_overlays(&stamps, "[vout]", 3);
        assert_eq!(inputs.len(), 1);
        assert!(filters[1].contains("W-w-16"));
        assert!(filters[1].contains("H-h-16"));
        assert_eq!(label, "vstamp0");
    }

    #[test]
    fn test_input_offsets_account_for_preceding_layers() {
        let mut timeline = Timeline::default();
        timeline.video_layers.push(img_layer(0.0, 1.0));
        timeline.video_layers.push(img_layer(1.0, 2.0));
        timeline.audio_layers.push(AudioLayer {
            path: PathBuf::from("x.wav"),
            start_time: 0.0,
            end_time: 1.0,
            duration_override: None,
            volume: 1.0,
            kind: AudioLayerKind::Narration,
            fade_in: 0.0,
            fade_out: 0.0,
        });
        assert_eq!(audio_input_offset(&timeline), 2);
        assert_eq!(stamp_input_offset(&timeline), 3);
    }
}
