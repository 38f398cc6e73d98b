//! `ScriptCompiler`: the six-phase Template Method turning a `Script`
//! into one `Project` per `OutputSettings`.

use crate::assets::{AssetKind, AssetResolver};
use crate::effects::EffectRegistry;
use crate::error::{Location, TetoError, TetoResult, ValidationIssue};
use crate::project::{
    AnimationEffect, AudioLayer, AudioLayerKind, CompileMetadata, CompileResult, ImageLayer,
    OutputConfig, Project, SceneTiming, SegmentTiming, SubtitleItem, SubtitleLayer,
    TransitionSpec, Timeline, VideoLayer, VideoTrackLayer,
};
use crate::script::{EffectConfig, Scene, Script, VoiceConfig};
use crate::tts::cache::TtsCache;
use crate::tts::{RetryPolicy, TtsProvider};
use std::path::{Path, PathBuf};

pub struct ScriptCompiler<'a> {
    pub tts: &'a dyn TtsProvider,
    pub cache: &'a TtsCache,
    pub assets: &'a dyn AssetResolver,
    pub effects: &'a EffectRegistry,
    pub retry: RetryPolicy,
}

impl<'a> ScriptCompiler<'a> {
    pub fn new(
        tts: &'a dyn TtsProvider,
        cache: &'a TtsCache,
        assets: &'a dyn AssetResolver,
        effects: &'a EffectRegistry,
    ) -> Self {
        Self {
            tts,
            cache,
            assets,
            effects,
            retry: RetryPolicy::default(),
        }
    }

    /// All pre-condition checks: structural plus the
    /// registry-dependent ones that need `self.effects`. Collected together so validation still enumerates every
    /// violation.
    fn validate(&self, script: &Script) -> Vec<ValidationIssue> {
        let mut issues = script.validate_structure();

        for (i, scene) in script.scenes.iter().enumerate() {
            for name in effective_effect_names(script, scene) {
                if name != "none" && !self.effects.contains(&name) {
                    issues.push(ValidationIssue {
                        location: Location::Scene(i),
                        message: format!("references unknown effect '{name}'"),
                    });
                }
            }
        }
        issues
    }

    /// Compile a single `OutputSettings` (by index into `script.output`)
    /// to `output_path`.
    pub fn compile(
        &self,
        script: &Script,
        output_index: usize,
        output_path: &Path,
    ) -> TetoResult<CompileResult> {
        let issues = self.validate(script);
        if !issues.is_empty() {
            return Err(TetoError::Validation(issues));
        }
        let settings = script.output.0.get(output_index).ok_or_else(|| {
            TetoError::InternalBug(format!("output index {output_index} out of range"))
        })?;

        // Phase 1: Prepare.
        let output_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
        let narrations_dir = output_dir.join("narrations");
        std::fs::create_dir_all(&narrations_dir)?;

        // Phase 2: Generate narrations.
        let mut metadata = CompileMetadata::default();
        let mut scene_segments: Vec<Vec<GeneratedSegment>> = Vec::with_capacity(script.scenes.len());
        for (i, scene) in script.scenes.iter().enumerate() {
            let voice = resolve_voice(script, scene)?;
            let mut segments = Vec::with_capacity(scene.narrations.len());
            for (j, seg) in scene.narrations.iter().enumerate() {
                let plain_text = crate::subtitle::strip_markup(&seg.text);
                let ext = self.tts.declared_ext();
                let (bytes, duration) = match self.cache.get(&plain_text, &voice, ext)? {
                    Some(bytes) => {
                        metadata.cache_hits += 1;
                        let duration = self.tts.estimate_duration(&plain_text, &voice);
                        (bytes, duration)
                    }
                    None => {
                        metadata.cache_misses += 1;
                        let synthesis = self
                            .retry
                            .run(|| self.tts.synthesize(&plain_text, &voice))?;
                        self.cache.put(&plain_text, &voice, ext, &synthesis.bytes)?;
                        let duration = self.tts.estimate_duration(&plain_text, &voice);
                        (synthesis.bytes, duration)
                    }
                };
                let path = narrations_dir.join(format!("scene_{i:03}_seg_{j:03}.{ext}"));
                std::fs::write(&path, &bytes)?;
                metadata.generated_assets.push(path.clone());
                segments.push(GeneratedSegment {
                    path,
                    duration,
                    text: seg.text.clone(),
                    pause_after: seg.pause_after,
                });
            }
            scene_segments.push(segments);
        }

        // Phase 3: Compute timings.
        let scene_timings = compute_timings(script, &scene_segments);
        metadata.total_duration = scene_timings.last().map(|t| t.end).unwrap_or(0.0);
        metadata.scene_timings = scene_timings.clone();

        // Phase 4: Build layers.
        let timeline = self.build_layers(script, &scene_timings)?;

        // Phase 5: Assemble project.
        let (width, height) = match (settings.width, settings.height) {
            (Some(w), Some(h)) => (w, h),
            _ => settings.resolve_dimensions(),
        };
        let output = OutputConfig {
            name: settings.name.clone(),
            path: output_path.to_path_buf(),
            width,
            height,
            fps: settings.fps,
            codec: settings.codec.clone(),
            preset: settings.preset.clone(),
            subtitle_mode: settings.subtitle_mode,
            object_fit: settings.object_fit,
        };
        let project = Project { output, timeline };

        Ok(CompileResult { project, metadata })
    }

    /// One `Project` per `OutputSettings`, in declaration order. `output_dir` is shared; each output's file is named
    /// from its `name` or its index.
    pub fn compile_all(&self, script: &Script, output_dir: &Path) -> TetoResult<Vec<CompileResult>> {
        let mut results = Vec::with_capacity(script.output.0.len());
        for (i, settings) in script.output.0.iter().enumerate() {
            let stem = settings.name.clone().unwrap_or_else(|| format!("output_{i}"));
            let path = output_dir.join(format!("{stem}.mp4"));
            results.push(self.compile(script, i, &path)?);
        }
        Ok(results)
    }

    fn build_layers(&self, script: &Script, timings: &[SceneTiming]) -> TetoResult<Timeline> {
        let mut timeline = Timeline::default();
        let project_duration = timings.last().map(|t| t.end).unwrap_or(0.0);

        for (i, scene) in script.scenes.iter().enumerate() {
            let timing = &timings[i];
            let resolved = self.assets.resolve(&scene.visual)?;
            let (effects, transition) = resolve_effect_bundle(script, scene)?;

            match resolved.kind {
                AssetKind::Video => {
                    timeline.video_layers.push(VideoTrackLayer::Video(VideoLayer {
                        path: resolved.path,
                        start_time: timing.start,
                        end_time: timing.end,
                        duration_override: scene.duration,
                        volume: if scene.mute_video { 0.0 } else { 1.0 },
                        looped: false,
                        effects,
                        transition,
                    }));
                }
                AssetKind::Image => {
                    timeline.video_layers.push(VideoTrackLayer::Image(ImageLayer {
                        path: resolved.path,
                        start_time: timing.start,
                        end_time: timing.end,
                        effects,
                        transition,
                    }));
                }
            }

            for seg in &timing.segments {
                timeline.audio_layers.push(AudioLayer {
                    path: seg.path.clone(),
                    start_time: seg.start,
                    end_time: seg.end,
                    duration_override: None,
                    volume: 1.0,
                    kind: AudioLayerKind::Narration,
                    fade_in: 0.0,
                    fade_out: 0.0,
                });
            }

            for sfx in &scene.sound_effects {
                let start = timing.start + sfx.offset_from_scene_start;
                timeline.audio_layers.push(AudioLayer {
                    path: PathBuf::from(&sfx.path),
                    start_time: start,
                    end_time: timing.end.max(start),
                    duration_override: None,
                    volume: sfx.volume,
                    kind: AudioLayerKind::SoundEffect,
                    fade_in: 0.0,
                    fade_out: 0.0,
                });
            }
        }

        if let Some(bgm) = &script.bgm {
            timeline.audio_layers.push(AudioLayer {
                path: PathBuf::from(&bgm.path),
                start_time: 0.0,
                end_time: project_duration,
                duration_override: Some(project_duration),
                volume: bgm.volume,
                kind: AudioLayerKind::Bgm,
                fade_in: bgm.fade_in,
                fade_out: bgm.fade_out,
            });
        }

        let items: Vec<SubtitleItem> = timings
            .iter()
            .flat_map(|t| t.segments.iter())
            .map(|seg| SubtitleItem {
                text: seg.text.clone(),
                start: (seg.start - script.timing.subtitle_padding).max(0.0),
                end: seg.end + script.timing.subtitle_padding,
            })
            .collect();
        if !items.is_empty() {
            timeline.subtitle_layers.push(SubtitleLayer {
                items,
                style: script.subtitle_style.clone(),
                partial_styles: script.subtitle_styles.clone(),
            });
        }

        Ok(timeline)
    }
}

struct GeneratedSegment {
    path: PathBuf,
    duration: f64,
    text: String,
    pause_after: f64,
}

/// Effective voice resolution order: `scene.voice` > `voice_profiles[scene.voice_profile]` > `script.voice`.
fn resolve_voice(script: &Script, scene: &Scene) -> TetoResult<VoiceConfig> {
    if let Some(voice) = &scene.voice {
        return Ok(voice.clone());
    }
    if let Some(profile) = &scene.voice_profile {
        return script.voice_profiles.get(profile).cloned().ok_or_else(|| {
            TetoError::InternalBug(format!(
                "voice_profile '{profile}' missing despite passing validation"
            ))
        });
    }
    Ok(script.voice.clone())
}

fn effective_effect_names(script: &Script, scene: &Scene) -> Vec<String> {
    let preset_name = scene.preset.as_ref().or(script.default_preset.as_ref());
    if let Some(name) = preset_name {
        if let Some(preset) = script.presets.get(name) {
            return preset.effects.iter().map(|e| e.name.clone()).collect();
        }
    }
    let effect_name = scene.effect.clone().unwrap_or_else(|| script.default_effect.clone());
    vec![effect_name]
}

fn resolve_effect_bundle(
    script: &Script,
    scene: &Scene,
) -> TetoResult<(Vec<AnimationEffect>, Option<TransitionSpec>)> {
    let preset_name = scene.preset.as_ref().or(script.default_preset.as_ref());
    if let Some(name) = preset_name {
        let preset = script.presets.get(name).ok_or_else(|| {
            TetoError::InternalBug(format!("preset '{name}' missing despite passing validation"))
        })?;
        let effects = preset.effects.iter().map(to_animation_effect).collect();
        let transition = preset
            .transition
            .as_ref()
            .or(scene.transition.as_ref())
            .map(|t| TransitionSpec {
                kind: t.kind.clone(),
                duration: t.duration,
            });
        return Ok((effects, transition));
    }

    let effect_name = scene.effect.clone().unwrap_or_else(|| script.default_effect.clone());
    let effects = if effect_name == "none" {
        vec![]
    } else {
        vec![AnimationEffect {
            name: effect_name,
            duration: None,
            params: serde_json::Map::new(),
        }]
    };
    let transition = scene.transition.as_ref().map(|t| TransitionSpec {
        kind: t.kind.clone(),
        duration: t.duration,
    });
    Ok((effects, transition))
}

fn to_animation_effect(cfg: &EffectConfig) -> AnimationEffect {
    AnimationEffect {
        name: cfg.name.clone(),
        duration: cfg.duration,
        params: cfg.params.clone(),
    }
}

/// The scene/segment timing algorithm, run once over every scene.
fn compute_timings(script: &Script, scene_segments: &[Vec<GeneratedSegment>]) -> Vec<SceneTiming> {
    let mut timings = Vec::with_capacity(script.scenes.len());
    let mut t = 0.0_f64;
    let padding = script.timing.subtitle_padding;

    for (scene, segments) in script.scenes.iter().zip(scene_segments.iter()) {
        let start = t;
        let mut timed_segments = Vec::with_capacity(segments.len());

        if segments.is_empty() {
            t += scene.duration.unwrap_or(0.0);
        } else {
            let last_idx = segments.len() - 1;
            for (j, seg) in segments.iter().enumerate() {
                let seg_start = t + padding;
                let seg_end = seg_start + seg.duration;
                timed_segments.push(SegmentTiming {
                    start: seg_start,
                    end: seg_end,
                    path: seg.path.clone(),
                    text: seg.text.clone(),
                });
                t = seg_end + padding + seg.pause_after;
                if j != last_idx {
                    t += script.timing.default_segment_gap;
                }
            }
        }

        let end = t;
        t += scene.pause_after + script.timing.default_scene_gap;

        timings.push(SceneTiming {
            start,
            end,
            segments: timed_segments,
        });
    }
    timings
}
