//! The `Script` input model and its structural validation.
//!
//! A `Script` is immutable input, parsed once per compile. Full
//! validation — including references that need the effect/preset registries
//! — happens in [`crate::compiler`]; this module only covers the checks that
//! are purely local to the script's own structure.

use crate::error::{Location, ValidationIssue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    pub title: String,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub voice_profiles: HashMap<String, VoiceConfig>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<BgmConfig>,
    #[serde(default)]
    pub output: OutputList,
    #[serde(default)]
    pub subtitle_style: SubtitleStyleConfig,
    #[serde(default)]
    pub subtitle_styles: HashMap<String, PartialStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_preset: Option<String>,
    #[serde(default = "default_effect_name")]
    pub default_effect: String,
    #[serde(default)]
    pub presets: HashMap<String, PresetConfig>,
}

/// One named effect application as written in script JSON; becomes
/// an `AnimationEffect` once the compiler resolves the layer it attaches to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EffectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// A named bundle of effects/transition/subtitle-style overrides (GLOSSARY:
/// "Preset"), referenced from `Scene::preset` or `Script::default_preset`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    #[serde(default)]
    pub effects: Vec<EffectConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_style: Option<SubtitleStyleConfig>,
}

fn default_effect_name() -> String {
    "none".into()
}

/// `output` accepts either a single `OutputSettings` or an ordered sequence.
#[derive(Debug, Clone, Serialize)]
pub struct OutputList(pub Vec<OutputSettings>);

impl Default for OutputList {
    fn default() -> Self {
        OutputList(vec![OutputSettings::default()])
    }
}

impl<'de> Deserialize<'de> for OutputList {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(OutputSettings),
            Many(Vec<OutputSettings>),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(o) => OutputList(vec![o]),
            Repr::Many(v) => OutputList(v),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    #[serde(default)]
    pub narrations: Vec<NarrationSegment>,
    pub visual: Visual,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub pause_after: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionConfig>,
    #[serde(default)]
    pub sound_effects: Vec<SoundEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default)]
    pub mute_video: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_profile: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NarrationSegment {
    pub text: String,
    #[serde(default)]
    pub pause_after: f64,
}

/// Exactly one of `{path}` or `{description, generate}` is set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Visual {
    Path {
        path: String,
    },
    Generate {
        description: String,
        #[serde(default)]
        generate: serde_json::Value,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SoundEffect {
    pub path: String,
    #[serde(default)]
    pub offset_from_scene_start: f64,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionConfig {
    pub kind: String,
    #[serde(default = "default_transition_duration")]
    pub duration: f64,
}

fn default_transition_duration() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    #[serde(default)]
    pub default_segment_gap: f64,
    #[serde(default)]
    pub default_scene_gap: f64,
    #[serde(default)]
    pub subtitle_padding: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_segment_gap: 0.0,
            default_scene_gap: 0.0,
            subtitle_padding: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BgmConfig {
    pub path: String,
    #[serde(default = "default_bgm_volume")]
    pub volume: f64,
    #[serde(default)]
    pub fade_in: f64,
    #[serde(default)]
    pub fade_out: f64,
}

fn default_bgm_volume() -> f64 {
    1.0
}

/// Every field that affects synthesized audio content — these, and only
/// these, participate in the TTS cache key. `provider` is required;
/// everything else is optional and defaults neutrally.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VoiceConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_prompt: Option<String>,
}

fn default_provider() -> String {
    "mock".into()
}

fn default_speed() -> f64 {
    1.0
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            voice_id: None,
            language_code: None,
            speed: default_speed(),
            pitch: 0.0,
            model_id: None,
            output_format: None,
            voice_name: None,
            gemini_model_id: None,
            style_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    R16x9,
    #[serde(rename = "9:16")]
    R9x16,
    #[serde(rename = "1:1")]
    R1x1,
    #[serde(rename = "21:9")]
    R21x9,
    #[serde(rename = "4:3")]
    R4x3,
}

impl AspectRatio {
    /// Derive `(width, height)`: fixed height of 1080 for landscape,
    /// 1920 for portrait.
    pub fn derive_dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::R16x9 => (1920, 1080),
            AspectRatio::R9x16 => (1080, 1920),
            AspectRatio::R1x1 => (1080, 1080),
            AspectRatio::R21x9 => (2520, 1080),
            AspectRatio::R4x3 => (1440, 1080),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleMode {
    #[default]
    Burn,
    Srt,
    Vtt,
    None,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectFit {
    #[default]
    Contain,
    Cover,
    Fill,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_preset_name")]
    pub preset: String,
    #[serde(default)]
    pub subtitle_mode: SubtitleMode,
    #[serde(default)]
    pub object_fit: ObjectFit,
}

fn default_fps() -> u32 {
    30
}
fn default_codec() -> String {
    "libx264".into()
}
fn default_preset_name() -> String {
    "medium".into()
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            name: None,
            aspect_ratio: AspectRatio::default(),
            width: None,
            height: None,
            fps: default_fps(),
            codec: default_codec(),
            preset: default_preset_name(),
            subtitle_mode: SubtitleMode::default(),
            object_fit: ObjectFit::default(),
        }
    }
}

impl OutputSettings {
    /// Resolve `(width, height)`: explicit values win, else derive from
    /// `aspect_ratio`.
    pub fn resolve_dimensions(&self) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            _ => self.aspect_ratio.derive_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitlePosition {
    Top,
    #[default]
    Bottom,
    Center,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SubtitleAppearance {
    #[default]
    Plain,
    Background,
    Shadow,
    DropShadow,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrokeConfig {
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub width: f64,
}

fn default_stroke_width() -> f64 {
    2.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackgroundStyle {
    pub color: String,
    #[serde(default = "default_bg_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub rounded: bool,
}

fn default_bg_opacity() -> f64 {
    0.6
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubtitleStyleConfig {
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "default_font_weight")]
    pub font_weight: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<StrokeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundStyle>,
    #[serde(default)]
    pub position: SubtitlePosition,
    #[serde(default)]
    pub appearance: SubtitleAppearance,
}

fn default_font_family() -> String {
    "Inter".into()
}
fn default_font_size() -> f64 {
    42.0
}
fn default_font_color() -> String {
    "#FFFFFF".into()
}
fn default_font_weight() -> String {
    "normal".into()
}

impl Default for SubtitleStyleConfig {
    fn default() -> Self {
        Self {
            font_family: default_font_family(),
            font_size: default_font_size(),
            font_color: default_font_color(),
            font_weight: default_font_weight(),
            stroke: None,
            background: None,
            position: SubtitlePosition::default(),
            appearance: SubtitleAppearance::default(),
        }
    }
}

/// Partial override merged onto the base style for a markup tag.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PartialStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

impl Script {
    /// Parse a `Script` from UTF-8 JSON. Unknown top-level keys are
    /// rejected by `deny_unknown_fields`; serde's error already reports the
    /// offending field.
    pub fn from_json(data: &str) -> serde_json::Result<Script> {
        serde_json::from_str(data)
    }

    /// Structural checks that need no registries: scene/segment shape,
    /// duplicate voice overrides, numeric ranges. Collects every violation
    /// rather than stopping at the first.
    pub fn validate_structure(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.scenes.is_empty() {
            issues.push(ValidationIssue {
                location: Location::TopLevel,
                message: "script must contain at least one scene".into(),
            });
        }

        for (i, scene) in self.scenes.iter().enumerate() {
            if scene.narrations.is_empty() {
                match scene.duration {
                    None => issues.push(ValidationIssue {
                        location: Location::Scene(i),
                        message: "scene has no narration and no explicit duration".into(),
                    }),
                    Some(d) if d <= 0.0 => issues.push(ValidationIssue {
                        location: Location::Scene(i),
                        message: format!("scene duration must be positive, got {d}"),
                    }),
                    Some(_) => {}
                }
            }
            if scene.voice.is_some() && scene.voice_profile.is_some() {
                issues.push(ValidationIssue {
                    location: Location::Scene(i),
                    message: "scene sets both `voice` and `voice_profile`; at most one is allowed"
                        .into(),
                });
            }
            if scene.pause_after < 0.0 {
                issues.push(ValidationIssue {
                    location: Location::Scene(i),
                    message: "pause_after must be >= 0".into(),
                });
            }
            for (j, seg) in scene.narrations.iter().enumerate() {
                if seg.pause_after < 0.0 {
                    issues.push(ValidationIssue {
                        location: Location::Segment {
                            scene: i,
                            segment: j,
                        },
                        message: "pause_after must be >= 0".into(),
                    });
                }
                for tag in crate::subtitle::referenced_tags(&seg.text) {
                    if !self.subtitle_styles.contains_key(&tag) {
                        issues.push(ValidationIssue {
                            location: Location::Segment {
                                scene: i,
                                segment: j,
                            },
                            message: format!("narration references unknown markup tag <{tag}>"),
                        });
                    }
                }
            }
            if let Some(profile) = &scene.voice_profile {
                if !self.voice_profiles.contains_key(profile) {
                    issues.push(ValidationIssue {
                        location: Location::Scene(i),
                        message: format!("references unknown voice_profile '{profile}'"),
                    });
                }
            }
            if let Some(preset) = &scene.preset {
                if !self.presets.contains_key(preset) {
                    issues.push(ValidationIssue {
                        location: Location::Scene(i),
                        message: format!("references unknown preset '{preset}'"),
                    });
                }
            }
            if let Some(voice) = &scene.voice {
                if !(0.5..=2.0).contains(&voice.speed) {
                    issues.push(ValidationIssue {
                        location: Location::Scene(i),
                        message: format!("voice.speed {} out of range [0.5, 2.0]", voice.speed),
                    });
                }
                if !(-20.0..=20.0).contains(&voice.pitch) {
                    issues.push(ValidationIssue {
                        location: Location::Scene(i),
                        message: format!("voice.pitch {} out of range [-20, 20]", voice.pitch),
                    });
                }
            }
            for sfx in scene.sound_effects.iter() {
                if !(0.0..=1.0).contains(&sfx.volume) {
                    issues.push(ValidationIssue {
                        location: Location::Scene(i),
                        message: format!("sound_effect volume {} out of range [0, 1]", sfx.volume),
                    });
                }
            }
        }

        if !(0.5..=2.0).contains(&self.voice.speed) {
            issues.push(ValidationIssue {
                location: Location::TopLevel,
                message: format!("voice.speed {} out of range [0.5, 2.0]", self.voice.speed),
            });
        }
        for (name, voice) in &self.voice_profiles {
            if !(0.5..=2.0).contains(&voice.speed) {
                issues.push(ValidationIssue {
                    location: Location::TopLevel,
                    message: format!(
                        "voice_profile '{name}' speed {} out of range [0.5, 2.0]",
                        voice.speed
                    ),
                });
            }
        }
        if let Some(bgm) = &self.bgm {
            if !(0.0..=1.0).contains(&bgm.volume) {
                issues.push(ValidationIssue {
                    location: Location::TopLevel,
                    message: format!("bgm.volume {} out of range [0, 1]", bgm.volume),
                });
            }
        }
        if let Some(preset) = &self.default_preset {
            if !self.presets.contains_key(preset) {
                issues.push(ValidationIssue {
                    location: Location::TopLevel,
                    message: format!("default_preset references unknown preset '{preset}'"),
                });
            }
        }
        if self.timing.default_segment_gap < 0.0
            || self.timing.default_scene_gap < 0.0
            || self.timing.subtitle_padding < 0.0
        {
            issues.push(ValidationIssue {
                location: Location::TopLevel,
                message: "timing config values must be >= 0".into(),
            });
        }
        if self.output.0.is_empty() {
            issues.push(ValidationIssue {
                location: Location::TopLevel,
                message: "output must contain at least one OutputSettings".into(),
            });
        }

        issues
    }
}

impl Scene {
    /// Text for each narration segment (used by validation and markup tests).
    pub fn is_auto_duration(&self) -> bool {
        !self.narrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_script_json() -> &'static str {
        r#"{
            "title": "t",
            "scenes": [
                { "visual": { "path": "a.png" }, "narrations": [{"text": "Hello"}] }
            ]
        }"#
    }

    #[test]
    fn test_parse_minimal_script() {
        let script = Script::from_json(minimal_script_json()).unwrap();
        assert_eq!(script.title, "t");
        assert_eq!(script.scenes.len(), 1);
        assert_eq!(script.output.0.len(), 1);
        assert_eq!(script.output.0[0].resolve_dimensions(), (1920, 1080));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let json = r#"{"title":"t","scenes":[],"bogus_key":1}"#;
        assert!(Script::from_json(json).is_err());
    }

    #[test]
    fn test_output_accepts_single_or_sequence() {
        let single = r#"{"title":"t","scenes":[{"visual":{"path":"a.png"},"duration":1.0}],"output":{"aspect_ratio":"9:16"}}"#;
        let s = Script::from_json(single).unwrap();
        assert_eq!(s.output.0.len(), 1);
        assert_eq!(s.output.0[0].aspect_ratio, AspectRatio::R9x16);

        let many = r#"{"title":"t","scenes":[{"visual":{"path":"a.png"},"duration":1.0}],"output":[{"aspect_ratio":"16:9"},{"aspect_ratio":"9:16"}]}"#;
        let s = Script::from_json(many).unwrap();
        assert_eq!(s.output.0.len(), 2);
    }

    #[test]
    fn test_visual_variants() {
        let path_json = r#"{"path":"a.png"}"#;
        let v: Visual = serde_json::from_str(path_json).unwrap();
        assert!(matches!(v, Visual::Path { .. }));

        let gen_json = r#"{"description":"a cat","generate":{"style":"photo"}}"#;
        let v: Visual = serde_json::from_str(gen_json).unwrap();
        assert!(matches!(v, Visual::Generate { .. }));
    }

    #[test]
    fn test_validate_structure_scene_without_narration_or_duration() {
        let json = r#"{"title":"t","scenes":[{"visual":{"path":"a.png"}}]}"#;
        let script = Script::from_json(json).unwrap();
        let issues = script.validate_structure();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location, Location::Scene(0));
    }

    #[test]
    fn test_validate_structure_zero_duration_rejected() {
        let json = r#"{"title":"t","scenes":[{"visual":{"path":"a.png"},"duration":0}]}"#;
        let script = Script::from_json(json).unwrap();
        let issues = script.validate_structure();
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_validate_structure_both_voice_and_profile_set() {
        let json = r#"{"title":"t","voice_profiles":{"n":{}},"scenes":[{"visual":{"path":"a.png"},"duration":1.0,"voice":{},"voice_profile":"n"}]}"#;
        let script = Script::from_json(json).unwrap();
        let issues = script.validate_structure();
        assert!(issues.iter().any(|i| i.message.contains("both")));
    }

    #[test]
    fn test_validate_structure_unknown_voice_profile() {
        let json = r#"{"title":"t","scenes":[{"visual":{"path":"a.png"},"duration":1.0,"voice_profile":"missing"}]}"#;
        let script = Script::from_json(json).unwrap();
        let issues = script.validate_structure();
        assert!(issues
            .iter()
            .any(|i| i.message.contains("unknown voice_profile")));
    }

    #[test]
    fn test_validate_structure_unknown_preset() {
        let json = r#"{"title":"t","scenes":[{"visual":{"path":"a.png"},"duration":1.0,"preset":"missing"}]}"#;
        let script = Script::from_json(json).unwrap();
        let issues = script.validate_structure();
        assert!(issues.iter().any(|i| i.message.contains("unknown preset")));
    }

    #[test]
    fn test_validate_structure_unknown_markup_tag() {
        let json = r#"{"title":"t","scenes":[{"visual":{"path":"a.png"},"narrations":[{"text":"<em>hi</em>"}]}]}"#;
        let script = Script::from_json(json).unwrap();
        let issues = script.validate_structure();
        assert!(issues
            .iter()
            .any(|i| i.message.contains("unknown markup tag")));
    }

    #[test]
    fn test_validate_structure_collects_all_issues() {
        let json = r#"{"title":"t","scenes":[
            {"visual":{"path":"a.png"}},
            {"visual":{"path":"b.png"},"duration":1.0,"voice_profile":"missing"}
        ]}"#;
        let script = Script::from_json(json).unwrap();
        let issues = script.validate_structure();
        assert_eq!(issues.len(), 2);
    }
}
