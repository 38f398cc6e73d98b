//! Built-in effect strategies. Each emits an FFmpeg filter
//! expression, in the same append-a-filter-string style used for the
//! xfade/filter_complex construction elsewhere in this crate.

use super::{easing, EffectContext, EffectStrategy};
use crate::error::{TetoError, TetoResult};
use serde_json::Map;
use std::sync::Arc;

fn num(params: &Map<String, serde_json::Value>, key: &str, default: f64) -> f64 {
    params.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

fn string<'a>(params: &'a Map<String, serde_json::Value>, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

pub struct FadeIn;
impl EffectStrategy for FadeIn {
    fn filter_expr(&self, _ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let duration = num(params, "duration", 0.5);
        Ok(format!("fade=t=in:st=0:d={duration:.3}:alpha=1"))
    }
}

pub struct FadeOut;
impl EffectStrategy for FadeOut {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let duration = num(params, "duration", 0.5);
        let start = (ctx.clip_duration - duration).max(0.0);
        Ok(format!("fade=t=out:st={start:.3}:d={duration:.3}:alpha=1"))
    }
}

/// Slides content in from an off-screen edge using `pad`'s time-varying
/// `x`/`y` expressions — the content is drawn within a same-size canvas at
/// an offset that eases from off-screen to `(0,0)`.
pub struct SlideIn;
impl EffectStrategy for SlideIn {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let duration = num(params, "duration", 0.5);
        let direction = string(params, "direction", "left");
        let easing_name = string(params, "easing", "easeOut");
        let eased = easing::ffmpeg_expr(easing_name, &format!("min(t/{duration:.3}\\,1)"));
        let (x, y) = match direction {
            "left" => (format!("-{w}+{w}*{eased}", w = ctx.width), "0".to_string()),
            "right" => (format!("{w}-{w}*{eased}", w = ctx.width), "0".to_string()),
            "top" => ("0".to_string(), format!("-{h}+{h}*{eased}", h = ctx.height)),
            "bottom" => ("0".to_string(), format!("{h}-{h}*{eased}", h = ctx.height)),
            other => return Err(TetoError::Validation(vec![crate::error::ValidationIssue {
                location: crate::error::Location::TopLevel,
                message: format!("slideIn: unknown direction '{other}'"),
            }])),
        };
        Ok(format!(
            "pad=width={w}:height={h}:x='{x}':y='{y}':color=black@0",
            w = ctx.width,
            h = ctx.height,
        ))
    }
}

/// Inverse of `slideIn`: eases from rest position to off-screen over the
/// last `duration` seconds of the clip.
pub struct SlideOut;
impl EffectStrategy for SlideOut {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let duration = num(params, "duration", 0.5);
        let direction = string(params, "direction", "left");
        let easing_name = string(params, "easing", "easeIn");
        let start = (ctx.clip_duration - duration).max(0.0);
        let progress = format!("max(0\\,min((t-{start:.3})/{duration:.3}\\,1))");
        let eased = easing::ffmpeg_expr(easing_name, &progress);
        let (x, y) = match direction {
            "left" => (format!("-{w}*{eased}", w = ctx.width), "0".to_string()),
            "right" => (format!("{w}*{eased}", w = ctx.width), "0".to_string()),
            "top" => ("0".to_string(), format!("-{h}*{eased}", h = ctx.height)),
            "bottom" => ("0".to_string(), format!("{h}*{eased}", h = ctx.height)),
            other => return Err(TetoError::Validation(vec![crate::error::ValidationIssue {
                location: crate::error::Location::TopLevel,
                message: format!("slideOut: unknown direction '{other}'"),
            }])),
        };
        Ok(format!(
            "pad=width={w}:height={h}:x='{x}':y='{y}':color=black@0",
            w = ctx.width,
            h = ctx.height,
        ))
    }
}

pub struct Zoom;
impl EffectStrategy for Zoom {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let start_scale = num(params, "start_scale", 1.0);
        let end_scale = num(params, "end_scale", 1.2);
        let duration = num(params, "duration", ctx.clip_duration);
        let easing_name = string(params, "easing", "linear");
        let progress = format!("min(on/({duration:.3}*{fps})\\,1)", fps = "25");
        let eased = easing::ffmpeg_expr(easing_name, &progress);
        Ok(format!(
            "zoompan=z='{start_scale}+({end_scale}-{start_scale})*{eased}':d=1:s={w}x{h}",
            w = ctx.width,
            h = ctx.height,
        ))
    }
}

pub struct KenBurns;
impl EffectStrategy for KenBurns {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let start_scale = num(params, "start_scale", 1.0);
        let end_scale = num(params, "end_scale", 1.15);
        let duration = num(params, "duration", ctx.clip_duration);
        let pan_start = params
            .get("pan_start")
            .and_then(|v| v.as_array())
            .map(|a| {
                (
                    a.first().and_then(|v| v.as_f64()).unwrap_or(0.0),
                    a.get(1).and_then(|v| v.as_f64()).unwrap_or(0.0),
                )
            })
            .unwrap_or((0.0, 0.0));
        let pan_end = params
            .get("pan_end")
            .and_then(|v| v.as_array())
            .map(|a| {
                (
                    a.first().and_then(|v| v.as_f64()).unwrap_or(0.0),
                    a.get(1).and_then(|v| v.as_f64()).unwrap_or(0.0),
                )
            })
            .unwrap_or((0.0, 0.0));
        let progress = format!("min(on/({duration:.3}*25)\\,1)");
        let eased = easing::ffmpeg_expr("easeInOut", &progress);
        let px = format!("{}+({}-({}))*{eased}", pan_start.0, pan_end.0, pan_start.0);
        let py = format!("{}+({}-({}))*{eased}", pan_start.1, pan_end.1, pan_start.1);
        Ok(format!(
            "zoompan=z='{start_scale}+({end_scale}-{start_scale})*{eased}':x='{px}':y='{py}':d=1:s={w}x{h}",
            w = ctx.width,
            h = ctx.height,
        ))
    }
}

pub struct Blur;
impl EffectStrategy for Blur {
    fn filter_expr(&self, _ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let sigma = num(params, "sigma", 5.0);
        Ok(format!("gblur=sigma={sigma:.3}"))
    }
}

pub struct ColorGrade;
impl EffectStrategy for ColorGrade {
    fn filter_expr(&self, _ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let temperature = num(params, "temperature", 0.0);
        let saturation = num(params, "saturation", 1.0);
        let contrast = num(params, "contrast", 1.0);
        let brightness = num(params, "brightness", 0.0);
        Ok(format!(
            "eq=brightness={brightness:.3}:contrast={contrast:.3}:saturation={saturation:.3},colortemperature=temperature={:.0}",
            6500.0 + temperature * 45.0,
        ))
    }
}

pub struct Vignette;
impl EffectStrategy for Vignette {
    fn filter_expr(&self, _ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let strength = num(params, "strength", 0.5).clamp(0.0, 1.0);
        Ok(format!("vignette=angle={:.4}", (std::f64::consts::PI / 4.0) * strength))
    }
}

pub struct Glitch;
impl EffectStrategy for Glitch {
    fn filter_expr(&self, _ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let intensity = num(params, "intensity", 0.5).clamp(0.0, 1.0);
        let frequency = num(params, "frequency", 1.0).max(0.01);
        let shift = (intensity * 20.0).round() as i64;
        Ok(format!(
            "rgbashift=rh={shift}:bh=-{shift}:edge=smear:enable='lt(mod(t\\,{p:.3})\\,{p:.3}/4)'",
            p = 1.0 / frequency,
        ))
    }
}

pub struct Parallax;
impl EffectStrategy for Parallax {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let amount = num(params, "amount", 30.0);
        let period = num(params, "period", ctx.clip_duration.max(1.0));
        Ok(format!(
            "crop=w={w}:h={h}:x='{amount}*sin(2*PI*t/{period:.3})':y=0",
            w = ctx.width,
            h = ctx.height,
        ))
    }
}

pub struct Bounce;
impl EffectStrategy for Bounce {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let height = num(params, "height", 20.0);
        let count = num(params, "count", 3.0).max(0.1);
        Ok(format!(
            "crop=w={w}:h={h}:x=0:y='abs({height}*sin(PI*t*{count}/{d:.3}))'",
            w = ctx.width,
            h = ctx.height,
            d = ctx.clip_duration.max(0.01),
        ))
    }
}

pub struct Rotate;
impl EffectStrategy for Rotate {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String> {
        let degrees = num(params, "degrees", 5.0);
        Ok(format!(
            "rotate={degrees}*PI/180:ow={w}:oh={h}:c=black",
            w = ctx.width,
            h = ctx.height,
        ))
    }
}

pub fn all() -> Vec<(&'static str, Arc<dyn EffectStrategy>)> {
    vec![
        ("fadeIn", Arc::new(FadeIn)),
        ("fadeOut", Arc::new(FadeOut)),
        ("slideIn", Arc::new(SlideIn)),
        ("slideOut", Arc::new(SlideOut)),
        ("zoom", Arc::new(Zoom)),
        ("kenBurns", Arc::new(KenBurns)),
        ("blur", Arc::new(Blur)),
        ("colorGrade", Arc::new(ColorGrade)),
        ("vignette", Arc::new(Vignette)),
        ("glitch", Arc::new(Glitch)),
        ("parallax", Arc::new(Parallax)),
        ("bounce", Arc::new(Bounce)),
        ("rotate", Arc::new(Rotate)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> EffectContext {
        EffectContext {
            width: 1920,
            height: 1080,
            clip_duration: 4.0,
        }
    }

    #[test]
    fn test_fade_in_expr() {
        let mut params = Map::new();
        params.insert("duration".into(), 1.5.into());
        let expr = FadeIn.filter_expr(&ctx(), &params).unwrap();
        assert!(expr.contains("fade=t=in"));
        assert!(expr.contains("d=1.500"));
    }

    #[test]
    fn test_fade_out_uses_clip_end() {
        let mut params = Map::new();
        params.insert("duration".into(), 1.0.into());
        let expr = FadeOut.filter_expr(&ctx(), &params).unwrap();
        assert!(expr.contains("st=3.000"));
    }

    #[test]
    fn test_slide_in_rejects_unknown_direction() {
        let mut params = Map::new();
        params.insert("direction".into(), "diagonal".into());
        assert!(SlideIn.filter_expr(&ctx(), &params).is_err());
    }

    #[test]
    fn test_slide_in_left_uses_negative_offset_expr() {
        let mut params = Map::new();
        params.insert("direction".into(), "left".into());
        let expr = SlideIn.filter_expr(&ctx(), &params).unwrap();
        assert!(expr.contains("-1920"));
    }

    #[test]
    fn test_ken_burns_includes_zoompan() {
        let expr = KenBurns.filter_expr(&ctx(), &Map::new()).unwrap();
        assert!(expr.starts_with("zoompan="));
        assert!(expr.contains("x='"));
        assert!(expr.contains("y='"));
    }

    #[test]
    fn test_blur_sigma_param() {
        let mut params = Map::new();
        params.insert("sigma".into(), 8.0.into());
        let expr = Blur.filter_expr(&ctx(), &params).unwrap();
        assert_eq!(expr, "gblur=sigma=8.000");
    }

    #[test]
    fn test_all_registers_thirteen_effects() {
        assert_eq!(all().len(), 13);
    }
}
