//! `EffectRegistry`: a process-wide-shaped but never globally mutable
//! mapping `name -> EffectStrategy`. Rather than a module-level mutable
//! dictionary, it is a per-run registry built with built-ins installed,
//! then handed around by value;
//! [`EffectRegistry::with_effect`] returns a new registry rather than
//! mutating in place, so tests can extend it without touching global state.

pub mod builtin;

use crate::error::TetoResult;
use serde_json::Map;
use std::collections::HashMap;
use std::sync::Arc;

/// Geometry and timing an effect needs to produce a filter fragment. The
/// actual sampling/compositing is a `MediaBackend` concern; a strategy
/// only emits the FFmpeg filter expression for its effect.
#[derive(Debug, Clone, Copy)]
pub struct EffectContext {
    pub width: u32,
    pub height: u32,
    /// Duration of the layer the effect is applied to, needed by effects
    /// whose timing is relative to the clip's end (fadeOut, slideOut).
    pub clip_duration: f64,
}

/// A pure `(clip, params, frame_size) -> clip` transform. Expressed
/// here as "append an FFmpeg filter expression", since the media backend
/// that actually samples frames is external; strategies must not carry
/// any per-call mutable state, matching the "pure function" contract.
pub trait EffectStrategy: Send + Sync {
    fn filter_expr(&self, ctx: &EffectContext, params: &Map<String, serde_json::Value>) -> TetoResult<String>;
}

/// Easing curves shared by every effect that varies over time.
pub mod easing {
    /// Evaluate a named easing curve at `t` (0..=1), clamped. Unknown names
    /// fall back to linear with a warning.
    ///
    /// `easeInOut` is pinned to the cubic bezier (0.42, 0, 0.58, 1); rather than solving the bezier parametrically at render
    /// time, we use its well-known closed-form equivalent, the smoothstep
    /// polynomial `t*t*(3-2t)`, which matches the bezier's endpoints and
    /// symmetry and is directly expressible in FFmpeg's filter expression
    /// language (see [`ffmpeg_expr`]).
    pub fn ease(name: &str, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match name {
            "linear" => t,
            "easeIn" => t * t,
            "easeOut" => 1.0 - (1.0 - t) * (1.0 - t),
            "easeInOut" => t * t * (3.0 - 2.0 * t),
            other => {
                tracing::warn!(easing = other, "unknown easing, falling back to linear");
                t
            }
        }
    }

    /// The FFmpeg-expression form of [`ease`], for embedding inside filter
    /// parameters that accept time-varying expressions (e.g. `zoompan`'s
    /// `z`, `pad`'s `x`/`y`). `t_expr` is any valid sub-expression producing
    /// a value in `0..=1`.
    pub fn ffmpeg_expr(name: &str, t_expr: &str) -> String {
        match name {
            "linear" => t_expr.to_string(),
            "easeIn" => format!("(({t_expr})*({t_expr}))"),
            "easeOut" => format!("(1-(1-({t_expr}))*(1-({t_expr})))"),
            "easeInOut" => format!("(({t_expr})*({t_expr})*(3-2*({t_expr})))"),
            other => {
                tracing::warn!(easing = other, "unknown easing, falling back to linear");
                t_expr.to_string()
            }
        }
    }
}

/// Process-wide-shaped, per-run registry. Built with built-ins installed,
/// then treated as frozen before any pipeline runs.
#[derive(Clone)]
pub struct EffectRegistry {
    strategies: HashMap<String, Arc<dyn EffectStrategy>>,
}

impl EffectRegistry {
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for (name, strategy) in builtin::all() {
            registry.strategies.insert(name.to_string(), strategy);
        }
        registry
    }

    /// Register `strategy` under `name`, returning a new registry. Duplicate
    /// names replace silently — last-registered wins.
    pub fn with_effect(&self, name: &str, strategy: Arc<dyn EffectStrategy>) -> Self {
        let mut strategies = self.strategies.clone();
        strategies.insert(name.to_string(), strategy);
        Self { strategies }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn EffectStrategy>> {
        self.strategies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Constant(&'static str);
    impl EffectStrategy for Constant {
        fn filter_expr(&self, _ctx: &EffectContext, _params: &Map<String, serde_json::Value>) -> TetoResult<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_builtins_registered() {
        let reg = EffectRegistry::with_builtins();
        for name in [
            "fadeIn", "fadeOut", "slideIn", "slideOut", "zoom", "kenBurns", "blur",
            "colorGrade", "vignette", "glitch", "parallax", "bounce", "rotate",
        ] {
            assert!(reg.contains(name), "missing builtin {name}");
        }
    }

    #[test]
    fn test_with_effect_last_registered_wins() {
        let reg = EffectRegistry::empty()
            .with_effect("custom", Arc::new(Constant("first")))
            .with_effect("custom", Arc::new(Constant("second")));
        let ctx = EffectContext {
            width: 100,
            height: 100,
            clip_duration: 1.0,
        };
        let expr = reg.get("custom").unwrap().filter_expr(&ctx, &Map::new()).unwrap();
        assert_eq!(expr, "second");
    }

    #[test]
    fn test_with_effect_returns_new_registry_not_mutating_original() {
        let base = EffectRegistry::empty();
        let extended = base.with_effect("custom", Arc::new(Constant("x")));
        assert!(!base.contains("custom"));
        assert!(extended.contains("custom"));
    }

    #[test]
    fn test_easing_linear_identity() {
        assert_eq!(easing::ease("linear", 0.5), 0.5);
    }

    #[test]
    fn test_easing_endpoints_fixed() {
        for name in ["linear", "easeIn", "easeOut", "easeInOut"] {
            assert!((easing::ease(name, 0.0) - 0.0).abs() < 1e-9, "{name} at 0");
            assert!((easing::ease(name, 1.0) - 1.0).abs() < 1e-9, "{name} at 1");
        }
    }

    #[test]
    fn test_easing_unknown_falls_back_to_linear() {
        assert_eq!(easing::ease("bogus", 0.3), 0.3);
    }

    #[test]
    fn test_easing_in_out_symmetric_at_midpoint() {
        assert!((easing::ease("easeInOut", 0.5) - 0.5).abs() < 1e-9);
    }
}
