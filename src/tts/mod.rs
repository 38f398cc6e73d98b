//! `TTSProvider`: the external speech-synthesis interface, plus the
//! duration heuristic and retry policy that sit in front of it. The
//! cache lives in [`cache`]; a deterministic [`mock`] provider is the
//! only concrete implementation this crate carries, since real vendor SDKs
//! are out of scope.

pub mod cache;
pub mod mock;

use crate::error::{TetoError, TetoResult};
use crate::script::VoiceConfig;
use std::time::Duration;

/// Result of a synthesis call: raw encoded bytes plus the extension the
/// provider declares for them.
pub struct Synthesis {
    pub bytes: Vec<u8>,
    pub ext: String,
}

/// Pluggable text-to-speech backend. Implementations are external
/// collaborators behind this trait; blocking calls only.
pub trait TtsProvider: Send + Sync {
    fn synthesize(&self, text: &str, voice: &VoiceConfig) -> TetoResult<Synthesis>;

    /// Cheap, deterministic estimate given the same inputs — used for both
    /// cache hits (where no fresh synthesis happens) and misses.
    fn estimate_duration(&self, text: &str, voice: &VoiceConfig) -> f64 {
        heuristic_duration(text, voice)
    }

    /// The file extension this provider's audio is stored under. Known ahead of a
    /// synthesis call so the cache can be probed before paying for one.
    fn declared_ext(&self) -> &'static str {
        "mp3"
    }
}

/// `chars/rate` duration heuristic: CJK runs at roughly 5 chars/s,
/// Latin text at roughly 15 chars/s, the whole thing scaled by `voice.speed`.
pub fn heuristic_duration(text: &str, voice: &VoiceConfig) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let cjk_chars = text.chars().filter(|c| is_cjk(*c)).count();
    let total_chars = text.chars().count();
    let latin_chars = total_chars - cjk_chars;

    let cjk_rate = 5.0;
    let latin_rate = 15.0;
    let seconds = (cjk_chars as f64 / cjk_rate) + (latin_chars as f64 / latin_rate);
    (seconds / voice.speed.max(0.001)).max(0.0)
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0xAC00..=0xD7A3 | 0x3400..=0x4DBF)
}

/// Bounded exponential backoff for retryable TTS errors. Synchronous sleeps, matching the rest of the
/// pipeline's blocking I/O model.
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial: Duration::from_millis(500),
            cap: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Run `f`, retrying while it returns a retryable [`TetoError`], up to
    /// `attempts` total tries. Surfaces the last error otherwise.
    pub fn run<F>(&self, mut f: F) -> TetoResult<Synthesis>
    where
        F: FnMut() -> TetoResult<Synthesis>,
    {
        let mut delay = self.initial;
        let mut last_err = None;
        for attempt in 0..self.attempts {
            match f() {
                Ok(s) => return Ok(s),
                Err(e) if e.retryable() && attempt + 1 < self.attempts => {
                    tracing::warn!(attempt, delay_ms = delay.as_millis(), %e, "retrying TTS call");
                    std::thread::sleep(delay);
                    delay = (delay * 2).min(self.cap);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(TetoError::InternalBug("retry loop exited without a result".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(speed: f64) -> VoiceConfig {
        VoiceConfig {
            speed,
            ..Default::default()
        }
    }

    #[test]
    fn test_heuristic_duration_latin() {
        let d = heuristic_duration(&"a".repeat(15), &voice(1.0));
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_duration_cjk_slower_per_char() {
        let latin = heuristic_duration(&"a".repeat(15), &voice(1.0));
        let cjk = heuristic_duration(&"\u{4e2d}".repeat(15), &voice(1.0));
        assert!(cjk > latin);
    }

    #[test]
    fn test_heuristic_duration_scales_with_speed() {
        let base = heuristic_duration("hello world", &voice(1.0));
        let fast = heuristic_duration("hello world", &voice(2.0));
        assert!((fast - base / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_duration_empty_text() {
        assert_eq!(heuristic_duration("", &voice(1.0)), 0.0);
    }

    #[test]
    fn test_retry_policy_succeeds_after_retryable_failures() {
        let policy = RetryPolicy {
            attempts: 3,
            initial: Duration::from_millis(1),
            cap: Duration::from_millis(2),
        };
        let mut calls = 0;
        let result = policy.run(|| {
            calls += 1;
            if calls < 2 {
                Err(TetoError::TtsNetwork("timeout".into()))
            } else {
                Ok(Synthesis {
                    bytes: vec![1],
                    ext: "mp3".into(),
                })
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_retry_policy_does_not_retry_non_retryable() {
        let policy = RetryPolicy {
            attempts: 3,
            initial: Duration::from_millis(1),
            cap: Duration::from_millis(2),
        };
        let mut calls = 0;
        let result = policy.run(|| {
            calls += 1;
            Err(TetoError::TtsAuth("bad key".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_retry_policy_exhausts_attempts() {
        let policy = RetryPolicy {
            attempts: 3,
            initial: Duration::from_millis(1),
            cap: Duration::from_millis(2),
        };
        let mut calls = 0;
        let result = policy.run(|| {
            calls += 1;
            Err(TetoError::TtsServer("down".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
