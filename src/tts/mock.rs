//! A deterministic in-process TTS provider. Every real vendor SDK is
//! external, but the crate needs one working, test-friendly implementation
//! to be runnable end-to-end.
//!
//! Synthesizes a fixed-header WAV whose payload length is derived from
//! [`crate::tts::heuristic_duration`], so `estimate_duration` and the bytes
//! actually produced agree, and repeated calls for the same input are
//! byte-identical (needed for cache idempotence).

use crate::error::TetoResult;
use crate::script::VoiceConfig;
use crate::tts::{heuristic_duration, Synthesis, TtsProvider};

const SAMPLE_RATE: u32 = 8000;

pub struct MockProvider;

impl TtsProvider for MockProvider {
    fn synthesize(&self, text: &str, voice: &VoiceConfig) -> TetoResult<Synthesis> {
        let duration = heuristic_duration(text, voice);
        let num_samples = (duration * SAMPLE_RATE as f64).round().max(0.0) as u32;
        Ok(Synthesis {
            bytes: silent_wav(num_samples),
            ext: "wav".into(),
        })
    }

    fn estimate_duration(&self, text: &str, voice: &VoiceConfig) -> f64 {
        heuristic_duration(text, voice)
    }

    fn declared_ext(&self) -> &'static str {
        "wav"
    }
}

/// A minimal mono 16-bit PCM WAV containing `num_samples` of silence.
fn silent_wav(num_samples: u32) -> Vec<u8> {
    let data_len = num_samples * 2;
    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes()); // byte rate
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend(std::iter::repeat(0u8).take(data_len as usize));
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_produces_valid_wav_header() {
        let p = MockProvider;
        let v = VoiceConfig::default();
        let s = p.synthesize("hello", &v).unwrap();
        assert_eq!(s.ext, "wav");
        assert_eq!(&s.bytes[0..4], b"RIFF");
        assert_eq!(&s.bytes[8..12], b"WAVE");
    }

    #[test]
    fn test_synthesize_deterministic() {
        let p = MockProvider;
        let v = VoiceConfig::default();
        let a = p.synthesize("same text", &v).unwrap();
        let b = p.synthesize("same text", &v).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn test_estimate_duration_matches_payload_length() {
        let p = MockProvider;
        let v = VoiceConfig::default();
        let s = p.synthesize("a".repeat(150).as_str(), &v).unwrap();
        let estimated = p.estimate_duration(&"a".repeat(150), &v);
        let payload_samples = (s.bytes.len() - 44) / 2;
        let payload_duration = payload_samples as f64 / SAMPLE_RATE as f64;
        assert!((payload_duration - estimated).abs() < 0.01);
    }
}
