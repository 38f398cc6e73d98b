//! Content-addressed TTS cache.
//!
//! Keyed on `(plain_text, resolved_voice_config)`, independent of which
//! `voice_profile` name (if any) resolved to that config. Writes are
//! atomic: write-to-temp then rename within the cache's leaf directory, so
//! a concurrent second writer for the same key is tolerated.

use crate::error::{TetoError, TetoResult};
use crate::script::VoiceConfig;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Only the fields that affect synthesized audio content participate in the
/// cache key. Field order is fixed so canonical JSON is stable across
/// `serde_json` versions regardless of struct declaration order.
#[derive(Serialize)]
struct CacheKeyConfig<'a> {
    provider: &'a str,
    voice_id: Option<&'a str>,
    language_code: Option<&'a str>,
    speed: f64,
    pitch: f64,
    model_id: Option<&'a str>,
    output_format: Option<&'a str>,
    voice_name: Option<&'a str>,
    gemini_model_id: Option<&'a str>,
    style_prompt: Option<&'a str>,
}

#[derive(Serialize)]
struct CacheKeyInput<'a> {
    text: &'a str,
    config: CacheKeyConfig<'a>,
}

/// Compute the 16-hex-char cache key for `(text, voice)`.
///
/// `serde_json`'s default map serialization for a struct preserves
/// declaration order, which is fixed above; `serde_json::to_string` never
/// inserts insignificant whitespace, so this is already canonical JSON.
pub fn cache_key(text: &str, voice: &VoiceConfig) -> String {
    let input = CacheKeyInput {
        text,
        config: CacheKeyConfig {
            provider: &voice.provider,
            voice_id: voice.voice_id.as_deref(),
            language_code: voice.language_code.as_deref(),
            speed: voice.speed,
            pitch: voice.pitch,
            model_id: voice.model_id.as_deref(),
            output_format: voice.output_format.as_deref(),
            voice_name: voice.voice_name.as_deref(),
            gemini_model_id: voice.gemini_model_id.as_deref(),
            style_prompt: voice.style_prompt.as_deref(),
        },
    };
    let canonical = serde_json::to_string(&input).expect("cache key input is always valid JSON");
    let digest = Sha256::digest(canonical.as_bytes());
    hex_encode(&digest)[..16].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Stats returned by [`TtsCache::info`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheInfo {
    pub bytes_used: u64,
    pub entry_count: u64,
}

/// The file-backed, content-addressed store. Safe for concurrent use
/// across pipelines and processes sharing `root`.
pub struct TtsCache {
    root: PathBuf,
}

impl TtsCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve the cache root: explicit `override_dir`, else `TETO_CACHE_DIR`,
    /// else the platform cache directory (`XDG_CACHE_HOME/teto/tts` on Unix,
    /// `LOCALAPPDATA\teto\tts` on Windows).
    pub fn resolve_root(override_dir: Option<&Path>) -> PathBuf {
        if let Some(dir) = override_dir {
            return dir.to_path_buf();
        }
        if let Ok(dir) = std::env::var("TETO_CACHE_DIR") {
            return PathBuf::from(dir);
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("teto")
            .join("tts")
    }

    fn entry_path(&self, key: &str, ext: &str) -> PathBuf {
        self.root.join(&key[..2]).join(format!("{key}.{ext}"))
    }

    pub fn get(&self, text: &str, voice: &VoiceConfig, ext: &str) -> TetoResult<Option<Vec<u8>>> {
        let key = cache_key(text, voice);
        let path = self.entry_path(&key, ext);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TetoError::CacheIo(format!(
                "reading {}: {e}",
                path.display()
            ))),
        }
    }

    /// Atomic write-to-temp-then-rename within the entry's own directory,
    /// so a concurrent writer for the same key never observes a partial
    /// file. Content-addressing means two writers for
    /// the same key always write byte-identical content, so last-writer-wins
    /// is benign.
    pub fn put(&self, text: &str, voice: &VoiceConfig, ext: &str, bytes: &[u8]) -> TetoResult<()> {
        let key = cache_key(text, voice);
        let dir = self.root.join(&key[..2]);
        std::fs::create_dir_all(&dir)
            .map_err(|e| TetoError::CacheIo(format!("creating {}: {e}", dir.display())))?;
        let final_path = dir.join(format!("{key}.{ext}"));
        let tmp_path = dir.join(format!("{key}.{}.tmp", std::process::id()));
        std::fs::write(&tmp_path, bytes)
            .map_err(|e| TetoError::CacheIo(format!("writing {}: {e}", tmp_path.display())))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| TetoError::CacheIo(format!("renaming into {}: {e}", final_path.display())))?;
        Ok(())
    }

    pub fn info(&self) -> TetoResult<CacheInfo> {
        let mut info = CacheInfo::default();
        if !self.root.exists() {
            return Ok(info);
        }
        for shard in walk_dir(&self.root)? {
            if shard.is_dir() {
                for entry in walk_dir(&shard)? {
                    if entry.is_file() && !entry.extension().is_some_and(|e| e == "tmp") {
                        info.entry_count += 1;
                        if let Ok(meta) = std::fs::metadata(&entry) {
                            info.bytes_used += meta.len();
                        }
                    }
                }
            }
        }
        Ok(info)
    }

    /// Remove entries. `older_than` restricts removal to entries whose
    /// mtime predates `now - older_than`; `None` clears everything.
    pub fn clear(&self, older_than: Option<std::time::Duration>) -> TetoResult<u64> {
        let mut removed = 0;
        if !self.root.exists() {
            return Ok(removed);
        }
        let cutoff = older_than.map(|d| std::time::SystemTime::now() - d);
        for shard in walk_dir(&self.root)? {
            if !shard.is_dir() {
                continue;
            }
            for entry in walk_dir(&shard)? {
                if !entry.is_file() {
                    continue;
                }
                let stale = match cutoff {
                    None => true,
                    Some(cutoff) => std::fs::metadata(&entry)
                        .and_then(|m| m.modified())
                        .is_ok_and(|mtime| mtime < cutoff),
                };
                if stale {
                    std::fs::remove_file(&entry)
                        .map_err(|e| TetoError::CacheIo(format!("removing {}: {e}", entry.display())))?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

fn walk_dir(dir: &Path) -> TetoResult<Vec<PathBuf>> {
    std::fs::read_dir(dir)
        .map_err(|e| TetoError::CacheIo(format!("reading {}: {e}", dir.display())))?
        .filter_map(|e| e.ok())
        .map(|e| Ok(e.path()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(provider: &str) -> VoiceConfig {
        VoiceConfig {
            provider: provider.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cache_key_deterministic() {
        let v = voice("mock");
        assert_eq!(cache_key("hello", &v), cache_key("hello", &v));
        assert_eq!(cache_key("hello", &v).len(), 16);
    }

    #[test]
    fn test_cache_key_varies_on_listed_field() {
        let a = voice("mock");
        let mut b = a.clone();
        b.voice_id = Some("alt".into());
        assert_ne!(cache_key("hi", &a), cache_key("hi", &b));
    }

    #[test]
    fn test_cache_key_identical_regardless_of_profile_name() {
        // Cache key derivation never sees a profile name — only the
        // resolved VoiceConfig — so two profiles resolving to equal configs
        // must collide.
        let a = voice("mock");
        let b = voice("mock");
        assert_eq!(cache_key("same text", &a), cache_key("same text", &b));
    }

    #[test]
    fn test_put_then_get_returns_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::new(dir.path().to_path_buf());
        let v = voice("mock");
        cache.put("hello", &v, "mp3", b"some audio bytes").unwrap();
        let got = cache.get("hello", &v, "mp3").unwrap().unwrap();
        assert_eq!(got, b"some audio bytes");
    }

    #[test]
    fn test_get_miss_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::new(dir.path().to_path_buf());
        let v = voice("mock");
        assert!(cache.get("nope", &v, "mp3").unwrap().is_none());
    }

    #[test]
    fn test_layout_matches_spec() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::new(dir.path().to_path_buf());
        let v = voice("mock");
        cache.put("hello", &v, "wav", b"x").unwrap();
        let key = cache_key("hello", &v);
        let expected = dir.path().join(&key[..2]).join(format!("{key}.wav"));
        assert!(expected.exists());
    }

    #[test]
    fn test_info_counts_entries_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::new(dir.path().to_path_buf());
        cache.put("a", &voice("mock"), "mp3", b"12345").unwrap();
        cache.put("b", &voice("mock"), "mp3", b"123").unwrap();
        let info = cache.info().unwrap();
        assert_eq!(info.entry_count, 2);
        assert_eq!(info.bytes_used, 8);
    }

    #[test]
    fn test_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::new(dir.path().to_path_buf());
        cache.put("a", &voice("mock"), "mp3", b"1").unwrap();
        let removed = cache.clear(None).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.info().unwrap().entry_count, 0);
    }

    #[test]
    fn test_resolve_root_prefers_explicit_override() {
        let explicit = PathBuf::from("/tmp/explicit-cache");
        assert_eq!(TtsCache::resolve_root(Some(&explicit)), explicit);
    }
}
