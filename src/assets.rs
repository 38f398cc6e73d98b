//! `AssetResolver`: maps a [`crate::script::Visual`] to a
//! local file path. AI image generation is an external collaborator; this
//! crate carries only the local-path case, which needs no network I/O.

use crate::error::{TetoError, TetoResult};
use crate::script::Visual;
use std::path::{Path, PathBuf};

/// Whether a resolved asset should be treated as a video or still image by
/// the layer builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Video,
    Image,
}

pub struct ResolvedAsset {
    pub path: PathBuf,
    pub kind: AssetKind,
}

pub trait AssetResolver: Send + Sync {
    fn resolve(&self, visual: &Visual) -> TetoResult<ResolvedAsset>;
}

/// Resolves `Visual::Path` against a base directory; classifies by
/// extension. `Visual::Generate` is out of scope here — AI generators are
/// external collaborators — and fails with `AssetNotFound` pointing at
/// the description, so callers know to swap in a real resolver.
pub struct LocalAssetResolver {
    base_dir: PathBuf,
}

impl LocalAssetResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn classify(path: &Path) -> AssetKind {
        const VIDEO_EXTS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi"];
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if VIDEO_EXTS.contains(&ext.to_lowercase().as_str()) => AssetKind::Video,
            _ => AssetKind::Image,
        }
    }
}

impl AssetResolver for LocalAssetResolver {
    fn resolve(&self, visual: &Visual) -> TetoResult<ResolvedAsset> {
        match visual {
            Visual::Path { path } => {
                let candidate = PathBuf::from(path);
                let resolved = if candidate.is_absolute() {
                    candidate
                } else {
                    self.base_dir.join(candidate)
                };
                if !resolved.exists() {
                    return Err(TetoError::AssetNotFound(resolved));
                }
                let kind = Self::classify(&resolved);
                Ok(ResolvedAsset {
                    path: resolved,
                    kind,
                })
            }
            Visual::Generate { description, .. } => Err(TetoError::AssetNotFound(PathBuf::from(
                format!("<generated: {description}>"),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_existing_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"fake").unwrap();
        let resolver = LocalAssetResolver::new(dir.path());
        let resolved = resolver
            .resolve(&Visual::Path {
                path: "a.png".into(),
            })
            .unwrap();
        assert_eq!(resolved.kind, AssetKind::Image);
    }

    #[test]
    fn test_resolve_existing_video() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"fake").unwrap();
        let resolver = LocalAssetResolver::new(dir.path());
        let resolved = resolver
            .resolve(&Visual::Path {
                path: "a.mp4".into(),
            })
            .unwrap();
        assert_eq!(resolved.kind, AssetKind::Video);
    }

    #[test]
    fn test_resolve_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = LocalAssetResolver::new(dir.path());
        let result = resolver.resolve(&Visual::Path {
            path: "missing.png".into(),
        });
        assert!(matches!(result, Err(TetoError::AssetNotFound(_))));
    }

    #[test]
    fn test_resolve_generate_is_unsupported_locally() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = LocalAssetResolver::new(dir.path());
        let result = resolver.resolve(&Visual::Generate {
            description: "a cat".into(),
            generate: serde_json::Value::Null,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let abs = dir.path().join("b.png");
        std::fs::write(&abs, b"fake").unwrap();
        let resolver = LocalAssetResolver::new("/nonexistent/base");
        let resolved = resolver
            .resolve(&Visual::Path {
                path: abs.to_string_lossy().into_owned(),
            })
            .unwrap();
        assert_eq!(resolved.path, abs);
    }
}
