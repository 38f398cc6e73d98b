use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where in the compilation a validation issue or failure was found.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Scene(usize),
    Segment { scene: usize, segment: usize },
    Layer(usize),
    TopLevel,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Scene(i) => write!(f, "scene {i}"),
            Location::Segment { scene, segment } => write!(f, "scene {scene}, segment {segment}"),
            Location::Layer(i) => write!(f, "layer {i}"),
            Location::TopLevel => write!(f, "script"),
        }
    }
}

/// A single validation violation. `compile()` collects every one of these
/// before failing rather than aborting on the first.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The error taxonomy every API returns.
#[derive(Error, Debug)]
pub enum TetoError {
    #[error("validation failed with {} issue(s):\n{}", .0.len(), join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("asset not found: {0}")]
    AssetNotFound(PathBuf),

    #[error("TTS auth error: {0}")]
    TtsAuth(String),

    #[error("TTS quota exceeded: {0}")]
    TtsQuota(String),

    #[error("invalid TTS request: {0}")]
    TtsInvalid(String),

    #[error("TTS network error: {0}")]
    TtsNetwork(String),

    #[error("TTS server error: {0}")]
    TtsServer(String),

    #[error("cache I/O error: {0}")]
    CacheIo(String),

    #[error("encoder I/O error: {0}")]
    EncoderIo(String),

    #[error("internal invariant broken: {0}")]
    InternalBug(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TetoError {
    /// Whether the bounded-backoff retry policy applies to this error.
    pub fn retryable(&self) -> bool {
        matches!(self, TetoError::TtsNetwork(_) | TetoError::TtsServer(_))
    }

    /// A short actionable hint for the CLI to print alongside the error.
    pub fn hint(&self) -> Option<String> {
        match self {
            TetoError::Validation(_) => {
                Some("Fix every listed issue; validation runs before any TTS or asset I/O.".into())
            }
            TetoError::AssetNotFound(_) => Some(
                "Check the visual's `path`, or that the AssetResolver produced a file.".into(),
            ),
            TetoError::TtsAuth(_) | TetoError::TtsQuota(_) | TetoError::TtsInvalid(_) => Some(
                "Provider-side rejection; check credentials/quota. Not retried.".into(),
            ),
            TetoError::TtsNetwork(_) | TetoError::TtsServer(_) => Some(
                "Transient; already retried with exponential backoff before surfacing.".into(),
            ),
            TetoError::CacheIo(_) => Some(
                "Check that the TTS cache directory (TETO_CACHE_DIR or the platform default) is writable.".into(),
            ),
            TetoError::EncoderIo(_) => Some(
                "Check that ffmpeg is installed and on PATH, and the output path is writable.".into(),
            ),
            _ => None,
        }
    }
}

pub type TetoResult<T> = Result<T, TetoError>;
