//! Process-wide ambient configuration: logging initialization and the
//! `RenderSettings` knobs. There is no separate project file here — the
//! `Script` JSON is the only configuration input — so everything below is
//! passed explicitly into `ParallelDriver`/pipeline calls rather than read
//! from a global.

/// Parallelism and verbosity knobs for a `compile_all` + render run. Always
/// constructed by the caller and threaded through explicitly — never a
/// global; no mutable state lives in the compiler or pipelines themselves.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    /// Bounded worker pool size for `ParallelDriver`.
    pub max_workers: usize,
    /// Suppresses `MediaBackend` subprocess chatter when false.
    pub verbose: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            verbose: false,
        }
    }
}

/// Install a `tracing` subscriber writing to stderr, gated on `RUST_LOG`.
/// A no-op when the variable is unset, so running the CLI silently by
/// default costs nothing.
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_settings_default_has_at_least_one_worker() {
        let settings = RenderSettings::default();
        assert!(settings.max_workers >= 1);
        assert!(!settings.verbose);
    }
}
