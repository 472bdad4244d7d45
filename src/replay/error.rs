//! Replay Errors
//!
//! Two kinds propagate to the caller: configuration mistakes are
//! returned synchronously from the handle, source failures are recorded
//! on the session and surfaced when `wait` returns. Sink errors never
//! propagate; they are logged and replay continues.

use thiserror::Error;

/// Errors surfaced by the replay engine.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Invalid session construction or mutation (missing source,
    /// non-positive rate).
    #[error("configuration: {0}")]
    Configuration(String),

    /// The event source failed mid-replay; the batch queue was closed
    /// early and the error is surfaced by `wait`.
    #[error("source failed: {0}")]
    Source(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_distinguishable() {
        let config = ReplayError::Configuration("an event source is required".into());
        assert!(matches!(config, ReplayError::Configuration(_)));
        assert!(config.to_string().starts_with("configuration:"));

        let source = ReplayError::Source(anyhow::anyhow!("tape unreadable"));
        assert!(matches!(source, ReplayError::Source(_)));
        assert!(source.to_string().contains("tape unreadable"));
    }
}
