//! Error types for the poster renderer

use crate::Viewport;
use thiserror::Error;

/// Result type alias for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating or rendering a poster
#[derive(Error, Debug)]
pub enum Error {
    /// The poster configuration failed structural or range checks.
    /// Carries every violation found, not just the first.
    #[error("Invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The browser process could not be started
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// The local print template did not load in time
    #[error("Template navigation failed (timeout {timeout_ms}ms): {message}")]
    NavigationTimeout { timeout_ms: u64, message: String },

    /// The page never raised its completion flag
    #[error("Map rendering did not complete within {0}ms")]
    RenderTimeout(u64),

    /// Injecting or evaluating script in the page failed
    #[error("Script execution failed: {0}")]
    Script(String),

    /// Screenshot or file write failed after the page reported completion
    #[error("Capture failed: {0}")]
    Capture(String),

    /// A validated config could not be turned into the typed model
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The render was abandoned by its caller
    #[error("Render cancelled")]
    Cancelled,

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error was caused by the submitted config rather than the
    /// render environment. Callers map this to a 4xx-class rejection.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::ConfigError(_))
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

/// A failed render job, with the context gathered before it failed
#[derive(Error, Debug)]
#[error("[{job_id}] render failed after {elapsed_ms}ms")]
pub struct RenderFailure {
    pub job_id: String,
    pub elapsed_ms: u64,
    /// Capture viewport, if geometry was computed before the failure
    pub viewport: Option<Viewport>,
    #[source]
    pub source: Error,
}

impl RenderFailure {
    pub fn kind(&self) -> &Error {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_error() {
        let err = Error::Validation(vec![
            "Layout configuration is required".into(),
            "At least one map is required".into(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("Layout configuration is required"));
        assert!(msg.contains("At least one map is required"));
        assert!(err.is_validation());
    }

    #[test]
    fn failure_carries_job_context() {
        let failure = RenderFailure {
            job_id: "job-1".into(),
            elapsed_ms: 1500,
            viewport: None,
            source: Error::RenderTimeout(120000),
        };
        let msg = failure.to_string();
        assert_eq!(msg, "[job-1] render failed after 1500ms");
        assert!(!failure.kind().is_validation());
    }

    #[test]
    fn failure_reports_cause_once_in_chain() {
        let failure = RenderFailure {
            job_id: "job-2".into(),
            elapsed_ms: 10,
            viewport: None,
            source: Error::Capture("Target closed".into()),
        };
        let cause = std::error::Error::source(&failure).map(|e| e.to_string());
        assert_eq!(cause.as_deref(), Some("Capture failed: Target closed"));

        let chained = format!("{:#}", anyhow::Error::new(failure));
        assert_eq!(chained.matches("Target closed").count(), 1);
    }
}
