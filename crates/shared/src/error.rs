use thiserror::Error;

/// Failure taxonomy of the live-show controller.
///
/// Background-loop callers log these and keep ticking; manual operations
/// surface them to the caller unchanged.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("invalid time format '{0}': expected HH:MM")]
    InvalidTimeFormat(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("no external state API configured")]
    NotConfigured,

    #[error("external state API unreachable: {0}")]
    ExternalUnreachable(String),

    #[error("external state API returned status {0}")]
    ExternalError(u16),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
