use std::panic::Location;

use thiserror::Error;

/// Result alias used by every public pipeline entry point.
pub type Result<T> = std::result::Result<T, PipelineError>;

// ---------------------------------------------------------------------------
// PipelineError – the single error kind surfaced to callers
// ---------------------------------------------------------------------------

/// Wraps any failure together with the source location of the entry point
/// that caught it.  `Display` renders the whole cause chain, so the error
/// reports no separate `source()`; use [`PipelineError::cause`] to walk it.
///
/// Internals build up `anyhow` context chains; the public stage functions
/// convert them into a `PipelineError` exactly once, on the way out.
#[derive(Debug, Error)]
#[error("Error occurred in [{file}] line [{line}]: {cause:#}")]
pub struct PipelineError {
    file: &'static str,
    line: u32,
    cause: anyhow::Error,
}

impl PipelineError {
    /// Wrap `source`, recording the caller's location.
    #[track_caller]
    pub fn new(source: impl Into<anyhow::Error>) -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            cause: source.into(),
        }
    }

    /// Source file of the entry point that raised the error.
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// Line of the entry point that raised the error.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// The wrapped cause, with its full context chain.
    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

/// Convert any fallible result into a [`PipelineError`] at the call site.
pub trait WrapErr<T> {
    fn wrap_err(self) -> Result<T>;
}

impl<T, E> WrapErr<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    #[track_caller]
    fn wrap_err(self) -> Result<T> {
        // A closure here would hide the caller's location from `track_caller`.
        match self {
            Ok(value) => Ok(value),
            Err(err) => Err(PipelineError::new(err)),
        }
    }
}
