//! The error type shared by every streamladder crate.
//!
//! Failures from the store, the external tools, and request validation all
//! converge on [`Error`]. The HTTP layer turns one into a response via
//! [`Error::http_status`]; everything else just propagates with `?`.

use std::fmt;

/// Unified error type covering all failure modes in streamladder.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Lookup of a video, snapshot, or similar entity came up empty.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// The caller supplied data we refuse to act on.
    #[error("invalid: {0}")]
    Validation(String),

    /// Reading or writing durable job state failed.
    #[error("store failure: {0}")]
    Store(String),

    /// An underlying filesystem or pipe call failed.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// ffmpeg or ffprobe misbehaved: missing, killed, or non-zero exit.
    #[error("[{tool}] {message}")]
    Tool { tool: String, message: String },

    /// The source file could not be inspected. The message is already
    /// self-describing, so no prefix.
    #[error("{0}")]
    Probe(String),

    /// Catch-all for states that should not be reachable.
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// The HTTP status code this error maps to at the API boundary.
    ///
    /// Tool failures are 502 (the upstream encoder broke, not us) and probe
    /// failures are 422 (the source itself is unprocessable).
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Store(_) | Error::Io(_) | Error::Internal(_) => 500,
            Error::Tool { .. } => 502,
            Error::Probe(_) => 422,
        }
    }

    /// Build a [`Error::NotFound`] from an entity kind and its id.
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound { entity: entity.into(), id: id.to_string() }
    }

    /// Build a [`Error::Store`] from a message.
    pub fn store(message: impl Into<String>) -> Self {
        Error::Store(message.into())
    }

    /// Build a [`Error::Tool`] from the tool name and a message.
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool { tool: tool.into(), message: message.into() }
    }
}

/// Shorthand used by every fallible function in the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings_are_stable() {
        // API clients see these verbatim in the `error` field.
        let cases = [
            (Error::not_found("video", "abc-123"), "video abc-123 not found"),
            (Error::Validation("name is required".into()), "invalid: name is required"),
            (Error::store("snapshot is corrupt"), "store failure: snapshot is corrupt"),
            (Error::tool("ffmpeg", "exit code 1"), "[ffmpeg] exit code 1"),
            (Error::Probe("no video stream".into()), "no video stream"),
            (Error::Internal("unexpected state".into()), "internal: unexpected state"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(Error::not_found("video", "x").http_status(), 404);
        assert_eq!(Error::Validation("bad".into()).http_status(), 400);
        assert_eq!(Error::store("broken").http_status(), 500);
        assert_eq!(Error::tool("ffprobe", "killed").http_status(), 502);
        assert_eq!(Error::Probe("empty".into()).http_status(), 422);
        assert_eq!(Error::Internal("bug".into()).http_status(), 500);
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn touch() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        let err = touch().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.http_status(), 500);
    }
}
