//! Run-fatal error types.
//!
//! Anything in [`Error`] stops a merge before (or instead of) sending mail.
//! Failures scoped to one recipient live in [`crate::template::RenderError`]
//! and [`crate::delivery::DeliveryError`] and never abort the run.

use crate::template::{RenderError, TemplateKind};
use thiserror::Error;

/// Errors that abort a merge run.
#[derive(Debug, Error)]
pub enum Error {
    /// A recipient row does not match the active schema.
    #[error("malformed recipient row {row}: expected {expected} fields, found {found}")]
    MalformedInput {
        /// Row index in the source, the header being row 0.
        row: usize,
        /// Width required by the schema.
        expected: usize,
        /// Width of the offending row.
        found: usize,
    },

    /// The recipient source could not be read or decoded.
    #[error("recipient source unavailable: {0}")]
    SourceUnavailable(String),

    /// The recipient source holds no data rows.
    #[error("there are no recipients to send to")]
    NoRecipients,

    /// A template failed to compile.
    #[error("invalid {kind} template: {message}")]
    TemplateSyntax {
        /// Which template was rejected.
        kind: TemplateKind,
        /// Parser diagnostic.
        message: String,
    },

    /// The preview message could not be rendered.
    #[error("cannot render preview: {0}")]
    Preview(#[source] RenderError),

    /// Connecting to the mail server failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server refused the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The operator declined to send.
    #[error("aborted by operator: {0}")]
    Aborted(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Console or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
