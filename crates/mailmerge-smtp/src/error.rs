//! Error types for SMTP operations.

use crate::types::{ReplyClass, ReplyCode};
use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message exceeds the size the server advertised in EHLO.
    #[error("Message exceeds size limit: {size} bytes (server limit {limit})")]
    MessageTooLarge {
        /// Size of the rejected message.
        size: usize,
        /// Limit advertised by the server.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Connection attempt did not finish in time.
    #[error("Timed out connecting to {0}")]
    Timeout(String),

    /// The server did not finish a reply in time.
    #[error("No reply from the server within {} seconds", .0.as_secs())]
    ReplyTimeout(Duration),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true for a 4xx refusal: the same command may succeed later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::SmtpError { code, .. } => {
                matches!(ReplyCode::new(*code).class(), ReplyClass::Transient)
            }
            _ => false,
        }
    }
}
