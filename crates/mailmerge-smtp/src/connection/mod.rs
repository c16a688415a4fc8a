//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, SmtpConnection,
    StepError, StepResult, message_size,
};
pub use stream::{AsyncStream, ConnectOptions, SmtpStream, connect, connect_tls};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;

/// Server capabilities from EHLO response.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if the server advertised SIZE, with or without a limit.
    #[must_use]
    pub fn advertises_size(&self) -> bool {
        self.extensions
            .iter()
            .any(|ext| matches!(ext, Extension::Size(_)))
    }

    /// Returns the maximum message size, if advertised.
    ///
    /// A limit of zero means the server declared no fixed maximum.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Mechanisms listed in the `AUTH` capability, or `None` if the server
    /// did not advertise `AUTH` at all.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Option<&[AuthMechanism]> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
            _ => None,
        })
    }
}
