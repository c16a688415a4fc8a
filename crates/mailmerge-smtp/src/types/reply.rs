//! Server replies.

use std::fmt;

/// A complete (possibly multi-line) reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit status.
    pub code: ReplyCode,
    /// Text of each line, code and separator removed.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true for a 2xx reply.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code.class(), ReplyClass::Completed)
    }

    /// Reply text with lines joined by `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Turns a refusal into an [`Error::SmtpError`](crate::Error::SmtpError).
    #[must_use]
    pub fn into_error(self) -> crate::Error {
        crate::Error::smtp_error(self.code.as_u16(), self.message_text())
    }
}

/// First digit of a reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2xx: the command was carried out.
    Completed,
    /// 3xx: the server waits for more input.
    Intermediate,
    /// 4xx: refused for now; the same command may succeed later.
    Transient,
    /// 5xx: refused for good.
    Permanent,
    /// Anything outside 200-599.
    Invalid,
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 221 closing channel, the answer to QUIT.
    pub const CLOSING: Self = Self(221);
    /// 250 requested action completed.
    pub const OK: Self = Self(250);
    /// 354 start mail input, the answer to DATA.
    pub const START_DATA: Self = Self(354);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Class of the reply.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            2 => ReplyClass::Completed,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::Transient,
            5 => ReplyClass::Permanent,
            _ => ReplyClass::Invalid,
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
