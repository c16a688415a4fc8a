//! Message composition and the reusable mail envelope.

use mailmerge_smtp::Address;
use std::fmt::Write;

/// Assembles the header block and body of one message.
///
/// `From`, `To` and `Subject` lines end in CRLF, followed by an empty line
/// and the body verbatim. Several recipients share one `To` line, separated
/// by `;`. Header values are not escaped or folded; see
/// [`check_header_value`].
#[must_use]
pub fn compose<S: AsRef<str>>(
    sender: &str,
    recipients: &[S],
    subject: &str,
    body: &str,
) -> String {
    let to = recipients
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(";");

    let mut message = String::with_capacity(body.len() + 128);
    let _ = write!(message, "From: {sender}\r\n");
    let _ = write!(message, "To: {to}\r\n");
    let _ = write!(message, "Subject: {subject}\r\n");
    message.push_str("\r\n");
    message.push_str(body);
    message
}

/// The message as shown to the operator before anything is sent.
#[must_use]
pub fn preview<S: AsRef<str>>(recipients: &[S], subject: &str, body: &str) -> String {
    compose("...", recipients, subject, body)
}

/// Checks that `value` can be placed on a single header line.
///
/// # Errors
///
/// Returns a description of the problem if the value contains CR or LF.
pub fn check_header_value(value: &str) -> Result<(), String> {
    match value.find(['\r', '\n']) {
        Some(at) => Err(format!("line break at offset {at} in header value")),
        None => Ok(()),
    }
}

/// Sender, recipients and rendered content of one SMTP transaction.
///
/// The sender is fixed for the run. Everything else is replaced at once by
/// [`Envelope::load`] so that no iteration sees another's content.
#[derive(Debug, Clone)]
pub struct Envelope {
    sender: Address,
    recipients: Vec<Address>,
    subject: String,
    body: String,
}

impl Envelope {
    /// Creates an empty envelope for `sender`.
    #[must_use]
    pub const fn new(sender: Address) -> Self {
        Self {
            sender,
            recipients: Vec::new(),
            subject: String::new(),
            body: String::new(),
        }
    }

    /// Replaces recipients, subject and body.
    pub fn load(&mut self, recipients: Vec<Address>, subject: String, body: String) {
        self.recipients = recipients;
        self.subject = subject;
        self.body = body;
    }

    /// Envelope sender.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Envelope recipients, in order.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Rendered subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Rendered body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The composed message for the current contents.
    #[must_use]
    pub fn message(&self) -> String {
        let to: Vec<&str> = self.recipients.iter().map(Address::as_str).collect();
        compose(self.sender.as_str(), &to, &self.subject, &self.body)
    }
}
