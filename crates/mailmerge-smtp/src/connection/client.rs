//! Type-state SMTP client.

use super::{ConnectOptions, ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{has_reply_code, is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    reply_timeout: Duration,
    _state: PhantomData<State>,
}

/// Failure of one envelope step.
///
/// When the server refuses a step with an error reply the connection is
/// still usable, and the client comes back in the state `S` it can resume
/// from (or at least send `QUIT` from). Any other failure loses the
/// connection.
#[derive(Debug)]
pub enum StepError<S> {
    /// The server refused the step; the session can continue.
    Rejected {
        /// Error built from the server's reply.
        error: Error,
        /// Client returned to a resumable state.
        client: Client<S>,
    },
    /// The connection broke; the session is gone.
    Broken(Error),
}

impl<S> StepError<S> {
    /// Drops the client (if any) and returns the underlying error.
    #[must_use]
    pub fn into_error(self) -> Error {
        match self {
            Self::Rejected { error, .. } | Self::Broken(error) => error,
        }
    }
}

impl<S> From<StepError<S>> for Error {
    fn from(step: StepError<S>) -> Self {
        step.into_error()
    }
}

/// Result of a session step.
pub type StepResult<T, S> = std::result::Result<T, StepError<S>>;

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// Replies are awaited for [`ConnectOptions::default`]'s reply timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] if the server greets with an error
    /// reply, so the caller can still say `QUIT`.
    pub async fn from_stream(stream: SmtpStream) -> StepResult<Self, Connected> {
        Self::from_stream_with(stream, &ConnectOptions::default()).await
    }

    /// Like [`Client::from_stream`], with the reply timeout from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] if the server greets with an error
    /// reply, and [`StepError::Broken`] if no greeting can be read.
    pub async fn from_stream_with(
        mut stream: SmtpStream,
        options: &ConnectOptions,
    ) -> StepResult<Self, Connected> {
        let greeting = read_reply(&mut stream, options.reply_timeout)
            .await
            .map_err(StepError::Broken)?;

        // First word of the greeting text is the server's hostname
        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        let client = Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            reply_timeout: options.reply_timeout,
            _state: PhantomData,
        };

        if !greeting.is_success() {
            return Err(StepError::Rejected {
                error: greeting.into_error(),
                client,
            });
        }
        debug!(hostname = %client.server_info.hostname, "received SMTP greeting");
        Ok(client)
    }

    /// Sends EHLO and discovers server capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] if the server refuses the greeting.
    pub async fn ehlo(mut self, client_hostname: &str) -> StepResult<Self, Connected> {
        let command = Command::Ehlo {
            hostname: client_hostname.to_string(),
        };
        let reply = match self.send_step(command).await {
            Ok(reply) => reply,
            Err(failure) => return Err(self.refused(failure)),
        };

        // The first line is the greeting; every following line is one extension
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] if STARTTLS is not offered or refused,
    /// and [`StepError::Broken`] if the TLS handshake fails.
    pub async fn starttls(
        mut self,
        hostname: &str,
        client_hostname: &str,
        options: &ConnectOptions,
    ) -> StepResult<Self, Connected> {
        if !self.server_info.supports_starttls() {
            return Err(StepError::Rejected {
                error: Error::NotSupported("STARTTLS".into()),
                client: self,
            });
        }

        if let Err(failure) = self.send_step(Command::StartTls).await {
            return Err(self.refused(failure));
        }
        self.stream = self
            .stream
            .upgrade_to_tls(hostname, options)
            .await
            .map_err(StepError::Broken)?;
        debug!(%hostname, "upgraded connection to TLS");

        // Capabilities learned before the upgrade must be discarded
        self.server_info.extensions.clear();
        self.ehlo(client_hostname).await
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] if the server advertised `AUTH`
    /// without `PLAIN` or refuses the credentials.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> StepResult<Client<Authenticated>, Connected> {
        let offered = self.server_info.auth_mechanisms();
        if offered.is_some_and(|mechanisms| !mechanisms.contains(&AuthMechanism::Plain)) {
            return Err(StepError::Rejected {
                error: Error::NotSupported("AUTH PLAIN".into()),
                client: self,
            });
        }

        // PLAIN response: \0username\0password
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        let command = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(encoded),
        };
        match self.send_step(command).await {
            Ok(_) => {
                debug!(%username, "authenticated");
                Ok(self.transition())
            }
            Err(failure) => Err(self.refused(failure)),
        }
    }
}

impl Client<Authenticated> {
    /// Opens an envelope with `MAIL FROM`.
    ///
    /// `BODY=8BITMIME` and `SIZE=` are added when the server advertised the
    /// matching extension and a size hint was given.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] if the server refuses the sender.
    pub async fn mail_from(
        mut self,
        from: Address,
        size_hint: Option<usize>,
    ) -> StepResult<Client<MailTransaction>, Authenticated> {
        if let (Some(size), Some(limit)) = (size_hint, self.server_info.max_message_size()) {
            if size > limit {
                return Err(StepError::Rejected {
                    error: Error::MessageTooLarge { size, limit },
                    client: self,
                });
            }
        }

        let body = self
            .server_info
            .supports(&Extension::EightBitMime)
            .then_some("8BITMIME");
        let size = size_hint.filter(|_| self.server_info.advertises_size());

        match self.send_step(Command::MailFrom { from, body, size }).await {
            Ok(_) => Ok(self.transition()),
            Err(failure) => Err(self.refused(failure)),
        }
    }
}

impl Client<MailTransaction> {
    /// Declares the first recipient of the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] with the envelope still open if the
    /// server refuses the mailbox.
    pub async fn rcpt_to(
        mut self,
        to: Address,
    ) -> StepResult<Client<RecipientAdded>, MailTransaction> {
        match self.send_step(Command::RcptTo { to }).await {
            Ok(_) => Ok(self.transition()),
            Err(failure) => Err(self.refused(failure)),
        }
    }

    /// Abandons the envelope with `RSET`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Authenticated>> {
        self.expect_success(Command::Rset).await?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Declares another recipient of the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] with the already accepted recipients
    /// kept if the server refuses the mailbox.
    pub async fn rcpt_to(mut self, to: Address) -> StepResult<Self, RecipientAdded> {
        match self.send_step(Command::RcptTo { to }).await {
            Ok(_) => Ok(self),
            Err(failure) => Err(self.refused(failure)),
        }
    }

    /// Opens the data stream.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] if the server does not answer 354.
    pub async fn data(mut self) -> StepResult<Client<Data>, RecipientAdded> {
        let reply = match self.send_command(Command::Data).await {
            Ok(reply) => reply,
            Err(error) => return Err(StepError::Broken(error)),
        };

        if reply.code != ReplyCode::START_DATA {
            return Err(StepError::Rejected {
                error: reply.into_error(),
                client: self,
            });
        }

        Ok(self.transition())
    }

    /// Abandons the envelope with `RSET`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(mut self) -> Result<Client<Authenticated>> {
        self.expect_success(Command::Rset).await?;
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed, and the terminating `.` line is appended. The server's
    /// reply to the terminator is the delivery signal; either way the
    /// envelope is over and the client returns to [`Authenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Rejected`] if the server refuses the message.
    pub async fn send_message(
        mut self,
        message: &[u8],
    ) -> StepResult<Client<Authenticated>, Authenticated> {
        let payload = encode_data(message);
        if let Err(error) = self.stream.write_all(&payload).await {
            return Err(StepError::Broken(error));
        }

        let reply = match read_reply(&mut self.stream, self.reply_timeout).await {
            Ok(reply) => reply,
            Err(error) => return Err(StepError::Broken(error)),
        };

        let client = self.transition();
        if reply.is_success() {
            Ok(client)
        } else {
            Err(StepError::Rejected {
                error: reply.into_error(),
                client,
            })
        }
    }
}

/// Size of `message` as declared with `SIZE=`: CRLF line endings, without
/// dot-stuffing or the terminating `.` line (RFC 1870, section 3).
#[must_use]
pub fn message_size(message: &[u8]) -> usize {
    lines(message).map(|line| line.len() + 2).sum()
}

/// Lines of the message without their terminators. A trailing line break
/// does not start another line.
fn lines(message: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    body.split(|&b| b == b'\n')
        .filter(move |_| !body.is_empty())
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Builds the DATA payload: CRLF line endings, dot-stuffing, terminator.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(message.len() + 16);
    for line in lines(message) {
        if line.first() == Some(&b'.') {
            payload.push(b'.');
        }
        payload.extend_from_slice(line);
        payload.extend_from_slice(b"\r\n");
    }
    payload.extend_from_slice(b".\r\n");
    payload
}

/// Distinguishes a refused command from a lost connection.
enum StepFailure {
    Refused(Error),
    Broken(Error),
}

// Common implementation for all states
impl<S> Client<S> {
    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            reply_timeout: self.reply_timeout,
            _state: PhantomData,
        }
    }

    /// Hands the client back with a refusal; a lost connection drops it.
    fn refused(self, failure: StepFailure) -> StepError<S> {
        match failure {
            StepFailure::Refused(error) => StepError::Rejected {
                error,
                client: self,
            },
            StepFailure::Broken(error) => StepError::Broken(error),
        }
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        debug!(command = cmd.verb(), "sending SMTP command");
        self.stream.write_all(&cmd.serialize()).await?;
        let reply = read_reply(&mut self.stream, self.reply_timeout).await?;
        debug!(code = %reply.code, "received SMTP reply");
        Ok(reply)
    }

    async fn expect_success(&mut self, cmd: Command) -> Result<Reply> {
        let reply = self.send_command(cmd).await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    async fn send_step(&mut self, cmd: Command) -> std::result::Result<Reply, StepFailure> {
        match self.send_command(cmd).await {
            Ok(reply) if reply.is_success() => Ok(reply),
            Ok(reply) => Err(StepFailure::Refused(reply.into_error())),
            Err(error) => Err(StepFailure::Broken(error)),
        }
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;

        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(reply.into_error());
        }

        Ok(())
    }
}

/// Reads one complete reply, giving up after `limit`.
async fn read_reply(stream: &mut SmtpStream, limit: Duration) -> Result<Reply> {
    let lines = tokio::time::timeout(limit, read_reply_lines(stream))
        .await
        .map_err(|_| Error::ReplyTimeout(limit))??;
    parse_reply(&lines)
}

async fn read_reply_lines(stream: &mut SmtpStream) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }
        if !has_reply_code(&line) {
            return Err(Error::Protocol(format!("Malformed reply line: {line}")));
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            return Ok(lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_payload_normalizes_line_endings() {
        assert_eq!(encode_data(b"a\nb\r\nc"), b"a\r\nb\r\nc\r\n.\r\n");
    }

    #[test]
    fn data_payload_dot_stuffs() {
        assert_eq!(encode_data(b".hidden\r\n..\r\nok"), b"..hidden\r\n...\r\nok\r\n.\r\n");
    }

    #[test]
    fn data_payload_does_not_double_trailing_newline() {
        assert_eq!(encode_data(b"body\r\n"), b"body\r\n.\r\n");
        assert_eq!(encode_data(b"body\r\n\r\n"), b"body\r\n\r\n.\r\n");
    }

    #[test]
    fn empty_message_is_just_terminator() {
        assert_eq!(encode_data(b""), b".\r\n");
        assert_eq!(message_size(b""), 0);
    }

    #[test]
    fn size_counts_normalized_line_endings() {
        assert_eq!(message_size(b"a\nb"), 6);
        assert_eq!(message_size(b"a\r\nb\r\n"), 6);
        assert_eq!(message_size(b"To: x\n\nbody\n"), 15);
    }

    #[test]
    fn size_excludes_stuffing_and_terminator() {
        let message = b".dot\nline";
        assert_eq!(message_size(message), 12);
        assert_eq!(encode_data(message).len(), 12 + 1 + 3);
    }
}
