//! Delivery over one authenticated SMTP session.
//!
//! A [`DeliverySession`] authenticates once and then carries any number of
//! envelopes. A refused step only costs the affected envelope or address:
//! the transaction is reset and the session continues. If the connection
//! breaks, every later envelope fails immediately with [`Stage::Session`].

use crate::config::{Credentials, Security, ServerConfig};
use crate::error::{Error, Result};
use crate::message::Envelope;
use mailmerge_smtp::connection::{connect, connect_tls};
use mailmerge_smtp::{
    Address, Authenticated, Client, Connected, MailTransaction, RecipientAdded, SmtpStream,
    StepError, StepResult, message_size,
};
use std::fmt;
use tracing::{debug, info, warn};

/// Step of an envelope at which delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The recipient has no usable address; nothing was sent.
    Address,
    /// The server refused the sender.
    MailFrom,
    /// The server refused the recipient.
    RcptTo,
    /// The server refused to accept data.
    Data,
    /// The server refused the message content.
    Message,
    /// The session was already lost.
    Session,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Address => "address",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Message => "message",
            Self::Session => "session",
        })
    }
}

/// Delivery to one recipient address failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed for {recipient}: {cause}")]
pub struct DeliveryError {
    /// Where the envelope failed.
    pub stage: Stage,
    /// Address that was not delivered to.
    pub recipient: String,
    /// Server reply or transport error.
    pub cause: String,
    /// The server refused with a 4xx reply; a later attempt may succeed.
    pub transient: bool,
}

impl DeliveryError {
    /// Creates a delivery error that is not worth retrying as is.
    #[must_use]
    pub fn new(stage: Stage, recipient: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            stage,
            recipient: recipient.into(),
            cause: cause.to_string(),
            transient: false,
        }
    }

    /// Creates a delivery error from what the SMTP client reported.
    #[must_use]
    pub fn refused(
        stage: Stage,
        recipient: impl Into<String>,
        error: &mailmerge_smtp::Error,
    ) -> Self {
        Self {
            transient: error.is_transient(),
            ..Self::new(stage, recipient, error)
        }
    }
}

/// Outcome for each envelope recipient, in envelope order.
pub type Outcomes = Vec<std::result::Result<(), DeliveryError>>;

/// Something that delivers envelopes.
#[allow(async_fn_in_trait)]
pub trait Mailer: Sized {
    /// Transmits one envelope and reports one outcome per recipient.
    async fn send(&mut self, envelope: &Envelope) -> Outcomes;

    /// Ends the session. Failures are logged, never returned.
    async fn close(self);
}

/// Opens authenticated delivery sessions.
#[allow(async_fn_in_trait)]
pub trait Connector {
    /// Session type produced.
    type Session: Mailer;

    /// Connects and authenticates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] or [`Error::Auth`].
    async fn connect(&self, credentials: &Credentials) -> Result<Self::Session>;
}

/// Connects to the configured SMTP server.
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    server: ServerConfig,
}

impl SmtpConnector {
    /// Creates a connector for `server`.
    #[must_use]
    pub const fn new(server: ServerConfig) -> Self {
        Self { server }
    }
}

impl Connector for SmtpConnector {
    type Session = DeliverySession;

    async fn connect(&self, credentials: &Credentials) -> Result<DeliverySession> {
        let server = &self.server;
        let options = server.connect_options();
        let port = server.port();

        if options.accept_invalid_certs {
            warn!(host = %server.host, "certificate verification is disabled for this server");
        }
        info!(
            host = %server.host,
            port,
            security = server.security.display_name(),
            "connecting"
        );

        let stream = match server.security {
            Security::Tls => connect_tls(&server.host, port, &options).await,
            Security::StartTls => connect(&server.host, port, &options).await,
        }
        .map_err(|e| Error::Connection(e.to_string()))?;

        DeliverySession::open(stream, server, credentials).await
    }
}

/// An authenticated SMTP session.
#[derive(Debug)]
pub struct DeliverySession {
    client: Option<Client<Authenticated>>,
}

impl DeliverySession {
    /// Reads the greeting, negotiates and authenticates on `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the greeting, EHLO or STARTTLS fails
    /// and [`Error::Auth`] if the server refuses the credentials. If the
    /// server is still listening the session is ended with `QUIT` first.
    pub async fn open(
        stream: SmtpStream,
        server: &ServerConfig,
        credentials: &Credentials,
    ) -> Result<Self> {
        let client = match negotiate(stream, server).await {
            Ok(client) => client,
            Err(step) => return Err(Error::Connection(give_up(step).await.to_string())),
        };

        let login = client
            .auth_plain(&credentials.username, credentials.password.expose())
            .await;
        let client = match login {
            Ok(client) => client,
            Err(step) => return Err(Error::Auth(give_up(step).await.to_string())),
        };
        info!(username = %credentials.username, "authenticated");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Returns true while the connection is usable.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.client.is_some()
    }
}

impl Mailer for DeliverySession {
    async fn send(&mut self, envelope: &Envelope) -> Outcomes {
        let mut outcomes = Tally::new(envelope.recipients());
        match self.client.take() {
            Some(client) => self.client = transact(client, envelope, &mut outcomes).await,
            None => outcomes.lost(),
        }
        outcomes.finish()
    }

    async fn close(self) {
        let Some(client) = self.client else {
            return;
        };
        match client.quit().await {
            Ok(()) => debug!("session closed"),
            Err(e) => warn!(error = %e, "QUIT failed"),
        }
    }
}

/// Greeting, EHLO and the optional STARTTLS upgrade.
async fn negotiate(
    stream: SmtpStream,
    server: &ServerConfig,
) -> StepResult<Client<Connected>, Connected> {
    let options = server.connect_options();
    let client = Client::from_stream_with(stream, &options)
        .await?
        .ehlo(&server.helo_name)
        .await?;
    match server.security {
        Security::StartTls => {
            client
                .starttls(&server.host, &server.helo_name, &options)
                .await
        }
        Security::Tls => Ok(client),
    }
}

/// Ends a session that failed before it was usable.
async fn give_up<S>(step: StepError<S>) -> mailmerge_smtp::Error {
    match step {
        StepError::Rejected { error, client } => {
            if let Err(e) = client.quit().await {
                warn!(error = %e, "QUIT failed");
            }
            error
        }
        StepError::Broken(error) => error,
    }
}

/// Envelope with no accepted recipient yet, or with at least one.
enum Open {
    Empty(Client<MailTransaction>),
    Ready(Client<RecipientAdded>),
}

/// Runs one SMTP transaction. Returns the client if the session survived.
async fn transact(
    client: Client<Authenticated>,
    envelope: &Envelope,
    outcomes: &mut Tally<'_>,
) -> Option<Client<Authenticated>> {
    let message = envelope.message();
    let size = message_size(message.as_bytes());

    let mut open = match client.mail_from(envelope.sender().clone(), Some(size)).await {
        Ok(client) => Open::Empty(client),
        Err(StepError::Rejected { error, client }) => {
            outcomes.settle(Stage::MailFrom, &error);
            return Some(client);
        }
        Err(StepError::Broken(error)) => {
            outcomes.settle(Stage::MailFrom, &error);
            return None;
        }
    };

    for (index, address) in envelope.recipients().iter().enumerate() {
        let next = match open {
            Open::Empty(client) => {
                advance(client.rcpt_to(address.clone()).await, index, outcomes)
            }
            Open::Ready(client) => {
                advance(client.rcpt_to(address.clone()).await, index, outcomes)
            }
        };
        open = next?;
    }

    let client = match open {
        Open::Ready(client) => client,
        Open::Empty(client) => {
            debug!("no recipient accepted, abandoning envelope");
            return after_reset(client.reset().await);
        }
    };

    let client = match client.data().await {
        Ok(client) => client,
        Err(StepError::Rejected { error, client }) => {
            outcomes.settle(Stage::Data, &error);
            return after_reset(client.reset().await);
        }
        Err(StepError::Broken(error)) => {
            outcomes.settle(Stage::Data, &error);
            return None;
        }
    };

    match client.send_message(message.as_bytes()).await {
        Ok(client) => Some(client),
        Err(StepError::Rejected { error, client }) => {
            outcomes.settle(Stage::Message, &error);
            Some(client)
        }
        Err(StepError::Broken(error)) => {
            outcomes.settle(Stage::Message, &error);
            None
        }
    }
}

/// Applies the reply to `RCPT TO`; `None` if the connection broke.
fn advance<S>(
    step: StepResult<Client<RecipientAdded>, S>,
    index: usize,
    outcomes: &mut Tally<'_>,
) -> Option<Open>
where
    Client<S>: Into<Open>,
{
    match step {
        Ok(client) => Some(Open::Ready(client)),
        Err(StepError::Rejected { error, client }) => {
            outcomes.record(index, Stage::RcptTo, &error);
            Some(client.into())
        }
        Err(StepError::Broken(error)) => {
            outcomes.settle(Stage::RcptTo, &error);
            None
        }
    }
}

fn after_reset(
    result: mailmerge_smtp::Result<Client<Authenticated>>,
) -> Option<Client<Authenticated>> {
    result
        .inspect_err(|e| warn!(error = %e, "RSET failed, dropping the session"))
        .ok()
}

impl From<Client<MailTransaction>> for Open {
    fn from(client: Client<MailTransaction>) -> Self {
        Self::Empty(client)
    }
}

impl From<Client<RecipientAdded>> for Open {
    fn from(client: Client<RecipientAdded>) -> Self {
        Self::Ready(client)
    }
}

/// Per-address outcomes of one envelope.
struct Tally<'a> {
    addresses: &'a [Address],
    failures: Vec<Option<DeliveryError>>,
}

impl<'a> Tally<'a> {
    fn new(addresses: &'a [Address]) -> Self {
        Self {
            addresses,
            failures: vec![None; addresses.len()],
        }
    }

    fn record(&mut self, index: usize, stage: Stage, error: &mailmerge_smtp::Error) {
        let address = self.addresses.get(index);
        if let (Some(slot), Some(address)) = (self.failures.get_mut(index), address) {
            *slot = Some(DeliveryError::refused(stage, address.as_str(), error));
        }
    }

    /// Fails every address that has no outcome yet.
    fn settle(&mut self, stage: Stage, error: &mailmerge_smtp::Error) {
        self.fill(|address| DeliveryError::refused(stage, address, error));
    }

    /// Fails every address because the session is already gone.
    fn lost(&mut self) {
        self.fill(|address| {
            DeliveryError::new(Stage::Session, address, "connection to the server was lost")
        });
    }

    fn fill(&mut self, failure: impl Fn(&str) -> DeliveryError) {
        for (slot, address) in self.failures.iter_mut().zip(self.addresses) {
            if slot.is_none() {
                *slot = Some(failure(address.as_str()));
            }
        }
    }

    fn finish(self) -> Outcomes {
        self.failures
            .into_iter()
            .map(|failure| failure.map_or(Ok(()), Err))
            .collect()
    }
}
