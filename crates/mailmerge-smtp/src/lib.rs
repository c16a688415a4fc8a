//! # mailmerge-smtp
//!
//! SMTP submission client used by the mailmerge delivery pipeline.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **Recoverable steps**: A refused greeting, `EHLO`, `AUTH`, `MAIL FROM`,
//!   `RCPT TO`, `DATA` or message hands the client back, so the session can
//!   carry on or at least end with `QUIT`
//! - **Timeouts**: on connecting and on every server reply
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS, with relaxed
//!   certificate verification available as an explicit opt-in
//! - **Authentication**: PLAIN
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailmerge_smtp::{Address, Client, ConnectOptions};
//! use mailmerge_smtp::connection::connect_tls;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> mailmerge_smtp::Result<()> {
//!     let stream = connect_tls("smtp.example.com", 465, &ConnectOptions::default()).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.ehlo("client.example.com").await?;
//!     let client = client.auth_plain("user@example.com", "password").await?;
//!
//!     let from = Address::new("user@example.com")?;
//!     let to = Address::new("recipient@example.com")?;
//!
//!     let client = client.mail_from(from, None).await?;
//!     let client = client.rcpt_to(to).await?;
//!     let client = client.data().await?;
//!
//!     let message = b"Subject: Test\r\n\r\nHello, World!\r\n";
//!     let client = client.send_message(message).await?;
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connected ── auth_plain() ──→ Authenticated ── mail_from() ──→ MailTransaction
//!                                    ↑                                │ rcpt_to()
//!                                    │                                ↓
//!                                    └── send_message() ── Data ←── RecipientAdded
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Connection management and type-state client
//! - [`parser`]: Response parser
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, ConnectOptions, Connected, Data, MailTransaction, RecipientAdded,
    ServerInfo, SmtpConnection, SmtpStream, StepError, StepResult, message_size,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyClass, ReplyCode};
