//! # mailmerge-core
//!
//! Merge-and-delivery pipeline for `mailmerge`.
//!
//! This crate provides:
//! - Recipient ingestion from CSV with configurable column layouts
//! - Subject and body templates rendered per recipient
//! - Message composition
//! - A delivery session that authenticates once and isolates failures
//!   per recipient
//! - The merge run itself, with its preview and confirmation gate
//!
//! ## Example
//!
//! ```no_run
//! use mailmerge_core::{Merge, MergeConfig, MergeOptions, RecipientSet, Schema, SmtpConnector};
//! # use mailmerge_core::{Credentials, Operator, Progress};
//! # struct Console;
//! # impl Operator for Console {
//! #     fn show_preview(&mut self, m: &str) -> std::io::Result<()> { println!("{m}"); Ok(()) }
//! #     fn confirm(&mut self, _: &str) -> std::io::Result<String> { Ok("yes".into()) }
//! #     fn credentials(&mut self) -> std::io::Result<Credentials> {
//! #         Ok(Credentials::new("me@example.org", "secret"))
//! #     }
//! #     fn progress(&mut self, _: &Progress<'_>) {}
//! # }
//!
//! # async fn run() -> mailmerge_core::Result<()> {
//! let config = MergeConfig::default();
//! let csv = "First,Last,Email,Country\nAna,Ruiz,a@x.com,ES\n";
//! let recipients = RecipientSet::from_csv(&Schema::basic(), csv.as_bytes())?;
//!
//! let merge = Merge::new(
//!     recipients,
//!     &config.subject,
//!     "Dear {{Firstname}} {{Lastname}}",
//!     MergeOptions::from(&config),
//! )?;
//! let report = merge
//!     .run(&SmtpConnector::new(config.server.clone()), &mut Console)
//!     .await?;
//! println!("{} sent, {} failed", report.sent(), report.failed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod delivery;
mod error;
pub mod message;
pub mod pipeline;
pub mod recipient;
pub mod template;

pub use config::{Credentials, DeliveryMode, MergeConfig, Secret, Security, ServerConfig};
pub use delivery::{
    Connector, DeliveryError, DeliverySession, Mailer, Outcomes, SmtpConnector, Stage,
};
pub use error::{Error, Result};
pub use message::{Envelope, check_header_value, compose, preview};
pub use pipeline::{
    CONFIRMATION_PROMPT, Failure, Merge, MergeOptions, MergeReport, Operator, Outcome, Progress,
    ReportEntry, is_affirmative,
};
pub use recipient::{Field, Recipient, RecipientFields, RecipientSet, Schema, SchemaSpec};
pub use template::{RenderError, Rendered, Template, TemplateKind, TemplatePair};
