//! `mailmerge` - send a personalized message to every row of a CSV file.

mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use mailmerge_core::{
    DeliveryMode, Merge, MergeConfig, MergeOptions, RecipientSet, SchemaSpec, Secret, Security,
    SmtpConnector,
};
use std::fs::{self, File};
use std::path::PathBuf;
use terminal::ConsoleOperator;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter.
const LOG_FILTER: &str = "mailmerge=info,mailmerge_core=info,mailmerge_smtp=warn";

/// Log filter with `-v`.
const VERBOSE_LOG_FILTER: &str = "mailmerge=debug,mailmerge_core=debug,mailmerge_smtp=debug";

#[derive(Parser, Debug)]
#[command(name = "mailmerge", version)]
#[command(about = "Sends a personalized email to every recipient of a CSV file")]
struct Cli {
    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SMTP server hostname
    #[arg(long)]
    host: Option<String>,

    /// SMTP server port (465 for TLS, 587 for STARTTLS by default)
    #[arg(long)]
    port: Option<u16>,

    /// Connect in plain text and upgrade with STARTTLS
    #[arg(long)]
    starttls: bool,

    /// Accept any certificate the server presents
    #[arg(long)]
    insecure_accept_any_cert: bool,

    /// Login name (prompted for when missing)
    #[arg(long, value_name = "USERNAME")]
    user: Option<String>,

    /// Login password; prefer the environment variable
    #[arg(long, env = "MAILMERGE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Envelope sender (defaults to the login name)
    #[arg(long, value_name = "ADDRESS")]
    from: Option<String>,

    /// Body template file
    #[arg(long = "msg", value_name = "FILE")]
    message: Option<PathBuf>,

    /// Recipient CSV file
    #[arg(long = "for", value_name = "FILE")]
    recipients: Option<PathBuf>,

    /// Subject template
    #[arg(long = "sub", value_name = "TEMPLATE", conflicts_with = "subject_file")]
    subject: Option<String>,

    /// File holding the subject template
    #[arg(long = "sub-file", value_name = "FILE")]
    subject_file: Option<PathBuf>,

    /// Column layout: basic, extended, full, full-indexed or a comma list
    #[arg(long)]
    schema: Option<String>,

    /// Send without showing the preview
    #[arg(short, long)]
    yes: bool,

    /// Send one envelope addressed to every recipient
    #[arg(long)]
    batch: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Applies command line overrides on top of `config`.
    fn apply(&self, config: &mut MergeConfig) {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if self.port.is_some() {
            config.server.port = self.port;
        }
        if self.starttls {
            config.server.security = Security::StartTls;
        }
        if self.insecure_accept_any_cert {
            config.server.accept_invalid_certs = true;
        }
        if self.user.is_some() {
            config.username.clone_from(&self.user);
        }
        if self.from.is_some() {
            config.sender.clone_from(&self.from);
        }
        if let Some(message) = &self.message {
            config.message.clone_from(message);
        }
        if let Some(recipients) = &self.recipients {
            config.recipients.clone_from(recipients);
        }
        if let Some(subject) = &self.subject {
            config.subject.clone_from(subject);
            config.subject_file = None;
        }
        if self.subject_file.is_some() {
            config.subject_file.clone_from(&self.subject_file);
        }
        if let Some(schema) = &self.schema {
            config.schema = SchemaSpec::Named(schema.clone());
        }
        if self.yes {
            config.preview = false;
        }
        if self.batch {
            config.mode = DeliveryMode::Batch;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        VERBOSE_LOG_FILTER
    } else {
        LOG_FILTER
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => MergeConfig::load(path)?,
        None => MergeConfig::default(),
    };
    cli.apply(&mut config);

    let schema = config.schema()?;
    let source = File::open(&config.recipients).with_context(|| {
        format!("cannot open recipients file {}", config.recipients.display())
    })?;
    let recipients = RecipientSet::from_csv(&schema, source)?;
    info!(
        count = recipients.len(),
        file = %config.recipients.display(),
        "loaded recipients"
    );

    let body = fs::read_to_string(&config.message)
        .with_context(|| format!("cannot read message file {}", config.message.display()))?;
    let subject = match &config.subject_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("cannot read subject file {}", path.display()))?
            .trim_end_matches(['\r', '\n'])
            .to_string(),
        None => config.subject.clone(),
    };

    let merge = Merge::new(recipients, &subject, &body, MergeOptions::from(&config))?;
    let password = cli.password.clone().map(Secret::from);
    let mut operator = ConsoleOperator::new(config.username.clone(), password);
    let connector = SmtpConnector::new(config.server.clone());

    let report = merge.run(&connector, &mut operator).await?;
    operator.summary(&report)?;
    Ok(())
}
