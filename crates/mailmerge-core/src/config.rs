//! Run configuration.
//!
//! Every setting has a default; a TOML file can override any of them and the
//! command line overrides the file. Passwords are never read from the file.

use crate::error::{Error, Result};
use crate::recipient::{Schema, SchemaSpec};
use mailmerge_smtp::ConnectOptions;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Security/encryption mode for the submission connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 465,
            Self::StartTls => 587,
        }
    }

    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }
}

/// How recipients are grouped into envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// One personalized envelope per recipient.
    #[default]
    PerRecipient,
    /// One envelope addressed to every recipient, rendered once.
    Batch,
}

/// SMTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Server hostname.
    pub host: String,
    /// Server port; the security mode's default when unset.
    pub port: Option<u16>,
    /// Security mode.
    pub security: Security,
    /// Accept any certificate the server presents.
    pub accept_invalid_certs: bool,
    /// Name announced in EHLO.
    pub helo_name: String,
    /// TCP connect and TLS handshake timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Time allowed for each server reply, in seconds.
    pub reply_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: None,
            security: Security::default(),
            accept_invalid_certs: false,
            helo_name: "localhost".to_string(),
            connect_timeout_secs: 30,
            reply_timeout_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Port to connect to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }

    /// Transport options for the SMTP crate.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            reply_timeout: Duration::from_secs(self.reply_timeout_secs),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

/// Complete configuration of one merge run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    /// SMTP server settings.
    pub server: ServerConfig,
    /// Login name; prompted for when unset.
    pub username: Option<String>,
    /// Envelope sender; defaults to the username.
    pub sender: Option<String>,
    /// Body template file.
    pub message: PathBuf,
    /// Recipient CSV file.
    pub recipients: PathBuf,
    /// Inline subject template.
    pub subject: String,
    /// Subject template file; takes precedence over `subject`.
    pub subject_file: Option<PathBuf>,
    /// Column layout of the recipient file.
    pub schema: SchemaSpec,
    /// Show the first message and ask before sending.
    pub preview: bool,
    /// Envelope grouping.
    pub mode: DeliveryMode,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            username: None,
            sender: None,
            message: PathBuf::from("message.txt"),
            recipients: PathBuf::from("recipients.csv"),
            subject: "Hello {{Firstname}}".to_string(),
            subject_file: None,
            schema: SchemaSpec::default(),
            preview: true,
            mode: DeliveryMode::default(),
        }
    }
}

impl MergeConfig {
    /// Parses a TOML document; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Resolves the configured schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown preset or invalid column list.
    pub fn schema(&self) -> Result<Schema> {
        self.schema.resolve()
    }
}

/// A string that never shows up in debug output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps `value`.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Login for the submission server.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: Secret,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = MergeConfig::default();
        assert_eq!(config.server.host, "smtp.gmail.com");
        assert_eq!(config.server.port(), 465);
        assert_eq!(config.server.helo_name, "localhost");
        assert!(!config.server.accept_invalid_certs);
        assert_eq!(config.message, PathBuf::from("message.txt"));
        assert_eq!(config.recipients, PathBuf::from("recipients.csv"));
        assert_eq!(config.subject, "Hello {{Firstname}}");
        assert!(config.preview);
        assert_eq!(config.mode, DeliveryMode::PerRecipient);
        assert_eq!(config.schema().unwrap(), Schema::full());
    }

    #[test]
    fn empty_document_is_the_default() {
        let config = MergeConfig::from_toml_str("").unwrap();
        assert_eq!(config.server, ServerConfig::default());
        assert!(config.preview);
    }

    #[test]
    fn parses_a_full_document() {
        let config = MergeConfig::from_toml_str(
            r#"
            username = "news@example.org"
            sender = "letters@example.org"
            recipients = "list.csv"
            subject = "Hi {{Nickname}}"
            schema = ["Email", "-", "Nickname"]
            preview = false
            mode = "batch"

            [server]
            host = "mail.example.org"
            security = "starttls"
            helo_name = "merge.example.org"
            connect_timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port(), 587);
        assert_eq!(config.server.security, Security::StartTls);
        assert_eq!(
            config.server.connect_options().connect_timeout,
            Duration::from_secs(5)
        );
        assert_eq!(config.mode, DeliveryMode::Batch);
        assert!(!config.preview);
        assert_eq!(config.schema().unwrap().width(), 3);
        assert_eq!(config.message, PathBuf::from("message.txt"));
    }

    #[test]
    fn explicit_port_wins() {
        let config = MergeConfig::from_toml_str("[server]\nport = 2465\n").unwrap();
        assert_eq!(config.server.port(), 2465);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            MergeConfig::from_toml_str("pasword = \"x\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn bad_schema_surfaces_on_resolve() {
        let config = MergeConfig::from_toml_str("schema = \"enormous\"").unwrap();
        assert!(config.schema().is_err());
    }

    #[test]
    fn reply_timeout_defaults_to_five_minutes() {
        let options = ServerConfig::default().connect_options();
        assert_eq!(options.reply_timeout, Duration::from_secs(300));

        let config = MergeConfig::from_toml_str("[server]\nreply_timeout_secs = 20\n").unwrap();
        assert_eq!(
            config.server.connect_options().reply_timeout,
            Duration::from_secs(20)
        );
    }

    #[test]
    fn secrets_are_redacted() {
        let credentials = Credentials::new("me", "hunter2");
        let shown = format!("{credentials:?}");
        assert!(!shown.contains("hunter2"));
        assert_eq!(credentials.password.expose(), "hunter2");
    }
}
