//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{
        ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
        client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
};

/// Options used when opening a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Maximum time for the TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Maximum time to wait for a complete server reply.
    pub reply_timeout: Duration,
    /// Accept any certificate presented for the server name.
    ///
    /// **Disables certificate chain verification.** Only meant for servers
    /// with self-signed certificates the operator already trusts.
    pub accept_invalid_certs: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            reply_timeout: Duration::from_secs(300),
            accept_invalid_certs: false,
        }
    }
}

/// Any duplex byte stream the client can speak SMTP over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin {}

impl<T: AsyncRead + AsyncWrite + Unpin> AsyncStream for T {}

/// SMTP stream (TCP, TLS, or a caller-provided transport).
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
    /// Caller-provided transport, e.g. an in-memory stream.
    Custom(BufReader<Box<dyn AsyncStream>>),
}

impl std::fmt::Debug for SmtpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Tcp(_) => "Tcp",
            Self::Tls(_) => "Tls",
            Self::Custom(_) => "Custom",
        };
        f.debug_tuple("SmtpStream").field(&kind).finish()
    }
}

impl SmtpStream {
    /// Wraps an arbitrary duplex stream.
    #[must_use]
    pub fn custom(io: impl AsyncStream + 'static) -> Self {
        Self::Custom(BufReader::new(Box::new(io)))
    }

    /// Returns true if the transport is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Reads a line from the stream, without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the peer closed the connection.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = match self {
            Self::Tcp(reader) => reader.read_line(&mut line).await?,
            Self::Tls(reader) => reader.read_line(&mut line).await?,
            Self::Custom(reader) => reader.read_line(&mut line).await?,
        };
        if read == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        Ok(line.trim_end().to_string())
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Custom(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
        }
        Ok(())
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is not plain TCP or the handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str, options: &ConnectOptions) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
            Self::Custom(_) => {
                return Err(Error::NotSupported("TLS upgrade of a custom stream".into()));
            }
        };

        let tls_stream = with_timeout(hostname, options.connect_timeout, async {
            handshake(hostname, tcp_stream, options).await
        })
        .await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }
}

/// Connects to an SMTP server over plain TCP (for a later STARTTLS).
///
/// # Errors
///
/// Returns an error if the connection fails or times out.
pub async fn connect(hostname: &str, port: u16, options: &ConnectOptions) -> Result<SmtpStream> {
    let addr = format!("{hostname}:{port}");
    let stream = with_timeout(&addr, options.connect_timeout, async {
        Ok(TcpStream::connect(&addr).await?)
    })
    .await?;
    Ok(SmtpStream::Tcp(BufReader::new(stream)))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails or times out.
pub async fn connect_tls(
    hostname: &str,
    port: u16,
    options: &ConnectOptions,
) -> Result<SmtpStream> {
    let addr = format!("{hostname}:{port}");
    let tls_stream = with_timeout(&addr, options.connect_timeout, async {
        let tcp_stream = TcpStream::connect(&addr).await?;
        handshake(hostname, tcp_stream, options).await
    })
    .await?;
    Ok(SmtpStream::Tls(Box::new(BufReader::new(tls_stream))))
}

async fn with_timeout<T>(
    target: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(target.to_string()))?
}

async fn handshake(
    hostname: &str,
    tcp_stream: TcpStream,
    options: &ConnectOptions,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let connector = create_tls_connector(options);
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    Ok(connector.connect(server_name, tcp_stream).await?)
}

/// Creates a TLS connector with the bundled web PKI roots.
fn create_tls_connector(options: &ConnectOptions) -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let mut config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    if options.accept_invalid_certs {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(AcceptAnyCertificate));
    }

    TlsConnector::from(Arc::new(config))
}

/// Certificate verifier that accepts whatever the server presents.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
        ]
    }
}
