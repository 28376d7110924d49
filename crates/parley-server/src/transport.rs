//! Quinn-based QUIC transport.
//!
//! Encrypted streams over UDP with TLS 1.3. Certificates come from PEM files
//! or, for local use, are generated on the fly.
//!
//! # Security
//!
//! ALPN is set to "parley" so clients of other protocols are refused during
//! the handshake. Self-signed certificates are for development and tests
//! only; production deployments need certificates from a trusted CA.

use std::{net::SocketAddr, sync::Arc};

use parley_proto::ALPN_PROTOCOL;
use quinn::{Endpoint, RecvStream, SendStream, ServerConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::ServerError;

/// QUIC transport using Quinn.
pub struct QuinnTransport {
    /// Quinn endpoint
    endpoint: Endpoint,
    /// Generated certificate, when no PEM files were given
    self_signed: Option<CertificateDer<'static>>,
}

impl QuinnTransport {
    /// Create and bind a QUIC endpoint.
    ///
    /// Uses the PEM certificate and key when both paths are given, otherwise
    /// generates a self-signed certificate for `localhost`.
    pub fn bind(
        address: &str,
        cert_path: Option<&str>,
        key_path: Option<&str>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let (certs, key, self_signed) = match (cert_path, key_path) {
            (Some(cert), Some(key)) => {
                let (certs, key) = load_pem(cert, key)?;
                (certs, key, None)
            },
            (None, None) => {
                let (cert, key) = generate_self_signed()?;
                (vec![cert.clone()], key, Some(cert))
            },
            _ => {
                return Err(ServerError::Config(
                    "--cert and --key must be given together".to_string(),
                ));
            },
        };

        let endpoint = Endpoint::server(server_config(certs, key)?, addr)
            .map_err(|e| ServerError::Transport(format!("failed to create endpoint: {e}")))?;

        tracing::info!("QUIC transport bound to {}", addr);

        Ok(Self { endpoint, self_signed })
    }

    /// Accept the next QUIC connection and complete its handshake.
    ///
    /// Returns `None` once the endpoint is closed.
    pub async fn accept(&self) -> Result<Option<QuinnConnection>, ServerError> {
        let Some(incoming) = self.endpoint.accept().await else {
            return Ok(None);
        };

        let conn = incoming
            .await
            .map_err(|e| ServerError::Transport(format!("connection failed: {e}")))?;

        Ok(Some(QuinnConnection { connection: conn }))
    }

    /// Local address the endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }

    /// The generated certificate, if the endpoint is self-signed. Clients add
    /// it to their root store to connect.
    pub fn self_signed_certificate(&self) -> Option<&CertificateDer<'static>> {
        self.self_signed.as_ref()
    }
}

/// A QUIC connection.
///
/// Clones are cheap and share the underlying connection.
#[derive(Clone)]
pub struct QuinnConnection {
    connection: quinn::Connection,
}

impl QuinnConnection {
    /// Accept the client's bidirectional stream.
    pub async fn accept_bi(&self) -> Result<(SendStream, RecvStream), ServerError> {
        self.connection
            .accept_bi()
            .await
            .map_err(|e| ServerError::Transport(format!("accept_bi failed: {e}")))
    }

    /// Open the unidirectional stream carrying server frames.
    pub async fn open_uni(&self) -> Result<SendStream, ServerError> {
        self.connection
            .open_uni()
            .await
            .map_err(|e| ServerError::Transport(format!("open_uni failed: {e}")))
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection with an error code and reason.
    pub fn close(&self, error_code: quinn::VarInt, reason: &[u8]) {
        self.connection.close(error_code, reason);
    }
}

fn load_pem(
    cert_path: &str,
    key_path: &str,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ServerError> {
    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| ServerError::Config(format!("failed to read cert '{cert_path}': {e}")))?;

    let key_pem = std::fs::read(key_path)
        .map_err(|e| ServerError::Config(format!("failed to read key '{key_path}': {e}")))?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Config(format!("failed to parse certificates: {e}")))?;

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| ServerError::Config(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ServerError::Config("no private key found".to_string()))?;

    Ok((certs, key))
}

fn generate_self_signed() -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>), ServerError>
{
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let cert_der = cert.cert.der().clone();
    let key = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    tracing::warn!("Using self-signed certificate - not for production use!");

    Ok((cert_der, key.into()))
}

fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig, ServerError> {
    let mut tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    Ok(ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
            .map_err(|e| ServerError::Config(format!("QUIC config error: {e}")))?,
    )))
}
