mod cert_utils;
mod channel;
mod errors;
mod keystore;

pub use cert_utils::*;
pub use channel::SecureChannel;
pub use errors::TlsError;
pub use keystore::{ClientIdentity, KeyStore, StoreEntry, StoreFormat};

use std::time::Duration;

use openssl::x509::X509;
use reqwest::{Certificate, Client, Identity};
use tracing::{debug, instrument};

use crate::config::Credentials;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// TLS settings for one channel to the signing service.
///
/// Nothing here is process-global: every channel owns its identity and trust
/// anchors, so channels with different credentials can coexist.
#[derive(Debug)]
pub struct TlsClientConfig {
    identity: ClientIdentity,
    trust_anchors: Vec<X509>,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl TlsClientConfig {
    pub fn new(identity: ClientIdentity, trust_anchors: Vec<X509>) -> Self {
        Self {
            identity,
            trust_anchors,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Load the key store and trust store named by `credentials`.
    #[instrument(skip(credentials))]
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, TlsError> {
        let keystore = KeyStore::load(&credentials.keystore.path, &credentials.keystore.password)?;
        let identity = keystore.identity(
            &credentials.client_cert_alias,
            &credentials.private_key_alias,
        )?;

        let truststore =
            KeyStore::load(&credentials.truststore.path, &credentials.truststore.password)?;
        let trust_anchors = truststore.trust_anchors(credentials.server_cert_alias.as_deref())?;

        Ok(Self::new(identity, trust_anchors))
    }

    pub fn with_timeouts(mut self, request: Duration, connect: Duration) -> Self {
        self.request_timeout = request;
        self.connect_timeout = connect;
        self
    }

    /// Build an HTTPS client presenting the identity and trusting only the configured anchors.
    pub fn build_client(&self) -> Result<Client, TlsError> {
        let identity = Identity::from_pem(&self.identity.to_pem()?)?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .identity(identity)
            .https_only(true)
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout);

        for anchor in &self.trust_anchors {
            builder = builder.add_root_certificate(Certificate::from_der(&anchor.to_der()?)?);
        }

        debug!(
            anchors = self.trust_anchors.len(),
            request_timeout = ?self.request_timeout,
            connect_timeout = ?self.connect_timeout,
            "Built HTTPS client"
        );
        Ok(builder.build()?)
    }
}
