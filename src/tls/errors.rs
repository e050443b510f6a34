use std::path::PathBuf;

use openssl::error::ErrorStack;
use thiserror::Error;

/// Errors that can occur while loading key material or building a TLS client.
#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    OpenSSL(#[from] ErrorStack),

    #[error(transparent)]
    Pem(#[from] pem::PemError),

    #[error("Failed to read PKCS#12 store: {0}")]
    Pkcs12(String),

    #[error("No entry with alias '{alias}' in {store}")]
    UnknownAlias { alias: String, store: &'static str },

    #[error("Entry '{alias}' carries no private key")]
    MissingPrivateKey { alias: String },

    #[error("Private key '{key_alias}' does not belong to certificate '{cert_alias}'")]
    KeyMismatch {
        key_alias: String,
        cert_alias: String,
    },

    #[error("Trust store contains no certificate")]
    EmptyTrustStore,

    #[error("Failed to build HTTPS client: {0}")]
    Client(#[from] reqwest::Error),
}
