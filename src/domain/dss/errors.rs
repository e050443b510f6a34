use std::fmt;

use thiserror::Error;

use super::urn::ResultMajor;
use crate::tls::TlsError;

/// Errors raised while talking to the signing service over HTTPS.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid service URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },
}

impl TransportError {
    /// Failures that may go away when the same request is sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(e) if is_tls_rejection(e) => false,
            TransportError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            TransportError::UnexpectedStatus { status } => matches!(status, 502..=504),
            TransportError::InvalidUri { .. } | TransportError::Tls(_) => false,
        }
    }
}

/// Handshake and certificate failures reach reqwest as `InvalidData` I/O errors.
/// Sending the same bytes again cannot fix them.
fn is_tls_rejection(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::InvalidData {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// The service answered, but not with something usable.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("SOAP fault {code}: {reason}")]
    Fault { code: String, reason: String },

    #[error("Response carries no ResultMajor")]
    MissingResult,

    #[error("Signing failed with result {code} (minor: {minor:?}, message: {message:?})")]
    ResultNotSuccess {
        code: ResultMajor,
        minor: Option<String>,
        message: Option<String>,
    },

    #[error("Asynchronous processing is not supported (response id: {response_id:?})")]
    Pending { response_id: Option<String> },

    #[error("Response carries no signature value")]
    MissingSignature,

    #[error("Sent {expected} document hashes but received {actual} signatures")]
    CorrelationMismatch { expected: usize, actual: usize },
}

/// Errors raised while placing a returned signature into a document.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Signature of {actual} bytes does not fit the reserved {reserved} bytes")]
    SignatureTooLarge { actual: usize, reserved: usize },

    #[error("Document was not prepared with a signature placeholder")]
    NotPrepared,

    #[error("Signature value is not valid base64: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("Signature value is empty")]
    EmptySignature,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while preparing a document for hashing.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document template has no {0} marker")]
    MissingMarker(&'static str),

    #[error("Digest computation failed: {0}")]
    Digest(#[from] openssl::error::ErrorStack),
}

/// Per-document embedding failures collected over a whole batch.
#[derive(Debug, Default)]
pub struct EmbeddingFailures {
    pub failures: Vec<(usize, EmbeddingError)>,
}

impl EmbeddingFailures {
    pub fn push(&mut self, index: usize, error: EmbeddingError) {
        self.failures.push((index, error));
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Indices of the documents that could not be signed.
    pub fn indices(&self) -> Vec<usize> {
        self.failures.iter().map(|(i, _)| *i).collect()
    }
}

impl fmt::Display for EmbeddingFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} document(s) could not be signed", self.failures.len())?;
        for (index, error) in &self.failures {
            write!(f, "; document {index}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EmbeddingFailures {}

/// Error type of a signing call.
#[derive(Error, Debug)]
pub enum DssError {
    #[error("Failed to encode request: {0}")]
    Encoding(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to hash document {index}: {source}")]
    Document {
        index: usize,
        #[source]
        source: DocumentError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingFailures),
}

impl From<quick_xml::SeError> for DssError {
    fn from(e: quick_xml::SeError) -> Self {
        DssError::Encoding(e.to_string())
    }
}
