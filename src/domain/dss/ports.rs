//! Ports (interfaces) of the signing domain.
//! These define the contracts of the collaborators the orchestrator drives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::{DocumentError, EmbeddingError, TransportError};
use super::urn::HashAlgorithm;

/// A document that reserves room for a signature, is hashed over everything
/// except that room, and later receives the signature into exactly that room.
pub trait DocumentHashProvider {
    /// Reserve `reserved_size` bytes for the signature and digest the rest of the document.
    fn compute_hash(
        &mut self,
        sign_date: DateTime<Utc>,
        reserved_size: usize,
        algorithm: HashAlgorithm,
        timestamp_only: bool,
    ) -> Result<Vec<u8>, DocumentError>;

    /// Place a raw signature into the room reserved by [`Self::compute_hash`].
    fn embed_signature(
        &mut self,
        signature: &[u8],
        reserved_size: usize,
    ) -> Result<(), EmbeddingError>;
}

/// Request/response exchange with the signing service.
#[async_trait]
pub trait SoapTransport: Send + Sync {
    /// Sends a serialized SOAP request and returns the complete response body.
    async fn send(&self, request: &[u8]) -> Result<Vec<u8>, TransportError>;
}
