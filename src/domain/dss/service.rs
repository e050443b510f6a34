//! Signing orchestrator: sequences hashing, the request/response exchange and embedding.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use tracing::{Level, debug, error, info, instrument, warn};

use super::errors::{DssError, EmbeddingError, EmbeddingFailures, TransportError};
use super::models::SigningProfile;
use super::ports::{DocumentHashProvider, SoapTransport};
use super::request::{SignOptions, SigningPlan, build_request};
use super::response::parse_response;
use super::urn::HashAlgorithm;

/// Retry behaviour for transient transport failures.
///
/// A retry re-sends the identical request bytes, so the `RequestID` stays the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (starting at zero).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Summary of a completed signing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutcome {
    pub request_id: u32,
    pub estimated_size: usize,
    pub documents: usize,
}

/// Client for the remote signature service.
#[derive(Debug, Clone)]
pub struct DssClient<T> {
    transport: T,
    retry: RetryPolicy,
}

impl<T: SoapTransport> DssClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sign `documents` in a single request.
    ///
    /// The Nth document is paired with the Nth signature of the response. Any
    /// protocol failure aborts the call before a document is touched. Embedding
    /// failures do not stop the remaining documents and are reported together.
    #[instrument(skip(self, documents, options), fields(documents = documents.len()))]
    pub async fn sign<D: DocumentHashProvider>(
        &self,
        profile: SigningProfile,
        documents: &mut [D],
        request_id: u32,
        hash_algorithm: HashAlgorithm,
        sign_date: DateTime<Utc>,
        options: &SignOptions,
    ) -> Result<SignOutcome, DssError> {
        if documents.is_empty() {
            return Err(DssError::InvalidInput(
                "at least one document is required".to_string(),
            ));
        }

        let plan = SigningPlan::new(profile, options);
        let mut digests = Vec::with_capacity(documents.len());
        for (index, document) in documents.iter_mut().enumerate() {
            let digest = document
                .compute_hash(
                    sign_date,
                    plan.estimated_size,
                    hash_algorithm,
                    plan.timestamp_only(),
                )
                .map_err(|source| DssError::Document { index, source })?;
            digests.push(digest);
        }

        let request = build_request(&plan, request_id, hash_algorithm, digests, options)?;
        let xml = request.to_soap(false)?;
        if tracing::enabled!(Level::DEBUG) {
            debug!("Request SOAP message:\n{}", request.to_soap(true)?);
        }

        let response = self.send_with_retry(xml.as_bytes()).await?;
        debug!("Response: {}", String::from_utf8_lossy(&response));

        let signatures = parse_response(&response, profile.signature_node())?
            .into_signatures(documents.len())?;

        let mut failures = EmbeddingFailures::default();
        for (index, (document, signature)) in documents.iter_mut().zip(&signatures).enumerate() {
            if let Err(e) = embed(document, signature, plan.estimated_size) {
                error!(index, error = %e, "Failed to embed signature");
                failures.push(index, e);
            }
        }

        if !failures.is_empty() {
            return Err(failures.into());
        }

        info!(request_id, "Signed {} document(s)", documents.len());

        Ok(SignOutcome {
            request_id,
            estimated_size: plan.estimated_size,
            documents: documents.len(),
        })
    }

    async fn send_with_retry(&self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut attempt = 0;
        loop {
            match self.transport.send(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %e,
                        "Transport failure, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn embed<D: DocumentHashProvider>(
    document: &mut D,
    signature: &str,
    reserved_size: usize,
) -> Result<(), EmbeddingError> {
    let compact: String = signature.split_whitespace().collect();
    if compact.is_empty() {
        return Err(EmbeddingError::EmptySignature);
    }
    let raw = STANDARD.decode(compact)?;
    document.embed_signature(&raw, reserved_size)
}
