use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, instrument, warn};

use super::TlsClientConfig;
use crate::domain::dss::{SoapTransport, TransportError};

const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Mutually authenticated HTTPS connection to the signing service endpoint.
#[derive(Debug, Clone)]
pub struct SecureChannel {
    client: Client,
    uri: Url,
}

impl SecureChannel {
    #[instrument(skip(config))]
    pub fn open(server_uri: &str, config: &TlsClientConfig) -> Result<Self, TransportError> {
        let uri = Url::parse(server_uri).map_err(|e| TransportError::InvalidUri {
            uri: server_uri.to_string(),
            reason: e.to_string(),
        })?;
        if uri.scheme() != "https" {
            return Err(TransportError::InvalidUri {
                uri: server_uri.to_string(),
                reason: "scheme must be https".to_string(),
            });
        }

        let client = config.build_client()?;
        Ok(Self { client, uri })
    }
}

#[async_trait]
impl SoapTransport for SecureChannel {
    async fn send(&self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .post(self.uri.clone())
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .body(request.to_vec())
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), len = body.len(), "Received response");

        // SOAP faults travel with status 500
        if status.is_success() || status == StatusCode::INTERNAL_SERVER_ERROR {
            Ok(body.to_vec())
        } else {
            warn!(status = status.as_u16(), "Unexpected HTTP status");
            Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
            })
        }
    }
}
