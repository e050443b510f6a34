//! Protocol client for the remote Digital Signature Service.

pub mod errors;
pub mod models;
pub mod ports;
pub mod request;
pub mod response;
pub mod service;
pub mod urn;

pub use errors::{
    DocumentError, DssError, EmbeddingError, EmbeddingFailures, ProtocolError, TransportError,
};
pub use models::{MobileIdStepUp, SignRequest, SignResponse, SigningProfile};
pub use ports::{DocumentHashProvider, SoapTransport};
pub use request::{SignOptions, SigningPlan, build_request, estimated_signature_size};
pub use response::parse_response;
pub use service::{DssClient, RetryPolicy, SignOutcome};
pub use urn::{HashAlgorithm, ResultMajor, SignatureType};
