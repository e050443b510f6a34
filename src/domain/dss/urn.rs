//! URN lookup tables used on the wire.

use std::fmt;
use std::str::FromStr;

use openssl::hash::MessageDigest;

/// Profile attribute of every `SignRequest`.
pub const REQUEST_PROFILE: &str = "urn:com:swisscom:dss:v1.0";
/// Format of the `ClaimedIdentity` element.
pub const CLAIMED_IDENTITY_FORMAT: &str = "urn:com:swisscom:dss:v1.0:entity";
/// Certificate request profile for advanced on-demand certificates.
pub const ADVANCED_CERTIFICATE_PROFILE: &str = "urn:com:swisscom:advanced";
/// Type of the `AddTimestamp` element.
pub const TIMESTAMP_TYPE: &str = "urn:ietf:rfc:3161";
/// Type of the `AddOcspResponse` element.
pub const OCSP_TYPE: &str = "urn:ietf:rfc:2560";

/// Additional profiles that can be requested in `OptionalInputs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditionalProfile {
    Batch,
    OnDemandCertificate,
    Timestamp,
}

impl AdditionalProfile {
    pub fn as_urn(&self) -> &'static str {
        match self {
            Self::Batch => "urn:com:swisscom:dss:v1.0:profiles:batchprocessing",
            Self::OnDemandCertificate => "urn:com:swisscom:dss:v1.0:profiles:ondemandcertificate",
            Self::Timestamp => "urn:oasis:names:tc:dss:1.0:profiles:timestamping",
        }
    }
}

impl fmt::Display for AdditionalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_urn())
    }
}

/// Signature types understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureType {
    Cms,
    Timestamp,
}

impl SignatureType {
    pub fn as_urn(&self) -> &'static str {
        match self {
            Self::Cms => "urn:ietf:rfc:3369",
            Self::Timestamp => TIMESTAMP_TYPE,
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_urn())
    }
}

/// Digest algorithms, as a pair of algorithm name and XML-DSig URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Ripemd160,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
            Self::Ripemd160 => "RIPEMD-160",
        }
    }

    pub fn as_urn(&self) -> &'static str {
        match self {
            Self::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            Self::Sha384 => "http://www.w3.org/2001/04/xmldsig-more#sha384",
            Self::Sha512 => "http://www.w3.org/2001/04/xmlenc#sha512",
            Self::Ripemd160 => "http://www.w3.org/2001/04/xmlenc#ripemd160",
        }
    }

    /// The openssl digest implementing this algorithm.
    pub fn message_digest(&self) -> MessageDigest {
        match self {
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
            Self::Ripemd160 => MessageDigest::ripemd160(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            "RIPEMD160" => Ok(Self::Ripemd160),
            _ => Err(format!("unsupported hash algorithm: {s}")),
        }
    }
}

/// Top-level result code of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultMajor {
    Success,
    Pending,
    Other(String),
}

impl ResultMajor {
    const SUCCESS: &'static str = "urn:oasis:names:tc:dss:1.0:resultmajor:Success";
    const PENDING: &'static str =
        "urn:oasis:names:tc:dss:1.0:profiles:asynchronousprocessing:resultmajor:Pending";

    pub fn from_urn(urn: &str) -> Self {
        match urn.trim() {
            Self::SUCCESS => Self::Success,
            Self::PENDING => Self::Pending,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_urn(&self) -> &str {
        match self {
            Self::Success => Self::SUCCESS,
            Self::Pending => Self::PENDING,
            Self::Other(urn) => urn,
        }
    }
}

impl fmt::Display for ResultMajor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_urn())
    }
}
