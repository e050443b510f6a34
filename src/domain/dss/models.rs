//! Domain types of a signing call and the wire structures they serialize to.

use serde::Serialize;

use crate::soap::BodyElement;

use super::urn::{AdditionalProfile, HashAlgorithm, ResultMajor, SignatureType};

/// The signing modes offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningProfile {
    StaticCertificate,
    OnDemandCertificate,
    OnDemandCertificateWithMobileAuth,
    TimestampOnly,
}

impl SigningProfile {
    /// Name of the response element holding the signature payload.
    pub fn signature_node(&self) -> &'static str {
        match self {
            Self::TimestampOnly => "RFC3161TimeStampToken",
            _ => "Base64Signature",
        }
    }

    pub fn signature_type(&self) -> SignatureType {
        match self {
            Self::TimestampOnly => SignatureType::Timestamp,
            _ => SignatureType::Cms,
        }
    }

    /// Profile-specific URN that leads the additional profile list.
    pub fn additional_profile(&self) -> Option<AdditionalProfile> {
        match self {
            Self::StaticCertificate => None,
            Self::OnDemandCertificate | Self::OnDemandCertificateWithMobileAuth => {
                Some(AdditionalProfile::OnDemandCertificate)
            }
            Self::TimestampOnly => Some(AdditionalProfile::Timestamp),
        }
    }
}

/// Mobile phone confirmation required before an on-demand certificate is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileIdStepUp {
    pub phone_number: String,
    pub message: String,
    pub language: String,
}

/// Certificate request block of an on-demand signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub profile: String,
    pub distinguished_name: Option<String>,
    pub step_up: Option<MobileIdStepUp>,
}

/// A fully composed signing request, built fresh for every call.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub request_id: u32,
    pub hash_algorithm: HashAlgorithm,
    pub digests: Vec<Vec<u8>>,
    pub additional_profiles: Vec<AdditionalProfile>,
    pub signature_type: SignatureType,
    pub add_timestamp: bool,
    pub add_ocsp: bool,
    pub claimed_identity: Option<String>,
    pub certificate_request: Option<CertificateRequest>,
    pub response_id: Option<String>,
}

/// Result block of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStatus {
    pub major: ResultMajor,
    pub minor: Option<String>,
    pub message: Option<String>,
}

/// A parsed response: result code and signature payloads in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignResponse {
    pub result: ResultStatus,
    pub signatures: Vec<String>,
    pub response_id: Option<String>,
}

// Wire structures. Element order follows the service schema.

/// The `ais:sign` operation wrapping a request.
#[derive(Debug, Clone, Serialize)]
pub struct SignOperation {
    #[serde(rename = "SignRequest")]
    pub request: SignRequestElement,
}

impl BodyElement for SignOperation {
    const ELEMENT: &'static str = "ais:sign";
}

#[derive(Debug, Clone, Serialize)]
pub struct SignRequestElement {
    #[serde(rename = "@Profile")]
    pub profile: String,

    #[serde(rename = "@RequestID")]
    pub request_id: String,

    #[serde(rename = "InputDocuments")]
    pub input_documents: InputDocuments,

    #[serde(rename = "OptionalInputs", skip_serializing_if = "Option::is_none")]
    pub optional_inputs: Option<OptionalInputs>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputDocuments {
    #[serde(rename = "DocumentHash")]
    pub document_hashes: Vec<DocumentHash>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentHash {
    #[serde(rename = "@ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "dsig:DigestMethod")]
    pub digest_method: DigestMethod,

    #[serde(rename = "dsig:DigestValue")]
    pub digest_value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestMethod {
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptionalInputs {
    #[serde(rename = "AdditionalProfile", skip_serializing_if = "Vec::is_empty")]
    pub additional_profiles: Vec<String>,

    #[serde(rename = "ClaimedIdentity", skip_serializing_if = "Option::is_none")]
    pub claimed_identity: Option<ClaimedIdentity>,

    #[serde(
        rename = "ns5:CertificateRequest",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_request: Option<CertificateRequestElement>,

    #[serde(rename = "SignatureType", skip_serializing_if = "Option::is_none")]
    pub signature_type: Option<String>,

    #[serde(rename = "AddTimestamp", skip_serializing_if = "Option::is_none")]
    pub add_timestamp: Option<TypedElement>,

    #[serde(
        rename = "ns5:AddOcspResponse",
        skip_serializing_if = "Option::is_none"
    )]
    pub add_ocsp_response: Option<TypedElement>,

    #[serde(rename = "ResponseID", skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl OptionalInputs {
    pub fn is_empty(&self) -> bool {
        self.additional_profiles.is_empty()
            && self.claimed_identity.is_none()
            && self.certificate_request.is_none()
            && self.signature_type.is_none()
            && self.add_timestamp.is_none()
            && self.add_ocsp_response.is_none()
            && self.response_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimedIdentity {
    #[serde(rename = "@Format", skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateRequestElement {
    #[serde(rename = "@Profile", skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Used with the advanced profile.
    #[serde(
        rename = "ns5:DistinguishedName",
        skip_serializing_if = "Option::is_none"
    )]
    pub vendor_distinguished_name: Option<String>,

    #[serde(rename = "DistinguishedName", skip_serializing_if = "Option::is_none")]
    pub distinguished_name: Option<String>,

    #[serde(
        rename = "ns5:StepUpAuthorisation",
        skip_serializing_if = "Option::is_none"
    )]
    pub step_up_authorisation: Option<StepUpAuthorisation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepUpAuthorisation {
    #[serde(rename = "ns5:MobileID")]
    pub mobile_id: MobileId,
}

#[derive(Debug, Clone, Serialize)]
pub struct MobileId {
    #[serde(rename = "ns5:MSISDN")]
    pub msisdn: String,

    #[serde(rename = "ns5:Message")]
    pub message: String,

    #[serde(rename = "ns5:Language")]
    pub language: String,
}

/// Empty element carrying only a `Type` attribute.
#[derive(Debug, Clone, Serialize)]
pub struct TypedElement {
    #[serde(rename = "@Type")]
    pub kind: String,
}
