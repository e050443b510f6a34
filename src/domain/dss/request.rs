//! Request builder: composes the signing-mode specific `SignRequest` and its SOAP form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use super::errors::DssError;
use super::models::{
    CertificateRequest, CertificateRequestElement, ClaimedIdentity, DigestMethod, DocumentHash,
    InputDocuments, MobileId, MobileIdStepUp, OptionalInputs, SignOperation, SignRequest,
    SignRequestElement, SigningProfile, StepUpAuthorisation, TypedElement,
};
use super::urn::{
    ADVANCED_CERTIFICATE_PROFILE, AdditionalProfile, CLAIMED_IDENTITY_FORMAT, HashAlgorithm,
    OCSP_TYPE, REQUEST_PROFILE, SignatureType, TIMESTAMP_TYPE,
};
use crate::soap::Envelope;

const BASE_SIGNATURE_SIZE: usize = 8192;
const TIMESTAMP_SIZE_INCREMENT: usize = 4192;
const OCSP_SIZE_INCREMENT: usize = 4192;
const CERTIFICATE_REQUEST_SIZE_INCREMENT: usize = 700;

/// Bytes to reserve in a document for the returned signature.
pub fn estimated_signature_size(
    add_timestamp: bool,
    add_ocsp: bool,
    certificate_profile: Option<&str>,
) -> usize {
    let mut size = BASE_SIGNATURE_SIZE;
    if add_timestamp {
        size += TIMESTAMP_SIZE_INCREMENT;
    }
    if add_ocsp {
        size += OCSP_SIZE_INCREMENT;
    }
    if certificate_profile.is_some() {
        size += CERTIFICATE_REQUEST_SIZE_INCREMENT;
    }
    size
}

/// Caller supplied options of a signing call.
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    pub add_timestamp: bool,
    pub add_ocsp: bool,
    pub claimed_identity: Option<String>,
    /// Certificate request profile of an on-demand signature, defaults to the advanced profile.
    pub certificate_profile: Option<String>,
    pub distinguished_name: Option<String>,
    /// Only honoured by the mobile authentication profile.
    pub mobile_id: Option<MobileIdStepUp>,
    pub response_id: Option<String>,
}

impl SignOptions {
    pub fn new(claimed_identity: impl Into<String>) -> Self {
        Self {
            claimed_identity: Some(claimed_identity.into()),
            ..Default::default()
        }
    }

    /// Request an embedded timestamp.
    pub fn with_timestamp(mut self, add_timestamp: bool) -> Self {
        self.add_timestamp = add_timestamp;
        self
    }

    /// Request an embedded OCSP response.
    pub fn with_ocsp(mut self, add_ocsp: bool) -> Self {
        self.add_ocsp = add_ocsp;
        self
    }

    pub fn with_distinguished_name(mut self, distinguished_name: impl Into<String>) -> Self {
        self.distinguished_name = Some(distinguished_name.into());
        self
    }

    pub fn with_certificate_profile(mut self, profile: impl Into<String>) -> Self {
        self.certificate_profile = Some(profile.into());
        self
    }

    /// Ask for a mobile phone confirmation before the certificate is issued.
    pub fn with_mobile_id(
        mut self,
        phone_number: impl Into<String>,
        message: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        self.mobile_id = Some(MobileIdStepUp {
            phone_number: phone_number.into(),
            message: message.into(),
            language: language.into(),
        });
        self
    }
}

/// Flags resolved once per call. Sizing the placeholder and building the
/// request both read from the same plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningPlan {
    pub profile: SigningProfile,
    pub add_timestamp: bool,
    pub add_ocsp: bool,
    pub certificate_profile: Option<String>,
    pub estimated_size: usize,
}

impl SigningPlan {
    pub fn new(profile: SigningProfile, options: &SignOptions) -> Self {
        let (add_timestamp, add_ocsp) = match profile {
            // A timestamp token gets the space of a signature with both extras.
            SigningProfile::TimestampOnly => (true, true),
            _ => (options.add_timestamp, options.add_ocsp),
        };

        let certificate_profile = match profile {
            SigningProfile::OnDemandCertificate => Some(
                options
                    .certificate_profile
                    .clone()
                    .unwrap_or_else(|| ADVANCED_CERTIFICATE_PROFILE.to_string()),
            ),
            SigningProfile::OnDemandCertificateWithMobileAuth => {
                Some(ADVANCED_CERTIFICATE_PROFILE.to_string())
            }
            SigningProfile::StaticCertificate | SigningProfile::TimestampOnly => None,
        };

        let estimated_size =
            estimated_signature_size(add_timestamp, add_ocsp, certificate_profile.as_deref());

        Self {
            profile,
            add_timestamp,
            add_ocsp,
            certificate_profile,
            estimated_size,
        }
    }

    pub fn timestamp_only(&self) -> bool {
        self.profile == SigningProfile::TimestampOnly
    }
}

/// Additional profiles of a request: the profile-specific URN first, then
/// `Batch` when more than one document is signed.
pub fn additional_profiles(profile: SigningProfile, document_count: usize) -> Vec<AdditionalProfile> {
    let mut profiles: Vec<_> = profile.additional_profile().into_iter().collect();
    if document_count > 1 {
        profiles.push(AdditionalProfile::Batch);
    }
    profiles
}

/// Build the request for `digests`, one per document, in document order.
pub fn build_request(
    plan: &SigningPlan,
    request_id: u32,
    hash_algorithm: HashAlgorithm,
    digests: Vec<Vec<u8>>,
    options: &SignOptions,
) -> Result<SignRequest, DssError> {
    if digests.is_empty() {
        return Err(DssError::InvalidInput(
            "at least one document is required".to_string(),
        ));
    }

    let certificate_request = plan
        .certificate_profile
        .as_ref()
        .map(|profile| CertificateRequest {
            profile: profile.clone(),
            distinguished_name: options.distinguished_name.clone(),
            step_up: match plan.profile {
                SigningProfile::OnDemandCertificateWithMobileAuth => options
                    .mobile_id
                    .clone()
                    .filter(|m| !m.phone_number.is_empty()),
                _ => None,
            },
        });

    Ok(SignRequest {
        request_id,
        hash_algorithm,
        additional_profiles: additional_profiles(plan.profile, digests.len()),
        digests,
        signature_type: plan.profile.signature_type(),
        add_timestamp: plan.add_timestamp,
        add_ocsp: plan.add_ocsp,
        claimed_identity: options.claimed_identity.clone(),
        certificate_request,
        response_id: options.response_id.clone(),
    })
}

impl SignRequest {
    /// Wire form of this request.
    pub fn to_operation(&self) -> SignOperation {
        let multiple = self.digests.len() > 1;
        let document_hashes = self
            .digests
            .iter()
            .enumerate()
            .map(|(i, digest)| DocumentHash {
                id: multiple.then(|| i.to_string()),
                digest_method: DigestMethod {
                    algorithm: self.hash_algorithm.as_urn().to_string(),
                },
                digest_value: STANDARD.encode(digest),
            })
            .collect();

        let optional_inputs = self.optional_inputs();

        SignOperation {
            request: SignRequestElement {
                profile: REQUEST_PROFILE.to_string(),
                request_id: self.request_id.to_string(),
                input_documents: InputDocuments { document_hashes },
                optional_inputs: (!optional_inputs.is_empty()).then_some(optional_inputs),
            },
        }
    }

    fn optional_inputs(&self) -> OptionalInputs {
        let advanced = self
            .certificate_request
            .as_ref()
            .is_some_and(|c| c.profile == ADVANCED_CERTIFICATE_PROFILE);

        // A timestamp request never asks for an embedded timestamp or OCSP response.
        let is_timestamp = self.signature_type == SignatureType::Timestamp;

        OptionalInputs {
            additional_profiles: self
                .additional_profiles
                .iter()
                .map(|p| p.as_urn().to_string())
                .collect(),
            claimed_identity: self
                .claimed_identity
                .as_ref()
                .filter(|name| !name.is_empty())
                .map(|name| ClaimedIdentity {
                    format: (!advanced).then(|| CLAIMED_IDENTITY_FORMAT.to_string()),
                    name: name.clone(),
                }),
            certificate_request: self
                .certificate_request
                .as_ref()
                .map(|c| certificate_request_element(c, advanced)),
            signature_type: Some(self.signature_type.as_urn().to_string()),
            add_timestamp: (self.add_timestamp && !is_timestamp).then(|| TypedElement {
                kind: TIMESTAMP_TYPE.to_string(),
            }),
            add_ocsp_response: (self.add_ocsp && !is_timestamp).then(|| TypedElement {
                kind: OCSP_TYPE.to_string(),
            }),
            response_id: self.response_id.clone(),
        }
    }

    /// Serialize the request into a SOAP envelope.
    pub fn to_soap(&self, pretty: bool) -> Result<String, DssError> {
        let xml = Envelope::new(self.to_operation()).serialize_soap(pretty)?;
        debug!(
            request_id = self.request_id,
            documents = self.digests.len(),
            "Built sign request"
        );
        Ok(xml)
    }
}

fn certificate_request_element(
    request: &CertificateRequest,
    advanced: bool,
) -> CertificateRequestElement {
    let (vendor_distinguished_name, distinguished_name) = match &request.distinguished_name {
        Some(dn) if advanced => (Some(dn.clone()), None),
        Some(dn) => (None, Some(dn.clone())),
        None => (None, None),
    };

    // Step-up authorisation only applies to a named subject.
    let step_up_authorisation = request
        .step_up
        .as_ref()
        .filter(|_| request.distinguished_name.is_some())
        .map(|step_up| StepUpAuthorisation {
            mobile_id: MobileId {
                msisdn: step_up.phone_number.clone(),
                message: step_up.message.clone(),
                language: step_up.language.to_uppercase(),
            },
        });

    CertificateRequestElement {
        profile: (!advanced).then(|| request.profile.clone()),
        vendor_distinguished_name,
        distinguished_name,
        step_up_authorisation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_options() -> SignOptions {
        SignOptions {
            claimed_identity: Some("Firma XY:kp2-firma_xy".to_string()),
            ..Default::default()
        }
    }

    fn mobile_options(phone: Option<&str>) -> SignOptions {
        SignOptions {
            claimed_identity: Some("Firma XY AG:OnDemand-Advanced".to_string()),
            distinguished_name: Some("CN=Hans Mueller, O=Firma XY AG, C=CH".to_string()),
            mobile_id: phone.map(|p| MobileIdStepUp {
                phone_number: p.to_string(),
                message: "please sign my pdf".to_string(),
                language: "en".to_string(),
            }),
            add_timestamp: true,
            add_ocsp: true,
            ..Default::default()
        }
    }

    fn build(profile: SigningProfile, documents: usize, options: &SignOptions) -> String {
        let plan = SigningPlan::new(profile, options);
        let digests = (0..documents).map(|i| vec![i as u8; 32]).collect();
        build_request(&plan, 42, HashAlgorithm::Sha256, digests, options)
            .unwrap()
            .to_soap(false)
            .unwrap()
    }

    #[test]
    fn test_estimated_signature_size() {
        assert_eq!(estimated_signature_size(false, false, None), 8192);
        assert_eq!(estimated_signature_size(true, false, None), 12384);
        assert_eq!(estimated_signature_size(true, true, None), 16576);
        assert_eq!(estimated_signature_size(true, true, Some("anyProfile")), 17276);
        assert_eq!(estimated_signature_size(false, false, Some("")), 8892);
    }

    #[test]
    fn test_plan_sizes_per_profile() {
        let options = SignOptions::default();
        assert_eq!(
            SigningPlan::new(SigningProfile::StaticCertificate, &options).estimated_size,
            8192
        );
        assert_eq!(
            SigningPlan::new(SigningProfile::TimestampOnly, &options).estimated_size,
            16576
        );
        assert_eq!(
            SigningPlan::new(SigningProfile::OnDemandCertificate, &options).estimated_size,
            8892
        );

        let plan = SigningPlan::new(SigningProfile::OnDemandCertificateWithMobileAuth, &mobile_options(None));
        assert_eq!(plan.estimated_size, 17276);
        assert_eq!(plan.certificate_profile.as_deref(), Some(ADVANCED_CERTIFICATE_PROFILE));
    }

    #[test]
    fn test_additional_profiles_order() {
        assert!(additional_profiles(SigningProfile::StaticCertificate, 1).is_empty());
        assert_eq!(
            additional_profiles(SigningProfile::StaticCertificate, 2),
            vec![AdditionalProfile::Batch]
        );
        assert_eq!(
            additional_profiles(SigningProfile::OnDemandCertificate, 3),
            vec![AdditionalProfile::OnDemandCertificate, AdditionalProfile::Batch]
        );
        assert_eq!(
            additional_profiles(SigningProfile::TimestampOnly, 1),
            vec![AdditionalProfile::Timestamp]
        );
    }

    #[test]
    fn test_batch_static_request() {
        let options = static_options();
        let plan = SigningPlan::new(SigningProfile::StaticCertificate, &options);
        assert_eq!(plan.estimated_size, 8192);

        let xml = build(SigningProfile::StaticCertificate, 2, &options);

        assert_eq!(xml.matches("<DocumentHash ").count(), 2);
        assert!(xml.contains(r#"<DocumentHash ID="0">"#));
        assert!(xml.contains(r#"<DocumentHash ID="1">"#));
        assert!(xml.contains(
            "<AdditionalProfile>urn:com:swisscom:dss:v1.0:profiles:batchprocessing</AdditionalProfile>"
        ));
        assert_eq!(xml.matches("<AdditionalProfile>").count(), 1);
        assert!(xml.contains(r#"<SignRequest Profile="urn:com:swisscom:dss:v1.0" RequestID="42">"#));
        assert!(xml.contains("<SignatureType>urn:ietf:rfc:3369</SignatureType>"));
        assert!(!xml.contains("AddTimestamp"));
        assert!(!xml.contains("AddOcspResponse"));
    }

    #[test]
    fn test_single_document_has_no_id() {
        let xml = build(SigningProfile::StaticCertificate, 1, &static_options());

        assert!(xml.contains("<DocumentHash>"));
        assert!(!xml.contains("ID=\"0\""));
        assert!(!xml.contains("<AdditionalProfile>"));
        assert!(xml.contains(
            r#"<dsig:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#
        ));
        assert!(xml.contains(&format!(
            "<dsig:DigestValue>{}</dsig:DigestValue>",
            STANDARD.encode([0u8; 32])
        )));
        assert!(xml.contains(
            r#"<ClaimedIdentity Format="urn:com:swisscom:dss:v1.0:entity"><Name>Firma XY:kp2-firma_xy</Name></ClaimedIdentity>"#
        ));
    }

    #[test]
    fn test_timestamp_flags_on_static_request() {
        let options = SignOptions {
            add_timestamp: true,
            add_ocsp: true,
            ..static_options()
        };
        let xml = build(SigningProfile::StaticCertificate, 1, &options);

        assert!(xml.contains(r#"<AddTimestamp Type="urn:ietf:rfc:3161"/>"#));
        assert!(xml.contains(r#"<ns5:AddOcspResponse Type="urn:ietf:rfc:2560"/>"#));
    }

    #[test]
    fn test_timestamp_only_suppresses_extras() {
        let options = SignOptions {
            add_timestamp: true,
            add_ocsp: true,
            ..static_options()
        };
        let plan = SigningPlan::new(SigningProfile::TimestampOnly, &options);
        assert!(plan.add_timestamp && plan.add_ocsp);

        let xml = build(SigningProfile::TimestampOnly, 1, &options);

        assert!(xml.contains("<SignatureType>urn:ietf:rfc:3161</SignatureType>"));
        assert!(xml.contains(
            "<AdditionalProfile>urn:oasis:names:tc:dss:1.0:profiles:timestamping</AdditionalProfile>"
        ));
        assert!(!xml.contains("AddTimestamp"));
        assert!(!xml.contains("AddOcspResponse"));
    }

    #[test]
    fn test_mobile_id_step_up() {
        let xml = build(
            SigningProfile::OnDemandCertificateWithMobileAuth,
            1,
            &mobile_options(Some("+41123456")),
        );

        assert!(xml.contains("<ns5:CertificateRequest>"));
        assert!(xml.contains(
            "<ns5:DistinguishedName>CN=Hans Mueller, O=Firma XY AG, C=CH</ns5:DistinguishedName>"
        ));
        assert!(xml.contains(
            "<ns5:StepUpAuthorisation><ns5:MobileID><ns5:MSISDN>+41123456</ns5:MSISDN><ns5:Message>please sign my pdf</ns5:Message><ns5:Language>EN</ns5:Language></ns5:MobileID></ns5:StepUpAuthorisation>"
        ));
        // Advanced profile: no Format on the claimed identity, no Profile on the request.
        assert!(xml.contains("<ClaimedIdentity><Name>"));
        assert!(!xml.contains(r#"CertificateRequest Profile="#));
    }

    #[test]
    fn test_mobile_id_without_phone_number() {
        let xml = build(
            SigningProfile::OnDemandCertificateWithMobileAuth,
            1,
            &mobile_options(None),
        );

        assert!(xml.contains("<ns5:CertificateRequest>"));
        assert!(xml.contains("<ns5:DistinguishedName>"));
        assert!(!xml.contains("StepUpAuthorisation"));

        let empty_phone = build(
            SigningProfile::OnDemandCertificateWithMobileAuth,
            1,
            &mobile_options(Some("")),
        );
        assert!(!empty_phone.contains("StepUpAuthorisation"));
    }

    #[test]
    fn test_mobile_id_message_is_sent_verbatim() {
        let mut options = mobile_options(Some("+41123456"));
        if let Some(step_up) = options.mobile_id.as_mut() {
            step_up.message = "  Sign   contract?  ".to_string();
        }
        let xml = build(SigningProfile::OnDemandCertificateWithMobileAuth, 1, &options);

        assert!(xml.contains("<ns5:Message>  Sign   contract?  </ns5:Message>"));
    }

    #[test]
    fn test_on_demand_custom_profile() {
        let options = SignOptions {
            certificate_profile: Some("urn:com:example:profile".to_string()),
            distinguished_name: Some("CN=Jane Doe".to_string()),
            mobile_id: Some(MobileIdStepUp {
                phone_number: "+41000000".to_string(),
                message: "ignored".to_string(),
                language: "de".to_string(),
            }),
            ..static_options()
        };
        let xml = build(SigningProfile::OnDemandCertificate, 2, &options);

        assert!(xml.contains(r#"<ns5:CertificateRequest Profile="urn:com:example:profile">"#));
        assert!(xml.contains("<DistinguishedName>CN=Jane Doe</DistinguishedName>"));
        assert!(!xml.contains("StepUpAuthorisation"));
        assert!(xml.contains(r#"<ClaimedIdentity Format="urn:com:swisscom:dss:v1.0:entity">"#));

        let first = xml
            .find("profiles:ondemandcertificate")
            .unwrap();
        let second = xml.find("profiles:batchprocessing").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_documents_rejected() {
        let options = static_options();
        let plan = SigningPlan::new(SigningProfile::StaticCertificate, &options);
        let result = build_request(&plan, 1, HashAlgorithm::Sha256, Vec::new(), &options);
        assert!(matches!(result, Err(DssError::InvalidInput(_))));
    }

    #[test]
    fn test_response_id_is_carried() {
        let options = SignOptions {
            response_id: Some("abc-123".to_string()),
            ..static_options()
        };
        let xml = build(SigningProfile::StaticCertificate, 1, &options);
        assert!(xml.contains("<ResponseID>abc-123</ResponseID>"));
    }
}
