//! Response interpreter: reads result codes and signature payloads from a SOAP response.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use super::errors::ProtocolError;
use super::models::{ResultStatus, SignResponse};
use super::urn::ResultMajor;

const RESULT_MAJOR: &[u8] = b"ResultMajor";
const RESULT_MINOR: &[u8] = b"ResultMinor";
const RESULT_MESSAGE: &[u8] = b"ResultMessage";
const RESPONSE_ID: &[u8] = b"ResponseID";
const FAULT: &[u8] = b"Fault";
const FAULT_CODE: &[u8] = b"faultcode";
const FAULT_STRING: &[u8] = b"faultstring";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Major,
    Minor,
    Message,
    ResponseId,
    Signature,
    FaultCode,
    FaultString,
}

#[derive(Debug, Default)]
struct Collected {
    major: Option<String>,
    minor: Option<String>,
    message: Option<String>,
    response_id: Option<String>,
    signatures: Vec<String>,
    fault: bool,
    fault_code: Option<String>,
    fault_string: Option<String>,
}

impl Collected {
    fn store(&mut self, field: Field, text: String) {
        match field {
            // The first occurrence wins for single-valued fields.
            Field::Major => {
                self.major.get_or_insert(text);
            }
            Field::Minor => {
                self.minor.get_or_insert(text);
            }
            Field::Message => {
                self.message.get_or_insert(text);
            }
            Field::ResponseId => {
                self.response_id.get_or_insert(text);
            }
            Field::FaultCode => {
                self.fault_code.get_or_insert(text);
            }
            Field::FaultString => {
                self.fault_string.get_or_insert(text);
            }
            Field::Signature => self.signatures.push(text),
        }
    }
}

/// Parse a response, collecting every `signature_node` element in document order.
///
/// Element names are matched on their local part, so any namespace prefix is accepted.
pub fn parse_response(xml: &[u8], signature_node: &str) -> Result<SignResponse, ProtocolError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let field_of = |name: &[u8]| -> Option<Field> {
        match name {
            RESULT_MAJOR => Some(Field::Major),
            RESULT_MINOR => Some(Field::Minor),
            RESULT_MESSAGE => Some(Field::Message),
            RESPONSE_ID => Some(Field::ResponseId),
            FAULT_CODE => Some(Field::FaultCode),
            FAULT_STRING => Some(Field::FaultString),
            name if name == signature_node.as_bytes() => Some(Field::Signature),
            _ => None,
        }
    };

    let mut collected = Collected::default();
    let mut current: Option<(Field, String)> = None;
    let mut saw_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                saw_root = true;
                let local = e.local_name();
                if local.as_ref() == FAULT {
                    collected.fault = true;
                }
                if current.is_none() {
                    current = field_of(local.as_ref()).map(|f| (f, String::new()));
                }
            }
            Ok(Event::Empty(e)) => {
                saw_root = true;
                if current.is_none() {
                    if let Some(field) = field_of(e.local_name().as_ref()) {
                        collected.store(field, String::new());
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, text)) = current.as_mut() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                let closes_current = current
                    .as_ref()
                    .is_some_and(|(field, _)| field_of(e.local_name().as_ref()) == Some(*field));
                if closes_current {
                    if let Some((field, text)) = current.take() {
                        collected.store(field, text.trim().to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ProtocolError::Malformed(e.to_string())),
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ProtocolError::Malformed("empty response".to_string()));
    }

    if collected.fault {
        return Err(ProtocolError::Fault {
            code: collected.fault_code.unwrap_or_default(),
            reason: collected.fault_string.unwrap_or_default(),
        });
    }

    let major = collected.major.ok_or(ProtocolError::MissingResult)?;

    let response = SignResponse {
        result: ResultStatus {
            major: ResultMajor::from_urn(&major),
            minor: collected.minor,
            message: collected.message,
        },
        signatures: collected.signatures,
        response_id: collected.response_id,
    };

    debug!(
        result = %response.result.major,
        signatures = response.signatures.len(),
        "Parsed sign response"
    );

    Ok(response)
}

impl SignResponse {
    /// Check the result code and the signature count against the request.
    ///
    /// Returns the signature payloads in request order.
    pub fn into_signatures(self, expected: usize) -> Result<Vec<String>, ProtocolError> {
        match self.result.major {
            ResultMajor::Success => {}
            ResultMajor::Pending => {
                warn!(response_id = ?self.response_id, "Service answered with a pending result");
                return Err(ProtocolError::Pending {
                    response_id: self.response_id,
                });
            }
            code => {
                return Err(ProtocolError::ResultNotSuccess {
                    code,
                    minor: self.result.minor,
                    message: self.result.message,
                });
            }
        }

        if self.signatures.is_empty() && expected > 0 {
            return Err(ProtocolError::MissingSignature);
        }

        if self.signatures.len() != expected {
            return Err(ProtocolError::CorrelationMismatch {
                expected,
                actual: self.signatures.len(),
            });
        }

        Ok(self.signatures)
    }
}
