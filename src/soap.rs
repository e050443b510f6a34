//! SOAP 1.1 envelope used to carry requests to the signing service.

mod config;
mod ser;

pub use config::XmlConfig;
pub use ser::to_string;

use serde::Serialize;
use serde::ser::SerializeStruct;

pub mod ns {
    pub const SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const DSS: &str = "urn:oasis:names:tc:dss:1.0:core:schema";
    pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
    pub const SWISSCOM_DSS: &str = "urn:com:swisscom:dss:1.0:schema";
    pub const AIS: &str = "http://service.ais.swisscom.com/";
}

pub mod prefix {
    pub const SOAP: &str = "soap";
    /// The DSS core schema is the default namespace.
    pub const DSS: &str = "";
    pub const DSIG: &str = "dsig";
    pub const SWISSCOM_DSS: &str = "ns5";
    pub const AIS: &str = "ais";
}

/// A SOAP envelope
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    body: Body<T>,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the given body
    pub fn new(body: T) -> Self {
        Self {
            body: Body { content: body },
        }
    }

    /// Returns the body of the envelope
    pub fn body(&self) -> &T {
        &self.body.content
    }

    /// Consumes the envelope and returns the body
    pub fn into_body(self) -> T {
        self.body.content
    }
}

/// Content of a SOAP body, serialized as a child element named [`Self::ELEMENT`].
pub trait BodyElement: Serialize {
    /// Qualified name of the body child, e.g. `ais:sign`.
    const ELEMENT: &'static str;
}

impl<T: BodyElement> Envelope<T> {
    /// Serialize this envelope with the DSS namespace declarations and optional pretty printing
    pub fn serialize_soap(&self, pretty: bool) -> Result<String, quick_xml::SeError> {
        let config = XmlConfig::new()
            .pretty(pretty)
            .namespace(prefix::SOAP, ns::SOAP_ENV)
            .namespace(prefix::DSS, ns::DSS)
            .namespace(prefix::DSIG, ns::DSIG)
            .namespace(prefix::SWISSCOM_DSS, ns::SWISSCOM_DSS)
            .namespace(prefix::AIS, ns::AIS);

        to_string(&config, self)
    }
}

impl<T: BodyElement> Serialize for Envelope<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("soap:Envelope", 1)?;
        state.serialize_field("soap:Body", &self.body)?;
        state.end()
    }
}

/// Represents a SOAP body
#[derive(Debug, Clone)]
pub struct Body<T> {
    pub content: T,
}

impl<T: BodyElement> Serialize for Body<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("soap:Body", 1)?;
        state.serialize_field(T::ELEMENT, &self.content)?;
        state.end()
    }
}
