#![allow(dead_code)]

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode, header::CONTENT_TYPE},
    routing::post,
};
use axum_server::tls_openssl::{OpenSSLAcceptor, OpenSSLConfig};
use base64::{Engine, engine::general_purpose::STANDARD};
use dss_client::{
    config::{Credentials, StoreLocation},
    telemetry,
    tls::{TestPki, to_pkcs12},
};
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use openssl::x509::store::X509StoreBuilder;
use secrecy::SecretString;
use tempfile::TempDir;

pub const SERVICE_PATH: &str = "/DSS-Server/ws";
pub const CLIENT_ALIAS: &str = "dss-client";
pub const KEYSTORE_PASSWORD: &str = "changeit";

pub const TEMPLATE: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Sig /SubFilter {{SUB_FILTER}} /M ({{SIGN_DATE}}) /Contents {{CONTENTS}} >>\nendobj\n%%EOF\n";

type Responder = Arc<dyn Fn(&str) -> (StatusCode, String) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct MockState {
    responder: Responder,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// A signing service endpoint requiring client certificates issued by the test root.
pub struct MockService {
    pub uri: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle_sign(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, [(HeaderName, &'static str); 1], String) {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.requests.lock().unwrap().push(RecordedRequest {
        content_type,
        body: body.clone(),
    });

    let (status, reply) = (state.responder)(&body);
    (status, [(CONTENT_TYPE, "text/xml; charset=utf-8")], reply)
}

fn build_acceptor(pki: &TestPki) -> SslAcceptor {
    let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
    builder.set_private_key(&pki.server_key).unwrap();
    builder.set_certificate(&pki.server_cert).unwrap();

    let mut store = X509StoreBuilder::new().unwrap();
    store.add_cert(pki.ca_cert.clone()).unwrap();
    builder.set_verify_cert_store(store.build()).unwrap();
    builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);

    builder.build()
}

pub async fn spawn_service<F>(pki: &TestPki, responder: F) -> MockService
where
    F: Fn(&str) -> (StatusCode, String) + Send + Sync + 'static,
{
    telemetry::init_tracing();

    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        responder: Arc::new(responder),
        requests: requests.clone(),
    };
    let router = Router::new()
        .route(SERVICE_PATH, post(handle_sign))
        .with_state(state);

    // Use a random OS port
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let port = listener.local_addr().unwrap().port();

    let tls_config = OpenSSLConfig::from_acceptor(Arc::new(build_acceptor(pki)));
    let server = axum_server::from_tcp(listener)
        .acceptor(OpenSSLAcceptor::new(tls_config))
        .serve(router.into_make_service());
    tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!("Mock service error: {e:?}");
        }
    });

    MockService {
        uri: format!("https://127.0.0.1:{port}{SERVICE_PATH}"),
        requests,
    }
}

/// Number of document hashes in a sign request.
pub fn document_count(request: &str) -> usize {
    request.matches("<DocumentHash").count()
}

/// Raw signature the service returns for the document at `index`.
pub fn signature_bytes(index: usize) -> Vec<u8> {
    vec![0x30, 0x80, index as u8]
}

pub fn success_response(signature_node: &str, count: usize) -> String {
    let encoded: Vec<String> = (0..count)
        .map(|i| STANDARD.encode(signature_bytes(i)))
        .collect();

    let signature_object = if signature_node == "RFC3161TimeStampToken" {
        format!(
            "<SignatureObject><Timestamp><RFC3161TimeStampToken>{}</RFC3161TimeStampToken></Timestamp></SignatureObject>",
            encoded[0]
        )
    } else if count == 1 {
        format!(
            r#"<SignatureObject><Base64Signature Type="urn:ietf:rfc:3369">{}</Base64Signature></SignatureObject>"#,
            encoded[0]
        )
    } else {
        let extended: String = encoded
            .iter()
            .enumerate()
            .map(|(i, sig)| {
                format!(
                    r#"<sc:ExtendedSignatureObject WhichDocument="{i}"><Base64Signature Type="urn:ietf:rfc:3369">{sig}</Base64Signature></sc:ExtendedSignatureObject>"#
                )
            })
            .collect();
        format!(
            "<SignatureObject><Other><sc:SignatureObjects>{extended}</sc:SignatureObjects></Other></SignatureObject>"
        )
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><ais:signResponse xmlns:ais="http://service.ais.swisscom.com/"><SignResponse xmlns="urn:oasis:names:tc:dss:1.0:core:schema" xmlns:sc="urn:com:swisscom:dss:1.0:schema" Profile="urn:com:swisscom:dss:v1.0"><Result><ResultMajor>urn:oasis:names:tc:dss:1.0:resultmajor:Success</ResultMajor></Result>{signature_object}</SignResponse></ais:signResponse></soap:Body></soap:Envelope>"#
    )
}

pub fn fault_response(code: &str, reason: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><soap:Fault><faultcode>{code}</faultcode><faultstring>{reason}</faultstring></soap:Fault></soap:Body></soap:Envelope>"#
    )
}

/// Key store and trust store written to a temporary directory.
pub struct ClientFiles {
    pub dir: TempDir,
    pub credentials: Credentials,
}

impl ClientFiles {
    pub fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn client_files(
    client_cert: &X509,
    client_key: &PKey<Private>,
    chain: &[X509],
    trusted: &[&X509],
    server_cert_alias: Option<&str>,
) -> ClientFiles {
    let dir = tempfile::tempdir().unwrap();

    let keystore_path = dir.path().join("keystore.p12");
    let keystore = to_pkcs12(
        CLIENT_ALIAS,
        client_cert,
        client_key,
        chain,
        KEYSTORE_PASSWORD,
    )
    .unwrap();
    std::fs::write(&keystore_path, keystore).unwrap();

    let truststore_path = dir.path().join("truststore.pem");
    let mut truststore = Vec::new();
    for cert in trusted {
        truststore.extend_from_slice(&cert.to_pem().unwrap());
    }
    std::fs::write(&truststore_path, truststore).unwrap();

    let credentials = Credentials {
        private_key_alias: CLIENT_ALIAS.to_string(),
        client_cert_alias: CLIENT_ALIAS.to_string(),
        server_cert_alias: server_cert_alias.map(str::to_string),
        keystore: StoreLocation {
            path: keystore_path,
            password: SecretString::from(KEYSTORE_PASSWORD),
        },
        truststore: StoreLocation {
            path: truststore_path,
            password: SecretString::from(""),
        },
    };

    ClientFiles { dir, credentials }
}

/// Client files for the PKI's own client, trusting its root.
pub fn default_client_files(pki: &TestPki) -> ClientFiles {
    client_files(
        &pki.client_cert,
        &pki.client_key,
        std::slice::from_ref(&pki.ca_cert),
        &[&pki.ca_cert],
        None,
    )
}
