use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder};
use p12_keystore::{KeyStoreEntry, PrivateKeyChain};

use super::TlsError;

/// A throwaway PKI for exercising mutual TLS: one root plus a server and a client leaf.
#[derive(Clone)]
pub struct TestPki {
    pub ca_cert: X509,
    pub ca_key: PKey<Private>,
    pub server_cert: X509,
    pub server_key: PKey<Private>,
    pub client_cert: X509,
    pub client_key: PKey<Private>,
}

impl TestPki {
    pub fn generate() -> Result<Self, ErrorStack> {
        let (ca_cert, ca_key) = generate_ca_certificate("Test Root CA")?;
        let (server_cert, server_key) = generate_leaf_certificate(&ca_cert, &ca_key, "localhost")?;
        let (client_cert, client_key) =
            generate_leaf_certificate(&ca_cert, &ca_key, "dss-test-client")?;

        Ok(Self {
            ca_cert,
            ca_key,
            server_cert,
            server_key,
            client_cert,
            client_key,
        })
    }

    /// PEM bundle with the client certificate, the root and the client key.
    pub fn client_pem_bundle(&self) -> Result<Vec<u8>, ErrorStack> {
        let mut pem = self.client_cert.to_pem()?;
        pem.extend_from_slice(&self.ca_cert.to_pem()?);
        pem.extend_from_slice(&self.client_key.private_key_to_pem_pkcs8()?);
        Ok(pem)
    }
}

pub fn generate_ca_certificate(common_name: &str) -> Result<(X509, PKey<Private>), ErrorStack> {
    let key_pair = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut cert_builder = X509Builder::new()?;
    cert_builder.set_version(2)?;
    let serial_number = generate_serial_number()?;
    cert_builder.set_serial_number(&serial_number)?;

    let subject_name = create_x509_name(&[
        ("C", "CH"),
        ("O", "Test Organization"),
        ("OU", "Test CA"),
        ("CN", common_name),
    ])?;
    cert_builder.set_subject_name(&subject_name)?;
    cert_builder.set_issuer_name(&subject_name)?;
    cert_builder.set_pubkey(&key_pair)?;

    // Set validity period (1 year)
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    cert_builder.set_not_before(&not_before)?;
    cert_builder.set_not_after(&not_after)?;

    cert_builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    cert_builder.append_extension(
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()?,
    )?;

    cert_builder.sign(&key_pair, MessageDigest::sha256())?;

    Ok((cert_builder.build(), key_pair))
}

/// Issue a leaf usable both as TLS server and client certificate.
pub fn generate_leaf_certificate(
    ca_cert: &X509,
    ca_key: &PKey<Private>,
    common_name: &str,
) -> Result<(X509, PKey<Private>), ErrorStack> {
    let key_pair = PKey::from_rsa(Rsa::generate(2048)?)?;

    let mut cert_builder = X509Builder::new()?;
    cert_builder.set_version(2)?;
    let serial_number = generate_serial_number()?;
    cert_builder.set_serial_number(&serial_number)?;

    let subject_name = create_x509_name(&[("C", "CH"), ("O", "Test"), ("CN", common_name)])?;
    cert_builder.set_subject_name(&subject_name)?;
    cert_builder.set_issuer_name(ca_cert.subject_name())?;
    cert_builder.set_pubkey(&key_pair)?;

    // Set validity period (1 year)
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    cert_builder.set_not_before(&not_before)?;
    cert_builder.set_not_after(&not_after)?;

    cert_builder.append_extension(BasicConstraints::new().build()?)?;
    cert_builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()?,
    )?;
    cert_builder.append_extension(ExtendedKeyUsage::new().server_auth().client_auth().build()?)?;

    let san = SubjectAlternativeName::new()
        .dns(common_name)
        .dns("localhost")
        .ip("127.0.0.1")
        .build(&cert_builder.x509v3_context(Some(ca_cert), None))?;
    cert_builder.append_extension(san)?;

    cert_builder.sign(ca_key, MessageDigest::sha256())?;

    Ok((cert_builder.build(), key_pair))
}

/// Write a PKCS#12 store whose key bag carries `alias` as friendly name.
pub fn to_pkcs12(
    alias: &str,
    cert: &X509,
    key: &PKey<Private>,
    chain: &[X509],
    password: &str,
) -> Result<Vec<u8>, ErrorStack> {
    let mut ca = Stack::new()?;
    for c in chain {
        ca.push(c.clone())?;
    }

    Pkcs12::builder()
        .name(alias)
        .pkey(key)
        .cert(cert)
        .ca(ca)
        .build2(password)?
        .to_der()
}

/// Write a PKCS#12 store with one key entry per `(alias, certificate, key)`.
pub fn to_pkcs12_entries(
    entries: &[(&str, &X509, &PKey<Private>)],
    password: &str,
) -> Result<Vec<u8>, TlsError> {
    let mut store = p12_keystore::KeyStore::new();
    for (alias, cert, key) in entries {
        let certificate = p12_keystore::Certificate::from_der(&cert.to_der()?)
            .map_err(|e| TlsError::Pkcs12(e.to_string()))?;
        let local_key_id = cert.digest(MessageDigest::sha1())?.to_vec();
        let chain = PrivateKeyChain::new(key.private_key_to_pkcs8()?, local_key_id, [certificate]);
        store.add_entry(alias, KeyStoreEntry::PrivateKeyChain(chain));
    }

    store
        .writer(password)
        .write()
        .map_err(|e| TlsError::Pkcs12(e.to_string()))
}

fn generate_serial_number() -> Result<Asn1Integer, ErrorStack> {
    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
    serial.to_asn1_integer()
}

fn create_x509_name(entries: &[(&str, &str)]) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (key, value) in entries {
        name_builder.append_entry_by_text(key, value)?;
    }
    Ok(name_builder.build())
}
