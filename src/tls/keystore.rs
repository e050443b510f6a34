use std::fmt;
use std::path::Path;

use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509, X509VerifyResult};
use p12_keystore::KeyStoreEntry;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use super::TlsError;

const PEM_BEGIN: &[u8] = b"-----BEGIN";
const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";
const PEM_ENCRYPTED_KEY_TAG: &str = "ENCRYPTED PRIVATE KEY";
const PEM_KEY_TAGS: &[&str] = &["PRIVATE KEY", "RSA PRIVATE KEY", "EC PRIVATE KEY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Pkcs12,
    Pem,
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pkcs12 => write!(f, "PKCS#12"),
            Self::Pem => write!(f, "PEM"),
        }
    }
}

/// A certificate with its alias, and the private key belonging to it if the store has one.
pub struct StoreEntry {
    pub alias: String,
    pub certificate: X509,
    pub private_key: Option<PKey<Private>>,
}

impl fmt::Debug for StoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreEntry")
            .field("alias", &self.alias)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Certificates and keys loaded from a PKCS#12 file or a PEM bundle.
///
/// PKCS#12 aliases are the friendly names of the bags; PEM aliases are the
/// subject common names. Aliases are matched case-insensitively.
#[derive(Debug)]
pub struct KeyStore {
    format: StoreFormat,
    entries: Vec<StoreEntry>,
}

/// The certificate, issuer chain and private key presented to the server.
pub struct ClientIdentity {
    pub certificate: X509,
    pub chain: Vec<X509>,
    pub private_key: PKey<Private>,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("subject", &common_name(&self.certificate))
            .field("chain", &self.chain.len())
            .finish()
    }
}

impl ClientIdentity {
    /// PEM bundle of the certificate, its chain and the PKCS#8 private key.
    pub fn to_pem(&self) -> Result<Vec<u8>, TlsError> {
        let mut pem = self.certificate.to_pem()?;
        for cert in &self.chain {
            pem.extend_from_slice(&cert.to_pem()?);
        }
        pem.extend_from_slice(&self.private_key.private_key_to_pem_pkcs8()?);
        Ok(pem)
    }
}

impl KeyStore {
    /// Load a store from disk, detecting its format from the content.
    pub fn load(path: &Path, password: &SecretString) -> Result<Self, TlsError> {
        let data = std::fs::read(path).map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_bytes(&data, password.expose_secret())?;
        debug!(
            path = %path.display(),
            format = %store.format,
            size = store.entries.len(),
            aliases = ?store.aliases(),
            "Loaded key store"
        );
        Ok(store)
    }

    pub fn from_bytes(data: &[u8], password: &str) -> Result<Self, TlsError> {
        if data.trim_ascii_start().starts_with(PEM_BEGIN) {
            Self::from_pem(data, password)
        } else {
            Self::from_pkcs12(data, password)
        }
    }

    /// Read every bag of a PKCS#12 store. Each key entry keeps its own friendly name.
    pub fn from_pkcs12(der: &[u8], password: &str) -> Result<Self, TlsError> {
        let store = p12_keystore::KeyStore::from_pkcs12(der, password)
            .map_err(|e| TlsError::Pkcs12(e.to_string()))?;

        let mut bags: Vec<_> = store.entries().collect();
        bags.sort_by(|a, b| a.0.cmp(b.0));

        let mut entries = Vec::new();
        let mut issuers = Vec::new();
        for (alias, bag) in bags {
            match bag {
                KeyStoreEntry::PrivateKeyChain(chain) => {
                    let Some((leaf, rest)) = chain.chain().split_first() else {
                        warn!(alias = %alias, "PKCS#12 key entry has no certificate, ignoring it");
                        continue;
                    };
                    entries.push(StoreEntry {
                        alias: alias.clone(),
                        certificate: X509::from_der(leaf.as_der())?,
                        private_key: Some(PKey::private_key_from_der(chain.key())?),
                    });
                    for cert in rest {
                        issuers.push(X509::from_der(cert.as_der())?);
                    }
                }
                KeyStoreEntry::Certificate(cert) => entries.push(StoreEntry {
                    alias: alias.clone(),
                    certificate: X509::from_der(cert.as_der())?,
                    private_key: None,
                }),
            }
        }

        // Chain certificates without an alias of their own
        for certificate in issuers {
            let der = certificate.to_der()?;
            let known = entries
                .iter()
                .any(|e| e.certificate.to_der().is_ok_and(|d| d == der));
            if !known {
                entries.push(StoreEntry {
                    alias: alias_of(&certificate, entries.len()),
                    certificate,
                    private_key: None,
                });
            }
        }

        Ok(Self {
            format: StoreFormat::Pkcs12,
            entries,
        })
    }

    /// Parse a PEM bundle. Encrypted PKCS#8 keys are decrypted with `password`.
    pub fn from_pem(data: &[u8], password: &str) -> Result<Self, TlsError> {
        let mut entries = Vec::new();
        let mut keys = Vec::new();

        for block in pem::parse_many(data)? {
            match block.tag() {
                PEM_CERTIFICATE_TAG => {
                    let certificate = X509::from_der(block.contents())?;
                    entries.push(StoreEntry {
                        alias: alias_of(&certificate, entries.len()),
                        certificate,
                        private_key: None,
                    });
                }
                PEM_ENCRYPTED_KEY_TAG => keys.push(PKey::private_key_from_pkcs8_passphrase(
                    block.contents(),
                    password.as_bytes(),
                )?),
                tag if PEM_KEY_TAGS.contains(&tag) => {
                    keys.push(PKey::private_key_from_der(block.contents())?)
                }
                tag => debug!("Skipping PEM block {tag}"),
            }
        }

        for key in keys {
            let owner = entries
                .iter_mut()
                .find(|e| e.private_key.is_none() && matches_key(&e.certificate, &key));
            match owner {
                Some(entry) => entry.private_key = Some(key),
                None => warn!("PEM store holds a private key without matching certificate"),
            }
        }

        Ok(Self {
            format: StoreFormat::Pem,
            entries,
        })
    }

    pub fn format(&self) -> StoreFormat {
        self.format
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.alias.as_str()).collect()
    }

    pub fn entry(&self, alias: &str) -> Option<&StoreEntry> {
        self.entries
            .iter()
            .find(|e| e.alias.eq_ignore_ascii_case(alias))
    }

    pub fn certificates(&self) -> impl Iterator<Item = &X509> {
        self.entries.iter().map(|e| &e.certificate)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Select the client certificate by `cert_alias` and its key by `key_alias`.
    pub fn identity(&self, cert_alias: &str, key_alias: &str) -> Result<ClientIdentity, TlsError> {
        let cert_entry = self.entry(cert_alias).ok_or_else(|| TlsError::UnknownAlias {
            alias: cert_alias.to_string(),
            store: "key store",
        })?;
        let key_entry = self.entry(key_alias).ok_or_else(|| TlsError::UnknownAlias {
            alias: key_alias.to_string(),
            store: "key store",
        })?;
        let private_key = key_entry
            .private_key
            .clone()
            .ok_or_else(|| TlsError::MissingPrivateKey {
                alias: key_entry.alias.clone(),
            })?;

        if !matches_key(&cert_entry.certificate, &private_key) {
            return Err(TlsError::KeyMismatch {
                key_alias: key_entry.alias.clone(),
                cert_alias: cert_entry.alias.clone(),
            });
        }

        let chain = self.issuer_chain(&cert_entry.certificate);
        let fingerprint = cert_entry.certificate.digest(MessageDigest::sha256())?;
        debug!(
            alias = %cert_entry.alias,
            sha256 = %hex::encode(fingerprint),
            chain = chain.len(),
            "Selected client certificate"
        );

        Ok(ClientIdentity {
            certificate: cert_entry.certificate.clone(),
            chain,
            private_key,
        })
    }

    /// Issuers of `leaf` found in this store, nearest first, up to a self-issued root.
    fn issuer_chain(&self, leaf: &X509) -> Vec<X509> {
        let mut chain: Vec<X509> = Vec::new();
        let mut current = leaf.clone();

        while chain.len() < self.entries.len() {
            if current.issued(&current) == X509VerifyResult::OK {
                break;
            }
            let issuer = self
                .certificates()
                .find(|candidate| candidate.issued(&current) == X509VerifyResult::OK);
            match issuer {
                Some(issuer) => {
                    chain.push(issuer.clone());
                    current = issuer.clone();
                }
                None => break,
            }
        }
        chain
    }

    /// Certificates to trust when validating the server.
    ///
    /// When `server_alias` names an entry only that certificate is trusted.
    pub fn trust_anchors(&self, server_alias: Option<&str>) -> Result<Vec<X509>, TlsError> {
        if self.is_empty() {
            return Err(TlsError::EmptyTrustStore);
        }

        if let Some(alias) = server_alias {
            match self.entry(alias) {
                Some(entry) => return Ok(vec![entry.certificate.clone()]),
                None => warn!(
                    alias,
                    "Server certificate alias not found in trust store, trusting all entries"
                ),
            }
        }

        Ok(self.certificates().cloned().collect())
    }
}

fn matches_key(certificate: &X509, key: &PKey<Private>) -> bool {
    certificate
        .public_key()
        .map(|public| public.public_eq(key))
        .unwrap_or(false)
}

fn common_name(certificate: &X509) -> Option<String> {
    certificate
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
}

fn alias_of(certificate: &X509, index: usize) -> String {
    certificate
        .alias()
        .and_then(|alias| std::str::from_utf8(alias).ok())
        .map(str::to_string)
        .or_else(|| common_name(certificate))
        .unwrap_or_else(|| format!("entry-{index}"))
}
