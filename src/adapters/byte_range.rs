//! A document that keeps its signature inside a hex placeholder and is digested
//! over every byte outside that placeholder, the way PDF signature dictionaries
//! are laid out with a `/ByteRange`.
//!
//! The template is any byte string carrying a `{{CONTENTS}}` marker. Optional
//! `{{SIGN_DATE}}` and `{{SUB_FILTER}}` markers are filled in while preparing.

use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use openssl::hash::Hasher;
use tracing::{debug, instrument};

use crate::domain::dss::{DocumentError, DocumentHashProvider, EmbeddingError, HashAlgorithm};

pub const CONTENTS_MARKER: &str = "{{CONTENTS}}";
pub const SIGN_DATE_MARKER: &str = "{{SIGN_DATE}}";
pub const SUB_FILTER_MARKER: &str = "{{SUB_FILTER}}";

const SUB_FILTER_CMS: &str = "/adbe.pkcs7.detached";
const SUB_FILTER_TIMESTAMP: &str = "/ETSI.RFC3161";

#[derive(Debug, Clone)]
struct Prepared {
    bytes: Vec<u8>,
    /// Span of the placeholder including its `<` and `>` delimiters.
    placeholder: Range<usize>,
}

impl Prepared {
    fn capacity(&self) -> usize {
        (self.placeholder.len() - 2) / 2
    }
}

#[derive(Debug, Clone)]
pub struct ByteRangeDocument {
    template: Vec<u8>,
    output: Option<PathBuf>,
    prepared: Option<Prepared>,
    signed: Option<Vec<u8>>,
}

impl ByteRangeDocument {
    pub fn from_template(template: impl Into<Vec<u8>>) -> Self {
        Self {
            template: template.into(),
            output: None,
            prepared: None,
            signed: None,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::from_template(std::fs::read(path)?))
    }

    /// Write the signed bytes to `path` once a signature has been embedded.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Bytes with an empty placeholder, available after hashing.
    pub fn prepared_bytes(&self) -> Option<&[u8]> {
        self.prepared.as_ref().map(|p| p.bytes.as_slice())
    }

    /// Bytes carrying the embedded signature.
    pub fn signed_bytes(&self) -> Option<&[u8]> {
        self.signed.as_deref()
    }

    /// `[offset1, length1, offset2, length2]` of the digested ranges.
    pub fn byte_range(&self) -> Option<[usize; 4]> {
        self.prepared.as_ref().map(|p| {
            [
                0,
                p.placeholder.start,
                p.placeholder.end,
                p.bytes.len() - p.placeholder.end,
            ]
        })
    }

    fn prepare(
        &self,
        sign_date: DateTime<Utc>,
        reserved_size: usize,
        timestamp_only: bool,
    ) -> Result<Prepared, DocumentError> {
        let date = sign_date.format("D:%Y%m%d%H%M%S+00'00'").to_string();
        let sub_filter = if timestamp_only {
            SUB_FILTER_TIMESTAMP
        } else {
            SUB_FILTER_CMS
        };

        let filled = replace_all(&self.template, SIGN_DATE_MARKER.as_bytes(), date.as_bytes());
        let filled = replace_all(&filled, SUB_FILTER_MARKER.as_bytes(), sub_filter.as_bytes());

        let start = find(&filled, CONTENTS_MARKER.as_bytes())
            .ok_or(DocumentError::MissingMarker(CONTENTS_MARKER))?;
        let marker_end = start + CONTENTS_MARKER.len();

        let mut bytes = Vec::with_capacity(filled.len() + reserved_size * 2);
        bytes.extend_from_slice(&filled[..start]);
        bytes.push(b'<');
        bytes.resize(bytes.len() + reserved_size * 2, b'0');
        bytes.push(b'>');
        let end = bytes.len();
        bytes.extend_from_slice(&filled[marker_end..]);

        Ok(Prepared {
            bytes,
            placeholder: start..end,
        })
    }
}

impl DocumentHashProvider for ByteRangeDocument {
    #[instrument(skip(self, sign_date))]
    fn compute_hash(
        &mut self,
        sign_date: DateTime<Utc>,
        reserved_size: usize,
        algorithm: HashAlgorithm,
        timestamp_only: bool,
    ) -> Result<Vec<u8>, DocumentError> {
        let prepared = self.prepare(sign_date, reserved_size, timestamp_only)?;

        let mut hasher = Hasher::new(algorithm.message_digest())?;
        hasher.update(&prepared.bytes[..prepared.placeholder.start])?;
        hasher.update(&prepared.bytes[prepared.placeholder.end..])?;
        let digest = hasher.finish()?.to_vec();

        debug!(
            len = prepared.bytes.len(),
            placeholder = ?prepared.placeholder,
            "Prepared signature placeholder"
        );
        self.prepared = Some(prepared);
        self.signed = None;
        Ok(digest)
    }

    fn embed_signature(
        &mut self,
        signature: &[u8],
        reserved_size: usize,
    ) -> Result<(), EmbeddingError> {
        let prepared = self.prepared.as_ref().ok_or(EmbeddingError::NotPrepared)?;

        let reserved = reserved_size.min(prepared.capacity());
        if signature.len() > reserved {
            return Err(EmbeddingError::SignatureTooLarge {
                actual: signature.len(),
                reserved,
            });
        }

        let mut padded = signature.to_vec();
        padded.resize(prepared.capacity(), 0);
        let hex = hex::encode_upper(padded);

        let mut bytes = prepared.bytes.clone();
        let inner = prepared.placeholder.start + 1..prepared.placeholder.end - 1;
        bytes[inner].copy_from_slice(hex.as_bytes());

        if let Some(path) = &self.output {
            std::fs::write(path, &bytes)?;
            debug!(path = %path.display(), "Wrote signed document");
        }
        self.signed = Some(bytes);
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(at) = find(rest, needle) {
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(replacement);
        rest = &rest[at + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use openssl::hash::{MessageDigest, hash};

    const TEMPLATE: &[u8] =
        b"%PDF-1.7\n<< /SubFilter {{SUB_FILTER}} /M ({{SIGN_DATE}}) /Contents {{CONTENTS}} >>\n%%EOF\n";

    fn sign_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    #[test]
    fn test_hash_excludes_placeholder() {
        let mut doc = ByteRangeDocument::from_template(TEMPLATE);
        let digest = doc
            .compute_hash(sign_date(), 8, HashAlgorithm::Sha256, false)
            .unwrap();

        let prepared = doc.prepared_bytes().unwrap().to_vec();
        let text = String::from_utf8(prepared.clone()).unwrap();
        assert!(text.contains("/SubFilter /adbe.pkcs7.detached"));
        assert!(text.contains("/M (D:20240305140709+00'00')"));
        assert!(text.contains("/Contents <0000000000000000>"));

        let [_, len1, off2, len2] = doc.byte_range().unwrap();
        assert_eq!(off2 - len1, 18);
        assert_eq!(off2 + len2, prepared.len());

        let mut covered = prepared[..len1].to_vec();
        covered.extend_from_slice(&prepared[off2..]);
        let expected = hash(MessageDigest::sha256(), &covered).unwrap();
        assert_eq!(digest, expected.to_vec());
    }

    #[test]
    fn test_timestamp_sub_filter() {
        let mut doc = ByteRangeDocument::from_template(TEMPLATE);
        let digest = doc
            .compute_hash(sign_date(), 4, HashAlgorithm::Sha512, true)
            .unwrap();

        assert_eq!(digest.len(), 64);
        let text = String::from_utf8(doc.prepared_bytes().unwrap().to_vec()).unwrap();
        assert!(text.contains("/SubFilter /ETSI.RFC3161"));
    }

    #[test]
    fn test_embed_pads_with_zeros() {
        let mut doc = ByteRangeDocument::from_template(TEMPLATE);
        doc.compute_hash(sign_date(), 4, HashAlgorithm::Sha256, false)
            .unwrap();
        doc.embed_signature(&[0xAB, 0x01], 4).unwrap();

        let text = String::from_utf8(doc.signed_bytes().unwrap().to_vec()).unwrap();
        assert!(text.contains("/Contents <AB010000>"));
        assert_eq!(doc.signed_bytes().unwrap().len(), doc.prepared_bytes().unwrap().len());
    }

    #[test]
    fn test_oversized_signature_leaves_document_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("signed.pdf");

        let mut doc = ByteRangeDocument::from_template(TEMPLATE).with_output(&output);
        doc.compute_hash(sign_date(), 2, HashAlgorithm::Sha256, false)
            .unwrap();
        let before = doc.prepared_bytes().unwrap().to_vec();

        let err = doc.embed_signature(&[1, 2, 3], 2).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::SignatureTooLarge {
                actual: 3,
                reserved: 2
            }
        ));
        assert_eq!(doc.prepared_bytes().unwrap(), before.as_slice());
        assert!(doc.signed_bytes().is_none());
        assert!(!output.exists());
    }

    #[test]
    fn test_embed_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("signed.pdf");

        let mut doc = ByteRangeDocument::from_template(TEMPLATE).with_output(&output);
        doc.compute_hash(sign_date(), 2, HashAlgorithm::Sha256, false)
            .unwrap();
        doc.embed_signature(&[0x0F], 2).unwrap();

        let written = std::fs::read(&output).unwrap();
        assert_eq!(written, doc.signed_bytes().unwrap());
    }

    #[test]
    fn test_embed_before_hash() {
        let mut doc = ByteRangeDocument::from_template(TEMPLATE);
        assert!(matches!(
            doc.embed_signature(&[1], 8),
            Err(EmbeddingError::NotPrepared)
        ));
    }

    #[test]
    fn test_missing_contents_marker() {
        let mut doc = ByteRangeDocument::from_template(b"no marker here".to_vec());
        assert!(matches!(
            doc.compute_hash(sign_date(), 8, HashAlgorithm::Sha256, false),
            Err(DocumentError::MissingMarker(CONTENTS_MARKER))
        ));
    }
}
