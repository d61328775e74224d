//! X.509 certificate parsing and verification.
//!
//! An LCP license carries the content provider certificate as base64 DER
//! (no PEM armor); the trust anchor is configured the same way. This module
//! parses both, exposes the semantic attributes the pipeline needs (serial,
//! validity window, CRL distribution points) and performs the two signature
//! checks of the trust chain:
//!
//! - [`Certificate::verify_against`]: this certificate's signature under
//!   the issuer's public key. No path building; the caller supplies the
//!   parent directly.
//! - [`Certificate::verify_message`]: a detached signature (the license
//!   signature) under this certificate's public key.
//!
//! The TBS portion is retained in DER form at parse time so signature
//! recomputation is exact, and the parsed form is immutable.
//!
//! The basic LCP profile pins the signature scheme to RSA with SHA-256
//! (PKCS#1 v1.5); a certificate declaring anything else is rejected at
//! parse time.

use core::fmt;

use chrono::{DateTime, Utc};
use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use x509_cert::ext::pkix::name::DistributionPointName;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::CrlDistributionPoints;
use x509_cert::Certificate as X509Certificate;

use crate::encoding::decode_base64;

/// OID for the CRLDistributionPoints extension (2.5.29.31).
pub const OID_CRL_DISTRIBUTION_POINTS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.31");

/// OID for sha256WithRSAEncryption (1.2.840.113549.1.1.11).
pub const OID_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// Errors from certificate parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// The input is not well-formed base64 or DER.
    Decode(String),
    /// The certificate declares a signature algorithm outside the profile.
    UnsupportedSignatureAlgorithm(String),
    /// The subject public key is not an RSA key.
    UnsupportedPublicKey(String),
    /// The validity window could not be represented as a timestamp.
    InvalidValidity,
}

impl fmt::Display for CertificateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(detail) => write!(f, "certificate decode error: {}", detail),
            Self::UnsupportedSignatureAlgorithm(oid) => {
                write!(f, "unsupported signature algorithm: {}", oid)
            }
            Self::UnsupportedPublicKey(detail) => {
                write!(f, "unsupported subject public key: {}", detail)
            }
            Self::InvalidValidity => write!(f, "invalid validity window"),
        }
    }
}

impl std::error::Error for CertificateError {}

/// Strip leading zero octets from a DER integer's content bytes.
///
/// DER prepends a zero octet to keep positive integers positive; serial
/// numbers from certificates and CRL entries must compare equal regardless,
/// so both sides normalize through this.
pub(crate) fn canonical_serial(bytes: &[u8]) -> Vec<u8> {
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    bytes[start..].to_vec()
}

/// A parsed X.509 v3 certificate, immutable after parse.
pub struct Certificate {
    serial_number: Vec<u8>,
    tbs_der: Vec<u8>,
    signature: Vec<u8>,
    verifying_key: VerifyingKey<Sha256>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    distribution_points: Vec<String>,
}

impl Certificate {
    /// Parse a certificate from base64-encoded DER (no PEM armor).
    pub fn from_base64(data: &str) -> Result<Self, CertificateError> {
        let der = decode_base64(data).map_err(|e| CertificateError::Decode(e.to_string()))?;
        Self::from_der(&der)
    }

    /// Parse a certificate from raw DER.
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let cert =
            X509Certificate::from_der(der).map_err(|e| CertificateError::Decode(e.to_string()))?;

        if cert.signature_algorithm.oid != OID_SHA256_WITH_RSA {
            return Err(CertificateError::UnsupportedSignatureAlgorithm(
                cert.signature_algorithm.oid.to_string(),
            ));
        }

        let tbs_der = cert
            .tbs_certificate
            .to_der()
            .map_err(|e| CertificateError::Decode(e.to_string()))?;
        let signature = cert.signature.raw_bytes().to_vec();

        let spki_der = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CertificateError::Decode(e.to_string()))?;
        let public_key = RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| CertificateError::UnsupportedPublicKey(e.to_string()))?;

        let not_before = time_to_utc(cert.tbs_certificate.validity.not_before.clone())?;
        let not_after = time_to_utc(cert.tbs_certificate.validity.not_after.clone())?;

        let mut distribution_points = Vec::new();
        if let Some(extensions) = &cert.tbs_certificate.extensions {
            for ext in extensions {
                if ext.extn_id != OID_CRL_DISTRIBUTION_POINTS {
                    continue;
                }
                let points = CrlDistributionPoints::from_der(ext.extn_value.as_bytes())
                    .map_err(|e| CertificateError::Decode(e.to_string()))?;
                for point in points.0 {
                    let Some(DistributionPointName::FullName(names)) = point.distribution_point
                    else {
                        continue;
                    };
                    for name in names {
                        if let GeneralName::UniformResourceIdentifier(uri) = name {
                            distribution_points.push(uri.to_string());
                        }
                    }
                }
            }
        }

        Ok(Self {
            serial_number: canonical_serial(cert.tbs_certificate.serial_number.as_bytes()),
            tbs_der,
            signature,
            verifying_key: VerifyingKey::new(public_key),
            not_before,
            not_after,
            distribution_points,
        })
    }

    /// Verify this certificate's signature using the issuer's public key.
    ///
    /// Returns `false` on any mismatch; verification failure is an expected
    /// outcome, not an error.
    pub fn verify_against(&self, issuer: &Certificate) -> bool {
        issuer.verify_message(&self.tbs_der, &self.signature)
    }

    /// Verify a detached RSA-SHA256 signature over `message` with this
    /// certificate's public key.
    pub fn verify_message(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        self.verifying_key.verify(message, &signature).is_ok()
    }

    /// Serial number as a canonical big-endian byte sequence.
    pub fn serial_number(&self) -> &[u8] {
        &self.serial_number
    }

    /// Start of the validity window (UTC).
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of the validity window (UTC).
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// CRL distribution point URLs declared by the certificate. May be empty.
    pub fn distribution_points(&self) -> &[String] {
        &self.distribution_points
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("serial_number", &hex::encode(&self.serial_number))
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .field("distribution_points", &self.distribution_points)
            .finish()
    }
}

pub(crate) fn time_to_utc(time: x509_cert::time::Time) -> Result<DateTime<Utc>, CertificateError> {
    let duration = time.to_unix_duration();
    DateTime::from_timestamp(duration.as_secs() as i64, duration.subsec_nanos())
        .ok_or(CertificateError::InvalidValidity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use der::asn1::{Any, BitString, Ia5String, OctetString, SetOfVec, UtcTime};
    use der::Tag;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;
    use std::time::Duration;
    use x509_cert::attr::AttributeTypeAndValue;
    use x509_cert::certificate::{CertificateInner, Rfc5280, TbsCertificateInner, Version};
    use x509_cert::ext::pkix::crl::dp::DistributionPoint;
    use x509_cert::ext::Extension;
    use x509_cert::name::{RdnSequence, RelativeDistinguishedName};
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
    use x509_cert::time::{Time, Validity};

    const OID_CN: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

    fn rsa_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap()
    }

    fn cn(value: &str) -> RdnSequence {
        let mut set = SetOfVec::new();
        set.insert(AttributeTypeAndValue {
            oid: OID_CN,
            value: Any::new(Tag::Utf8String, value.as_bytes()).unwrap(),
        })
        .unwrap();
        RdnSequence(vec![RelativeDistinguishedName::from(set)])
    }

    fn rsa_sha256() -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: OID_SHA256_WITH_RSA,
            parameters: Some(Any::null()),
        }
    }

    struct CertSpec<'a> {
        pub subject: &'a str,
        pub issuer: &'a str,
        pub serial: &'a [u8],
        pub not_before_unix: u64,
        pub not_after_unix: u64,
        pub crl_urls: &'a [&'a str],
    }

    /// Build and sign a certificate, returning its DER.
    fn build_cert(
        spec: &CertSpec<'_>,
        subject_key: &RsaPrivateKey,
        issuer_key: &RsaPrivateKey,
    ) -> Vec<u8> {
        let spki_der = subject_key
            .to_public_key()
            .to_public_key_der()
            .unwrap();
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).unwrap();

        let mut extensions = Vec::new();
        if !spec.crl_urls.is_empty() {
            let points: Vec<DistributionPoint> = spec
                .crl_urls
                .iter()
                .map(|url| DistributionPoint {
                    distribution_point: Some(DistributionPointName::FullName(vec![
                        GeneralName::UniformResourceIdentifier(Ia5String::new(url).unwrap()),
                    ])),
                    reasons: None,
                    crl_issuer: None,
                })
                .collect();
            extensions.push(Extension {
                extn_id: OID_CRL_DISTRIBUTION_POINTS,
                critical: false,
                extn_value: OctetString::new(CrlDistributionPoints(points).to_der().unwrap())
                    .unwrap(),
            });
        }

        let tbs = TbsCertificateInner::<Rfc5280> {
            version: Version::V3,
            serial_number: SerialNumber::new(spec.serial).unwrap(),
            signature: rsa_sha256(),
            issuer: cn(spec.issuer),
            validity: Validity {
                not_before: Time::UtcTime(
                    UtcTime::from_unix_duration(Duration::from_secs(spec.not_before_unix))
                        .unwrap(),
                ),
                not_after: Time::UtcTime(
                    UtcTime::from_unix_duration(Duration::from_secs(spec.not_after_unix)).unwrap(),
                ),
            },
            subject: cn(spec.subject),
            subject_public_key_info: spki,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        };

        let tbs_der = tbs.to_der().unwrap();
        let signature = SigningKey::<Sha256>::new(issuer_key.clone())
            .sign(&tbs_der)
            .to_vec();

        CertificateInner {
            tbs_certificate: tbs,
            signature_algorithm: rsa_sha256(),
            signature: BitString::from_bytes(&signature).unwrap(),
        }
        .to_der()
        .unwrap()
    }

    const NOT_BEFORE: u64 = 1_577_836_800; // 2020-01-01T00:00:00Z
    const NOT_AFTER: u64 = 1_735_689_600; // 2025-01-01T00:00:00Z

    #[test]
    fn test_parse_accessors() {
        let root_key = rsa_key();
        let der = build_cert(
            &CertSpec {
                subject: "Test Provider",
                issuer: "Test Root",
                serial: &[0x01, 0x02, 0x03],
                not_before_unix: NOT_BEFORE,
                not_after_unix: NOT_AFTER,
                crl_urls: &["http://crl.example.com/root.crl"],
            },
            &root_key,
            &root_key,
        );

        let cert = Certificate::from_der(&der).unwrap();
        assert_eq!(cert.serial_number(), &[0x01, 0x02, 0x03]);
        assert_eq!(
            cert.not_before(),
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            cert.not_after(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            cert.distribution_points(),
            &["http://crl.example.com/root.crl".to_string()]
        );
    }

    #[test]
    fn test_from_base64() {
        let key = rsa_key();
        let der = build_cert(
            &CertSpec {
                subject: "Self",
                issuer: "Self",
                serial: &[0x07],
                not_before_unix: NOT_BEFORE,
                not_after_unix: NOT_AFTER,
                crl_urls: &[],
            },
            &key,
            &key,
        );

        let encoded = crate::encoding::encode_base64(&der);
        let cert = Certificate::from_base64(&encoded).unwrap();
        assert_eq!(cert.serial_number(), &[0x07]);
        assert!(cert.distribution_points().is_empty());
    }

    #[test]
    fn test_garbage_input_is_decode_error() {
        assert!(matches!(
            Certificate::from_base64("not base64 at all!!!"),
            Err(CertificateError::Decode(_))
        ));
        assert!(matches!(
            Certificate::from_der(&[0x30, 0x03, 0x01, 0x01, 0xFF]),
            Err(CertificateError::Decode(_))
        ));
    }

    #[test]
    fn test_chain_verification() {
        let root_key = rsa_key();
        let provider_key = rsa_key();
        let other_key = rsa_key();

        let root_der = build_cert(
            &CertSpec {
                subject: "Root",
                issuer: "Root",
                serial: &[0x01],
                not_before_unix: NOT_BEFORE,
                not_after_unix: NOT_AFTER,
                crl_urls: &[],
            },
            &root_key,
            &root_key,
        );
        let provider_der = build_cert(
            &CertSpec {
                subject: "Provider",
                issuer: "Root",
                serial: &[0x02],
                not_before_unix: NOT_BEFORE,
                not_after_unix: NOT_AFTER,
                crl_urls: &[],
            },
            &provider_key,
            &root_key,
        );
        let other_root_der = build_cert(
            &CertSpec {
                subject: "Other Root",
                issuer: "Other Root",
                serial: &[0x03],
                not_before_unix: NOT_BEFORE,
                not_after_unix: NOT_AFTER,
                crl_urls: &[],
            },
            &other_key,
            &other_key,
        );

        let root = Certificate::from_der(&root_der).unwrap();
        let provider = Certificate::from_der(&provider_der).unwrap();
        let other_root = Certificate::from_der(&other_root_der).unwrap();

        assert!(provider.verify_against(&root));
        assert!(!provider.verify_against(&other_root));
    }

    #[test]
    fn test_message_verification() {
        let key = rsa_key();
        let der = build_cert(
            &CertSpec {
                subject: "Signer",
                issuer: "Signer",
                serial: &[0x05],
                not_before_unix: NOT_BEFORE,
                not_after_unix: NOT_AFTER,
                crl_urls: &[],
            },
            &key,
            &key,
        );
        let cert = Certificate::from_der(&der).unwrap();

        let message = b"canonical license content";
        let signature = SigningKey::<Sha256>::new(key).sign(message).to_vec();

        assert!(cert.verify_message(message, &signature));
        assert!(!cert.verify_message(b"tampered license content", &signature));
        assert!(!cert.verify_message(message, &signature[..signature.len() - 1]));
    }

    #[test]
    fn test_canonical_serial_strips_sign_octet() {
        assert_eq!(canonical_serial(&[0x00, 0xA5]), vec![0xA5]);
        assert_eq!(canonical_serial(&[0x01, 0x02]), vec![0x01, 0x02]);
        assert_eq!(canonical_serial(&[0x00]), vec![0x00]);
    }
}
