//! Certificate revocation list parsing (RFC 5280 §5).
//!
//! CRLs are fetched from the distribution points declared by verified
//! certificates; this module only parses the DER payload. The CRL's own
//! signature is not checked: the revocation set can only grow the set of
//! rejected certificates, so a forged CRL cannot grant access.

use core::fmt;

use chrono::{DateTime, Utc};
use der::Decode;
use x509_cert::crl::CertificateList;

use crate::certificate::{canonical_serial, time_to_utc};

/// Errors from CRL parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrlParseError {
    /// The input is not a well-formed DER CertificateList.
    Decode(String),
    /// A CRL timestamp could not be represented.
    InvalidTime,
}

impl fmt::Display for CrlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(detail) => write!(f, "CRL decode error: {}", detail),
            Self::InvalidTime => write!(f, "CRL carries an unrepresentable timestamp"),
        }
    }
}

impl std::error::Error for CrlParseError {}

/// A parsed certificate revocation list.
#[derive(Debug, Clone)]
pub struct CrlDocument {
    revoked_serials: Vec<Vec<u8>>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
}

impl CrlDocument {
    /// Parse a DER-encoded CertificateList.
    pub fn parse(der: &[u8]) -> Result<Self, CrlParseError> {
        let list =
            CertificateList::from_der(der).map_err(|e| CrlParseError::Decode(e.to_string()))?;
        let tbs = list.tbs_cert_list;

        let this_update =
            time_to_utc(tbs.this_update).map_err(|_| CrlParseError::InvalidTime)?;
        let next_update = match tbs.next_update {
            Some(time) => Some(time_to_utc(time).map_err(|_| CrlParseError::InvalidTime)?),
            None => None,
        };

        let revoked_serials = tbs
            .revoked_certificates
            .unwrap_or_default()
            .iter()
            .map(|entry| canonical_serial(entry.serial_number.as_bytes()))
            .collect();

        Ok(Self {
            revoked_serials,
            this_update,
            next_update,
        })
    }

    /// Serial numbers revoked by this list, canonical big-endian.
    pub fn revoked_serials(&self) -> &[Vec<u8>] {
        &self.revoked_serials
    }

    /// Consume the document, yielding the revoked serials.
    pub fn into_revoked_serials(self) -> Vec<Vec<u8>> {
        self.revoked_serials
    }

    /// When this revision of the list was issued.
    pub fn this_update(&self) -> DateTime<Utc> {
        self.this_update
    }

    /// When the next revision is expected, if the issuer says.
    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update
    }
}
