//! The crypto provider: one pass-or-fail pipeline per operation.
//!
//! [`CryptoProvider`] binds license parsing output, certificate
//! verification, revocation processing, key derivation and publication
//! decryption together. Every operation maps underlying failures onto a
//! single domain status ([`LcpError`]); library error types never cross
//! this boundary.
//!
//! Construction wires the revocation machinery: the CRL updater feeds the
//! shared revocation list, and a dedicated timer thread re-runs it on the
//! cadence the fetched lists suggest. Dropping the provider cancels the
//! updater and joins the timer, waiting for an in-flight refresh.
//!
//! Within one license open the expected call order is
//! [`verify_license`](CryptoProvider::verify_license) →
//! [`decrypt_user_key`](CryptoProvider::decrypt_user_key) →
//! [`decrypt_content_key`](CryptoProvider::decrypt_content_key) →
//! publication operations. The order is not enforced; calls made out of
//! order fail closed with the same domain statuses.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

use lcp_core::certificate::Certificate;
use lcp_core::encoding::{decode_base64, hex_to_raw, raw_to_hex};
use lcp_core::error::{LcpError, LcpResult};
use lcp_core::hashing::{Sha256Hash, HASH_SIZE, READ_CHUNK_SIZE};
use lcp_core::license::{KeyProvider, LicenseDocument};
use lcp_core::profiles::{EncryptionProfile, EncryptionProfiles};
use lcp_core::revocation::RevocationList;
use lcp_core::stream::{EncryptedStream, ReadableStream};

use crate::crl_updater::{CrlConfig, CrlUpdater};
use crate::net::NetProvider;
use crate::timer::ThreadTimer;

/// Orchestrates license verification and publication decryption.
pub struct CryptoProvider {
    profiles: EncryptionProfiles,
    revocation: Arc<RevocationList>,
    crl_updater: Arc<CrlUpdater>,
    timer: ThreadTimer,
}

impl CryptoProvider {
    /// Create a provider with the built-in profile registry and default
    /// CRL policy.
    pub fn new(net: Arc<dyn NetProvider>) -> Self {
        Self::with_config(net, CrlConfig::default())
    }

    /// Create a provider with an explicit CRL policy.
    pub fn with_config(net: Arc<dyn NetProvider>, config: CrlConfig) -> Self {
        let revocation = Arc::new(RevocationList::new());
        let crl_updater = Arc::new(CrlUpdater::new(net, revocation.clone(), config));

        let timer = ThreadTimer::new();
        timer.set_auto_reset(true);
        let for_ticks = crl_updater.clone();
        timer.set_handler(Box::new(move || {
            for_ticks
                .update()
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        }));
        let for_interval = crl_updater.clone();
        timer.set_interval_provider(Box::new(move || for_interval.next_refresh_interval()));

        Self {
            profiles: EncryptionProfiles::with_known_profiles(),
            revocation,
            crl_updater,
            timer,
        }
    }

    fn profile(&self, license: &LicenseDocument) -> LcpResult<&EncryptionProfile> {
        self.profiles
            .get(&license.crypto.encryption_profile)
            .ok_or(LcpError::EncryptionProfileNotFound)
    }

    /// Verify a license document against the configured trust anchor.
    ///
    /// The pipeline, in order: profile lookup, root and provider
    /// certificate parsing, chain verification, revocation processing
    /// (which may block on the first CRL fetch), license signature
    /// verification over the canonical content, and the certificate
    /// validity window checked against the license's `updated ?? issued`
    /// timestamp (inclusive on both boundaries).
    pub fn verify_license(
        &self,
        root_certificate_base64: &str,
        license: &LicenseDocument,
    ) -> LcpResult<()> {
        self.profile(license)?;

        if root_certificate_base64.is_empty() {
            return Err(LcpError::NoRootCertificate);
        }
        let root = Certificate::from_base64(root_certificate_base64)
            .map_err(|e| LcpError::RootCertificateNotValid(e.to_string()))?;
        let provider_certificate = Certificate::from_base64(&license.crypto.signature_certificate)
            .map_err(|e| LcpError::ContentProviderCertificateNotValid(e.to_string()))?;

        if !provider_certificate.verify_against(&root) {
            return Err(LcpError::ContentProviderCertificateNotVerified);
        }

        self.process_revocation(&provider_certificate)?;

        let signature = decode_base64(&license.crypto.signature)
            .map_err(|_| LcpError::LicenseSignatureNotValid)?;
        if !provider_certificate.verify_message(&license.canonical_content, &signature) {
            return Err(LcpError::LicenseSignatureNotValid);
        }

        let last_updated = license.last_updated()?;
        if last_updated < provider_certificate.not_before() {
            return Err(LcpError::ContentProviderCertificateNotStarted);
        }
        if last_updated > provider_certificate.not_after() {
            return Err(LcpError::ContentProviderCertificateExpired);
        }

        debug!(license = %license.id, "license verified");
        Ok(())
    }

    /// Merge the certificate's distribution points, establish revocation
    /// state synchronously the first time any appear, then check the serial.
    fn process_revocation(&self, certificate: &Certificate) -> LcpResult<()> {
        let had_any_url = self.crl_updater.has_any_url();
        self.crl_updater
            .update_distribution_points(certificate.distribution_points());

        if !had_any_url && self.crl_updater.has_any_url() {
            // First distribution points seen: fetch now so the revocation
            // answer below is authoritative, then poll in the background.
            self.crl_updater
                .update()
                .map_err(|e| LcpError::CommonError(e.to_string()))?;
            self.timer.start();
        }

        self.timer
            .rethrow_error_if_any()
            .map_err(|e| LcpError::CommonError(e.to_string()))?;

        if self
            .revocation
            .contains_serial(certificate.serial_number())
        {
            return Err(LcpError::ContentProviderCertificateRevoked);
        }
        Ok(())
    }

    /// Derive the user key from a passphrase and prove it against the
    /// license's key-check token.
    ///
    /// A wrong passphrase and a corrupted token are deliberately
    /// indistinguishable: every failure mode is
    /// [`LcpError::UserPassphraseNotValid`].
    pub fn decrypt_user_key(
        &self,
        passphrase: &str,
        license: &LicenseDocument,
    ) -> LcpResult<Zeroizing<Vec<u8>>> {
        let profile = self.profile(license)?;

        let user_key = Zeroizing::new(profile.derive_user_key(passphrase).to_vec());
        let cipher = profile
            .content_key_cipher(&user_key)
            .map_err(|_| LcpError::UserPassphraseNotValid)?;
        let id = cipher
            .decrypt_base64(&license.crypto.user_key_check)
            .map_err(|_| LcpError::UserPassphraseNotValid)?;

        if !bool::from(id.ct_eq(license.id.as_bytes())) {
            return Err(LcpError::UserPassphraseNotValid);
        }
        Ok(user_key)
    }

    /// Unwrap the content key with the user key.
    pub fn decrypt_content_key(
        &self,
        user_key: &[u8],
        license: &LicenseDocument,
    ) -> LcpResult<Zeroizing<Vec<u8>>> {
        let profile = self.profile(license)?;
        let cipher = profile
            .content_key_cipher(user_key)
            .map_err(|_| LcpError::LicenseEncrypted)?;
        cipher
            .decrypt_base64(&license.crypto.content_key)
            .map(Zeroizing::new)
            .map_err(|_| LcpError::LicenseEncrypted)
    }

    /// Decrypt an arbitrary license-scoped ciphertext under the user key.
    pub fn decrypt_license_data(
        &self,
        data_base64: &str,
        license: &LicenseDocument,
        key_provider: &dyn KeyProvider,
    ) -> LcpResult<Vec<u8>> {
        let profile = self.profile(license)?;
        let cipher = profile
            .content_key_cipher(key_provider.user_key())
            .map_err(|_| LcpError::LicenseEncrypted)?;
        cipher
            .decrypt_base64(data_base64)
            .map_err(|_| LcpError::LicenseEncrypted)
    }

    /// Decrypt publication data into a caller-provided buffer.
    ///
    /// Returns the plaintext length actually written.
    pub fn decrypt_publication_data(
        &self,
        license: &LicenseDocument,
        key_provider: &dyn KeyProvider,
        data: &[u8],
        decrypted: &mut [u8],
    ) -> LcpResult<usize> {
        let profile = self.profile(license)?;
        let cipher = profile
            .publication_cipher(key_provider.content_key())
            .map_err(|_| LcpError::PublicationEncrypted)?;
        cipher
            .decrypt_into(data, decrypted)
            .map_err(|_| LcpError::PublicationEncrypted)
    }

    /// Wrap an encrypted publication resource for random-access reads.
    ///
    /// The returned stream owns the underlying reader; the consumer owns
    /// all subsequent reads.
    pub fn create_encrypted_publication_stream<R: ReadableStream>(
        &self,
        license: &LicenseDocument,
        key_provider: &dyn KeyProvider,
        stream: R,
    ) -> LcpResult<EncryptedStream<R>> {
        let profile = self.profile(license)?;
        let cipher = profile
            .publication_cipher(key_provider.content_key())
            .map_err(|_| LcpError::PublicationEncrypted)?;
        EncryptedStream::new(cipher, stream).map_err(|_| LcpError::PublicationEncrypted)
    }

    /// SHA-256 over an entire stream, read in 1 MiB chunks.
    pub fn calculate_file_hash<R: ReadableStream>(
        &self,
        stream: &mut R,
    ) -> LcpResult<[u8; HASH_SIZE]> {
        let size = stream
            .size()
            .map_err(|e| LcpError::CommonError(e.to_string()))?;

        let mut hasher = Sha256Hash::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let mut offset = 0u64;
        while offset < size {
            let want = usize::try_from((size - offset).min(READ_CHUNK_SIZE as u64))
                .map_err(|e| LcpError::CommonError(e.to_string()))?;
            let n = stream
                .read_at(offset, &mut buf[..want])
                .map_err(|e| LcpError::CommonError(e.to_string()))?;
            if n == 0 {
                return Err(LcpError::CommonError("stream ended early".to_string()));
            }
            hasher.update(&buf[..n]);
            offset += n as u64;
        }
        Ok(hasher.finalize())
    }

    /// Encode bytes as lowercase hex.
    pub fn convert_raw_to_hex(&self, data: &[u8]) -> String {
        raw_to_hex(data)
    }

    /// Decode hex (either case) into bytes.
    pub fn convert_hex_to_raw(&self, hex: &str) -> LcpResult<Vec<u8>> {
        hex_to_raw(hex)
    }
}

impl Drop for CryptoProvider {
    fn drop(&mut self) {
        self.crl_updater.cancel();
        self.timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::NetError;
    use std::io::Cursor;

    struct NoNet;

    impl NetProvider for NoNet {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, NetError> {
            Err(NetError::Transport("offline".to_string()))
        }
    }

    #[test]
    fn test_hex_conversions() {
        let provider = CryptoProvider::new(Arc::new(NoNet));
        assert_eq!(provider.convert_raw_to_hex(&[0x00, 0xff, 0x10]), "00ff10");
        assert_eq!(
            provider.convert_hex_to_raw("00FF10").unwrap(),
            vec![0, 255, 16]
        );
        assert!(matches!(
            provider.convert_hex_to_raw("abc"),
            Err(LcpError::CommonError(_))
        ));
    }

    #[test]
    fn test_file_hash_over_stream() {
        let provider = CryptoProvider::new(Arc::new(NoNet));
        let data: Vec<u8> = (0..2_000_000u32).map(|i| i as u8).collect();

        let mut stream = Cursor::new(data.clone());
        let hash = provider.calculate_file_hash(&mut stream).unwrap();

        assert_eq!(hash, lcp_core::hashing::sha256(&data));
    }

    #[test]
    fn test_drop_joins_cleanly_without_timer_start() {
        let provider = CryptoProvider::new(Arc::new(NoNet));
        drop(provider);
    }
}
