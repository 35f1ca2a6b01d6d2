//! Callback signature verification.
//!
//! The gateway signs the exact callback URL it redirects to with RSA
//! PKCS#1 v1.5 over SHA-1 and appends the base64 signature as the final
//! `signature` parameter. Verification rebuilds that URL byte for byte, so
//! parameters must never be reordered or re-encoded before this runs.

use crate::config::GatewayConfig;
use crate::errors::{GatewayError, Result};
use crate::types::CallbackRequest;
use crate::utils::signed_payload;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha1::Sha1;
use std::path::Path;
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::Certificate;

const PEM_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
const PEM_RSA_PUBLIC_KEY: &str = "-----BEGIN RSA PUBLIC KEY-----";

/// Verifies callback signatures against the gateway's public key.
///
/// Key material is parsed once; the verifier can be shared for the life of
/// the process.
#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    key: RsaPublicKey,
}

impl SignatureVerifier {
    /// Creates a verifier from an RSA public key.
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Parses PEM key material.
    ///
    /// Accepts an X.509 `CERTIFICATE`, an SPKI `PUBLIC KEY` or a PKCS#1
    /// `RSA PUBLIC KEY`.
    pub fn from_pem(pem: &str) -> Result<Self> {
        if pem.contains(PEM_CERTIFICATE) {
            let cert = Certificate::from_pem(pem.trim().as_bytes())
                .map_err(|e| GatewayError::CertificateError(format!("invalid certificate: {}", e)))?;
            return Self::from_certificate(&cert);
        }

        let key = if pem.contains(PEM_RSA_PUBLIC_KEY) {
            RsaPublicKey::from_pkcs1_pem(pem.trim())
                .map_err(|e| GatewayError::CertificateError(format!("invalid RSA public key: {}", e)))?
        } else {
            RsaPublicKey::from_public_key_pem(pem.trim())
                .map_err(|e| GatewayError::CertificateError(format!("invalid public key: {}", e)))?
        };

        Ok(Self::new(key))
    }

    /// Parses a DER encoded X.509 certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(der)
            .map_err(|e| GatewayError::CertificateError(format!("invalid certificate: {}", e)))?;
        Self::from_certificate(&cert)
    }

    /// Loads key material from a PEM or DER file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;

        match std::str::from_utf8(&bytes) {
            Ok(text) if text.contains("-----BEGIN") => Self::from_pem(text),
            _ => Self::from_der(&bytes),
        }
    }

    /// Loads the certificate named by `cert_path`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::from_file(&config.cert_path)
    }

    fn from_certificate(cert: &Certificate) -> Result<Self> {
        let spki = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| GatewayError::CertificateError(format!("invalid key info: {}", e)))?;

        let key = RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| GatewayError::CertificateError(format!("not an RSA key: {}", e)))?;

        Ok(Self::new(key))
    }

    /// Verifies a base64 signature over `message`.
    ///
    /// Any failure, including an undecodable signature, is `InvalidSignature`.
    pub fn verify(&self, message: &[u8], signature: &str) -> Result<()> {
        // query decoding turns an unescaped '+' into a space
        let signature = signature.trim().replace(' ', "+");

        let bytes = BASE64
            .decode(signature.as_bytes())
            .map_err(|_| GatewayError::InvalidSignature)?;
        let signature =
            Signature::try_from(bytes.as_slice()).map_err(|_| GatewayError::InvalidSignature)?;

        VerifyingKey::<Sha1>::new(self.key.clone())
            .verify(message, &signature)
            .map_err(|_| GatewayError::InvalidSignature)
    }

    /// Verifies the `signature` parameter of a callback.
    pub fn check_signature(&self, request: &CallbackRequest) -> Result<()> {
        let signature = match request.param("signature") {
            Some(signature) if !signature.is_empty() => signature,
            _ => {
                tracing::warn!(ip = %request.client_ip, "Callback without signature");
                return Err(GatewayError::MissingSignature);
            }
        };

        let payload = signed_payload(&request.url);

        self.verify(&payload, signature).map_err(|err| {
            tracing::warn!(ip = %request.client_ip, "Callback signature rejected");
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::raw_url_encode;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::rand_core::OsRng;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;

    const CERT_PEM: &str = include_str!("../tests/fixtures/gateway.cer");
    const CERT_DER: &[u8] = include_bytes!("../tests/fixtures/gateway.der");
    const SIGNED: &str = include_str!("../tests/fixtures/check.signed.txt");
    const SIGNATURE: &str = include_str!("../tests/fixtures/check.sig");

    const CALLBACK_URL: &str = "https://merchant.example.ge/bog/check?merch_id=DEMO1&trx_id=8F1D2C&o.order_id=42&lang=KA&o.desc=Coffee%20beans";

    fn signed_request(signature: &str) -> CallbackRequest {
        let url = format!("{}&signature={}", CALLBACK_URL, raw_url_encode(signature.trim()));
        CallbackRequest::new("GET", url, "213.131.36.62").unwrap()
    }

    #[test]
    fn test_verify_fixture_with_pem_certificate() {
        let verifier = SignatureVerifier::from_pem(CERT_PEM).unwrap();
        assert!(verifier.verify(SIGNED.as_bytes(), SIGNATURE).is_ok());
    }

    #[test]
    fn test_verify_fixture_with_der_certificate() {
        let verifier = SignatureVerifier::from_der(CERT_DER).unwrap();
        assert!(verifier.verify(SIGNED.as_bytes(), SIGNATURE).is_ok());
    }

    #[test]
    fn test_check_signature_on_callback() {
        let verifier = SignatureVerifier::from_pem(CERT_PEM).unwrap();
        assert!(verifier.check_signature(&signed_request(SIGNATURE)).is_ok());
    }

    #[test]
    fn test_tampered_callback_is_rejected() {
        let verifier = SignatureVerifier::from_pem(CERT_PEM).unwrap();
        let url = format!(
            "{}&signature={}",
            CALLBACK_URL.replace("o.order_id=42", "o.order_id=43"),
            raw_url_encode(SIGNATURE.trim())
        );
        let request = CallbackRequest::new("GET", url, "213.131.36.62").unwrap();

        assert!(matches!(
            verifier.check_signature(&request),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn test_reordered_parameters_are_rejected() {
        let verifier = SignatureVerifier::from_pem(CERT_PEM).unwrap();
        let reordered = "https://merchant.example.ge/bog/check?trx_id=8F1D2C&merch_id=DEMO1&o.order_id=42&lang=KA&o.desc=Coffee beans";
        assert!(verifier.verify(reordered.as_bytes(), SIGNATURE).is_err());
    }

    #[test]
    fn test_missing_signature() {
        let verifier = SignatureVerifier::from_pem(CERT_PEM).unwrap();
        let request = CallbackRequest::new("GET", CALLBACK_URL, "213.131.36.62").unwrap();
        assert!(matches!(
            verifier.check_signature(&request),
            Err(GatewayError::MissingSignature)
        ));

        let empty = CallbackRequest::new("GET", format!("{}&signature=", CALLBACK_URL), "1.1.1.1").unwrap();
        assert!(matches!(
            verifier.check_signature(&empty),
            Err(GatewayError::MissingSignature)
        ));
    }

    #[test]
    fn test_garbage_signature_is_invalid() {
        let verifier = SignatureVerifier::from_pem(CERT_PEM).unwrap();
        assert!(matches!(
            verifier.check_signature(&signed_request("***not base64***")),
            Err(GatewayError::InvalidSignature)
        ));
        assert!(matches!(
            verifier.check_signature(&signed_request("AAAA")),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn test_unescaped_plus_in_signature_survives() {
        let verifier = SignatureVerifier::from_pem(CERT_PEM).unwrap();
        // gateway left '+' unescaped, so the query parser handed back spaces
        let url = format!("{}&signature={}", CALLBACK_URL, SIGNATURE.trim());
        let request = CallbackRequest::new("GET", url, "213.131.36.62").unwrap();
        assert!(verifier.check_signature(&request).is_ok());
    }

    #[test]
    fn test_public_key_pem_formats() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public_key = private_key.to_public_key();
        let message = b"https://h/cb?a=1&b=2";
        let signature = SigningKey::<Sha1>::new(private_key).sign(message).to_vec();
        let encoded = BASE64.encode(signature);

        let spki = public_key.to_public_key_pem(LineEnding::LF).unwrap();
        let pkcs1 = public_key.to_pkcs1_pem(LineEnding::LF).unwrap();

        for pem in [spki.as_str(), pkcs1.as_str()] {
            let verifier = SignatureVerifier::from_pem(pem).unwrap();
            assert!(verifier.verify(message, &encoded).is_ok());
            assert!(verifier.verify(b"https://h/cb?a=1&b=3", &encoded).is_err());
        }

        // fixture certificate holds a different key
        let other = SignatureVerifier::from_pem(CERT_PEM).unwrap();
        assert!(other.verify(message, &encoded).is_err());
    }

    #[test]
    fn test_bad_key_material() {
        assert!(matches!(
            SignatureVerifier::from_pem("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----"),
            Err(GatewayError::CertificateError(_))
        ));
        assert!(matches!(
            SignatureVerifier::from_der(b"not a certificate"),
            Err(GatewayError::CertificateError(_))
        ));
        assert!(matches!(
            SignatureVerifier::from_file("/nonexistent/bog.cer"),
            Err(GatewayError::IoError(_))
        ));
    }

    #[test]
    fn test_from_config_reads_cert_path() {
        let config = GatewayConfig::new("M1", "P1")
            .with_cert_path(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/gateway.cer"));
        let verifier = SignatureVerifier::from_config(&config).unwrap();
        assert!(verifier.verify(SIGNED.as_bytes(), SIGNATURE).is_ok());
    }
}
