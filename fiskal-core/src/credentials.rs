//! Loading of the signing certificate, private key and TLS trust anchor.
use crate::config::{CertIssuer, Config, Credentials, Environment};
use p12_keystore::KeyStore;
use pkcs8::EncryptedPrivateKeyInfo;
use pkcs8::der::pem;
use ring::signature::{KeyPair, RsaKeyPair};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use x509_cert::{
    Certificate,
    der::{Decode, Encode},
};

#[derive(Debug, Error)]
pub enum KeyLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid PEM data: {0}")]
    Pem(String),
    #[error("invalid certificate: {0}")]
    Certificate(String),
    #[error("private key is encrypted but no password was configured")]
    MissingPassword,
    #[error("cannot decrypt private key: {0}")]
    Decrypt(String),
    #[error("invalid private key: {0}")]
    Key(String),
    #[error("invalid PKCS#12 bundle: {0}")]
    Pkcs12(String),
    #[error("private key does not match the certificate's public key")]
    KeyMismatch,
    #[error("invalid trust anchor: {0}")]
    TrustAnchor(String),
}

/// Private key and certificate used to sign every message of one fiscalizer.
pub struct SigningIdentity {
    key_pair: RsaKeyPair,
    security_key: RsaPrivateKey,
    certificate: Certificate,
    certificate_der: Vec<u8>,
    serial: String,
    cert_issuer: CertIssuer,
}

impl SigningIdentity {
    /// Loads the PEM files or the PKCS#12 bundle named by `config`.
    pub fn from_config(config: &Config) -> Result<Self, KeyLoadError> {
        match config.credentials() {
            Credentials::Pem {
                certificate,
                private_key,
            } => Self::load(
                certificate,
                private_key,
                config.password(),
                config.environment(),
            ),
            Credentials::Pkcs12 { path } => Self::load_pkcs12(
                path,
                config.password().unwrap_or_default(),
                config.environment(),
            ),
        }
    }

    pub fn load(
        certificate_path: &Path,
        private_key_path: &Path,
        password: Option<&str>,
        environment: Environment,
    ) -> Result<Self, KeyLoadError> {
        let certificate_pem = read_file(certificate_path)?;
        let key_pem = read_file(private_key_path)?;
        debug!(
            certificate = %certificate_path.display(),
            key = %private_key_path.display(),
            environment = %environment,
            "loading signing identity"
        );
        Self::from_pem(&certificate_pem, &key_pem, password, environment)
    }

    /// Loads an application certificate issued by FINA as a `.p12`/`.pfx` file.
    pub fn load_pkcs12(
        path: &Path,
        password: &str,
        environment: Environment,
    ) -> Result<Self, KeyLoadError> {
        let bundle = std::fs::read(path).map_err(|source| KeyLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(bundle = %path.display(), environment = %environment, "loading signing identity");
        Self::from_pkcs12(&bundle, password, environment)
    }

    /// Uses the bundle's private key and the certificate in its chain that
    /// matches that key.
    pub fn from_pkcs12(
        bundle: &[u8],
        password: &str,
        environment: Environment,
    ) -> Result<Self, KeyLoadError> {
        let keystore = KeyStore::from_pkcs12(bundle, password)
            .map_err(|e| KeyLoadError::Pkcs12(e.to_string()))?;
        let (alias, chain) = keystore
            .private_key_chain()
            .ok_or_else(|| KeyLoadError::Pkcs12("bundle holds no private key".to_string()))?;
        debug!(alias, certificates = chain.chain().len(), "opened PKCS#12 bundle");

        let mut result = Err(KeyLoadError::Pkcs12("bundle holds no certificate".to_string()));
        for certificate in chain.chain() {
            result = Self::from_parts(certificate.as_der(), chain.key(), environment);
            if !matches!(result, Err(KeyLoadError::KeyMismatch)) {
                break;
            }
        }
        result
    }

    /// Accepts `PRIVATE KEY` (PKCS#8), `RSA PRIVATE KEY` (PKCS#1) and
    /// `ENCRYPTED PRIVATE KEY` (PKCS#8 decrypted with `password`).
    pub fn from_pem(
        certificate_pem: &str,
        private_key_pem: &str,
        password: Option<&str>,
        environment: Environment,
    ) -> Result<Self, KeyLoadError> {
        let (cert_label, certificate_der) = pem::decode_vec(certificate_pem.as_bytes())
            .map_err(|e| KeyLoadError::Pem(e.to_string()))?;
        if cert_label != "CERTIFICATE" {
            return Err(KeyLoadError::Pem(format!(
                "expected CERTIFICATE, found {cert_label}"
            )));
        }

        let (key_label, key_der) = pem::decode_vec(private_key_pem.as_bytes())
            .map_err(|e| KeyLoadError::Pem(e.to_string()))?;
        match key_label {
            "PRIVATE KEY" => Self::from_parts(&certificate_der, &key_der, environment),
            "RSA PRIVATE KEY" => {
                let pkcs8 = RsaPrivateKey::from_pkcs1_der(&key_der)
                    .map_err(|e| KeyLoadError::Key(e.to_string()))?
                    .to_pkcs8_der()
                    .map_err(|e| KeyLoadError::Key(e.to_string()))?;
                Self::from_parts(&certificate_der, pkcs8.as_bytes(), environment)
            }
            "ENCRYPTED PRIVATE KEY" => {
                let password = password.ok_or(KeyLoadError::MissingPassword)?;
                let encrypted = EncryptedPrivateKeyInfo::try_from(key_der.as_slice())
                    .map_err(|e| KeyLoadError::Decrypt(e.to_string()))?;
                let decrypted = encrypted
                    .decrypt(password)
                    .map_err(|e| KeyLoadError::Decrypt(e.to_string()))?;
                Self::from_parts(&certificate_der, decrypted.as_bytes(), environment)
            }
            other => Err(KeyLoadError::Pem(format!(
                "unsupported private key label {other}"
            ))),
        }
    }

    /// DER certificate plus PKCS#8 DER private key.
    pub fn from_der(
        certificate_der: &[u8],
        private_key_der: &[u8],
        environment: Environment,
    ) -> Result<Self, KeyLoadError> {
        Self::from_parts(certificate_der, private_key_der, environment)
    }

    fn from_parts(
        certificate_der: &[u8],
        private_key_pkcs8: &[u8],
        environment: Environment,
    ) -> Result<Self, KeyLoadError> {
        let key_pair = RsaKeyPair::from_pkcs8(private_key_pkcs8)
            .map_err(|e| KeyLoadError::Key(e.to_string()))?;
        let security_key = RsaPrivateKey::from_pkcs8_der(private_key_pkcs8)
            .map_err(|e| KeyLoadError::Key(e.to_string()))?;
        let certificate = Certificate::from_der(certificate_der)
            .map_err(|e| KeyLoadError::Certificate(e.to_string()))?;
        let certificate_public_key = certificate
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes();
        if certificate_public_key != key_pair.public_key().as_ref() {
            return Err(KeyLoadError::KeyMismatch);
        }
        let certificate_der = certificate
            .to_der()
            .map_err(|e| KeyLoadError::Certificate(e.to_string()))?;
        let serial =
            serial_bytes_to_decimal_string(certificate.tbs_certificate.serial_number.as_bytes());

        Ok(Self {
            key_pair,
            security_key,
            certificate,
            certificate_der,
            serial,
            cert_issuer: environment.cert_issuer(),
        })
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// Certificate serial number in decimal.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn cert_issuer(&self) -> CertIssuer {
        self.cert_issuer
    }

    pub(crate) fn key_pair(&self) -> &RsaKeyPair {
        &self.key_pair
    }

    /// Same key as [`key_pair`](Self::key_pair), for the SHA-1 signature behind the ZKI.
    pub(crate) fn security_key(&self) -> &RsaPrivateKey {
        &self.security_key
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("serial", &self.serial)
            .field("cert_issuer", &self.cert_issuer)
            .finish_non_exhaustive()
    }
}

/// Additional root certificate trusted when connecting to the service.
#[derive(Debug, Clone)]
pub struct TrustAnchor(reqwest::Certificate);

impl TrustAnchor {
    pub fn load(path: &Path) -> Result<Self, KeyLoadError> {
        let pem = read_file(path)?;
        Self::from_pem(&pem)
    }

    pub fn from_pem(pem: &str) -> Result<Self, KeyLoadError> {
        reqwest::Certificate::from_pem(pem.as_bytes())
            .map(Self)
            .map_err(|e| KeyLoadError::TrustAnchor(e.to_string()))
    }

    pub(crate) fn into_certificate(self) -> reqwest::Certificate {
        self.0
    }
}

fn read_file(path: &Path) -> Result<String, KeyLoadError> {
    std::fs::read_to_string(path).map_err(|source| KeyLoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn serial_bytes_to_decimal_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "0".to_string();
    }

    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while digits.len() > 1 && matches!(digits.last(), Some(0)) {
        digits.pop();
    }

    digits.iter().rev().map(|d| (b'0' + *d) as char).collect()
}
