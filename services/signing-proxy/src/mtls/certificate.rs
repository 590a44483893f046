//! Client identity loading for mutual TLS.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pkcs8::EncryptedPrivateKeyInfo;
use rustls::pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer,
};
use secrecy::{ExposeSecret, SecretString};
use x509_parser::prelude::{FromDer, X509Certificate};
use zeroize::Zeroizing;

use crate::error::SigningError;
use crate::logging::log_certificate_loaded;

const CERTIFICATE_TAG: &str = "CERTIFICATE";
const PKCS8_KEY_TAG: &str = "PRIVATE KEY";
const ENCRYPTED_KEY_TAG: &str = "ENCRYPTED PRIVATE KEY";
const RSA_KEY_TAG: &str = "RSA PRIVATE KEY";
const EC_KEY_TAG: &str = "EC PRIVATE KEY";

/// Format of the private key held by a [`ClientCertificate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFormat {
    Pkcs8,
    Pkcs1,
    Sec1,
}

impl KeyFormat {
    const fn pem_tag(self) -> &'static str {
        match self {
            Self::Pkcs8 => PKCS8_KEY_TAG,
            Self::Pkcs1 => RSA_KEY_TAG,
            Self::Sec1 => EC_KEY_TAG,
        }
    }
}

/// Client identity presented to the gateway. Immutable after load.
pub struct ClientCertificate {
    subject: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    chain: Vec<CertificateDer<'static>>,
    key_der: Zeroizing<Vec<u8>>,
    key_format: KeyFormat,
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("subject", &self.subject)
            .field("not_after", &self.not_after)
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

impl ClientCertificate {
    /// Distinguished name of the leaf certificate.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Start of the validity window.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Expiry of the leaf certificate.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Whether `now` falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Certificate chain, leaf first.
    #[must_use]
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Private key for rustls.
    #[must_use]
    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        let der = self.key_der.to_vec();
        match self.key_format {
            KeyFormat::Pkcs8 => PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der)),
            KeyFormat::Pkcs1 => PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(der)),
            KeyFormat::Sec1 => PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(der)),
        }
    }

    /// PEM encoding of the certificate chain.
    #[must_use]
    pub fn chain_pem(&self) -> String {
        let blocks: Vec<pem::Pem> = self
            .chain
            .iter()
            .map(|der| pem::Pem::new(CERTIFICATE_TAG, der.as_ref().to_vec()))
            .collect();
        pem::encode_many(&blocks)
    }

    /// PEM encoding of the (decrypted) private key.
    #[must_use]
    pub fn private_key_pem(&self) -> Zeroizing<String> {
        Zeroizing::new(pem::encode(&pem::Pem::new(
            self.key_format.pem_tag(),
            self.key_der.to_vec(),
        )))
    }

    /// Identity for tonic's TLS configuration.
    #[must_use]
    pub fn tonic_identity(&self) -> tonic::transport::Identity {
        let key = self.private_key_pem();
        tonic::transport::Identity::from_pem(self.chain_pem(), key.as_bytes())
    }
}

/// Resolves, reads and parses the client certificate bundle.
///
/// The bundle is a PEM file with the certificate chain (leaf first) and one
/// private key. An `ENCRYPTED PRIVATE KEY` block is decrypted with the
/// configured password.
#[derive(Debug, Clone)]
pub struct CertificateLoader {
    base_dir: PathBuf,
}

impl CertificateLoader {
    /// Creates a loader resolving relative paths against `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Base directory for relative paths.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves a configured path against the base directory.
    #[must_use]
    pub fn resolve(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Loads the certificate named by the `CERT_PATH`/`CERT_PASSWORD` settings.
    ///
    /// # Errors
    ///
    /// - `Configuration` when either setting is absent or empty
    /// - `CertificateNotFound` when the resolved file does not exist
    /// - `CertificateLoad` when the file cannot be read or parsed
    pub fn load(
        &self,
        cert_path: Option<&str>,
        password: Option<&SecretString>,
    ) -> Result<ClientCertificate, SigningError> {
        let cert_path = cert_path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| SigningError::missing_setting("CERT_PATH"))?;
        let password = password.ok_or_else(|| SigningError::missing_setting("CERT_PASSWORD"))?;

        let path = self.resolve(cert_path);
        if !path.is_file() {
            return Err(SigningError::CertificateNotFound { path });
        }

        let bytes = std::fs::read(&path).map_err(|e| SigningError::CertificateLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let certificate = parse_bundle(&bytes, password).map_err(|reason| {
            SigningError::CertificateLoad {
                path: path.clone(),
                reason,
            }
        })?;

        log_certificate_loaded(&certificate, &path);
        Ok(certificate)
    }
}

fn parse_bundle(bytes: &[u8], password: &SecretString) -> Result<ClientCertificate, String> {
    let blocks = pem::parse_many(bytes).map_err(|e| format!("invalid PEM: {e}"))?;

    let mut chain = Vec::new();
    let mut key: Option<(Zeroizing<Vec<u8>>, KeyFormat)> = None;

    for block in blocks {
        let tag = block.tag().to_string();
        let parsed = match tag.as_str() {
            CERTIFICATE_TAG => {
                chain.push(CertificateDer::from(block.into_contents()));
                continue;
            }
            ENCRYPTED_KEY_TAG => (decrypt_key(block.contents(), password)?, KeyFormat::Pkcs8),
            PKCS8_KEY_TAG => (Zeroizing::new(block.into_contents()), KeyFormat::Pkcs8),
            RSA_KEY_TAG => (Zeroizing::new(block.into_contents()), KeyFormat::Pkcs1),
            EC_KEY_TAG => (Zeroizing::new(block.into_contents()), KeyFormat::Sec1),
            _ => continue,
        };
        if key.replace(parsed).is_some() {
            return Err("bundle contains more than one private key".to_string());
        }
    }

    let (key_der, key_format) = key.ok_or("bundle contains no private key")?;
    let leaf = chain.first().ok_or("bundle contains no certificate")?;

    let (_, cert) =
        X509Certificate::from_der(leaf.as_ref()).map_err(|e| format!("invalid certificate: {e}"))?;
    let subject = cert.subject().to_string();
    let not_before = to_utc(cert.validity().not_before.timestamp())?;
    let not_after = to_utc(cert.validity().not_after.timestamp())?;

    Ok(ClientCertificate {
        subject,
        not_before,
        not_after,
        chain,
        key_der,
        key_format,
    })
}

fn decrypt_key(der: &[u8], password: &SecretString) -> Result<Zeroizing<Vec<u8>>, String> {
    let info = EncryptedPrivateKeyInfo::try_from(der)
        .map_err(|e| format!("invalid encrypted private key: {e}"))?;
    let document = info
        .decrypt(password.expose_secret().as_bytes())
        .map_err(|_| "private key could not be decrypted with the configured password".to_string())?;
    pkcs8::PrivateKeyInfo::try_from(document.as_bytes())
        .map_err(|_| "private key could not be decrypted with the configured password".to_string())?;
    Ok(Zeroizing::new(document.as_bytes().to_vec()))
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| format!("timestamp {timestamp} out of range"))
}
