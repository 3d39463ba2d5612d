//! Trust context for the backend connection.
//!
//! The bridge authenticates to Redis with a client certificate and only
//! trusts the CA bundle it is given. All material is loaded and checked
//! once at startup; any problem is fatal.
//!
//! ```text
//! TlsPaths ──load──▶ TrustContext ──redis_certificates──▶ redis::TlsCertificates
//!                        │
//!                        └──client_config──▶ rustls::ClientConfig (validation)
//! ```

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors raised while building the trust context.
#[derive(Error, Debug)]
pub enum TlsError {
    #[error("failed to read {kind} from {path}: {source}")]
    Read {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no PEM certificate found in {0}")]
    NoCertificates(PathBuf),

    #[error("invalid PEM data in {path}: {reason}")]
    InvalidPem { path: PathBuf, reason: String },

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("CA bundle {path} rejected: {reason}")]
    InvalidTrustAnchor { path: PathBuf, reason: String },

    #[error("client certificate and key rejected: {0}")]
    InvalidClientAuth(String),
}

/// TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVersion {
    /// TLS 1.2
    #[default]
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    fn protocol_versions(self) -> &'static [&'static rustls::SupportedProtocolVersion] {
        static FROM_TLS12: &[&rustls::SupportedProtocolVersion] =
            &[&rustls::version::TLS13, &rustls::version::TLS12];
        static FROM_TLS13: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];

        match self {
            TlsVersion::Tls12 => FROM_TLS12,
            TlsVersion::Tls13 => FROM_TLS13,
        }
    }
}

/// Locations of the TLS material on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    /// Client certificate chain (PEM).
    pub cert_path: PathBuf,
    /// Client private key (PEM).
    pub key_path: PathBuf,
    /// CA bundle used as the only trust anchors (PEM).
    pub ca_path: PathBuf,
}

/// Client certificate, key and trust anchors for the backend connection.
///
/// Immutable once built.
pub struct TrustContext {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    ca_pem: Vec<u8>,
    anchor_count: usize,
    min_version: TlsVersion,
}

impl fmt::Debug for TrustContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustContext")
            .field("anchor_count", &self.anchor_count)
            .field("min_version", &self.min_version)
            .finish_non_exhaustive()
    }
}

impl TrustContext {
    /// Load and validate the trust context with a TLS 1.2 minimum.
    pub fn load(paths: &TlsPaths) -> Result<Self, TlsError> {
        Self::load_with_min_version(paths, TlsVersion::Tls12)
    }

    /// Load and validate the trust context.
    ///
    /// Fails if any file is missing or unreadable, if the certificate or CA
    /// files hold no certificates, if the key file holds no key, or if rustls
    /// refuses the resulting client configuration.
    pub fn load_with_min_version(
        paths: &TlsPaths,
        min_version: TlsVersion,
    ) -> Result<Self, TlsError> {
        let cert_pem = read_file("client certificate", &paths.cert_path)?;
        let key_pem = read_file("client private key", &paths.key_path)?;
        let ca_pem = read_file("CA bundle", &paths.ca_path)?;

        let certs = parse_certs(&cert_pem, &paths.cert_path)?;
        let key = parse_key(&key_pem, &paths.key_path)?;
        let anchors = parse_certs(&ca_pem, &paths.ca_path)?;
        let roots = root_store(anchors, &paths.ca_path)?;
        let anchor_count = roots.len();

        build_client_config(roots, certs, key, min_version)?;

        info!(
            cert = %paths.cert_path.display(),
            ca = %paths.ca_path.display(),
            anchors = anchor_count,
            min_version = ?min_version,
            "Loaded backend trust context"
        );

        Ok(Self {
            cert_pem,
            key_pem,
            ca_pem,
            anchor_count,
            min_version,
        })
    }

    /// Number of trust anchors loaded from the CA bundle.
    pub fn anchor_count(&self) -> usize {
        self.anchor_count
    }

    /// Minimum protocol version enforced by this context.
    pub fn min_version(&self) -> TlsVersion {
        self.min_version
    }

    /// Build a rustls client configuration trusting only the CA bundle.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, TlsError> {
        // Paths are only used for error messages; the material was read at load time.
        let origin = Path::new("<trust context>");
        let certs = parse_certs(&self.cert_pem, origin)?;
        let key = parse_key(&self.key_pem, origin)?;
        let roots = root_store(parse_certs(&self.ca_pem, origin)?, origin)?;
        build_client_config(roots, certs, key, self.min_version).map(Arc::new)
    }

    /// Material in the shape the Redis client expects.
    pub fn redis_certificates(&self) -> redis::TlsCertificates {
        redis::TlsCertificates {
            client_tls: Some(redis::ClientTlsConfig {
                client_cert: self.cert_pem.clone(),
                client_key: self.key_pem.clone(),
            }),
            root_cert: Some(self.ca_pem.clone()),
        }
    }
}

fn read_file(kind: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certs(pem: &[u8], path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::InvalidPem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn parse_key(pem: &[u8], path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    PrivateKeyDer::from_pem_slice(pem).map_err(|e| match e {
        rustls::pki_types::pem::Error::NoItemsFound => TlsError::NoPrivateKey(path.to_path_buf()),
        other => TlsError::InvalidPem {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })
}

fn root_store(anchors: Vec<CertificateDer<'static>>, path: &Path) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();
    for anchor in anchors {
        roots.add(anchor).map_err(|e| TlsError::InvalidTrustAnchor {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(roots)
}

fn build_client_config(
    roots: RootCertStore,
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    min_version: TlsVersion,
) -> Result<ClientConfig, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(min_version.protocol_versions())
        .map_err(|e| TlsError::InvalidClientAuth(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| TlsError::InvalidClientAuth(e.to_string()))
}
