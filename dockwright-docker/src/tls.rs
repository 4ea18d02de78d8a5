//! TLS client configuration built from certificate material.
//!
//! Material is accepted either inline (the PEM bytes themselves) or from a
//! certificate directory holding [`CA_FILE`], [`CERT_FILE`], and [`KEY_FILE`].

use std::path::Path;
use std::sync::Arc;

use rustls::ClientConfig;
use rustls::DigitallySignedStruct;
use rustls::RootCertStore;
use rustls::SignatureScheme;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::client::danger::ServerCertVerified;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::PrivateKeyDer;
use rustls::pki_types::ServerName;
use rustls::pki_types::UnixTime;
use rustls::pki_types::pem::PemObject as _;
use tracing::trace;
use tracing::warn;

use crate::Error;
use crate::Result;

/// The file name of the certificate authority within a certificate directory.
pub const CA_FILE: &str = "ca.pem";

/// The file name of the client certificate within a certificate directory.
pub const CERT_FILE: &str = "cert.pem";

/// The file name of the client key within a certificate directory.
pub const KEY_FILE: &str = "key.pem";

/// PEM-encoded certificate material.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Material {
    /// The certificate authority.
    pub ca: Vec<u8>,

    /// The client certificate.
    pub cert: Vec<u8>,

    /// The client key.
    pub key: Vec<u8>,
}

impl Material {
    /// Creates material from inline PEM strings.
    pub fn inline(ca: &str, cert: &str, key: &str) -> Self {
        Self {
            ca: ca.as_bytes().to_vec(),
            cert: cert.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
        }
    }

    /// Reads the material stored within a certificate directory.
    ///
    /// Every file must exist. The certificate authority must hold at least
    /// one certificate, so material read from a directory always verifies
    /// the server.
    pub fn read_directory(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        trace!("reading certificate material from `{}`", path.display());

        let read = |name: &str| {
            let path = path.join(name);
            std::fs::read(&path).map_err(|source| Error::Read { path, source })
        };

        let material = Self {
            ca: read(CA_FILE)?,
            cert: read(CERT_FILE)?,
            key: read(KEY_FILE)?,
        };

        if material.ca.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::RootCertificate);
        }

        Ok(material)
    }

    /// Builds a TLS client configuration from the material.
    ///
    /// * When both the certificate and the key are present, they are loaded
    ///   as the client identity.
    /// * When the certificate authority is empty, the server's certificate is
    ///   **not** verified.
    /// * Otherwise, the server must present a certificate issued by the
    ///   certificate authority.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let builder = if self.ca.is_empty() {
            warn!("no certificate authority provided: server certificates will not be verified");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
        } else {
            builder.with_root_certificates(root_store(&self.ca)?)
        };

        if self.cert.is_empty() || self.key.is_empty() {
            return Ok(builder.with_no_client_auth());
        }

        let chain = certificates(&self.cert)?;
        let key = PrivateKeyDer::from_pem_slice(&self.key).map_err(|e| Error::Material {
            what: "key",
            reason: e.to_string(),
        })?;

        Ok(builder.with_client_auth_cert(chain, key)?)
    }
}

/// Parses every certificate within a PEM bundle.
fn certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let chain = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Material {
            what: "certificate",
            reason: e.to_string(),
        })?;

    if chain.is_empty() {
        return Err(Error::Material {
            what: "certificate",
            reason: String::from("no certificate found in PEM data"),
        });
    }

    Ok(chain)
}

/// Parses the certificate authority bundle into a root store.
fn root_store(pem: &[u8]) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();

    for cert in CertificateDer::pem_slice_iter(pem) {
        let cert = cert.map_err(|_| Error::RootCertificate)?;
        store.add(cert).map_err(|_| Error::RootCertificate)?;
    }

    if store.is_empty() {
        return Err(Error::RootCertificate);
    }

    Ok(store)
}

/// Accepts any server certificate.
///
/// Handshake signatures are still checked so that the peer proves possession
/// of the key behind the certificate it presents.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
