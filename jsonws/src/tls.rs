use std::{path::Path, sync::Arc};

use rustls::{
    CertificateError, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
    crypto::CryptoProvider,
};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime, pem::PemObject};
use serde::{Deserialize, Serialize};

use crate::{
    ClientConfig, TlsConfig,
    error::{Error, ErrorKind, Result},
};

/// How the server's certificate is matched against the host being called.
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum HostnameVerification {
    /// The certificate must be valid for the host in the URL.
    #[default]
    Default,
    /// Any hostname is accepted as long as the certificate chain validates.
    AcceptAnyHostname,
}

/// Name fragments of cipher suites that are never offered.
pub const WEAK_CIPHER_MARKERS: [&str; 6] = ["DES", "RC4", "EXPORT", "NULL", "MD5", "anon"];

#[must_use]
pub fn is_weak_cipher_suite(name: &str) -> bool {
    WEAK_CIPHER_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
}

/// The ring provider without any weak cipher suite.
#[must_use]
pub fn crypto_provider() -> Arc<CryptoProvider> {
    let mut provider = rustls::crypto::ring::default_provider();
    provider
        .cipher_suites
        .retain(|suite| !is_weak_cipher_suite(&format!("{:?}", suite.suite())));
    Arc::new(provider)
}

pub(crate) fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::new(
            ErrorKind::InvalidTrustMaterial,
            format!("read {}: {e}", path.display()),
        )
    })?;
    parse_certificates(&bytes)
}

pub(crate) fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::new(ErrorKind::InvalidTrustMaterial, e.to_string()))?;
    if certs.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidTrustMaterial,
            "no certificate found".to_string(),
        ));
    }
    Ok(certs)
}

pub(crate) fn client_config(config: &ClientConfig) -> Result<Arc<rustls::ClientConfig>> {
    let roots = match &config.trust_store {
        Some(path) => {
            let mut roots = RootCertStore::empty();
            for cert in load_certificates(path)? {
                roots
                    .add(cert)
                    .map_err(|e| Error::new(ErrorKind::InvalidTrustMaterial, e.to_string()))?;
            }
            roots
        }
        None => RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        },
    };

    let provider = crypto_provider();
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::new(ErrorKind::InvalidConfig, e.to_string()))?;
    let tls = match config.hostname_verification {
        HostnameVerification::Default => builder.with_root_certificates(roots),
        HostnameVerification::AcceptAnyHostname => {
            let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .map_err(|e| Error::new(ErrorKind::InvalidTrustMaterial, e.to_string()))?;
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AnyHostnameVerifier { inner }))
        }
    }
    .with_no_client_auth();
    Ok(Arc::new(tls))
}

pub(crate) fn server_config(config: &TlsConfig) -> Result<Arc<rustls::ServerConfig>> {
    let certs = load_certificates(&config.cert_chain)
        .map_err(|e| Error::new(ErrorKind::InvalidKeyMaterial, e.msg))?;
    let key = PrivateKeyDer::from_pem_file(&config.private_key).map_err(|e| {
        Error::new(
            ErrorKind::InvalidKeyMaterial,
            format!("{}: {e}", config.private_key.display()),
        )
    })?;

    let tls = rustls::ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::new(ErrorKind::InvalidConfig, e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::new(ErrorKind::InvalidKeyMaterial, e.to_string()))?;
    Ok(Arc::new(tls))
}

/// Validates the chain like the default verifier but ignores the name.
#[derive(Debug)]
struct AnyHostnameVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for AnyHostnameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            result => result,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
