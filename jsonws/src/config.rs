use std::{
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_inline_default::serde_inline_default;

use crate::{
    HostnameVerification,
    error::{Error, ErrorKind, Result},
};

#[serde_inline_default]
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct ClientConfig {
    /// Bounds the TCP connect, nothing else.
    #[serde_inline_default(Duration::from_secs(5))]
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Bounds sending the request and reading the whole response. `None`
    /// waits for an unresponsive peer forever.
    #[serde_inline_default(None)]
    #[serde(with = "humantime_serde")]
    pub read_timeout: Option<Duration>,
    /// PEM bundle of the certificates trusted for `https` calls. The bundled
    /// web PKI roots are used when absent.
    #[serde_inline_default(None)]
    pub trust_store: Option<PathBuf>,
    #[serde_inline_default(HostnameVerification::Default)]
    pub hostname_verification: HostnameVerification,
}

impl Default for ClientConfig {
    fn default() -> Self {
        empty_object()
    }
}

/// PEM certificate chain and private key for the HTTPS port.
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct TlsConfig {
    pub cert_chain: PathBuf,
    pub private_key: PathBuf,
}

#[serde_inline_default]
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub struct ServerConfig {
    #[serde_inline_default(IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,
    /// Plain HTTP port, `None` to disable.
    #[serde_inline_default(Some(8080))]
    pub http_port: Option<u16>,
    /// HTTPS port. Only opened together with `tls`.
    #[serde_inline_default(None)]
    pub https_port: Option<u16>,
    #[serde_inline_default(None)]
    pub tls: Option<TlsConfig>,
    #[serde_inline_default(Some(Duration::from_secs(30)))]
    #[serde(with = "humantime_serde")]
    pub header_read_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        empty_object()
    }
}

fn empty_object<T: DeserializeOwned>() -> T {
    serde_json::from_value(serde_json::Value::Object(serde_json::Map::default()))
        .expect("every field has a default")
}

/// Reads a JSON configuration file. Missing fields take their defaults.
///
/// # Errors
///
/// Returns `InvalidConfig` if the file cannot be read or parsed.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("read {}: {e}", path.display()),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("parse {}: {e}", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.trust_store, None);
        assert_eq!(config.hostname_verification, HostnameVerification::Default);

        let config = ServerConfig::default();
        assert_eq!(config.http_port, Some(8080));
        assert_eq!(config.https_port, None);
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_load_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
                "read_timeout": "1m 30s",
                "hostname_verification": "accept_any_hostname"
            }"#,
        )
        .unwrap();
        let config: ClientConfig = load(file.path()).unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(90)));
        assert_eq!(
            config.hostname_verification,
            HostnameVerification::AcceptAnyHostname
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"http_port": null, "https_port": 8443}"#)
            .unwrap();
        let config: ServerConfig = load(file.path()).unwrap();
        assert_eq!(config.http_port, None);
        assert_eq!(config.https_port, Some(8443));

        let err = load::<ServerConfig>(Path::new("/nonexistent/jsonws.json")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
    }
}
