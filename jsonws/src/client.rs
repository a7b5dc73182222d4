use std::{any::TypeId, sync::Arc};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    Request, StatusCode, Uri,
    header::{CONTENT_LENGTH, CONTENT_TYPE, HOST},
};
use hyper_util::rt::TokioIo;
use rustls_pki_types::ServerName;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    task::JoinHandle,
};
use tokio_rustls::TlsConnector;

use crate::{
    ClientConfig, Proxy, codec,
    error::{Error, ErrorKind, Result},
    tls,
};

/// Issues single request/response exchanges against absolute URLs.
///
/// Every call opens its own connection and releases it before returning.
/// Cloning is cheap.
///
/// ```rust,no_run
/// # use jsonws::{Client, ClientConfig};
/// # #[derive(serde::Serialize)] struct Request { name: String }
/// # #[derive(serde::Deserialize)] struct Response { ok: bool }
/// # #[tokio::main]
/// # async fn main() -> jsonws::Result<()> {
/// let client = Client::create(&ClientConfig::default())?;
/// let rsp: Response = client
///     .call("http://localhost:8080/json/test", &Request { name: "foobar2000".into() })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    tls: TlsConnector,
}

impl Client {
    /// # Errors
    ///
    /// Returns `InvalidTrustMaterial` if the configured trust store cannot be
    /// read or holds no usable certificate.
    pub fn create(config: &ClientConfig) -> Result<Self> {
        let tls = tls::client_config(config)?;
        Ok(Self {
            config: Arc::new(config.clone()),
            tls: TlsConnector::from(tls),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns a stand-in whose calls go to `base_url` + method name.
    #[must_use]
    pub fn proxy(&self, base_url: &str) -> Proxy {
        Proxy::new(self.clone(), base_url)
    }

    /// POSTs `req` to `url` and decodes the response as `Rsp`. Decoding is
    /// skipped when `Rsp` is `()`.
    ///
    /// # Errors
    ///
    /// - configuration errors for a malformed URL or a scheme other than
    ///   `http`/`https`, before any I/O;
    /// - transport errors when connecting, the handshake, or the exchange fails;
    /// - `BadStatus` for any status outside 2xx, checked after the body is read;
    /// - serialization errors for a body that cannot be decoded.
    pub async fn call<Req, Rsp>(&self, url: &str, req: &Req) -> Result<Rsp>
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned + 'static,
    {
        let target = Target::parse(url)?;
        let payload = codec::encode(req)?;
        tracing::debug!("call {url} with {} bytes", payload.len());

        let stream = self.connect(&target).await?;
        let (status, body) = if target.secure {
            let server_name = ServerName::try_from(target.host.clone())
                .map_err(|e| Error::new(ErrorKind::InvalidUrl, e.to_string()))?;
            let stream = self
                .tls
                .connect(server_name, stream)
                .await
                .map_err(|e| Error::new(ErrorKind::TlsHandshakeFailed, e.to_string()))?;
            self.exchange(stream, &target, payload).await?
        } else {
            self.exchange(stream, &target, payload).await?
        };

        let result = decode_body::<Rsp>(&body);
        if !status.is_success() {
            return Err(Error::new(
                ErrorKind::BadStatus(status.as_u16()),
                format!("response code was not 2xx but {status}"),
            ));
        }
        result
    }

    async fn connect(&self, target: &Target) -> Result<TcpStream> {
        let addr = (target.host.as_str(), target.port);
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::new(
                ErrorKind::ConnectFailed,
                format!("{}:{}: {e}", target.host, target.port),
            )),
            Err(_) => Err(Error::new(
                ErrorKind::Timeout,
                format!("connect to {}:{} timed out", target.host, target.port),
            )),
        }
    }

    async fn exchange<IO>(
        &self,
        io: IO,
        target: &Target,
        payload: Bytes,
    ) -> Result<(StatusCode, Bytes)>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, Full<Bytes>>(TokioIo::new(io))
                .await
                .map_err(|e| Error::new(ErrorKind::HttpHandshakeFailed, e.to_string()))?;
        let _conn = ConnectionGuard(tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("connection closed: {e}");
            }
        }));

        let req = Request::post(target.path_and_query.as_str())
            .header(HOST, target.authority.as_str())
            .header(CONTENT_TYPE, codec::CONTENT_TYPE)
            .header(CONTENT_LENGTH, payload.len())
            .body(Full::new(payload))
            .map_err(|e| Error::new(ErrorKind::InvalidUrl, e.to_string()))?;

        let round_trip = async {
            let rsp = sender
                .send_request(req)
                .await
                .map_err(|e| Error::new(ErrorKind::HttpSendReqFailed, e.to_string()))?;
            let status = rsp.status();
            let body = rsp
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::new(ErrorKind::HttpRecvRspFailed, e.to_string()))?
                .to_bytes();
            Ok::<_, Error>((status, body))
        };

        match self.config.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, round_trip).await.map_err(|_| {
                Error::new(ErrorKind::Timeout, format!("no response within {timeout:?}"))
            })?,
            None => round_trip.await,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish()
    }
}

fn decode_body<Rsp: DeserializeOwned + 'static>(body: &[u8]) -> Result<Rsp> {
    let json = codec::decompress(body)?;
    if TypeId::of::<Rsp>() == TypeId::of::<()>() {
        return serde_json::from_value(serde_json::Value::Null).map_err(Error::from);
    }
    serde_json::from_slice(&json).map_err(|e| {
        Error::new(
            ErrorKind::DeserializeFailed,
            format!("result was illegally formatted or could not be mapped: {e}"),
        )
    })
}

/// Aborts the connection task on every exit path.
struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Target {
    secure: bool,
    host: String,
    port: u16,
    authority: String,
    path_and_query: String,
}

impl Target {
    fn parse(url: &str) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::new(ErrorKind::InvalidUrl, format!("{url}: {e}")))?;
        let secure = match uri.scheme_str() {
            Some("http") => false,
            Some("https") => true,
            Some(scheme) => {
                return Err(Error::new(
                    ErrorKind::UnsupportedScheme,
                    format!("the URL's protocol is not supported: {scheme}"),
                ));
            }
            None => {
                return Err(Error::new(
                    ErrorKind::InvalidUrl,
                    format!("absolute URL required: {url}"),
                ));
            }
        };
        let (Some(host), Some(authority)) = (uri.host(), uri.authority()) else {
            return Err(Error::new(
                ErrorKind::InvalidUrl,
                format!("URL without host: {url}"),
            ));
        };

        Ok(Self {
            secure,
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: uri.port_u16().unwrap_or(if secure { 443 } else { 80 }),
            authority: authority.to_string(),
            path_and_query: uri
                .path_and_query()
                .map_or_else(|| "/".to_string(), ToString::to_string),
        })
    }
}
