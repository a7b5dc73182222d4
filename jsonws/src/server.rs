use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{
    Request, Response, StatusCode,
    body::Incoming,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    server::conn::http1::Builder,
};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    Dispatch, Router, ServerConfig, codec,
    error::{Error, ErrorKind, Result},
    tls,
};

/// HTTP host for a [`Router`].
///
/// The server owns the router, so no route can be added once it exists.
/// Requests the router does not handle are answered with 404. Requests it
/// drops get no response at all: the connection is closed instead.
///
/// # Examples
///
/// ```rust,no_run
/// # use jsonws::{Router, Server, ServerConfig};
/// # use std::{net::SocketAddr, str::FromStr};
/// # #[tokio::main]
/// # async fn main() {
/// let mut router = Router::default();
/// router.register("/json/echo", |req: String| async move { req });
///
/// let server = Server::create(router, &ServerConfig::default()).unwrap();
/// let addr = SocketAddr::from_str("127.0.0.1:8000").unwrap();
/// server.listen(addr).await.unwrap();
/// server.join().await;
/// # }
/// ```
pub struct Server {
    router: Arc<Router>,
    config: ServerConfig,
    tls: Option<TlsAcceptor>,
    http: Builder,
    tracker: TaskTracker,
    stop: CancellationToken,
}

impl Server {
    /// # Errors
    ///
    /// Returns `InvalidKeyMaterial` if TLS is configured and the certificate
    /// chain or private key cannot be loaded.
    pub fn create(router: Router, config: &ServerConfig) -> Result<Self> {
        let tls = match &config.tls {
            Some(tls_config) => Some(TlsAcceptor::from(tls::server_config(tls_config)?)),
            None => None,
        };

        let mut http = Builder::new();
        http.keep_alive(true).timer(TokioTimer::new());
        if let Some(timeout) = config.header_read_timeout {
            http.header_read_timeout(timeout);
        }

        Ok(Self {
            router: Arc::new(router),
            config: config.clone(),
            tls,
            http,
            tracker: TaskTracker::new(),
            stop: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Opens the configured HTTP and HTTPS ports.
    ///
    /// An HTTPS port without TLS material is skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `TcpBindFailed` if a port cannot be bound.
    pub async fn start(&self) -> Result<Vec<SocketAddr>> {
        tracing::info!("starting webservice");
        let mut addrs = vec![];
        if let Some(port) = self.config.http_port {
            let addr = self.listen(SocketAddr::new(self.config.host, port)).await?;
            tracing::info!("opened {addr} for http connections");
            addrs.push(addr);
        }
        if let Some(port) = self.config.https_port {
            if self.tls.is_some() {
                let addr = self
                    .listen_tls(SocketAddr::new(self.config.host, port))
                    .await?;
                tracing::info!("opened {addr} for https connections");
                addrs.push(addr);
            } else {
                tracing::warn!(
                    "https port {port} is set, but no certificate chain and key are configured"
                );
            }
        }
        tracing::info!("server running");
        Ok(addrs)
    }

    /// Accepts plain HTTP connections on `addr`.
    ///
    /// # Returns
    ///
    /// The bound address, which differs from `addr` when port 0 was given.
    ///
    /// # Errors
    pub async fn listen(&self, addr: SocketAddr) -> Result<SocketAddr> {
        self.start_listen(addr, None).await
    }

    /// Accepts HTTPS connections on `addr`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the server was created without TLS.
    pub async fn listen_tls(&self, addr: SocketAddr) -> Result<SocketAddr> {
        let Some(tls) = self.tls.clone() else {
            return Err(Error::new(
                ErrorKind::InvalidConfig,
                "no TLS material configured".to_string(),
            ));
        };
        self.start_listen(addr, Some(tls)).await
    }

    async fn start_listen(
        &self,
        addr: SocketAddr,
        tls: Option<TlsAcceptor>,
    ) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::new(ErrorKind::TcpBindFailed, e.to_string()))?;
        let listener_addr = listener
            .local_addr()
            .map_err(|e| Error::new(ErrorKind::TcpBindFailed, e.to_string()))?;

        let router = self.router.clone();
        let http = self.http.clone();
        let tracker = self.tracker.clone();
        let stop = self.stop.clone();
        self.tracker.spawn(async move {
            tracing::info!("start listening: {listener_addr}");
            loop {
                let (stream, peer) = tokio::select! {
                    () = stop.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::error!("accept on {listener_addr} failed: {e}");
                            continue;
                        }
                    },
                };

                let router = router.clone();
                let http = http.clone();
                let stop = stop.clone();
                let tls = tls.clone();
                tracker.spawn(async move {
                    match tls {
                        Some(tls) => match tls.accept(stream).await {
                            Ok(stream) => serve_connection(&http, stream, router, peer, &stop).await,
                            Err(e) => {
                                let err = Error::new(ErrorKind::TlsAcceptFailed, e.to_string());
                                tracing::warn!("tls handshake with {peer} failed: {err}");
                            }
                        },
                        None => serve_connection(&http, stream, router, peer, &stop).await,
                    }
                });
            }
            tracing::info!("stop accept loop on {listener_addr}");
        });

        Ok(listener_addr)
    }

    /// Stops accepting connections and closes open ones. Call
    /// [`join`](Self::join) to wait until everything has stopped.
    pub fn stop(&self) {
        tracing::info!("shutting down webservice");
        self.stop.cancel();
        self.tracker.close();
    }

    pub async fn join(&self) {
        self.tracker.wait().await;
        tracing::info!("server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("router", &self.router)
            .field("config", &self.config)
            .finish()
    }
}

async fn serve_connection<IO>(
    http: &Builder,
    io: IO,
    router: Arc<Router>,
    peer: SocketAddr,
    stop: &CancellationToken,
) where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let connection = http.serve_connection(
        TokioIo::new(io),
        hyper::service::service_fn(move |req: Request<Incoming>| {
            handle_request(router.clone(), req)
        }),
    );
    tokio::select! {
        () = stop.cancelled() => {},
        r = connection => {
            if let Err(e) = r {
                tracing::debug!("connection with {peer} closed: {e}");
            }
        }
    }
}

async fn handle_request(
    router: Arc<Router>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if router.route(&method, &path, content_type.as_deref()).is_none() {
        return Ok(not_found());
    }

    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| Error::new(ErrorKind::HttpRecvReqFailed, e.to_string()))?
        .to_bytes();

    match router
        .dispatch(&method, &path, content_type.as_deref(), &body)
        .await
    {
        Dispatch::Handled(payload) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, codec::CONTENT_TYPE)
            .header(CONTENT_LENGTH, payload.len())
            .body(Full::new(payload))
            .unwrap_or_else(|_| not_found())),
        Dispatch::Unhandled => Ok(not_found()),
        // Returning the error makes hyper close the connection unanswered.
        Dispatch::Dropped(err) => Err(err),
    }
}

fn not_found() -> Response<Full<Bytes>> {
    let mut rsp = Response::new(Full::new(Bytes::from_static(b"Not Found")));
    *rsp.status_mut() = StatusCode::NOT_FOUND;
    rsp
}
