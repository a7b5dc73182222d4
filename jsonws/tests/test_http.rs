#![forbid(unsafe_code)]

use std::{net::SocketAddr, str::FromStr, time::Duration};

use http_body_util::Full;
use hyper::{Request, Response, StatusCode, body::Incoming};
use hyper_util::rt::{TokioIo, TokioTimer};
use jsonws::{Client, ClientConfig, ErrorCategory, ErrorKind, Router, Server, ServerConfig, codec};

async fn start_echo_server() -> (Server, SocketAddr) {
    let mut router = Router::default();
    router.register("/json/echo", |req: serde_json::Value| async move { req });

    let server = Server::create(router, &ServerConfig::default()).unwrap();
    let addr = SocketAddr::from_str("127.0.0.1:0").unwrap();
    let addr = server.listen(addr).await.unwrap();
    (server, addr)
}

#[tokio::test]
async fn test_echo_headers() {
    let (server, addr) = start_echo_server().await;

    let body = codec::encode(&serde_json::json!({"name": "foobar2000"})).unwrap();
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/json/echo"))
        .header("content-type", "application/json")
        .body(body.to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        codec::CONTENT_TYPE
    );
    let bytes = response.bytes().await.unwrap();
    let value: serde_json::Value = codec::decode(&bytes).unwrap();
    assert_eq!(value, serde_json::json!({"name": "foobar2000"}));

    server.stop();
    server.join().await;
}

#[tokio::test]
async fn test_unhandled_requests() {
    let (server, addr) = start_echo_server().await;
    let body = codec::encode(&serde_json::json!({})).unwrap();
    let client = reqwest::Client::new();

    // Wrong method.
    let response = client
        .get(format!("http://{addr}/json/echo"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Unregistered path.
    let response = client
        .post(format!("http://{addr}/json/missing"))
        .header("content-type", codec::CONTENT_TYPE)
        .body(body.to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Not a JSON content type.
    let response = client
        .post(format!("http://{addr}/json/echo"))
        .header("content-type", "text/plain")
        .body(body.to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // The javascript content type is accepted as JSON.
    let response = client
        .post(format!("http://{addr}/json/echo"))
        .header("content-type", "application/javascript")
        .body(body.to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    server.stop();
    server.join().await;
}

#[tokio::test]
async fn test_garbage_body_is_dropped() {
    let (server, addr) = start_echo_server().await;

    let client = reqwest::Client::new();
    let result = client
        .post(format!("http://{addr}/json/echo"))
        .header("content-type", codec::CONTENT_TYPE)
        .body(b"definitely not gzip".to_vec())
        .send()
        .await;
    assert!(result.is_err());

    // The server keeps serving other connections.
    let rsp: serde_json::Value = Client::create(&ClientConfig::default())
        .unwrap()
        .call(&format!("http://{addr}/json/echo"), &serde_json::json!([1, 2]))
        .await
        .unwrap();
    assert_eq!(rsp, serde_json::json!([1, 2]));

    server.stop();
    server.join().await;
}

/// Serves every request with `status` and a well-formed gzip JSON body.
async fn start_fixed_status_server(status: StatusCode) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let service = hyper::service::service_fn(move |_: Request<Incoming>| async move {
                    let body = codec::encode(&serde_json::json!({"ok": true})).unwrap();
                    let mut rsp = Response::new(Full::new(body));
                    *rsp.status_mut() = status;
                    Ok::<_, std::convert::Infallible>(rsp)
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .timer(TokioTimer::new())
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });
    addr
}

#[tokio::test]
async fn test_bad_status_wins_over_body() {
    let addr = start_fixed_status_server(StatusCode::INTERNAL_SERVER_ERROR).await;

    let client = Client::create(&ClientConfig::default()).unwrap();
    let err = client
        .call::<_, serde_json::Value>(&format!("http://{addr}/json/test"), &serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::BadStatus(500));
    assert_eq!(err.category(), ErrorCategory::Protocol);

    let addr = start_fixed_status_server(StatusCode::CREATED).await;
    let rsp: serde_json::Value = client
        .call(&format!("http://{addr}/json/test"), &serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(rsp, serde_json::json!({"ok": true}));
}

#[tokio::test]
async fn test_read_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let holder = tokio::spawn(async move {
        let mut streams = vec![];
        while let Ok((stream, _)) = listener.accept().await {
            streams.push(stream);
        }
    });

    let config = ClientConfig {
        read_timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let client = Client::create(&config).unwrap();
    let err = client
        .call::<_, serde_json::Value>(&format!("http://{addr}/json/test"), &serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.category(), ErrorCategory::Transport);

    holder.abort();
}
