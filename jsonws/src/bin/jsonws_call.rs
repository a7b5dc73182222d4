use std::path::PathBuf;

use clap::Parser;
use jsonws::{Client, ClientConfig, Error, ErrorKind, HostnameVerification};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Endpoint URL, e.g. http://127.0.0.1:8080/json/test.
    pub url: String,

    /// JSON request body. Sent as `{}` when absent.
    #[arg(default_value = "{}")]
    pub body: String,

    /// JSON client configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// PEM bundle of trusted certificates.
    #[arg(long)]
    pub trust_store: Option<PathBuf>,

    /// Accept server certificates issued for any host name.
    #[arg(long, default_value_t = false)]
    pub accept_any_hostname: bool,
}

async fn run(args: &Args) -> jsonws::Result<serde_json::Value> {
    let mut config = match &args.config {
        Some(path) => jsonws::load_config::<ClientConfig>(path)?,
        None => ClientConfig::default(),
    };
    if args.trust_store.is_some() {
        config.trust_store.clone_from(&args.trust_store);
    }
    if args.accept_any_hostname {
        config.hostname_verification = HostnameVerification::AcceptAnyHostname;
    }

    let body: serde_json::Value = serde_json::from_str(&args.body)
        .map_err(|e| Error::new(ErrorKind::InvalidConfig, format!("request body: {e}")))?;

    let client = Client::create(&config)?;
    client.call(&args.url, &body).await
}

#[tokio::main]
async fn main() -> jsonws::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args = Args::parse();
    let rsp = run(&args).await?;
    let text = serde_json::to_string_pretty(&rsp)
        .map_err(|e| Error::new(ErrorKind::SerializeFailed, e.to_string()))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str, body: &str) -> Args {
        Args::parse_from(["jsonws-call", url, body])
    }

    #[tokio::test]
    async fn test_failures_are_errors() {
        let err = run(&args("http://127.0.0.1:9/json/test", "{not json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);

        let err = run(&args("ftp://127.0.0.1:9/json/test", "{}"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedScheme);

        let mut args = args("http://127.0.0.1:9/json/test", "{}");
        args.config = Some("/nonexistent/jsonws.json".into());
        let err = run(&args).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn test_call_roundtrip() {
        let mut router = jsonws::Router::default();
        router.register("/json/echo", |req: serde_json::Value| async move { req });
        let server = jsonws::Server::create(router, &jsonws::ServerConfig::default()).unwrap();
        let addr = server.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let rsp = run(&args(&format!("http://{addr}/json/echo"), r#"{"name":"foobar2000"}"#))
            .await
            .unwrap();
        assert_eq!(rsp, serde_json::json!({"name": "foobar2000"}));

        server.stop();
        server.join().await;
    }
}
