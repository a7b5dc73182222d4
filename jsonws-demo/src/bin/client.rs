use std::path::PathBuf;

use clap::Parser;
use jsonws::{Client, ClientConfig};
use jsonws_demo::{DemoService, Payload, SimpleRequest, SimpleResponse};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server base URL.
    #[arg(default_value = "http://127.0.0.1:8080")]
    pub url: String,

    /// Request name.
    #[arg(short, long, default_value = "foobar2000")]
    pub name: String,

    /// Payload info.
    #[arg(short, long, default_value = "hallo")]
    pub info: String,

    /// JSON client configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> jsonws::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => jsonws::load_config::<ClientConfig>(path)?,
        None => ClientConfig::default(),
    };
    let client = Client::create(&config)?;
    let url = args.url.trim_end_matches('/');

    let req = SimpleRequest {
        name: args.name.clone(),
        payload: vec![Payload {
            info: args.info.clone(),
        }],
    };
    let rsp: SimpleResponse = client.call(&format!("{url}/json/test"), &req).await?;
    tracing::info!("test rsp: {rsp:?}");

    let proxy = client.proxy(&format!("{url}/json"));
    let rsp = proxy.remote_call_me(&req).await?;
    tracing::info!("remoteCallMe rsp: {rsp:?}");

    proxy.sth().await?;
    proxy.sth_else(&req).await?;
    tracing::info!("sth and sthElse done");
    Ok(())
}
