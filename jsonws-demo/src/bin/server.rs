use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use jsonws::{Router, Server, ServerConfig};
use jsonws_demo::{DemoImpl, DemoService, test_endpoint};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON server configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Plain HTTP port, overrides the configuration file.
    #[arg(long)]
    pub http_port: Option<u16>,

    /// HTTPS port, overrides the configuration file.
    #[arg(long)]
    pub https_port: Option<u16>,
}

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> jsonws::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => jsonws::load_config::<ServerConfig>(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = args.http_port {
        config.http_port = Some(port);
    }
    if let Some(port) = args.https_port {
        config.https_port = Some(port);
    }

    let mut router = Router::default();
    router.register("/json/test", test_endpoint);
    router.bind(Arc::new(DemoImpl).jsonws_descriptor())?;

    let server = Server::create(router, &config)?;
    let addrs = server.start().await?;
    tracing::info!(
        "Serving {} on {addrs:?}...",
        <DemoImpl as DemoService>::NAME
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => server.stop(),
        () = server.join() => {}
    }
    server.join().await;
    Ok(())
}
