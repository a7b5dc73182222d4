#![forbid(unsafe_code)]

pub use jsonws_macro::service;

mod error;
pub use error::{Error, ErrorCategory, ErrorKind, Result};

pub mod codec;
pub use codec::{Empty, to_value};

mod router;
pub use router::{Dispatch, Handler, Route, Router};

mod service;
pub use service::ServiceDescriptor;

mod tls;
pub use tls::HostnameVerification;

mod config;
pub use config::{ClientConfig, ServerConfig, TlsConfig, load as load_config};

mod client;
pub use client::Client;

mod proxy;
pub use proxy::Proxy;

mod server;
pub use server::Server;
