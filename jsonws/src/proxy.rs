use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Client, Empty,
    error::{Error, ErrorKind, Result},
};

/// Client-side stand-in for a remote service.
///
/// Every call is sent to `base_url` + the method's exposed name. Traits
/// declared with `#[jsonws::service]` are implemented for `Proxy`, so a
/// proxy can be used wherever the service trait is expected. Those stubs go
/// through [`invoke`](Self::invoke): a `null` argument is sent as [`Empty`].
#[derive(Clone, Debug)]
pub struct Proxy {
    client: Client,
    base_url: String,
}

impl Proxy {
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, method: &str) -> String {
        format!("{}{method}", self.base_url)
    }

    /// Calls `method` with the given arguments.
    ///
    /// No argument, or a single `null`, sends [`Empty`].
    ///
    /// # Errors
    ///
    /// Fails with `TooManyArguments` before any I/O when more than one
    /// argument is given. Otherwise see [`Client::call`].
    pub async fn invoke<Rsp>(&self, method: &str, args: Vec<serde_json::Value>) -> Result<Rsp>
    where
        Rsp: DeserializeOwned + 'static,
    {
        if args.len() > 1 {
            return Err(Error::new(
                ErrorKind::TooManyArguments,
                format!("{method} called with {} arguments, at most one allowed", args.len()),
            ));
        }
        match args.into_iter().next() {
            None | Some(serde_json::Value::Null) => self.call_empty(method).await,
            Some(arg) => self.call(method, &arg).await,
        }
    }

    /// # Errors
    pub async fn call<Req, Rsp>(&self, method: &str, req: &Req) -> Result<Rsp>
    where
        Req: Serialize + ?Sized,
        Rsp: DeserializeOwned + 'static,
    {
        self.client.call(&self.url(method), req).await
    }

    /// # Errors
    pub async fn call_empty<Rsp>(&self, method: &str) -> Result<Rsp>
    where
        Rsp: DeserializeOwned + 'static,
    {
        self.client.call(&self.url(method), &Empty {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientConfig, ErrorCategory};

    fn proxy() -> Proxy {
        let client = Client::create(&ClientConfig::default()).unwrap();
        client.proxy("http://127.0.0.1:9/json")
    }

    #[test]
    fn test_base_url() {
        let proxy = proxy();
        assert_eq!(proxy.base_url(), "http://127.0.0.1:9/json/");
        assert_eq!(proxy.url("remoteCallMe"), "http://127.0.0.1:9/json/remoteCallMe");

        let client = Client::create(&ClientConfig::default()).unwrap();
        let proxy = client.proxy("http://127.0.0.1:9/json/");
        assert_eq!(proxy.url("sth"), "http://127.0.0.1:9/json/sth");
    }

    #[tokio::test]
    async fn test_too_many_arguments() {
        let err = proxy()
            .invoke::<serde_json::Value>(
                "remoteCallMe",
                vec![serde_json::json!({"name": "a"}), serde_json::json!(1)],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TooManyArguments);
        assert_eq!(err.category(), ErrorCategory::Config);

        let err = proxy()
            .invoke::<()>("sth", vec![serde_json::Value::Null, serde_json::Value::Null])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TooManyArguments);
    }
}
