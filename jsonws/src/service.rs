use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Route,
    error::{Error, ErrorKind, Result},
};

/// The endpoints one service object exposes, keyed by exposed method name.
///
/// Usually produced by the `jsonws_descriptor` method that `#[service]`
/// generates, and handed to [`Router::bind`](crate::Router::bind).
///
/// ```rust
/// # use jsonws::{Empty, Router, ServiceDescriptor};
/// let descriptor = ServiceDescriptor::new(Some("/json"))
///     .method("ping", |_: Empty| async { Ok("pong".to_string()) });
///
/// let mut router = Router::default();
/// router.bind(descriptor).unwrap();
/// assert!(router.contains("/json/ping"));
/// ```
#[derive(Debug)]
pub struct ServiceDescriptor {
    base_path: Option<String>,
    methods: Vec<(String, Route)>,
}

impl ServiceDescriptor {
    #[must_use]
    pub fn new(base_path: Option<&str>) -> Self {
        Self {
            base_path: base_path.map(str::to_owned),
            methods: Vec::new(),
        }
    }

    /// Adds a method taking `Req`. Zero-parameter methods take
    /// [`Empty`](crate::Empty).
    ///
    /// An `Err` from the method is logged and answered with JSON `null`.
    #[must_use]
    pub fn method<Req, Rsp, F, Fut>(mut self, name: impl Into<String>, method: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Rsp: Serialize + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Rsp>> + Send + 'static,
    {
        let name = name.into();
        let method_name = name.clone();
        let route = Route::new(move |req: Req| {
            let result = method(req);
            let method_name = method_name.clone();
            async move {
                match result.await {
                    Ok(rsp) => Some(rsp),
                    Err(err) => {
                        tracing::warn!("problem executing service method {method_name}: {err}");
                        None
                    }
                }
            }
        });
        self.methods.push((name, route));
        self
    }

    #[must_use]
    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|(name, _)| name.as_str())
    }

    /// Validates the base path and returns it with a trailing `/`, together
    /// with the routes relative to it.
    pub(crate) fn into_routes(self) -> Result<(String, Vec<(String, Route)>)> {
        let Some(mut base_path) = self.base_path else {
            return Err(Error::new(
                ErrorKind::MissingServicePath,
                "service has no path declaration".to_string(),
            ));
        };
        if !base_path.starts_with('/') {
            return Err(Error::new(
                ErrorKind::InvalidServicePath,
                format!("service path must start with '/': {base_path}"),
            ));
        }
        if !base_path.ends_with('/') {
            base_path.push('/');
        }
        Ok((base_path, self.methods))
    }
}
