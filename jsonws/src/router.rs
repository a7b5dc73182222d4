use std::{collections::HashMap, future::Future, sync::Arc};

use bytes::Bytes;
use foldhash::fast::RandomState;
use futures_util::{FutureExt, future::BoxFuture};
use hyper::Method;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    ServiceDescriptor, codec,
    error::{Error, ErrorKind, Result},
};

/// Type-erased handler: JSON bytes in, JSON bytes out.
pub type Handler = Arc<dyn Fn(&[u8]) -> BoxFuture<'static, Result<Vec<u8>>> + Send + Sync>;

#[derive(Clone)]
pub struct Route {
    pub request_type: &'static str,
    handler: Handler,
}

impl Route {
    pub(crate) fn new<Req, Rsp, F, Fut>(handler: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Rsp: Serialize + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Rsp> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            request_type: std::any::type_name::<Req>(),
            handler: Arc::new(move |json: &[u8]| {
                let req = serde_json::from_slice::<Req>(json);
                let handler = handler.clone();
                async move {
                    let rsp = handler(req?).await;
                    serde_json::to_vec(&rsp)
                        .map_err(|e| Error::new(ErrorKind::SerializeFailed, e.to_string()))
                }
                .boxed()
            }),
        }
    }

    async fn invoke(&self, body: &[u8]) -> Result<Bytes> {
        let json = codec::decompress(body)?;
        let rsp = (self.handler)(&json).await?;
        codec::compress(&rsp)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("request_type", &self.request_type)
            .finish()
    }
}

/// Outcome of offering one request to the [`Router`].
#[derive(Debug)]
pub enum Dispatch {
    /// Not ours: wrong method, unknown path, or not a JSON body.
    Unhandled,
    /// Gzipped JSON response body, to be sent with status 200.
    Handled(Bytes),
    /// The request matched but could not be decoded or its result could not
    /// be encoded. No response is produced for it.
    Dropped(Error),
}

/// Maps exact request paths to handlers.
#[derive(Default)]
pub struct Router {
    routes: HashMap<String, Route, RandomState>,
}

impl Router {
    /// Registers `handler` for POST requests on `path`, replacing any handler
    /// already registered there.
    pub fn register<Req, Rsp, F, Fut>(&mut self, path: impl Into<String>, handler: F)
    where
        Req: DeserializeOwned + Send + 'static,
        Rsp: Serialize + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Rsp> + Send + 'static,
    {
        self.insert(path.into(), Route::new(handler));
    }

    pub(crate) fn insert(&mut self, path: String, route: Route) {
        if self.routes.insert(path.clone(), route).is_some() {
            tracing::debug!("replaced handler for {path}");
        }
    }

    /// Registers every method of a service under its base path.
    ///
    /// # Errors
    ///
    /// Fails with `MissingServicePath` when the descriptor carries no base
    /// path, or `InvalidServicePath` when it does not start with `/`. Nothing
    /// is registered in either case.
    pub fn bind(&mut self, descriptor: ServiceDescriptor) -> Result<()> {
        let (base_path, methods) = descriptor.into_routes()?;
        for (name, route) in methods {
            let path = format!("{base_path}{name}");
            tracing::debug!("bind {path} ({})", route.request_type);
            self.insert(path, route);
        }
        Ok(())
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.routes.keys()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the route that would take this request, if any.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str, content_type: Option<&str>) -> Option<&Route> {
        if *method != Method::POST || !content_type.is_some_and(codec::is_json_content_type) {
            return None;
        }
        self.routes.get(path)
    }

    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Dispatch {
        let Some(route) = self.route(method, path, content_type) else {
            return Dispatch::Unhandled;
        };

        match route.invoke(body).await {
            Ok(bytes) => Dispatch::Handled(bytes),
            Err(err) => {
                tracing::warn!(
                    "could not handle {path} with request type {}: {err}",
                    route.request_type
                );
                Dispatch::Dropped(err)
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("paths", &self.routes.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Payload {
        info: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct SimpleRequest {
        name: String,
        payload: Vec<Payload>,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct SimpleResponse {
        ok: bool,
        num: i32,
        ret_name: String,
    }

    fn router() -> Router {
        let mut router = Router::default();
        router.register("/json/test", |req: SimpleRequest| async move {
            SimpleResponse {
                ok: true,
                num: 5,
                ret_name: req.name,
            }
        });
        router
    }

    fn request() -> Bytes {
        codec::encode(&serde_json::json!({
            "name": "foobar2000",
            "payload": [{"info": "hallo"}],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch() {
        let router = router();
        let Dispatch::Handled(bytes) = router
            .dispatch(&Method::POST, "/json/test", Some(codec::CONTENT_TYPE), &request())
            .await
        else {
            panic!("request should be handled");
        };
        let rsp: SimpleResponse = codec::decode(&bytes).unwrap();
        assert_eq!(
            rsp,
            SimpleResponse {
                ok: true,
                num: 5,
                ret_name: "foobar2000".into()
            }
        );

        let dispatch = router
            .dispatch(&Method::POST, "/json/test", Some("application/javascript"), &request())
            .await;
        assert!(matches!(dispatch, Dispatch::Handled(_)));
    }

    #[tokio::test]
    async fn test_unhandled() {
        let router = router();
        for (method, path, content_type) in [
            (Method::GET, "/json/test", Some(codec::CONTENT_TYPE)),
            (Method::PUT, "/json/test", Some(codec::CONTENT_TYPE)),
            (Method::POST, "/json/other", Some(codec::CONTENT_TYPE)),
            (Method::POST, "/JSON/test", Some(codec::CONTENT_TYPE)),
            (Method::POST, "/json/test/", Some(codec::CONTENT_TYPE)),
            (Method::POST, "/json/test", Some("text/plain")),
            (Method::POST, "/json/test", None),
        ] {
            let dispatch = router.dispatch(&method, path, content_type, &request()).await;
            assert!(
                matches!(dispatch, Dispatch::Unhandled),
                "{method} {path} {content_type:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_dropped() {
        let router = router();
        let dispatch = router
            .dispatch(&Method::POST, "/json/test", Some(codec::CONTENT_TYPE), b"not gzip")
            .await;
        let Dispatch::Dropped(err) = dispatch else {
            panic!("garbage should be dropped");
        };
        assert_eq!(err.kind, ErrorKind::DecompressFailed);

        let body = codec::encode(&serde_json::json!({"name": 42})).unwrap();
        let dispatch = router
            .dispatch(&Method::POST, "/json/test", Some(codec::CONTENT_TYPE), &body)
            .await;
        let Dispatch::Dropped(err) = dispatch else {
            panic!("mismatched payload should be dropped");
        };
        assert_eq!(err.kind, ErrorKind::DeserializeFailed);
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let mut router = router();
        router.register("/json/test", |_: codec::Empty| async { 42 });
        assert_eq!(router.len(), 1);
        assert!(router.contains("/json/test"));

        let body = codec::encode(&codec::Empty {}).unwrap();
        let Dispatch::Handled(bytes) = router
            .dispatch(&Method::POST, "/json/test", Some(codec::CONTENT_TYPE), &body)
            .await
        else {
            panic!("request should be handled");
        };
        assert_eq!(codec::decode::<i32>(&bytes).unwrap(), 42);
    }
}
