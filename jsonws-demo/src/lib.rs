use jsonws::Result;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleRequest {
    pub name: String,
    #[serde(default)]
    pub payload: Vec<Payload>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub info: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimpleResponse {
    pub ok: bool,
    pub num: i32,
    pub ret_name: String,
}

#[jsonws::service(path = "/json")]
pub trait DemoService {
    #[web_method(name = "remoteCallMe")]
    async fn remote_call_me(&self, req: &SimpleRequest) -> Result<SimpleResponse>;

    async fn sth(&self) -> Result<()>;

    #[web_method(name = "sthElse")]
    async fn sth_else(&self, req: &SimpleRequest) -> Result<()>;
}

/// Answers every call from the request alone.
#[derive(Debug, Default)]
pub struct DemoImpl;

impl DemoService for DemoImpl {
    async fn remote_call_me(&self, req: &SimpleRequest) -> Result<SimpleResponse> {
        Ok(SimpleResponse {
            ok: true,
            num: 7,
            ret_name: req.name.clone(),
        })
    }

    async fn sth(&self) -> Result<()> {
        tracing::info!("sth called");
        Ok(())
    }

    async fn sth_else(&self, req: &SimpleRequest) -> Result<()> {
        tracing::info!(
            "sthElse called by {} with {} payloads",
            req.name,
            req.payload.len()
        );
        Ok(())
    }
}

/// The handler behind `/json/test`.
pub async fn test_endpoint(req: SimpleRequest) -> SimpleResponse {
    for payload in &req.payload {
        tracing::info!("{} sent {}", req.name, payload.info);
    }
    SimpleResponse {
        ok: true,
        num: 5,
        ret_name: req.name,
    }
}
