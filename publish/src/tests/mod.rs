//! Publishing end to end: HTTP router, pipeline, content services and
//! registry stores, with remote backends mocked.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use zine_ipfs::contentservice::{ContentService, MemoryContentService};
use zine_ipfs::gateway::{GatewayClient, DEFAULT_TIMEOUT};
use zine_ipfs::{Backend, Cid, ContentRecord};
use zine_registry::store::{MemoryRegistryStore, RegistryPointer, RegistryStore};
use zine_registry::{RegistryDocument, RegistryStep, RegistryUpdater, StepError};

use crate::config::{ServiceConfig, Services};
use crate::http::{gen_router, AppState};
use crate::{Clock, Publisher};


const GATEWAY_BASE: &str = "https://gateway.example.org";

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
    ))
}

/// Pretends to be Pinata, failing uploads of the document with the given
/// name.
struct FailingContentService {
    inner: MemoryContentService,
    fail_on: &'static str,
}

#[async_trait::async_trait]
impl ContentService for FailingContentService {
    fn backend(&self) -> Backend {
        Backend::Pinata
    }

    async fn add_json(&self, name: &str, doc: &Value) -> Result<ContentRecord, zine_ipfs::Error> {
        if name == self.fail_on {
            return Err(zine_ipfs::Error::UploadFailed {
                status: 429,
                backend: Backend::Pinata,
                body: "rate limited".into(),
            });
        }
        let record = self.inner.add_json(name, doc).await?;
        Ok(ContentRecord::new(record.cid, Backend::Pinata))
    }

    async fn add_bytes(
        &self,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<ContentRecord, zine_ipfs::Error> {
        let record = self.inner.add_bytes(name, content_type, data).await?;
        Ok(ContentRecord::new(record.cid, Backend::Pinata))
    }
}

/// A registry store failing every write.
struct BrokenRegistryStore;

#[async_trait::async_trait]
impl RegistryStore for BrokenRegistryStore {
    async fn read(&self) -> Result<RegistryDocument, StepError> {
        Ok(RegistryDocument::default())
    }

    async fn write(&self, _doc: &RegistryDocument) -> Result<Cid, StepError> {
        Err(StepError::new(RegistryStep::Write, "503 Service Unavailable"))
    }

    async fn republish(&self, _cid: &Cid) -> Result<Option<String>, StepError> {
        Ok(None)
    }

    fn describe(&self) -> RegistryPointer {
        RegistryPointer::Memory
    }
}

fn publisher(content: Arc<dyn ContentService>, store: Option<Arc<dyn RegistryStore>>) -> Publisher {
    Publisher::new(
        content,
        store.map(RegistryUpdater::new),
        GATEWAY_BASE.parse().unwrap(),
    )
    .with_clock(fixed_clock())
}

fn router_for(publisher: Option<Publisher>, gateway: GatewayClient) -> Router {
    let backend = publisher.as_ref().map(Publisher::backend);
    let services = Services {
        publisher,
        gateway,
        backend,
    };
    gen_router().with_state(AppState::new(
        services,
        ServiceConfig::default().env_report(),
    ))
}

fn no_gateways() -> GatewayClient {
    GatewayClient::new(zine_ipfs::http::client(), vec![], DEFAULT_TIMEOUT)
}

/// Router over in-memory content and registry.
fn memory_router() -> (Router, MemoryContentService, MemoryRegistryStore) {
    let content = MemoryContentService::default();
    let store = MemoryRegistryStore::default();
    let router = router_for(
        Some(publisher(
            Arc::new(content.clone()),
            Some(Arc::new(store.clone())),
        )),
        no_gateways(),
    );
    (router, content, store)
}

/// Router as the daemon builds it from configuration.
fn configured_router(config: &ServiceConfig) -> Router {
    let services = config
        .build_services(zine_ipfs::http::client())
        .expect("must build services");
    gen_router().with_state(AppState::new(services, config.env_report()))
}

fn post_json(uri: &str, body: impl ToString) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn call(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("infallible");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("must read body");

    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("body must be JSON")
    };
    (status, value)
}

fn zine_a() -> Value {
    json!({"project": {"id": "p1", "name": "Zine A"}, "tags": ["x"]})
}
