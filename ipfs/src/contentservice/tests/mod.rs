//! Scenarios every [ContentService] needs to pass. Remote backends run
//! against a mock server answering with a fixed CID.

use std::sync::Arc;

use bytes::Bytes;
use rstest::*;
use rstest_reuse::{self, *};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{from_config, ContentService, MemoryContentService};
use crate::{Backend, Cid, ContentRecord, KuboEndpoint, PinataAuth, PinataEndpoint, SelectedBackend};

const MOCK_CID: &str = "bafkreimockmockmock";

/// Keeps the mock server alive for as long as the service is used.
struct Harness {
    _server: Option<MockServer>,
    svc: Arc<dyn ContentService>,
}

impl AsRef<dyn ContentService> for Harness {
    fn as_ref(&self) -> &(dyn ContentService + 'static) {
        self.svc.as_ref()
    }
}

async fn memory() -> Harness {
    Harness {
        _server: None,
        svc: Arc::new(MemoryContentService::default()),
    }
}

async fn kubo() -> Harness {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("{{\"Name\":\"x\",\"Hash\":\"{}\",\"Size\":\"1\"}}\n", MOCK_CID)),
        )
        .mount(&server)
        .await;

    let selected = SelectedBackend::Droplet(KuboEndpoint {
        base_url: server.uri().parse().unwrap(),
        user: "admin".into(),
        pass: "pass".into(),
        api_secret: None,
    });
    Harness {
        svc: from_config(&selected, crate::http::client()),
        _server: Some(server),
    }
}

async fn pinata() -> Harness {
    let server = MockServer::start().await;
    for p in ["/pinning/pinJSONToIPFS", "/pinning/pinFileToIPFS"] {
        Mock::given(method("POST"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"IpfsHash": MOCK_CID})))
            .mount(&server)
            .await;
    }

    let selected = SelectedBackend::Pinata(PinataEndpoint {
        base_url: server.uri().parse().unwrap(),
        auth: PinataAuth::Jwt("jwt".into()),
    });
    Harness {
        svc: from_config(&selected, crate::http::client()),
        _server: Some(server),
    }
}

#[template]
#[rstest]
#[case::memory(memory().await, Backend::Memory)]
#[case::kubo(kubo().await, Backend::Droplet)]
#[case::pinata(pinata().await, Backend::Pinata)]
pub fn content_services(#[case] content_service: impl ContentService, #[case] backend: Backend) {}

#[apply(content_services)]
#[tokio::test]
async fn reports_backend(content_service: impl ContentService, backend: Backend) {
    assert_eq!(backend, content_service.backend());
}

#[apply(content_services)]
#[tokio::test]
async fn add_json_returns_record(content_service: impl ContentService, backend: Backend) {
    let record = content_service
        .add_json("project.json", &json!({"name": "Zine A", "pages": []}))
        .await
        .expect("must succeed");

    assert_eq!(backend, record.backend);
    if backend != Backend::Memory {
        assert_eq!(MOCK_CID, record.cid.as_str());
    }
}

#[apply(content_services)]
#[tokio::test]
async fn add_bytes_returns_record(content_service: impl ContentService, backend: Backend) {
    let ContentRecord { cid, backend: stored_on } = content_service
        .add_bytes("pubkey.asc", "text/plain", Bytes::from_static(b"hello world"))
        .await
        .expect("must succeed");

    assert_eq!(backend, stored_on);
    if backend == Backend::Memory {
        assert_eq!(Cid::for_bytes(b"hello world"), cid);
    } else {
        assert_eq!(MOCK_CID, cid.as_str());
    }
}

#[tokio::test]
async fn memory_is_content_addressed() {
    let svc = MemoryContentService::default();
    let doc = json!({"schema": "v1", "entries": []});

    let a = svc.add_json("a.json", &doc).await.expect("must succeed").cid;
    let b = svc.add_json("b.json", &doc).await.expect("must succeed").cid;
    let c = svc
        .add_json("c.json", &json!({"schema": "v1"}))
        .await
        .expect("must succeed")
        .cid;

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(3, svc.uploads());
    assert_eq!(Some(doc), svc.get_json(&a));
}
