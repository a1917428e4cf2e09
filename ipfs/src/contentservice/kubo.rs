use bytes::Bytes;
use tracing::instrument;

use super::ContentService;
use crate::kubo::KuboClient;
use crate::{Backend, ContentRecord, Error};

/// Pins content on a self-hosted IPFS node.
#[derive(Clone)]
pub struct KuboContentService {
    client: KuboClient,
}

impl KuboContentService {
    pub fn new(client: KuboClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ContentService for KuboContentService {
    fn backend(&self) -> Backend {
        Backend::Droplet
    }

    #[instrument(skip_all, err, fields(doc.name = name))]
    async fn add_json(
        &self,
        name: &str,
        doc: &serde_json::Value,
    ) -> Result<ContentRecord, Error> {
        let body = serde_json::to_vec(doc).map_err(|e| Error::InvalidResponse {
            backend: Backend::Droplet,
            detail: format!("unable to serialize {}: {}", name, e),
        })?;

        let cid = self
            .client
            .add(name, "application/json", Bytes::from(body))
            .await?;
        Ok(ContentRecord::new(cid, Backend::Droplet))
    }

    #[instrument(skip_all, err, fields(doc.name = name, data.len = data.len()))]
    async fn add_bytes(
        &self,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<ContentRecord, Error> {
        let cid = self.client.add(name, content_type, data).await?;
        Ok(ContentRecord::new(cid, Backend::Droplet))
    }
}
