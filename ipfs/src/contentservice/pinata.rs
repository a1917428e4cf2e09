use bytes::Bytes;
use tracing::instrument;

use super::ContentService;
use crate::pinata::PinataClient;
use crate::{Backend, ContentRecord, Error};

/// Pins content through the Pinata API. JSON documents go through the
/// dedicated JSON endpoint, everything else is uploaded as a file.
#[derive(Clone)]
pub struct PinataContentService {
    client: PinataClient,
}

impl PinataContentService {
    pub fn new(client: PinataClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ContentService for PinataContentService {
    fn backend(&self) -> Backend {
        Backend::Pinata
    }

    #[instrument(skip_all, err, fields(doc.name = name))]
    async fn add_json(
        &self,
        name: &str,
        doc: &serde_json::Value,
    ) -> Result<ContentRecord, Error> {
        let cid = self.client.pin_json(name, doc).await?;
        Ok(ContentRecord::new(cid, Backend::Pinata))
    }

    #[instrument(skip_all, err, fields(doc.name = name, data.len = data.len()))]
    async fn add_bytes(
        &self,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<ContentRecord, Error> {
        let cid = self.client.pin_file(name, content_type, data).await?;
        Ok(ContentRecord::new(cid, Backend::Pinata))
    }
}
