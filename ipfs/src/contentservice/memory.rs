use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{instrument, trace};

use super::ContentService;
use crate::{Backend, Cid, ContentRecord, Error};

/// Keeps content in process memory, addressed by its CIDv1.
/// Storing the same bytes twice yields the same CID.
#[derive(Clone, Default)]
pub struct MemoryContentService {
    db: Arc<RwLock<HashMap<Cid, Bytes>>>,
    uploads: Arc<AtomicUsize>,
}

impl MemoryContentService {
    pub fn get(&self, cid: &Cid) -> Option<Bytes> {
        self.db.read().get(cid).cloned()
    }

    /// Parses the stored content as JSON.
    pub fn get_json(&self, cid: &Cid) -> Option<serde_json::Value> {
        self.get(cid)
            .and_then(|data| serde_json::from_slice(&data).ok())
    }

    /// Number of successful add calls so far, including duplicates.
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::Relaxed)
    }

    fn put(&self, data: Bytes) -> ContentRecord {
        let cid = Cid::for_bytes(&data);
        self.db.write().insert(cid.clone(), data);
        self.uploads.fetch_add(1, Ordering::Relaxed);
        ContentRecord::new(cid, Backend::Memory)
    }
}

#[async_trait::async_trait]
impl ContentService for MemoryContentService {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    #[instrument(skip_all, err, fields(doc.name = name))]
    async fn add_json(
        &self,
        name: &str,
        doc: &serde_json::Value,
    ) -> Result<ContentRecord, Error> {
        let data = serde_json::to_vec(doc).map_err(|e| Error::InvalidResponse {
            backend: Backend::Memory,
            detail: e.to_string(),
        })?;

        let record = self.put(data.into());
        trace!(cid = %record.cid, "stored");
        Ok(record)
    }

    #[instrument(skip_all, err, fields(doc.name = name))]
    async fn add_bytes(
        &self,
        name: &str,
        _content_type: &str,
        data: Bytes,
    ) -> Result<ContentRecord, Error> {
        let record = self.put(data);
        trace!(cid = %record.cid, "stored");
        Ok(record)
    }
}
