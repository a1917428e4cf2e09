use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use zine_ipfs::Cid;

use super::{RegistryPointer, RegistryStore};
use crate::{RegistryDocument, RegistryStep, StepError};

/// Keeps the registry document in memory.
#[derive(Clone, Default)]
pub struct MemoryRegistryStore {
    doc: Arc<RwLock<Option<RegistryDocument>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryRegistryStore {
    pub fn with_document(doc: RegistryDocument) -> Self {
        Self {
            doc: Arc::new(RwLock::new(Some(doc))),
            writes: Default::default(),
        }
    }

    /// The last written (or initial) document, if any.
    pub fn document(&self) -> Option<RegistryDocument> {
        self.doc.read().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn read(&self) -> Result<RegistryDocument, StepError> {
        Ok(self.document().unwrap_or_default())
    }

    async fn write(&self, doc: &RegistryDocument) -> Result<Cid, StepError> {
        let data = doc
            .to_vec()
            .map_err(|e| StepError::new(RegistryStep::Write, e.to_string()))?;

        *self.doc.write() = Some(doc.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(Cid::for_bytes(&data))
    }

    async fn republish(&self, _cid: &Cid) -> Result<Option<String>, StepError> {
        Ok(None)
    }

    fn describe(&self) -> RegistryPointer {
        RegistryPointer::Memory
    }
}
