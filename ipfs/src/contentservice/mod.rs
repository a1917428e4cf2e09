use bytes::Bytes;

use crate::{Backend, ContentRecord, Error};

mod from_config;
mod kubo;
mod memory;
mod pinata;

#[cfg(test)]
mod tests;

pub use self::from_config::from_config;
pub use self::kubo::KuboContentService;
pub use self::memory::MemoryContentService;
pub use self::pinata::PinataContentService;

/// The trait all content storage backends implement.
///
/// Every successful call pins the content and returns where it ended up.
/// Calls are independent of each other, there's no batching and no retrying.
#[async_trait::async_trait]
pub trait ContentService: Send + Sync {
    /// The backend content ends up on, reported in manifests and responses.
    fn backend(&self) -> Backend;

    /// Stores a JSON document. `name` is the file or pin name the backend
    /// records alongside it.
    async fn add_json(&self, name: &str, doc: &serde_json::Value)
        -> Result<ContentRecord, Error>;

    /// Stores raw bytes as a file called `name`.
    async fn add_bytes(
        &self,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<ContentRecord, Error>;
}

#[async_trait::async_trait]
impl<A> ContentService for A
where
    A: AsRef<dyn ContentService> + Send + Sync,
{
    fn backend(&self) -> Backend {
        self.as_ref().backend()
    }

    async fn add_json(
        &self,
        name: &str,
        doc: &serde_json::Value,
    ) -> Result<ContentRecord, Error> {
        self.as_ref().add_json(name, doc).await
    }

    async fn add_bytes(
        &self,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<ContentRecord, Error> {
        self.as_ref().add_bytes(name, content_type, data).await
    }
}
