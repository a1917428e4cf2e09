use bytes::Bytes;
use tracing::{debug, instrument, warn};
use zine_ipfs::gateway::GatewayClient;
use zine_ipfs::pinata::PinataClient;
use zine_ipfs::{Cid, IpfsPath};

use super::{RegistryPointer, RegistryStore};
use crate::{RegistryDocument, RegistryStep, StepError};

/// Keeps the registry as a pinned file on Pinata. Every write pins a new
/// revision under the same pin name, and unpins older revisions on a best
/// effort basis.
#[derive(Clone)]
pub struct PinataRegistryStore {
    client: PinataClient,
    gateway: GatewayClient,
    pin_name: String,
    fallback_cid: Option<Cid>,
}

impl PinataRegistryStore {
    pub fn new(
        client: PinataClient,
        gateway: GatewayClient,
        pin_name: String,
        fallback_cid: Option<Cid>,
    ) -> Self {
        Self {
            client,
            gateway,
            pin_name,
            fallback_cid,
        }
    }

    /// The CID of the current revision, if there is one.
    async fn current(&self) -> Result<Option<Cid>, StepError> {
        let rows = self
            .client
            .pin_list_by_name(&self.pin_name)
            .await
            .map_err(StepError::at(RegistryStep::Read))?;

        let newest = rows
            .into_iter()
            .find_map(|row| Cid::new(row.ipfs_pin_hash).ok());
        Ok(newest.or_else(|| self.fallback_cid.clone()))
    }

    /// Unpins all revisions except `keep`. Failures are only logged, stale
    /// revisions don't affect correctness.
    async fn collect_garbage(&self, keep: &Cid) {
        let rows = match self.client.pin_list_by_name(&self.pin_name).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(err = %e, "unable to list old registry revisions");
                return;
            }
        };

        for row in rows.into_iter().filter(|r| r.ipfs_pin_hash != keep.as_str()) {
            let Ok(cid) = Cid::new(row.ipfs_pin_hash) else {
                continue;
            };
            match self.client.unpin(&cid).await {
                Ok(()) => debug!(%cid, "unpinned old registry revision"),
                Err(e) => warn!(%cid, err = %e, "unable to unpin old registry revision"),
            }
        }
    }
}

#[async_trait::async_trait]
impl RegistryStore for PinataRegistryStore {
    #[instrument(skip_all, err, fields(pin_name = %self.pin_name))]
    async fn read(&self) -> Result<RegistryDocument, StepError> {
        let Some(cid) = self.current().await? else {
            debug!("no registry yet");
            return Ok(RegistryDocument::default());
        };

        self.gateway
            .fetch_json(&IpfsPath::from(&cid))
            .await
            .map_err(StepError::at(RegistryStep::Read))
    }

    #[instrument(skip_all, err, fields(pin_name = %self.pin_name, entries = doc.entries.len()))]
    async fn write(&self, doc: &RegistryDocument) -> Result<Cid, StepError> {
        let data = doc
            .to_vec()
            .map_err(|e| StepError::new(RegistryStep::Write, e.to_string()))?;

        let cid = self
            .client
            .pin_file(&self.pin_name, "application/json", Bytes::from(data))
            .await
            .map_err(StepError::at(RegistryStep::Write))?;

        self.collect_garbage(&cid).await;
        Ok(cid)
    }

    async fn republish(&self, _cid: &Cid) -> Result<Option<String>, StepError> {
        Ok(None)
    }

    fn describe(&self) -> RegistryPointer {
        RegistryPointer::PinName {
            name: self.pin_name.clone(),
            fallback: self.fallback_cid.clone(),
        }
    }
}
