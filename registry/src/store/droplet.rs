use bytes::Bytes;
use tracing::{debug, instrument};
use zine_ipfs::kubo::KuboClient;
use zine_ipfs::Cid;

use super::{RegistryPointer, RegistryStore};
use crate::{RegistryDocument, RegistryStep, StepError};

/// Prefixes of IPNS names and peer IDs, as opposed to local key names.
const ADDRESS_PREFIXES: [&str; 5] = ["k51", "12D3", "Qm", "bafz", "/ipns/"];

fn looks_like_address(key: &str) -> bool {
    ADDRESS_PREFIXES.iter().any(|p| key.starts_with(p))
}

/// Keeps the registry as a file in the node's mutable filesystem (MFS), and
/// optionally republishes it under an IPNS key after each write.
#[derive(Clone)]
pub struct DropletRegistryStore {
    client: KuboClient,
    path: String,
    ipns_key: Option<String>,
}

impl DropletRegistryStore {
    pub fn new(client: KuboClient, path: String, ipns_key: Option<String>) -> Self {
        Self {
            client,
            path,
            ipns_key,
        }
    }

    /// Maps the configured key to the local key name `name/publish` wants.
    /// The key can be configured by its name, or by its IPNS address, in
    /// which case it's looked up in the node's key list.
    async fn local_key_name(&self, key: &str) -> Result<String, StepError> {
        if !looks_like_address(key) {
            return Ok(key.to_string());
        }

        let id = key.trim_start_matches("/ipns/");
        let keys = self
            .client
            .key_list()
            .await
            .map_err(StepError::at(RegistryStep::KeyLookup))?;

        keys.into_iter()
            .find(|k| k.id == id)
            .map(|k| k.name)
            .ok_or_else(|| {
                StepError::new(
                    RegistryStep::KeyLookup,
                    format!("no key with id {} on the node", id),
                )
            })
    }
}

#[async_trait::async_trait]
impl RegistryStore for DropletRegistryStore {
    #[instrument(skip_all, err, fields(path = %self.path))]
    async fn read(&self) -> Result<RegistryDocument, StepError> {
        match self
            .client
            .files_read(&self.path)
            .await
            .map_err(StepError::at(RegistryStep::Read))?
        {
            None => {
                debug!("no registry yet");
                Ok(RegistryDocument::default())
            }
            Some(data) => RegistryDocument::from_slice(&data).map_err(|e| {
                StepError::new(RegistryStep::Read, format!("invalid registry JSON: {}", e))
            }),
        }
    }

    #[instrument(skip_all, err, fields(path = %self.path, entries = doc.entries.len()))]
    async fn write(&self, doc: &RegistryDocument) -> Result<Cid, StepError> {
        let data = doc
            .to_vec()
            .map_err(|e| StepError::new(RegistryStep::Write, e.to_string()))?;

        self.client
            .files_write(&self.path, Bytes::from(data))
            .await
            .map_err(StepError::at(RegistryStep::Write))?;

        self.client
            .files_stat(&self.path)
            .await
            .map_err(StepError::at(RegistryStep::Stat))
    }

    #[instrument(skip_all, err, fields(cid = %cid))]
    async fn republish(&self, cid: &Cid) -> Result<Option<String>, StepError> {
        let Some(key) = self.ipns_key.as_deref() else {
            return Ok(None);
        };

        let key_name = self.local_key_name(key).await?;
        let published = self
            .client
            .name_publish(cid, &key_name)
            .await
            .map_err(StepError::at(RegistryStep::Republish))?;

        debug!(name = %published.name, value = %published.value, "republished");
        Ok(Some(published.name))
    }

    fn describe(&self) -> RegistryPointer {
        RegistryPointer::MfsPath {
            path: self.path.clone(),
            ipns_key: self.ipns_key.clone(),
        }
    }
}
