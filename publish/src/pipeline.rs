use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use url::Url;
use zine_ipfs::contentservice::ContentService;
use zine_ipfs::{Backend, Cid, ContentRecord};
use zine_registry::{RegistryEntry, RegistryUpdate, RegistryUpdater, StepError};

use crate::manifest::{build_manifest, timestamp, ManifestInput};
use crate::{PublishError, UploadStep};

/// Source of the timestamps stamped into manifests and registry entries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What a client submits for publishing.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub project: Option<Value>,
    #[serde(default)]
    pub backup: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<Value>>,
    #[serde(default)]
    pub author: Option<Value>,
    #[serde(default)]
    pub signature: Option<Value>,
}

/// The part of a publish that's durable once returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedCore {
    pub manifest_cid: Cid,
    pub project_cid: Cid,
    pub backup_cid: Option<Cid>,
    pub pubkey_cid: Option<Cid>,
    pub pinned_via: Vec<Backend>,
}

#[derive(Clone, Debug)]
pub struct PublishOutcome {
    pub core: PublishedCore,
    /// None if no registry is configured.
    pub registry: Option<Result<RegistryUpdate, StepError>>,
}

impl PublishOutcome {
    /// Content is published, but the registry doesn't list it.
    pub fn is_degraded(&self) -> bool {
        matches!(self.registry, Some(Err(_)))
    }

    pub fn registry_update(&self) -> Option<&RegistryUpdate> {
        self.registry.as_ref().and_then(|r| r.as_ref().ok())
    }
}

/// Returns the armored public key carried in `author.pgp`, if any.
fn armored_public_key(author: &Value) -> Option<&str> {
    author
        .pointer("/pgp/publicKeyArmored")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
}

/// The project name, used as the manifest title. Any truthy scalar is
/// accepted, numbers and `true` are stringified.
pub(crate) fn project_title(project: &Value) -> Option<String> {
    match project.get("name")? {
        Value::String(name) if !name.is_empty() => Some(name.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// The backends the uploads of a publish ended up on, in upload order.
fn pinned_via(records: &[ContentRecord]) -> Vec<Backend> {
    let mut backends = Vec::with_capacity(1);
    for record in records {
        if !backends.contains(&record.backend) {
            backends.push(record.backend);
        }
    }
    backends
}

/// Replaces the armored key in `author.pgp` with the CID it was stored at.
fn replace_public_key(author: &mut Value, cid: &Cid) {
    if let Some(pgp) = author.get_mut("pgp").and_then(Value::as_object_mut) {
        pgp.remove("publicKeyArmored");
        pgp.insert(
            "publicKeyArmoredCid".to_string(),
            Value::String(cid.to_string()),
        );
    }
}

/// Runs publishes: uploads, manifest, registry update.
#[derive(Clone)]
pub struct Publisher {
    content: Arc<dyn ContentService>,
    registry: Option<RegistryUpdater>,
    gateway_base: Url,
    clock: Arc<dyn Clock>,
}

impl Publisher {
    pub fn new(
        content: Arc<dyn ContentService>,
        registry: Option<RegistryUpdater>,
        gateway_base: Url,
    ) -> Self {
        Self {
            content,
            registry,
            gateway_base,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> Backend {
        self.content.backend()
    }

    pub fn registry(&self) -> Option<&RegistryUpdater> {
        self.registry.as_ref()
    }

    /// Browsable gateway link for some published content.
    pub fn link(&self, cid: &Cid) -> String {
        zine_ipfs::gateway::content_url(&self.gateway_base, cid)
    }

    async fn add_json(
        &self,
        step: UploadStep,
        name: &str,
        doc: &Value,
    ) -> Result<ContentRecord, PublishError> {
        let record = self
            .content
            .add_json(name, doc)
            .await
            .map_err(PublishError::upload(step))?;
        debug!(%step, cid = %record.cid, backend = %record.backend, "uploaded");
        Ok(record)
    }

    /// Publishes a project.
    ///
    /// Project, backup and public key are stored first, the manifest
    /// referencing them last. Only then is the registry updated. A failing
    /// registry update doesn't fail the publish, it's logged and returned as
    /// part of the outcome.
    #[instrument(skip_all, err, fields(backend = %self.content.backend()))]
    pub async fn publish(&self, req: PublishRequest) -> Result<PublishOutcome, PublishError> {
        let project = req.project.ok_or(PublishError::MissingProject)?;
        let title = project_title(&project).ok_or(PublishError::MissingProject)?;

        let mut records = Vec::with_capacity(3);

        let project_record = self
            .add_json(UploadStep::AddProject, "project.json", &project)
            .await?;
        let project_cid = project_record.cid.clone();
        records.push(project_record);

        let mut backup_cid = None;
        if let Some(backup) = req.backup.filter(|b| !b.is_null()) {
            let record = self
                .add_json(UploadStep::AddBackup, "backup.json", &backup)
                .await?;
            backup_cid = Some(record.cid.clone());
            records.push(record);
        }

        let mut author = req.author.filter(|a| !a.is_null());
        let mut pubkey_cid = None;
        if let Some(author) = author.as_mut() {
            if let Some(key) = armored_public_key(author) {
                let record = self
                    .content
                    .add_bytes("pubkey.asc", "text/plain", Bytes::from(key.to_string()))
                    .await
                    .map_err(PublishError::upload(UploadStep::AddPubkey))?;
                debug!(step = %UploadStep::AddPubkey, cid = %record.cid, "uploaded");

                replace_public_key(author, &record.cid);
                pubkey_cid = Some(record.cid.clone());
                records.push(record);
            }
        }

        let pinned_via = pinned_via(&records);
        let manifest = build_manifest(
            ManifestInput {
                title,
                project_cid: project_cid.clone(),
                backup_cid: backup_cid.clone(),
                description: req.description,
                project_description: project
                    .pointer("/metadata/description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                tags: req.tags.unwrap_or_default(),
                author,
                signature: req.signature,
                pinned_via: pinned_via.clone(),
            },
            self.clock.now(),
        )?;
        let manifest = manifest.to_value()?;

        let manifest_cid = self
            .add_json(UploadStep::AddManifest, "manifest.json", &manifest)
            .await?
            .cid;

        let registry = match &self.registry {
            None => None,
            Some(updater) => {
                let entry = RegistryEntry::from_manifest(
                    &manifest_cid,
                    &manifest,
                    timestamp(self.clock.now()),
                );
                let result = updater.update(entry).await;
                if let Err(e) = &result {
                    error!(
                        step = %e.step,
                        err = %e.message,
                        manifest_cid = %manifest_cid,
                        "registry update failed, content is published but not listed"
                    );
                }
                Some(result)
            }
        };

        info!(%manifest_cid, %project_cid, "published");

        Ok(PublishOutcome {
            core: PublishedCore {
                manifest_cid,
                project_cid,
                backup_cid,
                pubkey_cid,
                pinned_via,
            },
            registry,
        })
    }
}
