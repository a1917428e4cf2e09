use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};
use zine_ipfs::Cid;

use crate::store::RegistryStore;
use crate::{RegistryDocument, RegistryEntry, RegistryStep, StepError};

/// Where a registry update currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Reading,
    Merging,
    Writing,
    Republishing,
    Done,
    /// A step failed. Nothing follows in the same cycle.
    Failed(RegistryStep),
}

/// Outcome of a successful registry update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryUpdate {
    pub registry_cid: Cid,
    /// The IPNS name now pointing at the registry, if it was republished.
    pub ipns_name: Option<String>,
    /// Number of entries in the written document.
    pub entries: usize,
    /// Whether an entry with the same key was replaced.
    pub replaced: bool,
}

/// Changes made through the legacy admin endpoint.
#[derive(Clone, Debug)]
pub enum AdminChange {
    Merge {
        add: Vec<RegistryEntry>,
        remove: Vec<String>,
    },
    Replace(RegistryDocument),
}

/// Runs read-merge-write-republish cycles against a [RegistryStore].
///
/// Cycles aren't serialized against each other. Two concurrent updates both
/// read the same revision, and the one writing last wins.
#[derive(Clone)]
pub struct RegistryUpdater {
    store: Arc<dyn RegistryStore>,
    /// Where the most recently started cycle is, or ended.
    last_state: Arc<Mutex<UpdateState>>,
}

/// Tracks the state of one cycle, mirroring it into the updater.
struct Cycle<'a> {
    state: UpdateState,
    shared: &'a Mutex<UpdateState>,
}

impl Cycle<'_> {
    fn enter(&mut self, next: UpdateState) {
        if matches!(self.state, UpdateState::Failed(_)) {
            return;
        }
        debug!(from = ?self.state, to = ?next, "registry update");
        self.state = next;
        *self.shared.lock() = next;
    }

    fn fail(&mut self, e: &StepError) {
        error!(step = %e.step, err = %e.message, "registry update failed");
        self.enter(UpdateState::Failed(e.step));
    }
}

impl RegistryUpdater {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            last_state: Arc::new(Mutex::new(UpdateState::Idle)),
        }
    }

    fn cycle(&self) -> Cycle<'_> {
        *self.last_state.lock() = UpdateState::Idle;
        Cycle {
            state: UpdateState::Idle,
            shared: &self.last_state,
        }
    }

    /// The state the most recent update is in, or ended in.
    pub fn last_state(&self) -> UpdateState {
        *self.last_state.lock()
    }

    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }

    /// Reads the current document, starting over from an empty one if that
    /// fails for whatever reason.
    async fn read_or_bootstrap(&self) -> RegistryDocument {
        match self.store.read().await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(step = %e.step, err = %e.message, "unable to read registry, starting a new one");
                RegistryDocument::default()
            }
        }
    }

    /// Writes `doc` and republishes it.
    async fn commit(
        &self,
        cycle: &mut Cycle<'_>,
        doc: &RegistryDocument,
        replaced: bool,
    ) -> Result<RegistryUpdate, StepError> {
        cycle.enter(UpdateState::Writing);
        let registry_cid = self
            .store
            .write(doc)
            .await
            .inspect_err(|e| cycle.fail(e))?;

        cycle.enter(UpdateState::Republishing);
        let ipns_name = self
            .store
            .republish(&registry_cid)
            .await
            .inspect_err(|e| cycle.fail(e))?;

        cycle.enter(UpdateState::Done);
        Ok(RegistryUpdate {
            registry_cid,
            ipns_name,
            entries: doc.entries.len(),
            replaced,
        })
    }

    /// Adds `entry` to the registry, replacing any entry with the same key.
    #[instrument(skip_all, err, fields(registry = %self.store.describe(), key = entry.resolve_key()))]
    pub async fn update(&self, entry: RegistryEntry) -> Result<RegistryUpdate, StepError> {
        let mut cycle = self.cycle();

        cycle.enter(UpdateState::Reading);
        let mut doc = self.read_or_bootstrap().await;

        cycle.enter(UpdateState::Merging);
        let replaced = doc.upsert(entry);

        self.commit(&mut cycle, &doc, replaced).await
    }

    /// Applies an admin change. Merges go through the same read-merge-write
    /// cycle as [RegistryUpdater::update], replacements skip the read.
    #[instrument(skip_all, err, fields(registry = %self.store.describe()))]
    pub async fn apply(&self, change: AdminChange) -> Result<RegistryUpdate, StepError> {
        let mut cycle = self.cycle();

        let doc = match change {
            AdminChange::Merge { add, remove } => {
                cycle.enter(UpdateState::Reading);
                let mut doc = self.read_or_bootstrap().await;

                cycle.enter(UpdateState::Merging);
                doc.apply(add, &remove);
                doc
            }
            AdminChange::Replace(doc) => doc,
        };

        self.commit(&mut cycle, &doc, false).await
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::{Cycle, UpdateState};
    use crate::{RegistryStep, StepError};

    #[test]
    fn failed_is_absorbing() {
        let shared = Mutex::new(UpdateState::Idle);
        let mut cycle = Cycle {
            state: UpdateState::Idle,
            shared: &shared,
        };

        cycle.enter(UpdateState::Writing);
        cycle.fail(&StepError::new(RegistryStep::Write, "503"));
        cycle.enter(UpdateState::Republishing);
        cycle.enter(UpdateState::Done);

        assert_eq!(UpdateState::Failed(RegistryStep::Write), cycle.state);
        assert_eq!(UpdateState::Failed(RegistryStep::Write), *shared.lock());
    }
}
