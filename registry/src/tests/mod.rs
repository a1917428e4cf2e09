use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use zine_ipfs::Cid;

use crate::store::{MemoryRegistryStore, RegistryPointer, RegistryStore};
use crate::{
    AdminChange, RegistryDocument, RegistryEntry, RegistryStep, RegistryUpdater, StepError,
    UpdateState,
};

fn entry(v: serde_json::Value) -> RegistryEntry {
    serde_json::from_value(v).expect("must parse")
}

/// A store failing at the configured step, counting calls.
#[derive(Default)]
struct FailingStore {
    fail_read: bool,
    fail_write: bool,
    fail_republish: bool,
    writes: AtomicUsize,
}

#[async_trait::async_trait]
impl RegistryStore for FailingStore {
    async fn read(&self) -> Result<RegistryDocument, StepError> {
        if self.fail_read {
            return Err(StepError::new(RegistryStep::Read, "gateway timeout"));
        }
        Ok(RegistryDocument {
            entries: vec![entry(json!({"manifestCid": "m0"}))],
            ..Default::default()
        })
    }

    async fn write(&self, _doc: &RegistryDocument) -> Result<Cid, StepError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.fail_write {
            return Err(StepError::new(RegistryStep::Write, "503"));
        }
        Ok(Cid::new("reg1").unwrap())
    }

    async fn republish(&self, _cid: &Cid) -> Result<Option<String>, StepError> {
        if self.fail_republish {
            return Err(StepError::new(RegistryStep::Republish, "no such key"));
        }
        Ok(Some("k51name".into()))
    }

    fn describe(&self) -> RegistryPointer {
        RegistryPointer::Memory
    }
}

#[tokio::test]
async fn update_bootstraps_empty_registry() {
    let store = MemoryRegistryStore::default();
    let updater = RegistryUpdater::new(Arc::new(store.clone()));

    let update = updater
        .update(entry(json!({"manifestCid": "m1", "title": "A"})))
        .await
        .expect("must succeed");

    assert_eq!(1, update.entries);
    assert!(!update.replaced);
    assert_eq!(None, update.ipns_name);
    assert_eq!(1, store.writes());

    let doc = store.document().expect("must be written");
    assert_eq!(
        Cid::for_bytes(&doc.to_vec().unwrap()),
        update.registry_cid
    );
}

#[tokio::test]
async fn republishing_same_manifest_keeps_one_entry() {
    let store = MemoryRegistryStore::with_document(RegistryDocument {
        entries: vec![entry(json!({"cid": "legacy", "coverImage": "c.png"}))],
        ..Default::default()
    });
    let updater = RegistryUpdater::new(Arc::new(store.clone()));

    updater
        .update(entry(json!({"manifestCid": "m1", "title": "first"})))
        .await
        .expect("must succeed");
    let second = updater
        .update(entry(json!({"manifestCid": "m1", "title": "second"})))
        .await
        .expect("must succeed");

    assert!(second.replaced);
    assert_eq!(2, second.entries);

    let doc = store.document().unwrap();
    assert_eq!("second", doc.entries[1].title);
    assert_eq!(
        Some(&json!("c.png")),
        doc.entries[0].extra.get("coverImage")
    );
}

#[tokio::test]
async fn read_failure_starts_new_registry() {
    let store = Arc::new(FailingStore {
        fail_read: true,
        ..Default::default()
    });
    let updater = RegistryUpdater::new(store.clone());

    let update = updater
        .update(entry(json!({"manifestCid": "m1"})))
        .await
        .expect("must succeed");

    // The unreadable m0 entry is gone.
    assert_eq!(1, update.entries);
    assert_eq!(Some("k51name".to_string()), update.ipns_name);
}

#[rstest]
#[case::write(FailingStore { fail_write: true, ..Default::default() }, RegistryStep::Write)]
#[case::republish(FailingStore { fail_republish: true, ..Default::default() }, RegistryStep::Republish)]
#[tokio::test]
async fn failures_carry_step(#[case] store: FailingStore, #[case] step: RegistryStep) {
    let updater = RegistryUpdater::new(Arc::new(store));

    let err = updater
        .update(entry(json!({"manifestCid": "m1"})))
        .await
        .expect_err("must fail");
    assert_eq!(step, err.step);
    assert_eq!(UpdateState::Failed(step), updater.last_state());
}

#[tokio::test]
async fn successful_cycle_ends_done() {
    let updater = RegistryUpdater::new(Arc::new(FailingStore::default()));
    assert_eq!(UpdateState::Idle, updater.last_state());

    updater
        .update(entry(json!({"manifestCid": "m1"})))
        .await
        .expect("must succeed");
    assert_eq!(UpdateState::Done, updater.last_state());
}

#[tokio::test]
async fn failed_state_is_left_by_next_cycle_only() {
    let store = Arc::new(FailingStore {
        fail_republish: true,
        ..Default::default()
    });
    let updater = RegistryUpdater::new(store.clone());

    updater
        .update(entry(json!({"manifestCid": "m1"})))
        .await
        .expect_err("must fail");
    assert_eq!(
        UpdateState::Failed(RegistryStep::Republish),
        updater.last_state()
    );
    // The write before the failing republish happened, nothing after it.
    assert_eq!(1, store.writes.load(Ordering::Relaxed));

    updater
        .apply(AdminChange::Replace(RegistryDocument::default()))
        .await
        .expect_err("must fail again");
    assert_eq!(2, store.writes.load(Ordering::Relaxed));
}

#[tokio::test]
async fn admin_merge_and_replace() {
    let store = MemoryRegistryStore::with_document(RegistryDocument {
        entries: vec![
            entry(json!({"manifestCid": "m1"})),
            entry(json!({"manifestCid": "m2"})),
        ],
        ..Default::default()
    });
    let updater = RegistryUpdater::new(Arc::new(store.clone()));

    let merged = updater
        .apply(AdminChange::Merge {
            add: vec![entry(json!({"manifestCid": "m3"}))],
            remove: vec!["m1".into()],
        })
        .await
        .expect("must succeed");
    assert_eq!(2, merged.entries);

    let replaced = updater
        .apply(AdminChange::Replace(RegistryDocument::default()))
        .await
        .expect("must succeed");
    assert_eq!(0, replaced.entries);
    assert_eq!(Some(RegistryDocument::default()), store.document());
}

#[test]
fn step_names() {
    assert_eq!(
        json!(["registry_read", "registry_key_lookup"]),
        serde_json::to_value([RegistryStep::Read, RegistryStep::KeyLookup]).unwrap()
    );
    assert_eq!(
        "registry_stat failed: 500",
        StepError::new(RegistryStep::Stat, "500").to_string()
    );
}
