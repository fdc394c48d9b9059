use parley::core::broker::read_audit_log;
use parley::core::command::CommandName;
use parley::core::mode::Mode;
use parley::core::overrides::{OverrideAdmin, OverrideSource, SqliteOverrideStore};
use parley::core::permission::{Decision, PermissionMatrix};
use parley::core::principal::Principal;
use parley::core::store::Store;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn missing_database_means_no_overrides() {
    let tmp = tempdir().unwrap();
    let store = SqliteOverrideStore::new(Store::new(tmp.path().join("data")));
    assert!(store.load().unwrap().is_empty());
    assert!(!tmp.path().join("data").exists());
}

#[test]
fn overrides_persist_and_upsert() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("data");
    let admin = SqliteOverrideStore::new(Store::new(&root));
    admin
        .set(Principal::BackgroundAgent, CommandName::CreateFile, true, "ops")
        .unwrap();
    admin
        .set(Principal::BackgroundAgent, CommandName::CreateFile, false, "ops2")
        .unwrap();
    admin
        .set(Principal::Assistant, CommandName::DeleteFile, true, "ops")
        .unwrap();

    // A fresh handle sees the same rows.
    let reader = SqliteOverrideStore::new(Store::new(&root));
    let entries = reader.load().unwrap();
    assert_eq!(entries.len(), 2);
    let agent = entries
        .iter()
        .find(|e| e.principal == Principal::BackgroundAgent)
        .unwrap();
    assert!(!agent.allowed);
    assert_eq!(agent.actor, "ops2");

    assert!(
        reader
            .clear(Principal::Assistant, CommandName::DeleteFile, "ops")
            .unwrap()
    );
    assert!(
        !reader
            .clear(Principal::Assistant, CommandName::DeleteFile, "ops")
            .unwrap()
    );
    assert_eq!(reader.load().unwrap().len(), 1);
}

#[test]
fn admin_writes_are_audited() {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join("data"));
    let admin = SqliteOverrideStore::new(store.clone());
    admin
        .set(Principal::System, CommandName::ReadFile, true, "alice")
        .unwrap();
    admin
        .clear(Principal::System, CommandName::ReadFile, "alice")
        .unwrap();

    let events = read_audit_log(&store).unwrap();
    let ops: Vec<(&str, &str)> = events
        .iter()
        .filter(|e| e.actor == "alice")
        .map(|e| (e.op.as_str(), e.db_id.as_str()))
        .collect();
    assert_eq!(
        ops,
        vec![("overrides.set", "overrides.db"), ("overrides.clear", "overrides.db")]
    );
}

#[test]
fn matrix_reads_the_store_at_each_pass() {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join("data"));
    let admin = SqliteOverrideStore::new(store.clone());
    let matrix = PermissionMatrix::new(Arc::new(SqliteOverrideStore::new(store)));

    let before = matrix.begin_pass();
    admin
        .set(Principal::System, CommandName::ListDirectory, true, "ops")
        .unwrap();
    let after = matrix.begin_pass();

    // A pass keeps the snapshot it started with.
    assert!(!before.authorize(Principal::System, Mode::ChatOnly, CommandName::ListDirectory));
    assert_eq!(
        after.evaluate(Principal::System, Mode::ChatOnly, CommandName::ListDirectory),
        Decision::Override { allowed: true }
    );
}

#[test]
fn corrupt_database_fails_closed() {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join("data"));
    store.ensure().unwrap();
    std::fs::write(store.overrides_db_path(), "this is not sqlite").unwrap();

    let overrides = SqliteOverrideStore::new(store);
    assert!(overrides.load().is_err());

    let matrix = PermissionMatrix::new(Arc::new(overrides));
    let pass = matrix.begin_pass();
    for command in CommandName::ALL {
        assert!(matches!(
            pass.evaluate(Principal::HumanAdmin, Mode::Autonomous, command),
            Decision::StoreUnavailable { .. }
        ));
    }
}
