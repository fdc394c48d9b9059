use parley::core::broker::read_audit_log;
use parley::core::db::initialize_data_db;
use parley::core::error::{CapabilityError, ParleyError};
use parley::core::store::Store;
use parley::plugins::data_query::{
    DataQuery, SqliteDataQuery, add_roster_entry, render_status, set_status,
};
use tempfile::tempdir;

#[test]
fn test_uninitialised_store_is_unavailable() {
    let tmp = tempdir().unwrap();
    let query = SqliteDataQuery::new(Store::new(tmp.path().join("data")));
    assert!(matches!(query.list_roster(), Err(CapabilityError::Unavailable(_))));
}

#[test]
fn test_roster_lifecycle() {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join("data"));
    initialize_data_db(&store).unwrap();
    let query = SqliteDataQuery::new(store.clone());
    assert!(query.list_roster().unwrap().is_empty());

    add_roster_entry(&store, "zed", "peer", "", "ops").unwrap();
    add_roster_entry(&store, "ada", "admin", "10.0.0.2", "ops").unwrap();
    add_roster_entry(&store, "zed", "observer", "10.0.0.9", "ops").unwrap();

    let roster = query.list_roster().unwrap();
    let rows: Vec<(&str, &str, &str)> = roster
        .iter()
        .map(|e| (e.name.as_str(), e.role.as_str(), e.address.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![("ada", "admin", "10.0.0.2"), ("zed", "observer", "10.0.0.9")]
    );

    let audit = read_audit_log(&store).unwrap();
    let adds = audit.iter().filter(|e| e.op == "data.roster.add").count();
    assert_eq!(adds, 3);
    assert!(audit.iter().all(|e| e.status == "success"));
}

#[test]
fn test_status_rows_upsert() {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join("data"));
    set_status(&store, "indexer", "degraded", "slow disk", "ops").unwrap();
    set_status(&store, "api", "up", "", "ops").unwrap();
    set_status(&store, "indexer", "up", "", "ops").unwrap();

    let status = SqliteDataQuery::new(store).list_status().unwrap();
    assert_eq!(render_status(&status), "api: up\nindexer: up\n");
}

#[test]
fn test_admin_writes_validate_input() {
    let tmp = tempdir().unwrap();
    let store = Store::new(tmp.path().join("data"));
    assert!(matches!(
        add_roster_entry(&store, " ", "peer", "", "ops"),
        Err(ParleyError::ValidationError(_))
    ));
    assert!(matches!(
        set_status(&store, "api", "", "", "ops"),
        Err(ParleyError::ValidationError(_))
    ));
}
