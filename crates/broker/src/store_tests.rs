use super::*;
use remotellm_protocol::{is_connector_api_key, is_connector_id};

#[test]
fn create_pending_then_approve_then_validate() {
    let store = ConnectorStore::load(None);
    let record = store.create_pending(vec!["m1".into()], Some("box-1".into()));
    assert!(is_connector_id(&record.connector_id));
    assert_eq!(record.status, ConnectorStatus::Pending);
    assert!(record.api_key.is_none());

    let key = store.approve(&record.connector_id).expect("approve should succeed once");
    assert!(is_connector_api_key(&key));

    let validated = store.validate(&key).expect("approved key should validate");
    assert_eq!(validated.connector_id, record.connector_id);
}

#[test]
fn approve_twice_fails_second_time() {
    let store = ConnectorStore::load(None);
    let record = store.create_pending(vec!["m1".into()], None);
    assert!(store.approve(&record.connector_id).is_some());
    assert!(store.approve(&record.connector_id).is_none());
}

#[test]
fn revoke_removes_key_from_index() {
    let store = ConnectorStore::load(None);
    let record = store.create_pending(vec!["m1".into()], None);
    let key = store.approve(&record.connector_id).unwrap();
    assert!(store.revoke(&record.connector_id));
    assert!(store.validate(&key).is_none());
    let reloaded = store.get(&record.connector_id).unwrap();
    assert_eq!(reloaded.status, ConnectorStatus::Revoked);
}

#[test]
fn revoked_token_is_distinguishable_from_an_unknown_one() {
    let store = ConnectorStore::load(None);
    let record = store.create_pending(vec!["m1".into()], None);
    let key = store.approve(&record.connector_id).unwrap();
    store.revoke(&record.connector_id);

    let lookup = store.lookup_by_token(&key).expect("revoked token should still resolve for admission");
    assert_eq!(lookup.status, ConnectorStatus::Revoked);
    assert!(store.lookup_by_token("ck-neverissued00000000000000000000").is_none());
}

#[test]
fn delete_removes_record_entirely() {
    let store = ConnectorStore::load(None);
    let record = store.create_pending(vec!["m1".into()], None);
    assert!(store.delete(&record.connector_id));
    assert!(store.get(&record.connector_id).is_none());
    assert!(!store.delete(&record.connector_id));
}

#[test]
fn save_and_reload_round_trips_through_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("connectors.yaml");

    let record = {
        let store = ConnectorStore::load(Some(path.clone()));
        let record = store.create_pending(vec!["m1".into(), "m2".into()], Some("box".into()));
        store.approve(&record.connector_id);
        store.get(&record.connector_id).unwrap()
    };

    let reloaded_store = ConnectorStore::load(Some(path));
    let reloaded = reloaded_store.get(&record.connector_id).unwrap();
    assert_eq!(reloaded.status, ConnectorStatus::Approved);
    assert_eq!(reloaded.models, vec!["m1".to_owned(), "m2".to_owned()]);
}

#[test]
fn missing_file_yields_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.yaml");
    let store = ConnectorStore::load(Some(path));
    assert!(store.list().is_empty());
}

#[test]
fn generated_ids_and_keys_are_unique_across_many_generations() {
    let store = ConnectorStore::load(None);
    let mut ids = std::collections::HashSet::new();
    let mut keys = std::collections::HashSet::new();
    for _ in 0..2000 {
        let record = store.create_pending(vec!["m".into()], None);
        assert!(ids.insert(record.connector_id.clone()), "connector_id collision");
        let key = store.approve(&record.connector_id).unwrap();
        assert!(keys.insert(key), "api_key collision");
    }
}
