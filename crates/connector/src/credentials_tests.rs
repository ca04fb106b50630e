use super::*;

#[test]
fn load_returns_none_for_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    assert_eq!(load(&path), None);
}

#[test]
fn load_returns_none_for_malformed_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    std::fs::write(&path, "not: [valid: yaml:").unwrap();
    assert_eq!(load(&path), None);
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    save(&path, "ck-0123456789abcdef0123456789abcdef").unwrap();
    assert_eq!(load(&path), Some("ck-0123456789abcdef0123456789abcdef".to_owned()));
}

#[test]
fn save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deep").join("credentials.yaml");
    save(&path, "ck-0123456789abcdef0123456789abcdef").unwrap();
    assert_eq!(load(&path), Some("ck-0123456789abcdef0123456789abcdef".to_owned()));
}

#[test]
fn save_overwrites_previous_token() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    save(&path, "ck-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
    save(&path, "ck-bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();
    assert_eq!(load(&path), Some("ck-bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_owned()));
}

#[test]
fn clear_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    save(&path, "ck-0123456789abcdef0123456789abcdef").unwrap();
    clear(&path);
    assert_eq!(load(&path), None);
    assert!(!path.exists());
}

#[test]
fn clear_on_missing_file_does_not_panic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    clear(&path);
}
