//! Tests for MemoryStore

use super::*;
use crate::error::Error;
use tempfile::tempdir;

#[test]
fn test_missing_file_is_none() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::new(dir.path().join(".last_session"));

    assert!(store.load().is_none());
    assert!(store.try_load().unwrap().is_none());
}

#[tokio::test]
async fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::new(dir.path().join(".last_session"));

    let memory = SessionMemory::new("450").with_name(Some("Data Science".into()));
    store.save(&memory).await.unwrap();

    assert_eq!(store.load(), Some(memory));
    assert!(!dir.path().join(".last_session.tmp").exists());
}

#[tokio::test]
async fn test_save_overwrites() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::new(dir.path().join(".last_session"));

    store.save(&SessionMemory::new("1")).await.unwrap();
    store.save(&SessionMemory::new("2")).await.unwrap();

    assert_eq!(store.load().unwrap().course_id, "2");
}

#[test]
fn test_corrupt_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".last_session");
    std::fs::write(&path, "not json").unwrap();

    let store = MemoryStore::new(&path);
    assert!(matches!(store.try_load(), Err(Error::State { .. })));
    assert!(store.load().is_none());
}

#[tokio::test]
async fn test_clear() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::new(dir.path().join(".last_session"));

    store.clear().await.unwrap();

    store.save(&SessionMemory::new("7")).await.unwrap();
    store.clear().await.unwrap();
    assert!(store.load().is_none());
    assert!(!store.path().exists());
}
