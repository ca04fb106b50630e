// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent connector registry with an admin-driven approval lifecycle.
//!
//! Backed by a single YAML document. Loading is best-effort (an absent file
//! yields an empty store); save failures are logged and never fail the
//! calling mutation, matching `examples/original_source/src/remotellm/broker/connectors.py`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectorStatus {
    Pending,
    Approved,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub connector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub models: Vec<String>,
    pub status: ConnectorStatus,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct OnDisk {
    #[serde(default)]
    connectors: Vec<ConnectorRecord>,
}

struct Inner {
    by_id: HashMap<String, ConnectorRecord>,
    /// APPROVED connectors only; this is the index `validate()` consults.
    by_key: HashMap<String, String>,
    /// Keys of REVOKED connectors, retained only so the admission path can
    /// tell "revoked" apart from "never seen" and answer `AUTH_FAIL` instead
    /// of silently re-admitting as a new pending connector.
    revoked_keys: HashMap<String, String>,
}

impl Inner {
    fn reindex(records: Vec<ConnectorRecord>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_key = HashMap::new();
        let mut revoked_keys = HashMap::new();
        for record in records {
            if let Some(ref key) = record.api_key {
                match record.status {
                    ConnectorStatus::Approved => {
                        by_key.insert(key.clone(), record.connector_id.clone());
                    }
                    ConnectorStatus::Revoked => {
                        revoked_keys.insert(key.clone(), record.connector_id.clone());
                    }
                    ConnectorStatus::Pending => {}
                }
            }
            by_id.insert(record.connector_id.clone(), record);
        }
        Self { by_id, by_key, revoked_keys }
    }
}

/// The persistent connector registry (C2).
pub struct ConnectorStore {
    path: Option<PathBuf>,
    inner: RwLock<Inner>,
}

impl ConnectorStore {
    /// Load from `path`, if given. Absent file -> empty store (best effort).
    pub fn load(path: Option<PathBuf>) -> Self {
        let records = match path {
            Some(ref p) => load_from_disk(p),
            None => Vec::new(),
        };
        Self { path, inner: RwLock::new(Inner::reindex(records)) }
    }

    pub fn create_pending(&self, models: Vec<String>, display_name: Option<String>) -> ConnectorRecord {
        let record = ConnectorRecord {
            connector_id: generate_connector_id(),
            api_key: None,
            display_name,
            models,
            status: ConnectorStatus::Pending,
            created_at: epoch_secs(),
            last_connected_at: None,
            last_used_at: None,
        };
        {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            inner.by_id.insert(record.connector_id.clone(), record.clone());
        }
        self.save();
        record
    }

    /// Approve a PENDING connector, minting a fresh API key. Returns `None`
    /// if the connector is unknown or not currently PENDING.
    pub fn approve(&self, connector_id: &str) -> Option<String> {
        let key = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let record = inner.by_id.get_mut(connector_id)?;
            if record.status != ConnectorStatus::Pending {
                return None;
            }
            let key = generate_api_key();
            record.status = ConnectorStatus::Approved;
            record.api_key = Some(key.clone());
            inner.by_key.insert(key.clone(), connector_id.to_owned());
            key
        };
        self.save();
        Some(key)
    }

    /// Revoke an APPROVED or PENDING connector. Returns `false` if unknown or
    /// already REVOKED.
    pub fn revoke(&self, connector_id: &str) -> bool {
        let changed = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            match inner.by_id.get_mut(connector_id) {
                Some(record) if record.status != ConnectorStatus::Revoked => {
                    if let Some(ref key) = record.api_key {
                        inner.by_key.remove(key);
                        inner.revoked_keys.insert(key.clone(), connector_id.to_owned());
                    }
                    record.status = ConnectorStatus::Revoked;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.save();
        }
        changed
    }

    pub fn delete(&self, connector_id: &str) -> bool {
        let removed = {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            match inner.by_id.remove(connector_id) {
                Some(record) => {
                    if let Some(key) = record.api_key {
                        inner.by_key.remove(&key);
                    }
                    true
                }
                None => false,
            }
        };
        if removed {
            self.save();
        }
        removed
    }

    pub fn update_models(&self, connector_id: &str, models: Vec<String>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = inner.by_id.get_mut(connector_id) {
            if record.models != models {
                record.models = models;
                drop(inner);
                self.save();
            }
        }
    }

    pub fn update_last_connected(&self, connector_id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = inner.by_id.get_mut(connector_id) {
            record.last_connected_at = Some(epoch_secs());
        }
    }

    pub fn update_last_used(&self, connector_id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = inner.by_id.get_mut(connector_id) {
            record.last_used_at = Some(epoch_secs());
        }
    }

    /// Return the record for `api_key` only if it is currently APPROVED.
    pub fn validate(&self, api_key: &str) -> Option<ConnectorRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let id = inner.by_key.get(api_key)?;
        let record = inner.by_id.get(id)?;
        (record.status == ConnectorStatus::Approved).then(|| record.clone())
    }

    /// Look up a token regardless of status, for the admission path: an
    /// APPROVED hit accepts, a REVOKED hit rejects, anything else falls
    /// through to `create_pending`.
    pub fn lookup_by_token(&self, token: &str) -> Option<ConnectorRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let id = inner.by_key.get(token).or_else(|| inner.revoked_keys.get(token))?;
        inner.by_id.get(id).cloned()
    }

    pub fn get(&self, connector_id: &str) -> Option<ConnectorRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_id.get(connector_id).cloned()
    }

    pub fn list(&self) -> Vec<ConnectorRecord> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.by_id.values().cloned().collect()
    }

    fn save(&self) {
        let Some(ref path) = self.path else { return };
        let records = {
            let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
            inner.by_id.values().cloned().collect::<Vec<_>>()
        };
        if let Err(e) = save_to_disk(path, &records) {
            tracing::warn!(err = %e, path = %path.display(), "failed to persist connector store");
        }
    }
}

fn load_from_disk(path: &Path) -> Vec<ConnectorRecord> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<OnDisk>(&contents) {
            Ok(doc) => doc.connectors,
            Err(e) => {
                tracing::warn!(err = %e, path = %path.display(), "failed to parse connector store, starting empty");
                Vec::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            tracing::warn!(err = %e, path = %path.display(), "failed to read connector store, starting empty");
            Vec::new()
        }
    }
}

fn save_to_disk(path: &Path, records: &[ConnectorRecord]) -> anyhow::Result<()> {
    let doc = OnDisk { connectors: records.to_vec() };
    let yaml = serde_yaml::to_string(&doc)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, yaml)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

const HEX: &[u8; 16] = b"0123456789abcdef";

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len.div_ceil(2)];
    rand::rng().fill(bytes.as_mut_slice());
    let mut out = String::with_capacity(len);
    for b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out.truncate(len);
    out
}

pub(crate) fn generate_connector_id() -> String {
    format!("conn-{}", random_hex(8))
}

/// 128 bits of randomness, hex-encoded (32 characters).
fn generate_api_key() -> String {
    format!("ck-{}", random_hex(32))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
