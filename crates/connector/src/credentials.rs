// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the broker-issued API key, across connector restarts.
//!
//! A single YAML document `{broker_token: "ck-..."}`, written atomically
//! (write to a `.tmp` sibling, then rename) the same way as the broker's
//! connector store.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct OnDisk {
    broker_token: Option<String>,
}

/// Load a previously-saved broker token. Absent file, unreadable file, or
/// malformed YAML all resolve to `None` rather than an error: a connector
/// with no saved token simply starts unapproved.
pub fn load(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let doc: OnDisk = serde_yaml::from_str(&contents).ok()?;
    doc.broker_token
}

/// Persist `token` to `path`, creating parent directories if needed.
pub fn save(path: &Path, token: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(&OnDisk { broker_token: Some(token.to_owned()) })?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, yaml)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Remove the credentials file, if present.
pub fn clear(path: &Path) {
    let _ = std::fs::remove_file(path);
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
