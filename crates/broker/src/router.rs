// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory model -> connector routing table (C3).
//!
//! Grounded on `examples/original_source/src/remotellm/broker/router.py`'s
//! first-registered-wins rebuild algorithm. The whole table is rebuilt under
//! a single write-lock acquisition so a reader observes either the fully-old
//! or fully-new table, never a partial one, matching the `RwLock`-guarded
//! state pattern in the teacher's `mux/src/state.rs`.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct ConnectorModels {
    models: Vec<String>,
    upstream_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub connector_id: String,
    pub upstream_key: Option<String>,
}

struct Inner {
    /// Insertion order of currently-registered connectors; first-registered wins.
    order: Vec<String>,
    connectors: HashMap<String, ConnectorModels>,
    routes: HashMap<String, RouteEntry>,
}

impl Inner {
    fn rebuild(&mut self) {
        let mut routes = HashMap::new();
        for id in &self.order {
            let Some(cm) = self.connectors.get(id) else { continue };
            for model in &cm.models {
                routes.entry(model.clone()).or_insert_with(|| RouteEntry {
                    connector_id: id.clone(),
                    upstream_key: cm.upstream_key.clone(),
                });
            }
        }
        self.routes = routes;
    }
}

/// The broker's model router (C3).
pub struct ModelRouter {
    inner: RwLock<Inner>,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner { order: Vec::new(), connectors: HashMap::new(), routes: HashMap::new() }) }
    }

    pub fn on_registered(&self, connector_id: &str, models: Vec<String>, upstream_key: Option<String>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !inner.connectors.contains_key(connector_id) {
            inner.order.push(connector_id.to_owned());
        }
        inner.connectors.insert(connector_id.to_owned(), ConnectorModels { models, upstream_key });
        inner.rebuild();
    }

    pub fn on_disconnected(&self, connector_id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.connectors.remove(connector_id);
        inner.order.retain(|id| id != connector_id);
        inner.rebuild();
    }

    pub fn get_route(&self, model: &str) -> Option<RouteEntry> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.routes.get(model).cloned()
    }

    pub fn list_models(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.routes.keys().cloned().collect()
    }

    pub fn list_connectors(&self) -> Vec<(String, Vec<String>)> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.order.iter().filter_map(|id| inner.connectors.get(id).map(|cm| (id.clone(), cm.models.clone()))).collect()
    }

    pub fn connector_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.connectors.len()
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
