//! In-memory site tree: one node per scanned resource, with the alerts
//! attached to it.
//!
//! Node keys are computed by the caller (see `services::fingerprint`) so the
//! tree itself stays a plain container.

use std::collections::HashMap;

/// One resource node in the site tree.
#[derive(Debug, Clone)]
pub struct SiteNode {
    pub id: u64,
    pub key: String,
    pub method: String,
    pub path: String,
    alert_ids: Vec<i64>,
}

impl SiteNode {
    /// Alerts attached to this node, in attachment order.
    pub fn alert_ids(&self) -> &[i64] {
        &self.alert_ids
    }
}

/// Site tree indexed by node key.
#[derive(Debug, Default)]
pub struct SiteTree {
    nodes: Vec<SiteNode>,
    by_key: HashMap<String, u64>,
}

impl SiteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the node for a resource, returning its id.
    pub fn add_path(&mut self, key: &str, method: &str, path: &str) -> u64 {
        if let Some(id) = self.by_key.get(key) {
            return *id;
        }
        let id = self.nodes.len() as u64;
        self.nodes.push(SiteNode {
            id,
            key: key.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            alert_ids: Vec::new(),
        });
        self.by_key.insert(key.to_string(), id);
        id
    }

    pub fn node(&self, id: u64) -> Option<&SiteNode> {
        self.nodes.get(id as usize)
    }

    /// Attach an alert to a node; duplicates are ignored.
    pub fn attach_alert(&mut self, node_id: u64, alert_id: i64) {
        if let Some(node) = self.nodes.get_mut(node_id as usize) {
            if !node.alert_ids.contains(&alert_id) {
                node.alert_ids.push(alert_id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
