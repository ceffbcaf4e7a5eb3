//! Last-known connector inventory and set differences

use std::collections::HashSet;

use port_detect::ConnectorId;

/// Ordered set of connectors as last observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorInventory {
    connectors: Vec<ConnectorId>,
}

impl ConnectorInventory {
    pub fn new(connectors: Vec<ConnectorId>) -> Self {
        let mut seen = HashSet::new();
        Self {
            connectors: connectors
                .into_iter()
                .filter(|c| seen.insert(c.clone()))
                .collect(),
        }
    }

    /// `live − self`, in live order
    pub fn added_in(&self, live: &[ConnectorId]) -> Vec<ConnectorId> {
        let known: HashSet<&ConnectorId> = self.connectors.iter().collect();
        let mut seen = HashSet::new();
        live.iter()
            .filter(|c| !known.contains(c) && seen.insert(*c))
            .cloned()
            .collect()
    }

    /// `self − live`, in inventory order
    pub fn removed_in(&self, live: &[ConnectorId]) -> Vec<ConnectorId> {
        let live: HashSet<&ConnectorId> = live.iter().collect();
        self.connectors
            .iter()
            .filter(|c| !live.contains(c))
            .cloned()
            .collect()
    }

    pub fn contains(&self, connector: &str) -> bool {
        self.connectors.iter().any(|c| c.as_str() == connector)
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    pub fn as_slice(&self) -> &[ConnectorId] {
        &self.connectors
    }
}
