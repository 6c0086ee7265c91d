//! Node registry.
//!
//! Loads the list of monitored nodes and keeps it, in file order, for the
//! lifetime of the process. The only runtime mutation is the per-endpoint
//! latency history appended by the scheduler.

mod endpoint;
mod schema;

pub use endpoint::Endpoint;
pub use schema::{NodeEntry, NodeListFile};

use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::error::LoadError;

/// Ordered set of endpoints sharing one network label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkCollection {
    network: String,
    endpoints: Vec<Endpoint>,
}

impl NetworkCollection {
    /// Build a collection from already parsed endpoints.
    pub fn new(network: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self { network: network.into(), endpoints }
    }

    /// Load a node list file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Read { path: path.to_path_buf(), source })?;
        let collection = Self::from_json(&raw)?;
        info!(
            network = %collection.network,
            nodes = collection.len(),
            "Loaded node list from {}",
            path.display()
        );
        Ok(collection)
    }

    /// Parse a node list from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, LoadError> {
        let file: NodeListFile = serde_json::from_str(raw)?;
        Ok(Self::from_node_list(file))
    }

    /// Parse a node list from any reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, LoadError> {
        let file: NodeListFile = serde_json::from_reader(reader)?;
        Ok(Self::from_node_list(file))
    }

    /// Convert the file schema, keeping entry order.
    pub fn from_node_list(file: NodeListFile) -> Self {
        Self {
            network: file.network,
            endpoints: file.block_producer_list.into_iter().map(Endpoint::from_entry).collect(),
        }
    }

    /// Serialize back to the file schema. Latency history is not part of it.
    pub fn to_node_list(&self) -> NodeListFile {
        NodeListFile {
            network: self.network.clone(),
            block_producer_list: self.endpoints.iter().map(Endpoint::to_entry).collect(),
        }
    }

    /// Network label shared by every endpoint.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Number of endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoint at `index` in file order.
    pub fn get(&self, index: usize) -> Option<&Endpoint> {
        self.endpoints.get(index)
    }

    /// Mutable endpoint at `index`, used to record latencies.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }
}

impl<'a> IntoIterator for &'a NetworkCollection {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
