//! Core topology types for netcrawl.
//!
//! A crawl produces a graph of `Node`s keyed by address. Nodes are shared
//! between concurrent visitors as `Arc<Node>`; every mutable field sits
//! behind the node's own lock so fields filled in by one visitor are visible
//! to the next.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::NodeError;

/// Device type given to the vertex a crawl starts from.
pub const ROOT_DEVICE_TYPE: &str = "root";

/// Device type recorded when discovery succeeds but nothing named the device.
pub const UNKNOWN_DEVICE_TYPE: &str = "unknown";

// ── Interfaces ────────────────────────────────────────────────────

/// A vendor-specific local interface name, e.g. `FastEthernet0/1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceId(pub String);

impl InterfaceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InterfaceId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for InterfaceId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for InterfaceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── Device Records ────────────────────────────────────────────────

/// One neighbor entry parsed out of a discovery command's output.
///
/// `interface` is the *host's* interface facing this device, so each record
/// becomes exactly one edge of the host node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Hostname the device announced, if any.
    pub name: Option<String>,
    pub address: IpAddr,
    pub device_type: String,
    pub interface: InterfaceId,
}

// ── Nodes ─────────────────────────────────────────────────────────

/// A network device in the discovered topology.
///
/// The address is fixed at construction and is the only identity a node has.
/// Everything else may start out empty (a "shell" created from a neighbor
/// record) and be completed later when the device itself is visited.
pub struct Node {
    address: IpAddr,
    state: Mutex<NodeState>,
}

#[derive(Default)]
struct NodeState {
    name: Option<String>,
    device_type: Option<String>,
    neighbors: BTreeMap<InterfaceId, Arc<Node>>,
    error: Option<String>,
}

impl Node {
    /// Create a node with only an address.
    ///
    /// The address is canonicalised, so `::ffff:10.0.0.1` becomes `10.0.0.1`.
    pub fn new(address: IpAddr) -> Self {
        Self {
            address: address.to_canonical(),
            state: Mutex::new(NodeState::default()),
        }
    }

    /// Create the vertex a crawl starts from.
    pub fn root(address: IpAddr) -> Self {
        let node = Self::new(address);
        node.state.lock().device_type = Some(ROOT_DEVICE_TYPE.to_string());
        node
    }

    /// Create a shell node for a device seen in a neighbor listing.
    pub fn from_record(record: &DeviceRecord) -> Self {
        let node = Self::new(record.address);
        {
            let mut state = node.state.lock();
            state.name = record.name.clone();
            if !record.device_type.is_empty() {
                state.device_type = Some(record.device_type.clone());
            }
        }
        node
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn name(&self) -> Option<String> {
        self.state.lock().name.clone()
    }

    pub fn device_type(&self) -> Option<String> {
        self.state.lock().device_type.clone()
    }

    pub fn set_device_type(&self, device_type: impl Into<String>) {
        self.state.lock().device_type = Some(device_type.into());
    }

    /// Snapshot of the neighbor edges, ordered by interface.
    pub fn neighbors(&self) -> Vec<(InterfaceId, Arc<Node>)> {
        self.state
            .lock()
            .neighbors
            .iter()
            .map(|(iface, node)| (iface.clone(), Arc::clone(node)))
            .collect()
    }

    /// The neighbor reached through `interface`, if any.
    pub fn neighbor(&self, interface: &str) -> Option<Arc<Node>> {
        self.state.lock().neighbors.get(interface).cloned()
    }

    pub fn neighbor_count(&self) -> usize {
        self.state.lock().neighbors.len()
    }

    /// Point the edge on `interface` at `node`, replacing any previous target.
    pub fn set_neighbor(&self, interface: InterfaceId, node: Arc<Node>) {
        self.state.lock().neighbors.insert(interface, node);
    }

    /// Install a freshly discovered neighbor set in one step.
    ///
    /// Replaces whatever a previous (possibly failed) attempt left behind and
    /// makes sure the device type is populated.
    pub fn complete(&self, neighbors: BTreeMap<InterfaceId, Arc<Node>>) {
        let mut state = self.state.lock();
        state.neighbors = neighbors;
        if state.device_type.as_deref().map_or(true, str::is_empty) {
            state.device_type = Some(UNKNOWN_DEVICE_TYPE.to_string());
        }
    }

    /// Drop every edge. Used to break `Arc` cycles once a crawl is discarded.
    pub fn clear_neighbors(&self) {
        self.state.lock().neighbors.clear();
    }

    /// Terminal error recorded when this node could not be discovered.
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn set_error(&self, error: impl Into<String>) {
        self.state.lock().error = Some(error.into());
    }

    /// Check the populated fields are usable.
    pub fn validate(&self) -> Result<(), NodeError> {
        let state = self.state.lock();
        if state.device_type.as_deref() == Some("") {
            return Err(NodeError::EmptyType {
                address: self.address.to_string(),
            });
        }
        if state.neighbors.keys().any(|iface| iface.as_str().is_empty()) {
            return Err(NodeError::EmptyInterface {
                address: self.address.to_string(),
            });
        }
        Ok(())
    }
}

// Neighbors are printed by address only; the graph may be cyclic.
impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let neighbors: BTreeMap<&str, IpAddr> = state
            .neighbors
            .iter()
            .map(|(iface, node)| (iface.as_str(), node.address))
            .collect();
        f.debug_struct("Node")
            .field("address", &self.address)
            .field("name", &state.name)
            .field("device_type", &state.device_type)
            .field("neighbors", &neighbors)
            .field("error", &state.error)
            .finish()
    }
}
