//! The frozen outcome of one crawl.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use netcrawl_core::Node;
use uuid::Uuid;

use crate::error::DiscoveryFailure;

/// A non-root node no strategy could log into.
#[derive(Debug)]
pub struct AccessFailure {
    pub address: IpAddr,
    pub error: DiscoveryFailure,
}

/// A non-root node whose neighbor output could not be parsed.
#[derive(Debug)]
pub struct ParseFailure {
    pub address: IpAddr,
    pub error: DiscoveryFailure,
}

/// Result of a crawl that reached its root.
///
/// Holds every canonical node discovered. Edges between nodes are strong
/// references and usually cyclic, so dropping the result clears every
/// node's neighbor map, including nodes still held through cloned `Arc`s.
/// Build a `TopologyReport` or copy out what you need before letting it go.
pub struct CrawlResult {
    /// Unique ID for this crawl run.
    pub crawl_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the crawl.
    pub duration: Duration,
    /// Entry point of the graph. A clone of this `Arc` outlives the result,
    /// but its edges (and every other node's) are cleared when the result
    /// is dropped.
    pub root: Arc<Node>,
    pub access_failures: Vec<AccessFailure>,
    pub parse_failures: Vec<ParseFailure>,
    /// The crawl was cancelled and some nodes were never visited. Those
    /// nodes carry a "not visited" error.
    pub cancelled: bool,
    nodes: Vec<Arc<Node>>,
}

impl CrawlResult {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        crawl_id: Uuid,
        started_at: DateTime<Utc>,
        duration: Duration,
        root: Arc<Node>,
        mut nodes: Vec<Arc<Node>>,
        access_failures: Vec<AccessFailure>,
        parse_failures: Vec<ParseFailure>,
        cancelled: bool,
    ) -> Self {
        nodes.sort_by_key(|n| n.address());
        Self {
            crawl_id,
            started_at,
            duration,
            root,
            access_failures,
            parse_failures,
            cancelled,
            nodes,
        }
    }

    /// Every canonical node, ordered by address. Includes nodes that were
    /// seen as neighbors but could not be discovered themselves.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn node(&self, address: IpAddr) -> Option<&Arc<Node>> {
        let address = address.to_canonical();
        self.nodes
            .binary_search_by_key(&address, |n| n.address())
            .ok()
            .and_then(|i| self.nodes.get(i))
    }
}

impl Drop for CrawlResult {
    fn drop(&mut self) {
        for node in &self.nodes {
            node.clear_neighbors();
        }
    }
}

impl std::fmt::Debug for CrawlResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlResult")
            .field("crawl_id", &self.crawl_id)
            .field("root", &self.root.address())
            .field("nodes", &self.nodes.len())
            .field("access_failures", &self.access_failures.len())
            .field("parse_failures", &self.parse_failures.len())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}
