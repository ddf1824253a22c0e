//! Rendering a finished crawl for people and for machines.

use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use netcrawl_core::Node;
use serde::Serialize;
use uuid::Uuid;

use crate::error::DiscoveryFailure;
use crate::result::CrawlResult;

/// Every node reachable from `root`, breadth-first, each address once.
///
/// Neighbors are followed in interface order, so the listing is stable for
/// a given graph.
pub fn walk(root: &Arc<Node>) -> Vec<Arc<Node>> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([Arc::clone(root)]);
    seen.insert(root.address());

    while let Some(node) = queue.pop_front() {
        for (_, neighbor) in node.neighbors() {
            if seen.insert(neighbor.address()) {
                queue.push_back(neighbor);
            }
        }
        order.push(node);
    }

    order
}

/// Serializable snapshot of a crawl.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyReport {
    pub crawl_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub root: IpAddr,
    pub cancelled: bool,
    pub nodes: Vec<NodeReport>,
    pub access_failures: Vec<FailureReport>,
    pub parse_failures: Vec<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub address: IpAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    pub neighbors: Vec<EdgeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeReport {
    pub interface: String,
    pub address: IpAddr,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub address: IpAddr,
    pub error: String,
    /// One entry per failed strategy, in the order they were tried.
    pub causes: Vec<String>,
}

impl FailureReport {
    fn new(address: IpAddr, failure: &DiscoveryFailure) -> Self {
        Self {
            address,
            error: failure.to_string(),
            causes: failure.causes.iter().map(ToString::to_string).collect(),
        }
    }
}

impl NodeReport {
    fn new(node: &Node) -> Self {
        Self {
            address: node.address(),
            name: node.name(),
            device_type: node.device_type(),
            neighbors: node
                .neighbors()
                .into_iter()
                .map(|(interface, n)| EdgeReport {
                    interface: interface.0,
                    address: n.address(),
                })
                .collect(),
            error: node.error(),
        }
    }
}

impl TopologyReport {
    pub fn from_result(result: &CrawlResult) -> Self {
        Self {
            crawl_id: result.crawl_id,
            started_at: result.started_at,
            duration_ms: result.duration.as_millis() as u64,
            root: result.root.address(),
            cancelled: result.cancelled,
            nodes: walk(&result.root)
                .iter()
                .map(|n| NodeReport::new(n))
                .collect(),
            access_failures: result
                .access_failures
                .iter()
                .map(|f| FailureReport::new(f.address, &f.error))
                .collect(),
            parse_failures: result
                .parse_failures
                .iter()
                .map(|f| FailureReport::new(f.address, &f.error))
                .collect(),
        }
    }

    /// Human-readable listing: one block per node, then the failures.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        for node in &self.nodes {
            let _ = write!(out, "{}", node.address);
            if let Some(name) = &node.name {
                let _ = write!(out, " ({name})");
            }
            let _ = writeln!(
                out,
                " type={}",
                node.device_type.as_deref().unwrap_or("-")
            );
            if let Some(error) = &node.error {
                let _ = writeln!(out, "  error: {error}");
                continue;
            }
            for edge in &node.neighbors {
                let _ = writeln!(out, "  {} -> {}", edge.interface, edge.address);
            }
        }

        render_failures(&mut out, "Access failures", &self.access_failures);
        render_failures(&mut out, "Parse failures", &self.parse_failures);

        if self.cancelled {
            out.push_str("\nCrawl was cancelled; the topology is incomplete.\n");
        }
        out
    }
}

fn render_failures(out: &mut String, title: &str, failures: &[FailureReport]) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title} ({}):", failures.len());
    for failure in failures {
        let _ = writeln!(out, "  {}", failure.address);
        for cause in &failure.causes {
            let _ = writeln!(out, "    {cause}");
        }
    }
}
