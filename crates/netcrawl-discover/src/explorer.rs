//! Traversal engine.
//!
//! Starts at the root device, discovers its neighbors, then fans out to
//! every neighbor not yet seen. Each address is visited at most once, and
//! every edge in the finished graph points at the one canonical node for its
//! address. Visits run concurrently on a `JoinSet` capped at the configured
//! limit; the crawl returns once the queue and the join set are both empty.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use netcrawl_core::{InterfaceId, Node};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::CrawlConfig;
use crate::error::{CrawlError, DiscoverError, DiscoveryFailure, Result, StrategyFailure};
use crate::result::{AccessFailure, CrawlResult, ParseFailure};
use crate::strategy::Discover;

/// Tuning for a crawl.
#[derive(Debug, Clone)]
pub struct ExploreOptions {
    /// Upper bound on visits in flight at once. Zero is treated as one.
    pub max_concurrent_discoveries: usize,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            max_concurrent_discoveries: 32,
        }
    }
}

impl From<&CrawlConfig> for ExploreOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            max_concurrent_discoveries: config.max_concurrent_discoveries,
        }
    }
}

/// Crawls a network from a root device using an ordered list of strategies.
pub struct Explorer {
    strategies: Arc<[Arc<dyn Discover>]>,
    max_concurrent: usize,
}

/// A node waiting to be discovered, and the edge that led to it.
struct Visit {
    node: Arc<Node>,
    parent: Arc<Node>,
    interface: InterfaceId,
}

#[derive(Default)]
struct CrawlState {
    seen: HashMap<IpAddr, Arc<Node>>,
    access_failures: Vec<AccessFailure>,
    parse_failures: Vec<ParseFailure>,
    /// Registered nodes dropped because the crawl was cancelled.
    skipped: usize,
}

type SharedState = Arc<Mutex<CrawlState>>;

impl Explorer {
    pub fn new(strategies: Vec<Arc<dyn Discover>>, options: ExploreOptions) -> Result<Self> {
        if strategies.is_empty() {
            return Err(CrawlError::NoStrategies);
        }
        Ok(Self {
            strategies: strategies.into(),
            max_concurrent: options.max_concurrent_discoveries.max(1),
        })
    }

    /// Crawl the network reachable from `root`, an IP literal or host name.
    ///
    /// Fails only when the root cannot be resolved or discovered. Every other
    /// failure is recorded on the returned result. Setting `cancel` to `true`
    /// stops new visits from starting; the partial graph is still returned.
    pub async fn explore(
        &self,
        root: &str,
        cancel: watch::Receiver<bool>,
    ) -> Result<CrawlResult> {
        let crawl_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let address = resolve_root(root).await?;
        tracing::info!(crawl_id = %crawl_id, root = %address, "Starting crawl");

        let root = Arc::new(Node::root(address));
        let state: SharedState = Arc::new(Mutex::new(CrawlState::default()));
        state.lock().seen.insert(address, Arc::clone(&root));

        if *cancel.borrow() {
            return Err(CrawlError::Cancelled);
        }
        discover_node(&self.strategies, &root)
            .await
            .map_err(CrawlError::RootDiscovery)?;

        let mut queue: VecDeque<Visit> = fan_out(&root, &state).into();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < self.max_concurrent {
                let Some(visit) = queue.pop_front() else {
                    break;
                };
                if *cancel.borrow() {
                    let dropped = 1 + queue.len();
                    mark_skipped(&visit.node);
                    queue.drain(..).for_each(|v| mark_skipped(&v.node));
                    state.lock().skipped += dropped;
                    break;
                }
                tasks.spawn(visit_node(
                    Arc::clone(&self.strategies),
                    visit,
                    Arc::clone(&state),
                    cancel.clone(),
                ));
            }

            match tasks.join_next().await {
                Some(Ok(children)) => queue.extend(children),
                Some(Err(e)) => {
                    tracing::error!(crawl_id = %crawl_id, error = %e, "Discovery task panicked");
                }
                None => break,
            }
        }

        let CrawlState {
            seen,
            access_failures,
            parse_failures,
            skipped,
        } = match Arc::try_unwrap(state) {
            Ok(state) => state.into_inner(),
            Err(shared) => std::mem::take(&mut *shared.lock()),
        };

        if skipped > 0 {
            tracing::warn!(crawl_id = %crawl_id, skipped, "Crawl cancelled, pending nodes not visited");
        }

        let duration = start.elapsed();
        tracing::info!(
            crawl_id = %crawl_id,
            root = %address,
            nodes = seen.len(),
            access_failures = access_failures.len(),
            parse_failures = parse_failures.len(),
            duration_ms = duration.as_millis() as u64,
            "Crawl complete"
        );

        Ok(CrawlResult::new(
            crawl_id,
            started_at,
            duration,
            root,
            seen.into_values().collect(),
            access_failures,
            parse_failures,
            skipped > 0,
        ))
    }
}

/// Resolve the root to a canonical address. Names take the resolver's first
/// answer.
async fn resolve_root(root: &str) -> Result<IpAddr> {
    let root = root.trim();
    if let Ok(ip) = root.parse::<IpAddr>() {
        return Ok(ip.to_canonical());
    }

    let resolve_err = |reason: String| CrawlError::Resolve {
        root: root.to_string(),
        reason,
    };
    let mut addrs = tokio::net::lookup_host((root, 0))
        .await
        .map_err(|e| resolve_err(e.to_string()))?;
    addrs
        .next()
        .map(|sa| sa.ip().to_canonical())
        .ok_or_else(|| resolve_err("no addresses returned".to_string()))
}

/// Try each strategy in order until one succeeds. A strategy that leaves the
/// node invalid counts as a parse failure and the next one is tried.
async fn discover_node(
    strategies: &[Arc<dyn Discover>],
    node: &Node,
) -> std::result::Result<(), DiscoveryFailure> {
    let mut causes = Vec::new();
    for strategy in strategies {
        match strategy.discover(node).await {
            Ok(()) => match node.validate() {
                Ok(()) => {
                    tracing::debug!(
                        address = %node.address(),
                        strategy = strategy.name(),
                        neighbors = node.neighbor_count(),
                        "Discovered node"
                    );
                    return Ok(());
                }
                Err(source) => causes.push(StrategyFailure {
                    strategy: strategy.name().to_string(),
                    error: DiscoverError::Invalid {
                        address: node.address(),
                        source,
                    },
                }),
            },
            Err(error) => causes.push(StrategyFailure {
                strategy: strategy.name().to_string(),
                error,
            }),
        }
    }
    Err(DiscoveryFailure {
        address: node.address(),
        causes,
    })
}

async fn visit_node(
    strategies: Arc<[Arc<dyn Discover>]>,
    visit: Visit,
    state: SharedState,
    cancel: watch::Receiver<bool>,
) -> Vec<Visit> {
    let Visit {
        node,
        parent,
        interface,
    } = visit;
    let address = node.address();

    if *cancel.borrow() {
        tracing::debug!(address = %address, "Crawl cancelled, skipping node");
        mark_skipped(&node);
        state.lock().skipped += 1;
        return Vec::new();
    }

    match discover_node(&strategies, &node).await {
        Ok(()) => {
            parent.set_neighbor(interface, Arc::clone(&node));
            fan_out(&node, &state)
        }
        Err(failure) => {
            node.set_error(failure.to_string());
            if failure.is_parse_failure() {
                tracing::warn!(address = %address, error = %failure, "Could not parse neighbor output");
                state.lock().parse_failures.push(ParseFailure {
                    address,
                    error: failure,
                });
            } else {
                tracing::warn!(address = %address, error = %failure, "Could not reach node");
                state.lock().access_failures.push(AccessFailure {
                    address,
                    error: failure,
                });
            }
            Vec::new()
        }
    }
}

fn mark_skipped(node: &Node) {
    node.set_error("not visited: crawl cancelled");
}

/// Register each of `node`'s unseen neighbors and return them as visits.
/// Edges to already-seen addresses are repointed at the canonical node.
fn fan_out(node: &Arc<Node>, state: &Mutex<CrawlState>) -> Vec<Visit> {
    let mut next = Vec::new();

    for (interface, neighbor) in node.neighbors() {
        let canonical = match state.lock().seen.entry(neighbor.address()) {
            Entry::Occupied(seen) => Some(Arc::clone(seen.get())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&neighbor));
                None
            }
        };

        match canonical {
            Some(seen) => {
                if !Arc::ptr_eq(&seen, &neighbor) {
                    node.set_neighbor(interface, seen);
                }
            }
            None => next.push(Visit {
                node: neighbor,
                parent: Arc::clone(node),
                interface,
            }),
        }
    }

    next
}
