//! Error types for the netcrawl-discover crate.

use std::fmt::Display;
use std::net::IpAddr;

use netcrawl_core::NodeError;
use thiserror::Error;

/// Neighbor output that could not be trusted past a given line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Did not find any devices listed")]
    NoDevices,

    #[error("Line {line}: found an IP address line but could not decode {value:?}")]
    InvalidAddress { line: usize, value: String },

    #[error("Line {line}: could not find the platform in {raw:?}")]
    MissingCapabilities { line: usize, raw: String },
}

/// Failures of the remote session collaborator.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not connect to {address}: {reason}")]
    Connect { address: IpAddr, reason: String },

    #[error("Timed out after {timeout_secs}s connecting to {address}")]
    Timeout { address: IpAddr, timeout_secs: u64 },

    #[error("Authentication rejected for user {user} on {address}")]
    AuthRejected { address: IpAddr, user: String },

    #[error("Session error on {address}: {reason}")]
    Channel { address: IpAddr, reason: String },

    #[error("Command {command:?} on {address} exited with status {status}")]
    Command {
        address: IpAddr,
        command: String,
        status: u32,
    },
}

/// Failures of a single discovery strategy.
#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("No SSH credentials configured")]
    NoCredentials,

    #[error(
        "Could not log in to {address} with any of {} credential(s): {}",
        .causes.len(),
        join_causes(.causes)
    )]
    Unreachable {
        address: IpAddr,
        causes: Vec<SessionError>,
    },

    #[error("Problems reading neighbor output from {address}: {source}")]
    Parse {
        address: IpAddr,
        #[source]
        source: ParseError,
    },

    #[error("Neighbor output from {address} produced an invalid node: {source}")]
    Invalid {
        address: IpAddr,
        #[source]
        source: NodeError,
    },
}

impl DiscoverError {
    /// The device answered but what it said was unusable.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Invalid { .. })
    }
}

/// One strategy's contribution to a failed discovery.
#[derive(Error, Debug)]
#[error("{strategy}: {error}")]
pub struct StrategyFailure {
    pub strategy: String,
    #[source]
    pub error: DiscoverError,
}

/// Every configured strategy failed to discover a node.
///
/// Causes are kept in strategy order so callers can inspect each one.
#[derive(Error, Debug)]
#[error(
    "All {} discovery strategies failed for {address}: {}",
    .causes.len(),
    join_causes(.causes)
)]
pub struct DiscoveryFailure {
    pub address: IpAddr,
    pub causes: Vec<StrategyFailure>,
}

impl DiscoveryFailure {
    /// The device answered but its output could not be parsed.
    pub fn is_parse_failure(&self) -> bool {
        self.causes.iter().any(|c| c.error.is_parse())
    }
}

/// Crawl-level errors. Only problems with the root abort a crawl.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("No discovery strategies configured")]
    NoStrategies,

    #[error("Root node {root} was not an IP and could not be resolved: {reason}")]
    Resolve { root: String, reason: String },

    #[error("Could not discover root node: {0}")]
    RootDiscovery(#[source] DiscoveryFailure),

    #[error("Crawl cancelled before the root node was discovered")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, CrawlError>;

fn join_causes<E: Display>(causes: &[E]) -> String {
    causes
        .iter()
        .enumerate()
        .map(|(i, cause)| format!("[{}] {cause}", i + 1))
        .collect::<Vec<_>>()
        .join("; ")
}
