//! Discovery strategies: ways of learning a node's neighbors.

use std::sync::Arc;

use async_trait::async_trait;
use netcrawl_core::Node;

use crate::cdp;
use crate::config::{CrawlConfig, SshCredentials};
use crate::error::DiscoverError;
use crate::session::{run_command, Connector};

/// A method for populating a node's device type and neighbor set.
///
/// On success the node's type and neighbors are fully populated (possibly
/// with no neighbors). On failure nothing half-written is left behind that a
/// later strategy could not overwrite.
#[async_trait]
pub trait Discover: Send + Sync {
    /// Short name used in logs and error chains.
    fn name(&self) -> &str;

    async fn discover(&self, node: &Node) -> Result<(), DiscoverError>;
}

/// Log into the device over SSH and parse `show cdp neighbors detail`.
pub struct CdpDiscovery {
    connector: Arc<dyn Connector>,
    credentials: Vec<SshCredentials>,
    command: String,
}

impl CdpDiscovery {
    pub fn new(
        connector: Arc<dyn Connector>,
        credentials: Vec<SshCredentials>,
        command: &str,
    ) -> Result<Self, DiscoverError> {
        if credentials.is_empty() {
            return Err(DiscoverError::NoCredentials);
        }
        Ok(Self {
            connector,
            credentials,
            command: command.to_string(),
        })
    }
}

#[async_trait]
impl Discover for CdpDiscovery {
    fn name(&self) -> &str {
        "cdp-ssh"
    }

    async fn discover(&self, node: &Node) -> Result<(), DiscoverError> {
        let address = node.address();
        let mut causes = Vec::new();
        let mut output = None;

        for creds in &self.credentials {
            match run_command(self.connector.as_ref(), address, creds, &self.command).await {
                Ok(bytes) => {
                    output = Some(bytes);
                    break;
                }
                Err(e) => {
                    tracing::debug!(address = %address, user = %creds.user, error = %e, "Login attempt failed");
                    causes.push(e);
                }
            }
        }

        let Some(output) = output else {
            return Err(DiscoverError::Unreachable { address, causes });
        };

        let text = String::from_utf8_lossy(&output);
        let neighbors = cdp::parse_into(node, &text)
            .map_err(|source| DiscoverError::Parse { address, source })?;

        tracing::debug!(address = %address, neighbors, "Parsed CDP neighbors");
        Ok(())
    }
}

/// Build the ordered strategy list described by `config`.
pub fn strategies_from_config(
    config: &CrawlConfig,
    connector: Arc<dyn Connector>,
) -> Result<Vec<Arc<dyn Discover>>, DiscoverError> {
    let cdp: Arc<dyn Discover> =
        Arc::new(CdpDiscovery::new(connector, config.ssh.clone(), &config.command)?);
    Ok(vec![cdp])
}
