//! Remote session capability.
//!
//! Discovery only needs "log into a device, run one command, get the text
//! back". `Connector` opens sessions and `Session` runs commands; the SSH
//! implementation lives in [`crate::ssh`] and a table-driven fake in
//! [`crate::fake`]. Both are handed to strategies at construction.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::config::SshCredentials;
use crate::error::SessionError;

/// Opens authenticated sessions to devices.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        address: IpAddr,
        credentials: &SshCredentials,
    ) -> Result<Box<dyn Session>, SessionError>;
}

/// An open session to one device.
#[async_trait]
pub trait Session: Send {
    /// Run `command` and return its combined stdout/stderr.
    async fn run(&mut self, command: &str) -> Result<Vec<u8>, SessionError>;

    /// Release the session and its connection.
    async fn close(&mut self);
}

/// Connect, run a single command, and close the session whatever happened.
pub async fn run_command(
    connector: &dyn Connector,
    address: IpAddr,
    credentials: &SshCredentials,
    command: &str,
) -> Result<Vec<u8>, SessionError> {
    let mut session = connector.connect(address, credentials).await?;
    let output = session.run(command).await;
    session.close().await;
    output
}
