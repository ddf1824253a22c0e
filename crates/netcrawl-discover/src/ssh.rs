//! SSH sessions via `russh`.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};

use crate::config::SshCredentials;
use crate::error::SessionError;
use crate::session::{Connector, Session};

/// Client handler that accepts any server host key.
struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Password-authenticated SSH connector.
pub struct SshConnector {
    port: u16,
}

impl SshConnector {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        address: IpAddr,
        credentials: &SshCredentials,
    ) -> Result<Box<dyn Session>, SessionError> {
        let config = Arc::new(client::Config::default());

        let login = async {
            let mut handle = client::connect(config, (address, self.port), AcceptAnyHostKey)
                .await
                .map_err(|e| SessionError::Connect {
                    address,
                    reason: e.to_string(),
                })?;

            let auth = handle
                .authenticate_password(credentials.user.clone(), credentials.password.clone())
                .await
                .map_err(|e| SessionError::Channel {
                    address,
                    reason: e.to_string(),
                })?;

            if !auth.success() {
                return Err(SessionError::AuthRejected {
                    address,
                    user: credentials.user.clone(),
                });
            }
            Ok(handle)
        };

        let handle = tokio::time::timeout(credentials.timeout(), login)
            .await
            .map_err(|_| SessionError::Timeout {
                address,
                timeout_secs: credentials.timeout_secs,
            })??;

        tracing::debug!(address = %address, user = %credentials.user, "SSH session established");
        Ok(Box::new(SshSession { address, handle }))
    }
}

struct SshSession {
    address: IpAddr,
    handle: Handle<AcceptAnyHostKey>,
}

#[async_trait]
impl Session for SshSession {
    async fn run(&mut self, command: &str) -> Result<Vec<u8>, SessionError> {
        let address = self.address;
        let channel_err = move |e: russh::Error| SessionError::Channel {
            address,
            reason: e.to_string(),
        };

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(channel_err)?;
        channel.exec(true, command).await.map_err(channel_err)?;

        let mut output = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }

        // Some device CLIs close the channel without reporting a status.
        match exit_status {
            None | Some(0) => Ok(output),
            Some(status) => Err(SessionError::Command {
                address,
                command: command.to_string(),
                status,
            }),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            tracing::debug!(address = %self.address, error = %e, "SSH disconnect failed");
        }
    }
}
