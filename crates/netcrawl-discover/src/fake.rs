//! Deterministic in-memory `Connector` for tests and dry runs.
//!
//! Replies come from a fixed table of address → canned output or error.
//! Addresses missing from the table refuse connections.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::SshCredentials;
use crate::error::SessionError;
use crate::session::{Connector, Session};

/// What a fake device answers with.
#[derive(Debug, Clone)]
pub enum FakeReply {
    Output(String),
    Fail(String),
}

#[derive(Default)]
struct Counters {
    connects: Mutex<HashMap<IpAddr, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Table-driven connector.
#[derive(Default)]
pub struct FakeConnector {
    replies: HashMap<IpAddr, FakeReply>,
    rejected_users: HashSet<String>,
    delay: Option<Duration>,
    counters: Arc<Counters>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `address` answers every command with `output`.
    pub fn with_output(mut self, address: IpAddr, output: &str) -> Self {
        self.replies
            .insert(address, FakeReply::Output(output.to_string()));
        self
    }

    /// `address` accepts logins but every command fails with `reason`.
    pub fn with_failure(mut self, address: IpAddr, reason: &str) -> Self {
        self.replies
            .insert(address, FakeReply::Fail(reason.to_string()));
        self
    }

    /// Logins as `user` are rejected everywhere.
    pub fn reject_user(mut self, user: &str) -> Self {
        self.rejected_users.insert(user.to_string());
        self
    }

    /// Each command takes `delay` to answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of connection attempts made to `address`.
    pub fn connect_count(&self, address: IpAddr) -> usize {
        self.counters
            .connects
            .lock()
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    /// Sessions opened and not yet closed.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of sessions that were open at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        address: IpAddr,
        credentials: &SshCredentials,
    ) -> Result<Box<dyn Session>, SessionError> {
        *self.counters.connects.lock().entry(address).or_default() += 1;

        let Some(reply) = self.replies.get(&address) else {
            return Err(SessionError::Connect {
                address,
                reason: format!("could not connect to node {address}"),
            });
        };
        if self.rejected_users.contains(&credentials.user) {
            return Err(SessionError::AuthRejected {
                address,
                user: credentials.user.clone(),
            });
        }

        let open = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(open, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            address,
            reply: reply.clone(),
            delay: self.delay,
            counters: Arc::clone(&self.counters),
            closed: false,
        }))
    }
}

struct FakeSession {
    address: IpAddr,
    reply: FakeReply,
    delay: Option<Duration>,
    counters: Arc<Counters>,
    closed: bool,
}

#[async_trait]
impl Session for FakeSession {
    async fn run(&mut self, _command: &str) -> Result<Vec<u8>, SessionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            FakeReply::Output(text) => Ok(text.clone().into_bytes()),
            FakeReply::Fail(reason) => Err(SessionError::Channel {
                address: self.address,
                reason: reason.clone(),
            }),
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::run_command;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_known_address_returns_output() {
        let fake = FakeConnector::new().with_output(ip("10.0.0.1"), "hello");
        let creds = SshCredentials::new("user", "pass");

        let out = run_command(&fake, ip("10.0.0.1"), &creds, "show cdp neighbors detail")
            .await
            .unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(fake.connect_count(ip("10.0.0.1")), 1);
        assert_eq!(fake.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_unknown_address_refuses() {
        let fake = FakeConnector::new();
        let creds = SshCredentials::new("user", "pass");

        let err = run_command(&fake, ip("10.0.0.5"), &creds, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Connect { .. }));
        assert_eq!(fake.connect_count(ip("10.0.0.5")), 1);
    }

    #[tokio::test]
    async fn test_failure_and_rejected_user() {
        let fake = FakeConnector::new()
            .with_failure(ip("10.0.0.2"), "permission denied")
            .reject_user("guest");

        let err = run_command(&fake, ip("10.0.0.2"), &SshCredentials::new("admin", "x"), "x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        // The session was opened and must be closed even though the command failed.
        assert_eq!(fake.connect_count(ip("10.0.0.2")), 1);
        assert_eq!(fake.max_in_flight(), 1);
        assert_eq!(fake.in_flight(), 0);

        let err = run_command(&fake, ip("10.0.0.2"), &SshCredentials::new("guest", "x"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AuthRejected { ref user, .. } if user == "guest"));
    }
}
