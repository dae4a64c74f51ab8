//! TCP listener acquisition with bounded bind retry.
//!
//! # Responsibilities
//! - Normalize the configured bind target (`host:port`, `:port`, bare port)
//! - Bind the listening socket, retrying while the OS still holds the port
//! - Release a held listener (absent listener is a no-op)
//!
//! # Design Decisions
//! - Restarts close the old socket and rebind the same address immediately;
//!   the retry loop absorbs the window where the port is not yet free
//! - Resolver rejections (`InvalidInput`) fail fast, they never succeed on retry
//! - The bound socket is handed out as a non-blocking std listener so the
//!   serving engine can adopt it directly

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

/// Default number of bind attempts before giving up.
pub const DEFAULT_BIND_ATTEMPTS: u32 = 100;

/// Default pause between two bind attempts.
pub const DEFAULT_BIND_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Every bind attempt failed.
    #[error("failed to bind {address} after {attempts} attempt(s): {source}")]
    Bind {
        address: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// The socket was bound but could not be prepared for serving.
    #[error("failed to prepare listener on {address}: {source}")]
    Setup {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Bind target of a server instance.
///
/// Accepts `host:port`, `:port` (all interfaces) or a bare port number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindAddress(String);

impl BindAddress {
    /// Normalize a user supplied address.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(port) = raw.strip_prefix(':') {
            return Self(format!("0.0.0.0:{port}"));
        }
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            return Self(format!("0.0.0.0:{raw}"));
        }
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u16> for BindAddress {
    fn from(port: u16) -> Self {
        Self(format!("0.0.0.0:{port}"))
    }
}

impl From<&str> for BindAddress {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for BindAddress {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<SocketAddr> for BindAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

/// How hard `acquire` tries before reporting a bind failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for BindPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_BIND_ATTEMPTS,
            delay: DEFAULT_BIND_RETRY_DELAY,
        }
    }
}

/// A bound listening socket that is not being served yet.
#[derive(Debug)]
pub struct Listener {
    inner: std::net::TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Address the socket is actually bound to (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Hand the socket over to the serving engine.
    pub fn into_std(self) -> std::net::TcpListener {
        self.inner
    }
}

/// Bind `address`, retrying according to `policy`.
pub async fn acquire(address: &BindAddress, policy: &BindPolicy) -> Result<Listener, ListenerError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match TcpListener::bind(address.as_str()).await {
            Ok(listener) => {
                let setup_err = |source| ListenerError::Setup {
                    address: address.to_string(),
                    source,
                };
                let local_addr = listener.local_addr().map_err(setup_err)?;
                let inner = listener.into_std().map_err(setup_err)?;

                tracing::info!(
                    address = %local_addr,
                    attempt,
                    "Listener bound"
                );

                return Ok(Listener { inner, local_addr });
            }
            Err(source) if attempt < attempts && source.kind() != io::ErrorKind::InvalidInput => {
                tracing::debug!(
                    address = %address,
                    attempt,
                    error = %source,
                    "Bind failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(source) => {
                tracing::warn!(
                    address = %address,
                    attempt,
                    error = %source,
                    "Giving up on bind"
                );
                return Err(ListenerError::Bind {
                    address: address.to_string(),
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

/// Close a held listener. `None` is a no-op.
pub fn release(listener: Option<Listener>) {
    if let Some(listener) = listener {
        tracing::debug!(address = %listener.local_addr, "Listener released");
        drop(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_normalization() {
        assert_eq!(BindAddress::parse(":8080").as_str(), "0.0.0.0:8080");
        assert_eq!(BindAddress::parse("8080").as_str(), "0.0.0.0:8080");
        assert_eq!(BindAddress::parse("127.0.0.1:0").as_str(), "127.0.0.1:0");
        assert_eq!(BindAddress::from(9000u16).as_str(), "0.0.0.0:9000");
        assert_eq!(BindAddress::parse("localhost:3000").as_str(), "localhost:3000");
    }

    #[tokio::test]
    async fn acquire_resolves_ephemeral_port() {
        let listener = acquire(&BindAddress::parse("127.0.0.1:0"), &BindPolicy::default())
            .await
            .unwrap();
        assert_ne!(listener.local_addr().port(), 0);
        release(Some(listener));
        release(None);
    }

    #[tokio::test]
    async fn acquire_gives_up_after_policy_attempts() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = BindAddress::from(occupied.local_addr().unwrap());
        let policy = BindPolicy {
            attempts: 3,
            delay: Duration::from_millis(5),
        };

        let err = acquire(&address, &policy).await.unwrap_err();
        match err {
            ListenerError::Bind { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn acquire_waits_for_port_to_free_up() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = BindAddress::from(occupied.local_addr().unwrap());

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            drop(occupied);
        });

        let listener = acquire(&address, &BindPolicy::default()).await.unwrap();
        assert_eq!(BindAddress::from(listener.local_addr()), address);
        releaser.await.unwrap();
    }
}
