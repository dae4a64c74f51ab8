//! Errors surfaced to the embedding program.

use std::fmt;

use thiserror::Error;

use crate::net::ListenerError;
use crate::registry::HeaderError;
use crate::routing::PatternError;

/// Phase of a restart that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPhase {
    /// Shutting down the current server generation.
    Stop,
    /// Re-acquiring the listening socket.
    Bind,
    /// Attaching the new route table (TLS loading included).
    Serve,
}

impl fmt::Display for RestartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestartPhase::Stop => "stop",
            RestartPhase::Bind => "bind",
            RestartPhase::Serve => "serve",
        })
    }
}

/// Error type for server management calls.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),

    #[error("failed to shut down server: {0}")]
    Shutdown(String),

    #[error("server terminated with an error: {0}")]
    Serve(#[source] std::io::Error),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("restart failed during {phase} phase: {source}")]
    Restart {
        phase: RestartPhase,
        #[source]
        source: Box<ServerError>,
    },
}

impl ServerError {
    /// Wrap `self` as the cause of a failed restart phase.
    pub fn during(self, phase: RestartPhase) -> Self {
        ServerError::Restart {
            phase,
            source: Box::new(self),
        }
    }

    /// The failing restart phase, if this is a restart error.
    pub fn restart_phase(&self) -> Option<RestartPhase> {
        match self {
            ServerError::Restart { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}
