//! Externally visible server state.

use std::fmt;

/// Where a server instance is in its lifecycle.
///
/// `Unbound` means no serving engine has been attached yet; the listening
/// socket may already be reserved by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unbound,
    Listening,
    Stopped,
}

impl ServerState {
    pub fn is_listening(&self) -> bool {
        matches!(self, ServerState::Listening)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerState::Unbound => "unbound",
            ServerState::Listening => "listening",
            ServerState::Stopped => "stopped",
        })
    }
}
