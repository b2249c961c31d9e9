use thiserror::Error;

use super::host::HostAndPort;

// ---------------------------------------------------------------------------
// OutriderError
// ---------------------------------------------------------------------------

/// Terminal outcome kinds for commands, attempts, and alarms.
///
/// Attempt-level failures never escape their attempt: they are reported to
/// the owning session as an outcome candidate and, when another attempt wins
/// the race, discarded with a `debug` log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutriderError {
    // ---
    /// The pool could not produce a connection for the target before the
    /// deadline, or the host is unreachable.
    #[error("connection to {target} could not be acquired: {detail}")]
    ConnectionAcquisition { target: HostAndPort, detail: String },

    /// Send/receive failed after a connection had been obtained.
    #[error("transport failure on {target}: {detail}")]
    Transport { target: HostAndPort, detail: String },

    /// The remote side answered with something the codec could not accept.
    /// Fatal to that one attempt only.
    #[error("protocol violation from {target}: {detail}")]
    Protocol { target: HostAndPort, detail: String },

    /// The deadline elapsed before any attempt won the race.
    #[error("deadline elapsed before a response arrived")]
    Timeout,

    /// An explicit external cancel won the race.
    #[error("operation cancelled")]
    Cancelled,

    /// Submission rejected because the interface is stopping or stopped.
    #[error("network interface is shutting down")]
    ShutdownInProgress,

    /// A host spec could not be parsed into a [`HostAndPort`].
    #[error("invalid host spec: {0}")]
    InvalidHost(String),

    /// A caller precondition was violated or an internal resource could not
    /// be set up (e.g. the networking thread failed to start).
    #[error("internal error: {0}")]
    Internal(String),
}

// ---

impl OutriderError {
    // ---
    /// Rank used when a session must pick the single failure to surface
    /// after every attempt has failed.  A protocol violation tells the
    /// caller more than a transport error, which tells more than a failure
    /// to connect at all; everything else ranks below those.
    pub fn informativeness(&self) -> u8 {
        match self {
            OutriderError::Protocol { .. } => 3,
            OutriderError::Transport { .. } => 2,
            OutriderError::ConnectionAcquisition { .. } => 1,
            _ => 0,
        }
    }
}

// ---

pub type Result<T> = std::result::Result<T, OutriderError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
