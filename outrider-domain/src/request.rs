use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use super::error::Result;
use super::host::HostAndPort;

// ---------------------------------------------------------------------------
// OpHandle
// ---------------------------------------------------------------------------

/// Opaque identity of one in-flight operation (command or alarm).
///
/// Unique for the lifetime of the operation; used only for cancellation
/// lookup, never for liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpHandle(Uuid);

// ---

impl OpHandle {
    // ---
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OpHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OpHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// RemoteRequest
// ---------------------------------------------------------------------------

/// An outbound command: an opaque payload plus the ordered list of candidate
/// targets it may be sent to.
///
/// The payload's wire format belongs to the codec behind
/// [`Connection::dispatch`](super::pool::Connection::dispatch); this layer
/// never inspects it.
#[derive(Debug, Clone)]
pub struct RemoteRequest {
    // ---
    /// Candidate targets, in caller-preferred order.  Must be non-empty.
    pub targets: Vec<HostAndPort>,

    /// Serialized command body, forwarded verbatim.
    pub payload: Vec<u8>,
}

// ---

impl RemoteRequest {
    // ---
    pub fn new(targets: Vec<HostAndPort>, payload: Vec<u8>) -> Self {
        Self { targets, payload }
    }

    /// Convenience constructor for the single-target case.
    pub fn to_target(target: HostAndPort, payload: Vec<u8>) -> Self {
        Self {
            targets: vec![target],
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteResponse
// ---------------------------------------------------------------------------

/// A successful reply from one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    // ---
    /// The target that actually answered (one of the request's candidates).
    pub target: HostAndPort,

    /// Serialized reply body, forwarded verbatim.
    pub payload: Vec<u8>,

    /// Wall time from dispatch to reply, as observed by the winning attempt.
    pub elapsed: Duration,
}

// ---

/// The single terminal outcome delivered to the caller, exactly once per
/// submitted command.
pub type CommandOutcome = Result<RemoteResponse>;
