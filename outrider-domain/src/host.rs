use std::fmt;
use std::str::FromStr;

use super::error::OutriderError;

// ---------------------------------------------------------------------------
// HostAndPort
// ---------------------------------------------------------------------------

/// One remote endpoint a command may be sent to.
///
/// Candidate hosts are equally acceptable targets; a command names one or
/// more of them and the session races attempts against each.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostAndPort {
    // ---
    pub host: String,
    pub port: u16,
}

// ---

impl HostAndPort {
    // ---
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

// ---

impl fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---

impl FromStr for HostAndPort {
    type Err = OutriderError;

    /// Parse `"host:port"`.  The port is mandatory — there is no default
    /// port at this layer; callers that want one apply it before parsing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| OutriderError::InvalidHost(s.to_string()))?;

        if host.is_empty() {
            return Err(OutriderError::InvalidHost(s.to_string()));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| OutriderError::InvalidHost(s.to_string()))?;

        Ok(HostAndPort::new(host, port))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
