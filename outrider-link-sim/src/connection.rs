use async_trait::async_trait;

use outrider_domain::{
    //
    Connection,
    HostAndPort,
    OutriderError,
    RemoteRequest,
    Result,
};

use super::config::{DispatchOutcome, HostProfile};

// ---------------------------------------------------------------------------
// SimConnection
// ---------------------------------------------------------------------------

/// A leased connection that replays its host's configured behaviour.
pub(crate) struct SimConnection {
    // ---
    target: HostAndPort,
    profile: HostProfile,
}

// ---

impl SimConnection {
    pub(crate) fn new(target: HostAndPort, profile: HostProfile) -> Self {
        Self { target, profile }
    }
}

// ---

#[async_trait]
impl Connection for SimConnection {
    // ---
    fn target(&self) -> &HostAndPort {
        &self.target
    }

    // ---

    async fn dispatch(&mut self, _request: &RemoteRequest) -> Result<Vec<u8>> {
        // ---
        match &self.profile.dispatch_result {
            DispatchOutcome::Stall => std::future::pending().await,

            outcome => {
                super::latency(self.profile.dispatch_latency, self.profile.jitter).await;
                match outcome {
                    DispatchOutcome::Reply(payload) => Ok(payload.clone()),

                    DispatchOutcome::TransportError(detail) => Err(OutriderError::Transport {
                        target: self.target.clone(),
                        detail: detail.clone(),
                    }),

                    DispatchOutcome::ProtocolError(detail) => Err(OutriderError::Protocol {
                        target: self.target.clone(),
                        detail: detail.clone(),
                    }),

                    DispatchOutcome::Stall => unreachable!(),
                }
            }
        }
    }
}
