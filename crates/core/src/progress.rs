//! Poll progress events for availability searches.

use std::time::Duration;

use crate::availability::ServerState;

/// What the poller is doing in a given round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollPhase {
    /// A request is about to be sent (round 0 is the initial lookup).
    Requesting,
    /// The service is still searching; sleeping before the next poll.
    Waiting { interval: Duration },
    /// A terminal state was reached.
    Finished { state: ServerState },
}

/// Event emitted once per phase change of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEvent {
    pub isbn: String,
    pub system_id: String,
    pub round: u32,
    pub phase: PollPhase,
}

/// Trait for receiving poll updates. Implement this to drive spinners or
/// status displays; observers cannot influence the search.
pub trait PollObserver: Send + Sync {
    fn on_poll(&self, event: PollEvent);
}

/// Helper to emit a poll event if an observer is provided.
pub(crate) fn emit_poll(
    observer: Option<&dyn PollObserver>,
    isbn: &str,
    system_id: &str,
    round: u32,
    phase: PollPhase,
) {
    if let Some(o) = observer {
        o.on_poll(PollEvent {
            isbn: isbn.to_string(),
            system_id: system_id.to_string(),
            round,
            phase,
        });
    }
}
