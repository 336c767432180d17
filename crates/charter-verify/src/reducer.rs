use std::collections::BTreeMap;

use charter_crypto::ContentHasher;
use charter_types::{Event, EventHash};
use serde::Serialize;

use crate::error::ReplayError;

/// Deterministic fold of events into state.
///
/// Replay only asserts that the fold completes and is reproducible; whether
/// the resulting business state is correct is the reducer's own concern.
pub trait StateReducer {
    type State;

    fn initial_state(&self) -> Self::State;

    fn apply(&self, state: &mut Self::State, event: &Event) -> Result<(), ReplayError>;

    /// Stable digest of a state, compared across independent replays.
    fn digest(&self, state: &Self::State) -> Result<EventHash, ReplayError>;
}

/// Counts events per type and insists on strictly increasing sequences.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventTallyReducer;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TallyState {
    pub last_sequence: u64,
    pub events: u64,
    pub by_type: BTreeMap<String, u64>,
}

impl StateReducer for EventTallyReducer {
    type State = TallyState;

    fn initial_state(&self) -> TallyState {
        TallyState::default()
    }

    fn apply(&self, state: &mut TallyState, event: &Event) -> Result<(), ReplayError> {
        if event.sequence <= state.last_sequence {
            return Err(ReplayError::at(
                event.sequence,
                format!("sequence does not advance past {}", state.last_sequence),
            ));
        }
        state.last_sequence = event.sequence;
        state.events += 1;
        *state.by_type.entry(event.event_type.clone()).or_default() += 1;
        Ok(())
    }

    fn digest(&self, state: &TallyState) -> Result<EventHash, ReplayError> {
        ContentHasher::STATE
            .hash_json(state)
            .map_err(|e| ReplayError {
                sequence: None,
                reason: e.to_string(),
            })
    }
}
