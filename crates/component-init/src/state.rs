//! # Init State
//!
//! The registry slice the orchestrator reads and writes: the process-wide
//! [`InitMode`] and the completion status of every instance key that has
//! ever been requested.
//!
//! State changes only through [`InitEvent`]s applied by [`InitState::apply`]
//! (or the pure [`reduce`]). The wire shape of an event is
//!
//! ```text
//! { "type": "INIT_COMPONENT",
//!   "payload": { "complete": bool, "isPrepare": bool, "prepareKey": string } }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::key::InstanceKey;
use crate::mode::InitMode;

/// Action type tag of [`InitEvent::InitComponent`].
pub const INIT_COMPONENT: &str = "INIT_COMPONENT";

/// Completion status of one instance key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrepareStatus {
    /// Never requested.
    Absent,
    /// Initialization in flight.
    Pending,
    /// Initialization complete.
    Complete,
}

/// Mode plus per-key completion flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitState {
    /// Orchestration mode; set once at startup.
    pub mode: InitMode,
    /// `false` while in flight, `true` once complete. Entries are never removed.
    #[serde(default)]
    pub prepared: HashMap<InstanceKey, bool>,
}

impl InitState {
    /// Empty registry running in `mode`.
    pub fn new(mode: InitMode) -> Self {
        Self {
            mode,
            prepared: HashMap::new(),
        }
    }

    /// Status of `key`.
    pub fn status(&self, key: &InstanceKey) -> PrepareStatus {
        match self.prepared.get(key) {
            None => PrepareStatus::Absent,
            Some(false) => PrepareStatus::Pending,
            Some(true) => PrepareStatus::Complete,
        }
    }

    /// Apply a mutation event in place. `mode` is never touched.
    pub fn apply(&mut self, event: &InitEvent) {
        match event {
            InitEvent::InitComponent(payload) => {
                self.prepared
                    .insert(payload.prepare_key.clone(), payload.complete);
            }
        }
    }

    /// Number of keys that have completed.
    pub fn completed_count(&self) -> usize {
        self.prepared.values().filter(|done| **done).count()
    }
}

/// Pure reducer form of [`InitState::apply`].
pub fn reduce(state: &InitState, event: &InitEvent) -> InitState {
    let mut next = state.clone();
    next.apply(event);
    next
}

/// Payload of an `INIT_COMPONENT` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitComponentPayload {
    /// New completion flag for the key.
    pub complete: bool,
    /// Whether the run was started by a prepare call.
    pub is_prepare: bool,
    /// Key being updated.
    pub prepare_key: InstanceKey,
}

/// Mutation event consumed by the init state reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum InitEvent {
    /// Marks a key in flight or complete.
    #[serde(rename = "INIT_COMPONENT")]
    InitComponent(InitComponentPayload),
}

impl InitEvent {
    /// Key is now in flight.
    pub fn started(key: InstanceKey, is_prepare: bool) -> Self {
        Self::InitComponent(InitComponentPayload {
            complete: false,
            is_prepare,
            prepare_key: key,
        })
    }

    /// Key has completed.
    pub fn completed(key: InstanceKey, is_prepare: bool) -> Self {
        Self::InitComponent(InitComponentPayload {
            complete: true,
            is_prepare,
            prepare_key: key,
        })
    }

    /// Action type tag.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::InitComponent(_) => INIT_COMPONENT,
        }
    }

    /// The key this event updates.
    pub fn key(&self) -> &InstanceKey {
        match self {
            Self::InitComponent(payload) => &payload.prepare_key,
        }
    }

    /// The completion flag this event sets.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::InitComponent(payload) => payload.complete,
        }
    }
}

/// Host states that carry an [`InitState`] slice.
pub trait HasInitState {
    /// The init slice, or `None` if the host never attached it.
    fn init_state(&self) -> Option<&InitState>;
}

impl HasInitState for InitState {
    fn init_state(&self) -> Option<&InitState> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(raw: &str) -> InstanceKey {
        InstanceKey::from_raw(raw)
    }

    #[test]
    fn status_tracks_lifecycle() {
        let mut state = InitState::new(InitMode::Prepare);
        let k = key("Feed[]");
        assert_eq!(state.status(&k), PrepareStatus::Absent);

        state.apply(&InitEvent::started(k.clone(), true));
        assert_eq!(state.status(&k), PrepareStatus::Pending);

        state.apply(&InitEvent::completed(k.clone(), true));
        assert_eq!(state.status(&k), PrepareStatus::Complete);
        assert_eq!(state.completed_count(), 1);
    }

    #[test]
    fn reduce_never_changes_mode() {
        let state = InitState::new(InitMode::Prepare);
        let next = reduce(&state, &InitEvent::completed(key("Feed[]"), false));
        assert_eq!(next.mode, InitMode::Prepare);
    }

    #[test]
    fn replaying_an_event_is_a_no_op() {
        let event = InitEvent::started(key("Feed[]"), false);
        let once = reduce(&InitState::default(), &event);
        let twice = reduce(&once, &event);
        assert_eq!(once, twice);
    }

    #[test]
    fn reduce_leaves_other_keys_alone() {
        let mut state = InitState::default();
        state.apply(&InitEvent::completed(key("A[]"), true));
        let next = reduce(&state, &InitEvent::started(key("B[]"), false));
        assert_eq!(next.status(&key("A[]")), PrepareStatus::Complete);
        assert_eq!(next.status(&key("B[]")), PrepareStatus::Pending);
    }

    #[test]
    fn event_wire_shape() {
        let event = InitEvent::started(key("SimpleInitTestComponent[]"), true);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "INIT_COMPONENT",
                "payload": {
                    "complete": false,
                    "isPrepare": true,
                    "prepareKey": "SimpleInitTestComponent[]",
                }
            })
        );
        assert_eq!(event.action_type(), INIT_COMPONENT);
    }

    #[test]
    fn state_deserializes_from_host_snapshot() {
        let state: InitState = serde_json::from_value(json!({
            "mode": "prepare",
            "prepared": { "SimpleInitTestComponent[]": false }
        }))
        .unwrap();
        assert_eq!(state.mode, InitMode::Prepare);
        assert_eq!(
            state.status(&key("SimpleInitTestComponent[]")),
            PrepareStatus::Pending
        );
    }
}
