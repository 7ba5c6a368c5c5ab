//! Shared state container binding.
//!
//! The orchestrator never owns state. It reads the host state through a
//! [`StateContainer`] and writes back only by dispatching actions, which the
//! container must apply before `dispatch` returns. [`Store`] is a ready-made
//! single-writer container driven by a reducer function.

use std::fmt;

use parking_lot::{Mutex, RwLock};

use crate::state::{InitEvent, InitState};

/// State container the orchestrator is wired to.
///
/// `dispatch` must apply the action synchronously: a `read` issued after
/// `dispatch` returns observes its effect. In-flight deduplication depends on
/// this.
pub trait StateContainer: Send + Sync + 'static {
    /// Global host state.
    type State: Send + Sync + 'static;
    /// Host action type; init events must convert into it.
    type Action: From<InitEvent> + Send + 'static;

    /// Run `f` against the current state.
    fn read<R>(&self, f: impl FnOnce(&Self::State) -> R) -> R;

    /// Apply an action.
    fn dispatch(&self, action: Self::Action);

    /// Run `f` against the current state and apply the action it returns,
    /// if any, with no other dispatch in between.
    ///
    /// The provided implementation reads and dispatches separately, which is
    /// only atomic under a single writer. Containers written from several
    /// threads must override it.
    fn read_and_dispatch<R>(
        &self,
        f: impl FnOnce(&Self::State) -> (R, Option<Self::Action>),
    ) -> R {
        let (out, action) = self.read(f);
        if let Some(action) = action {
            self.dispatch(action);
        }
        out
    }

    /// Clone of the current state.
    fn get_state(&self) -> Self::State
    where
        Self::State: Clone,
    {
        self.read(Clone::clone)
    }
}

type Reducer<S, A> = Box<dyn Fn(&mut S, &A) + Send + Sync>;

/// Reducer-driven state container.
///
/// Writes are serialized by a write lock held only for the reducer call, so
/// every dispatch is fully applied before it returns.
/// [`StateContainer::read_and_dispatch`] holds the write lock across the read
/// and the reducer call, so a store shared between threads still starts each
/// key at most once.
pub struct Store<S, A> {
    state: RwLock<S>,
    reducer: Reducer<S, A>,
    history: Option<Mutex<Vec<A>>>,
}

impl<S, A> Store<S, A>
where
    S: Send + Sync + 'static,
    A: Send + 'static,
{
    /// Create a store from an initial state and a reducer.
    pub fn new(initial: S, reducer: impl Fn(&mut S, &A) + Send + Sync + 'static) -> Self {
        Self {
            state: RwLock::new(initial),
            reducer: Box::new(reducer),
            history: None,
        }
    }

    /// Create a store that also records every dispatched action.
    pub fn recording(initial: S, reducer: impl Fn(&mut S, &A) + Send + Sync + 'static) -> Self {
        Self {
            history: Some(Mutex::new(Vec::new())),
            ..Self::new(initial, reducer)
        }
    }

    /// Whether dispatched actions are recorded.
    pub fn is_recording(&self) -> bool {
        self.history.is_some()
    }

    /// Actions dispatched so far, oldest first. Empty unless recording.
    pub fn actions(&self) -> Vec<A>
    where
        A: Clone,
    {
        self.history
            .as_ref()
            .map(|h| h.lock().clone())
            .unwrap_or_default()
    }

    fn record(&self, action: A) {
        if let Some(history) = &self.history {
            history.lock().push(action);
        }
    }

    /// Forget recorded actions.
    pub fn clear_actions(&self) {
        if let Some(history) = &self.history {
            history.lock().clear();
        }
    }
}

impl Store<InitState, InitEvent> {
    /// Store holding nothing but an init state slice.
    pub fn for_init_state(initial: InitState) -> Self {
        Self::new(initial, InitState::apply)
    }

    /// Recording variant of [`Store::for_init_state`].
    pub fn recording_init_state(initial: InitState) -> Self {
        Self::recording(initial, InitState::apply)
    }
}

impl<S, A> StateContainer for Store<S, A>
where
    S: Send + Sync + 'static,
    A: From<InitEvent> + Send + 'static,
{
    type State = S;
    type Action = A;

    fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.state.read();
        f(&*state)
    }

    fn dispatch(&self, action: A) {
        let mut state = self.state.write();
        (self.reducer)(&mut *state, &action);
        self.record(action);
    }

    fn read_and_dispatch<R>(&self, f: impl FnOnce(&S) -> (R, Option<A>)) -> R {
        let mut state = self.state.write();
        let (out, action) = f(&*state);
        if let Some(action) = action {
            (self.reducer)(&mut *state, &action);
            self.record(action);
        }
        out
    }
}

impl<S: fmt::Debug, A> fmt::Debug for Store<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.state.read())
            .field("recording", &self.history.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::InstanceKey;
    use crate::mode::InitMode;
    use crate::state::PrepareStatus;

    #[test]
    fn dispatch_is_visible_to_next_read() {
        let store = Store::for_init_state(InitState::new(InitMode::InitSelf));
        let key = InstanceKey::from_raw("Feed[]");
        store.dispatch(InitEvent::started(key.clone(), false));
        assert_eq!(store.read(|s| s.status(&key)), PrepareStatus::Pending);
    }

    #[test]
    fn recording_store_keeps_history() {
        let store = Store::recording_init_state(InitState::default());
        let key = InstanceKey::from_raw("Feed[]");
        store.dispatch(InitEvent::started(key.clone(), true));
        store.dispatch(InitEvent::completed(key, true));
        let actions = store.actions();
        assert_eq!(actions.len(), 2);
        assert!(!actions[0].is_complete());
        assert!(actions[1].is_complete());

        store.clear_actions();
        assert!(store.actions().is_empty());
    }

    #[test]
    fn plain_store_records_nothing() {
        let store = Store::for_init_state(InitState::default());
        store.dispatch(InitEvent::started(InstanceKey::from_raw("Feed[]"), true));
        assert!(!store.is_recording());
        assert!(store.actions().is_empty());
    }

    #[test]
    fn read_and_dispatch_applies_returned_action() {
        let store = Store::recording_init_state(InitState::default());
        let key = InstanceKey::from_raw("Feed[]");
        let before = store.read_and_dispatch(|s| {
            (s.status(&key), Some(InitEvent::started(key.clone(), true)))
        });
        assert_eq!(before, PrepareStatus::Absent);
        assert_eq!(store.read(|s| s.status(&key)), PrepareStatus::Pending);

        let again = store.read_and_dispatch(|s| (s.status(&key), None));
        assert_eq!(again, PrepareStatus::Pending);
        assert_eq!(store.actions().len(), 1);
    }

    #[test]
    fn check_and_mark_is_atomic_across_threads() {
        let store = Store::for_init_state(InitState::default());
        let key = InstanceKey::from_raw("Feed[]");
        let barrier = std::sync::Barrier::new(8);
        let winners = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    let won = store.read_and_dispatch(|s| {
                        if s.status(&key) == PrepareStatus::Absent {
                            (true, Some(InitEvent::started(key.clone(), false)))
                        } else {
                            (false, None)
                        }
                    });
                    if won {
                        winners.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.into_inner(), 1);
    }

    #[test]
    fn host_state_with_custom_actions() {
        #[derive(Default)]
        struct Host {
            init: InitState,
            hits: u32,
        }

        enum HostAction {
            Init(InitEvent),
            Hit,
        }

        impl From<InitEvent> for HostAction {
            fn from(event: InitEvent) -> Self {
                Self::Init(event)
            }
        }

        let store = Store::new(Host::default(), |host: &mut Host, action: &HostAction| {
            match action {
                HostAction::Init(event) => host.init.apply(event),
                HostAction::Hit => host.hits += 1,
            }
        });
        store.dispatch(HostAction::Hit);
        store.dispatch(InitEvent::completed(InstanceKey::from_raw("A[]"), false).into());
        assert_eq!(store.read(|h| h.hits), 1);
        assert_eq!(store.read(|h| h.init.completed_count()), 1);
    }
}
