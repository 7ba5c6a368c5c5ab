//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use component_init::{
    ComponentInitConfig, InitConfigBuilder, InitEvent, InitMode, InitState, InstanceKey,
    Orchestrator, StateContainer, Store,
};
use futures::future::FutureObj;
use futures::task::{Spawn, SpawnError};
use parking_lot::Mutex;
use tokio::runtime::Handle;

pub type TestStore = Store<InitState, InitEvent>;

pub const SIMPLE: &str = "SimpleInitTestComponent";

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Recording store holding only an init slice.
pub fn store(mode: InitMode) -> Arc<TestStore> {
    init_tracing();
    Arc::new(TestStore::recording_init_state(InitState::new(mode)))
}

/// Recording store with some keys already in the given state.
pub fn store_with(mode: InitMode, prepared: &[(&str, bool)]) -> Arc<TestStore> {
    init_tracing();
    let mut state = InitState::new(mode);
    for (key, done) in prepared {
        state.prepared.insert(InstanceKey::from_raw(*key), *done);
    }
    Arc::new(TestStore::recording_init_state(state))
}

/// Spawns init runs onto the current Tokio runtime.
#[derive(Clone)]
pub struct TokioSpawner(Handle);

impl TokioSpawner {
    pub fn current() -> Self {
        Self(Handle::current())
    }
}

impl Spawn for TokioSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.0.spawn(future);
        Ok(())
    }
}

/// Executor that has shut down.
pub struct ShutDown;

impl Spawn for ShutDown {
    fn spawn_obj(&self, _future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        Err(SpawnError::shutdown())
    }

    fn status(&self) -> Result<(), SpawnError> {
        Err(SpawnError::shutdown())
    }
}

/// Orchestrator over `store` driving runs on the current runtime.
pub fn orchestrator<C: StateContainer>(store: &Arc<C>) -> Orchestrator<C> {
    Orchestrator::new(Arc::clone(store), TokioSpawner::current())
}

/// Builder for the fixture component reading the init slice directly.
pub fn simple() -> InitConfigBuilder<TestStore> {
    ComponentInitConfig::<TestStore>::builder(SIMPLE).host_init_state()
}

pub fn simple_key() -> InstanceKey {
    InstanceKey::from_raw(format!("{SIMPLE}[]"))
}

/// Counts init action invocations.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collects messages passed to an error handler.
#[derive(Clone, Default)]
pub struct ErrorSink(Arc<Mutex<Vec<String>>>);

impl ErrorSink {
    pub fn push(&self, message: String) {
        self.0.lock().push(message);
    }

    pub fn seen(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}
