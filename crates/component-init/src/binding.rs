//! Binding surface between component types and the orchestrator.
//!
//! - [`ComponentRegistry`] attaches init configs to component types and keeps
//!   component ids unique.
//! - [`prepare_component`] / [`prepare_components`] prepare instances ahead
//!   of render.
//! - [`MountedInstance`] feeds one instance's lifecycle into the orchestrator.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::component::{ComponentInitConfig, InitConfigBuilder};
use crate::config::HostConfig;
use crate::errors::InitError;
use crate::key::{ComponentId, InstanceKey};
use crate::mode::{InitMode, InitSelfPolicy};
use crate::orchestrator::{CallSite, InitFuture, Orchestrator};
use crate::store::StateContainer;

// ─────────────────────────────────────────────────────────────────────────────
// Component Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks bound component types.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    ids: Mutex<HashSet<ComponentId>>,
    allow_lazy_default: bool,
}

impl ComponentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry using the host's component defaults.
    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            ids: Mutex::new(HashSet::new()),
            allow_lazy_default: config.allow_lazy,
        }
    }

    /// Build and attach a config. Fails if the component id is already bound.
    pub fn bind<C: StateContainer>(
        &self,
        builder: InitConfigBuilder<C>,
    ) -> Result<BoundComponent<C>, InitError> {
        let config = builder.build_with_lazy_default(self.allow_lazy_default)?;
        let mut ids = self.ids.lock();
        if !ids.insert(config.component_id().clone()) {
            return Err(InitError::configuration(format!(
                "component id '{}' is already bound; ids must be unique",
                config.component_id()
            )));
        }
        tracing::debug!(
            component_id = %config.component_id(),
            init_props = ?config.init_props(),
            "bound component"
        );
        Ok(BoundComponent {
            config: Arc::new(config),
        })
    }

    /// Whether `component_id` is bound.
    pub fn is_bound(&self, component_id: &str) -> bool {
        self.ids.lock().iter().any(|id| id.as_str() == component_id)
    }

    /// Number of bound component types.
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// True if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Forget every bound id.
    pub fn clear(&self) {
        self.ids.lock().clear();
    }
}

/// A component type with its init config attached.
pub struct BoundComponent<C: StateContainer> {
    config: Arc<ComponentInitConfig<C>>,
}

impl<C: StateContainer> Clone for BoundComponent<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<C: StateContainer> std::fmt::Debug for BoundComponent<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BoundComponent").field(&self.config).finish()
    }
}

impl<C: StateContainer> BoundComponent<C> {
    /// The attached config.
    pub fn config(&self) -> &ComponentInitConfig<C> {
        &self.config
    }

    /// Component id.
    pub fn component_id(&self) -> &ComponentId {
        self.config.component_id()
    }

    /// Instance key for the given init values.
    pub fn key_for(&self, init_values: &[Value]) -> InstanceKey {
        self.config.key_for(init_values)
    }

    /// Pick the declared init props out of a full prop map, in order.
    /// Missing props read as `null`.
    pub fn init_values_from(&self, props: &Map<String, Value>) -> Vec<Value> {
        self.config
            .init_props()
            .iter()
            .map(|name| props.get(name).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prepare
// ─────────────────────────────────────────────────────────────────────────────

/// Prepare one component instance ahead of render.
pub fn prepare_component<C: StateContainer>(
    orchestrator: &Orchestrator<C>,
    component: &BoundComponent<C>,
    init_values: &[Value],
) -> InitFuture {
    let key = component.key_for(init_values);
    orchestrator.run_init(Some(component.config()), init_values, &key, CallSite::Prepare)
}

/// Prepare several instances. Resolves once all are prepared, or with the
/// first failure.
pub fn prepare_components<C, I>(
    orchestrator: &Orchestrator<C>,
    components: I,
) -> BoxFuture<'static, Result<Vec<Option<Value>>, InitError>>
where
    C: StateContainer,
    I: IntoIterator<Item = (BoundComponent<C>, Vec<Value>)>,
{
    let runs: Vec<InitFuture> = components
        .into_iter()
        .map(|(component, values)| prepare_component(orchestrator, &component, &values))
        .collect();
    future::try_join_all(runs).boxed()
}

// ─────────────────────────────────────────────────────────────────────────────
// Mounted Instances
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle driver for one mounted component instance.
///
/// Each hook returns the init future to drive, or `None` when the hook has
/// nothing to do. Unmounting needs no hook: dropping a returned future does
/// not cancel the run, which still completes on the orchestrator's executor.
pub struct MountedInstance<C: StateContainer> {
    orchestrator: Orchestrator<C>,
    component: BoundComponent<C>,
    init_values: Vec<Value>,
    key: Option<InstanceKey>,
}

impl<C: StateContainer> MountedInstance<C> {
    /// New, not yet mounted instance.
    pub fn new(orchestrator: Orchestrator<C>, component: BoundComponent<C>) -> Self {
        Self {
            orchestrator,
            component,
            init_values: Vec::new(),
            key: None,
        }
    }

    /// Key of the current init values, once mounted.
    pub fn key(&self) -> Option<&InstanceKey> {
        self.key.as_ref()
    }

    /// Before first paint.
    ///
    /// Runs in prepare mode (to verify preparation) and for blocking
    /// self-init components.
    pub fn will_mount(&mut self, props: &Map<String, Value>) -> Option<InitFuture> {
        self.track(props);
        let mode = match self.orchestrator.mode_for(self.component.config()) {
            Ok(mode) => mode,
            Err(err) => return Some(future::ready(Err(err)).boxed()),
        };
        let policy = self.component.config().options().init_self;
        (mode == InitMode::Prepare || policy == InitSelfPolicy::Blocking)
            .then(|| self.run(CallSite::WillMount))
    }

    /// After first paint.
    ///
    /// Runs for async self-init components, and lazily in prepare mode for
    /// components that allow it.
    pub fn did_mount(&mut self, props: &Map<String, Value>) -> Option<InitFuture> {
        self.track(props);
        let mode = match self.orchestrator.mode_for(self.component.config()) {
            Ok(mode) => mode,
            Err(err) => return Some(future::ready(Err(err)).boxed()),
        };
        let options = self.component.config().options();
        let run = match mode {
            InitMode::InitSelf => options.init_self == InitSelfPolicy::Async,
            InitMode::Prepare => options.allow_lazy,
        };
        run.then(|| self.run(CallSite::DidMount))
    }

    /// After an update. Runs only when the init values changed.
    pub fn did_update(&mut self, props: &Map<String, Value>) -> Option<InitFuture> {
        let previous = self.key.clone();
        self.track(props);
        if previous.as_ref() == self.key.as_ref() {
            return None;
        }
        Some(self.run(CallSite::DidMount))
    }

    fn track(&mut self, props: &Map<String, Value>) {
        self.init_values = self.component.init_values_from(props);
        self.key = Some(self.component.key_for(&self.init_values));
    }

    fn run(&self, call_site: CallSite) -> InitFuture {
        let key = self
            .key
            .clone()
            .unwrap_or_else(|| self.component.key_for(&self.init_values));
        self.orchestrator.run_init(
            Some(self.component.config()),
            &self.init_values,
            &key,
            call_site,
        )
    }
}
