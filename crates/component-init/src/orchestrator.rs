//! # Initialization Orchestrator
//!
//! Decides whether a component instance must run its init action, runs it,
//! and records progress in the init state slice.
//!
//! ```text
//! call site ──► read {mode, prepared[key]} ──► decide
//!                                               ├─ Run:  dispatch {complete:false}
//!                                               │        invoke init action
//!                                               │        spawn: await ─► error policy
//!                                               │               dispatch {complete:true}
//!                                               ├─ Skip: resolve with no value
//!                                               └─ Fail: reject
//! ```
//!
//! Everything up to and including the in-flight dispatch happens before
//! [`Orchestrator::run_init`] returns, and the read and the dispatch are one
//! [`StateContainer::read_and_dispatch`] step. A second call for the same key
//! therefore always observes the first one as in flight.
//!
//! The rest of a run is handed to the orchestrator's executor. The returned
//! [`InitFuture`] only observes it: dropping the future does not cancel the
//! action, and the completion event is still applied once it settles.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{self, BoxFuture};
use futures::task::{Spawn, SpawnError, SpawnExt};
use futures::FutureExt;
use serde_json::Value;

use crate::component::{ActionReturn, ComponentInitConfig, InitOptions};
use crate::error_policy;
use crate::errors::InitError;
use crate::key::InstanceKey;
use crate::mode::InitMode;
use crate::state::{InitEvent, PrepareStatus};
use crate::store::StateContainer;

/// Future returned by [`Orchestrator::run_init`].
///
/// Resolves with the init result, or with `None` when nothing ran or a
/// failure was absorbed by the component's error handler. A panic raised by
/// the init action or the error handler resumes in whoever awaits it.
pub type InitFuture = BoxFuture<'static, Result<Option<Value>, InitError>>;

/// Executor that drives init runs to completion.
pub type Spawner = Arc<dyn Spawn + Send + Sync>;

/// Where a `run_init` request comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSite {
    /// Before the first paint of a mounting component.
    WillMount,
    /// After mount or after an update that changed the init values.
    DidMount,
    /// Explicit prepare ahead of render.
    Prepare,
}

impl CallSite {
    /// True for [`CallSite::Prepare`].
    pub fn is_prepare(&self) -> bool {
        matches!(self, Self::Prepare)
    }
}

/// Outcome of the decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the init action now.
    Run,
    /// Nothing to do; resolve with no value.
    Skip,
    /// Mounted in prepare mode without ever being prepared.
    NotPrepared,
    /// Mounted in prepare mode while preparation is still in flight.
    PreparePending,
}

/// Pure decision function.
pub fn decide<C: StateContainer>(
    mode: InitMode,
    status: PrepareStatus,
    options: &InitOptions<C>,
    call_site: CallSite,
) -> Decision {
    match call_site {
        CallSite::Prepare => match status {
            PrepareStatus::Absent => Decision::Run,
            PrepareStatus::Pending | PrepareStatus::Complete => Decision::Skip,
        },
        CallSite::WillMount | CallSite::DidMount => match mode {
            InitMode::InitSelf if options.init_self.permits_self_init() => match status {
                PrepareStatus::Pending => Decision::Skip,
                PrepareStatus::Absent | PrepareStatus::Complete => Decision::Run,
            },
            InitMode::InitSelf => Decision::Skip,
            InitMode::Prepare => match status {
                PrepareStatus::Complete => Decision::Skip,
                PrepareStatus::Absent if options.allow_lazy => {
                    if call_site == CallSite::DidMount {
                        Decision::Run
                    } else {
                        Decision::Skip
                    }
                }
                PrepareStatus::Absent => Decision::NotPrepared,
                PrepareStatus::Pending if options.allow_lazy => Decision::Skip,
                PrepareStatus::Pending => Decision::PreparePending,
            },
        },
    }
}

type Settled = Result<Result<Option<Value>, InitError>, Box<dyn std::any::Any + Send>>;

/// Runs component initialization against a shared state container.
pub struct Orchestrator<C: StateContainer> {
    store: Arc<C>,
    spawner: Spawner,
}

impl<C: StateContainer> Clone for Orchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            spawner: Arc::clone(&self.spawner),
        }
    }
}

impl<C: StateContainer> std::fmt::Debug for Orchestrator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

impl<C: StateContainer> Orchestrator<C> {
    /// Wire an orchestrator to a state container and the executor that
    /// drives its init runs.
    pub fn new(store: Arc<C>, spawner: impl Spawn + Send + Sync + 'static) -> Self {
        Self {
            store,
            spawner: Arc::new(spawner),
        }
    }

    /// The container this orchestrator reads and dispatches to.
    pub fn store(&self) -> &Arc<C> {
        &self.store
    }

    /// Current mode as seen by `config`'s init state selector.
    pub fn mode_for(&self, config: &ComponentInitConfig<C>) -> Result<InitMode, InitError> {
        config.read_init_state(&self.store, |state| state.mode)
    }

    /// Initialize one component instance.
    ///
    /// `key` must be the key derived from `config` and `init_values`; it is
    /// trusted, not recomputed.
    pub fn run_init(
        &self,
        config: Option<&ComponentInitConfig<C>>,
        init_values: &[Value],
        key: &InstanceKey,
        call_site: CallSite,
    ) -> InitFuture {
        match self.start(config, init_values, key, call_site) {
            Ok(run) => run,
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }

    fn start(
        &self,
        config: Option<&ComponentInitConfig<C>>,
        init_values: &[Value],
        key: &InstanceKey,
        call_site: CallSite,
    ) -> Result<InitFuture, InitError> {
        let config = config.ok_or_else(|| {
            InitError::configuration("no init config found on component passed to run_init")
        })?;
        if init_values.len() != config.init_props.len() {
            return Err(InitError::configuration(format!(
                "component '{}' declares {} init props but {} values were given",
                config.component_id,
                config.init_props.len(),
                init_values.len()
            )));
        }

        let is_prepare = call_site.is_prepare();
        let (mode, status, decision) = self.store.read_and_dispatch(|state| {
            let Some(init_state) = (config.options.get_init_state)(state) else {
                return (Err(InitError::MissingState), None);
            };
            let status = init_state.status(key);
            let decision = decide(init_state.mode, status, &config.options, call_site);
            if decision != Decision::Run {
                return (Ok((init_state.mode, status, decision)), None);
            }
            if let Err(refused) = self.spawner.status() {
                return (Err(executor_error(config, &refused)), None);
            }
            let started = InitEvent::started(key.clone(), is_prepare);
            (Ok((init_state.mode, status, decision)), Some(started.into()))
        })?;

        tracing::debug!(
            component_id = %config.component_id,
            key = %key,
            ?call_site,
            %mode,
            ?status,
            ?decision,
            "init decision"
        );

        match decision {
            Decision::Run => {
                tracing::trace!(key = %key, is_prepare, "dispatched in-flight init event");
                self.run(config, init_values, key, is_prepare)
            }
            Decision::Skip => Ok(future::ready(Ok(None)).boxed()),
            Decision::NotPrepared => Err(InitError::NotPrepared {
                component_id: config.component_id.to_string(),
                props: config.props_for(init_values).to_json_string(),
            }),
            Decision::PreparePending => Err(InitError::PreparePending {
                component_id: config.component_id.to_string(),
            }),
        }
    }

    fn run(
        &self,
        config: &ComponentInitConfig<C>,
        init_values: &[Value],
        key: &InstanceKey,
        is_prepare: bool,
    ) -> Result<InitFuture, InitError> {
        let returned = config.invoke(config.props_for(init_values), Arc::clone(&self.store));

        let store = Arc::clone(&self.store);
        let key = key.clone();
        let component_id = config.component_id.to_string();
        let on_error = config.options.on_error.clone();

        let settle = async move {
            let result = match returned {
                ActionReturn::Pending(action) => action.await.map_err(InitError::Action),
                ActionReturn::Immediate(value) => Err(InitError::InvalidReturn {
                    component_id,
                    observed: json_type_name(&value),
                }),
            };

            let outcome = error_policy::apply(result, on_error.as_ref())?;
            let event = InitEvent::completed(key, is_prepare);
            tracing::trace!(event = ?event, "dispatching init event");
            store.dispatch(event.into());
            Ok::<_, InitError>(outcome)
        };

        let (tx, rx) = oneshot::channel::<Settled>();
        let task = async move {
            let settled = AssertUnwindSafe(settle).catch_unwind().await;
            if tx.send(settled).is_err() {
                tracing::trace!("init run settled after its caller went away");
            }
        };
        if let Err(refused) = self.spawner.spawn(task) {
            tracing::warn!(
                component_id = %config.component_id,
                error = %refused,
                "executor refused init run; key stays in flight"
            );
            return Err(executor_error(config, &refused));
        }

        let component_id = config.component_id.to_string();
        Ok(async move {
            match rx.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(payload)) => panic::resume_unwind(payload),
                Err(oneshot::Canceled) => Err(InitError::Executor {
                    component_id,
                    message: "the executor dropped the run before it settled".into(),
                }),
            }
        }
        .boxed())
    }
}

fn executor_error<C: StateContainer>(
    config: &ComponentInitConfig<C>,
    refused: &SpawnError,
) -> InitError {
    InitError::Executor {
        component_id: config.component_id.to_string(),
        message: refused.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
