//! # Component Init
//!
//! Coordinates asynchronous initialization of stateful UI components against
//! a shared state container, in one of two modes:
//!
//! - [`InitMode::InitSelf`]: components initialize themselves as they mount.
//! - [`InitMode::Prepare`]: components are prepared ahead of render by an
//!   external caller, and mounting only checks that preparation happened.
//!
//! ## Architecture
//!
//! ```text
//! lifecycle hook / prepare call
//!        │
//!        ▼
//! ┌────────────────┐  read {mode, prepared}  ┌──────────────────┐
//! │  Orchestrator  │◄───────────────────────│  StateContainer  │
//! │  (run_init)    │───────────────────────►│  + InitState     │
//! └────────────────┘  INIT_COMPONENT events  └──────────────────┘
//!        │
//!        ▼
//!   init action ──► error policy ──► InitFuture
//! ```
//!
//! Per instance key the registry tracks absent / in flight / complete, and a
//! request for a key that is already in flight never starts a second run.
//! Runs are driven by an executor, so a run whose caller went away still
//! settles and marks its key complete.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use component_init::{
//!     prepare_component, ComponentInitConfig, ComponentRegistry, HostConfig,
//!     InitEvent, InitState, Orchestrator, Store,
//! };
//! use std::sync::Arc;
//!
//! let host = HostConfig::from_toml_str("mode = \"prepare\"")?;
//! let store = Arc::new(Store::<InitState, InitEvent>::for_init_state(host.initial_state()));
//! // Any `futures::task::Spawn` executor; it drives init runs to completion
//! // even after their callers stop waiting.
//! let orchestrator = Orchestrator::new(Arc::clone(&store), executor);
//!
//! let registry = ComponentRegistry::from_config(&host);
//! let feed = registry.bind(
//!     ComponentInitConfig::builder("Feed")
//!         .init_props(["page"])
//!         .host_init_state()
//!         .init_action(|props, _store| async move { load_feed(props).await }),
//! )?;
//!
//! prepare_component(&orchestrator, &feed, &[serde_json::json!(1)]).await?;
//! ```

#![forbid(unsafe_code)]

pub mod binding;
pub mod component;
pub mod config;
pub mod error_policy;
pub mod errors;
pub mod key;
pub mod mode;
pub mod orchestrator;
pub mod state;
pub mod store;

pub use binding::{
    prepare_component, prepare_components, BoundComponent, ComponentRegistry, MountedInstance,
};
pub use component::{
    ActionFuture, ActionReturn, ComponentInitConfig, ErrorHandler, InitAction, InitConfigBuilder,
    InitOptions, InitProps, InitStateSelector,
};
pub use config::HostConfig;
pub use errors::{ActionError, ErrorCategory, InitError};
pub use key::{ComponentId, InstanceKey};
pub use mode::{InitMode, InitSelfPolicy};
pub use orchestrator::{decide, CallSite, Decision, InitFuture, Orchestrator, Spawner};
pub use state::{
    reduce, HasInitState, InitComponentPayload, InitEvent, InitState, PrepareStatus, INIT_COMPONENT,
};
pub use store::{StateContainer, Store};
