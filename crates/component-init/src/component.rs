//! Component init configuration.
//!
//! A [`ComponentInitConfig`] is attached once to a component type and never
//! changes afterwards. It names the component, lists the props that feed its
//! init action, holds the action itself, and carries the per-type options.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{ActionError, InitError};
use crate::key::{ComponentId, InstanceKey};
use crate::mode::InitSelfPolicy;
use crate::state::{HasInitState, InitState};
use crate::store::StateContainer;

/// Init prop names zipped with their values, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InitProps(IndexMap<String, Value>);

impl InitProps {
    /// Zip prop names with values. Extra names or values are ignored.
    pub fn zip(names: &[String], values: &[Value]) -> Self {
        Self(
            names
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect(),
        )
    }

    /// Value of one init prop.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Props in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of props.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the component declares no init props.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object rendering, used in error messages.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Future returned by an init action.
pub type ActionFuture = BoxFuture<'static, Result<Value, ActionError>>;

/// What an init action handed back.
pub enum ActionReturn {
    /// A future that settles with the init result.
    Pending(ActionFuture),
    /// A plain value; this breaks the init action contract.
    Immediate(Value),
}

impl ActionReturn {
    /// Box a future as an action return.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }
}

impl fmt::Debug for ActionReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(_) => f.write_str("Pending(..)"),
            Self::Immediate(v) => f.debug_tuple("Immediate").field(v).finish(),
        }
    }
}

/// Init action: receives the init props and the state container handle,
/// through which it can dispatch host actions and read host state.
pub type InitAction<C> = Arc<dyn Fn(InitProps, Arc<C>) -> ActionReturn + Send + Sync>;

/// Handler that absorbs init action failures.
pub type ErrorHandler = Arc<dyn Fn(&ActionError) + Send + Sync>;

/// Locates the init slice inside the host state.
pub type InitStateSelector<S> = Arc<dyn Fn(&S) -> Option<&InitState> + Send + Sync>;

/// Per-type options.
pub struct InitOptions<C: StateContainer> {
    /// Absorbs action failures when present.
    pub on_error: Option<ErrorHandler>,
    /// Finds the init slice in the host state.
    pub get_init_state: InitStateSelector<C::State>,
    /// Self-init policy.
    pub init_self: InitSelfPolicy,
    /// In prepare mode, initialize lazily after mount instead of failing
    /// when the component was never prepared.
    pub allow_lazy: bool,
}

impl<C: StateContainer> Clone for InitOptions<C> {
    fn clone(&self) -> Self {
        Self {
            on_error: self.on_error.clone(),
            get_init_state: Arc::clone(&self.get_init_state),
            init_self: self.init_self,
            allow_lazy: self.allow_lazy,
        }
    }
}

impl<C: StateContainer> fmt::Debug for InitOptions<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitOptions")
            .field("on_error", &self.on_error.is_some())
            .field("init_self", &self.init_self)
            .field("allow_lazy", &self.allow_lazy)
            .finish()
    }
}

/// Immutable init descriptor of a component type.
pub struct ComponentInitConfig<C: StateContainer> {
    pub(crate) component_id: ComponentId,
    pub(crate) init_props: Vec<String>,
    pub(crate) init_action: InitAction<C>,
    pub(crate) options: InitOptions<C>,
}

impl<C: StateContainer> ComponentInitConfig<C> {
    /// Start building a config for `component_id`.
    pub fn builder(component_id: impl Into<String>) -> InitConfigBuilder<C> {
        InitConfigBuilder::new(component_id)
    }

    /// Component id.
    pub fn component_id(&self) -> &ComponentId {
        &self.component_id
    }

    /// Declared init prop names, in order.
    pub fn init_props(&self) -> &[String] {
        &self.init_props
    }

    /// Per-type options.
    pub fn options(&self) -> &InitOptions<C> {
        &self.options
    }

    /// Instance key for the given init values.
    pub fn key_for(&self, init_values: &[Value]) -> InstanceKey {
        InstanceKey::derive(&self.component_id, init_values)
    }

    /// Zip init values with the declared prop names.
    pub fn props_for(&self, init_values: &[Value]) -> InitProps {
        InitProps::zip(&self.init_props, init_values)
    }

    /// Run `f` against this component's init slice, under the container's
    /// read access.
    pub fn read_init_state<R>(
        &self,
        store: &C,
        f: impl FnOnce(&InitState) -> R,
    ) -> Result<R, InitError> {
        store
            .read(|state| (self.options.get_init_state)(state).map(f))
            .ok_or(InitError::MissingState)
    }

    pub(crate) fn invoke(&self, props: InitProps, store: Arc<C>) -> ActionReturn {
        (self.init_action)(props, store)
    }
}

impl<C: StateContainer> fmt::Debug for ComponentInitConfig<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInitConfig")
            .field("component_id", &self.component_id)
            .field("init_props", &self.init_props)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ComponentInitConfig`].
pub struct InitConfigBuilder<C: StateContainer> {
    component_id: String,
    init_props: Vec<String>,
    init_action: Option<InitAction<C>>,
    on_error: Option<ErrorHandler>,
    get_init_state: Option<InitStateSelector<C::State>>,
    init_self: InitSelfPolicy,
    allow_lazy: Option<bool>,
}

impl<C: StateContainer> InitConfigBuilder<C> {
    fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            init_props: Vec::new(),
            init_action: None,
            on_error: None,
            get_init_state: None,
            init_self: InitSelfPolicy::default(),
            allow_lazy: None,
        }
    }

    /// Props whose values feed the init action, in order.
    pub fn init_props<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.init_props = props.into_iter().map(Into::into).collect();
        self
    }

    /// Typed init action. Whatever the closure returns is a future, so the
    /// return contract holds by construction.
    pub fn init_action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn(InitProps, Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.init_action = Some(Arc::new(move |props, store| {
            ActionReturn::pending(action(props, store))
        }));
        self
    }

    /// Untyped init action, for actions supplied from dynamic configuration
    /// (script bridges and the like). The return is checked at run time.
    pub fn dynamic_init_action<F>(mut self, action: F) -> Self
    where
        F: Fn(InitProps, Arc<C>) -> ActionReturn + Send + Sync + 'static,
    {
        self.init_action = Some(Arc::new(action));
        self
    }

    /// Absorb action failures with `handler` instead of propagating them.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ActionError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Custom location of the init slice in the host state.
    pub fn get_init_state<F>(mut self, selector: F) -> Self
    where
        F: Fn(&C::State) -> Option<&InitState> + Send + Sync + 'static,
    {
        self.get_init_state = Some(Arc::new(selector));
        self
    }

    /// Self-init policy.
    pub fn init_self(mut self, policy: InitSelfPolicy) -> Self {
        self.init_self = policy;
        self
    }

    /// Allow lazy init after mount in prepare mode.
    pub fn allow_lazy(mut self, allow: bool) -> Self {
        self.allow_lazy = Some(allow);
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<ComponentInitConfig<C>, InitError> {
        self.build_with_lazy_default(false)
    }

    pub(crate) fn build_with_lazy_default(
        self,
        lazy_default: bool,
    ) -> Result<ComponentInitConfig<C>, InitError> {
        let component_id = ComponentId::new(self.component_id)?;
        let init_action = self.init_action.ok_or_else(|| {
            InitError::configuration(format!("component '{component_id}' has no init action"))
        })?;
        let get_init_state = self.get_init_state.ok_or_else(|| {
            InitError::configuration(format!(
                "component '{component_id}' has no init state selector"
            ))
        })?;
        if let Some(dup) = first_duplicate(&self.init_props) {
            return Err(InitError::configuration(format!(
                "component '{component_id}' declares init prop '{dup}' twice"
            )));
        }

        Ok(ComponentInitConfig {
            component_id,
            init_props: self.init_props,
            init_action,
            options: InitOptions {
                on_error: self.on_error,
                get_init_state,
                init_self: self.init_self,
                allow_lazy: self.allow_lazy.unwrap_or(lazy_default),
            },
        })
    }
}

impl<C> InitConfigBuilder<C>
where
    C: StateContainer,
    C::State: HasInitState,
{
    /// Read the init slice through the host state's [`HasInitState`] impl.
    pub fn host_init_state(self) -> Self {
        self.get_init_state(|state: &C::State| state.init_state())
    }
}

fn first_duplicate(names: &[String]) -> Option<&str> {
    names
        .iter()
        .enumerate()
        .find(|(i, name)| names[..*i].contains(*name))
        .map(|(_, name)| name.as_str())
}
