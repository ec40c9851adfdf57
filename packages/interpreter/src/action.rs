//! Action resolution: symbolic ids found in attribute text resolved to
//! invocable closures whose parameters are bound by type.

use crate::actor::ActorRef;
use crate::state::Strictness;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

/// Marker that prefixes action references in attribute values (`$close`)
pub const ACTION_MARKER: char = '$';

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Missing argument {index} ({type_name})")]
    MissingArgument { index: usize, type_name: &'static str },

    #[error("Argument {index} is not a {expected}")]
    TypeMismatch { index: usize, expected: &'static str },

    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

type Provider = Rc<dyn Fn() -> Rc<dyn Any>>;

/// Values available to action parameters, looked up by exact type
#[derive(Clone, Default)]
pub struct DependencyContext {
    values: HashMap<TypeId, Rc<dyn Any>>,
    providers: HashMap<TypeId, Provider>,
}

impl DependencyContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide<T: Any>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Rc::new(value));
    }

    /// Register a provider that creates the value on each lookup
    pub fn provide_with<T: Any>(&mut self, provider: impl Fn() -> T + 'static) {
        let provider: Provider = Rc::new(move || Rc::new(provider()) as Rc<dyn Any>);
        self.providers.insert(TypeId::of::<T>(), provider);
    }

    pub fn get<T: Any>(&self) -> Option<Rc<T>> {
        self.get_any(TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
    }

    fn get_any(&self, type_id: TypeId) -> Option<Rc<dyn Any>> {
        if let Some(value) = self.values.get(&type_id) {
            return Some(value.clone());
        }
        self.providers.get(&type_id).map(|provider| provider())
    }

    pub fn len(&self) -> usize {
        self.values.len() + self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DependencyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyContext")
            .field("values", &self.values.len())
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Declared type of one action parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ParamSpec {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Bound arguments of one invocation. Unfilled slots are `None`.
pub struct ActionArgs<'a> {
    params: &'a [ParamSpec],
    values: Vec<Option<Rc<dyn Any>>>,
}

impl<'a> ActionArgs<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument `index` as a `T`. An unfilled slot is `Ok(None)`; a filled slot
    /// of another type is a mismatch.
    pub fn get<T: Any>(&self, index: usize) -> Result<Option<Rc<T>>, ActionError> {
        let Some(Some(value)) = self.values.get(index) else {
            return Ok(None);
        };
        value
            .clone()
            .downcast::<T>()
            .map(Some)
            .map_err(|_| ActionError::TypeMismatch {
                index,
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn require<T: Any>(&self, index: usize) -> Result<Rc<T>, ActionError> {
        self.get::<T>(index)?.ok_or(ActionError::MissingArgument {
            index,
            type_name: self
                .params
                .get(index)
                .map(|p| p.type_name)
                .unwrap_or_else(std::any::type_name::<T>),
        })
    }
}

/// Result of an invoked action
#[derive(Clone)]
pub enum ActionValue {
    Unit,
    Bool(bool),
    Number(f64),
    Text(String),
    Actor(ActorRef),
    Other(Rc<dyn Any>),
}

impl ActionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ActionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            ActionValue::Unit => String::new(),
            ActionValue::Bool(b) => b.to_string(),
            ActionValue::Number(n) => n.to_string(),
            ActionValue::Text(text) => text.clone(),
            ActionValue::Actor(actor) => actor.borrow().type_name().to_string(),
            ActionValue::Other(_) => String::new(),
        }
    }
}

impl fmt::Debug for ActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionValue::Unit => write!(f, "Unit"),
            ActionValue::Bool(b) => write!(f, "Bool({})", b),
            ActionValue::Number(n) => write!(f, "Number({})", n),
            ActionValue::Text(text) => write!(f, "Text({:?})", text),
            ActionValue::Actor(actor) => write!(f, "Actor({})", actor.borrow().type_name()),
            ActionValue::Other(_) => write!(f, "Other(..)"),
        }
    }
}

impl From<()> for ActionValue {
    fn from(_: ()) -> Self {
        ActionValue::Unit
    }
}

impl From<bool> for ActionValue {
    fn from(b: bool) -> Self {
        ActionValue::Bool(b)
    }
}

impl From<f64> for ActionValue {
    fn from(n: f64) -> Self {
        ActionValue::Number(n)
    }
}

impl From<String> for ActionValue {
    fn from(text: String) -> Self {
        ActionValue::Text(text)
    }
}

impl From<&str> for ActionValue {
    fn from(text: &str) -> Self {
        ActionValue::Text(text.to_string())
    }
}

impl From<ActorRef> for ActionValue {
    fn from(actor: ActorRef) -> Self {
        ActionValue::Actor(actor)
    }
}

pub type ActionResult = Result<ActionValue, ActionError>;

type ActionFn = Rc<dyn Fn(&ActionArgs<'_>) -> ActionResult>;

/// A named invocable unit with declared parameter types
#[derive(Clone)]
pub struct Action {
    name: String,
    aliases: Vec<String>,
    params: Vec<ParamSpec>,
    invoke: ActionFn,
}

impl Action {
    pub fn new(name: impl Into<String>, invoke: impl Fn(&ActionArgs<'_>) -> ActionResult + 'static) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            params: Vec::new(),
            invoke: Rc::new(invoke),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Append a parameter of type `T`
    pub fn param<T: Any>(mut self) -> Self {
        self.params.push(ParamSpec::of::<T>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn answers_to(&self, id: &str) -> bool {
        self.name == id || self.aliases.iter().any(|alias| alias == id)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("params", &self.params.iter().map(|p| p.type_name).collect::<Vec<_>>())
            .finish()
    }
}

/// Actions exposed by one container
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    actions: Vec<Action>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn find(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|action| action.answers_to(id))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// An application object exposing actions.
///
/// Called once, at registration; implementors add closures capturing `self`.
pub trait ActionContainer {
    fn register_actions(self: Rc<Self>, table: &mut ActionTable);
}

/// Named containers plus a global table
#[derive(Debug, Default)]
pub struct ActionRegistry {
    containers: Vec<(String, ActionTable)>,
    global: ActionTable,
    context: Rc<DependencyContext>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: DependencyContext) -> Self {
        self.context = Rc::new(context);
        self
    }

    pub fn context(&self) -> &DependencyContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut DependencyContext {
        Rc::make_mut(&mut self.context)
    }

    /// Register a container under `id`. Re-registering an id replaces its table.
    pub fn register_container<C: ActionContainer + 'static>(&mut self, id: impl Into<String>, container: Rc<C>) {
        let id = id.into();
        let mut table = ActionTable::new();
        container.register_actions(&mut table);
        debug!(container = %id, actions = table.len(), "Registering action container");

        match self.containers.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, existing)) => *existing = table,
            None => self.containers.push((id, table)),
        }
    }

    pub fn register_action(&mut self, action: Action) {
        self.global.add(action);
    }

    /// Resolve an id, with or without the `$` marker. `container.action`
    /// addresses a specific container; a plain id searches containers in
    /// registration order, then the global table.
    pub fn resolve(&self, id: &str) -> Option<ActionReference> {
        let key = id.trim().trim_start_matches(ACTION_MARKER);

        let action = match key.split_once('.') {
            Some((container, name)) => self
                .containers
                .iter()
                .find(|(existing, _)| existing == container)
                .and_then(|(_, table)| table.find(name))
                .or_else(|| self.global.find(key)),
            None => self
                .containers
                .iter()
                .find_map(|(_, table)| table.find(key))
                .or_else(|| self.global.find(key)),
        }?;

        Some(ActionReference {
            id: key.to_string(),
            action: action.clone(),
            context: self.context.clone(),
        })
    }
}

/// A resolved action bound to its dependency context
#[derive(Clone)]
pub struct ActionReference {
    id: String,
    action: Action,
    context: Rc<DependencyContext>,
}

impl ActionReference {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Fill parameter slots. The first slot whose type exactly matches the
    /// trigger takes the trigger; every other slot is looked up in the
    /// dependency context and left unfilled if absent.
    pub fn bind(&self, trigger: Option<&Rc<dyn Any>>) -> Vec<Option<Rc<dyn Any>>> {
        let trigger_type = trigger.map(|t| Any::type_id(&**t));
        let mut trigger_slot = self
            .action
            .params
            .iter()
            .position(|param| Some(param.type_id) == trigger_type);

        self.action
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                if trigger_slot == Some(index) {
                    trigger_slot = None;
                    return trigger.cloned();
                }
                self.context.get_any(param.type_id)
            })
            .collect()
    }

    pub fn invoke(&self, trigger: Option<Rc<dyn Any>>) -> ActionResult {
        let args = ActionArgs {
            params: &self.action.params,
            values: self.bind(trigger.as_ref()),
        };
        debug!(action = %self.id, bound = args.values.iter().filter(|v| v.is_some()).count(), "Invoking action");
        (self.action.invoke)(&args)
    }
}

impl fmt::Debug for ActionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionReference")
            .field("id", &self.id)
            .field("action", &self.action)
            .finish()
    }
}

/// An action reference kept by an actor and fired at runtime, for example by
/// an event listener. Applies the strictness of the parse that created it.
#[derive(Debug, Clone)]
pub struct BoundAction {
    reference: ActionReference,
    strictness: Strictness,
    failures: Rc<RefCell<Vec<ActionError>>>,
}

impl BoundAction {
    pub fn new(reference: ActionReference, strictness: Strictness) -> Self {
        Self {
            reference,
            strictness,
            failures: Rc::default(),
        }
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// Invoke the action. In lenient mode a failure is logged, recorded and
    /// reported as `Ok(None)`: the call site proceeds as if nothing fired.
    pub fn fire(&self, trigger: Option<Rc<dyn Any>>) -> Result<Option<ActionValue>, ActionError> {
        match self.reference.invoke(trigger) {
            Ok(value) => Ok(Some(value)),
            Err(err) if self.strictness == Strictness::Lenient => {
                warn!(action = %self.reference.id(), error = %err, "Action failed");
                self.failures.borrow_mut().push(err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub fn failures(&self) -> Vec<ActionError> {
        self.failures.borrow().clone()
    }

    /// Whether `other` is a clone of this binding rather than a separate
    /// binding of the same action
    pub fn same_binding(&self, other: &BoundAction) -> bool {
        Rc::ptr_eq(&self.failures, &other.failures)
    }
}
