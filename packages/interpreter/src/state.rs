use crate::action::{ActionReference, ActionRegistry, ActionValue, BoundAction};
use crate::actor::ActorRef;
use crate::error::{InterpretError, InterpretResult, Warning};
use crate::macros::MacroHandler;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_TEXT_TAG: &str = "label";
pub const DEFAULT_MAX_MACRO_DEPTH: usize = 64;

/// Most body expansions a single `@loop` or `@forEach` may produce
pub const DEFAULT_MAX_EXPANSIONS: usize = 10_000;

/// Whether resolution and invocation failures abort the parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strictness {
    #[default]
    Strict,
    Lenient,
}

/// Skin and default style lookup
pub trait SkinLookup: fmt::Debug {
    fn has_skin(&self, skin: &str) -> bool;

    /// Style a tag gets when it does not set one
    fn default_style(&self, skin: &str, tag: &str) -> Option<String>;
}

/// In-memory skins: skin name → tag name → default style.
/// The `default` skin always exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Skins {
    skins: BTreeMap<String, BTreeMap<String, String>>,
}

impl Skins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_skin(&mut self, skin: impl Into<String>) -> &mut Self {
        self.skins.entry(skin.into()).or_default();
        self
    }

    pub fn set_default_style(
        &mut self,
        skin: impl Into<String>,
        tag: &str,
        style: impl Into<String>,
    ) -> &mut Self {
        self.skins
            .entry(skin.into())
            .or_default()
            .insert(tag.to_ascii_lowercase(), style.into());
        self
    }
}

impl SkinLookup for Skins {
    fn has_skin(&self, skin: &str) -> bool {
        skin == crate::actor::DEFAULT_SKIN || self.skins.contains_key(skin)
    }

    fn default_style(&self, skin: &str, tag: &str) -> Option<String> {
        self.skins.get(skin)?.get(&tag.to_ascii_lowercase()).cloned()
    }
}

/// Per-invocation state threaded through every processor, handler and macro.
pub struct ParserState {
    strictness: Strictness,
    text_tag: String,
    max_macro_depth: usize,
    max_expansions: usize,
    skins: Rc<dyn SkinLookup>,
    actors_by_id: HashMap<String, ActorRef>,
    /// Variable scopes; index 0 holds the pre-seeded bindings
    scopes: Vec<HashMap<String, Value>>,
    template_macros: HashMap<String, Arc<dyn MacroHandler>>,
    warnings: Vec<Warning>,
    path: Vec<String>,
    macro_stack: Vec<String>,
    template_name: String,
    actions: Rc<ActionRegistry>,
}

impl Default for ParserState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserState {
    pub fn new() -> Self {
        Self {
            strictness: Strictness::Strict,
            text_tag: DEFAULT_TEXT_TAG.to_string(),
            max_macro_depth: DEFAULT_MAX_MACRO_DEPTH,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            skins: Rc::new(Skins::new()),
            actors_by_id: HashMap::new(),
            scopes: vec![HashMap::new()],
            template_macros: HashMap::new(),
            warnings: Vec::new(),
            path: Vec::new(),
            macro_stack: Vec::new(),
            template_name: String::new(),
            actions: Rc::default(),
        }
    }

    pub fn lenient() -> Self {
        Self::new().with_strictness(Strictness::Lenient)
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_text_tag(mut self, tag: impl Into<String>) -> Self {
        self.text_tag = tag.into();
        self
    }

    pub fn with_max_macro_depth(mut self, depth: usize) -> Self {
        self.max_macro_depth = depth;
        self
    }

    pub fn with_max_expansions(mut self, limit: usize) -> Self {
        self.max_expansions = limit;
        self
    }

    pub fn with_skins(mut self, skins: impl SkinLookup + 'static) -> Self {
        self.skins = Rc::new(skins);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.scopes[0].insert(name.into(), value.into());
        self
    }

    pub fn with_actor(mut self, id: impl Into<String>, actor: ActorRef) -> Self {
        self.actors_by_id.insert(id.into(), actor);
        self
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    pub fn is_strict(&self) -> bool {
        self.strictness == Strictness::Strict
    }

    pub fn text_tag(&self) -> &str {
        &self.text_tag
    }

    pub fn max_macro_depth(&self) -> usize {
        self.max_macro_depth
    }

    pub fn max_expansions(&self) -> usize {
        self.max_expansions
    }

    pub fn skins(&self) -> &dyn SkinLookup {
        self.skins.as_ref()
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub(crate) fn set_template_name(&mut self, name: &str) {
        self.template_name = name.to_string();
    }

    pub(crate) fn attach_actions(&mut self, actions: Rc<ActionRegistry>) {
        self.actions = actions;
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    // --- ids ---

    /// Register an actor under `id`, replacing any previous holder
    pub fn register_actor(&mut self, id: impl Into<String>, actor: ActorRef) {
        self.actors_by_id.insert(id.into(), actor);
    }

    pub fn actor(&self, id: &str) -> Option<&ActorRef> {
        self.actors_by_id.get(id)
    }

    pub fn actors_by_id(&self) -> &HashMap<String, ActorRef> {
        &self.actors_by_id
    }

    // --- variables ---

    /// Innermost binding of `name`
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Bind in the innermost scope
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value.into());
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Drop the innermost scope. The base scope is never dropped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Replace every `{name}` with its binding. Braces that do not enclose an
    /// identifier are kept literally.
    pub fn substitute(&mut self, text: &str) -> InterpretResult<String> {
        if !text.contains('{') {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_variable_name(&after[..close]) => {
                    let name = &after[..close];
                    match self.variable(name) {
                        Some(value) => out.push_str(&value.to_text()),
                        None => self.recover(InterpretError::UnresolvedVariable {
                            name: name.to_string(),
                            path: self.path_string(),
                        })?,
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    // --- macros ---

    pub fn define_macro(&mut self, name: &str, handler: Arc<dyn MacroHandler>) {
        self.template_macros.insert(name.to_ascii_lowercase(), handler);
    }

    pub fn template_macro(&self, name: &str) -> Option<Arc<dyn MacroHandler>> {
        self.template_macros.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn macro_depth(&self) -> usize {
        self.macro_stack.len()
    }

    pub(crate) fn macro_stack(&self) -> &[String] {
        &self.macro_stack
    }

    pub(crate) fn push_macro(&mut self, name: String) {
        self.macro_stack.push(name);
    }

    pub(crate) fn pop_macro(&mut self) {
        self.macro_stack.pop();
    }

    // --- nesting path ---

    pub(crate) fn push_path(&mut self, segment: String) {
        self.path.push(segment);
    }

    pub(crate) fn pop_path(&mut self) {
        self.path.pop();
    }

    /// Nesting path of the tag being processed, e.g. `window/table/label`
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "<root>".to_string();
        }
        self.path.join("/")
    }

    // --- errors ---

    /// Apply the strictness policy to a failure. Strict mode and failures
    /// with no safe default return the error; lenient mode logs it, records a
    /// warning and lets the caller fall back.
    pub fn recover(&mut self, err: InterpretError) -> InterpretResult<()> {
        match err.warning_kind() {
            Some(kind) if self.strictness == Strictness::Lenient => {
                let path = self.path_string();
                warn!(kind = ?kind, path = %path, "{}", err);
                self.warnings.push(Warning::new(kind, err.to_string(), path));
                Ok(())
            }
            _ => Err(err),
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    // --- actions ---

    /// Resolve an action id. `Ok(None)` means the id was unresolved and the
    /// failure was recovered.
    pub fn resolve_action(&mut self, id: &str) -> InterpretResult<Option<ActionReference>> {
        match self.actions.resolve(id) {
            Some(reference) => Ok(Some(reference)),
            None => {
                self.recover(InterpretError::UnresolvedAction {
                    id: id.to_string(),
                    path: self.path_string(),
                })?;
                Ok(None)
            }
        }
    }

    /// Resolve an action for later firing under this parse's strictness
    pub fn bind_action(&mut self, id: &str) -> InterpretResult<Option<BoundAction>> {
        Ok(self
            .resolve_action(id)?
            .map(|reference| BoundAction::new(reference, self.strictness)))
    }

    /// Resolve and invoke an action now. `Ok(None)` means the action did not
    /// fire: it was unresolved or failed, and the failure was recovered.
    pub fn invoke_action(
        &mut self,
        id: &str,
        trigger: Option<Rc<dyn Any>>,
    ) -> InterpretResult<Option<ActionValue>> {
        let Some(reference) = self.resolve_action(id)? else {
            return Ok(None);
        };
        match reference.invoke(trigger) {
            Ok(value) => Ok(Some(value)),
            Err(source) => {
                self.recover(InterpretError::Action {
                    id: reference.id().to_string(),
                    source,
                })?;
                Ok(None)
            }
        }
    }

    pub(crate) fn into_parts(self) -> (HashMap<String, ActorRef>, Vec<Warning>) {
        (self.actors_by_id, self.warnings)
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
