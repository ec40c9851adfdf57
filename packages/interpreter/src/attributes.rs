//! Attribute processors and capability-keyed dispatch.

use crate::actor::{capability_chain, ActorRef, Builder, Capability, ANY, BUILDER};
use crate::error::{InterpretError, InterpretResult};
use crate::state::ParserState;
use crate::tags::TagHandler;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a building processor did with its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOutcome {
    /// Consumed; the attribute is not offered to standard processors
    FullyHandled,
    /// Still offered to standard processors after construction
    PartiallyHandled,
}

/// Mutates a constructed actor
pub trait AttributeProcessor: Send + Sync {
    fn process(
        &self,
        state: &mut ParserState,
        handler: &mut dyn TagHandler,
        actor: &ActorRef,
        value: &str,
    ) -> InterpretResult<()>;
}

impl<F> AttributeProcessor for F
where
    F: Fn(&mut ParserState, &mut dyn TagHandler, &ActorRef, &str) -> InterpretResult<()> + Send + Sync,
{
    fn process(
        &self,
        state: &mut ParserState,
        handler: &mut dyn TagHandler,
        actor: &ActorRef,
        value: &str,
    ) -> InterpretResult<()> {
        self(state, handler, actor, value)
    }
}

/// Mutates a builder before its actor exists
pub trait BuildingAttributeProcessor: Send + Sync {
    fn process(
        &self,
        state: &mut ParserState,
        builder: &mut dyn Builder,
        value: &str,
    ) -> InterpretResult<AttributeOutcome>;
}

impl<F> BuildingAttributeProcessor for F
where
    F: Fn(&mut ParserState, &mut dyn Builder, &str) -> InterpretResult<AttributeOutcome> + Send + Sync,
{
    fn process(
        &self,
        state: &mut ParserState,
        builder: &mut dyn Builder,
        value: &str,
    ) -> InterpretResult<AttributeOutcome> {
        self(state, builder, value)
    }
}

/// Processors keyed by attribute name (case-insensitive) and capability
pub struct AttributeRegistry<P: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Vec<(Capability, Arc<P>)>>,
}

impl<P: ?Sized> AttributeRegistry<P> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Register a processor. Two processors for the same name and capability
    /// would make dispatch ambiguous, so the second is refused.
    pub fn register(&mut self, name: &str, capability: Capability, processor: Arc<P>) -> InterpretResult<()> {
        let candidates = self.entries.entry(name.to_ascii_lowercase()).or_default();
        if candidates.iter().any(|(existing, _)| *existing == capability) {
            return Err(InterpretError::DuplicateRegistration {
                kind: self.kind,
                name: format!("{} on {}", name, capability),
            });
        }
        candidates.push((capability, processor));
        Ok(())
    }

    /// Register or overwrite a processor
    pub fn replace(&mut self, name: &str, capability: Capability, processor: Arc<P>) {
        let candidates = self.entries.entry(name.to_ascii_lowercase()).or_default();
        match candidates.iter_mut().find(|(existing, _)| *existing == capability) {
            Some(entry) => entry.1 = processor,
            None => candidates.push((capability, processor)),
        }
    }

    /// Most specific processor for `name` on an object declaring
    /// `capabilities`: the first capability in the chain with a processor.
    pub fn resolve(&self, name: &str, capabilities: &[Capability]) -> Option<&Arc<P>> {
        let candidates = self.entries.get(&name.to_ascii_lowercase())?;
        capability_chain(capabilities).find_map(|capability| {
            candidates
                .iter()
                .find(|(registered, _)| *registered == capability)
                .map(|(_, processor)| processor)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P: ?Sized> fmt::Debug for AttributeRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self
            .entries
            .iter()
            .map(|(name, candidates)| {
                let caps: Vec<_> = candidates.iter().map(|(c, _)| c.name()).collect();
                format!("{}[{}]", name, caps.join(","))
            })
            .collect();
        names.sort();
        f.debug_struct("AttributeRegistry")
            .field("kind", &self.kind)
            .field("entries", &names)
            .finish()
    }
}

pub(crate) fn register_builtins(
    attributes: &mut AttributeRegistry<dyn AttributeProcessor>,
    building: &mut AttributeRegistry<dyn BuildingAttributeProcessor>,
) {
    attributes.replace("id", ANY, Arc::new(process_id));
    building.replace("style", BUILDER, Arc::new(build_style));
    building.replace("skin", BUILDER, Arc::new(build_skin));
}

fn process_id(
    state: &mut ParserState,
    _handler: &mut dyn TagHandler,
    actor: &ActorRef,
    value: &str,
) -> InterpretResult<()> {
    state.register_actor(value, actor.clone());
    Ok(())
}

fn build_style(
    _state: &mut ParserState,
    builder: &mut dyn Builder,
    value: &str,
) -> InterpretResult<AttributeOutcome> {
    builder.base_mut().style = value.to_string();
    Ok(AttributeOutcome::FullyHandled)
}

fn build_skin(
    state: &mut ParserState,
    builder: &mut dyn Builder,
    value: &str,
) -> InterpretResult<AttributeOutcome> {
    if !state.skins().has_skin(value) {
        return Err(InterpretError::invalid_value("skin", value, "unknown skin"));
    }
    builder.base_mut().skin = value.to_string();
    Ok(AttributeOutcome::FullyHandled)
}
