//! Tag handlers and the providers that create them.

use crate::actor::{ActorBuilder, ActorRef, Builder};
use crate::error::{InterpretError, InterpretResult};
use crate::state::ParserState;
use lml_parser::TagNode;
use std::fmt;
use std::sync::Arc;

/// Name of the standard attribute text data is applied to
pub const TEXT_ATTRIBUTE: &str = "text";

/// What a handler does with constructed child actors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    /// Hand the child to [`TagHandler::add_child`]
    Accept,
    /// Children are an error
    Reject,
    /// Children are processed for their side effects only
    Ignore,
}

/// What a handler does with text found between its child tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPolicy {
    /// Apply as the `text` attribute of the handler's own actor
    AsAttribute,
    /// Create a child through the configured text tag
    AsChild,
    Reject,
}

/// Deferred close-time callback
pub type CloseAction = Box<dyn FnOnce(&mut ParserState, Option<&ActorRef>) -> InterpretResult<()>>;

/// State every handler carries: the tag it wraps, the actor it produced and
/// its close-time callbacks.
pub struct HandlerCore {
    tag: String,
    path: String,
    actor: Option<ActorRef>,
    on_close: Vec<CloseAction>,
}

impl HandlerCore {
    pub fn new(node: &TagNode, state: &ParserState) -> Self {
        Self {
            tag: node.name.clone(),
            path: state.path_string(),
            actor: None,
            on_close: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn actor(&self) -> Option<&ActorRef> {
        self.actor.as_ref()
    }

    pub(crate) fn set_actor(&mut self, actor: Option<ActorRef>) {
        self.actor = actor;
    }

    /// Queue a callback for the closing phase. Callbacks run in registration
    /// order, after every child has been handled.
    pub fn on_close(
        &mut self,
        action: impl FnOnce(&mut ParserState, Option<&ActorRef>) -> InterpretResult<()> + 'static,
    ) {
        self.on_close.push(Box::new(action));
    }

    /// Drain the close-time queue. A failing callback goes through the
    /// strictness policy; the remaining ones still run when it is recovered.
    pub(crate) fn close(&mut self, state: &mut ParserState) -> InterpretResult<()> {
        let actor = self.actor.clone();
        for action in self.on_close.drain(..) {
            if let Err(err) = action(state, actor.as_ref()) {
                state.recover(err)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for HandlerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCore")
            .field("tag", &self.tag)
            .field("path", &self.path)
            .field("has_actor", &self.actor.is_some())
            .field("on_close", &self.on_close.len())
            .finish()
    }
}

/// Per-tag construction logic, created by a [`TagProvider`] when the tag opens
pub trait TagHandler {
    fn core(&self) -> &HandlerCore;
    fn core_mut(&mut self) -> &mut HandlerCore;

    /// Pre-construction value object offered to building attributes
    fn create_builder(&self, _state: &ParserState) -> Box<dyn Builder> {
        Box::new(ActorBuilder::default())
    }

    /// Construct the actor from the finished builder. `None` for actor-less
    /// tags such as listeners.
    fn instantiate(
        &mut self,
        state: &mut ParserState,
        builder: Box<dyn Builder>,
    ) -> InterpretResult<Option<ActorRef>>;

    fn child_policy(&self) -> ChildPolicy {
        if self.core().actor().is_some() {
            ChildPolicy::Accept
        } else {
            ChildPolicy::Ignore
        }
    }

    fn text_policy(&self) -> TextPolicy {
        TextPolicy::AsChild
    }

    /// Insert a child actor. `false` means the child was refused.
    fn add_child(&mut self, _state: &mut ParserState, child: ActorRef) -> InterpretResult<bool> {
        match self.core().actor() {
            Some(actor) => Ok(actor.borrow_mut().add_child(child)),
            None => Ok(false),
        }
    }

    /// Attachable tags are given to [`TagHandler::attach_to`] on the parent
    /// instead of being inserted as children.
    fn is_attachable(&self) -> bool {
        false
    }

    fn attach_to(&mut self, _state: &mut ParserState, parent: &mut dyn TagHandler) -> InterpretResult<()> {
        Err(InterpretError::custom(format!(
            "<{}> cannot attach to <{}>",
            self.core().tag(),
            parent.core().tag()
        )))
    }

    /// Attributes no registered processor handles. Returns `false` when the
    /// handler does not know the attribute either.
    fn handle_own_attribute(
        &mut self,
        _state: &mut ParserState,
        _name: &str,
        _value: &str,
    ) -> InterpretResult<bool> {
        Ok(false)
    }
}

/// Creates handlers for one tag name
pub trait TagProvider: Send + Sync {
    fn create(
        &self,
        state: &mut ParserState,
        parent: Option<&dyn TagHandler>,
        node: &TagNode,
    ) -> InterpretResult<Box<dyn TagHandler>>;
}

type ActorFactory = dyn Fn(&dyn Builder, &mut ParserState) -> InterpretResult<ActorRef> + Send + Sync;

/// Provider for the common case: one actor built from the builder by a
/// factory closure, with fixed child and text policies.
#[derive(Clone)]
pub struct ActorTag {
    factory: Arc<ActorFactory>,
    builder: fn() -> Box<dyn Builder>,
    children: ChildPolicy,
    text: TextPolicy,
}

impl ActorTag {
    pub fn new(
        factory: impl Fn(&dyn Builder, &mut ParserState) -> InterpretResult<ActorRef> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Arc::new(factory),
            builder: default_builder,
            children: ChildPolicy::Accept,
            text: TextPolicy::AsChild,
        }
    }

    pub fn with_builder(mut self, builder: fn() -> Box<dyn Builder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_children(mut self, policy: ChildPolicy) -> Self {
        self.children = policy;
        self
    }

    pub fn with_text(mut self, policy: TextPolicy) -> Self {
        self.text = policy;
        self
    }
}

fn default_builder() -> Box<dyn Builder> {
    Box::new(ActorBuilder::default())
}

impl TagProvider for ActorTag {
    fn create(
        &self,
        state: &mut ParserState,
        _parent: Option<&dyn TagHandler>,
        node: &TagNode,
    ) -> InterpretResult<Box<dyn TagHandler>> {
        Ok(Box::new(ActorTagHandler {
            core: HandlerCore::new(node, state),
            tag: self.clone(),
        }))
    }
}

struct ActorTagHandler {
    core: HandlerCore,
    tag: ActorTag,
}

impl TagHandler for ActorTagHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn create_builder(&self, _state: &ParserState) -> Box<dyn Builder> {
        (self.tag.builder)()
    }

    fn instantiate(
        &mut self,
        state: &mut ParserState,
        builder: Box<dyn Builder>,
    ) -> InterpretResult<Option<ActorRef>> {
        (self.tag.factory)(builder.as_ref(), state).map(Some)
    }

    fn child_policy(&self) -> ChildPolicy {
        self.tag.children
    }

    fn text_policy(&self) -> TextPolicy {
        self.tag.text
    }
}
