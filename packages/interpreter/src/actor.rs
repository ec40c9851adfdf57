//! Constructed objects ("actors"), the capability tags they declare, and the
//! builder value objects that exist before they do.

use serde_json::json;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A named node in an open type hierarchy.
///
/// Attribute processors are registered against capabilities; an actor lists
/// the capabilities it satisfies from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(&'static str);

impl Capability {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Implicit root of every capability chain
pub const ANY: Capability = Capability::new("any");

/// Capability of the base [`ActorBuilder`]
pub const BUILDER: Capability = Capability::new("builder");

pub const DEFAULT_SKIN: &str = "default";
pub const DEFAULT_STYLE: &str = "default";

/// Walk a declared capability list from most to least specific, ending with
/// [`ANY`].
pub fn capability_chain(declared: &[Capability]) -> impl Iterator<Item = Capability> + '_ {
    let tail = if declared.contains(&ANY) { None } else { Some(ANY) };
    declared.iter().copied().chain(tail)
}

/// Upcast to `Any`, implemented for every `'static` type
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An object produced by a tag
pub trait Actor: AsAny + fmt::Debug + 'static {
    /// Declared capabilities, most specific first
    fn capabilities(&self) -> &'static [Capability];

    fn type_name(&self) -> &'static str {
        self.capabilities()
            .first()
            .map(Capability::name)
            .unwrap_or("actor")
    }

    /// Insert a child actor. Returns `false` if this actor takes no children.
    fn add_child(&mut self, _child: ActorRef) -> bool {
        false
    }

    /// JSON view of the actor for tooling and debugging
    fn snapshot(&self) -> serde_json::Value {
        json!({ "type": self.type_name() })
    }
}

impl dyn Actor {
    pub fn is<T: Actor>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Actor>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Actor>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Shared handle to a constructed actor
pub type ActorRef = Rc<RefCell<dyn Actor>>;

pub fn actor_ref<A: Actor>(actor: A) -> ActorRef {
    Rc::new(RefCell::new(actor))
}

/// Run `f` against the actor if it is a `T`
pub fn with_actor_mut<T: Actor, R>(actor: &ActorRef, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    let mut borrowed = actor.borrow_mut();
    borrowed.downcast_mut::<T>().map(f)
}

/// Pre-construction value object handed to building attribute processors
pub trait Builder: AsAny + fmt::Debug + 'static {
    fn capabilities(&self) -> &'static [Capability] {
        &[BUILDER]
    }

    fn base(&self) -> &ActorBuilder;
    fn base_mut(&mut self) -> &mut ActorBuilder;
}

impl dyn Builder {
    pub fn downcast_ref<T: Builder>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Builder>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Builder shared by every tag: skin and style selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorBuilder {
    pub skin: String,
    pub style: String,
}

impl Default for ActorBuilder {
    fn default() -> Self {
        Self {
            skin: DEFAULT_SKIN.to_string(),
            style: String::new(),
        }
    }
}

impl ActorBuilder {
    /// Style to use: the explicit one, or [`DEFAULT_STYLE`]
    pub fn style_or_default(&self) -> &str {
        if self.style.is_empty() {
            DEFAULT_STYLE
        } else {
            &self.style
        }
    }
}

impl Builder for ActorBuilder {
    fn base(&self) -> &ActorBuilder {
        self
    }

    fn base_mut(&mut self) -> &mut ActorBuilder {
        self
    }
}
