//! # LML Interpreter
//!
//! Turns tag trees from `lml-parser` into live objects ("actors") through
//! open registries: tag providers, capability-keyed attribute processors,
//! macros and actions.
//!
//! ## Construction Pipeline
//!
//! Every tag passes through the same phases:
//!
//! 1. **Opened**: the tag provider creates a handler, the handler a builder
//! 2. **BuildingAttrs**: attributes are offered to building processors, in
//!    source order; a processor may consume an attribute completely
//! 3. **Instantiated**: the handler constructs the actor from the builder
//! 4. **StandardAttrs**: the remaining attributes go to the processor
//!    registered for the most specific capability of the actor
//! 5. **Children**: child tags and text, then attachable children
//! 6. **Closing**: deferred close-time callbacks, in registration order
//! 7. **Closed**: the actor is handed to its parent
//!
//! ## Strictness
//!
//! Syntax errors and macro recursion are always fatal. Every other failure
//! (unknown tags, unsupported attributes, unresolved actions or variables,
//! failing processors) is fatal in strict mode; in lenient mode it is logged,
//! recorded as a [`Warning`] and skipped.
//!
//! ## Macros
//!
//! Macro bodies are captured as raw text by the parser and only parsed when
//! the macro expands them, so every expansion is independent. Expansion depth
//! is bounded by [`ParserState::max_macro_depth`], and the number of bodies a
//! single `@loop` or `@forEach` produces by [`ParserState::max_expansions`].
//!
//! ```
//! use lml_interpreter::{Interpreter, ParserState, Syntax};
//!
//! let interpreter = Interpreter::new(Syntax::with_defaults());
//! let output = interpreter
//!     .render("empty", "<@loop times=2></@loop>", ParserState::new())
//!     .unwrap();
//! assert!(output.roots.is_empty());
//! ```

pub mod action;
pub mod actor;
pub mod attributes;
pub mod error;
pub mod expression;
pub mod loader;
pub mod macros;
pub mod pipeline;
pub mod state;
pub mod syntax;
pub mod tags;
pub mod value;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod tests_pipeline;

#[cfg(test)]
mod tests_macros;

pub use action::{
    Action, ActionArgs, ActionContainer, ActionError, ActionReference, ActionRegistry,
    ActionResult, ActionTable, ActionValue, BoundAction, DependencyContext, ParamSpec,
};
pub use actor::{
    actor_ref, capability_chain, with_actor_mut, Actor, ActorBuilder, ActorRef, Builder,
    Capability, ANY, BUILDER,
};
pub use attributes::{AttributeOutcome, AttributeProcessor, AttributeRegistry, BuildingAttributeProcessor};
pub use error::{InterpretError, InterpretResult, Warning, WarningKind};
pub use expression::{Condition, ExpressionError};
pub use loader::{FileSystemLoader, MemoryLoader, TemplateLoader};
pub use macros::{MacroContext, MacroHandler};
pub use pipeline::{Interpreter, Phase, RenderOutput};
pub use state::{ParserState, SkinLookup, Skins, Strictness};
pub use syntax::Syntax;
pub use tags::{ActorTag, ChildPolicy, HandlerCore, TagHandler, TagProvider, TextPolicy};
pub use value::Value;
