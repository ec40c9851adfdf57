//! Macro engine. A macro tag's body reaches its handler as raw text; the
//! handler decides how often, and under which bindings, that text is parsed
//! and processed at the macro's position.

mod builtin;
mod sequence;

pub use builtin::{
    ActorMacro, AssignMacro, CommentMacro, ForEachMacro, IfMacro, ImportMacro, LogMacro,
    LoopMacro, MacroDefinition, MacroParam, TemplateMacro, DEFAULT_LOOP_VARIABLE,
};
pub use sequence::parse_sequence;

use crate::actor::ActorRef;
use crate::error::{InterpretError, InterpretResult};
use crate::pipeline::{Interpreter, Target};
use crate::state::ParserState;
use crate::syntax::Syntax;
use crate::value::Value;
use lml_parser::TagNode;

pub trait MacroHandler: Send + Sync {
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()>;
}

impl<F> MacroHandler for F
where
    F: Fn(&mut MacroContext<'_, '_>) -> InterpretResult<()> + Send + Sync,
{
    fn expand(&self, ctx: &mut MacroContext<'_, '_>) -> InterpretResult<()> {
        self(ctx)
    }
}

pub(crate) fn register_defaults(syntax: &mut Syntax) {
    syntax.replace_macro("if", IfMacro);
    syntax.replace_macro("loop", LoopMacro);
    syntax.replace_macro("forEach", ForEachMacro);
    syntax.replace_macro("assign", AssignMacro);
    syntax.replace_macro("comment", CommentMacro);
    syntax.replace_macro("import", ImportMacro);
    syntax.replace_macro("macro", MacroDefinition);
    syntax.replace_macro("log", LogMacro);
    syntax.replace_macro("actor", ActorMacro);
}

/// What a macro handler sees: its tag, the parser state and the position
/// its expansions are placed at.
pub struct MacroContext<'c, 't> {
    interpreter: &'c Interpreter,
    state: &'c mut ParserState,
    node: &'c TagNode,
    target: &'c mut Target<'t>,
}

impl<'c, 't> MacroContext<'c, 't> {
    pub(crate) fn new(
        interpreter: &'c Interpreter,
        state: &'c mut ParserState,
        node: &'c TagNode,
        target: &'c mut Target<'t>,
    ) -> Self {
        Self {
            interpreter,
            state,
            node,
            target,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        self.interpreter
    }

    pub fn state(&mut self) -> &mut ParserState {
        &mut *self.state
    }

    pub fn node(&self) -> &'c TagNode {
        self.node
    }

    /// Macro name as written, sigil included
    pub fn name(&self) -> String {
        self.node.display_name()
    }

    /// Raw body text, empty for self-closing macros
    pub fn body(&self) -> &'c str {
        self.node.raw_body.as_deref().unwrap_or("")
    }

    pub fn raw_attribute(&self, name: &str) -> Option<&'c str> {
        self.node.attribute(name)
    }

    /// Named attribute with variables substituted
    pub fn attribute(&mut self, name: &str) -> InterpretResult<Option<String>> {
        match self.node.attribute(name) {
            Some(raw) => self.state.substitute(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Named attribute, or the first positional one
    pub fn attribute_or_first(&mut self, name: &str) -> InterpretResult<Option<String>> {
        match self.attribute(name)? {
            Some(value) => Ok(Some(value)),
            None => Ok(self.positional()?.into_iter().next()),
        }
    }

    /// Positional attributes with variables substituted
    pub fn positional(&mut self) -> InterpretResult<Vec<String>> {
        let node = self.node;
        node.positional_attributes()
            .map(|raw| self.state.substitute(raw))
            .collect()
    }

    /// Named attributes in source order with variables substituted
    pub fn named_attributes(&mut self) -> InterpretResult<Vec<(String, String)>> {
        let node = self.node;
        node.named_attributes()
            .map(|(name, raw)| Ok((name.to_string(), self.state.substitute(raw)?)))
            .collect()
    }

    /// Parse `source` and process the result at the macro's position
    pub fn expand(&mut self, source: &str) -> InterpretResult<()> {
        let template = format!("{} in {}", self.name(), self.state.template_name());
        self.expand_template(&template, source)
    }

    /// Like [`MacroContext::expand`], naming `template` in syntax errors
    pub fn expand_template(&mut self, template: &str, source: &str) -> InterpretResult<()> {
        let nodes = lml_parser::parse(source).map_err(|err| InterpretError::Syntax {
            template: template.to_string(),
            source: err,
        })?;
        self.interpreter.process_nodes(&mut *self.state, &nodes, &mut *self.target)
    }

    pub fn expand_body(&mut self) -> InterpretResult<()> {
        let body = self.body();
        self.expand(body)
    }

    /// Run `f` with `bindings` in a fresh variable scope layered over the
    /// current one. The scope is dropped even when `f` fails.
    pub fn scoped<R>(
        &mut self,
        bindings: impl IntoIterator<Item = (String, Value)>,
        f: impl FnOnce(&mut Self) -> InterpretResult<R>,
    ) -> InterpretResult<R> {
        self.state.push_scope();
        for (name, value) in bindings {
            self.state.set_variable(name, value);
        }
        let result = f(self);
        self.state.pop_scope();
        result
    }

    /// Place an actor produced by the macro as if a tag had produced it
    pub fn place_actor(&mut self, actor: ActorRef) -> InterpretResult<()> {
        let name = self.name();
        self.interpreter
            .place_actor(&mut *self.state, actor, &name, &mut *self.target)
    }

    /// Macro failure at this position
    pub fn fail(&self, message: impl Into<String>) -> InterpretError {
        InterpretError::Macro {
            name: self.node.name.clone(),
            path: self.state.path_string(),
            message: message.into(),
        }
    }
}
