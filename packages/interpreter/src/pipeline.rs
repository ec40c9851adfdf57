//! The construction pipeline: every tag goes through
//! `Opened → BuildingAttrs → Instantiated → StandardAttrs → Children → Closing → Closed`.

use crate::action::ActionRegistry;
use crate::actor::ActorRef;
use crate::attributes::AttributeOutcome;
use crate::error::{InterpretError, InterpretResult, Warning};
use crate::loader::{MemoryLoader, TemplateLoader};
use crate::macros::MacroContext;
use crate::state::ParserState;
use crate::syntax::Syntax;
use crate::tags::{ChildPolicy, TagHandler, TextPolicy, TEXT_ATTRIBUTE};
use lml_parser::{Node, RawAttribute, TagNode, TextNode};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace};

/// Construction phase of a single tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Opened,
    BuildingAttrs,
    Instantiated,
    StandardAttrs,
    Children,
    Closing,
    Closed,
}

/// Where constructed actors go: the root list or the enclosing handler
pub(crate) enum Target<'a> {
    Root(&'a mut Vec<ActorRef>),
    Parent(&'a mut dyn TagHandler),
}

impl Target<'_> {
    fn handler(&self) -> Option<&dyn TagHandler> {
        match self {
            Target::Root(_) => None,
            Target::Parent(handler) => Some(&**handler),
        }
    }

    fn name(&self) -> String {
        match self {
            Target::Root(_) => "<root>".to_string(),
            Target::Parent(handler) => handler.core().tag().to_string(),
        }
    }
}

/// Result of a top-level render
#[derive(Debug)]
pub struct RenderOutput {
    pub roots: Vec<ActorRef>,
    pub ids: HashMap<String, ActorRef>,
    pub warnings: Vec<Warning>,
}

impl RenderOutput {
    /// `{ roots, ids, warnings }` with actors as snapshots and ids sorted
    pub fn to_json(&self) -> serde_json::Value {
        let roots: Vec<_> = self.roots.iter().map(|actor| actor.borrow().snapshot()).collect();
        let ids: BTreeMap<_, _> = self
            .ids
            .iter()
            .map(|(id, actor)| (id.clone(), actor.borrow().type_name()))
            .collect();
        json!({
            "roots": roots,
            "ids": ids,
            "warnings": self.warnings,
        })
    }
}

/// One attribute on its way through the building and standard phases
struct PendingAttribute<'n> {
    name: &'n str,
    value: String,
    handled: bool,
}

/// Interprets templates against a [`Syntax`], an [`ActionRegistry`] and a
/// [`TemplateLoader`]. Cheap to create; every render gets its own state.
pub struct Interpreter {
    syntax: Arc<Syntax>,
    actions: Rc<ActionRegistry>,
    loader: Rc<dyn TemplateLoader>,
}

impl Interpreter {
    pub fn new(syntax: Syntax) -> Self {
        Self::with_shared_syntax(Arc::new(syntax))
    }

    pub fn with_shared_syntax(syntax: Arc<Syntax>) -> Self {
        Self {
            syntax,
            actions: Rc::new(ActionRegistry::new()),
            loader: Rc::new(MemoryLoader::new()),
        }
    }

    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = Rc::new(actions);
        self
    }

    pub fn with_loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Rc::new(loader);
        self
    }

    pub fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn loader(&self) -> &dyn TemplateLoader {
        self.loader.as_ref()
    }

    /// Render a template held in memory
    #[instrument(skip(self, name, source, state), fields(template = %name))]
    pub fn render(&self, name: &str, source: &str, mut state: ParserState) -> InterpretResult<RenderOutput> {
        let roots = self.render_into(name, source, &mut state)?;
        let (ids, warnings) = state.into_parts();
        info!(roots = roots.len(), ids = ids.len(), warnings = warnings.len(), "Template rendered");
        Ok(RenderOutput { roots, ids, warnings })
    }

    /// Load a template through the loader and render it
    #[instrument(skip(self, state))]
    pub fn render_template(&self, path: &str, state: ParserState) -> InterpretResult<RenderOutput> {
        let source = self.loader.load(path)?;
        self.render(path, &source, state)
    }

    /// Render against caller-owned state, so several templates can share one
    /// id map and variable set. Returns the root actors.
    pub fn render_into(&self, name: &str, source: &str, state: &mut ParserState) -> InterpretResult<Vec<ActorRef>> {
        state.attach_actions(self.actions.clone());
        state.set_template_name(name);

        let nodes = lml_parser::parse(source).map_err(|source| {
            error!(template = %name, error = %source, "Template syntax error");
            InterpretError::Syntax {
                template: name.to_string(),
                source,
            }
        })?;

        let mut roots = Vec::new();
        self.process_nodes(state, &nodes, &mut Target::Root(&mut roots))
            .inspect_err(|err| error!(template = %name, error = %err, "Render failed"))?;
        Ok(roots)
    }

    pub(crate) fn process_nodes(&self, state: &mut ParserState, nodes: &[Node], target: &mut Target<'_>) -> InterpretResult<()> {
        for node in nodes {
            match node {
                Node::Tag(tag) => self.process_tag(state, tag, target)?,
                Node::Text(text) => self.process_text(state, text, target)?,
            }
        }
        Ok(())
    }

    fn process_tag(&self, state: &mut ParserState, node: &TagNode, target: &mut Target<'_>) -> InterpretResult<()> {
        if node.is_macro {
            return self.process_macro(state, node, target);
        }
        state.push_path(node.name.clone());
        let result = self.construct(state, node, target);
        state.pop_path();
        result
    }

    fn enter(&self, node: &TagNode, phase: Phase) {
        trace!(tag = %node.name, phase = ?phase, "Construction phase");
    }

    fn construct(&self, state: &mut ParserState, node: &TagNode, target: &mut Target<'_>) -> InterpretResult<()> {
        let Some(provider) = self.syntax.tag_provider(&node.name) else {
            state.recover(InterpretError::UnknownTag {
                tag: node.name.clone(),
                path: state.path_string(),
            })?;
            // pass-through: children land in the nearest real ancestor
            return self.process_nodes(state, &node.children, target);
        };

        let mut handler = match provider.create(state, target.handler(), node) {
            Ok(handler) => handler,
            Err(err) => return self.construction_failed(state, node, err),
        };
        self.enter(node, Phase::Opened);
        debug!(tag = %node.name, path = %state.path_string(), "Tag opened");
        let mut builder = handler.create_builder(state);

        self.enter(node, Phase::BuildingAttrs);
        let mut attributes = Vec::with_capacity(node.attributes.len());
        for RawAttribute { name, value, .. } in &node.attributes {
            let Some(name) = name.as_deref() else { continue };
            attributes.push(PendingAttribute {
                name,
                value: state.substitute(value)?,
                handled: false,
            });
        }
        for attribute in &mut attributes {
            let Some(processor) = self
                .syntax
                .building_attributes()
                .resolve(attribute.name, builder.capabilities())
            else {
                continue;
            };
            match processor.process(state, builder.as_mut(), &attribute.value) {
                Ok(AttributeOutcome::FullyHandled) => attribute.handled = true,
                Ok(AttributeOutcome::PartiallyHandled) => {}
                Err(source) => {
                    attribute.handled = true;
                    state.recover(InterpretError::AttributeFailed {
                        tag: node.name.clone(),
                        attribute: attribute.name.to_string(),
                        value: attribute.value.clone(),
                        path: state.path_string(),
                        source: Box::new(source),
                    })?;
                }
            }
        }
        if builder.base().style.is_empty() {
            let skin = builder.base().skin.clone();
            if let Some(style) = state.skins().default_style(&skin, &node.name) {
                builder.base_mut().style = style;
            }
        }

        self.enter(node, Phase::Instantiated);
        let actor = match handler.instantiate(state, builder) {
            Ok(actor) => actor,
            Err(err) => return self.construction_failed(state, node, err),
        };
        handler.core_mut().set_actor(actor);

        self.enter(node, Phase::StandardAttrs);
        for attribute in attributes.iter().filter(|a| !a.handled) {
            self.apply_attribute(state, handler.as_mut(), attribute.name, &attribute.value)?;
        }

        self.enter(node, Phase::Children);
        self.process_nodes(state, &node.children, &mut Target::Parent(handler.as_mut()))?;

        self.enter(node, Phase::Closing);
        handler.core_mut().close(state)?;

        self.enter(node, Phase::Closed);
        debug!(tag = %node.name, "Tag closed");
        self.place(state, handler, target)
    }

    /// Provider or instantiation failure: the tag and its subtree are skipped
    fn construction_failed(&self, state: &mut ParserState, node: &TagNode, err: InterpretError) -> InterpretResult<()> {
        state.recover(InterpretError::ConstructionFailed {
            tag: node.name.clone(),
            path: state.path_string(),
            source: Box::new(err),
        })
    }

    /// Offer one substituted attribute to the standard registry, then to the
    /// handler itself
    fn apply_attribute(
        &self,
        state: &mut ParserState,
        handler: &mut dyn TagHandler,
        name: &str,
        value: &str,
    ) -> InterpretResult<()> {
        let actor = handler.core().actor().cloned();
        let processor = actor.as_ref().and_then(|actor| {
            let capabilities = actor.borrow().capabilities();
            self.syntax.attributes().resolve(name, capabilities)
        });

        let outcome = match (processor, &actor) {
            (Some(processor), Some(actor)) => processor.process(state, handler, actor, value).map(|_| true),
            _ => handler.handle_own_attribute(state, name, value),
        };

        let err = match outcome {
            Ok(true) => return Ok(()),
            Ok(false) => InterpretError::UnsupportedAttribute {
                tag: handler.core().tag().to_string(),
                attribute: name.to_string(),
                actor_type: actor
                    .as_ref()
                    .map(|actor| actor.borrow().type_name())
                    .unwrap_or("none")
                    .to_string(),
                path: state.path_string(),
            },
            Err(source) => InterpretError::AttributeFailed {
                tag: handler.core().tag().to_string(),
                attribute: name.to_string(),
                value: value.to_string(),
                path: state.path_string(),
                source: Box::new(source),
            },
        };
        state.recover(err)
    }

    fn process_text(&self, state: &mut ParserState, text: &TextNode, target: &mut Target<'_>) -> InterpretResult<()> {
        let policy = match target {
            Target::Root(_) => TextPolicy::AsChild,
            Target::Parent(handler) => handler.text_policy(),
        };

        match (policy, target) {
            (TextPolicy::AsAttribute, Target::Parent(handler)) => {
                let value = state.substitute(&text.content)?;
                self.apply_attribute(state, &mut **handler, TEXT_ATTRIBUTE, &value)
            }
            (TextPolicy::Reject, target) => state.recover(InterpretError::RejectedChild {
                parent: target.name(),
                child: "text".to_string(),
                path: state.path_string(),
            }),
            (_, target) => {
                // substituted when the synthetic tag's attribute is processed
                let mut node = TagNode::new(state.text_tag(), text.span);
                node.attributes
                    .push(RawAttribute::named(TEXT_ATTRIBUTE, text.content.clone(), text.span));
                self.process_tag(state, &node, target)
            }
        }
    }

    /// Hand a closed tag to its target
    fn place(&self, state: &mut ParserState, mut handler: Box<dyn TagHandler>, target: &mut Target<'_>) -> InterpretResult<()> {
        if handler.is_attachable() {
            return match target {
                Target::Parent(parent) => match handler.attach_to(state, &mut **parent) {
                    Ok(()) => Ok(()),
                    Err(err) => state.recover(err),
                },
                Target::Root(_) => state.recover(InterpretError::RejectedChild {
                    parent: "<root>".to_string(),
                    child: handler.core().tag().to_string(),
                    path: state.path_string(),
                }),
            };
        }

        let Some(actor) = handler.core().actor().cloned() else {
            return Ok(());
        };
        let child = handler.core().tag().to_string();
        self.place_actor(state, actor, &child, target)
    }

    pub(crate) fn place_actor(
        &self,
        state: &mut ParserState,
        actor: ActorRef,
        child: &str,
        target: &mut Target<'_>,
    ) -> InterpretResult<()> {
        let parent = match target {
            Target::Root(roots) => {
                roots.push(actor);
                return Ok(());
            }
            Target::Parent(parent) => parent,
        };

        let accepted = match parent.child_policy() {
            ChildPolicy::Ignore => return Ok(()),
            ChildPolicy::Reject => Ok(false),
            ChildPolicy::Accept => parent.add_child(state, actor),
        };
        match accepted {
            Ok(true) => Ok(()),
            Ok(false) => state.recover(InterpretError::RejectedChild {
                parent: parent.core().tag().to_string(),
                child: child.to_string(),
                path: state.path_string(),
            }),
            Err(err) => state.recover(err),
        }
    }

    fn process_macro(&self, state: &mut ParserState, node: &TagNode, target: &mut Target<'_>) -> InterpretResult<()> {
        let display_name = node.display_name();
        if state.macro_depth() >= state.max_macro_depth() {
            let mut stack = state.macro_stack().to_vec();
            stack.push(display_name);
            return Err(InterpretError::MacroRecursion {
                limit: state.max_macro_depth(),
                stack,
            });
        }

        let handler = self
            .syntax
            .macro_handler(&node.name)
            .or_else(|| state.template_macro(&node.name));
        let Some(handler) = handler else {
            return state.recover(InterpretError::UnknownTag {
                tag: display_name,
                path: state.path_string(),
            });
        };

        debug!(name = %display_name, depth = state.macro_depth(), "Expanding macro");
        state.push_macro(display_name.clone());
        state.push_path(display_name);
        let result = {
            let mut ctx = MacroContext::new(self, state, node, target);
            handler.expand(&mut ctx)
        };
        state.pop_path();
        state.pop_macro();

        match result {
            Ok(()) => Ok(()),
            Err(err) => state.recover(err),
        }
    }
}
