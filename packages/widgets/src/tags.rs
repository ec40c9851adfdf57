//! Tag providers of the toolkit.

use crate::widget::{with_widget, TextBuilder, Widget, WidgetKind};
use lml_interpreter::{
    actor_ref, ActorRef, ActorTag, BoundAction, Builder, ChildPolicy, HandlerCore, InterpretError,
    InterpretResult, ParserState, Syntax, TagHandler, TagProvider, TextPolicy,
};
use lml_parser::TagNode;

fn widget_tag(kind: fn() -> WidgetKind) -> ActorTag {
    ActorTag::new(move |builder, _| Ok(actor_ref(Widget::new(kind(), builder.base()))))
}

fn text_builder() -> Box<dyn Builder> {
    Box::new(TextBuilder::default())
}

pub(crate) fn register_tags(syntax: &mut Syntax) -> InterpretResult<()> {
    syntax.register_tag(
        "label",
        widget_tag(WidgetKind::label)
            .with_children(ChildPolicy::Reject)
            .with_text(TextPolicy::AsAttribute),
    )?;
    syntax.register_tag("table", widget_tag(|| WidgetKind::Table))?;
    syntax.register_tag("button", widget_tag(WidgetKind::button))?;
    syntax.register_tag(
        "textButton",
        ActorTag::new(|builder, _| {
            // the text attribute is consumed by the builder
            let text = builder
                .downcast_ref::<TextBuilder>()
                .map(|builder| builder.text.clone())
                .unwrap_or_default();
            Ok(actor_ref(Widget::new(WidgetKind::text_button(text), builder.base())))
        })
        .with_builder(text_builder)
        .with_text(TextPolicy::AsAttribute),
    )?;
    syntax.register_tag("window", widget_tag(WidgetKind::window))?;
    syntax.register_tag(
        "colorPicker",
        widget_tag(WidgetKind::color_picker).with_text(TextPolicy::Reject),
    )?;
    syntax.register_tag("tooltip", TooltipTag)?;
    syntax.register_tag("clickListener", ClickListenerTag)?;
    Ok(())
}

fn attach_failed(child: &HandlerCore, parent: &dyn TagHandler) -> InterpretError {
    InterpretError::RejectedChild {
        parent: parent.core().tag().to_string(),
        child: child.tag().to_string(),
        path: child.path().to_string(),
    }
}

/// `<tooltip>text</tooltip>`: no actor of its own; sets the tooltip of the
/// enclosing widget.
pub struct TooltipTag;

impl TagProvider for TooltipTag {
    fn create(
        &self,
        state: &mut ParserState,
        _parent: Option<&dyn TagHandler>,
        node: &TagNode,
    ) -> InterpretResult<Box<dyn TagHandler>> {
        Ok(Box::new(TooltipHandler {
            core: HandlerCore::new(node, state),
            text: String::new(),
        }))
    }
}

struct TooltipHandler {
    core: HandlerCore,
    text: String,
}

impl TagHandler for TooltipHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn instantiate(
        &mut self,
        _state: &mut ParserState,
        _builder: Box<dyn Builder>,
    ) -> InterpretResult<Option<ActorRef>> {
        Ok(None)
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::Reject
    }

    fn text_policy(&self) -> TextPolicy {
        TextPolicy::AsAttribute
    }

    fn handle_own_attribute(
        &mut self,
        _state: &mut ParserState,
        name: &str,
        value: &str,
    ) -> InterpretResult<bool> {
        if !name.eq_ignore_ascii_case("text") {
            return Ok(false);
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(value);
        Ok(true)
    }

    fn is_attachable(&self) -> bool {
        true
    }

    fn attach_to(&mut self, _state: &mut ParserState, parent: &mut dyn TagHandler) -> InterpretResult<()> {
        let text = std::mem::take(&mut self.text);
        parent
            .core()
            .actor()
            .and_then(|actor| with_widget(actor, |widget| widget.tooltip = Some(text)))
            .ok_or_else(|| attach_failed(&self.core, parent))
    }
}

/// `<clickListener action="$id"/>`: adds a click listener to the enclosing
/// widget. Equivalent to the `onClick` attribute.
pub struct ClickListenerTag;

impl TagProvider for ClickListenerTag {
    fn create(
        &self,
        state: &mut ParserState,
        _parent: Option<&dyn TagHandler>,
        node: &TagNode,
    ) -> InterpretResult<Box<dyn TagHandler>> {
        Ok(Box::new(ClickListenerHandler {
            core: HandlerCore::new(node, state),
            action: None,
            declared: false,
        }))
    }
}

struct ClickListenerHandler {
    core: HandlerCore,
    action: Option<BoundAction>,
    declared: bool,
}

impl TagHandler for ClickListenerHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn instantiate(
        &mut self,
        _state: &mut ParserState,
        _builder: Box<dyn Builder>,
    ) -> InterpretResult<Option<ActorRef>> {
        Ok(None)
    }

    fn child_policy(&self) -> ChildPolicy {
        ChildPolicy::Reject
    }

    fn text_policy(&self) -> TextPolicy {
        TextPolicy::Reject
    }

    fn handle_own_attribute(
        &mut self,
        state: &mut ParserState,
        name: &str,
        value: &str,
    ) -> InterpretResult<bool> {
        if !name.eq_ignore_ascii_case("action") {
            return Ok(false);
        }
        self.declared = true;
        // unresolved in lenient mode: the listener is dropped
        self.action = state.bind_action(value)?;
        Ok(true)
    }

    fn is_attachable(&self) -> bool {
        true
    }

    fn attach_to(&mut self, _state: &mut ParserState, parent: &mut dyn TagHandler) -> InterpretResult<()> {
        if !self.declared {
            return Err(InterpretError::custom(format!(
                "<{}> at {} needs an 'action' attribute",
                self.core.tag(),
                self.core.path()
            )));
        }
        let Some(action) = self.action.take() else {
            return Ok(());
        };
        parent
            .core()
            .actor()
            .and_then(|actor| with_widget(actor, |widget| widget.listeners.push(action)))
            .ok_or_else(|| attach_failed(&self.core, parent))
    }
}
