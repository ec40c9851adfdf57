//! Attribute processors of the toolkit, registered against the most general
//! capability they apply to.

use crate::widget::{
    inspect_widget, with_widget, Color, TextBuilder, Widget, WidgetKind, BUTTON, COLOR_PICKER,
    LABEL, TABLE, TEXT_BUILDER, TEXT_BUTTON, WIDGET, WINDOW,
};
use lml_interpreter::{
    ActorRef, AttributeOutcome, AttributeProcessor, Builder, BuildingAttributeProcessor,
    Capability, InterpretError, InterpretResult, ParserState, Syntax, TagHandler,
};
use std::sync::Arc;

pub(crate) fn register_attributes(syntax: &mut Syntax) -> InterpretResult<()> {
    syntax.register_building_attribute_processor("text", TEXT_BUILDER, Arc::new(BuilderText))?;

    register_flag(syntax, "visible", WIDGET, |w, visible| {
        w.visible = visible;
        true
    })?;
    syntax.register_attribute("name", WIDGET, |_, _, actor, value| {
        update(actor, "name", |w| {
            w.name = Some(value.to_string());
            Ok(())
        })
    })?;
    syntax.register_attribute("tooltip", WIDGET, |_, _, actor, value| {
        update(actor, "tooltip", |w| {
            w.tooltip = Some(value.to_string());
            Ok(())
        })
    })?;
    syntax.register_attribute("onClick", WIDGET, on_click)?;

    syntax.register_attribute("pad", TABLE, |_, _, actor, value| {
        let pad = value
            .trim()
            .parse::<f32>()
            .map_err(|_| InterpretError::invalid_value("pad", value, "expected a number"))?;
        update(actor, "pad", |w| {
            w.pad = Some(pad);
            Ok(())
        })
    })?;
    syntax.register_attribute_processor("focus", TABLE, Arc::new(FocusAttribute))?;

    syntax.register_attribute("text", LABEL, set_text)?;
    syntax.register_attribute("text", TEXT_BUTTON, set_text)?;
    register_flag(syntax, "wrap", LABEL, |w, flag| match &mut w.kind {
        WidgetKind::Label { wrap, .. } => {
            *wrap = flag;
            true
        }
        _ => false,
    })?;

    register_flag(syntax, "checked", BUTTON, |w, flag| match &mut w.kind {
        WidgetKind::Button { checked, .. } | WidgetKind::TextButton { checked, .. } => {
            *checked = flag;
            true
        }
        _ => false,
    })?;
    register_flag(syntax, "disabled", BUTTON, |w, flag| match &mut w.kind {
        WidgetKind::Button { disabled, .. } | WidgetKind::TextButton { disabled, .. } => {
            *disabled = flag;
            true
        }
        _ => false,
    })?;

    syntax.register_attribute("title", WINDOW, |_, _, actor, value| {
        update(actor, "title", |w| match &mut w.kind {
            WidgetKind::Window { title, .. } | WidgetKind::ColorPicker { title, .. } => {
                *title = value.to_string();
                Ok(())
            }
            _ => Err(kind_mismatch("title", w)),
        })
    })?;
    register_flag(syntax, "modal", WINDOW, |w, flag| match &mut w.kind {
        WidgetKind::Window { modal, .. } => {
            *modal = flag;
            true
        }
        _ => false,
    })?;

    syntax.register_attribute("color", COLOR_PICKER, |_, _, actor, value| {
        let color: Color = value
            .parse()
            .map_err(|err: crate::widget::ColorError| InterpretError::invalid_value("color", value, err.to_string()))?;
        update(actor, "color", |w| match &mut w.kind {
            WidgetKind::ColorPicker { color: current, .. } => {
                *current = color;
                Ok(())
            }
            _ => Err(kind_mismatch("color", w)),
        })
    })?;
    syntax.register_attribute("onResult", COLOR_PICKER, |state, _, actor, value| {
        let Some(action) = state.bind_action(value)? else {
            return Ok(());
        };
        update(actor, "onResult", |w| {
            w.on_result = Some(action);
            Ok(())
        })
    })?;

    Ok(())
}

/// `text` of widgets built from a [`TextBuilder`]. Other builders leave the
/// attribute to the constructed actor.
struct BuilderText;

impl BuildingAttributeProcessor for BuilderText {
    fn process(
        &self,
        _state: &mut ParserState,
        builder: &mut dyn Builder,
        value: &str,
    ) -> InterpretResult<AttributeOutcome> {
        match builder.downcast_mut::<TextBuilder>() {
            Some(builder) => {
                builder.text = value.to_string();
                Ok(AttributeOutcome::FullyHandled)
            }
            None => Ok(AttributeOutcome::PartiallyHandled),
        }
    }
}

/// Boolean widget attribute. `apply` returns false when the widget kind has
/// no such flag.
struct FlagAttribute {
    name: &'static str,
    apply: fn(&mut Widget, bool) -> bool,
}

impl AttributeProcessor for FlagAttribute {
    fn process(
        &self,
        _state: &mut ParserState,
        _handler: &mut dyn TagHandler,
        actor: &ActorRef,
        value: &str,
    ) -> InterpretResult<()> {
        let flag = parse_bool(self.name, value)?;
        update(actor, self.name, |w| {
            if (self.apply)(w, flag) {
                Ok(())
            } else {
                Err(kind_mismatch(self.name, w))
            }
        })
    }
}

fn register_flag(
    syntax: &mut Syntax,
    name: &'static str,
    capability: Capability,
    apply: fn(&mut Widget, bool) -> bool,
) -> InterpretResult<()> {
    syntax.register_attribute_processor(name, capability, Arc::new(FlagAttribute { name, apply }))
}

/// `focus="childName"` selects a child of a table. Children are added after
/// attributes are processed, so the lookup is deferred to the closing tag.
struct FocusAttribute;

impl AttributeProcessor for FocusAttribute {
    fn process(
        &self,
        _state: &mut ParserState,
        handler: &mut dyn TagHandler,
        _actor: &ActorRef,
        value: &str,
    ) -> InterpretResult<()> {
        let target = value.trim().to_string();
        if target.is_empty() {
            return Err(InterpretError::invalid_value("focus", value, "expected a child name"));
        }
        handler.core_mut().on_close(move |_, actor| {
            let Some(actor) = actor else {
                return Ok(());
            };
            update(actor, "focus", |w| {
                let index = w.children.iter().position(|child| {
                    inspect_widget(child, |c| c.name.as_deref() == Some(target.as_str())).unwrap_or(false)
                });
                match index {
                    Some(index) => {
                        w.focused = Some(index);
                        Ok(())
                    }
                    None => Err(InterpretError::invalid_value(
                        "focus",
                        target.as_str(),
                        "no child has this name",
                    )),
                }
            })
        });
        Ok(())
    }
}

fn set_text(
    _state: &mut ParserState,
    _handler: &mut dyn TagHandler,
    actor: &ActorRef,
    value: &str,
) -> InterpretResult<()> {
    update(actor, "text", |w| match &mut w.kind {
        WidgetKind::Label { text, .. } | WidgetKind::TextButton { text, .. } => {
            *text = value.to_string();
            Ok(())
        }
        _ => Err(kind_mismatch("text", w)),
    })
}

fn on_click(
    state: &mut ParserState,
    _handler: &mut dyn TagHandler,
    actor: &ActorRef,
    value: &str,
) -> InterpretResult<()> {
    // unresolved in lenient mode: nothing to listen with
    let Some(action) = state.bind_action(value)? else {
        return Ok(());
    };
    update(actor, "onClick", |w| {
        w.listeners.push(action);
        Ok(())
    })
}

fn update(
    actor: &ActorRef,
    attribute: &str,
    f: impl FnOnce(&mut Widget) -> InterpretResult<()>,
) -> InterpretResult<()> {
    with_widget(actor, f).unwrap_or_else(|| {
        Err(InterpretError::custom(format!(
            "'{}' is only supported on widgets",
            attribute
        )))
    })
}

fn kind_mismatch(attribute: &str, widget: &Widget) -> InterpretError {
    InterpretError::custom(format!(
        "'{}' does not apply to {}",
        attribute,
        widget.kind.capabilities()[0]
    ))
}

fn parse_bool(attribute: &str, value: &str) -> InterpretResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(InterpretError::invalid_value(
            attribute,
            value,
            "expected true or false",
        )),
    }
}
