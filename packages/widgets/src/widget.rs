//! The widget actor. Every widget is one [`Widget`] whose [`WidgetKind`]
//! decides its capabilities and kind-specific state.

use lml_interpreter::{
    with_actor_mut, ActionError, ActionValue, Actor, ActorBuilder, ActorRef, BoundAction, Builder,
    Capability, BUILDER,
};
use serde::{Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub const WIDGET: Capability = Capability::new("widget");
pub const LABEL: Capability = Capability::new("label");
pub const TABLE: Capability = Capability::new("table");
pub const BUTTON: Capability = Capability::new("button");
pub const TEXT_BUTTON: Capability = Capability::new("textButton");
pub const WINDOW: Capability = Capability::new("window");
pub const COLOR_PICKER: Capability = Capability::new("colorPicker");

/// Capability of [`TextBuilder`]
pub const TEXT_BUILDER: Capability = Capability::new("textBuilder");

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Expected a color like #ff8800, got '{0}'")]
pub struct ColorError(pub String);

/// RGB color, written `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| ColorError(s.to_string()))
        };
        if hex.len() != 6 {
            return Err(ColorError(s.to_string()));
        }
        Ok(Color::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Kind-specific widget state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WidgetKind {
    Label { text: String, wrap: bool },
    Table,
    Button { checked: bool, disabled: bool },
    TextButton { text: String, checked: bool, disabled: bool },
    Window { title: String, modal: bool },
    ColorPicker { title: String, color: Color },
}

impl WidgetKind {
    pub fn label() -> Self {
        WidgetKind::Label {
            text: String::new(),
            wrap: false,
        }
    }

    pub fn button() -> Self {
        WidgetKind::Button {
            checked: false,
            disabled: false,
        }
    }

    pub fn text_button(text: impl Into<String>) -> Self {
        WidgetKind::TextButton {
            text: text.into(),
            checked: false,
            disabled: false,
        }
    }

    pub fn window() -> Self {
        WidgetKind::Window {
            title: String::new(),
            modal: false,
        }
    }

    pub fn color_picker() -> Self {
        WidgetKind::ColorPicker {
            title: String::new(),
            color: Color::new(255, 255, 255),
        }
    }

    /// Most specific first. A text button is a button is a table.
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            WidgetKind::Label { .. } => &[LABEL, WIDGET],
            WidgetKind::Table => &[TABLE, WIDGET],
            WidgetKind::Button { .. } => &[BUTTON, TABLE, WIDGET],
            WidgetKind::TextButton { .. } => &[TEXT_BUTTON, BUTTON, TABLE, WIDGET],
            WidgetKind::Window { .. } => &[WINDOW, TABLE, WIDGET],
            WidgetKind::ColorPicker { .. } => &[COLOR_PICKER, WINDOW, TABLE, WIDGET],
        }
    }

    fn is_disabled(&self) -> bool {
        matches!(
            self,
            WidgetKind::Button { disabled: true, .. } | WidgetKind::TextButton { disabled: true, .. }
        )
    }
}

/// A constructed widget
#[derive(Debug)]
pub struct Widget {
    pub kind: WidgetKind,
    pub style: String,
    pub skin: String,
    pub name: Option<String>,
    pub visible: bool,
    pub tooltip: Option<String>,
    pub pad: Option<f32>,
    /// Index of the child named by `focus`
    pub focused: Option<usize>,
    pub children: Vec<ActorRef>,
    pub listeners: Vec<BoundAction>,
    /// Fired by [`finish_color_pick`]
    pub on_result: Option<BoundAction>,
}

impl Widget {
    pub fn new(kind: WidgetKind, builder: &ActorBuilder) -> Self {
        Self {
            kind,
            style: builder.style_or_default().to_string(),
            skin: builder.skin.clone(),
            name: None,
            visible: true,
            tooltip: None,
            pad: None,
            focused: None,
            children: Vec::new(),
            listeners: Vec::new(),
            on_result: None,
        }
    }

    /// Text of a label or text button
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            WidgetKind::Label { text, .. } | WidgetKind::TextButton { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    #[serde(flatten)]
    kind: &'a WidgetKind,
    style: &'a str,
    skin: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tooltip: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pad: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    focused: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    listeners: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<serde_json::Value>,
}

impl Actor for Widget {
    fn capabilities(&self) -> &'static [Capability] {
        self.kind.capabilities()
    }

    fn add_child(&mut self, child: ActorRef) -> bool {
        if matches!(self.kind, WidgetKind::Label { .. }) {
            return false;
        }
        self.children.push(child);
        true
    }

    fn snapshot(&self) -> serde_json::Value {
        let snapshot = Snapshot {
            kind: &self.kind,
            style: &self.style,
            skin: &self.skin,
            name: self.name.as_deref(),
            visible: self.visible,
            tooltip: self.tooltip.as_deref(),
            pad: self.pad,
            focused: self.focused,
            listeners: self.listeners.iter().map(BoundAction::id).collect(),
            children: self.children.iter().map(|child| child.borrow().snapshot()).collect(),
        };
        serde_json::to_value(snapshot).unwrap_or_default()
    }
}

/// Builder for widgets that need their text at construction time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBuilder {
    pub base: ActorBuilder,
    pub text: String,
}

impl Builder for TextBuilder {
    fn capabilities(&self) -> &'static [Capability] {
        &[TEXT_BUILDER, BUILDER]
    }

    fn base(&self) -> &ActorBuilder {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBuilder {
        &mut self.base
    }
}

/// Run `f` against the actor if it is a [`Widget`]
pub fn with_widget<R>(actor: &ActorRef, f: impl FnOnce(&mut Widget) -> R) -> Option<R> {
    with_actor_mut::<Widget, R>(actor, f)
}

/// Read the actor if it is a [`Widget`]
pub fn inspect_widget<R>(actor: &ActorRef, f: impl FnOnce(&Widget) -> R) -> Option<R> {
    actor.borrow().downcast_ref::<Widget>().map(f)
}

/// Trigger handed to click listeners
#[derive(Debug, Clone)]
pub struct ClickEvent {
    pub target: ActorRef,
}

/// Deliver a click to every listener of `widget` and return how many fired.
/// Disabled buttons ignore clicks.
///
/// Result convention: a listener whose action returns `true` is removed
/// afterwards, as a one-shot listener. `false` and non-boolean results keep
/// it registered.
///
/// A failing listener stops the dispatch. Listeners that finished before it
/// are still removed, then the error is returned.
pub fn click(widget: &ActorRef) -> Result<usize, ActionError> {
    let listeners = inspect_widget(widget, |w| {
        if w.kind.is_disabled() {
            Vec::new()
        } else {
            w.listeners.clone()
        }
    })
    .unwrap_or_default();

    // no borrow is held while actions run; they may inspect the widget
    let event: Rc<dyn Any> = Rc::new(ClickEvent {
        target: widget.clone(),
    });
    let mut finished: Vec<&BoundAction> = Vec::new();
    let mut failure = None;
    for listener in &listeners {
        match listener.fire(Some(event.clone())) {
            Ok(Some(ActionValue::Bool(true))) => finished.push(listener),
            Ok(_) => {}
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    if !finished.is_empty() {
        debug!(removed = finished.len(), "Removing finished click listeners");
        // matched by binding: actions may have added or removed listeners
        with_widget(widget, |w| {
            w.listeners
                .retain(|listener| !finished.iter().any(|done| done.same_binding(listener)));
        });
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(listeners.len()),
    }
}

/// Report a chosen color: store it, fire the picker's `onResult` action with
/// the [`Color`] as trigger, then hide the picker. Returns whether it was
/// hidden.
///
/// Result convention: an action returning `true` cancels the hide and the
/// picker stays open. Any other result, or no action, lets it close.
pub fn finish_color_pick(picker: &ActorRef, color: Color) -> Result<bool, ActionError> {
    let action = with_widget(picker, |w| {
        if let WidgetKind::ColorPicker { color: current, .. } = &mut w.kind {
            *current = color;
        }
        w.on_result.clone()
    })
    .flatten();

    let keep_open = match action {
        Some(action) => {
            let trigger: Rc<dyn Any> = Rc::new(color);
            matches!(action.fire(Some(trigger))?, Some(ActionValue::Bool(true)))
        }
        None => false,
    };
    if !keep_open {
        with_widget(picker, |w| w.visible = false);
    }
    Ok(!keep_open)
}
