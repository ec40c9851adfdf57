//! # LML Widgets
//!
//! A small reference toolkit plugged into `lml-interpreter` purely through its
//! extension points: tag providers, attribute processors and action
//! references. Widgets are plain data; nothing is drawn.
//!
//! ## Tags
//!
//! | Tag | Capabilities | Notes |
//! |---|---|---|
//! | `label` | label, widget | text between the tags becomes its `text` |
//! | `table` | table, widget | container |
//! | `button` | button, table, widget | container with `checked`/`disabled` |
//! | `textButton` | textButton, button, table, widget | built from a [`TextBuilder`] |
//! | `window` | window, table, widget | `title`, `modal` |
//! | `colorPicker` | colorPicker, window, table, widget | `color`, `onResult` |
//! | `tooltip` | none | attaches its text to the enclosing widget |
//! | `clickListener` | none | attaches a click action to the enclosing widget |
//!
//! ## Action results
//!
//! Boolean action results mean different things at different call sites;
//! each is documented where it is interpreted: [`click`] and
//! [`finish_color_pick`].
//!
//! ```
//! use lml_interpreter::{Interpreter, ParserState};
//!
//! let interpreter = Interpreter::new(lml_widgets::syntax().unwrap());
//! let output = interpreter
//!     .render("hello", "<window title=Hello><label>Hi</label></window>", ParserState::new())
//!     .unwrap();
//! assert_eq!(output.to_json()["roots"][0]["title"], "Hello");
//! ```

mod attributes;
mod tags;
pub mod widget;

#[cfg(test)]
mod tests_widgets;

pub use tags::{ClickListenerTag, TooltipTag};
pub use widget::{
    click, finish_color_pick, inspect_widget, with_widget, ClickEvent, Color, ColorError,
    TextBuilder, Widget, WidgetKind, BUTTON, COLOR_PICKER, LABEL, TABLE, TEXT_BUILDER, TEXT_BUTTON,
    WIDGET, WINDOW,
};

use lml_interpreter::{InterpretResult, Syntax};
use tracing::debug;

/// Register every tag and attribute of the toolkit
pub fn register(syntax: &mut Syntax) -> InterpretResult<()> {
    tags::register_tags(syntax)?;
    attributes::register_attributes(syntax)?;
    debug!("Widget toolkit registered");
    Ok(())
}

/// Default syntax with the toolkit registered
pub fn syntax() -> InterpretResult<Syntax> {
    let mut syntax = Syntax::with_defaults();
    register(&mut syntax)?;
    Ok(syntax)
}
