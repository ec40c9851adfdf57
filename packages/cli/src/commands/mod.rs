pub mod check;
pub mod render;
pub mod tree;

pub use check::{check, CheckArgs};
pub use render::{render, RenderArgs};
pub use tree::{tree, TreeArgs};

use crate::config::Config;
use lml_interpreter::{FileSystemLoader, InterpretError, InterpretResult, Interpreter};
use lml_parser::format_error;

/// Interpreter with the widget toolkit and imports rooted at the template dir
fn interpreter(config: &Config, cwd: &str) -> InterpretResult<Interpreter> {
    Ok(Interpreter::new(lml_widgets::syntax()?)
        .with_loader(FileSystemLoader::new(config.get_template_dir(cwd))))
}

/// Error text for the terminal. Syntax errors in `name` itself are drawn
/// against `source`; anything else uses its message.
fn describe(err: &InterpretError, name: &str, source: &str) -> String {
    match err {
        InterpretError::Syntax {
            template,
            source: parse_error,
        } if template == name => format_error(source, name, parse_error),
        other => other.to_string(),
    }
}
