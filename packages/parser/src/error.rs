use crate::ast::Span;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

/// Malformed template text. Always fatal, whatever the strictness mode.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unclosed tag <{name}> at {pos} (depth {depth})")]
    UnclosedTag {
        name: String,
        pos: usize,
        depth: usize,
    },

    #[error("Mismatched closing tag </{found}> at {pos} (depth {depth}): expected </{expected}>")]
    MismatchedClose {
        expected: String,
        found: String,
        pos: usize,
        depth: usize,
    },

    #[error("Closing tag </{name}> at {pos} has no matching open tag")]
    UnexpectedClose { name: String, pos: usize },

    #[error("Malformed attribute text '{raw}' in <{tag}> at {pos} (depth {depth}): {message}")]
    MalformedAttribute {
        tag: String,
        raw: String,
        message: String,
        pos: usize,
        depth: usize,
    },

    #[error("Malformed tag '{raw}' at {pos} (depth {depth})")]
    MalformedTag {
        raw: String,
        pos: usize,
        depth: usize,
    },

    #[error("Unterminated tag '{raw}' at {pos}")]
    UnterminatedTag { raw: String, pos: usize },

    #[error("Unterminated comment at {pos}")]
    UnterminatedComment { pos: usize },
}

impl ParseError {
    pub fn malformed_attribute(
        tag: impl Into<String>,
        raw: impl Into<String>,
        message: impl Into<String>,
        pos: usize,
        depth: usize,
    ) -> Self {
        Self::MalformedAttribute {
            tag: tag.into(),
            raw: raw.into(),
            message: message.into(),
            pos,
            depth,
        }
    }

    /// Position in the source the error points at
    pub fn pos(&self) -> usize {
        match self {
            ParseError::UnclosedTag { pos, .. }
            | ParseError::MismatchedClose { pos, .. }
            | ParseError::UnexpectedClose { pos, .. }
            | ParseError::MalformedAttribute { pos, .. }
            | ParseError::MalformedTag { pos, .. }
            | ParseError::UnterminatedTag { pos, .. }
            | ParseError::UnterminatedComment { pos } => *pos,
        }
    }

    /// Nesting depth at the failure, where known
    pub fn depth(&self) -> Option<usize> {
        match self {
            ParseError::UnclosedTag { depth, .. }
            | ParseError::MismatchedClose { depth, .. }
            | ParseError::MalformedAttribute { depth, .. }
            | ParseError::MalformedTag { depth, .. } => Some(*depth),
            ParseError::UnexpectedClose { .. } => Some(0),
            ParseError::UnterminatedTag { .. } | ParseError::UnterminatedComment { .. } => None,
        }
    }

    fn label(&self) -> String {
        match self {
            ParseError::UnclosedTag { name, .. } => format!("<{}> is never closed", name),
            ParseError::MismatchedClose { expected, .. } => format!("expected </{}>", expected),
            ParseError::UnexpectedClose { .. } => "nothing to close here".to_string(),
            ParseError::MalformedAttribute { message, .. } => message.clone(),
            ParseError::MalformedTag { .. } => "invalid tag".to_string(),
            ParseError::UnterminatedTag { .. } => "missing '>'".to_string(),
            ParseError::UnterminatedComment { .. } => "missing '-->'".to_string(),
        }
    }
}

/// Char range of the character at byte offset `pos`, clamped to the source.
/// ariadne counts columns in chars, not bytes.
pub fn char_span(source: &str, pos: usize) -> Span {
    let mut byte = pos.min(source.len());
    while !source.is_char_boundary(byte) {
        byte -= 1;
    }
    let mut start = source[..byte].chars().count();
    let total = start + source[byte..].chars().count();
    if start == total {
        start = start.saturating_sub(1);
    }
    Span::new(start, (start + 1).min(total))
}

/// Pretty-print an error with source context using ariadne
#[cfg(feature = "pretty-errors")]
pub fn format_error(source: &str, filename: &str, error: &ParseError) -> String {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let span = char_span(source, error.pos());

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, filename, span.start)
        .with_message(error.to_string())
        .with_label(
            Label::new((filename, span.start..span.end))
                .with_color(Color::Red)
                .with_message(error.label()),
        )
        .finish();

    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8(output).unwrap_or_else(|_| error.to_string())
}

#[cfg(not(feature = "pretty-errors"))]
pub fn format_error(_source: &str, filename: &str, error: &ParseError) -> String {
    format!("{}: {} ({})", filename, error, error.label())
}
