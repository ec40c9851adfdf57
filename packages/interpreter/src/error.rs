use crate::action::ActionError;
use lml_parser::ParseError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type InterpretResult<T> = Result<T, InterpretError>;

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("Syntax error in template '{template}': {source}")]
    Syntax {
        template: String,
        #[source]
        source: ParseError,
    },

    #[error("Unknown tag <{tag}> at {path}")]
    UnknownTag { tag: String, path: String },

    #[error("Unsupported attribute '{attribute}' for <{tag}> ({actor_type}) at {path}")]
    UnsupportedAttribute {
        tag: String,
        attribute: String,
        actor_type: String,
        path: String,
    },

    #[error("Unresolved action '{id}' at {path}")]
    UnresolvedAction { id: String, path: String },

    #[error("Unresolved variable '{name}' at {path}")]
    UnresolvedVariable { name: String, path: String },

    #[error("Invalid value '{value}' for '{attribute}': {message}")]
    InvalidValue {
        attribute: String,
        value: String,
        message: String,
    },

    #[error("Attribute '{attribute}'=\"{value}\" of <{tag}> failed at {path}: {source}")]
    AttributeFailed {
        tag: String,
        attribute: String,
        value: String,
        path: String,
        #[source]
        source: Box<InterpretError>,
    },

    #[error("<{tag}> could not be constructed at {path}: {source}")]
    ConstructionFailed {
        tag: String,
        path: String,
        #[source]
        source: Box<InterpretError>,
    },

    #[error("<{parent}> does not accept child <{child}> at {path}")]
    RejectedChild {
        parent: String,
        child: String,
        path: String,
    },

    #[error("Macro <@{name}> at {path}: {message}")]
    Macro {
        name: String,
        path: String,
        message: String,
    },

    #[error("Macro expansion deeper than {limit}\nExpansion stack: {}", stack.join(" → "))]
    MacroRecursion { limit: usize, stack: Vec<String> },

    #[error("Action '{id}' failed: {source}")]
    Action {
        id: String,
        #[source]
        source: ActionError,
    },

    #[error("Cannot load template '{path}': {message}")]
    Load { path: String, message: String },

    #[error("Duplicate {kind} registration: {name}")]
    DuplicateRegistration { kind: &'static str, name: String },

    #[error("{0}")]
    Custom(String),
}

impl InterpretError {
    pub fn invalid_value(
        attribute: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            attribute: attribute.into(),
            value: value.into(),
            message: message.into(),
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Warning category this error downgrades to in lenient mode.
    /// `None` means the error is fatal regardless of strictness.
    pub fn warning_kind(&self) -> Option<WarningKind> {
        match self {
            InterpretError::Syntax { .. }
            | InterpretError::MacroRecursion { .. }
            | InterpretError::DuplicateRegistration { .. } => None,
            InterpretError::UnknownTag { .. } => Some(WarningKind::UnknownTag),
            InterpretError::UnsupportedAttribute { .. } => Some(WarningKind::UnsupportedAttribute),
            InterpretError::UnresolvedAction { .. } => Some(WarningKind::UnresolvedAction),
            InterpretError::UnresolvedVariable { .. } => Some(WarningKind::UnresolvedVariable),
            InterpretError::RejectedChild { .. } => Some(WarningKind::RejectedChild),
            InterpretError::Macro { .. } | InterpretError::Load { .. } => Some(WarningKind::Macro),
            InterpretError::AttributeFailed { source, .. }
            | InterpretError::ConstructionFailed { source, .. } => {
                source.warning_kind().map(|_| WarningKind::Invocation)
            }
            InterpretError::InvalidValue { .. }
            | InterpretError::Action { .. }
            | InterpretError::Custom(_) => Some(WarningKind::Invocation),
        }
    }
}

/// Category of a recovered lenient-mode failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    UnknownTag,
    UnsupportedAttribute,
    UnresolvedAction,
    UnresolvedVariable,
    RejectedChild,
    Macro,
    Invocation,
}

/// A failure that was logged and skipped because the parse is lenient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    pub path: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
