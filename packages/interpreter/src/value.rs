use serde::{Deserialize, Serialize};

/// Separator between sequence elements when an array is written as text
pub const SEQUENCE_SEPARATOR: char = ';';

/// Template variable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Array(Vec<String>),
}

impl Value {
    /// Text form used for `{name}` substitution
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(text) => text.clone(),
            Value::Array(items) => items.join(&SEQUENCE_SEPARATOR.to_string()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Text(text) => {
                !(text.is_empty()
                    || text.eq_ignore_ascii_case("false")
                    || text.eq_ignore_ascii_case("null"))
            }
            Value::Array(items) => !items.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::Array(items)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Text(n.to_string())
    }
}
