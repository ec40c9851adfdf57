use serde::{Deserialize, Serialize};

/// Marker that flags a tag as a macro (`<@loop>`).
pub const MACRO_SIGIL: char = '@';

/// Byte range of a construct in its template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A raw, uninterpreted attribute as written in an open tag.
///
/// Positional attributes (macro tags only) have no name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAttribute {
    pub name: Option<String>,
    pub value: String,
    pub span: Span,
}

impl RawAttribute {
    pub fn named(name: impl Into<String>, value: impl Into<String>, span: Span) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
            span,
        }
    }

    pub fn positional(value: impl Into<String>, span: Span) -> Self {
        Self {
            name: None,
            value: value.into(),
            span,
        }
    }

    pub fn is_positional(&self) -> bool {
        self.name.is_none()
    }
}

/// One node of a template's tag tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Node {
    Tag(TagNode),
    Text(TextNode),
}

impl Node {
    pub fn as_tag(&self) -> Option<&TagNode> {
        match self {
            Node::Tag(tag) => Some(tag),
            Node::Text(_) => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Node::Tag(tag) => tag.span,
            Node::Text(text) => text.span,
        }
    }
}

/// Trimmed text found between tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub content: String,
    pub span: Span,
}

/// Parse-time record of a single tag.
///
/// Macro tags never get children: their body is kept verbatim in `raw_body`
/// and only turned into a tree when the macro expands it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNode {
    /// Tag name without the macro sigil
    pub name: String,
    pub attributes: Vec<RawAttribute>,
    /// Written as `<name>...</name>`
    pub is_parent: bool,
    /// Written as `<name/>`
    pub is_child: bool,
    pub is_macro: bool,
    /// Name of the enclosing tag, if any
    pub parent: Option<String>,
    /// Number of enclosing tags
    pub depth: usize,
    pub children: Vec<Node>,
    pub raw_body: Option<String>,
    pub span: Span,
}

impl TagNode {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            is_parent: false,
            is_child: true,
            is_macro: false,
            parent: None,
            depth: 0,
            children: Vec::new(),
            raw_body: None,
            span,
        }
    }

    /// First attribute with the given name (case-insensitive)
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| {
                attr.name
                    .as_deref()
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
            .map(|attr| attr.value.as_str())
    }

    pub fn named_attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter_map(|attr| attr.name.as_deref().map(|n| (n, attr.value.as_str())))
    }

    pub fn positional_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|attr| attr.is_positional())
            .map(|attr| attr.value.as_str())
    }

    pub fn child_tags(&self) -> impl Iterator<Item = &TagNode> {
        self.children.iter().filter_map(Node::as_tag)
    }

    /// Name as written in the source, sigil included
    pub fn display_name(&self) -> String {
        if self.is_macro {
            format!("{}{}", MACRO_SIGIL, self.name)
        } else {
            self.name.clone()
        }
    }
}
