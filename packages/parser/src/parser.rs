use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{lex_attributes, tokenize, AttrToken, Token};
use std::ops::Range;

/// Tag-tree builder for LML templates
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, Range<usize>)>,
    pos: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    /// Parse a complete template into its root-level nodes
    pub fn parse_document(&mut self) -> ParseResult<Vec<Node>> {
        let (nodes, _) = self.parse_nodes(None, 0)?;
        Ok(nodes)
    }

    /// Parse sibling nodes until the close tag of `open` (or end of input at
    /// the root). Returns the nodes and the range of the close tag.
    fn parse_nodes(
        &mut self,
        open: Option<&TagNode>,
        depth: usize,
    ) -> ParseResult<(Vec<Node>, Option<Range<usize>>)> {
        let mut nodes = Vec::new();

        while let Some((token, range)) = self.advance() {
            match token {
                Token::Text(raw) => {
                    if let Some(text) = self.text_node(raw, range) {
                        nodes.push(Node::Text(text));
                    }
                }
                Token::Close { name } => {
                    let Some(open) = open else {
                        return Err(ParseError::UnexpectedClose {
                            name: name.to_string(),
                            pos: range.start,
                        });
                    };
                    if !name.eq_ignore_ascii_case(&open.display_name()) {
                        return Err(ParseError::MismatchedClose {
                            expected: open.display_name(),
                            found: name.to_string(),
                            pos: range.start,
                            depth,
                        });
                    }
                    return Ok((nodes, Some(range)));
                }
                Token::Open { body, self_closing } => {
                    let mut tag = self.parse_tag_header(body, &range, depth, open)?;
                    if !self_closing {
                        tag.is_child = false;
                        tag.is_parent = true;
                        if tag.is_macro {
                            let close = self.capture_raw_body(&mut tag, &range)?;
                            tag.span.end = close.end;
                        } else {
                            let (children, close) = self.parse_nodes(Some(&tag), depth + 1)?;
                            tag.children = children;
                            if let Some(close) = close {
                                tag.span.end = close.end;
                            }
                        }
                    }
                    nodes.push(Node::Tag(tag));
                }
            }
        }

        match open {
            Some(open) => Err(ParseError::UnclosedTag {
                name: open.display_name(),
                pos: open.span.start,
                depth: open.depth,
            }),
            None => Ok((nodes, None)),
        }
    }

    /// Keep a macro's body as raw text up to its matching close tag.
    /// Same-named macros nested inside the body are balanced.
    fn capture_raw_body(&mut self, tag: &mut TagNode, open: &Range<usize>) -> ParseResult<Range<usize>> {
        let display_name = tag.display_name();
        let mut nesting = 0usize;

        while let Some((token, range)) = self.advance() {
            match token {
                Token::Open {
                    body,
                    self_closing: false,
                } if opens_tag(body, &display_name) => nesting += 1,
                Token::Close { name } if name.eq_ignore_ascii_case(&display_name) => {
                    if nesting == 0 {
                        tag.raw_body = Some(self.source[open.end..range.start].to_string());
                        return Ok(range);
                    }
                    nesting -= 1;
                }
                _ => {}
            }
        }

        Err(ParseError::UnclosedTag {
            name: display_name,
            pos: open.start,
            depth: tag.depth,
        })
    }

    fn parse_tag_header(
        &self,
        body: &str,
        range: &Range<usize>,
        depth: usize,
        parent: Option<&TagNode>,
    ) -> ParseResult<TagNode> {
        let body_offset = range.start + 1;
        let mut tokens = lex_attributes(body).into_iter().peekable();

        let malformed_tag = || ParseError::MalformedTag {
            raw: body.to_string(),
            pos: range.start,
            depth,
        };

        let raw_name = match tokens.next() {
            Some((Ok(AttrToken::Bare(name)), _)) => name,
            _ => return Err(malformed_tag()),
        };
        let (name, is_macro) = match raw_name.strip_prefix(MACRO_SIGIL) {
            Some(stripped) => (stripped, true),
            None => (raw_name, false),
        };
        if !is_valid_tag_name(name) {
            return Err(malformed_tag());
        }

        let mut tag = TagNode::new(name, Span::new(range.start, range.end));
        tag.is_macro = is_macro;
        tag.depth = depth;
        tag.parent = parent.map(|p| p.name.clone());

        let malformed = |span: &Range<usize>, message: &str| {
            ParseError::malformed_attribute(
                tag.display_name(),
                &body[span.clone()],
                message,
                body_offset + span.start,
                depth,
            )
        };

        let mut attributes = Vec::new();
        while let Some((token, span)) = tokens.next() {
            let attr_span = |end: usize| Span::new(body_offset + span.start, body_offset + end);
            match token {
                Ok(AttrToken::Bare(attr_name)) => {
                    if matches!(tokens.peek(), Some((Ok(AttrToken::Eq), _))) {
                        tokens.next();
                        match tokens.next() {
                            Some((Ok(AttrToken::Bare(value)), value_span)) => {
                                attributes.push(RawAttribute::named(
                                    attr_name,
                                    value,
                                    attr_span(value_span.end),
                                ));
                            }
                            Some((Ok(AttrToken::Quoted(value)), value_span)) => {
                                attributes.push(RawAttribute::named(
                                    attr_name,
                                    value,
                                    attr_span(value_span.end),
                                ));
                            }
                            _ => return Err(malformed(&span, "missing attribute value")),
                        }
                    } else if is_macro {
                        attributes.push(RawAttribute::positional(attr_name, attr_span(span.end)));
                    } else {
                        attributes.push(RawAttribute::named(attr_name, "true", attr_span(span.end)));
                    }
                }
                Ok(AttrToken::Quoted(value)) if is_macro => {
                    attributes.push(RawAttribute::positional(value, attr_span(span.end)));
                }
                Ok(AttrToken::Quoted(_)) => {
                    return Err(malformed(&span, "value without an attribute name"));
                }
                Ok(AttrToken::Eq) => return Err(malformed(&span, "'=' without an attribute name")),
                Err(()) => return Err(malformed(&span, "unreadable attribute text")),
            }
        }

        tag.attributes = attributes;
        Ok(tag)
    }

    fn text_node(&self, raw: &str, range: Range<usize>) -> Option<TextNode> {
        let trimmed_start = raw.len() - raw.trim_start().len();
        let content = raw.trim();
        if content.is_empty() {
            return None;
        }
        let start = range.start + trimmed_start;
        Some(TextNode {
            content: content.to_string(),
            span: Span::new(start, start + content.len()),
        })
    }

    fn advance(&mut self) -> Option<(Token<'src>, Range<usize>)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
}

fn is_valid_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
}

fn opens_tag(body: &str, display_name: &str) -> bool {
    body.split_whitespace()
        .next()
        .is_some_and(|name| name.eq_ignore_ascii_case(display_name))
}

/// Parse a template into its root-level nodes
pub fn parse(source: &str) -> ParseResult<Vec<Node>> {
    Parser::new(source)?.parse_document()
}
