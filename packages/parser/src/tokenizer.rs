use crate::error::{ParseError, ParseResult};
use logos::{Lexer, Logos, SpannedIter};
use std::iter::Peekable;
use std::ops::Range;

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

/// Markup-level tokens. Tag interiors are kept raw and split later by
/// [`AttrToken`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    /// `<name ...>` or `<name .../>`; `body` is everything between `<` and
    /// the closing `>`/`/>`
    Open { body: &'src str, self_closing: bool },
    /// `</name>`
    Close { name: &'src str },
    /// Untrimmed text between tags
    Text(&'src str),
}

/// Token types inside an open tag
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum AttrToken<'src> {
    #[token("=")]
    Eq,

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unquote(lex.slice()))]
    Quoted(String),

    #[regex(r#"[^ \t\r\n="']+"#, |lex| lex.slice())]
    Bare(&'src str),
}

fn unquote(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Lex the interior of an open tag into attribute tokens
pub fn lex_attributes(body: &str) -> Vec<(Result<AttrToken<'_>, ()>, Range<usize>)> {
    AttrToken::lexer(body).spanned().collect()
}

/// Raw markup lexemes. Tag and comment bodies are consumed by callbacks
/// since quoted attribute values may contain `>`.
#[derive(Logos, Debug, Clone, PartialEq)]
enum Lexeme<'src> {
    #[token("<!--", skip_comment)]
    Comment,

    #[regex(r"<[A-Za-z_@]", open_tag)]
    Open(&'src str),

    #[token("</", close_tag)]
    Close(&'src str),

    #[regex(r"[^<]+")]
    #[token("<")]
    Text,
}

/// Offset of the `>` ending a tag, skipping quoted values
fn tag_end(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

/// Consume the rest of the tag and return everything after `skip` bytes of
/// the opener, up to the closing `>`
fn tag_body<'src>(lex: &mut Lexer<'src, Lexeme<'src>>, skip: usize) -> Option<&'src str> {
    let end = tag_end(lex.remainder())?;
    let start = lex.span().start + skip;
    lex.bump(end + 1);
    Some(&lex.source()[start..lex.span().end - 1])
}

fn open_tag<'src>(lex: &mut Lexer<'src, Lexeme<'src>>) -> Option<&'src str> {
    tag_body(lex, 1)
}

fn close_tag<'src>(lex: &mut Lexer<'src, Lexeme<'src>>) -> Option<&'src str> {
    tag_body(lex, 2)
}

fn skip_comment<'src>(lex: &mut Lexer<'src, Lexeme<'src>>) -> bool {
    match lex.remainder().find(COMMENT_END) {
        Some(end) => {
            lex.bump(end + COMMENT_END.len());
            true
        }
        None => false,
    }
}

/// Streaming markup scanner over [`Lexeme`]s. Adjacent text lexemes (split
/// by a `<` that starts no tag) are merged into one [`Token::Text`].
pub struct Tokenizer<'src> {
    source: &'src str,
    lexemes: Peekable<SpannedIter<'src, Lexeme<'src>>>,
    failed: bool,
}

impl<'src> Tokenizer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            lexemes: Lexeme::lexer(source).spanned().peekable(),
            failed: false,
        }
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    fn next_token(&mut self) -> Option<ParseResult<(Token<'src>, Range<usize>)>> {
        if self.failed {
            return None;
        }
        loop {
            let (lexeme, span) = self.lexemes.next()?;
            let token = match lexeme {
                Ok(Lexeme::Comment) => continue,
                Ok(Lexeme::Open(inner)) => match inner.strip_suffix('/') {
                    Some(body) => Token::Open {
                        body,
                        self_closing: true,
                    },
                    None => Token::Open {
                        body: inner,
                        self_closing: false,
                    },
                },
                Ok(Lexeme::Close(inner)) => Token::Close { name: inner.trim() },
                Ok(Lexeme::Text) => {
                    let mut end = span.end;
                    while let Some((Ok(Lexeme::Text), next)) = self.lexemes.peek() {
                        end = next.end;
                        self.lexemes.next();
                    }
                    return Some(Ok((Token::Text(&self.source[span.start..end]), span.start..end)));
                }
                Err(()) => {
                    self.failed = true;
                    let rest = &self.source[span.start..];
                    if rest.starts_with(COMMENT_START) {
                        return Some(Err(ParseError::UnterminatedComment { pos: span.start }));
                    }
                    let raw: String = rest.chars().take(40).collect();
                    return Some(Err(ParseError::UnterminatedTag { raw, pos: span.start }));
                }
            };
            return Some(Ok((token, span)));
        }
    }
}

impl<'src> Iterator for Tokenizer<'src> {
    type Item = ParseResult<(Token<'src>, Range<usize>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Tokenize a whole template
pub fn tokenize(source: &str) -> ParseResult<Vec<(Token<'_>, Range<usize>)>> {
    Tokenizer::new(source).collect()
}
