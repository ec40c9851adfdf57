//! Condition expressions for `@if`.
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := compare (("&&" | "and") compare)*
//! compare := unary (op unary)?
//! unary   := "!" unary | primary
//! primary := "(" or ")" | number | string | word | {variable} | $action
//! ```
//!
//! `{name}` operands are looked up when the condition is evaluated, so a
//! bound value is always a single operand whatever characters it holds.
//! Quoted strings may embed `{name}` references as well.

use crate::action::ActionValue;
use crate::error::{InterpretError, InterpretResult};
use crate::state::ParserState;
use logos::Logos;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Malformed expression '{expression}': {message}")]
    Malformed { expression: String, message: String },
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum ExprToken {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("!")]
    Not,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""[^"]*""#, |lex| strip_delimiters(lex.slice()))]
    #[regex(r"'[^']*'", |lex| strip_delimiters(lex.slice()))]
    Str(String),

    #[regex(r"\$[A-Za-z_][A-Za-z0-9_.]*", |lex| lex.slice()[1..].to_string())]
    Action(String),

    #[regex(r"\{[A-Za-z_][A-Za-z0-9_.\-]*\}", |lex| strip_delimiters(lex.slice()))]
    Variable(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_.\-]*", |lex| lex.slice().to_string())]
    Word(String),
}

fn strip_delimiters(slice: &str) -> String {
    slice[1..slice.len() - 1].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn from_token(token: &ExprToken) -> Option<Self> {
        match token {
            ExprToken::Eq => Some(CompareOp::Eq),
            ExprToken::Ne => Some(CompareOp::Ne),
            ExprToken::Lt => Some(CompareOp::Lt),
            ExprToken::Le => Some(CompareOp::Le),
            ExprToken::Gt => Some(CompareOp::Gt),
            ExprToken::Ge => Some(CompareOp::Ge),
            ExprToken::Word(word) => match word.to_ascii_lowercase().as_str() {
                "eq" => Some(CompareOp::Eq),
                "ne" => Some(CompareOp::Ne),
                "lt" => Some(CompareOp::Lt),
                "le" => Some(CompareOp::Le),
                "gt" => Some(CompareOp::Gt),
                "ge" => Some(CompareOp::Ge),
                _ => None,
            },
            _ => None,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Value of a sub-expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Operand {
    pub fn is_truthy(&self) -> bool {
        match self {
            Operand::Bool(b) => *b,
            Operand::Number(n) => *n != 0.0,
            Operand::Text(text) => {
                !(text.is_empty()
                    || text.eq_ignore_ascii_case("false")
                    || text.eq_ignore_ascii_case("null"))
            }
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            Operand::Text(text) => text.trim().parse().ok(),
            Operand::Bool(_) => None,
        }
    }

    fn to_text(&self) -> String {
        match self {
            Operand::Text(text) => text.clone(),
            Operand::Number(n) => n.to_string(),
            Operand::Bool(b) => b.to_string(),
        }
    }

    /// Numeric when both sides are numbers, textual otherwise
    fn compare(&self, other: &Operand) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => self.to_text().cmp(&other.to_text()),
        }
    }
}

impl From<ActionValue> for Operand {
    fn from(value: ActionValue) -> Self {
        match value {
            ActionValue::Bool(b) => Operand::Bool(b),
            ActionValue::Number(n) => Operand::Number(n),
            other => Operand::Text(other.to_text()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Operand),
    /// Quoted text, `{name}` references substituted at evaluation
    Text(String),
    Variable(String),
    Action(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
}

/// A parsed condition, evaluated against parser state
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let malformed = |message: String| ExpressionError::Malformed {
            expression: source.to_string(),
            message,
        };

        let mut tokens = Vec::new();
        for (token, span) in ExprToken::lexer(source).spanned() {
            let token = token.map_err(|_| malformed(format!("unexpected '{}'", &source[span])))?;
            tokens.push(token);
        }
        if tokens.is_empty() {
            return Err(malformed("empty condition".to_string()));
        }

        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.parse_or().map_err(malformed)?;
        if parser.pos < parser.tokens.len() {
            return Err(malformed(format!("unexpected {:?}", parser.tokens[parser.pos])));
        }
        Ok(Self { expr })
    }

    pub fn evaluate(&self, state: &mut ParserState) -> InterpretResult<bool> {
        Ok(eval(&self.expr, state)?.is_truthy())
    }
}

fn eval(expr: &Expr, state: &mut ParserState) -> InterpretResult<Operand> {
    Ok(match expr {
        Expr::Literal(operand) => operand.clone(),
        Expr::Text(text) => Operand::Text(state.substitute(text)?),
        Expr::Variable(name) => match state.variable(name) {
            Some(value) => Operand::Text(value.to_text()),
            None => {
                state.recover(InterpretError::UnresolvedVariable {
                    name: name.clone(),
                    path: state.path_string(),
                })?;
                Operand::Text(String::new())
            }
        },
        Expr::Action(id) => match state.invoke_action(id, None)? {
            Some(value) => value.into(),
            None => Operand::Text(String::new()),
        },
        Expr::Not(inner) => Operand::Bool(!eval(inner, state)?.is_truthy()),
        Expr::And(lhs, rhs) => {
            Operand::Bool(eval(lhs, state)?.is_truthy() && eval(rhs, state)?.is_truthy())
        }
        Expr::Or(lhs, rhs) => {
            Operand::Bool(eval(lhs, state)?.is_truthy() || eval(rhs, state)?.is_truthy())
        }
        Expr::Compare(op, lhs, rhs) => {
            let lhs = eval(lhs, state)?;
            let rhs = eval(rhs, state)?;
            Operand::Bool(op.holds(lhs.compare(&rhs)))
        }
    })
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn peek_word(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(ExprToken::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(ExprToken::Or)) || self.peek_word("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_compare()?;
        while matches!(self.peek(), Some(ExprToken::And)) || self.peek_word("and") {
            self.pos += 1;
            let rhs = self.parse_compare()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_compare(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_unary()?;
        match self.peek().and_then(CompareOp::from_token) {
            Some(op) => {
                self.pos += 1;
                let rhs = self.parse_unary()?;
                Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
            }
            None => Ok(lhs),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if matches!(self.peek(), Some(ExprToken::Not)) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;

        match token {
            ExprToken::LParen => {
                let inner = self.parse_or()?;
                match self.peek() {
                    Some(ExprToken::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err("missing ')'".to_string()),
                }
            }
            ExprToken::Number(n) => Ok(Expr::Literal(Operand::Number(n))),
            ExprToken::Str(text) => Ok(Expr::Text(text)),
            ExprToken::Variable(name) => Ok(Expr::Variable(name)),
            ExprToken::Action(id) => Ok(Expr::Action(id)),
            ExprToken::Word(word) if word.eq_ignore_ascii_case("true") => Ok(Expr::Literal(Operand::Bool(true))),
            ExprToken::Word(word) if word.eq_ignore_ascii_case("false") => Ok(Expr::Literal(Operand::Bool(false))),
            ExprToken::Word(word) => {
                if CompareOp::from_token(&ExprToken::Word(word.clone())).is_some()
                    || word.eq_ignore_ascii_case("and")
                    || word.eq_ignore_ascii_case("or")
                {
                    return Err(format!("operator '{}' without a left operand", word));
                }
                Ok(Expr::Literal(Operand::Text(word)))
            }
            other => Err(format!("unexpected {:?}", other)),
        }
    }
}
