//! Weight-update expressions over synaptic traces.
//!
//! A rule such as `"2*x1*y1 - y2"` is parsed once into an [`Expr`] tree and evaluated by
//! walking the tree whenever the synapse sees a relevant spike. Only `*`, `+`, `-`,
//! parentheses, integer literals and the trace names `x1`, `x2`, `y1`, `y2`, `y3` are
//! accepted.

use std::fmt;
use std::str::FromStr;

use crate::error::{RuleSyntaxError, RuleSyntaxErrorKind};
use crate::trace::{TraceKind, TraceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Sub,
    Add,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(i64),
    Trace(TraceKind),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn evaluate(&self, traces: &TraceState) -> i64 {
        match self {
            Expr::Literal(value) => *value,
            Expr::Trace(kind) => traces.get(*kind) as i64,
            Expr::Binary { op, left, right } => {
                let left = left.evaluate(traces);
                let right = right.evaluate(traces);
                match op {
                    BinaryOp::Mul => left.saturating_mul(right),
                    BinaryOp::Sub => left.saturating_sub(right),
                    BinaryOp::Add => left.saturating_add(right),
                }
            }
        }
    }

    fn visit_traces(&self, f: &mut impl FnMut(TraceKind)) {
        match self {
            Expr::Literal(_) => {}
            Expr::Trace(kind) => f(*kind),
            Expr::Binary { left, right, .. } => {
                left.visit_traces(f);
                right.visit_traces(f);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LearningRule {
    source: String,
    expr: Expr,
    reads_pre_traces: bool,
    reads_post_traces: bool,
}

impl LearningRule {
    pub fn parse(source: &str) -> Result<Self, RuleSyntaxError> {
        let tokens = tokenize(source)?;
        if let Some(token) = tokens.get(MAX_RULE_TOKENS) {
            return Err(token.unexpected());
        }

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let expr = parser.parse_expr()?;

        if let Some(token) = parser.peek() {
            return Err(token.unexpected());
        }

        let mut reads_pre_traces = false;
        let mut reads_post_traces = false;
        expr.visit_traces(&mut |kind| {
            if kind.is_pre() {
                reads_pre_traces = true;
            } else {
                reads_post_traces = true;
            }
        });

        Ok(Self {
            source: source.to_string(),
            expr,
            reads_pre_traces,
            reads_post_traces,
        })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, traces: &TraceState) -> i64 {
        self.expr.evaluate(traces)
    }

    /// Whether a step with the given spike events requires evaluating this rule.
    pub fn is_triggered(&self, pre_syn_spike: bool, post_syn_spike: bool) -> bool {
        if !self.reads_pre_traces && !self.reads_post_traces {
            return pre_syn_spike || post_syn_spike;
        }

        (pre_syn_spike && self.reads_pre_traces) || (post_syn_spike && self.reads_post_traces)
    }
}

impl FromStr for LearningRule {
    type Err = RuleSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LearningRule::parse(s)
    }
}

impl fmt::Display for LearningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Number(i64),
    Trace(TraceKind),
    Plus,
    Minus,
    Star,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    position: usize,
}

impl Token {
    fn unexpected(&self) -> RuleSyntaxError {
        syntax_error(&self.text, self.position, RuleSyntaxErrorKind::UnexpectedToken)
    }
}

fn syntax_error(token: &str, position: usize, kind: RuleSyntaxErrorKind) -> RuleSyntaxError {
    RuleSyntaxError {
        token: token.to_string(),
        position,
        kind,
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, RuleSyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            let mut end = position;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let text = &source[position..end];

            let kind = if c.is_ascii_digit() || c == '.' {
                let value = text.parse::<i64>().map_err(|_| {
                    syntax_error(text, position, RuleSyntaxErrorKind::MalformedLiteral)
                })?;
                TokenKind::Number(value)
            } else {
                let kind = text.parse::<TraceKind>().map_err(|_| {
                    syntax_error(text, position, RuleSyntaxErrorKind::UnknownIdentifier)
                })?;
                TokenKind::Trace(kind)
            };

            tokens.push(Token {
                kind,
                text: text.to_string(),
                position,
            });
            continue;
        }

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            _ => {
                return Err(syntax_error(
                    &c.to_string(),
                    position,
                    RuleSyntaxErrorKind::DisallowedOperator,
                ))
            }
        };

        chars.next();
        tokens.push(Token {
            kind,
            text: c.to_string(),
            position,
        });
    }

    Ok(tokens)
}

/// Also bounds the height of a parsed expression tree.
const MAX_RULE_TOKENS: usize = 1024;

/// Parentheses and unary minus nest at most this deep.
const MAX_NESTING: usize = 64;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<&'a Token, RuleSyntaxError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| syntax_error("<end>", self.end, RuleSyntaxErrorKind::UnexpectedEnd))?;
        self.pos += 1;
        Ok(token)
    }

    fn parse_expr(&mut self) -> Result<Expr, RuleSyntaxError> {
        let mut left = self.parse_term()?;

        while let Some(token) = self.peek() {
            let op = match token.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, RuleSyntaxError> {
        let mut left = self.parse_factor()?;

        while let Some(TokenKind::Star) = self.peek().map(|token| &token.kind) {
            self.pos += 1;
            let right = self.parse_factor()?;
            left = binary(BinaryOp::Mul, left, right);
        }

        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, RuleSyntaxError> {
        let token = self.next()?;

        if matches!(token.kind, TokenKind::Minus | TokenKind::LParen) {
            if self.depth == MAX_NESTING {
                return Err(token.unexpected());
            }
            self.depth += 1;
            let result = self.parse_nested(token);
            self.depth -= 1;
            return result;
        }

        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Literal(value)),
            TokenKind::Trace(kind) => Ok(Expr::Trace(kind)),
            _ => Err(token.unexpected()),
        }
    }

    fn parse_nested(&mut self, token: &'a Token) -> Result<Expr, RuleSyntaxError> {
        match token.kind {
            TokenKind::Minus => {
                let operand = self.parse_factor()?;
                Ok(match operand {
                    Expr::Literal(value) => Expr::Literal(-value),
                    operand => binary(BinaryOp::Sub, Expr::Literal(0), operand),
                })
            }
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                let closing = self.next()?;
                if closing.kind != TokenKind::RParen {
                    return Err(closing.unexpected());
                }
                Ok(inner)
            }
            _ => Err(token.unexpected()),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
