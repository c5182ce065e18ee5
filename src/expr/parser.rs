//! Tokenizer and precedence-climbing parser for lambda expressions.
//!
//! An expression has the shape `param => body`, where `param` names the value
//! environment inside `body`:
//!
//! ```text
//! x => int.Parse(x.counter) + 1
//! (env) => env.list.Split(",")
//! ```

use super::value::{EvalError, EvalResult, SourceSpan, Value};

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Arrow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Coalesce,
    OrOr,
    AndAnd,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    span: SourceSpan,
}

fn tokenize(text: &str) -> EvalResult<Vec<Spanned>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let tok = if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            Tok::Ident(chars[start..i].iter().collect())
        } else if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_float =
                i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let lexeme: String = chars[start..i].iter().collect();
                let value = lexeme.parse::<f64>().map_err(|_| {
                    EvalError::syntax(format!("invalid number '{}'", lexeme))
                        .with_span(SourceSpan::new(start, i))
                })?;
                Tok::Float(value)
            } else {
                let lexeme: String = chars[start..i].iter().collect();
                let value = lexeme.parse::<i64>().map_err(|_| {
                    EvalError::syntax(format!("integer literal '{}' out of range", lexeme))
                        .with_span(SourceSpan::new(start, i))
                })?;
                Tok::Int(value)
            }
        } else if c == '"' {
            i += 1;
            let mut s = String::new();
            loop {
                match chars.get(i) {
                    None => {
                        return Err(EvalError::syntax("unterminated string literal")
                            .with_span(SourceSpan::new(start, i)))
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        let escaped = match chars.get(i + 1) {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some('r') => '\r',
                            Some('0') => '\0',
                            Some(other) => *other,
                            None => {
                                return Err(EvalError::syntax("unterminated string literal")
                                    .with_span(SourceSpan::new(start, i)))
                            }
                        };
                        s.push(escaped);
                        i += 2;
                    }
                    Some(other) => {
                        s.push(*other);
                        i += 1;
                    }
                }
            }
            Tok::Str(s)
        } else {
            let next = chars.get(i + 1).copied();
            let (tok, width) = match (c, next) {
                ('=', Some('>')) => (Tok::Arrow, 2),
                ('=', Some('=')) => (Tok::EqEq, 2),
                ('!', Some('=')) => (Tok::NotEq, 2),
                ('<', Some('=')) => (Tok::LtEq, 2),
                ('>', Some('=')) => (Tok::GtEq, 2),
                ('&', Some('&')) => (Tok::AndAnd, 2),
                ('|', Some('|')) => (Tok::OrOr, 2),
                ('?', Some('?')) => (Tok::Coalesce, 2),
                ('(', _) => (Tok::LParen, 1),
                (')', _) => (Tok::RParen, 1),
                ('[', _) => (Tok::LBracket, 1),
                (']', _) => (Tok::RBracket, 1),
                (',', _) => (Tok::Comma, 1),
                ('.', _) => (Tok::Dot, 1),
                ('?', _) => (Tok::Question, 1),
                (':', _) => (Tok::Colon, 1),
                ('<', _) => (Tok::Lt, 1),
                ('>', _) => (Tok::Gt, 1),
                ('+', _) => (Tok::Plus, 1),
                ('-', _) => (Tok::Minus, 1),
                ('*', _) => (Tok::Star, 1),
                ('/', _) => (Tok::Slash, 1),
                ('%', _) => (Tok::Percent, 1),
                ('!', _) => (Tok::Bang, 1),
                _ => {
                    return Err(EvalError::syntax(format!("unexpected character '{}'", c))
                        .with_span(SourceSpan::new(start, start + 1)))
                }
            };
            i += width;
            tok
        };

        tokens.push(Spanned {
            tok,
            span: SourceSpan::new(start, i),
        });
    }

    Ok(tokens)
}

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Coalesce,
}

/// Expression tree produced by [`parse_lambda`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A bare name: the lambda parameter or a static type such as `int`
    Ident { name: String, span: SourceSpan },
    Member {
        target: Box<Expr>,
        name: String,
        span: SourceSpan,
    },
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: SourceSpan,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        span: SourceSpan,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

/// A compiled `param => body` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub param: String,
    pub body: Expr,
}

// ============================================================================
// Parser
// ============================================================================

/// Parse an expression text into a [`Lambda`].
pub fn parse_lambda(text: &str) -> EvalResult<Lambda> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };

    let param = parser.parse_param()?;
    let body = parser.parse_expr()?;
    if let Some(extra) = parser.peek_spanned() {
        return Err(EvalError::syntax("unexpected trailing input").with_span(extra.span));
    }
    Ok(Lambda { param, body })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek_spanned(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn current_span(&self) -> SourceSpan {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn bump(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Tok, what: &str) -> EvalResult<SourceSpan> {
        let span = self.current_span();
        if self.eat(&expected) {
            Ok(span)
        } else {
            Err(EvalError::syntax(format!("expected {}", what)).with_span(span))
        }
    }

    fn parse_param(&mut self) -> EvalResult<String> {
        let parenthesized = self.eat(&Tok::LParen);
        let span = self.current_span();
        let param = match self.bump() {
            Some(Spanned {
                tok: Tok::Ident(name),
                ..
            }) => name,
            _ => {
                return Err(
                    EvalError::syntax("expected a parameter name before '=>'").with_span(span)
                )
            }
        };
        if parenthesized {
            self.expect(Tok::RParen, "')' after parameter")?;
        }
        self.expect(Tok::Arrow, "'=>'")?;
        Ok(param)
    }

    fn parse_expr(&mut self) -> EvalResult<Expr> {
        let cond = self.parse_coalesce()?;
        if self.eat(&Tok::Question) {
            let then = self.parse_expr()?;
            self.expect(Tok::Colon, "':' in conditional expression")?;
            let otherwise = self.parse_expr()?;
            return Ok(Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn parse_coalesce(&mut self) -> EvalResult<Expr> {
        let lhs = self.parse_binary(0)?;
        if self.eat(&Tok::Coalesce) {
            // Right-associative
            let rhs = self.parse_coalesce()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Coalesce,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    /// Left-associative binary operators, lowest precedence first.
    fn parse_binary(&mut self, level: usize) -> EvalResult<Expr> {
        const LEVELS: usize = 6;
        if level == LEVELS {
            return self.parse_unary();
        }

        let mut lhs = self.parse_binary(level + 1)?;
        while let Some(op) = self.peek().and_then(|tok| binary_op(tok, level)) {
            self.pos += 1;
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> EvalResult<Expr> {
        let op = match self.peek() {
            Some(Tok::Bang) => UnaryOp::Not,
            Some(Tok::Minus) => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> EvalResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Tok::Dot) {
                let span = self.current_span();
                let name = match self.bump() {
                    Some(Spanned {
                        tok: Tok::Ident(name),
                        ..
                    }) => name,
                    _ => {
                        return Err(EvalError::syntax("expected member name after '.'")
                            .with_span(span))
                    }
                };
                if self.eat(&Tok::LParen) {
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        target: Box::new(expr),
                        method: name,
                        args,
                        span,
                    };
                } else {
                    expr = Expr::Member {
                        target: Box::new(expr),
                        name,
                        span,
                    };
                }
            } else if self.eat(&Tok::LBracket) {
                let span = self.current_span();
                let index = self.parse_expr()?;
                self.expect(Tok::RBracket, "']'")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> EvalResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(Tok::RParen, "')' after arguments")?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        let span = self.current_span();
        let Some(Spanned { tok, span }) = self.bump() else {
            return Err(EvalError::syntax("unexpected end of expression").with_span(span));
        };
        match tok {
            Tok::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Tok::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Tok::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Tok::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Ident { name, span },
            }),
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(EvalError::syntax(format!("unexpected token {:?}", other)).with_span(span)),
        }
    }
}

fn binary_op(tok: &Tok, level: usize) -> Option<BinaryOp> {
    let op = match (level, tok) {
        (0, Tok::OrOr) => BinaryOp::Or,
        (1, Tok::AndAnd) => BinaryOp::And,
        (2, Tok::EqEq) => BinaryOp::Eq,
        (2, Tok::NotEq) => BinaryOp::NotEq,
        (3, Tok::Lt) => BinaryOp::Lt,
        (3, Tok::LtEq) => BinaryOp::LtEq,
        (3, Tok::Gt) => BinaryOp::Gt,
        (3, Tok::GtEq) => BinaryOp::GtEq,
        (4, Tok::Plus) => BinaryOp::Add,
        (4, Tok::Minus) => BinaryOp::Sub,
        (5, Tok::Star) => BinaryOp::Mul,
        (5, Tok::Slash) => BinaryOp::Div,
        (5, Tok::Percent) => BinaryOp::Rem,
        _ => return None,
    };
    Some(op)
}
