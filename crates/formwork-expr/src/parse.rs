//! Recursive-descent parser producing the sandbox AST.
//!
//! The grammar, lowest precedence first:
//!
//! ```text
//! expr        := or_expr
//! or_expr     := and_expr ( "or" and_expr )*
//! and_expr    := not_expr ( "and" not_expr )*
//! not_expr    := "not" not_expr | comparison
//! comparison  := operand ( cmp_op operand | "in" operand
//!                        | "not" "in" operand )?
//! operand     := "-" operand | primary
//! primary     := literal | ident | set_literal | "(" expr ")"
//! set_literal := "{" expr ( "," expr )* "}"
//! ```
//!
//! There is no arithmetic, no indexing, no call syntax: the parser cannot
//! produce a node the evaluator does not allow.

use crate::{
  error::{Error, Result},
  token::{Token, lex},
  value::Value,
};

// ─── AST ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
  Eq,
  Ne,
  Gt,
  Ge,
  Lt,
  Le,
  In,
  NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
  And,
  Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Literal(Value),
  Name(String),
  Not(Box<Expr>),
  Neg(Box<Expr>),
  Compare {
    lhs: Box<Expr>,
    op:  CmpOp,
    rhs: Box<Expr>,
  },
  Bool {
    lhs: Box<Expr>,
    op:  BoolOp,
    rhs: Box<Expr>,
  },
  Set(Vec<Expr>),
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Parse `input` into an [`Expr`], or fail with [`Error::Disallowed`].
pub fn parse(input: &str) -> Result<Expr> {
  let tokens = lex(input)?;
  if tokens.is_empty() {
    return Err(Error::Disallowed("empty expression".into()));
  }
  let mut parser = Parser { tokens, pos: 0 };
  let expr = parser.parse_or()?;
  if let Some(tok) = parser.peek() {
    return Err(Error::Disallowed(format!(
      "unexpected token after expression: {tok:?}"
    )));
  }
  Ok(expr)
}

struct Parser {
  tokens: Vec<Token>,
  pos:    usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> { self.tokens.get(self.pos) }

  fn advance(&mut self) -> Option<Token> {
    let tok = self.tokens.get(self.pos).cloned();
    if tok.is_some() {
      self.pos += 1;
    }
    tok
  }

  fn eat(&mut self, expected: &Token) -> bool {
    if self.peek() == Some(expected) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn expect(&mut self, expected: Token) -> Result<()> {
    match self.advance() {
      Some(tok) if tok == expected => Ok(()),
      Some(tok) => Err(Error::Disallowed(format!(
        "expected {expected:?}, found {tok:?}"
      ))),
      None => Err(Error::Disallowed(format!(
        "expected {expected:?}, found end of expression"
      ))),
    }
  }

  fn parse_or(&mut self) -> Result<Expr> {
    let mut lhs = self.parse_and()?;
    while self.eat(&Token::Or) {
      let rhs = self.parse_and()?;
      lhs = Expr::Bool {
        lhs: Box::new(lhs),
        op:  BoolOp::Or,
        rhs: Box::new(rhs),
      };
    }
    Ok(lhs)
  }

  fn parse_and(&mut self) -> Result<Expr> {
    let mut lhs = self.parse_not()?;
    while self.eat(&Token::And) {
      let rhs = self.parse_not()?;
      lhs = Expr::Bool {
        lhs: Box::new(lhs),
        op:  BoolOp::And,
        rhs: Box::new(rhs),
      };
    }
    Ok(lhs)
  }

  fn parse_not(&mut self) -> Result<Expr> {
    if self.eat(&Token::Not) {
      // `not in` never reaches here: `in` only follows a parsed operand.
      let operand = self.parse_not()?;
      return Ok(Expr::Not(Box::new(operand)));
    }
    self.parse_comparison()
  }

  fn parse_comparison(&mut self) -> Result<Expr> {
    let lhs = self.parse_operand()?;

    let op = match self.peek() {
      Some(Token::Eq) => Some(CmpOp::Eq),
      Some(Token::Ne) => Some(CmpOp::Ne),
      Some(Token::Gt) => Some(CmpOp::Gt),
      Some(Token::Ge) => Some(CmpOp::Ge),
      Some(Token::Lt) => Some(CmpOp::Lt),
      Some(Token::Le) => Some(CmpOp::Le),
      Some(Token::In) => Some(CmpOp::In),
      Some(Token::Not) => {
        // `x not in y`
        self.advance();
        self.expect(Token::In)?;
        let rhs = self.parse_operand()?;
        return Ok(Expr::Compare {
          lhs: Box::new(lhs),
          op:  CmpOp::NotIn,
          rhs: Box::new(rhs),
        });
      }
      _ => None,
    };

    match op {
      Some(op) => {
        self.advance();
        let rhs = self.parse_operand()?;
        Ok(Expr::Compare {
          lhs: Box::new(lhs),
          op,
          rhs: Box::new(rhs),
        })
      }
      None => Ok(lhs),
    }
  }

  fn parse_operand(&mut self) -> Result<Expr> {
    if self.eat(&Token::Minus) {
      let operand = self.parse_operand()?;
      return Ok(Expr::Neg(Box::new(operand)));
    }
    self.parse_primary()
  }

  fn parse_primary(&mut self) -> Result<Expr> {
    match self.advance() {
      Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
      Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
      Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
      Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
      Some(Token::None) => Ok(Expr::Literal(Value::None)),
      Some(Token::Ident(name)) => {
        // `name(` would be a call — not part of the grammar.
        if self.peek() == Some(&Token::LParen) {
          return Err(Error::Disallowed(format!(
            "function calls are not permitted: {name}(…)"
          )));
        }
        Ok(Expr::Name(name))
      }
      Some(Token::LParen) => {
        let inner = self.parse_or()?;
        self.expect(Token::RParen)?;
        Ok(inner)
      }
      Some(Token::LBrace) => {
        let mut items = vec![self.parse_or()?];
        while self.eat(&Token::Comma) {
          items.push(self.parse_or()?);
        }
        self.expect(Token::RBrace)?;
        Ok(Expr::Set(items))
      }
      Some(tok) => {
        Err(Error::Disallowed(format!("unexpected token: {tok:?}")))
      }
      None => Err(Error::Disallowed("unexpected end of expression".into())),
    }
  }
}
