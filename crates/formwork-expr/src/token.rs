//! Lexer for the sandbox grammar.
//!
//! The token set is deliberately closed. Characters and keywords with no
//! place in the grammar — arithmetic, indexing, calls, host-language
//! statements — are rejected here with [`Error::Disallowed`], before any
//! parsing happens.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
  Ident(String),
  Int(i64),
  Str(String),
  True,
  False,
  None,

  And,
  Or,
  Not,
  In,

  Eq, // ==
  Ne, // !=
  Gt, // >
  Ge, // >=
  Lt, // <
  Le, // <=

  Minus,
  LParen,
  RParen,
  LBrace,
  RBrace,
  Comma,
}

/// Keywords that would only appear in an attempt to smuggle real code into
/// a statement. Rejected outright rather than treated as identifiers.
const FORBIDDEN_KEYWORDS: &[&str] = &[
  "import", "lambda", "def", "class", "for", "while", "if", "else", "yield",
  "return", "exec", "eval", "global",
];

fn peek(chars: &[char], i: usize) -> Option<char> { chars.get(i).copied() }

/// Tokenize `input`, rejecting anything outside the sandbox grammar.
pub fn lex(input: &str) -> Result<Vec<Token>> {
  let chars: Vec<char> = input.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < chars.len() {
    match chars[i] {
      ' ' | '\t' | '\r' | '\n' => i += 1,
      '=' if peek(&chars, i + 1) == Some('=') => {
        tokens.push(Token::Eq);
        i += 2;
      }
      '!' if peek(&chars, i + 1) == Some('=') => {
        tokens.push(Token::Ne);
        i += 2;
      }
      '>' if peek(&chars, i + 1) == Some('=') => {
        tokens.push(Token::Ge);
        i += 2;
      }
      '>' => {
        tokens.push(Token::Gt);
        i += 1;
      }
      '<' if peek(&chars, i + 1) == Some('=') => {
        tokens.push(Token::Le);
        i += 2;
      }
      '<' => {
        tokens.push(Token::Lt);
        i += 1;
      }
      '-' => {
        tokens.push(Token::Minus);
        i += 1;
      }
      '(' => {
        tokens.push(Token::LParen);
        i += 1;
      }
      ')' => {
        tokens.push(Token::RParen);
        i += 1;
      }
      '{' => {
        tokens.push(Token::LBrace);
        i += 1;
      }
      '}' => {
        tokens.push(Token::RBrace);
        i += 1;
      }
      ',' => {
        tokens.push(Token::Comma);
        i += 1;
      }
      '\'' | '"' => {
        let quote = chars[i];
        let start = i + 1;
        let mut j = start;
        while j < chars.len() && chars[j] != quote {
          j += 1;
        }
        if j >= chars.len() {
          return Err(Error::Disallowed(format!(
            "unterminated string literal in {input:?}"
          )));
        }
        tokens.push(Token::Str(chars[start..j].iter().collect()));
        i = j + 1;
      }
      c if c.is_ascii_digit() => {
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
          i += 1;
        }
        let text: String = chars[start..i].iter().collect();
        let n = text.parse::<i64>().map_err(|_| {
          Error::Disallowed(format!("integer literal out of range: {text}"))
        })?;
        tokens.push(Token::Int(n));
      }
      c if c.is_ascii_alphabetic() || c == '_' => {
        let start = i;
        while i < chars.len()
          && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
        {
          i += 1;
        }
        let word: String = chars[start..i].iter().collect();
        if word.starts_with("__") {
          return Err(Error::Disallowed(format!(
            "identifier not permitted: {word}"
          )));
        }
        if FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
          return Err(Error::Disallowed(format!(
            "keyword not permitted: {word}"
          )));
        }
        tokens.push(match word.as_str() {
          "and" => Token::And,
          "or" => Token::Or,
          "not" => Token::Not,
          "in" => Token::In,
          "true" | "True" => Token::True,
          "false" | "False" => Token::False,
          "none" | "None" => Token::None,
          _ => Token::Ident(word),
        });
      }
      other => {
        return Err(Error::Disallowed(format!(
          "character not permitted in expression: {other:?}"
        )));
      }
    }
  }

  Ok(tokens)
}
