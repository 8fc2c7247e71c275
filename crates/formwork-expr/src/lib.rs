//! Sandboxed expression language for form conditions and validations.
//!
//! Statements are short boolean fragments authored (indirectly) by schema
//! builders, e.g. `q_3f2a… > 3000` or `q_3f2a… in {'a', 'b'}`. They are
//! parsed by a closed grammar and evaluated against a [`LayeredContext`] of
//! question answers. The grammar is the security boundary: nothing outside
//! it can be expressed, so builder-authored text never gains host-language
//! execution.
//!
//! Pipeline:
//!   raw &str
//!     └─ lex()          → Vec<Token>
//!          └─ parse()    → Expr
//!               └─ eval() → Value (evaluate() requires a strict bool)

pub mod context;
pub mod error;
pub mod eval;
pub mod parse;
pub mod token;
pub mod value;

pub use context::{ContextLayer, LayeredContext};
pub use error::{Error, Result};
pub use eval::{evaluate, interpolate, simple_reference};
pub use parse::Expr;
pub use value::Value;
