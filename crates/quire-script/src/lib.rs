//! Embedded script language for quire code blocks.
//!
//! A small indentation-based language evaluated natively. Expression blocks
//! (`{= ... =}`) go through [`eval_expression`], statement blocks
//! (`{% ... %}`) through [`exec_statements`], which returns whatever the
//! block printed.
//!
//! Scripts see the outside world only through a [`Host`]: page objects,
//! site values and host functions are all provided by the caller. There is
//! no file, network or process access.
//!
//! # Module layout
//!
//! - `lexer`: source text to tokens, with indentation tracking
//! - `parser`: tokens to syntax tree
//! - `interp`: tree-walking evaluator and the [`Host`] trait
//! - `builtins`: builtin functions and methods
//! - `value`: runtime values and host [`Object`]s
//!
//! # Example
//!
//! ```
//! use quire_script::{Map, Value, exec_statements};
//!
//! let mut env = Map::new();
//! env.insert("names".to_owned(), Value::List(vec!["a".into(), "b".into()]));
//!
//! let out = exec_statements("for n in names:\n    print(n.upper())", &env).unwrap();
//! assert_eq!(out, "A\nB");
//! ```

mod ast;
mod builtins;
mod error;
mod interp;
mod lexer;
mod parser;
mod value;

pub use error::ScriptError;
pub use interp::{Host, eval_expression, exec_statements, strip_common_indent};
pub use value::{Map, Object, Value};
