//! Directive scanning for page bodies and the skeleton.
//!
//! Three directive kinds are recognized, each with a brace form and an
//! HTML-comment form:
//!
//! | Kind | Brace form | Comment form |
//! |------|------------|--------------|
//! | Variable reference | `{{ ref }}` | `<!--{ ref }-->` |
//! | Expression block | `{= expr =}` | `<!--= expr =-->` |
//! | Statement block | `{% stmts %}` | `<!--% stmts %-->` |
//!
//! [`expand`] scans left to right in a single pass and hands every directive
//! to a [`DirectiveHandler`]. Replacement text is inserted as-is and never
//! rescanned within the same call.
//!
//! An opener preceded by `\` is left in the text untouched. [`unescape`]
//! removes those backslashes and runs as the very last step on a page, so
//! escaped openers produced by directive output stay literal too.
//!
//! # Example
//!
//! ```
//! use quire_renderer::directive::{Directive, DirectiveHandler, expand, unescape};
//!
//! struct Upper;
//!
//! impl DirectiveHandler for Upper {
//!     type Error = std::convert::Infallible;
//!
//!     fn handle(&mut self, directive: Directive<'_>) -> Result<String, Self::Error> {
//!         Ok(match directive {
//!             Directive::Variable(reference) => reference.name.to_uppercase(),
//!             Directive::Expression(code) | Directive::Statements(code) => code.trim().to_owned(),
//!         })
//!     }
//! }
//!
//! let out = expand(r"{{ title }} and \{{ title }}", &mut Upper).unwrap();
//! assert_eq!(out, r"TITLE and \{{ title }}");
//! assert_eq!(unescape(&out), "TITLE and {{ title }}");
//! ```

mod args;
mod scanner;

pub use args::{ArgValue, MacroRef};
pub use scanner::{expand, unescape};

/// A directive found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'t> {
    /// `{{ name key=value }}`: a macro reference.
    Variable(MacroRef),
    /// `{= expr =}`: code evaluated to a value.
    Expression(&'t str),
    /// `{% stmts %}`: code whose printed output is substituted.
    Statements(&'t str),
}

impl Directive<'_> {
    /// Short name of the directive kind, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Variable(_) => "variable",
            Self::Expression(_) => "expression",
            Self::Statements(_) => "statements",
        }
    }
}

/// Produces the replacement text for each directive.
pub trait DirectiveHandler {
    /// Error that aborts the expansion.
    type Error;

    /// Return the text to substitute for `directive`.
    fn handle(&mut self, directive: Directive<'_>) -> Result<String, Self::Error>;
}
