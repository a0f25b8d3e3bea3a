//! Script error types.

/// Error raised while parsing or running a script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    /// Malformed source text.
    #[error("SyntaxError (line {line}): {message}")]
    Syntax {
        /// 1-based line number within the block.
        line: usize,
        /// Description of the problem.
        message: String,
    },
    /// Name not bound locally, in the host environment or as a function.
    #[error("NameError: name '{0}' is not defined")]
    Name(String),
    /// Operation applied to values of the wrong type.
    #[error("TypeError: {0}")]
    Type(String),
    /// Missing map key or object field.
    #[error("KeyError: {0}")]
    Key(String),
    /// List index out of range.
    #[error("IndexError: index {index} out of range for length {len}")]
    Index {
        /// Requested index.
        index: i64,
        /// Length of the indexed list or string.
        len: usize,
    },
    /// Conversion of a value failed (e.g. `int("abc")`).
    #[error("ValueError: {0}")]
    Value(String),
    /// Division or modulo by zero.
    #[error("ZeroDivisionError: division by zero")]
    DivisionByZero,
    /// Integer arithmetic overflowed.
    #[error("OverflowError: integer overflow")]
    Overflow,
    /// `break` or `continue` outside a loop.
    #[error("SyntaxError: '{0}' outside loop")]
    OutsideLoop(&'static str),
    /// Failure reported by a host function.
    #[error("{0}")]
    Host(String),
}

impl ScriptError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}
