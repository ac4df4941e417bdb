use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Result type alias for operations that can produce a runtime error.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// Guest error classes supported by the interpreter.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations. The string representation matches the variant name exactly
/// (e.g., `TypeError` -> "TypeError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Base error class - parent prototype of every other kind.
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    URIError,
}

/// Internal error representation used while the evaluator is running.
///
/// `Throw` carries a guest value travelling through `unwind`; it is catchable
/// by a guest `try/catch`. The remaining variants are host-level misuse or
/// invariant breaches and are never visible to guest code.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum RunError {
    /// A guest `throw` (or a guest error raised by a handler). The value is
    /// usually an Error object but may be any guest value.
    Throw(Value),
    /// A guest error raised from native code, not yet materialized into an
    /// Error object. The evaluator builds the object during unwinding so
    /// natives don't need heap access for the failure path.
    ThrowNew(ErrorKind, String),
    /// `append_code` was called while the root frame is no longer the Program.
    AppendAfterCompletion,
    /// An attempted prototype assignment would have created a cycle.
    CyclicProto,
    /// A host binding was invoked after `load()` without being re-registered.
    UnboundNative(String),
    /// The evaluator reached a state its handlers cannot represent.
    Internal(String),
}

impl RunError {
    /// Shorthand for raising a guest error of the given kind.
    pub(crate) fn throw(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::ThrowNew(kind, message.into())
    }
}

/// A 1-based line / 0-based column pair into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Public error type surfaced to the embedder.
///
/// Produced when parsing fails, when a guest throw escapes the Program frame,
/// or when the interpreter is misused (e.g. `append_code` after completion).
/// Renders as `"Name: message"`, or just `"Name"` when the message is empty,
/// matching the guest-visible `Error.prototype.toString`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    kind: ErrorKind,
    message: String,
    loc: Option<CodeLoc>,
}

impl Exception {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            loc: None,
        }
    }

    pub(crate) fn with_loc(kind: ErrorKind, message: impl Into<String>, loc: CodeLoc) -> Self {
        Self {
            kind,
            message: message.into(),
            loc: Some(loc),
        }
    }

    /// Creates a syntax error at the given source position.
    pub(crate) fn syntax(message: impl Into<String>, loc: CodeLoc) -> Self {
        Self::with_loc(ErrorKind::SyntaxError, message, loc)
    }

    /// The error class this exception maps onto.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The message, without the leading class name.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source position of the failure, when one is known.
    #[must_use]
    pub fn loc(&self) -> Option<CodeLoc> {
        self.loc
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.kind.into();
        if self.message.is_empty() {
            f.write_str(name)?;
        } else {
            write!(f, "{name}: {}", self.message)?;
        }
        if let Some(loc) = self.loc {
            write!(f, " ({loc})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn display_with_message() {
        let exc = Exception::new(ErrorKind::RangeError, "bad length");
        assert_eq!(exc.to_string(), "RangeError: bad length");
    }

    #[test]
    fn display_without_message() {
        let exc = Exception::new(ErrorKind::TypeError, "");
        assert_eq!(exc.to_string(), "TypeError");
    }

    #[test]
    fn display_with_location() {
        let exc = Exception::syntax("unexpected token", CodeLoc { line: 3, column: 7 });
        assert_eq!(exc.to_string(), "SyntaxError: unexpected token (3:7)");
    }

    #[test]
    fn kind_round_trips_through_str() {
        let kind = ErrorKind::from_str("ReferenceError").unwrap();
        assert_eq!(kind, ErrorKind::ReferenceError);
        let s: &'static str = kind.into();
        assert_eq!(s, "ReferenceError");
    }
}
