use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::types::Kind;

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// The fixed set of runtime error kinds.
///
/// Each variant is backed by one singleton string object owned by the interpreter
/// and bound in the builtins dict under the variant name. Raising an error stores
/// that singleton in the error slot, so `EXC_MATCH` and `is` work by identity.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `TypeError` -> "TypeError").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize, Deserialize,
)]
pub enum ExcType {
    RuntimeError,
    EOFError,
    TypeError,
    /// Out of memory, including refusals from the resource tracker.
    MemoryError,
    /// Undefined name, attribute or dict key.
    NameError,
    /// Internal invariant violation, e.g. malformed bytecode.
    SystemError,
}

impl ExcType {
    /// Text of the singleton string object that represents this error at runtime.
    #[must_use]
    pub fn singleton_text(self) -> &'static str {
        match self {
            Self::RuntimeError => "run-time error",
            Self::EOFError => "end-of-file read",
            Self::TypeError => "type error",
            Self::MemoryError => "out of memory",
            Self::NameError => "undefined name",
            Self::SystemError => "system error",
        }
    }

    /// TypeError raised when a native function receives an argument of the wrong kind.
    #[must_use]
    pub(crate) fn badarg() -> RunError {
        SimpleException::new_msg(Self::TypeError, "illegal argument type for built-in operation").into()
    }

    /// SystemError raised when an internal function is misused.
    #[must_use]
    pub(crate) fn badcall() -> RunError {
        SimpleException::new_msg(Self::SystemError, "bad argument to internal function").into()
    }

    /// Bare MemoryError, no message.
    #[must_use]
    pub(crate) fn nomem() -> RunError {
        SimpleException::new(Self::MemoryError, None).into()
    }

    #[must_use]
    pub(crate) fn type_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::TypeError, msg).into()
    }

    /// TypeError for an operation that a kind does not support, e.g. `bad operand kind for -: list`.
    #[must_use]
    pub(crate) fn type_error_unsupported(op: &str, kind: Kind) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("bad operand kind for {op}: {kind}")).into()
    }

    #[must_use]
    pub(crate) fn runtime_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::RuntimeError, msg).into()
    }

    /// NameError whose message is the missing name itself.
    #[must_use]
    pub(crate) fn name_error(name: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::NameError, name).into()
    }

    #[must_use]
    pub(crate) fn system_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::SystemError, msg).into()
    }

    /// RuntimeError for an index outside a sequence.
    #[must_use]
    pub(crate) fn index_error(kind: Kind) -> RunError {
        SimpleException::new_msg(Self::RuntimeError, format!("{kind} index out of range")).into()
    }
}

/// An error that has not been placed in the interpreter's error slot yet.
///
/// Carries the error kind and an optional message. Converted into the
/// (singleton, message-string) pair when the eval loop records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleException {
    exc_type: ExcType,
    message: Option<String>,
}

impl SimpleException {
    /// Creates a new exception with the given type and optional message.
    #[must_use]
    pub fn new(exc_type: ExcType, message: Option<String>) -> Self {
        Self { exc_type, message }
    }

    /// Creates a new exception with the given type and message.
    #[must_use]
    pub fn new_msg(exc_type: ExcType, message: impl fmt::Display) -> Self {
        Self {
            exc_type,
            message: Some(message.to_string()),
        }
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn into_message(self) -> Option<String> {
        self.message
    }
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.exc_type),
            None => write!(f, "{}", self.exc_type),
        }
    }
}

/// Runtime error types that can occur during execution.
///
/// Two variants:
/// - `Exc`: an error that still needs to be recorded in the error slot
/// - `Propagated`: the error slot is already populated (e.g. by a nested frame
///   or a native function that called `set_error`), nothing more to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunError {
    Exc(SimpleException),
    Propagated,
}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(exc)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn exc_type_names_round_trip_through_strum() {
        for exc_type in ExcType::iter() {
            let name: &'static str = exc_type.into();
            assert_eq!(ExcType::from_str(name), Ok(exc_type));
        }
    }

    #[test]
    fn helper_constructors_use_stock_messages() {
        let RunError::Exc(exc) = ExcType::badarg() else {
            panic!("expected Exc");
        };
        assert_eq!(exc.exc_type(), ExcType::TypeError);
        assert_eq!(exc.message(), Some("illegal argument type for built-in operation"));

        let RunError::Exc(exc) = ExcType::nomem() else {
            panic!("expected Exc");
        };
        assert_eq!(exc.to_string(), "MemoryError");
    }
}
