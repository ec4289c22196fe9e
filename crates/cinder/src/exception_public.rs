use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exception_private::{ExcType, SimpleException};

/// One traceback entry: the code's filename and the line the frame was executing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackFrame {
    pub filename: String,
    pub line: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  `{}:{}':", self.filename, self.line)
    }
}

/// An unhandled runtime error, detached from the interpreter.
///
/// Built from the interpreter's error slot and current traceback by
/// `Interpreter::take_exception`. The heap objects are rendered to text, so the
/// value outlives the interpreter that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exception {
    /// Set when the exception object is one of the interpreter's error singletons.
    exc_type: Option<ExcType>,
    /// Rendered exception object.
    exc: String,
    /// Rendered associated value, absent when it was None.
    message: Option<String>,
    /// Traceback entries, outermost frame first.
    traceback: Vec<StackFrame>,
}

impl Exception {
    pub(crate) fn new(exc_type: Option<ExcType>, exc: String, message: Option<String>, traceback: Vec<StackFrame>) -> Self {
        Self {
            exc_type,
            exc,
            message,
            traceback,
        }
    }

    /// Returns the error type if the exception is a stock runtime error.
    #[must_use]
    pub fn exc_type(&self) -> Option<ExcType> {
        self.exc_type
    }

    /// The rendered exception object, e.g. `type error`.
    #[must_use]
    pub fn exc(&self) -> &str {
        &self.exc
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn traceback(&self) -> &[StackFrame] {
        &self.traceback
    }

    /// Consumes the exception, returning its message.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.message
    }

    /// Renders the exception line without the traceback: `exc: message` or just `exc`.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.message {
            Some(msg) => format!("{}: {msg}", self.exc),
            None => self.exc.clone(),
        }
    }
}

impl From<SimpleException> for Exception {
    fn from(exc: SimpleException) -> Self {
        let exc_type = exc.exc_type();
        Self::new(
            Some(exc_type),
            exc_type.singleton_text().to_owned(),
            exc.into_message(),
            Vec::new(),
        )
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.traceback.is_empty() {
            writeln!(f, "Traceback (innermost last):")?;
            for frame in &self.traceback {
                writeln!(f, "{frame}")?;
            }
        }
        write!(f, "{}", self.summary())
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn display_includes_traceback_header() {
        let exc = Exception::new(
            Some(ExcType::NameError),
            "undefined name".to_owned(),
            Some("spam".to_owned()),
            vec![
                StackFrame {
                    filename: "main.py".to_owned(),
                    line: 3,
                },
                StackFrame {
                    filename: "lib.py".to_owned(),
                    line: 10,
                },
            ],
        );
        assert_eq!(
            exc.to_string(),
            "Traceback (innermost last):\n  `main.py:3':\n  `lib.py:10':\nundefined name: spam"
        );
    }

    #[test]
    fn simple_exception_converts_to_singleton_text() {
        let exc: Exception = SimpleException::new(ExcType::MemoryError, None).into();
        assert_eq!(exc.to_string(), "out of memory");
        assert_eq!(exc.exc_type(), Some(ExcType::MemoryError));
    }
}
