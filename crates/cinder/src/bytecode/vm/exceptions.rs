//! The current-error slot and tracebacks.

use super::Interpreter;
use crate::{
    exception_private::{ExcType, RunError},
    exception_public::{Exception, StackFrame},
    heap::{DropWithHeap, HeapData},
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::VmTracer,
    types::{Str, Traceback},
    value::Value,
};

impl<T: ResourceTracker, Tr: VmTracer> Interpreter<T, Tr> {
    /// Writes an internal error into the slot. `Propagated` means it is already there.
    pub(super) fn record_error(&mut self, err: RunError) {
        match err {
            RunError::Exc(exc) => {
                let exc_type = exc.exc_type();
                match exc.into_message() {
                    Some(message) => self.set_error_string(exc_type, &message),
                    None => self.set_error(exc_type),
                }
            }
            RunError::Propagated => {}
        }
    }

    /// A new reference to the singleton for `exc_type`.
    pub(super) fn exception(&self, exc_type: ExcType) -> Value {
        let (_, exc) = self
            .exceptions
            .iter()
            .find(|(t, _)| *t == exc_type)
            .expect("every error type has a singleton");
        exc.clone_with_heap(&self.heap)
    }

    /// Raises `exc_type` with None as the associated value.
    pub fn set_error(&mut self, exc_type: ExcType) {
        let exc = self.exception(exc_type);
        let none = self.heap.none();
        self.set_error_value(exc, none);
    }

    /// Raises `exc` with `value`, consuming both. A previous error is released.
    pub fn set_error_value(&mut self, exc: Value, value: Value) {
        if let Some(previous) = self.error.replace((exc, value)) {
            previous.drop_with_heap(&mut self.heap);
        }
    }

    /// Raises `exc_type` with a string value. If the string cannot be
    /// allocated the value is None.
    pub fn set_error_string(&mut self, exc_type: ExcType, message: &str) {
        let exc = self.exception(exc_type);
        let value = self
            .heap
            .allocate_value(HeapData::Str(Str::from(message)))
            .unwrap_or_else(|_| self.heap.none());
        self.set_error_value(exc, value);
    }

    #[must_use]
    pub fn error_occurred(&self) -> bool {
        self.error.is_some()
    }

    /// The type of the current error, if it is one of the singletons.
    #[must_use]
    pub fn error_type(&self) -> Option<ExcType> {
        let (exc, _) = self.error.as_ref()?;
        self.exceptions
            .iter()
            .find(|(_, singleton)| singleton.is(exc))
            .map(|(exc_type, _)| *exc_type)
    }

    /// Removes the current error, handing the (exception, value) pair to the caller.
    pub fn take_error(&mut self) -> Option<(Value, Value)> {
        self.error.take()
    }

    /// Clears the error slot and the traceback.
    pub fn clear_error(&mut self) {
        self.error.take().drop_with_heap(&mut self.heap);
        self.traceback.take().drop_with_heap(&mut self.heap);
    }

    /// Prepends an entry for the current frame to the traceback.
    ///
    /// If the entry cannot be allocated the chain is left as it was.
    pub(super) fn push_traceback_entry(&mut self) {
        let frame = self.frame();
        let (frame, lineno) = (frame.frame.clone_with_heap(&self.heap), frame.lineno);
        let next = self.traceback.as_ref().map(|head| head.clone_with_heap(&self.heap));
        if let Ok(entry) = self
            .heap
            .allocate_value(HeapData::Traceback(Traceback::new(next, frame, lineno)))
            && let Some(previous) = self.traceback.replace(entry)
        {
            previous.drop_with_heap(&mut self.heap);
        }
    }

    /// Renders the traceback chain, head first.
    fn render_traceback(&self) -> Vec<StackFrame> {
        let mut frames = Vec::new();
        let mut cursor = self.traceback.as_ref().map(Value::id);
        while let Some(id) = cursor {
            let HeapData::Traceback(entry) = self.heap.get(id) else {
                break;
            };
            let filename = match self.heap.get(entry.frame().id()) {
                HeapData::Frame(frame) => match self.heap.get(frame.code().id()) {
                    HeapData::Code(code) => code.filename().to_string(),
                    _ => String::new(),
                },
                _ => String::new(),
            };
            frames.push(StackFrame {
                filename,
                line: entry.lineno(),
            });
            cursor = entry.next().map(Value::id);
        }
        frames
    }

    /// Removes the traceback, rendered head first.
    pub fn take_traceback(&mut self) -> Vec<StackFrame> {
        let frames = self.render_traceback();
        self.traceback.take().drop_with_heap(&mut self.heap);
        frames
    }

    /// Writes the traceback, if any, under a "Traceback (innermost last):" header.
    pub fn print_traceback(&self, writer: &mut impl PrintWriter) -> Result<(), Exception> {
        let frames = self.render_traceback();
        if frames.is_empty() {
            return Ok(());
        }
        writer.write_line("Traceback (innermost last):")?;
        for frame in frames {
            writer.write_line(&frame.to_string())?;
        }
        Ok(())
    }

    /// Detaches the current error and traceback as a host [`Exception`],
    /// clearing both. None if no error is set.
    pub fn take_exception(&mut self) -> Option<Exception> {
        let (exc, value) = self.error.take()?;
        let exc_type = self
            .exceptions
            .iter()
            .find(|(_, singleton)| singleton.is(&exc))
            .map(|(exc_type, _)| *exc_type);
        let text = self.to_object(&exc).to_string();
        let message = (!self.heap.is_none(value.id())).then(|| self.to_object(&value).to_string());
        let traceback = self.take_traceback();
        exc.drop_with_heap(&mut self.heap);
        value.drop_with_heap(&mut self.heap);
        Some(Exception::new(exc_type, text, message, traceback))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn raising_replaces_the_previous_error() {
        let mut interp = crate::Interpreter::new();
        interp.set_error_string(ExcType::TypeError, "first");
        interp.set_error(ExcType::NameError);
        assert_eq!(interp.error_type(), Some(ExcType::NameError));
        let exc = interp.take_exception().unwrap();
        assert_eq!(exc.exc(), "undefined name");
        assert_eq!(exc.message(), None);
        assert!(!interp.error_occurred());
    }

    #[test]
    fn foreign_exception_objects_have_no_type() {
        let mut interp = crate::Interpreter::new();
        let exc = interp.new_str("custom").unwrap();
        let value = interp.new_int(3).unwrap();
        interp.set_error_value(exc, value);
        assert_eq!(interp.error_type(), None);
        let exc = interp.take_exception().unwrap();
        assert_eq!(exc.summary(), "custom: 3");
    }
}
