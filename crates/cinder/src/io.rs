use std::io::{self, Write as _};

use crate::exception_public::Exception;

/// Sink for text the interpreter or a host reports: tracebacks and results.
pub trait PrintWriter {
    fn write_text(&mut self, text: &str) -> Result<(), Exception>;

    fn write_line(&mut self, line: &str) -> Result<(), Exception> {
        self.write_text(line)?;
        self.write_text("\n")
    }
}

/// Buffers text and writes it to stdout when dropped.
#[derive(Debug, Default)]
pub struct StdPrint {
    buffer: String,
}

impl PrintWriter for StdPrint {
    fn write_text(&mut self, text: &str) -> Result<(), Exception> {
        self.buffer.push_str(text);
        Ok(())
    }
}

impl Drop for StdPrint {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(self.buffer.as_bytes()).and_then(|()| stdout.flush());
        }
    }
}

/// Keeps everything written in memory.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn write_text(&mut self, text: &str) -> Result<(), Exception> {
        self.0.push_str(text);
        Ok(())
    }
}
