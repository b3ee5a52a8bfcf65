use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Receives snippet output as it is produced.
///
/// `line` gets each line of a child process's combined stdout/stderr without
/// its terminator. `notice` gets messages about the run itself (headers,
/// skipped snippets, failures).
pub trait OutputSink {
    fn line(&mut self, line: &str);

    fn notice(&mut self, notice: &str) {
        self.line(notice);
    }
}

impl<F: FnMut(&str)> OutputSink for F {
    fn line(&mut self, line: &str) {
        self(line)
    }
}

/// Sink that writes output lines to one writer and notices to another.
pub struct WriterSink<O: Write, E: Write> {
    out: O,
    err: E,
}

impl<O: Write, E: Write> WriterSink<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }
}

impl WriterSink<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> OutputSink for WriterSink<O, E> {
    fn line(&mut self, line: &str) {
        // A closed terminal is no reason to abort the snippet.
        let _ = writeln!(self.out, "{}", line).and_then(|_| self.out.flush());
    }

    fn notice(&mut self, notice: &str) {
        let _ = writeln!(self.err, "{}", notice).and_then(|_| self.err.flush());
    }
}

/// Memory-backed sink for capturing output in tests and embedders.
#[derive(Default)]
pub struct MemSink {
    lines: Rc<RefCell<Vec<String>>>,
    notices: Rc<RefCell<Vec<String>>>,
}

/// Shared view into what a [`MemSink`] collected.
#[derive(Clone)]
pub struct MemHandle {
    lines: Rc<RefCell<Vec<String>>>,
    notices: Rc<RefCell<Vec<String>>>,
}

impl MemHandle {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.borrow().clone()
    }
}

impl MemSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: create sink and return (sink, handle).
    pub fn with_handle() -> (Self, MemHandle) {
        let sink = MemSink::new();
        let handle = MemHandle {
            lines: sink.lines.clone(),
            notices: sink.notices.clone(),
        };
        (sink, handle)
    }
}

impl OutputSink for MemSink {
    fn line(&mut self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }

    fn notice(&mut self, notice: &str) {
        self.notices.borrow_mut().push(notice.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_sink_splits_lines_and_notices() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        {
            let mut sink = WriterSink::new(&mut out, &mut err);
            sink.line("hello");
            sink.notice("> Running: x");
            sink.line("world");
        }
        assert_eq!(String::from_utf8(out).unwrap(), "hello\nworld\n");
        assert_eq!(String::from_utf8(err).unwrap(), "> Running: x\n");
    }

    #[test]
    fn test_closure_sink_receives_notices_as_lines() {
        let mut seen = Vec::new();
        {
            let mut sink = |line: &str| seen.push(line.to_string());
            sink.line("a");
            sink.notice("b");
        }
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[test]
    fn test_mem_sink_handle() {
        let (mut sink, handle) = MemSink::with_handle();
        sink.line("out");
        sink.notice("note");
        assert_eq!(handle.lines(), vec!["out"]);
        assert_eq!(handle.notices(), vec!["note"]);
    }
}
