//! Line-oriented input sources.
//!
//! The shell reads top-level command lines and heredoc body lines through
//! the same small trait so the interactive editor, piped stdin, and test
//! buffers are interchangeable.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::BufRead;

/// Result of asking the input source for one line. `Line` carries the text
/// without its terminating newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    Eof,
    Interrupted,
}

/// A provider of input lines. The prompt is advisory; non-interactive
/// sources ignore it.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Interactive source backed by the rustyline editor. Ctrl-C and Ctrl-D
/// surface as `Interrupted` and `Eof`; history lives in the editor.
pub struct InteractiveReader {
    editor: DefaultEditor,
}

impl InteractiveReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }

    /// Add a line to the editor history.
    pub fn remember(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }
}

impl LineReader for InteractiveReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err.into()),
        }
    }
}

/// Source over any buffered reader: piped stdin or an in-memory buffer in
/// tests. Never reports `Interrupted`.
pub struct BufferedReader<R: BufRead> {
    inner: R,
}

impl<R: BufRead> BufferedReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: BufRead> LineReader for BufferedReader<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome> {
        let mut line = String::new();
        if self.inner.read_line(&mut line)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(ReadOutcome::Line(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_buffered_reader_strips_newlines() {
        let mut reader = BufferedReader::new(Cursor::new("one\ntwo\r\nthree"));
        assert_eq!(
            reader.read_line("> ").unwrap(),
            ReadOutcome::Line("one".to_string())
        );
        assert_eq!(
            reader.read_line("> ").unwrap(),
            ReadOutcome::Line("two".to_string())
        );
        assert_eq!(
            reader.read_line("> ").unwrap(),
            ReadOutcome::Line("three".to_string())
        );
        assert_eq!(reader.read_line("> ").unwrap(), ReadOutcome::Eof);
    }

    #[test]
    fn test_buffered_reader_keeps_empty_lines() {
        let mut reader = BufferedReader::new(Cursor::new("\nx\n"));
        assert_eq!(
            reader.read_line("").unwrap(),
            ReadOutcome::Line(String::new())
        );
        assert_eq!(
            reader.read_line("").unwrap(),
            ReadOutcome::Line("x".to_string())
        );
        assert_eq!(reader.read_line("").unwrap(), ReadOutcome::Eof);
    }
}
