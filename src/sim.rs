use anyhow::{bail, Result};

use crate::sink::KeystrokeSink;

/// One call received by a [`BufferSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOp {
    Emit(String),
    Backspace(usize),
    CursorLeft(usize),
    CursorRight(usize),
}

/// An in-memory text field: a character buffer with a cursor.
///
/// Applies keystrokes the way a plain editor would and keeps a log of every
/// call it received. Intended for tests, dry runs and debugging.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    buf: Vec<char>,
    cursor: usize,
    ops: Vec<SinkOp>,
    fail_after: Option<usize>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every call after the first `calls` succeed.
    pub fn failing_after(calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            ..Self::default()
        }
    }

    pub fn text(&self) -> String {
        self.buf.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The `n` characters left of the cursor, or fewer at the start.
    pub fn before_cursor(&self, n: usize) -> String {
        self.buf[self.cursor.saturating_sub(n)..self.cursor]
            .iter()
            .collect()
    }

    pub fn ops(&self) -> &[SinkOp] {
        &self.ops
    }

    pub fn emit_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SinkOp::Emit(_)))
            .count()
    }

    fn record(&mut self, op: SinkOp) -> Result<()> {
        if let Some(limit) = self.fail_after {
            if self.ops.len() >= limit {
                bail!("simulated sink failure after {limit} calls");
            }
        }
        self.ops.push(op);
        Ok(())
    }
}

impl KeystrokeSink for BufferSink {
    fn emit(&mut self, text: &str) -> Result<()> {
        self.record(SinkOp::Emit(text.to_string()))?;
        for c in text.chars() {
            self.buf.insert(self.cursor, c);
            self.cursor += 1;
        }
        Ok(())
    }

    fn backspace(&mut self, count: usize) -> Result<()> {
        self.record(SinkOp::Backspace(count))?;
        let n = count.min(self.cursor);
        self.buf.drain(self.cursor - n..self.cursor);
        self.cursor -= n;
        Ok(())
    }

    fn cursor_left(&mut self, count: usize) -> Result<()> {
        self.record(SinkOp::CursorLeft(count))?;
        self.cursor = self.cursor.saturating_sub(count);
        Ok(())
    }

    fn cursor_right(&mut self, count: usize) -> Result<()> {
        self.record(SinkOp::CursorRight(count))?;
        self.cursor = (self.cursor + count).min(self.buf.len());
        Ok(())
    }
}
