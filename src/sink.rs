use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Where keystrokes go: an OS input backend, an in-memory editor, or a
/// decorator around either.
pub trait KeystrokeSink: Send {
    fn emit(&mut self, text: &str) -> Result<()>;
    fn backspace(&mut self, count: usize) -> Result<()>;
    fn cursor_left(&mut self, count: usize) -> Result<()>;
    fn cursor_right(&mut self, count: usize) -> Result<()>;
}

impl<S: KeystrokeSink + ?Sized> KeystrokeSink for Box<S> {
    fn emit(&mut self, text: &str) -> Result<()> {
        (**self).emit(text)
    }

    fn backspace(&mut self, count: usize) -> Result<()> {
        (**self).backspace(count)
    }

    fn cursor_left(&mut self, count: usize) -> Result<()> {
        (**self).cursor_left(count)
    }

    fn cursor_right(&mut self, count: usize) -> Result<()> {
        (**self).cursor_right(count)
    }
}

/// A keystroke sink with a single writer at a time.
///
/// Forward typing and corrections both hold the lock for the whole of an
/// operation, so their keystrokes never interleave.
#[derive(Debug, Default)]
pub struct SharedSink<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeystrokeSink> SharedSink<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, S>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("keystroke sink lock poisoned"))
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
        let mut sink = self.lock()?;
        f(&mut *sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Typing,
    Paused,
    Correcting,
    Completed,
    Stopped,
    Failed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Typing => "typing",
            SessionStatus::Paused => "paused",
            SessionStatus::Correcting => "correcting",
            SessionStatus::Completed => "completed",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Failed => "failed",
        }
    }
}

pub trait ProgressSink: Send {
    fn on_progress(
        &mut self,
        chars_typed: usize,
        total_chars: usize,
        current_wpm: u32,
        status: SessionStatus,
    );
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize, u32, SessionStatus) + Send,
{
    fn on_progress(
        &mut self,
        chars_typed: usize,
        total_chars: usize,
        current_wpm: u32,
        status: SessionStatus,
    ) {
        self(chars_typed, total_chars, current_wpm, status)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _: usize, _: usize, _: u32, _: SessionStatus) {}
}
