use anyhow::Result;

use crate::sim::BufferSink;
use crate::sink::KeystrokeSink;

// Forward typing is reported in chunks of about this many characters.
const RUN_FLUSH_CHARS: usize = 60;

#[derive(Debug, Default, Clone)]
struct CorrectionState {
    deleted: String,
    inserted: String,
}

/// Sink decorator that narrates what is being typed as `Typing "..."` and
/// `Replace "..." with "..."` lines, optionally echoing them to stderr.
#[derive(Debug)]
pub struct ConsoleTrace<S> {
    inner: S,
    mirror: BufferSink,
    typing_run: String,
    correction: Option<CorrectionState>,
    pending_lines: Vec<String>,
    echo: bool,
}

impl<S: KeystrokeSink> ConsoleTrace<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            mirror: BufferSink::new(),
            typing_run: String::new(),
            correction: None,
            pending_lines: Vec::new(),
            echo: false,
        }
    }

    /// Print each line to stderr as soon as it is complete.
    pub fn echo(mut self, on: bool) -> Self {
        self.echo = on;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn drain_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_lines)
    }

    pub fn finish(&mut self) -> Vec<String> {
        self.finish_correction();
        self.flush_typing_run();
        self.drain_lines()
    }

    fn push_line(&mut self, line: String) {
        if self.echo {
            print_trace_line(&line);
        }
        self.pending_lines.push(line);
    }

    fn flush_typing_run(&mut self) {
        if self.typing_run.is_empty() {
            return;
        }
        let run = std::mem::take(&mut self.typing_run);
        self.push_line(format!("Typing \"{}\"...", escape_for_log(&run)));
    }

    fn ensure_correction(&mut self) -> &mut CorrectionState {
        if self.correction.is_none() {
            self.flush_typing_run();
        }
        self.correction.get_or_insert_with(CorrectionState::default)
    }

    fn finish_correction(&mut self) {
        let Some(correction) = self.correction.take() else {
            return;
        };
        let line = if correction.deleted.is_empty() {
            format!("Insert \"{}\"...", escape_for_log(&correction.inserted))
        } else {
            format!(
                "Replace \"{}\" with \"{}\"...",
                escape_for_log(&correction.deleted),
                escape_for_log(&correction.inserted)
            )
        };
        self.push_line(line);
    }
}

impl<S: KeystrokeSink> KeystrokeSink for ConsoleTrace<S> {
    fn emit(&mut self, text: &str) -> Result<()> {
        self.inner.emit(text)?;
        self.mirror.emit(text)?;

        // The first text after a backspace or cursor move is the fix itself.
        if let Some(correction) = &mut self.correction {
            correction.inserted.push_str(text);
            self.finish_correction();
            return Ok(());
        }

        self.typing_run.push_str(text);
        if self.typing_run.ends_with('\n')
            || self.typing_run.chars().count() >= RUN_FLUSH_CHARS
        {
            self.flush_typing_run();
        }
        Ok(())
    }

    fn backspace(&mut self, count: usize) -> Result<()> {
        self.inner.backspace(count)?;
        let deleted = self.mirror.before_cursor(count);
        self.ensure_correction().deleted.insert_str(0, &deleted);
        self.mirror.backspace(count)
    }

    fn cursor_left(&mut self, count: usize) -> Result<()> {
        self.inner.cursor_left(count)?;
        self.ensure_correction();
        self.mirror.cursor_left(count)
    }

    fn cursor_right(&mut self, count: usize) -> Result<()> {
        self.inner.cursor_right(count)?;
        self.finish_correction();
        self.mirror.cursor_right(count)
    }
}

pub fn print_trace_line(line: &str) {
    const RESET: &str = "\x1b[0m";
    const TYPING: &str = "\x1b[34m";
    const REPLACE: &str = "\x1b[33m";

    if let Some(rest) = line.strip_prefix("Typing") {
        eprintln!("{TYPING}Typing{RESET}{rest}");
    } else if let Some(rest) = line.strip_prefix("Replace") {
        eprintln!("{REPLACE}Replace{RESET}{rest}");
    } else if let Some(rest) = line.strip_prefix("Insert") {
        eprintln!("{REPLACE}Insert{RESET}{rest}");
    } else {
        eprintln!("{line}");
    }
}

fn escape_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn traced() -> ConsoleTrace<BufferSink> {
        ConsoleTrace::new(BufferSink::new())
    }

    #[test]
    fn immediate_fix_at_the_end_is_a_replace() -> Result<()> {
        let mut t = traced();
        t.emit("h")?;
        t.emit("r")?;
        t.backspace(1)?;
        t.emit("e")?;
        t.emit("y")?;

        assert_eq!(t.inner().text(), "hey");
        assert_eq!(
            t.finish(),
            vec![
                "Typing \"hr\"...".to_string(),
                "Replace \"r\" with \"e\"...".to_string(),
                "Typing \"y\"...".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn delayed_fix_reports_the_replaced_text() -> Result<()> {
        let mut t = traced();
        t.emit("hello wurld")?;
        t.cursor_left(3)?;
        t.backspace(1)?;
        t.emit("o")?;
        t.cursor_right(3)?;
        t.emit(".\n")?;

        assert_eq!(t.inner().text(), "hello world.\n");
        assert_eq!(
            t.drain_lines(),
            vec![
                "Typing \"hello wurld\"...".to_string(),
                "Replace \"u\" with \"o\"...".to_string(),
                "Typing \".\\n\"...".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn dropped_character_is_reported_as_an_insert() -> Result<()> {
        let mut t = traced();
        t.emit("helo")?;
        t.cursor_left(1)?;
        t.emit("l")?;
        t.cursor_right(1)?;

        assert_eq!(t.inner().text(), "hello");
        assert_eq!(
            t.finish(),
            vec![
                "Typing \"helo\"...".to_string(),
                "Insert \"l\"...".to_string(),
            ]
        );
        Ok(())
    }
}
