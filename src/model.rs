use serde::{Deserialize, Serialize};

use crate::profile::TypingProfile;
use crate::typo::TypoEvent;

pub const TRANSCRIPT_VERSION: u32 = 1;

/// Everything a session sent to its sink, in order, with session timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub version: u32,
    pub profile: TypingProfile,
    pub events: Vec<TimedEvent>,
    pub typos: Vec<TypoEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Milliseconds since the session started.
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: KeyEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyEvent {
    /// Forward typing. `delay_ms` is the wait that preceded it.
    Emit {
        text: String,
        delay_ms: u64,
        typo: bool,
    },
    /// Text typed as part of a correction.
    Retype { text: String },
    Backspace { count: usize },
    CursorLeft { count: usize },
    CursorRight { count: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscriptStats {
    pub events: usize,
    pub emitted_chars: usize,
    pub typos: usize,
    pub corrected_typos: usize,
    pub backspaces: usize,
    pub cursor_moves: usize,
    pub total_wait_ms: u64,
}

impl Transcript {
    pub fn new(profile: TypingProfile) -> Self {
        Self {
            version: TRANSCRIPT_VERSION,
            profile,
            events: Vec::new(),
            typos: Vec::new(),
        }
    }

    pub fn push(&mut self, at_ms: u64, event: KeyEvent) {
        self.events.push(TimedEvent { at_ms, event });
    }

    pub fn stats(&self) -> TranscriptStats {
        let mut out = TranscriptStats {
            events: self.events.len(),
            typos: self.typos.len(),
            corrected_typos: self.typos.iter().filter(|t| t.corrected).count(),
            ..Default::default()
        };

        for e in &self.events {
            match &e.event {
                KeyEvent::Emit { text, delay_ms, .. } => {
                    out.emitted_chars += text.chars().count();
                    out.total_wait_ms = out.total_wait_ms.saturating_add(*delay_ms);
                }
                KeyEvent::Retype { text } => out.emitted_chars += text.chars().count(),
                KeyEvent::Backspace { count } => out.backspaces += count,
                KeyEvent::CursorLeft { count } | KeyEvent::CursorRight { count } => {
                    out.cursor_moves += count
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::resolve_profile;
    use pretty_assertions::assert_eq;

    #[test]
    fn events_serialize_with_a_type_tag() {
        let e = TimedEvent {
            at_ms: 120,
            event: KeyEvent::Emit {
                text: "a".to_string(),
                delay_ms: 120,
                typo: false,
            },
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "at_ms": 120, "type": "emit", "text": "a", "delay_ms": 120, "typo": false })
        );
    }

    #[test]
    fn stats_tally_each_kind() {
        let mut t = Transcript::new(resolve_profile(60));
        t.push(100, KeyEvent::Emit { text: "s".into(), delay_ms: 100, typo: true });
        t.push(250, KeyEvent::Emit { text: "b".into(), delay_ms: 150, typo: false });
        t.push(2500, KeyEvent::CursorLeft { count: 1 });
        t.push(2550, KeyEvent::Backspace { count: 1 });
        t.push(2600, KeyEvent::Retype { text: "a".into() });
        t.push(2650, KeyEvent::CursorRight { count: 1 });

        assert_eq!(
            t.stats(),
            TranscriptStats {
                events: 6,
                emitted_chars: 3,
                typos: 0,
                corrected_typos: 0,
                backspaces: 1,
                cursor_moves: 2,
                total_wait_ms: 250,
            }
        );
    }
}
