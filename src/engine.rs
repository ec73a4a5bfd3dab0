use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::FeatureFlags;
use crate::control::SessionControl;
use crate::delay::{compute_delay, TypingSessionState};
use crate::error::SessionError;
use crate::model::{KeyEvent, Transcript};
use crate::profile::TypingProfile;
use crate::sink::{KeystrokeSink, ProgressSink, SessionStatus, SharedSink};
use crate::typo::{
    decide_typo, simulate_correction_behavior, CorrectionGuarantee, CorrectionQueue,
    PendingCorrection, TypoDecision, TypoEvent,
};

/// Interval at which pending delayed corrections are checked, measured from
/// session start.
pub const CORRECTION_TICK: Duration = Duration::from_millis(500);

// Time between typing a wrong key and backspacing it.
const REACTION_SECS: (f64, f64) = (0.1, 0.3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Stopped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Source characters processed.
    pub chars_typed: usize,
    pub total_chars: usize,
    pub elapsed: Duration,
    pub transcript: Transcript,
}

/// The collaborators a session talks to while it runs.
pub struct EngineContext<'a, S> {
    pub sink: &'a SharedSink<S>,
    pub progress: &'a mut dyn ProgressSink,
    pub clock: &'a dyn Clock,
    pub control: &'a SessionControl,
}

enum Halt {
    Stopped,
    Failed(anyhow::Error),
}

impl From<anyhow::Error> for Halt {
    fn from(err: anyhow::Error) -> Self {
        Halt::Failed(err)
    }
}

type Step<T = ()> = std::result::Result<T, Halt>;

/// Type `text` into the sink with human-like timing, typos and corrections.
///
/// Runs on the calling thread until the text is done, the session is
/// stopped, or the sink fails. Never panics on sink errors; they end the
/// session with [`SessionOutcome::Failed`].
pub fn type_text<S: KeystrokeSink, R: Rng>(
    text: &str,
    profile: &TypingProfile,
    flags: &FeatureFlags,
    cx: EngineContext<'_, S>,
    rng: R,
) -> SessionReport {
    let started_at = cx.clock.now();
    let engine = Engine {
        profile: profile.clone(),
        flags,
        sink: cx.sink,
        progress: cx.progress,
        clock: cx.clock,
        control: cx.control,
        rng,
        state: TypingSessionState::new(),
        queue: CorrectionQueue::new(),
        transcript: Transcript::new(profile.clone()),
        buffer_len: 0,
        chars_typed: 0,
        total: text.chars().count(),
        started_at,
        next_tick: CORRECTION_TICK,
    };
    engine.run(text)
}

struct Engine<'a, S, R> {
    profile: TypingProfile,
    flags: &'a FeatureFlags,
    sink: &'a SharedSink<S>,
    progress: &'a mut dyn ProgressSink,
    clock: &'a dyn Clock,
    control: &'a SessionControl,
    rng: R,
    state: TypingSessionState,
    queue: CorrectionQueue,
    transcript: Transcript,
    /// Characters currently in the target buffer; the cursor sits at the end
    /// between operations.
    buffer_len: usize,
    chars_typed: usize,
    total: usize,
    started_at: Duration,
    /// Session time of the next correction check.
    next_tick: Duration,
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl<'a, S: KeystrokeSink, R: Rng> Engine<'a, S, R> {
    fn run(mut self, text: &str) -> SessionReport {
        info!(
            chars = self.total,
            wpm = self.profile.target_wpm,
            category = self.profile.category.as_str(),
            typos = self.flags.typos_enabled,
            delayed = self.flags.delayed_correction,
            "typing session started"
        );

        let chars: Vec<char> = text.chars().collect();
        let outcome = match self.type_all(&chars) {
            Ok(()) => {
                self.report(SessionStatus::Completed);
                info!(
                    chars = self.chars_typed,
                    elapsed_ms = millis(self.elapsed()),
                    "typing session completed"
                );
                SessionOutcome::Completed
            }
            Err(Halt::Stopped) => {
                let dropped = self.queue.len();
                self.queue.clear();
                self.report(SessionStatus::Stopped);
                info!(
                    chars = self.chars_typed,
                    dropped_corrections = dropped,
                    "typing session stopped"
                );
                SessionOutcome::Stopped
            }
            Err(Halt::Failed(err)) => {
                self.queue.clear();
                let err = SessionError::Sink(err);
                warn!(error = %err, chars = self.chars_typed, "typing session failed");
                self.report(SessionStatus::Failed);
                SessionOutcome::Failed(err.to_string())
            }
        };

        SessionReport {
            outcome,
            chars_typed: self.chars_typed,
            total_chars: self.total,
            elapsed: self.elapsed(),
            transcript: self.transcript,
        }
    }

    fn type_all(&mut self, chars: &[char]) -> Step {
        for i in 0..chars.len() {
            self.checkpoint()?;
            self.type_char(chars, i)?;
        }

        // Typos still waiting get their turn before the session ends.
        while !self.queue.is_empty() {
            self.checkpoint()?;
            self.wait(CORRECTION_TICK)?;
        }
        Ok(())
    }

    fn type_char(&mut self, chars: &[char], i: usize) -> Step {
        let c = chars[i];
        let prev = i.checked_sub(1).map(|j| chars[j]);
        let next = chars.get(i + 1).copied();

        let delay = compute_delay(
            &self.profile,
            &mut self.state,
            c,
            prev,
            i,
            self.total,
            &mut self.rng,
        );
        // Delays are gaps between keystrokes; the first key goes out at once.
        let wait = if i == 0 {
            Duration::ZERO
        } else {
            secs_to_duration(delay.secs)
        };
        self.wait(wait)?;

        let decision = if self.flags.typos_enabled {
            decide_typo(c, next, &self.profile, &mut self.rng)
        } else {
            TypoDecision {
                emit: c.to_string(),
                pattern: None,
            }
        };

        let buffer_start = self.buffer_len;
        let sink = self.sink;
        {
            let mut out = sink.lock()?;
            self.send(
                &mut out,
                KeyEvent::Emit {
                    text: decision.emit.clone(),
                    delay_ms: millis(wait),
                    typo: decision.is_typo(),
                },
            )?;
        }
        self.buffer_len += decision.emit.chars().count();

        if let Some(pattern) = decision.pattern {
            let event = TypoEvent {
                position: i,
                original_char: c,
                typo_text: decision.emit,
                pattern,
                timestamp: self.elapsed(),
                corrected: false,
            };
            debug!(position = i, ?pattern, typed = %event.typo_text, "typo");
            self.transcript.typos.push(event.clone());

            if self.flags.delayed_correction {
                self.queue.push(event, buffer_start);
            } else {
                self.correct_now(event)?;
            }
        }

        self.chars_typed = i + 1;
        self.report(SessionStatus::Typing);
        Ok(())
    }

    /// Backspace over a typo that was just made and retype the right key.
    fn correct_now(&mut self, event: TypoEvent) -> Step {
        let reaction = self.rng.gen_range(REACTION_SECS.0..=REACTION_SECS.1);
        self.wait(secs_to_duration(reaction))?;

        if !self.should_correct(0) {
            debug!(position = event.position, "typo left in place");
            return Ok(());
        }

        self.report(SessionStatus::Correcting);
        let k = event.typo_len();
        let sink = self.sink;
        {
            let mut out = sink.lock()?;
            if k > 0 {
                self.send(&mut out, KeyEvent::Backspace { count: k })?;
            }
            self.send(
                &mut out,
                KeyEvent::Retype {
                    text: event.original_char.to_string(),
                },
            )?;
        }
        self.buffer_len = self.buffer_len - k + 1;
        self.mark_corrected(event.position);
        debug!(position = event.position, "typo corrected immediately");
        Ok(())
    }

    /// Walk back to an earlier typo, fix it, and return to the end.
    fn correct_delayed(&mut self, p: PendingCorrection) -> Step {
        let back = self.buffer_len.saturating_sub(p.buffer_end());
        if !self.should_correct(back) {
            debug!(position = p.event.position, chars_since = back, "typo left in place");
            return Ok(());
        }

        self.report(SessionStatus::Correcting);
        let k = p.event.typo_len();
        let sink = self.sink;
        {
            // Held for the whole sequence so nothing lands mid-correction.
            let mut out = sink.lock()?;
            if back > 0 {
                self.send(&mut out, KeyEvent::CursorLeft { count: back })?;
            }
            if k > 0 {
                self.send(&mut out, KeyEvent::Backspace { count: k })?;
            }
            self.send(
                &mut out,
                KeyEvent::Retype {
                    text: p.event.original_char.to_string(),
                },
            )?;
            if back > 0 {
                self.send(&mut out, KeyEvent::CursorRight { count: back })?;
            }
        }

        let delta = 1 - k as isize;
        self.buffer_len = self.buffer_len - k + 1;
        self.queue.shift_after(&p, delta);
        self.mark_corrected(p.event.position);
        debug!(
            position = p.event.position,
            back,
            pending = self.queue.len(),
            "delayed typo corrected"
        );
        Ok(())
    }

    fn run_tick(&mut self, now: Duration) -> Step {
        let due = self.queue.take_due(
            now,
            self.flags.correction_delay(),
            self.flags.correction_mode,
        );
        for p in due {
            if self.control.is_stopped() {
                return Err(Halt::Stopped);
            }
            self.correct_delayed(p)?;
        }
        Ok(())
    }

    /// Let `dur` of session time pass, running correction ticks that fall
    /// inside it.
    fn wait(&mut self, dur: Duration) -> Step {
        let deadline = self.elapsed() + dur;
        loop {
            let now = self.elapsed();
            if self.flags.delayed_correction && now >= self.next_tick {
                while self.next_tick <= now {
                    self.next_tick += CORRECTION_TICK;
                }
                self.run_tick(now)?;
                continue;
            }
            if now >= deadline {
                return Ok(());
            }

            let until = if self.flags.delayed_correction {
                deadline.min(self.next_tick)
            } else {
                deadline
            };
            self.clock.sleep(until - now, self.control);
            if self.control.is_stopped() {
                return Err(Halt::Stopped);
            }
        }
    }

    fn checkpoint(&mut self) -> Step {
        if self.control.is_stopped() {
            return Err(Halt::Stopped);
        }
        if self.control.is_paused() {
            self.report(SessionStatus::Paused);
            debug!(chars = self.chars_typed, "paused");
            if !self.control.wait_while_paused() {
                return Err(Halt::Stopped);
            }
            debug!("resumed");
        }
        Ok(())
    }

    fn should_correct(&mut self, chars_since: usize) -> bool {
        match self.flags.correction_guarantee {
            CorrectionGuarantee::Guaranteed => true,
            CorrectionGuarantee::Probabilistic => {
                simulate_correction_behavior(chars_since, &mut self.rng)
            }
        }
    }

    fn send(&mut self, out: &mut S, event: KeyEvent) -> Step {
        match &event {
            KeyEvent::Emit { text, .. } | KeyEvent::Retype { text } => {
                if !text.is_empty() {
                    out.emit(text)?;
                }
            }
            KeyEvent::Backspace { count } => out.backspace(*count)?,
            KeyEvent::CursorLeft { count } => out.cursor_left(*count)?,
            KeyEvent::CursorRight { count } => out.cursor_right(*count)?,
        }
        let at_ms = millis(self.elapsed());
        self.transcript.push(at_ms, event);
        Ok(())
    }

    fn mark_corrected(&mut self, position: usize) {
        if let Some(t) = self
            .transcript
            .typos
            .iter_mut()
            .rev()
            .find(|t| t.position == position)
        {
            t.corrected = true;
        }
    }

    fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started_at)
    }

    fn current_wpm(&self) -> u32 {
        let minutes = self.elapsed().as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return 0;
        }
        (self.chars_typed as f64 / 5.0 / minutes).round() as u32
    }

    fn report(&mut self, status: SessionStatus) {
        let wpm = self.current_wpm();
        self.progress
            .on_progress(self.chars_typed, self.total, wpm, status);
    }
}
