use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{validate_profile, FeatureFlags};
use crate::control::SessionControl;
use crate::engine::{type_text, EngineContext, SessionReport};
use crate::error::SessionError;
use crate::profile::ProfileSource;
use crate::sink::{KeystrokeSink, NoProgress, ProgressSink, SharedSink};

/// How a session should type, apart from what and where.
pub struct SessionOptions {
    pub profile: ProfileSource,
    pub flags: FeatureFlags,
    /// Fixed seed for reproducible runs; drawn from entropy when unset.
    pub seed: Option<u64>,
    pub clock: Arc<dyn Clock>,
    pub progress: Box<dyn ProgressSink>,
    /// Signals for the session; pass a clone in to control it from elsewhere.
    pub control: SessionControl,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            profile: ProfileSource::Wpm(60),
            flags: FeatureFlags::default(),
            seed: None,
            clock: Arc::new(SystemClock::new()),
            progress: Box::new(NoProgress),
            control: SessionControl::new(),
        }
    }
}

/// A session running on its own thread.
pub struct TypingSession {
    control: SessionControl,
    handle: Option<JoinHandle<SessionReport>>,
}

impl TypingSession {
    pub fn start<S>(
        text: &str,
        options: SessionOptions,
        sink: SharedSink<S>,
    ) -> Result<Self, SessionError>
    where
        S: KeystrokeSink + 'static,
    {
        options.flags.validate().map_err(SessionError::InvalidConfig)?;
        let profile = options.profile.resolve();
        validate_profile(&profile).map_err(SessionError::InvalidConfig)?;

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let control = options.control;
        let thread_control = control.clone();
        let text = text.to_string();
        let flags = options.flags;
        let clock = options.clock;
        let mut progress = options.progress;

        let handle = thread::Builder::new()
            .name("slywriter-session".to_string())
            .spawn(move || {
                let cx = EngineContext {
                    sink: &sink,
                    progress: progress.as_mut(),
                    clock: clock.as_ref(),
                    control: &thread_control,
                };
                type_text(&text, &profile, &flags, cx, rng)
            })?;

        Ok(Self {
            control,
            handle: Some(handle),
        })
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the session ends.
    pub fn wait(mut self) -> Result<SessionReport, SessionError> {
        let handle = self.handle.take().ok_or(SessionError::Panicked)?;
        handle.join().map_err(|_| SessionError::Panicked)
    }
}

impl Drop for TypingSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("session handle dropped, stopping");
            self.control.stop();
        }
    }
}

/// Controller that allows one active session at a time.
#[derive(Default)]
pub struct Typist {
    current: Option<TypingSession>,
}

impl Typist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|s| !s.is_finished())
    }

    pub fn start<S>(
        &mut self,
        text: &str,
        options: SessionOptions,
        sink: SharedSink<S>,
    ) -> Result<(), SessionError>
    where
        S: KeystrokeSink + 'static,
    {
        if self.is_active() {
            return Err(SessionError::AlreadyActive);
        }
        if let Some(previous) = self.current.take() {
            match previous.wait() {
                Ok(report) => info!(
                    outcome = ?report.outcome,
                    chars = report.chars_typed,
                    "previous session was never waited on"
                ),
                Err(err) => warn!(error = %err, "previous session ended abnormally"),
            }
        }
        self.current = Some(TypingSession::start(text, options, sink)?);
        Ok(())
    }

    pub fn pause(&self) {
        if let Some(s) = &self.current {
            s.pause();
        }
    }

    pub fn resume(&self) {
        if let Some(s) = &self.current {
            s.resume();
        }
    }

    pub fn stop(&self) {
        if let Some(s) = &self.current {
            s.stop();
        }
    }

    /// Block until the current session ends and return its report.
    pub fn wait(&mut self) -> Option<Result<SessionReport, SessionError>> {
        self.current.take().map(TypingSession::wait)
    }
}
