use rand::Rng;

use crate::keyboard::{hand_for_char, Hand};
use crate::profile::TypingProfile;

pub const MIN_KEYSTROKE_DELAY_SECS: f64 = 0.01;

const FATIGUE_STEP: f64 = 0.05;
const FATIGUE_INTERVAL_CHARS: u64 = 100;
const WARMUP_CHARS: usize = 20;
const WORDS_PER_MINI_PAUSE: u64 = 10;
const BURST_CHANCE: f64 = 0.05;
const RHYTHM_STEP: f64 = 0.35;
const RHYTHM_AMPLITUDE: f64 = 0.04;

/// Running state threaded through every keystroke of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypingSessionState {
    pub chars_typed: u64,
    pub fatigue_level: f64,
    pub last_hand: Hand,
    pub rhythm_phase: f64,
    pub sentence_count: u64,
    pub word_count: u64,
}

impl TypingSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_char(&mut self) {
        self.chars_typed += 1;
        let steps = self.chars_typed / FATIGUE_INTERVAL_CHARS;
        self.fatigue_level = (FATIGUE_STEP * steps as f64).min(1.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Burst {
    Speed,
    Hesitation,
}

/// Each multiplier applied to the sampled base delay, in application order.
///
/// A factor that did not apply to this keystroke is `1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayFactors {
    pub fatigue: f64,
    pub same_hand: f64,
    pub bigram: f64,
    pub char_class: f64,
    pub warmup: f64,
    pub rush: f64,
    pub after_punctuation: f64,
    pub jitter: f64,
    pub rhythm: f64,
    pub burst: f64,
    pub word_boundary: f64,
}

impl Default for DelayFactors {
    fn default() -> Self {
        Self {
            fatigue: 1.0,
            same_hand: 1.0,
            bigram: 1.0,
            char_class: 1.0,
            warmup: 1.0,
            rush: 1.0,
            after_punctuation: 1.0,
            jitter: 1.0,
            rhythm: 1.0,
            burst: 1.0,
            word_boundary: 1.0,
        }
    }
}

impl DelayFactors {
    pub fn product(&self) -> f64 {
        self.fatigue
            * self.same_hand
            * self.bigram
            * self.char_class
            * self.warmup
            * self.rush
            * self.after_punctuation
            * self.jitter
            * self.rhythm
            * self.burst
            * self.word_boundary
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delay {
    pub secs: f64,
    /// The uniform draw from the profile's delay range, before any factor.
    pub base_secs: f64,
    pub factors: DelayFactors,
    pub burst: Option<Burst>,
    /// The delay was replaced by a sentence pause.
    pub sentence_pause: bool,
}

// Rolls that flow naturally on QWERTY.
const EASY_BIGRAMS: [&str; 28] = [
    "th", "he", "in", "er", "an", "re", "on", "en", "at", "es", "ti", "or", "st", "ar", "nd",
    "to", "nt", "is", "of", "it", "al", "as", "ha", "ng", "io", "le", "ou", "ea",
];

// Same-finger reaches and row jumps.
const HARD_BIGRAMS: [&str; 30] = [
    "qa", "aq", "az", "za", "ws", "sw", "sx", "xs", "ed", "de", "dc", "cd", "rf", "fr", "fv",
    "vf", "tg", "gt", "gb", "bg", "yh", "hy", "hn", "nh", "uj", "ju", "mj", "ki", "lo", "p;",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigramDifficulty {
    Easy,
    Hard,
    Neutral,
}

pub fn bigram_difficulty(prev: char, c: char) -> BigramDifficulty {
    let pair: String = [prev.to_ascii_lowercase(), c.to_ascii_lowercase()]
        .iter()
        .collect();
    let pair = pair.as_str();

    if EASY_BIGRAMS.contains(&pair) {
        BigramDifficulty::Easy
    } else if HARD_BIGRAMS.contains(&pair) {
        BigramDifficulty::Hard
    } else {
        BigramDifficulty::Neutral
    }
}

fn char_class_factor(c: char, rng: &mut impl Rng) -> f64 {
    if c.is_uppercase() {
        rng.gen_range(1.2..=1.4)
    } else if c.is_ascii_digit() {
        rng.gen_range(1.25..=1.5)
    } else if !c.is_alphanumeric() && !c.is_whitespace() {
        rng.gen_range(1.3..=1.6)
    } else {
        1.0
    }
}

pub fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_pause_punctuation(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ',' | ';' | ':')
}

/// Compute how long to wait before typing `c`, updating `state`.
///
/// `index` is the position of `c` in the source text and `total` the text's
/// length in characters.
pub fn compute_delay(
    profile: &TypingProfile,
    state: &mut TypingSessionState,
    c: char,
    prev: Option<char>,
    index: usize,
    total: usize,
    rng: &mut impl Rng,
) -> Delay {
    let base_secs = rng.gen_range(profile.min_delay_secs..=profile.max_delay_secs);
    let mut factors = DelayFactors {
        fatigue: 1.0 + state.fatigue_level * 0.3,
        ..Default::default()
    };
    state.record_char();

    let hand = hand_for_char(c);
    if hand != Hand::None && hand == state.last_hand {
        factors.same_hand = rng.gen_range(1.05..=1.15);
    }
    state.last_hand = hand;

    if let Some(prev) = prev {
        factors.bigram = match bigram_difficulty(prev, c) {
            BigramDifficulty::Easy => rng.gen_range(0.85..=0.95),
            BigramDifficulty::Hard => rng.gen_range(1.15..=1.35),
            BigramDifficulty::Neutral => 1.0,
        };
    }

    factors.char_class = char_class_factor(c, rng);

    if index < WARMUP_CHARS {
        factors.warmup = 1.3 - index as f64 * 0.015;
    }

    if total > 0 {
        let progress = index as f64 / total as f64;
        if progress > 0.8 {
            factors.rush = 0.9 - (progress - 0.8) * 0.3;
        }
    }

    if prev.is_some_and(is_pause_punctuation) {
        factors.after_punctuation = rng.gen_range(1.5..=2.5);
    }

    factors.jitter = rng.gen_range(0.85..=1.15);

    state.rhythm_phase += RHYTHM_STEP;
    factors.rhythm = 1.0 + RHYTHM_AMPLITUDE * state.rhythm_phase.sin();

    let mut burst = None;
    if rng.gen_bool(BURST_CHANCE) {
        if rng.gen_bool(profile.burst_variability.clamp(0.0, 1.0)) {
            factors.burst = rng.gen_range(0.5..=0.7);
            burst = Some(Burst::Speed);
        } else {
            factors.burst = rng.gen_range(1.5..=2.0);
            burst = Some(Burst::Hesitation);
        }
    }

    let mut sentence_pause = false;
    if is_sentence_end(c) {
        state.sentence_count += 1;
        let every = u64::from(profile.pause_frequency.max(1));
        sentence_pause = state.sentence_count % every == 0;
    }

    if c == ' ' {
        state.word_count += 1;
        factors.word_boundary = profile.word_pause_multiplier;
        if state.word_count % WORDS_PER_MINI_PAUSE == 0 {
            factors.word_boundary *= rng.gen_range(1.5..=2.0);
        }
    }

    // A sentence pause replaces the keystroke delay outright.
    let secs = if sentence_pause {
        rng.gen_range(profile.pause_duration_min_secs..=profile.pause_duration_max_secs)
    } else {
        base_secs * factors.product()
    }
    .max(MIN_KEYSTROKE_DELAY_SECS);

    Delay {
        secs,
        base_secs,
        factors,
        burst,
        sentence_pause,
    }
}
