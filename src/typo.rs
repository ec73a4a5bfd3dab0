use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::keyboard::qwerty_adjacent_char;
use crate::profile::TypingProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypoPattern {
    /// The key registers twice: `tt`.
    DoubleTap,
    /// A physically adjacent key: `r` for `t`.
    NeighborKey,
    /// The next letter lands first: `ht` for `t` in `th`.
    Transposition,
    /// Nothing registers.
    MissedKey,
    /// Shift pressed or released at the wrong moment.
    WrongCase,
    /// The key repeats: `ttt`.
    StickyKey,
}

// Relative weights; they sum to 100.
const PATTERN_WEIGHTS: [(TypoPattern, u32); 6] = [
    (TypoPattern::DoubleTap, 15),
    (TypoPattern::NeighborKey, 40),
    (TypoPattern::Transposition, 20),
    (TypoPattern::MissedKey, 10),
    (TypoPattern::WrongCase, 10),
    (TypoPattern::StickyKey, 5),
];

fn pick_pattern(rng: &mut impl Rng) -> TypoPattern {
    let total: u32 = PATTERN_WEIGHTS.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for (pattern, weight) in PATTERN_WEIGHTS {
        if roll < weight {
            return pattern;
        }
        roll -= weight;
    }
    TypoPattern::NeighborKey
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypoDecision {
    /// What actually gets typed for this character.
    pub emit: String,
    pub pattern: Option<TypoPattern>,
}

impl TypoDecision {
    fn clean(c: char) -> Self {
        Self {
            emit: c.to_string(),
            pattern: None,
        }
    }

    pub fn is_typo(&self) -> bool {
        self.pattern.is_some()
    }
}

fn swap_case(c: char) -> char {
    if c.is_ascii_uppercase() {
        c.to_ascii_lowercase()
    } else {
        c.to_ascii_uppercase()
    }
}

fn render_pattern(
    pattern: TypoPattern,
    c: char,
    next: Option<char>,
    rng: &mut impl Rng,
) -> (TypoPattern, String) {
    match pattern {
        TypoPattern::DoubleTap => (pattern, [c, c].iter().collect()),
        TypoPattern::StickyKey => (pattern, [c, c, c].iter().collect()),
        TypoPattern::MissedKey => (pattern, String::new()),
        TypoPattern::WrongCase => (pattern, swap_case(c).to_string()),
        TypoPattern::NeighborKey => match qwerty_adjacent_char(c, rng) {
            Some(n) => (pattern, n.to_string()),
            None => (TypoPattern::WrongCase, swap_case(c).to_string()),
        },
        TypoPattern::Transposition => match next {
            Some(n) if n.is_ascii_alphabetic() && n != c => (pattern, [n, c].iter().collect()),
            _ => render_pattern(TypoPattern::NeighborKey, c, next, rng),
        },
    }
}

/// Decide whether `c` gets mistyped, and how.
///
/// Only ASCII letters are candidates: the neighbour table and the keystroke
/// mapping cover the US layout only, so other letters are always typed
/// cleanly. `next` is the following source character, which a transposition
/// types early.
pub fn decide_typo(
    c: char,
    next: Option<char>,
    profile: &TypingProfile,
    rng: &mut impl Rng,
) -> TypoDecision {
    if !c.is_ascii_alphabetic() {
        return TypoDecision::clean(c);
    }
    if !rng.gen_bool(profile.typo_chance.clamp(0.0, 1.0)) {
        return TypoDecision::clean(c);
    }

    let (pattern, emit) = render_pattern(pick_pattern(rng), c, next, rng);
    TypoDecision {
        emit,
        pattern: Some(pattern),
    }
}

/// Whether a typo noticed `chars_since` keystrokes after it was made gets
/// fixed at all.
///
/// The further typing has moved on, the less likely anyone goes back.
pub fn simulate_correction_behavior(chars_since: usize, rng: &mut impl Rng) -> bool {
    let p = match chars_since {
        0..=2 => 0.70,
        3..=5 => 0.25,
        6..=10 => 0.05,
        _ => return false,
    };
    rng.gen_bool(p)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionGuarantee {
    /// Every typo is eventually corrected.
    #[default]
    Guaranteed,
    /// Typos are corrected subject to `simulate_correction_behavior`.
    Probabilistic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayedCorrectionMode {
    /// One due typo per tick, oldest first.
    Single,
    /// Every due typo per tick, furthest from the start first.
    #[default]
    Batch,
}

/// A single injected typo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypoEvent {
    /// Index of the mistyped character in the source text.
    pub position: usize,
    pub original_char: char,
    pub typo_text: String,
    pub pattern: TypoPattern,
    /// Session time at which the typo was typed.
    pub timestamp: Duration,
    pub corrected: bool,
}

impl TypoEvent {
    pub fn typo_len(&self) -> usize {
        self.typo_text.chars().count()
    }
}

/// A typo waiting to be fixed, with its location in the typed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCorrection {
    pub event: TypoEvent,
    /// Where the typo text starts in the buffer. Differs from
    /// `event.position` once earlier typos change the buffer length.
    pub buffer_start: usize,
}

impl PendingCorrection {
    pub fn buffer_end(&self) -> usize {
        self.buffer_start + self.event.typo_len()
    }

    // A dropped character and the typo after it can share a buffer offset;
    // source order breaks the tie.
    fn sort_key(&self) -> (usize, usize) {
        (self.buffer_start, self.event.position)
    }

    fn is_after(&self, fixed: &PendingCorrection) -> bool {
        let end = fixed.buffer_end();
        self.buffer_start > end
            || (self.buffer_start == end && self.event.position > fixed.event.position)
    }
}

#[derive(Debug, Default, Clone)]
pub struct CorrectionQueue {
    pending: VecDeque<PendingCorrection>,
}

impl CorrectionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: TypoEvent, buffer_start: usize) {
        self.pending.push_back(PendingCorrection {
            event,
            buffer_start,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Remove and return the corrections due at `now`, in the order they
    /// must be applied.
    pub fn take_due(
        &mut self,
        now: Duration,
        delay: Duration,
        mode: DelayedCorrectionMode,
    ) -> Vec<PendingCorrection> {
        let is_due = |p: &PendingCorrection| now.saturating_sub(p.event.timestamp) >= delay;

        match mode {
            DelayedCorrectionMode::Single => {
                let idx = self.pending.iter().position(is_due);
                idx.and_then(|i| self.pending.remove(i)).into_iter().collect()
            }
            DelayedCorrectionMode::Batch => {
                let (mut due, keep): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(is_due);
                self.pending = keep.into();
                // Editing further right first leaves earlier offsets intact.
                due.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
                due
            }
        }
    }

    /// Account for fixing `fixed`, which changed the buffer length by `delta`.
    pub fn shift_after(&mut self, fixed: &PendingCorrection, delta: isize) {
        for p in self.pending.iter_mut().filter(|p| p.is_after(fixed)) {
            p.buffer_start = p.buffer_start.saturating_add_signed(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::resolve_profile;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn always_typo() -> TypingProfile {
        TypingProfile {
            typo_chance: 1.0,
            ..resolve_profile(60)
        }
    }

    fn event(position: usize, secs: u64) -> TypoEvent {
        TypoEvent {
            position,
            original_char: 'a',
            typo_text: "s".to_string(),
            pattern: TypoPattern::NeighborKey,
            timestamp: Duration::from_secs(secs),
            corrected: false,
        }
    }

    #[test]
    fn only_us_letters_are_mistyped() {
        let profile = always_typo();
        let mut rng = StdRng::seed_from_u64(1);
        for c in [' ', '.', '7', '\n', '?', 'é', 'ß', 'ж'] {
            let d = decide_typo(c, Some('a'), &profile, &mut rng);
            assert!(!d.is_typo());
            assert_eq!(d.emit, c.to_string());
        }
    }

    #[test]
    fn zero_chance_types_cleanly() {
        let profile = TypingProfile {
            typo_chance: 0.0,
            ..resolve_profile(60)
        };
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..500 {
            assert!(!decide_typo('e', None, &profile, &mut rng).is_typo());
        }
    }

    #[test]
    fn patterns_render_their_shapes() {
        let profile = always_typo();
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2000 {
            let d = decide_typo('t', Some('h'), &profile, &mut rng);
            let pattern = d.pattern.unwrap();
            seen.insert(pattern);
            match pattern {
                TypoPattern::DoubleTap => assert_eq!(d.emit, "tt"),
                TypoPattern::StickyKey => assert_eq!(d.emit, "ttt"),
                TypoPattern::MissedKey => assert_eq!(d.emit, ""),
                TypoPattern::WrongCase => assert_eq!(d.emit, "T"),
                TypoPattern::Transposition => assert_eq!(d.emit, "ht"),
                TypoPattern::NeighborKey => {
                    assert_eq!(d.emit.chars().count(), 1);
                    assert_ne!(d.emit, "t");
                }
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn neighbor_typos_keep_case() {
        let profile = always_typo();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..500 {
            let d = decide_typo('H', None, &profile, &mut rng);
            if d.pattern == Some(TypoPattern::NeighborKey) {
                assert!(d.emit.chars().all(|c| c.is_ascii_uppercase()));
            }
        }
    }

    #[test]
    fn transposition_without_a_following_letter_falls_back() {
        let mut rng = StdRng::seed_from_u64(5);
        for next in [None, Some(' '), Some('t')] {
            let (pattern, emit) = render_pattern(TypoPattern::Transposition, 't', next, &mut rng);
            assert_eq!(pattern, TypoPattern::NeighborKey);
            assert_eq!(emit.chars().count(), 1);
        }
    }

    #[test]
    fn pattern_weights_are_roughly_respected() {
        let mut rng = StdRng::seed_from_u64(6);
        let n = 20_000;
        let neighbor = (0..n)
            .filter(|_| pick_pattern(&mut rng) == TypoPattern::NeighborKey)
            .count();
        let share = neighbor as f64 / n as f64;
        assert!((0.37..0.43).contains(&share), "{share}");
    }

    #[test]
    fn late_typos_are_never_corrected() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(!simulate_correction_behavior(11, &mut rng));
            assert!(!simulate_correction_behavior(400, &mut rng));
        }
        let caught = (0..2000)
            .filter(|_| simulate_correction_behavior(1, &mut rng))
            .count();
        assert!((1250..1550).contains(&caught), "{caught}");
    }

    #[test]
    fn single_mode_takes_the_oldest_due_event() {
        let mut q = CorrectionQueue::new();
        q.push(event(3, 0), 3);
        q.push(event(9, 1), 9);
        q.push(event(20, 5), 20);

        let due = q.take_due(
            Duration::from_secs(4),
            Duration::from_secs(2),
            DelayedCorrectionMode::Single,
        );
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].event.position, 3);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn batch_mode_takes_all_due_events_furthest_first() {
        let mut q = CorrectionQueue::new();
        q.push(event(3, 0), 3);
        q.push(event(9, 1), 9);
        q.push(event(20, 5), 20);

        let due = q.take_due(
            Duration::from_secs(4),
            Duration::from_secs(2),
            DelayedCorrectionMode::Batch,
        );
        let positions: Vec<usize> = due.iter().map(|p| p.buffer_start).collect();
        assert_eq!(positions, vec![9, 3]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn edits_shift_later_pending_offsets() {
        let mut q = CorrectionQueue::new();
        let fixed = PendingCorrection {
            event: TypoEvent {
                typo_text: "ss".to_string(),
                ..event(3, 0)
            },
            buffer_start: 3,
        };
        q.push(event(1, 0), 1);
        q.push(event(9, 0), 10);
        q.shift_after(&fixed, -1);
        let due = q.take_due(
            Duration::from_secs(9),
            Duration::ZERO,
            DelayedCorrectionMode::Batch,
        );
        let positions: Vec<usize> = due.iter().map(|p| p.buffer_start).collect();
        assert_eq!(positions, vec![9, 1]);
    }

    #[test]
    fn dropped_char_and_following_typo_share_an_offset() {
        let missed = PendingCorrection {
            event: TypoEvent {
                typo_text: String::new(),
                pattern: TypoPattern::MissedKey,
                ..event(5, 0)
            },
            buffer_start: 5,
        };
        let mut q = CorrectionQueue::new();
        q.push(missed.event.clone(), 5);
        q.push(event(6, 0), 5);

        let due = q.take_due(
            Duration::from_secs(1),
            Duration::ZERO,
            DelayedCorrectionMode::Batch,
        );
        let order: Vec<usize> = due.iter().map(|p| p.event.position).collect();
        assert_eq!(order, vec![6, 5]);

        // Re-inserting the dropped char pushes the later typo right.
        let mut q = CorrectionQueue::new();
        q.push(event(6, 0), 5);
        q.shift_after(&missed, 1);
        let due = q.take_due(
            Duration::from_secs(1),
            Duration::ZERO,
            DelayedCorrectionMode::Single,
        );
        assert_eq!(due[0].buffer_start, 6);
    }
}
