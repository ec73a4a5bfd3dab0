use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use slywriter::clock::SimulatedClock;
use slywriter::config::FeatureFlags;
use slywriter::control::SessionControl;
use slywriter::engine::{type_text, EngineContext, SessionOutcome, SessionReport};
use slywriter::model::KeyEvent;
use slywriter::profile::{resolve_profile, TypingProfile};
use slywriter::sim::BufferSink;
use slywriter::sink::{ProgressSink, SessionStatus, SharedSink};
use slywriter::typo::{CorrectionGuarantee, DelayedCorrectionMode};

const PARAGRAPH: &str = "The quick brown fox jumps over the lazy dog. \
Pack my box with five dozen liquor jugs! How vexingly quick daft zebras jump; \
sphinx of black quartz, judge my vow.\nThe end.";

type Progress = Vec<(usize, usize, u32, SessionStatus)>;

fn typo_heavy(wpm: u32, chance: f64) -> TypingProfile {
    TypingProfile {
        typo_chance: chance,
        ..resolve_profile(wpm)
    }
}

fn no_typos() -> FeatureFlags {
    FeatureFlags {
        typos_enabled: false,
        ..Default::default()
    }
}

fn delayed(mode: DelayedCorrectionMode) -> FeatureFlags {
    FeatureFlags {
        delayed_correction: true,
        correction_mode: mode,
        ..Default::default()
    }
}

fn run_with(
    text: &str,
    profile: &TypingProfile,
    flags: &FeatureFlags,
    seed: u64,
    progress: &mut dyn ProgressSink,
    control: &SessionControl,
    sink: &SharedSink<BufferSink>,
) -> SessionReport {
    let clock = SimulatedClock::new();
    let cx = EngineContext {
        sink,
        progress,
        clock: &clock,
        control,
    };
    type_text(text, profile, flags, cx, StdRng::seed_from_u64(seed))
}

fn run(
    text: &str,
    profile: &TypingProfile,
    flags: &FeatureFlags,
    seed: u64,
) -> (SessionReport, BufferSink, Progress) {
    let sink = SharedSink::new(BufferSink::new());
    let mut seen = Vec::new();
    let mut progress = |typed: usize, total: usize, wpm: u32, status: SessionStatus| {
        seen.push((typed, total, wpm, status));
    };
    let report = run_with(
        text,
        profile,
        flags,
        seed,
        &mut progress,
        &SessionControl::new(),
        &sink,
    );
    let buffer = sink.lock().unwrap().clone();
    (report, buffer, seen)
}

#[test]
fn clean_run_types_each_character_once() {
    let text = "Hello world.";
    let (report, buffer, progress) = run(text, &resolve_profile(60), &no_typos(), 1);

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(buffer.text(), text);
    assert_eq!(buffer.emit_count(), 12);
    assert_eq!(report.chars_typed, 12);

    let typing: Vec<usize> = progress
        .iter()
        .filter(|p| p.3 == SessionStatus::Typing)
        .map(|p| p.0)
        .collect();
    assert_eq!(typing, (1..=12).collect::<Vec<_>>());
    assert_eq!(progress.last().map(|p| p.3), Some(SessionStatus::Completed));
    assert!(progress.iter().all(|p| p.1 == 12));

    // Twelve keystrokes, eleven gaps between them.
    let delays: Vec<u64> = report
        .transcript
        .events
        .iter()
        .map(|e| match &e.event {
            KeyEvent::Emit { delay_ms, typo, .. } => {
                assert!(!typo);
                *delay_ms
            }
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(delays[0], 0);
    assert!(delays[1..].iter().all(|&ms| ms >= 10), "{delays:?}");
    assert_eq!(
        report.elapsed.as_millis() as u64,
        report.transcript.events[11].at_ms
    );
}

#[test]
fn live_wpm_tracks_the_target() {
    let (report, _, progress) = run(PARAGRAPH, &resolve_profile(60), &no_typos(), 4);
    assert_eq!(report.outcome, SessionOutcome::Completed);

    let (_, _, wpm, _) = progress[progress.len() - 2];
    assert!((25..=90).contains(&wpm), "final wpm {wpm}");
}

#[test]
fn delayed_fix_lands_within_half_a_second_of_the_delay() {
    // Fifty characters; only the letter at index 10 can be mistyped.
    let text = "1234567890x123456789012345678901234567890123456789";
    assert_eq!(text.len(), 50);
    let profile = typo_heavy(60, 1.0);
    let (report, buffer, _) = run(text, &profile, &delayed(DelayedCorrectionMode::Batch), 9);

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(buffer.text(), text);

    let typos = &report.transcript.typos;
    assert_eq!(typos.len(), 1);
    assert_eq!(typos[0].position, 10);
    assert!(typos[0].corrected);

    let typo_ms = typos[0].timestamp.as_millis() as u64;
    let fix_ms = report
        .transcript
        .events
        .iter()
        .find(|e| !matches!(e.event, KeyEvent::Emit { .. }))
        .map(|e| e.at_ms)
        .expect("a correction keystroke");
    assert!(fix_ms >= typo_ms + 2000, "fix at {fix_ms}, typo at {typo_ms}");
    assert!(fix_ms <= typo_ms + 2500, "fix at {fix_ms}, typo at {typo_ms}");
}

#[test]
fn stop_from_progress_halts_without_further_keystrokes() {
    let text = "Stop me after five characters, please.";
    let sink = SharedSink::new(BufferSink::new());
    let control = SessionControl::new();
    let statuses = Arc::new(Mutex::new(Vec::new()));

    let mut progress = {
        let control = control.clone();
        let statuses = Arc::clone(&statuses);
        move |typed: usize, _: usize, _: u32, status: SessionStatus| {
            statuses.lock().unwrap().push(status);
            if typed == 5 && status == SessionStatus::Typing {
                control.stop();
            }
        }
    };
    let report = run_with(
        text,
        &resolve_profile(80),
        &no_typos(),
        2,
        &mut progress,
        &control,
        &sink,
    );

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(report.chars_typed, 5);
    assert_eq!(sink.lock().unwrap().text(), "Stop ");
    assert_eq!(report.transcript.events.len(), 5);
    // Nothing was waited on after the last keystroke.
    assert_eq!(
        report.elapsed.as_millis() as u64,
        report.transcript.events[4].at_ms
    );
    assert_eq!(
        statuses.lock().unwrap().last().copied(),
        Some(SessionStatus::Stopped)
    );
}

#[test]
fn stop_discards_pending_delayed_corrections() {
    let sink = SharedSink::new(BufferSink::new());
    let control = SessionControl::new();
    let ops_at_stop = Arc::new(Mutex::new(None));

    let mut progress = {
        let control = control.clone();
        let sink = sink.clone();
        let ops_at_stop = Arc::clone(&ops_at_stop);
        move |typed: usize, _: usize, _: u32, status: SessionStatus| {
            if typed == 8 && status == SessionStatus::Typing {
                let ops = sink.lock().unwrap().ops().len();
                *ops_at_stop.lock().unwrap() = Some(ops);
                control.stop();
            }
        }
    };
    let flags = FeatureFlags {
        correction_delay_secs: 30.0,
        ..delayed(DelayedCorrectionMode::Batch)
    };
    let report = run_with(
        "abcdefghijklmnop",
        &typo_heavy(60, 1.0),
        &flags,
        3,
        &mut progress,
        &control,
        &sink,
    );

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(report.transcript.typos.len(), 8);
    assert!(report.transcript.typos.iter().all(|t| !t.corrected));
    assert_eq!(
        Some(sink.lock().unwrap().ops().len()),
        *ops_at_stop.lock().unwrap()
    );
}

#[test]
fn guaranteed_immediate_corrections_restore_the_text() {
    let profile = typo_heavy(90, 0.25);
    for seed in 0..8 {
        let (report, buffer, _) = run(PARAGRAPH, &profile, &FeatureFlags::default(), seed);
        assert_eq!(report.outcome, SessionOutcome::Completed);
        assert_eq!(buffer.text(), PARAGRAPH, "seed {seed}");
        assert!(!report.transcript.typos.is_empty());
        assert!(report.transcript.typos.iter().all(|t| t.corrected));
    }
}

#[test]
fn guaranteed_delayed_corrections_restore_the_text_in_both_modes() {
    let profile = typo_heavy(120, 0.3);
    for mode in [DelayedCorrectionMode::Single, DelayedCorrectionMode::Batch] {
        for seed in 0..8 {
            let (report, buffer, _) = run(PARAGRAPH, &profile, &delayed(mode), seed);
            assert_eq!(report.outcome, SessionOutcome::Completed);
            assert_eq!(buffer.text(), PARAGRAPH, "{mode:?} seed {seed}");
            assert_eq!(buffer.cursor(), PARAGRAPH.chars().count());
            assert!(report.transcript.typos.iter().all(|t| t.corrected));
        }
    }
}

#[test]
fn batch_mode_fixes_further_typos_first() {
    let profile = typo_heavy(150, 0.5);
    let (report, buffer, _) = run(PARAGRAPH, &profile, &delayed(DelayedCorrectionMode::Batch), 11);
    assert_eq!(buffer.text(), PARAGRAPH);

    // Corrections from one tick share a timestamp. Within a tick the walk
    // back grows as fixes move leftwards.
    let mut ticks: Vec<(u64, Vec<usize>)> = Vec::new();
    for e in &report.transcript.events {
        if let KeyEvent::CursorLeft { count } = e.event {
            match ticks.last_mut() {
                Some((at, lefts)) if *at == e.at_ms => lefts.push(count),
                _ => ticks.push((e.at_ms, vec![count])),
            }
        }
    }
    assert!(ticks.iter().any(|(_, lefts)| lefts.len() >= 2));
    for (at, lefts) in &ticks {
        assert!(lefts.windows(2).all(|w| w[0] < w[1]), "tick {at}: {lefts:?}");
    }
}

#[test]
fn probabilistic_mode_leaves_some_typos_alone() {
    let profile = typo_heavy(60, 0.4);
    let flags = FeatureFlags {
        correction_guarantee: CorrectionGuarantee::Probabilistic,
        ..Default::default()
    };
    let (report, _, _) = run(PARAGRAPH, &profile, &flags, 5);
    let stats = report.transcript.stats();
    assert!(stats.typos > 10);
    assert!(stats.corrected_typos < stats.typos);
    assert!(stats.corrected_typos > 0);

    let flags = FeatureFlags {
        correction_guarantee: CorrectionGuarantee::Probabilistic,
        ..delayed(DelayedCorrectionMode::Batch)
    };
    let (report, _, _) = run(PARAGRAPH, &profile, &flags, 5);
    let stats = report.transcript.stats();
    assert!(stats.corrected_typos < stats.typos);
}

#[test]
fn pause_blocks_until_resumed() {
    let text = "pause here";
    let sink = SharedSink::new(BufferSink::new());
    let control = SessionControl::new();
    let statuses = Arc::new(Mutex::new(Vec::new()));

    let mut progress = {
        let control = control.clone();
        let statuses = Arc::clone(&statuses);
        move |typed: usize, _: usize, _: u32, status: SessionStatus| {
            statuses.lock().unwrap().push(status);
            if typed == 3 && status == SessionStatus::Typing {
                control.pause();
                let remote = control.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(30));
                    remote.resume();
                });
            }
        }
    };
    let report = run_with(
        text,
        &resolve_profile(60),
        &no_typos(),
        6,
        &mut progress,
        &control,
        &sink,
    );

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(sink.lock().unwrap().text(), text);
    let statuses = statuses.lock().unwrap();
    assert_eq!(statuses[3], SessionStatus::Paused);
    assert_eq!(statuses.last().copied(), Some(SessionStatus::Completed));
}

#[test]
fn sink_failure_ends_the_session_as_failed() {
    let sink = SharedSink::new(BufferSink::failing_after(3));
    let mut statuses = Vec::new();
    let mut progress = |_: usize, _: usize, _: u32, status: SessionStatus| statuses.push(status);
    let report = run_with(
        "abcdef",
        &resolve_profile(60),
        &no_typos(),
        1,
        &mut progress,
        &SessionControl::new(),
        &sink,
    );

    match &report.outcome {
        SessionOutcome::Failed(reason) => {
            assert!(reason.contains("keystroke sink failed"), "{reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(report.chars_typed, 3);
    assert_eq!(statuses.last().copied(), Some(SessionStatus::Failed));
}

#[test]
fn empty_text_completes_immediately() {
    let (report, buffer, progress) = run("", &resolve_profile(60), &FeatureFlags::default(), 1);
    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(buffer.text(), "");
    assert_eq!(progress, vec![(0, 0, 0, SessionStatus::Completed)]);
}

#[test]
fn same_seed_same_transcript() {
    let profile = typo_heavy(70, 0.1);
    let flags = delayed(DelayedCorrectionMode::Single);
    let (a, _, _) = run(PARAGRAPH, &profile, &flags, 42);
    let (b, _, _) = run(PARAGRAPH, &profile, &flags, 42);
    assert_eq!(a.transcript.events, b.transcript.events);
    assert_eq!(a.transcript.typos, b.transcript.typos);
}
