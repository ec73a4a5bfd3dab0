use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use slywriter::clock::{SimulatedClock, SystemClock};
use slywriter::config::SessionConfig;
use slywriter::control::SessionControl;
use slywriter::engine::{type_text, EngineContext, SessionOutcome};
use slywriter::keyboard::find_first_unsupported_char;
use slywriter::playback::open_sink;
use slywriter::profile::SpeedCategory;
use slywriter::session::{SessionOptions, TypingSession};
use slywriter::sim::BufferSink;
use slywriter::sink::{NoProgress, SessionStatus, SharedSink};
use slywriter::trace::ConsoleTrace;
use slywriter::typo::{CorrectionGuarantee, DelayedCorrectionMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlaybackBackendArg {
    Auto,
    X11,
}

impl PlaybackBackendArg {
    fn to_library(self) -> slywriter::playback::PlaybackBackend {
        match self {
            PlaybackBackendArg::Auto => slywriter::playback::PlaybackBackend::Auto,
            PlaybackBackendArg::X11 => slywriter::playback::PlaybackBackend::X11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PresetArg {
    HuntAndPeck,
    Slow,
    Average,
    AboveAverage,
    Fast,
    VeryFast,
    Professional,
    Elite,
}

impl PresetArg {
    fn to_library(self) -> SpeedCategory {
        match self {
            PresetArg::HuntAndPeck => SpeedCategory::HuntAndPeck,
            PresetArg::Slow => SpeedCategory::Slow,
            PresetArg::Average => SpeedCategory::Average,
            PresetArg::AboveAverage => SpeedCategory::AboveAverage,
            PresetArg::Fast => SpeedCategory::Fast,
            PresetArg::VeryFast => SpeedCategory::VeryFast,
            PresetArg::Professional => SpeedCategory::Professional,
            PresetArg::Elite => SpeedCategory::Elite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CorrectionModeArg {
    /// Fix one due typo per check, oldest first.
    Single,
    /// Fix every due typo per check, rightmost first.
    Batch,
}

impl CorrectionModeArg {
    fn to_library(self) -> DelayedCorrectionMode {
        match self {
            CorrectionModeArg::Single => DelayedCorrectionMode::Single,
            CorrectionModeArg::Batch => DelayedCorrectionMode::Batch,
        }
    }
}

/// Typing behavior shared by `plan` and `run`. Flags override `--config`.
#[derive(Debug, Args, Clone)]
struct TypingArgs {
    /// JSON session config; any field may be omitted.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Target words per minute (clamped to 10-300).
    #[arg(long)]
    wpm: Option<u32>,

    /// Named speed preset; overrides --wpm.
    #[arg(long, value_enum, conflicts_with = "wpm")]
    preset: Option<PresetArg>,

    /// Type every character exactly as written.
    #[arg(long)]
    no_typos: bool,

    /// Fix typos a couple of seconds later by moving the cursor back.
    #[arg(long)]
    delayed: bool,

    /// Seconds a typo stays before a delayed fix.
    #[arg(long, value_name = "SECS")]
    correction_delay: Option<f64>,

    #[arg(long, value_enum)]
    correction_mode: Option<CorrectionModeArg>,

    /// Sometimes leave a typo uncorrected, as people do.
    #[arg(long)]
    probabilistic: bool,

    /// Optional RNG seed (for debugging)
    #[arg(long)]
    seed: Option<u64>,
}

impl TypingArgs {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut cfg = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::default(),
        };

        if let Some(wpm) = self.wpm {
            cfg.wpm = wpm;
            cfg.preset = None;
            cfg.profile = None;
        }
        if let Some(preset) = self.preset {
            cfg.preset = Some(preset.to_library());
            cfg.profile = None;
        }
        if self.no_typos {
            cfg.flags.typos_enabled = false;
        }
        if self.delayed {
            cfg.flags.delayed_correction = true;
        }
        if let Some(secs) = self.correction_delay {
            cfg.flags.correction_delay_secs = secs;
        }
        if let Some(mode) = self.correction_mode {
            cfg.flags.correction_mode = mode.to_library();
        }
        if self.probabilistic {
            cfg.flags.correction_guarantee = CorrectionGuarantee::Probabilistic;
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Parser)]
#[command(name = "slywriter")]
#[command(about = "Types text into the focused window like a person would", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dry run under simulated time; prints the keystroke transcript (JSON)
    Plan {
        /// Input text file, or '-' for stdin
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Output transcript file (defaults to stdout)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        #[command(flatten)]
        typing: TypingArgs,
    },

    /// Type the input into the currently focused window
    Run {
        /// Output backend.
        ///
        /// - auto: choose a backend based on the runtime environment
        /// - x11: force X11 output (XTEST)
        #[arg(long, value_enum, default_value_t = PlaybackBackendArg::Auto)]
        backend: PlaybackBackendArg,

        /// Input text file, or '-' for stdin
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Countdown seconds before typing starts
        #[arg(long, default_value_t = 5)]
        countdown: u64,

        /// Disable console typing trace output
        #[arg(long)]
        no_trace: bool,

        #[command(flatten)]
        typing: TypingArgs,
    },

    /// Print the resolved typing profile (JSON)
    Profile {
        #[arg(long, default_value_t = 60)]
        wpm: u32,

        #[arg(long, value_enum, conflicts_with = "wpm")]
        preset: Option<PresetArg>,
    },
}

fn read_input(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == std::ffi::OsStr::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }

    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(path: &PathBuf, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn require_typable(text: &str) -> Result<()> {
    if let Some((idx, c)) = find_first_unsupported_char(text) {
        let line = text[..idx].matches('\n').count() + 1;
        return Err(anyhow!(
            "input contains {c:?} on line {line}, which cannot be typed on a US QWERTY layout"
        ));
    }
    Ok(())
}

fn init_tracing() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|e| {
            eprintln!("Failed to parse RUST_LOG: {e}. Using default 'info' level.");
            EnvFilter::new("info")
        }))
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

fn plan(input: PathBuf, output: Option<PathBuf>, typing: TypingArgs) -> Result<()> {
    let text = read_input(&input)?;
    let cfg = typing.session_config()?;
    let profile = cfg.profile_source().resolve();

    let sink = SharedSink::new(BufferSink::new());
    let clock = SimulatedClock::new();
    let control = SessionControl::new();
    let mut progress = NoProgress;
    let cx = EngineContext {
        sink: &sink,
        progress: &mut progress,
        clock: &clock,
        control: &control,
    };
    let report = type_text(&text, &profile, &cfg.flags, cx, rng_from_seed(cfg.seed));

    let stats = report.transcript.stats();
    eprintln!(
        "Planned: {} events, {} typos ({} corrected), ~{:.1} min at {} WPM ({})",
        stats.events,
        stats.typos,
        stats.corrected_typos,
        report.elapsed.as_secs_f64() / 60.0,
        profile.target_wpm,
        profile.category.as_str(),
    );

    let typed = sink.with(|b| Ok(b.text()))?;
    if typed != text {
        eprintln!("Note: final text differs from the input (uncorrected typos).");
    }

    let json = serde_json::to_string_pretty(&report.transcript)
        .context("failed to serialize transcript")?;
    match output {
        Some(out) => write_output(&out, &json),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn run(
    backend: PlaybackBackendArg,
    input: PathBuf,
    countdown: u64,
    no_trace: bool,
    typing: TypingArgs,
) -> Result<()> {
    let text = read_input(&input)?;
    require_typable(&text)?;
    let cfg = typing.session_config()?;

    // Fail fast on unsupported environments.
    slywriter::playback::resolve_backend(backend.to_library())?;

    let control = SessionControl::new();
    {
        let control = control.clone();
        ctrlc::set_handler(move || control.stop()).context("failed to install Ctrl+C handler")?;
    }

    if countdown > 0 {
        eprintln!("Focus the target window. Starting in {countdown}s...");
        for remaining in (1..=countdown).rev() {
            eprintln!("{remaining}...");
            if !control.sleep(std::time::Duration::from_secs(1)) {
                return Err(anyhow!("aborted"));
            }
        }
    }

    let sink = SharedSink::new(ConsoleTrace::new(open_sink(backend.to_library())?).echo(!no_trace));

    let mut last_decile = 0;
    let mut last_status = SessionStatus::Typing;
    let progress = move |typed: usize, total: usize, wpm: u32, status: SessionStatus| {
        if status != last_status {
            debug!(typed, "session {}", status.as_str());
            last_status = status;
        }
        let decile = if total == 0 { 10 } else { typed * 10 / total };
        if status == SessionStatus::Typing && decile > last_decile {
            last_decile = decile;
            info!(typed, total, wpm, "progress {}%", decile * 10);
        }
    };

    let options = SessionOptions {
        profile: cfg.profile_source(),
        flags: cfg.flags.clone(),
        seed: cfg.seed,
        clock: Arc::new(SystemClock::new()),
        progress: Box::new(progress),
        control,
    };
    let session = TypingSession::start(&text, options, sink.clone())?;
    let report = session.wait()?;
    sink.with(|t| Ok(t.finish()))?;

    match report.outcome {
        SessionOutcome::Completed => {
            eprintln!(
                "Done: {} chars in {:.1}s",
                report.chars_typed,
                report.elapsed.as_secs_f64()
            );
            Ok(())
        }
        SessionOutcome::Stopped => {
            eprintln!(
                "Stopped after {} of {} chars.",
                report.chars_typed, report.total_chars
            );
            Ok(())
        }
        SessionOutcome::Failed(reason) => Err(anyhow!(reason)),
    }
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Plan {
            input,
            output,
            typing,
        } => plan(input, output, typing),
        Command::Run {
            backend,
            input,
            countdown,
            no_trace,
            typing,
        } => run(backend, input, countdown, no_trace, typing),
        Command::Profile { wpm, preset } => {
            let profile = match preset {
                Some(p) => slywriter::profile::ProfileSource::Preset(p.to_library()),
                None => slywriter::profile::ProfileSource::Wpm(wpm),
            }
            .resolve();
            let json =
                serde_json::to_string_pretty(&profile).context("failed to serialize profile")?;
            println!("{json}");
            Ok(())
        }
    }
}
