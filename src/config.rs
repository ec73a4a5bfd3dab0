use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::profile::{
    ProfileSource, SpeedCategory, TypingProfile, MAX_DELAY_CEILING_SECS, MAX_WPM, MIN_WPM,
};
use crate::typo::{CorrectionGuarantee, DelayedCorrectionMode};

/// Upper bound on how long a typo may sit before being fixed.
pub const MAX_CORRECTION_DELAY_SECS: f64 = 60.0;

/// Longest sentence pause a custom profile may ask for.
pub const MAX_PAUSE_SECS: f64 = 30.0;

pub const MAX_WORD_PAUSE_MULTIPLIER: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub typos_enabled: bool,
    /// Fix typos later with cursor moves instead of right away.
    pub delayed_correction: bool,
    pub correction_delay_secs: f64,
    pub correction_mode: DelayedCorrectionMode,
    pub correction_guarantee: CorrectionGuarantee,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            typos_enabled: true,
            delayed_correction: false,
            correction_delay_secs: 2.0,
            correction_mode: DelayedCorrectionMode::Batch,
            correction_guarantee: CorrectionGuarantee::Guaranteed,
        }
    }
}

impl FeatureFlags {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.correction_delay_secs.is_finite(),
            "correction_delay_secs must be finite"
        );
        ensure!(
            (0.0..=MAX_CORRECTION_DELAY_SECS).contains(&self.correction_delay_secs),
            "correction_delay_secs must be between 0 and {MAX_CORRECTION_DELAY_SECS}"
        );
        Ok(())
    }

    pub fn correction_delay(&self) -> Duration {
        Duration::from_secs_f64(self.correction_delay_secs.max(0.0))
    }
}

/// Sanity checks for a hand-written profile. Resolved profiles always pass.
pub fn validate_profile(p: &TypingProfile) -> Result<()> {
    ensure!(
        (MIN_WPM..=MAX_WPM).contains(&p.target_wpm),
        "target_wpm must be between {MIN_WPM} and {MAX_WPM}"
    );
    ensure!(
        p.min_delay_secs.is_finite() && p.max_delay_secs.is_finite(),
        "delay bounds must be finite"
    );
    ensure!(p.min_delay_secs > 0.0, "min_delay_secs must be > 0");
    ensure!(
        p.min_delay_secs <= p.max_delay_secs,
        "min_delay_secs must be <= max_delay_secs"
    );
    ensure!(
        p.max_delay_secs <= MAX_DELAY_CEILING_SECS,
        "max_delay_secs must be <= {MAX_DELAY_CEILING_SECS}"
    );
    ensure!(
        (0.0..=1.0).contains(&p.typo_chance),
        "typo_chance must be between 0.0 and 1.0"
    );
    ensure!(
        (0.0..=1.0).contains(&p.burst_variability),
        "burst_variability must be between 0.0 and 1.0"
    );
    ensure!(p.pause_frequency >= 1, "pause_frequency must be >= 1");
    ensure!(
        p.pause_duration_min_secs.is_finite() && p.pause_duration_max_secs.is_finite(),
        "pause durations must be finite"
    );
    ensure!(
        p.pause_duration_min_secs >= 0.0
            && p.pause_duration_min_secs <= p.pause_duration_max_secs,
        "pause_duration_min_secs must be >= 0 and <= pause_duration_max_secs"
    );
    ensure!(
        p.pause_duration_max_secs <= MAX_PAUSE_SECS,
        "pause_duration_max_secs must be <= {MAX_PAUSE_SECS}"
    );
    ensure!(
        (1.0..=MAX_WORD_PAUSE_MULTIPLIER).contains(&p.word_pause_multiplier),
        "word_pause_multiplier must be between 1.0 and {MAX_WORD_PAUSE_MULTIPLIER}"
    );
    Ok(())
}

/// Everything needed to start a session apart from the text and the sink.
/// Loadable from JSON; every field is optional there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub wpm: u32,
    /// Takes precedence over `wpm` when set.
    pub preset: Option<SpeedCategory>,
    /// Takes precedence over both `wpm` and `preset` when set.
    pub profile: Option<TypingProfile>,
    #[serde(flatten)]
    pub flags: FeatureFlags,
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wpm: 60,
            preset: None,
            profile: None,
            flags: FeatureFlags::default(),
            seed: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let cfg: SessionConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn profile_source(&self) -> ProfileSource {
        match (&self.profile, self.preset) {
            (Some(p), _) => ProfileSource::Custom(p.clone()),
            (None, Some(category)) => ProfileSource::Preset(category),
            (None, None) => ProfileSource::Wpm(self.wpm),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.flags.validate()?;
        if let Some(p) = &self.profile {
            validate_profile(p).context("invalid custom profile")?;
        }
        Ok(())
    }
}
