use serde::{Deserialize, Serialize};

pub const MIN_WPM: u32 = 10;
pub const MAX_WPM: u32 = 300;

pub const MIN_DELAY_FLOOR_SECS: f64 = 0.01;
pub const MAX_DELAY_CEILING_SECS: f64 = 2.0;

/// Speed bracket a resolved profile falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedCategory {
    HuntAndPeck,
    Slow,
    Average,
    AboveAverage,
    Fast,
    VeryFast,
    Professional,
    Elite,
}

impl SpeedCategory {
    pub const ALL: [SpeedCategory; 8] = [
        SpeedCategory::HuntAndPeck,
        SpeedCategory::Slow,
        SpeedCategory::Average,
        SpeedCategory::AboveAverage,
        SpeedCategory::Fast,
        SpeedCategory::VeryFast,
        SpeedCategory::Professional,
        SpeedCategory::Elite,
    ];

    pub fn for_wpm(wpm: u32) -> Self {
        match wpm {
            0..=19 => SpeedCategory::HuntAndPeck,
            20..=39 => SpeedCategory::Slow,
            40..=79 => SpeedCategory::Average,
            80..=99 => SpeedCategory::AboveAverage,
            100..=119 => SpeedCategory::Fast,
            120..=149 => SpeedCategory::VeryFast,
            150..=199 => SpeedCategory::Professional,
            _ => SpeedCategory::Elite,
        }
    }

    /// The speed a named preset types at.
    pub fn preset_wpm(self) -> u32 {
        match self {
            SpeedCategory::HuntAndPeck => 15,
            SpeedCategory::Slow => 30,
            SpeedCategory::Average => 60,
            SpeedCategory::AboveAverage => 90,
            SpeedCategory::Fast => 110,
            SpeedCategory::VeryFast => 135,
            SpeedCategory::Professional => 170,
            SpeedCategory::Elite => 220,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpeedCategory::HuntAndPeck => "hunt_and_peck",
            SpeedCategory::Slow => "slow",
            SpeedCategory::Average => "average",
            SpeedCategory::AboveAverage => "above_average",
            SpeedCategory::Fast => "fast",
            SpeedCategory::VeryFast => "very_fast",
            SpeedCategory::Professional => "professional",
            SpeedCategory::Elite => "elite",
        }
    }
}

/// Timing and error parameters for one typing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingProfile {
    pub target_wpm: u32,
    pub category: SpeedCategory,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub variation_percent: f64,
    pub typo_chance: f64,
    /// Take a long pause every N sentence-ending marks.
    pub pause_frequency: u32,
    pub pause_duration_min_secs: f64,
    pub pause_duration_max_secs: f64,
    /// Share of burst events that are speed-ups rather than hesitations.
    pub burst_variability: f64,
    pub word_pause_multiplier: f64,
}

struct Band {
    below_wpm: u32,
    variation_percent: f64,
    typo_chance: f64,
    pause_frequency: u32,
    pause_min: f64,
    pause_max: f64,
    burst_variability: f64,
    word_pause_multiplier: f64,
}

// Ordered by `below_wpm`; the last row catches everything else.
const BANDS: [Band; 8] = [
    Band {
        below_wpm: 20,
        variation_percent: 40.0,
        typo_chance: 0.08,
        pause_frequency: 3,
        pause_min: 1.5,
        pause_max: 3.5,
        burst_variability: 0.20,
        word_pause_multiplier: 1.35,
    },
    Band {
        below_wpm: 40,
        variation_percent: 37.0,
        typo_chance: 0.06,
        pause_frequency: 5,
        pause_min: 1.0,
        pause_max: 2.5,
        burst_variability: 0.25,
        word_pause_multiplier: 1.30,
    },
    Band {
        below_wpm: 60,
        variation_percent: 34.0,
        typo_chance: 0.04,
        pause_frequency: 6,
        pause_min: 0.8,
        pause_max: 2.0,
        burst_variability: 0.30,
        word_pause_multiplier: 1.25,
    },
    Band {
        below_wpm: 80,
        variation_percent: 31.0,
        typo_chance: 0.03,
        pause_frequency: 8,
        pause_min: 0.6,
        pause_max: 1.5,
        burst_variability: 0.35,
        word_pause_multiplier: 1.20,
    },
    Band {
        below_wpm: 100,
        variation_percent: 29.0,
        typo_chance: 0.025,
        pause_frequency: 10,
        pause_min: 0.5,
        pause_max: 1.2,
        burst_variability: 0.40,
        word_pause_multiplier: 1.15,
    },
    Band {
        below_wpm: 120,
        variation_percent: 27.0,
        typo_chance: 0.02,
        pause_frequency: 12,
        pause_min: 0.4,
        pause_max: 1.0,
        burst_variability: 0.45,
        word_pause_multiplier: 1.10,
    },
    Band {
        below_wpm: 150,
        variation_percent: 25.0,
        typo_chance: 0.015,
        pause_frequency: 15,
        pause_min: 0.3,
        pause_max: 0.8,
        burst_variability: 0.50,
        word_pause_multiplier: 1.08,
    },
    Band {
        below_wpm: u32::MAX,
        variation_percent: 23.0,
        typo_chance: 0.01,
        pause_frequency: 20,
        pause_min: 0.2,
        pause_max: 0.6,
        burst_variability: 0.55,
        word_pause_multiplier: 1.05,
    },
];

fn base_delay_secs(wpm: u32) -> f64 {
    // Five characters per word.
    60.0 / (f64::from(wpm) * 5.0)
}

fn band_min_delay(wpm: u32, band: &Band) -> f64 {
    base_delay_secs(wpm) * (1.0 - band.variation_percent / 100.0 * 0.7)
}

/// Shortest delay for `wpm`, never above that of any slower speed.
///
/// Variation narrows from band to band, so the first speed of a band would
/// otherwise wait longer than the last speed of the band below it.
fn min_delay_for(wpm: u32, band: &Band) -> f64 {
    BANDS
        .iter()
        .take_while(|lower| lower.below_wpm <= wpm)
        .map(|lower| band_min_delay(lower.below_wpm - 1, lower))
        .fold(band_min_delay(wpm, band), f64::min)
        .max(MIN_DELAY_FLOOR_SECS)
}

fn band_for(wpm: u32) -> &'static Band {
    BANDS
        .iter()
        .find(|band| wpm < band.below_wpm)
        .unwrap_or(&BANDS[BANDS.len() - 1])
}

/// Resolve a target speed into a full profile.
///
/// Out-of-range speeds are clamped into `MIN_WPM..=MAX_WPM` rather than
/// rejected, so every input yields a usable profile.
pub fn resolve_profile(target_wpm: u32) -> TypingProfile {
    let wpm = target_wpm.clamp(MIN_WPM, MAX_WPM);
    let band = band_for(wpm);

    let base_delay = base_delay_secs(wpm);

    // Humans overshoot on the slow side more than the fast side.
    let variation = band.variation_percent / 100.0;
    let min_delay = min_delay_for(wpm, band);
    let max_delay = (base_delay * (1.0 + variation * 1.3)).min(MAX_DELAY_CEILING_SECS);

    TypingProfile {
        target_wpm: wpm,
        category: SpeedCategory::for_wpm(wpm),
        min_delay_secs: min_delay,
        max_delay_secs: max_delay.max(min_delay),
        variation_percent: band.variation_percent,
        typo_chance: band.typo_chance,
        pause_frequency: band.pause_frequency,
        pause_duration_min_secs: band.pause_min,
        pause_duration_max_secs: band.pause_max,
        burst_variability: band.burst_variability,
        word_pause_multiplier: band.word_pause_multiplier,
    }
}

/// Where a session's profile comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileSource {
    Wpm(u32),
    Preset(SpeedCategory),
    Custom(TypingProfile),
}

impl ProfileSource {
    pub fn resolve(&self) -> TypingProfile {
        match self {
            ProfileSource::Wpm(wpm) => resolve_profile(*wpm),
            ProfileSource::Preset(category) => resolve_profile(category.preset_wpm()),
            ProfileSource::Custom(profile) => profile.clone(),
        }
    }
}

impl From<u32> for ProfileSource {
    fn from(wpm: u32) -> Self {
        ProfileSource::Wpm(wpm)
    }
}

impl From<TypingProfile> for ProfileSource {
    fn from(profile: TypingProfile) -> Self {
        ProfileSource::Custom(profile)
    }
}
