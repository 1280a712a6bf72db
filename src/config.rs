//! Configuration loading for Seedbed.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.seedbed/config.toml`)
//! 3. User config (`~/.seedbed/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! Every constant the scheduler uses (intervals, steps, mastery threshold,
//! level-up ratio, XP table) lives here so it can be calibrated without
//! touching the engine.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::MasteryLabel;
use crate::error::{Result, SeedbedError};

/// Main configuration struct for Seedbed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Graded ladder (radicals, kanji, vocabulary).
    pub graded: GradedConfig,
    /// Numeric ladder (words, cloze sentences).
    pub numeric: NumericConfig,
    /// Promotion/demotion rules shared by both ladders.
    pub scheduling: SchedulingConfig,
    /// Level progression.
    pub unlock: UnlockConfig,
    /// Experience points per promotion.
    pub reward: RewardConfig,
}

/// Number of active stages on the graded ladder (seed..tree).
pub const GRADED_ACTIVE_STAGES: usize = 5;

/// Number of mastery labels above `unstarted`.
pub const MASTERY_DEPTHS: usize = 5;

/// Graded ladder configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GradedConfig {
    /// Review interval in hours for seed, sprout, seedling, plant, tree.
    pub intervals_hours: Vec<u32>,
}

impl Default for GradedConfig {
    fn default() -> Self {
        Self {
            intervals_hours: vec![4, 24, 72, 168, 720],
        }
    }
}

/// Numeric ladder configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NumericConfig {
    /// Highest level.
    pub max_level: u8,
    /// Review interval in hours for levels 1..=max_level.
    pub intervals_hours: Vec<u32>,
    /// Minimum level for each label seed, sprout, seedling, plant, tree.
    pub label_breakpoints: Vec<u8>,
}

impl Default for NumericConfig {
    fn default() -> Self {
        Self {
            max_level: 10,
            intervals_hours: vec![4, 8, 24, 48, 96, 168, 336, 720, 1440, 2880],
            label_breakpoints: vec![1, 3, 5, 7, 9],
        }
    }
}

/// Promotion and demotion rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Stages gained on an `easy` rating.
    pub easy_step: u8,
    /// Stages gained on `medium` or `correct`.
    pub correct_step: u8,
    /// Stages lost on `hard`, `impossible`, or `incorrect`.
    pub lapse_step: u8,
    /// Lowest label that satisfies a prerequisite.
    pub mastery_label: MasteryLabel,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            easy_step: 2,
            correct_step: 1,
            lapse_step: 1,
            mastery_label: MasteryLabel::Seedling,
        }
    }
}

/// Level progression configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnlockConfig {
    /// Fraction of a level's items that must be mastered to open the next level.
    pub level_up_threshold: f64,
}

impl UnlockConfig {
    /// Check if a threshold is valid (finite, in (0.0, 1.0]).
    pub fn is_valid_threshold(value: f64) -> bool {
        value.is_finite() && value > 0.0 && value <= 1.0
    }
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            level_up_threshold: 0.9,
        }
    }
}

/// Experience point table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewardConfig {
    /// Points for a promotion landing on seed, sprout, seedling, plant, tree.
    pub xp_by_depth: Vec<u32>,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            xp_by_depth: vec![1, 2, 4, 8, 16],
        }
    }
}

/// Check that a list is non-empty, positive and strictly increasing.
fn check_increasing(name: &str, values: &[u32]) -> Result<()> {
    if values.first().is_some_and(|v| *v == 0) {
        return Err(SeedbedError::config(format!("{} must be positive", name)));
    }
    if values.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SeedbedError::config(format!(
            "{} must be strictly increasing",
            name
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (`.seedbed/config.toml` in cwd)
    /// 3. User config (`~/.seedbed/config.toml`)
    /// 4. Defaults
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.seedbed/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = seedbed_home()?;
        Self::load_from_file(&home.join("config.toml")).ok()
    }

    /// Load project config from `.seedbed/config.toml` in the given directory.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        let config_path = cwd.join(".seedbed").join("config.toml");
        if !config_path.exists() {
            return None;
        }
        match Self::load_from_file(&config_path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "ignoring project config");
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| SeedbedError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| SeedbedError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        for (var, slot) in [
            ("SEEDBED_EASY_STEP", &mut self.scheduling.easy_step),
            ("SEEDBED_CORRECT_STEP", &mut self.scheduling.correct_step),
            ("SEEDBED_LAPSE_STEP", &mut self.scheduling.lapse_step),
        ] {
            if let Ok(val) = env::var(var) {
                match val.parse::<u8>() {
                    Ok(n) if n >= 1 => *slot = n,
                    _ => tracing::warn!(
                        "Invalid {} value '{}'. Expected a positive integer. Using '{}'.",
                        var,
                        val,
                        slot
                    ),
                }
            }
        }

        if let Ok(val) = env::var("SEEDBED_MASTERY_LABEL") {
            match val.parse::<MasteryLabel>() {
                Ok(label) if label != MasteryLabel::Unstarted => {
                    self.scheduling.mastery_label = label
                }
                _ => tracing::warn!(
                    "Invalid SEEDBED_MASTERY_LABEL value '{}'. Using '{}'.",
                    val,
                    self.scheduling.mastery_label
                ),
            }
        }

        if let Ok(val) = env::var("SEEDBED_LEVEL_UP_THRESHOLD") {
            match val.parse::<f64>() {
                Ok(n) if UnlockConfig::is_valid_threshold(n) => {
                    self.unlock.level_up_threshold = n
                }
                _ => tracing::warn!(
                    "Invalid SEEDBED_LEVEL_UP_THRESHOLD value '{}'. \
                    Must be in range (0.0, 1.0]. Using '{}'.",
                    val,
                    self.unlock.level_up_threshold
                ),
            }
        }
    }

    /// Merge another config into this one.
    ///
    /// The `other` config takes precedence for every field that differs from
    /// the default. A layer cannot set a value back to its default to
    /// override a lower layer.
    fn merge(mut self, other: Config) -> Self {
        let default = Config::default();

        if other.graded.intervals_hours != default.graded.intervals_hours {
            self.graded.intervals_hours = other.graded.intervals_hours;
        }

        if other.numeric.max_level != default.numeric.max_level {
            self.numeric.max_level = other.numeric.max_level;
        }
        if other.numeric.intervals_hours != default.numeric.intervals_hours {
            self.numeric.intervals_hours = other.numeric.intervals_hours;
        }
        if other.numeric.label_breakpoints != default.numeric.label_breakpoints {
            self.numeric.label_breakpoints = other.numeric.label_breakpoints;
        }

        if other.scheduling.easy_step != default.scheduling.easy_step {
            self.scheduling.easy_step = other.scheduling.easy_step;
        }
        if other.scheduling.correct_step != default.scheduling.correct_step {
            self.scheduling.correct_step = other.scheduling.correct_step;
        }
        if other.scheduling.lapse_step != default.scheduling.lapse_step {
            self.scheduling.lapse_step = other.scheduling.lapse_step;
        }
        if other.scheduling.mastery_label != default.scheduling.mastery_label {
            self.scheduling.mastery_label = other.scheduling.mastery_label;
        }

        if other.unlock.level_up_threshold != default.unlock.level_up_threshold {
            self.unlock.level_up_threshold = other.unlock.level_up_threshold;
        }

        if other.reward.xp_by_depth != default.reward.xp_by_depth {
            self.reward.xp_by_depth = other.reward.xp_by_depth;
        }

        self
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.graded.intervals_hours.len() != GRADED_ACTIVE_STAGES {
            return Err(SeedbedError::config(format!(
                "graded.intervals_hours needs {} entries (seed..tree), got {}",
                GRADED_ACTIVE_STAGES,
                self.graded.intervals_hours.len()
            )));
        }
        check_increasing("graded.intervals_hours", &self.graded.intervals_hours)?;

        let max_level = self.numeric.max_level as usize;
        if max_level < MASTERY_DEPTHS {
            return Err(SeedbedError::config(format!(
                "numeric.max_level must be at least {}",
                MASTERY_DEPTHS
            )));
        }
        if self.numeric.intervals_hours.len() != max_level {
            return Err(SeedbedError::config(format!(
                "numeric.intervals_hours needs {} entries (levels 1..={}), got {}",
                max_level,
                max_level,
                self.numeric.intervals_hours.len()
            )));
        }
        check_increasing("numeric.intervals_hours", &self.numeric.intervals_hours)?;

        let breakpoints = &self.numeric.label_breakpoints;
        if breakpoints.len() != MASTERY_DEPTHS {
            return Err(SeedbedError::config(format!(
                "numeric.label_breakpoints needs {} entries (seed..tree)",
                MASTERY_DEPTHS
            )));
        }
        let as_u32: Vec<u32> = breakpoints.iter().map(|b| *b as u32).collect();
        check_increasing("numeric.label_breakpoints", &as_u32)?;
        if breakpoints.last().is_some_and(|b| *b > self.numeric.max_level) {
            return Err(SeedbedError::config(
                "numeric.label_breakpoints exceed numeric.max_level",
            ));
        }

        let scheduling = &self.scheduling;
        if scheduling.easy_step == 0 || scheduling.correct_step == 0 || scheduling.lapse_step == 0
        {
            return Err(SeedbedError::config("scheduling steps must be at least 1"));
        }
        if scheduling.easy_step < scheduling.correct_step {
            return Err(SeedbedError::config(
                "scheduling.easy_step cannot be smaller than scheduling.correct_step",
            ));
        }
        if scheduling.mastery_label == MasteryLabel::Unstarted {
            return Err(SeedbedError::config(
                "scheduling.mastery_label cannot be 'unstarted'",
            ));
        }

        if !UnlockConfig::is_valid_threshold(self.unlock.level_up_threshold) {
            return Err(SeedbedError::config(
                "unlock.level_up_threshold must be in range (0.0, 1.0]",
            ));
        }

        if self.reward.xp_by_depth.len() != MASTERY_DEPTHS {
            return Err(SeedbedError::config(format!(
                "reward.xp_by_depth needs {} entries (seed..tree)",
                MASTERY_DEPTHS
            )));
        }
        check_increasing("reward.xp_by_depth", &self.reward.xp_by_depth)?;

        Ok(())
    }

    /// Save configuration to the project config file.
    ///
    /// Writes `.seedbed/config.toml` via temp file + rename.
    pub fn save_project(&self, cwd: &Path) -> Result<()> {
        let dir = cwd.join(".seedbed");
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| SeedbedError::storage(&dir, e))?;
        }

        let config_path = dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| SeedbedError::config(e.to_string()))?;

        let temp_path = dir.join(".config.toml.tmp");
        fs::write(&temp_path, &content).map_err(|e| SeedbedError::storage(&temp_path, e))?;
        fs::rename(&temp_path, &config_path).map_err(|e| SeedbedError::storage(&config_path, e))?;

        Ok(())
    }
}

/// Get the Seedbed home directory.
///
/// Checks `SEEDBED_HOME` first, then falls back to `~/.seedbed`.
pub fn seedbed_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("SEEDBED_HOME") {
        if home.is_empty() {
            tracing::warn!("SEEDBED_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("SEEDBED_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    dirs::home_dir().map(|home| home.join(".seedbed"))
}

/// Directory holding one JSON file per item kind.
///
/// Returns `<seedbed_home>/items/`.
pub fn items_dir() -> Option<PathBuf> {
    seedbed_home().map(|h| h.join("items"))
}

/// Path of the append-only XP log.
///
/// Returns `<seedbed_home>/xp.log`.
pub fn xp_log_path() -> Option<PathBuf> {
    seedbed_home().map(|h| h.join("xp.log"))
}
