use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::rank::DEFAULT_TIE_EPSILON;
use crate::core::scoring::ScoringParams;
use crate::core::types::{language_group_for_extension, LanguageGroup};
use crate::session::DEFAULT_SESSION_DAMPENING;

pub const CONFIG_ENV_VAR: &str = "CODE_NGRAM_CONFIG";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SuggestConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub suggest: SuggestSettings,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub languages: LanguageConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl SuggestConfig {
    /// Loads the config from `path`, or from the resolved default location.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => match resolve_config_path() {
                Some(path) => path,
                None => return Ok(SuggestConfig::default()),
            },
        };
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config file {}", config_path.display()))?;
            return Self::from_toml(&raw)
                .with_context(|| format!("failed to parse TOML from {}", config_path.display()));
        }

        Ok(SuggestConfig::default())
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// The immutable parameter set handed to every scoring call.
    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams {
            max_results: self.suggest.max_results,
            min_confidence: self.suggest.min_confidence,
            fuzzy: self.suggest.fuzzy,
            fuzzy_budget: self.suggest.fuzzy_budget,
            smoothing: self.suggest.smoothing,
            fuzzy_dampening: self.scoring.fuzzy_dampening,
            fuzzy_threshold_ratio: self.scoring.fuzzy_threshold_ratio,
            smoothed_fuzzy_threshold_ratio: self.scoring.smoothed_fuzzy_threshold_ratio,
            fuzzy_trigger_multiple: self.scoring.fuzzy_trigger_multiple,
            fuzzy_overflow_multiple: self.scoring.fuzzy_overflow_multiple,
        }
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV_VAR) {
        return Some(Path::new(&path).to_path_buf());
    }

    dirs::config_dir().map(|base| base.join("code-ngram").join("config.toml"))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModelConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestSettings {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_true")]
    pub fuzzy: bool,
    #[serde(default = "default_fuzzy_budget")]
    pub fuzzy_budget: usize,
    #[serde(default = "default_true")]
    pub smoothing: bool,
    #[serde(default = "default_true")]
    pub session_index: bool,
}

impl Default for SuggestSettings {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_confidence: default_min_confidence(),
            fuzzy: default_true(),
            fuzzy_budget: default_fuzzy_budget(),
            smoothing: default_true(),
            session_index: default_true(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

fn default_min_confidence() -> f64 {
    0.1
}

fn default_fuzzy_budget() -> usize {
    5_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_fuzzy_dampening")]
    pub fuzzy_dampening: f64,
    #[serde(default = "default_session_dampening")]
    pub session_dampening: f64,
    #[serde(default = "default_fuzzy_threshold_ratio")]
    pub fuzzy_threshold_ratio: f64,
    #[serde(default = "default_smoothed_fuzzy_threshold_ratio")]
    pub smoothed_fuzzy_threshold_ratio: f64,
    #[serde(default = "default_fuzzy_trigger_multiple")]
    pub fuzzy_trigger_multiple: usize,
    #[serde(default = "default_fuzzy_overflow_multiple")]
    pub fuzzy_overflow_multiple: usize,
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            fuzzy_dampening: default_fuzzy_dampening(),
            session_dampening: default_session_dampening(),
            fuzzy_threshold_ratio: default_fuzzy_threshold_ratio(),
            smoothed_fuzzy_threshold_ratio: default_smoothed_fuzzy_threshold_ratio(),
            fuzzy_trigger_multiple: default_fuzzy_trigger_multiple(),
            fuzzy_overflow_multiple: default_fuzzy_overflow_multiple(),
            tie_epsilon: default_tie_epsilon(),
        }
    }
}

fn default_fuzzy_dampening() -> f64 {
    0.8
}

fn default_session_dampening() -> f64 {
    DEFAULT_SESSION_DAMPENING
}

fn default_fuzzy_threshold_ratio() -> f64 {
    0.5
}

fn default_smoothed_fuzzy_threshold_ratio() -> f64 {
    0.3
}

fn default_fuzzy_trigger_multiple() -> usize {
    2
}

fn default_fuzzy_overflow_multiple() -> usize {
    5
}

fn default_tie_epsilon() -> f64 {
    DEFAULT_TIE_EPSILON
}

/// Extensions that share suggestions, e.g. a script and its templating variant.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "default_equivalents")]
    pub equivalents: Vec<Vec<String>>,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            equivalents: default_equivalents(),
        }
    }
}

impl LanguageConfig {
    /// Language groups to query for `extension`: the extension's own group
    /// first, then the other members of its equivalence class in config order.
    pub fn groups_for(&self, extension: &str) -> Vec<LanguageGroup> {
        let own = language_group_for_extension(extension);
        let mut groups = vec![own.clone()];
        for class in &self.equivalents {
            let members: Vec<LanguageGroup> = class.iter().map(|e| language_group_for_extension(e)).collect();
            if members.contains(&own) {
                for member in members {
                    if !groups.contains(&member) {
                        groups.push(member);
                    }
                }
            }
        }
        groups
    }
}

fn default_equivalents() -> Vec<Vec<String>> {
    [
        vec![".js", ".jsx", ".mjs", ".cjs"],
        vec![".ts", ".tsx"],
        vec![".cs", ".cshtml", ".razor"],
        vec![".py", ".pyi"],
    ]
    .into_iter()
    .map(|class| class.into_iter().map(str::to_string).collect())
    .collect()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionConfig {
    /// Where the session snapshot is saved on shutdown and restored on start.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}
