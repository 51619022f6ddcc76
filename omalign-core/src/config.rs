//! Aligner configuration
//!
//! Parameters can be loaded from an `omalign.toml` file; every field falls
//! back to its default when omitted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AlignError, AlignResult};
use crate::fuzzy::Tolerance;

/// Which extension engine the aligner runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignMode {
    /// Seed index lookup followed by turn-based extension
    SeedExtend,
    /// Matching-signal-pair graph chaining
    GraphChain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignerParams {
    #[serde(default = "default_mode")]
    pub mode: AlignMode,

    /// Number of consecutive inner segments per seed
    #[serde(default = "default_k")]
    pub k: usize,

    /// No-signal segments a seed may span
    #[serde(default)]
    pub max_nosignal: usize,

    /// Additive measurement error in bp
    #[serde(default = "default_meas")]
    pub meas: f64,

    /// Relative scaling range
    #[serde(default = "default_scale")]
    pub scale: f64,

    #[serde(default = "default_match_score")]
    pub match_score: f64,

    /// False-positive (extra query label) penalty
    #[serde(default = "default_penalty")]
    pub fpp: f64,

    /// False-negative (missing label) penalty
    #[serde(default = "default_penalty")]
    pub fnp: f64,

    /// Local alignment keeps the best prefix; global scores the full run
    #[serde(default = "default_true")]
    pub local: bool,

    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: usize,

    /// Hypotheses explored per extension anchor
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Seed hits allowed in a query neighborhood; 0 disables the filter
    #[serde(default = "default_max_seed_number")]
    pub max_seed_number: usize,

    /// Neighborhood radius in k-mer positions
    #[serde(default = "default_seed_neighborhood")]
    pub seed_neighborhood: usize,

    /// Missing or extra labels a single graph edge may span
    #[serde(default = "default_edge_error_limit")]
    pub edge_error_limit: usize,

    /// Limit on missing plus extra labels per graph transition
    #[serde(default = "default_combined_error_limit")]
    pub combined_error_limit: usize,

    #[serde(default = "default_min_signal")]
    pub min_signal: usize,

    /// Shortest query molecule, in bp, worth aligning
    #[serde(default)]
    pub min_size: i64,

    #[serde(default = "default_min_align_score")]
    pub min_align_score: f64,

    /// Keep alignments of a query onto an identical reference interval
    #[serde(default = "default_true")]
    pub allow_exact_match: bool,

    /// Query overlap above which the weaker of two records is dropped
    #[serde(default = "default_max_overlap_fraction")]
    pub max_overlap_fraction: f64,

    #[serde(default = "default_threads")]
    pub threads: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

// Default value functions
fn default_mode() -> AlignMode { AlignMode::SeedExtend }
fn default_k() -> usize { 3 }
fn default_meas() -> f64 { 500.0 }
fn default_scale() -> f64 { 0.05 }
fn default_match_score() -> f64 { 5.0 }
fn default_penalty() -> f64 { 2.0 }
fn default_true() -> bool { true }
fn default_max_consecutive_errors() -> usize { 5 }
fn default_max_turns() -> usize { 64 }
fn default_max_seed_number() -> usize { 1000 }
fn default_seed_neighborhood() -> usize { 5 }
fn default_edge_error_limit() -> usize { 2 }
fn default_combined_error_limit() -> usize { 3 }
fn default_min_signal() -> usize { 2 }
fn default_min_align_score() -> f64 { 20.0 }
fn default_max_overlap_fraction() -> f64 { 0.5 }
fn default_threads() -> usize { num_cpus::get() }
fn default_queue_capacity() -> usize { 64 }

impl Default for AlignerParams {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            k: default_k(),
            max_nosignal: 0,
            meas: default_meas(),
            scale: default_scale(),
            match_score: default_match_score(),
            fpp: default_penalty(),
            fnp: default_penalty(),
            local: true,
            max_consecutive_errors: default_max_consecutive_errors(),
            max_turns: default_max_turns(),
            max_seed_number: default_max_seed_number(),
            seed_neighborhood: default_seed_neighborhood(),
            edge_error_limit: default_edge_error_limit(),
            combined_error_limit: default_combined_error_limit(),
            min_signal: default_min_signal(),
            min_size: 0,
            min_align_score: default_min_align_score(),
            allow_exact_match: true,
            max_overlap_fraction: default_max_overlap_fraction(),
            threads: default_threads(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AlignerParams {
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.meas, self.scale)
    }

    /// Score of a transition with the given missing/extra label counts.
    pub fn transition_score(&self, missing: usize, extra: usize) -> f64 {
        self.match_score - self.fnp * missing as f64 - self.fpp * extra as f64
    }

    pub fn validate(&self) -> AlignResult<()> {
        if self.k == 0 {
            return Err(AlignError::InvalidParams("k must be at least 1".to_string()));
        }
        if !(self.meas >= 0.0) || !(self.scale >= 0.0) {
            return Err(AlignError::InvalidParams(format!(
                "tolerances must be non-negative (meas {}, scale {})",
                self.meas, self.scale
            )));
        }
        if self.match_score <= 0.0 {
            return Err(AlignError::InvalidParams("match score must be positive".to_string()));
        }
        if self.fpp < 0.0 || self.fnp < 0.0 {
            return Err(AlignError::InvalidParams("penalties must be non-negative".to_string()));
        }
        if self.max_turns == 0 {
            return Err(AlignError::InvalidParams("max_turns must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.max_overlap_fraction) {
            return Err(AlignError::InvalidParams(format!(
                "max_overlap_fraction {} outside [0, 1]",
                self.max_overlap_fraction
            )));
        }
        if self.threads == 0 || self.queue_capacity == 0 {
            return Err(AlignError::InvalidParams(
                "threads and queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load parameters from file, `omalign.toml` in the working directory, or defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let params = match config_path {
            Some(path) => {
                log::info!("Loading aligner parameters from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from("omalign.toml");
                if default_path.exists() {
                    log::info!("Loading aligner parameters from: omalign.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::info!("Using default aligner parameters");
                    Self::default()
                }
            }
        };

        Ok(params)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameter file: {}", path.display()))?;

        let params: AlignerParams = toml::from_str(&content)
            .with_context(|| format!("Failed to parse parameter file: {}", path.display()))?;

        params
            .validate()
            .with_context(|| format!("Invalid parameters in {}", path.display()))?;

        Ok(params)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize aligner parameters")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write parameter file: {}", path.display()))?;

        Ok(())
    }

    /// Example parameter file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default parameters")
    }
}
