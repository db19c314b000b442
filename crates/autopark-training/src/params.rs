//! Tunable parameters of a training run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{fitness::DEFAULT_FITNESS_ALPHA, genetic::SelectionParams};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ParamsError {
    #[display("generation size must be at least 2, got {size}")]
    GenerationSize { size: usize },
    #[display("batch size must be positive")]
    BatchSize,
    #[display("generation lifetime must be positive")]
    Lifetime,
    #[display("mutation probability must be within [0, 1], got {probability}")]
    MutationProbability { probability: f64 },
    #[display("elitism percentage must be within [0, 100], got {percentage}")]
    ElitismPercentage { percentage: f64 },
    #[display("loss increase threshold must be positive, got {percent}")]
    LossIncreaseThreshold { percent: f64 },
    #[display("fitness alpha must be positive, got {alpha}")]
    FitnessAlpha { alpha: f64 },
}

/// Parameters of an evolution run.
///
/// Missing fields take their [`Default`] values when deserializing, so a configuration
/// file only needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvolutionParams {
    /// Number of genomes per generation
    pub generation_size: usize,
    /// Number of candidates simulated at once
    pub batch_size: usize,
    /// How long each batch is simulated before its losses are collected
    pub generation_lifetime_seconds: u64,
    /// Probability of flipping each gene of a bred child
    pub mutation_probability: f64,
    /// Share of the generation (0–100) carried over unchanged
    pub elitism_percentage: f64,
    /// Whether degenerate batches are retried
    pub bad_simulation_retries_enabled: bool,
    /// How many times a generation may be restarted in a row
    pub bad_simulation_retry_count: usize,
    /// Batch index at which the loss history is checked
    pub bad_simulation_check_batch_index: usize,
    /// Retry when the newest minimum loss exceeds this percentage of the previous one
    pub bad_simulation_loss_increase_threshold_percent: f64,
    /// Opaque flag for the simulator: trade visual fidelity for speed
    pub performance_boost: bool,
    /// Scale of the loss in the fitness transform
    pub fitness_alpha: f64,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            generation_size: 100,
            batch_size: 25,
            generation_lifetime_seconds: 17,
            mutation_probability: 0.04,
            elitism_percentage: 6.0,
            bad_simulation_retries_enabled: true,
            bad_simulation_retry_count: 2,
            bad_simulation_check_batch_index: 1,
            bad_simulation_loss_increase_threshold_percent: 110.0,
            performance_boost: false,
            fitness_alpha: DEFAULT_FITNESS_ALPHA,
        }
    }
}

impl EvolutionParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.generation_size < 2 {
            return Err(ParamsError::GenerationSize {
                size: self.generation_size,
            });
        }
        if self.batch_size == 0 {
            return Err(ParamsError::BatchSize);
        }
        if self.generation_lifetime_seconds == 0 {
            return Err(ParamsError::Lifetime);
        }
        if !(0.0..=1.0).contains(&self.mutation_probability) {
            return Err(ParamsError::MutationProbability {
                probability: self.mutation_probability,
            });
        }
        if !(0.0..=100.0).contains(&self.elitism_percentage) {
            return Err(ParamsError::ElitismPercentage {
                percentage: self.elitism_percentage,
            });
        }
        let threshold = self.bad_simulation_loss_increase_threshold_percent;
        if threshold.is_nan() || threshold <= 0.0 {
            return Err(ParamsError::LossIncreaseThreshold { percent: threshold });
        }
        if self.fitness_alpha.is_nan() || self.fitness_alpha <= 0.0 {
            return Err(ParamsError::FitnessAlpha {
                alpha: self.fitness_alpha,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn generation_lifetime(&self) -> Duration {
        Duration::from_secs(self.generation_lifetime_seconds)
    }

    /// Number of batches needed to evaluate one generation.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.generation_size.div_ceil(self.batch_size.max(1))
    }

    #[must_use]
    pub fn selection_params(&self) -> SelectionParams {
        SelectionParams {
            mutation_probability: self.mutation_probability,
            elitism_percentage: self.elitism_percentage,
        }
    }
}
