//! Serialized snapshot of a training run.
//!
//! The JSON shape is shared with existing checkpoint files:
//!
//! ```json
//! {
//!   "dateTime": "2026-10-16T09:30:00Z",
//!   "generationIndex": 12,
//!   "lossHistory": [31.2, 28.9],
//!   "avgLossHistory": [40.1, 37.5],
//!   "performanceBoost": false,
//!   "generationSize": 100,
//!   "generationLifetime": 17,
//!   "carsBatchSize": 25,
//!   "mutationProbability": 0.04,
//!   "longLivingChampionsPercentage": 6,
//!   "generation": [[0, 1, 1, 0], [1, 0, 0, 1]]
//! }
//! ```

use autopark_genome::{EncodingError, Genome, GenomeLayout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::{EvolutionParams, ParamsError};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum RestoreError {
    #[display("checkpoint holds {actual} genomes but declares a generation size of {expected}")]
    PopulationSize { expected: usize, actual: usize },
    #[display("genome #{genome_index} does not fit the genome layout: {source}")]
    GenomeLength {
        genome_index: usize,
        source: EncodingError,
    },
    #[display("loss histories differ in length ({min_len} and {avg_len})")]
    HistoryLength { min_len: usize, avg_len: usize },
    #[display("loss history has {len} entries, more than generations up to #{generation_index}")]
    HistoryAhead { len: usize, generation_index: usize },
    #[display("checkpoint parameters are invalid: {source}")]
    InvalidParams { source: ParamsError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub date_time: DateTime<Utc>,
    pub generation_index: usize,
    /// Minimum loss per generation
    pub loss_history: Vec<f64>,
    /// Mean of the best half of the losses per generation
    pub avg_loss_history: Vec<f64>,
    pub performance_boost: bool,
    pub generation_size: usize,
    #[serde(rename = "generationLifetime")]
    pub generation_lifetime_seconds: u64,
    #[serde(rename = "carsBatchSize")]
    pub batch_size: usize,
    pub mutation_probability: f64,
    #[serde(rename = "longLivingChampionsPercentage")]
    pub elitism_percentage: f64,
    pub generation: Vec<Genome>,
}

impl Checkpoint {
    /// Returns `base` with the run parameters stored in this checkpoint.
    ///
    /// Parameters not stored in checkpoints (retry policy, fitness alpha) keep the
    /// values from `base`.
    #[must_use]
    pub fn params(&self, base: &EvolutionParams) -> EvolutionParams {
        EvolutionParams {
            generation_size: self.generation_size,
            batch_size: self.batch_size,
            generation_lifetime_seconds: self.generation_lifetime_seconds,
            mutation_probability: self.mutation_probability,
            elitism_percentage: self.elitism_percentage,
            performance_boost: self.performance_boost,
            ..base.clone()
        }
    }

    /// Checks that this checkpoint can seed a run using `layout` and `base` parameters.
    pub fn validate(
        &self,
        layout: &GenomeLayout,
        base: &EvolutionParams,
    ) -> Result<(), RestoreError> {
        self.params(base)
            .validate()
            .map_err(|source| RestoreError::InvalidParams { source })?;

        if self.generation.len() != self.generation_size {
            return Err(RestoreError::PopulationSize {
                expected: self.generation_size,
                actual: self.generation.len(),
            });
        }

        for (genome_index, genome) in self.generation.iter().enumerate() {
            layout
                .validate(genome)
                .map_err(|source| RestoreError::GenomeLength {
                    genome_index,
                    source,
                })?;
        }

        if self.loss_history.len() != self.avg_loss_history.len() {
            return Err(RestoreError::HistoryLength {
                min_len: self.loss_history.len(),
                avg_len: self.avg_loss_history.len(),
            });
        }
        if self.loss_history.len() > self.generation_index + 1 {
            return Err(RestoreError::HistoryAhead {
                len: self.loss_history.len(),
                generation_index: self.generation_index,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use autopark_genome::Gene;
    use chrono::TimeZone as _;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;
    use crate::genetic::create_generation;

    fn sample_checkpoint(layout: &GenomeLayout) -> Checkpoint {
        let mut rng = Pcg32::seed_from_u64(42);
        Checkpoint {
            date_time: Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap(),
            generation_index: 3,
            loss_history: vec![31.25, 28.9, 0.1 + 0.2],
            avg_loss_history: vec![40.0, 37.123_456_789, 1.0 / 3.0],
            performance_boost: true,
            generation_size: 6,
            generation_lifetime_seconds: 17,
            batch_size: 4,
            mutation_probability: 0.04,
            elitism_percentage: 6.0,
            generation: create_generation(6, layout.genome_length(), &mut rng),
        }
    }

    #[test]
    fn test_json_field_names() {
        let layout = GenomeLayout::new(1, autopark_genome::PrecisionConfig::REDUCED);
        let checkpoint = sample_checkpoint(&layout);
        let value = serde_json::to_value(&checkpoint).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "dateTime",
            "generationIndex",
            "lossHistory",
            "avgLossHistory",
            "performanceBoost",
            "generationSize",
            "generationLifetime",
            "carsBatchSize",
            "mutationProbability",
            "longLivingChampionsPercentage",
            "generation",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object.len(), 11);
        assert_eq!(object["dateTime"], "2026-10-16T09:30:00Z");
        assert!(object["generation"][0][0].is_u64());
    }

    #[test]
    fn test_json_roundtrip_is_identical() {
        let layout = GenomeLayout::PRODUCTION;
        let checkpoint = sample_checkpoint(&layout);
        let json = serde_json::to_string_pretty(&checkpoint).unwrap();
        let restored: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, checkpoint);
        assert_eq!(restored.loss_history[2].to_bits(), (0.1_f64 + 0.2).to_bits());
        assert_eq!(serde_json::to_string_pretty(&restored).unwrap(), json);
    }

    #[test]
    fn test_parses_javascript_timestamps() {
        let json = r#"{
            "dateTime": "2021-05-01T10:20:30.456Z",
            "generationIndex": 0,
            "lossHistory": [],
            "avgLossHistory": [],
            "performanceBoost": false,
            "generationSize": 2,
            "generationLifetime": 10,
            "carsBatchSize": 1,
            "mutationProbability": 0.5,
            "longLivingChampionsPercentage": 0,
            "generation": [[0, 1], [1, 0]]
        }"#;
        let checkpoint: Checkpoint = serde_json::from_str(json).unwrap();
        assert_eq!(checkpoint.generation[1].genes(), &[Gene::One, Gene::Zero]);
        assert_eq!(checkpoint.elitism_percentage, 0.0);
    }

    #[test]
    fn test_validate_accepts_consistent_checkpoint() {
        let layout = GenomeLayout::PRODUCTION;
        sample_checkpoint(&layout)
            .validate(&layout, &EvolutionParams::default())
            .unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_population_size() {
        let layout = GenomeLayout::PRODUCTION;
        let mut checkpoint = sample_checkpoint(&layout);
        checkpoint.generation.pop();
        let err = checkpoint
            .validate(&layout, &EvolutionParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RestoreError::PopulationSize {
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_genome_length() {
        let layout = GenomeLayout::PRODUCTION;
        let mut checkpoint = sample_checkpoint(&layout);
        checkpoint.generation[4] = Genome::new(vec![Gene::One; 90]);
        let err = checkpoint
            .validate(&layout, &EvolutionParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RestoreError::GenomeLength {
                genome_index: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_invalid_params() {
        let layout = GenomeLayout::PRODUCTION;
        let mut checkpoint = sample_checkpoint(&layout);
        checkpoint.batch_size = 0;
        let err = checkpoint
            .validate(&layout, &EvolutionParams::default())
            .unwrap_err();
        assert!(matches!(err, RestoreError::InvalidParams { .. }));
    }

    #[test]
    fn test_validate_rejects_history_beyond_generation() {
        let layout = GenomeLayout::PRODUCTION;
        let mut checkpoint = sample_checkpoint(&layout);
        // an entry for the active generation is allowed
        checkpoint.loss_history.push(27.0);
        checkpoint.avg_loss_history.push(35.0);
        checkpoint
            .validate(&layout, &EvolutionParams::default())
            .unwrap();

        checkpoint.loss_history.push(26.0);
        checkpoint.avg_loss_history.push(34.0);
        let err = checkpoint
            .validate(&layout, &EvolutionParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RestoreError::HistoryAhead {
                len: 5,
                generation_index: 3
            }
        ));
    }

    #[test]
    fn test_params_keep_unstored_fields() {
        let layout = GenomeLayout::PRODUCTION;
        let checkpoint = sample_checkpoint(&layout);
        let base = EvolutionParams {
            bad_simulation_retry_count: 9,
            ..EvolutionParams::default()
        };
        let params = checkpoint.params(&base);
        assert_eq!(params.generation_size, 6);
        assert_eq!(params.batch_size, 4);
        assert!(params.performance_boost);
        assert_eq!(params.bad_simulation_retry_count, 9);
    }
}
