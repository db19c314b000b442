//! Offline stand-in for the parking simulator.
//!
//! Instead of driving a car, a candidate is scored on a fixed set of synthetic sensor
//! sweeps: for every sweep the controls decoded from its genome are compared with those
//! of a reference parking heuristic. The loss is the percentage of disagreeing decisions
//! plus Gaussian noise, which mimics the run-to-run variance of a physics simulation.

use std::collections::VecDeque;

use autopark_genome::{CarControls, ControlDecoder, EngineMode, GenomeLayout, WheelMode};
use autopark_training::scheduler::{Batch, CandidateId, Simulator};
use rand::Rng;
use rand_distr::{Distribution as _, Normal};
use rand_pcg::Pcg32;

/// Longest distance a sensor ray can detect.
const MAX_RANGE: f64 = 5.0;
/// Obstacles closer than this block the way.
const SAFE_DISTANCE: f64 = 1.5;
/// Sensors whose ray hits nothing in a sweep.
const MISS_PROBABILITY: f64 = 0.3;
/// Sweeps evaluated per simulated second of lifetime.
const SWEEPS_PER_SECOND: u64 = 8;

/// Ray indices, clockwise from the front of the car.
const FRONT: usize = 0;
const BACK: usize = 4;
const RIGHT_SIDE: [usize; 3] = [1, 2, 3];
const LEFT_SIDE: [usize; 3] = [5, 6, 7];

/// Ray hit distances of one tick; `None` when a ray hit nothing.
type Sweep = Vec<Option<f64>>;

/// Controls of the reference heuristic: drive towards free space and steer to the side
/// with more room.
fn reference_controls(sweep: &[Option<f64>]) -> CarControls {
    let is_clear = |i: usize| sweep[i].is_none_or(|distance| distance > SAFE_DISTANCE);
    let room = |side: [usize; 3]| {
        side.iter()
            .map(|&i| sweep[i].unwrap_or(MAX_RANGE))
            .sum::<f64>()
    };

    let engine = if is_clear(FRONT) {
        EngineMode::Forwards
    } else if is_clear(BACK) {
        EngineMode::Backwards
    } else {
        EngineMode::Neutral
    };
    let (left, right) = (room(LEFT_SIDE), room(RIGHT_SIDE));
    let wheel = if (left - right).abs() < 1.0 {
        WheelMode::Straight
    } else if left > right {
        WheelMode::Left
    } else {
        WheelMode::Right
    };
    CarControls { engine, wheel }
}

fn random_sweep<R>(sensor_count: usize, rng: &mut R) -> Sweep
where
    R: Rng + ?Sized,
{
    (0..sensor_count)
        .map(|_| {
            if rng.random_bool(MISS_PROBABILITY) {
                None
            } else {
                Some(rng.random_range(0.1..MAX_RANGE))
            }
        })
        .collect()
}

/// A simulator that evaluates dispatched batches on demand.
#[derive(Debug, Clone)]
pub struct SurrogateSimulator {
    layout: GenomeLayout,
    sweeps: Vec<(Vec<f64>, CarControls)>,
    noise: Normal<f64>,
    rng: Pcg32,
    pending: VecDeque<Batch>,
}

impl SurrogateSimulator {
    /// Creates a simulator with `lifetime_seconds × 8` sweeps, halved in performance mode.
    pub fn new(
        layout: GenomeLayout,
        lifetime_seconds: u64,
        performance_boost: bool,
        noise_std_dev: f64,
        mut rng: Pcg32,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            layout.sensor_count >= 8,
            "surrogate simulator needs 8 sensors, layout has {}",
            layout.sensor_count
        );
        let mut sweep_count = lifetime_seconds * SWEEPS_PER_SECOND;
        if performance_boost {
            sweep_count = sweep_count.div_ceil(2);
        }
        let sweeps = (0..sweep_count.max(1))
            .map(|_| {
                let sweep = random_sweep(layout.sensor_count, &mut rng);
                let expected = reference_controls(&sweep);
                (autopark_genome::sensor_readings(&sweep), expected)
            })
            .collect();
        Ok(Self {
            layout,
            sweeps,
            noise: Normal::new(0.0, noise_std_dev)?,
            rng,
            pending: VecDeque::new(),
        })
    }

    #[must_use]
    pub fn sweep_count(&self) -> usize {
        self.sweeps.len()
    }

    /// Scores the oldest dispatched batch.
    ///
    /// Returns the batch's generation index and a loss per candidate, or `None` when
    /// nothing is pending.
    pub fn evaluate_next(&mut self) -> anyhow::Result<Option<(usize, Vec<(CandidateId, f64)>)>> {
        let Some(batch) = self.pending.pop_front() else {
            return Ok(None);
        };
        let mut losses = Vec::with_capacity(batch.candidates.len());
        for candidate in batch.candidates {
            let decoder = ControlDecoder::new(&self.layout, &candidate.genome)?;
            let loss = self.disagreement(&decoder)? + self.noise.sample(&mut self.rng);
            losses.push((candidate.id, loss.max(0.0)));
        }
        Ok(Some((batch.generation_index, losses)))
    }

    /// Percentage of engine and wheel decisions that differ from the reference.
    #[expect(clippy::cast_precision_loss)]
    fn disagreement(&self, decoder: &ControlDecoder) -> anyhow::Result<f64> {
        let mut mismatches = 0_usize;
        for (readings, expected) in &self.sweeps {
            let controls = decoder.decide(readings)?;
            mismatches += usize::from(controls.engine != expected.engine);
            mismatches += usize::from(controls.wheel != expected.wheel);
        }
        Ok(100.0 * mismatches as f64 / (2 * self.sweeps.len()) as f64)
    }
}

impl Simulator for SurrogateSimulator {
    fn dispatch(&mut self, batch: Batch) {
        self.pending.push_back(batch);
    }

    fn batch_ended(&mut self, generation_index: usize, batch_index: usize) {
        self.pending.retain(|batch| {
            (batch.generation_index, batch.batch_index) != (generation_index, batch_index)
        });
    }
}

#[cfg(test)]
mod tests {
    use autopark_genome::{DecodedGenome, Genome};
    use autopark_training::scheduler::Candidate;
    use rand::SeedableRng as _;

    use super::*;

    fn simulator(noise: f64) -> SurrogateSimulator {
        SurrogateSimulator::new(
            GenomeLayout::PRODUCTION,
            4,
            false,
            noise,
            Pcg32::seed_from_u64(3),
        )
        .unwrap()
    }

    fn batch_of(genomes: Vec<Genome>) -> Batch {
        Batch {
            generation_index: 0,
            batch_index: 0,
            candidates: genomes
                .into_iter()
                .enumerate()
                .map(|(genome_index, genome)| Candidate {
                    id: CandidateId::from(format!("AA-{genome_index:03}-AA")),
                    genome_index,
                    genome,
                })
                .collect(),
        }
    }

    #[test]
    fn test_reference_controls() {
        let mut sweep = vec![None; 8];
        assert_eq!(
            reference_controls(&sweep),
            CarControls {
                engine: EngineMode::Forwards,
                wheel: WheelMode::Straight,
            }
        );

        sweep[FRONT] = Some(0.5);
        sweep[2] = Some(0.5);
        let controls = reference_controls(&sweep);
        assert_eq!(controls.engine, EngineMode::Backwards);
        assert_eq!(controls.wheel, WheelMode::Left);

        sweep[BACK] = Some(1.0);
        assert_eq!(reference_controls(&sweep).engine, EngineMode::Neutral);
    }

    #[test]
    fn test_sweep_count_follows_lifetime() {
        assert_eq!(simulator(0.0).sweep_count(), 32);
        let boosted = SurrogateSimulator::new(
            GenomeLayout::PRODUCTION,
            17,
            true,
            0.0,
            Pcg32::seed_from_u64(3),
        )
        .unwrap();
        assert_eq!(boosted.sweep_count(), 68);
    }

    #[test]
    fn test_losses_are_percentages() {
        let mut simulator = simulator(0.0);
        let mut rng = Pcg32::seed_from_u64(4);
        let genomes = autopark_training::genetic::create_generation(
            5,
            GenomeLayout::PRODUCTION.genome_length(),
            &mut rng,
        );
        simulator.dispatch(batch_of(genomes));

        let (generation_index, losses) = simulator.evaluate_next().unwrap().unwrap();
        assert_eq!(generation_index, 0);
        assert_eq!(losses.len(), 5);
        assert!(losses.iter().all(|(_, loss)| (0.0..=100.0).contains(loss)));
        assert!(simulator.evaluate_next().unwrap().is_none());
    }

    #[test]
    fn test_always_forwards_and_straight_policy() {
        let layout = GenomeLayout::PRODUCTION;
        let count = layout.coefficient_count();
        let mut engine = vec![0.0; count];
        engine[count - 1] = 100.0;
        let steering = vec![0.0; count];
        let genome = layout
            .encode(&DecodedGenome {
                engine_coefficients: engine,
                steering_coefficients: steering,
            })
            .unwrap();

        let mut simulator = simulator(0.0);
        let decoder = ControlDecoder::new(&layout, &genome).unwrap();
        let expected = simulator
            .sweeps
            .iter()
            .map(|(_, controls)| {
                usize::from(controls.engine != EngineMode::Forwards)
                    + usize::from(controls.wheel != WheelMode::Straight)
            })
            .sum::<usize>();
        #[expect(clippy::cast_precision_loss)]
        let expected = 100.0 * expected as f64 / 64.0;
        assert!((simulator.disagreement(&decoder).unwrap() - expected).abs() < 1e-9);

        simulator.dispatch(batch_of(vec![genome]));
        let (_, losses) = simulator.evaluate_next().unwrap().unwrap();
        assert!((losses[0].1 - expected).abs() < 1e-9);
    }

    #[test]
    fn test_ended_batches_are_dropped() {
        let mut simulator = simulator(1.0);
        simulator.dispatch(batch_of(Vec::new()));
        simulator.batch_ended(0, 0);
        assert!(simulator.evaluate_next().unwrap().is_none());
    }

    #[test]
    fn test_rejects_short_layouts() {
        let layout = GenomeLayout::new(3, autopark_genome::PrecisionConfig::REDUCED);
        assert!(SurrogateSimulator::new(layout, 1, false, 0.0, Pcg32::seed_from_u64(0)).is_err());
    }
}
