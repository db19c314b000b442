//! The evolution scheduler.
//!
//! [`Scheduler`] owns the run state and drives it through generations and batches:
//!
//! ```text
//! Idle → GenerationStart → BatchDispatch → BatchRunning → BatchEnd
//!                ↑                ↑                           │
//!                │                └──── next batch / retry ───┤
//!                └────────────── GenerationEnd ←──────────────┘
//! ```
//!
//! The scheduler never waits. The [`Simulator`] receives each batch through
//! [`Simulator::dispatch`] and reports losses with [`Scheduler::report_loss`]; the
//! [`BatchTimer`] ends the batch by calling [`Scheduler::on_timer_fired`] with the ticket
//! it was started with.
//!
//! # Example
//!
//! ```
//! use autopark_genome::GenomeLayout;
//! use autopark_training::{
//!     params::EvolutionParams,
//!     scheduler::{ManualTimer, RecordingSimulator, Scheduler},
//! };
//! use rand::SeedableRng as _;
//! use rand_pcg::Pcg32;
//!
//! let params = EvolutionParams {
//!     generation_size: 4,
//!     batch_size: 2,
//!     ..EvolutionParams::default()
//! };
//! let mut scheduler = Scheduler::new(
//!     params,
//!     GenomeLayout::PRODUCTION,
//!     RecordingSimulator::new(),
//!     ManualTimer::new(),
//!     Pcg32::seed_from_u64(0),
//! )
//! .unwrap();
//!
//! scheduler.start();
//! let batch = scheduler.simulator().last_batch().unwrap().clone();
//! for (i, candidate) in batch.candidates.iter().enumerate() {
//!     scheduler.report_loss(batch.generation_index, &candidate.id, i as f64);
//! }
//! let ticket = scheduler.timer_mut().advance_to_deadline().unwrap();
//! assert!(scheduler.on_timer_fired(ticket));
//! assert_eq!(scheduler.state().batch_index(), 1);
//! assert_eq!(scheduler.state().loss_history(), &[0.0]);
//! ```

use std::ops::Range;

use autopark_genome::GenomeLayout;
use autopark_stats::descriptive::DescriptiveStats;
use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    checkpoint::{Checkpoint, RestoreError},
    fitness::loss_to_fitness,
    genetic::{self, FitnessUnavailableError, SelectionError},
    params::{EvolutionParams, ParamsError},
};

pub use self::{loss_map::*, simulator::*, state::*, timer::*};

mod loss_map;
mod simulator;
mod state;
mod timer;

/// Outcome of a loss report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum LossReport {
    Recorded,
    /// The report belongs to another generation
    StaleGeneration,
    /// The candidate is not part of the running batch
    BatchClosed,
    UnknownCandidate,
    /// The loss is NaN or infinite
    InvalidLoss,
}

#[derive(Debug)]
pub struct Scheduler<S, T, R> {
    params: EvolutionParams,
    layout: GenomeLayout,
    simulator: S,
    timer: T,
    rng: R,
    state: SchedulerState,
}

impl<S, T, R> Scheduler<S, T, R>
where
    S: Simulator,
    T: BatchTimer,
    R: Rng,
{
    pub fn new(
        params: EvolutionParams,
        layout: GenomeLayout,
        simulator: S,
        timer: T,
        rng: R,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        let state = SchedulerState::new(params.bad_simulation_retry_count);
        Ok(Self {
            params,
            layout,
            simulator,
            timer,
            rng,
            state,
        })
    }

    #[must_use]
    pub fn params(&self) -> &EvolutionParams {
        &self.params
    }

    #[must_use]
    pub fn layout(&self) -> &GenomeLayout {
        &self.layout
    }

    #[must_use]
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    #[must_use]
    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    #[must_use]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.state.phase.is_idle()
    }

    /// Starts the run, or resumes it at the current generation.
    ///
    /// Does nothing while already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        info!(generation = self.state.generation_index, "starting evolution");
        if self.state.generation.is_empty() || self.state.reuse_generation {
            self.begin_generation();
        } else {
            self.dispatch_batch();
        }
    }

    /// Cancels the running batch and returns to idle.
    pub fn stop(&mut self) {
        self.cancel_timer();
        if self.is_running() {
            info!(
                generation = self.state.generation_index,
                batch = self.state.batch_index,
                "evolution stopped"
            );
        }
        self.state.phase = Phase::Idle;
    }

    /// Records the latest loss of a candidate of the running batch.
    pub fn report_loss(
        &mut self,
        generation_index: usize,
        id: &CandidateId,
        loss: f64,
    ) -> LossReport {
        if !loss.is_finite() {
            debug!(%id, loss, "ignoring non-finite loss");
            return LossReport::InvalidLoss;
        }
        if generation_index != self.state.generation_index {
            debug!(
                %id,
                generation = generation_index,
                current = self.state.generation_index,
                "ignoring loss of a stale generation"
            );
            return LossReport::StaleGeneration;
        }
        let Some(entry) = self.state.losses.get(id) else {
            debug!(%id, "ignoring loss of an unknown candidate");
            return LossReport::UnknownCandidate;
        };
        if !self.state.phase.is_batch_running()
            || !self.batch_range().contains(&entry.genome_index)
        {
            debug!(%id, batch = self.state.batch_index, "ignoring loss for a closed batch");
            return LossReport::BatchClosed;
        }
        self.state.losses.record(id, loss);
        LossReport::Recorded
    }

    /// Ends the running batch if `ticket` is the armed one.
    ///
    /// Returns `false` for cancelled or superseded tickets, which are ignored.
    pub fn on_timer_fired(&mut self, ticket: TimerTicket) -> bool {
        if self.state.armed != Some(ticket) || !self.state.phase.is_batch_running() {
            debug!(%ticket, "ignoring stale timer");
            return false;
        }
        self.state.armed = None;
        self.end_batch();
        true
    }

    /// Snapshots the run.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            date_time: Utc::now(),
            generation_index: self.state.generation_index,
            loss_history: self.state.loss_history.clone(),
            avg_loss_history: self.state.avg_loss_history.clone(),
            performance_boost: self.params.performance_boost,
            generation_size: self.params.generation_size,
            generation_lifetime_seconds: self.params.generation_lifetime_seconds,
            batch_size: self.params.batch_size,
            mutation_probability: self.params.mutation_probability,
            elitism_percentage: self.params.elitism_percentage,
            generation: self.state.generation.clone(),
        }
    }

    /// Replaces the run state with a checkpoint.
    ///
    /// The pending timer is cancelled. A checkpoint that fails validation is rejected and
    /// the scheduler starts over from a fresh first generation instead. A running
    /// scheduler keeps running from the new state.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> Result<(), RestoreError> {
        let was_running = self.is_running();
        self.cancel_timer();

        let result = checkpoint.validate(&self.layout, &self.params);
        match &result {
            Ok(()) => {
                self.params = checkpoint.params(&self.params);
                let mut state = SchedulerState::new(self.params.bad_simulation_retry_count);
                state.generation_index = checkpoint.generation_index;
                state.loss_history = checkpoint.loss_history;
                state.avg_loss_history = checkpoint.avg_loss_history;
                state.generation = checkpoint.generation;
                state.reuse_generation = true;
                state.next_ticket = self.state.next_ticket;
                self.state = state;
                info!(
                    generation = self.state.generation_index,
                    "restored checkpoint"
                );
            }
            Err(err) => {
                warn!(%err, "rejected checkpoint, starting from a fresh generation");
                let mut state = SchedulerState::new(self.params.bad_simulation_retry_count);
                state.next_ticket = self.state.next_ticket;
                self.state = state;
            }
        }

        if was_running {
            self.begin_generation();
        }
        result
    }

    fn batch_range(&self) -> Range<usize> {
        let size = self.state.generation.len();
        let start = (self.state.batch_index * self.params.batch_size).min(size);
        let end = (start + self.params.batch_size).min(size);
        start..end
    }

    fn cancel_timer(&mut self) {
        if let Some(ticket) = self.state.armed.take() {
            self.timer.cancel(ticket);
        }
    }

    fn begin_generation(&mut self) {
        self.state.phase = Phase::GenerationStart;
        let state = &mut self.state;

        if state.generation.is_empty() {
            state.generation = genetic::create_generation(
                self.params.generation_size,
                self.layout.genome_length(),
                &mut self.rng,
            );
        } else if state.reuse_generation {
            state.reuse_generation = false;
        } else {
            let alpha = self.params.fitness_alpha;
            let losses = &state.losses;
            let selected = genetic::select(
                &state.generation,
                |i, _| {
                    losses
                        .loss_of_genome(i)
                        .map(|loss| loss_to_fitness(loss, alpha))
                        .ok_or(FitnessUnavailableError { genome_index: i })
                },
                &self.params.selection_params(),
                &mut self.rng,
            );
            match selected {
                Ok(next) => state.generation = next,
                Err(SelectionError::FitnessUnavailable(err)) => {
                    warn!(
                        %err,
                        generation = state.generation_index,
                        "re-evaluating the previous generation"
                    );
                }
                Err(SelectionError::Mating(err)) => {
                    warn!(%err, "breeding failed, starting from a random generation");
                    state.generation = genetic::create_generation(
                        self.params.generation_size,
                        self.layout.genome_length(),
                        &mut self.rng,
                    );
                }
            }
        }

        state.batch_index = 0;
        state.losses = LossMap::for_generation(state.generation.len(), &mut self.rng);
        state.generation_best = BestCandidates::default();
        info!(
            generation = state.generation_index,
            size = state.generation.len(),
            batches = self.params.batch_count(),
            "generation started"
        );
        self.dispatch_batch();
    }

    fn dispatch_batch(&mut self) {
        self.state.phase = Phase::BatchDispatch;
        let range = self.batch_range();
        let candidates = self
            .state
            .losses
            .iter()
            .skip(range.start)
            .take(range.len())
            .map(|entry| Candidate {
                id: entry.id.clone(),
                genome_index: entry.genome_index,
                genome: self.state.generation[entry.genome_index].clone(),
            })
            .collect::<Vec<_>>();
        debug!(
            generation = self.state.generation_index,
            batch = self.state.batch_index,
            candidates = candidates.len(),
            "dispatching batch"
        );
        self.simulator.dispatch(Batch {
            generation_index: self.state.generation_index,
            batch_index: self.state.batch_index,
            candidates,
        });

        self.cancel_timer();
        let ticket = self.state.issue_ticket();
        self.timer.start(ticket, self.params.generation_lifetime());
        self.state.armed = Some(ticket);
        self.state.phase = Phase::BatchRunning;
    }

    fn end_batch(&mut self) {
        self.state.phase = Phase::BatchEnd;
        let generation_index = self.state.generation_index;
        let batch_index = self.state.batch_index;
        self.simulator.batch_ended(generation_index, batch_index);

        if let Some(stats) = DescriptiveStats::new(self.state.losses.resolved_losses()) {
            self.state.update_history(stats.min, stats.best_half_mean);
            info!(
                generation = generation_index,
                batch = batch_index,
                min_loss = stats.min,
                avg_loss = stats.best_half_mean,
                reported = stats.count,
                "batch ended"
            );
        } else {
            info!(
                generation = generation_index,
                batch = batch_index,
                "batch ended without losses"
            );
        }
        self.state.update_best_candidates();

        if batch_index == self.params.bad_simulation_check_batch_index {
            if self.should_retry() {
                self.retry_generation();
                return;
            }
            self.state.retries_left = self.params.bad_simulation_retry_count;
        }

        self.state.batch_index += 1;
        if self.state.batch_index < self.params.batch_count() {
            self.dispatch_batch();
        } else {
            self.end_generation();
        }
    }

    fn should_retry(&self) -> bool {
        if !self.params.bad_simulation_retries_enabled || self.state.retries_left == 0 {
            return false;
        }
        let Some((newest, previous)) = self.state.latest_history_pair() else {
            return false;
        };
        newest > previous * self.params.bad_simulation_loss_increase_threshold_percent / 100.0
    }

    fn retry_generation(&mut self) {
        self.state.retries_left -= 1;
        warn!(
            generation = self.state.generation_index,
            retries_left = self.state.retries_left,
            "loss jumped, restarting the generation"
        );
        self.state.discard_active_history();
        self.state.losses =
            LossMap::for_generation(self.state.generation.len(), &mut self.rng);
        self.state.generation_best = BestCandidates::default();
        self.state.batch_index = 0;
        self.dispatch_batch();
    }

    fn end_generation(&mut self) {
        self.state.phase = Phase::GenerationEnd;
        info!(
            generation = self.state.generation_index,
            min_loss = self.state.generation_best.best.as_ref().map(|c| c.loss),
            "generation ended"
        );
        self.state.batch_index = 0;
        self.state.generation_index += 1;
        self.begin_generation();
    }
}
