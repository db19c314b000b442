use autopark_genome::Genome;

use crate::genetic::Generation;

use super::{CandidateId, LossEntry, LossMap, TimerTicket};

/// Where the scheduler is in its cycle.
///
/// Only [`Phase::Idle`] and [`Phase::BatchRunning`] are observable between calls; the
/// other phases are passed through while a transition runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum Phase {
    Idle,
    GenerationStart,
    BatchDispatch,
    BatchRunning,
    BatchEnd,
    GenerationEnd,
}

/// A candidate together with the loss it achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub generation_index: usize,
    pub genome_index: usize,
    pub id: CandidateId,
    pub loss: f64,
    pub genome: Genome,
}

impl RankedCandidate {
    pub(super) fn new(generation_index: usize, entry: &LossEntry, genome: &Genome) -> Option<Self> {
        Some(Self {
            generation_index,
            genome_index: entry.genome_index,
            id: entry.id.clone(),
            loss: entry.loss?,
            genome: genome.clone(),
        })
    }
}

/// The two lowest-loss candidates of the active generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestCandidates {
    pub best: Option<RankedCandidate>,
    pub second_best: Option<RankedCandidate>,
}

/// Mutable run state owned by a [`Scheduler`](super::Scheduler).
#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub(super) phase: Phase,
    pub(super) generation_index: usize,
    pub(super) batch_index: usize,
    pub(super) generation: Generation,
    pub(super) losses: LossMap,
    pub(super) loss_history: Vec<f64>,
    pub(super) avg_loss_history: Vec<f64>,
    pub(super) retries_left: usize,
    /// Evaluate `generation` as is on the next generation start (restored checkpoints)
    pub(super) reuse_generation: bool,
    pub(super) generation_best: BestCandidates,
    pub(super) all_time_best: Option<RankedCandidate>,
    pub(super) armed: Option<TimerTicket>,
    pub(super) next_ticket: u64,
}

impl SchedulerState {
    pub(super) fn new(retries: usize) -> Self {
        Self {
            phase: Phase::Idle,
            generation_index: 0,
            batch_index: 0,
            generation: Vec::new(),
            losses: LossMap::new(),
            loss_history: Vec::new(),
            avg_loss_history: Vec::new(),
            retries_left: retries,
            reuse_generation: false,
            generation_best: BestCandidates::default(),
            all_time_best: None,
            armed: None,
            next_ticket: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn generation_index(&self) -> usize {
        self.generation_index
    }

    #[must_use]
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    #[must_use]
    pub fn generation(&self) -> &[Genome] {
        &self.generation
    }

    #[must_use]
    pub fn losses(&self) -> &LossMap {
        &self.losses
    }

    /// Minimum loss per generation.
    #[must_use]
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// Mean of the best half of the losses per generation.
    #[must_use]
    pub fn avg_loss_history(&self) -> &[f64] {
        &self.avg_loss_history
    }

    #[must_use]
    pub fn retries_left(&self) -> usize {
        self.retries_left
    }

    #[must_use]
    pub fn generation_best(&self) -> &BestCandidates {
        &self.generation_best
    }

    #[must_use]
    pub fn all_time_best(&self) -> Option<&RankedCandidate> {
        self.all_time_best.as_ref()
    }

    #[must_use]
    pub fn armed_ticket(&self) -> Option<TimerTicket> {
        self.armed
    }

    pub(super) fn issue_ticket(&mut self) -> TimerTicket {
        self.next_ticket += 1;
        TimerTicket(self.next_ticket)
    }

    /// Writes the newest minimum and P50 average of the active generation.
    ///
    /// The values land at the active generation index. Generations before it without an
    /// entry carry the previous value forward, or the new one when the history is empty.
    pub(super) fn update_history(&mut self, min_loss: f64, avg_loss: f64) {
        let index = self.generation_index;
        write_entry(&mut self.loss_history, index, min_loss);
        write_entry(&mut self.avg_loss_history, index, avg_loss);
    }

    /// Drops the history entry of the active generation, if it has one.
    pub(super) fn discard_active_history(&mut self) {
        self.loss_history.truncate(self.generation_index);
        self.avg_loss_history.truncate(self.generation_index);
    }

    /// The minimum losses of the active generation and of the one before it.
    pub(super) fn latest_history_pair(&self) -> Option<(f64, f64)> {
        let previous = self.generation_index.checked_sub(1)?;
        let newest = *self.loss_history.get(self.generation_index)?;
        Some((newest, self.loss_history[previous]))
    }

    pub(super) fn update_best_candidates(&mut self) {
        let (best, second) = self.losses.best_two();
        let rank = |entry: Option<&LossEntry>| {
            let entry = entry?;
            RankedCandidate::new(
                self.generation_index,
                entry,
                self.generation.get(entry.genome_index)?,
            )
        };
        self.generation_best = BestCandidates {
            best: rank(best),
            second_best: rank(second),
        };

        if let Some(best) = &self.generation_best.best
            && self
                .all_time_best
                .as_ref()
                .is_none_or(|current| best.loss < current.loss)
        {
            self.all_time_best = Some(best.clone());
        }
    }
}

fn write_entry(history: &mut Vec<f64>, index: usize, value: f64) {
    let fill = history.last().copied().unwrap_or(value);
    history.resize(index.max(history.len()), fill);
    match history.get_mut(index) {
        Some(entry) => *entry = value,
        None => history.push(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_entry_is_overwritten_until_discarded() {
        let mut state = SchedulerState::new(2);
        state.loss_history.push(10.0);
        state.avg_loss_history.push(12.0);
        state.generation_index = 1;
        assert_eq!(state.latest_history_pair(), None);

        state.update_history(20.0, 25.0);
        state.update_history(15.0, 18.0);
        assert_eq!(state.loss_history(), &[10.0, 15.0]);
        assert_eq!(state.avg_loss_history(), &[12.0, 18.0]);
        assert_eq!(state.latest_history_pair(), Some((15.0, 10.0)));

        state.discard_active_history();
        assert_eq!(state.loss_history(), &[10.0]);
        assert_eq!(state.avg_loss_history(), &[12.0]);
        state.discard_active_history();
        assert_eq!(state.loss_history(), &[10.0]);
    }

    #[test]
    fn test_first_generation_has_no_pair() {
        let mut state = SchedulerState::new(2);
        state.update_history(3.0, 4.0);
        assert_eq!(state.loss_history(), &[3.0]);
        assert_eq!(state.latest_history_pair(), None);
    }

    #[test]
    fn test_history_is_indexed_by_generation() {
        let mut state = SchedulerState::new(2);
        // generation 0 reported nothing
        state.generation_index = 1;
        state.update_history(10.0, 11.0);
        assert_eq!(state.loss_history(), &[10.0, 10.0]);
        assert_eq!(state.avg_loss_history(), &[11.0, 11.0]);

        // generations 2 and 3 reported nothing either
        state.generation_index = 4;
        state.update_history(7.0, 8.0);
        assert_eq!(state.loss_history(), &[10.0, 10.0, 10.0, 10.0, 7.0]);
        assert_eq!(state.latest_history_pair(), Some((7.0, 10.0)));

        // an entry written earlier for the active generation is overwritten
        state.generation_index = 3;
        state.update_history(9.0, 9.5);
        assert_eq!(state.loss_history()[3], 9.0);
        assert_eq!(state.loss_history().len(), 5);
    }

    #[test]
    fn test_tickets_are_unique() {
        let mut state = SchedulerState::new(0);
        let first = state.issue_ticket();
        let second = state.issue_ticket();
        assert_ne!(first, second);
    }
}
