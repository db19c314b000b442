use autopark_genome::Genome;

use super::CandidateId;

/// A genome under evaluation, as handed to the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub genome_index: usize,
    pub genome: Genome,
}

/// A contiguous slice of a generation's candidates simulated together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub generation_index: usize,
    pub batch_index: usize,
    pub candidates: Vec<Candidate>,
}

/// The external simulator.
///
/// A dispatched batch runs until the scheduler's timer ends it. While it runs the
/// simulator reports losses through
/// [`Scheduler::report_loss`](super::Scheduler::report_loss), tagged with the batch's
/// generation index.
pub trait Simulator {
    fn dispatch(&mut self, batch: Batch);

    /// Called when the lifetime of a batch has elapsed; its candidates can be discarded.
    fn batch_ended(&mut self, generation_index: usize, batch_index: usize) {
        let _ = (generation_index, batch_index);
    }
}

/// A simulator that only remembers what was dispatched.
#[derive(Debug, Clone, Default)]
pub struct RecordingSimulator {
    pub dispatched: Vec<Batch>,
    pub ended: Vec<(usize, usize)>,
}

impl RecordingSimulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_batch(&self) -> Option<&Batch> {
        self.dispatched.last()
    }
}

impl Simulator for RecordingSimulator {
    fn dispatch(&mut self, batch: Batch) {
        self.dispatched.push(batch);
    }

    fn batch_ended(&mut self, generation_index: usize, batch_index: usize) {
        self.ended.push((generation_index, batch_index));
    }
}
