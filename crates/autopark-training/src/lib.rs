//! Training system for evolving self-parking control policies with a genetic algorithm.
//!
//! # How Training Works
//!
//! 1. **Population** - Create a generation of random genomes (Bernoulli(0.5) bits)
//! 2. **Dispatch** - Split the generation into batches and hand each batch to the simulator
//! 3. **Feedback** - The simulator reports a loss per candidate while the batch lifetime runs
//! 4. **Fitness** - Losses are turned into fitness with `1 / (alpha * loss + 1)`
//! 5. **Selection** - Elites survive unchanged, the rest are bred from fitness-weighted parents
//! 6. **Repeat** - The next generation is dispatched, batch by batch
//!
//! # Architecture
//!
//! ```text
//! Scheduler (state machine, timer driven)
//!     ↓ dispatches batches of candidates
//! Simulator (external, via the Simulator trait)
//!     ↓ reports losses
//! Loss map + loss history
//!     ↓ fitness
//! Genetic operators (select / crossover / mutate)
//!     ↓ next generation
//! Scheduler
//! ```
//!
//! # Modules
//!
//! - [`bits`] - operations on single genomes: random creation, mutation, uniform crossover
//! - [`genetic`] - population-level operators: generation creation, weighted selection
//! - [`fitness`] - the loss-to-fitness transform
//! - [`params`] - tunable run parameters and their validation
//! - [`checkpoint`] - the serialized snapshot of a run
//! - [`scheduler`] - the evolution scheduler driving generations and batches
//!
//! # Bad Simulations
//!
//! Simulation runs are noisy. When a batch ends at the configured check index and the
//! generation's minimum loss jumped above the previous generation's by more than a
//! threshold, the scheduler assumes a degenerate run and restarts the generation from
//! its first batch, a limited number of times.
//!
//! # Current Limitations
//!
//! - **Single-objective only**: the simulator reports one scalar loss per candidate
//! - **Sequential batches**: batches of one generation are evaluated one after another

pub mod bits;
pub mod checkpoint;
pub mod fitness;
pub mod genetic;
pub mod params;
pub mod scheduler;
