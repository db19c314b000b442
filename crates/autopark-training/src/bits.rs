//! Genome operations for the genetic algorithm.
//!
//! These are the building blocks used by [`genetic::select`](crate::genetic::select):
//!
//! - **Initialization**: [`random`] generates a genome of fair coin flips
//! - **Mutation**: [`mutate`] flips each gene independently
//! - **Crossover**: [`crossover`] implements uniform crossover producing two children
//!
//! None of the operations modify their inputs; each returns freshly built genomes.

use autopark_genome::{Gene, Genome};
use rand::Rng;

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("cannot mate genomes of different lengths ({father_len} and {mother_len})")]
pub struct MatingError {
    pub father_len: usize,
    pub mother_len: usize,
}

/// Generates a genome where each gene is independently Bernoulli(0.5).
pub fn random<R>(rng: &mut R, len: usize) -> Genome
where
    R: Rng + ?Sized,
{
    (0..len).map(|_| rng.random::<Gene>()).collect()
}

/// Returns a copy of `genome` where each gene is flipped with `probability`.
///
/// Probabilities outside `[0, 1]` are clamped; NaN never flips.
pub fn mutate<R>(genome: &Genome, probability: f64, rng: &mut R) -> Genome
where
    R: Rng + ?Sized,
{
    let probability = if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    };
    genome
        .iter()
        .map(|gene| {
            if rng.random_bool(probability) {
                gene.flipped()
            } else {
                gene
            }
        })
        .collect()
}

/// Performs uniform crossover between two parents, then mutates both children.
///
/// At every position each child independently takes the father's or the mother's gene
/// with probability 0.5, so the two children are not complements of each other.
pub fn crossover<R>(
    father: &Genome,
    mother: &Genome,
    mutation_probability: f64,
    rng: &mut R,
) -> Result<(Genome, Genome), MatingError>
where
    R: Rng + ?Sized,
{
    if father.len() != mother.len() {
        return Err(MatingError {
            father_len: father.len(),
            mother_len: mother.len(),
        });
    }

    let mut first = Vec::with_capacity(father.len());
    let mut second = Vec::with_capacity(father.len());
    for (f, m) in father.iter().zip(mother.iter()) {
        first.push(if rng.random_bool(0.5) { f } else { m });
        second.push(if rng.random_bool(0.5) { f } else { m });
    }

    Ok((
        mutate(&Genome::new(first), mutation_probability, rng),
        mutate(&Genome::new(second), mutation_probability, rng),
    ))
}
