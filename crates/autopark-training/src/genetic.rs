//! Population-level genetic operators.
//!
//! # Algorithm Overview
//!
//! Producing the next generation from an evaluated one:
//!
//! 1. **Fitness** - Compute the fitness of every genome (caller-provided function)
//! 2. **Elite Selection** - The top `floor(elitism% × size)` genomes survive unchanged
//! 3. **Roulette Selection** - Parents are drawn with probability proportional to fitness
//! 4. **Uniform Crossover** - Each pair of distinct parents produces two children
//! 5. **Mutation** - Every gene of every child may flip
//!
//! # Roulette Selection
//!
//! A threshold is drawn uniformly in `[0, Σ weights)` and the cumulative weight sum is
//! walked until it exceeds the threshold. Zero-weight genomes are therefore never picked
//! while any genome has a positive weight.
//!
//! # Distinct Parents
//!
//! When both draws select the same genome, the second draw is repeated. If fewer than two
//! genomes carry a positive weight, the second parent is drawn uniformly from the other
//! genomes instead, so breeding always terminates.

use autopark_genome::Genome;
use rand::Rng;

use crate::bits::{self, MatingError};

/// An ordered set of genomes evaluated together.
pub type Generation = Vec<Genome>;

/// Raised when selection needs the fitness of a genome whose loss is still unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("fitness unavailable for genome #{genome_index}: loss not resolved")]
pub struct FitnessUnavailableError {
    pub genome_index: usize,
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum SelectionError {
    #[display("{_0}")]
    FitnessUnavailable(FitnessUnavailableError),
    #[display("{_0}")]
    Mating(MatingError),
}

/// Parameters controlling how the next generation is bred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionParams {
    /// Probability of flipping each gene of a child
    pub mutation_probability: f64,
    /// Share of the generation (0–100) carried over unchanged
    pub elitism_percentage: f64,
}

/// Creates a generation of `size` random genomes.
pub fn create_generation<R>(size: usize, genome_length: usize, rng: &mut R) -> Generation
where
    R: Rng + ?Sized,
{
    (0..size).map(|_| bits::random(rng, genome_length)).collect()
}

/// Number of genomes carried over unchanged: `floor(elitism_percentage / 100 × size)`.
#[must_use]
pub fn elite_count(size: usize, elitism_percentage: f64) -> usize {
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    let count = (elitism_percentage * size as f64 / 100.0).floor() as usize;
    count.min(size)
}

fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Picks an index with probability proportional to its weight.
///
/// Negative and non-finite weights count as zero. Returns `None` when no weight is
/// positive.
pub fn weighted_random_index<R>(weights: &[f64], rng: &mut R) -> Option<usize>
where
    R: Rng + ?Sized,
{
    let total = weights.iter().copied().map(effective_weight).sum::<f64>();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let threshold = total * rng.random::<f64>();
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (i, weight) in weights.iter().copied().map(effective_weight).enumerate() {
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = Some(i);
        if cumulative > threshold {
            return Some(i);
        }
    }
    // rounding in the cumulative sum can leave the threshold just out of reach
    last_positive
}

/// Draws two distinct parent indices. Requires `weights.len() >= 2`.
fn pick_parents<R>(weights: &[f64], rng: &mut R) -> (usize, usize)
where
    R: Rng + ?Sized,
{
    let n = weights.len();
    debug_assert!(n >= 2);
    let positive = weights
        .iter()
        .filter(|w| effective_weight(**w) > 0.0)
        .count();

    let father = weighted_random_index(weights, rng).unwrap_or_else(|| rng.random_range(0..n));
    let mother = if positive >= 2 {
        loop {
            if let Some(mother) = weighted_random_index(weights, rng)
                && mother != father
            {
                break mother;
            }
        }
    } else {
        let other = rng.random_range(0..n - 1);
        if other >= father { other + 1 } else { other }
    };
    (father, mother)
}

/// Breeds the next generation.
///
/// `fitness` is called once per genome with its index. The returned generation always
/// has the same size as the input, starting with the elites in descending fitness
/// order (ties keep their original order).
///
/// Generations with fewer than two genomes have no distinct parent pair; their
/// non-elite genomes are carried over mutated.
pub fn select<F, R>(
    generation: &[Genome],
    mut fitness: F,
    params: &SelectionParams,
    rng: &mut R,
) -> Result<Generation, SelectionError>
where
    F: FnMut(usize, &Genome) -> Result<f64, FitnessUnavailableError>,
    R: Rng + ?Sized,
{
    let size = generation.len();
    let weights = generation
        .iter()
        .enumerate()
        .map(|(i, genome)| fitness(i, genome))
        .collect::<Result<Vec<_>, _>>()?;

    let mut ranked = (0..size).collect::<Vec<_>>();
    ranked.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));

    let mut next = Vec::with_capacity(size);
    let elites = elite_count(size, params.elitism_percentage);
    next.extend(ranked[..elites].iter().map(|&i| generation[i].clone()));

    if size < 2 {
        next.extend(
            generation[next.len()..]
                .iter()
                .map(|genome| bits::mutate(genome, params.mutation_probability, rng)),
        );
        return Ok(next);
    }

    while next.len() < size {
        let (father, mother) = pick_parents(&weights, rng);
        let (first, second) = bits::crossover(
            &generation[father],
            &generation[mother],
            params.mutation_probability,
            rng,
        )?;
        next.push(first);
        if next.len() < size {
            next.push(second);
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use autopark_genome::Gene;
    use proptest::prelude::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    fn genome_of(value: usize, len: usize) -> Genome {
        (0..len).map(|i| Gene::from_bit((value >> (i % 16)) & 1 == 1)).collect()
    }

    #[test]
    fn test_create_generation_shape() {
        let mut rng = Pcg32::seed_from_u64(10);
        let generation = create_generation(7, 33, &mut rng);
        assert_eq!(generation.len(), 7);
        assert!(generation.iter().all(|g| g.len() == 33));
    }

    #[test]
    fn test_elite_count_floors() {
        assert_eq!(elite_count(10, 10.0), 1);
        assert_eq!(elite_count(100, 6.0), 6);
        assert_eq!(elite_count(10, 19.0), 1);
        assert_eq!(elite_count(10, 0.0), 0);
        assert_eq!(elite_count(10, 250.0), 10);
        assert_eq!(elite_count(10, -5.0), 0);
    }

    #[test]
    fn test_weighted_index_single_positive_weight() {
        let mut rng = Pcg32::seed_from_u64(11);
        for _ in 0..1000 {
            assert_eq!(weighted_random_index(&[10.0, 0.0, 0.0], &mut rng), Some(0));
            assert_eq!(weighted_random_index(&[0.0, 0.0, 3.0], &mut rng), Some(2));
        }
    }

    #[test]
    fn test_weighted_index_no_positive_weight() {
        let mut rng = Pcg32::seed_from_u64(12);
        assert_eq!(weighted_random_index(&[], &mut rng), None);
        assert_eq!(weighted_random_index(&[0.0, -1.0, f64::NAN], &mut rng), None);
    }

    #[test]
    #[expect(clippy::cast_precision_loss)]
    fn test_weighted_index_is_proportional() {
        let mut rng = Pcg32::seed_from_u64(13);
        let weights = [10.0, 30.0, 60.0];
        let mut counts = [0_usize; 3];
        for _ in 0..1000 {
            counts[weighted_random_index(&weights, &mut rng).unwrap()] += 1;
        }
        // ±5 standard deviations of a binomial(1000, p)
        for (count, weight) in counts.iter().zip(weights) {
            let p = weight / 100.0;
            let expected = 1000.0 * p;
            let band = 5.0 * (1000.0 * p * (1.0 - p)).sqrt();
            let observed = *count as f64;
            assert!(
                (observed - expected).abs() < band,
                "counts = {counts:?}, weights = {weights:?}"
            );
        }
    }

    #[test]
    fn test_pick_parents_is_distinct() {
        let mut rng = Pcg32::seed_from_u64(14);
        for weights in [
            vec![1.0, 1.0],
            vec![5.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0, 0.0],
        ] {
            for _ in 0..200 {
                let (father, mother) = pick_parents(&weights, &mut rng);
                assert_ne!(father, mother);
                assert!(father < weights.len() && mother < weights.len());
            }
        }
    }

    #[test]
    fn test_select_keeps_single_elite_with_constant_fitness() {
        let mut rng = Pcg32::seed_from_u64(15);
        let generation = create_generation(10, 20, &mut rng);
        let params = SelectionParams {
            mutation_probability: 0.0,
            elitism_percentage: 10.0,
        };

        let next = select(&generation, |_, _| Ok(1.0), &params, &mut rng).unwrap();
        assert_eq!(next.len(), 10);
        // with equal fitness the stable sort keeps the first genome as the elite
        assert_eq!(next[0], generation[0]);
        assert!(next.iter().all(|g| g.len() == 20));
    }

    #[test]
    fn test_select_preserves_fittest() {
        let mut rng = Pcg32::seed_from_u64(16);
        let generation = (0..20).map(|i| genome_of(i, 24)).collect::<Vec<_>>();
        let params = SelectionParams {
            mutation_probability: 0.5,
            elitism_percentage: 15.0,
        };

        // genome #i has fitness i, so the top three are #19, #18, #17
        #[expect(clippy::cast_precision_loss)]
        let next = select(&generation, |i, _| Ok(i as f64), &params, &mut rng).unwrap();
        assert_eq!(next.len(), 20);
        assert_eq!(&next[..3], &generation[17..20].iter().rev().cloned().collect::<Vec<_>>());
    }

    #[test]
    fn test_select_odd_size_drops_second_child() {
        let mut rng = Pcg32::seed_from_u64(17);
        let generation = create_generation(5, 8, &mut rng);
        let params = SelectionParams {
            mutation_probability: 0.1,
            elitism_percentage: 0.0,
        };
        let next = select(&generation, |_, _| Ok(0.5), &params, &mut rng).unwrap();
        assert_eq!(next.len(), 5);
    }

    #[test]
    fn test_select_tiny_generations() {
        let mut rng = Pcg32::seed_from_u64(18);
        let params = SelectionParams {
            mutation_probability: 0.0,
            elitism_percentage: 0.0,
        };
        assert!(select(&[], |_, _| Ok(1.0), &params, &mut rng).unwrap().is_empty());

        let single = create_generation(1, 8, &mut rng);
        let next = select(&single, |_, _| Ok(1.0), &params, &mut rng).unwrap();
        assert_eq!(next, single);
    }

    #[test]
    fn test_select_reports_unavailable_fitness() {
        let mut rng = Pcg32::seed_from_u64(19);
        let generation = create_generation(4, 8, &mut rng);
        let params = SelectionParams {
            mutation_probability: 0.0,
            elitism_percentage: 0.0,
        };
        let err = select(
            &generation,
            |i, _| {
                if i == 2 {
                    Err(FitnessUnavailableError { genome_index: i })
                } else {
                    Ok(1.0)
                }
            },
            &params,
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SelectionError::FitnessUnavailable(FitnessUnavailableError { genome_index: 2 })
        ));
    }

    #[test]
    fn test_select_reports_mating_error() {
        let mut rng = Pcg32::seed_from_u64(20);
        let generation = vec![genome_of(1, 8), genome_of(2, 9)];
        let params = SelectionParams {
            mutation_probability: 0.0,
            elitism_percentage: 0.0,
        };
        let err = select(&generation, |_, _| Ok(1.0), &params, &mut rng).unwrap_err();
        assert!(matches!(err, SelectionError::Mating(_)));
    }

    proptest! {
        #[test]
        fn test_select_preserves_size(
            size in 0_usize..40,
            elitism in 0.0_f64..100.0,
            seed in any::<u64>(),
        ) {
            let mut rng = Pcg32::seed_from_u64(seed);
            let generation = create_generation(size, 12, &mut rng);
            let params = SelectionParams {
                mutation_probability: 0.05,
                elitism_percentage: elitism,
            };
            #[expect(clippy::cast_precision_loss)]
            let next = select(&generation, |i, _| Ok(1.0 / (i as f64 + 1.0)), &params, &mut rng)
                .unwrap();
            prop_assert_eq!(next.len(), size);
            let elites = elite_count(size, elitism);
            prop_assert_eq!(&next[..elites], &generation[..elites]);
        }
    }
}
