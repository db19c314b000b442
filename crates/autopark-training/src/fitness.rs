//! Converting simulator losses into selection weights.

/// Default scale of the loss in the fitness transform.
pub const DEFAULT_FITNESS_ALPHA: f64 = 1.0;

/// Converts a loss into a fitness in `(0, 1]`.
///
/// `fitness = 1 / (alpha * loss + 1)`, so a loss of zero is a perfect fitness of `1.0`
/// and fitness decreases monotonically as the loss grows. Negative losses are treated
/// as zero.
///
/// # Examples
///
/// ```
/// # use autopark_training::fitness::loss_to_fitness;
/// assert_eq!(loss_to_fitness(0.0, 1.0), 1.0);
/// assert_eq!(loss_to_fitness(1.0, 1.0), 0.5);
/// assert_eq!(loss_to_fitness(3.0, 1.0), 0.25);
/// ```
#[must_use]
pub fn loss_to_fitness(loss: f64, alpha: f64) -> f64 {
    1.0 / (alpha * loss.max(0.0) + 1.0)
}
