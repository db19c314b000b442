//! Statistical utilities for tracking training progress.
//!
//! - [`descriptive`]: descriptive statistics over a set of losses, including the
//!   "P50 average" (mean of the best half) used for loss history tracking
//!
//! # Examples
//!
//! ```
//! use autopark_stats::descriptive::DescriptiveStats;
//!
//! let losses = [4.0, 1.0, 3.0, 2.0];
//! let stats = DescriptiveStats::new(losses).unwrap();
//! assert_eq!(stats.min, 1.0);
//! assert_eq!(stats.best_half_mean, 1.5);
//! ```

pub mod descriptive;
