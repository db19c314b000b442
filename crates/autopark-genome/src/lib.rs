//! Binary genome representation for self-parking control policies.
//!
//! A genome is a fixed-length bit string. It packs two blocks of reduced-precision
//! floating-point coefficients: one block drives the engine, the other the steering
//! wheel. This crate owns everything needed to turn such a bit string into car controls:
//!
//! - [`bit_float`] - decodes (and encodes) fixed-width sign/exponent/fraction numbers
//! - [`genome`] - genes, genomes and the layout that slices a genome into coefficients
//! - [`control`] - evaluates coefficients against sensor readings to pick control modes
//!
//! ```text
//! Genome (bits)
//!     ↓ GenomeLayout::decode
//! engine / steering coefficients
//!     ↓ ControlDecoder::decide (per simulation tick)
//! EngineMode + WheelMode
//! ```

pub use self::{bit_float::*, control::*, genome::*};

pub mod bit_float;
pub mod control;
pub mod genome;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EncodingError {
    #[display("expected {expected} bits per number, got {actual}")]
    NumberLength { expected: usize, actual: usize },
    #[display("expected a genome of {expected} genes, got {actual}")]
    GenomeLength { expected: usize, actual: usize },
    #[display("expected {expected} coefficients per block, got {actual}")]
    CoefficientCount { expected: usize, actual: usize },
    #[display("invalid gene {found:?} at position {position}, expected '0' or '1'")]
    InvalidGene { found: char, position: usize },
    #[display(
        "unsupported number layout with {exponent_bits} exponent and {fraction_bits} fraction bits"
    )]
    UnsupportedPrecision {
        exponent_bits: usize,
        fraction_bits: usize,
    },
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("expected {expected} sensor readings, got {actual}")]
pub struct SensorCountError {
    pub expected: usize,
    pub actual: usize,
}
