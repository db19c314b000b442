//! Fixed-width binary floating-point numbers.
//!
//! Numbers are laid out like IEEE-754 values with a configurable width:
//!
//! ```text
//! | sign | exponent (biased) | fraction |
//! ```
//!
//! The value of a bit pattern is `(-1)^sign × 2^(exponent - bias) × (1 + fraction)`,
//! where `bias = 2^(exponent_bits - 1) - 1`. The leading `1` of the mantissa is always
//! implicit: there are no denormals, infinities or NaNs. With the half-precision layout
//! this matches IEEE binary16 for every normal number.

use serde::{Deserialize, Serialize};

use crate::{EncodingError, Gene};

/// Bit layout of a binary floating-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecisionConfig {
    pub sign_bits: usize,
    pub exponent_bits: usize,
    pub fraction_bits: usize,
}

impl PrecisionConfig {
    /// IEEE half precision: 1 sign bit, 5 exponent bits, 10 fraction bits.
    pub const HALF: Self = Self::new(1, 5, 10);

    /// Reduced 10-bit layout used for genomes: 1 sign bit, 4 exponent bits, 5 fraction bits.
    ///
    /// Values range from `±0.0078125` to `±504`. The coarse precision keeps genomes short,
    /// which makes evolution converge faster.
    pub const REDUCED: Self = Self::new(1, 4, 5);

    #[must_use]
    pub const fn new(sign_bits: usize, exponent_bits: usize, fraction_bits: usize) -> Self {
        Self {
            sign_bits,
            exponent_bits,
            fraction_bits,
        }
    }

    #[must_use]
    pub const fn total_bits(&self) -> usize {
        self.sign_bits + self.exponent_bits + self.fraction_bits
    }

    /// Checks that numbers of this layout can be decoded and encoded.
    ///
    /// The exponent needs 1 to 30 bits and the fraction at most 52.
    pub fn validate(&self) -> Result<(), EncodingError> {
        if (1..=30).contains(&self.exponent_bits) && self.fraction_bits <= 52 {
            Ok(())
        } else {
            Err(EncodingError::UnsupportedPrecision {
                exponent_bits: self.exponent_bits,
                fraction_bits: self.fraction_bits,
            })
        }
    }

    /// Only meaningful for validated layouts.
    const fn exponent_bias(&self) -> i32 {
        (1 << (self.exponent_bits - 1)) - 1
    }

    const fn max_exponent_field(&self) -> i32 {
        (1 << self.exponent_bits) - 1
    }

    /// Decodes a bit pattern into a number.
    ///
    /// Every pattern of the right length is valid for a supported layout.
    ///
    /// # Examples
    ///
    /// ```
    /// # use autopark_genome::{Genome, PrecisionConfig};
    /// let bits: Genome = "0011110000000000".parse().unwrap();
    /// assert_eq!(PrecisionConfig::HALF.decode(bits.genes()).unwrap(), 1.0);
    /// ```
    pub fn decode(&self, bits: &[Gene]) -> Result<f64, EncodingError> {
        self.validate()?;
        if bits.len() != self.total_bits() {
            return Err(EncodingError::NumberLength {
                expected: self.total_bits(),
                actual: bits.len(),
            });
        }

        let (sign_bits, rest) = bits.split_at(self.sign_bits);
        let (exponent_bits, fraction_bits) = rest.split_at(self.exponent_bits);

        let sign = match sign_bits.first() {
            Some(Gene::One) => -1.0,
            _ => 1.0,
        };

        let exponent_field = exponent_bits
            .iter()
            .fold(0_i32, |acc, gene| (acc << 1) | i32::from(gene.as_bit()));
        let exponent = exponent_field - self.exponent_bias();

        let mut fraction = 0.0;
        let mut weight = 0.5;
        for gene in fraction_bits {
            if gene.is_one() {
                fraction += weight;
            }
            weight /= 2.0;
        }

        Ok(sign * 2.0_f64.powi(exponent) * (1.0 + fraction))
    }

    /// Encodes a number into the nearest representable bit pattern.
    ///
    /// Magnitudes above the largest representable value saturate to it. Magnitudes below
    /// the smallest one (including zero and NaN) map to the smallest representable value,
    /// keeping the sign.
    pub fn encode(&self, value: f64) -> Result<Vec<Gene>, EncodingError> {
        self.validate()?;
        let bias = self.exponent_bias();
        let max_field = self.max_exponent_field();
        let fraction_scale = 2.0_f64.powi(i32::try_from(self.fraction_bits).unwrap_or(i32::MAX));
        let max_fraction = fraction_scale - 1.0;

        let magnitude = if value.is_nan() { 0.0 } else { value.abs() };
        let (field, fraction) = if magnitude == 0.0 {
            (0, 0.0)
        } else if magnitude.is_infinite() {
            (max_field, max_fraction)
        } else {
            #[expect(clippy::cast_possible_truncation)]
            let exponent = magnitude.log2().floor() as i32;
            let field = exponent + bias;
            if field < 0 {
                (0, 0.0)
            } else if field > max_field {
                (max_field, max_fraction)
            } else {
                let mantissa = magnitude / 2.0_f64.powi(exponent) - 1.0;
                let fraction = (mantissa * fraction_scale).round();
                if fraction < fraction_scale {
                    (field, fraction)
                } else if field < max_field {
                    (field + 1, 0.0)
                } else {
                    (max_field, max_fraction)
                }
            }
        };

        let mut bits = Vec::with_capacity(self.total_bits());
        if self.sign_bits > 0 {
            bits.push(Gene::from_bit(value.is_sign_negative() && !value.is_nan()));
            bits.extend((1..self.sign_bits).map(|_| Gene::Zero));
        }
        push_field(&mut bits, u64::from(field.unsigned_abs()), self.exponent_bits);
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let fraction = fraction as u64;
        push_field(&mut bits, fraction, self.fraction_bits);
        Ok(bits)
    }
}

/// Appends the lowest `width` bits of `value`, most significant first.
fn push_field(bits: &mut Vec<Gene>, value: u64, width: usize) {
    bits.extend((0..width).rev().map(|i| Gene::from_bit((value >> i) & 1 == 1)));
}
