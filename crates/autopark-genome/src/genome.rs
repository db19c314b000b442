use std::{fmt, str::FromStr};

use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{EncodingError, PrecisionConfig};

/// A single bit of a genome.
///
/// Serialized as the JSON number `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::IsVariant)]
pub enum Gene {
    Zero,
    One,
}

impl Gene {
    #[must_use]
    pub const fn from_bit(bit: bool) -> Self {
        if bit { Self::One } else { Self::Zero }
    }

    #[must_use]
    pub const fn as_bit(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }

    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Zero => '0',
            Self::One => '1',
        }
    }

    const fn from_char(ch: char) -> Option<Self> {
        match ch {
            '0' => Some(Self::Zero),
            '1' => Some(Self::One),
            _ => None,
        }
    }
}

impl Serialize for Gene {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_bit())
    }
}

impl<'de> Deserialize<'de> for Gene {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            0 => Ok(Self::Zero),
            1 => Ok(Self::One),
            n => Err(serde::de::Error::custom(format!(
                "invalid gene: expected 0 or 1, got {n}"
            ))),
        }
    }
}

/// Fair coin flip, so `rng.random::<Gene>()` is Bernoulli(0.5).
impl Distribution<Gene> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Gene {
        Gene::from_bit(rng.random_bool(0.5))
    }
}

/// An ordered, fixed-length sequence of genes encoding one control policy.
///
/// Genomes are never modified in place by the genetic operators; mutation and
/// crossover always build new genomes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genome(Vec<Gene>);

impl Genome {
    #[must_use]
    pub fn new(genes: Vec<Gene>) -> Self {
        Self(genes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn genes(&self) -> &[Gene] {
        &self.0
    }

    #[must_use]
    pub fn into_genes(self) -> Vec<Gene> {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Gene> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<Gene>> for Genome {
    fn from(genes: Vec<Gene>) -> Self {
        Self(genes)
    }
}

impl FromIterator<Gene> for Genome {
    fn from_iter<I: IntoIterator<Item = Gene>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parses a bit string such as `"0110"`. Surrounding whitespace is ignored.
impl FromStr for Genome {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .chars()
            .enumerate()
            .map(|(position, found)| {
                Gene::from_char(found).ok_or(EncodingError::InvalidGene { found, position })
            })
            .collect()
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for gene in &self.0 {
            write!(f, "{}", gene.as_char())?;
        }
        Ok(())
    }
}

/// Layout of a genome: how many sensors feed the control formulas and how each
/// coefficient is encoded.
///
/// A genome holds two contiguous blocks, engine first, then steering. Each block holds
/// `sensor_count + 1` numbers: one coefficient per sensor plus a trailing bias.
///
/// ```text
/// | engine: c0 .. c(n-1) bias | steering: c0 .. c(n-1) bias |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenomeLayout {
    pub sensor_count: usize,
    pub precision: PrecisionConfig,
}

impl GenomeLayout {
    /// Number of distance sensors mounted on the car.
    pub const SENSOR_COUNT: usize = 8;

    /// The layout used for training: 8 sensors, reduced 10-bit numbers (180 genes).
    pub const PRODUCTION: Self = Self::new(Self::SENSOR_COUNT, PrecisionConfig::REDUCED);

    #[must_use]
    pub const fn new(sensor_count: usize, precision: PrecisionConfig) -> Self {
        Self {
            sensor_count,
            precision,
        }
    }

    /// Number of coefficients in one formula (one per sensor plus the bias).
    #[must_use]
    pub const fn coefficient_count(&self) -> usize {
        self.sensor_count + 1
    }

    #[must_use]
    pub const fn bits_per_number(&self) -> usize {
        self.precision.total_bits()
    }

    #[must_use]
    pub const fn engine_genes(&self) -> usize {
        self.coefficient_count() * self.bits_per_number()
    }

    #[must_use]
    pub const fn steering_genes(&self) -> usize {
        self.coefficient_count() * self.bits_per_number()
    }

    #[must_use]
    pub const fn genome_length(&self) -> usize {
        self.engine_genes() + self.steering_genes()
    }

    /// Checks that a genome fits this layout.
    pub fn validate(&self, genome: &Genome) -> Result<(), EncodingError> {
        if genome.len() == self.genome_length() {
            Ok(())
        } else {
            Err(EncodingError::GenomeLength {
                expected: self.genome_length(),
                actual: genome.len(),
            })
        }
    }

    /// Decodes a genome into its engine and steering coefficients.
    ///
    /// # Examples
    ///
    /// ```
    /// # use autopark_genome::{Gene, Genome, GenomeLayout};
    /// let layout = GenomeLayout::PRODUCTION;
    /// let genome = Genome::new(vec![Gene::Zero; layout.genome_length()]);
    /// let decoded = layout.decode(&genome).unwrap();
    /// assert_eq!(decoded.engine_coefficients.len(), 9);
    /// assert_eq!(decoded.steering_coefficients[8], 0.0078125);
    /// ```
    pub fn decode(&self, genome: &Genome) -> Result<DecodedGenome, EncodingError> {
        self.validate(genome)?;
        let (engine, steering) = genome.genes().split_at(self.engine_genes());
        Ok(DecodedGenome {
            engine_coefficients: self.decode_block(engine)?,
            steering_coefficients: self.decode_block(steering)?,
        })
    }

    fn decode_block(&self, block: &[Gene]) -> Result<Vec<f64>, EncodingError> {
        block
            .chunks(self.bits_per_number())
            .map(|bits| self.precision.decode(bits))
            .collect()
    }

    /// Encodes coefficients into a genome, rounding each to the nearest representable
    /// number.
    pub fn encode(&self, decoded: &DecodedGenome) -> Result<Genome, EncodingError> {
        for block in [&decoded.engine_coefficients, &decoded.steering_coefficients] {
            if block.len() != self.coefficient_count() {
                return Err(EncodingError::CoefficientCount {
                    expected: self.coefficient_count(),
                    actual: block.len(),
                });
            }
        }
        let mut genes = Vec::with_capacity(self.genome_length());
        for value in decoded
            .engine_coefficients
            .iter()
            .chain(&decoded.steering_coefficients)
        {
            genes.extend(self.precision.encode(*value)?);
        }
        Ok(Genome::new(genes))
    }
}

impl Default for GenomeLayout {
    fn default() -> Self {
        Self::PRODUCTION
    }
}

/// Coefficients of the two control formulas carried by a genome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedGenome {
    pub engine_coefficients: Vec<f64>,
    pub steering_coefficients: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_production_layout_constants() {
        let layout = GenomeLayout::PRODUCTION;
        assert_eq!(layout.coefficient_count(), 9);
        assert_eq!(layout.bits_per_number(), 10);
        assert_eq!(layout.engine_genes(), 90);
        assert_eq!(layout.steering_genes(), 90);
        assert_eq!(layout.genome_length(), 180);
    }

    #[test]
    fn test_parse_and_display() {
        let genome: Genome = " 0110\n".parse().unwrap();
        assert_eq!(
            genome.genes(),
            &[Gene::Zero, Gene::One, Gene::One, Gene::Zero]
        );
        assert_eq!(genome.to_string(), "0110");
    }

    #[test]
    fn test_parse_rejects_invalid_gene() {
        let err = "01x1".parse::<Genome>().unwrap_err();
        assert!(matches!(
            err,
            EncodingError::InvalidGene {
                found: 'x',
                position: 2
            }
        ));
    }

    #[test]
    fn test_gene_json_format() {
        let genome: Genome = "101".parse().unwrap();
        let json = serde_json::to_string(&genome).unwrap();
        assert_eq!(json, "[1,0,1]");
        let back: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, genome);
        assert!(serde_json::from_str::<Genome>("[0,2]").is_err());
    }

    #[test]
    fn test_decode_splits_blocks() {
        let layout = GenomeLayout::new(1, PrecisionConfig::REDUCED);
        // engine: [1.0, -3.0], steering: [504.0, 0.0078125]
        let genome: Genome = ["0011100000", "1100010000", "0111111111", "0000000000"]
            .concat()
            .parse()
            .unwrap();
        let decoded = layout.decode(&genome).unwrap();
        assert_eq!(decoded.engine_coefficients, vec![1.0, -3.0]);
        assert_eq!(decoded.steering_coefficients, vec![504.0, 0.007_812_5]);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let layout = GenomeLayout::PRODUCTION;
        for len in [0, 179, 181, 360] {
            let genome = Genome::new(vec![Gene::One; len]);
            let err = layout.decode(&genome).unwrap_err();
            assert!(matches!(
                err,
                EncodingError::GenomeLength { expected: 180, actual } if actual == len
            ));
        }
    }

    #[test]
    fn test_encode_then_decode_random_genome() {
        let layout = GenomeLayout::PRODUCTION;
        let mut rng = Pcg32::seed_from_u64(7);
        let genome: Genome = (0..layout.genome_length())
            .map(|_| rng.random::<Gene>())
            .collect();
        let decoded = layout.decode(&genome).unwrap();
        assert_eq!(layout.encode(&decoded).unwrap(), genome);
    }

    #[test]
    fn test_encode_rejects_wrong_coefficient_count() {
        let layout = GenomeLayout::PRODUCTION;
        let decoded = DecodedGenome {
            engine_coefficients: vec![1.0; 9],
            steering_coefficients: vec![1.0; 3],
        };
        assert!(matches!(
            layout.encode(&decoded),
            Err(EncodingError::CoefficientCount {
                expected: 9,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_unsupported_precision_is_an_error() {
        let layout = GenomeLayout::new(1, PrecisionConfig::new(1, 0, 4));
        let genome = Genome::new(vec![Gene::Zero; layout.genome_length()]);
        assert!(matches!(
            layout.decode(&genome),
            Err(EncodingError::UnsupportedPrecision {
                exponent_bits: 0,
                fraction_bits: 4
            })
        ));
        let decoded = DecodedGenome {
            engine_coefficients: vec![1.0; 2],
            steering_coefficients: vec![1.0; 2],
        };
        assert!(layout.encode(&decoded).is_err());
    }
}
