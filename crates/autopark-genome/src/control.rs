//! Turning coefficients and sensor readings into car controls.
//!
//! Each control formula is a linear polynomial over the sensor readings with a trailing
//! bias coefficient. The result is squashed through a sigmoid and classified into three
//! categories. The margin is close to `0.5`, so only near-saturated outputs produce a
//! decisive action and everything else falls back to neutral/straight.

use crate::{DecodedGenome, EncodingError, Genome, GenomeLayout, SensorCountError};

/// Default classification margin around `0.5`.
pub const DEFAULT_MARGIN: f64 = 0.49999;

/// Reading used for a sensor whose ray hit nothing.
pub const NO_DETECTION: f64 = 0.0;

/// Converts optional ray hit distances into readings, substituting [`NO_DETECTION`].
#[must_use]
pub fn sensor_readings(hits: &[Option<f64>]) -> Vec<f64> {
    hits.iter().map(|hit| hit.unwrap_or(NO_DETECTION)).collect()
}

#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Ternary outcome of one control formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::IsVariant)]
pub enum Category {
    Negative,
    Neutral,
    Positive,
}

impl Category {
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Negative => -1,
            Self::Neutral => 0,
            Self::Positive => 1,
        }
    }
}

/// Classifies a sigmoid output.
///
/// Returns [`Category::Negative`] below `0.5 - margin`, [`Category::Positive`] above
/// `0.5 + margin`, and [`Category::Neutral`] otherwise.
#[must_use]
pub fn sigmoid_to_category(normalized: f64, margin: f64) -> Category {
    if normalized < 0.5 - margin {
        Category::Negative
    } else if normalized > 0.5 + margin {
        Category::Positive
    } else {
        Category::Neutral
    }
}

/// Evaluates `coefficients[last] + Σ coefficients[i] * readings[i]`.
pub fn linear_polynomial(coefficients: &[f64], readings: &[f64]) -> Result<f64, SensorCountError> {
    let Some((bias, weights)) = coefficients.split_last() else {
        return Err(SensorCountError {
            expected: 0,
            actual: readings.len(),
        });
    };
    if weights.len() != readings.len() {
        return Err(SensorCountError {
            expected: weights.len(),
            actual: readings.len(),
        });
    }
    Ok(bias + weights.iter().zip(readings).map(|(c, r)| c * r).sum::<f64>())
}

/// Decides one control category using [`DEFAULT_MARGIN`].
pub fn decide(coefficients: &[f64], readings: &[f64]) -> Result<Category, SensorCountError> {
    decide_with_margin(coefficients, readings, DEFAULT_MARGIN)
}

pub fn decide_with_margin(
    coefficients: &[f64],
    readings: &[f64],
    margin: f64,
) -> Result<Category, SensorCountError> {
    let raw = linear_polynomial(coefficients, readings)?;
    Ok(sigmoid_to_category(sigmoid(raw), margin))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::IsVariant)]
pub enum EngineMode {
    Backwards,
    Neutral,
    Forwards,
}

impl From<Category> for EngineMode {
    fn from(category: Category) -> Self {
        match category {
            Category::Negative => Self::Backwards,
            Category::Neutral => Self::Neutral,
            Category::Positive => Self::Forwards,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::IsVariant)]
pub enum WheelMode {
    Left,
    Straight,
    Right,
}

impl From<Category> for WheelMode {
    fn from(category: Category) -> Self {
        match category {
            Category::Negative => Self::Left,
            Category::Neutral => Self::Straight,
            Category::Positive => Self::Right,
        }
    }
}

/// Controls applied to a car for one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CarControls {
    pub engine: EngineMode,
    pub wheel: WheelMode,
}

/// Decodes a genome once and then drives a car tick by tick.
#[derive(Debug, Clone)]
pub struct ControlDecoder {
    coefficients: DecodedGenome,
    margin: f64,
}

impl ControlDecoder {
    pub fn new(layout: &GenomeLayout, genome: &Genome) -> Result<Self, EncodingError> {
        Ok(Self::from_coefficients(layout.decode(genome)?))
    }

    #[must_use]
    pub fn from_coefficients(coefficients: DecodedGenome) -> Self {
        Self {
            coefficients,
            margin: DEFAULT_MARGIN,
        }
    }

    #[must_use]
    pub fn with_margin(self, margin: f64) -> Self {
        Self { margin, ..self }
    }

    #[must_use]
    pub fn coefficients(&self) -> &DecodedGenome {
        &self.coefficients
    }

    /// Decides engine and wheel modes for one set of sensor readings.
    ///
    /// Missing ray hits must already be replaced with [`NO_DETECTION`]
    /// (see [`sensor_readings`]).
    pub fn decide(&self, readings: &[f64]) -> Result<CarControls, SensorCountError> {
        let engine =
            decide_with_margin(&self.coefficients.engine_coefficients, readings, self.margin)?;
        let wheel = decide_with_margin(
            &self.coefficients.steering_coefficients,
            readings,
            self.margin,
        )?;
        Ok(CarControls {
            engine: engine.into(),
            wheel: wheel.into(),
        })
    }
}
