//! Impedance (decay) functions for accessibility scoring.
//!
//! This is the only place scoring semantics live. Each function maps a travel
//! cost in minutes to a weight in [0, 1]: 1 at zero cost, monotonically
//! non-increasing, decaying toward 0. Functions are selected by preset name
//! (decay rate, threshold or bandwidth baked into the preset) and modeled as
//! a closed enum so dispatch is exhaustive rather than stringly-typed.

use crate::error::ConfigurationError;

/// A named impedance function, resolved from a preset identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpedanceFunction {
    name: String,
    family: Family,
}

/// The supported decay families.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Family {
    /// `exp(-beta * t)`
    NegativeExponential { beta: f64 },
    /// 1 within the threshold, 0 beyond it.
    CumulativeRectangular { threshold: f64 },
    /// `exp(-t^2 / bandwidth)`
    ModifiedGaussian { bandwidth: f64 },
    /// `t^-exponent`, clamped to 1 for t <= 1.
    InversePower { exponent: f64 },
}

/// Preset table: name -> family parameters.
const PRESETS: &[(&str, Family)] = &[
    // negative exponential
    ("EXP0_12", Family::NegativeExponential { beta: 0.12 }),
    ("EXP0_15", Family::NegativeExponential { beta: 0.15 }),
    ("EXP0_22", Family::NegativeExponential { beta: 0.22 }),
    ("EXP0_45", Family::NegativeExponential { beta: 0.45 }),
    // Handy & Niemeier (1997) calibration
    ("HN1997", Family::NegativeExponential { beta: 0.1813 }),
    // cumulative rectangular, threshold in minutes
    ("CUMR10", Family::CumulativeRectangular { threshold: 10.0 }),
    ("CUMR20", Family::CumulativeRectangular { threshold: 20.0 }),
    ("CUMR30", Family::CumulativeRectangular { threshold: 30.0 }),
    ("CUMR40", Family::CumulativeRectangular { threshold: 40.0 }),
    ("CUMR45", Family::CumulativeRectangular { threshold: 45.0 }),
    ("CUMR60", Family::CumulativeRectangular { threshold: 60.0 }),
    // modified Gaussian, bandwidth in minutes^2
    ("MGAUS40", Family::ModifiedGaussian { bandwidth: 40.0 }),
    ("MGAUS100", Family::ModifiedGaussian { bandwidth: 100.0 }),
    ("MGAUS180", Family::ModifiedGaussian { bandwidth: 180.0 }),
    // inverse power
    ("POW0_8", Family::InversePower { exponent: 0.8 }),
    ("POW1_0", Family::InversePower { exponent: 1.0 }),
    ("POW1_5", Family::InversePower { exponent: 1.5 }),
    ("POW2_0", Family::InversePower { exponent: 2.0 }),
];

impl ImpedanceFunction {
    /// Resolve a preset by name.
    pub fn from_name(name: &str) -> Result<Self, ConfigurationError> {
        PRESETS
            .iter()
            .find(|(preset, _)| *preset == name)
            .map(|(preset, family)| Self {
                name: (*preset).to_string(),
                family: *family,
            })
            .ok_or_else(|| ConfigurationError::UnknownImpedance(name.to_string()))
    }

    /// Resolve an ordered selection of presets, failing on the first unknown
    /// name and on an empty selection.
    pub fn from_names(names: &[String]) -> Result<Vec<Self>, ConfigurationError> {
        if names.is_empty() {
            return Err(ConfigurationError::NoImpedanceFunctions);
        }
        names.iter().map(|name| Self::from_name(name)).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output column name for this function's accessibility sum.
    pub fn column_name(&self) -> String {
        format!("Ai_{}", self.name)
    }

    /// Evaluate the decay weight for a travel cost in minutes.
    ///
    /// Negative costs are treated as zero; a cost-matrix backend should never
    /// produce them, but a clamped answer beats a surprising one.
    pub fn eval(&self, cost_minutes: f64) -> f64 {
        let t = cost_minutes.max(0.0);
        match self.family {
            Family::NegativeExponential { beta } => (-beta * t).exp(),
            Family::CumulativeRectangular { threshold } => {
                if t <= threshold {
                    1.0
                } else {
                    0.0
                }
            }
            Family::ModifiedGaussian { bandwidth } => (-(t * t) / bandwidth).exp(),
            Family::InversePower { exponent } => {
                if t <= 1.0 {
                    1.0
                } else {
                    t.powf(-exponent)
                }
            }
        }
    }
}
