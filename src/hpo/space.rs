//! Search space types

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::BoostingParams;
use crate::{Error, Result};

/// One sampled configuration, keyed by parameter name
pub type ParamSet = BTreeMap<String, ParameterValue>;

/// Sampled parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Real value
    Float(f64),
    /// Integer value
    Int(i64),
}

impl ParameterValue {
    /// Value as a float (integers convert).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(self) -> f64 {
        match self {
            Self::Float(v) => v,
            Self::Int(v) => v as f64,
        }
    }

    /// Value as an integer, if it is one.
    #[must_use]
    pub const fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            Self::Float(_) => None,
        }
    }
}

/// Range a parameter is sampled from (bounds inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParameterDomain {
    /// Real interval, uniform in log space when `log_scale`
    Continuous {
        /// Lower bound
        low: f64,
        /// Upper bound
        high: f64,
        /// Sample uniformly in `ln` space
        log_scale: bool,
    },
    /// Integer interval
    Discrete {
        /// Lower bound
        low: i64,
        /// Upper bound
        high: i64,
    },
}

impl ParameterDomain {
    /// Check bounds are ordered (and positive on a log scale).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the bad bound.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Continuous {
                low,
                high,
                log_scale,
            } => {
                if !(low.is_finite() && high.is_finite() && low <= high) {
                    return Err(Error::InvalidInput(format!("bad range [{low}, {high}]")));
                }
                if log_scale && low <= 0.0 {
                    return Err(Error::InvalidInput(format!(
                        "log-scale range must be positive, got low = {low}"
                    )));
                }
            }
            Self::Discrete { low, high } => {
                if low > high {
                    return Err(Error::InvalidInput(format!("bad range [{low}, {high}]")));
                }
            }
        }
        Ok(())
    }

    /// Draw a value uniformly (in log space for log-scaled domains).
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterValue {
        match *self {
            Self::Continuous {
                low,
                high,
                log_scale,
            } => {
                if log_scale {
                    let (lo, hi) = (low.ln(), high.ln());
                    ParameterValue::Float((lo + rng.gen::<f64>() * (hi - lo)).exp().clamp(low, high))
                } else {
                    ParameterValue::Float(low + rng.gen::<f64>() * (high - low))
                }
            }
            Self::Discrete { low, high } => ParameterValue::Int(rng.gen_range(low..=high)),
        }
    }

    /// Whether `value` lies in the domain with the right type.
    #[must_use]
    pub fn contains(&self, value: ParameterValue) -> bool {
        match (*self, value) {
            (Self::Continuous { low, high, .. }, ParameterValue::Float(v)) => {
                v >= low && v <= high
            }
            (Self::Discrete { low, high }, ParameterValue::Int(v)) => v >= low && v <= high,
            _ => false,
        }
    }
}

/// Named parameter domains, iterated in name order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSpace {
    params: BTreeMap<String, ParameterDomain>,
}

impl HyperparameterSpace {
    /// Empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the domain bounds are invalid.
    pub fn add(&mut self, name: impl Into<String>, domain: ParameterDomain) -> Result<()> {
        domain.validate()?;
        self.params.insert(name.into(), domain);
        Ok(())
    }

    /// Domain of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterDomain> {
        self.params.get(name)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the space has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDomain)> {
        self.params.iter()
    }

    /// Draw every parameter independently.
    pub fn sample_random<R: Rng>(&self, rng: &mut R) -> ParamSet {
        self.params
            .iter()
            .map(|(name, domain)| (name.clone(), domain.sample(rng)))
            .collect()
    }

    /// Check `params` assigns an in-domain value to every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first missing or invalid parameter.
    pub fn validate(&self, params: &ParamSet) -> Result<()> {
        for (name, domain) in &self.params {
            match params.get(name) {
                Some(value) if domain.contains(*value) => {}
                Some(value) => {
                    return Err(Error::InvalidInput(format!(
                        "{name} = {value:?} outside {domain:?}"
                    )))
                }
                None => return Err(Error::InvalidInput(format!("{name} not set"))),
            }
        }
        Ok(())
    }
}

/// Trees per model during tuning
pub const TUNING_NUM_TREES: usize = 200;

/// Search space for [`BoostingParams`].
#[must_use]
pub fn gradient_boosting_space() -> HyperparameterSpace {
    let log = |low, high| ParameterDomain::Continuous {
        low,
        high,
        log_scale: true,
    };
    let linear = |low, high| ParameterDomain::Continuous {
        low,
        high,
        log_scale: false,
    };
    let int = |low, high| ParameterDomain::Discrete { low, high };

    let params = [
        ("lambda_l1", log(1e-3, 10.0)),
        ("lambda_l2", log(1e-3, 10.0)),
        ("learning_rate", log(1e-3, 1e-1)),
        ("max_depth", int(4, 8)),
        ("num_leaves", int(16, 256)),
        ("colsample_bytree", linear(0.4, 1.0)),
        ("colsample_bynode", linear(0.4, 1.0)),
        ("bagging_fraction", linear(0.4, 1.0)),
        ("bagging_freq", int(1, 7)),
        ("min_data_in_leaf", int(5, 100)),
    ];
    HyperparameterSpace {
        params: params
            .into_iter()
            .map(|(name, domain)| (name.to_string(), domain))
            .collect(),
    }
}

/// Build boosting parameters from a configuration sampled from
/// [`gradient_boosting_space`]. Unset parameters keep their defaults;
/// `num_trees` is fixed at [`TUNING_NUM_TREES`].
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if an integer parameter holds a float or a
/// negative value, or the result fails [`BoostingParams::validate`].
pub fn boosting_params_from(params: &ParamSet, seed: u64) -> Result<BoostingParams> {
    let float = |name: &str, default: f64| params.get(name).map_or(default, |v| v.as_float());
    let int = |name: &str, default: usize| -> Result<usize> {
        params.get(name).map_or(Ok(default), |v| {
            v.as_int()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| Error::InvalidInput(format!("{name} must be a non-negative integer")))
        })
    };

    let defaults = BoostingParams::default();
    let boosting = BoostingParams {
        num_trees: TUNING_NUM_TREES,
        learning_rate: float("learning_rate", defaults.learning_rate),
        max_depth: match params.get("max_depth") {
            Some(_) => Some(int("max_depth", 0)?),
            None => defaults.max_depth,
        },
        num_leaves: int("num_leaves", defaults.num_leaves)?,
        lambda_l1: float("lambda_l1", defaults.lambda_l1),
        lambda_l2: float("lambda_l2", defaults.lambda_l2),
        min_data_in_leaf: int("min_data_in_leaf", defaults.min_data_in_leaf)?,
        colsample_bytree: float("colsample_bytree", defaults.colsample_bytree),
        colsample_bynode: float("colsample_bynode", defaults.colsample_bynode),
        bagging_fraction: float("bagging_fraction", defaults.bagging_fraction),
        bagging_freq: int("bagging_freq", defaults.bagging_freq)?,
        max_bin: defaults.max_bin,
        seed,
    };
    boosting.validate()?;
    Ok(boosting)
}
