//! Trial samplers
//!
//! TPE splits finished trials at the `gamma` score quantile into good and bad
//! sets, then for each parameter keeps the candidate (drawn around good
//! values) that maximises the density ratio `l(x) / g(x)`.

use rand::Rng;
use std::fmt;
use std::str::FromStr;

use super::space::{HyperparameterSpace, ParamSet, ParameterDomain, ParameterValue};
use crate::{Error, Result};

const CANDIDATES: usize = 24;

/// One evaluated configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Trial number, from 0
    pub id: usize,
    /// Sampled configuration
    pub params: ParamSet,
    /// Objective value (lower is better)
    pub score: f64,
}

/// Sampling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerKind {
    /// Independent uniform draws
    Random,
    /// Tree-structured Parzen estimator
    #[default]
    Tpe,
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Random => "random",
            Self::Tpe => "tpe",
        })
    }
}

impl FromStr for SamplerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "tpe" => Ok(Self::Tpe),
            other => Err(Error::InvalidInput(format!(
                "unknown sampler '{other}', expected 'random' or 'tpe'"
            ))),
        }
    }
}

/// TPE settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpeSampler {
    gamma: f64,
    n_startup: usize,
    bandwidth: f64,
}

impl Default for TpeSampler {
    fn default() -> Self {
        Self {
            gamma: 0.25,
            n_startup: 10,
            bandwidth: 1.0,
        }
    }
}

impl TpeSampler {
    /// Quantile separating good from bad trials, clamped to `[0.01, 0.99]`.
    #[must_use]
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(0.01, 0.99);
        self
    }

    /// Random trials before TPE takes over (at least 1).
    #[must_use]
    pub fn with_startup(mut self, n: usize) -> Self {
        self.n_startup = n.max(1);
        self
    }

    /// Propose the next configuration given finished `history`.
    pub fn suggest<R: Rng>(
        &self,
        space: &HyperparameterSpace,
        history: &[Trial],
        rng: &mut R,
    ) -> ParamSet {
        if history.len() < self.n_startup.max(2) {
            return space.sample_random(rng);
        }

        let mut sorted: Vec<&Trial> = history.iter().collect();
        sorted.sort_by(|a, b| a.score.total_cmp(&b.score));
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len() - 1);
        let (good, bad) = sorted.split_at(n_good);

        space
            .iter()
            .map(|(name, domain)| {
                let value = self.sample_parameter(name, *domain, good, bad, rng);
                (name.clone(), value)
            })
            .collect()
    }

    fn sample_parameter<R: Rng>(
        &self,
        name: &str,
        domain: ParameterDomain,
        good: &[&Trial],
        bad: &[&Trial],
        rng: &mut R,
    ) -> ParameterValue {
        let values = |trials: &[&Trial], log: bool| -> Vec<f64> {
            trials
                .iter()
                .filter_map(|t| t.params.get(name))
                .map(|v| if log { v.as_float().ln() } else { v.as_float() })
                .collect()
        };

        match domain {
            ParameterDomain::Continuous {
                low,
                high,
                log_scale,
            } => {
                let (lo, hi) = if log_scale {
                    (low.ln(), high.ln())
                } else {
                    (low, high)
                };
                let x = self.best_candidate(
                    &values(good, log_scale),
                    &values(bad, log_scale),
                    lo,
                    hi,
                    rng,
                );
                let x = if log_scale { x.exp() } else { x };
                ParameterValue::Float(x.clamp(low, high))
            }
            ParameterDomain::Discrete { low, high } => {
                #[allow(clippy::cast_precision_loss)]
                let (lo, hi) = (low as f64, high as f64);
                let x = self.best_candidate(&values(good, false), &values(bad, false), lo, hi, rng);
                #[allow(clippy::cast_possible_truncation)]
                let rounded = x.round() as i64;
                ParameterValue::Int(rounded.clamp(low, high))
            }
        }
    }

    fn best_candidate<R: Rng>(
        &self,
        good: &[f64],
        bad: &[f64],
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> f64 {
        if good.is_empty() || high <= low {
            return low + rng.gen::<f64>() * (high - low);
        }
        let bandwidth = self.bandwidth * (high - low) / 10.0;

        let mut best = (f64::NEG_INFINITY, low);
        for _ in 0..CANDIDATES {
            let base = good[rng.gen_range(0..good.len())];
            // Box-Muller
            let u1 = rng.gen::<f64>().max(1e-10);
            let u2 = rng.gen::<f64>();
            let noise = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos() * bandwidth;
            let candidate = (base + noise).clamp(low, high);

            let ratio = kde(candidate, good, bandwidth) / (kde(candidate, bad, bandwidth) + 1e-10);
            if ratio > best.0 {
                best = (ratio, candidate);
            }
        }
        best.1
    }
}

fn kde(x: f64, values: &[f64], bandwidth: f64) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values
        .iter()
        .map(|&v| (-(x - v).powi(2) / (2.0 * bandwidth.powi(2))).exp())
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn unit_space() -> HyperparameterSpace {
        let mut space = HyperparameterSpace::new();
        space
            .add(
                "x",
                ParameterDomain::Continuous {
                    low: 0.0,
                    high: 1.0,
                    log_scale: false,
                },
            )
            .unwrap();
        space
            .add("k", ParameterDomain::Discrete { low: 1, high: 5 })
            .unwrap();
        space
    }

    #[test]
    fn test_sampler_kind_parse() {
        assert_eq!("TPE".parse::<SamplerKind>().unwrap(), SamplerKind::Tpe);
        assert_eq!("random".parse::<SamplerKind>().unwrap(), SamplerKind::Random);
        assert!("grid".parse::<SamplerKind>().is_err());
    }

    #[test]
    fn test_tpe_concentrates_near_good_trials() {
        let space = unit_space();
        let tpe = TpeSampler::default().with_startup(5);
        let mut rng = StdRng::seed_from_u64(42);

        // Score is distance from x = 0.2
        let history: Vec<Trial> = (0..20)
            .map(|i| {
                let x = f64::from(i) / 19.0;
                let mut params = ParamSet::new();
                params.insert("x".to_string(), ParameterValue::Float(x));
                params.insert("k".to_string(), ParameterValue::Int(3));
                Trial {
                    id: usize::try_from(i).unwrap(),
                    params,
                    score: (x - 0.2).abs(),
                }
            })
            .collect();

        let mean: f64 = (0..50)
            .map(|_| tpe.suggest(&space, &history, &mut rng)["x"].as_float())
            .sum::<f64>()
            / 50.0;
        assert!(mean < 0.45, "mean suggestion {mean}");
    }

    #[test]
    fn test_tpe_suggestions_stay_in_domain() {
        let space = unit_space();
        let tpe = TpeSampler::default().with_startup(2);
        let mut rng = StdRng::seed_from_u64(7);
        let mut history = Vec::new();
        for id in 0..30 {
            let params = tpe.suggest(&space, &history, &mut rng);
            space.validate(&params).unwrap();
            let score = params["x"].as_float();
            history.push(Trial { id, params, score });
        }
    }

    #[test]
    fn test_with_gamma_clamps() {
        assert!((TpeSampler::default().with_gamma(2.0).gamma - 0.99).abs() < 1e-12);
    }
}
