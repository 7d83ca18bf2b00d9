use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use pos_pso::{JobConfig, PSO, PSOConfig, SwarmConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxIterations,
    /// Best cost fell to `min_func` or below.
    ExitCost,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
    pub stop: StopReason,
}

/// A bounded, derivative-free global minimizer.
pub trait Minimizer {
    fn minimize<F>(&self, f: F, lower: &[f64], upper: &[f64]) -> Result<Minimum>
    where
        F: Fn(&[f64]) -> f64 + Clone + Send + Sync + 'static;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwarmParams {
    pub swarms: usize,
    /// Particles per swarm.
    pub swarm_size: usize,
    /// Inertia weight.
    pub omega: f64,
    pub inertia_growth: f64,
    /// Pull towards each particle's own best.
    pub phi_p: f64,
    /// Pull towards the swarm's best.
    pub phi_t: f64,
    /// Pull towards the best of all swarms.
    pub phi_g: f64,
    /// Share of velocity kept after bouncing off a bound.
    pub wall_bounce: f64,
    /// Iterations between swarms exchanging their best positions.
    pub collab_period: usize,
    /// Velocity cap as a share of each dimension's span.
    pub max_velocity: f64,
    pub max_iter: usize,
    /// Exit cost.
    pub min_func: f64,
}

impl Default for SwarmParams {
    fn default() -> Self {
        Self {
            swarms: 1,
            swarm_size: 500,
            omega: 0.5,
            inertia_growth: 1.25,
            phi_p: 0.5,
            phi_t: 0.5,
            phi_g: 0.5,
            wall_bounce: 0.125,
            collab_period: 10,
            max_velocity: 1.0,
            max_iter: 5,
            min_func: 1e-8,
        }
    }
}

impl SwarmParams {
    fn validate(&self) -> Result<()> {
        if self.swarms == 0 || self.swarm_size == 0 {
            return Err(Error::Optimizer(
                "need at least one swarm of at least one particle".to_string(),
            ));
        }
        if self.max_iter == 0 {
            return Err(Error::Optimizer("max_iter must be at least 1".to_string()));
        }
        if self.max_velocity.is_nan() || self.max_velocity <= 0.0 {
            return Err(Error::Optimizer(format!(
                "max velocity share must be positive, got {}",
                self.max_velocity
            )));
        }
        Ok(())
    }
}

/// Particle swarm search backed by `pos_pso`.
#[derive(Clone, Debug, Default)]
pub struct ParticleSwarm {
    pub params: SwarmParams,
}

impl ParticleSwarm {
    pub fn new(params: SwarmParams) -> Self {
        Self { params }
    }
}

pub fn check_bounds(lower: &[f64], upper: &[f64]) -> Result<()> {
    if lower.len() != upper.len() {
        return Err(Error::BoundsLength {
            lower: lower.len(),
            upper: upper.len(),
        });
    }
    for (dim, (&lo, &hi)) in lower.iter().zip(upper).enumerate() {
        if lo.is_nan() || hi.is_nan() || lo >= hi {
            return Err(Error::InvalidBounds {
                dim,
                lower: lo,
                upper: hi,
            });
        }
    }
    Ok(())
}

fn clamp_into(x: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    x.iter()
        .zip(lower.iter().zip(upper))
        .map(|(v, (lo, hi))| v.clamp(*lo, *hi))
        .collect()
}

impl Minimizer for ParticleSwarm {
    fn minimize<F>(&self, f: F, lower: &[f64], upper: &[f64]) -> Result<Minimum>
    where
        F: Fn(&[f64]) -> f64 + Clone + Send + Sync + 'static,
    {
        check_bounds(lower, upper)?;
        let p = &self.params;
        p.validate()?;

        let dims = lower.len();
        let bounds: Vec<[f64; 2]> = lower.iter().zip(upper).map(|(lo, hi)| [*lo, *hi]).collect();
        let max_velocity: Vec<f64> = lower
            .iter()
            .zip(upper)
            .map(|(lo, hi)| (hi - lo) * p.max_velocity)
            .collect();

        let pso = PSO::new(PSOConfig::new(p.swarms, p.swarm_size, p.max_iter, false));
        let job = JobConfig::new(dims, bounds, max_velocity, p.max_iter, p.min_func);
        let swarm = SwarmConfig::new_collaborative(
            p.phi_p,
            p.phi_t,
            p.phi_g,
            p.omega,
            p.inertia_growth,
            p.wall_bounce,
            p.collab_period,
        );

        // particles may sit on or past a wall between bounces
        let evaluations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evaluations);
        let (lo, hi) = (lower.to_vec(), upper.to_vec());
        let cost = move |x: &[f64]| {
            counter.fetch_add(1, Ordering::Relaxed);
            f(&clamp_into(x, &lo, &hi))
        };

        let (value, x) = pso.minimize(job, swarm, cost);
        let evaluations = evaluations.load(Ordering::Relaxed);
        let stop = if value <= p.min_func {
            StopReason::ExitCost
        } else {
            StopReason::MaxIterations
        };
        debug!("swarm finished after {evaluations} evaluations ({stop:?}): best={value:.6e}");

        Ok(Minimum {
            x: clamp_into(&x, lower, upper),
            value,
            evaluations,
            stop,
        })
    }
}
