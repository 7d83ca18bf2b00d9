use log::info;
use serde::Serialize;

use crate::config::{STRATEGY_DIMS, Strategy};
use crate::error::{Error, Result};
use crate::objective::ObjectiveAdapter;
use crate::pso::{Minimizer, ParticleSwarm, StopReason};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimizationReport {
    pub strategy: Strategy,
    pub vector: [f64; STRATEGY_DIMS],
    pub objective: f64,
    pub profit: f64,
    pub evaluations: usize,
    pub stop: StopReason,
}

/// Searches strategy space for the parameters with the best reduced profit.
pub struct StrategyOptimizer<M = ParticleSwarm> {
    adapter: ObjectiveAdapter,
    minimizer: M,
}

impl<M: Minimizer> StrategyOptimizer<M> {
    pub fn new(adapter: ObjectiveAdapter, minimizer: M) -> Self {
        Self { adapter, minimizer }
    }

    pub fn optimize(&self) -> Result<OptimizationReport> {
        let space = self.adapter.space();
        if space.free_count() == 0 {
            return Err(Error::Optimizer(
                "every strategy dimension is fixed".to_string(),
            ));
        }
        let (lower, upper) = space.bounds();

        info!(
            "particle swarm optimization started over {} dimensions",
            lower.len()
        );
        let adapter = self.adapter.clone();
        let minimum = self.minimizer.minimize(
            move |x: &[f64]| adapter.evaluate(x).unwrap_or(f64::INFINITY),
            &lower,
            &upper,
        )?;

        let vector = space.expand(&minimum.x)?;
        let strategy = Strategy::from_vector(&vector)?;
        let profit = 1.0 / minimum.value;
        info!(
            "optimization finished after {} evaluations ({:?}): profit=${:.2}",
            minimum.evaluations, minimum.stop, profit
        );

        Ok(OptimizationReport {
            strategy,
            vector,
            objective: minimum.value,
            profit,
            evaluations: minimum.evaluations,
            stop: minimum.stop,
        })
    }
}
