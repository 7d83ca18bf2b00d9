use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{STRATEGY_DIMS, Strategy};
use crate::error::{Error, Result};
use crate::simulator::{SimulationContext, Simulator};

/// How repeated runs of one strategy collapse to a single profit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    #[default]
    WorstCase,
    Mean,
    Single,
}

/// One strategy dimension: searched within bounds or pinned to a value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Dimension {
    Free { low: f64, high: f64 },
    Fixed(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub dims: [Dimension; STRATEGY_DIMS],
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            dims: [
                Dimension::Free { low: 1.5, high: 15.0 },
                Dimension::Free { low: 0.0, high: 60.0 },
                Dimension::Free { low: 0.0, high: 3.0 },
                Dimension::Free {
                    low: 60.0,
                    high: 120.0,
                },
            ],
        }
    }
}

impl SearchSpace {
    pub fn free_count(&self) -> usize {
        self.dims
            .iter()
            .filter(|d| matches!(d, Dimension::Free { .. }))
            .count()
    }

    /// Lower and upper bounds of the free dimensions.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.dims
            .iter()
            .filter_map(|d| match *d {
                Dimension::Free { low, high } => Some((low, high)),
                Dimension::Fixed(_) => None,
            })
            .unzip()
    }

    /// Fill fixed dimensions around the searched values.
    pub fn expand(&self, free: &[f64]) -> Result<[f64; STRATEGY_DIMS]> {
        let expected = self.free_count();
        if free.len() != expected {
            return Err(Error::StrategyLength {
                expected,
                got: free.len(),
            });
        }
        let mut it = free.iter();
        let mut out = [0.0; STRATEGY_DIMS];
        for (slot, dim) in out.iter_mut().zip(&self.dims) {
            *slot = match *dim {
                Dimension::Fixed(v) => v,
                Dimension::Free { .. } => it.next().copied().unwrap_or_default(),
            };
        }
        Ok(out)
    }

    pub fn strategy(&self, free: &[f64]) -> Result<Strategy> {
        Strategy::from_vector(&self.expand(free)?)
    }
}

/// Maps strategy vectors to a value a minimizer can work with.
///
/// Cheap to clone; clones share the simulation context.
#[derive(Clone)]
pub struct ObjectiveAdapter {
    ctx: Arc<SimulationContext>,
    space: SearchSpace,
    runs: usize,
    reduction: Reduction,
    base_seed: u64,
}

impl ObjectiveAdapter {
    pub fn new(ctx: Arc<SimulationContext>, space: SearchSpace) -> Self {
        Self {
            ctx,
            space,
            runs: 20,
            reduction: Reduction::WorstCase,
            base_seed: 0,
        }
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs.max(1);
        self
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// Repeats only matter when selection is random.
    fn effective_runs(&self) -> usize {
        if self.reduction == Reduction::Single || self.ctx.policy.is_deterministic() {
            1
        } else {
            self.runs
        }
    }

    pub fn profit(&self, strategy: &Strategy) -> f64 {
        let sim = Simulator::new(&self.ctx);
        let runs = self.effective_runs();
        let profits: Vec<f64> = (0..runs)
            .into_par_iter()
            .map(|i| sim.simulate(strategy, self.base_seed.wrapping_add(i as u64)))
            .collect();

        match self.reduction {
            Reduction::WorstCase => profits.iter().copied().fold(f64::INFINITY, f64::min),
            Reduction::Mean => profits.iter().sum::<f64>() / profits.len() as f64,
            Reduction::Single => profits[0],
        }
    }

    /// `1 / max(profit, 1)`, so minimizing it maximizes profit.
    pub fn evaluate(&self, free: &[f64]) -> Result<f64> {
        let strategy = self.space.strategy(free)?;
        Ok(inverse_profit(self.profit(&strategy)))
    }
}

pub fn inverse_profit(profit: f64) -> f64 {
    1.0 / profit.max(1.0)
}
