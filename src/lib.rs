//! Backtesting and particle swarm optimization of an ICO participation strategy.
//!
//! Historical ICO price series are reduced to a table of appreciation factors per
//! day since listing. A day-stepped simulator replays a strategy against that table,
//! and the optimizer searches strategy space for the best worst-case profit.

pub mod config;
pub mod dataset;
pub mod dates;
pub mod error;
pub mod factors;
pub mod ico;
pub mod objective;
pub mod optimizer;
pub mod pso;
pub mod simulator;

pub use config::{FixedParameters, Strategy};
pub use error::{Error, Result};
pub use factors::{Dataset, FactorTable};
pub use objective::{ObjectiveAdapter, Reduction, SearchSpace};
pub use optimizer::{OptimizationReport, StrategyOptimizer};
pub use pso::{Minimizer, ParticleSwarm, SwarmParams};
pub use simulator::{SelectionPolicy, SimulationContext, Simulator};
