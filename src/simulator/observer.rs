use log::{debug, trace};

use super::{Generation, HarvestReason, Investment};
use crate::dates::ms_to_date_string;

/// Hooks called on every state transition of a simulation run.
pub trait SimulationObserver {
    fn on_deploy(&mut self, _day_ms: i64, _investment: &Investment) {}

    fn on_harvest(
        &mut self,
        _day_ms: i64,
        _investment: &Investment,
        _value: f64,
        _reason: HarvestReason,
    ) {
    }

    fn on_generation(&mut self, _day_ms: i64, _generation: &Generation) {}

    fn on_day_end(&mut self, _day_ms: i64, _cash: f64, _portfolio_value: f64) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl SimulationObserver for NoopObserver {}

/// Writes each transition to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl SimulationObserver for LogObserver {
    fn on_deploy(&mut self, day_ms: i64, investment: &Investment) {
        debug!(
            "[{}] adding investment {} for ${:.0} ({:?})",
            ms_to_date_string(day_ms),
            investment.symbol,
            investment.amount,
            investment.listing
        );
    }

    fn on_harvest(&mut self, day_ms: i64, investment: &Investment, value: f64, reason: HarvestReason) {
        debug!(
            "[{}] cashing {} from ${:.0} for ${:.0} after {} days on exchange ({:?})",
            ms_to_date_string(day_ms),
            investment.symbol,
            investment.amount,
            value,
            investment.duration,
            reason
        );
    }

    fn on_generation(&mut self, day_ms: i64, generation: &Generation) {
        debug!(
            "[{}] generation {} slot=${:.0} target=${:.0}",
            ms_to_date_string(day_ms),
            generation.number,
            generation.investment_amount,
            generation.target
        );
    }

    fn on_day_end(&mut self, day_ms: i64, cash: f64, portfolio_value: f64) {
        trace!(
            "[{}] cash=${:.0} portfolio=${:.0}",
            ms_to_date_string(day_ms),
            cash,
            portfolio_value
        );
    }
}
