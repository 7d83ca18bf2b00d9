use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Listing, SimulationContext};
use crate::dates::add_days;

/// Which ICOs may be bought on a given day, and how their listing delay is modeled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// ICOs whose end date falls inside the active horizon, first in symbol order.
    CalendarAligned,
    /// Any unused ICO, picked uniformly, listed a few random days after its real delay.
    #[default]
    RandomizedPool,
}

impl SelectionPolicy {
    pub fn is_deterministic(self) -> bool {
        matches!(self, SelectionPolicy::CalendarAligned)
    }

    pub fn build(self, seed: u64) -> Box<dyn SelectionStrategy> {
        match self {
            SelectionPolicy::CalendarAligned => Box::new(CalendarAligned),
            SelectionPolicy::RandomizedPool => Box::new(RandomizedPool::new(seed)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub symbol: String,
    pub listing: Listing,
}

pub trait SelectionStrategy {
    /// Next ICO to put money in, skipping symbols in `used`.
    fn select_next(
        &mut self,
        ctx: &SimulationContext,
        day_ms: i64,
        used: &HashSet<String>,
    ) -> Option<Selection>;
}

/// Picks the first ICO, by symbol, whose sale ends within the active horizon.
///
/// Symbols are never bought twice in a run, even once harvested and still
/// inside the horizon. Only holding the symbol at the moment would be enough to
/// skip it otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct CalendarAligned;

impl SelectionStrategy for CalendarAligned {
    fn select_next(
        &mut self,
        ctx: &SimulationContext,
        day_ms: i64,
        used: &HashSet<String>,
    ) -> Option<Selection> {
        let horizon_end = add_days(day_ms, ctx.fixed.active_horizon_days as i64);
        ctx.dataset
            .icos
            .values()
            .filter(|ico| !used.contains(&ico.symbol))
            .find(|ico| ico.end_ms >= day_ms && ico.end_ms <= horizon_end)
            .map(|ico| Selection {
                symbol: ico.symbol.clone(),
                listing: Listing::At(ico.listed_at_ms),
            })
    }
}

pub const MIN_EXTRA_DELAY_DAYS: u32 = 2;
pub const MAX_EXTRA_DELAY_DAYS: u32 = 7;

#[derive(Clone, Debug)]
pub struct RandomizedPool {
    rng: StdRng,
}

impl RandomizedPool {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SelectionStrategy for RandomizedPool {
    fn select_next(
        &mut self,
        ctx: &SimulationContext,
        _day_ms: i64,
        used: &HashSet<String>,
    ) -> Option<Selection> {
        let pool: Vec<_> = ctx
            .dataset
            .icos
            .values()
            .filter(|ico| !used.contains(&ico.symbol))
            .collect();
        if pool.is_empty() {
            return None;
        }

        let ico = pool[self.rng.random_range(0..pool.len())];
        // time between our buy-in and the ICO end is unknown, so add a few days
        let extra = self
            .rng
            .random_range(MIN_EXTRA_DELAY_DAYS..=MAX_EXTRA_DELAY_DAYS);
        Some(Selection {
            symbol: ico.symbol.clone(),
            listing: Listing::InDays(ico.ico_end_to_exchange_days + extra),
        })
    }
}
