pub mod observer;
pub mod selection;

use std::collections::HashSet;

use log::debug;
use serde::Serialize;

use crate::config::{FixedParameters, Strategy};
use crate::dates::{MS_PER_DAY, add_days, days_between};
use crate::error::Result;
use crate::factors::Dataset;

pub use observer::{LogObserver, NoopObserver, SimulationObserver};
pub use selection::{Selection, SelectionPolicy, SelectionStrategy};

/// Read-only inputs shared by every simulation run.
#[derive(Clone, Debug)]
pub struct SimulationContext {
    pub dataset: Dataset,
    pub fixed: FixedParameters,
    pub policy: SelectionPolicy,
}

impl SimulationContext {
    pub fn new(dataset: Dataset, fixed: FixedParameters, policy: SelectionPolicy) -> Result<Self> {
        fixed.validate()?;
        Ok(Self {
            dataset,
            fixed,
            policy,
        })
    }
}

/// When an investment becomes tradeable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Listing {
    /// Absolute listing timestamp in ms.
    At(i64),
    /// Days left until listing; 0 means tradeable.
    InDays(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Investment {
    pub symbol: String,
    pub amount: f64,
    /// Days held while tradeable.
    pub duration: u32,
    pub listing: Listing,
}

impl Investment {
    pub fn new(selection: Selection, amount: f64) -> Self {
        Self {
            symbol: selection.symbol,
            amount,
            duration: 0,
            listing: selection.listing,
        }
    }

    pub fn is_tradeable(&self, day_ms: i64) -> bool {
        match self.listing {
            Listing::At(ts) => day_ms >= ts,
            Listing::InDays(left) => left == 0,
        }
    }

    /// Day offset into the factor table.
    pub fn trading_offset(&self, day_ms: i64) -> u32 {
        match self.listing {
            Listing::At(ts) => days_between(ts, day_ms),
            Listing::InDays(_) => self.duration,
        }
    }

    fn tick(&mut self, day_ms: i64) {
        match &mut self.listing {
            Listing::At(ts) => {
                if day_ms > *ts {
                    self.duration += 1;
                }
            }
            Listing::InDays(left) => {
                if *left == 0 {
                    self.duration += 1;
                } else {
                    *left -= 1;
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum HarvestReason {
    Timeout,
    TargetReached,
    Liquidation,
}

/// Why, if at all, an investment should be sold today.
///
/// The target decays linearly from `target_factor` at duration 0 to 1.0 at
/// `max_duration`.
pub fn harvest_reason(duration: u32, value_ratio: f64, strategy: &Strategy) -> Option<HarvestReason> {
    if duration >= strategy.max_duration {
        return Some(HarvestReason::Timeout);
    }
    let tf = strategy.target_factor;
    let current_target = tf - (tf - 1.0) * duration as f64 / strategy.max_duration as f64;
    if value_ratio >= current_target {
        return Some(HarvestReason::TargetReached);
    }
    None
}

pub fn needs_harvest(investment: &Investment, value: f64, strategy: &Strategy) -> bool {
    harvest_reason(investment.duration, value / investment.amount, strategy).is_some()
}

/// Capital-scaling epoch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Generation {
    pub number: u32,
    pub investment_amount: f64,
    pub target: f64,
    pub soft_target: f64,
}

impl Generation {
    fn first(fixed: &FixedParameters, strategy: &Strategy) -> Self {
        let target = fixed.initial_cash * strategy.target_factor;
        Self {
            number: 1,
            investment_amount: fixed.initial_cash / fixed.initial_spread as f64,
            target,
            soft_target: target * strategy.advance_pct / 100.0,
        }
    }

    fn advance(&mut self, fixed: &FixedParameters, strategy: &Strategy) {
        self.number += 1;
        let slots = fixed.initial_spread + (self.number - 1) * strategy.spread_increase;
        self.investment_amount = self.target / slots as f64;
        self.target = fixed.initial_cash * strategy.target_factor.powi(self.number as i32);
        self.soft_target = self.target * strategy.advance_pct / 100.0;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationOutcome {
    pub final_cash: f64,
    pub generation: u32,
    pub deployed: usize,
    pub harvested: usize,
}

pub struct Simulator<'a> {
    ctx: &'a SimulationContext,
}

impl<'a> Simulator<'a> {
    pub fn new(ctx: &'a SimulationContext) -> Self {
        Self { ctx }
    }

    /// Final cash of one run.
    pub fn simulate(&self, strategy: &Strategy, seed: u64) -> f64 {
        self.simulate_with(strategy, seed, &mut NoopObserver)
            .final_cash
    }

    pub fn simulate_with(
        &self,
        strategy: &Strategy,
        seed: u64,
        observer: &mut dyn SimulationObserver,
    ) -> SimulationOutcome {
        let mut run = Run {
            ctx: self.ctx,
            strategy,
            selector: self.ctx.policy.build(seed),
            observer,
            cash: self.ctx.fixed.initial_cash,
            investments: Vec::new(),
            used: HashSet::new(),
            generation: Generation::first(&self.ctx.fixed, strategy),
            deployed: 0,
            harvested: 0,
        };

        let end = self.ctx.fixed.end_ms();
        let mut day = self.ctx.fixed.start_ms();
        while day < end {
            run.step(day);
            day = add_days(day, 1);
        }
        run.liquidate(day - MS_PER_DAY);

        debug!(
            "run finished: cash=${:.2} generation={} deployed={} harvested={}",
            run.cash, run.generation.number, run.deployed, run.harvested
        );
        SimulationOutcome {
            final_cash: run.cash,
            generation: run.generation.number,
            deployed: run.deployed,
            harvested: run.harvested,
        }
    }
}

struct Run<'a, 'o> {
    ctx: &'a SimulationContext,
    strategy: &'a Strategy,
    selector: Box<dyn SelectionStrategy>,
    observer: &'o mut dyn SimulationObserver,
    cash: f64,
    investments: Vec<Investment>,
    used: HashSet<String>,
    generation: Generation,
    deployed: usize,
    harvested: usize,
}

impl Run<'_, '_> {
    fn step(&mut self, day: i64) {
        self.harvest_pass(day);

        if self.cash + self.portfolio_value(day) >= self.generation.soft_target {
            self.generation.advance(&self.ctx.fixed, self.strategy);
            self.observer.on_generation(day, &self.generation);
        }

        self.deploy_pass(day);

        for inv in &mut self.investments {
            inv.tick(day);
        }

        let portfolio = self.portfolio_value(day);
        self.observer.on_day_end(day, self.cash, portfolio);
    }

    fn harvest_pass(&mut self, day: i64) {
        let mut i = 0;
        while i < self.investments.len() {
            let value = self.investment_value(&self.investments[i], day);
            let inv = &self.investments[i];
            match harvest_reason(inv.duration, value / inv.amount, self.strategy) {
                Some(reason) => {
                    let inv = self.investments.remove(i);
                    self.close(day, inv, value, reason);
                }
                None => i += 1,
            }
        }
    }

    fn deploy_pass(&mut self, day: i64) {
        let amount = self.generation.investment_amount;
        if amount.is_nan() || amount <= 0.0 {
            return;
        }
        while self.cash >= amount {
            let Some(selection) = self.selector.select_next(self.ctx, day, &self.used) else {
                break;
            };
            self.used.insert(selection.symbol.clone());
            let inv = Investment::new(selection, amount);
            self.cash -= amount;
            self.deployed += 1;
            self.observer.on_deploy(day, &inv);
            self.investments.push(inv);
        }
    }

    fn liquidate(&mut self, day: i64) {
        for inv in std::mem::take(&mut self.investments) {
            let value = self.investment_value(&inv, day);
            self.close(day, inv, value, HarvestReason::Liquidation);
        }
    }

    fn close(&mut self, day: i64, inv: Investment, value: f64, reason: HarvestReason) {
        self.cash += value;
        self.harvested += 1;
        self.observer.on_harvest(day, &inv, value, reason);
    }

    fn portfolio_value(&self, day: i64) -> f64 {
        self.investments
            .iter()
            .map(|inv| self.investment_value(inv, day))
            .sum()
    }

    /// Unlisted investments keep their cost; listed ones without a recorded
    /// factor are worth nothing.
    fn investment_value(&self, inv: &Investment, day: i64) -> f64 {
        if !inv.is_tradeable(day) {
            return inv.amount;
        }
        self.ctx
            .dataset
            .factors
            .factor(&inv.symbol, inv.trading_offset(day))
            .map_or(0.0, |f| inv.amount * f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::parse_date_ms;
    use crate::ico::ListedIco;
    use chrono::NaiveDate;

    #[derive(Default)]
    struct Recorder {
        deploys: Vec<(String, f64)>,
        harvests: Vec<(String, u32, f64, HarvestReason)>,
        generations: Vec<u32>,
    }

    impl SimulationObserver for Recorder {
        fn on_deploy(&mut self, _day_ms: i64, investment: &Investment) {
            self.deploys
                .push((investment.symbol.clone(), investment.amount));
        }

        fn on_harvest(&mut self, _day_ms: i64, inv: &Investment, value: f64, reason: HarvestReason) {
            self.harvests
                .push((inv.symbol.clone(), inv.duration, value, reason));
        }

        fn on_generation(&mut self, _day_ms: i64, generation: &Generation) {
            self.generations.push(generation.number);
        }
    }

    fn fixed() -> FixedParameters {
        FixedParameters {
            initial_cash: 2000.0,
            start_date: NaiveDate::from_ymd_opt(2017, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2017, 7, 1).unwrap(),
            active_horizon_days: 21,
            initial_spread: 5,
        }
    }

    fn flat_factor_ctx(factor: f64, policy: SelectionPolicy) -> SimulationContext {
        let start = parse_date_ms("2017-05-01").unwrap();
        let mut dataset = Dataset::default();
        dataset.icos.insert(
            "ONE".to_string(),
            ListedIco {
                symbol: "ONE".to_string(),
                end_ms: start + MS_PER_DAY / 4,
                token_price: 1.0,
                listed_at_ms: start + MS_PER_DAY / 2,
                ico_end_to_exchange_days: 0,
            },
        );
        for offset in 0..400 {
            dataset.factors.insert_max("ONE", offset, factor);
        }
        SimulationContext::new(dataset, fixed(), policy).unwrap()
    }

    fn strategy(target_factor: f64, max_duration: u32) -> Strategy {
        Strategy {
            target_factor,
            max_duration,
            spread_increase: 0,
            advance_pct: 100.0,
        }
    }

    #[test]
    fn harvest_on_timeout_regardless_of_value() {
        let s = strategy(3.0, 10);
        assert_eq!(harvest_reason(10, 0.0, &s), Some(HarvestReason::Timeout));
        assert_eq!(harvest_reason(11, 5.0, &s), Some(HarvestReason::Timeout));
        assert_eq!(harvest_reason(0, 0.0, &strategy(3.0, 0)), Some(HarvestReason::Timeout));
    }

    #[test]
    fn harvest_target_decays_linearly() {
        let s = strategy(3.0, 10);
        assert_eq!(harvest_reason(0, 3.0, &s), Some(HarvestReason::TargetReached));
        assert_eq!(harvest_reason(0, 2.99, &s), None);
        // halfway the target is 2.0
        assert_eq!(harvest_reason(5, 2.0, &s), Some(HarvestReason::TargetReached));
        assert_eq!(harvest_reason(5, 1.9, &s), None);

        let inv = Investment {
            symbol: "X".to_string(),
            amount: 100.0,
            duration: 0,
            listing: Listing::InDays(0),
        };
        assert!(needs_harvest(&inv, 300.0, &s));
        assert!(!needs_harvest(&inv, 150.0, &s));
    }

    #[test]
    fn generation_grows_target_and_resizes_slots() {
        let fixed = fixed();
        let s = Strategy {
            target_factor: 2.0,
            max_duration: 10,
            spread_increase: 3,
            advance_pct: 90.0,
        };
        let mut g = Generation::first(&fixed, &s);
        assert_eq!(g.investment_amount, 400.0);
        assert_eq!(g.target, 4000.0);
        assert_eq!(g.soft_target, 3600.0);

        g.advance(&fixed, &s);
        assert_eq!(g.number, 2);
        assert_eq!(g.investment_amount, 4000.0 / 8.0);
        assert_eq!(g.target, 8000.0);
        assert_eq!(g.soft_target, 7200.0);
    }

    #[test]
    fn single_ico_reaching_target_immediately_is_harvested_once() {
        for policy in [SelectionPolicy::RandomizedPool, SelectionPolicy::CalendarAligned] {
            let ctx = flat_factor_ctx(2.0, policy);
            let mut rec = Recorder::default();
            let outcome = Simulator::new(&ctx).simulate_with(&strategy(2.0, 10), 42, &mut rec);

            assert_eq!(rec.deploys, vec![("ONE".to_string(), 400.0)]);
            assert_eq!(
                rec.harvests,
                vec![("ONE".to_string(), 0, 800.0, HarvestReason::TargetReached)]
            );
            assert!(rec.generations.is_empty());
            assert_eq!(outcome.final_cash, 1600.0 + 400.0 * 2.0);
        }
    }

    /// ONE lists at once and pays 6x, TWO and THREE sit unlisted at cost.
    /// THREE only enters the horizon on the second day.
    fn generation_ctx() -> SimulationContext {
        let start = parse_date_ms("2017-05-01").unwrap();
        let late = parse_date_ms("2017-08-01").unwrap();
        let mut dataset = Dataset::default();
        for (sym, end_ms, listed_at_ms) in [
            ("ONE", start + MS_PER_DAY / 4, start + MS_PER_DAY / 2),
            ("TWO", start + 3 * MS_PER_DAY, late),
            ("THREE", start + 22 * MS_PER_DAY, late),
        ] {
            dataset.icos.insert(
                sym.to_string(),
                ListedIco {
                    symbol: sym.to_string(),
                    end_ms,
                    token_price: 1.0,
                    listed_at_ms,
                    ico_end_to_exchange_days: 0,
                },
            );
        }
        for offset in 0..400 {
            dataset.factors.insert_max("ONE", offset, 6.0);
        }
        SimulationContext::new(dataset, fixed(), SelectionPolicy::CalendarAligned).unwrap()
    }

    #[test]
    fn harvest_past_soft_target_advances_generation_and_resizes_deploys() {
        let ctx = generation_ctx();
        for spread_increase in [3, 0] {
            let s = Strategy {
                spread_increase,
                ..strategy(2.0, 10)
            };
            let mut rec = Recorder::default();
            let outcome = Simulator::new(&ctx).simulate_with(&s, 0, &mut rec);

            // second day: 1200 cash + 2400 from ONE + 400 held in TWO meets 4000
            assert_eq!(rec.generations, vec![2]);
            assert_eq!(outcome.generation, 2);
            let next_amount = 4000.0 / (5 + spread_increase) as f64;
            assert_eq!(
                rec.deploys,
                vec![
                    ("ONE".to_string(), 400.0),
                    ("TWO".to_string(), 400.0),
                    ("THREE".to_string(), next_amount),
                ]
            );
            assert_eq!(
                rec.harvests[0],
                ("ONE".to_string(), 0, 2400.0, HarvestReason::TargetReached)
            );
            assert_eq!(outcome.final_cash, 4000.0);
        }
    }

    #[test]
    fn missing_factor_values_at_zero() {
        let ctx = flat_factor_ctx(2.0, SelectionPolicy::CalendarAligned);
        let sim_ctx = SimulationContext {
            dataset: Dataset {
                factors: Default::default(),
                ..ctx.dataset.clone()
            },
            ..ctx
        };
        let mut rec = Recorder::default();
        let outcome = Simulator::new(&sim_ctx).simulate_with(&strategy(2.0, 10), 0, &mut rec);

        // a zero value never meets the target, so the timeout closes it
        assert_eq!(rec.harvests.len(), 1);
        assert_eq!(rec.harvests[0].1, 10);
        assert_eq!(rec.harvests[0].2, 0.0);
        assert_eq!(outcome.final_cash, 1600.0);
    }

    #[test]
    fn unlisted_investment_keeps_its_cost() {
        let mut ctx = flat_factor_ctx(2.0, SelectionPolicy::CalendarAligned);
        let listed = ctx.fixed.end_ms() + 30 * MS_PER_DAY;
        if let Some(ico) = ctx.dataset.icos.get_mut("ONE") {
            ico.listed_at_ms = listed;
        }
        let mut rec = Recorder::default();
        let outcome = Simulator::new(&ctx).simulate_with(&strategy(2.0, 10), 0, &mut rec);

        assert_eq!(rec.harvests.len(), 1);
        assert_eq!(rec.harvests[0].3, HarvestReason::Liquidation);
        assert_eq!(outcome.final_cash, 2000.0);
    }

    #[test]
    fn runs_are_reproducible() {
        let start = parse_date_ms("2017-05-01").unwrap();
        let mut dataset = Dataset::default();
        for (i, sym) in ["A", "B", "C", "D", "E", "F", "G", "H"].iter().enumerate() {
            dataset.icos.insert(
                sym.to_string(),
                ListedIco {
                    symbol: sym.to_string(),
                    end_ms: start + i as i64 * 3 * MS_PER_DAY,
                    token_price: 1.0,
                    listed_at_ms: start + (i as i64 * 3 + 4) * MS_PER_DAY,
                    ico_end_to_exchange_days: 4,
                },
            );
            for offset in 0..90 {
                let f = 0.5 + ((offset as usize * (i + 1)) % 7) as f64 * 0.4;
                dataset.factors.insert_max(sym, offset, f);
            }
        }
        let s = Strategy::default();
        for policy in [SelectionPolicy::RandomizedPool, SelectionPolicy::CalendarAligned] {
            let ctx = SimulationContext::new(dataset.clone(), fixed(), policy).unwrap();
            let sim = Simulator::new(&ctx);
            assert_eq!(sim.simulate(&s, 9), sim.simulate(&s, 9));
        }
    }
}
