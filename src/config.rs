use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::date_to_epoch_ms;
use crate::error::{Error, Result};

pub const STRATEGY_DIMS: usize = 4;

/// Settings the optimizer never touches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedParameters {
    pub initial_cash: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Days ahead of the current day in which an ICO end counts as active.
    pub active_horizon_days: u32,
    /// Number of slots the first generation's cash is split across.
    pub initial_spread: u32,
}

impl Default for FixedParameters {
    fn default() -> Self {
        Self {
            initial_cash: 2000.0,
            start_date: NaiveDate::from_ymd_opt(2017, 5, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2018, 1, 18).unwrap_or_default(),
            active_horizon_days: 21,
            initial_spread: 5,
        }
    }
}

impl FixedParameters {
    pub fn validate(&self) -> Result<()> {
        if self.start_date >= self.end_date {
            return Err(Error::InvalidParameters(format!(
                "start date {} must be before end date {}",
                self.start_date, self.end_date
            )));
        }
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(Error::InvalidParameters(format!(
                "initial cash {} must be positive",
                self.initial_cash
            )));
        }
        if self.initial_spread == 0 {
            return Err(Error::InvalidParameters(
                "initial spread must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let params: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn start_ms(&self) -> i64 {
        date_to_epoch_ms(self.start_date)
    }

    pub fn end_ms(&self) -> i64 {
        date_to_epoch_ms(self.end_date)
    }
}

/// One point of the optimized parameter space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Harvest once value reaches this multiple of the invested amount.
    pub target_factor: f64,
    /// Days on exchange after which an investment is sold regardless of value.
    pub max_duration: u32,
    /// Extra slots added per generation.
    pub spread_increase: u32,
    /// Share of the generation target, in percent, that advances the generation.
    pub advance_pct: f64,
}

impl Strategy {
    /// Integer components are rounded; negative ones clamp to zero.
    pub fn from_vector(v: &[f64]) -> Result<Self> {
        if v.len() != STRATEGY_DIMS {
            return Err(Error::StrategyLength {
                expected: STRATEGY_DIMS,
                got: v.len(),
            });
        }
        Ok(Self {
            target_factor: v[0],
            max_duration: round_to_u32(v[1]),
            spread_increase: round_to_u32(v[2]),
            advance_pct: v[3],
        })
    }

    pub fn to_vector(&self) -> [f64; STRATEGY_DIMS] {
        [
            self.target_factor,
            self.max_duration as f64,
            self.spread_increase as f64,
            self.advance_pct,
        ]
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            target_factor: 3.0,
            max_duration: 50,
            spread_increase: 2,
            advance_pct: 95.0,
        }
    }
}

fn round_to_u32(v: f64) -> u32 {
    if v.is_finite() { v.round().max(0.0) as u32 } else { 0 }
}
