use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A finished ICO as listed in the input dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PastIco {
    pub symbol: String,
    pub end_ms: i64,
    pub token_price: f64,
}

impl PastIco {
    pub fn new(symbol: impl Into<String>, end_ms: i64, token_price: f64) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(Error::InvalidRecord {
                symbol,
                reason: "empty symbol".to_string(),
            });
        }
        if !token_price.is_finite() || token_price <= 0.0 {
            return Err(Error::InvalidRecord {
                symbol,
                reason: format!("token price {token_price} is not positive"),
            });
        }
        Ok(Self {
            symbol,
            end_ms,
            token_price,
        })
    }
}

/// A past ICO whose token eventually showed a market cap.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListedIco {
    pub symbol: String,
    pub end_ms: i64,
    pub token_price: f64,
    pub listed_at_ms: i64,
    pub ico_end_to_exchange_days: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(v) => Some(*v),
            SampleValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

/// `[timestamp_ms, value]`
#[derive(Clone, Debug, Deserialize)]
pub struct Sample(pub i64, pub SampleValue);

impl Sample {
    pub fn ts(&self) -> i64 {
        self.0
    }

    pub fn value(&self) -> Option<f64> {
        self.1.as_f64()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PriceHistory {
    #[serde(default)]
    pub market_cap_by_available_supply: Vec<Sample>,
    #[serde(default)]
    pub price_usd: Vec<Sample>,
}

impl PriceHistory {
    /// Build from `(timestamp_ms, value)` pairs.
    pub fn from_series(market_cap: &[(i64, f64)], price: &[(i64, f64)]) -> Self {
        let conv = |s: &[(i64, f64)]| {
            s.iter()
                .map(|&(ts, v)| Sample(ts, SampleValue::Number(v)))
                .collect()
        };
        Self {
            market_cap_by_available_supply: conv(market_cap),
            price_usd: conv(price),
        }
    }

    /// Timestamp of the first sample with a strictly positive market cap.
    pub fn listing_time(&self) -> Option<i64> {
        self.market_cap_by_available_supply
            .iter()
            .find(|s| s.value().is_some_and(|v| v > 0.0))
            .map(Sample::ts)
    }
}
