use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::Serialize;

use crate::dates::days_between;
use crate::ico::{ListedIco, PastIco, PriceHistory};

/// Best observed price / ICO price per symbol and day offset since listing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FactorTable {
    by_symbol: BTreeMap<String, BTreeMap<u32, f64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OffsetAverage {
    pub mean: f64,
    pub count: usize,
}

impl FactorTable {
    pub fn factor(&self, symbol: &str, offset: u32) -> Option<f64> {
        self.by_symbol.get(symbol)?.get(&offset).copied()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Record an observation, keeping the larger factor for an existing offset.
    pub fn insert_max(&mut self, symbol: &str, offset: u32, factor: f64) {
        let offsets = self.by_symbol.entry(symbol.to_string()).or_default();
        offsets
            .entry(offset)
            .and_modify(|f| {
                if factor > *f {
                    *f = factor;
                }
            })
            .or_insert(factor);
    }

    /// Mean factor per offset across symbols, for offsets seen more than `min_count` times.
    pub fn average_by_offset(&self, min_count: usize) -> BTreeMap<u32, OffsetAverage> {
        let mut acc: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for offsets in self.by_symbol.values() {
            for (&offset, &factor) in offsets {
                let e = acc.entry(offset).or_insert((0.0, 0));
                e.0 += factor;
                e.1 += 1;
            }
        }
        acc.into_iter()
            .filter(|(_, (_, count))| *count > min_count)
            .map(|(offset, (sum, count))| {
                (
                    offset,
                    OffsetAverage {
                        mean: sum / count as f64,
                        count,
                    },
                )
            })
            .collect()
    }
}

/// The working set: ICOs that reached an exchange plus their factor table.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub icos: BTreeMap<String, ListedIco>,
    pub factors: FactorTable,
}

impl Dataset {
    pub fn get(&self, symbol: &str) -> Option<&ListedIco> {
        self.icos.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.icos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icos.is_empty()
    }
}

/// One decimal, rounding the exact binary value with ties to even.
pub fn round_factor(v: f64) -> f64 {
    format!("{v:.1}").parse().unwrap_or(v)
}

/// Align every ICO's price series to its listing day and extract factors.
///
/// ICOs without a history, or whose market cap never turns positive, are left out.
pub fn build(icos: &[PastIco], histories: &HashMap<String, PriceHistory>) -> Dataset {
    let mut dataset = Dataset::default();

    for ico in icos {
        let Some(history) = histories.get(&ico.symbol) else {
            debug!("{}: no price history, skipped", ico.symbol);
            continue;
        };
        let Some(listed_at) = history.listing_time() else {
            debug!("{}: never listed on an exchange, skipped", ico.symbol);
            continue;
        };

        // symbols with no post-listing price still enter the table, valued at zero later
        dataset.factors.by_symbol.entry(ico.symbol.clone()).or_default();
        for sample in &history.price_usd {
            if sample.ts() <= listed_at {
                continue;
            }
            let Some(price) = sample.value() else {
                continue;
            };
            let offset = days_between(listed_at, sample.ts());
            let factor = round_factor(price / ico.token_price);
            dataset.factors.insert_max(&ico.symbol, offset, factor);
        }

        dataset.icos.insert(
            ico.symbol.clone(),
            ListedIco {
                symbol: ico.symbol.clone(),
                end_ms: ico.end_ms,
                token_price: ico.token_price,
                listed_at_ms: listed_at,
                ico_end_to_exchange_days: days_between(ico.end_ms, listed_at),
            },
        );
    }

    debug!(
        "factor table built: {} of {} ICOs listed",
        dataset.len(),
        icos.len()
    );
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::MS_PER_DAY;

    fn ico(symbol: &str, end_ms: i64, price: f64) -> PastIco {
        PastIco::new(symbol, end_ms, price).unwrap()
    }

    #[test]
    fn keeps_max_factor_per_offset() {
        let listed = 10 * MS_PER_DAY;
        let history = PriceHistory::from_series(
            &[(0, 0.0), (listed, 1000.0)],
            &[
                (listed, 9.0),
                (listed + 1_000, 1.04),
                (listed + 60_000, 2.26),
                (listed + 3_600_000, 1.5),
                (listed + MS_PER_DAY, 0.5),
            ],
        );
        let histories = HashMap::from([("AAA".to_string(), history)]);
        let ds = build(&[ico("AAA", 7 * MS_PER_DAY, 1.0)], &histories);

        // sample at the listing instant itself is ignored
        assert_eq!(ds.factors.factor("AAA", 0), Some(2.3));
        assert_eq!(ds.factors.factor("AAA", 1), Some(0.5));
        assert_eq!(ds.factors.factor("AAA", 2), None);

        let listed_ico = ds.get("AAA").unwrap();
        assert_eq!(listed_ico.listed_at_ms, listed);
        assert_eq!(listed_ico.ico_end_to_exchange_days, 3);
    }

    #[test]
    fn rounding_follows_decimal_value_with_ties_to_even() {
        let got = [0.35, 0.25, 1.25, 2.65, 0.45].map(round_factor);
        assert_eq!(got, [0.3, 0.2, 1.2, 2.6, 0.5]);
        assert_eq!(round_factor(2.26), 2.3);
        assert_eq!(round_factor(0.04), 0.0);
    }

    #[test]
    fn unlisted_and_missing_histories_are_excluded() {
        let never = PriceHistory::from_series(&[(0, 0.0), (MS_PER_DAY, 0.0)], &[(MS_PER_DAY, 4.0)]);
        let histories = HashMap::from([("NEVER".to_string(), never)]);
        let ds = build(&[ico("NEVER", 0, 1.0), ico("GHOST", 0, 1.0)], &histories);

        assert!(ds.is_empty());
        assert!(ds.factors.is_empty());
        assert!(!ds.factors.contains("NEVER"));
    }

    #[test]
    fn averages_only_well_sampled_offsets() {
        let mut table = FactorTable::default();
        table.insert_max("A", 0, 2.0);
        table.insert_max("B", 0, 4.0);
        table.insert_max("A", 1, 9.0);
        table.insert_max("A", 0, 1.0);

        let avg = table.average_by_offset(1);
        assert_eq!(avg.len(), 1);
        assert_eq!(avg[&0], OffsetAverage { mean: 3.0, count: 2 });
    }
}
