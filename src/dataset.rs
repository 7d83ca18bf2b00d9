use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::dates::parse_date_ms;
use crate::factors::{self, Dataset};
use crate::ico::{PastIco, PriceHistory};

/// A row of `past-icos.csv`.
#[derive(Clone, Debug, Deserialize)]
struct IcoRow {
    symbol: String,
    #[serde(default)]
    end: String,
    #[serde(default)]
    ico_token_price: String,
}

impl IcoRow {
    fn into_past_ico(self) -> Option<PastIco> {
        let Some(end_ms) = parse_date_ms(&self.end) else {
            debug!("{}: no usable end date, skipped", self.symbol);
            return None;
        };
        let Ok(price) = self.ico_token_price.trim().parse::<f64>() else {
            debug!("{}: no token price, skipped", self.symbol);
            return None;
        };
        match PastIco::new(self.symbol, end_ms, price) {
            Ok(ico) => Some(ico),
            Err(e) => {
                debug!("{e}");
                None
            }
        }
    }
}

pub fn load_past_icos(path: &Path) -> Result<Vec<PastIco>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open csv: {}", path.display()))?;

    let mut icos = Vec::new();
    for rec in rdr.deserialize::<IcoRow>() {
        let row = match rec {
            Ok(x) => x,
            Err(e) => {
                debug!("malformed row in {}: {e}", path.display());
                continue;
            }
        };
        if let Some(ico) = row.into_past_ico() {
            icos.push(ico);
        }
    }
    Ok(icos)
}

/// Reads `<dir>/<SYMBOL>.json` for every ICO; missing or unreadable files are skipped.
pub fn load_price_histories(dir: &Path, icos: &[PastIco]) -> HashMap<String, PriceHistory> {
    let mut out = HashMap::new();
    for ico in icos {
        let path = dir.join(format!("{}.json", ico.symbol));
        if !path.is_file() {
            debug!("{}: no price file at {}", ico.symbol, path.display());
            continue;
        }
        let parsed = fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<PriceHistory>(&raw).map_err(Into::into));
        match parsed {
            Ok(history) => {
                out.insert(ico.symbol.clone(), history);
            }
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }
    out
}

/// Load ICO records and price files, then build the factor table.
pub fn load_dataset(icos_csv: &Path, data_dir: &Path) -> Result<Dataset> {
    let icos = load_past_icos(icos_csv)?;
    let histories = load_price_histories(data_dir, &icos);
    let dataset = factors::build(&icos, &histories);
    info!(
        "loaded {} ICO records, {} with price data, {} listed",
        icos.len(),
        histories.len(),
        dataset.len()
    );
    Ok(dataset)
}
