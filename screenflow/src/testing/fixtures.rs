//! Record fixtures.

use crate::core::{Artifact, Record};

/// Builds one record per symbol.
#[must_use]
pub fn symbol_records(symbols: &[&str]) -> Vec<Record> {
    symbols.iter().map(|s| Record::for_symbol(*s)).collect()
}

/// Builds `count` records with symbols `SYM000..` and an `index` field.
#[must_use]
pub fn numbered_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| Record::for_symbol(format!("SYM{i:03}")).with("index", i))
        .collect()
}

/// Builds a listing-shaped artifact with price and market cap per symbol.
#[must_use]
pub fn listing_artifact(stage: &str, rows: &[(&str, f64, f64)]) -> Artifact {
    let records = rows
        .iter()
        .map(|(symbol, price, market_cap)| {
            Record::for_symbol(*symbol)
                .with("Price", *price)
                .with("Market Cap", *market_cap)
        })
        .collect();
    Artifact::new(stage, records)
}
