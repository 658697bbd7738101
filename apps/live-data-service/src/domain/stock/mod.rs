//! Stock Listing Types
//!
//! Static metadata for the tracked stock universe: the listing record
//! served by the meta-data endpoint plus the built-in default universe the
//! service seeds itself with when no override is configured.

use rust_decimal::Decimal;
use serde::Serialize;

use super::price::Symbol;

/// Static listing metadata for one tracked symbol.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockListing {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Security (company) name.
    pub security: String,
    /// GICS sector.
    pub gics_sector: String,
    /// GICS sub-industry.
    pub gics_sub_industry: String,
    /// Headquarters location.
    pub headquarters_location: String,
    /// Date the symbol was first added to the index.
    pub date_first_added: String,
    /// SEC Central Index Key.
    pub cik: String,
    /// Year the company was founded.
    pub founded: String,
    /// Seed price for the simulation.
    #[serde(skip)]
    pub seed_price: Decimal,
}

impl StockListing {
    fn new(
        symbol: &str,
        security: &str,
        gics_sector: &str,
        gics_sub_industry: &str,
        headquarters_location: &str,
        date_first_added: &str,
        cik: &str,
        founded: &str,
        seed_price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            security: security.to_string(),
            gics_sector: gics_sector.to_string(),
            gics_sub_industry: gics_sub_industry.to_string(),
            headquarters_location: headquarters_location.to_string(),
            date_first_added: date_first_added.to_string(),
            cik: cik.to_string(),
            founded: founded.to_string(),
            seed_price,
        }
    }

    /// A listing with a seed price but no index metadata, for symbols
    /// configured outside the built-in universe.
    #[must_use]
    pub fn custom(symbol: &str, seed_price: Decimal) -> Self {
        Self::new(symbol, symbol, "N/A", "N/A", "N/A", "N/A", "N/A", "N/A", seed_price)
    }
}

/// The built-in stock universe used when no override is configured.
#[must_use]
pub fn default_universe() -> Vec<StockListing> {
    vec![
        StockListing::new(
            "AAPL",
            "Apple Inc.",
            "Information Technology",
            "Technology Hardware, Storage & Peripherals",
            "Cupertino, California",
            "1982-11-30",
            "0000320193",
            "1976",
            Decimal::new(17245, 2),
        ),
        StockListing::new(
            "GOOGL",
            "Alphabet Inc. (Class A)",
            "Communication Services",
            "Interactive Media & Services",
            "Mountain View, California",
            "2014-04-03",
            "0001652044",
            "1998",
            Decimal::new(284010, 2),
        ),
        StockListing::new(
            "MSFT",
            "Microsoft Corporation",
            "Information Technology",
            "Systems Software",
            "Redmond, Washington",
            "1994-06-01",
            "0000789019",
            "1975",
            Decimal::new(41530, 2),
        ),
        StockListing::new(
            "AMZN",
            "Amazon.com, Inc.",
            "Consumer Discretionary",
            "Broadline Retail",
            "Seattle, Washington",
            "2005-11-18",
            "0001018724",
            "1994",
            Decimal::new(18670, 2),
        ),
        StockListing::new(
            "TSLA",
            "Tesla, Inc.",
            "Consumer Discretionary",
            "Automobile Manufacturers",
            "Austin, Texas",
            "2020-12-21",
            "0001318605",
            "2003",
            Decimal::new(24890, 2),
        ),
        StockListing::new(
            "NVDA",
            "NVIDIA Corporation",
            "Information Technology",
            "Semiconductors",
            "Santa Clara, California",
            "2001-11-30",
            "0001045810",
            "1993",
            Decimal::new(87520, 2),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_universe_has_unique_symbols() {
        let universe = default_universe();
        let mut symbols: Vec<_> = universe.iter().map(|s| s.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        assert_eq!(symbols.len(), universe.len());
    }

    #[test]
    fn seed_prices_are_positive() {
        for listing in default_universe() {
            assert!(listing.seed_price > Decimal::ZERO, "{}", listing.symbol);
        }
    }

    #[test]
    fn listing_serializes_camel_case_without_price() {
        let listing = &default_universe()[0];
        let json = serde_json::to_value(listing).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert!(json.get("gicsSector").is_some());
        assert!(json.get("seedPrice").is_none());
    }
}
