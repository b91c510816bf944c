//! Ticker catalog: the NASDAQ-100 constituents a run ranks.
//!
//! The built-in list is static; configuration may replace it with an explicit
//! symbol list. Test mode selects a fixed prefix of whichever catalog is active
//! so that downstream stages run the same code path at lower cost.

use std::collections::HashSet;
use thiserror::Error;

use crate::domain::{RunMode, Ticker};

/// Number of tickers a test-mode run fetches.
pub const TEST_SUBSET_SIZE: usize = 5;

/// Index name embedded in published artifacts.
pub const INDEX_NAME: &str = "NASDAQ-100";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog is empty")]
    Empty,
    #[error("duplicate symbol in catalog: {0}")]
    DuplicateSymbol(String),
    #[error("invalid symbol '{0}'")]
    InvalidSymbol(String),
}

const NASDAQ_100: &[(&str, &str)] = &[
    ("AAPL", "Apple"),
    ("ABNB", "Airbnb"),
    ("ADBE", "Adobe"),
    ("ADI", "Analog Devices"),
    ("ADP", "Automatic Data Processing"),
    ("ADSK", "Autodesk"),
    ("AEP", "American Electric Power"),
    ("AMAT", "Applied Materials"),
    ("AMD", "Advanced Micro Devices"),
    ("AMGN", "Amgen"),
    ("AMZN", "Amazon"),
    ("ANSS", "Ansys"),
    ("APP", "AppLovin"),
    ("ARM", "Arm Holdings"),
    ("ASML", "ASML Holding"),
    ("AVGO", "Broadcom"),
    ("AXON", "Axon Enterprise"),
    ("AZN", "AstraZeneca"),
    ("BIIB", "Biogen"),
    ("BKNG", "Booking Holdings"),
    ("BKR", "Baker Hughes"),
    ("CCEP", "Coca-Cola Europacific Partners"),
    ("CDNS", "Cadence Design Systems"),
    ("CDW", "CDW"),
    ("CEG", "Constellation Energy"),
    ("CHTR", "Charter Communications"),
    ("CMCSA", "Comcast"),
    ("COST", "Costco"),
    ("CPRT", "Copart"),
    ("CRWD", "CrowdStrike"),
    ("CSCO", "Cisco"),
    ("CSGP", "CoStar Group"),
    ("CSX", "CSX"),
    ("CTAS", "Cintas"),
    ("CTSH", "Cognizant"),
    ("DASH", "DoorDash"),
    ("DDOG", "Datadog"),
    ("DXCM", "DexCom"),
    ("EA", "Electronic Arts"),
    ("EXC", "Exelon"),
    ("FANG", "Diamondback Energy"),
    ("FAST", "Fastenal"),
    ("FTNT", "Fortinet"),
    ("GEHC", "GE HealthCare"),
    ("GFS", "GlobalFoundries"),
    ("GILD", "Gilead Sciences"),
    ("GOOG", "Alphabet (Class C)"),
    ("GOOGL", "Alphabet (Class A)"),
    ("HON", "Honeywell"),
    ("IDXX", "IDEXX Laboratories"),
    ("INTC", "Intel"),
    ("INTU", "Intuit"),
    ("ISRG", "Intuitive Surgical"),
    ("KDP", "Keurig Dr Pepper"),
    ("KHC", "Kraft Heinz"),
    ("KLAC", "KLA"),
    ("LIN", "Linde"),
    ("LRCX", "Lam Research"),
    ("LULU", "Lululemon"),
    ("MAR", "Marriott International"),
    ("MCHP", "Microchip Technology"),
    ("MDB", "MongoDB"),
    ("MDLZ", "Mondelez"),
    ("MELI", "MercadoLibre"),
    ("META", "Meta Platforms"),
    ("MNST", "Monster Beverage"),
    ("MRVL", "Marvell Technology"),
    ("MSFT", "Microsoft"),
    ("MSTR", "MicroStrategy"),
    ("MU", "Micron Technology"),
    ("NFLX", "Netflix"),
    ("NVDA", "Nvidia"),
    ("NXPI", "NXP Semiconductors"),
    ("ODFL", "Old Dominion Freight Line"),
    ("ON", "ON Semiconductor"),
    ("ORLY", "O'Reilly Automotive"),
    ("PANW", "Palo Alto Networks"),
    ("PAYX", "Paychex"),
    ("PCAR", "Paccar"),
    ("PDD", "PDD Holdings"),
    ("PEP", "PepsiCo"),
    ("PLTR", "Palantir"),
    ("PYPL", "PayPal"),
    ("QCOM", "Qualcomm"),
    ("REGN", "Regeneron"),
    ("ROP", "Roper Technologies"),
    ("ROST", "Ross Stores"),
    ("SBUX", "Starbucks"),
    ("SNPS", "Synopsys"),
    ("TEAM", "Atlassian"),
    ("TMUS", "T-Mobile US"),
    ("TSLA", "Tesla"),
    ("TTD", "The Trade Desk"),
    ("TTWO", "Take-Two Interactive"),
    ("TXN", "Texas Instruments"),
    ("VRSK", "Verisk Analytics"),
    ("VRTX", "Vertex Pharmaceuticals"),
    ("WBD", "Warner Bros. Discovery"),
    ("WDAY", "Workday"),
    ("XEL", "Xcel Energy"),
    ("ZS", "Zscaler"),
];

/// Ordered, duplicate-free list of tickers. Loaded once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    tickers: Vec<Ticker>,
}

impl Catalog {
    /// The built-in NASDAQ-100 constituent list.
    pub fn nasdaq100() -> Self {
        Self {
            tickers: NASDAQ_100
                .iter()
                .map(|(symbol, name)| Ticker::named(*symbol, *name))
                .collect(),
        }
    }

    /// Build a catalog from explicit symbols, keeping their order.
    ///
    /// Symbols are trimmed and upper-cased. Names are carried over from the
    /// built-in list when the symbol is a known constituent.
    pub fn from_symbols<I, S>(symbols: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut tickers = Vec::new();

        for raw in symbols {
            let symbol = raw.as_ref().trim().to_ascii_uppercase();
            if !is_valid_symbol(&symbol) {
                return Err(CatalogError::InvalidSymbol(raw.as_ref().to_string()));
            }
            if !seen.insert(symbol.clone()) {
                return Err(CatalogError::DuplicateSymbol(symbol));
            }
            let name = NASDAQ_100
                .iter()
                .find(|(s, _)| *s == symbol)
                .map(|(_, n)| n.to_string());
            tickers.push(Ticker { symbol, name });
        }

        if tickers.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { tickers })
    }

    /// Tickers a run in `mode` should fetch, in catalog order.
    pub fn list(&self, mode: RunMode) -> Vec<Ticker> {
        match mode {
            RunMode::Production => self.tickers.clone(),
            RunMode::Test => self.tickers.iter().take(TEST_SUBSET_SIZE).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Whether a test run fetches fewer tickers than a production run.
    /// False for overrides of `TEST_SUBSET_SIZE` symbols or fewer.
    pub fn test_subset_is_partial(&self) -> bool {
        self.tickers.len() > TEST_SUBSET_SIZE
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::nasdaq100()
    }
}

/// Exchange symbols: upper-case letters and digits, optionally with `.` or `-`.
fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= 10
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_about_one_hundred_unique_symbols() {
        let catalog = Catalog::nasdaq100();
        assert!(catalog.len() >= 100);

        let symbols: HashSet<_> = catalog
            .list(RunMode::Production)
            .into_iter()
            .map(|t| t.symbol)
            .collect();
        assert_eq!(symbols.len(), catalog.len());
    }

    #[test]
    fn list_is_deterministic() {
        let catalog = Catalog::nasdaq100();
        assert_eq!(catalog.list(RunMode::Production), catalog.list(RunMode::Production));
        assert_eq!(catalog.list(RunMode::Test), catalog.list(RunMode::Test));
    }

    #[test]
    fn test_mode_is_a_prefix_of_production() {
        let catalog = Catalog::nasdaq100();
        let full = catalog.list(RunMode::Production);
        let subset = catalog.list(RunMode::Test);
        assert_eq!(subset.len(), TEST_SUBSET_SIZE);
        assert!(subset.len() < full.len());
        assert_eq!(&full[..TEST_SUBSET_SIZE], subset.as_slice());
    }

    #[test]
    fn from_symbols_normalizes_and_keeps_names() {
        let catalog = Catalog::from_symbols([" msft", "ZZZZ"]).unwrap();
        let tickers = catalog.list(RunMode::Production);
        assert_eq!(tickers[0].symbol, "MSFT");
        assert_eq!(tickers[0].name.as_deref(), Some("Microsoft"));
        assert_eq!(tickers[1].name, None);
    }

    #[test]
    fn from_symbols_rejects_duplicates_and_garbage() {
        assert_eq!(
            Catalog::from_symbols(["AAPL", "aapl"]),
            Err(CatalogError::DuplicateSymbol("AAPL".into()))
        );
        assert!(matches!(
            Catalog::from_symbols(["AA PL"]),
            Err(CatalogError::InvalidSymbol(_))
        ));
        assert_eq!(
            Catalog::from_symbols(Vec::<String>::new()),
            Err(CatalogError::Empty)
        );
    }

    #[test]
    fn small_catalog_test_mode_returns_everything() {
        let catalog = Catalog::from_symbols(["AAA", "BBB"]).unwrap();
        assert_eq!(catalog.list(RunMode::Test).len(), 2);
    }

    #[test]
    fn small_override_has_no_partial_test_subset() {
        assert!(Catalog::nasdaq100().test_subset_is_partial());

        let small = Catalog::from_symbols(["AAPL", "MSFT", "NVDA"]).unwrap();
        assert!(!small.test_subset_is_partial());
        assert_eq!(small.list(RunMode::Test), small.list(RunMode::Production));

        let six = Catalog::from_symbols(["A", "B", "C", "D", "E", "F"]).unwrap();
        assert!(six.test_subset_is_partial());
        assert_eq!(six.list(RunMode::Test).len(), TEST_SUBSET_SIZE);
    }
}
