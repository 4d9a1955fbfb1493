use std::collections::BTreeMap;
use crate::error::{Error, Result};
use crate::types::symbol::Symbol;

/// Validates caller-supplied tickers against the fixed symbol set.
pub struct SymbolRegistry;

impl SymbolRegistry {
    /// Case-insensitive lookup. Returns the normalized symbol or `UnsupportedSymbol`.
    pub fn validate(raw: &str) -> Result<Symbol> {
        let normalized = raw.to_ascii_uppercase();

        match Symbol::from_ticker(&normalized) {
            Some(symbol) => {
                tracing::debug!(symbol = %symbol, raw, "Symbol validated");
                Ok(symbol)
            }
            None => {
                tracing::warn!(raw, "Rejected unsupported symbol");
                Err(Error::UnsupportedSymbol {
                    symbol: normalized,
                    supported: Self::supported_list(),
                })
            }
        }
    }

    /// Ticker to upstream id, ordered by ticker.
    pub fn supported() -> BTreeMap<&'static str, &'static str> {
        Symbol::ALL.iter()
            .map(|s| (s.as_str(), s.upstream_id()))
            .collect()
    }

    fn supported_list() -> String {
        Symbol::ALL.iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
