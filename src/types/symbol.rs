use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of symbols the pipeline can collect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    Btc,
    Eth,
    Sol,
    Ada,
    Dot,
}

impl Symbol {
    pub const ALL: [Symbol; 5] = [Symbol::Btc, Symbol::Eth, Symbol::Sol, Symbol::Ada, Symbol::Dot];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Btc => "BTC",
            Symbol::Eth => "ETH",
            Symbol::Sol => "SOL",
            Symbol::Ada => "ADA",
            Symbol::Dot => "DOT",
        }
    }

    /// Asset id used by the upstream price source.
    pub fn upstream_id(&self) -> &'static str {
        match self {
            Symbol::Btc => "bitcoin",
            Symbol::Eth => "ethereum",
            Symbol::Sol => "solana",
            Symbol::Ada => "cardano",
            Symbol::Dot => "polkadot",
        }
    }

    /// Exact-match lookup on an already normalized ticker.
    pub fn from_ticker(ticker: &str) -> Option<Symbol> {
        Symbol::ALL.iter().copied().find(|s| s.as_str() == ticker)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
