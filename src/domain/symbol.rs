//! Tradable instrument identifiers.
//!
//! A symbol is a `BASE/QUOTE` currency pair such as `BTC/USDT`. Symbols are
//! immutable and ordered so they can key `BTreeMap`s deterministically.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    #[error("empty symbol")]
    Empty,

    #[error("invalid pair symbol {0:?}: expected BASE/QUOTE, e.g. BTC/USDT")]
    InvalidFormat(String),

    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    Duplicate(String),
}

impl Symbol {
    pub fn parse(input: &str) -> Result<Self, SymbolError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        let upper = trimmed.to_uppercase();
        match upper.split_once('/') {
            Some((base, quote))
                if !base.trim().is_empty() && !quote.trim().is_empty() && !quote.contains('/') =>
            {
                Ok(Symbol(format!("{}/{}", base.trim(), quote.trim())))
            }
            _ => Err(SymbolError::InvalidFormat(trimmed.to_string())),
        }
    }

    /// Build from already-validated parts, e.g. `Symbol::pair("BTC", "USDT")`.
    pub fn pair(base: &str, quote: &str) -> Self {
        Symbol(format!("{}/{}", base.to_uppercase(), quote.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split_once('/').map(|(b, _)| b).unwrap_or(&self.0)
    }

    pub fn quote(&self) -> &str {
        self.0.split_once('/').map(|(_, q)| q).unwrap_or("")
    }

    /// File-system friendly form, `BTC_USDT`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.base(), self.quote())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// Parse a comma separated symbol list, preserving order.
pub fn parse_symbols(input: &str) -> Result<Vec<Symbol>, SymbolError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        if token.trim().is_empty() {
            return Err(SymbolError::EmptyToken);
        }
        let symbol = Symbol::parse(token)?;
        if !seen.insert(symbol.clone()) {
            return Err(SymbolError::Duplicate(symbol.to_string()));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}
