//! Symbol universe parsing.
//!
//! Symbols are exchange pairs such as `BTC/USDT`, given as a comma-separated
//! list in configuration or on the command line.

use std::collections::HashSet;

/// Pairs traded when configuration names none.
pub const DEFAULT_SYMBOLS: [&str; 5] = ["BTC/USDT", "ETH/USDT", "BNB/USDT", "XRP/USDT", "ADA/USDT"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("invalid symbol '{0}': expected BASE/QUOTE")]
    InvalidSymbol(String),
}

pub fn default_symbols() -> Vec<String> {
    DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !is_pair(&symbol) {
            return Err(UniverseError::InvalidSymbol(symbol));
        }
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

fn is_pair(symbol: &str) -> bool {
    match symbol.split_once('/') {
        Some((base, quote)) => {
            let part_ok = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric());
            part_ok(base) && part_ok(quote)
        }
        None => false,
    }
}

/// File stem used by file-based adapters: `BTC/USDT` becomes `BTC_USDT`.
pub fn symbol_file_stem(symbol: &str) -> String {
    symbol.replace('/', "_")
}
