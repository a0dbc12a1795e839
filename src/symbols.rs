//! Symbol alias resolution for data providers

/// Static alias table mapping ticker symbols to canonical provider ids
const COIN_ID_MAP: &[(&str, &str)] = &[
    ("btc", "bitcoin"),
    ("eth", "ethereum"),
    ("sol", "solana"),
    ("ada", "cardano"),
    ("dot", "polkadot"),
    ("doge", "dogecoin"),
    ("avax", "avalanche-2"),
    ("xrp", "ripple"),
    ("bnb", "binancecoin"),
    ("matic", "matic-network"),
];

/// Strip a quote-currency suffix and surrounding whitespace
fn strip_suffix(symbol: &str) -> String {
    let trimmed = symbol.trim();
    let lower = trimmed.to_lowercase();
    for suffix in ["-usd", "-usdt"] {
        if let Some(stripped) = lower.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    lower
}

/// Resolve a user-entered symbol to a canonical provider id.
///
/// Normalizes case and whitespace, strips a currency suffix, and looks up
/// the alias table. Unmapped symbols fall back to the lowercased symbol
/// itself; absence of a mapping is a degraded-but-valid input for the
/// provider, not an error.
pub fn resolve(user_symbol: &str) -> String {
    let base = strip_suffix(user_symbol);
    COIN_ID_MAP
        .iter()
        .find(|(ticker, _)| *ticker == base)
        .map(|(_, id)| id.to_string())
        .unwrap_or(base)
}

/// The bare ticker in uppercase, for providers keyed by ticker symbol
pub fn base_symbol(user_symbol: &str) -> String {
    strip_suffix(user_symbol).to_uppercase()
}
