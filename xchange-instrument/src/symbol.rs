//! Unified-symbol / venue-id conversion helpers (spec §4.7).
//!
//! Drivers consult [`crate::index::MarketIndex`] first (`marketsById`/`markets`); these pure
//! functions back the fallback paths venues fall through to when a pair isn't already known:
//! Kraken's currency-cleaning rules, and the length-partitioned / separator-based splits used
//! when a venue id has no loaded market entry yet.

/// Cleans a Kraken asset code per spec §4.7: `XBT`/`XXBT` become `BTC`; a leading `X` or `Z` is
/// stripped from any other 4-letter code (Kraken's legacy ISO-4217-style prefixing).
pub fn clean_kraken_currency(code: &str) -> String {
    match code {
        "XBT" | "XXBT" => "BTC".to_string(),
        other if other.len() == 4 && (other.starts_with('X') || other.starts_with('Z')) => {
            other[1..].to_string()
        }
        other => other.to_string(),
    }
}

/// Joins `base` and `quote` with the given separator, e.g. `btc_usdt` for `("BTC", "USDT", "_")`.
pub fn join_with_separator(base: &str, quote: &str, separator: &str, lower: bool) -> String {
    let joined = format!("{base}{separator}{quote}");
    if lower {
        joined.to_lowercase()
    } else {
        joined
    }
}

/// Splits a venue id on a literal separator into `(base, quote)`.
pub fn split_by_separator(id: &str, separator: &str) -> Option<(String, String)> {
    let (base, quote) = id.split_once(separator)?;
    Some((base.to_uppercase(), quote.to_uppercase()))
}

/// Fallback inverse conversion for concatenated ids with no separator (spec §4.7): tries
/// 3+3, 3+4, and 4+4 base/quote length partitions in that order, which covers the overwhelming
/// majority of real concatenated pairs (`btcusdt` -> 3+4, `ethbtc` -> 3+3).
pub fn partition_by_length(id: &str) -> Option<(String, String)> {
    let upper = id.to_uppercase();
    const PARTITIONS: [(usize, usize); 3] = [(3, 3), (3, 4), (4, 4)];

    for (base_len, quote_len) in PARTITIONS {
        if upper.len() == base_len + quote_len {
            let (base, quote) = upper.split_at(base_len);
            let _ = quote_len;
            return Some((base.to_string(), quote.to_string()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kraken_currency_cleaning_rules() {
        assert_eq!(clean_kraken_currency("XBT"), "BTC");
        assert_eq!(clean_kraken_currency("XXBT"), "BTC");
        assert_eq!(clean_kraken_currency("XETH"), "ETH");
        assert_eq!(clean_kraken_currency("ZUSD"), "USD");
        assert_eq!(clean_kraken_currency("USDT"), "USDT");
    }

    #[test]
    fn partition_falls_back_through_lengths() {
        assert_eq!(partition_by_length("ethbtc"), Some(("ETH".into(), "BTC".into())));
        assert_eq!(partition_by_length("btcusdt"), Some(("BTC".into(), "USDT".into())));
        assert_eq!(partition_by_length("usdcusdt"), Some(("USDC".into(), "USDT".into())));
    }

    #[test]
    fn separator_split_upcases_both_sides() {
        assert_eq!(
            split_by_separator("btc_usdt", "_"),
            Some(("BTC".into(), "USDT".into()))
        );
    }
}
