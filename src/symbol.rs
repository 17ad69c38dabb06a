//! Instrument identifier to upstream stream/query symbol mapping

/// Quote asset appended to every mapped symbol.
const QUOTE_ASSET: &str = "USDT";

/// Map an abstract instrument identifier to the upstream market symbol.
///
/// Known instruments use a static lookup; unknown codes fall back to the
/// uppercased code with the fixed quote suffix. Total: always returns a
/// symbol string, even one that does not exist upstream (that failure
/// surfaces later as a subscription or request error).
///
/// The REST API takes the returned uppercase form; stream channel names
/// lowercase it.
pub fn stream_symbol(instrument: &str) -> String {
    let base = match instrument {
        "bitcoin" => "BTC",
        "ethereum" => "ETH",
        "binancecoin" => "BNB",
        "cardano" => "ADA",
        "dogecoin" => "DOGE",
        "ripple" => "XRP",
        "polkadot" => "DOT",
        "solana" => "SOL",
        other => return format!("{}{}", other.to_uppercase(), QUOTE_ASSET),
    };
    format!("{base}{QUOTE_ASSET}")
}
