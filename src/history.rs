//! Historical bar loading: seeds the series and smoother on instrument switch

use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::series::{Bar, PricePoint};

/// Binance kline response format
#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

/// Result of a historical load: bars and points oldest-first, plus the
/// close of the last bar as the smoother seed.
#[derive(Debug, Clone)]
pub struct HistoricalSeries {
    pub bars: Vec<Bar>,
    pub points: Vec<PricePoint>,
    pub seed_price: f64,
}

/// Fetch the most recent minute bars for a symbol.
///
/// No automatic retry: a failure leaves the caller's series empty, and
/// retrying is a caller decision (reselecting the instrument).
pub async fn fetch_recent_bars(
    client: &reqwest::Client,
    config: &FeedConfig,
    symbol: &str,
) -> Result<HistoricalSeries, FeedError> {
    let url = format!(
        "{}/klines?symbol={}&interval=1m&limit={}",
        config.rest_url, symbol, config.history_limit
    );
    debug!(%url, "fetching historical bars");

    let response = client
        .get(&url)
        .timeout(config.request_timeout)
        .send()
        .await?
        .error_for_status()?;

    let klines: Vec<BinanceKline> = response.json().await?;
    convert_klines(klines, symbol)
}

fn convert_klines(klines: Vec<BinanceKline>, symbol: &str) -> Result<HistoricalSeries, FeedError> {
    let row_count = klines.len();

    let bars: Vec<Bar> = klines
        .into_iter()
        .filter_map(|k| {
            let time = DateTime::from_timestamp_millis(k.0)?.timestamp();
            Some(Bar {
                time,
                open: k.1.parse().ok()?,
                high: k.2.parse().ok()?,
                low: k.3.parse().ok()?,
                close: k.4.parse().ok()?,
            })
        })
        .collect();

    let Some(last) = bars.last() else {
        return Err(if row_count > 0 {
            FeedError::MalformedHistory(format!("no parseable rows out of {row_count}"))
        } else {
            FeedError::EmptyHistory {
                symbol: symbol.to_string(),
            }
        });
    };
    let seed_price = last.close;

    let points = bars
        .iter()
        .map(|b| PricePoint {
            time: b.time,
            value: b.close,
        })
        .collect();

    Ok(HistoricalSeries {
        bars,
        points,
        seed_price,
    })
}
