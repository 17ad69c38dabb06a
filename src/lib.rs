/// Chartfeed - live market-data aggregation core
///
/// Reconciles two asynchronously-arriving, differently-shaped sources -
/// a batch REST history of minute bars and a push WebSocket stream of
/// trade ticks and bar-close events - into one consistent, bounded,
/// time-ordered pair of chart series for a single active instrument,
/// plus an exponentially-smoothed current price.
///
/// The library includes:
/// - Instrument-to-symbol mapping for the upstream feed
/// - Two-stage VWAP/EMA price smoothing
/// - Bounded bar and price-point series with replace-or-append merging
/// - A historical bar loader seeding both series on instrument switch
/// - A reconnecting stream session scoped to one symbol at a time
/// - The [`MarketFeed`] controller orchestrating switches and the
///   fixed-cadence aggregation cycle
pub mod config;
pub mod error;
pub mod feed;
pub mod history;
pub mod series;
pub mod smoothing;
pub mod state;
pub mod stream;
pub mod symbol;

// Re-export commonly used types for convenience
pub use config::FeedConfig;
pub use error::FeedError;
pub use feed::MarketFeed;
pub use history::{fetch_recent_bars, HistoricalSeries};
pub use series::{Bar, PricePoint, SeriesAggregator, SeriesSnapshot};
pub use smoothing::{Ema, TickBuffer, SMOOTHING_FACTOR};
pub use state::FeedState;
pub use stream::{SessionStatus, StreamSession};
pub use symbol::stream_symbol;
