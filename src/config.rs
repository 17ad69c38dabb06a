//! Feed configuration

use std::time::Duration;

/// Configuration for the aggregation core.
///
/// Defaults target the public Binance spot endpoints; everything is
/// overridable, which is how tests point the feed at local fixtures.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL of the historical bar-query endpoint.
    pub rest_url: String,
    /// WebSocket endpoint of the streaming feed.
    pub ws_url: String,
    /// Number of minute bars fetched when an instrument is selected.
    pub history_limit: usize,
    /// Retention bound for both output series.
    pub series_capacity: usize,
    /// Most-recent-N window of trade samples per aggregation cycle.
    pub tick_buffer_size: usize,
    /// Cadence of the smoothing/aggregation cycle.
    pub aggregation_interval: Duration,
    /// Fixed delay before a dropped stream connection is reopened.
    pub reconnect_delay: Duration,
    /// Timeout applied to the historical bar request.
    pub request_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://api.binance.com/api/v3".to_string(),
            ws_url: "wss://stream.binance.com:9443/ws".to_string(),
            history_limit: 60,
            series_capacity: 60,
            tick_buffer_size: 10,
            aggregation_interval: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl FeedConfig {
    /// Create a configuration with custom REST and WebSocket endpoints.
    pub fn new(rest_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            rest_url: rest_url.into(),
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    /// Set the aggregation cycle cadence.
    pub fn with_aggregation_interval(mut self, interval: Duration) -> Self {
        self.aggregation_interval = interval;
        self
    }

    /// Set the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the retention bound for both output series.
    pub fn with_series_capacity(mut self, capacity: usize) -> Self {
        self.series_capacity = capacity;
        self
    }

    /// Set the trade-sample window size.
    pub fn with_tick_buffer_size(mut self, size: usize) -> Self {
        self.tick_buffer_size = size;
        self
    }
}
