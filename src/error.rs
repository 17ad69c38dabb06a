use thiserror::Error;

/// All errors surfaced by the aggregation core.
///
/// Stream-side transport failures are deliberately absent: they are logged
/// and absorbed by the session's reconnect loop rather than returned to
/// callers. The worst observable outcome is "no live price available".
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("historical bar request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("historical bar response malformed: {0}")]
    MalformedHistory(String),

    #[error("historical bar response empty for {symbol}")]
    EmptyHistory { symbol: String },
}
