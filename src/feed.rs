//! Aggregation controller: orchestrates instrument switches
//!
//! [`MarketFeed`] is the single stateful orchestration point. Selecting
//! an instrument tears down the previous stream session, resets the
//! aggregation state, loads the historical window, and only then opens a
//! new session; a fixed-cadence timer drives the smoothing cycle. All
//! other components are pure functions or narrowly-scoped state owners
//! invoked through this controller.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::FeedConfig;
use crate::history;
use crate::series::SeriesSnapshot;
use crate::state::FeedState;
use crate::stream::{SessionStatus, StreamSession};
use crate::symbol::stream_symbol;

/// Live market-data feed for one instrument at a time.
///
/// Construct within a Tokio runtime; the aggregation timer task is
/// spawned immediately and idles until an instrument is selected.
pub struct MarketFeed {
    config: FeedConfig,
    client: reqwest::Client,
    state: Arc<Mutex<FeedState>>,
    session: Arc<Mutex<Option<StreamSession>>>,
    timer: JoinHandle<()>,
}

impl MarketFeed {
    pub fn new(config: FeedConfig) -> Self {
        let state = Arc::new(Mutex::new(FeedState::new(&config)));
        let timer = tokio::spawn(aggregation_timer(
            Arc::clone(&state),
            config.aggregation_interval,
        ));

        Self {
            config,
            client: reqwest::Client::new(),
            state,
            session: Arc::new(Mutex::new(None)),
            timer,
        }
    }

    /// Switch the tracked instrument, or stop tracking with `None`.
    ///
    /// The previous session is fully closed before anything else
    /// happens. The historical load runs in the background: a later
    /// `select` supersedes it, and its eventual completion is discarded
    /// by the generation check.
    pub async fn select(&self, instrument: Option<&str>) {
        // Session slot lock is always taken before the state lock
        let mut slot = self.session.lock().await;
        if let Some(previous) = slot.take() {
            debug!(symbol = %previous.symbol(), "closing previous stream session");
            previous.close();
        }

        let Some(instrument) = instrument else {
            self.state.lock().await.clear();
            info!("instrument deselected, feed quiescent");
            return;
        };

        let symbol = stream_symbol(instrument);
        let generation = self
            .state
            .lock()
            .await
            .begin_select(instrument, &symbol);
        drop(slot);
        info!(%instrument, %symbol, "instrument selected, loading history");

        let client = self.client.clone();
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let session = Arc::clone(&self.session);
        tokio::spawn(async move {
            let result = history::fetch_recent_bars(&client, &config, &symbol).await;

            let mut slot = session.lock().await;
            let mut guard = state.lock().await;
            match result {
                Ok(loaded) => {
                    let bars = loaded.bars.len();
                    if guard.finish_load(generation, loaded) {
                        info!(%symbol, bars, "history seeded, opening stream");
                        *slot = Some(StreamSession::open(
                            &config,
                            &symbol,
                            generation,
                            Arc::clone(&state),
                        ));
                    } else {
                        debug!(%symbol, "history for superseded selection dropped");
                    }
                }
                Err(error) => {
                    warn!(%symbol, %error, "historical load failed");
                    guard.fail_load(generation);
                }
            }
        });
    }

    /// Owned read-only copy of both output series.
    pub async fn snapshot(&self) -> SeriesSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Current smoothed price; `None` while idle or loading.
    pub async fn current_price(&self) -> Option<f64> {
        self.state.lock().await.current_price()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.is_loading()
    }

    pub async fn active_instrument(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .active_instrument()
            .map(str::to_string)
    }

    /// Connection status of the open stream session, if any.
    pub async fn connection_status(&self) -> Option<SessionStatus> {
        self.session.lock().await.as_ref().map(|s| s.status())
    }

    /// Receiver observing a revision counter that moves after every
    /// seed, merge, or aggregation-cycle append.
    pub async fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.state.lock().await.subscribe_changes()
    }
}

impl Drop for MarketFeed {
    fn drop(&mut self) {
        // The session (if any) closes via its own Drop when the slot
        // Arc unwinds
        self.timer.abort();
    }
}

async fn aggregation_timer(state: Arc<Mutex<FeedState>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let now = Utc::now().timestamp();
        if let Some(price) = state.lock().await.aggregation_cycle(now) {
            trace!(price, "aggregation cycle applied");
        }
    }
}
