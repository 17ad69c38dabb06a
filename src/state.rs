//! Single-owner aggregation state
//!
//! Every lifecycle transition and stream application is a synchronous
//! reducer method on [`FeedState`], so the merge rules and switch races
//! are unit-testable without timers or sockets. Asynchronous completions
//! (historical loads, stream messages) carry the generation they were
//! issued for; a completion whose generation no longer matches is a
//! stale no-op, not an error.

use tokio::sync::watch;
use tracing::debug;

use crate::config::FeedConfig;
use crate::history::HistoricalSeries;
use crate::series::{Bar, SeriesAggregator, SeriesSnapshot};
use crate::smoothing::{Ema, TickBuffer};

/// The instrument currently being tracked.
#[derive(Debug, Clone)]
pub struct ActiveInstrument {
    pub instrument: String,
    pub symbol: String,
}

/// Exclusive owner of the output series, the tick window, and the
/// smoothed price for the single active instrument.
#[derive(Debug)]
pub struct FeedState {
    /// Bumped on every selection change; tags all in-flight async work.
    generation: u64,
    active: Option<ActiveInstrument>,
    loading: bool,
    series: SeriesAggregator,
    ticks: TickBuffer,
    ema: Ema,
    revision: u64,
    changes: watch::Sender<u64>,
}

impl FeedState {
    pub fn new(config: &FeedConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            generation: 0,
            active: None,
            loading: false,
            series: SeriesAggregator::new(config.series_capacity),
            ticks: TickBuffer::new(config.tick_buffer_size),
            ema: Ema::default(),
            revision: 0,
            changes,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        let _ = self.changes.send(self.revision);
    }

    fn reset_data(&mut self) {
        self.series.reset();
        self.ticks.clear();
        self.ema.reset();
    }

    /// Start tracking a new instrument.
    ///
    /// Supersedes any prior selection: state is emptied, the loading flag
    /// raised, and a fresh generation returned for tagging the historical
    /// fetch and the stream session that may follow it.
    pub fn begin_select(&mut self, instrument: &str, symbol: &str) -> u64 {
        self.generation += 1;
        self.active = Some(ActiveInstrument {
            instrument: instrument.to_string(),
            symbol: symbol.to_string(),
        });
        self.loading = true;
        self.reset_data();
        self.touch();
        self.generation
    }

    /// Stop tracking entirely. Quiescent and re-enterable.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.active = None;
        self.loading = false;
        self.reset_data();
        self.touch();
    }

    /// Apply a completed historical load.
    ///
    /// Returns `false` without mutating anything when the load belongs to
    /// a superseded selection.
    pub fn finish_load(&mut self, generation: u64, history: HistoricalSeries) -> bool {
        if generation != self.generation {
            return false;
        }
        self.series.seed(history.bars, history.points);
        self.ema.seed(history.seed_price);
        self.ticks.reseed(history.seed_price);
        self.loading = false;
        self.touch();
        true
    }

    /// Record a failed historical load.
    ///
    /// Leaves the series empty and stops tracking; the caller retries by
    /// reselecting. Stale failures are ignored.
    pub fn fail_load(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.active = None;
        self.loading = false;
        self.reset_data();
        self.touch();
        true
    }

    /// Apply one trade tick from the stream.
    pub fn apply_trade(&mut self, generation: u64, price: f64, volume: f64) -> bool {
        if generation != self.generation {
            return false;
        }
        if price <= 0.0 {
            debug!(price, "non-positive trade price dropped");
            return false;
        }
        self.ticks.push(price, volume);
        true
    }

    /// Merge one closed minute bar from the stream.
    pub fn apply_closed_bar(&mut self, generation: u64, bar: Bar) -> bool {
        if generation != self.generation {
            return false;
        }
        if self.series.merge_bar(bar) {
            self.touch();
            true
        } else {
            false
        }
    }

    /// Run one aggregation cycle at `now` (seconds since epoch).
    ///
    /// VWAP over the tick window, folded into the EMA, appended to the
    /// point series; the window is then reseeded with the new smoothed
    /// price. No-op while idle or loading. Returns the new smoothed
    /// price when a cycle ran.
    pub fn aggregation_cycle(&mut self, now: i64) -> Option<f64> {
        if self.active.is_none() || self.loading {
            return None;
        }
        let vwap = self.ticks.vwap()?;
        let smoothed = self.ema.update(vwap);
        self.series.append_point(now, smoothed);
        self.ticks.reseed(smoothed);
        self.touch();
        Some(smoothed)
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        self.series.snapshot()
    }

    /// Current smoothed price; absent while idle or loading.
    pub fn current_price(&self) -> Option<f64> {
        if self.loading || self.active.is_none() {
            return None;
        }
        self.ema.value()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn active_instrument(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.instrument.as_str())
    }

    pub fn active_symbol(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.symbol.as_str())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Receiver that observes the revision counter; it moves after every
    /// seed, merge, aggregation-cycle append, or lifecycle transition.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
