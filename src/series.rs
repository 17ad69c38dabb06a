//! Bounded, time-ordered output series for charting
//!
//! Owns the two series consumers read: sub-minute smoothed price points
//! and minute candles. Both are retention-bounded ring buffers ordered
//! ascending by time with unique timestamps; the oldest entry is dropped
//! on overflow.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One sample of the sub-minute smoothed price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Seconds since epoch.
    pub time: i64,
    pub value: f64,
}

/// One minute-resolution candle.
///
/// The last element of a series may be replaced in place while its minute
/// is still open; it becomes immutable once a later bar is appended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Seconds since epoch, minute-aligned.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Owned read-only copy of both series handed to consumers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeriesSnapshot {
    pub points: Vec<PricePoint>,
    pub bars: Vec<Bar>,
}

/// Exclusive owner of the two output series.
///
/// All mutation goes through the merge rules below; nothing else holds a
/// live reference to the underlying storage.
#[derive(Debug)]
pub struct SeriesAggregator {
    capacity: usize,
    points: VecDeque<PricePoint>,
    bars: VecDeque<Bar>,
}

impl SeriesAggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
            bars: VecDeque::with_capacity(capacity),
        }
    }

    /// Merge one closed bar into the candle series.
    ///
    /// Equal time to the last element replaces it in place; an older time
    /// is dropped to keep the series strictly ascending; a newer time
    /// appends, evicting the oldest bar past capacity. Returns whether
    /// the series changed.
    pub fn merge_bar(&mut self, bar: Bar) -> bool {
        if let Some(last) = self.bars.back_mut() {
            if bar.time == last.time {
                *last = bar;
                return true;
            }
            if bar.time < last.time {
                debug!(time = bar.time, last = last.time, "out-of-order bar dropped");
                return false;
            }
        }
        if self.bars.len() >= self.capacity {
            self.bars.pop_front();
        }
        self.bars.push_back(bar);
        true
    }

    /// Merge one smoothed price sample into the point series.
    ///
    /// A sample landing within the same minute as the last point updates
    /// that point's value, keeping its original timestamp; otherwise the
    /// sample appends with the same eviction rule as bars. Samples older
    /// than the last point are dropped.
    pub fn append_point(&mut self, time: i64, value: f64) -> bool {
        if let Some(last) = self.points.back_mut() {
            if time < last.time {
                debug!(time, last = last.time, "out-of-order point dropped");
                return false;
            }
            if time - last.time < 60 {
                last.value = value;
                return true;
            }
        }
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(PricePoint { time, value });
        true
    }

    /// Atomically replace both series with a freshly loaded history.
    ///
    /// Input is expected oldest-first; only the most recent `capacity`
    /// entries are kept.
    pub fn seed(&mut self, bars: Vec<Bar>, points: Vec<PricePoint>) {
        self.bars = take_recent(bars, self.capacity);
        self.points = take_recent(points, self.capacity);
    }

    /// Empty both series.
    pub fn reset(&mut self) {
        self.bars.clear();
        self.points.clear();
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            points: self.points.iter().copied().collect(),
            bars: self.bars.iter().copied().collect(),
        }
    }

    pub fn bars_len(&self) -> usize {
        self.bars.len()
    }

    pub fn points_len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty() && self.points.is_empty()
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn last_point(&self) -> Option<&PricePoint> {
        self.points.back()
    }
}

fn take_recent<T>(items: Vec<T>, capacity: usize) -> VecDeque<T> {
    let skip = items.len().saturating_sub(capacity);
    items.into_iter().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_bar(time: i64, price: f64) -> Bar {
        Bar {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    #[test]
    fn test_merge_bar_appends_ascending() {
        let mut series = SeriesAggregator::new(60);
        for i in 0..5 {
            assert!(series.merge_bar(flat_bar(i * 60, 100.0 + i as f64)));
        }

        let snapshot = series.snapshot();
        assert_eq!(snapshot.bars.len(), 5);
        let times: Vec<i64> = snapshot.bars.iter().map(|b| b.time).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_merge_bar_equal_time_replaces_in_place() {
        let mut series = SeriesAggregator::new(60);
        series.merge_bar(flat_bar(0, 100.0));
        series.merge_bar(flat_bar(60, 101.0));

        assert!(series.merge_bar(flat_bar(60, 105.0)));
        let snapshot = series.snapshot();
        assert_eq!(snapshot.bars.len(), 2);
        assert_eq!(snapshot.bars[1].close, 105.0);
    }

    #[test]
    fn test_merge_bar_drops_out_of_order() {
        let mut series = SeriesAggregator::new(60);
        series.merge_bar(flat_bar(120, 100.0));

        assert!(!series.merge_bar(flat_bar(60, 99.0)));
        assert_eq!(series.bars_len(), 1);
    }

    #[test]
    fn test_merge_bar_evicts_oldest_past_capacity() {
        let mut series = SeriesAggregator::new(60);
        for i in 0..65 {
            series.merge_bar(flat_bar(i * 60, 100.0));
        }

        let snapshot = series.snapshot();
        assert_eq!(snapshot.bars.len(), 60);
        assert_eq!(snapshot.bars[0].time, 5 * 60);
        assert_eq!(snapshot.bars[59].time, 64 * 60);
    }

    #[test]
    fn test_append_point_same_minute_overwrites() {
        let mut series = SeriesAggregator::new(60);
        series.append_point(1000, 50.0);
        series.append_point(1002, 51.0);
        series.append_point(1004, 52.0);

        let snapshot = series.snapshot();
        assert_eq!(snapshot.points.len(), 1);
        // Timestamp of the first sample in the minute is kept
        assert_eq!(snapshot.points[0].time, 1000);
        assert_eq!(snapshot.points[0].value, 52.0);
    }

    #[test]
    fn test_append_point_new_minute_appends() {
        let mut series = SeriesAggregator::new(60);
        series.append_point(1000, 50.0);
        series.append_point(1060, 51.0);

        let snapshot = series.snapshot();
        assert_eq!(snapshot.points.len(), 2);
        assert_eq!(snapshot.points[1].time, 1060);
    }

    #[test]
    fn test_append_point_capped_at_capacity() {
        let mut series = SeriesAggregator::new(60);
        for i in 0..70 {
            series.append_point(i * 60, 50.0);
        }

        assert_eq!(series.points_len(), 60);
        assert_eq!(series.snapshot().points[0].time, 10 * 60);
    }

    #[test]
    fn test_seed_truncates_to_capacity() {
        let mut series = SeriesAggregator::new(60);
        let bars: Vec<Bar> = (0..100).map(|i| flat_bar(i * 60, 100.0)).collect();
        let points: Vec<PricePoint> = (0..100)
            .map(|i| PricePoint {
                time: i * 60,
                value: 100.0,
            })
            .collect();

        series.seed(bars, points);
        assert_eq!(series.bars_len(), 60);
        assert_eq!(series.points_len(), 60);
        // The most recent entries survive
        assert_eq!(series.last_bar().map(|b| b.time), Some(99 * 60));
    }

    #[test]
    fn test_reset_empties_both_series() {
        let mut series = SeriesAggregator::new(60);
        series.merge_bar(flat_bar(0, 100.0));
        series.append_point(0, 100.0);

        series.reset();
        assert!(series.is_empty());
        let snapshot = series.snapshot();
        assert!(snapshot.bars.is_empty());
        assert!(snapshot.points.is_empty());
    }
}
