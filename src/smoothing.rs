//! Two-stage price smoothing over streaming trades
//!
//! Raw tick prices are too noisy and too frequent for a 60-point chart.
//! Stage one is a volume-weighted average over a bounded recent-tick
//! window, suppressing single-trade outliers within a cycle; stage two is
//! exponential smoothing across aggregation cycles, suppressing
//! cycle-to-cycle jitter. Collapsing both into one EMA over raw ticks
//! would overweight low-volume noise trades.

use std::collections::VecDeque;

/// Fixed exponential smoothing factor applied once per aggregation cycle.
pub const SMOOTHING_FACTOR: f64 = 0.2;

/// One trade sample received from the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSample {
    pub price: f64,
    pub volume: f64,
}

/// Bounded most-recent-N window of trade samples.
///
/// Oldest samples are evicted on overflow. The window is reseeded with a
/// single synthetic sample at the end of every aggregation cycle, so the
/// next cycle's VWAP starts from a stable baseline rather than an empty
/// buffer.
#[derive(Debug, Clone)]
pub struct TickBuffer {
    samples: VecDeque<TickSample>,
    max_size: usize,
}

impl TickBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Add a trade sample, evicting the oldest past capacity.
    pub fn push(&mut self, price: f64, volume: f64) {
        if self.samples.len() >= self.max_size {
            self.samples.pop_front();
        }
        self.samples.push_back(TickSample { price, volume });
    }

    /// Volume-weighted average price of the current window.
    ///
    /// `None` for an empty window. When total volume is zero the most
    /// recent sample's price is returned unweighted.
    pub fn vwap(&self) -> Option<f64> {
        let last = self.samples.back()?;

        let total_volume: f64 = self.samples.iter().map(|s| s.volume).sum();
        if total_volume <= 0.0 {
            return Some(last.price);
        }

        let weighted: f64 = self.samples.iter().map(|s| s.price * s.volume).sum();
        Some(weighted / total_volume)
    }

    /// Clear the window and install one synthetic unit-volume sample.
    pub fn reseed(&mut self, price: f64) {
        self.samples.clear();
        self.samples.push_back(TickSample { price, volume: 1.0 });
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Exponential moving average across aggregation cycles.
///
/// Seeded with the latest historical close on instrument switch; the
/// first update after an unseeded reset adopts the sample as-is.
#[derive(Debug, Clone, Default)]
pub struct Ema {
    value: Option<f64>,
}

impl Ema {
    /// Install a starting value without smoothing.
    pub fn seed(&mut self, value: f64) {
        self.value = Some(value);
    }

    /// Fold a new sample into the average and return the updated value.
    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(prev) => SMOOTHING_FACTOR * sample + (1.0 - SMOOTHING_FACTOR) * prev,
            None => sample,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vwap_weights_by_volume() {
        let mut buffer = TickBuffer::new(10);
        buffer.push(100.0, 1.0);
        buffer.push(101.0, 2.0);
        buffer.push(99.0, 1.0);

        let vwap = buffer.vwap().unwrap();
        assert!((vwap - 100.25).abs() < 0.01);
    }

    #[test]
    fn test_vwap_empty() {
        let buffer = TickBuffer::new(10);
        assert_eq!(buffer.vwap(), None);
    }

    #[test]
    fn test_vwap_zero_volume_falls_back_to_last_price() {
        let mut buffer = TickBuffer::new(10);
        buffer.push(100.0, 0.0);
        buffer.push(100.0, 0.0);

        assert_eq!(buffer.vwap(), Some(100.0));
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = TickBuffer::new(3);
        for i in 0..5 {
            buffer.push(100.0 + i as f64, 1.0);
        }

        assert_eq!(buffer.len(), 3);
        // Oldest two (100, 101) gone; VWAP over 102, 103, 104
        assert!((buffer.vwap().unwrap() - 103.0).abs() < 1e-9);
    }

    #[test]
    fn test_reseed_installs_single_unit_sample() {
        let mut buffer = TickBuffer::new(10);
        buffer.push(100.0, 5.0);
        buffer.push(110.0, 5.0);

        buffer.reseed(104.0);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.vwap(), Some(104.0));
    }

    #[test]
    fn test_ema_adopts_first_sample_when_unseeded() {
        let mut ema = Ema::default();
        assert_eq!(ema.value(), None);

        let v = ema.update(50.0);
        assert_eq!(v, 50.0);
        assert_eq!(ema.value(), Some(50.0));
    }

    #[test]
    fn test_ema_smooths_toward_sample() {
        let mut ema = Ema::default();
        ema.seed(100.0);

        let v = ema.update(110.0);
        // 0.2 * 110 + 0.8 * 100 = 102
        assert!((v - 102.0).abs() < 1e-9);
    }

    #[test]
    fn test_ema_steady_state_convergence() {
        let mut ema = Ema::default();
        ema.seed(100.0);

        let mut last = 0.0;
        for _ in 0..20 {
            last = ema.update(50.0);
        }
        assert!(
            (last - 50.0).abs() < 0.1,
            "EMA failed to converge: {last}"
        );
    }

    #[test]
    fn test_ema_idempotent_at_steady_state() {
        let mut ema = Ema::default();
        ema.seed(50.0);

        let v = ema.update(50.0);
        assert_eq!(v, 50.0);
    }
}
