// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-buffer usage statistics.
//!
//! [`BufferStats`] counts how a buffer is being presented: how often the
//! host binds data into it, how often its layout actually changes, and how
//! close it comes to its capacity. Useful for sizing declarations.

/// Cumulative statistics about one buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BufferStats {
    /// Number of `set` calls that succeeded.
    pub sets: u64,
    /// Number of `reset` / `reset_flat` calls that succeeded.
    pub resets: u64,
    /// Number of presentations that changed the shape (generation bumps).
    pub reshapes: u64,
    /// Number of presentations rejected for exceeding capacity.
    pub capacity_rejections: u64,
    /// Number of `set` calls rejected by the declared shape template.
    pub template_rejections: u64,
    /// Largest number of bytes ever presented.
    pub peak_bytes: usize,
}

impl BufferStats {
    pub(crate) fn record_set(&mut self, bytes: usize, reshaped: bool) {
        self.sets += 1;
        self.record_presentation(bytes, reshaped);
    }

    pub(crate) fn record_reset(&mut self, bytes: usize, reshaped: bool) {
        self.resets += 1;
        self.record_presentation(bytes, reshaped);
    }

    pub(crate) fn record_rejection(&mut self) {
        self.capacity_rejections += 1;
    }

    pub(crate) fn record_template_rejection(&mut self) {
        self.template_rejections += 1;
    }

    fn record_presentation(&mut self, bytes: usize, reshaped: bool) {
        if reshaped {
            self.reshapes += 1;
        }
        if bytes > self.peak_bytes {
            self.peak_bytes = bytes;
        }
    }

    /// Returns the fraction of `capacity` covered by the peak presentation.
    pub fn peak_utilisation(&self, capacity: usize) -> f64 {
        if capacity == 0 {
            return 0.0;
        }
        self.peak_bytes as f64 / capacity as f64
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} sets, {} resets, {} reshapes, {} rejected, peak {} bytes",
            self.sets,
            self.resets,
            self.reshapes,
            self.capacity_rejections + self.template_rejections,
            self.peak_bytes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let s = BufferStats::default();
        assert_eq!(s.sets, 0);
        assert_eq!(s.peak_utilisation(100), 0.0);
    }

    #[test]
    fn test_peak_tracking() {
        let mut s = BufferStats::default();
        s.record_set(100, true);
        s.record_set(40, true);
        assert_eq!(s.peak_bytes, 100);
        s.record_reset(400, true);
        assert_eq!(s.peak_bytes, 400);
        assert!((s.peak_utilisation(800) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_reshape_counting() {
        let mut s = BufferStats::default();
        s.record_set(24, true);
        s.record_set(24, false);
        s.record_rejection();
        assert_eq!(s.sets, 2);
        assert_eq!(s.reshapes, 1);
        assert_eq!(s.capacity_rejections, 1);
    }

    #[test]
    fn test_summary() {
        let mut s = BufferStats::default();
        s.record_set(24, true);
        s.record_reset(4000, true);
        let text = s.summary();
        assert!(text.contains("1 sets"));
        assert!(text.contains("2 reshapes"));
        assert!(text.contains("peak 4000 bytes"));
    }
}
