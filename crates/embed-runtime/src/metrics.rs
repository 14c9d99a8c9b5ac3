// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Invocation metrics.
//!
//! [`InvocationMetrics`] counts binds and entry-point calls and keeps the
//! timing and output shapes of the most recent call.

use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregate metrics for a runtime session.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InvocationMetrics {
    /// Number of `bind_input` calls that succeeded.
    pub binds: u64,
    /// Number of `invoke` calls, successful or not.
    pub invocations: u64,
    /// Number of `invoke` calls that failed.
    pub failures: u64,
    /// Total wall-clock time spent in `invoke`.
    pub total_duration: Duration,
    /// Wall-clock time of the most recent `invoke`.
    pub last_duration: Duration,
    /// Output shapes reported by the most recent successful `invoke`.
    pub last_output_shapes: BTreeMap<String, Vec<usize>>,
}

impl InvocationMetrics {
    pub(crate) fn record_bind(&mut self) {
        self.binds += 1;
    }

    pub(crate) fn record_success(&mut self, elapsed: Duration, shapes: BTreeMap<String, Vec<usize>>) {
        self.record_call(elapsed);
        self.last_output_shapes = shapes;
    }

    pub(crate) fn record_failure(&mut self, elapsed: Duration) {
        self.record_call(elapsed);
        self.failures += 1;
    }

    fn record_call(&mut self, elapsed: Duration) {
        self.invocations += 1;
        self.total_duration += elapsed;
        self.last_duration = elapsed;
    }

    /// Returns the mean `invoke` duration, or zero before the first call.
    pub fn mean_duration(&self) -> Duration {
        match u32::try_from(self.invocations) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.total_duration / n,
        }
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let shapes = self
            .last_output_shapes
            .iter()
            .map(|(name, dims)| format!("{name}={dims:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Invocations: {} ({} failed), {} binds, {:.3}ms mean, {:.3}ms last, outputs [{}]",
            self.invocations,
            self.failures,
            self.binds,
            self.mean_duration().as_secs_f64() * 1000.0,
            self.last_duration.as_secs_f64() * 1000.0,
            shapes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let m = InvocationMetrics::default();
        assert_eq!(m.mean_duration(), Duration::ZERO);
        assert_eq!(m.invocations, 0);
    }

    #[test]
    fn test_record() {
        let mut m = InvocationMetrics::default();
        m.record_bind();
        let mut shapes = BTreeMap::new();
        shapes.insert("output_a".to_string(), vec![3, 2]);
        m.record_success(Duration::from_millis(4), shapes);
        m.record_failure(Duration::from_millis(2));

        assert_eq!(m.binds, 1);
        assert_eq!(m.invocations, 2);
        assert_eq!(m.failures, 1);
        assert_eq!(m.total_duration, Duration::from_millis(6));
        assert_eq!(m.last_duration, Duration::from_millis(2));
        assert_eq!(m.mean_duration(), Duration::from_millis(3));
        // A failure keeps the shapes of the last success.
        assert_eq!(m.last_output_shapes["output_a"], vec![3, 2]);
    }

    #[test]
    fn test_summary_format() {
        let mut shapes = BTreeMap::new();
        shapes.insert("output_a".to_string(), vec![3, 2]);
        let mut m = InvocationMetrics::default();
        m.record_success(Duration::from_millis(1), shapes);
        let s = m.summary();
        assert!(s.contains("Invocations: 1 (0 failed)"));
        assert!(s.contains("output_a=[3, 2]"));
    }

    #[test]
    fn test_serialize() {
        let m = InvocationMetrics::default();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["invocations"], 0);
    }
}
