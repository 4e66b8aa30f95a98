// Driver-input quality metrics over the continuous telemetry trace

use log::warn;
use serde::Serialize;

use super::{mean, sample_std};
use crate::ingest::TelemetryTrace;

/// Brake input above this fraction counts as a braking application.
pub const BRAKING_THRESHOLD: f64 = 0.1;

/// Throttle input above this fraction counts as throttle-on.
pub const THROTTLE_THRESHOLD: f64 = 0.05;

/// Channels the quality analyzer knows how to score.
const SCORED_CHANNELS: [&str; 3] = ["Throttle", "Brake", "SteeringAngle"];

/// Smoothness and input-application metrics per channel. A channel that is
/// missing from the trace leaves its metrics as None, and the fields are
/// omitted from the serialized report rather than defaulted to zero.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct InputQualityAnalysis {
    /// Standard deviation of sample-to-sample throttle changes; lower is
    /// smoother.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_smoothness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brake_smoothness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steering_smoothness: Option<f64>,
    /// Mean brake input over samples above the braking threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_brake_application: Option<f64>,
    /// Count of threshold-sized jumps between consecutive above-threshold
    /// brake samples. An approximation: it does not segment distinct
    /// braking zones, and downstream consumers rely on this definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_braking_events: Option<usize>,
    /// Mean throttle input over samples above the throttle threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_throttle_application: Option<f64>,
    /// Percentage of all samples above the throttle threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_throttle_on: Option<f64>,
}

impl InputQualityAnalysis {
    pub fn is_empty(&self) -> bool {
        self == &InputQualityAnalysis::default()
    }
}

/// Derives driver-input quality metrics from the telemetry trace.
pub struct TelemetryQualityAnalyzer<'a> {
    trace: &'a TelemetryTrace,
}

impl<'a> TelemetryQualityAnalyzer<'a> {
    pub fn new(trace: &'a TelemetryTrace) -> Self {
        for channel in SCORED_CHANNELS {
            if !trace.has_channel(channel) {
                warn!("telemetry channel '{channel}' not found, its metrics will be omitted");
            }
        }
        Self { trace }
    }

    pub fn analyze(&self) -> InputQualityAnalysis {
        let mut analysis = InputQualityAnalysis {
            throttle_smoothness: self.smoothness("Throttle"),
            brake_smoothness: self.smoothness("Brake"),
            steering_smoothness: self.smoothness("SteeringAngle"),
            ..Default::default()
        };

        if let Some(brake) = self.trace.channel("Brake") {
            let braking: Vec<f64> = brake
                .iter()
                .flatten()
                .copied()
                .filter(|value| *value > BRAKING_THRESHOLD)
                .collect();
            analysis.avg_brake_application = Some(mean(&braking));
            analysis.num_braking_events = Some(
                braking
                    .windows(2)
                    .filter(|pair| (pair[1] - pair[0]).abs() > BRAKING_THRESHOLD)
                    .count(),
            );
        }

        if let Some(throttle) = self.trace.channel("Throttle") {
            let applied: Vec<f64> = throttle
                .iter()
                .flatten()
                .copied()
                .filter(|value| *value > THROTTLE_THRESHOLD)
                .collect();
            analysis.avg_throttle_application = Some(mean(&applied));
            analysis.percent_throttle_on = Some(if self.trace.sample_count() > 0 {
                applied.len() as f64 / self.trace.sample_count() as f64 * 100.0
            } else {
                0.0
            });
        }

        analysis
    }

    /// Standard deviation of the channel's first differences, taken over
    /// adjacent non-null sample pairs. Fewer than two differences yields 0.
    fn smoothness(&self, channel: &str) -> Option<f64> {
        let values = self.trace.channel(channel)?;
        let diffs: Vec<f64> = values
            .windows(2)
            .filter_map(|pair| match (pair[0], pair[1]) {
                (Some(previous), Some(current)) => Some(current - previous),
                _ => None,
            })
            .collect();
        Some(sample_std(&diffs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{SessionTable, extract_telemetry_trace};

    fn trace(header: &[&str], rows: &[&[&str]]) -> TelemetryTrace {
        let mut table_rows: Vec<Vec<String>> =
            vec![header.iter().map(|cell| cell.to_string()).collect()];
        table_rows.extend(
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>()),
        );
        extract_telemetry_trace(&SessionTable::new(table_rows))
    }

    #[test]
    fn test_constant_throttle_is_perfectly_smooth() {
        let t = trace(
            &["Time", "Throttle", "Brake", "SteeringAngle"],
            &[
                &["0.0", "0.8", "0.0", "0.0"],
                &["0.1", "0.8", "0.0", "0.0"],
                &["0.2", "0.8", "0.0", "0.0"],
                &["0.3", "0.8", "0.0", "0.0"],
            ],
        );
        let analysis = TelemetryQualityAnalyzer::new(&t).analyze();
        assert_eq!(analysis.throttle_smoothness, Some(0.0));
    }

    #[test]
    fn test_missing_brake_channel_omits_braking_metrics() {
        let t = trace(
            &["Time", "Throttle", "SteeringAngle", "Speed"],
            &[&["0.0", "0.8", "0.0", "10.0"], &["0.1", "0.9", "0.0", "12.0"]],
        );
        let analysis = TelemetryQualityAnalyzer::new(&t).analyze();
        assert_eq!(analysis.brake_smoothness, None);
        assert_eq!(analysis.avg_brake_application, None);
        assert_eq!(analysis.num_braking_events, None);
        assert!(analysis.throttle_smoothness.is_some());

        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json.get("avg_brake_application").is_none());
        assert!(json.get("throttle_smoothness").is_some());
    }

    #[test]
    fn test_braking_event_count_is_threshold_crossings() {
        // above-threshold brake samples: 0.5, 0.55, 0.9, 0.2
        // jumps: 0.05 (no), 0.35 (yes), 0.7 (yes)
        let t = trace(
            &["Time", "Throttle", "Brake", "SteeringAngle"],
            &[
                &["0.0", "0.0", "0.5", "0.0"],
                &["0.1", "0.0", "0.55", "0.0"],
                &["0.2", "0.0", "0.05", "0.0"],
                &["0.3", "0.0", "0.9", "0.0"],
                &["0.4", "0.0", "0.2", "0.0"],
            ],
        );
        let analysis = TelemetryQualityAnalyzer::new(&t).analyze();
        assert_eq!(analysis.num_braking_events, Some(2));
        let expected_avg = (0.5 + 0.55 + 0.9 + 0.2) / 4.0;
        assert!((analysis.avg_brake_application.unwrap() - expected_avg).abs() < 1e-9);
    }

    #[test]
    fn test_throttle_application_percentage() {
        let t = trace(
            &["Time", "Throttle", "Brake", "SteeringAngle"],
            &[
                &["0.0", "0.8", "0.0", "0.0"],
                &["0.1", "0.02", "0.0", "0.0"],
                &["0.2", "0.6", "0.0", "0.0"],
                &["0.3", "0.0", "0.0", "0.0"],
            ],
        );
        let analysis = TelemetryQualityAnalyzer::new(&t).analyze();
        assert_eq!(analysis.percent_throttle_on, Some(50.0));
        assert!((analysis.avg_throttle_application.unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_null_samples_are_skipped_in_diffs() {
        let t = trace(
            &["Time", "Throttle", "Brake", "SteeringAngle"],
            &[
                &["0.0", "0.5", "0.0", "0.0"],
                &["0.1", "bad", "0.0", "0.0"],
                &["0.2", "0.5", "0.0", "0.0"],
                &["0.3", "0.5", "0.0", "0.0"],
            ],
        );
        let analysis = TelemetryQualityAnalyzer::new(&t).analyze();
        // only one valid adjacent pair, a single diff has no deviation
        assert_eq!(analysis.throttle_smoothness, Some(0.0));
    }

    #[test]
    fn test_empty_trace_yields_empty_analysis() {
        let analysis = TelemetryQualityAnalyzer::new(&TelemetryTrace::default()).analyze();
        assert!(analysis.is_empty());
    }
}
