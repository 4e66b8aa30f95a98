// Session analysis: lap performance, driver-input quality, and the KPI
// aggregation that combines them into a scorecard.

use itertools::Itertools;

pub(crate) mod inputs;
pub(crate) mod kpi;
pub(crate) mod lap;

pub use inputs::{InputQualityAnalysis, TelemetryQualityAnalyzer};
pub use kpi::{
    ConsistencyRating, ImprovementRating, KpiAggregator, KpiReport, Metric, PerformanceGrade,
    ProgressionRating,
};
pub use lap::{FastestLapDetail, LapAnalysis, LapPerformanceAnalyzer, SectorAnalysis};

/// Arithmetic mean; 0 for an empty slice so degenerate sessions stay finite.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n-1) standard deviation; 0 when fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values
        .iter()
        .map(|value| {
            let delta = value - avg;
            delta * delta
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Median of the values; 0 for an empty slice.
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted: Vec<f64> = values.iter().copied().sorted_by(f64::total_cmp).collect();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
