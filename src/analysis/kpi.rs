// KPI aggregation: combines lap, telemetry, and vehicle-table signals into
// the session scorecard handed to report renderers.

use chrono::Local;
use serde::{Serialize, Serializer};

use super::inputs::InputQualityAnalysis;
use super::lap::LapAnalysis;
use crate::ingest::{SessionMetadata, SessionTable, VehicleTables};

/// Weight of the performance summary in the overall session rating.
const PERFORMANCE_WEIGHT: f64 = 0.6;
/// Weight of the consistency score in the overall session rating.
const CONSISTENCY_WEIGHT: f64 = 0.4;

/// A scorecard value. Serializes as a plain number, except that non-finite
/// values become the strings "NaN" / "Infinity" / "-Infinity" so a
/// degenerate session still produces a valid JSON artifact.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Metric(pub f64);

impl From<f64> for Metric {
    fn from(value: f64) -> Self {
        Metric(value)
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f64(self.0)
        } else if self.0.is_nan() {
            serializer.serialize_str("NaN")
        } else if self.0 > 0.0 {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_str("-Infinity")
        }
    }
}

/// Qualitative banding of a consistency index; lower indices are better.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum ConsistencyRating {
    Excellent,
    Good,
    Average,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
}

impl ConsistencyRating {
    /// Banding for the whole-session consistency index.
    pub fn from_index(index: f64) -> Self {
        if index <= 0.01 {
            ConsistencyRating::Excellent
        } else if index <= 0.02 {
            ConsistencyRating::Good
        } else if index <= 0.03 {
            ConsistencyRating::Average
        } else if index <= 0.05 {
            ConsistencyRating::Poor
        } else {
            ConsistencyRating::VeryPoor
        }
    }

    /// Banding for a single sector, which bottoms out at Poor.
    pub fn from_sector_index(index: f64) -> Self {
        if index <= 0.01 {
            ConsistencyRating::Excellent
        } else if index <= 0.02 {
            ConsistencyRating::Good
        } else if index <= 0.03 {
            ConsistencyRating::Average
        } else {
            ConsistencyRating::Poor
        }
    }
}

impl std::fmt::Display for ConsistencyRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyRating::Excellent => write!(f, "Excellent"),
            ConsistencyRating::Good => write!(f, "Good"),
            ConsistencyRating::Average => write!(f, "Average"),
            ConsistencyRating::Poor => write!(f, "Poor"),
            ConsistencyRating::VeryPoor => write!(f, "Very Poor"),
        }
    }
}

/// Banding of a sector's first-3-vs-last-3 improvement in seconds.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum ImprovementRating {
    #[serde(rename = "Strong Improvement")]
    StrongImprovement,
    #[serde(rename = "Moderate Improvement")]
    ModerateImprovement,
    Stable,
    Decline,
}

impl ImprovementRating {
    pub fn from_seconds(improvement: f64) -> Self {
        if improvement > 0.1 {
            ImprovementRating::StrongImprovement
        } else if improvement > 0.05 {
            ImprovementRating::ModerateImprovement
        } else if improvement > -0.05 {
            ImprovementRating::Stable
        } else {
            ImprovementRating::Decline
        }
    }
}

/// Banding of the session-wide progression trend.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum ProgressionRating {
    #[serde(rename = "Strong Improvement")]
    StrongImprovement,
    #[serde(rename = "Moderate Improvement")]
    ModerateImprovement,
    Stable,
    #[serde(rename = "Slight Decline")]
    SlightDecline,
    #[serde(rename = "Significant Decline")]
    SignificantDecline,
}

impl ProgressionRating {
    pub fn from_trend(trend: f64) -> Self {
        if trend > 0.1 {
            ProgressionRating::StrongImprovement
        } else if trend > 0.05 {
            ProgressionRating::ModerateImprovement
        } else if trend > -0.05 {
            ProgressionRating::Stable
        } else if trend > -0.1 {
            ProgressionRating::SlightDecline
        } else {
            ProgressionRating::SignificantDecline
        }
    }
}

/// Letter grade over the composite 0-100 score, in 5-point bands.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum PerformanceGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    D,
}

impl PerformanceGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            PerformanceGrade::APlus
        } else if score >= 85.0 {
            PerformanceGrade::A
        } else if score >= 80.0 {
            PerformanceGrade::AMinus
        } else if score >= 75.0 {
            PerformanceGrade::BPlus
        } else if score >= 70.0 {
            PerformanceGrade::B
        } else if score >= 65.0 {
            PerformanceGrade::BMinus
        } else if score >= 60.0 {
            PerformanceGrade::CPlus
        } else if score >= 55.0 {
            PerformanceGrade::C
        } else if score >= 50.0 {
            PerformanceGrade::CMinus
        } else {
            PerformanceGrade::D
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionInfoKpis {
    pub session_id: String,
    pub track: String,
    pub vehicle: String,
    pub driver: String,
    pub analysis_timestamp: String,
    pub session_path: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LapPerformanceKpis {
    pub best_lap_time_seconds: Metric,
    pub best_lap_time_formatted: String,
    pub average_lap_time_seconds: Metric,
    pub average_lap_time_formatted: String,
    pub theoretical_best_seconds: Metric,
    pub theoretical_best_formatted: String,
    pub time_lost_to_theoretical: Metric,
    pub pace_efficiency_percent: Metric,
    pub average_vs_best_gap: Metric,
    pub average_vs_best_percent: Metric,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConsistencyKpis {
    pub consistency_index: Metric,
    pub consistency_rating: ConsistencyRating,
    pub lap_time_standard_deviation: Metric,
    pub performance_window_1_percent: Metric,
    pub consistency_score: Metric,
    pub repeatability_factor: Metric,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectorKpis {
    pub name: String,
    pub best_time: Metric,
    pub best_time_formatted: String,
    pub average_time: Metric,
    pub consistency_index: Metric,
    pub improvement_seconds: Metric,
    pub consistency_rating: ConsistencyRating,
    pub improvement_rating: ImprovementRating,
}

#[derive(Clone, Debug, Serialize)]
pub struct SectorPerformanceKpis {
    pub sector_count: usize,
    pub sectors: Vec<SectorKpis>,
    pub overall_sector_improvement: Metric,
    pub most_consistent_sector: Option<String>,
    pub least_consistent_sector: Option<String>,
    pub sector_consistency_range: Metric,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProgressionKpis {
    pub lap_progression_trend: Metric,
    pub progression_rating: ProgressionRating,
    pub session_length_laps: usize,
    pub learning_rate: Metric,
    pub session_stability: Metric,
}

#[derive(Clone, Debug, Serialize)]
pub struct TableAvailability {
    pub data_available: bool,
    pub total_rows: usize,
}

impl TableAvailability {
    fn from_table(table: Option<&SessionTable>) -> Option<Self> {
        table
            .filter(|t| !t.is_empty())
            .map(|t| TableAvailability {
                data_available: true,
                total_rows: t.row_count(),
            })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TireAvailability {
    pub left_data_available: bool,
    pub right_data_available: bool,
}

/// Presence flags and row counts only; deep subsystem analysis is out of
/// scope for the scorecard.
#[derive(Clone, Debug, Serialize)]
pub struct VehicleKpis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel: Option<TableAvailability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tires: Option<TireAvailability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aerodynamics: Option<TableAvailability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<TableAvailability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspension: Option<TableAvailability>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PerformanceSummary {
    pub overall_performance_score: Metric,
    pub performance_grade: PerformanceGrade,
    pub pace_score: Metric,
    pub consistency_score: Metric,
    pub progression_score: Metric,
    pub key_strengths: Vec<String>,
    pub improvement_areas: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RatingBreakdown {
    pub performance_weight: f64,
    pub consistency_weight: f64,
    pub weighted_score: Metric,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionRating {
    pub overall_rating: Metric,
    pub rating_breakdown: RatingBreakdown,
}

/// The session scorecard. Built once per analysis call, serializable even
/// for zero-lap sessions, and handed off immutably to report renderers.
#[derive(Clone, Debug, Serialize)]
pub struct KpiReport {
    pub session_info: SessionInfoKpis,
    pub lap_performance: LapPerformanceKpis,
    pub consistency_metrics: ConsistencyKpis,
    pub sector_performance: SectorPerformanceKpis,
    pub session_progression: ProgressionKpis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_performance: Option<VehicleKpis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_telemetry: Option<InputQualityAnalysis>,
    pub performance_summary: PerformanceSummary,
    pub session_rating: SessionRating,
}

/// Combines the analyzer outputs and session metadata into a `KpiReport`.
/// Every missing upstream value falls back to 0/empty/"Unknown"; no single
/// metric can prevent the rest of the report from being built.
pub struct KpiAggregator {
    metadata: SessionMetadata,
}

impl KpiAggregator {
    pub fn new(metadata: SessionMetadata) -> Self {
        Self { metadata }
    }

    pub fn build_report(
        &self,
        laps: &LapAnalysis,
        vehicle: Option<&VehicleTables>,
        telemetry: Option<&InputQualityAnalysis>,
    ) -> KpiReport {
        let advanced_telemetry = telemetry.filter(|t| !t.is_empty()).cloned();
        let performance_summary = self.performance_summary(laps, advanced_telemetry.as_ref());
        let session_rating = self.session_rating(&performance_summary, laps);

        KpiReport {
            session_info: self.session_info(),
            lap_performance: self.lap_performance(laps),
            consistency_metrics: self.consistency_metrics(laps),
            sector_performance: self.sector_performance(laps),
            session_progression: self.session_progression(laps),
            vehicle_performance: vehicle.map(Self::vehicle_performance),
            advanced_telemetry,
            performance_summary,
            session_rating,
        }
    }

    fn session_info(&self) -> SessionInfoKpis {
        SessionInfoKpis {
            session_id: self.metadata.session_id.clone(),
            track: self.metadata.track.clone(),
            vehicle: self.metadata.vehicle.clone(),
            driver: self.metadata.driver.clone(),
            analysis_timestamp: Local::now().to_rfc3339(),
            session_path: self.metadata.session_path.clone(),
        }
    }

    fn lap_performance(&self, laps: &LapAnalysis) -> LapPerformanceKpis {
        let best = laps.best_lap_time;
        let average = laps.average_lap_time;
        let theoretical = laps.theoretical_best;

        LapPerformanceKpis {
            best_lap_time_seconds: best.into(),
            best_lap_time_formatted: format_lap_time(best),
            average_lap_time_seconds: average.into(),
            average_lap_time_formatted: format_lap_time(average),
            theoretical_best_seconds: theoretical.into(),
            theoretical_best_formatted: format_lap_time(theoretical),
            time_lost_to_theoretical: laps.time_lost_to_theoretical.into(),
            pace_efficiency_percent: if best > 0.0 {
                (theoretical / best * 100.0).into()
            } else {
                Metric(0.0)
            },
            average_vs_best_gap: if average > 0.0 && best > 0.0 {
                (average - best).into()
            } else {
                Metric(0.0)
            },
            average_vs_best_percent: if best > 0.0 {
                ((average - best) / best * 100.0).into()
            } else {
                Metric(0.0)
            },
        }
    }

    fn consistency_metrics(&self, laps: &LapAnalysis) -> ConsistencyKpis {
        ConsistencyKpis {
            consistency_index: laps.consistency_index.into(),
            consistency_rating: ConsistencyRating::from_index(laps.consistency_index),
            lap_time_standard_deviation: laps.lap_time_std.into(),
            performance_window_1_percent: laps.performance_window.into(),
            consistency_score: consistency_score(laps.consistency_index).into(),
            repeatability_factor: if laps.performance_window > 0.0 {
                (laps.performance_window / 100.0).into()
            } else {
                Metric(0.0)
            },
        }
    }

    fn sector_performance(&self, laps: &LapAnalysis) -> SectorPerformanceKpis {
        if laps.sector_analysis.is_empty() {
            return SectorPerformanceKpis {
                sector_count: 0,
                sectors: Vec::new(),
                overall_sector_improvement: Metric(0.0),
                most_consistent_sector: None,
                least_consistent_sector: None,
                sector_consistency_range: Metric(0.0),
            };
        }

        let mut sectors = Vec::new();
        let mut total_improvement = 0.0;
        let mut most_consistent: Option<String> = None;
        let mut least_consistent: Option<String> = None;
        let mut best_consistency = f64::INFINITY;
        let mut worst_consistency = 0.0;

        for sector in &laps.sector_analysis {
            sectors.push(SectorKpis {
                name: sector.name.clone(),
                best_time: sector.best_time.into(),
                best_time_formatted: format_lap_time(sector.best_time),
                average_time: sector.average_time.into(),
                consistency_index: sector.consistency.into(),
                improvement_seconds: sector.improvement.into(),
                consistency_rating: ConsistencyRating::from_sector_index(sector.consistency),
                improvement_rating: ImprovementRating::from_seconds(sector.improvement),
            });

            total_improvement += sector.improvement;
            if sector.consistency < best_consistency {
                best_consistency = sector.consistency;
                most_consistent = Some(sector.name.clone());
            }
            if sector.consistency > worst_consistency {
                worst_consistency = sector.consistency;
                least_consistent = Some(sector.name.clone());
            }
        }

        SectorPerformanceKpis {
            sector_count: sectors.len(),
            sectors,
            overall_sector_improvement: total_improvement.into(),
            most_consistent_sector: most_consistent,
            least_consistent_sector: least_consistent,
            sector_consistency_range: (worst_consistency - best_consistency).into(),
        }
    }

    fn session_progression(&self, laps: &LapAnalysis) -> ProgressionKpis {
        let trend = laps.progression_trend;
        ProgressionKpis {
            lap_progression_trend: trend.into(),
            progression_rating: ProgressionRating::from_trend(trend),
            session_length_laps: laps.valid_laps,
            learning_rate: if trend > 0.0 { trend.into() } else { Metric(0.0) },
            session_stability: if trend.abs() < 1.0 {
                (1.0 - trend.abs()).into()
            } else {
                Metric(0.0)
            },
        }
    }

    fn vehicle_performance(vehicle: &VehicleTables) -> VehicleKpis {
        let tires = if vehicle.tire_temps_left.is_some() || vehicle.tire_temps_right.is_some() {
            Some(TireAvailability {
                left_data_available: vehicle.tire_temps_left.is_some(),
                right_data_available: vehicle.tire_temps_right.is_some(),
            })
        } else {
            None
        };

        VehicleKpis {
            fuel: TableAvailability::from_table(vehicle.fuel.as_ref()),
            tires,
            aerodynamics: TableAvailability::from_table(vehicle.aero_map.as_ref()),
            engine: TableAvailability::from_table(vehicle.engine.as_ref()),
            suspension: TableAvailability::from_table(vehicle.suspension.as_ref()),
        }
    }

    /// Composite 0-100 score. pace_score is a fixed 50 baseline: there is
    /// no reference lap time to rate pace against, and the placeholder is
    /// kept for compatibility with existing consumers.
    fn performance_summary(
        &self,
        laps: &LapAnalysis,
        telemetry: Option<&InputQualityAnalysis>,
    ) -> PerformanceSummary {
        let pace_score = 50.0;
        let consistency = consistency_score(laps.consistency_index);
        let progression = (50.0 + laps.progression_trend * 500.0).clamp(0.0, 100.0);
        let overall = (pace_score + consistency + progression) / 3.0;

        PerformanceSummary {
            overall_performance_score: round1(overall).into(),
            performance_grade: PerformanceGrade::from_score(overall),
            pace_score: round1(pace_score).into(),
            consistency_score: round1(consistency).into(),
            progression_score: round1(progression).into(),
            key_strengths: identify_strengths(laps, telemetry),
            improvement_areas: identify_improvement_areas(laps, telemetry),
        }
    }

    fn session_rating(&self, summary: &PerformanceSummary, laps: &LapAnalysis) -> SessionRating {
        let weighted = summary.overall_performance_score.0 * PERFORMANCE_WEIGHT
            + consistency_score(laps.consistency_index) * CONSISTENCY_WEIGHT;
        SessionRating {
            overall_rating: round1(weighted).into(),
            rating_breakdown: RatingBreakdown {
                performance_weight: PERFORMANCE_WEIGHT,
                consistency_weight: CONSISTENCY_WEIGHT,
                weighted_score: round1(weighted).into(),
            },
        }
    }
}

fn consistency_score(consistency_index: f64) -> f64 {
    (100.0 - consistency_index * 1000.0).max(0.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Format seconds as `MM:SS.mmm`; non-positive values render as zero.
pub fn format_lap_time(seconds: f64) -> String {
    if seconds <= 0.0 || !seconds.is_finite() {
        return "00:00.000".to_string();
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let remaining = seconds - minutes as f64 * 60.0;
    format!("{minutes:02}:{remaining:06.3}")
}

fn identify_strengths(
    laps: &LapAnalysis,
    telemetry: Option<&InputQualityAnalysis>,
) -> Vec<String> {
    let mut strengths = Vec::new();

    if laps.consistency_index <= 0.02 && laps.valid_laps > 0 {
        strengths.push("Excellent lap time consistency".to_string());
    }
    if laps.performance_window >= 80.0 {
        strengths.push("High percentage of laps within optimal window".to_string());
    }
    if laps.progression_trend > 0.05 {
        strengths.push("Strong improvement throughout session".to_string());
    }

    if let Some(telemetry) = telemetry {
        if telemetry.throttle_smoothness.is_some_and(|s| s < 0.05) {
            strengths.push("Smooth throttle application".to_string());
        }
        if telemetry.brake_smoothness.is_some_and(|s| s < 0.05) {
            strengths.push("Smooth braking technique".to_string());
        }
        if telemetry.steering_smoothness.is_some_and(|s| s < 0.1) {
            strengths.push("Precise steering inputs".to_string());
        }
    }

    if strengths.is_empty() {
        strengths.push("Completed session with valid data".to_string());
    }
    strengths
}

fn identify_improvement_areas(
    laps: &LapAnalysis,
    telemetry: Option<&InputQualityAnalysis>,
) -> Vec<String> {
    let mut improvements = Vec::new();

    if laps.consistency_index > 0.03 {
        improvements.push("Improve lap time consistency".to_string());
    }
    if laps.time_lost_to_theoretical > 0.5 {
        improvements.push("Reduce gap to theoretical best lap".to_string());
    }
    if laps.progression_trend < -0.05 {
        improvements.push("Maintain performance throughout session".to_string());
    }

    if let Some(telemetry) = telemetry {
        if telemetry.throttle_smoothness.is_some_and(|s| s > 0.1) {
            improvements.push("Smoothen throttle application".to_string());
        }
        if telemetry.brake_smoothness.is_some_and(|s| s > 0.1) {
            improvements.push("Refine braking technique for smoother transitions".to_string());
        }
        if telemetry.steering_smoothness.is_some_and(|s| s > 0.2) {
            improvements.push("Work on smoother steering inputs".to_string());
        }
    }
    improvements
}
