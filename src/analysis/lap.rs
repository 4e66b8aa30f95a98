// Lap-time performance analysis over ingested lap records

use log::info;
use serde::Serialize;

use super::{mean, median, sample_std};
use crate::ingest::{LapRecord, LapSheet, SectorSplit};

/// Outlier band around the median total lap time. Laps outside the band are
/// in/out laps or incidents, not representative pace.
const OUTLIER_LOWER_FACTOR: f64 = 0.5;
const OUTLIER_UPPER_FACTOR: f64 = 3.0;

/// Laps needed before the first/last-3 sector improvement figure means
/// anything.
const IMPROVEMENT_MIN_LAPS: usize = 6;

/// Fraction over the best lap that still counts as "in the window".
const PERFORMANCE_WINDOW_FACTOR: f64 = 1.01;

/// Per-sector performance metrics across the cleaned laps.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SectorAnalysis {
    pub name: String,
    pub best_time: f64,
    pub average_time: f64,
    pub std_dev: f64,
    /// std_dev / average_time; lower is more repeatable.
    pub consistency: f64,
    /// mean(first 3 samples) - mean(last 3 samples); positive means the
    /// later laps were faster. 0 when the sector has fewer than 6 laps.
    pub improvement: f64,
}

/// The fastest lap's identity and splits.
#[derive(Clone, Debug, Serialize)]
pub struct FastestLapDetail {
    pub lap_number: u32,
    pub total_time: f64,
    pub sectors: Vec<SectorSplit>,
}

/// The fastest lap's gap to the best-ever time of one sector.
#[derive(Clone, Debug, Serialize)]
pub struct SectorGap {
    pub name: String,
    pub actual_time: f64,
    pub best_possible: f64,
    pub time_lost: f64,
    pub percentage_lost: f64,
}

/// Everything the lap analyzer derives from one session's laps. A session
/// with no usable laps produces the zeroed default rather than an error.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LapAnalysis {
    pub best_lap_time: f64,
    pub average_lap_time: f64,
    pub lap_time_std: f64,
    /// lap_time_std / average_lap_time; 0 when the average is 0.
    pub consistency_index: f64,
    /// Sum of each sector's best time; a lower bound no single lap can beat.
    pub theoretical_best: f64,
    pub time_lost_to_theoretical: f64,
    pub valid_laps: usize,
    pub outliers_removed: usize,
    pub sector_analysis: Vec<SectorAnalysis>,
    pub lap_progression: Vec<f64>,
    /// Mean of the sliding-window progression deltas; positive means the
    /// driver got faster over the session.
    pub progression_trend: f64,
    /// Percentage of laps within 1% of the best lap.
    pub performance_window: f64,
    pub fastest_lap: Option<FastestLapDetail>,
    pub sector_gaps: Vec<SectorGap>,
}

/// Cleans a session's lap records and derives the lap-level performance
/// metrics. Cleaning happens on construction; `analyze` is pure over the
/// retained laps.
pub struct LapPerformanceAnalyzer {
    sector_names: Vec<String>,
    laps: Vec<LapRecord>,
    outliers_removed: usize,
}

impl LapPerformanceAnalyzer {
    /// Drop laps without a total time, then drop obvious outliers (outside
    /// [0.5x, 3.0x] of the median) when more than three laps remain.
    pub fn new(sheet: &LapSheet) -> Self {
        let mut laps: Vec<LapRecord> = sheet
            .laps
            .iter()
            .filter(|lap| lap.total_lap_time.is_some())
            .cloned()
            .collect();

        let mut outliers_removed = 0;
        if laps.len() > 3 {
            let totals: Vec<f64> = laps.iter().filter_map(|lap| lap.total_lap_time).collect();
            let median_time = median(&totals);
            let lower = median_time * OUTLIER_LOWER_FACTOR;
            let upper = median_time * OUTLIER_UPPER_FACTOR;

            let before = laps.len();
            laps.retain(|lap| {
                lap.total_lap_time
                    .is_some_and(|total| total >= lower && total <= upper)
            });
            outliers_removed = before - laps.len();
            if outliers_removed > 0 {
                info!(
                    "removed {outliers_removed} outlier laps from session {}",
                    sheet.session_id
                );
            }
        }

        Self {
            sector_names: sheet.sector_names.clone(),
            laps,
            outliers_removed,
        }
    }

    pub fn analyze(&self) -> LapAnalysis {
        if self.laps.is_empty() {
            return LapAnalysis {
                outliers_removed: self.outliers_removed,
                ..Default::default()
            };
        }

        let totals: Vec<f64> = self
            .laps
            .iter()
            .filter_map(|lap| lap.total_lap_time)
            .collect();

        let best_lap_time = totals.iter().copied().fold(f64::INFINITY, f64::min);
        let average_lap_time = mean(&totals);
        let lap_time_std = sample_std(&totals);
        let consistency_index = if average_lap_time > 0.0 {
            lap_time_std / average_lap_time
        } else {
            0.0
        };

        let theoretical_best = self.theoretical_best();
        let time_lost_to_theoretical = if theoretical_best > 0.0 {
            best_lap_time - theoretical_best
        } else {
            0.0
        };

        let lap_progression = self.progression(&totals);
        let progression_trend = mean(&lap_progression);

        LapAnalysis {
            best_lap_time,
            average_lap_time,
            lap_time_std,
            consistency_index,
            theoretical_best,
            time_lost_to_theoretical,
            valid_laps: totals.len(),
            outliers_removed: self.outliers_removed,
            sector_analysis: self.analyze_sectors(),
            lap_progression,
            progression_trend,
            performance_window: performance_window(&totals, best_lap_time),
            fastest_lap: self.fastest_lap(),
            sector_gaps: self.sector_gaps(),
        }
    }

    /// Sum of each sector's best time over sectors that recorded at least
    /// one value; 0 when no sector did.
    fn theoretical_best(&self) -> f64 {
        self.sector_names
            .iter()
            .filter_map(|name| {
                self.sector_times(name)
                    .into_iter()
                    .reduce(f64::min)
            })
            .sum()
    }

    fn analyze_sectors(&self) -> Vec<SectorAnalysis> {
        self.sector_names
            .iter()
            .filter_map(|name| {
                let times = self.sector_times(name);
                if times.is_empty() {
                    return None;
                }
                let average_time = mean(&times);
                let std_dev = sample_std(&times);
                Some(SectorAnalysis {
                    name: name.clone(),
                    best_time: times.iter().copied().fold(f64::INFINITY, f64::min),
                    average_time,
                    std_dev,
                    consistency: if average_time > 0.0 {
                        std_dev / average_time
                    } else {
                        0.0
                    },
                    improvement: sector_improvement(&times),
                })
            })
            .collect()
    }

    /// Sliding-window pace progression: each delta is the previous window's
    /// mean minus the current window's mean, so positive means improvement.
    fn progression(&self, totals: &[f64]) -> Vec<f64> {
        if totals.len() < 2 {
            return Vec::new();
        }
        let window = 3.min(totals.len() / 2).max(1);

        let mut progression = Vec::new();
        for i in window..totals.len() {
            let current = &totals[i - window..i];
            let previous = &totals[i.saturating_sub(2 * window)..i - window];
            if previous.is_empty() {
                continue;
            }
            progression.push(mean(previous) - mean(current));
        }
        progression
    }

    fn fastest_lap(&self) -> Option<FastestLapDetail> {
        let mut fastest: Option<(&LapRecord, f64)> = None;
        for lap in &self.laps {
            let Some(total) = lap.total_lap_time else {
                continue;
            };
            // first occurrence wins on exact ties
            if fastest.is_none_or(|(_, best)| total < best) {
                fastest = Some((lap, total));
            }
        }
        fastest.map(|(lap, total)| FastestLapDetail {
            lap_number: lap.lap_number,
            total_time: total,
            sectors: lap.sectors.clone(),
        })
    }

    /// Compare the fastest lap's splits against each sector's best-ever
    /// time, the per-sector breakdown behind time_lost_to_theoretical.
    fn sector_gaps(&self) -> Vec<SectorGap> {
        let Some(fastest) = self.fastest_lap() else {
            return Vec::new();
        };
        fastest
            .sectors
            .iter()
            .filter_map(|split| {
                let actual_time = split.seconds?;
                let best_possible = self
                    .sector_times(&split.name)
                    .into_iter()
                    .reduce(f64::min)?;
                let time_lost = actual_time - best_possible;
                Some(SectorGap {
                    name: split.name.clone(),
                    actual_time,
                    best_possible,
                    time_lost,
                    percentage_lost: if best_possible > 0.0 {
                        time_lost / best_possible * 100.0
                    } else {
                        0.0
                    },
                })
            })
            .collect()
    }

    fn sector_times(&self, name: &str) -> Vec<f64> {
        self.laps
            .iter()
            .filter_map(|lap| lap.sector_time(name))
            .collect()
    }
}

fn sector_improvement(times: &[f64]) -> f64 {
    if times.len() < IMPROVEMENT_MIN_LAPS {
        return 0.0;
    }
    mean(&times[..3]) - mean(&times[times.len() - 3..])
}

fn performance_window(totals: &[f64], best: f64) -> f64 {
    if best <= 0.0 || totals.is_empty() {
        return 0.0;
    }
    let threshold = best * PERFORMANCE_WINDOW_FACTOR;
    let in_window = totals.iter().filter(|total| **total <= threshold).count();
    in_window as f64 / totals.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Build a sheet from per-lap sector splits; None splits leave the
    /// total null exactly as ingestion would.
    fn sheet(sector_names: &[&str], laps: &[&[Option<f64>]]) -> LapSheet {
        let records = laps
            .iter()
            .enumerate()
            .map(|(idx, splits)| {
                let sectors: Vec<SectorSplit> = sector_names
                    .iter()
                    .zip(splits.iter())
                    .map(|(name, seconds)| SectorSplit {
                        name: name.to_string(),
                        seconds: *seconds,
                    })
                    .collect();
                let total_lap_time = sectors.iter().map(|s| s.seconds).sum::<Option<f64>>();
                LapRecord {
                    lap_number: idx as u32 + 1,
                    session_id: "S1".to_string(),
                    sectors,
                    total_lap_time,
                }
            })
            .collect();
        LapSheet {
            session_id: "S1".to_string(),
            sector_names: sector_names.iter().map(|n| n.to_string()).collect(),
            laps: records,
        }
    }

    fn single_sector_sheet(totals: &[f64]) -> LapSheet {
        let laps: Vec<Vec<Option<f64>>> = totals.iter().map(|t| vec![Some(*t)]).collect();
        let refs: Vec<&[Option<f64>]> = laps.iter().map(Vec::as_slice).collect();
        sheet(&["Full"], &refs)
    }

    #[test]
    fn test_outlier_lap_is_removed() {
        let analysis =
            LapPerformanceAnalyzer::new(&single_sector_sheet(&[90.0, 91.0, 89.5, 95.0, 90.2, 902.0]))
                .analyze();
        assert_eq!(analysis.outliers_removed, 1);
        assert_eq!(analysis.valid_laps, 5);
        assert_eq!(analysis.best_lap_time, 89.5);
    }

    #[test]
    fn test_no_outliers_in_tight_session() {
        // median 90.2, bounds [45.1, 270.6]
        let analysis =
            LapPerformanceAnalyzer::new(&single_sector_sheet(&[90.0, 91.0, 89.5, 95.0, 90.2]))
                .analyze();
        assert_eq!(analysis.outliers_removed, 0);
        assert_eq!(analysis.valid_laps, 5);
        assert_eq!(analysis.best_lap_time, 89.5);
    }

    #[test]
    fn test_identical_laps_have_zero_consistency_index() {
        let analysis =
            LapPerformanceAnalyzer::new(&single_sector_sheet(&[90.0, 90.0, 90.0, 90.0])).analyze();
        assert_eq!(analysis.consistency_index, 0.0);
        assert_eq!(analysis.performance_window, 100.0);
    }

    #[test]
    fn test_theoretical_best_sums_sector_minima() {
        let s = sheet(
            &["A", "B"],
            &[
                &[Some(30.0), Some(60.0)],
                &[Some(31.0), Some(61.0)],
                &[Some(29.0), Some(59.0)],
            ],
        );
        let analysis = LapPerformanceAnalyzer::new(&s).analyze();
        assert!((analysis.theoretical_best - 88.0).abs() < 1e-9);
        assert!((analysis.best_lap_time - 88.0) >= 0.0);
        assert!(
            (analysis.time_lost_to_theoretical
                - (analysis.best_lap_time - analysis.theoretical_best))
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn test_null_total_laps_are_dropped() {
        let s = sheet(
            &["A", "B"],
            &[
                &[Some(30.0), Some(60.0)],
                &[Some(31.0), None],
                &[Some(29.0), Some(59.0)],
            ],
        );
        let analysis = LapPerformanceAnalyzer::new(&s).analyze();
        assert_eq!(analysis.valid_laps, 2);
        // sector series come from the retained laps only
        assert!((analysis.theoretical_best - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_sector_improvement_needs_six_laps() {
        let short = sheet(
            &["A"],
            &[&[Some(30.0)], &[Some(29.0)], &[Some(28.0)], &[Some(27.0)]],
        );
        let analysis = LapPerformanceAnalyzer::new(&short).analyze();
        assert_eq!(analysis.sector_analysis[0].improvement, 0.0);

        let long = single_sector_sheet(&[30.0, 30.0, 30.0, 29.0, 29.0, 29.0]);
        let analysis = LapPerformanceAnalyzer::new(&long).analyze();
        assert!((analysis.sector_analysis[0].improvement - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_progression_trend_positive_when_getting_faster() {
        let analysis = LapPerformanceAnalyzer::new(&single_sector_sheet(&[
            92.0, 91.5, 91.0, 90.5, 90.0, 89.5, 89.0, 88.5,
        ]))
        .analyze();
        assert!(!analysis.lap_progression.is_empty());
        assert!(analysis.progression_trend > 0.0);
    }

    #[test]
    fn test_degenerate_progression_is_empty() {
        let analysis = LapPerformanceAnalyzer::new(&single_sector_sheet(&[90.0])).analyze();
        assert!(analysis.lap_progression.is_empty());
        assert_eq!(analysis.progression_trend, 0.0);
    }

    #[test]
    fn test_empty_sheet_yields_zeroed_analysis() {
        let analysis = LapPerformanceAnalyzer::new(&LapSheet::empty("S1")).analyze();
        assert_eq!(analysis.valid_laps, 0);
        assert_eq!(analysis.best_lap_time, 0.0);
        assert!(analysis.sector_analysis.is_empty());
        assert!(analysis.fastest_lap.is_none());
    }

    #[test]
    fn test_fastest_lap_detail_and_sector_gaps() {
        let s = sheet(
            &["A", "B"],
            &[
                &[Some(30.0), Some(59.0)],
                &[Some(29.0), Some(61.0)],
                &[Some(29.5), Some(59.5)],
            ],
        );
        let analysis = LapPerformanceAnalyzer::new(&s).analyze();
        let fastest = analysis.fastest_lap.unwrap();
        // laps 1 and 3 tie on 89.0; the earlier one wins
        assert_eq!(fastest.lap_number, 1);
        assert!((fastest.total_time - 89.0).abs() < 1e-9);

        let gap_a = analysis.sector_gaps.iter().find(|g| g.name == "A").unwrap();
        assert!((gap_a.time_lost - 1.0).abs() < 1e-9);
        let gap_b = analysis.sector_gaps.iter().find(|g| g.name == "B").unwrap();
        assert!(gap_b.time_lost.abs() < 1e-9);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_theoretical_best_never_beats_best_lap(
            rows in proptest::collection::vec(
                (10.0f64..100.0, 10.0f64..100.0, 10.0f64..100.0),
                1..20,
            )
        ) {
            let laps: Vec<Vec<Option<f64>>> = rows
                .iter()
                .map(|(a, b, c)| vec![Some(*a), Some(*b), Some(*c)])
                .collect();
            let refs: Vec<&[Option<f64>]> = laps.iter().map(Vec::as_slice).collect();
            let analysis = LapPerformanceAnalyzer::new(&sheet(&["A", "B", "C"], &refs)).analyze();
            if analysis.valid_laps > 0 {
                prop_assert!(analysis.theoretical_best <= analysis.best_lap_time + 1e-9);
            }
        }

        #[test]
        fn prop_total_is_exact_sector_sum(
            rows in proptest::collection::vec(
                (10.0f64..100.0, 10.0f64..100.0),
                1..20,
            )
        ) {
            let laps: Vec<Vec<Option<f64>>> =
                rows.iter().map(|(a, b)| vec![Some(*a), Some(*b)]).collect();
            let refs: Vec<&[Option<f64>]> = laps.iter().map(Vec::as_slice).collect();
            let s = sheet(&["A", "B"], &refs);
            for lap in &s.laps {
                let sum: f64 = lap.sectors.iter().filter_map(|split| split.seconds).sum();
                prop_assert!((lap.total_lap_time.unwrap() - sum).abs() < 1e-9);
            }
        }
    }
}
