// Lap/sector timing extraction from exported track-section reports

use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::shape::{SectorKeywordDetector, TableShapeDetector};
use super::table::SessionTable;

/// Trailing columns of a lap timing table reserved for per-sector metadata
/// (best/average/theoretical columns), never lap times.
const TRAILING_METADATA_COLUMNS: usize = 3;

static LAP_TIME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}\.\d{3}$").unwrap());

/// One sector of one lap.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SectorSplit {
    pub name: String,
    /// Sector time in seconds, None when the export had no parseable value.
    pub seconds: Option<f64>,
}

/// One ingested lap. Never mutated after creation; later stages filter lap
/// sequences rather than editing records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LapRecord {
    pub lap_number: u32,
    pub session_id: String,
    pub sectors: Vec<SectorSplit>,
    /// Exact sum of the sector times when every sector is present,
    /// otherwise None.
    pub total_lap_time: Option<f64>,
}

impl LapRecord {
    pub fn sector_time(&self, name: &str) -> Option<f64> {
        self.sectors
            .iter()
            .find(|split| split.name == name)
            .and_then(|split| split.seconds)
    }
}

/// All laps of a session in lap order, with the session's sector names.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LapSheet {
    pub session_id: String,
    pub sector_names: Vec<String>,
    pub laps: Vec<LapRecord>,
}

impl LapSheet {
    pub fn empty(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    /// Per-sector series of times across all laps, in lap order.
    pub fn sector_series(&self, name: &str) -> Vec<Option<f64>> {
        self.laps
            .iter()
            .map(|lap| lap.sector_time(name))
            .collect()
    }
}

/// Parse a single lap-time token: `M:SS.mmm` (one or two minute digits) or
/// a bare decimal number of seconds. Anything else is None.
pub fn parse_time_token(token: &str) -> Option<f64> {
    let token = token.trim();
    if LAP_TIME_TOKEN.is_match(token) {
        let (minutes, seconds) = token.split_once(':')?;
        let minutes: f64 = minutes.parse().ok()?;
        let seconds: f64 = seconds.parse().ok()?;
        return Some(minutes * 60.0 + seconds);
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Extract the lap sheet from a raw track-sections table using the default
/// sector-keyword shape detector.
pub fn extract_lap_sheet(table: &SessionTable, session_id: &str) -> LapSheet {
    extract_lap_sheet_with(&SectorKeywordDetector, table, session_id)
}

/// Extract the lap sheet using a caller-provided shape detector.
///
/// From the detected region onward, every row with a non-empty first cell
/// is one sector; its cells (excluding the trailing metadata columns) are
/// lap-time tokens. Sectors pivot into lap-indexed records. An undetectable
/// shape yields an empty sheet, not an error.
pub fn extract_lap_sheet_with(
    detector: &dyn TableShapeDetector,
    table: &SessionTable,
    session_id: &str,
) -> LapSheet {
    let Some(region) = detector.locate(table) else {
        warn!("could not find sector rows in lap timing table for {session_id}");
        return LapSheet::empty(session_id);
    };

    let width = table.width();
    let last_lap_col = width.saturating_sub(TRAILING_METADATA_COLUMNS);

    let mut sector_names = Vec::new();
    let mut sector_times: Vec<Vec<Option<f64>>> = Vec::new();

    for row in &table.rows()[region.data_start..] {
        let Some(name) = row.first().map(|cell| cell.trim()) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let times: Vec<Option<f64>> = (1..last_lap_col)
            .map(|col| row.get(col).and_then(|cell| parse_time_token(cell)))
            .collect();
        sector_names.push(name.to_string());
        sector_times.push(times);
    }

    if sector_names.is_empty() {
        return LapSheet::empty(session_id);
    }

    let lap_count = sector_times.iter().map(Vec::len).max().unwrap_or(0);
    let laps = (0..lap_count)
        .map(|lap_idx| {
            let sectors: Vec<SectorSplit> = sector_names
                .iter()
                .zip(&sector_times)
                .map(|(name, times)| SectorSplit {
                    name: name.clone(),
                    seconds: times.get(lap_idx).copied().flatten(),
                })
                .collect();
            let total_lap_time = sectors
                .iter()
                .map(|split| split.seconds)
                .sum::<Option<f64>>();
            LapRecord {
                lap_number: lap_idx as u32 + 1,
                session_id: session_id.to_string(),
                sectors,
                total_lap_time,
            }
        })
        .collect();

    LapSheet {
        session_id: session_id.to_string(),
        sector_names,
        laps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> SessionTable {
        SessionTable::new(
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        )
    }

    fn timing_table() -> SessionTable {
        // two metadata rows, two sectors, three laps, three trailing columns
        table(&[
            &["Time Report - Track Sections"],
            &["", "Lap 1", "Lap 2", "Lap 3", "Best", "Avg", "Theor"],
            &["Str 1", "0:30.000", "0:31.000", "0:29.000", "0:29.000", "0:30.000", "x"],
            &["Turn 2", "1:00.000", "1:01.000", "0:59.000", "0:59.000", "1:00.000", "x"],
        ])
    }

    #[test]
    fn test_parse_time_token_formats() {
        assert_eq!(parse_time_token("1:30.500"), Some(90.5));
        assert_eq!(parse_time_token("12:05.250"), Some(725.25));
        assert_eq!(parse_time_token("29.125"), Some(29.125));
        assert_eq!(parse_time_token(" 0:45.000 "), Some(45.0));
        assert_eq!(parse_time_token("abc"), None);
        assert_eq!(parse_time_token(""), None);
        assert_eq!(parse_time_token("1:2.3"), None);
    }

    #[test]
    fn test_extracts_laps_and_excludes_trailing_columns() {
        let sheet = extract_lap_sheet(&timing_table(), "S1");
        assert_eq!(sheet.sector_names, vec!["Str 1", "Turn 2"]);
        assert_eq!(sheet.laps.len(), 3);
        assert_eq!(sheet.laps[0].lap_number, 1);
        assert_eq!(sheet.laps[0].sector_time("Str 1"), Some(30.0));
        assert_eq!(sheet.laps[2].sector_time("Turn 2"), Some(59.0));
    }

    #[test]
    fn test_total_is_exact_sector_sum() {
        let sheet = extract_lap_sheet(&timing_table(), "S1");
        for lap in &sheet.laps {
            let sum: f64 = lap.sectors.iter().filter_map(|s| s.seconds).sum();
            let total = lap.total_lap_time.unwrap();
            assert!((total - sum).abs() < 1e-9);
        }
        assert_eq!(sheet.laps[0].total_lap_time, Some(90.0));
    }

    #[test]
    fn test_unparseable_token_yields_null_total() {
        let t = table(&[
            &["Str 1", "0:30.000", "bad", "b", "a", "t"],
            &["Turn 2", "1:00.000", "1:01.000", "b", "a", "t"],
        ]);
        let sheet = extract_lap_sheet(&t, "S1");
        assert_eq!(sheet.laps.len(), 2);
        assert_eq!(sheet.laps[0].total_lap_time, Some(90.0));
        assert_eq!(sheet.laps[1].sector_time("Str 1"), None);
        assert_eq!(sheet.laps[1].total_lap_time, None);
    }

    #[test]
    fn test_no_sector_rows_yields_empty_sheet() {
        let t = table(&[&["metadata only"], &["1.0", "2.0"]]);
        let sheet = extract_lap_sheet(&t, "S1");
        assert!(sheet.is_empty());
        assert_eq!(sheet.session_id, "S1");
    }

    #[test]
    fn test_sector_series_follows_lap_order() {
        let sheet = extract_lap_sheet(&timing_table(), "S1");
        assert_eq!(
            sheet.sector_series("Str 1"),
            vec![Some(30.0), Some(31.0), Some(29.0)]
        );
        assert_eq!(sheet.sector_series("missing"), vec![None, None, None]);
    }
}
