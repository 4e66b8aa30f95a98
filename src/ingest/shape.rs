// Table-shape detection strategies for irregular exports

use super::table::SessionTable;

/// The meaningful region of a table whose header position is not fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableRegion {
    /// Row carrying the header (sector names or channel names).
    pub header_row: usize,
    /// First row of actual data.
    pub data_start: usize,
}

/// Strategy for locating the header/data region inside a table that mixes
/// leading metadata rows with real data. Different exports need different
/// heuristics; extraction code stays the same.
pub trait TableShapeDetector {
    /// Locate the table region, or None when the table has no recognizable
    /// shape (the caller treats that as "no data", not an error).
    fn locate(&self, table: &SessionTable) -> Option<TableRegion>;
}

/// Keywords that mark the first sector row of a lap timing table.
pub const SECTOR_KEYWORDS: [&str; 3] = ["str", "sector", "turn"];

/// Detects the sector-name column of a lap timing table: the first row
/// whose leading cell contains a track-section keyword. Sector rows begin
/// on that same row.
pub struct SectorKeywordDetector;

impl TableShapeDetector for SectorKeywordDetector {
    fn locate(&self, table: &SessionTable) -> Option<TableRegion> {
        for (idx, row) in table.rows().iter().enumerate() {
            let Some(first) = row.first() else { continue };
            let lowered = first.to_lowercase();
            if !first.trim().is_empty()
                && SECTOR_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
            {
                return Some(TableRegion {
                    header_row: idx,
                    data_start: idx,
                });
            }
        }
        None
    }
}

/// Channel names expected in a driver-input table header, lowercased with
/// punctuation stripped.
pub const EXPECTED_CHANNELS: [&str; 4] = ["time", "throttle", "brake", "steeringangle"];

/// Detects the header row of a driver-input telemetry table: the first row
/// where at least half of the expected channel vocabulary appears as
/// substrings of the row's joined cell text. Data starts on the next row.
pub struct ChannelHeaderDetector;

impl TableShapeDetector for ChannelHeaderDetector {
    fn locate(&self, table: &SessionTable) -> Option<TableRegion> {
        for (idx, row) in table.rows().iter().enumerate() {
            let row_text = row.join(" ").to_lowercase();
            let matches = EXPECTED_CHANNELS
                .iter()
                .filter(|channel| row_text.contains(*channel))
                .count();
            if matches * 2 >= EXPECTED_CHANNELS.len() {
                return Some(TableRegion {
                    header_row: idx,
                    data_start: idx + 1,
                });
            }
        }
        None
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

    #[test]
    fn test_sector_detector_skips_metadata_rows() {
        let t = table(&[
            &["Time Report"],
            &["", "Lap 1", "Lap 2"],
            &["Str 1", "0:30.100", "0:30.300"],
            &["Turn 2", "0:15.000", "0:15.200"],
        ]);
        let region = SectorKeywordDetector.locate(&t).unwrap();
        assert_eq!(region.header_row, 2);
        assert_eq!(region.data_start, 2);
    }

    #[test]
    fn test_sector_detector_is_case_insensitive() {
        let t = table(&[&["SECTOR 1", "0:30.100"]]);
        assert!(SectorKeywordDetector.locate(&t).is_some());
    }

    #[test]
    fn test_sector_detector_none_when_no_keyword() {
        let t = table(&[&["header"], &["1.0", "2.0"]]);
        assert!(SectorKeywordDetector.locate(&t).is_none());
    }

    #[test]
    fn test_channel_detector_requires_half_the_vocabulary() {
        let t = table(&[
            &["\"Venue\",\"Somewhere\""],
            &["Time", "Throttle", "x", "y"],
            &["0.0", "0.5", "0.0", "0.0"],
        ]);
        // two of four expected channels is enough
        let region = ChannelHeaderDetector.locate(&t).unwrap();
        assert_eq!(region.header_row, 1);
        assert_eq!(region.data_start, 2);
    }

    #[test]
    fn test_channel_detector_none_for_unrelated_table() {
        let t = table(&[&["fuel", "lap"], &["2.2", "1"]]);
        assert!(ChannelHeaderDetector.locate(&t).is_none());
    }
}
