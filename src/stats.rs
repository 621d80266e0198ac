//! Grid statistics parsing.
//!
//! OUTPUT_STATS prints a report whose table starts at the "Earth Radius" line.
//! The block from that line on is stripped of thousands separators and the
//! first three lines are treated as header.

use serde::Serialize;
use tracing::warn;

pub const EARTH_RADIUS_MARKER: &str = "Earth Radius";
const HEADER_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum StatsTable {
    /// One row per resolution, columns as printed by the engine.
    Parsed(Vec<Vec<f64>>),
    /// Stripped report lines, kept when the table did not parse.
    Raw(Vec<String>),
}

impl StatsTable {
    pub fn rows(&self) -> Option<&[Vec<f64>]> {
        match self {
            StatsTable::Parsed(rows) => Some(rows),
            StatsTable::Raw(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridStats {
    pub earth_radius_info: String,
    pub stats_output: StatsTable,
}

/// Extract the statistics table from a captured engine log.
pub fn parse_grid_stats(log: &str) -> GridStats {
    let mut earth_radius_info = String::new();
    let mut block = vec![];

    for line in log.lines() {
        if earth_radius_info.is_empty() && line.contains(EARTH_RADIUS_MARKER) {
            earth_radius_info = strip(line);
        }
        if !earth_radius_info.is_empty() {
            block.push(strip(line));
        }
    }

    let stats_output = match parse_table(&block) {
        Some(rows) => StatsTable::Parsed(rows),
        None => {
            warn!(lines = block.len(), "stats table did not parse, keeping raw lines");
            StatsTable::Raw(block)
        }
    };

    GridStats { earth_radius_info, stats_output }
}

fn strip(line: &str) -> String {
    line.trim().replace(',', "")
}

/// Numeric rows after the header. Non-numeric lines ahead of the first row
/// are header remnants; anything non-numeric after it, or a ragged row,
/// fails the whole table.
fn parse_table(block: &[String]) -> Option<Vec<Vec<f64>>> {
    let mut rows: Vec<Vec<f64>> = vec![];
    for line in block.iter().skip(HEADER_LINES).filter(|l| !l.is_empty()) {
        let parsed: Result<Vec<f64>, _> = line.split_whitespace().map(str::parse::<f64>).collect();
        match parsed {
            Ok(row) => {
                if let Some(first) = rows.first() {
                    if first.len() != row.len() {
                        return None;
                    }
                }
                rows.push(row);
            }
            Err(_) if rows.is_empty() => continue,
            Err(_) => return None,
        }
    }
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
** executing DGGRID version 7.8 **
type: ISEA3H
Earth Radius: 6,371.0071809184608

Res           # Cells        Area (km^2)       CLS (km)
  0                12   42,505,468.34962   7,356.31117
  1                32   15,939,550.63111   4,505.01834
  2                92    5,544,191.52386   2,657.52818
";

    #[test]
    fn test_parses_engine_report() {
        let stats = parse_grid_stats(REPORT);
        assert_eq!(stats.earth_radius_info, "Earth Radius: 6371.0071809184608");
        let rows = stats.stats_output.rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec![1.0, 32.0, 15939550.63111, 4505.01834]);
    }

    #[test]
    fn test_no_marker_yields_empty_table() {
        let stats = parse_grid_stats("nothing to see\nhere");
        assert_eq!(stats.earth_radius_info, "");
        assert_eq!(stats.stats_output, StatsTable::Parsed(vec![]));
    }

    #[test]
    fn test_trailing_text_degrades_to_raw() {
        let log = format!("{}complete\n", REPORT);
        let stats = parse_grid_stats(&log);
        match stats.stats_output {
            StatsTable::Raw(lines) => {
                assert_eq!(lines[0], "Earth Radius: 6371.0071809184608");
                assert_eq!(lines.last().map(String::as_str), Some("complete"));
            }
            other => panic!("expected raw lines, got {:?}", other),
        }
    }
}
