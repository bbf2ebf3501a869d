//! # Terminal Rendering
//!
//! Renders entity snapshots as an aligned text table for `--once` runs:
//!
//! ```text
//! ENTITY                 NAME              STATE       READING (UTC)     LAT        LONG
//! ukenv_fs_E70024_mASD   Romsey            0.875 m     2024-05-01 10:15  50.98644   -1.50221
//! ukenv_fs_E70024_mAOD   Romsey Sea Level  14.125 m    2024-05-01 10:15  50.98644   -1.50221
//! ```

use crate::sensor::SensorSnapshot;

const HEADERS: [&str; 6] = ["ENTITY", "NAME", "STATE", "READING (UTC)", "LAT", "LONG"];

/// Format a state value, or `unavailable` when the entity has none.
fn format_state(snapshot: &SensorSnapshot) -> String {
    match snapshot.state {
        Some(value) if snapshot.available => {
            format!("{:.3} {}", value, snapshot.unit_of_measurement)
        }
        // Stale value from an earlier cycle
        Some(value) => format!("{:.3} {} (stale)", value, snapshot.unit_of_measurement),
        None => "unavailable".to_string(),
    }
}

fn format_attribute(snapshot: &SensorSnapshot, key: &str) -> String {
    snapshot
        .attributes
        .get(key)
        .map(|v| format!("{:.5}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn row(snapshot: &SensorSnapshot) -> [String; 6] {
    [
        snapshot.unique_id.clone(),
        snapshot.name.clone(),
        format_state(snapshot),
        snapshot
            .last_reading
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string()),
        format_attribute(snapshot, "latitude"),
        format_attribute(snapshot, "longitude"),
    ]
}

/// Render snapshots as a table with one header line and one line per entity.
pub fn render_table(snapshots: &[SensorSnapshot]) -> String {
    let rows: Vec<[String; 6]> = snapshots.iter().map(row).collect();

    let mut widths = HEADERS.map(str::len);
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: &[&str]| {
        let line = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ");
        line.trim_end().to_string()
    };

    let mut out = format_line(&HEADERS[..]);
    out.push('\n');
    for cells in &rows {
        let refs: Vec<&str> = cells.iter().map(String::as_str).collect();
        out.push_str(&format_line(&refs[..]));
        out.push('\n');
    }
    out
}

/// Print snapshots to stdout as a table.
pub fn draw_ascii(snapshots: &[SensorSnapshot]) {
    print!("{}", render_table(snapshots));
}
