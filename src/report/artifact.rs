use crate::model::ReportRow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const HEADER: &str = "store_id,uptime_last_hour,uptime_last_day,uptime_last_week,downtime_last_hour,downtime_last_day,downtime_last_week";

pub fn artifact_path(output_dir: &Path, report_id: &str) -> PathBuf {
    output_dir.join(format!("{report_id}.csv"))
}

pub fn render(rows: &[ReportRow]) -> String {
    let mut out = String::with_capacity(HEADER.len() + 1 + rows.len() * 64);
    out.push_str(HEADER);
    out.push('\n');
    for row in rows {
        let s = &row.summary;
        out.push_str(&escape_field(&row.store_id));
        for value in [
            s.uptime_last_hour,
            s.uptime_last_day,
            s.uptime_last_week,
            s.downtime_last_hour,
            s.downtime_last_day,
            s.downtime_last_week,
        ] {
            out.push(',');
            out.push_str(&format!("{value:.2}"));
        }
        out.push('\n');
    }
    out
}

/// Write the artifact under a temporary name and rename it into place, so a
/// failed write never leaves a file at `path`.
pub fn write_artifact(path: &Path, rows: &[ReportRow]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("csv.partial");
    let result = fs::write(&staging, render(rows)).and_then(|()| fs::rename(&staging, path));
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
