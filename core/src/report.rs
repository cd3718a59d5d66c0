//! Channel reporting — joins attribution weights with spend and exports CSV.

use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{
    error::PipelineResult,
    store::PipelineStore,
    types::{ChannelReportRow, DateRange},
};

pub const CSV_HEADER: &str = "channel_name,date,cost,ihc,ihc_revenue,CPO,ROAS";

/// Recompute the channel report for `range` and persist it, replacing any
/// previous run's rows.
pub fn generate_channel_reporting(
    store: &PipelineStore,
    range: &DateRange,
) -> PipelineResult<Vec<ChannelReportRow>> {
    let rows = store.channel_report(range)?;
    store.replace_channel_reporting(&rows)?;
    log::info!("generated channel reporting with {} rows", rows.len());
    Ok(rows)
}

/// Write the report as CSV. Undefined CPO/ROAS (zero divisor) render as
/// empty fields rather than failing the export.
pub fn write_csv<W: Write>(rows: &[ChannelReportRow], mut out: W) -> PipelineResult<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            csv_field(&row.channel_name),
            row.date.format("%Y-%m-%d"),
            row.cost,
            row.ihc,
            row.ihc_revenue,
            fmt_opt(row.cpo()),
            fmt_opt(row.roas()),
        )?;
    }
    Ok(())
}

/// Export the report under `output_dir` with a timestamped, range-suffixed
/// filename. Returns the path written.
pub fn export_channel_reporting(
    rows: &[ChannelReportRow],
    output_dir: &Path,
    range: &DateRange,
) -> PipelineResult<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("channel_report_{stamp}{}.csv", range.file_suffix()));
    let mut file = fs::File::create(&path)?;
    write_csv(rows, &mut file)?;
    log::info!("exported channel reporting to {}", path.display());
    Ok(path)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
