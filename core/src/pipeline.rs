//! Pipeline orchestration.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Load sessions and conversions (date-range filtered)
//!   2. Build customer journeys
//!   3. Score journeys against the attribution service
//!   4. Upsert attribution weights
//!   5. Generate channel reporting
//!   6. Export the CSV report
//!
//! Each stage completes before the next begins; any failure aborts the
//! run. Weights persisted by earlier batches are left in place — batches
//! are not transactionally linked.

use std::path::{Path, PathBuf};

use crate::{
    attribution::Scorer,
    config::PipelineConfig,
    error::PipelineResult,
    journey::build_journeys,
    report::{export_channel_reporting, generate_channel_reporting},
    store::PipelineStore,
};

/// Counters reported after a successful run.
#[derive(Debug)]
pub struct RunSummary {
    pub sessions: usize,
    pub conversions: usize,
    pub journeys: usize,
    pub weights: usize,
    pub report_rows: usize,
    pub report_path: PathBuf,
}

/// Run the full pipeline against an open, migrated store.
pub fn run(
    store: &PipelineStore,
    scorer: &dyn Scorer,
    config: &PipelineConfig,
    output_dir: &Path,
) -> PipelineResult<RunSummary> {
    let range = &config.range;

    log::info!("loading input data{}", range.label());
    let sessions = store.sessions(range)?;
    let conversions = store.conversions(range)?;
    log::info!(
        "loaded {} sessions and {} conversions",
        sessions.len(),
        conversions.len()
    );

    let journeys = build_journeys(&sessions, &conversions, config.include_empty_journeys);
    let journey_list: Vec<_> = journeys.into_values().collect();

    let weights = scorer.score(&journey_list)?;

    let saved = store.upsert_attribution(&weights)?;
    log::info!("saved {saved} attribution weights");

    let rows = generate_channel_reporting(store, range)?;
    let report_path = export_channel_reporting(&rows, output_dir, range)?;

    Ok(RunSummary {
        sessions: sessions.len(),
        conversions: conversions.len(),
        journeys: journey_list.len(),
        weights: saved,
        report_rows: rows.len(),
        report_path,
    })
}
