//! Shared domain types used across the entire pipeline.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{PipelineError, PipelineResult};

/// A stable, unique identifier for a tracked session.
pub type SessionId = String;

/// A stable, unique identifier for a conversion event.
pub type ConversionId = String;

/// A stable, unique identifier for a customer.
pub type CustomerId = String;

/// One tracked marketing touchpoint. Read-only input for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: SessionId,
    pub customer_id: CustomerId,
    pub channel: String,
    pub timestamp: NaiveDateTime,
    /// Spend associated with this session, 0 when no cost row exists.
    pub cost: f64,
    pub holder_engagement: bool,
    pub closer_engagement: bool,
    pub impression_interaction: bool,
}

/// One conversion event. Read-only input for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub conversion_id: ConversionId,
    pub customer_id: CustomerId,
    pub timestamp: NaiveDateTime,
    pub revenue: f64,
}

/// Ordered list of one customer's sessions preceding one conversion.
///
/// Invariant: sessions are sorted ascending by timestamp and every
/// session's timestamp is <= the conversion's timestamp.
#[derive(Debug, Clone)]
pub struct Journey {
    pub conversion: Conversion,
    pub sessions: Vec<Session>,
}

/// Fractional attribution credit assigned by the scoring service to one
/// session within one journey. Persisted once per (conversion, session).
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionResult {
    pub conversion_id: ConversionId,
    pub session_id: SessionId,
    pub ihc: f64,
}

/// One (channel, date) group of the channel report. Recomputed fresh on
/// every run, never updated incrementally.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReportRow {
    pub channel_name: String,
    pub date: NaiveDate,
    pub cost: f64,
    pub ihc: f64,
    pub ihc_revenue: f64,
}

impl ChannelReportRow {
    /// Cost per order: cost divided by summed attribution weight.
    /// None when no weight was attributed (rendered as an empty field).
    pub fn cpo(&self) -> Option<f64> {
        (self.ihc > 0.0).then(|| self.cost / self.ihc)
    }

    /// Return on ad spend: attributed revenue divided by cost.
    /// None when the group carried no spend.
    pub fn roas(&self) -> Option<f64> {
        (self.cost > 0.0).then(|| self.ihc_revenue / self.cost)
    }
}

/// Optional inclusive [start, end] filter applied to session and
/// conversion dates.
#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Build a range, rejecting start > end before any I/O happens.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> PipelineResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(PipelineError::Usage(format!(
                    "start date {s} is after end date {e}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Human-readable label for log lines, empty when unbounded.
    pub fn label(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!(" (date range: {s} to {e})"),
            (Some(s), None) => format!(" (from {s})"),
            (None, Some(e)) => format!(" (to {e})"),
            (None, None) => String::new(),
        }
    }

    /// Suffix for report filenames, e.g. "_2023-09-01_to_2023-09-30".
    pub fn file_suffix(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!("_{s}_to_{e}"),
            (Some(s), None) => format!("_from_{s}"),
            (None, Some(e)) => format!("_to_{e}"),
            (None, None) => String::new(),
        }
    }
}
