//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Pipeline stages call store methods — they never execute SQL directly.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::{
    error::PipelineResult,
    types::{AttributionResult, ChannelReportRow, Conversion, DateRange, Session},
};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub struct PipelineStore {
    conn: Connection,
}

impl PipelineStore {
    /// Open (or create) the pipeline database at `path`.
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply the schema. Safe to call on an already-migrated database.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Sessions ───────────────────────────────────────────────

    pub fn insert_session(&self, s: &Session) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO session_sources (
                session_id, user_id, event_date, event_time, channel_name,
                holder_engagement, closer_engagement, impression_interaction
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                s.session_id,
                s.customer_id,
                s.timestamp.format(DATE_FMT).to_string(),
                s.timestamp.format(TIME_FMT).to_string(),
                s.channel,
                if s.holder_engagement { 1i32 } else { 0i32 },
                if s.closer_engagement { 1i32 } else { 0i32 },
                if s.impression_interaction { 1i32 } else { 0i32 },
            ],
        )?;
        Ok(())
    }

    pub fn insert_session_cost(&self, session_id: &str, cost: f64) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO session_costs (session_id, cost) VALUES (?1, ?2)",
            params![session_id, cost],
        )?;
        Ok(())
    }

    /// All sessions whose event date falls inside `range` (inclusive on
    /// both ends; unbounded sides are skipped), with cost joined from
    /// session_costs and defaulted to 0.
    pub fn sessions(&self, range: &DateRange) -> PipelineResult<Vec<Session>> {
        let (filter, filter_params) = date_filter("s.event_date", range);
        let sql = format!(
            "SELECT s.session_id, s.user_id, s.event_date, s.event_time,
                    s.channel_name, s.holder_engagement, s.closer_engagement,
                    s.impression_interaction, COALESCE(c.cost, 0) AS cost
             FROM session_sources s
             LEFT JOIN session_costs c ON s.session_id = c.session_id
             {filter}
             ORDER BY s.event_date, s.event_time, s.session_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(filter_params.iter()), |row| {
                let date: String = row.get(2)?;
                let time: String = row.get(3)?;
                Ok(Session {
                    session_id: row.get(0)?,
                    customer_id: row.get(1)?,
                    timestamp: combine_timestamp(&date, &time)?,
                    channel: row.get(4)?,
                    holder_engagement: row.get::<_, i32>(5)? != 0,
                    closer_engagement: row.get::<_, i32>(6)? != 0,
                    impression_interaction: row.get::<_, i32>(7)? != 0,
                    cost: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Conversions ────────────────────────────────────────────

    pub fn insert_conversion(&self, c: &Conversion) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO conversions (conv_id, user_id, conv_date, conv_time, revenue)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                c.conversion_id,
                c.customer_id,
                c.timestamp.format(DATE_FMT).to_string(),
                c.timestamp.format(TIME_FMT).to_string(),
                c.revenue,
            ],
        )?;
        Ok(())
    }

    /// All conversions whose date falls inside `range`.
    pub fn conversions(&self, range: &DateRange) -> PipelineResult<Vec<Conversion>> {
        let (filter, filter_params) = date_filter("conv_date", range);
        let sql = format!(
            "SELECT conv_id, user_id, conv_date, conv_time, revenue
             FROM conversions
             {filter}
             ORDER BY conv_date, conv_time, conv_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(filter_params.iter()), |row| {
                let date: String = row.get(2)?;
                let time: String = row.get(3)?;
                Ok(Conversion {
                    conversion_id: row.get(0)?,
                    customer_id: row.get(1)?,
                    timestamp: combine_timestamp(&date, &time)?,
                    revenue: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Attribution results ────────────────────────────────────

    /// Upsert this run's attribution weights, keyed by (conv_id, session_id).
    /// A rerun with overlapping identities overwrites prior weights rather
    /// than duplicating rows. Returns the number of rows written.
    pub fn upsert_attribution(&self, results: &[AttributionResult]) -> PipelineResult<usize> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO attribution_customer_journey (conv_id, session_id, ihc)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(conv_id, session_id) DO UPDATE SET ihc = excluded.ihc",
        )?;
        for r in results {
            stmt.execute(params![r.conversion_id, r.session_id, r.ihc])?;
        }
        Ok(results.len())
    }

    pub fn attribution_count(&self) -> PipelineResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM attribution_customer_journey",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn ihc_for(&self, conversion_id: &str, session_id: &str) -> PipelineResult<Option<f64>> {
        self.conn
            .query_row(
                "SELECT ihc FROM attribution_customer_journey
                 WHERE conv_id = ?1 AND session_id = ?2",
                params![conversion_id, session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    // ── Channel reporting ──────────────────────────────────────

    /// Aggregate attribution weights and spend per (channel, date).
    ///
    /// Weights are summed per session first, so a session appearing in
    /// several journeys cannot double-count its cost in the outer join.
    pub fn channel_report(&self, range: &DateRange) -> PipelineResult<Vec<ChannelReportRow>> {
        let (filter, filter_params) = date_filter("s.event_date", range);
        let sql = format!(
            "WITH attribution_revenue AS (
                 SELECT acj.session_id,
                        SUM(acj.ihc) AS ihc,
                        SUM(acj.ihc * c.revenue) AS ihc_revenue
                 FROM attribution_customer_journey acj
                 JOIN conversions c ON acj.conv_id = c.conv_id
                 GROUP BY acj.session_id
             )
             SELECT s.channel_name,
                    s.event_date AS date,
                    SUM(COALESCE(sc.cost, 0)) AS cost,
                    SUM(COALESCE(ar.ihc, 0)) AS ihc,
                    SUM(COALESCE(ar.ihc_revenue, 0)) AS ihc_revenue
             FROM session_sources s
             LEFT JOIN session_costs sc ON s.session_id = sc.session_id
             LEFT JOIN attribution_revenue ar ON s.session_id = ar.session_id
             {filter}
             GROUP BY s.channel_name, s.event_date
             ORDER BY s.channel_name, s.event_date"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(filter_params.iter()), |row| {
                let date: String = row.get(1)?;
                Ok(ChannelReportRow {
                    channel_name: row.get(0)?,
                    date: parse_date(&date)?,
                    cost: row.get(2)?,
                    ihc: row.get(3)?,
                    ihc_revenue: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replace the persisted channel_reporting table with this run's rows.
    pub fn replace_channel_reporting(&self, rows: &[ChannelReportRow]) -> PipelineResult<()> {
        self.conn.execute("DELETE FROM channel_reporting", [])?;
        let mut stmt = self.conn.prepare(
            "INSERT INTO channel_reporting (channel_name, date, cost, ihc, ihc_revenue)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for r in rows {
            stmt.execute(params![
                r.channel_name,
                r.date.format(DATE_FMT).to_string(),
                r.cost,
                r.ihc,
                r.ihc_revenue,
            ])?;
        }
        Ok(())
    }

    /// Read back the persisted report, ordered for deterministic export.
    pub fn read_channel_reporting(&self) -> PipelineResult<Vec<ChannelReportRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT channel_name, date, cost, ihc, ihc_revenue
             FROM channel_reporting
             ORDER BY channel_name, date",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let date: String = row.get(1)?;
                Ok(ChannelReportRow {
                    channel_name: row.get(0)?,
                    date: parse_date(&date)?,
                    cost: row.get(2)?,
                    ihc: row.get(3)?,
                    ihc_revenue: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Build an optional WHERE clause for an inclusive date range on `column`.
fn date_filter(column: &str, range: &DateRange) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut filter_params = Vec::new();
    if let Some(start) = range.start {
        clauses.push(format!("{column} >= ?"));
        filter_params.push(start.format(DATE_FMT).to_string());
    }
    if let Some(end) = range.end {
        clauses.push(format!("{column} <= ?"));
        filter_params.push(end.format(DATE_FMT).to_string());
    }
    let filter = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (filter, filter_params)
}

fn combine_timestamp(date: &str, time: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), TIMESTAMP_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_date(date: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })
}
