//! Attribution scoring — the external service boundary.
//!
//! Journeys are flattened into the scoring API's row shape, sent in
//! size-bounded batches strictly in order, and the returned per-session
//! weights are validated against the number of sessions submitted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    config::ApiConfig,
    error::{PipelineError, PipelineResult},
    types::{AttributionResult, Journey},
};

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Prefix marking the synthetic terminal row appended to each journey.
const CONVERSION_ROW_PREFIX: &str = "conversion_";

/// Anything that can turn journeys into per-session attribution weights.
pub trait Scorer {
    fn score(&self, journeys: &[Journey]) -> PipelineResult<Vec<AttributionResult>>;
}

// ── Wire shapes ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct JourneyRow {
    pub conversion_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub channel_label: String,
    pub holder_engagement: u8,
    pub closer_engagement: u8,
    pub conversion: u8,
    pub impression_interaction: u8,
}

#[derive(Debug, Serialize)]
pub struct RedistributionRule {
    pub direction: &'static str,
    pub receive_threshold: f64,
    pub redistribution_channel_labels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RedistributionParameter {
    pub initializer: RedistributionRule,
    pub holder: RedistributionRule,
    pub closer: RedistributionRule,
}

impl Default for RedistributionParameter {
    fn default() -> Self {
        Self {
            initializer: RedistributionRule {
                direction: "earlier_sessions_only",
                receive_threshold: 0.0,
                redistribution_channel_labels: Vec::new(),
            },
            holder: RedistributionRule {
                direction: "any_session",
                receive_threshold: 0.0,
                redistribution_channel_labels: Vec::new(),
            },
            closer: RedistributionRule {
                direction: "later_sessions_only",
                receive_threshold: 0.0,
                redistribution_channel_labels: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ComputeRequest {
    pub customer_journeys: Vec<JourneyRow>,
    pub redistribution_parameter: RedistributionParameter,
}

#[derive(Debug, Deserialize)]
pub struct ComputeResponse {
    #[serde(rename = "statusCode")]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub value: Vec<ConversionWeights>,
    #[serde(rename = "partialFailureErrors")]
    pub partial_failure_errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ConversionWeights {
    pub conversion_id: String,
    #[serde(default)]
    pub sessions: Vec<SessionWeight>,
}

#[derive(Debug, Deserialize)]
pub struct SessionWeight {
    pub session_id: String,
    #[serde(default)]
    pub ihc: f64,
}

// ── Request/response plumbing ──────────────────────────────────

/// Flatten one batch of journeys into the API's row list. Each journey
/// contributes one row per session plus a synthetic terminal row marking
/// the conversion itself.
pub fn batch_payload(batch: &[Journey]) -> ComputeRequest {
    let mut rows = Vec::new();
    for journey in batch {
        let conv = &journey.conversion;
        for session in &journey.sessions {
            rows.push(JourneyRow {
                conversion_id: conv.conversion_id.clone(),
                session_id: session.session_id.clone(),
                timestamp: session.timestamp.format(TIMESTAMP_FMT).to_string(),
                channel_label: session.channel.clone(),
                holder_engagement: if session.holder_engagement { 1 } else { 0 },
                closer_engagement: if session.closer_engagement { 1 } else { 0 },
                conversion: 0,
                impression_interaction: if session.impression_interaction { 1 } else { 0 },
            });
        }
        rows.push(JourneyRow {
            conversion_id: conv.conversion_id.clone(),
            session_id: format!("{CONVERSION_ROW_PREFIX}{}", conv.conversion_id),
            timestamp: conv.timestamp.format(TIMESTAMP_FMT).to_string(),
            channel_label: "Conversion".into(),
            holder_engagement: 0,
            closer_engagement: 0,
            conversion: 1,
            impression_interaction: 0,
        });
    }
    ComputeRequest {
        customer_journeys: rows,
        redistribution_parameter: RedistributionParameter::default(),
    }
}

/// Extract weights from one batch response, skipping synthetic conversion
/// rows, and enforce the one-weight-per-session postcondition.
pub fn collect_batch_weights(
    batch_index: usize,
    batch: &[Journey],
    response: &ComputeResponse,
) -> PipelineResult<Vec<AttributionResult>> {
    let expected: usize = batch.iter().map(|j| j.sessions.len()).sum();

    let mut results = Vec::with_capacity(expected);
    for conv in &response.value {
        for session in &conv.sessions {
            if session.session_id.starts_with(CONVERSION_ROW_PREFIX) {
                continue;
            }
            results.push(AttributionResult {
                conversion_id: conv.conversion_id.clone(),
                session_id: session.session_id.clone(),
                ihc: session.ihc,
            });
        }
    }

    if results.len() != expected {
        return Err(PipelineError::AttributionApi {
            batch: batch_index,
            detail: format!(
                "weight count mismatch: submitted {expected} sessions, received {} weights",
                results.len()
            ),
        });
    }
    Ok(results)
}

// ── Live API client ────────────────────────────────────────────

/// Blocking HTTP client for the scoring service. One POST per batch,
/// no retry: any failure aborts the run with the batch index attached.
pub struct IhcClient {
    http: reqwest::blocking::Client,
    config: ApiConfig,
}

impl IhcClient {
    pub fn new(config: ApiConfig) -> PipelineResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn send_batch(
        &self,
        batch_index: usize,
        batch: &[Journey],
    ) -> PipelineResult<Vec<AttributionResult>> {
        let url = format!("{}?conv_type_id={}", self.config.url, self.config.conv_type_id);
        let payload = batch_payload(batch);

        let api_err = |detail: String| PipelineError::AttributionApi {
            batch: batch_index,
            detail,
        };

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.token)
            .json(&payload)
            .send()
            .map_err(|e| api_err(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| api_err(format!("unreadable response body: {e}")))?;
        if !status.is_success() {
            return Err(api_err(format!("HTTP {status}: {body}")));
        }

        let parsed: ComputeResponse = serde_json::from_str(&body)
            .map_err(|e| api_err(format!("malformed response ({e}): {body}")))?;
        if let Some(code) = parsed.status_code {
            if code != 200 {
                return Err(api_err(format!("API status {code}: {body}")));
            }
        }
        if let Some(errors) = &parsed.partial_failure_errors {
            log::warn!("batch {batch_index}: partial failures reported: {errors}");
        }

        collect_batch_weights(batch_index, batch, &parsed)
    }
}

impl Scorer for IhcClient {
    fn score(&self, journeys: &[Journey]) -> PipelineResult<Vec<AttributionResult>> {
        let batch_size = self.config.batch_size.max(1);
        let total_batches = journeys.len().div_ceil(batch_size);
        let mut results = Vec::new();

        for (batch_index, batch) in journeys.chunks(batch_size).enumerate() {
            let sessions: usize = batch.iter().map(|j| j.sessions.len()).sum();
            log::info!(
                "scoring batch {}/{}: {} journeys, {} sessions",
                batch_index + 1,
                total_batches,
                batch.len(),
                sessions
            );
            results.extend(self.send_batch(batch_index, batch)?);
        }

        log::info!("received attribution weights for {} sessions", results.len());
        Ok(results)
    }
}

// ── Offline scorer ─────────────────────────────────────────────

/// Deterministic offline scorer used in test mode: recency, channel, and
/// engagement multipliers, normalized to sum 1 per conversion. Empty
/// journeys yield no weights.
pub struct HeuristicScorer;

fn channel_multiplier(channel: &str) -> f64 {
    if channel.contains("Email") {
        1.2
    } else if channel.contains("Social") {
        1.1
    } else if channel.contains("Search") {
        1.3
    } else if channel.contains("Direct") {
        0.8
    } else {
        1.0
    }
}

impl Scorer for HeuristicScorer {
    fn score(&self, journeys: &[Journey]) -> PipelineResult<Vec<AttributionResult>> {
        let mut results = Vec::new();
        for journey in journeys {
            let total = journey.sessions.len();
            if total == 0 {
                continue;
            }

            let mut raw = Vec::with_capacity(total);
            for (i, session) in journey.sessions.iter().enumerate() {
                let recency = (i + 1) as f64 / total as f64;
                let mut engagement = 1.0;
                if session.holder_engagement {
                    engagement += 0.5;
                }
                if session.closer_engagement {
                    engagement += 0.7;
                }
                raw.push(recency * channel_multiplier(&session.channel) * engagement);
            }

            let sum: f64 = raw.iter().sum();
            for (session, weight) in journey.sessions.iter().zip(raw) {
                results.push(AttributionResult {
                    conversion_id: journey.conversion.conversion_id.clone(),
                    session_id: session.session_id.clone(),
                    ihc: weight / sum,
                });
            }
        }

        log::info!(
            "offline scorer produced {} weights for {} journeys",
            results.len(),
            journeys.len()
        );
        Ok(results)
    }
}
