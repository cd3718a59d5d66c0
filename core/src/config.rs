//! Run configuration, passed explicitly into each pipeline stage.

use crate::types::DateRange;

pub const DEFAULT_API_URL: &str = "https://api.ihc-attribution.com/v1/compute_ihc";

/// Maximum journeys per scoring request (the API's documented payload limit).
pub const DEFAULT_BATCH_SIZE: usize = 100;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_CONV_TYPE_ID: &str = "default";

/// Scoring service connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub url: String,
    pub token: String,
    pub conv_type_id: String,
    /// Journeys per request; requests are issued sequentially, in order.
    pub batch_size: usize,
    /// Per-request timeout on the network client.
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            url: DEFAULT_API_URL.into(),
            token: token.into(),
            conv_type_id: DEFAULT_CONV_TYPE_ID.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Everything one pipeline run needs, assembled by the caller.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api: ApiConfig,
    pub range: DateRange,
    /// Emit conversions with no qualifying sessions as empty journeys
    /// instead of dropping them, so reporting still reflects them.
    pub include_empty_journeys: bool,
}

impl PipelineConfig {
    pub fn new(api: ApiConfig, range: DateRange) -> Self {
        Self {
            api,
            range,
            include_empty_journeys: true,
        }
    }
}
