//! Journey builder — matches each conversion to its preceding sessions.

use std::collections::{BTreeMap, HashMap};

use crate::types::{Conversion, ConversionId, Journey, Session};

/// For each conversion, collect the same customer's sessions with
/// timestamp <= the conversion timestamp, sorted ascending.
///
/// Conversions with no qualifying sessions are emitted as empty journeys
/// when `include_empty` is set, otherwise dropped.
pub fn build_journeys(
    sessions: &[Session],
    conversions: &[Conversion],
    include_empty: bool,
) -> BTreeMap<ConversionId, Journey> {
    let mut by_customer: HashMap<&str, Vec<&Session>> = HashMap::new();
    for s in sessions {
        by_customer.entry(s.customer_id.as_str()).or_default().push(s);
    }

    let mut journeys = BTreeMap::new();
    for conv in conversions {
        let mut eligible: Vec<Session> = by_customer
            .get(conv.customer_id.as_str())
            .map(|candidates| {
                candidates
                    .iter()
                    .filter(|s| s.timestamp <= conv.timestamp)
                    .map(|s| (*s).clone())
                    .collect()
            })
            .unwrap_or_default();

        // Ascending by timestamp; session_id breaks ties so batching
        // stays deterministic across runs.
        eligible.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });

        if eligible.is_empty() && !include_empty {
            continue;
        }

        journeys.insert(
            conv.conversion_id.clone(),
            Journey {
                conversion: conv.clone(),
                sessions: eligible,
            },
        );
    }

    let session_total: usize = journeys.values().map(|j| j.sessions.len()).sum();
    log::info!(
        "built {} journeys covering {} sessions from {} conversions",
        journeys.len(),
        session_total,
        conversions.len()
    );
    journeys
}
