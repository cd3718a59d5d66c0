//! Integration tests for the attribution client's request/response
//! plumbing and the offline scorer. The HTTP transport itself is a thin
//! loop over these parts.

use attribution_core::attribution::{
    batch_payload, collect_batch_weights, ComputeResponse, ConversionWeights, HeuristicScorer,
    Scorer, SessionWeight,
};
use attribution_core::error::PipelineError;
use attribution_core::types::{Conversion, Journey, Session};
use chrono::{NaiveDate, NaiveDateTime};

fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 9, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn session(id: &str, channel: &str, day: u32, holder: bool, closer: bool) -> Session {
    Session {
        session_id: id.into(),
        customer_id: "u1".into(),
        channel: channel.into(),
        timestamp: ts(day, 10),
        cost: 0.0,
        holder_engagement: holder,
        closer_engagement: closer,
        impression_interaction: false,
    }
}

fn journey(conv_id: &str, sessions: Vec<Session>) -> Journey {
    Journey {
        conversion: Conversion {
            conversion_id: conv_id.into(),
            customer_id: "u1".into(),
            timestamp: ts(28, 23),
            revenue: 100.0,
        },
        sessions,
    }
}

fn response_for(conv_id: &str, weights: &[(&str, f64)]) -> ComputeResponse {
    ComputeResponse {
        status_code: Some(200),
        value: vec![ConversionWeights {
            conversion_id: conv_id.into(),
            sessions: weights
                .iter()
                .map(|(id, ihc)| SessionWeight {
                    session_id: (*id).to_string(),
                    ihc: *ihc,
                })
                .collect(),
        }],
        partial_failure_errors: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: payload carries one row per session plus a synthetic terminal row
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn payload_includes_synthetic_conversion_row() {
    let batch = vec![journey(
        "c1",
        vec![
            session("s1", "Paid Search", 1, false, false),
            session("s2", "Email", 2, true, false),
        ],
    )];

    let payload = batch_payload(&batch);
    assert_eq!(payload.customer_journeys.len(), 3);

    let terminal = &payload.customer_journeys[2];
    assert_eq!(terminal.session_id, "conversion_c1");
    assert_eq!(terminal.channel_label, "Conversion");
    assert_eq!(terminal.conversion, 1);

    assert_eq!(payload.customer_journeys[0].conversion, 0);
    assert_eq!(payload.customer_journeys[1].holder_engagement, 1);
    assert_eq!(payload.customer_journeys[0].timestamp, "2023-09-01 10:00:00");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: batch of several journeys keeps ceil(N/B) payload arithmetic honest
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn batches_cover_all_journeys_in_order() {
    let journeys: Vec<Journey> = (0..5)
        .map(|i| {
            journey(
                &format!("c{i}"),
                vec![session(&format!("s{i}"), "Direct", 1, false, false)],
            )
        })
        .collect();

    let batches: Vec<&[Journey]> = journeys.chunks(2).collect();
    assert_eq!(batches.len(), 3); // ceil(5/2)

    let mut seen = Vec::new();
    for batch in &batches {
        for row in batch_payload(batch).customer_journeys {
            if row.conversion == 0 {
                seen.push(row.session_id);
            }
        }
    }
    assert_eq!(seen, vec!["s0", "s1", "s2", "s3", "s4"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: weights are collected and synthetic rows skipped
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn collect_weights_skips_synthetic_rows() {
    let batch = vec![journey(
        "c1",
        vec![
            session("s1", "Paid Search", 1, false, false),
            session("s2", "Email", 2, false, false),
        ],
    )];
    let response = response_for("c1", &[("s1", 0.4), ("s2", 0.6), ("conversion_c1", 0.0)]);

    let results = collect_batch_weights(0, &batch, &response).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].session_id, "s1");
    assert!((results[0].ihc - 0.4).abs() < 1e-12);
    assert_eq!(results[1].conversion_id, "c1");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: a short response is a fatal attribution error with batch context
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn weight_count_mismatch_is_an_error() {
    let batch = vec![journey(
        "c1",
        vec![
            session("s1", "Paid Search", 1, false, false),
            session("s2", "Email", 2, false, false),
        ],
    )];
    // One weight for two submitted sessions.
    let response = response_for("c1", &[("s1", 1.0)]);

    let err = collect_batch_weights(3, &batch, &response).unwrap_err();
    match err {
        PipelineError::AttributionApi { batch, detail } => {
            assert_eq!(batch, 3);
            assert!(detail.contains("mismatch"), "unexpected detail: {detail}");
        }
        other => panic!("expected AttributionApi error, got: {other}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: offline scorer normalizes weights to sum 1 per conversion
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn heuristic_weights_sum_to_one() {
    let journeys = vec![
        journey(
            "c1",
            vec![
                session("s1", "Paid Search", 1, false, false),
                session("s2", "Email", 2, true, false),
                session("s3", "Direct", 3, false, true),
            ],
        ),
        journey("c2", vec![session("s4", "Social", 4, false, false)]),
    ];

    let results = HeuristicScorer.score(&journeys).unwrap();
    assert_eq!(results.len(), 4);

    let c1_sum: f64 = results
        .iter()
        .filter(|r| r.conversion_id == "c1")
        .map(|r| r.ihc)
        .sum();
    assert!((c1_sum - 1.0).abs() < 1e-9);

    let single = results.iter().find(|r| r.session_id == "s4").unwrap();
    assert!((single.ihc - 1.0).abs() < 1e-12);

    for r in &results {
        assert!(r.ihc >= 0.0 && r.ihc <= 1.0);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 6: channel and engagement multipliers shift credit as documented
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn heuristic_applies_channel_and_engagement_multipliers() {
    // raw(s1) = recency 0.5 * Email 1.2 * holder 1.5 = 0.9
    // raw(s2) = recency 1.0 * unknown 1.0 * none 1.0 = 1.0
    let journeys = vec![journey(
        "c1",
        vec![
            session("s1", "Email Newsletter", 1, true, false),
            session("s2", "Affiliate", 2, false, false),
        ],
    )];

    let results = HeuristicScorer.score(&journeys).unwrap();
    let s1 = results.iter().find(|r| r.session_id == "s1").unwrap();
    let s2 = results.iter().find(|r| r.session_id == "s2").unwrap();

    assert!((s1.ihc - 0.9 / 1.9).abs() < 1e-9);
    assert!((s2.ihc - 1.0 / 1.9).abs() < 1e-9);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 7: empty journeys contribute no weights
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_journey_yields_no_weights() {
    let journeys = vec![journey("c1", Vec::new())];
    let results = HeuristicScorer.score(&journeys).unwrap();
    assert!(results.is_empty());
}
