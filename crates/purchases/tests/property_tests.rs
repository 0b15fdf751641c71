//! Property-based tests for purchases
//!
//! These tests verify invariants that must hold for all inputs:
//! - Planned windows tile `[checkpoint, now]` exactly
//! - No window is wider than the provider allows
//! - The extractor never panics and keeps whatever follows the last separator
//!
//! Run with: cargo test --test property_tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use purchases::sync::{MAX_WINDOW_DAYS, max_window, plan_windows, plan_windows_with};
use purchases::{RawTransaction, extract_purchase};
use serde_json::json;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 12, 2, 0, 0, 0).unwrap()
}

// ============================================================================
// WINDOW PLANNING
// ============================================================================

mod window_tests {
    use super::*;

    proptest! {
        /// Invariant: windows are contiguous, start at the checkpoint and end at now
        #[test]
        fn windows_tile_the_range(offset in 0i64..100_000_000, span in 1i64..400_000_000) {
            let checkpoint = base() + Duration::seconds(offset);
            let now = checkpoint + Duration::seconds(span);
            let windows: Vec<_> = plan_windows(checkpoint, now).collect();

            prop_assert!(!windows.is_empty());
            prop_assert_eq!(windows[0].start, checkpoint);
            prop_assert_eq!(windows[windows.len() - 1].end, now);
            for pair in windows.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
        }

        /// Invariant: every window is non-empty and at most 31 days wide
        #[test]
        fn windows_are_bounded(span in 1i64..400_000_000) {
            let now = base() + Duration::seconds(span);
            for window in plan_windows(base(), now) {
                prop_assert!(window.start < window.end);
                prop_assert!(window.duration() <= Duration::days(MAX_WINDOW_DAYS));
            }
        }

        /// Invariant: only the last window may be narrower than the maximum
        #[test]
        fn window_count_is_minimal(span in 1i64..400_000_000) {
            let now = base() + Duration::seconds(span);
            let windows: Vec<_> = plan_windows(base(), now).collect();
            let width = max_window().num_seconds();
            let expected = (span + width - 1) / width;

            prop_assert_eq!(windows.len() as i64, expected);
            for window in &windows[..windows.len() - 1] {
                prop_assert_eq!(window.duration(), max_window());
            }
        }

        /// Invariant: nothing is planned once the checkpoint has caught up
        #[test]
        fn caught_up_plans_nothing(ahead in 0i64..100_000_000) {
            let now = base();
            let checkpoint = now + Duration::seconds(ahead);
            prop_assert_eq!(plan_windows(checkpoint, now).count(), 0);
        }

        /// Invariant: replanning from the same inputs yields the same windows
        #[test]
        fn planning_is_deterministic(span in 1i64..400_000_000, width_days in 1i64..60) {
            let now = base() + Duration::seconds(span);
            let width = Duration::days(width_days);
            let first: Vec<_> = plan_windows_with(base(), now, width).collect();
            let second: Vec<_> = plan_windows_with(base(), now, width).collect();
            prop_assert_eq!(first, second);
        }
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

mod extract_tests {
    use super::*;

    fn arbitrary_json() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            ".{0,20}".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
                prop::collection::hash_map(
                    prop_oneof![
                        Just("transaction_info".to_string()),
                        Just("payer_info".to_string()),
                        Just("custom_field".to_string()),
                        Just("email_address".to_string()),
                        "[a-z_]{1,12}",
                    ],
                    inner,
                    0..4
                )
                .prop_map(|map| serde_json::Value::Object(map.into_iter().collect())),
            ]
        })
    }

    proptest! {
        /// Invariant: extract_purchase never panics on any JSON shape
        #[test]
        fn never_panics(value in arbitrary_json()) {
            let _ = extract_purchase(&RawTransaction(value));
        }

        /// Invariant: the custom field never panics the extractor
        #[test]
        fn any_custom_field_is_safe(custom in "\\PC{0,60}") {
            let raw = RawTransaction(json!({
                "transaction_info": {
                    "custom_field": custom,
                    "transaction_amount": { "value": "1.00" },
                    "transaction_initiation_date": "2020-01-01T00:00:00+0000"
                },
                "payer_info": { "email_address": "a@b.com" }
            }));
            if let Some(purchase) = extract_purchase(&raw) {
                prop_assert!(!purchase.resource_id.contains('|'));
                prop_assert!(custom.ends_with(purchase.resource_id.as_str()));
                prop_assert!(custom.starts_with("resource_purchase"));
            }
        }

        /// Invariant: the resource id is whatever follows the last separator
        #[test]
        fn resource_id_round_trips(prefix in "[a-z|]{0,10}", id in "[A-Za-z0-9]{0,16}") {
            let raw = RawTransaction(json!({
                "transaction_info": {
                    "custom_field": format!("resource_purchase{}|{}", prefix, id),
                    "transaction_amount": { "value": "1.00" },
                    "transaction_initiation_date": "2020-01-01T00:00:00+0000"
                },
                "payer_info": { "email_address": "a@b.com" }
            }));
            let purchase = extract_purchase(&raw);
            prop_assert_eq!(purchase.map(|p| p.resource_id), Some(id));
        }
    }
}
