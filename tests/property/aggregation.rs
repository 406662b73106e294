//! Property-based tests for error aggregation.
//!
//! Uses proptest to verify:
//! 1. The snapshot lists exactly one message per distinct error type.
//! 2. The last error reported for a type is the one that survives.
//! 3. Input order within a batch does not change the snapshot.
//! 4. A snapshot exists iff the batch is non-empty.

use std::collections::BTreeMap;

use cloudtask::TypedErrorInfo;
use cloudtask::errors::CloudErrorMap;
use proptest::prelude::*;

/// Strategy for batches of (type, message, details) triples.
///
/// Types come from a small alphabet so duplicates are frequent; messages and
/// details avoid the separators used by the snapshot format.
fn arb_batch() -> impl Strategy<Value = Vec<(String, String, String)>> {
    prop::collection::vec(("[a-e]", "[a-z]{1,8}", "[a-z0-9 ]{0,12}"), 0..12)
}

fn to_errors(batch: &[(String, String, String)]) -> Vec<TypedErrorInfo> {
    batch
        .iter()
        .map(|(kind, message, details)| {
            TypedErrorInfo::new(kind.as_str(), message.as_str()).with_details(details.as_str())
        })
        .collect()
}

/// Last (message, details) per type, as the map should keep them.
fn expected(batch: &[(String, String, String)]) -> BTreeMap<String, (String, String)> {
    batch
        .iter()
        .map(|(kind, message, details)| (kind.clone(), (message.clone(), details.clone())))
        .collect()
}

proptest! {
    #[test]
    fn snapshot_has_one_message_per_type(batch in arb_batch()) {
        let map = CloudErrorMap::default();
        map.update_errors(to_errors(&batch));
        let expected = expected(&batch);

        match map.error_info() {
            None => prop_assert!(expected.is_empty()),
            Some(info) => {
                let messages: Vec<&str> = info.message.split(',').collect();
                prop_assert_eq!(messages.len(), expected.len());
                for (message, details) in expected.values() {
                    prop_assert!(messages.contains(&message.as_str()));
                    if expected.len() > 1 {
                        let bracketed = format!("[{details}]");
                        prop_assert!(info.details.contains(&bracketed));
                    } else {
                        prop_assert_eq!(&info.details, details);
                    }
                }
            }
        }
    }

    #[test]
    fn error_types_match_distinct_input_types(batch in arb_batch()) {
        let map = CloudErrorMap::default();
        map.update_errors(to_errors(&batch));
        let expected: Vec<String> = expected(&batch).into_keys().collect();
        prop_assert_eq!(map.error_types(), expected);
    }

    #[test]
    fn snapshot_ignores_order_of_distinct_types(batch in arb_batch()) {
        // Keep only the last error per type so reversing cannot change winners.
        let deduped: Vec<(String, String, String)> = expected(&batch)
            .into_iter()
            .map(|(kind, (message, details))| (kind, message, details))
            .collect();
        let mut reversed = deduped.clone();
        reversed.reverse();

        let forward = CloudErrorMap::default();
        forward.update_errors(to_errors(&deduped));
        let backward = CloudErrorMap::default();
        backward.update_errors(to_errors(&reversed));

        prop_assert_eq!(forward.error_info(), backward.error_info());
    }
}
