//! Integration tests for cloud error aggregation.
//!
//! Exercises `CloudErrorMap` together with the default friendliness rules,
//! failure causes coming out of task results, and concurrent readers.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use cloudtask::errors::{CloudErrorMap, ErrorMessageUpdater, SimpleErrorMessages};
use cloudtask::{ProviderError, TaskFailure, TaskResult, TypedErrorInfo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn error(kind: &str, message: &str, details: &str) -> TypedErrorInfo {
    TypedErrorInfo::new(kind, message).with_details(details)
}

/// Friendliness rules that translate one known provider message.
struct Translating;

impl ErrorMessageUpdater for Translating {
    fn friendly_message_or(&self, message: &str, default: &str) -> String {
        match message {
            "" => default.to_string(),
            "NoPermission" => "Permission denied for the configured user".to_string(),
            other => other.to_string(),
        }
    }

    fn friendly_failure_message_or(&self, cause: &TaskFailure, default: &str) -> String {
        self.friendly_message_or(&cause.root_cause().to_string(), default)
    }
}

// ---------------------------------------------------------------------------
// Snapshot shape
// ---------------------------------------------------------------------------

#[test]
fn single_error_snapshot() {
    let map = CloudErrorMap::default();
    map.update_errors([error("A", "boom", "d")]);

    let info = map.error_info().unwrap();
    assert_eq!(info.message, "boom");
    assert_eq!(info.details, "d");
}

#[test]
fn multi_error_snapshot_contains_every_error() {
    let map = CloudErrorMap::default();
    map.update_errors([error("A", "m1", "d1"), error("B", "m2", "d2")]);

    let info = map.error_info().unwrap();
    let messages: Vec<&str> = info.message.split(',').collect();
    assert_eq!(messages.len(), 2);
    assert!(messages.contains(&"m1"));
    assert!(messages.contains(&"m2"));
    assert!(info.details.contains("[d1]"));
    assert!(info.details.contains("[d2]"));
    assert!(info.details.contains(",\n"));
}

#[test]
fn translated_single_error_keeps_raw_message_in_details() {
    let map = CloudErrorMap::new(Arc::new(Translating));
    map.update_errors([error("auth", "NoPermission", "user ci-bot lacks VirtualMachine.Interact")]);

    let info = map.error_info().unwrap();
    assert_eq!(info.message, "Permission denied for the configured user");
    assert_eq!(
        info.details,
        "NoPermission\nuser ci-bot lacks VirtualMachine.Interact"
    );
}

#[test]
fn failed_task_result_feeds_the_error_map() {
    let result = TaskResult::from_error(ProviderError::OperationFailed {
        operation: "CloneVM_Task".to_string(),
        reason: "datastore full".to_string(),
    });
    let cause = result.cause.clone().unwrap();

    let map = CloudErrorMap::default();
    map.update_errors([TypedErrorInfo::from_failure("clone", cause)]);

    let info = map.error_info().unwrap();
    assert_eq!(info.message, "operation 'CloneVM_Task' failed: datastore full");
    assert!(info.cause.is_some());
}

#[test]
fn unknown_host_is_made_friendly() {
    let cause = TaskFailure::new(ProviderError::UnknownHost("vcenter.corp".to_string()));
    assert_eq!(
        SimpleErrorMessages.friendly_failure_message(&cause),
        "Unknown host: vcenter.corp"
    );
}

// ---------------------------------------------------------------------------
// State transitions
// ---------------------------------------------------------------------------

#[test]
fn clear_after_any_state_yields_no_error() {
    let map = CloudErrorMap::default();
    map.clear();
    assert!(map.error_info().is_none());

    map.update_errors([error("A", "m1", "d1"), error("B", "m2", "d2")]);
    map.clear();
    assert!(map.error_info().is_none());
}

#[test]
fn second_update_replaces_all_previous_errors() {
    let map = CloudErrorMap::default();
    map.update_errors([error("A", "stale", "d1"), error("B", "m2", "d2")]);
    map.update_errors([error("B", "m2", "d2"), error("C", "m3", "d3")]);

    let info = map.error_info().unwrap();
    assert!(!info.message.contains("stale"));
    assert!(!info.details.contains("[d1]"));
    assert!(info.message.contains("m3"));
    assert_eq!(map.error_types(), vec!["B".to_string(), "C".to_string()]);
}

#[test]
fn repeated_reads_return_the_same_snapshot() {
    let map = CloudErrorMap::default();
    map.update_errors([error("A", "m1", "d1"), error("B", "m2", "d2")]);

    let first = map.error_info().unwrap();
    let second = map.error_info().unwrap();
    assert_eq!(*first, *second);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn readers_never_see_mixed_snapshots() {
    let map = Arc::new(CloudErrorMap::default());
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let map = Arc::clone(&map);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut round = 0u32;
            while !stop.load(Ordering::Relaxed) {
                let tag = round.to_string();
                map.update_errors([
                    error("A", &format!("a{tag}"), &tag),
                    error("B", &format!("b{tag}"), &tag),
                ]);
                round = round.wrapping_add(1);
            }
        })
    };

    for _ in 0..10_000 {
        if let Some(info) = map.error_info() {
            let (a, b) = info.message.split_once(',').unwrap();
            assert_eq!(a.trim_start_matches('a'), b.trim_start_matches('b'));
            let tag = a.trim_start_matches('a');
            assert_eq!(info.details, format!("[{tag}],\n[{tag}]"));
        }
    }

    stop.store(true, Ordering::Relaxed);
    writer.join().unwrap();
}
