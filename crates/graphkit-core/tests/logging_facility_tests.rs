#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use graphkit_core::descriptor::Registry;
use graphkit_core::errors::{ExError, ExErrorKind, GraphError};
use graphkit_core::logging_facility::test_capture::init_test_capture;
use graphkit_core::path::PathResolver;
use graphkit_core::types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use graphkit_core::value::Value;
use graphkit_core::{log_op_end, log_op_error, log_op_start};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    let events = capture.events();
    let start_events: Vec<_> = events
        .iter()
        .filter(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START))
        .collect();

    assert!(
        !start_events.is_empty(),
        "Should have captured at least one start event"
    );
}

#[test]
fn test_log_op_end_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events();
    let end_events: Vec<_> = events
        .iter()
        .filter(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END))
        .collect();

    assert_eq!(end_events.len(), 1, "Should have exactly one end event");
    assert_eq!(end_events[0].field("duration_ms"), Some("42"));
}

#[test]
fn test_log_op_error_includes_kind_and_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = GraphError::NotCloneable {
        type_name: "Socket".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let events = capture.events();
    let error_events: Vec<_> = events
        .iter()
        .filter(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END_ERROR))
        .collect();

    assert_eq!(error_events.len(), 1, "Should have exactly one error event");
    assert_eq!(error_events[0].field("err.code"), Some("ERR_NOT_CLONEABLE"));
    assert_eq!(error_events[0].field("err.kind"), Some("NotCloneable"));
}

#[test]
fn test_log_op_error_borrows_the_error() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_borrow_unique_7";

    let err = GraphError::BrokenPath {
        path: "customer.name".to_string(),
        segment: "name".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 1);
    // Still owned by the caller after logging
    let ex_err = ExError::from(err);
    log_op_error!(op_name, ex_err, duration_ms = 2);
    assert_eq!(ex_err.kind(), ExErrorKind::BrokenPath);

    let codes: Vec<_> = capture
        .events()
        .into_iter()
        .filter(|e| e.op.as_deref() == Some(op_name))
        .filter_map(|e| e.field("err.code").map(str::to_string))
        .collect();
    assert_eq!(codes, vec!["ERR_BROKEN_PATH", "ERR_BROKEN_PATH"]);
}

#[test]
fn test_log_macros_with_multiple_fields() {
    let capture = init_test_capture();
    let op_name = "test_log_macros_fields_unique_4";

    log_op_start!(op_name, path = "customer.name", type_name = "Order");

    let events = capture.events();
    let start_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name))
        .expect("Should have start event");

    assert_eq!(start_event.field("path"), Some("customer.name"));
    assert_eq!(start_event.field("type_name"), Some("Order"));
}

#[test]
fn test_test_capture_assert_event_exists() {
    let capture = init_test_capture();
    let op_name = "test_capture_assert_unique_5";

    log_op_start!(op_name);

    capture.assert_event_exists(op_name, EVENT_START);
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();

    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_resolve_boundary_logged_once() {
    let capture = init_test_capture();
    let registry = Registry::new();
    let resolver = PathResolver::new(&registry);
    let order = Value::Node(common::sample_order());
    let path = "lines[1].qty--boundary-marker";

    // Malformed on purpose so the path is unique to this test
    let err = resolver.resolve(&order, path).unwrap_err();
    assert_eq!(ExError::from(err).kind(), ExErrorKind::InvalidPathSegment);

    let starts = capture.count_events(|e| {
        e.event.as_deref() == Some(EVENT_START) && e.field("path") == Some(path)
    });
    let errors = capture.count_events(|e| {
        e.event.as_deref() == Some(EVENT_END_ERROR) && e.field("path") == Some(path)
    });
    assert_eq!(starts, 1);
    assert_eq!(errors, 1);

    let error_event = capture
        .events()
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR) && e.field("path") == Some(path))
        .expect("Should have error event");
    assert_eq!(error_event.op.as_deref(), Some("resolve"));
    assert_eq!(error_event.field("err.code"), Some("ERR_INVALID_PATH_SEGMENT"));
}

#[test]
fn test_successful_resolve_logs_start_and_end() {
    let capture = init_test_capture();
    let registry = Registry::new();
    let resolver = PathResolver::new(&registry);
    let order = Value::Node(common::sample_order());
    // Only this test reads this path
    let path = "customer.active";

    assert_eq!(resolver.resolve(&order, path).unwrap(), Value::Bool(true));

    let for_path: Vec<_> = capture
        .events()
        .into_iter()
        .filter(|e| e.op.as_deref() == Some("resolve") && e.field("path") == Some(path))
        .collect();
    assert_eq!(for_path.len(), 2, "{for_path:?}");
    assert_eq!(for_path[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(for_path[1].event.as_deref(), Some(EVENT_END));
}

#[test]
fn test_multiple_operations_logged_independently() {
    let capture = init_test_capture();
    let op1_name = "test_multi_ops_resolve_unique_6";
    let op2_name = "test_multi_ops_clone_unique_6";

    log_op_start!(op1_name);
    log_op_end!(op1_name, duration_ms = 10);

    log_op_start!(op2_name);
    log_op_end!(op2_name, duration_ms = 5);

    let op1_events = capture.count_events(|e| e.op.as_deref() == Some(op1_name));
    let op2_events = capture.count_events(|e| e.op.as_deref() == Some(op2_name));

    assert_eq!(op1_events, 2);
    assert_eq!(op2_events, 2);
}
