//! Canonical schema constants for structured logging and events
//!
//! These constants keep field keys and event names consistent between the
//! logging macros, the clone diagnostics and the tests that assert on them.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Navigation identifiers
pub const FIELD_PATH: &str = "path";
pub const FIELD_SEGMENT: &str = "segment";
pub const FIELD_TYPE_NAME: &str = "type_name";
pub const FIELD_ATTRIBUTE: &str = "attribute";

// Clone statistics
pub const FIELD_CLONED_NODES: &str = "cloned_nodes";
pub const FIELD_FAILED_ATTRIBUTES: &str = "failed_attributes";
pub const FIELD_FALLBACKS: &str = "fallbacks";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Clone engine diagnostics
pub const EVENT_CLONE_ATTRIBUTE_FAILED: &str = "clone_attribute_failed";
pub const EVENT_CLONE_FALLBACK_USED: &str = "clone_fallback_used";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_accessibility() {
        assert!(!FIELD_COMPONENT.is_empty());
        assert!(!FIELD_OP.is_empty());
        assert!(!FIELD_PATH.is_empty());
        assert!(!EVENT_START.is_empty());
        assert!(!EVENT_END.is_empty());
        assert!(!EVENT_END_ERROR.is_empty());
    }

    #[test]
    fn test_event_names_are_distinct() {
        let events = [
            EVENT_START,
            EVENT_END,
            EVENT_END_ERROR,
            EVENT_CLONE_ATTRIBUTE_FAILED,
            EVENT_CLONE_FALLBACK_USED,
        ];
        for (i, a) in events.iter().enumerate() {
            for b in &events[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_error_fields_are_dotted() {
        assert_eq!(FIELD_ERR_KIND, "err.kind");
        assert_eq!(FIELD_ERR_CODE, "err.code");
    }
}
