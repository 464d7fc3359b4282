//! Core types shared across graphkit facilities
//!
//! This crate provides the canonical schema constants used by both the
//! error facility and the logging facility:
//!
//! - **Field keys**: `component`, `op`, `event`, `path`, `err.code`, ...
//! - **Event names**: operation boundaries and clone diagnostics

pub mod schema;
