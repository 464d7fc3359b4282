use thiserror::Error;

/// Result type alias using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers can match on for
/// programmatic handling and that tests assert against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Navigation
    AttributeNotFound,
    BrokenPath,
    IndexOutOfRange,
    InvalidPathSegment,

    // Instantiation / cloning
    NotInstantiable,
    NotCloneable,
    /// Diagnostic only: an opaque value was copied through marshal/unmarshal
    CloneFallbackUsed,

    // Accessor invocation
    AccessFailed,
    TypeMismatch,

    // Integration
    Serialization,
    InvalidConfig,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::AttributeNotFound => "ERR_ATTRIBUTE_NOT_FOUND",
            ExErrorKind::BrokenPath => "ERR_BROKEN_PATH",
            ExErrorKind::IndexOutOfRange => "ERR_INDEX_OUT_OF_RANGE",
            ExErrorKind::InvalidPathSegment => "ERR_INVALID_PATH_SEGMENT",
            ExErrorKind::NotInstantiable => "ERR_NOT_INSTANTIABLE",
            ExErrorKind::NotCloneable => "ERR_NOT_CLONEABLE",
            ExErrorKind::CloneFallbackUsed => "ERR_CLONE_FALLBACK_USED",
            ExErrorKind::AccessFailed => "ERR_ACCESS_FAILED",
            ExErrorKind::TypeMismatch => "ERR_TYPE_MISMATCH",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether this kind reports a diagnostic rather than a failure
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, ExErrorKind::CloneFallbackUsed)
    }
}

/// Canonical structured error type
///
/// Carries classification fields for programmatic handling and the
/// navigation context (path, segment, type) for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    path: Option<String>,
    segment: Option<String>,
    type_name: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            path: None,
            segment: None,
            type_name: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add path expression context
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add offending segment context
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    /// Add node type context
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the path context, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Get the segment context, if any
    pub fn segment(&self) -> Option<&str> {
        self.segment.as_deref()
    }

    /// Get the type name context, if any
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path)?;
        }
        if let Some(segment) = &self.segment {
            write!(f, " (segment: {})", segment)?;
        }
        if let Some(type_name) = &self.type_name {
            write!(f, " (type: {})", type_name)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for graph navigation and cloning
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    // ===== Navigation Errors =====
    /// No getter matches the attribute on the runtime or declared type
    #[error("Attribute '{attribute}' not found on type {type_name}")]
    AttributeNotFound {
        type_name: String,
        attribute: String,
        path: String,
    },

    /// A getter exists but no setter accepting its declared type does
    #[error("Attribute '{attribute}' on type {type_name} is not writable")]
    AttributeReadOnly {
        type_name: String,
        attribute: String,
        path: String,
    },

    /// An intermediate segment evaluated to null
    #[error("Broken path '{path}': segment '{segment}' is reached through a null value")]
    BrokenPath { path: String, segment: String },

    /// Numeric selector outside `[0, len)`
    #[error("Index {index} out of range for segment '{segment}' of '{path}' (len {len})")]
    IndexOutOfRange {
        path: String,
        segment: String,
        index: i64,
        len: usize,
    },

    /// Selector kind does not match the container found, or the segment is malformed
    #[error("Invalid segment '{segment}' in path '{path}': {reason}")]
    InvalidPathSegment {
        path: String,
        segment: String,
        reason: String,
    },

    // ===== Instantiation / Clone Errors =====
    /// Auto-vivification needed a no-argument constructor that does not exist
    #[error("Type {type_name} cannot be instantiated while writing '{path}'")]
    NotInstantiable { type_name: String, path: String },

    /// Neither a constructor nor a shallow-copy contract is available
    #[error("Type {type_name} is not cloneable: no constructor and no shallow copy")]
    NotCloneable { type_name: String },

    // ===== Accessor Errors =====
    /// A getter or setter faulted, or the node was already borrowed
    #[error("Access to '{attribute}' on {type_name} failed: {reason}")]
    AccessFailed {
        type_name: String,
        attribute: String,
        reason: String,
    },

    /// A typed setter received a value of the wrong shape
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    // ===== Generic Errors =====
    /// Marshal/unmarshal round trip of an opaque value failed
    #[error("Marshal round trip failed for {type_name}: {reason}")]
    Marshal { type_name: String, reason: String },

    /// Navigator configuration could not be parsed
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl GraphError {
    /// Attach the full path expression to errors raised below the resolver
    ///
    /// Leaves an already populated path untouched.
    pub fn at_path(mut self, full_path: &str) -> Self {
        match &mut self {
            GraphError::AttributeNotFound { path, .. }
            | GraphError::AttributeReadOnly { path, .. }
            | GraphError::NotInstantiable { path, .. } => {
                if path.is_empty() {
                    *path = full_path.to_string();
                }
            }
            _ => {}
        }
        self
    }

    /// The canonical kind of this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            GraphError::AttributeNotFound { .. } | GraphError::AttributeReadOnly { .. } => {
                ExErrorKind::AttributeNotFound
            }
            GraphError::BrokenPath { .. } => ExErrorKind::BrokenPath,
            GraphError::IndexOutOfRange { .. } => ExErrorKind::IndexOutOfRange,
            GraphError::InvalidPathSegment { .. } => ExErrorKind::InvalidPathSegment,
            GraphError::NotInstantiable { .. } => ExErrorKind::NotInstantiable,
            GraphError::NotCloneable { .. } => ExErrorKind::NotCloneable,
            GraphError::AccessFailed { .. } => ExErrorKind::AccessFailed,
            GraphError::TypeMismatch { .. } => ExErrorKind::TypeMismatch,
            GraphError::Marshal { .. } => ExErrorKind::Serialization,
            GraphError::InvalidConfig { .. } => ExErrorKind::InvalidConfig,
        }
    }
}

/// Conversion from GraphError to ExError
impl From<GraphError> for ExError {
    fn from(err: GraphError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let ex = ExError::new(kind).with_message(message);
        match err {
            GraphError::AttributeNotFound {
                type_name,
                attribute,
                path,
            }
            | GraphError::AttributeReadOnly {
                type_name,
                attribute,
                path,
            } => {
                let ex = ex.with_type_name(type_name).with_segment(attribute);
                if path.is_empty() {
                    ex
                } else {
                    ex.with_path(path)
                }
            }
            GraphError::BrokenPath { path, segment }
            | GraphError::IndexOutOfRange { path, segment, .. }
            | GraphError::InvalidPathSegment { path, segment, .. } => {
                ex.with_path(path).with_segment(segment)
            }
            GraphError::NotInstantiable { type_name, path } => {
                ex.with_type_name(type_name).with_path(path)
            }
            GraphError::NotCloneable { type_name } | GraphError::Marshal { type_name, .. } => {
                ex.with_type_name(type_name)
            }
            GraphError::AccessFailed {
                type_name,
                attribute,
                ..
            } => ex.with_type_name(type_name).with_segment(attribute),
            GraphError::TypeMismatch { .. } | GraphError::InvalidConfig { .. } => ex,
        }
    }
}

impl From<&GraphError> for ExError {
    fn from(err: &GraphError) -> Self {
        err.clone().into()
    }
}

impl From<&ExError> for ExError {
    fn from(err: &ExError) -> Self {
        err.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphError::BrokenPath {
            path: "customer.name".to_string(),
            segment: "name".to_string(),
        };
        assert!(err.to_string().contains("customer.name"));
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn test_read_only_maps_to_attribute_not_found() {
        let err = GraphError::AttributeReadOnly {
            type_name: "Order".to_string(),
            attribute: "total".to_string(),
            path: String::new(),
        };
        assert_eq!(err.kind(), ExErrorKind::AttributeNotFound);
    }

    #[test]
    fn test_at_path_fills_only_empty_paths() {
        let err = GraphError::AttributeNotFound {
            type_name: "Order".to_string(),
            attribute: "nope".to_string(),
            path: String::new(),
        }
        .at_path("customer.nope");

        match err.clone().at_path("other") {
            GraphError::AttributeNotFound { path, .. } => assert_eq!(path, "customer.nope"),
            other => panic!("unexpected {other:?}"),
        }
        let ex: ExError = err.into();
        assert_eq!(ex.path(), Some("customer.nope"));
    }

    #[test]
    fn test_ex_error_display_includes_code_and_context() {
        let ex = ExError::new(ExErrorKind::IndexOutOfRange)
            .with_op("resolve")
            .with_path("lines[5].qty")
            .with_message("Index 5 out of range");
        let rendered = ex.to_string();
        assert!(rendered.starts_with("[ERR_INDEX_OUT_OF_RANGE]"));
        assert!(rendered.contains("resolve"));
        assert!(rendered.contains("lines[5].qty"));
    }

    #[test]
    fn test_only_fallback_is_diagnostic() {
        assert!(ExErrorKind::CloneFallbackUsed.is_diagnostic());
        assert!(!ExErrorKind::NotCloneable.is_diagnostic());
    }
}
