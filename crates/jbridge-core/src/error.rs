//! Error type shared by every bridge operation.
//!
//! Descriptor problems are rejected at compile time and never reach this
//! type. Everything here is a runtime condition that propagates straight to
//! the call site that triggered it:
//!
//! ```text
//! Error
//! ├── ClassNotFound / MemberNotFound   - lookup failures, cached per call site
//! ├── IndexOutOfRange                  - array wrapper bounds
//! ├── NullReference / TypeMismatch     - return value conversion
//! ├── MalformedDescriptor              - descriptor text parsing
//! ├── NotInitialized / AlreadyInitialized / VmMismatch / Attach
//! └── Runtime                          - failures reported by the foreign runtime
//! ```

use thiserror::Error;

use crate::member::MemberKind;

/// Result alias used throughout the bridge.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while talking to the foreign runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The runtime has no class with this internal name.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// The class exists but has no member matching name and signature.
    #[error("{kind} not found: {class}.{name}{signature}")]
    MemberNotFound {
        kind: MemberKind,
        class: String,
        name: String,
        signature: String,
    },

    /// Array access outside `[0, len)`.
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A null handle where an object was required.
    #[error("null reference where {0} was expected")]
    NullReference(&'static str),

    /// The runtime produced a value of a different kind than declared.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Descriptor text that does not follow the grammar.
    #[error("malformed descriptor '{descriptor}': {reason}")]
    MalformedDescriptor {
        descriptor: String,
        reason: &'static str,
    },

    /// An operation needed the process VM before `init` was called.
    #[error("bridge is not initialized")]
    NotInitialized,

    /// `init` was called a second time.
    #[error("bridge is already initialized")]
    AlreadyInitialized,

    /// A call site resolved under one VM was used with another.
    #[error("call site {0} was resolved under a different VM")]
    VmMismatch(String),

    /// The current thread could not be attached to the VM.
    #[error("thread attach failed: {0}")]
    Attach(String),

    /// Any other failure reported by the foreign runtime.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Returns true for failures that are cached for the life of a call site.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Error::ClassNotFound(_) | Error::MemberNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_not_found_display() {
        let err = Error::MemberNotFound {
            kind: MemberKind::Method,
            class: "java/io/PrintStream".into(),
            name: "println".into(),
            signature: "(I)V".into(),
        };
        assert_eq!(
            err.to_string(),
            "method not found: java/io/PrintStream.println(I)V"
        );
        assert!(err.is_lookup_failure());
    }

    #[test]
    fn index_out_of_range_display() {
        let err = Error::IndexOutOfRange { index: 4, len: 4 };
        assert_eq!(err.to_string(), "index 4 out of range for array of length 4");
        assert!(!err.is_lookup_failure());
    }
}
