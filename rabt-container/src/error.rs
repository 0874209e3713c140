//! Error types for Rabt container operations.
//!
//! Every failure is fatal to the call that raised it. Errors raised while a
//! resolution is in progress carry the chain of keys being resolved, outer
//! to inner, so a failure deep in a graph still points at its origin.

use std::fmt;

use rabt_support::rendering::{count_noun, render_resolve_context};

/// Main error type for all Rabt operations.
#[derive(Debug, thiserror::Error)]
pub enum RabtError {
    /// A value offered as a binding target cannot be bound to.
    #[error("{key} {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// A binding was built before any factory was configured for it.
    #[error("No factory for binding {keys}")]
    NoFactory { keys: String },

    /// Requested key has no binding and cannot be constructed.
    #[error("{}", .0)]
    UnresolvableKey(UnresolvableKeyError),

    /// A build produced no value at all.
    #[error("{key} resolved to undefined{}", render_resolve_context(.chain))]
    UndefinedResult { key: String, chain: Vec<String> },

    /// The resolution stack reached its ceiling, most likely a cycle.
    #[error("{}", .0)]
    DepthExceeded(DepthExceededError),

    /// A value does not satisfy the nominal type it was requested as.
    #[error("{}", .0)]
    TypeMismatch(TypeMismatchError),

    /// A dependency list does not fit the callable's declared parameters.
    #[error("{}", .0)]
    ArityMismatch(ArityMismatchError),

    /// A dependency list has a hole.
    #[error("{callee} has an undefined dependency at position {index}")]
    UndefinedDependency { callee: String, index: usize },

    /// A body asked for a positional argument that was never supplied.
    #[error("{callee} expected an argument at position {index}, but received {}", count_noun(*.received, "argument", "arguments"))]
    MissingArgument {
        callee: String,
        index: usize,
        received: usize,
    },

    /// A container referenced weakly was dropped before it was needed.
    #[error("Container was dropped before {what} could be resolved")]
    ContainerDropped { what: String },

    /// One or more disposable values failed during a disposal sweep.
    #[error("{}", .0)]
    DisposalFailed(DisposalFailedError),

    /// A user factory failed.
    #[error("Factory failed: {0}")]
    Factory(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RabtError {
    /// Wraps an arbitrary error raised inside a factory body.
    pub fn factory(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        RabtError::Factory(error.into())
    }
}

/// Error when a key has no binding and is not auto-constructible.
///
/// Includes the resolution chain and similar registered keys.
#[derive(Debug)]
pub struct UnresolvableKeyError {
    /// The key that was requested
    pub key: String,
    /// Keys being resolved when the failure happened, outermost first
    pub chain: Vec<String>,
    /// Similar keys that ARE registered
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnresolvableKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to resolve key {}{}",
            self.key,
            render_resolve_context(&self.chain)
        )?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// Error when the resolution stack is full.
///
/// Shows the whole stack so the repeating part of a cycle is visible.
#[derive(Debug)]
pub struct DepthExceededError {
    /// The configured ceiling
    pub max_depth: usize,
    /// The full resolution stack, outermost first
    pub chain: Vec<String>,
}

impl fmt::Display for DepthExceededError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Maximum dependency depth of {} reached{}",
            self.max_depth,
            render_resolve_context(&self.chain)
        )?;
        write!(
            f,
            "\n  Hint: Look for a dependency cycle, or use a factory to break it"
        )
    }
}

/// Error when a value is not of the requested nominal type.
#[derive(Debug)]
pub struct TypeMismatchError {
    /// The type the key or caller asked for
    pub expected: String,
    /// The type that was actually produced
    pub found: String,
    /// Keys being resolved when the check failed, outermost first
    pub chain: Vec<String>,
}

impl fmt::Display for TypeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Value does not inherit from {} (found {}){}",
            self.expected,
            self.found,
            render_resolve_context(&self.chain)
        )?;
        write!(
            f,
            "\n  Hint: Declare the relationship with Instance::implements::<{}>()",
            self.expected
        )
    }
}

/// Error when a dependency list does not match a callable's parameters.
#[derive(Debug)]
pub struct ArityMismatchError {
    pub callee: String,
    pub dependencies: usize,
    pub params: usize,
}

impl fmt::Display for ArityMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} has {}, but {}",
            self.callee,
            count_noun(self.dependencies, "dependency", "dependencies"),
            count_noun(self.params, "parameter", "parameters"),
        )
    }
}

/// Error collecting every failure of a disposal sweep.
#[derive(Debug)]
pub struct DisposalFailedError {
    pub failures: Vec<RabtError>,
}

impl fmt::Display for DisposalFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Disposal failed for {}",
            count_noun(self.failures.len(), "value", "values")
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {failure}")?;
        }
        Ok(())
    }
}

/// Convenient Result type for Rabt operations.
pub type Result<T> = std::result::Result<T, RabtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolvable_key_display() {
        let err = RabtError::UnresolvableKey(UnresolvableKeyError {
            key: "'unregistered'".into(),
            chain: vec!["NamedDependant".into()],
            suggestions: vec!["'registered'".into()],
        });

        let msg = format!("{err}");
        assert!(msg.starts_with(
            "Failed to resolve key 'unregistered' while attempting to resolve NamedDependant"
        ));
        assert!(msg.contains("Did you mean"));
        assert!(msg.contains("'registered'"));
    }

    #[test]
    fn undefined_result_without_chain() {
        let err = RabtError::UndefinedResult {
            key: "Widget".into(),
            chain: vec![],
        };
        assert_eq!(format!("{err}"), "Widget resolved to undefined");
    }

    #[test]
    fn undefined_result_with_chain() {
        let err = RabtError::UndefinedResult {
            key: "Engine".into(),
            chain: vec!["Car".into(), "Drivetrain".into()],
        };
        assert_eq!(
            format!("{err}"),
            "Engine resolved to undefined while attempting to resolve Car → Drivetrain"
        );
    }

    #[test]
    fn depth_exceeded_display() {
        let err = RabtError::DepthExceeded(DepthExceededError {
            max_depth: 20,
            chain: vec!["A".into(), "A".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Maximum dependency depth of 20 reached"));
        assert!(msg.contains("A → A"));
    }

    #[test]
    fn arity_mismatch_display() {
        let err = RabtError::ArityMismatch(ArityMismatchError {
            callee: "Service".into(),
            dependencies: 1,
            params: 2,
        });
        assert_eq!(format!("{err}"), "Service has 1 dependency, but 2 parameters");
    }

    #[test]
    fn type_mismatch_display() {
        let err = RabtError::TypeMismatch(TypeMismatchError {
            expected: "Logger".into(),
            found: "String".into(),
            chain: vec![],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Value does not inherit from Logger"));
        assert!(msg.contains("String"));
    }

    #[test]
    fn disposal_failed_lists_failures() {
        let err = RabtError::DisposalFailed(DisposalFailedError {
            failures: vec![RabtError::factory("socket already closed")],
        });

        let msg = format!("{err}");
        assert!(msg.contains("1 value"));
        assert!(msg.contains("socket already closed"));
    }

    #[test]
    fn factory_error_keeps_source() {
        use std::error::Error;

        let err = RabtError::factory("boom");
        assert!(err.source().is_some());
    }
}
