//! Error types shared across the specforge workspace.

use thiserror::Error;

/// Result type for spec loading and structural validation
pub type SpecResult<T> = Result<T, SpecError>;

/// Structural error in the specification itself.
///
/// These are fatal at load time: a malformed or ambiguous IR blocks all
/// downstream work. Validation passes collect every instance instead of
/// stopping at the first.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    /// Definition declares no type kind
    #[error("definition '{id}' declares no type kind")]
    MissingKind {
        /// Offending definition id
        id: String,
    },

    /// Definition declares more than one type kind
    #[error("definition '{id}' declares multiple type kinds: {kinds:?}")]
    MultipleKinds {
        /// Offending definition id
        id: String,
        /// Kind keys that were present
        kinds: Vec<String>,
    },

    /// Type expression node with zero or multiple kind keys
    #[error("type expression in {context} must have exactly one kind, found {found:?}")]
    AmbiguousTypeExpr {
        /// Where the expression appears (definition id, parameter name)
        context: String,
        /// Kind keys that were present
        found: Vec<String>,
    },

    /// Two definitions share one id
    #[error("duplicate id '{id}'")]
    DuplicateId {
        /// The duplicated id
        id: String,
    },

    /// Reference to an id that does not exist
    #[error("'{id}' references unknown {kind} '{referenced}'")]
    DanglingReference {
        /// Definition holding the reference
        id: String,
        /// What was referenced (datatype, transform, stage)
        kind: String,
        /// The missing id
        referenced: String,
    },

    /// Stage dependency graph contains a cycle
    #[error("stage graph contains a cycle through {ids:?}")]
    CyclicStages {
        /// Stage ids on the cycle
        ids: Vec<String>,
    },

    /// Datatype not reachable from any example or generator
    #[error("definition '{id}' is unreachable from any example or generator")]
    UnreachableDefinition {
        /// Offending definition id
        id: String,
    },

    /// Implementation path not in `module:function` form
    #[error("'{id}': impl must be in 'module:function' format, got '{impl_path}'")]
    InvalidImplPath {
        /// Definition holding the path
        id: String,
        /// The malformed path
        impl_path: String,
    },

    /// Invalid frame rule (duplicate column, bad dtype)
    #[error("frame '{id}': {message}")]
    FrameRule {
        /// Frame definition id
        id: String,
        /// What is wrong
        message: String,
    },

    /// Stage-level invariant violation
    #[error("stage '{stage_id}': {message}")]
    StageRule {
        /// Offending stage id
        stage_id: String,
        /// What is wrong
        message: String,
    },

    /// Malformed section or value in the spec tree
    #[error("{context}: {message}")]
    Malformed {
        /// Section or id where parsing failed
        context: String,
        /// What is wrong
        message: String,
    },

    /// A resolution error surfaced by the bulk validation pass
    #[error(transparent)]
    Resolution(#[from] ResolveError),
}

/// Error from resolving a single type expression.
///
/// Fatal for the one expression only; bulk passes keep resolving siblings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// Referenced datatype id does not exist in the IR
    #[error("unknown type reference '{id}'")]
    UnknownReference {
        /// The missing id
        id: String,
    },

    /// More than one definition claims the referenced id
    #[error("type definition '{id}' is ambiguous: {detail}")]
    AmbiguousTypeDefinition {
        /// The contested id
        id: String,
        /// Which kinds collide
        detail: String,
    },

    /// Reference chain revisits a definition already being resolved
    #[error("cyclic type definition: {}", path.join(" -> "))]
    CyclicTypeDefinition {
        /// Definition ids along the cycle, first repeated last
        path: Vec<String>,
    },

    /// Row-model-inferred and explicit column rules cannot be reconciled
    #[error("frame '{frame}', column '{column}': conflicting rules ({detail})")]
    ConflictingColumnRule {
        /// Frame definition id
        frame: String,
        /// Column name
        column: String,
        /// Both sides of the conflict
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_error_display() {
        let err = SpecError::MissingKind {
            id: "Age".to_string(),
        };
        assert_eq!(format!("{err}"), "definition 'Age' declares no type kind");

        let err = SpecError::DanglingReference {
            id: "stage_load".to_string(),
            kind: "transform".to_string(),
            referenced: "missing_tf".to_string(),
        };
        let s = format!("{err}");
        assert!(s.contains("stage_load"));
        assert!(s.contains("missing_tf"));
    }

    #[test]
    fn test_cyclic_type_definition_names_path() {
        let err = ResolveError::CyclicTypeDefinition {
            path: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(format!("{err}"), "cyclic type definition: A -> B -> A");
    }

    #[test]
    fn test_resolve_error_wraps_into_spec_error() {
        let err: SpecError = ResolveError::UnknownReference {
            id: "Ghost".to_string(),
        }
        .into();
        assert!(format!("{err}").contains("Ghost"));
    }
}
