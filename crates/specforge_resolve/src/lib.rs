//! Specforge Type Resolver
//!
//! Turns specification type expressions into rendered target types plus the
//! set of references each one requires. Pure functions over an immutable
//! `SpecIR`; safe for concurrent invocation without synchronization.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frame;
pub mod resolver;

pub use frame::{ColumnProvenance, MergedColumn, MergedFrame, resolve_frame};
pub use resolver::{
    Resolved, ReferenceSet, TypeRef, rendered_param_type, resolve, resolve_model_fields,
    resolve_return_type,
};
