//! Specforge Core IR
//!
//! This crate contains the validated in-memory specification model and the
//! shared error types. All types are pure data with no I/O; a `SpecIR` is
//! built once per load and never mutated afterwards.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dtype;
pub mod error;
pub mod expr;
pub mod ir;

// Re-exports
pub use dtype::{dtype_for_native, is_valid_dtype, VALID_DTYPES};
pub use error::{ResolveError, SpecError, SpecResult};
pub use expr::{Container, GenericType, LiteralValue, TypeExpr};
pub use ir::{
    ColumnRule, DagStage, DataTypeDef, DataTypeKind, EnumMember, EnumSpec, ExampleCase, FieldSpec,
    FrameSchema, FunctionDef, FunctionRole, IndexLevel, IndexRule, MetaSpec, ModelSpec, Monotonic,
    ParamSpec, SelectionMode, SpecIR,
};
