//! Specforge Integrity Checker
//!
//! Recomputes expected shapes from the specification and compares them
//! against a reflection-like view of the implemented code. Findings are
//! never fatal and always fully collected: one bad definition never
//! suppresses findings about others.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checker;
pub mod validator;
pub mod view;

pub use checker::{check, Finding, FindingCategory, FindingsReport};
pub use validator::{SchemaValidator, ValueValidator};
pub use view::{
    FnSignature, ImplEntry, ImplFn, ImplementationView, InvokeError, ParamInfo, RegistryError,
    RegistryView,
};
