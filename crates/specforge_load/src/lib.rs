//! Specforge Loader
//!
//! Maps a generic nested map/list/scalar specification tree into the IR
//! model, normalizes it through the metadata-contributor registry, and
//! cross-validates every structural invariant. Load-time structural errors
//! block all downstream work; the validator collects every error instead of
//! stopping at the first.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod loader;
pub mod normalize;
pub mod validate;

pub use loader::load_spec;
pub use normalize::{ContributorRegistry, distribute_examples, distribute_generators};
pub use validate::validate_ir;

use specforge_core::{SpecError, SpecIR};

/// Load, normalize and cross-validate a specification tree.
///
/// # Errors
///
/// Returns every structural error found; a non-empty list blocks all
/// downstream work.
pub fn load_and_validate(tree: &serde_json::Value) -> Result<SpecIR, Vec<SpecError>> {
    let ir = load_spec(tree).map_err(|e| vec![e])?;
    let ir = ContributorRegistry::with_builtins().apply_all(&ir);
    let errors = validate_ir(&ir);
    if errors.is_empty() {
        Ok(ir)
    } else {
        Err(errors)
    }
}
