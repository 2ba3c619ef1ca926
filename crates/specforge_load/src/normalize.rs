//! Metadata-contributor registry.
//!
//! Contributors are pure `SpecIR -> SpecIR` functions keyed by a metadata
//! kind. New kinds register without touching the dispatch itself; the
//! built-in contributors distribute top-level examples and generators onto
//! the datatypes they describe.

use indexmap::IndexMap;

use specforge_core::{SpecIR, TypeExpr};

/// A pure normalization step over the IR
pub type Contributor = fn(&SpecIR) -> SpecIR;

/// Dispatch table of contributors keyed by metadata kind
#[derive(Default)]
pub struct ContributorRegistry {
    entries: IndexMap<String, Contributor>,
}

impl ContributorRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in contributors installed
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("examples", distribute_examples);
        registry.register("generators", distribute_generators);
        registry
    }

    /// Register a contributor for a metadata kind, replacing any previous
    /// entry for the same kind
    pub fn register(&mut self, kind: &str, contributor: Contributor) {
        self.entries.insert(kind.to_string(), contributor);
    }

    /// Registered kinds, in registration order
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Apply every contributor in registration order
    #[must_use]
    pub fn apply_all(&self, ir: &SpecIR) -> SpecIR {
        let mut current = ir.clone();
        for (kind, contributor) in &self.entries {
            tracing::debug!(kind, "applying contributor");
            current = contributor(&current);
        }
        current
    }
}

/// Attach top-level examples to the datatypes they reference.
#[must_use]
pub fn distribute_examples(ir: &SpecIR) -> SpecIR {
    let mut out = ir.clone();
    for example in &ir.examples {
        if example.datatype_ref.is_empty() {
            continue;
        }
        if let Some(def) = out.datatypes.get_mut(&example.datatype_ref) {
            if !def.example_refs.contains(&example.id) {
                def.example_refs.push(example.id.clone());
            }
        }
    }
    out
}

/// Attach generators to the datatype their return type references.
#[must_use]
pub fn distribute_generators(ir: &SpecIR) -> SpecIR {
    let mut out = ir.clone();
    for generator in ir.generators.values() {
        let Some(TypeExpr::Ref { id }) = &generator.ret else {
            continue;
        };
        if let Some(def) = out.datatypes.get_mut(id) {
            if !def.generator_refs.contains(&generator.id) {
                def.generator_refs.push(generator.id.clone());
            }
        }
    }
    out
}
