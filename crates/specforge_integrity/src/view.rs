//! Implementation tree view.
//!
//! The only way the checker and the scheduler touch real code. Given a
//! qualified location the view answers "exists", "which file", "what
//! signature", and "invoke with arguments". The mechanism varies per target
//! language; `RegistryView` is the in-process registration-based analog of
//! dynamic import.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

/// One declared parameter as observed on an implementation
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    /// Parameter name
    pub name: String,
    /// Rendered parameter type
    pub rendered_type: String,
    /// Whether the parameter may be omitted
    pub optional: bool,
    /// Declared default value
    pub default: Option<Value>,
}

impl ParamInfo {
    /// A required parameter with the given name and rendered type
    #[must_use]
    pub fn required(name: &str, rendered_type: &str) -> Self {
        Self {
            name: name.to_string(),
            rendered_type: rendered_type.to_string(),
            optional: false,
            default: None,
        }
    }

    /// Make the parameter optional with a default
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.optional = true;
        self.default = Some(default);
        self
    }
}

/// Signature observed on an implementation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FnSignature {
    /// Ordered parameters
    pub params: Vec<ParamInfo>,
    /// Rendered return type, when known
    pub ret: Option<String>,
}

/// Error from invoking an implementation through the view
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    /// Entry exists but carries no callable
    #[error("'{path}' is registered without a callable")]
    NotInvokable {
        /// Qualified location
        path: String,
    },
    /// Location is not registered at all
    #[error("'{path}' is not registered")]
    Unknown {
        /// Qualified location
        path: String,
    },
    /// The implementation raised
    #[error("'{path}' raised: {message}")]
    Raised {
        /// Qualified location
        path: String,
        /// Error message from the implementation
        message: String,
    },
}

/// Error from registry mutation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// An entry with the same qualified path already exists
    #[error("implementation already registered: {path}")]
    AlreadyRegistered {
        /// Qualified location
        path: String,
    },
}

/// Callable backing a registered implementation
pub type ImplFn = Arc<dyn Fn(&IndexMap<String, Value>) -> Result<Value, String> + Send + Sync>;

/// One registered implementation
#[derive(Clone)]
pub struct ImplEntry {
    /// Qualified location, `module.path:function`
    pub path: String,
    /// File the implementation lives in
    pub file: String,
    /// Observed signature, when introspection is available
    pub signature: Option<FnSignature>,
    /// The callable itself; entries without one answer metadata queries but
    /// fail invocation
    pub callable: Option<ImplFn>,
}

impl ImplEntry {
    /// Metadata-only entry
    #[must_use]
    pub fn new(path: &str, file: &str) -> Self {
        Self {
            path: path.to_string(),
            file: file.to_string(),
            signature: None,
            callable: None,
        }
    }

    /// Attach the observed signature
    #[must_use]
    pub fn with_signature(mut self, signature: FnSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Attach a callable
    #[must_use]
    pub fn with_callable(mut self, callable: ImplFn) -> Self {
        self.callable = Some(callable);
        self
    }
}

/// Reflection-like view over implemented code
pub trait ImplementationView: Send + Sync {
    /// Whether the qualified location is loadable
    fn exists(&self, path: &str) -> bool;

    /// File the implementation actually lives in
    fn locate(&self, path: &str) -> Option<String>;

    /// Observed signature of the implementation
    fn signature(&self, path: &str) -> Option<FnSignature>;

    /// Invoke the implementation with named arguments
    ///
    /// # Errors
    ///
    /// `Unknown` / `NotInvokable` for missing entries, `Raised` when the
    /// implementation itself fails.
    fn invoke(&self, path: &str, args: &IndexMap<String, Value>) -> Result<Value, InvokeError>;
}

/// In-process implementation registry.
///
/// Generated or hand-written code registers its functions here; lookups are
/// by qualified path.
#[derive(Default, Clone)]
pub struct RegistryView {
    entries: IndexMap<String, ImplEntry>,
}

impl RegistryView {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRegistered` if the path is taken.
    pub fn register(&mut self, entry: ImplEntry) -> Result<(), RegistryError> {
        if self.entries.contains_key(&entry.path) {
            return Err(RegistryError::AlreadyRegistered {
                path: entry.path.clone(),
            });
        }
        self.entries.insert(entry.path.clone(), entry);
        Ok(())
    }

    /// Number of registered implementations
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

impl ImplementationView for RegistryView {
    fn exists(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    fn locate(&self, path: &str) -> Option<String> {
        self.entries.get(path).map(|e| e.file.clone())
    }

    fn signature(&self, path: &str) -> Option<FnSignature> {
        self.entries.get(path).and_then(|e| e.signature.clone())
    }

    fn invoke(&self, path: &str, args: &IndexMap<String, Value>) -> Result<Value, InvokeError> {
        let entry = self.entries.get(path).ok_or_else(|| InvokeError::Unknown {
            path: path.to_string(),
        })?;
        let callable = entry.callable.as_ref().ok_or_else(|| {
            InvokeError::NotInvokable {
                path: path.to_string(),
            }
        })?;
        callable(args).map_err(|message| InvokeError::Raised {
            path: path.to_string(),
            message,
        })
    }
}
