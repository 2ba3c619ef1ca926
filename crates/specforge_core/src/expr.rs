//! Type expressions: the recursive tagged union describing a type shape.
//!
//! Exactly one kind applies per node; the loader rejects nodes with zero or
//! multiple kinds before an expression ever reaches the resolver.

use serde::{Deserialize, Serialize};

/// A recursive type expression from the specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// Reference to a native (target-language) type, e.g. `builtins:int`
    Native {
        /// Module the type lives in
        module: String,
        /// Type name within the module
        name: String,
    },
    /// Reference to a `DataTypeDef` by id
    Ref {
        /// Referenced definition id
        id: String,
    },
    /// Parameterized container type
    Generic(GenericType),
    /// Closed restricted-value type
    Literal {
        /// The allowed values
        values: Vec<LiteralValue>,
    },
    /// Union of alternatives; a single null-like alternative means optional
    Union {
        /// The alternative expressions
        alternatives: Vec<TypeExpr>,
    },
}

impl TypeExpr {
    /// Build a native reference
    #[must_use]
    pub fn native(module: &str, name: &str) -> Self {
        Self::Native {
            module: module.to_string(),
            name: name.to_string(),
        }
    }

    /// Build a datatype reference
    #[must_use]
    pub fn reference(id: &str) -> Self {
        Self::Ref { id: id.to_string() }
    }

    /// The null-like expression used as a Union alternative for optionality
    #[must_use]
    pub fn null() -> Self {
        Self::native("builtins", "None")
    }

    /// Whether this expression denotes the null type
    #[must_use]
    pub fn is_null_like(&self) -> bool {
        matches!(
            self,
            Self::Native { module, name }
                if module == "builtins" && (name == "None" || name == "NoneType")
        )
    }

    /// Short label for diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Native { .. } => "native",
            Self::Ref { .. } => "datatype_ref",
            Self::Generic(_) => "generic",
            Self::Literal { .. } => "literal",
            Self::Union { .. } => "union",
        }
    }
}

/// Container kind of a generic type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// Ordered homogeneous sequence
    List,
    /// Key/value mapping
    Dict,
    /// Unordered unique elements
    Set,
    /// Fixed-arity heterogeneous sequence
    Tuple,
}

impl Container {
    /// Parse a container name as it appears in the spec tree
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "list" => Some(Self::List),
            "dict" => Some(Self::Dict),
            "set" => Some(Self::Set),
            "tuple" => Some(Self::Tuple),
            _ => None,
        }
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Dict => write!(f, "dict"),
            Self::Set => write!(f, "set"),
            Self::Tuple => write!(f, "tuple"),
        }
    }
}

/// A parameterized container type
///
/// `List`/`Set` use `element`, `Dict` uses `key` + `value`, `Tuple` uses
/// `elements`. Missing sub-expressions resolve to the dynamic type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericType {
    /// Container kind
    pub container: Container,
    /// Element type for list/set
    pub element: Option<Box<TypeExpr>>,
    /// Key type for dict
    pub key: Option<Box<TypeExpr>>,
    /// Value type for dict
    pub value: Option<Box<TypeExpr>>,
    /// Element types for tuple
    pub elements: Vec<TypeExpr>,
}

impl GenericType {
    /// A list of the given element type
    #[must_use]
    pub fn list(element: TypeExpr) -> Self {
        Self {
            container: Container::List,
            element: Some(Box::new(element)),
            key: None,
            value: None,
            elements: Vec::new(),
        }
    }

    /// A dict with the given key and value types
    #[must_use]
    pub fn dict(key: TypeExpr, value: TypeExpr) -> Self {
        Self {
            container: Container::Dict,
            element: None,
            key: Some(Box::new(key)),
            value: Some(Box::new(value)),
            elements: Vec::new(),
        }
    }

    /// A set of the given element type
    #[must_use]
    pub fn set(element: TypeExpr) -> Self {
        Self {
            container: Container::Set,
            element: Some(Box::new(element)),
            key: None,
            value: None,
            elements: Vec::new(),
        }
    }

    /// A tuple of the given element types
    #[must_use]
    pub fn tuple(elements: Vec<TypeExpr>) -> Self {
        Self {
            container: Container::Tuple,
            element: None,
            key: None,
            value: None,
            elements,
        }
    }
}

/// Scalar value allowed in a `Literal` expression or enum member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    /// String literal
    Str(String),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// Boolean literal
    Bool(bool),
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl LiteralValue {
    /// Convert a JSON scalar; returns `None` for arrays, objects and null
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            _ => None,
        }
    }

    /// Whether a JSON value equals this literal
    #[must_use]
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match (self, value) {
            (Self::Str(s), serde_json::Value::String(v)) => s == v,
            (Self::Bool(b), serde_json::Value::Bool(v)) => b == v,
            (Self::Int(i), serde_json::Value::Number(n)) => n.as_i64() == Some(*i),
            (Self::Float(x), serde_json::Value::Number(n)) => n.as_f64() == Some(*x),
            _ => false,
        }
    }
}
