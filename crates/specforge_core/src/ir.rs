//! The validated in-memory specification model.
//!
//! All cross-references are by id, never by direct object reference, which
//! keeps the graphs acyclic-checkable and the whole IR serializable. The
//! aggregate `SpecIR` is built once per load and treated as immutable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::{GenericType, LiteralValue, TypeExpr};

/// Specification metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaSpec {
    /// Project name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Specification version string
    pub version: String,
}

impl Default for MetaSpec {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            description: String::new(),
            version: "1.0".to_string(),
        }
    }
}

/// One field of a structural model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeExpr,
    /// Whether the field must be present
    pub required: bool,
    /// Field description
    pub description: String,
}

/// A named structural model: an ordered set of typed fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Ordered fields
    pub fields: Vec<FieldSpec>,
}

/// One member of an enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    /// Member name
    pub name: String,
    /// Member value
    pub value: LiteralValue,
    /// Member description
    pub description: String,
}

/// An enumeration definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumSpec {
    /// Base type of the values ("str", "int", "float")
    pub base_type: String,
    /// Ordered members
    pub members: Vec<EnumMember>,
}

/// Monotonicity constraint on a frame index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Monotonic {
    /// No constraint
    #[default]
    None,
    /// Values must be strictly increasing
    Increasing,
    /// Values must be strictly decreasing
    Decreasing,
}

/// Single-index rule of a tabular frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRule {
    /// Index name
    pub name: String,
    /// Index dtype
    pub dtype: String,
    /// Whether null entries are allowed
    pub nullable: bool,
    /// Whether entries must be unique
    pub unique: bool,
    /// Monotonicity constraint
    pub monotonic: Monotonic,
    /// Whether values are coerced to the dtype
    pub coerce: bool,
    /// Description
    pub description: String,
}

/// One level of a multi-level index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexLevel {
    /// Level name
    pub name: String,
    /// Level dtype
    pub dtype: String,
    /// Closed value set, empty when unrestricted
    pub allowed_values: Vec<String>,
    /// Description
    pub description: String,
}

/// Column rule of a tabular frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// Column name
    pub name: String,
    /// Column dtype
    pub dtype: String,
    /// Whether null entries are allowed
    pub nullable: bool,
    /// Whether entries must be unique
    pub unique: bool,
    /// Whether values are coerced to the dtype
    pub coerce: bool,
    /// Column-level check rules
    pub checks: Vec<Value>,
    /// Description
    pub description: String,
}

impl ColumnRule {
    /// A plain column with the given name and dtype
    #[must_use]
    pub fn new(name: &str, dtype: &str) -> Self {
        Self {
            name: name.to_string(),
            dtype: dtype.to_string(),
            nullable: false,
            unique: false,
            coerce: true,
            checks: Vec::new(),
            description: String::new(),
        }
    }

    /// Set nullability
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Schema for 2-D tabular data: index, multi-index and column rules.
///
/// `row_model` optionally names a `Model` definition whose fields seed
/// column rules; explicit rules take precedence over inferred ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FrameSchema {
    /// Single-index rule
    pub index: Option<IndexRule>,
    /// Multi-level index rules
    pub multi_index: Vec<IndexLevel>,
    /// Explicit column rules
    pub columns: Vec<ColumnRule>,
    /// Frame-level check rules
    pub checks: Vec<Value>,
    /// Id of a `Model` definition seeding column rules
    pub row_model: Option<String>,
    /// Reject columns not named by a rule
    pub strict: bool,
    /// Coerce values to declared dtypes
    pub coerce: bool,
    /// Enforce declared column order
    pub ordered: bool,
}

/// The kind of a datatype definition; exactly one applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataTypeKind {
    /// Named structural model
    Model(ModelSpec),
    /// Enumeration
    Enum(EnumSpec),
    /// Alias of another type expression
    Alias(TypeExpr),
    /// Parameterized container
    Generic(GenericType),
    /// Tabular-frame schema
    Frame(FrameSchema),
}

impl DataTypeKind {
    /// Short label for diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Model(_) => "model",
            Self::Enum(_) => "enum",
            Self::Alias(_) => "type_alias",
            Self::Generic(_) => "generic",
            Self::Frame(_) => "frame_schema",
        }
    }
}

/// A named spec-level datatype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataTypeDef {
    /// Definition id
    pub id: String,
    /// Description
    pub description: String,
    /// The one kind this definition has
    pub kind: DataTypeKind,
    /// Ids of check functions guarding this type
    pub check_refs: Vec<String>,
    /// Ids of examples attached to this type (filled by the normalizer)
    pub example_refs: Vec<String>,
    /// Ids of generators producing this type (filled by the normalizer)
    pub generator_refs: Vec<String>,
}

impl DataTypeDef {
    /// Create a definition with no attached checks, examples or generators
    #[must_use]
    pub fn new(id: &str, kind: DataTypeKind) -> Self {
        Self {
            id: id.to_string(),
            description: String::new(),
            kind,
            check_refs: Vec::new(),
            example_refs: Vec::new(),
            generator_refs: Vec::new(),
        }
    }
}

/// One declared parameter of a function-like definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeExpr,
    /// Whether the parameter may be omitted
    pub optional: bool,
    /// Default value, if any
    pub default: Option<Value>,
    /// Description
    pub description: String,
}

impl ParamSpec {
    /// A required parameter with the given name and type
    #[must_use]
    pub fn required(name: &str, ty: TypeExpr) -> Self {
        Self {
            name: name.to_string(),
            ty,
            optional: false,
            default: None,
            description: String::new(),
        }
    }
}

/// Role of a function-like definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionRole {
    /// Data transformation stage candidate
    Transform,
    /// Validation predicate over one datatype
    Check,
    /// Example-data producer
    Generator,
}

impl std::fmt::Display for FunctionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transform => write!(f, "transform"),
            Self::Check => write!(f, "check"),
            Self::Generator => write!(f, "generator"),
        }
    }
}

/// Shared shape of transform, check and generator declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Definition id
    pub id: String,
    /// Role of this definition
    pub role: FunctionRole,
    /// Description
    pub description: String,
    /// Fully-qualified target location, `module.path:function`
    pub impl_path: String,
    /// Declared source file the implementation must live in
    pub file_path: String,
    /// Ordered parameters
    pub params: Vec<ParamSpec>,
    /// Return type; checks return `bool` implicitly when absent
    pub ret: Option<TypeExpr>,
    /// Ordered summary of the intended logic (non-behavioral guidance)
    pub logic: Vec<String>,
    /// Free-form implementation guidance
    pub guidance: String,
    /// The only validations the implementation is expected to perform;
    /// empty means none beyond what underlying operations naturally raise
    pub validations: Vec<String>,
}

impl FunctionDef {
    /// Function name extracted from `impl_path`
    #[must_use]
    pub fn unit_name(&self) -> &str {
        match self.impl_path.rsplit_once(':') {
            Some((_, name)) => name,
            None => &self.impl_path,
        }
    }

    /// Module part of `impl_path`
    #[must_use]
    pub fn module_path(&self) -> &str {
        match self.impl_path.rsplit_once(':') {
            Some((module, _)) => module,
            None => "",
        }
    }

    /// Whether `impl_path` has the required `module:function` shape
    #[must_use]
    pub fn has_valid_impl_path(&self) -> bool {
        match self.impl_path.split_once(':') {
            Some((module, name)) => !module.is_empty() && !name.is_empty(),
            None => false,
        }
    }
}

/// Candidate selection policy of a DAG stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Exactly one candidate, always run
    Single,
    /// Exactly one of several candidates, chosen per run
    Exclusive,
    /// One or more candidates run, outputs optionally collected
    Multiple,
}

impl SelectionMode {
    /// Parse a selection mode as it appears in the spec tree
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "single" => Some(Self::Single),
            "exclusive" => Some(Self::Exclusive),
            "multiple" => Some(Self::Multiple),
            _ => None,
        }
    }
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Exclusive => write!(f, "exclusive"),
            Self::Multiple => write!(f, "multiple"),
        }
    }
}

/// One node of the processing dependency graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagStage {
    /// Stage id
    pub stage_id: String,
    /// Description
    pub description: String,
    /// Candidate selection policy
    pub selection_mode: SelectionMode,
    /// Input datatype id
    pub input_type: String,
    /// Output datatype id
    pub output_type: String,
    /// Candidate transform ids
    pub candidates: Vec<String>,
    /// Upper bound on selected candidates (`Multiple` only)
    pub max_select: Option<usize>,
    /// Default candidate for `Exclusive` selection
    pub default_transform_id: Option<String>,
    /// Aggregate candidate outputs keyed by candidate id
    pub collect_output: bool,
    /// Expose the stage output in the run report
    pub publish_output: bool,
    /// Explicit upstream stage ids; suppresses edge inference
    pub depends_on: Vec<String>,
}

/// A declared example payload for a datatype or transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleCase {
    /// Example id
    pub id: String,
    /// Description
    pub description: String,
    /// Datatype the input must conform to
    pub datatype_ref: String,
    /// Transform the example exercises, if any
    pub transform_ref: String,
    /// Input payload
    pub input: Value,
    /// Expected output payload
    pub expected: Value,
}

/// The aggregate root: every section of the specification, validated.
///
/// Maps are keyed by id and iterate in declaration order. Re-running any
/// component against one `SpecIR` is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SpecIR {
    /// Specification metadata
    pub meta: MetaSpec,
    /// Datatype definitions
    pub datatypes: IndexMap<String, DataTypeDef>,
    /// Transform definitions
    pub transforms: IndexMap<String, FunctionDef>,
    /// Check definitions
    pub checks: IndexMap<String, FunctionDef>,
    /// Generator definitions
    pub generators: IndexMap<String, FunctionDef>,
    /// Top-level examples
    pub examples: Vec<ExampleCase>,
    /// Dependency-graph stages, in declaration order
    pub stages: IndexMap<String, DagStage>,
}

impl SpecIR {
    /// Look up a datatype definition by id
    #[must_use]
    pub fn datatype(&self, id: &str) -> Option<&DataTypeDef> {
        self.datatypes.get(id)
    }

    /// Look up a transform by id
    #[must_use]
    pub fn transform(&self, id: &str) -> Option<&FunctionDef> {
        self.transforms.get(id)
    }

    /// Look up any function-like definition (transform, check, generator)
    #[must_use]
    pub fn function(&self, id: &str) -> Option<&FunctionDef> {
        self.transforms
            .get(id)
            .or_else(|| self.checks.get(id))
            .or_else(|| self.generators.get(id))
    }

    /// Iterate every function-like definition in declaration order
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.transforms
            .values()
            .chain(self.checks.values())
            .chain(self.generators.values())
    }

    /// Examples attached to the given datatype
    #[must_use]
    pub fn examples_for(&self, datatype_id: &str) -> Vec<&ExampleCase> {
        self.examples
            .iter()
            .filter(|ex| ex.datatype_ref == datatype_id)
            .collect()
    }

    /// Generators whose return type is the given datatype
    #[must_use]
    pub fn generators_returning(&self, datatype_id: &str) -> Vec<&FunctionDef> {
        self.generators
            .values()
            .filter(|g| matches!(&g.ret, Some(TypeExpr::Ref { id }) if id == datatype_id))
            .collect()
    }
}
