//! Spec tree to IR conversion.
//!
//! The tree is a generic nested map/list/scalar structure; its concrete
//! serialization is an external concern. Named sections map onto the IR:
//! `meta`, `datatypes`, `transforms`, `checks`, `generators`, `examples`,
//! `dag_stages`.

use indexmap::IndexMap;
use serde_json::Value;

use specforge_core::{
    ColumnRule, Container, DagStage, DataTypeDef, DataTypeKind, EnumMember, EnumSpec, ExampleCase,
    FieldSpec, FrameSchema, FunctionDef, FunctionRole, GenericType, IndexLevel, IndexRule,
    LiteralValue, MetaSpec, ModelSpec, Monotonic, ParamSpec, SelectionMode, SpecError, SpecIR,
    SpecResult, TypeExpr,
};

/// Datatype kind keys recognized on a definition; exactly one must appear
const KIND_KEYS: &[&str] = &["model", "enum", "type_alias", "generic", "frame_schema"];

/// Type-expression kind keys; exactly one must appear per node
const EXPR_KEYS: &[&str] = &["native", "datatype_ref", "generic", "literal", "union"];

/// Convert a specification tree into the IR model.
///
/// # Errors
///
/// Returns the first structural parse error: malformed sections, definitions
/// with zero or multiple kinds, duplicate ids.
pub fn load_spec(tree: &Value) -> SpecResult<SpecIR> {
    let root = tree.as_object().ok_or_else(|| SpecError::Malformed {
        context: "spec".to_string(),
        message: "root must be a map".to_string(),
    })?;

    let meta = load_meta(root.get("meta"), root.get("version"));

    let mut ir = SpecIR {
        meta,
        ..SpecIR::default()
    };

    for entry in section_list(root.get("datatypes"), "datatypes")? {
        let def = load_datatype(entry)?;
        insert_unique(&mut ir.datatypes, def.id.clone(), def)?;
    }
    for entry in section_list(root.get("transforms"), "transforms")? {
        let def = load_function(entry, FunctionRole::Transform)?;
        insert_unique(&mut ir.transforms, def.id.clone(), def)?;
    }
    for entry in section_list(root.get("checks"), "checks")? {
        let def = load_function(entry, FunctionRole::Check)?;
        insert_unique(&mut ir.checks, def.id.clone(), def)?;
    }
    // Generators appear as a list or as a map keyed by id.
    for entry in generator_entries(root.get("generators"))? {
        let def = load_function(entry, FunctionRole::Generator)?;
        insert_unique(&mut ir.generators, def.id.clone(), def)?;
    }
    for entry in section_list(root.get("examples"), "examples")? {
        ir.examples.push(load_example(entry)?);
    }
    for entry in section_list(root.get("dag_stages"), "dag_stages")? {
        let stage = load_stage(entry)?;
        insert_unique(&mut ir.stages, stage.stage_id.clone(), stage)?;
    }

    Ok(ir)
}

fn insert_unique<T>(map: &mut IndexMap<String, T>, id: String, value: T) -> SpecResult<()> {
    if map.contains_key(&id) {
        return Err(SpecError::DuplicateId { id });
    }
    map.insert(id, value);
    Ok(())
}

fn section_list<'a>(section: Option<&'a Value>, name: &str) -> SpecResult<Vec<&'a Value>> {
    match section {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().collect()),
        Some(_) => Err(SpecError::Malformed {
            context: name.to_string(),
            message: "section must be a list".to_string(),
        }),
    }
}

fn generator_entries(section: Option<&Value>) -> SpecResult<Vec<&Value>> {
    match section {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().collect()),
        Some(Value::Object(map)) => Ok(map.values().collect()),
        Some(_) => Err(SpecError::Malformed {
            context: "generators".to_string(),
            message: "section must be a list or a map keyed by id".to_string(),
        }),
    }
}

fn load_meta(meta: Option<&Value>, version: Option<&Value>) -> MetaSpec {
    let mut out = MetaSpec::default();
    if let Some(map) = meta.and_then(Value::as_object) {
        if let Some(name) = map.get("name").and_then(Value::as_str) {
            out.name = name.to_string();
        }
        if let Some(desc) = map.get("description").and_then(Value::as_str) {
            out.description = desc.to_string();
        }
    }
    if let Some(v) = version.and_then(Value::as_str) {
        out.version = v.to_string();
    }
    out
}

fn str_field(map: &serde_json::Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_field(map: &serde_json::Map<String, Value>, key: &str, default: bool) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn str_list(map: &serde_json::Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn require_object<'a>(value: &'a Value, context: &str) -> SpecResult<&'a serde_json::Map<String, Value>> {
    value.as_object().ok_or_else(|| SpecError::Malformed {
        context: context.to_string(),
        message: "expected a map".to_string(),
    })
}

fn require_id(map: &serde_json::Map<String, Value>, context: &str) -> SpecResult<String> {
    let id = str_field(map, "id");
    if id.is_empty() {
        return Err(SpecError::Malformed {
            context: context.to_string(),
            message: "missing 'id'".to_string(),
        });
    }
    Ok(id)
}

// ===== Type expressions =====

/// Parse a type expression node, enforcing the exactly-one-kind invariant.
pub(crate) fn load_type_expr(value: &Value, context: &str) -> SpecResult<TypeExpr> {
    // JSON null is the null type, usable as a union alternative.
    if value.is_null() {
        return Ok(TypeExpr::null());
    }
    let map = require_object(value, context)?;

    let present: Vec<String> = EXPR_KEYS
        .iter()
        .filter(|k| map.contains_key(**k))
        .map(ToString::to_string)
        .collect();
    if present.len() != 1 {
        return Err(SpecError::AmbiguousTypeExpr {
            context: context.to_string(),
            found: present,
        });
    }

    match present[0].as_str() {
        "native" => {
            let raw = map.get("native").and_then(Value::as_str).unwrap_or_default();
            let (module, name) = raw.split_once(':').ok_or_else(|| SpecError::Malformed {
                context: context.to_string(),
                message: format!("native reference '{raw}' must be 'module:name'"),
            })?;
            Ok(TypeExpr::native(module, name))
        }
        "datatype_ref" => {
            let id = map
                .get("datatype_ref")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if id.is_empty() {
                return Err(SpecError::Malformed {
                    context: context.to_string(),
                    message: "empty datatype_ref".to_string(),
                });
            }
            Ok(TypeExpr::reference(id))
        }
        "generic" => {
            let generic = load_generic(map.get("generic").unwrap_or(&Value::Null), context)?;
            Ok(TypeExpr::Generic(generic))
        }
        "literal" => {
            let values = map
                .get("literal")
                .and_then(Value::as_array)
                .ok_or_else(|| SpecError::Malformed {
                    context: context.to_string(),
                    message: "literal must be a list of scalars".to_string(),
                })?;
            let mut literals = Vec::with_capacity(values.len());
            for v in values {
                let lit = LiteralValue::from_json(v).ok_or_else(|| SpecError::Malformed {
                    context: context.to_string(),
                    message: format!("literal value {v} is not a scalar"),
                })?;
                literals.push(lit);
            }
            Ok(TypeExpr::Literal { values: literals })
        }
        "union" => {
            let alts = map
                .get("union")
                .and_then(Value::as_array)
                .ok_or_else(|| SpecError::Malformed {
                    context: context.to_string(),
                    message: "union must be a list of type expressions".to_string(),
                })?;
            let mut alternatives = Vec::with_capacity(alts.len());
            for alt in alts {
                alternatives.push(load_type_expr(alt, context)?);
            }
            Ok(TypeExpr::Union { alternatives })
        }
        _ => unreachable!("kind keys are exhaustive"),
    }
}

fn load_generic(value: &Value, context: &str) -> SpecResult<GenericType> {
    let map = require_object(value, context)?;
    let container_name = str_field(map, "container");
    let container = Container::parse(&container_name).ok_or_else(|| SpecError::Malformed {
        context: context.to_string(),
        message: format!("unknown container '{container_name}'"),
    })?;

    let sub = |key: &str| -> SpecResult<Option<Box<TypeExpr>>> {
        match map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Ok(Some(Box::new(load_type_expr(v, context)?))),
        }
    };

    let mut elements = Vec::new();
    if let Some(items) = map.get("elements").and_then(Value::as_array) {
        for item in items {
            elements.push(load_type_expr(item, context)?);
        }
    }

    Ok(GenericType {
        container,
        element: sub("element")?,
        key: sub("key")?,
        value: sub("value")?,
        elements,
    })
}

// ===== Datatypes =====

fn load_datatype(value: &Value) -> SpecResult<DataTypeDef> {
    let map = require_object(value, "datatypes")?;
    let id = require_id(map, "datatypes")?;

    let present: Vec<String> = KIND_KEYS
        .iter()
        .filter(|k| map.contains_key(**k))
        .map(ToString::to_string)
        .collect();
    let kind = match present.len() {
        0 => return Err(SpecError::MissingKind { id }),
        1 => load_kind(&id, &present[0], map)?,
        _ => {
            return Err(SpecError::MultipleKinds {
                id,
                kinds: present,
            })
        }
    };

    Ok(DataTypeDef {
        description: str_field(map, "description"),
        kind,
        check_refs: str_list(map, "check_refs"),
        example_refs: Vec::new(),
        generator_refs: Vec::new(),
        id,
    })
}

fn load_kind(
    id: &str,
    kind_key: &str,
    map: &serde_json::Map<String, Value>,
) -> SpecResult<DataTypeKind> {
    let body = map.get(kind_key).unwrap_or(&Value::Null);
    match kind_key {
        "model" => {
            let model_map = require_object(body, id)?;
            let mut fields = Vec::new();
            if let Some(items) = model_map.get("fields").and_then(Value::as_array) {
                for item in items {
                    let field_map = require_object(item, id)?;
                    let name = str_field(field_map, "name");
                    let ty_value = field_map.get("type").ok_or_else(|| SpecError::Malformed {
                        context: format!("{id}.{name}"),
                        message: "field missing 'type'".to_string(),
                    })?;
                    fields.push(FieldSpec {
                        ty: load_type_expr(ty_value, &format!("{id}.{name}"))?,
                        required: bool_field(field_map, "required", true),
                        description: str_field(field_map, "description"),
                        name,
                    });
                }
            }
            Ok(DataTypeKind::Model(ModelSpec { fields }))
        }
        "enum" => {
            let enum_map = require_object(body, id)?;
            let mut members = Vec::new();
            if let Some(items) = enum_map.get("members").and_then(Value::as_array) {
                for item in items {
                    let member_map = require_object(item, id)?;
                    let value = member_map.get("value").unwrap_or(&Value::Null);
                    let value = LiteralValue::from_json(value).ok_or_else(|| {
                        SpecError::Malformed {
                            context: id.to_string(),
                            message: "enum member value must be a scalar".to_string(),
                        }
                    })?;
                    members.push(EnumMember {
                        name: str_field(member_map, "name"),
                        value,
                        description: str_field(member_map, "description"),
                    });
                }
            }
            let base_type = match enum_map.get("base_type").and_then(Value::as_str) {
                Some(s) => s.to_string(),
                None => "str".to_string(),
            };
            Ok(DataTypeKind::Enum(EnumSpec { base_type, members }))
        }
        "type_alias" => Ok(DataTypeKind::Alias(load_type_expr(body, id)?)),
        "generic" => Ok(DataTypeKind::Generic(load_generic(body, id)?)),
        "frame_schema" => Ok(DataTypeKind::Frame(load_frame(body, id)?)),
        _ => unreachable!("kind keys are exhaustive"),
    }
}

fn load_frame(value: &Value, id: &str) -> SpecResult<FrameSchema> {
    let map = require_object(value, id)?;

    let index = match map.get("index") {
        None | Some(Value::Null) => None,
        Some(v) => Some(load_index(v, id)?),
    };

    let mut multi_index = Vec::new();
    if let Some(levels) = map.get("multi_index").and_then(Value::as_array) {
        for level in levels {
            let level_map = require_object(level, id)?;
            multi_index.push(IndexLevel {
                name: str_field(level_map, "name"),
                dtype: str_field(level_map, "dtype"),
                allowed_values: str_list(level_map, "enum"),
                description: str_field(level_map, "description"),
            });
        }
    }

    let mut columns = Vec::new();
    if let Some(cols) = map.get("columns").and_then(Value::as_array) {
        for col in cols {
            let col_map = require_object(col, id)?;
            columns.push(ColumnRule {
                name: str_field(col_map, "name"),
                dtype: str_field(col_map, "dtype"),
                nullable: bool_field(col_map, "nullable", false),
                unique: bool_field(col_map, "unique", false),
                coerce: bool_field(col_map, "coerce", true),
                checks: col_map
                    .get("checks")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                description: str_field(col_map, "description"),
            });
        }
    }

    Ok(FrameSchema {
        index,
        multi_index,
        columns,
        checks: map
            .get("checks")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        row_model: map
            .get("row_model")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        strict: bool_field(map, "strict", false),
        coerce: bool_field(map, "coerce", true),
        ordered: bool_field(map, "ordered", false),
    })
}

fn load_index(value: &Value, id: &str) -> SpecResult<IndexRule> {
    let map = require_object(value, id)?;
    let monotonic = match map.get("monotonic").and_then(Value::as_str) {
        Some("increasing") => Monotonic::Increasing,
        Some("decreasing") => Monotonic::Decreasing,
        _ => Monotonic::None,
    };
    Ok(IndexRule {
        name: match map.get("name").and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => "index".to_string(),
        },
        dtype: str_field(map, "dtype"),
        nullable: bool_field(map, "nullable", false),
        unique: bool_field(map, "unique", false),
        monotonic,
        coerce: bool_field(map, "coerce", true),
        description: str_field(map, "description"),
    })
}

// ===== Function-like definitions =====

fn load_function(value: &Value, role: FunctionRole) -> SpecResult<FunctionDef> {
    let section = match role {
        FunctionRole::Transform => "transforms",
        FunctionRole::Check => "checks",
        FunctionRole::Generator => "generators",
    };
    let map = require_object(value, section)?;
    let id = require_id(map, section)?;

    let mut params = Vec::new();
    if let Some(items) = map.get("parameters").and_then(Value::as_array) {
        for item in items {
            let param_map = require_object(item, &id)?;
            let name = str_field(param_map, "name");
            let ty_value = param_map.get("type").ok_or_else(|| SpecError::Malformed {
                context: format!("{id}.{name}"),
                message: "parameter missing 'type'".to_string(),
            })?;
            params.push(ParamSpec {
                ty: load_type_expr(ty_value, &format!("{id}.{name}"))?,
                optional: bool_field(param_map, "optional", false),
                default: param_map.get("default").filter(|v| !v.is_null()).cloned(),
                description: str_field(param_map, "description"),
                name,
            });
        }
    }

    // Checks accept the short form: a single `input_type` instead of a
    // parameter list, and an implicit bool return.
    if params.is_empty() && role == FunctionRole::Check {
        if let Some(input) = map.get("input_type").and_then(Value::as_str) {
            params.push(ParamSpec::required("payload", TypeExpr::reference(input)));
        }
    }

    let ret = match map.get("return") {
        None | Some(Value::Null) => match role {
            FunctionRole::Check => Some(TypeExpr::native("builtins", "bool")),
            _ => None,
        },
        Some(v) => Some(load_type_expr(v, &format!("{id}.return"))?),
    };

    Ok(FunctionDef {
        role,
        description: str_field(map, "description"),
        impl_path: str_field(map, "impl"),
        file_path: str_field(map, "file_path"),
        params,
        ret,
        logic: str_list(map, "logic"),
        guidance: str_field(map, "guidance"),
        validations: str_list(map, "validations"),
        id,
    })
}

// ===== Examples and stages =====

fn load_example(value: &Value) -> SpecResult<ExampleCase> {
    let map = require_object(value, "examples")?;
    Ok(ExampleCase {
        id: require_id(map, "examples")?,
        description: str_field(map, "description"),
        datatype_ref: str_field(map, "datatype_ref"),
        transform_ref: str_field(map, "transform_ref"),
        input: map.get("input").cloned().unwrap_or(Value::Null),
        expected: map.get("expected").cloned().unwrap_or(Value::Null),
    })
}

fn load_stage(value: &Value) -> SpecResult<DagStage> {
    let map = require_object(value, "dag_stages")?;
    let stage_id = str_field(map, "stage_id");
    if stage_id.is_empty() {
        return Err(SpecError::Malformed {
            context: "dag_stages".to_string(),
            message: "missing 'stage_id'".to_string(),
        });
    }

    let mode_name = match map.get("selection_mode").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => "single".to_string(),
    };
    let selection_mode =
        SelectionMode::parse(&mode_name).ok_or_else(|| SpecError::StageRule {
            stage_id: stage_id.clone(),
            message: format!("invalid selection_mode '{mode_name}'"),
        })?;

    let max_select = match map.get("max_select") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_u64() {
            Some(n) => Some(n as usize),
            None => {
                return Err(SpecError::StageRule {
                    stage_id,
                    message: "max_select must be a non-negative integer".to_string(),
                })
            }
        },
    };

    Ok(DagStage {
        description: str_field(map, "description"),
        selection_mode,
        input_type: str_field(map, "input_type"),
        output_type: str_field(map, "output_type"),
        candidates: str_list(map, "candidates"),
        max_select,
        default_transform_id: map
            .get("default_transform_id")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        collect_output: bool_field(map, "collect_output", false),
        publish_output: bool_field(map, "publish_output", false),
        depends_on: str_list(map, "depends_on"),
        stage_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_minimal_spec() {
        let tree = json!({
            "meta": {"name": "demo", "description": "d"},
            "version": "2.0",
            "datatypes": [
                {"id": "Age", "type_alias": {"native": "builtins:int"}}
            ]
        });
        let ir = load_spec(&tree).unwrap();
        assert_eq!(ir.meta.name, "demo");
        assert_eq!(ir.meta.version, "2.0");
        assert!(ir.datatype("Age").is_some());
    }

    #[test]
    fn test_zero_kind_definition() {
        let tree = json!({"datatypes": [{"id": "Empty"}]});
        let err = load_spec(&tree).unwrap_err();
        assert_eq!(
            err,
            SpecError::MissingKind {
                id: "Empty".to_string()
            }
        );
    }

    #[test]
    fn test_multi_kind_definition() {
        let tree = json!({"datatypes": [{
            "id": "Both",
            "type_alias": {"native": "builtins:int"},
            "enum": {"members": []}
        }]});
        let err = load_spec(&tree).unwrap_err();
        match err {
            SpecError::MultipleKinds { id, kinds } => {
                assert_eq!(id, "Both");
                assert_eq!(kinds.len(), 2);
            }
            other => panic!("expected MultipleKinds, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_id() {
        let tree = json!({"datatypes": [
            {"id": "Age", "type_alias": {"native": "builtins:int"}},
            {"id": "Age", "type_alias": {"native": "builtins:str"}}
        ]});
        assert_eq!(
            load_spec(&tree).unwrap_err(),
            SpecError::DuplicateId {
                id: "Age".to_string()
            }
        );
    }

    #[test]
    fn test_ambiguous_type_expr() {
        let tree = json!({"datatypes": [{
            "id": "Bad",
            "type_alias": {"native": "builtins:int", "datatype_ref": "Other"}
        }]});
        assert!(matches!(
            load_spec(&tree).unwrap_err(),
            SpecError::AmbiguousTypeExpr { .. }
        ));
    }

    #[test]
    fn test_load_model_and_frame() {
        let tree = json!({"datatypes": [
            {"id": "Row", "model": {"fields": [
                {"name": "price", "type": {"native": "builtins:float"}},
                {"name": "note", "type": {"native": "builtins:str"}, "required": false}
            ]}},
            {"id": "Prices", "frame_schema": {
                "row_model": "Row",
                "index": {"name": "ts", "dtype": "datetime", "monotonic": "increasing"},
                "columns": [{"name": "price", "dtype": "float64", "checks": [{"greater_than": 0}]}],
                "strict": true
            }}
        ]});
        let ir = load_spec(&tree).unwrap();

        let DataTypeKind::Model(model) = &ir.datatype("Row").unwrap().kind else {
            panic!("expected model");
        };
        assert_eq!(model.fields.len(), 2);
        assert!(!model.fields[1].required);

        let DataTypeKind::Frame(frame) = &ir.datatype("Prices").unwrap().kind else {
            panic!("expected frame");
        };
        assert_eq!(frame.row_model.as_deref(), Some("Row"));
        assert_eq!(frame.index.as_ref().unwrap().monotonic, Monotonic::Increasing);
        assert!(frame.strict);
        assert_eq!(frame.columns[0].checks.len(), 1);
    }

    #[test]
    fn test_load_transform_with_union_and_defaults() {
        let tree = json!({"transforms": [{
            "id": "resample",
            "impl": "app.transforms:resample",
            "file_path": "transforms/processors.rs",
            "parameters": [
                {"name": "data", "type": {"datatype_ref": "Prices"}},
                {"name": "window", "type": {"union": [{"native": "builtins:int"}, null]},
                 "optional": true, "default": 5}
            ],
            "return": {"datatype_ref": "Prices"},
            "logic": ["group rows", "aggregate"],
            "validations": ["window must be positive"]
        }]});
        let ir = load_spec(&tree).unwrap();
        let tf = ir.transform("resample").unwrap();
        assert_eq!(tf.params.len(), 2);
        assert!(tf.params[1].optional);
        assert_eq!(tf.params[1].default, Some(json!(5)));
        assert_eq!(tf.logic.len(), 2);
        assert!(matches!(tf.params[1].ty, TypeExpr::Union { .. }));
    }

    #[test]
    fn test_check_short_form() {
        let tree = json!({"checks": [{
            "id": "positive",
            "impl": "app.checks:positive",
            "file_path": "checks/validators.rs",
            "input_type": "Age"
        }]});
        let ir = load_spec(&tree).unwrap();
        let check = ir.checks.get("positive").unwrap();
        assert_eq!(check.params.len(), 1);
        assert_eq!(check.params[0].name, "payload");
        assert_eq!(
            check.ret,
            Some(TypeExpr::native("builtins", "bool"))
        );
    }

    #[test]
    fn test_generators_as_map() {
        let tree = json!({"generators": {
            "g1": {"id": "g1", "impl": "app.gen:make", "file_path": "gen.rs",
                   "return": {"datatype_ref": "Prices"}}
        }});
        let ir = load_spec(&tree).unwrap();
        assert!(ir.generators.contains_key("g1"));
    }

    #[test]
    fn test_load_stage() {
        let tree = json!({"dag_stages": [{
            "stage_id": "clean",
            "selection_mode": "multiple",
            "input_type": "Raw",
            "output_type": "Clean",
            "candidates": ["t1", "t2"],
            "max_select": 2,
            "collect_output": true
        }]});
        let ir = load_spec(&tree).unwrap();
        let stage = ir.stages.get("clean").unwrap();
        assert_eq!(stage.selection_mode, SelectionMode::Multiple);
        assert_eq!(stage.max_select, Some(2));
        assert!(stage.collect_output);
    }

    #[test]
    fn test_invalid_selection_mode() {
        let tree = json!({"dag_stages": [{
            "stage_id": "s1", "selection_mode": "all"
        }]});
        assert!(matches!(
            load_spec(&tree).unwrap_err(),
            SpecError::StageRule { .. }
        ));
    }

    #[test]
    fn test_literal_expr() {
        let tree = json!({"datatypes": [{
            "id": "Side", "type_alias": {"literal": ["buy", "sell"]}
        }]});
        let ir = load_spec(&tree).unwrap();
        let DataTypeKind::Alias(TypeExpr::Literal { values }) =
            &ir.datatype("Side").unwrap().kind
        else {
            panic!("expected literal alias");
        };
        assert_eq!(values.len(), 2);
    }
}
