//! Pure rendering of specification definitions into source units.

use thiserror::Error;

use specforge_core::{DataTypeKind, FunctionDef, ResolveError, SpecIR};
use specforge_resolve::{rendered_param_type, resolve, resolve_frame, resolve_return_type};

/// File receiving model, enum, alias and generic definitions
pub const TYPES_FILE: &str = "types.rs";
/// File receiving frame schema constructors
pub const SCHEMAS_FILE: &str = "schemas.rs";

/// Error from synthesis
#[derive(Debug, Error)]
pub enum SynthError {
    /// A type expression failed to resolve
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// Filesystem failure during `write`
    #[error("io error at {path}: {source}")]
    Io {
        /// File the operation touched
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// One proposed source unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthUnit {
    /// File the unit belongs to, relative to the implementation tree root
    pub file_path: String,
    /// Name the unit declares (function, struct, enum, type, const)
    pub unit_name: String,
    /// Rendered source text
    pub source: String,
}

/// Render every definition of the IR into source units.
///
/// Datatypes land in `types.rs` (frames in `schemas.rs`); each function-like
/// definition lands in its declared `file_path`. Pure: no filesystem access.
///
/// # Errors
///
/// Propagates resolution failures for the definition being rendered.
pub fn synthesize(ir: &SpecIR) -> Result<Vec<SynthUnit>, SynthError> {
    let mut units = Vec::new();

    for def in ir.datatypes.values() {
        match &def.kind {
            DataTypeKind::Model(model) => {
                units.push(render_model(ir, def, model)?);
            }
            DataTypeKind::Enum(spec) => {
                units.push(render_enum(def, spec));
            }
            DataTypeKind::Alias(target) => {
                let resolved = resolve(target, ir)?;
                units.push(SynthUnit {
                    file_path: TYPES_FILE.to_string(),
                    unit_name: def.id.clone(),
                    source: format!(
                        "{}pub type {} = {};\n",
                        doc_comment(&def.description, 0),
                        def.id,
                        resolved.rendered
                    ),
                });
            }
            DataTypeKind::Generic(_) => {
                let resolved = resolve(
                    &specforge_core::TypeExpr::reference(&def.id),
                    ir,
                )?;
                units.push(SynthUnit {
                    file_path: TYPES_FILE.to_string(),
                    unit_name: def.id.clone(),
                    source: format!(
                        "{}pub type {} = {};\n",
                        doc_comment(&def.description, 0),
                        def.id,
                        resolved.rendered
                    ),
                });
            }
            DataTypeKind::Frame(_) => {
                units.push(render_frame_schema(ir, def)?);
            }
        }
    }

    for func in ir.functions() {
        units.push(render_function(ir, func)?);
    }

    Ok(units)
}

fn doc_comment(text: &str, indent: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let pad = " ".repeat(indent);
    text.lines()
        .map(|line| format!("{pad}/// {line}\n"))
        .collect()
}

fn render_model(
    ir: &SpecIR,
    def: &specforge_core::DataTypeDef,
    model: &specforge_core::ModelSpec,
) -> Result<SynthUnit, SynthError> {
    let mut out = String::new();
    out.push_str(&doc_comment(&def.description, 0));
    out.push_str("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n");
    out.push_str(&format!("pub struct {} {{\n", def.id));
    for field in &model.fields {
        let resolved = resolve(&field.ty, ir)?;
        let rendered = if field.required {
            resolved.rendered
        } else if resolved.rendered.starts_with("Option<") {
            resolved.rendered
        } else {
            format!("Option<{}>", resolved.rendered)
        };
        out.push_str(&doc_comment(&field.description, 4));
        out.push_str(&format!("    pub {}: {},\n", field.name, rendered));
    }
    out.push_str("}\n");
    Ok(SynthUnit {
        file_path: TYPES_FILE.to_string(),
        unit_name: def.id.clone(),
        source: out,
    })
}

fn render_enum(def: &specforge_core::DataTypeDef, spec: &specforge_core::EnumSpec) -> SynthUnit {
    let mut out = String::new();
    out.push_str(&doc_comment(&def.description, 0));
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]\n");
    out.push_str(&format!("pub enum {} {{\n", def.id));
    for member in &spec.members {
        out.push_str(&doc_comment(&member.description, 4));
        out.push_str(&format!("    /// = {}\n", member.value));
        out.push_str(&format!("    {},\n", member.name));
    }
    out.push_str("}\n");
    SynthUnit {
        file_path: TYPES_FILE.to_string(),
        unit_name: def.id.clone(),
        source: out,
    }
}

fn render_frame_schema(
    ir: &SpecIR,
    def: &specforge_core::DataTypeDef,
) -> Result<SynthUnit, SynthError> {
    let merged = resolve_frame(&def.id, ir)?;
    let fn_name = format!("{}_schema", snake_case(&def.id));

    let mut out = String::new();
    out.push_str(&doc_comment(&def.description, 0));
    out.push_str(&format!(
        "/// Resolved schema for `{}` ({} columns).\n",
        def.id,
        merged.columns.len()
    ));
    out.push_str("#[must_use]\n");
    out.push_str(&format!("pub fn {fn_name}() -> FrameSchema {{\n"));
    out.push_str("    FrameSchema {\n");
    match &merged.index {
        Some(index) => out.push_str(&format!(
            "        index: Some(index_rule(\"{}\", \"{}\")),\n",
            index.name, index.dtype
        )),
        None => out.push_str("        index: None,\n"),
    }
    out.push_str("        multi_index: vec![\n");
    for level in &merged.multi_index {
        out.push_str(&format!(
            "            index_level(\"{}\", \"{}\"),\n",
            level.name, level.dtype
        ));
    }
    out.push_str("        ],\n");
    out.push_str("        columns: vec![\n");
    for column in &merged.columns {
        let nullable = if column.rule.nullable {
            ".with_nullable(true)"
        } else {
            ""
        };
        out.push_str(&format!(
            "            ColumnRule::new(\"{}\", \"{}\"){},\n",
            column.rule.name, column.rule.dtype, nullable
        ));
    }
    out.push_str("        ],\n");
    out.push_str("        checks: Vec::new(),\n");
    let row_model = match &def.kind {
        DataTypeKind::Frame(f) => f.row_model.as_ref(),
        _ => None,
    };
    out.push_str(&format!(
        "        row_model: {},\n",
        match row_model {
            Some(m) => format!("Some(\"{m}\".to_string())"),
            None => "None".to_string(),
        }
    ));
    out.push_str(&format!("        strict: {},\n", merged.strict));
    out.push_str(&format!("        coerce: {},\n", merged.coerce));
    out.push_str(&format!("        ordered: {},\n", merged.ordered));
    out.push_str("    }\n");
    out.push_str("}\n");

    Ok(SynthUnit {
        file_path: SCHEMAS_FILE.to_string(),
        unit_name: fn_name,
        source: out,
    })
}

fn render_function(ir: &SpecIR, func: &FunctionDef) -> Result<SynthUnit, SynthError> {
    let mut params = Vec::with_capacity(func.params.len());
    let mut defaults = Vec::new();
    for param in &func.params {
        let resolved = rendered_param_type(param, ir)?;
        params.push(format!("{}: {}", param.name, resolved.rendered));
        if let Some(default) = &param.default {
            defaults.push(format!("{} = {}", param.name, default));
        }
    }
    let ret = resolve_return_type(func.ret.as_ref(), ir)?;

    let mut out = String::new();
    out.push_str(&doc_comment(&func.description, 0));
    if !func.logic.is_empty() {
        out.push_str("///\n/// Logic:\n");
        for (i, step) in func.logic.iter().enumerate() {
            out.push_str(&format!("/// {}. {}\n", i + 1, step));
        }
    }
    if !func.guidance.is_empty() {
        out.push_str("///\n");
        for line in func.guidance.lines() {
            out.push_str(&format!("/// {line}\n"));
        }
    }
    out.push_str("///\n");
    if func.validations.is_empty() {
        out.push_str(
            "/// Validations: none beyond what underlying operations naturally raise.\n",
        );
    } else {
        out.push_str("/// Validations (the only ones expected):\n");
        for validation in &func.validations {
            out.push_str(&format!("/// - {validation}\n"));
        }
    }
    if !defaults.is_empty() {
        out.push_str(&format!("///\n/// Defaults: {}\n", defaults.join(", ")));
    }

    let name = func.unit_name();
    out.push_str(&format!(
        "pub fn {}({}) -> {} {{\n",
        name,
        params.join(", "),
        ret.rendered
    ));
    out.push_str(&format!(
        "    unimplemented!(\"{}: generated skeleton\")\n",
        func.id
    ));
    out.push_str("}\n");

    Ok(SynthUnit {
        file_path: func.file_path.clone(),
        unit_name: name.to_string(),
        source: out,
    })
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use specforge_core::{
        DataTypeDef, EnumMember, EnumSpec, FieldSpec, FrameSchema, FunctionRole, LiteralValue,
        ModelSpec, ParamSpec, TypeExpr,
    };

    fn make_test_ir() -> SpecIR {
        let mut ir = SpecIR::default();
        ir.datatypes.insert(
            "Age".to_string(),
            DataTypeDef::new("Age", DataTypeKind::Alias(TypeExpr::native("builtins", "int"))),
        );
        ir.datatypes.insert(
            "Holding".to_string(),
            DataTypeDef::new(
                "Holding",
                DataTypeKind::Model(ModelSpec {
                    fields: vec![
                        FieldSpec {
                            name: "symbol".to_string(),
                            ty: TypeExpr::native("builtins", "str"),
                            required: true,
                            description: "ticker".to_string(),
                        },
                        FieldSpec {
                            name: "age".to_string(),
                            ty: TypeExpr::reference("Age"),
                            required: false,
                            description: String::new(),
                        },
                    ],
                }),
            ),
        );
        ir
    }

    fn make_test_fn(id: &str, file_path: &str) -> FunctionDef {
        FunctionDef {
            id: id.to_string(),
            role: FunctionRole::Transform,
            description: "Resample the series.".to_string(),
            impl_path: format!("app.transforms:{id}"),
            file_path: file_path.to_string(),
            params: vec![ParamSpec::required("data", TypeExpr::reference("Age"))],
            ret: Some(TypeExpr::reference("Age")),
            logic: vec!["group".to_string(), "aggregate".to_string()],
            guidance: "Prefer fixed windows.".to_string(),
            validations: Vec::new(),
        }
    }

    #[test]
    fn test_render_alias() {
        let ir = make_test_ir();
        let units = synthesize(&ir).unwrap();
        let alias = units.iter().find(|u| u.unit_name == "Age").unwrap();
        assert_eq!(alias.file_path, TYPES_FILE);
        assert!(alias.source.contains("pub type Age = i64;"));
    }

    #[test]
    fn test_render_model_optional_field() {
        let ir = make_test_ir();
        let units = synthesize(&ir).unwrap();
        let model = units.iter().find(|u| u.unit_name == "Holding").unwrap();
        assert!(model.source.contains("pub struct Holding"));
        assert!(model.source.contains("pub symbol: String,"));
        assert!(model.source.contains("pub age: Option<Age>,"));
    }

    #[test]
    fn test_render_enum() {
        let mut ir = SpecIR::default();
        ir.datatypes.insert(
            "Side".to_string(),
            DataTypeDef::new(
                "Side",
                DataTypeKind::Enum(EnumSpec {
                    base_type: "str".to_string(),
                    members: vec![EnumMember {
                        name: "Buy".to_string(),
                        value: LiteralValue::Str("buy".to_string()),
                        description: String::new(),
                    }],
                }),
            ),
        );
        let units = synthesize(&ir).unwrap();
        assert!(units[0].source.contains("pub enum Side"));
        assert!(units[0].source.contains("Buy,"));
    }

    #[test]
    fn test_render_function_embeds_guidance() {
        let mut ir = make_test_ir();
        ir.transforms
            .insert("resample".to_string(), make_test_fn("resample", "tf.rs"));
        let units = synthesize(&ir).unwrap();
        let unit = units.iter().find(|u| u.unit_name == "resample").unwrap();

        assert!(unit.source.contains("/// 1. group"));
        assert!(unit.source.contains("/// 2. aggregate"));
        assert!(unit.source.contains("Prefer fixed windows."));
        assert!(unit
            .source
            .contains("Validations: none beyond what underlying operations naturally raise."));
        assert!(unit.source.contains("pub fn resample(data: Age) -> Age {"));
        // Placeholder body fails unambiguously when invoked unmodified.
        assert!(unit
            .source
            .contains("unimplemented!(\"resample: generated skeleton\")"));
    }

    #[test]
    fn test_render_function_lists_expected_validations() {
        let mut ir = make_test_ir();
        let mut func = make_test_fn("clamp", "tf.rs");
        func.validations = vec!["input must be non-negative".to_string()];
        func.params[0].default = Some(json!(0));
        ir.transforms.insert("clamp".to_string(), func);

        let units = synthesize(&ir).unwrap();
        let unit = units.iter().find(|u| u.unit_name == "clamp").unwrap();
        assert!(unit.source.contains("/// Validations (the only ones expected):"));
        assert!(unit.source.contains("/// - input must be non-negative"));
        assert!(unit.source.contains("/// Defaults: data = 0"));
    }

    #[test]
    fn test_render_frame_schema() {
        let mut ir = make_test_ir();
        let frame = FrameSchema {
            columns: vec![specforge_core::ColumnRule::new("price", "float")],
            ..FrameSchema::default()
        };
        ir.datatypes.insert(
            "PriceFrame".to_string(),
            DataTypeDef::new("PriceFrame", DataTypeKind::Frame(frame)),
        );
        let units = synthesize(&ir).unwrap();
        let unit = units
            .iter()
            .find(|u| u.unit_name == "price_frame_schema")
            .unwrap();
        assert_eq!(unit.file_path, SCHEMAS_FILE);
        assert!(unit.source.contains("pub fn price_frame_schema() -> FrameSchema"));
        assert!(unit.source.contains("ColumnRule::new(\"price\", \"float\")"));
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("PriceFrame"), "price_frame");
        assert_eq!(snake_case("OHLCV"), "o_h_l_c_v");
        assert_eq!(snake_case("simple"), "simple");
    }

    #[test]
    fn test_synthesize_is_pure() {
        let ir = make_test_ir();
        let first = synthesize(&ir).unwrap();
        let second = synthesize(&ir).unwrap();
        assert_eq!(first, second);
    }
}
