//! Structural/tabular validation collaborator.
//!
//! Given a resolved descriptor and a payload, answers valid/invalid with
//! reasons. `ValueValidator` is the shipped value-level implementation over
//! JSON payloads; richer runtimes plug in behind the same trait.

use serde_json::Value;

use specforge_core::{DataTypeKind, GenericType, SpecIR, TypeExpr};
use specforge_resolve::resolve_frame;

/// Validation collaborator contract
pub trait SchemaValidator: Send + Sync {
    /// Validate a payload against the resolved shape of a datatype.
    /// Returns one reason per violation; empty means valid.
    fn validate(&self, ir: &SpecIR, datatype_id: &str, payload: &Value) -> Vec<String>;
}

/// Value-level validator for JSON payloads.
///
/// Frames are expected as columnar maps (`{column: [values]}`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueValidator;

impl SchemaValidator for ValueValidator {
    fn validate(&self, ir: &SpecIR, datatype_id: &str, payload: &Value) -> Vec<String> {
        let Some(def) = ir.datatype(datatype_id) else {
            return vec![format!("unknown datatype '{datatype_id}'")];
        };
        let mut reasons = Vec::new();
        match &def.kind {
            DataTypeKind::Alias(target) => {
                validate_expr(ir, target, payload, datatype_id, &mut reasons);
            }
            DataTypeKind::Model(model) => {
                validate_model(ir, datatype_id, model, payload, &mut reasons);
            }
            DataTypeKind::Enum(spec) => {
                let matched = spec.members.iter().any(|m| m.value.matches(payload));
                if !matched {
                    reasons.push(format!(
                        "{payload} is not a member of enum '{datatype_id}'"
                    ));
                }
            }
            DataTypeKind::Generic(generic) => {
                validate_generic(ir, generic, payload, datatype_id, &mut reasons);
            }
            DataTypeKind::Frame(_) => {
                validate_frame_payload(ir, datatype_id, payload, &mut reasons);
            }
        }
        reasons
    }
}

fn validate_model(
    ir: &SpecIR,
    id: &str,
    model: &specforge_core::ModelSpec,
    payload: &Value,
    reasons: &mut Vec<String>,
) {
    let Some(map) = payload.as_object() else {
        reasons.push(format!("model '{id}' payload must be a map"));
        return;
    };
    for field in &model.fields {
        match map.get(&field.name) {
            None | Some(Value::Null) if field.required => {
                reasons.push(format!("model '{}': missing required field '{}'", id, field.name));
            }
            None | Some(Value::Null) => {}
            Some(value) => {
                validate_expr(ir, &field.ty, value, &format!("{}.{}", id, field.name), reasons);
            }
        }
    }
}

fn validate_generic(
    ir: &SpecIR,
    generic: &GenericType,
    payload: &Value,
    context: &str,
    reasons: &mut Vec<String>,
) {
    match generic.container {
        specforge_core::Container::List | specforge_core::Container::Set => {
            let Some(items) = payload.as_array() else {
                reasons.push(format!("{context}: expected a list"));
                return;
            };
            if let Some(element) = &generic.element {
                for (i, item) in items.iter().enumerate() {
                    validate_expr(ir, element, item, &format!("{context}[{i}]"), reasons);
                }
            }
        }
        specforge_core::Container::Dict => {
            let Some(map) = payload.as_object() else {
                reasons.push(format!("{context}: expected a map"));
                return;
            };
            if let Some(value_ty) = &generic.value {
                for (key, value) in map {
                    validate_expr(ir, value_ty, value, &format!("{context}[{key}]"), reasons);
                }
            }
        }
        specforge_core::Container::Tuple => {
            let Some(items) = payload.as_array() else {
                reasons.push(format!("{context}: expected a tuple (list)"));
                return;
            };
            if items.len() != generic.elements.len() {
                reasons.push(format!(
                    "{context}: expected {} tuple elements, found {}",
                    generic.elements.len(),
                    items.len()
                ));
                return;
            }
            for (i, (item, elem_ty)) in items.iter().zip(&generic.elements).enumerate() {
                validate_expr(ir, elem_ty, item, &format!("{context}[{i}]"), reasons);
            }
        }
    }
}

fn validate_expr(
    ir: &SpecIR,
    expr: &TypeExpr,
    payload: &Value,
    context: &str,
    reasons: &mut Vec<String>,
) {
    match expr {
        TypeExpr::Native { module, name } => {
            if let Some(reason) = native_mismatch(module, name, payload, context) {
                reasons.push(reason);
            }
        }
        TypeExpr::Ref { id } => {
            reasons.extend(ValueValidator.validate(ir, id, payload));
        }
        TypeExpr::Generic(generic) => validate_generic(ir, generic, payload, context, reasons),
        TypeExpr::Literal { values } => {
            if !values.iter().any(|v| v.matches(payload)) {
                reasons.push(format!("{context}: {payload} is not an allowed literal value"));
            }
        }
        TypeExpr::Union { alternatives } => {
            let ok = alternatives.iter().any(|alt| {
                if alt.is_null_like() {
                    payload.is_null()
                } else {
                    let mut sub = Vec::new();
                    validate_expr(ir, alt, payload, context, &mut sub);
                    sub.is_empty()
                }
            });
            if !ok {
                reasons.push(format!("{context}: {payload} matches no union alternative"));
            }
        }
    }
}

fn native_mismatch(module: &str, name: &str, payload: &Value, context: &str) -> Option<String> {
    let ok = match (module, name) {
        ("builtins", "int") => payload.as_i64().is_some() || payload.as_u64().is_some(),
        ("builtins", "float") => payload.is_number(),
        ("builtins", "str") => payload.is_string(),
        ("builtins", "bool") => payload.is_boolean(),
        ("builtins", "None" | "NoneType") => payload.is_null(),
        ("datetime", _) => payload.is_string(),
        // Unknown natives are outside this validator's vocabulary.
        _ => true,
    };
    if ok {
        None
    } else {
        Some(format!("{context}: {payload} is not a valid {module}:{name}"))
    }
}

/// Validate a columnar payload against a merged frame schema.
fn validate_frame_payload(ir: &SpecIR, id: &str, payload: &Value, reasons: &mut Vec<String>) {
    let merged = match resolve_frame(id, ir) {
        Ok(m) => m,
        Err(e) => {
            reasons.push(format!("frame '{id}': {e}"));
            return;
        }
    };
    let Some(map) = payload.as_object() else {
        reasons.push(format!("frame '{id}' payload must be a map of columns"));
        return;
    };

    let mut lengths: Vec<usize> = Vec::new();
    for column in &merged.columns {
        match map.get(&column.rule.name) {
            None => {
                if !column.rule.nullable {
                    reasons.push(format!("frame '{}': missing column '{}'", id, column.rule.name));
                }
            }
            Some(Value::Array(values)) => {
                lengths.push(values.len());
                for (i, value) in values.iter().enumerate() {
                    if value.is_null() {
                        if !column.rule.nullable {
                            reasons.push(format!(
                                "frame '{}': column '{}' row {} is null but not nullable",
                                id, column.rule.name, i
                            ));
                        }
                        continue;
                    }
                    if !dtype_accepts(&column.rule.dtype, value) {
                        reasons.push(format!(
                            "frame '{}': column '{}' row {} ({}) does not match dtype '{}'",
                            id, column.rule.name, i, value, column.rule.dtype
                        ));
                    }
                }
            }
            Some(_) => {
                reasons.push(format!(
                    "frame '{}': column '{}' must be a list of values",
                    id, column.rule.name
                ));
            }
        }
    }
    if merged.strict {
        for key in map.keys() {
            if merged.column(key).is_none() {
                reasons.push(format!("frame '{id}': unexpected column '{key}' (strict)"));
            }
        }
    }
    if lengths.windows(2).any(|w| w[0] != w[1]) {
        reasons.push(format!("frame '{id}': columns have differing lengths"));
    }
}

fn dtype_accepts(dtype: &str, value: &Value) -> bool {
    let lower = dtype.to_ascii_lowercase();
    if lower.starts_with("int") || lower.starts_with("uint") {
        value.as_i64().is_some() || value.as_u64().is_some()
    } else if lower.starts_with("float") {
        value.is_number()
    } else if lower == "str" || lower == "string" || lower == "object" || lower == "category" {
        value.is_string()
    } else if lower == "bool" || lower == "boolean" {
        value.is_boolean()
    } else if lower.starts_with("datetime") || lower.starts_with("timedelta") {
        value.is_string() || value.is_number()
    } else {
        true
    }
}
