//! Tabular-frame schema resolution.
//!
//! Merges per-column rules inferred from a frame's row model with the
//! explicitly declared rules. Explicit rules win on the base dtype;
//! non-type attributes (nullability, checks) merge additively so neither
//! side is silently dropped. Every merged column records its contributing
//! source(s) for diagnostics.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use specforge_core::{
    dtype_for_native, ColumnRule, DataTypeKind, FrameSchema, IndexLevel, IndexRule, ResolveError,
    SpecIR, TypeExpr,
};

/// Which source(s) contributed a merged column rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnProvenance {
    /// Declared explicitly on the frame schema
    Explicit,
    /// Inferred from the row model
    RowModel,
    /// Present in both; explicit dtype, additive attributes
    Merged,
}

/// One column of a resolved frame schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedColumn {
    /// The effective rule
    pub rule: ColumnRule,
    /// Contributing source(s)
    pub provenance: ColumnProvenance,
}

/// A fully resolved frame schema, ready for validation and synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedFrame {
    /// Frame definition id
    pub id: String,
    /// Single-index rule
    pub index: Option<IndexRule>,
    /// Multi-level index rules
    pub multi_index: Vec<IndexLevel>,
    /// Merged columns: explicit declaration order first, then
    /// row-model-only columns in field order
    pub columns: Vec<MergedColumn>,
    /// Frame-level check rules
    pub checks: Vec<serde_json::Value>,
    /// Reject columns not named by a rule
    pub strict: bool,
    /// Coerce values to declared dtypes
    pub coerce: bool,
    /// Enforce declared column order
    pub ordered: bool,
}

impl MergedFrame {
    /// Look up a merged column by name
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&MergedColumn> {
        self.columns.iter().find(|c| c.rule.name == name)
    }
}

/// Resolve a frame datatype into its merged schema.
///
/// # Errors
///
/// `UnknownReference` if `id` is absent, `AmbiguousTypeDefinition` if it is
/// not a frame, `ConflictingColumnRule` when explicit rules for one column
/// disagree on dtype.
pub fn resolve_frame(id: &str, ir: &SpecIR) -> Result<MergedFrame, ResolveError> {
    let def = ir
        .datatype(id)
        .ok_or_else(|| ResolveError::UnknownReference { id: id.to_string() })?;
    let DataTypeKind::Frame(frame) = &def.kind else {
        return Err(ResolveError::AmbiguousTypeDefinition {
            id: id.to_string(),
            detail: format!("expected frame_schema, found {}", def.kind.kind_name()),
        });
    };

    let explicit = collect_explicit(id, frame)?;
    let inferred = infer_from_row_model(frame, ir)?;

    let mut columns = Vec::new();
    for (name, rule) in &explicit {
        match inferred.get(name) {
            Some(row_rule) => columns.push(MergedColumn {
                rule: merge_column(rule, row_rule),
                provenance: ColumnProvenance::Merged,
            }),
            None => columns.push(MergedColumn {
                rule: rule.clone(),
                provenance: ColumnProvenance::Explicit,
            }),
        }
    }
    for (name, rule) in &inferred {
        if !explicit.contains_key(name) {
            columns.push(MergedColumn {
                rule: rule.clone(),
                provenance: ColumnProvenance::RowModel,
            });
        }
    }

    Ok(MergedFrame {
        id: id.to_string(),
        index: frame.index.clone(),
        multi_index: frame.multi_index.clone(),
        columns,
        checks: frame.checks.clone(),
        strict: frame.strict,
        coerce: frame.coerce,
        ordered: frame.ordered,
    })
}

fn collect_explicit(
    frame_id: &str,
    frame: &FrameSchema,
) -> Result<IndexMap<String, ColumnRule>, ResolveError> {
    let mut explicit: IndexMap<String, ColumnRule> = IndexMap::new();
    for rule in &frame.columns {
        match explicit.get(&rule.name).cloned() {
            None => {
                explicit.insert(rule.name.clone(), rule.clone());
            }
            Some(existing) if existing.dtype == rule.dtype => {
                // Same dtype declared twice: fold attributes additively.
                let merged = merge_column(&existing, rule);
                explicit.insert(rule.name.clone(), merged);
            }
            Some(existing) => {
                return Err(ResolveError::ConflictingColumnRule {
                    frame: frame_id.to_string(),
                    column: rule.name.clone(),
                    detail: format!(
                        "explicit dtype '{}' vs explicit dtype '{}'",
                        existing.dtype, rule.dtype
                    ),
                });
            }
        }
    }
    Ok(explicit)
}

/// Infer column rules from the row model's fields.
///
/// A field typed as an optional expression produces a nullable column; a
/// field referencing an enum takes the enum's base type as dtype. Fields
/// with no columnar equivalent (containers, frames) are left out.
fn infer_from_row_model(
    frame: &FrameSchema,
    ir: &SpecIR,
) -> Result<IndexMap<String, ColumnRule>, ResolveError> {
    let Some(row_model_id) = &frame.row_model else {
        return Ok(IndexMap::new());
    };
    let def = ir
        .datatype(row_model_id)
        .ok_or_else(|| ResolveError::UnknownReference {
            id: row_model_id.clone(),
        })?;
    let DataTypeKind::Model(model) = &def.kind else {
        return Err(ResolveError::AmbiguousTypeDefinition {
            id: row_model_id.clone(),
            detail: format!("row_model must name a model, found {}", def.kind.kind_name()),
        });
    };

    let mut inferred = IndexMap::new();
    for field in &model.fields {
        let (base, from_optional) = unwrap_optional(&field.ty);
        let Some(dtype) = column_dtype(base, ir) else {
            continue;
        };
        let mut rule = ColumnRule::new(&field.name, dtype);
        rule.nullable = from_optional || !field.required;
        rule.description = field.description.clone();
        inferred.insert(field.name.clone(), rule);
    }
    Ok(inferred)
}

fn unwrap_optional(expr: &TypeExpr) -> (&TypeExpr, bool) {
    if let TypeExpr::Union { alternatives } = expr {
        let nulls = alternatives.iter().filter(|a| a.is_null_like()).count();
        let others: Vec<&TypeExpr> =
            alternatives.iter().filter(|a| !a.is_null_like()).collect();
        if nulls == 1 && others.len() == 1 {
            return (others[0], true);
        }
    }
    (expr, false)
}

fn column_dtype<'a>(expr: &TypeExpr, ir: &'a SpecIR) -> Option<&'a str> {
    if let Some(dtype) = dtype_for_native(expr) {
        return Some(dtype);
    }
    if let TypeExpr::Ref { id } = expr {
        if let Some(def) = ir.datatype(id) {
            if let DataTypeKind::Enum(e) = &def.kind {
                return Some(&e.base_type);
            }
        }
    }
    None
}

/// Merge an explicit rule with a row-model-inferred rule for one column.
///
/// Dtype from the explicit side (row-model dtype fills in only when the
/// explicit one is empty); nullable/unique by OR; checks by union.
fn merge_column(explicit: &ColumnRule, inferred: &ColumnRule) -> ColumnRule {
    let mut merged = explicit.clone();
    if merged.dtype.is_empty() {
        merged.dtype = inferred.dtype.clone();
    }
    merged.nullable = explicit.nullable || inferred.nullable;
    merged.unique = explicit.unique || inferred.unique;
    for check in &inferred.checks {
        if !merged.checks.contains(check) {
            merged.checks.push(check.clone());
        }
    }
    if merged.description.is_empty() {
        merged.description = inferred.description.clone();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use specforge_core::{DataTypeDef, FieldSpec, ModelSpec};

    fn make_row_model() -> DataTypeDef {
        DataTypeDef::new(
            "PriceRow",
            DataTypeKind::Model(ModelSpec {
                fields: vec![
                    FieldSpec {
                        name: "price".to_string(),
                        ty: TypeExpr::native("builtins", "float"),
                        required: true,
                        description: "trade price".to_string(),
                    },
                    FieldSpec {
                        name: "volume".to_string(),
                        ty: TypeExpr::Union {
                            alternatives: vec![
                                TypeExpr::native("builtins", "int"),
                                TypeExpr::null(),
                            ],
                        },
                        required: true,
                        description: String::new(),
                    },
                ],
            }),
        )
    }

    fn make_frame_ir(frame: FrameSchema) -> SpecIR {
        let mut ir = SpecIR::default();
        ir.datatypes
            .insert("PriceRow".to_string(), make_row_model());
        ir.datatypes.insert(
            "PriceFrame".to_string(),
            DataTypeDef::new("PriceFrame", DataTypeKind::Frame(frame)),
        );
        ir
    }

    #[test]
    fn test_explicit_only() {
        let frame = FrameSchema {
            columns: vec![ColumnRule::new("price", "float")],
            ..FrameSchema::default()
        };
        let ir = make_frame_ir(frame);
        let merged = resolve_frame("PriceFrame", &ir).unwrap();
        assert_eq!(merged.columns.len(), 1);
        assert_eq!(merged.columns[0].provenance, ColumnProvenance::Explicit);
    }

    #[test]
    fn test_row_model_inference() {
        let frame = FrameSchema {
            row_model: Some("PriceRow".to_string()),
            ..FrameSchema::default()
        };
        let ir = make_frame_ir(frame);
        let merged = resolve_frame("PriceFrame", &ir).unwrap();

        let price = merged.column("price").unwrap();
        assert_eq!(price.rule.dtype, "float");
        assert_eq!(price.provenance, ColumnProvenance::RowModel);

        // Optional field infers a nullable column.
        let volume = merged.column("volume").unwrap();
        assert!(volume.rule.nullable);
        assert_eq!(volume.rule.dtype, "int");
    }

    #[test]
    fn test_explicit_wins_on_dtype_attributes_merge() {
        let mut explicit_col = ColumnRule::new("price", "float64");
        explicit_col.checks.push(json!({"greater_than": 0}));
        let frame = FrameSchema {
            row_model: Some("PriceRow".to_string()),
            columns: vec![explicit_col],
            ..FrameSchema::default()
        };
        let ir = make_frame_ir(frame);
        let merged = resolve_frame("PriceFrame", &ir).unwrap();

        let price = merged.column("price").unwrap();
        assert_eq!(price.rule.dtype, "float64");
        assert_eq!(price.provenance, ColumnProvenance::Merged);
        assert_eq!(price.rule.checks.len(), 1);
        // Inferred description fills the empty explicit one.
        assert_eq!(price.rule.description, "trade price");
    }

    #[test]
    fn test_conflicting_explicit_rules() {
        let frame = FrameSchema {
            columns: vec![
                ColumnRule::new("price", "float"),
                ColumnRule::new("price", "int"),
            ],
            ..FrameSchema::default()
        };
        let ir = make_frame_ir(frame);
        let err = resolve_frame("PriceFrame", &ir).unwrap_err();
        match err {
            ResolveError::ConflictingColumnRule { frame, column, .. } => {
                assert_eq!(frame, "PriceFrame");
                assert_eq!(column, "price");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_nullable_merges_additively() {
        let explicit_col = ColumnRule::new("volume", "int");
        let frame = FrameSchema {
            row_model: Some("PriceRow".to_string()),
            columns: vec![explicit_col],
            ..FrameSchema::default()
        };
        let ir = make_frame_ir(frame);
        let merged = resolve_frame("PriceFrame", &ir).unwrap();

        // Row model says nullable, explicit says nothing: union keeps it.
        assert!(merged.column("volume").unwrap().rule.nullable);
    }

    #[test]
    fn test_not_a_frame() {
        let ir = make_frame_ir(FrameSchema::default());
        let err = resolve_frame("PriceRow", &ir).unwrap_err();
        assert!(matches!(err, ResolveError::AmbiguousTypeDefinition { .. }));
    }

    #[test]
    fn test_unknown_frame() {
        let ir = SpecIR::default();
        assert!(matches!(
            resolve_frame("Nope", &ir).unwrap_err(),
            ResolveError::UnknownReference { .. }
        ));
    }
}
