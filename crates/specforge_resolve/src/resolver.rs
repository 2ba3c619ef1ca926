//! Recursive resolution of type expressions.
//!
//! `resolve` is the single code path used by both the synthesizer and the
//! integrity checker, so the two can never disagree on a rendered shape.
//! Cycle handling tracks the datatype ids currently on the resolution stack;
//! revisiting one is an error, not infinite recursion.

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use specforge_core::{
    Container, DataTypeKind, GenericType, ParamSpec, ResolveError, SpecIR, TypeExpr,
};

/// One reference required by a rendered type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeRef {
    /// A native (target-language) type
    Native {
        /// Module the type lives in
        module: String,
        /// Type name
        name: String,
    },
    /// A generated datatype
    Datatype {
        /// Definition id
        id: String,
    },
}

/// Ordered set of references collected during resolution
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReferenceSet(IndexSet<TypeRef>);

impl ReferenceSet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one reference
    pub fn insert(&mut self, r: TypeRef) {
        self.0.insert(r);
    }

    /// Merge another set into this one
    pub fn extend(&mut self, other: ReferenceSet) {
        self.0.extend(other.0);
    }

    /// Iterate references in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &TypeRef> {
        self.0.iter()
    }

    /// Ids of the referenced datatypes, in insertion order
    #[must_use]
    pub fn datatype_ids(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|r| match r {
                TypeRef::Datatype { id } => Some(id.as_str()),
                TypeRef::Native { .. } => None,
            })
            .collect()
    }

    /// Whether the set contains a reference to the given datatype
    #[must_use]
    pub fn contains_datatype(&self, id: &str) -> bool {
        self.0.contains(&TypeRef::Datatype { id: id.to_string() })
    }

    /// Number of references
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A resolved type: rendered target type plus required references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved {
    /// Rendered target-language type
    pub rendered: String,
    /// References the rendered type depends on
    pub refs: ReferenceSet,
}

impl Resolved {
    fn named(rendered: String, r: TypeRef) -> Self {
        let mut refs = ReferenceSet::new();
        refs.insert(r);
        Self { rendered, refs }
    }
}

static NATIVE_RENDERING: Lazy<HashMap<(&'static str, &'static str), &'static str>> =
    Lazy::new(|| {
        HashMap::from([
            (("builtins", "int"), "i64"),
            (("builtins", "float"), "f64"),
            (("builtins", "str"), "String"),
            (("builtins", "bool"), "bool"),
            (("builtins", "bytes"), "Vec<u8>"),
            (("builtins", "None"), "()"),
            (("builtins", "NoneType"), "()"),
            (("builtins", "object"), "Value"),
            (("typing", "Any"), "Value"),
            (("datetime", "datetime"), "DateTime<Utc>"),
            (("datetime", "date"), "NaiveDate"),
            (("datetime", "timedelta"), "Duration"),
            (("decimal", "Decimal"), "f64"),
        ])
    });

fn render_native(module: &str, name: &str) -> String {
    NATIVE_RENDERING
        .get(&(module, name))
        .map_or_else(|| name.to_string(), |s| (*s).to_string())
}

/// Resolve a type expression against the IR.
///
/// # Errors
///
/// Returns `UnknownReference` for a dangling id and `CyclicTypeDefinition`
/// when the reference chain revisits a definition under resolution.
pub fn resolve(expr: &TypeExpr, ir: &SpecIR) -> Result<Resolved, ResolveError> {
    Resolver::new(ir).resolve_expr(expr)
}

/// Resolve every field of a structural model, in field order.
///
/// Resolving a `Ref` to the model and resolving its fields directly through
/// this function yield identical field shapes.
///
/// # Errors
///
/// Returns `UnknownReference` if `id` is absent or not a model, and any
/// error raised while resolving a field type.
pub fn resolve_model_fields(
    id: &str,
    ir: &SpecIR,
) -> Result<IndexMap<String, Resolved>, ResolveError> {
    let def = ir
        .datatype(id)
        .ok_or_else(|| ResolveError::UnknownReference { id: id.to_string() })?;
    let DataTypeKind::Model(model) = &def.kind else {
        return Err(ResolveError::AmbiguousTypeDefinition {
            id: id.to_string(),
            detail: format!("expected model, found {}", def.kind.kind_name()),
        });
    };
    let mut resolver = Resolver::new(ir);
    resolver.stack.push(id.to_string());
    let mut fields = IndexMap::new();
    for field in &model.fields {
        let mut resolved = resolver.resolve_expr(&field.ty)?;
        if !field.required {
            resolved = optionalize(resolved);
        }
        fields.insert(field.name.clone(), resolved);
    }
    Ok(fields)
}

/// Rendered type of one declared parameter.
///
/// An optional parameter renders as `Option<T>` exactly like a
/// `Union {T, null}` expression does, so the synthesizer and the checker
/// derive the same shape from either spelling.
///
/// # Errors
///
/// Propagates any resolution error from the parameter's type expression.
pub fn rendered_param_type(param: &ParamSpec, ir: &SpecIR) -> Result<Resolved, ResolveError> {
    let resolved = resolve(&param.ty, ir)?;
    if param.optional {
        Ok(optionalize(resolved))
    } else {
        Ok(resolved)
    }
}

/// Rendered return type of a function-like definition; `()` when absent.
///
/// # Errors
///
/// Propagates any resolution error from the return type expression.
pub fn resolve_return_type(
    ret: Option<&TypeExpr>,
    ir: &SpecIR,
) -> Result<Resolved, ResolveError> {
    match ret {
        Some(expr) => resolve(expr, ir),
        None => Ok(Resolved {
            rendered: "()".to_string(),
            refs: ReferenceSet::new(),
        }),
    }
}

fn optionalize(resolved: Resolved) -> Resolved {
    if resolved.rendered.starts_with("Option<") {
        resolved
    } else {
        Resolved {
            rendered: format!("Option<{}>", resolved.rendered),
            refs: resolved.refs,
        }
    }
}

struct Resolver<'a> {
    ir: &'a SpecIR,
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(ir: &'a SpecIR) -> Self {
        Self {
            ir,
            stack: Vec::new(),
        }
    }

    fn resolve_expr(&mut self, expr: &TypeExpr) -> Result<Resolved, ResolveError> {
        match expr {
            TypeExpr::Native { module, name } => Ok(Resolved::named(
                render_native(module, name),
                TypeRef::Native {
                    module: module.clone(),
                    name: name.clone(),
                },
            )),
            TypeExpr::Ref { id } => self.resolve_ref(id),
            TypeExpr::Generic(generic) => self.resolve_generic(generic),
            TypeExpr::Literal { values } => {
                let rendered = format!(
                    "Literal<{}>",
                    values
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(" | ")
                );
                Ok(Resolved {
                    rendered,
                    refs: ReferenceSet::new(),
                })
            }
            TypeExpr::Union { alternatives } => self.resolve_union(alternatives),
        }
    }

    fn resolve_ref(&mut self, id: &str) -> Result<Resolved, ResolveError> {
        let def = self
            .ir
            .datatype(id)
            .ok_or_else(|| ResolveError::UnknownReference { id: id.to_string() })?;

        if let Some(pos) = self.stack.iter().position(|s| s == id) {
            let mut path: Vec<String> = self.stack[pos..].to_vec();
            path.push(id.to_string());
            return Err(ResolveError::CyclicTypeDefinition { path });
        }

        self.stack.push(id.to_string());
        let result = self.resolve_definition(id, def);
        self.stack.pop();
        result
    }

    fn resolve_definition(
        &mut self,
        id: &str,
        def: &specforge_core::DataTypeDef,
    ) -> Result<Resolved, ResolveError> {
        let named = TypeRef::Datatype { id: id.to_string() };
        match &def.kind {
            // Models and enums render as the generated named type. Their
            // interiors are still walked so reference cycles surface here
            // rather than hanging downstream consumers.
            DataTypeKind::Model(model) => {
                for field in &model.fields {
                    self.resolve_expr(&field.ty)?;
                }
                Ok(Resolved::named(id.to_string(), named))
            }
            DataTypeKind::Enum(_) => Ok(Resolved::named(id.to_string(), named)),
            DataTypeKind::Alias(target) => {
                self.resolve_expr(target)?;
                Ok(Resolved::named(id.to_string(), named))
            }
            DataTypeKind::Generic(generic) => {
                let mut resolved = self.resolve_generic(generic)?;
                resolved.refs.insert(named);
                Ok(resolved)
            }
            DataTypeKind::Frame(frame) => {
                if let Some(row_model) = &frame.row_model {
                    self.resolve_ref(row_model)?;
                }
                let mut refs = ReferenceSet::new();
                refs.insert(named);
                if let Some(row_model) = &frame.row_model {
                    refs.insert(TypeRef::Datatype {
                        id: row_model.clone(),
                    });
                }
                Ok(Resolved {
                    rendered: "Frame".to_string(),
                    refs,
                })
            }
        }
    }

    /// Resolve an optional sub-expression; missing ones are the dynamic type.
    fn resolve_part(
        &mut self,
        expr: Option<&TypeExpr>,
        refs: &mut ReferenceSet,
    ) -> Result<String, ResolveError> {
        match expr {
            Some(e) => {
                let resolved = self.resolve_expr(e)?;
                refs.extend(resolved.refs);
                Ok(resolved.rendered)
            }
            None => Ok("Value".to_string()),
        }
    }

    fn resolve_generic(&mut self, generic: &GenericType) -> Result<Resolved, ResolveError> {
        let mut refs = ReferenceSet::new();

        let rendered = match generic.container {
            Container::List => {
                let elem = self.resolve_part(generic.element.as_deref(), &mut refs)?;
                format!("Vec<{elem}>")
            }
            Container::Set => {
                let elem = self.resolve_part(generic.element.as_deref(), &mut refs)?;
                format!("BTreeSet<{elem}>")
            }
            Container::Dict => {
                let key = self.resolve_part(generic.key.as_deref(), &mut refs)?;
                let value = self.resolve_part(generic.value.as_deref(), &mut refs)?;
                format!("IndexMap<{key}, {value}>")
            }
            Container::Tuple => {
                let mut parts = Vec::with_capacity(generic.elements.len());
                for elem in &generic.elements {
                    let resolved = self.resolve_expr(elem)?;
                    refs.extend(resolved.refs);
                    parts.push(resolved.rendered);
                }
                format!("({})", parts.join(", "))
            }
        };
        Ok(Resolved { rendered, refs })
    }

    fn resolve_union(&mut self, alternatives: &[TypeExpr]) -> Result<Resolved, ResolveError> {
        let (nulls, others): (Vec<_>, Vec<_>) =
            alternatives.iter().partition(|alt| alt.is_null_like());

        let mut refs = ReferenceSet::new();
        let mut parts = Vec::with_capacity(others.len());
        for alt in &others {
            let resolved = self.resolve_expr(alt)?;
            refs.extend(resolved.refs);
            parts.push(resolved.rendered);
        }

        let inner = match parts.len() {
            0 => "()".to_string(),
            1 => parts.remove(0),
            n => format!("Union{n}<{}>", parts.join(", ")),
        };

        // Exactly one null-like alternative means "optional T"; duplicate
        // nulls collapse to the same shape.
        if nulls.is_empty() {
            Ok(Resolved {
                rendered: inner,
                refs,
            })
        } else {
            Ok(optionalize(Resolved {
                rendered: inner,
                refs,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use specforge_core::{
        DataTypeDef, EnumMember, EnumSpec, FieldSpec, LiteralValue, ModelSpec, SpecIR,
    };

    fn make_test_ir() -> SpecIR {
        let mut ir = SpecIR::default();
        ir.datatypes.insert(
            "Age".to_string(),
            DataTypeDef::new("Age", DataTypeKind::Alias(TypeExpr::native("builtins", "int"))),
        );
        ir.datatypes.insert(
            "AssetClass".to_string(),
            DataTypeDef::new(
                "AssetClass",
                DataTypeKind::Enum(EnumSpec {
                    base_type: "str".to_string(),
                    members: vec![EnumMember {
                        name: "EQUITY".to_string(),
                        value: LiteralValue::Str("EQUITY".to_string()),
                        description: String::new(),
                    }],
                }),
            ),
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
                            description: String::new(),
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

    #[test]
    fn test_resolve_native() {
        let ir = SpecIR::default();
        let resolved = resolve(&TypeExpr::native("builtins", "int"), &ir).unwrap();
        assert_eq!(resolved.rendered, "i64");
        assert_eq!(resolved.refs.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_native_renders_verbatim() {
        let ir = SpecIR::default();
        let resolved = resolve(&TypeExpr::native("pathlib", "Path"), &ir).unwrap();
        assert_eq!(resolved.rendered, "Path");
    }

    #[test]
    fn test_resolve_ref_to_alias() {
        let ir = make_test_ir();
        let resolved = resolve(&TypeExpr::reference("Age"), &ir).unwrap();
        assert_eq!(resolved.rendered, "Age");
        assert!(resolved.refs.contains_datatype("Age"));
    }

    #[test]
    fn test_resolve_unknown_reference() {
        let ir = SpecIR::default();
        let err = resolve(&TypeExpr::reference("Ghost"), &ir).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownReference {
                id: "Ghost".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_generic_list() {
        let ir = make_test_ir();
        let expr = TypeExpr::Generic(GenericType::list(TypeExpr::reference("Age")));
        let resolved = resolve(&expr, &ir).unwrap();
        assert_eq!(resolved.rendered, "Vec<Age>");
        assert!(resolved.refs.contains_datatype("Age"));
    }

    #[test]
    fn test_resolve_generic_dict_and_tuple() {
        let ir = make_test_ir();
        let dict = TypeExpr::Generic(GenericType::dict(
            TypeExpr::native("builtins", "str"),
            TypeExpr::native("builtins", "float"),
        ));
        assert_eq!(resolve(&dict, &ir).unwrap().rendered, "IndexMap<String, f64>");

        let tuple = TypeExpr::Generic(GenericType::tuple(vec![
            TypeExpr::native("builtins", "int"),
            TypeExpr::reference("AssetClass"),
        ]));
        assert_eq!(resolve(&tuple, &ir).unwrap().rendered, "(i64, AssetClass)");
    }

    #[test]
    fn test_resolve_literal() {
        let ir = SpecIR::default();
        let expr = TypeExpr::Literal {
            values: vec![
                LiteralValue::Str("a".to_string()),
                LiteralValue::Str("b".to_string()),
            ],
        };
        let resolved = resolve(&expr, &ir).unwrap();
        assert_eq!(resolved.rendered, "Literal<\"a\" | \"b\">");
    }

    #[test]
    fn test_union_null_simplifies_to_option() {
        let ir = make_test_ir();
        let expr = TypeExpr::Union {
            alternatives: vec![TypeExpr::reference("Age"), TypeExpr::null()],
        };
        let resolved = resolve(&expr, &ir).unwrap();
        assert_eq!(resolved.rendered, "Option<Age>");
    }

    #[test]
    fn test_union_without_null() {
        let ir = make_test_ir();
        let expr = TypeExpr::Union {
            alternatives: vec![
                TypeExpr::native("builtins", "int"),
                TypeExpr::native("builtins", "str"),
            ],
        };
        let resolved = resolve(&expr, &ir).unwrap();
        assert_eq!(resolved.rendered, "Union2<i64, String>");
    }

    #[test]
    fn test_optional_param_matches_union_null_shape() {
        let ir = make_test_ir();
        let union_shape = resolve(
            &TypeExpr::Union {
                alternatives: vec![TypeExpr::reference("Age"), TypeExpr::null()],
            },
            &ir,
        )
        .unwrap();

        let mut param = ParamSpec::required("age", TypeExpr::reference("Age"));
        param.optional = true;
        let param_shape = rendered_param_type(&param, &ir).unwrap();

        assert_eq!(union_shape.rendered, param_shape.rendered);
    }

    #[test]
    fn test_cycle_detection_names_both_ids() {
        let mut ir = SpecIR::default();
        ir.datatypes.insert(
            "A".to_string(),
            DataTypeDef::new("A", DataTypeKind::Alias(TypeExpr::reference("B"))),
        );
        ir.datatypes.insert(
            "B".to_string(),
            DataTypeDef::new("B", DataTypeKind::Alias(TypeExpr::reference("A"))),
        );

        let err = resolve(&TypeExpr::reference("A"), &ir).unwrap_err();
        match err {
            ResolveError::CyclicTypeDefinition { path } => {
                assert!(path.contains(&"A".to_string()));
                assert!(path.contains(&"B".to_string()));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_model_fields() {
        let ir = make_test_ir();

        // Resolving the model's fields directly...
        let fields = resolve_model_fields("Holding", &ir).unwrap();
        assert_eq!(fields["symbol"].rendered, "String");
        assert_eq!(fields["age"].rendered, "Option<Age>");

        // ...matches resolving each field expression on its own.
        let direct = resolve(&TypeExpr::native("builtins", "str"), &ir).unwrap();
        assert_eq!(fields["symbol"].rendered, direct.rendered);
    }

    #[test]
    fn test_resolve_return_type_default_unit() {
        let ir = SpecIR::default();
        let resolved = resolve_return_type(None, &ir).unwrap();
        assert_eq!(resolved.rendered, "()");
        assert!(resolved.refs.is_empty());
    }

    // Property tests using proptest
    proptest::proptest! {
        #[test]
        fn prop_resolution_deterministic(
            module in "[a-z]{1,8}",
            name in "[A-Za-z]{1,8}"
        ) {
            let ir = SpecIR::default();
            let expr = TypeExpr::native(&module, &name);
            let first = resolve(&expr, &ir).unwrap();
            let second = resolve(&expr, &ir).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_union_null_equals_optional(name in "[A-Z][a-zA-Z]{0,8}") {
            let ir = SpecIR::default();
            let native = TypeExpr::native("ext", &name);

            let union = resolve(
                &TypeExpr::Union {
                    alternatives: vec![native.clone(), TypeExpr::null()],
                },
                &ir,
            )
            .unwrap();

            let mut param = ParamSpec::required("p", native);
            param.optional = true;
            let rendered = rendered_param_type(&param, &ir).unwrap();

            prop_assert_eq!(union.rendered, rendered.rendered);
        }
    }
}
