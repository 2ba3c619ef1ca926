//! Cross-validation of a loaded IR.
//!
//! Collects every structural error instead of stopping at the first, so one
//! bad definition never hides problems elsewhere. A non-empty result is
//! fatal: downstream components require a clean IR.

use std::collections::HashSet;

use specforge_core::{
    is_valid_dtype, DataTypeKind, FrameSchema, GenericType, SelectionMode, SpecError, SpecIR,
    TypeExpr,
};
use specforge_resolve::{resolve, resolve_return_type};

/// Validate every structural invariant of the IR.
pub fn validate_ir(ir: &SpecIR) -> Vec<SpecError> {
    let mut errors = Vec::new();

    validate_datatypes(ir, &mut errors);
    validate_functions(ir, &mut errors);
    validate_stages(ir, &mut errors);
    validate_stage_graph(ir, &mut errors);
    validate_reachability(ir, &mut errors);
    bulk_resolve(ir, &mut errors);

    tracing::debug!(count = errors.len(), "cross-validation finished");
    errors
}

fn validate_datatypes(ir: &SpecIR, errors: &mut Vec<SpecError>) {
    for def in ir.datatypes.values() {
        match &def.kind {
            DataTypeKind::Frame(frame) => validate_frame(&def.id, frame, ir, errors),
            DataTypeKind::Model(model) => {
                for field in &model.fields {
                    check_expr_refs(&def.id, &field.ty, ir, errors);
                }
            }
            DataTypeKind::Alias(target) => check_expr_refs(&def.id, target, ir, errors),
            DataTypeKind::Generic(generic) => check_generic_refs(&def.id, generic, ir, errors),
            DataTypeKind::Enum(e) => {
                if !matches!(e.base_type.as_str(), "str" | "int" | "float") {
                    errors.push(SpecError::Malformed {
                        context: def.id.clone(),
                        message: format!("invalid enum base_type '{}'", e.base_type),
                    });
                }
            }
        }
        for check_ref in &def.check_refs {
            if !ir.checks.contains_key(check_ref) {
                errors.push(SpecError::DanglingReference {
                    id: def.id.clone(),
                    kind: "check".to_string(),
                    referenced: check_ref.clone(),
                });
            }
        }
    }
}

fn validate_frame(id: &str, frame: &FrameSchema, ir: &SpecIR, errors: &mut Vec<SpecError>) {
    let mut seen = HashSet::new();
    for col in &frame.columns {
        if !seen.insert(col.name.as_str()) {
            errors.push(SpecError::FrameRule {
                id: id.to_string(),
                message: format!("duplicate column name '{}'", col.name),
            });
        }
        if col.dtype.is_empty() {
            errors.push(SpecError::FrameRule {
                id: id.to_string(),
                message: format!("column '{}': dtype is not set", col.name),
            });
        } else if !is_valid_dtype(&col.dtype) {
            errors.push(SpecError::FrameRule {
                id: id.to_string(),
                message: format!("column '{}': invalid dtype '{}'", col.name, col.dtype),
            });
        }
    }
    if let Some(index) = &frame.index {
        if index.dtype.is_empty() {
            errors.push(SpecError::FrameRule {
                id: id.to_string(),
                message: "index dtype is not set".to_string(),
            });
        } else if !is_valid_dtype(&index.dtype) {
            errors.push(SpecError::FrameRule {
                id: id.to_string(),
                message: format!("index '{}': invalid dtype '{}'", index.name, index.dtype),
            });
        }
    }
    for level in &frame.multi_index {
        if level.dtype.is_empty() {
            errors.push(SpecError::FrameRule {
                id: id.to_string(),
                message: format!("multi-index level '{}': dtype is not set", level.name),
            });
        } else if !is_valid_dtype(&level.dtype) {
            errors.push(SpecError::FrameRule {
                id: id.to_string(),
                message: format!(
                    "multi-index level '{}': invalid dtype '{}'",
                    level.name, level.dtype
                ),
            });
        }
    }
    if let Some(row_model) = &frame.row_model {
        match ir.datatype(row_model) {
            None => errors.push(SpecError::DanglingReference {
                id: id.to_string(),
                kind: "row_model".to_string(),
                referenced: row_model.clone(),
            }),
            Some(def) if !matches!(def.kind, DataTypeKind::Model(_)) => {
                errors.push(SpecError::FrameRule {
                    id: id.to_string(),
                    message: format!(
                        "row_model '{}' must name a model, found {}",
                        row_model,
                        def.kind.kind_name()
                    ),
                });
            }
            Some(_) => {}
        }
    }
}

fn validate_functions(ir: &SpecIR, errors: &mut Vec<SpecError>) {
    for func in ir.functions() {
        if !func.impl_path.is_empty() && !func.has_valid_impl_path() {
            errors.push(SpecError::InvalidImplPath {
                id: func.id.clone(),
                impl_path: func.impl_path.clone(),
            });
        }
        for param in &func.params {
            check_expr_refs(&func.id, &param.ty, ir, errors);
        }
        if let Some(ret) = &func.ret {
            check_expr_refs(&func.id, ret, ir, errors);
        }
    }
    for example in &ir.examples {
        if !example.datatype_ref.is_empty() && ir.datatype(&example.datatype_ref).is_none() {
            errors.push(SpecError::DanglingReference {
                id: example.id.clone(),
                kind: "datatype".to_string(),
                referenced: example.datatype_ref.clone(),
            });
        }
        if !example.transform_ref.is_empty() && ir.transform(&example.transform_ref).is_none() {
            errors.push(SpecError::DanglingReference {
                id: example.id.clone(),
                kind: "transform".to_string(),
                referenced: example.transform_ref.clone(),
            });
        }
    }
}

fn validate_stages(ir: &SpecIR, errors: &mut Vec<SpecError>) {
    for stage in ir.stages.values() {
        for candidate in &stage.candidates {
            if ir.transform(candidate).is_none() {
                errors.push(SpecError::DanglingReference {
                    id: stage.stage_id.clone(),
                    kind: "transform".to_string(),
                    referenced: candidate.clone(),
                });
            }
        }
        if let Some(default) = &stage.default_transform_id {
            if !stage.candidates.contains(default) {
                errors.push(SpecError::StageRule {
                    stage_id: stage.stage_id.clone(),
                    message: format!("default_transform_id '{default}' not in candidates"),
                });
            }
        }
        if stage.selection_mode == SelectionMode::Single && stage.candidates.len() != 1 {
            errors.push(SpecError::StageRule {
                stage_id: stage.stage_id.clone(),
                message: format!(
                    "selection_mode 'single' requires exactly one candidate, found {}",
                    stage.candidates.len()
                ),
            });
        }
        for type_id in [&stage.input_type, &stage.output_type] {
            if !type_id.is_empty() && ir.datatype(type_id).is_none() {
                errors.push(SpecError::DanglingReference {
                    id: stage.stage_id.clone(),
                    kind: "datatype".to_string(),
                    referenced: type_id.clone(),
                });
            }
        }
        for dep in &stage.depends_on {
            if !ir.stages.contains_key(dep) {
                errors.push(SpecError::DanglingReference {
                    id: stage.stage_id.clone(),
                    kind: "stage".to_string(),
                    referenced: dep.clone(),
                });
            }
        }
        validate_candidate_compatibility(ir, stage, errors);
    }
}

/// Every candidate's resolved parameter/return types must be compatible with
/// the stage's declared input/output type.
fn validate_candidate_compatibility(
    ir: &SpecIR,
    stage: &specforge_core::DagStage,
    errors: &mut Vec<SpecError>,
) {
    let stage_input = resolved_rendering(&stage.input_type, ir);
    let stage_output = resolved_rendering(&stage.output_type, ir);

    for candidate_id in &stage.candidates {
        let Some(candidate) = ir.transform(candidate_id) else {
            continue; // dangling candidate already reported
        };

        if let Some(expected) = &stage_output {
            match resolve_return_type(candidate.ret.as_ref(), ir) {
                Ok(actual) if &actual.rendered != expected => {
                    errors.push(SpecError::StageRule {
                        stage_id: stage.stage_id.clone(),
                        message: format!(
                            "candidate '{}' returns {} but stage outputs {}",
                            candidate_id, actual.rendered, expected
                        ),
                    });
                }
                Ok(_) => {}
                Err(_) => {} // resolution failures surface in the bulk pass
            }
        }

        if let Some(expected) = &stage_input {
            let first_required = candidate.params.iter().find(|p| !p.optional);
            match first_required {
                None => errors.push(SpecError::StageRule {
                    stage_id: stage.stage_id.clone(),
                    message: format!(
                        "candidate '{candidate_id}' has no required parameter to receive the stage input"
                    ),
                }),
                Some(param) => match resolve(&param.ty, ir) {
                    Ok(actual) if &actual.rendered != expected => {
                        errors.push(SpecError::StageRule {
                            stage_id: stage.stage_id.clone(),
                            message: format!(
                                "candidate '{}' parameter '{}' takes {} but stage inputs {}",
                                candidate_id, param.name, actual.rendered, expected
                            ),
                        });
                    }
                    _ => {}
                },
            }
        }
    }
}

fn resolved_rendering(type_id: &str, ir: &SpecIR) -> Option<String> {
    if type_id.is_empty() {
        return None;
    }
    resolve(&TypeExpr::reference(type_id), ir)
        .ok()
        .map(|r| r.rendered)
}

/// Reject cycles among explicit stage dependencies.
///
/// Inferred edges always point from an earlier declaration to a later one,
/// so only `depends_on` can introduce a cycle.
fn validate_stage_graph(ir: &SpecIR, errors: &mut Vec<SpecError>) {
    let ids: Vec<&String> = ir.stages.keys().collect();
    let mut visited: HashSet<&str> = HashSet::new();

    for start in &ids {
        if visited.contains(start.as_str()) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        if let Some(cycle) = walk_cycle(ir, start.as_str(), &mut path, &mut visited) {
            errors.push(SpecError::CyclicStages {
                ids: cycle.into_iter().map(ToString::to_string).collect(),
            });
            return; // one cycle report names the offending stages
        }
    }
}

fn walk_cycle<'a>(
    ir: &'a SpecIR,
    node: &'a str,
    path: &mut Vec<&'a str>,
    visited: &mut HashSet<&'a str>,
) -> Option<Vec<&'a str>> {
    if let Some(pos) = path.iter().position(|n| *n == node) {
        let mut cycle: Vec<&str> = path[pos..].to_vec();
        cycle.push(node);
        return Some(cycle);
    }
    if visited.contains(node) {
        return None;
    }
    path.push(node);
    if let Some(stage) = ir.stages.get(node) {
        for dep in &stage.depends_on {
            if let Some(cycle) = walk_cycle(ir, dep.as_str(), path, visited) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    visited.insert(node);
    None
}

/// Every definition must be reachable from at least one example or
/// generator, following the type-reference graph.
fn validate_reachability(ir: &SpecIR, errors: &mut Vec<SpecError>) {
    let mut reachable: HashSet<String> = HashSet::new();
    let mut queue: Vec<String> = Vec::new();

    for def in ir.datatypes.values() {
        let has_example = !def.example_refs.is_empty()
            || ir.examples.iter().any(|ex| ex.datatype_ref == def.id);
        let has_generator =
            !def.generator_refs.is_empty() || !ir.generators_returning(&def.id).is_empty();
        if has_example || has_generator {
            queue.push(def.id.clone());
        }
    }

    while let Some(id) = queue.pop() {
        if !reachable.insert(id.clone()) {
            continue;
        }
        let Some(def) = ir.datatype(&id) else {
            continue;
        };
        let mut refs = Vec::new();
        collect_kind_refs(&def.kind, &mut refs);
        queue.extend(refs);
    }

    for def in ir.datatypes.values() {
        if !reachable.contains(&def.id) {
            errors.push(SpecError::UnreachableDefinition { id: def.id.clone() });
        }
    }
}

fn collect_kind_refs(kind: &DataTypeKind, out: &mut Vec<String>) {
    match kind {
        DataTypeKind::Model(model) => {
            for field in &model.fields {
                collect_expr_refs(&field.ty, out);
            }
        }
        DataTypeKind::Alias(target) => collect_expr_refs(target, out),
        DataTypeKind::Generic(generic) => collect_generic_refs(generic, out),
        DataTypeKind::Frame(frame) => {
            if let Some(row_model) = &frame.row_model {
                out.push(row_model.clone());
            }
        }
        DataTypeKind::Enum(_) => {}
    }
}

fn collect_expr_refs(expr: &TypeExpr, out: &mut Vec<String>) {
    match expr {
        TypeExpr::Ref { id } => out.push(id.clone()),
        TypeExpr::Generic(generic) => collect_generic_refs(generic, out),
        TypeExpr::Union { alternatives } => {
            for alt in alternatives {
                collect_expr_refs(alt, out);
            }
        }
        TypeExpr::Native { .. } | TypeExpr::Literal { .. } => {}
    }
}

fn collect_generic_refs(generic: &GenericType, out: &mut Vec<String>) {
    for sub in [&generic.element, &generic.key, &generic.value] {
        if let Some(expr) = sub {
            collect_expr_refs(expr, out);
        }
    }
    for elem in &generic.elements {
        collect_expr_refs(elem, out);
    }
}

fn check_expr_refs(holder: &str, expr: &TypeExpr, ir: &SpecIR, errors: &mut Vec<SpecError>) {
    let mut refs = Vec::new();
    collect_expr_refs(expr, &mut refs);
    for id in refs {
        if ir.datatype(&id).is_none() {
            errors.push(SpecError::DanglingReference {
                id: holder.to_string(),
                kind: "datatype".to_string(),
                referenced: id,
            });
        }
    }
}

fn check_generic_refs(
    holder: &str,
    generic: &GenericType,
    ir: &SpecIR,
    errors: &mut Vec<SpecError>,
) {
    let mut refs = Vec::new();
    collect_generic_refs(generic, &mut refs);
    for id in refs {
        if ir.datatype(&id).is_none() {
            errors.push(SpecError::DanglingReference {
                id: holder.to_string(),
                kind: "datatype".to_string(),
                referenced: id,
            });
        }
    }
}

/// Resolve every definition and function signature once, collecting
/// resolution errors without aborting sibling resolutions.
fn bulk_resolve(ir: &SpecIR, errors: &mut Vec<SpecError>) {
    let mut seen: Vec<SpecError> = Vec::new();
    let push = |err: SpecError, seen: &mut Vec<SpecError>| {
        // Cycles surface once per participating definition; report each
        // distinct error a single time.
        if !seen.contains(&err) {
            seen.push(err);
        }
    };

    for id in ir.datatypes.keys() {
        if let Err(e) = resolve(&TypeExpr::reference(id), ir) {
            push(SpecError::Resolution(e), &mut seen);
        }
    }
    for func in ir.functions() {
        for param in &func.params {
            if let Err(e) = resolve(&param.ty, ir) {
                push(SpecError::Resolution(e), &mut seen);
            }
        }
        if let Some(ret) = &func.ret {
            if let Err(e) = resolve(ret, ir) {
                push(SpecError::Resolution(e), &mut seen);
            }
        }
    }
    errors.extend(seen);
}
