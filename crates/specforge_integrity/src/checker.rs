//! The integrity check itself.
//!
//! Recomputes expected shapes through the resolver and compares them with
//! what the implementation view reports. Categories are independent and all
//! evaluated even after one fails; findings carry the offending id and a
//! precise location.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use specforge_core::{DataTypeDef, FunctionDef, SpecIR};
use specforge_resolve::{rendered_param_type, resolve_return_type};

use crate::validator::SchemaValidator;
use crate::view::ImplementationView;

/// Category of one integrity finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingCategory {
    /// Implementation not loadable at its declared location
    Existence,
    /// Implementation lives in a different file than declared
    Placement,
    /// Signature differs from the spec-derived shape
    Signature,
    /// Example payload or generator output fails validation
    ExampleConformance,
    /// Datatype has neither a usable example nor a usable generator
    NoMaterialization,
}

impl std::fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existence => write!(f, "existence"),
            Self::Placement => write!(f, "placement"),
            Self::Signature => write!(f, "signature"),
            Self::ExampleConformance => write!(f, "example-conformance"),
            Self::NoMaterialization => write!(f, "no-materialization"),
        }
    }
}

/// One reported integrity discrepancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Offending definition id
    pub id: String,
    /// Finding category
    pub category: FindingCategory,
    /// Precise location (file, impl path, example id)
    pub location: String,
    /// What is wrong
    pub message: String,
}

/// Structured, categorized findings report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FindingsReport {
    /// Every finding, in evaluation order
    pub findings: Vec<Finding>,
}

impl FindingsReport {
    /// Whether no findings were reported
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Number of findings
    #[must_use]
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// Whether the report is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings grouped by category, preserving evaluation order
    #[must_use]
    pub fn by_category(&self) -> IndexMap<FindingCategory, Vec<&Finding>> {
        let mut grouped: IndexMap<FindingCategory, Vec<&Finding>> = IndexMap::new();
        for finding in &self.findings {
            grouped.entry(finding.category).or_default().push(finding);
        }
        grouped
    }

    /// Findings for one definition id
    #[must_use]
    pub fn for_id(&self, id: &str) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.id == id).collect()
    }

    /// Human-readable summary, one line per finding
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "all integrity checks passed".to_string();
        }
        let mut out = format!("{} finding(s)\n", self.len());
        for (category, findings) in self.by_category() {
            out.push_str(&format!("  {category}: {}\n", findings.len()));
            for finding in findings {
                out.push_str(&format!(
                    "    {} [{}] {}\n",
                    finding.id, finding.location, finding.message
                ));
            }
        }
        out
    }

    fn push(&mut self, id: &str, category: FindingCategory, location: &str, message: String) {
        self.findings.push(Finding {
            id: id.to_string(),
            category,
            location: location.to_string(),
            message,
        });
    }
}

/// Run the full integrity check.
///
/// Never fatal: one bad definition adds findings and evaluation continues
/// with the next.
pub fn check(
    ir: &SpecIR,
    view: &dyn ImplementationView,
    validator: &dyn SchemaValidator,
) -> FindingsReport {
    let mut report = FindingsReport::default();

    for func in ir.functions() {
        check_function(ir, func, view, &mut report);
    }
    for def in ir.datatypes.values() {
        check_materialization(ir, def, view, validator, &mut report);
    }

    tracing::debug!(findings = report.len(), "integrity check finished");
    report
}

fn check_function(
    ir: &SpecIR,
    func: &FunctionDef,
    view: &dyn ImplementationView,
    report: &mut FindingsReport,
) {
    let location = if func.file_path.is_empty() {
        func.impl_path.clone()
    } else {
        func.file_path.clone()
    };

    // Existence
    if !view.exists(&func.impl_path) {
        report.push(
            &func.id,
            FindingCategory::Existence,
            &location,
            format!("{} '{}' not loadable at '{}'", func.role, func.id, func.impl_path),
        );
    }

    // Placement: judged independently whenever the view can locate the
    // implementation.
    if let Some(actual_file) = view.locate(&func.impl_path) {
        if !func.file_path.is_empty() && actual_file != func.file_path {
            report.push(
                &func.id,
                FindingCategory::Placement,
                &location,
                format!(
                    "declared file '{}' but implementation lives in '{}'",
                    func.file_path, actual_file
                ),
            );
        }
    }

    // Signature: per-parameter comparison against the spec-derived shape.
    if let Some(actual) = view.signature(&func.impl_path) {
        compare_signature(ir, func, &actual, &location, report);
    }
}

fn compare_signature(
    ir: &SpecIR,
    func: &FunctionDef,
    actual: &crate::view::FnSignature,
    location: &str,
    report: &mut FindingsReport,
) {
    let expected_len = func.params.len();
    let actual_len = actual.params.len();
    if expected_len != actual_len {
        report.push(
            &func.id,
            FindingCategory::Signature,
            location,
            format!("expected {expected_len} parameter(s), found {actual_len}"),
        );
    }

    for (i, expected) in func.params.iter().enumerate() {
        let Some(observed) = actual.params.get(i) else {
            report.push(
                &func.id,
                FindingCategory::Signature,
                location,
                format!("parameter '{}' (position {}) is missing", expected.name, i),
            );
            continue;
        };
        if observed.name != expected.name {
            report.push(
                &func.id,
                FindingCategory::Signature,
                location,
                format!(
                    "parameter {} is named '{}', spec says '{}'",
                    i, observed.name, expected.name
                ),
            );
        }
        match rendered_param_type(expected, ir) {
            Ok(resolved) => {
                if observed.rendered_type != resolved.rendered {
                    report.push(
                        &func.id,
                        FindingCategory::Signature,
                        location,
                        format!(
                            "parameter '{}' has type {}, spec resolves to {}",
                            expected.name, observed.rendered_type, resolved.rendered
                        ),
                    );
                }
            }
            Err(e) => {
                report.push(
                    &func.id,
                    FindingCategory::Signature,
                    location,
                    format!("parameter '{}' type failed to resolve: {e}", expected.name),
                );
            }
        }
        if observed.optional != expected.optional {
            report.push(
                &func.id,
                FindingCategory::Signature,
                location,
                format!(
                    "parameter '{}' optionality differs (implementation: {}, spec: {})",
                    expected.name, observed.optional, expected.optional
                ),
            );
        }
        if observed.default != expected.default {
            report.push(
                &func.id,
                FindingCategory::Signature,
                location,
                format!("parameter '{}' default differs", expected.name),
            );
        }
    }
    for observed in actual.params.iter().skip(expected_len) {
        report.push(
            &func.id,
            FindingCategory::Signature,
            location,
            format!("unexpected extra parameter '{}'", observed.name),
        );
    }

    if let Some(actual_ret) = &actual.ret {
        match resolve_return_type(func.ret.as_ref(), ir) {
            Ok(expected_ret) => {
                if actual_ret != &expected_ret.rendered {
                    report.push(
                        &func.id,
                        FindingCategory::Signature,
                        location,
                        format!(
                            "returns {}, spec resolves to {}",
                            actual_ret, expected_ret.rendered
                        ),
                    );
                }
            }
            Err(e) => {
                report.push(
                    &func.id,
                    FindingCategory::Signature,
                    location,
                    format!("return type failed to resolve: {e}"),
                );
            }
        }
    }
}

/// Example-conformance and materialization checks for one datatype.
///
/// Every declared example is validated against the resolved schema; every
/// declared generator is invoked and its output validated. This is a
/// runtime smoke test, not a static check only.
fn check_materialization(
    ir: &SpecIR,
    def: &DataTypeDef,
    view: &dyn ImplementationView,
    validator: &dyn SchemaValidator,
    report: &mut FindingsReport,
) {
    let examples = ir.examples_for(&def.id);
    let generators = declared_generators(ir, def);

    for example in &examples {
        let location = format!("example '{}'", example.id);
        for reason in validator.validate(ir, &def.id, &example.input) {
            report.push(&def.id, FindingCategory::ExampleConformance, &location, reason);
        }
        run_attached_checks(ir, def, view, &example.input, &location, report);
    }

    for generator in &generators {
        let location = format!("generator '{}'", generator.id);
        let args = default_args(generator);
        match view.invoke(&generator.impl_path, &args) {
            Ok(output) => {
                for reason in validator.validate(ir, &def.id, &output) {
                    report.push(
                        &def.id,
                        FindingCategory::ExampleConformance,
                        &location,
                        format!("generator output invalid: {reason}"),
                    );
                }
                run_attached_checks(ir, def, view, &output, &location, report);
            }
            Err(e) => {
                report.push(
                    &def.id,
                    FindingCategory::ExampleConformance,
                    &location,
                    format!("generator invocation failed: {e}"),
                );
            }
        }
    }

    if examples.is_empty() && generators.is_empty() {
        report.push(
            &def.id,
            FindingCategory::NoMaterialization,
            &def.id,
            "definition has neither a usable example nor a usable generator".to_string(),
        );
    }
}

fn declared_generators<'a>(ir: &'a SpecIR, def: &DataTypeDef) -> Vec<&'a FunctionDef> {
    let mut out: Vec<&FunctionDef> = def
        .generator_refs
        .iter()
        .filter_map(|id| ir.generators.get(id))
        .collect();
    for generator in ir.generators_returning(&def.id) {
        if !out.iter().any(|g| g.id == generator.id) {
            out.push(generator);
        }
    }
    out
}

/// Invoke every check attached to the datatype against a payload.
///
/// A check returning `false` or raising surfaces an example-conformance
/// finding rather than passing silently.
fn run_attached_checks(
    ir: &SpecIR,
    def: &DataTypeDef,
    view: &dyn ImplementationView,
    payload: &Value,
    location: &str,
    report: &mut FindingsReport,
) {
    for check_id in &def.check_refs {
        let Some(check) = ir.checks.get(check_id) else {
            continue; // dangling refs are load-time errors
        };
        let param_name = check
            .params
            .first()
            .map_or("payload", |p| p.name.as_str());
        let mut args = IndexMap::new();
        args.insert(param_name.to_string(), payload.clone());

        match view.invoke(&check.impl_path, &args) {
            Ok(Value::Bool(true)) => {}
            Ok(Value::Bool(false)) => {
                report.push(
                    &def.id,
                    FindingCategory::ExampleConformance,
                    location,
                    format!("check '{}' rejected the payload", check.id),
                );
            }
            Ok(other) => {
                report.push(
                    &def.id,
                    FindingCategory::ExampleConformance,
                    location,
                    format!("check '{}' returned non-boolean {other}", check.id),
                );
            }
            Err(e) => {
                report.push(
                    &def.id,
                    FindingCategory::ExampleConformance,
                    location,
                    format!("check '{}' failed: {e}", check.id),
                );
            }
        }
    }
}

fn default_args(func: &FunctionDef) -> IndexMap<String, Value> {
    let mut args = IndexMap::new();
    for param in &func.params {
        if let Some(default) = &param.default {
            args.insert(param.name.clone(), default.clone());
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValueValidator;
    use crate::view::{FnSignature, ImplEntry, ParamInfo, RegistryView};
    use serde_json::json;
    use specforge_load::{load_spec, ContributorRegistry};
    use std::sync::Arc;

    fn make_test_ir() -> SpecIR {
        let ir = load_spec(&json!({
            "meta": {"name": "demo"},
            "datatypes": [
                {"id": "Age", "type_alias": {"native": "builtins:int"},
                 "check_refs": ["age_positive"]}
            ],
            "checks": [
                {"id": "age_positive", "impl": "app.checks:age_positive",
                 "file_path": "checks/validators.rs", "input_type": "Age"}
            ],
            "transforms": [
                {"id": "double_age", "impl": "app.transforms:double_age",
                 "file_path": "transforms/processors.rs",
                 "parameters": [{"name": "age", "type": {"datatype_ref": "Age"}}],
                 "return": {"datatype_ref": "Age"}}
            ],
            "examples": [
                {"id": "ex_neg", "datatype_ref": "Age", "input": -1}
            ]
        }))
        .unwrap();
        ContributorRegistry::with_builtins().apply_all(&ir)
    }

    fn make_full_view() -> RegistryView {
        let mut view = RegistryView::new();
        view.register(
            ImplEntry::new("app.checks:age_positive", "checks/validators.rs")
                .with_signature(FnSignature {
                    params: vec![ParamInfo::required("payload", "Age")],
                    ret: Some("bool".to_string()),
                })
                .with_callable(Arc::new(|args| {
                    let age = args
                        .values()
                        .next()
                        .and_then(Value::as_i64)
                        .ok_or("payload is not an int")?;
                    Ok(json!(age > 0))
                })),
        )
        .unwrap();
        view.register(
            ImplEntry::new("app.transforms:double_age", "transforms/processors.rs")
                .with_signature(FnSignature {
                    params: vec![ParamInfo::required("age", "Age")],
                    ret: Some("Age".to_string()),
                }),
        )
        .unwrap();
        view
    }

    #[test]
    fn test_negative_example_surfaces_conformance_finding() {
        // The spec scenario: Age with example -1 and a positivity check must
        // surface an example-conformance finding, not pass silently.
        let ir = make_test_ir();
        let view = make_full_view();
        let report = check(&ir, &view, &ValueValidator);

        let findings = report.for_id("Age");
        assert!(findings
            .iter()
            .any(|f| f.category == FindingCategory::ExampleConformance
                && f.message.contains("age_positive")));
    }

    #[test]
    fn test_missing_implementation() {
        let ir = make_test_ir();
        let view = RegistryView::new();
        let report = check(&ir, &view, &ValueValidator);

        assert!(report
            .for_id("double_age")
            .iter()
            .any(|f| f.category == FindingCategory::Existence));
        // One missing definition never suppresses findings about others.
        assert!(report
            .for_id("age_positive")
            .iter()
            .any(|f| f.category == FindingCategory::Existence));
    }

    #[test]
    fn test_placement_mismatch() {
        let ir = make_test_ir();
        let mut view = RegistryView::new();
        view.register(ImplEntry::new(
            "app.transforms:double_age",
            "somewhere/else.rs",
        ))
        .unwrap();
        view.register(ImplEntry::new(
            "app.checks:age_positive",
            "checks/validators.rs",
        ))
        .unwrap();

        let report = check(&ir, &view, &ValueValidator);
        assert!(report
            .for_id("double_age")
            .iter()
            .any(|f| f.category == FindingCategory::Placement));
    }

    #[test]
    fn test_signature_mismatch_named_per_parameter() {
        let ir = make_test_ir();
        let mut view = RegistryView::new();
        view.register(
            ImplEntry::new("app.transforms:double_age", "transforms/processors.rs")
                .with_signature(FnSignature {
                    params: vec![ParamInfo::required("years", "i64")],
                    ret: Some("Age".to_string()),
                }),
        )
        .unwrap();
        view.register(ImplEntry::new(
            "app.checks:age_positive",
            "checks/validators.rs",
        ))
        .unwrap();

        let report = check(&ir, &view, &ValueValidator);
        let signature_findings: Vec<_> = report
            .for_id("double_age")
            .into_iter()
            .filter(|f| f.category == FindingCategory::Signature)
            .cloned()
            .collect();

        // Name and type both differ, each named per parameter.
        assert!(signature_findings
            .iter()
            .any(|f| f.message.contains("'years'") && f.message.contains("'age'")));
        assert!(signature_findings
            .iter()
            .any(|f| f.message.contains("i64") && f.message.contains("Age")));
    }

    #[test]
    fn test_no_materialization() {
        let ir = load_spec(&json!({
            "datatypes": [
                {"id": "Lonely", "type_alias": {"native": "builtins:int"}}
            ]
        }))
        .unwrap();
        let report = check(&ir, &RegistryView::new(), &ValueValidator);
        assert!(report
            .for_id("Lonely")
            .iter()
            .any(|f| f.category == FindingCategory::NoMaterialization));
    }

    #[test]
    fn test_generator_smoke_test() {
        let ir = load_spec(&json!({
            "datatypes": [
                {"id": "Age", "type_alias": {"native": "builtins:int"}}
            ],
            "generators": [
                {"id": "gen_bad_age", "impl": "app.gen:gen_bad_age",
                 "file_path": "gen.rs", "return": {"datatype_ref": "Age"}}
            ]
        }))
        .unwrap();
        let ir = ContributorRegistry::with_builtins().apply_all(&ir);

        let mut view = RegistryView::new();
        view.register(
            ImplEntry::new("app.gen:gen_bad_age", "gen.rs")
                .with_callable(Arc::new(|_| Ok(json!("not an int")))),
        )
        .unwrap();

        let report = check(&ir, &view, &ValueValidator);
        assert!(report
            .for_id("Age")
            .iter()
            .any(|f| f.category == FindingCategory::ExampleConformance
                && f.message.contains("generator output invalid")));
    }

    #[test]
    fn test_clean_report_summary() {
        let report = FindingsReport::default();
        assert!(report.is_clean());
        assert_eq!(report.summary(), "all integrity checks passed");
    }

    #[test]
    fn test_report_grouping() {
        let ir = make_test_ir();
        let report = check(&ir, &RegistryView::new(), &ValueValidator);
        let grouped = report.by_category();
        assert!(grouped.contains_key(&FindingCategory::Existence));
    }
}
