//! Specforge CLI
//!
//! Loads a specification, generates skeletons, checks implementation
//! integrity, and executes the processing graph. The spec file is JSON
//! here; the core only sees the generic tree.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use specforge_codegen::{synthesize, write, FileOutcome};
use specforge_core::SpecIR;
use specforge_graph::{RunConfig, Runner, Selection, StageGraph};
use specforge_integrity::{
    check, FnSignature, ImplEntry, ParamInfo, RegistryView, ValueValidator,
};
use specforge_load::load_and_validate;

#[derive(Parser)]
#[command(name = "specforge")]
#[command(about = "Spec-driven code synthesis and integrity checking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and cross-validate a specification
    Validate {
        /// Path to the spec file (JSON)
        #[arg(short, long)]
        spec: PathBuf,
    },
    /// Generate implementation skeletons
    Gen {
        /// Path to the spec file (JSON)
        #[arg(short, long)]
        spec: PathBuf,
        /// Implementation tree root
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Check spec-implementation integrity
    Check {
        /// Path to the spec file (JSON)
        #[arg(short, long)]
        spec: PathBuf,
        /// Implementation manifest (JSON list of entries)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Execute the processing graph
    Run {
        /// Path to the spec file (JSON)
        #[arg(short, long)]
        spec: PathBuf,
        /// Initial input payload (JSON file)
        #[arg(short, long)]
        input: PathBuf,
        /// Implementation manifest (JSON list of entries)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Parameter overrides, `name=json`
        #[arg(short, long)]
        param: Vec<String>,
        /// Stage selections, `stage=candidate[,candidate]`
        #[arg(long)]
        select: Vec<String>,
        /// Worker bound for independent stages
        #[arg(long, default_value_t = 1)]
        max_workers: usize,
        /// Per-stage timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print the execution plan without invoking anything
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { spec } => cmd_validate(&spec),
        Commands::Gen { spec, out } => cmd_gen(&spec, &out),
        Commands::Check { spec, manifest } => cmd_check(&spec, manifest.as_deref()),
        Commands::Run {
            spec,
            input,
            manifest,
            param,
            select,
            max_workers,
            timeout_ms,
            dry_run,
        } => cmd_run(
            &spec,
            &input,
            manifest.as_deref(),
            &param,
            &select,
            max_workers,
            timeout_ms,
            dry_run,
        ),
    }
}

fn load_ir(spec_path: &std::path::Path) -> Result<SpecIR> {
    let text = std::fs::read_to_string(spec_path)?;
    let tree: Value = serde_json::from_str(&text)?;
    load_and_validate(&tree).map_err(|errors| {
        for error in &errors {
            eprintln!("error: {error}");
        }
        eyre!("specification has {} structural error(s)", errors.len())
    })
}

fn cmd_validate(spec_path: &std::path::Path) -> Result<()> {
    let ir = load_ir(spec_path)?;
    println!(
        "spec '{}' v{} is valid: {} datatype(s), {} transform(s), {} stage(s)",
        ir.meta.name,
        ir.meta.version,
        ir.datatypes.len(),
        ir.transforms.len(),
        ir.stages.len()
    );
    Ok(())
}

fn cmd_gen(spec_path: &std::path::Path, out: &std::path::Path) -> Result<()> {
    let ir = load_ir(spec_path)?;
    let units = synthesize(&ir)?;
    let report = write(out, &units)?;
    for (file, outcome) in &report.files {
        match outcome {
            FileOutcome::Created { units } => {
                println!("created   {} ({} unit(s))", file, units.len());
            }
            FileOutcome::Appended { units } => {
                println!("appended  {} ({})", file, units.join(", "));
            }
            FileOutcome::Unchanged => println!("unchanged {file}"),
        }
    }
    Ok(())
}

fn cmd_check(spec_path: &std::path::Path, manifest: Option<&std::path::Path>) -> Result<()> {
    let ir = load_ir(spec_path)?;
    let view = match manifest {
        Some(path) => load_manifest(path)?,
        None => RegistryView::new(),
    };
    let report = check(&ir, &view, &ValueValidator);
    print!("{}", report.summary());
    if report.is_clean() {
        Ok(())
    } else {
        bail!("{} integrity finding(s)", report.len())
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    spec_path: &std::path::Path,
    input: &std::path::Path,
    manifest: Option<&std::path::Path>,
    params: &[String],
    selects: &[String],
    max_workers: usize,
    timeout_ms: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    let ir = load_ir(spec_path)?;
    let graph = StageGraph::build(&ir)?;
    let view = match manifest {
        Some(path) => load_manifest(path)?,
        None => RegistryView::new(),
    };

    let mut selection = Selection::new();
    for entry in selects {
        let (stage, candidates) = entry
            .split_once('=')
            .ok_or_else(|| eyre!("--select expects stage=candidate[,candidate]: {entry}"))?;
        selection.choose(
            stage,
            candidates.split(',').map(ToString::to_string).collect(),
        );
    }

    let mut config = RunConfig {
        max_workers,
        ..RunConfig::default()
    };
    config.default_timeout = timeout_ms.map(Duration::from_millis);
    for entry in params {
        let (name, raw) = entry
            .split_once('=')
            .ok_or_else(|| eyre!("--param expects name=json: {entry}"))?;
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        config.params.insert(name.to_string(), value);
    }

    let runner = Runner::new(&ir, &graph, &view, config);

    if dry_run {
        for planned in runner.plan(&selection)? {
            println!(
                "{}: {} -> {}",
                planned.stage_id,
                planned.selected.join(", "),
                planned.impls.join(", ")
            );
        }
        return Ok(());
    }

    let initial: Value = serde_json::from_str(&std::fs::read_to_string(input)?)?;
    let report = runner.run(&selection, &initial);

    println!("run status: {:?}", report.status);
    for (stage_id, outcome) in &report.stages {
        match &outcome.failure {
            Some(failure) => println!(
                "  {} {} ({}: {})",
                stage_id,
                outcome.status,
                failure.candidate_id.as_deref().unwrap_or("-"),
                failure.message
            ),
            None => println!("  {} {}", stage_id, outcome.status),
        }
    }
    if !report.published.is_empty() {
        println!("published: {}", serde_json::to_string_pretty(&report.published)?);
    }
    if !report.collected.is_empty() {
        println!("collected: {}", serde_json::to_string_pretty(&report.collected)?);
    }
    Ok(())
}

/// Manifest format: a JSON list of implementation entries
/// `{path, file, params: [{name, type, optional, default}], return}`.
/// Entries carry metadata only; invocation requires in-process
/// registration.
fn load_manifest(path: &std::path::Path) -> Result<RegistryView> {
    let text = std::fs::read_to_string(path)?;
    let entries: Vec<Value> = serde_json::from_str(&text)?;
    let mut view = RegistryView::new();
    for entry in entries {
        let obj = entry
            .as_object()
            .ok_or_else(|| eyre!("manifest entry must be a map"))?;
        let impl_path = obj
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| eyre!("manifest entry missing 'path'"))?;
        let file = obj.get("file").and_then(Value::as_str).unwrap_or_default();

        let mut reg_entry = ImplEntry::new(impl_path, file);
        if let Some(params) = obj.get("params").and_then(Value::as_array) {
            let mut infos = Vec::new();
            for param in params {
                let Some(p) = param.as_object() else { continue };
                let mut info = ParamInfo::required(
                    p.get("name").and_then(Value::as_str).unwrap_or_default(),
                    p.get("type").and_then(Value::as_str).unwrap_or_default(),
                );
                info.optional = p.get("optional").and_then(Value::as_bool).unwrap_or(false);
                info.default = p.get("default").filter(|v| !v.is_null()).cloned();
                infos.push(info);
            }
            reg_entry = reg_entry.with_signature(FnSignature {
                params: infos,
                ret: obj
                    .get("return")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            });
        }
        view.register(reg_entry)
            .map_err(|e| eyre!("manifest: {e}"))?;
    }
    Ok(view)
}
