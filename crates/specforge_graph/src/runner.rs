//! Stage execution: state machine, failure isolation, run report.
//!
//! Per-stage state machine: Pending -> Scheduled -> Running ->
//! {Completed | Failed}; a failed stage marks its transitive dependents
//! Skipped while independent branches continue. Independent stages of one
//! topological layer may run on a bounded worker pool; stages on one
//! dependency chain always execute strictly in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use specforge_core::{FunctionDef, SpecIR};
use specforge_integrity::ImplementationView;

use crate::graph::StageGraph;
use crate::select::{resolve_selection, SelectError, Selection};

/// Lifecycle state of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Not yet considered
    Pending,
    /// Ready to run in the current layer
    Scheduled,
    /// Currently executing
    Running,
    /// Every selected candidate finished
    Completed,
    /// A candidate failed, timed out, or selection was invalid
    Failed,
    /// Not executed: upstream failure or cancellation
    Skipped,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a stage failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// The failing stage
    pub stage_id: String,
    /// The failing candidate, when one was running
    pub candidate_id: Option<String>,
    /// Underlying error
    pub message: String,
    /// Whether the failure was a timeout
    pub timed_out: bool,
}

/// Final state of one stage in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Final status
    pub status: StageStatus,
    /// Candidates that were selected to run
    pub selected: Vec<String>,
    /// Stage output (aggregate when `collect_output`)
    pub output: Option<Value>,
    /// Failure details when status is `Failed`
    pub failure: Option<StageFailure>,
}

impl StageOutcome {
    fn pending() -> Self {
        Self {
            status: StageStatus::Pending,
            selected: Vec::new(),
            output: None,
            failure: None,
        }
    }

    fn skipped() -> Self {
        Self {
            status: StageStatus::Skipped,
            selected: Vec::new(),
            output: None,
            failure: None,
        }
    }

    fn failed(failure: StageFailure, selected: Vec<String>) -> Self {
        Self {
            status: StageStatus::Failed,
            selected,
            output: None,
            failure: Some(failure),
        }
    }
}

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every required stage completed
    Completed,
    /// At least one stage failed or was skipped
    PartialFailure,
    /// Cancellation stopped scheduling before the run finished
    Cancelled,
}

/// Per-run execution report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Overall status
    pub status: RunStatus,
    /// Outcome per stage, in declaration order
    pub stages: IndexMap<String, StageOutcome>,
    /// `collect_output` aggregates, keyed by stage id then candidate id
    pub collected: IndexMap<String, Value>,
    /// Outputs of stages with `publish_output`
    pub published: IndexMap<String, Value>,
}

impl RunReport {
    /// Outcome for one stage
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&StageOutcome> {
        self.stages.get(id)
    }

    /// Every failure, in declaration order
    #[must_use]
    pub fn failures(&self) -> Vec<&StageFailure> {
        self.stages
            .values()
            .filter_map(|o| o.failure.as_ref())
            .collect()
    }
}

/// One entry of a dry-run plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    /// Stage id
    pub stage_id: String,
    /// Candidates that would run, in order
    pub selected: Vec<String>,
    /// Their implementation locations
    pub impls: Vec<String>,
}

/// Cooperative cancellation token.
///
/// Cancelling stops scheduling of not-yet-started stages; already-running
/// stages finish or fail naturally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run configuration
#[derive(Clone, Default)]
pub struct RunConfig {
    /// Worker bound for independent stages of one layer; 0 or 1 means
    /// strictly sequential
    pub max_workers: usize,
    /// Timeout applied to stages without a specific one
    pub default_timeout: Option<Duration>,
    /// Per-stage timeouts
    pub stage_timeouts: IndexMap<String, Duration>,
    /// User-provided parameter overrides, by parameter name
    pub params: IndexMap<String, Value>,
    /// Cancellation token
    pub cancel: CancelToken,
}

/// Executes stages against an implementation view
pub struct Runner<'a> {
    ir: &'a SpecIR,
    graph: &'a StageGraph,
    view: &'a dyn ImplementationView,
    config: RunConfig,
}

impl<'a> Runner<'a> {
    /// Create a runner over an IR, its stage graph and a view
    #[must_use]
    pub fn new(
        ir: &'a SpecIR,
        graph: &'a StageGraph,
        view: &'a dyn ImplementationView,
        config: RunConfig,
    ) -> Self {
        Self {
            ir,
            graph,
            view,
            config,
        }
    }

    /// Resolve the execution plan without invoking anything.
    ///
    /// # Errors
    ///
    /// Propagates the first selection error.
    pub fn plan(&self, selection: &Selection) -> Result<Vec<PlannedStage>, SelectError> {
        let mut plan = Vec::with_capacity(self.graph.len());
        for stage_id in self.graph.topo_order() {
            let stage = self.ir.stages.get(stage_id).expect("stage in graph");
            let selected = resolve_selection(stage, selection)?;
            let impls = selected
                .iter()
                .map(|id| {
                    self.ir
                        .transform(id)
                        .map_or_else(String::new, |t| t.impl_path.clone())
                })
                .collect();
            plan.push(PlannedStage {
                stage_id: stage_id.clone(),
                selected,
                impls,
            });
        }
        Ok(plan)
    }

    /// Execute the graph to completion.
    pub fn run(&self, selection: &Selection, initial: &Value) -> RunReport {
        let mut outcomes: IndexMap<String, StageOutcome> = self
            .graph
            .stages()
            .iter()
            .map(|id| (id.clone(), StageOutcome::pending()))
            .collect();
        let mut outputs: IndexMap<String, Value> = IndexMap::new();
        let mut cancelled = false;

        for layer in self.graph.layers() {
            let mut runnable: Vec<(String, Vec<String>, Option<Value>)> = Vec::new();

            for stage_id in layer {
                if self.config.cancel.is_cancelled() {
                    cancelled = true;
                    outcomes.insert(stage_id, StageOutcome::skipped());
                    continue;
                }
                let deps = self.graph.dependencies(&stage_id);
                let upstream_ok = deps
                    .iter()
                    .all(|dep| outcomes[dep].status == StageStatus::Completed);
                if !upstream_ok {
                    tracing::debug!(stage = %stage_id, "skipped: upstream not completed");
                    outcomes.insert(stage_id, StageOutcome::skipped());
                    continue;
                }

                let Some(stage) = self.ir.stages.get(&stage_id) else {
                    outcomes.insert(
                        stage_id.clone(),
                        StageOutcome::failed(
                            StageFailure {
                                stage_id,
                                candidate_id: None,
                                message: "stage not in IR".to_string(),
                                timed_out: false,
                            },
                            Vec::new(),
                        ),
                    );
                    continue;
                };
                match resolve_selection(stage, selection) {
                    Ok(selected) => {
                        let input = stage_input(&deps, &outputs, initial);
                        if let Some(outcome) = outcomes.get_mut(&stage_id) {
                            outcome.status = StageStatus::Scheduled;
                            outcome.selected = selected.clone();
                        }
                        runnable.push((stage_id, selected, input));
                    }
                    Err(e) => {
                        outcomes.insert(
                            stage_id.clone(),
                            StageOutcome::failed(
                                StageFailure {
                                    stage_id,
                                    candidate_id: None,
                                    message: e.to_string(),
                                    timed_out: false,
                                },
                                Vec::new(),
                            ),
                        );
                    }
                }
            }

            let results = if self.config.max_workers > 1 && runnable.len() > 1 {
                self.run_layer_parallel(&runnable)
            } else {
                runnable
                    .iter()
                    .map(|(id, selected, input)| {
                        (id.clone(), self.execute_stage(id, selected, input.as_ref()))
                    })
                    .collect()
            };

            for (stage_id, outcome) in results {
                if outcome.status == StageStatus::Completed {
                    if let Some(output) = &outcome.output {
                        outputs.insert(stage_id.clone(), output.clone());
                    }
                }
                outcomes.insert(stage_id, outcome);
            }
        }

        let mut collected = IndexMap::new();
        let mut published = IndexMap::new();
        for (stage_id, outcome) in &outcomes {
            let Some(stage) = self.ir.stages.get(stage_id) else {
                continue;
            };
            if let Some(output) = &outcome.output {
                if stage.collect_output {
                    collected.insert(stage_id.clone(), output.clone());
                }
                if stage.publish_output {
                    published.insert(stage_id.clone(), output.clone());
                }
            }
        }

        let status = if cancelled {
            RunStatus::Cancelled
        } else if outcomes
            .values()
            .all(|o| o.status == StageStatus::Completed)
        {
            RunStatus::Completed
        } else {
            RunStatus::PartialFailure
        };

        RunReport {
            status,
            stages: outcomes,
            collected,
            published,
        }
    }

    /// Run independent stages of one layer on a bounded pool, folding the
    /// results back in submission order for determinism.
    fn run_layer_parallel(
        &self,
        runnable: &[(String, Vec<String>, Option<Value>)],
    ) -> Vec<(String, StageOutcome)> {
        let mut results = Vec::with_capacity(runnable.len());
        for chunk in runnable.chunks(self.config.max_workers) {
            std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|(id, selected, input)| {
                        scope.spawn(move || self.execute_stage(id, selected, input.as_ref()))
                    })
                    .collect();
                for ((id, selected, _), handle) in chunk.iter().zip(handles) {
                    let outcome = handle.join().unwrap_or_else(|_| {
                        StageOutcome::failed(
                            StageFailure {
                                stage_id: id.clone(),
                                candidate_id: None,
                                message: "stage execution panicked".to_string(),
                                timed_out: false,
                            },
                            selected.clone(),
                        )
                    });
                    results.push((id.clone(), outcome));
                }
            });
        }
        results
    }

    fn execute_stage(
        &self,
        stage_id: &str,
        selected: &[String],
        input: Option<&Value>,
    ) -> StageOutcome {
        let Some(stage) = self.ir.stages.get(stage_id) else {
            return StageOutcome::failed(
                StageFailure {
                    stage_id: stage_id.to_string(),
                    candidate_id: None,
                    message: "stage not in IR".to_string(),
                    timed_out: false,
                },
                selected.to_vec(),
            );
        };
        let timeout = self
            .config
            .stage_timeouts
            .get(stage_id)
            .copied()
            .or(self.config.default_timeout);
        let started = Instant::now();

        tracing::debug!(stage = %stage_id, candidates = selected.len(), "running stage");

        let mut candidate_outputs: IndexMap<String, Value> = IndexMap::new();
        for candidate_id in selected {
            let Some(transform) = self.ir.transform(candidate_id) else {
                return StageOutcome::failed(
                    StageFailure {
                        stage_id: stage_id.to_string(),
                        candidate_id: Some(candidate_id.clone()),
                        message: format!("transform '{candidate_id}' not in IR"),
                        timed_out: false,
                    },
                    selected.to_vec(),
                );
            };

            let args = match bind_params(transform, input, &self.config.params) {
                Ok(args) => args,
                Err(message) => {
                    return StageOutcome::failed(
                        StageFailure {
                            stage_id: stage_id.to_string(),
                            candidate_id: Some(candidate_id.clone()),
                            message,
                            timed_out: false,
                        },
                        selected.to_vec(),
                    );
                }
            };

            match self.view.invoke(&transform.impl_path, &args) {
                Ok(output) => {
                    candidate_outputs.insert(candidate_id.clone(), output);
                }
                Err(e) => {
                    return StageOutcome::failed(
                        StageFailure {
                            stage_id: stage_id.to_string(),
                            candidate_id: Some(candidate_id.clone()),
                            message: e.to_string(),
                            timed_out: false,
                        },
                        selected.to_vec(),
                    );
                }
            }

            if let Some(limit) = timeout {
                if started.elapsed() > limit {
                    return StageOutcome::failed(
                        StageFailure {
                            stage_id: stage_id.to_string(),
                            candidate_id: Some(candidate_id.clone()),
                            message: format!("stage exceeded timeout of {limit:?}"),
                            timed_out: true,
                        },
                        selected.to_vec(),
                    );
                }
            }
        }

        let output = if stage.collect_output {
            Some(Value::Object(candidate_outputs.into_iter().collect()))
        } else {
            candidate_outputs.into_iter().last().map(|(_, v)| v)
        };

        StageOutcome {
            status: StageStatus::Completed,
            selected: selected.to_vec(),
            output,
            failure: None,
        }
    }
}

/// Input value for a stage: the initial payload for roots, the upstream
/// output for single-dependency stages, and a map keyed by upstream stage id
/// otherwise.
fn stage_input(
    deps: &[String],
    outputs: &IndexMap<String, Value>,
    initial: &Value,
) -> Option<Value> {
    match deps.len() {
        0 => Some(initial.clone()),
        1 => outputs.get(&deps[0]).cloned(),
        _ => {
            let map: serde_json::Map<String, Value> = deps
                .iter()
                .filter_map(|dep| outputs.get(dep).map(|v| (dep.clone(), v.clone())))
                .collect();
            Some(Value::Object(map))
        }
    }
}

/// Bind declared parameters to values.
///
/// Priority per parameter: user override, then spec default, then the
/// upstream input (bound to the first parameter still unfilled). A required
/// parameter left unbound fails the candidate.
fn bind_params(
    transform: &FunctionDef,
    input: Option<&Value>,
    user: &IndexMap<String, Value>,
) -> Result<IndexMap<String, Value>, String> {
    let mut args = IndexMap::new();
    let mut input_used = false;
    for param in &transform.params {
        if let Some(value) = user.get(&param.name) {
            args.insert(param.name.clone(), value.clone());
            continue;
        }
        if let Some(default) = &param.default {
            args.insert(param.name.clone(), default.clone());
            continue;
        }
        if !input_used {
            if let Some(value) = input {
                args.insert(param.name.clone(), value.clone());
                input_used = true;
                continue;
            }
        }
        if !param.optional {
            return Err(format!("required parameter '{}' not provided", param.name));
        }
    }
    Ok(args)
}
