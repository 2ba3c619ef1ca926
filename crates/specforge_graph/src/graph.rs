//! Stage dependency graph: construction, cycle rejection, topological order.

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use specforge_core::SpecIR;

/// Error from graph construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The stage graph contains a cycle
    #[error("stage graph contains a cycle through {ids:?}")]
    Cycle {
        /// Offending stage ids
        ids: Vec<String>,
    },
    /// An edge references a stage that does not exist
    #[error("stage '{id}' referenced by '{referrer}' does not exist")]
    UnknownStage {
        /// The missing stage id
        id: String,
        /// The stage holding the reference
        referrer: String,
    },
}

/// Directed acyclic graph of DAG stages.
///
/// Edges come from explicit `depends_on` declarations plus inference: a
/// stage with no explicit dependencies links from the nearest preceding
/// stage whose `output_type` matches its `input_type`. Construction rejects
/// cycles before execution starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGraph {
    /// Stage ids in declaration order
    declaration: Vec<String>,
    /// Topological order, ties broken by declaration order
    topo: Vec<String>,
    /// Direct dependencies per stage
    dependencies: IndexMap<String, IndexSet<String>>,
    /// Direct dependents per stage
    dependents: IndexMap<String, IndexSet<String>>,
}

impl StageGraph {
    /// Build the graph from the IR's stages.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStage` for a dangling explicit edge and `Cycle`
    /// (naming the stage ids involved) when the graph is not acyclic.
    pub fn build(ir: &SpecIR) -> Result<Self, GraphError> {
        let declaration: Vec<String> = ir.stages.keys().cloned().collect();
        let mut dependencies: IndexMap<String, IndexSet<String>> = declaration
            .iter()
            .map(|id| (id.clone(), IndexSet::new()))
            .collect();

        for (position, stage) in ir.stages.values().enumerate() {
            if stage.depends_on.is_empty() {
                if let Some(upstream) = infer_upstream(ir, position) {
                    dependencies
                        .get_mut(&stage.stage_id)
                        .expect("stage present")
                        .insert(upstream);
                }
            } else {
                for dep in &stage.depends_on {
                    if !ir.stages.contains_key(dep) {
                        return Err(GraphError::UnknownStage {
                            id: dep.clone(),
                            referrer: stage.stage_id.clone(),
                        });
                    }
                    dependencies
                        .get_mut(&stage.stage_id)
                        .expect("stage present")
                        .insert(dep.clone());
                }
            }
        }

        let mut dependents: IndexMap<String, IndexSet<String>> = declaration
            .iter()
            .map(|id| (id.clone(), IndexSet::new()))
            .collect();
        for (stage, deps) in &dependencies {
            for dep in deps {
                dependents
                    .get_mut(dep)
                    .expect("stage present")
                    .insert(stage.clone());
            }
        }

        let topo = topological_order(&declaration, &dependencies, &dependents)?;

        Ok(Self {
            declaration,
            topo,
            dependencies,
            dependents,
        })
    }

    /// Stage ids in topological order
    #[must_use]
    pub fn topo_order(&self) -> &[String] {
        &self.topo
    }

    /// Stage ids in declaration order
    #[must_use]
    pub fn stages(&self) -> &[String] {
        &self.declaration
    }

    /// Direct dependencies of a stage
    #[must_use]
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.dependencies
            .get(id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Transitive dependents of a stage (the downstream closure)
    #[must_use]
    pub fn downstream_closure(&self, id: &str) -> IndexSet<String> {
        let mut closure = IndexSet::new();
        let mut queue: Vec<&String> = self
            .dependents
            .get(id)
            .map(|d| d.iter().collect())
            .unwrap_or_default();
        while let Some(next) = queue.pop() {
            if closure.insert(next.clone()) {
                if let Some(more) = self.dependents.get(next) {
                    queue.extend(more.iter());
                }
            }
        }
        closure
    }

    /// Topological layers: every stage in layer N depends only on stages in
    /// layers < N. Stages within one layer are independent of each other.
    #[must_use]
    pub fn layers(&self) -> Vec<Vec<String>> {
        let mut depth: IndexMap<&str, usize> = IndexMap::new();
        for id in &self.topo {
            let d = self
                .dependencies(id)
                .iter()
                .filter_map(|dep| depth.get(dep.as_str()))
                .max()
                .map_or(0, |m| m + 1);
            depth.insert(id.as_str(), d);
        }
        let max_depth = depth.values().copied().max().map_or(0, |m| m + 1);
        let mut layers = vec![Vec::new(); max_depth];
        for id in &self.topo {
            layers[depth[id.as_str()]].push(id.clone());
        }
        layers
    }

    /// Number of stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.declaration.len()
    }

    /// Whether the graph has no stages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declaration.is_empty()
    }
}

/// Nearest preceding stage whose output type matches this stage's input.
fn infer_upstream(ir: &SpecIR, position: usize) -> Option<String> {
    let stage = ir.stages.get_index(position).map(|(_, s)| s)?;
    if stage.input_type.is_empty() {
        return None;
    }
    for earlier in (0..position).rev() {
        let (_, candidate) = ir.stages.get_index(earlier)?;
        if candidate.output_type == stage.input_type {
            return Some(candidate.stage_id.clone());
        }
    }
    None
}

/// Kahn's algorithm; the ready set is ordered by declaration index so ties
/// break deterministically.
fn topological_order(
    declaration: &[String],
    dependencies: &IndexMap<String, IndexSet<String>>,
    dependents: &IndexMap<String, IndexSet<String>>,
) -> Result<Vec<String>, GraphError> {
    let index_of: IndexMap<&str, usize> = declaration
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut remaining: IndexMap<&str, usize> = declaration
        .iter()
        .map(|id| (id.as_str(), dependencies[id].len()))
        .collect();

    let mut ready: std::collections::BTreeSet<(usize, &str)> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| (index_of[id], *id))
        .collect();

    let mut order = Vec::with_capacity(declaration.len());
    while let Some(&(index, id)) = ready.iter().next() {
        ready.remove(&(index, id));
        order.push(id.to_string());
        if let Some(deps) = dependents.get(id) {
            for dependent in deps {
                let count = remaining
                    .get_mut(dependent.as_str())
                    .expect("stage present");
                *count -= 1;
                if *count == 0 {
                    ready.insert((index_of[dependent.as_str()], dependent.as_str()));
                }
            }
        }
    }

    if order.len() != declaration.len() {
        let stuck: Vec<String> = declaration
            .iter()
            .filter(|id| !order.contains(*id))
            .cloned()
            .collect();
        return Err(GraphError::Cycle { ids: stuck });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use specforge_load::load_spec;

    fn make_stage_ir(stages: serde_json::Value) -> SpecIR {
        let mut tree = json!({
            "transforms": [
                {"id": "t1", "impl": "m:f1", "file_path": "f.rs"},
                {"id": "t2", "impl": "m:f2", "file_path": "f.rs"},
                {"id": "t3", "impl": "m:f3", "file_path": "f.rs"}
            ]
        });
        tree["dag_stages"] = stages;
        load_spec(&tree).unwrap()
    }

    #[test]
    fn test_build_empty() {
        let graph = StageGraph::build(&SpecIR::default()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.layers().is_empty());
    }

    #[test]
    fn test_inferred_edges_chain_by_type() {
        let ir = make_stage_ir(json!([
            {"stage_id": "load", "selection_mode": "single", "candidates": ["t1"],
             "input_type": "Raw", "output_type": "Clean"},
            {"stage_id": "enrich", "selection_mode": "single", "candidates": ["t2"],
             "input_type": "Clean", "output_type": "Rich"}
        ]));
        let graph = StageGraph::build(&ir).unwrap();
        assert_eq!(graph.dependencies("enrich"), vec!["load".to_string()]);
        assert_eq!(graph.topo_order(), &["load".to_string(), "enrich".to_string()]);
    }

    #[test]
    fn test_explicit_edges_suppress_inference() {
        let ir = make_stage_ir(json!([
            {"stage_id": "a", "selection_mode": "single", "candidates": ["t1"],
             "input_type": "X", "output_type": "Y"},
            {"stage_id": "b", "selection_mode": "single", "candidates": ["t2"],
             "input_type": "Y", "output_type": "Z"},
            {"stage_id": "c", "selection_mode": "single", "candidates": ["t3"],
             "input_type": "Y", "output_type": "W", "depends_on": ["a"]}
        ]));
        let graph = StageGraph::build(&ir).unwrap();
        // c declares depends_on a; the type match with b is not inferred.
        assert_eq!(graph.dependencies("c"), vec!["a".to_string()]);
    }

    #[test]
    fn test_cycle_rejected_with_ids() {
        let ir = make_stage_ir(json!([
            {"stage_id": "s1", "selection_mode": "single", "candidates": ["t1"],
             "depends_on": ["s2"]},
            {"stage_id": "s2", "selection_mode": "single", "candidates": ["t2"],
             "depends_on": ["s1"]}
        ]));
        let err = StageGraph::build(&ir).unwrap_err();
        match err {
            GraphError::Cycle { ids } => {
                assert!(ids.contains(&"s1".to_string()));
                assert!(ids.contains(&"s2".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let ir = make_stage_ir(json!([
            {"stage_id": "s1", "selection_mode": "single", "candidates": ["t1"],
             "depends_on": ["ghost"]}
        ]));
        assert!(matches!(
            StageGraph::build(&ir).unwrap_err(),
            GraphError::UnknownStage { .. }
        ));
    }

    #[test]
    fn test_topo_ties_break_by_declaration_order() {
        let ir = make_stage_ir(json!([
            {"stage_id": "z_first", "selection_mode": "single", "candidates": ["t1"]},
            {"stage_id": "a_second", "selection_mode": "single", "candidates": ["t2"]}
        ]));
        let graph = StageGraph::build(&ir).unwrap();
        // Both are roots; declaration order wins over lexicographic.
        assert_eq!(
            graph.topo_order(),
            &["z_first".to_string(), "a_second".to_string()]
        );
    }

    #[test]
    fn test_layers_and_closure() {
        let ir = make_stage_ir(json!([
            {"stage_id": "s1", "selection_mode": "single", "candidates": ["t1"]},
            {"stage_id": "s2", "selection_mode": "single", "candidates": ["t2"]},
            {"stage_id": "s3", "selection_mode": "single", "candidates": ["t3"],
             "depends_on": ["s1"]}
        ]));
        let graph = StageGraph::build(&ir).unwrap();

        let layers = graph.layers();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0], vec!["s1".to_string(), "s2".to_string()]);
        assert_eq!(layers[1], vec!["s3".to_string()]);

        let closure = graph.downstream_closure("s1");
        assert!(closure.contains("s3"));
        assert!(!closure.contains("s2"));
    }
}
