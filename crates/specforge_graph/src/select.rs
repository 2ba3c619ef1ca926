//! Per-stage candidate selection policies.

use indexmap::IndexMap;
use thiserror::Error;

use specforge_core::{DagStage, SelectionMode};

/// Error from resolving a stage's selection
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectError {
    /// Exclusive selection resolved to zero or more than one candidate
    #[error("stage '{stage_id}': exclusive selection requires exactly one candidate, got {count}")]
    ExclusiveCount {
        /// Offending stage id
        stage_id: String,
        /// How many candidates were selected
        count: usize,
    },
    /// A selected candidate is not in the stage's candidate list
    #[error("stage '{stage_id}': selected candidate '{candidate}' is not a candidate")]
    UnknownCandidate {
        /// Offending stage id
        stage_id: String,
        /// The foreign candidate id
        candidate: String,
    },
    /// No candidate could be selected
    #[error("stage '{stage_id}': no candidate selected")]
    Empty {
        /// Offending stage id
        stage_id: String,
    },
    /// Explicit selection exceeds the stage's `max_select`
    #[error("stage '{stage_id}': {count} candidates selected, max_select is {max}")]
    TooMany {
        /// Offending stage id
        stage_id: String,
        /// How many were selected
        count: usize,
        /// The declared bound
        max: usize,
    },
}

/// External per-stage candidate choices for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    choices: IndexMap<String, Vec<String>>,
}

impl Selection {
    /// Empty selection: every stage falls back to its defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose candidates for a stage
    pub fn choose(&mut self, stage_id: &str, candidates: Vec<String>) {
        self.choices.insert(stage_id.to_string(), candidates);
    }

    /// The choice recorded for a stage, if any
    #[must_use]
    pub fn get(&self, stage_id: &str) -> Option<&[String]> {
        self.choices.get(stage_id).map(Vec::as_slice)
    }
}

/// Resolve which candidates a stage runs.
///
/// `Single` runs its one candidate. `Exclusive` runs exactly one, taken
/// from the external selection or `default_transform_id`. `Multiple` runs
/// the external selection, or all candidates in declaration order when none
/// was given; a declared `max_select` caps the default and rejects an
/// oversized explicit selection.
///
/// # Errors
///
/// See [`SelectError`] variants.
pub fn resolve_selection(stage: &DagStage, selection: &Selection) -> Result<Vec<String>, SelectError> {
    let external = selection.get(&stage.stage_id);
    if let Some(chosen) = external {
        for candidate in chosen {
            if !stage.candidates.contains(candidate) {
                return Err(SelectError::UnknownCandidate {
                    stage_id: stage.stage_id.clone(),
                    candidate: candidate.clone(),
                });
            }
        }
    }

    match stage.selection_mode {
        SelectionMode::Single => {
            // Exactly one candidate is a load-time invariant.
            stage
                .candidates
                .first()
                .cloned()
                .map(|c| vec![c])
                .ok_or_else(|| SelectError::Empty {
                    stage_id: stage.stage_id.clone(),
                })
        }
        SelectionMode::Exclusive => {
            let chosen: Vec<String> = match external {
                Some(ids) => ids.to_vec(),
                None => stage
                    .default_transform_id
                    .iter()
                    .cloned()
                    .collect(),
            };
            if chosen.len() != 1 {
                return Err(SelectError::ExclusiveCount {
                    stage_id: stage.stage_id.clone(),
                    count: chosen.len(),
                });
            }
            Ok(chosen)
        }
        SelectionMode::Multiple => {
            match external {
                Some(ids) => {
                    if ids.is_empty() {
                        return Err(SelectError::Empty {
                            stage_id: stage.stage_id.clone(),
                        });
                    }
                    if let Some(max) = stage.max_select {
                        if ids.len() > max {
                            return Err(SelectError::TooMany {
                                stage_id: stage.stage_id.clone(),
                                count: ids.len(),
                                max,
                            });
                        }
                    }
                    Ok(ids.to_vec())
                }
                None => {
                    let mut chosen = stage.candidates.clone();
                    if let Some(max) = stage.max_select {
                        chosen.truncate(max);
                    }
                    if chosen.is_empty() {
                        return Err(SelectError::Empty {
                            stage_id: stage.stage_id.clone(),
                        });
                    }
                    Ok(chosen)
                }
            }
        }
    }
}
