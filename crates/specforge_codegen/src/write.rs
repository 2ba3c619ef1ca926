//! Additive filesystem writes for synthesized units.
//!
//! Merge rule: a new file receives all proposed units; an existing file is
//! inspected for already-defined unit names and receives only the units
//! currently missing. Existing content is never touched or reordered, which
//! makes repeated synthesis runs idempotent. This holds when several
//! definitions share one file: a definition added later still lands in the
//! already-existing file on the next run.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use crate::render::{SynthError, SynthUnit};

/// Header emitted at the top of every newly created file
const FILE_HEADER: &str = "\
//! Generated by specforge from the project specification.
//!
//! Hand-written implementations live in this file; regeneration only
//! appends missing units and never rewrites existing content.
";

/// What happened to one file during `write`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// File did not exist; created with all proposed units
    Created {
        /// Unit names written
        units: Vec<String>,
    },
    /// File existed; missing units appended
    Appended {
        /// Unit names appended
        units: Vec<String>,
    },
    /// File already contained every proposed unit
    Unchanged,
}

/// Per-file outcome of one write run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteReport {
    /// Outcome per file path, in unit order
    pub files: IndexMap<String, FileOutcome>,
}

impl WriteReport {
    /// Whether the run produced no new writes
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.files
            .values()
            .all(|outcome| matches!(outcome, FileOutcome::Unchanged))
    }

    /// Total number of units written
    #[must_use]
    pub fn written_units(&self) -> usize {
        self.files
            .values()
            .map(|outcome| match outcome {
                FileOutcome::Created { units } | FileOutcome::Appended { units } => units.len(),
                FileOutcome::Unchanged => 0,
            })
            .sum()
    }
}

/// Write units into the implementation tree under the additive merge rule.
///
/// # Errors
///
/// Returns an `Io` error naming the path that failed.
pub fn write(root: &Path, units: &[SynthUnit]) -> Result<WriteReport, SynthError> {
    let mut by_file: IndexMap<&str, Vec<&SynthUnit>> = IndexMap::new();
    for unit in units {
        by_file.entry(unit.file_path.as_str()).or_default().push(unit);
    }

    let mut report = WriteReport::default();
    for (file_path, file_units) in by_file {
        let path = root.join(file_path);
        let outcome = if path.exists() {
            merge_into_existing(&path, &file_units)?
        } else {
            create_new(&path, &file_units)?
        };
        report.files.insert(file_path.to_string(), outcome);
    }
    Ok(report)
}

fn io_err(path: &Path, source: std::io::Error) -> SynthError {
    SynthError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn create_new(path: &Path, units: &[&SynthUnit]) -> Result<FileOutcome, SynthError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
    }
    let mut content = String::from(FILE_HEADER);
    for unit in units {
        content.push('\n');
        content.push_str(&unit.source);
    }
    fs::write(path, content).map_err(|e| io_err(path, e))?;
    tracing::debug!(path = %path.display(), units = units.len(), "created file");
    Ok(FileOutcome::Created {
        units: units.iter().map(|u| u.unit_name.clone()).collect(),
    })
}

fn merge_into_existing(path: &Path, units: &[&SynthUnit]) -> Result<FileOutcome, SynthError> {
    let existing = fs::read_to_string(path).map_err(|e| io_err(path, e))?;

    let missing: Vec<&&SynthUnit> = units
        .iter()
        .filter(|u| !declares_unit(&existing, &u.unit_name))
        .collect();
    if missing.is_empty() {
        return Ok(FileOutcome::Unchanged);
    }

    let mut content = existing;
    if !content.ends_with('\n') {
        content.push('\n');
    }
    for unit in &missing {
        content.push('\n');
        content.push_str(&unit.source);
    }
    fs::write(path, content).map_err(|e| io_err(path, e))?;
    tracing::debug!(path = %path.display(), appended = missing.len(), "appended units");
    Ok(FileOutcome::Appended {
        units: missing.iter().map(|u| u.unit_name.clone()).collect(),
    })
}

/// Whether the file content already declares a unit with the given name.
///
/// Scans top-level declaration lines (`fn`, `struct`, `enum`, `type`,
/// `const`, optionally `pub`) and compares the declared identifier; string
/// search alone would false-positive on mentions inside comments or bodies.
fn declares_unit(content: &str, name: &str) -> bool {
    content.lines().any(|line| declared_name(line) == Some(name))
}

fn declared_name(line: &str) -> Option<&str> {
    let mut rest = line.trim_start();
    for prefix in ["pub(crate) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    let rest = ["fn ", "struct ", "enum ", "type ", "const "]
        .iter()
        .find_map(|kw| rest.strip_prefix(kw))?;
    let end = rest
        .find(|c: char| !c.is_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(&rest[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_unit(file_path: &str, name: &str) -> SynthUnit {
        SynthUnit {
            file_path: file_path.to_string(),
            unit_name: name.to_string(),
            source: format!("pub fn {name}() -> i64 {{\n    unimplemented!(\"{name}\")\n}}\n"),
        }
    }

    #[test]
    fn test_create_new_file() {
        let dir = TempDir::new().unwrap();
        let units = vec![make_unit("tf.rs", "alpha"), make_unit("tf.rs", "beta")];

        let report = write(dir.path(), &units).unwrap();
        assert_eq!(
            report.files["tf.rs"],
            FileOutcome::Created {
                units: vec!["alpha".to_string(), "beta".to_string()]
            }
        );

        let content = std::fs::read_to_string(dir.path().join("tf.rs")).unwrap();
        assert!(content.contains("pub fn alpha()"));
        assert!(content.contains("pub fn beta()"));
        assert!(content.starts_with("//! Generated by specforge"));
    }

    #[test]
    fn test_idempotent_rerun() {
        let dir = TempDir::new().unwrap();
        let units = vec![make_unit("tf.rs", "alpha")];

        write(dir.path(), &units).unwrap();
        let before = std::fs::read_to_string(dir.path().join("tf.rs")).unwrap();

        let report = write(dir.path(), &units).unwrap();
        assert!(report.is_unchanged());
        assert_eq!(report.written_units(), 0);

        let after = std::fs::read_to_string(dir.path().join("tf.rs")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_additive_under_file_sharing() {
        // Synthesize with only A present, then re-run after adding B with
        // the same file path: the file must end up containing both. Treating
        // "file exists" as "nothing to do" would silently drop B.
        let dir = TempDir::new().unwrap();

        write(dir.path(), &[make_unit("tf.rs", "alpha")]).unwrap();

        let both = vec![make_unit("tf.rs", "alpha"), make_unit("tf.rs", "beta")];
        let report = write(dir.path(), &both).unwrap();
        assert_eq!(
            report.files["tf.rs"],
            FileOutcome::Appended {
                units: vec!["beta".to_string()]
            }
        );

        let content = std::fs::read_to_string(dir.path().join("tf.rs")).unwrap();
        assert!(content.contains("pub fn alpha()"));
        assert!(content.contains("pub fn beta()"));
    }

    #[test]
    fn test_existing_content_never_touched() {
        let dir = TempDir::new().unwrap();
        let hand_written = "//! mine\n\npub fn alpha() -> i64 {\n    42\n}\n";
        std::fs::write(dir.path().join("tf.rs"), hand_written).unwrap();

        let units = vec![make_unit("tf.rs", "alpha"), make_unit("tf.rs", "beta")];
        write(dir.path(), &units).unwrap();

        let content = std::fs::read_to_string(dir.path().join("tf.rs")).unwrap();
        // The hand-written alpha body survives; only beta was appended.
        assert!(content.contains("    42\n"));
        assert!(!content.contains("unimplemented!(\"alpha\")"));
        assert!(content.contains("pub fn beta()"));
        assert!(content.starts_with("//! mine"));
    }

    #[test]
    fn test_nested_file_path_creates_directories() {
        let dir = TempDir::new().unwrap();
        let units = vec![make_unit("transforms/processors.rs", "alpha")];
        write(dir.path(), &units).unwrap();
        assert!(dir.path().join("transforms/processors.rs").exists());
    }

    #[test]
    fn test_declares_unit_ignores_mentions() {
        let content = "// alpha is great\nlet x = alpha();\npub fn beta() {}\n";
        assert!(!declares_unit(content, "alpha"));
        assert!(declares_unit(content, "beta"));
    }

    #[test]
    fn test_declared_name_variants() {
        assert_eq!(declared_name("pub fn foo(x: i64) {"), Some("foo"));
        assert_eq!(declared_name("fn foo() {"), Some("foo"));
        assert_eq!(declared_name("pub struct Bar {"), Some("Bar"));
        assert_eq!(declared_name("pub type Baz = i64;"), Some("Baz"));
        assert_eq!(declared_name("    pub fn indented() {"), Some("indented"));
        assert_eq!(declared_name("let fn_ptr = 1;"), None);
    }
}
