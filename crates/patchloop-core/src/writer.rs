//! Writes generator output to disk and keeps the structure index in step.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::digest::ContentDigest;
use crate::directive::{BatchEntry, UpdateDirective};
use crate::error::{PatchloopError, Result};
use crate::file_key::FileKey;
use crate::generator::{prompt, CodeGenerator, GenerationRequest};
use crate::ledger::ErrorRecord;
use crate::lint::{LintReport, LinterRegistry};
use crate::memory::{MemoryEntry, MemoryIndex};

/// Header written at the top of batch-created files.
pub const GENERATED_HEADER: &str = "Auto-generated by patchloop";

/// What a write produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub entry: MemoryEntry,
    pub source_digest: ContentDigest,
    pub bytes: usize,
    /// `None` for repairs, which are judged by re-running instead.
    pub lint: Option<LintReport>,
}

#[derive(Clone)]
pub struct CodeWriter {
    generator: Arc<dyn CodeGenerator>,
    memory: MemoryIndex,
    linters: LinterRegistry,
}

impl CodeWriter {
    pub fn new(
        generator: Arc<dyn CodeGenerator>,
        memory: MemoryIndex,
        linters: LinterRegistry,
    ) -> Self {
        Self {
            generator,
            memory,
            linters,
        }
    }

    pub fn memory(&self) -> &MemoryIndex {
        &self.memory
    }

    /// Create `path` from a free-form prompt.
    pub async fn generate_file(&self, user_prompt: &str, path: &Path) -> Result<WriteOutcome> {
        let request =
            GenerationRequest::new(prompt::write_instruction(user_prompt), self.memory.snapshot()?);
        let code = self.generator.generate(&request).await?;
        let mut outcome = self.store(path, code.trim())?;
        outcome.lint = Some(self.linters.lint(path).await);
        info!(path = %path.display(), digest = outcome.source_digest.short(), "file generated");
        Ok(outcome)
    }

    /// Rewrite an existing file according to `instruction`.
    pub async fn update_file(&self, instruction: &str, path: &Path) -> Result<WriteOutcome> {
        let existing = std::fs::read_to_string(path)?;
        let request = GenerationRequest::new(
            prompt::update_instruction(instruction, &existing),
            self.memory.snapshot()?,
        );
        let code = self.generator.generate(&request).await?;
        let mut outcome = self.store(path, &code)?;
        outcome.lint = Some(self.linters.lint(path).await);
        info!(path = %path.display(), digest = outcome.source_digest.short(), "file updated");
        Ok(outcome)
    }

    pub async fn apply_update(&self, directive: &UpdateDirective) -> Result<WriteOutcome> {
        self.update_file(&directive.instruction, &directive.filepath)
            .await
    }

    /// Overwrite `path` with a fix for `record`. The generator output is
    /// written unchanged.
    pub async fn repair_file(
        &self,
        path: &Path,
        record: &ErrorRecord,
        fix_instruction: &str,
    ) -> Result<WriteOutcome> {
        let code = match std::fs::read_to_string(path) {
            Ok(code) => code,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let request = GenerationRequest::new(
            prompt::repair_instruction(fix_instruction, record, &code),
            self.memory.snapshot()?,
        );
        let fixed = self.generator.generate(&request).await?;
        self.store(path, &fixed)
    }

    /// Plain-language walkthrough of `path` for a beginner.
    pub async fn explain_file(&self, path: &Path) -> Result<String> {
        let code = std::fs::read_to_string(path)?;
        let entry = self.memory.get(path)?.unwrap_or_default();
        let instruction = format!(
            "You are an experienced programming instructor.\n\
             Explain the following code to a beginner in clear, friendly language:\n\
             the purpose of the file, the role of each class and function, and the\n\
             libraries used.\n\n\
             File: {}\nImports: {:?}\nClasses: {:?}\nFunctions: {:?}\n\n\
             -----------------------------\n{}\n-----------------------------\n",
            FileKey::new(path),
            entry.imports,
            entry.classes,
            entry.functions,
            code
        );
        let request = GenerationRequest::new(instruction, self.memory.snapshot()?);
        self.generator.generate(&request).await
    }

    /// Write every batch entry under `root` with a generated-by header.
    pub async fn write_batch(&self, root: &Path, entries: &[BatchEntry]) -> Result<Vec<WriteOutcome>> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = root.join(&entry.path);
            let body = match header_line(&path) {
                Some(header) => format!("{header}\n{}\n", entry.content),
                None => format!("{}\n", entry.content),
            };
            let mut outcome = self.store(&path, &body)?;
            outcome.lint = Some(self.linters.lint(&path).await);
            info!(path = %path.display(), "batch file created");
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn store(&self, path: &Path, source: &str) -> Result<WriteOutcome> {
        write_source(path, source)?;
        let entry = self.memory.update(path, source)?;
        Ok(WriteOutcome {
            path: path.to_path_buf(),
            entry,
            source_digest: ContentDigest::from_bytes(source.as_bytes()),
            bytes: source.len(),
            lint: None,
        })
    }
}

fn header_line(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let marker = match ext.as_str() {
        "py" | "sh" | "rb" | "toml" | "yaml" | "yml" => "#",
        "js" | "ts" | "dart" | "rs" | "go" | "java" | "c" | "cpp" | "h" => "//",
        _ => return None,
    };
    Some(format!("{marker} {GENERATED_HEADER}"))
}

/// Atomic replace: temp file in the same directory, then rename. An existing
/// file keeps its permissions.
pub(crate) fn write_source(path: &Path, source: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(source.as_bytes())?;
    match std::fs::metadata(path) {
        Ok(meta) => tmp.as_file().set_permissions(meta.permissions())?,
        Err(_) => set_default_mode(tmp.as_file())?,
    }
    tmp.persist(path)
        .map_err(|e| PatchloopError::Io(e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_default_mode(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_mode(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ScriptedGenerator;

    fn writer(gen: Arc<ScriptedGenerator>) -> CodeWriter {
        CodeWriter::new(gen, MemoryIndex::in_memory(), LinterRegistry::empty())
    }

    #[tokio::test]
    async fn test_generate_writes_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let gen = Arc::new(ScriptedGenerator::with_responses([
            "\n\nimport os\n\ndef main():\n    pass\n\n",
        ]));
        let w = writer(Arc::clone(&gen));
        let path = dir.path().join("gen").join("tool.py");

        let outcome = w.generate_file("a tool", &path).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "import os\n\ndef main():\n    pass"
        );
        assert!(outcome.entry.functions.contains("main"));
        assert_eq!(outcome.lint.unwrap().status, crate::lint::LintStatus::Skipped);
        assert!(w.memory().get(&path).unwrap().is_some());
        assert!(gen.requests()[0].instruction.contains("a tool"));
    }

    #[tokio::test]
    async fn test_update_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(Arc::new(ScriptedGenerator::with_responses(["x"])));
        let err = w
            .update_file("add logging", &dir.path().join("missing.py"))
            .await
            .unwrap_err();
        assert!(matches!(err, PatchloopError::Io(_)));
    }

    #[tokio::test]
    async fn test_update_sends_existing_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.py");
        std::fs::write(&path, "def old(): pass\n").unwrap();
        let gen = Arc::new(ScriptedGenerator::with_responses(["def new(): pass\n"]));
        let w = writer(Arc::clone(&gen));

        let outcome = w
            .apply_update(&UpdateDirective {
                filepath: path.clone(),
                instruction: "rename old to new".to_string(),
            })
            .await
            .unwrap();
        assert!(outcome.entry.functions.contains("new"));
        let sent = &gen.requests()[0].instruction;
        assert!(sent.contains("def old(): pass"));
        assert!(sent.contains("rename old to new"));
    }

    #[tokio::test]
    async fn test_batch_writes_headers() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(Arc::new(ScriptedGenerator::new()));
        let entries = vec![
            BatchEntry {
                path: PathBuf::from("pkg/a.py"),
                content: "def a(): pass".to_string(),
            },
            BatchEntry {
                path: PathBuf::from("pkg/data.json"),
                content: "{}".to_string(),
            },
        ];
        let outcomes = w.write_batch(dir.path(), &entries).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("pkg/a.py")).unwrap(),
            "# Auto-generated by patchloop\ndef a(): pass\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("pkg/data.json")).unwrap(),
            "{}\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_write_source_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.sh");
        std::fs::write(&path, "echo old\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        write_source(&path, "echo new\n").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "echo new\n");
    }
}
