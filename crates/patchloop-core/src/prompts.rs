//! Prompt inbox: each `*.txt` dropped into a directory becomes a generated file.
//!
//! `Prompts/login.txt` is sent to the generator, the answer lands in
//! `<output>/login.py`, and the prompt moves to `Prompts/processed/`. A
//! prompt whose generation fails stays in the inbox for the next pass.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::writer::{CodeWriter, WriteOutcome};

const PROMPT_EXTENSION: &str = "txt";

#[derive(Debug, Clone)]
pub struct PromptInbox {
    dir: PathBuf,
    output_dir: PathBuf,
    processed_dir: PathBuf,
    extension: String,
}

/// What one pass over the inbox did.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InboxPass {
    pub generated: Vec<WriteOutcome>,
    /// Empty prompts, moved to the processed directory without a call.
    pub skipped: Vec<PathBuf>,
    /// Prompts left in place, with the generation error.
    pub failed: Vec<(PathBuf, String)>,
}

impl InboxPass {
    pub fn is_empty(&self) -> bool {
        self.generated.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

impl PromptInbox {
    pub fn new(dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            processed_dir: dir.join("processed"),
            dir,
            output_dir: output_dir.into(),
            extension: "py".to_string(),
        }
    }

    pub fn with_processed_dir(mut self, processed_dir: impl Into<PathBuf>) -> Self {
        self.processed_dir = processed_dir.into();
        self
    }

    /// Extension of generated files, without the dot.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Prompt files waiting in the inbox, sorted by name.
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut prompts: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.extension().is_some_and(|ext| ext == PROMPT_EXTENSION))
            .collect();
        prompts.sort();
        Ok(prompts)
    }

    /// Target path for a prompt file.
    pub fn output_for(&self, prompt: &Path) -> PathBuf {
        let stem = prompt
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir.join(format!("{stem}.{}", self.extension))
    }

    /// Process every pending prompt once.
    pub async fn drain(&self, writer: &CodeWriter) -> Result<InboxPass> {
        std::fs::create_dir_all(&self.processed_dir)?;
        let mut pass = InboxPass::default();
        for prompt in self.pending()? {
            let text = std::fs::read_to_string(&prompt)?;
            let text = text.trim();
            if text.is_empty() {
                warn!(prompt = %prompt.display(), "empty prompt skipped");
                self.archive(&prompt)?;
                pass.skipped.push(prompt);
                continue;
            }

            let target = self.output_for(&prompt);
            match writer.generate_file(text, &target).await {
                Ok(outcome) => {
                    self.archive(&prompt)?;
                    info!(prompt = %prompt.display(), path = %target.display(), "prompt processed");
                    pass.generated.push(outcome);
                }
                Err(e) => {
                    warn!(prompt = %prompt.display(), error = %e, "prompt left in inbox");
                    pass.failed.push((prompt, e.to_string()));
                }
            }
        }
        Ok(pass)
    }

    fn archive(&self, prompt: &Path) -> Result<()> {
        if let Some(name) = prompt.file_name() {
            std::fs::rename(prompt, self.processed_dir.join(name))?;
        }
        Ok(())
    }
}
