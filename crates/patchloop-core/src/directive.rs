//! Parsers for the two instruction file formats.
//!
//! Update prompt:
//!
//! ```text
//! File: generated/report.py
//!
//! Update:
//! Add logging to all functions.
//! ```
//!
//! Batch:
//!
//! ```text
//! Create a file: tools/merge.py
//! def merge(a, b):
//!     return a + b
//! Create a file: tools/__init__.py
//! ```
//!
//! Both parsers are strict: stray text, repeated fields and empty values are
//! errors rather than guesses.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::file_key::FileKey;

const FILE_FIELD: &str = "File:";
const UPDATE_FIELD: &str = "Update:";
const CREATE_FIELD: &str = "Create a file:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing `{0}` field")]
    MissingField(&'static str),

    #[error("`{field}` on line {line} is empty")]
    EmptyField { field: &'static str, line: usize },

    #[error("`{field}` repeated on line {line}")]
    DuplicateField { field: &'static str, line: usize },

    #[error("unexpected content on line {line}: {content:?}")]
    UnexpectedContent { line: usize, content: String },

    #[error("path {path:?} on line {line} is listed twice")]
    DuplicatePath { path: String, line: usize },

    #[error("path {path:?} on line {line} must be relative and stay inside the output root")]
    UnsafePath { path: String, line: usize },

    #[error("no `Create a file:` entries found")]
    NoEntries,
}

/// A parsed update prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDirective {
    pub filepath: PathBuf,
    pub instruction: String,
}

/// One file of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Relative to the batch output root.
    pub path: PathBuf,
    pub content: String,
}

enum UpdateState {
    Start,
    SawFile(String),
    Body(String, Vec<String>),
}

/// Parse a `File:` / `Update:` prompt.
pub fn parse_update_directive(text: &str) -> Result<UpdateDirective, ParseError> {
    let mut state = UpdateState::Start;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        state = match state {
            UpdateState::Start => {
                if trimmed.is_empty() {
                    UpdateState::Start
                } else if let Some(value) = trimmed.strip_prefix(FILE_FIELD) {
                    let value = value.trim();
                    if value.is_empty() {
                        return Err(ParseError::EmptyField {
                            field: "File",
                            line,
                        });
                    }
                    UpdateState::SawFile(value.to_string())
                } else if trimmed.starts_with(UPDATE_FIELD) {
                    return Err(ParseError::MissingField("File"));
                } else {
                    return Err(unexpected(line, raw));
                }
            }
            UpdateState::SawFile(path) => {
                if trimmed.is_empty() {
                    UpdateState::SawFile(path)
                } else if trimmed.starts_with(FILE_FIELD) {
                    return Err(ParseError::DuplicateField {
                        field: "File",
                        line,
                    });
                } else if let Some(inline) = trimmed.strip_prefix(UPDATE_FIELD) {
                    let mut body = Vec::new();
                    if !inline.trim().is_empty() {
                        body.push(inline.trim().to_string());
                    }
                    UpdateState::Body(path, body)
                } else {
                    return Err(unexpected(line, raw));
                }
            }
            UpdateState::Body(path, mut body) => {
                for (field, name) in [(FILE_FIELD, "File"), (UPDATE_FIELD, "Update")] {
                    if trimmed.starts_with(field) {
                        return Err(ParseError::DuplicateField { field: name, line });
                    }
                }
                body.push(raw.trim_end().to_string());
                UpdateState::Body(path, body)
            }
        };
    }

    match state {
        UpdateState::Start => Err(ParseError::MissingField("File")),
        UpdateState::SawFile(_) => Err(ParseError::MissingField("Update")),
        UpdateState::Body(path, body) => {
            let instruction = body.join("\n").trim().to_string();
            if instruction.is_empty() {
                return Err(ParseError::MissingField("Update"));
            }
            Ok(UpdateDirective {
                filepath: PathBuf::from(path),
                instruction,
            })
        }
    }
}

/// Parse a batch of `Create a file:` entries.
pub fn parse_batch(text: &str) -> Result<Vec<BatchEntry>, ParseError> {
    let mut entries: Vec<BatchEntry> = Vec::new();
    let mut current: Option<(PathBuf, Vec<&str>)> = None;
    let mut seen: BTreeSet<FileKey> = BTreeSet::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        if let Some(value) = raw.trim_start().strip_prefix(CREATE_FIELD) {
            let value = value.trim();
            if value.is_empty() {
                return Err(ParseError::EmptyField {
                    field: "Create a file",
                    line,
                });
            }
            let path = PathBuf::from(value);
            if !is_contained(&path) {
                return Err(ParseError::UnsafePath {
                    path: value.to_string(),
                    line,
                });
            }
            if !seen.insert(FileKey::new(&path)) {
                return Err(ParseError::DuplicatePath {
                    path: value.to_string(),
                    line,
                });
            }
            if let Some((path, lines)) = current.take() {
                entries.push(finish_entry(path, &lines));
            }
            current = Some((path, Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(raw);
        } else if !raw.trim().is_empty() {
            return Err(unexpected(line, raw));
        }
    }

    if let Some((path, lines)) = current.take() {
        entries.push(finish_entry(path, &lines));
    }
    if entries.is_empty() {
        return Err(ParseError::NoEntries);
    }
    Ok(entries)
}

fn finish_entry(path: PathBuf, lines: &[&str]) -> BatchEntry {
    BatchEntry {
        path,
        content: lines.join("\n").trim().to_string(),
    }
}

/// Relative, and never climbs above its root.
fn is_contained(path: &Path) -> bool {
    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}

fn unexpected(line: usize, raw: &str) -> ParseError {
    ParseError::UnexpectedContent {
        line,
        content: raw.trim().chars().take(80).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_directive_multiline() {
        let d = parse_update_directive(
            "File: generated/somefile.py\n\nUpdate:\nAdd logging to all functions.\nKeep names.\n",
        )
        .unwrap();
        assert_eq!(d.filepath, PathBuf::from("generated/somefile.py"));
        assert_eq!(d.instruction, "Add logging to all functions.\nKeep names.");
    }

    #[test]
    fn test_update_directive_inline_instruction() {
        let d = parse_update_directive("File: a.py\nUpdate: rename foo to bar\n").unwrap();
        assert_eq!(d.instruction, "rename foo to bar");
    }

    #[test]
    fn test_update_directive_errors() {
        assert_eq!(
            parse_update_directive(""),
            Err(ParseError::MissingField("File"))
        );
        assert_eq!(
            parse_update_directive("File: a.py\n"),
            Err(ParseError::MissingField("Update"))
        );
        assert_eq!(
            parse_update_directive("File: a.py\nUpdate:\n   \n"),
            Err(ParseError::MissingField("Update"))
        );
        assert_eq!(
            parse_update_directive("File:\nUpdate: x"),
            Err(ParseError::EmptyField {
                field: "File",
                line: 1
            })
        );
        assert!(matches!(
            parse_update_directive("hello\nFile: a.py\nUpdate: x"),
            Err(ParseError::UnexpectedContent { line: 1, .. })
        ));
        assert!(matches!(
            parse_update_directive("File: a.py\nnoise\nUpdate: x"),
            Err(ParseError::UnexpectedContent { line: 2, .. })
        ));
        assert_eq!(
            parse_update_directive("File: a.py\nUpdate: x\nFile: b.py"),
            Err(ParseError::DuplicateField {
                field: "File",
                line: 3
            })
        );
        assert_eq!(
            parse_update_directive("Update: x\nFile: a.py"),
            Err(ParseError::MissingField("File"))
        );
    }

    #[test]
    fn test_batch_splits_entries() {
        let entries = parse_batch(
            "\nCreate a file: tools/merge.py\ndef merge(a, b):\n    return a + b\n\nCreate a file: tools/__init__.py\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, PathBuf::from("tools/merge.py"));
        assert_eq!(entries[0].content, "def merge(a, b):\n    return a + b");
        assert_eq!(entries[1].content, "");
    }

    #[test]
    fn test_batch_errors() {
        assert_eq!(parse_batch("\n\n"), Err(ParseError::NoEntries));
        assert!(matches!(
            parse_batch("preamble\nCreate a file: a.py\n"),
            Err(ParseError::UnexpectedContent { line: 1, .. })
        ));
        assert!(matches!(
            parse_batch("Create a file: ../escape.py\n"),
            Err(ParseError::UnsafePath { line: 1, .. })
        ));
        assert!(matches!(
            parse_batch("Create a file: /etc/passwd\n"),
            Err(ParseError::UnsafePath { .. })
        ));
        assert!(matches!(
            parse_batch("Create a file: a.py\nx\nCreate a file: ./a.py\n"),
            Err(ParseError::DuplicatePath { line: 3, .. })
        ));
        assert!(matches!(
            parse_batch("Create a file:   \n"),
            Err(ParseError::EmptyField { line: 1, .. })
        ));
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained(Path::new("a/b.py")));
        assert!(is_contained(Path::new("a/../b.py")));
        assert!(!is_contained(Path::new("a/../../b.py")));
        assert!(!is_contained(Path::new(".")));
    }
}
