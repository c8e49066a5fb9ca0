//! Extension to interpreter lookup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maps a file extension to the argv prefix that runs it.
///
/// Files with an unknown or missing extension are executed directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterTable {
    by_extension: BTreeMap<String, Vec<String>>,
}

impl InterpreterTable {
    pub fn builtin() -> Self {
        let by_extension = [
            ("py", "python3"),
            ("sh", "sh"),
            ("js", "node"),
            ("rb", "ruby"),
        ]
        .into_iter()
        .map(|(ext, prog)| (ext.to_string(), vec![prog.to_string()]))
        .collect();
        Self { by_extension }
    }

    /// Built-ins with `overrides` layered on top. An empty argv removes the
    /// mapping, so that extension is executed directly.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::builtin();
        for (ext, argv) in overrides {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if argv.is_empty() {
                table.by_extension.remove(&ext);
            } else {
                table.by_extension.insert(ext, argv.clone());
            }
        }
        table
    }

    pub fn lookup(&self, path: &Path) -> Option<&[String]> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&ext).map(Vec::as_slice)
    }

    /// Program and arguments for running `path`.
    pub fn command_for(&self, path: &Path) -> (PathBuf, Vec<PathBuf>) {
        match self.lookup(path).and_then(|argv| argv.split_first()) {
            Some((program, rest)) => {
                let mut args: Vec<PathBuf> = rest.iter().map(PathBuf::from).collect();
                args.push(path.to_path_buf());
                (PathBuf::from(program), args)
            }
            // A bare file name would be looked up on PATH.
            None if path.is_relative() && path.parent() == Some(Path::new("")) => {
                (Path::new(".").join(path), Vec::new())
            }
            None => (path.to_path_buf(), Vec::new()),
        }
    }
}

impl Default for InterpreterTable {
    fn default() -> Self {
        Self::builtin()
    }
}
