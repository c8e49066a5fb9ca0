//! Normalized file paths used as keys in every persisted map.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A lexically normalized path.
///
/// `./src/../bad.py`, `bad.py` and `bad.py/` all map to the same key. No
/// filesystem access happens: symlinks are not resolved and relative paths
/// stay relative. Every component that stores per-file state converts at its
/// public boundary, so callers can pass paths in any spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileKey(normalize(path.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl std::fmt::Display for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for FileKey {
    fn from(path: &Path) -> Self {
        FileKey::new(path)
    }
}

fn normalize(path: &Path) -> String {
    let mut root = String::new();
    let mut parts: Vec<String> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => root.push_str(&prefix.as_os_str().to_string_lossy()),
            Component::RootDir => root.push('/'),
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(last) if last != ".." => {
                    parts.pop();
                }
                // `..` at the root stays at the root.
                _ if !root.is_empty() => {}
                _ => parts.push("..".to_string()),
            },
            Component::Normal(part) => parts.push(part.to_string_lossy().replace('\\', "/")),
        }
    }

    let joined = parts.join("/");
    match (root.is_empty(), joined.is_empty()) {
        (true, true) => ".".to_string(),
        (true, false) => joined,
        (false, _) => format!("{root}{joined}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_spellings_share_a_key() {
        let expected = FileKey::new("generated/bad.py");
        for spelling in [
            "./generated/bad.py",
            "generated/./bad.py",
            "generated//bad.py",
            "generated/tmp/../bad.py",
            "generated/bad.py/",
        ] {
            assert_eq!(FileKey::new(spelling), expected, "{spelling}");
        }
    }

    #[test]
    fn test_leading_parent_dirs_are_kept() {
        assert_eq!(FileKey::new("../shared/x.py").as_str(), "../shared/x.py");
        assert_eq!(FileKey::new("a/../../x.py").as_str(), "../x.py");
    }

    #[test]
    fn test_absolute_paths() {
        assert_eq!(FileKey::new("/tmp/./run/../bad.py").as_str(), "/tmp/bad.py");
        assert_eq!(FileKey::new("/../bad.py").as_str(), "/bad.py");
    }

    #[test]
    fn test_empty_and_current_dir() {
        assert_eq!(FileKey::new("").as_str(), ".");
        assert_eq!(FileKey::new("./").as_str(), ".");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let key = FileKey::new("./a/b.py");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"a/b.py\"");
    }
}
