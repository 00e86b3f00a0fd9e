use std::path::Path;

use piece_tree::EndOfLine;
use serde::{Deserialize, Serialize};

use crate::error::BufferResult;

/// How the builder settles line endings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// EOL for a document that has no line break yet.
    #[serde(default = "default_eol")]
    pub default_eol: EndOfLine,

    /// Rewrite every line break to the detected EOL when they are mixed.
    #[serde(default = "default_true")]
    pub normalize_eol: bool,
}

fn default_eol() -> EndOfLine {
    EndOfLine::LF
}

fn default_true() -> bool {
    true
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            default_eol: default_eol(),
            normalize_eol: true,
        }
    }
}

impl BuildOptions {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> BufferResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BufferError;

    #[test]
    fn missing_fields_use_defaults() {
        let options: BuildOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, BuildOptions::default());

        let options: BuildOptions = serde_json::from_str(r#"{"normalize_eol": false}"#).unwrap();
        assert_eq!(options.default_eol, EndOfLine::LF);
        assert!(!options.normalize_eol);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.json");
        std::fs::write(&path, r#"{"default_eol": "CRLF"}"#).unwrap();
        let options = BuildOptions::load_from_file(&path).unwrap();
        assert_eq!(options.default_eol, EndOfLine::CRLF);
        assert!(options.normalize_eol);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            BuildOptions::load_from_file(&path),
            Err(BufferError::Config(_))
        ));
        assert!(matches!(
            BuildOptions::load_from_file(dir.path().join("missing.json")),
            Err(BufferError::Io(_))
        ));
    }
}
