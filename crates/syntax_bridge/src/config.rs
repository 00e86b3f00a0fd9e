use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SyntaxResult;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Documents up to this many bytes are handed to the parser as one string.
    #[serde(default = "default_full_parse_limit")]
    pub full_parse_limit: usize,

    /// Largest slice the chunked reader returns at once.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_full_parse_limit() -> usize {
    2 * MIB
}

fn default_chunk_size() -> usize {
    MIB
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            full_parse_limit: default_full_parse_limit(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl ParseConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SyntaxResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }
}
