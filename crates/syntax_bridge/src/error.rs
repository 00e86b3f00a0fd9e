use thiserror::Error;

pub type SyntaxResult<T> = Result<T, SyntaxError>;

#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("incompatible language: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("no language loaded")]
    NotInitialized,

    #[error("parser produced no tree")]
    ParseFailed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid parse configuration: {0}")]
    Config(#[from] serde_json::Error),
}
