use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgileError {
    #[error("not initialized: run 'agile init'")]
    NotInitialized,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("command already registered: {0}")]
    DuplicateCommand(String),

    #[error("command '{0}' requires an argument and declares no default")]
    MissingDefault(String),

    #[error("invalid document: {0}")]
    Validation(String),

    #[error("document not found: {category}/{name}")]
    NotFound { category: String, name: String },

    #[error("search term must not be empty")]
    InvalidSearch,

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("invalid frontmatter in {path}: {reason}")]
    InvalidFrontmatter { path: String, reason: String },

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("invalid transition from {from}: {reason}")]
    InvalidTransition { from: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgileError>;
