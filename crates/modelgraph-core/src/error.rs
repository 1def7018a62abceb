use crate::HandlerKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse module {file}: {reason}")]
    ModuleParse { file: String, reason: String },

    #[error("Failed to serialize {edit} into {file}: {reason}")]
    Serialization {
        file: String,
        edit: String,
        reason: String,
    },

    #[error("Module not found: namespace '{namespace}' in {file}")]
    ModuleNotFound { file: String, namespace: String },

    #[error("{kind} not found: '{name}' in {file}")]
    HandlerNotFound {
        kind: HandlerKind,
        file: String,
        name: String,
    },

    #[error("Module already exists in {file} (namespace '{namespace}')")]
    DuplicateModule { file: String, namespace: String },

    #[error("{kind} already exists: '{name}' in {file}")]
    DuplicateHandler {
        kind: HandlerKind,
        file: String,
        name: String,
    },

    #[error("Invalid payload for {command}: {reason}")]
    InvalidPayload { command: String, reason: String },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ModelGraphError {
    pub fn module_parse(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModuleParse {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn serialization(
        file: impl Into<String>,
        edit: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Serialization {
            file: file.into(),
            edit: edit.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelGraphError>;
