//! Typed errors and their display envelope.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("no table defined for model {0}")]
    NoTable(String),
    #[error("duplicate column '{column}' in model {model}")]
    DuplicateColumn { model: String, column: String },
    #[error("unsupported connection kind: {0}")]
    UnsupportedConnectionKind(String),
    #[error("relation between {master} and {detail} not found")]
    MissingRelation { master: String, detail: String },
    #[error("metadata load: {0}")]
    Load(String),
    #[error("metadata: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("field '{field}': {message}")]
    Validation { field: String, message: String },
    #[error("execution failed for `{statement}`: {source}")]
    Execution {
        statement: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("transaction: {0}")]
    Transaction(String),
    #[error("unsafe sql: {0}")]
    Unsafe(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl EngineError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn execution(statement: &str, source: sqlx::Error) -> Self {
        EngineError::Execution {
            statement: statement.to_string(),
            source,
        }
    }

    /// Stable machine-readable code for callers that surface errors to users.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "config_error",
            EngineError::NotFound(_) => "not_found",
            EngineError::Validation { .. } => "validation_error",
            EngineError::Execution { .. } => "execution_error",
            EngineError::Transaction(_) => "transaction_error",
            EngineError::Unsafe(_) => "unsafe_sql",
            EngineError::Db(sqlx::Error::RowNotFound) => "not_found",
            EngineError::Db(_) => "database_error",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            EngineError::Validation { field, .. } => Some(serde_json::json!({ "field": field })),
            _ => None,
        };
        ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize, Debug)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
