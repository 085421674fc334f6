//! Failure taxonomy shared by every store backend.

use thiserror::Error;

/// Errors surfaced by provisioning operations. None of them are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    #[error("account '{name}' already exists in database '{database}'")]
    DuplicateAccount { database: String, name: String },

    #[error("collection '{database}.{collection}' already exists")]
    CollectionExists { database: String, collection: String },

    #[error("index '{index}' on '{collection}' conflicts with an existing index: {message}")]
    IndexConflict {
        collection: String,
        index: String,
        message: String,
    },

    #[error("index '{index}' not found on '{collection}'")]
    IndexNotFound { collection: String, index: String },

    #[error("authentication failed for '{name}@{database}'")]
    AuthenticationFailed { database: String, name: String },

    #[error("'{principal}' is not authorized to {action} on '{database}'")]
    Unauthorized {
        principal: String,
        action: String,
        database: String,
    },

    #[error("document failed validation for '{collection}': {reason}")]
    DocumentValidation { collection: String, reason: String },

    #[error("duplicate key on '{collection}' index '{index}'")]
    DuplicateKey { collection: String, index: String },

    #[error("command '{command}' failed with code {code}: {message}")]
    Command {
        command: String,
        code: i32,
        message: String,
    },

    #[error("connection failure: {0}")]
    Connection(String),
}

impl ProvisionError {
    /// True for the "already created" family a re-run runs into.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            ProvisionError::DuplicateAccount { .. }
                | ProvisionError::CollectionExists { .. }
                | ProvisionError::IndexConflict { .. }
        )
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;
