//! Error types for the aggregate engine.

use std::fmt;

use gameclub_store::StoreError;
use thiserror::Error;

/// Identifier registries enforcing creation-time uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Registry {
    /// Player ids.
    Players,
    /// Game ids, shared by scheduled games and game records.
    Games,
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Registry::Players => write!(f, "user_id"),
            Registry::Games => write!(f, "game_id"),
        }
    }
}

/// Errors that can occur while ingesting or reading aggregates.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An entity or fact was created with an id that is already taken.
    #[error("{registry} {id} is already taken")]
    DuplicateIdentifier { registry: Registry, id: String },

    /// A move list could not be parsed.
    #[error("malformed move list: {0}")]
    MalformedCategorySource(String),

    /// The store failed or could not commit.
    #[error("store failure: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// A stored aggregate does not have the expected shape.
    #[error("corrupt aggregate at {key}: {reason}")]
    CorruptAggregate { key: String, reason: String },
}

impl EngineError {
    /// Whether the failure only concerns the current record.
    ///
    /// Recoverable errors leave the store untouched, so a caller may skip the
    /// record and continue. Everything else should end the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateIdentifier { .. } | EngineError::MalformedCategorySource(_)
        )
    }
}
