//! Error types for engine operations.

use kitgraph_model::ModelError;
use std::fmt;
use thiserror::Error;

/// Kind of entity named in an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A type in a kit.
    Type,
    /// A design in a kit.
    Design,
    /// A piece in a design.
    Piece,
    /// A connection in a design.
    Connection,
    /// A port on a type.
    Port,
    /// A representation of a type.
    Representation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Type => "type",
            Self::Design => "design",
            Self::Piece => "piece",
            Self::Connection => "connection",
            Self::Port => "port",
            Self::Representation => "representation",
        })
    }
}

/// Errors returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A lookup or update named an absent key.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// The exact key looked up.
        key: String,
    },

    /// An insertion collided with an existing key.
    #[error("{kind} already exists: {key}")]
    AlreadyExists {
        /// Kind of the colliding entity.
        kind: EntityKind,
        /// The colliding key.
        key: String,
    },

    /// A removal was refused because other entities still reference the key.
    #[error("{kind} {key} is still used by {by}")]
    InUse {
        /// Kind of the referenced entity.
        kind: EntityKind,
        /// The referenced key.
        key: String,
        /// The first referencing entity found.
        by: String,
    },

    /// Qualities did not select exactly one variant of a type.
    #[error("type '{name}' is ambiguous: {matches} variants match the given qualities")]
    AmbiguousTypeIdentity {
        /// Type name.
        name: String,
        /// Number of matching variants.
        matches: usize,
    },

    /// The requested type cannot take over the piece's connections.
    #[error("type {type_id} cannot replace the type of piece '{piece}'")]
    IncompatibleType {
        /// The piece being retyped.
        piece: String,
        /// The rejected type.
        type_id: String,
    },

    /// A piece group cannot be clustered.
    #[error("invalid group: {0}")]
    InvalidGroup(String),

    /// A produced value violated a model invariant.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Invalid engine settings.
    #[error("invalid settings: {0}")]
    Settings(String),
}

impl EngineError {
    pub(crate) fn not_found(kind: EntityKind, key: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn in_use(kind: EntityKind, key: impl fmt::Display, by: String) -> Self {
        Self::InUse {
            kind,
            key: key.to_string(),
            by,
        }
    }

    pub(crate) fn already_exists(kind: EntityKind, key: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            kind,
            key: key.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
