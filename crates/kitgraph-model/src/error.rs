//! Construction errors for the data model.

use thiserror::Error;

/// Errors raised when a model value would violate an identity invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Two pieces in one design share an id.
    #[error("duplicate piece '{0}'")]
    DuplicatePiece(String),

    /// Two connections in one design share both endpoints.
    #[error("duplicate connection {0}")]
    DuplicateConnection(String),

    /// Two ports in one type share an id.
    #[error("duplicate port '{port}' in type {type_id}")]
    DuplicatePort {
        /// The type holding the ports.
        type_id: String,
        /// The repeated port id.
        port: String,
    },

    /// Two types in one kit share a `(name, variant)` key.
    #[error("duplicate type {0}")]
    DuplicateType(String),

    /// Two designs in one kit share a `(name, variant, view)` key.
    #[error("duplicate design {0}")]
    DuplicateDesign(String),

    /// A connection references a piece that is not in the design.
    #[error("connection {connection} references unknown piece '{piece}'")]
    UnknownPiece {
        /// The offending connection.
        connection: String,
        /// The missing piece id.
        piece: String,
    },

    /// A piece references both or neither of a type and a design.
    #[error("piece '{0}' must reference exactly one of a type or a design")]
    InvalidPiece(String),

    /// A connection joins a piece to itself.
    #[error("connection {0} joins a piece to itself")]
    SelfConnection(String),

    /// Kit JSON could not be read or written.
    #[error("kit json: {0}")]
    Json(String),
}

/// Result type for model construction.
pub type Result<T> = std::result::Result<T, ModelError>;
