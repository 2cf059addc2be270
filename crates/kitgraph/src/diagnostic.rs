//! Non-fatal degradation reports.
//!
//! Operations that can still produce a useful value when parts of the input
//! are inconsistent return [`Resolved`], pairing the value with the
//! [`Diagnostic`]s describing what was skipped or assumed.

use crate::error::EntityKind;
use kitgraph_model::{ConnectionId, PieceId};
use std::fmt;
use tracing::warn;

/// A named, non-fatal problem found while processing a design.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A connection references a missing piece or port, or lost an endpoint.
    DanglingConnection {
        /// The connection.
        connection: ConnectionId,
        /// What is missing.
        reason: String,
    },
    /// A connected component had no fixed piece and was anchored implicitly.
    PartiallyAnchored {
        /// The piece placed at the identity plane.
        anchor: PieceId,
        /// All pieces of the component, sorted.
        pieces: Vec<PieceId>,
    },
    /// A cycle-closing connection disagrees with the placement already made.
    OverconstrainedConnection {
        /// The connection that was not followed.
        connection: ConnectionId,
        /// Distance between the committed and the implied origin.
        deviation: f64,
    },
    /// A fixed piece has a plane whose axes do not span a frame.
    DegeneratePlane {
        /// The piece.
        piece: PieceId,
    },
    /// A diff entry does not match the design it is applied to.
    StaleDiffEntry {
        /// Kind of the entry.
        kind: EntityKind,
        /// Key of the entry.
        key: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingConnection { connection, reason } => {
                write!(f, "dangling connection {connection}: {reason}")
            }
            Self::PartiallyAnchored { anchor, pieces } => write!(
                f,
                "no fixed piece among {} piece(s); anchored '{anchor}' at the origin",
                pieces.len()
            ),
            Self::OverconstrainedConnection {
                connection,
                deviation,
            } => write!(
                f,
                "overconstrained connection {connection} (off by {deviation})"
            ),
            Self::DegeneratePlane { piece } => {
                write!(f, "piece '{piece}' has a degenerate plane")
            }
            Self::StaleDiffEntry { kind, key } => write!(f, "stale diff entry for {kind} {key}"),
        }
    }
}

/// A value together with the diagnostics raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// The best achievable value.
    pub value: T,
    /// Problems found, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Resolved<T> {
    /// A value with no diagnostics.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    /// Whether no diagnostics were raised.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// One-line description of the diagnostics.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_clean() {
            return "no issues".to_string();
        }
        let count = |pred: fn(&Diagnostic) -> bool| self.diagnostics.iter().filter(|d| pred(d)).count();
        let parts = [
            (
                count(|d| matches!(d, Diagnostic::DanglingConnection { .. })),
                "dangling connection(s)",
            ),
            (
                count(|d| matches!(d, Diagnostic::PartiallyAnchored { .. })),
                "implicitly anchored component(s)",
            ),
            (
                count(|d| matches!(d, Diagnostic::OverconstrainedConnection { .. })),
                "overconstrained connection(s)",
            ),
            (
                count(|d| matches!(d, Diagnostic::DegeneratePlane { .. })),
                "degenerate plane(s)",
            ),
            (
                count(|d| matches!(d, Diagnostic::StaleDiffEntry { .. })),
                "stale diff entr(y/ies)",
            ),
        ];
        let issues: Vec<String> = parts
            .iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, label)| format!("{n} {label}"))
            .collect();
        issues.join(", ")
    }

    /// Transform the value, keeping the diagnostics.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }

    /// Drop the diagnostics.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Log and record a diagnostic.
pub(crate) fn report(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    warn!(%diagnostic, "design diagnostic");
    diagnostics.push(diagnostic);
}
