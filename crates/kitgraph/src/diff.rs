//! Differences between two versions of a design.
//!
//! A [`DesignDiff`] is keyed by piece id and by connection identity. It can
//! be applied to produce the new version, or applied in place to produce a
//! review copy that keeps removed entries and marks every piece and
//! connection with a [`DiffStatus`] quality.

use crate::diagnostic::{report, Diagnostic, Resolved};
use crate::error::{EntityKind, Result};
use crate::settings::EngineSettings;
use kitgraph_model::{
    find_quality, set_quality, Connection, ConnectionId, Design, Piece, PieceId, Quality,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use tracing::debug;

/// Piece changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiecesDiff {
    /// Pieces only in the new version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<Piece>,
    /// Ids of pieces only in the old version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<PieceId>,
    /// New values of pieces that changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<Piece>,
}

/// Connection changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsDiff {
    /// Connections only in the new version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<Connection>,
    /// Identities of connections only in the old version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<ConnectionId>,
    /// New values of connections that changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated: Vec<Connection>,
}

/// Everything that changed between two versions of a design.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignDiff {
    /// Piece changes.
    #[serde(default)]
    pub pieces: PiecesDiff,
    /// Connection changes.
    #[serde(default)]
    pub connections: ConnectionsDiff,
    /// Replacement for the design qualities, when they changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualities: Option<Vec<Quality>>,
}

impl DesignDiff {
    /// Whether the diff changes nothing.
    pub fn is_empty(&self) -> bool {
        self.pieces == PiecesDiff::default()
            && self.connections == ConnectionsDiff::default()
            && self.qualities.is_none()
    }
}

/// Status written into in-place diff results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    /// Only in the new version.
    Added,
    /// Only in the old version.
    Removed,
    /// In both, with a different value.
    Modified,
    /// In both, unchanged.
    Unchanged,
}

impl DiffStatus {
    /// Quality value of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        }
    }

    /// Status recorded in `qualities` under `name`.
    pub fn from_qualities(qualities: &[Quality], name: &str) -> Option<Self> {
        match find_quality(qualities, name)?.value.as_deref()? {
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            "modified" => Some(Self::Modified),
            "unchanged" => Some(Self::Unchanged),
            _ => None,
        }
    }
}

impl fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Changes turning `base` into `other`.
///
/// Added and updated entries follow `other`'s order, removed entries
/// follow `base`'s order.
pub fn diff_designs(base: &Design, other: &Design) -> DesignDiff {
    let mut diff = DesignDiff::default();

    for piece in &other.pieces {
        match base.piece(&piece.piece_id()) {
            None => diff.pieces.added.push(piece.clone()),
            Some(old) if old != piece => diff.pieces.updated.push(piece.clone()),
            Some(_) => {}
        }
    }
    for piece in &base.pieces {
        if other.piece(&piece.piece_id()).is_none() {
            diff.pieces.removed.push(piece.piece_id());
        }
    }

    for connection in &other.connections {
        match base.connection(&connection.connection_id()) {
            None => diff.connections.added.push(connection.clone()),
            Some(old) if old != connection => diff.connections.updated.push(connection.clone()),
            Some(_) => {}
        }
    }
    for connection in &base.connections {
        if other.connection(&connection.connection_id()).is_none() {
            diff.connections.removed.push(connection.connection_id());
        }
    }

    if base.qualities != other.qualities {
        diff.qualities = Some(other.qualities.clone());
    }
    diff
}

/// Apply `diff` to `design` with default settings.
pub fn apply_design_diff(design: &Design, diff: &DesignDiff, inplace: bool) -> Resolved<Design> {
    apply(design, diff, inplace, &EngineSettings::default())
}

/// Apply `diff` to `design`.
///
/// Without `inplace` the result is the new version: removed entries are
/// dropped, updated entries replaced and added entries appended, or
/// overwritten in place when already present. Connections left without a
/// piece are dropped and reported. Updates and removals of absent entries
/// are reported as stale and skipped.
///
/// With `inplace` the removed pieces and connections are kept and every
/// entry carries its [`DiffStatus`] in the `diff_status_quality` quality.
/// Apart from that quality, the in-place result contains the applied one.
pub fn apply_design_diff_with(
    design: &Design,
    diff: &DesignDiff,
    inplace: bool,
    settings: &EngineSettings,
) -> Result<Resolved<Design>> {
    settings.validate()?;
    Ok(apply(design, diff, inplace, settings))
}

fn apply(design: &Design, diff: &DesignDiff, inplace: bool, settings: &EngineSettings) -> Resolved<Design> {
    let mut diagnostics = Vec::new();
    let pieces = merge(
        &design.pieces,
        &diff.pieces.added,
        &diff.pieces.removed,
        &diff.pieces.updated,
        Piece::piece_id,
        EntityKind::Piece,
        &mut diagnostics,
    );
    let mut connections = merge(
        &design.connections,
        &diff.connections.added,
        &diff.connections.removed,
        &diff.connections.updated,
        Connection::connection_id,
        EntityKind::Connection,
        &mut diagnostics,
    );

    let present: HashSet<&str> = pieces.iter().map(|(p, _)| p.id.as_str()).collect();
    let live: HashSet<&str> = pieces
        .iter()
        .filter(|(_, status)| *status != DiffStatus::Removed)
        .map(|(p, _)| p.id.as_str())
        .collect();
    connections.retain_mut(|(connection, status)| {
        if *status == DiffStatus::Removed {
            return true;
        }
        let lost = [connection.connected.anchor(), connection.connecting.anchor()]
            .into_iter()
            .find(|anchor| !live.contains(anchor.as_str()));
        let Some(lost) = lost else {
            return true;
        };
        let gone = present.contains(lost.as_str());
        let reason = if gone {
            format!("piece '{lost}' was removed")
        } else {
            format!("piece '{lost}' is missing")
        };
        report(
            &mut diagnostics,
            Diagnostic::DanglingConnection {
                connection: connection.connection_id(),
                reason,
            },
        );
        *status = DiffStatus::Removed;
        gone
    });

    let name = &settings.diff_status_quality;
    let keep = |status: DiffStatus| inplace || status != DiffStatus::Removed;
    let mark = |qualities: &[Quality], status: DiffStatus| {
        set_quality(qualities, Quality::new(name.clone()).with_value(status.as_str()))
    };

    let mut value = design.clone();
    value.pieces = pieces
        .into_iter()
        .filter(|(_, status)| keep(*status))
        .map(|(mut piece, status)| {
            if inplace {
                piece.qualities = mark(&piece.qualities, status);
            }
            piece
        })
        .collect();
    value.connections = connections
        .into_iter()
        .filter(|(_, status)| keep(*status))
        .map(|(mut connection, status)| {
            if inplace {
                connection.qualities = mark(&connection.qualities, status);
            }
            connection
        })
        .collect();
    if let Some(qualities) = &diff.qualities {
        value.qualities = qualities.clone();
    }

    debug!(
        design = %design.design_id(),
        inplace,
        pieces = value.pieces.len(),
        connections = value.connections.len(),
        diagnostics = diagnostics.len(),
        "applied design diff"
    );
    Resolved { value, diagnostics }
}

/// Base entries in order, then new ones, each with its status. Removed
/// entries stay in the list marked [`DiffStatus::Removed`].
fn merge<T, K>(
    base: &[T],
    added: &[T],
    removed: &[K],
    updated: &[T],
    key: impl Fn(&T) -> K,
    kind: EntityKind,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<(T, DiffStatus)>
where
    T: Clone + PartialEq,
    K: Eq + Hash + fmt::Display,
{
    let in_base: HashSet<K> = base.iter().map(&key).collect();
    let added_by_key: HashMap<K, &T> = added.iter().map(|e| (key(e), e)).collect();
    let updated_by_key: HashMap<K, &T> = updated.iter().map(|e| (key(e), e)).collect();
    for k in removed {
        if !in_base.contains(k) {
            report(diagnostics, Diagnostic::StaleDiffEntry { kind, key: k.to_string() });
        }
    }
    let removed: HashSet<&K> = removed.iter().collect();
    for e in updated {
        let k = key(e);
        if !in_base.contains(&k) {
            report(diagnostics, Diagnostic::StaleDiffEntry { kind, key: k.to_string() });
        }
    }

    let changed = |old: &T, new: &T| {
        if old == new {
            DiffStatus::Unchanged
        } else {
            DiffStatus::Modified
        }
    };
    let mut out = Vec::with_capacity(base.len() + added.len());
    for entry in base {
        let k = key(entry);
        let merged = if let Some(new) = added_by_key.get(&k) {
            ((*new).clone(), changed(entry, new))
        } else if removed.contains(&k) {
            (entry.clone(), DiffStatus::Removed)
        } else if let Some(new) = updated_by_key.get(&k) {
            ((*new).clone(), changed(entry, new))
        } else {
            (entry.clone(), DiffStatus::Unchanged)
        };
        out.push(merged);
    }
    let mut appended: HashSet<K> = HashSet::new();
    for entry in added {
        let k = key(entry);
        if in_base.contains(&k) || appended.contains(&k) {
            continue;
        }
        if let Some(latest) = added_by_key.get(&k) {
            out.push(((*latest).clone(), DiffStatus::Added));
        }
        appended.insert(k);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitgraph_model::{Coord, Side, TypeId};

    fn beam(id: &str) -> Piece {
        Piece::of_type(id, TypeId::new("beam"))
    }

    fn link(a: &str, b: &str) -> Connection {
        Connection::new(Side::new(a, "top"), Side::new(b, "bottom"))
    }

    fn base() -> Design {
        Design::builder("d")
            .piece(beam("a"))
            .piece(beam("b"))
            .piece(beam("c"))
            .connection(link("a", "b"))
            .connection(link("b", "c"))
            .build()
            .unwrap()
    }

    fn edited() -> Design {
        Design::builder("d")
            .piece(beam("a"))
            .piece(beam("b").with_center(Coord::new(1.0, 2.0)))
            .piece(beam("d"))
            .connection(link("a", "b").with_gap(2.0))
            .connection(link("b", "d"))
            .quality(Quality::new("author").with_value("ann"))
            .build()
            .unwrap()
    }

    fn status(qualities: &[Quality]) -> Option<DiffStatus> {
        DiffStatus::from_qualities(qualities, "diff.status")
    }

    #[test]
    fn diff_classifies_changes() {
        let diff = diff_designs(&base(), &edited());
        assert_eq!(diff.pieces.added, vec![beam("d")]);
        assert_eq!(diff.pieces.removed, vec![PieceId::new("c")]);
        assert_eq!(diff.pieces.updated.len(), 1);
        assert_eq!(diff.pieces.updated[0].id, "b");
        assert_eq!(diff.connections.added, vec![link("b", "d")]);
        assert_eq!(diff.connections.removed, vec![link("b", "c").connection_id()]);
        assert_eq!(diff.connections.updated, vec![link("a", "b").with_gap(2.0)]);
        assert!(diff.qualities.is_some());
        assert!(diff_designs(&base(), &base()).is_empty());
    }

    #[test]
    fn applying_a_diff_reproduces_the_new_version() {
        let diff = diff_designs(&base(), &edited());
        let r = apply_design_diff(&base(), &diff, false);
        assert!(r.is_clean(), "{}", r.summary());
        assert!(r.value.is_equivalent(&edited()));
    }

    #[test]
    fn reapplying_is_a_no_op() {
        let diff = diff_designs(&base(), &edited());
        let once = apply_design_diff(&base(), &diff, false).value;
        let twice = apply_design_diff(&once, &diff, false);
        assert_eq!(twice.value, once);
        assert!(twice
            .diagnostics
            .iter()
            .all(|d| matches!(d, Diagnostic::StaleDiffEntry { .. })));
    }

    #[test]
    fn removed_piece_drops_its_connections() {
        let diff = DesignDiff {
            pieces: PiecesDiff {
                removed: vec!["c".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let r = apply_design_diff(&base(), &diff, false);
        assert_eq!(r.value.connections, vec![link("a", "b")]);
        assert!(matches!(
            &r.diagnostics[..],
            [Diagnostic::DanglingConnection { connection, .. }] if *connection == link("b", "c").connection_id()
        ));
    }

    #[test]
    fn stale_entries_are_reported_and_skipped() {
        let diff = DesignDiff {
            pieces: PiecesDiff {
                removed: vec!["zz".into()],
                updated: vec![beam("yy")],
                ..Default::default()
            },
            ..Default::default()
        };
        let r = apply_design_diff(&base(), &diff, false);
        assert_eq!(r.value, base());
        assert_eq!(r.diagnostics.len(), 2);
    }

    #[test]
    fn added_entry_already_present_is_overwritten_in_place() {
        let diff = DesignDiff {
            pieces: PiecesDiff {
                added: vec![beam("a").with_center(Coord::new(3.0, 3.0))],
                ..Default::default()
            },
            ..Default::default()
        };
        let r = apply_design_diff(&base(), &diff, false);
        assert_eq!(r.value.pieces[0].center, Some(Coord::new(3.0, 3.0)));
        assert_eq!(r.value.pieces.len(), 3);
    }

    #[test]
    fn inplace_marks_every_entry_and_keeps_removed_ones() {
        let diff = diff_designs(&base(), &edited());
        let r = apply_design_diff(&base(), &diff, true);
        let marks: Vec<(&str, Option<DiffStatus>)> = r
            .value
            .pieces
            .iter()
            .map(|p| (p.id.as_str(), status(&p.qualities)))
            .collect();
        assert_eq!(
            marks,
            vec![
                ("a", Some(DiffStatus::Unchanged)),
                ("b", Some(DiffStatus::Modified)),
                ("c", Some(DiffStatus::Removed)),
                ("d", Some(DiffStatus::Added)),
            ]
        );
        let connection_marks: Vec<Option<DiffStatus>> =
            r.value.connections.iter().map(|c| status(&c.qualities)).collect();
        assert_eq!(
            connection_marks,
            vec![
                Some(DiffStatus::Modified),
                Some(DiffStatus::Removed),
                Some(DiffStatus::Added)
            ]
        );
    }

    #[test]
    fn inplace_result_contains_the_applied_one() {
        let diff = diff_designs(&base(), &edited());
        let applied = apply_design_diff(&base(), &diff, false).value;
        let inplace = apply_design_diff(&base(), &diff, true).value;
        let strip = |qualities: &[Quality]| -> Vec<Quality> {
            qualities.iter().filter(|q| q.name != "diff.status").cloned().collect()
        };
        for piece in &applied.pieces {
            let mut twin = inplace.piece(&piece.piece_id()).unwrap().clone();
            twin.qualities = strip(&twin.qualities);
            assert_eq!(&twin, piece);
        }
        for connection in &applied.connections {
            let mut twin = inplace.connection(&connection.connection_id()).unwrap().clone();
            twin.qualities = strip(&twin.qualities);
            assert_eq!(&twin, connection);
        }
    }

    #[test]
    fn status_quality_name_follows_settings() {
        let settings = EngineSettings {
            diff_status_quality: "review".to_string(),
            ..Default::default()
        };
        let diff = diff_designs(&base(), &edited());
        let r = apply_design_diff_with(&base(), &diff, true, &settings).unwrap();
        assert_eq!(
            DiffStatus::from_qualities(&r.value.pieces[3].qualities, "review"),
            Some(DiffStatus::Added)
        );
        assert!(r.value.pieces[3].quality("diff.status").is_none());
    }

    #[test]
    fn empty_status_quality_name_is_rejected() {
        let settings = EngineSettings {
            diff_status_quality: String::new(),
            ..Default::default()
        };
        let diff = diff_designs(&base(), &edited());
        assert!(matches!(
            apply_design_diff_with(&base(), &diff, true, &settings),
            Err(crate::error::EngineError::Settings(_))
        ));
    }

    #[test]
    fn diff_serializes_camel_case() {
        let diff = diff_designs(&base(), &edited());
        let json = serde_json::to_value(&diff).unwrap();
        assert!(json["pieces"]["added"].is_array());
        assert!(json["connections"]["removed"].is_array());
        let back: DesignDiff = serde_json::from_value(json).unwrap();
        assert_eq!(back, diff);
    }
}
