//! Clustering connected piece groups into design-pieces, and the inverse.
//!
//! Clustering moves a connected group of pieces and their internal
//! connections into a child design and replaces the group with a single
//! design-piece. Every connection crossing the group boundary is kept: its
//! inner side keeps the original piece and port and is addressed through
//! the design-piece. Exploding inlines the child design again under ids
//! prefixed with the design-piece id.

use crate::crud::{find_design_in_kit, find_piece_in_design, set_design_in_kit};
use crate::error::{EngineError, EntityKind, Result};
use crate::graph::UnionFind;
use crate::settings::EngineSettings;
use kitgraph_model::{Connection, ConnectionId, Coord, Design, DesignId, Kit, Piece, PieceId, Side, SideId};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

/// Piece ids forming one clusterable group, sorted.
pub type Group = Vec<PieceId>;

/// Result of clustering a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustered {
    /// The design with the group replaced by the design-piece.
    pub parent: Design,
    /// The design holding the group.
    pub child: Design,
    /// Inner sides exposed through the design-piece, in boundary order.
    pub exposed: Vec<SideId>,
}

/// Connected groups of at least two pieces within the selection.
///
/// Only connections between selected pieces count. Unknown ids are
/// ignored. Members and groups are sorted lexically.
pub fn get_clusterable_groups(design: &Design, piece_ids: &[PieceId]) -> Vec<Group> {
    let selected: Vec<&PieceId> = piece_ids
        .iter()
        .filter(|id| design.piece(id).is_some())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: HashMap<&PieceId, usize> = selected.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut uf = UnionFind::new(selected.len());
    for connection in &design.connections {
        let a = index.get(connection.connected.anchor());
        let b = index.get(connection.connecting.anchor());
        if let (Some(&a), Some(&b)) = (a, b) {
            if a != b {
                uf.union(a, b);
            }
        }
    }
    uf.groups()
        .into_iter()
        .filter(|g| g.len() >= 2)
        .map(|g| g.into_iter().map(|i| selected[i].clone()).collect())
        .collect()
}

/// Replace `group` in `design` by a design-piece `design_piece_id` standing
/// for a new child design `cluster_design_id`.
///
/// The group must hold at least two typed pieces connected among
/// themselves. Boundary connections are re-pointed to the design-piece and
/// ordered by their connection id. The design-piece's center is the mean
/// of the group's centers.
pub fn cluster_group(
    design: &Design,
    group: &[PieceId],
    cluster_design_id: &DesignId,
    design_piece_id: &PieceId,
) -> Result<Clustered> {
    for id in group {
        let piece = find_piece_in_design(design, id)?;
        if piece.is_design_piece() {
            return Err(EngineError::InvalidGroup(format!(
                "piece '{id}' is a design-piece"
            )));
        }
    }
    let members: HashSet<&PieceId> = group.iter().collect();
    let groups = get_clusterable_groups(design, group);
    if groups.len() != 1 || groups[0].len() != members.len() {
        return Err(EngineError::InvalidGroup(format!(
            "{} piece(s) do not form one connected group",
            members.len()
        )));
    }
    if design.piece(design_piece_id).is_some() {
        return Err(EngineError::already_exists(EntityKind::Piece, design_piece_id));
    }

    let mut child = Design::with_id(cluster_design_id);
    child.unit = design.unit.clone();
    let mut parent = design.clone();
    parent.pieces.clear();
    parent.connections.clear();

    let mut design_piece = Piece::of_design(design_piece_id.id.clone(), cluster_design_id.clone());
    let centers: Vec<Coord> = design
        .pieces
        .iter()
        .filter(|p| members.contains(&p.piece_id()))
        .filter_map(|p| p.center)
        .collect();
    if !centers.is_empty() {
        let n = centers.len() as f64;
        design_piece.center = Some(Coord::new(
            centers.iter().map(|c| c.x).sum::<f64>() / n,
            centers.iter().map(|c| c.y).sum::<f64>() / n,
        ));
    }

    let mut inserted = false;
    for piece in &design.pieces {
        if members.contains(&piece.piece_id()) {
            child.pieces.push(piece.clone());
            if !inserted {
                parent.pieces.push(design_piece.clone());
                inserted = true;
            }
        } else {
            parent.pieces.push(piece.clone());
        }
    }

    let mut boundary: Vec<(ConnectionId, Connection)> = Vec::new();
    for connection in &design.connections {
        let inside = (
            members.contains(connection.connected.anchor()),
            members.contains(connection.connecting.anchor()),
        );
        match inside {
            (true, true) => child.connections.push(connection.clone()),
            (false, false) => parent.connections.push(connection.clone()),
            (connected_inside, _) => {
                let mut repointed = connection.clone();
                let inner = if connected_inside {
                    &mut repointed.connected
                } else {
                    &mut repointed.connecting
                };
                inner.design_piece = Some(design_piece_id.clone());
                boundary.push((connection.connection_id(), repointed));
            }
        }
    }
    boundary.sort_by(|a, b| a.0.cmp(&b.0));

    let mut exposed = Vec::new();
    for (_, connection) in boundary {
        for side in [&connection.connected, &connection.connecting] {
            if side.design_piece.as_ref() == Some(design_piece_id) {
                let id = side.side_id();
                if !exposed.contains(&id) {
                    exposed.push(id);
                }
            }
        }
        parent.connections.push(connection);
    }

    parent.validate()?;
    child.validate()?;
    info!(
        design_piece = %design_piece_id,
        cluster = %cluster_design_id,
        pieces = child.pieces.len(),
        exposed = exposed.len(),
        "clustered pieces"
    );
    Ok(Clustered {
        parent,
        child,
        exposed,
    })
}

/// Inline `child` into `parent` in place of design-piece `design_piece_id`
/// with default settings.
pub fn explode_design_piece(parent: &Design, child: &Design, design_piece_id: &PieceId) -> Result<Design> {
    explode_design_piece_with(parent, child, design_piece_id, &EngineSettings::default())
}

/// Inline `child` into `parent` in place of design-piece `design_piece_id`.
///
/// Child pieces are renamed `{design_piece_id}{separator}{id}`. Connections
/// addressed through the design-piece are re-pointed to the inlined pieces.
/// When the design-piece is fixed, the inlined planes are moved into its
/// frame.
pub fn explode_design_piece_with(
    parent: &Design,
    child: &Design,
    design_piece_id: &PieceId,
    settings: &EngineSettings,
) -> Result<Design> {
    settings.validate()?;
    let holder = find_piece_in_design(parent, design_piece_id)?;
    if !holder.is_design_piece() {
        return Err(EngineError::InvalidGroup(format!(
            "piece '{design_piece_id}' is not a design-piece"
        )));
    }
    let prefix = format!("{design_piece_id}{}", settings.namespace_separator);
    let rename = |id: &PieceId| PieceId::new(format!("{prefix}{id}"));
    let tol = settings.tol();
    let frame = holder.plane.and_then(|p| p.to_transform(&tol));

    let mut inlined = Vec::with_capacity(child.pieces.len());
    for piece in &child.pieces {
        let id = rename(&piece.piece_id());
        if parent.piece(&id).is_some() {
            return Err(EngineError::already_exists(EntityKind::Piece, id));
        }
        let mut piece = piece.clone();
        piece.id = id.id;
        if let (Some(frame), Some(plane)) = (frame, piece.plane) {
            if let Some(local) = plane.to_transform(&tol) {
                piece.plane = Some(
                    kitgraph_model::Plane::from_transform(&frame.then(&local))
                        .rounded(settings.rounding_decimals),
                );
            }
        }
        inlined.push(piece);
    }

    let mut out = parent.clone();
    out.pieces.clear();
    for piece in &parent.pieces {
        if piece.id == design_piece_id.id {
            out.pieces.append(&mut inlined);
        } else {
            out.pieces.push(piece.clone());
        }
    }

    out.connections.clear();
    for connection in &parent.connections {
        let mut connection = connection.clone();
        for side in [&mut connection.connected, &mut connection.connecting] {
            if side.design_piece.as_ref() == Some(design_piece_id) {
                let inner = inner_piece(child, &side.piece, &settings.namespace_separator)?;
                *side = Side::new(rename(&inner), side.port.clone());
            } else if side.design_piece.is_none() && &side.piece == design_piece_id {
                return Err(EngineError::not_found(
                    EntityKind::Port,
                    format!("inner piece for port '{}' of design-piece '{design_piece_id}'", side.port),
                ));
            }
        }
        out.connections.push(connection);
    }
    for connection in &child.connections {
        let mut connection = connection.clone();
        for side in [&mut connection.connected, &mut connection.connecting] {
            match &side.design_piece {
                Some(inner) => side.design_piece = Some(rename(inner)),
                None => side.piece = rename(&side.piece),
            }
        }
        out.connections.push(connection);
    }

    out.validate()?;
    info!(
        design_piece = %design_piece_id,
        pieces = child.pieces.len(),
        "exploded design-piece"
    );
    Ok(out)
}

/// Piece of `child` a side addressed through a design-piece lands on.
///
/// A child that was itself exploded holds the piece under a namespaced id;
/// the side may name it by that id or by its last segment alone, as long as
/// that segment is unambiguous.
fn inner_piece(child: &Design, piece: &PieceId, separator: &str) -> Result<PieceId> {
    if child.piece(piece).is_some() {
        return Ok(piece.clone());
    }
    let suffix = format!("{separator}{piece}");
    let mut found = child.pieces.iter().filter(|p| p.id.ends_with(&suffix));
    match (found.next(), found.next()) {
        (Some(only), None) => Ok(only.piece_id()),
        (Some(_), Some(_)) => Err(EngineError::InvalidGroup(format!(
            "piece '{piece}' is ambiguous in design {}",
            child.design_id()
        ))),
        (None, _) => Err(EngineError::not_found(EntityKind::Piece, piece)),
    }
}

/// Cluster pieces of design `design_id` into a new design
/// `cluster_design_id` stored in the kit.
///
/// The selection must form exactly one clusterable group. The design-piece
/// takes the cluster design's name as its id.
pub fn cluster_pieces_in_design(
    kit: &Kit,
    design_id: &DesignId,
    piece_ids: &[PieceId],
    cluster_design_id: &DesignId,
) -> Result<Kit> {
    let design = find_design_in_kit(kit, design_id)?;
    if kit.get_design(cluster_design_id).is_some() {
        return Err(EngineError::already_exists(EntityKind::Design, cluster_design_id));
    }
    let clustered = cluster_group(
        design,
        piece_ids,
        cluster_design_id,
        &PieceId::new(cluster_design_id.name.clone()),
    )?;
    let mut out = set_design_in_kit(kit, clustered.parent)?;
    out.designs.push(clustered.child);
    Ok(out)
}

/// Explode design-piece `piece_id` of design `design_id` in place.
///
/// The child design stays in the kit.
pub fn explode_piece_in_design(kit: &Kit, design_id: &DesignId, piece_id: &PieceId) -> Result<Kit> {
    let design = find_design_in_kit(kit, design_id)?;
    let holder = find_piece_in_design(design, piece_id)?;
    let child_id = holder.design.as_ref().ok_or_else(|| {
        EngineError::InvalidGroup(format!("piece '{piece_id}' is not a design-piece"))
    })?;
    let child = explode_design_pieces(kit, find_design_in_kit(kit, child_id)?)?;
    let exploded = explode_design_piece(design, &child, piece_id)?;
    set_design_in_kit(kit, exploded)
}

/// Explode every design-piece of `design`, recursively.
pub fn explode_design_pieces(kit: &Kit, design: &Design) -> Result<Design> {
    explode_design_pieces_with(kit, design, &EngineSettings::default())
}

/// [`explode_design_pieces`] with explicit settings.
pub fn explode_design_pieces_with(kit: &Kit, design: &Design, settings: &EngineSettings) -> Result<Design> {
    settings.validate()?;
    let mut stack = vec![design.design_id()];
    explode_all(kit, design, settings, &mut stack, false)
}

/// Explode what can be exploded. Design-pieces whose design is missing,
/// recursive or clashing stay in place; the resolver then reports their
/// connections as dangling.
pub(crate) fn explode_resolvable(kit: &Kit, design: &Design, settings: &EngineSettings) -> Design {
    let mut stack = vec![design.design_id()];
    match explode_all(kit, design, settings, &mut stack, true) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "could not expand design-pieces");
            design.clone()
        }
    }
}

fn explode_all(
    kit: &Kit,
    design: &Design,
    settings: &EngineSettings,
    stack: &mut Vec<DesignId>,
    lenient: bool,
) -> Result<Design> {
    let mut out = design.clone();
    let holders: Vec<(PieceId, DesignId)> = design
        .pieces
        .iter()
        .filter_map(|p| Some((p.piece_id(), p.design.clone()?)))
        .collect();
    for (piece_id, child_id) in holders {
        let step = if stack.contains(&child_id) {
            Err(EngineError::InvalidGroup(format!("design {child_id} contains itself")))
        } else {
            find_design_in_kit(kit, &child_id).and_then(|child| {
                stack.push(child_id.clone());
                let nested = explode_all(kit, child, settings, stack, lenient);
                stack.pop();
                explode_design_piece_with(&out, &nested?, &piece_id, settings)
            })
        };
        match step {
            Ok(exploded) => out = exploded,
            Err(err) if lenient => {
                warn!(design_piece = %piece_id, %err, "left design-piece unexpanded");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(out)
}
