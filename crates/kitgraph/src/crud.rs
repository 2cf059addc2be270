//! Lookups and identity-preserving updates over kits and designs.
//!
//! Every operation takes its inputs by reference and returns a new value.
//! `add_*` fails with [`EngineError::AlreadyExists`] on a key collision,
//! `set_*` is an update (never an upsert) and `remove_*` only removes the
//! exact key given; both fail with [`EngineError::NotFound`] otherwise.

use crate::error::{EngineError, EntityKind, Result};
use crate::resolve::pieces_metadata;
use kitgraph_model::{
    Connection, ConnectionId, Design, DesignId, Kit, ModelError, Piece, PieceId, Port, PortId,
    Quality, Side, Type, TypeId,
};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Type with identity `id`.
pub fn find_type_in_kit<'a>(kit: &'a Kit, id: &TypeId) -> Result<&'a Type> {
    kit.get_type(id)
        .ok_or_else(|| EngineError::not_found(EntityKind::Type, id))
}

/// Design with identity `id`.
pub fn find_design_in_kit<'a>(kit: &'a Kit, id: &DesignId) -> Result<&'a Design> {
    kit.get_design(id)
        .ok_or_else(|| EngineError::not_found(EntityKind::Design, id))
}

/// Piece with id `id`.
pub fn find_piece_in_design<'a>(design: &'a Design, id: &PieceId) -> Result<&'a Piece> {
    design
        .piece(id)
        .ok_or_else(|| EngineError::not_found(EntityKind::Piece, id))
}

/// Connection with identity `id`, stored in either direction.
pub fn find_connection_in_design<'a>(design: &'a Design, id: &ConnectionId) -> Result<&'a Connection> {
    design
        .connection(id)
        .ok_or_else(|| EngineError::not_found(EntityKind::Connection, id))
}

/// Add a type.
pub fn add_type_to_kit(kit: &Kit, ty: Type) -> Result<Kit> {
    ty.validate()?;
    let id = ty.type_id();
    if kit.get_type(&id).is_some() {
        return Err(EngineError::already_exists(EntityKind::Type, id));
    }
    let mut out = kit.clone();
    out.types.push(ty);
    Ok(out)
}

/// Replace the type with the same identity.
pub fn set_type_in_kit(kit: &Kit, ty: Type) -> Result<Kit> {
    ty.validate()?;
    let id = ty.type_id();
    let index = kit
        .types
        .iter()
        .position(|t| t.is(&id))
        .ok_or_else(|| EngineError::not_found(EntityKind::Type, &id))?;
    let mut out = kit.clone();
    out.types[index] = ty;
    Ok(out)
}

/// Remove a type no piece of the kit's designs uses.
///
/// Fails with [`EngineError::InUse`] while a piece still has the type.
pub fn remove_type_from_kit(kit: &Kit, id: &TypeId) -> Result<Kit> {
    find_type_in_kit(kit, id)?;
    let user = kit.designs.iter().find_map(|d| {
        d.pieces
            .iter()
            .find(|p| p.type_id.as_ref() == Some(id))
            .map(|p| format!("piece '{}' of design {}", p.id, d.design_id()))
    });
    if let Some(by) = user {
        return Err(EngineError::in_use(EntityKind::Type, id, by));
    }
    let mut out = kit.clone();
    out.types.retain(|t| !t.is(id));
    Ok(out)
}

/// Add a design.
pub fn add_design_to_kit(kit: &Kit, design: Design) -> Result<Kit> {
    design.validate()?;
    let id = design.design_id();
    if kit.get_design(&id).is_some() {
        return Err(EngineError::already_exists(EntityKind::Design, id));
    }
    let mut out = kit.clone();
    out.designs.push(design);
    Ok(out)
}

/// Replace the design with the same identity.
pub fn set_design_in_kit(kit: &Kit, design: Design) -> Result<Kit> {
    design.validate()?;
    let id = design.design_id();
    let index = kit
        .designs
        .iter()
        .position(|d| d.is(&id))
        .ok_or_else(|| EngineError::not_found(EntityKind::Design, &id))?;
    let mut out = kit.clone();
    out.designs[index] = design;
    Ok(out)
}

/// Remove a design no design-piece of the kit refers to.
///
/// Fails with [`EngineError::InUse`] while a design-piece still stands for
/// the design.
pub fn remove_design_from_kit(kit: &Kit, id: &DesignId) -> Result<Kit> {
    find_design_in_kit(kit, id)?;
    let user = kit.designs.iter().filter(|d| !d.is(id)).find_map(|d| {
        d.pieces
            .iter()
            .find(|p| p.design.as_ref() == Some(id))
            .map(|p| format!("design-piece '{}' of design {}", p.id, d.design_id()))
    });
    if let Some(by) = user {
        return Err(EngineError::in_use(EntityKind::Design, id, by));
    }
    let mut out = kit.clone();
    out.designs.retain(|d| !d.is(id));
    Ok(out)
}

/// Add a piece.
pub fn add_piece_to_design(design: &Design, piece: Piece) -> Result<Design> {
    piece.validate()?;
    if design.piece(&piece.piece_id()).is_some() {
        return Err(EngineError::already_exists(EntityKind::Piece, &piece.id));
    }
    let mut out = design.clone();
    out.pieces.push(piece);
    Ok(out)
}

/// Replace the piece with the same id.
pub fn set_piece_in_design(design: &Design, piece: Piece) -> Result<Design> {
    piece.validate()?;
    let index = design
        .pieces
        .iter()
        .position(|p| p.id == piece.id)
        .ok_or_else(|| EngineError::not_found(EntityKind::Piece, &piece.id))?;
    let mut out = design.clone();
    out.pieces[index] = piece;
    Ok(out)
}

/// Remove a piece and every connection attached to it.
pub fn remove_piece_from_design(design: &Design, id: &PieceId) -> Result<Design> {
    find_piece_in_design(design, id)?;
    let mut out = design.clone();
    out.pieces.retain(|p| p.id != id.id);
    let before = out.connections.len();
    out.connections.retain(|c| !c.touches(id));
    debug!(
        piece = %id,
        cascaded = before - out.connections.len(),
        "removed piece"
    );
    Ok(out)
}

/// Add a connection between two pieces of the design.
///
/// Only the pieces are checked; a port missing from the piece's type
/// surfaces as a [`Diagnostic::DanglingConnection`](crate::Diagnostic)
/// when the design is resolved. [`add_connection_to_design_in_kit`] checks
/// the ports as well.
pub fn add_connection_to_design(design: &Design, connection: Connection) -> Result<Design> {
    let id = connection.connection_id();
    for side in [&connection.connected, &connection.connecting] {
        find_piece_in_design(design, side.anchor())?;
    }
    if connection.connected.anchor() == connection.connecting.anchor() {
        return Err(ModelError::SelfConnection(id.to_string()).into());
    }
    if design.connection(&id).is_some() {
        return Err(EngineError::already_exists(EntityKind::Connection, id));
    }
    let mut out = design.clone();
    out.connections.push(connection);
    Ok(out)
}

/// Add a connection to design `design_id` of `kit`, checking that both
/// ports exist on the types of their pieces.
pub fn add_connection_to_design_in_kit(kit: &Kit, design_id: &DesignId, connection: Connection) -> Result<Design> {
    let design = find_design_in_kit(kit, design_id)?;
    let out = add_connection_to_design(design, connection.clone())?;
    for side in [&connection.connected, &connection.connecting] {
        if resolve_side_port(kit, design, side).is_none() {
            return Err(EngineError::not_found(
                EntityKind::Port,
                format!("'{}' of piece '{}'", side.port, side.piece),
            ));
        }
    }
    Ok(out)
}

/// Replace the connection with the same identity.
pub fn set_connection_in_design(design: &Design, connection: Connection) -> Result<Design> {
    let id = connection.connection_id();
    let index = design
        .connections
        .iter()
        .position(|c| c.connection_id() == id)
        .ok_or_else(|| EngineError::not_found(EntityKind::Connection, &id))?;
    let mut out = design.clone();
    out.connections[index] = connection;
    Ok(out)
}

/// Remove a connection.
pub fn remove_connection_from_design(design: &Design, id: &ConnectionId) -> Result<Design> {
    find_connection_in_design(design, id)?;
    let mut out = design.clone();
    out.connections.retain(|c| &c.connection_id() != id);
    Ok(out)
}

/// Remove pieces and connections from a design of the kit in one step.
///
/// Removing a piece also removes every connection touching it, listed or
/// not. Every listed id must exist in the design.
pub fn remove_pieces_and_connections_from_design(
    kit: &Kit,
    design_id: &DesignId,
    piece_ids: &[PieceId],
    connection_ids: &[ConnectionId],
) -> Result<Design> {
    let design = find_design_in_kit(kit, design_id)?;
    for id in piece_ids {
        find_piece_in_design(design, id)?;
    }
    for id in connection_ids {
        find_connection_in_design(design, id)?;
    }
    let pieces: HashSet<&PieceId> = piece_ids.iter().collect();
    let connections: HashSet<&ConnectionId> = connection_ids.iter().collect();
    let mut out = design.clone();
    out.pieces.retain(|p| !pieces.contains(&p.piece_id()));
    out.connections.retain(|c| {
        !connections.contains(&c.connection_id())
            && !pieces.contains(c.connected.anchor())
            && !pieces.contains(c.connecting.anchor())
    });
    debug!(
        design = %design_id,
        pieces = piece_ids.len(),
        connections = design.connections.len() - out.connections.len(),
        "removed pieces and connections"
    );
    Ok(out)
}

/// Type of a typed piece.
pub fn find_piece_type_in_design<'a>(kit: &'a Kit, design: &Design, id: &PieceId) -> Result<&'a Type> {
    let piece = find_piece_in_design(design, id)?;
    let type_id = piece
        .type_id
        .as_ref()
        .ok_or_else(|| EngineError::not_found(EntityKind::Type, format!("type of piece '{id}'")))?;
    find_type_in_kit(kit, type_id)
}

/// Connections attached to a piece, in design order.
pub fn find_piece_connections_in_design<'a>(design: &'a Design, id: &PieceId) -> Result<Vec<&'a Connection>> {
    find_piece_in_design(design, id)?;
    Ok(design.connections_of(id).collect())
}

/// Ports of a typed piece used by its connections, sorted and unique.
pub fn find_used_ports_by_piece_in_design(design: &Design, id: &PieceId) -> Result<Vec<PortId>> {
    let used: BTreeSet<PortId> = find_piece_connections_in_design(design, id)?
        .into_iter()
        .filter_map(|c| c.sides_from(id))
        .filter(|(own, _)| own.design_piece.is_none())
        .map(|(own, _)| own.port.clone())
        .collect();
    Ok(used.into_iter().collect())
}

/// Whether `port` of piece `piece` is used by any connection.
pub fn is_port_in_use(design: &Design, piece: &PieceId, port: &PortId) -> bool {
    design.connections_of(piece).any(|c| {
        c.sides_from(piece)
            .is_some_and(|(own, _)| own.design_piece.is_none() && &own.port == port)
    })
}

/// Connections whose pieces are missing from the design.
pub fn find_stale_connections_in_design(design: &Design) -> Vec<&Connection> {
    design
        .connections
        .iter()
        .filter(|c| {
            design.piece(c.connected.anchor()).is_none() || design.piece(c.connecting.anchor()).is_none()
        })
        .collect()
}

/// Piece through which the resolver placed `id`, if any.
pub fn find_parent_piece_in_design<'a>(
    kit: &'a Kit,
    design_id: &DesignId,
    id: &PieceId,
) -> Result<Option<&'a Piece>> {
    let design = find_design_in_kit(kit, design_id)?;
    find_piece_in_design(design, id)?;
    let metadata = pieces_metadata(kit, design_id)?;
    match metadata.get(&id.id).and_then(|m| m.parent_piece_id.as_ref()) {
        Some(parent) => Ok(design.piece(parent)),
        None => Ok(None),
    }
}

/// Pieces the resolver placed through `id`, in design order.
pub fn find_children_pieces_in_design<'a>(
    kit: &'a Kit,
    design_id: &DesignId,
    id: &PieceId,
) -> Result<Vec<&'a Piece>> {
    let design = find_design_in_kit(kit, design_id)?;
    find_piece_in_design(design, id)?;
    let metadata = pieces_metadata(kit, design_id)?;
    Ok(design
        .pieces
        .iter()
        .filter(|p| {
            metadata
                .get(&p.id)
                .is_some_and(|m| m.parent_piece_id.as_ref() == Some(id))
        })
        .collect())
}

/// Pin a derived piece at its resolved plane and drop the connection
/// through which it was placed.
///
/// Fixed pieces are returned unchanged.
pub fn fix_piece_in_design(kit: &Kit, design_id: &DesignId, id: &PieceId) -> Result<Design> {
    fix_pieces_in_design(kit, design_id, std::slice::from_ref(id))
}

/// [`fix_piece_in_design`] for several pieces at once.
pub fn fix_pieces_in_design(kit: &Kit, design_id: &DesignId, ids: &[PieceId]) -> Result<Design> {
    let design = find_design_in_kit(kit, design_id)?;
    for id in ids {
        find_piece_in_design(design, id)?;
    }
    let metadata = pieces_metadata(kit, design_id)?;
    let mut out = design.clone();
    let mut dropped: HashSet<ConnectionId> = HashSet::new();
    for id in ids {
        let Some(meta) = metadata.get(&id.id) else {
            continue;
        };
        if let Some(piece) = out.pieces.iter_mut().find(|p| p.id == id.id) {
            if piece.plane.is_none() {
                piece.plane = Some(meta.plane);
            }
        }
        if let Some(connection) = &meta.parent_connection {
            dropped.insert(connection.clone());
        }
    }
    out.connections.retain(|c| !dropped.contains(&c.connection_id()));
    Ok(out)
}

/// The single variant of type `name` whose qualities include every given
/// quality.
///
/// Fails with [`EngineError::NotFound`] when no type is named `name` and
/// with [`EngineError::AmbiguousTypeIdentity`] when zero or several
/// variants match.
pub fn find_type_by_qualities<'a>(kit: &'a Kit, name: &str, qualities: &[Quality]) -> Result<&'a Type> {
    let named: Vec<&Type> = kit.types.iter().filter(|t| t.name == name).collect();
    if named.is_empty() {
        return Err(EngineError::not_found(EntityKind::Type, name));
    }
    let matches: Vec<&Type> = named
        .into_iter()
        .filter(|t| {
            qualities.iter().all(|wanted| {
                t.quality(&wanted.name).is_some_and(|have| {
                    have.value == wanted.value && (wanted.unit.is_none() || have.unit == wanted.unit)
                })
            })
        })
        .collect();
    match matches.as_slice() {
        [single] => Ok(*single),
        _ => Err(EngineError::AmbiguousTypeIdentity {
            name: name.to_string(),
            matches: matches.len(),
        }),
    }
}

/// Concatenate the pieces and connections of several designs into a new
/// design with identity `id`.
pub fn merge_designs(id: &DesignId, designs: &[Design]) -> Result<Design> {
    let mut out = Design::with_id(id);
    let mut pieces = HashSet::new();
    let mut connections = HashSet::new();
    for design in designs {
        for piece in &design.pieces {
            if !pieces.insert(piece.id.clone()) {
                return Err(EngineError::already_exists(EntityKind::Piece, &piece.id));
            }
            out.pieces.push(piece.clone());
        }
        for connection in &design.connections {
            let cid = connection.connection_id();
            if !connections.insert(cid.clone()) {
                return Err(EngineError::already_exists(EntityKind::Connection, cid));
            }
            out.connections.push(connection.clone());
        }
    }
    Ok(out)
}

/// Port a side of a connection refers to, following design-pieces into the
/// designs they stand for.
pub(crate) fn resolve_side_port<'a>(
    kit: &'a Kit,
    design: &'a Design,
    side: &Side,
) -> Option<&'a Port> {
    let piece = match &side.design_piece {
        Some(dp) => {
            let holder = design.piece(dp)?;
            kit.get_design(holder.design.as_ref()?)?.piece(&side.piece)?
        }
        None => design.piece(&side.piece)?,
    };
    kit.get_type(piece.type_id.as_ref()?)?.port(&side.port)
}
