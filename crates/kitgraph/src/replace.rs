//! Which types can take over a piece without breaking its connections.
//!
//! Each port of the piece used by a connection is a role. A role must be
//! filled by a distinct port of the candidate type that is compatible with
//! every port on the other side of those connections. A candidate fits when
//! all roles can be filled at once, found by bipartite matching.

use crate::crud::{find_design_in_kit, find_piece_in_design, find_type_in_kit, resolve_side_port};
use crate::error::{EngineError, EntityKind, Result};
use crate::graph::UnionFind;
use kitgraph_model::{normalize_key, Design, DesignId, Kit, PieceId, Port, PortId, Type, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// A port of the piece in use, with the ports it is connected to.
struct Role<'a> {
    port: PortId,
    counterparts: Vec<&'a Port>,
}

fn roles<'a>(kit: &'a Kit, design: &'a Design, piece: &PieceId) -> Vec<Role<'a>> {
    let mut by_port: BTreeMap<PortId, Vec<&'a Port>> = BTreeMap::new();
    for connection in &design.connections {
        let Some((own, other)) = connection.sides_from(piece) else {
            continue;
        };
        if own.design_piece.is_some() {
            continue;
        }
        let counterparts = by_port.entry(own.port.clone()).or_default();
        if let Some(port) = resolve_side_port(kit, design, other) {
            counterparts.push(port);
        }
    }
    by_port
        .into_iter()
        .map(|(port, counterparts)| Role { port, counterparts })
        .collect()
}

/// Port index assigned to each role, if every role can be filled.
fn assign(roles: &[Role<'_>], ty: &Type) -> Option<Vec<usize>> {
    let options: Vec<Vec<usize>> = roles
        .iter()
        .map(|role| {
            let mut fits: Vec<usize> = (0..ty.ports.len())
                .filter(|&j| role.counterparts.iter().all(|c| ty.ports[j].is_compatible_with(c)))
                .collect();
            // Prefer keeping the port id.
            fits.sort_by_key(|&j| ty.ports[j].id != role.port.id);
            fits
        })
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; ty.ports.len()];
    for role in 0..roles.len() {
        let mut visited = vec![false; ty.ports.len()];
        if !augment(role, &options, &mut owner, &mut visited) {
            return None;
        }
    }
    let mut assignment = vec![0; roles.len()];
    for (port, role) in owner.iter().enumerate() {
        if let Some(role) = role {
            assignment[*role] = port;
        }
    }
    Some(assignment)
}

fn augment(role: usize, options: &[Vec<usize>], owner: &mut [Option<usize>], visited: &mut [bool]) -> bool {
    for &port in &options[role] {
        if visited[port] {
            continue;
        }
        visited[port] = true;
        let free = match owner[port] {
            None => true,
            Some(other) => augment(other, options, owner, visited),
        };
        if free {
            owner[port] = Some(role);
            return true;
        }
    }
    false
}

fn is_locked(ty: &Type, locked_variants: Option<&[String]>) -> bool {
    locked_variants.is_some_and(|locked| {
        locked
            .iter()
            .any(|v| normalize_key(Some(v.as_str())) == ty.variant_key())
    })
}

/// Types of `kit` that can replace the type of piece `piece_id`.
///
/// Types whose variant is listed in `locked_variants` are excluded. Ports
/// on the other side of a connection that cannot be resolved impose no
/// constraint. Results follow the kit's type order.
pub fn find_replacable_types_for_piece_in_design(
    kit: &Kit,
    design_id: &DesignId,
    piece_id: &PieceId,
    locked_variants: Option<&[String]>,
) -> Result<Vec<Type>> {
    let design = find_design_in_kit(kit, design_id)?;
    let piece = find_piece_in_design(design, piece_id)?;
    if piece.type_id.is_none() {
        return Err(EngineError::not_found(
            EntityKind::Type,
            format!("type of design-piece '{piece_id}'"),
        ));
    }
    let roles = roles(kit, design, piece_id);
    let found: Vec<Type> = kit
        .types
        .iter()
        .filter(|ty| !is_locked(ty, locked_variants))
        .filter(|ty| assign(&roles, ty).is_some())
        .cloned()
        .collect();
    debug!(piece = %piece_id, roles = roles.len(), candidates = found.len(), "found replacement types");
    Ok(found)
}

/// Types that can replace the types of all of `piece_ids` at once.
///
/// An empty selection has no candidates.
pub fn find_replacable_types_for_pieces_in_design(
    kit: &Kit,
    design_id: &DesignId,
    piece_ids: &[PieceId],
    locked_variants: Option<&[String]>,
) -> Result<Vec<Type>> {
    let Some((first, rest)) = piece_ids.split_first() else {
        return Ok(Vec::new());
    };
    let mut found = find_replacable_types_for_piece_in_design(kit, design_id, first, locked_variants)?;
    for id in rest {
        let other: Vec<TypeId> =
            find_replacable_types_for_piece_in_design(kit, design_id, id, locked_variants)?
                .iter()
                .map(Type::type_id)
                .collect();
        found.retain(|ty| other.iter().any(|o| ty.is(o)));
    }
    Ok(found)
}

/// Give piece `piece_id` the type `type_id`, moving each of its connections
/// to the port the matching assigns.
pub fn replace_piece_type_in_design(
    kit: &Kit,
    design_id: &DesignId,
    piece_id: &PieceId,
    type_id: &TypeId,
) -> Result<Design> {
    let design = find_design_in_kit(kit, design_id)?;
    let piece = find_piece_in_design(design, piece_id)?;
    if piece.type_id.is_none() {
        return Err(EngineError::not_found(
            EntityKind::Type,
            format!("type of design-piece '{piece_id}'"),
        ));
    }
    let ty = find_type_in_kit(kit, type_id)?;
    let roles = roles(kit, design, piece_id);
    let assignment = assign(&roles, ty).ok_or_else(|| EngineError::IncompatibleType {
        piece: piece_id.to_string(),
        type_id: type_id.to_string(),
    })?;
    let renamed: HashMap<&PortId, PortId> = roles
        .iter()
        .zip(&assignment)
        .map(|(role, &j)| (&role.port, ty.ports[j].port_id()))
        .collect();

    let mut out = design.clone();
    for p in &mut out.pieces {
        if &p.piece_id() == piece_id {
            p.type_id = Some(ty.type_id());
        }
    }
    for connection in &mut out.connections {
        for side in [&mut connection.connected, &mut connection.connecting] {
            if &side.piece == piece_id && side.design_piece.is_none() {
                if let Some(port) = renamed.get(&side.port) {
                    side.port = port.clone();
                }
            }
        }
    }
    out.validate()?;
    debug!(piece = %piece_id, to = %type_id, "replaced piece type");
    Ok(out)
}

/// Merge port families that are declared compatible.
///
/// Families linked through `compatible_families` form one group named after
/// its lexically smallest member; every port is rewritten to its group's
/// name and its compatibility list is cleared. A group containing the empty
/// family rewrites to no family.
pub fn unify_port_families(types: &[Type]) -> Vec<Type> {
    let mut families: BTreeSet<&str> = BTreeSet::new();
    for port in types.iter().flat_map(|t| &t.ports) {
        families.insert(port.family_key());
        families.extend(port.compatible_families.iter().map(|f| normalize_key(Some(f.as_str()))));
    }
    let names: Vec<&str> = families.into_iter().collect();
    let index: HashMap<&str, usize> = names.iter().enumerate().map(|(i, f)| (*f, i)).collect();
    let mut uf = UnionFind::new(names.len());
    for port in types.iter().flat_map(|t| &t.ports) {
        let own = index[port.family_key()];
        for f in &port.compatible_families {
            uf.union(own, index[normalize_key(Some(f.as_str()))]);
        }
    }
    let mut representative: HashMap<&str, &str> = HashMap::new();
    for group in uf.groups() {
        // Groups are sorted, so the first member is the smallest name.
        let name = names[group[0]];
        for i in group {
            representative.insert(names[i], name);
        }
    }

    types
        .iter()
        .map(|ty| {
            let mut ty = ty.clone();
            for port in &mut ty.ports {
                let name = representative[port.family_key()];
                port.family = (!name.is_empty()).then(|| name.to_string());
                port.compatible_families.clear();
            }
            ty
        })
        .collect()
}
