//! Absolute placement of pieces from their connections.
//!
//! Fixed pieces keep their planes. Every other piece is placed by walking
//! the connection graph breadth-first from the fixed pieces, composing the
//! parent's frame with the relative transform each connection describes.
//! Components without a fixed piece are anchored at the world XY plane on
//! their lowest piece id and reported as [`Diagnostic::PartiallyAnchored`].

use crate::cluster::explode_resolvable;
use crate::crud::find_design_in_kit;
use crate::diagnostic::{report, Diagnostic, Resolved};
use crate::error::Result;
use crate::graph::PieceGraph;
use crate::settings::EngineSettings;
use kitgraph_math::{Dir3, Matrix4, Tolerance, Transform, Vec3};
use kitgraph_model::{
    Connection, ConnectionId, Coord, Design, DesignId, Kit, Piece, PieceId, Plane, Port, Side,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

/// Placement facts derived for one piece.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceMetadata {
    /// Absolute plane.
    pub plane: Plane,
    /// Diagram position, projected from the plane when the piece has none.
    pub center: Coord,
    /// Fixed (or implicitly anchored) piece the placement started from.
    pub fixed_piece_id: PieceId,
    /// Piece through which this one was placed.
    pub parent_piece_id: Option<PieceId>,
    /// Connection through which this piece was placed.
    pub parent_connection: Option<ConnectionId>,
    /// Number of connections between this piece and its fixed piece.
    pub depth: usize,
}

/// Rigid 4x4 matrix of a plane.
///
/// The x axis is normalized, z is `x × y` and y is re-orthogonalized as
/// `z × x`. A plane with degenerate axes yields a pure translation.
pub fn plane_to_matrix(plane: &Plane) -> Matrix4<f64> {
    plane_transform(plane, &Tolerance::DEFAULT).matrix
}

/// Plane of a rigid 4x4 matrix: its translation and first two columns.
pub fn matrix_to_plane(matrix: &Matrix4<f64>) -> Plane {
    Plane::from_transform(&Transform { matrix: *matrix })
}

pub(crate) fn plane_transform(plane: &Plane, tol: &Tolerance) -> Transform {
    plane
        .to_transform(tol)
        .unwrap_or_else(|| Transform::translation_by(&plane.origin.to_point3().coords))
}

/// Transform taking the connecting piece's local frame into the connected
/// piece's local frame.
///
/// The connecting port is turned to face the connected port, then offset
/// in the connected port's frame: `gap` along its direction, `shift` along
/// its side axis and `rise` along its up axis, after `rotation` about the
/// direction, `turn` about the up axis and `tilt` about the side axis
/// (degrees). Returns `None` when a port direction has zero length.
pub fn connection_transform(
    connected: &Port,
    connecting: &Port,
    connection: &Connection,
    tol: &Tolerance,
) -> Option<Transform> {
    let d = connected.direction.to_vec3().try_normalize(tol.linear)?;
    let e = connecting.direction.to_vec3().try_normalize(tol.linear)?;
    let align = Transform::rotation_between(&(-e), &d, tol)?;

    let base = Transform::rotation_between(&Vec3::y(), &d, tol)?;
    let side = base.apply_vec(&Vec3::x());
    let up = base.apply_vec(&Vec3::z());

    let rotate = Transform::rotation_about_axis(&Dir3::new_normalize(d), -connection.rotation.to_radians());
    let turn = Transform::rotation_about_axis(
        &Dir3::new_normalize(rotate.apply_vec(&up)),
        connection.turn.to_radians(),
    );
    let tilt = Transform::rotation_about_axis(
        &Dir3::new_normalize(rotate.apply_vec(&side)),
        connection.tilt.to_radians(),
    );
    let offset = up * connection.rise + side * connection.shift + d * connection.gap;

    Some(
        Transform::translation_by(&connected.point.to_point3().coords)
            .then(&Transform::translation_by(&offset))
            .then(&tilt)
            .then(&turn)
            .then(&rotate)
            .then(&align)
            .then(&Transform::translation_by(&(-connecting.point.to_point3().coords))),
    )
}

fn side_port<'a>(kit: &'a Kit, design: &Design, side: &Side) -> std::result::Result<&'a Port, String> {
    if let Some(dp) = &side.design_piece {
        return Err(format!("design-piece '{dp}' was not expanded"));
    }
    let piece = design
        .piece(&side.piece)
        .ok_or_else(|| format!("piece '{}' not found", side.piece))?;
    let type_id = piece
        .type_id
        .as_ref()
        .ok_or_else(|| format!("piece '{}' has no type", piece.id))?;
    let ty = kit
        .get_type(type_id)
        .ok_or_else(|| format!("type {type_id} not found"))?;
    ty.port(&side.port)
        .ok_or_else(|| format!("port '{}' not found on type {type_id}", side.port))
}

fn relative_transform(
    kit: &Kit,
    design: &Design,
    connection: &Connection,
    tol: &Tolerance,
) -> std::result::Result<Transform, String> {
    if connection.connected.anchor() == connection.connecting.anchor() {
        return Err("both sides attach to the same piece".to_string());
    }
    let connected = side_port(kit, design, &connection.connected)?;
    let connecting = side_port(kit, design, &connection.connecting)?;
    connection_transform(connected, connecting, connection, tol)
        .ok_or_else(|| "port direction has zero length".to_string())
}

fn max_deviation(a: &Transform, b: &Transform) -> f64 {
    a.matrix
        .iter()
        .zip(b.matrix.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn projected_center(piece: &Piece, plane: &Plane) -> Coord {
    piece
        .center
        .unwrap_or_else(|| Coord::new(plane.origin.x, plane.origin.y))
}

/// Place every piece of a design that contains no design-pieces.
pub(crate) fn resolve_placements(
    kit: &Kit,
    design: &Design,
    settings: &EngineSettings,
) -> Resolved<BTreeMap<String, PieceMetadata>> {
    let tol = settings.tol();
    let decimals = settings.rounding_decimals;
    let slack = tol.linear + 10f64.powi(-(decimals as i32));
    let mut diagnostics = Vec::new();

    let relative: Vec<Option<Transform>> = design
        .connections
        .iter()
        .map(|connection| match relative_transform(kit, design, connection, &tol) {
            Ok(m) => Some(m),
            Err(reason) => {
                report(
                    &mut diagnostics,
                    Diagnostic::DanglingConnection {
                        connection: connection.connection_id(),
                        reason,
                    },
                );
                None
            }
        })
        .collect();

    let graph = PieceGraph::new(design, |ci, _| relative[ci].is_some());
    let pieces: HashMap<&str, &Piece> = design.pieces.iter().map(|p| (p.id.as_str(), p)).collect();
    let piece = |node: usize| pieces[graph.id(node)];

    let mut placed: Vec<Option<Transform>> = vec![None; graph.len()];
    let mut meta: Vec<Option<PieceMetadata>> = vec![None; graph.len()];
    let mut followed = vec![false; design.connections.len()];

    for component in graph.components() {
        let mut seeds: Vec<usize> = component.iter().copied().filter(|&n| piece(n).is_fixed()).collect();
        if seeds.is_empty() {
            let anchor = component[0];
            report(
                &mut diagnostics,
                Diagnostic::PartiallyAnchored {
                    anchor: PieceId::new(graph.id(anchor)),
                    pieces: component.iter().map(|&n| PieceId::new(graph.id(n))).collect(),
                },
            );
            seeds.push(anchor);
        }

        let mut queue = VecDeque::new();
        for &seed in &seeds {
            let p = piece(seed);
            let plane = p.plane.unwrap_or_else(Plane::identity);
            let transform = match plane.to_transform(&tol) {
                Some(t) => t,
                None => {
                    report(
                        &mut diagnostics,
                        Diagnostic::DegeneratePlane { piece: p.piece_id() },
                    );
                    plane_transform(&plane, &tol)
                }
            };
            placed[seed] = Some(transform);
            meta[seed] = Some(PieceMetadata {
                plane,
                center: projected_center(p, &plane),
                fixed_piece_id: p.piece_id(),
                parent_piece_id: None,
                parent_connection: None,
                depth: 0,
            });
            queue.push_back(seed);
        }

        while let Some(node) = queue.pop_front() {
            let (Some(parent), Some(parent_meta)) = (placed[node], meta[node].clone()) else {
                continue;
            };
            for &(next, ci) in graph.edges(node) {
                if followed[ci] {
                    continue;
                }
                followed[ci] = true;
                let Some(m) = relative[ci] else {
                    continue;
                };
                let connection = &design.connections[ci];
                let candidate = if connection.connected.anchor().as_str() == graph.id(node) {
                    parent.then(&m)
                } else {
                    parent.then(&m.rigid_inverse())
                };
                match placed[next] {
                    None => {
                        let plane = Plane::from_transform(&candidate).rounded(decimals);
                        let child = piece(next);
                        debug!(
                            piece = %child.id,
                            parent = %graph.id(node),
                            depth = parent_meta.depth + 1,
                            "placed piece"
                        );
                        placed[next] = Some(plane_transform(&plane, &tol));
                        meta[next] = Some(PieceMetadata {
                            plane,
                            center: projected_center(child, &plane),
                            fixed_piece_id: parent_meta.fixed_piece_id.clone(),
                            parent_piece_id: Some(PieceId::new(graph.id(node))),
                            parent_connection: Some(connection.connection_id()),
                            depth: parent_meta.depth + 1,
                        });
                        queue.push_back(next);
                    }
                    Some(committed) => {
                        let deviation = max_deviation(&committed, &candidate);
                        if deviation > slack {
                            report(
                                &mut diagnostics,
                                Diagnostic::OverconstrainedConnection {
                                    connection: connection.connection_id(),
                                    deviation,
                                },
                            );
                        }
                    }
                }
            }
        }
    }

    let value = meta
        .into_iter()
        .enumerate()
        .filter_map(|(node, m)| m.map(|m| (graph.id(node).to_string(), m)))
        .collect();
    Resolved { value, diagnostics }
}

/// Flatten a design value against the types of `kit`.
///
/// Design-pieces are exploded first, then every piece without a plane gets
/// its resolved plane and every piece without a center gets the projection
/// of its plane origin onto the diagram. Connections are kept.
pub fn resolve_design(kit: &Kit, design: &Design, settings: &EngineSettings) -> Result<Resolved<Design>> {
    settings.validate()?;
    let mut value = explode_resolvable(kit, design, settings);
    let placements = resolve_placements(kit, &value, settings);
    for piece in &mut value.pieces {
        if let Some(m) = placements.value.get(&piece.id) {
            if piece.plane.is_none() {
                piece.plane = Some(m.plane);
            }
            if piece.center.is_none() {
                piece.center = Some(m.center);
            }
        }
    }
    Ok(Resolved {
        value,
        diagnostics: placements.diagnostics,
    })
}

/// Flatten the design `id` of `kit` with default settings.
pub fn flatten_design(kit: &Kit, id: &DesignId) -> Result<Resolved<Design>> {
    flatten_design_with(kit, id, &EngineSettings::default())
}

/// Flatten the design `id` of `kit`.
///
/// Only a missing design is an error; every other problem is reported as a
/// diagnostic next to the best achievable result.
pub fn flatten_design_with(kit: &Kit, id: &DesignId, settings: &EngineSettings) -> Result<Resolved<Design>> {
    let design = find_design_in_kit(kit, id)?;
    let resolved = resolve_design(kit, design, settings)?;
    debug!(
        design = %id,
        pieces = resolved.value.pieces.len(),
        diagnostics = resolved.diagnostics.len(),
        "flattened design"
    );
    Ok(resolved)
}

/// Placement metadata for every piece of design `id`, keyed by piece id.
pub fn pieces_metadata(kit: &Kit, id: &DesignId) -> Result<BTreeMap<String, PieceMetadata>> {
    pieces_metadata_with(kit, id, &EngineSettings::default())
}

/// [`pieces_metadata`] with explicit settings.
///
/// Pieces inside design-pieces appear under their namespaced ids.
pub fn pieces_metadata_with(
    kit: &Kit,
    id: &DesignId,
    settings: &EngineSettings,
) -> Result<BTreeMap<String, PieceMetadata>> {
    settings.validate()?;
    let design = find_design_in_kit(kit, id)?;
    let exploded = explode_resolvable(kit, design, settings);
    Ok(resolve_placements(kit, &exploded, settings).value)
}
