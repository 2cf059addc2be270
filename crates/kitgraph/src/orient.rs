//! Re-rooting a design on its most connected piece.

use crate::diagnostic::{report, Diagnostic, Resolved};
use crate::error::Result;
use crate::graph::PieceGraph;
use crate::resolve::plane_transform;
use crate::settings::EngineSettings;
use kitgraph_model::{Coord, Design, Plane};
use tracing::debug;

/// Orient `design` with default settings.
pub fn orient_design(design: &Design) -> Resolved<Design> {
    orient(design, &Plane::identity(), Coord::default(), &EngineSettings::default())
}

/// Move the most connected placed piece to the world XY plane and the
/// diagram origin.
pub fn orient_design_with(design: &Design, settings: &EngineSettings) -> Result<Resolved<Design>> {
    orient_design_to_with(design, &Plane::identity(), Coord::default(), settings)
}

/// Orient `design` so its anchor sits at `plane` and `center`.
pub fn orient_design_to(design: &Design, plane: &Plane, center: Coord) -> Resolved<Design> {
    orient(design, plane, center, &EngineSettings::default())
}

/// Orient `design` so its anchor sits at `plane` and `center`.
///
/// The anchor is the piece with a plane that has the most connections, the
/// lowest id winning ties. Every plane is moved by the rigid transform that
/// takes the anchor's plane onto `plane`; every center is shifted by the
/// offset that takes the anchor's center onto `center`. Pieces without a
/// plane or center keep them absent. A design without placed pieces is
/// returned unchanged.
pub fn orient_design_to_with(
    design: &Design,
    plane: &Plane,
    center: Coord,
    settings: &EngineSettings,
) -> Result<Resolved<Design>> {
    settings.validate()?;
    Ok(orient(design, plane, center, settings))
}

fn orient(design: &Design, plane: &Plane, center: Coord, settings: &EngineSettings) -> Resolved<Design> {
    let tol = settings.tol();
    let graph = PieceGraph::new(design, |_, _| true);
    let mut anchor = None;
    for node in 0..graph.len() {
        let Some(piece) = design.piece(&graph.id(node).into()) else {
            continue;
        };
        let Some(anchor_plane) = piece.plane else {
            continue;
        };
        if anchor.map_or(true, |(best, _, _)| graph.degree(node) > graph.degree(best)) {
            anchor = Some((node, piece, anchor_plane));
        }
    }
    let Some((_, anchor, anchor_plane)) = anchor else {
        return Resolved::clean(design.clone());
    };

    let mut diagnostics = Vec::new();
    if anchor_plane.to_transform(&tol).is_none() {
        report(
            &mut diagnostics,
            Diagnostic::DegeneratePlane {
                piece: anchor.piece_id(),
            },
        );
    }
    let world = plane_transform(plane, &tol).then(&plane_transform(&anchor_plane, &tol).rigid_inverse());
    let anchor_center = anchor
        .center
        .unwrap_or_else(|| Coord::new(anchor_plane.origin.x, anchor_plane.origin.y));
    let (dx, dy) = (center.x - anchor_center.x, center.y - anchor_center.y);
    debug!(anchor = %anchor.id, "orienting design");

    let mut value = design.clone();
    for piece in &mut value.pieces {
        if let Some(p) = &piece.plane {
            let moved = world.then(&plane_transform(p, &tol));
            piece.plane = Some(Plane::from_transform(&moved).rounded(settings.rounding_decimals));
        }
        if let Some(c) = &piece.center {
            piece.center = Some(Coord::new(c.x + dx, c.y + dy));
        }
    }
    Resolved { value, diagnostics }
}
