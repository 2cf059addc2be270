//! Designs: pieces joined by connections.

use crate::error::{ModelError, Result};
use crate::geometry::{Coord, Plane};
use crate::id::{normalize_key, ConnectionId, DesignId, PieceId, PortId, SideId, TypeId};
use crate::types::{find_quality, set_quality, Quality};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// An instance of a type, or of a design when clustered.
///
/// A piece with a `plane` is fixed; otherwise its placement is derived from
/// its connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    /// Piece id, unique within its design.
    #[serde(rename = "id_")]
    pub id: String,
    /// Type this piece instantiates.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<TypeId>,
    /// Design this piece instantiates (a design-piece).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<DesignId>,
    /// Absolute placement of a fixed piece.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane: Option<Plane>,
    /// Diagram position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Coord>,
    /// Qualities of the piece.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<Quality>,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Piece {
    fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: None,
            design: None,
            plane: None,
            center: None,
            qualities: Vec::new(),
            description: None,
        }
    }

    /// A derived piece of type `type_id`.
    pub fn of_type(id: impl Into<String>, type_id: TypeId) -> Self {
        Self {
            type_id: Some(type_id),
            ..Self::bare(id)
        }
    }

    /// A design-piece standing for `design`.
    pub fn of_design(id: impl Into<String>, design: DesignId) -> Self {
        Self {
            design: Some(design),
            ..Self::bare(id)
        }
    }

    /// Fix the piece at `plane`.
    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.plane = Some(plane);
        self
    }

    /// Set the diagram position.
    pub fn with_center(mut self, center: Coord) -> Self {
        self.center = Some(center);
        self
    }

    /// Add or replace a quality.
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.qualities = set_quality(&self.qualities, quality);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The piece's identity key.
    pub fn piece_id(&self) -> PieceId {
        PieceId::new(self.id.clone())
    }

    /// Whether the piece carries an explicit plane.
    pub fn is_fixed(&self) -> bool {
        self.plane.is_some()
    }

    /// Whether the piece references a design rather than a type.
    pub fn is_design_piece(&self) -> bool {
        self.design.is_some()
    }

    /// Quality named `name`.
    pub fn quality(&self, name: &str) -> Option<&Quality> {
        find_quality(&self.qualities, name)
    }

    /// Check that exactly one of type and design is set.
    pub fn validate(&self) -> Result<()> {
        if self.type_id.is_some() == self.design.is_some() {
            return Err(ModelError::InvalidPiece(self.id.clone()));
        }
        Ok(())
    }
}

/// One endpoint of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Side {
    /// Piece owning the port.
    pub piece: PieceId,
    /// Port on the piece.
    #[serde(default)]
    pub port: PortId,
    /// Design-piece through which `piece` is reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_piece: Option<PieceId>,
}

impl Side {
    /// Port `port` of piece `piece`.
    pub fn new(piece: impl Into<PieceId>, port: impl Into<PortId>) -> Self {
        Self {
            piece: piece.into(),
            port: port.into(),
            design_piece: None,
        }
    }

    /// Address the piece through a design-piece.
    pub fn in_design_piece(mut self, design_piece: impl Into<PieceId>) -> Self {
        self.design_piece = Some(design_piece.into());
        self
    }

    /// The side's identity key.
    pub fn side_id(&self) -> SideId {
        SideId {
            piece: self.piece.clone(),
            port: self.port.clone(),
            design_piece: self.design_piece.clone(),
        }
    }

    /// The piece of the owning design this side attaches to.
    pub fn anchor(&self) -> &PieceId {
        self.design_piece.as_ref().unwrap_or(&self.piece)
    }
}

/// A joint between two pieces with relative offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Side whose port frame positions the other side.
    pub connected: Side,
    /// Side placed relative to `connected`.
    pub connecting: Side,
    /// Distance along the connected port direction.
    #[serde(default)]
    pub gap: f64,
    /// Offset along the port frame's side axis.
    #[serde(default)]
    pub shift: f64,
    /// Offset along the port frame's up axis.
    #[serde(default)]
    pub rise: f64,
    /// Rotation about the port direction, degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Rotation about the up axis, degrees.
    #[serde(default)]
    pub turn: f64,
    /// Rotation about the side axis, degrees.
    #[serde(default)]
    pub tilt: f64,
    /// Diagram x offset.
    #[serde(default)]
    pub x: f64,
    /// Diagram y offset.
    #[serde(default)]
    pub y: f64,
    /// Qualities of the connection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<Quality>,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Connection {
    /// A connection with zero offsets.
    pub fn new(connected: Side, connecting: Side) -> Self {
        Self {
            connected,
            connecting,
            gap: 0.0,
            shift: 0.0,
            rise: 0.0,
            rotation: 0.0,
            turn: 0.0,
            tilt: 0.0,
            x: 0.0,
            y: 0.0,
            qualities: Vec::new(),
            description: None,
        }
    }

    /// Set the gap.
    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    /// Set the shift.
    pub fn with_shift(mut self, shift: f64) -> Self {
        self.shift = shift;
        self
    }

    /// Set the rise.
    pub fn with_rise(mut self, rise: f64) -> Self {
        self.rise = rise;
        self
    }

    /// Set the rotation in degrees.
    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the turn in degrees.
    pub fn with_turn(mut self, turn: f64) -> Self {
        self.turn = turn;
        self
    }

    /// Set the tilt in degrees.
    pub fn with_tilt(mut self, tilt: f64) -> Self {
        self.tilt = tilt;
        self
    }

    /// Set the diagram offset.
    pub fn with_diagram_offset(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Add or replace a quality.
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.qualities = set_quality(&self.qualities, quality);
        self
    }

    /// The connection's identity key.
    pub fn connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.connected.side_id(), self.connecting.side_id())
    }

    /// Whether either side attaches to `piece` in the owning design.
    pub fn touches(&self, piece: &PieceId) -> bool {
        self.connected.anchor() == piece || self.connecting.anchor() == piece
    }

    /// `(own side, other side)` as seen from `piece`.
    pub fn sides_from(&self, piece: &PieceId) -> Option<(&Side, &Side)> {
        if self.connected.anchor() == piece {
            Some((&self.connected, &self.connecting))
        } else if self.connecting.anchor() == piece {
            Some((&self.connecting, &self.connected))
        } else {
            None
        }
    }

    /// Quality named `name`.
    pub fn quality(&self, name: &str) -> Option<&Quality> {
        find_quality(&self.qualities, name)
    }
}

/// A graph of pieces and connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    /// Design name.
    pub name: String,
    /// Variant, absent for the default variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// View, absent for the default view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    /// Pieces, unique by id.
    #[serde(default)]
    pub pieces: Vec<Piece>,
    /// Connections, unique by identity.
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Qualities of the design.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<Quality>,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Length unit of piece planes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Design {
    /// An empty design named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: None,
            view: None,
            pieces: Vec::new(),
            connections: Vec::new(),
            qualities: Vec::new(),
            description: None,
            unit: None,
        }
    }

    /// An empty design carrying `id`.
    pub fn with_id(id: &DesignId) -> Self {
        Self {
            variant: id.variant.clone(),
            view: id.view.clone(),
            ..Self::new(id.name.clone())
        }
    }

    /// Start building a design named `name`.
    pub fn builder(name: impl Into<String>) -> DesignBuilder {
        DesignBuilder {
            design: Design::new(name),
        }
    }

    /// The design's identity key.
    pub fn design_id(&self) -> DesignId {
        DesignId {
            name: self.name.clone(),
            variant: self.variant.clone(),
            view: self.view.clone(),
        }
    }

    /// Whether this design has the given identity.
    pub fn is(&self, id: &DesignId) -> bool {
        let (name, variant, view) = id.key();
        self.name == name
            && normalize_key(self.variant.as_deref()) == variant
            && normalize_key(self.view.as_deref()) == view
    }

    /// Piece with id `id`.
    pub fn piece(&self, id: &PieceId) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id == id.id)
    }

    /// Connection with identity `id`, in either direction.
    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.connection_id() == id)
    }

    /// Connections attached to `piece`, in design order.
    pub fn connections_of<'a, 'p>(
        &'a self,
        piece: &'p PieceId,
    ) -> impl Iterator<Item = &'a Connection> + 'p
    where
        'a: 'p,
    {
        self.connections.iter().filter(move |c| c.touches(piece))
    }

    /// Quality named `name`.
    pub fn quality(&self, name: &str) -> Option<&Quality> {
        find_quality(&self.qualities, name)
    }

    /// Check piece and connection identity and in-design references.
    pub fn validate(&self) -> Result<()> {
        let mut pieces = HashSet::new();
        for piece in &self.pieces {
            piece.validate()?;
            if !pieces.insert(piece.id.as_str()) {
                return Err(ModelError::DuplicatePiece(piece.id.clone()));
            }
        }
        let mut connections = HashSet::new();
        for connection in &self.connections {
            let id = connection.connection_id();
            for side in [&connection.connected, &connection.connecting] {
                if !pieces.contains(side.anchor().as_str()) {
                    return Err(ModelError::UnknownPiece {
                        connection: id.to_string(),
                        piece: side.anchor().id.clone(),
                    });
                }
            }
            if connection.connected.anchor() == connection.connecting.anchor() {
                return Err(ModelError::SelfConnection(id.to_string()));
            }
            if !connections.insert(id.clone()) {
                return Err(ModelError::DuplicateConnection(id.to_string()));
            }
        }
        Ok(())
    }

    /// Structural equality ignoring the order of pieces and connections.
    ///
    /// Connections are matched by identity and then compared by value, so
    /// a connection stored with its sides swapped is not equivalent.
    pub fn is_equivalent(&self, other: &Design) -> bool {
        if !self.is(&other.design_id())
            || self.qualities != other.qualities
            || self.description != other.description
            || self.unit != other.unit
            || self.pieces.len() != other.pieces.len()
            || self.connections.len() != other.connections.len()
        {
            return false;
        }
        let mine: BTreeMap<&str, &Piece> = self.pieces.iter().map(|p| (p.id.as_str(), p)).collect();
        let theirs: BTreeMap<&str, &Piece> = other.pieces.iter().map(|p| (p.id.as_str(), p)).collect();
        if mine != theirs {
            return false;
        }
        let theirs: HashMap<ConnectionId, &Connection> = other
            .connections
            .iter()
            .map(|c| (c.connection_id(), c))
            .collect();
        self.connections
            .iter()
            .all(|c| theirs.get(&c.connection_id()).is_some_and(|o| *o == c))
    }
}

/// Builder for [`Design`] that validates identity on [`build`](DesignBuilder::build).
#[derive(Debug, Clone)]
pub struct DesignBuilder {
    design: Design,
}

impl DesignBuilder {
    /// Set the variant.
    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        self.design.variant = if variant.is_empty() { None } else { Some(variant) };
        self
    }

    /// Set the view.
    pub fn view(mut self, view: impl Into<String>) -> Self {
        let view = view.into();
        self.design.view = if view.is_empty() { None } else { Some(view) };
        self
    }

    /// Add a piece.
    pub fn piece(mut self, piece: Piece) -> Self {
        self.design.pieces.push(piece);
        self
    }

    /// Add a connection.
    pub fn connection(mut self, connection: Connection) -> Self {
        self.design.connections.push(connection);
        self
    }

    /// Add or replace a quality.
    pub fn quality(mut self, quality: Quality) -> Self {
        self.design.qualities = set_quality(&self.design.qualities, quality);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.design.description = Some(description.into());
        self
    }

    /// Set the unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.design.unit = Some(unit.into());
        self
    }

    /// Finish the design.
    pub fn build(self) -> Result<Design> {
        self.design.validate()?;
        Ok(self.design)
    }
}
