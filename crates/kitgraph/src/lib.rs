#![warn(missing_docs)]

//! Design-graph resolution engine for modular kits.
//!
//! Every operation is a pure function from kit and design values to new
//! values:
//!
//! - [`crud`]: lookups and immutable add/set/remove on kits and designs
//! - [`resolve`]: absolute planes from relative connections ([`flatten_design`])
//! - [`orient`]: re-rooting a design on its most connected piece
//! - [`diff`]: comparing two versions of a design and applying the result
//! - [`cluster`]: grouping pieces into design-pieces and exploding them again
//! - [`replace`]: types that can take over a piece's connections
//! - [`representation`]: choosing representation urls by tags
//!
//! Operations that can degrade gracefully return [`Resolved`], pairing the
//! best achievable value with the [`Diagnostic`]s raised on the way.
//!
//! # Example
//!
//! ```
//! use kitgraph::{flatten_design, Connection, Design, DesignId, Kit, Piece, Plane, Point, Port, Side, Type, TypeId, Vector};
//!
//! let plate = Type::builder("plate")
//!     .port(Port::new("face", Point::default(), Vector::new(0.0, 0.0, 1.0)))
//!     .port(Port::new("back", Point::default(), Vector::new(0.0, 0.0, -1.0)))
//!     .build()?;
//! let design = Design::builder("stack")
//!     .piece(Piece::of_type("a", TypeId::new("plate")).with_plane(Plane::identity()))
//!     .piece(Piece::of_type("b", TypeId::new("plate")))
//!     .connection(Connection::new(Side::new("a", "face"), Side::new("b", "back")).with_gap(10.0))
//!     .build()?;
//! let kit = Kit::builder("demo").with_type(plate).design(design).build()?;
//!
//! let flat = flatten_design(&kit, &DesignId::new("stack"))?;
//! assert!(flat.is_clean());
//! assert_eq!(flat.value.pieces[1].plane.unwrap().origin, Point::new(0.0, 0.0, 10.0));
//! # Ok::<(), kitgraph::EngineError>(())
//! ```

pub mod cluster;
pub mod crud;
pub mod diagnostic;
pub mod diff;
pub mod error;
mod graph;
pub mod orient;
pub mod replace;
pub mod representation;
pub mod resolve;
pub mod settings;

pub use cluster::{
    cluster_group, cluster_pieces_in_design, explode_design_piece, explode_design_piece_with,
    explode_design_pieces, explode_design_pieces_with, explode_piece_in_design, get_clusterable_groups,
    Clustered, Group,
};
pub use crud::{
    add_connection_to_design, add_connection_to_design_in_kit, add_design_to_kit, add_piece_to_design, add_type_to_kit,
    find_children_pieces_in_design, find_connection_in_design, find_design_in_kit,
    find_parent_piece_in_design, find_piece_connections_in_design, find_piece_in_design,
    find_piece_type_in_design, find_stale_connections_in_design, find_type_by_qualities,
    find_type_in_kit, find_used_ports_by_piece_in_design, fix_piece_in_design, fix_pieces_in_design,
    is_port_in_use, merge_designs, remove_connection_from_design, remove_design_from_kit,
    remove_piece_from_design, remove_pieces_and_connections_from_design, remove_type_from_kit,
    set_connection_in_design, set_design_in_kit, set_piece_in_design, set_type_in_kit,
};
pub use diagnostic::{Diagnostic, Resolved};
pub use diff::{
    apply_design_diff, apply_design_diff_with, diff_designs, ConnectionsDiff, DesignDiff, DiffStatus,
    PiecesDiff,
};
pub use error::{EngineError, EntityKind, Result};
pub use orient::{orient_design, orient_design_to, orient_design_to_with, orient_design_with};
pub use replace::{
    find_replacable_types_for_piece_in_design, find_replacable_types_for_pieces_in_design,
    replace_piece_type_in_design, unify_port_families,
};
pub use representation::get_piece_representation_urls;
pub use resolve::{
    connection_transform, flatten_design, flatten_design_with, matrix_to_plane, pieces_metadata,
    pieces_metadata_with, plane_to_matrix, resolve_design, PieceMetadata,
};
pub use settings::EngineSettings;

pub use kitgraph_math::{Matrix4, Tolerance, Transform};
pub use kitgraph_model::{
    find_quality, normalize_key, set_quality, Connection, ConnectionId, Coord, Design, DesignBuilder, DesignId,
    Kit, KitBuilder, ModelError, Piece, PieceId, Plane, Point, Port, PortId, Quality, Representation, Side,
    SideId, Type, TypeBuilder, TypeId, Vector,
};
