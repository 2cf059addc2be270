#![warn(missing_docs)]

//! Data model for modular kits.
//!
//! A [`Kit`] holds reusable component [`Type`]s, each with connection
//! [`Port`]s, and [`Design`]s that instantiate those types as [`Piece`]s
//! joined by [`Connection`]s. Connections carry offsets relative to the
//! connected port; absolute placement is computed by the engine.
//!
//! Every value is immutable in spirit: builders validate identity
//! invariants up front and the engine returns new values instead of
//! mutating its inputs.

mod design;
mod error;
mod geometry;
mod id;
mod kit;
mod types;

pub use design::{Connection, Design, DesignBuilder, Piece, Side};
pub use error::{ModelError, Result};
pub use geometry::{Coord, Plane, Point, Vector};
pub use id::{normalize_key, ConnectionId, DesignId, PieceId, PortId, SideId, TypeId};
pub use kit::{Kit, KitBuilder};
pub use types::{find_quality, set_quality, Port, Quality, Representation, Type, TypeBuilder};
