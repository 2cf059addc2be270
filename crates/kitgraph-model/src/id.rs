//! Identity keys for kit entities.
//!
//! Composite keys carry their optional components (`variant`, `view`) as
//! `Option<String>`. Equality, hashing and ordering all go through
//! [`normalize_key`], so an absent component and an empty one are the same
//! key everywhere.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Normalize an optional key component: absent and empty are the same key.
pub fn normalize_key(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Identifier of a [`Type`](crate::Type): `(name, variant)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeId {
    /// Type name.
    pub name: String,
    /// Variant, absent meaning the default variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl TypeId {
    /// Identifier of the default variant of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: None,
        }
    }

    /// Set the variant (an empty string is normalized to the default variant).
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = optional(&variant.into());
        self
    }

    /// Normalized `(name, variant)` key.
    pub fn key(&self) -> (&str, &str) {
        (&self.name, normalize_key(self.variant.as_deref()))
    }

    /// Normalized variant.
    pub fn variant_key(&self) -> &str {
        normalize_key(self.variant.as_deref())
    }
}

impl PartialEq for TypeId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for TypeId {}

impl Hash for TypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for TypeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant_key() {
            "" => write!(f, "{}", self.name),
            variant => write!(f, "{} ({})", self.name, variant),
        }
    }
}

/// Identifier of a [`Design`](crate::Design): `(name, variant, view)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignId {
    /// Design name.
    pub name: String,
    /// Variant, absent meaning the default variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// View, absent meaning the default view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl DesignId {
    /// Identifier of the default variant and view of `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: None,
            view: None,
        }
    }

    /// Set the variant.
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = optional(&variant.into());
        self
    }

    /// Set the view.
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = optional(&view.into());
        self
    }

    /// Normalized `(name, variant, view)` key.
    pub fn key(&self) -> (&str, &str, &str) {
        (
            &self.name,
            normalize_key(self.variant.as_deref()),
            normalize_key(self.view.as_deref()),
        )
    }
}

impl PartialEq for DesignId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DesignId {}

impl Hash for DesignId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for DesignId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DesignId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for DesignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, variant, view) = self.key();
        match (variant, view) {
            ("", "") => write!(f, "{name}"),
            (variant, "") => write!(f, "{name} ({variant})"),
            (variant, view) => write!(f, "{name} ({variant}, {view})"),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        pub struct $name {
            /// The identifier string.
            #[serde(rename = "id_", default)]
            pub id: String,
        }

        impl $name {
            /// Wrap an identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self { id: id.into() }
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.id
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self::new(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.id)
            }
        }
    };
}

string_id!(
    /// Identifier of a [`Piece`](crate::Piece), unique within its design.
    PieceId
);

string_id!(
    /// Identifier of a [`Port`](crate::Port), unique within its type.
    /// The empty id addresses the default port.
    PortId
);

/// Identity of one endpoint of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideId {
    /// Piece owning the port (inside `design_piece` when that is set).
    pub piece: PieceId,
    /// Port on the piece.
    pub port: PortId,
    /// Design-piece through which `piece` is addressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_piece: Option<PieceId>,
}

impl fmt::Display for SideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(design_piece) = &self.design_piece {
            write!(f, "{design_piece}/")?;
        }
        write!(f, "{}:{}", self.piece, self.port)
    }
}

/// Identity of a connection: the unordered pair of its side keys.
///
/// `A -> B` and `B -> A` are the same connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionId {
    /// Connected side.
    pub connected: SideId,
    /// Connecting side.
    pub connecting: SideId,
}

impl ConnectionId {
    /// Identity of the connection between two sides.
    pub fn new(connected: SideId, connecting: SideId) -> Self {
        Self {
            connected,
            connecting,
        }
    }

    /// The two sides in ascending order.
    pub fn canonical(&self) -> (&SideId, &SideId) {
        if self.connected <= self.connecting {
            (&self.connected, &self.connecting)
        } else {
            (&self.connecting, &self.connected)
        }
    }

    /// Exact match including direction.
    pub fn matches_strict(&self, other: &ConnectionId) -> bool {
        self.connected == other.connected && self.connecting == other.connecting
    }
}

impl PartialEq for ConnectionId {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for ConnectionId {}

impl Hash for ConnectionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl PartialOrd for ConnectionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ConnectionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().cmp(&other.canonical())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {}", self.connected, self.connecting)
    }
}
