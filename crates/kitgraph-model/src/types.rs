//! Component types, their ports and representations.

use crate::error::{ModelError, Result};
use crate::geometry::{Point, Vector};
use crate::id::{normalize_key, PortId, TypeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named, optionally measured property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Quality {
    /// Quality name, unique within its owner.
    pub name: String,
    /// Value as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Unit of `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Link or text defining the quality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl Quality {
    /// A quality with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// First quality named `name`.
pub fn find_quality<'a>(qualities: &'a [Quality], name: &str) -> Option<&'a Quality> {
    qualities.iter().find(|q| q.name == name)
}

/// `qualities` with `quality` replacing any entry of the same name, or appended.
pub fn set_quality(qualities: &[Quality], quality: Quality) -> Vec<Quality> {
    let mut out: Vec<Quality> = Vec::with_capacity(qualities.len() + 1);
    let mut replaced = false;
    for q in qualities {
        if q.name == quality.name {
            if !replaced {
                out.push(quality.clone());
                replaced = true;
            }
        } else {
            out.push(q.clone());
        }
    }
    if !replaced {
        out.push(quality);
    }
    out
}

/// A file depicting a type, selected by tags.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Representation {
    /// Location of the file.
    pub url: String,
    /// Media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Tags used for selection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Qualities of this representation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<Quality>,
}

impl Representation {
    /// A representation at `url` with no tags.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the media type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Add tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// A connection point on a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Port id, empty for the default port.
    #[serde(rename = "id_", default)]
    pub id: String,
    /// Attachment point in the type's local frame.
    pub point: Point,
    /// Outward direction; normalized when used.
    pub direction: Vector,
    /// Parameter along the type's outline, diagram only.
    #[serde(default)]
    pub t: f64,
    /// Port family; absent means the empty family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Families this port also accepts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_families: Vec<String>,
    /// Whether a design must use this port.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mandatory: bool,
    /// Qualities of the port.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<Quality>,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Port {
    /// A port at `point` facing `direction`.
    pub fn new(id: impl Into<String>, point: Point, direction: Vector) -> Self {
        Self {
            id: id.into(),
            point,
            direction,
            t: 0.0,
            family: None,
            compatible_families: Vec::new(),
            mandatory: false,
            qualities: Vec::new(),
            description: None,
        }
    }

    /// Set the family.
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        let family = family.into();
        self.family = if family.is_empty() { None } else { Some(family) };
        self
    }

    /// Add compatible families.
    pub fn with_compatible_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compatible_families
            .extend(families.into_iter().map(Into::into));
        self
    }

    /// Mark the port as mandatory.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Set the outline parameter.
    pub fn with_t(mut self, t: f64) -> Self {
        self.t = t;
        self
    }

    /// The port's identity key.
    pub fn port_id(&self) -> PortId {
        PortId::new(self.id.clone())
    }

    /// Normalized family key.
    pub fn family_key(&self) -> &str {
        normalize_key(self.family.as_deref())
    }

    /// Whether this port may be joined to `other`.
    ///
    /// A port without a family joins any port. Otherwise families must
    /// match, or either port must list the other's family as compatible.
    pub fn is_compatible_with(&self, other: &Port) -> bool {
        let mine = self.family_key();
        let theirs = other.family_key();
        mine.is_empty()
            || theirs.is_empty()
            || mine == theirs
            || self.compatible_families.iter().any(|f| f == theirs)
            || other.compatible_families.iter().any(|f| f == mine)
    }
}

/// A reusable component kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Type {
    /// Type name.
    pub name: String,
    /// Variant, absent for the default variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Connection points, unique by id.
    #[serde(default)]
    pub ports: Vec<Port>,
    /// Files depicting the type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub representations: Vec<Representation>,
    /// Qualities of the type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<Quality>,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Length unit of port geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Type {
    /// Start building a type named `name`.
    pub fn builder(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder {
            ty: Type {
                name: name.into(),
                variant: None,
                ports: Vec::new(),
                representations: Vec::new(),
                qualities: Vec::new(),
                description: None,
                unit: None,
            },
        }
    }

    /// The type's identity key.
    pub fn type_id(&self) -> TypeId {
        TypeId {
            name: self.name.clone(),
            variant: self.variant.clone(),
        }
    }

    /// Normalized variant.
    pub fn variant_key(&self) -> &str {
        normalize_key(self.variant.as_deref())
    }

    /// Whether this type has the given identity.
    pub fn is(&self, id: &TypeId) -> bool {
        self.name == id.name && self.variant_key() == id.variant_key()
    }

    /// Look up a port. The empty id falls back to the first port when no
    /// port is literally named "".
    pub fn port(&self, id: &PortId) -> Option<&Port> {
        self.ports.iter().find(|p| p.id == id.id).or_else(|| {
            if id.id.is_empty() {
                self.ports.first()
            } else {
                None
            }
        })
    }

    /// Quality named `name`.
    pub fn quality(&self, name: &str) -> Option<&Quality> {
        find_quality(&self.qualities, name)
    }

    /// Check port id uniqueness.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for port in &self.ports {
            if !seen.insert(port.id.as_str()) {
                return Err(ModelError::DuplicatePort {
                    type_id: self.type_id().to_string(),
                    port: port.id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`Type`] that checks port uniqueness on [`build`](TypeBuilder::build).
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    ty: Type,
}

impl TypeBuilder {
    /// Set the variant.
    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        let variant = variant.into();
        self.ty.variant = if variant.is_empty() { None } else { Some(variant) };
        self
    }

    /// Add a port.
    pub fn port(mut self, port: Port) -> Self {
        self.ty.ports.push(port);
        self
    }

    /// Add a representation.
    pub fn representation(mut self, representation: Representation) -> Self {
        self.ty.representations.push(representation);
        self
    }

    /// Add or replace a quality.
    pub fn quality(mut self, quality: Quality) -> Self {
        self.ty.qualities = set_quality(&self.ty.qualities, quality);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.ty.description = Some(description.into());
        self
    }

    /// Set the unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.ty.unit = Some(unit.into());
        self
    }

    /// Finish the type.
    pub fn build(self) -> Result<Type> {
        self.ty.validate()?;
        Ok(self.ty)
    }
}
