//! Kits: collections of types and the designs built from them.

use crate::design::Design;
use crate::error::{ModelError, Result};
use crate::id::{DesignId, TypeId};
use crate::types::{set_quality, Quality, Type};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A versioned set of types and designs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kit {
    /// Kit name.
    pub name: String,
    /// Version label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Types, unique by `(name, variant)`.
    #[serde(default)]
    pub types: Vec<Type>,
    /// Designs, unique by `(name, variant, view)`.
    #[serde(default)]
    pub designs: Vec<Design>,
    /// Qualities of the kit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualities: Vec<Quality>,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Kit {
    /// An empty kit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            types: Vec::new(),
            designs: Vec::new(),
            qualities: Vec::new(),
            description: None,
        }
    }

    /// Start building a kit.
    pub fn builder(name: impl Into<String>) -> KitBuilder {
        KitBuilder {
            kit: Kit::new(name),
        }
    }

    /// Type with identity `id`.
    pub fn get_type(&self, id: &TypeId) -> Option<&Type> {
        self.types.iter().find(|t| t.is(id))
    }

    /// Design with identity `id`.
    pub fn get_design(&self, id: &DesignId) -> Option<&Design> {
        self.designs.iter().find(|d| d.is(id))
    }

    /// Check type and design uniqueness, and each member.
    pub fn validate(&self) -> Result<()> {
        let mut types = HashSet::new();
        for ty in &self.types {
            ty.validate()?;
            if !types.insert(ty.type_id()) {
                return Err(ModelError::DuplicateType(ty.type_id().to_string()));
            }
        }
        let mut designs = HashSet::new();
        for design in &self.designs {
            design.validate()?;
            if !designs.insert(design.design_id()) {
                return Err(ModelError::DuplicateDesign(design.design_id().to_string()));
            }
        }
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ModelError::Json(e.to_string()))
    }

    /// Parse and validate a kit from JSON.
    pub fn from_json(json: &str) -> Result<Kit> {
        let kit: Kit = serde_json::from_str(json).map_err(|e| ModelError::Json(e.to_string()))?;
        kit.validate()?;
        Ok(kit)
    }
}

/// Builder for [`Kit`] that validates on [`build`](KitBuilder::build).
#[derive(Debug, Clone)]
pub struct KitBuilder {
    kit: Kit,
}

impl KitBuilder {
    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.kit.version = Some(version.into());
        self
    }

    /// Add a type.
    pub fn with_type(mut self, ty: Type) -> Self {
        self.kit.types.push(ty);
        self
    }

    /// Add a design.
    pub fn design(mut self, design: Design) -> Self {
        self.kit.designs.push(design);
        self
    }

    /// Add or replace a quality.
    pub fn quality(mut self, quality: Quality) -> Self {
        self.kit.qualities = set_quality(&self.kit.qualities, quality);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.kit.description = Some(description.into());
        self
    }

    /// Finish the kit.
    pub fn build(self) -> Result<Kit> {
        self.kit.validate()?;
        Ok(self.kit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Connection, Piece, Side};
    use crate::geometry::{Point, Vector};
    use crate::types::Port;

    fn beam(variant: &str) -> Type {
        Type::builder("beam")
            .variant(variant)
            .port(Port::new("top", Point::new(0.0, 1.0, 0.0), Vector::new(0.0, 1.0, 0.0)))
            .port(Port::new("bottom", Point::default(), Vector::new(0.0, -1.0, 0.0)))
            .build()
            .unwrap()
    }

    #[test]
    fn duplicate_type_keys_are_rejected() {
        let err = Kit::builder("k")
            .with_type(beam(""))
            .with_type(beam(""))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateType(_)));
        assert!(Kit::builder("k").with_type(beam("")).with_type(beam("long")).build().is_ok());
    }

    #[test]
    fn lookup_treats_missing_variant_as_default() {
        let kit = Kit::builder("k").with_type(beam("")).build().unwrap();
        let id = TypeId {
            name: "beam".into(),
            variant: Some(String::new()),
        };
        assert!(kit.get_type(&id).is_some());
        assert!(kit.get_type(&TypeId::new("beam").with_variant("x")).is_none());
    }

    #[test]
    fn json_round_trip() {
        let design = Design::builder("tower")
            .piece(Piece::of_type("a", TypeId::new("beam")).with_plane(Default::default()))
            .piece(Piece::of_type("b", TypeId::new("beam")))
            .connection(Connection::new(Side::new("a", "top"), Side::new("b", "bottom")).with_gap(1.0))
            .build()
            .unwrap();
        let kit = Kit::builder("k")
            .version("1.0")
            .with_type(beam(""))
            .design(design)
            .build()
            .unwrap();
        let json = kit.to_json().unwrap();
        assert!(json.contains("\"id_\": \"a\""));
        assert!(json.contains("\"type\""));
        assert_eq!(Kit::from_json(&json).unwrap(), kit);
    }

    #[test]
    fn from_json_validates() {
        let json = r#"{"name": "k", "types": [
            {"name": "t", "ports": []},
            {"name": "t", "variant": "", "ports": []}
        ]}"#;
        assert!(matches!(Kit::from_json(json), Err(ModelError::DuplicateType(_))));
        assert!(matches!(Kit::from_json("{"), Err(ModelError::Json(_))));
    }
}
