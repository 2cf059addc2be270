//! Choosing a representation for each piece.

use crate::error::{EngineError, EntityKind, Result};
use kitgraph_model::{Design, Representation, Type};
use std::collections::{BTreeMap, BTreeSet};

fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count() as f64;
    let all = a.union(b).count() as f64;
    shared / all
}

fn best_match<'a>(representations: &'a [Representation], tags: &BTreeSet<&str>) -> Option<&'a Representation> {
    let mut best: Option<(&Representation, f64)> = None;
    for representation in representations {
        let own: BTreeSet<&str> = representation.tags.iter().map(String::as_str).collect();
        let score = jaccard(&own, tags);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((representation, score));
        }
    }
    best.map(|(r, _)| r)
}

/// Representation url of every typed piece of `design`, keyed by piece id.
///
/// Each piece gets the representation of its type whose tags are most
/// similar to `tags` (Jaccard index, the first one winning ties).
/// Design-pieces are skipped. A piece whose type is not among `types`, or
/// whose type has no representation, is an error.
pub fn get_piece_representation_urls(
    design: &Design,
    types: &[Type],
    tags: &[String],
) -> Result<BTreeMap<String, String>> {
    let wanted: BTreeSet<&str> = tags.iter().map(String::as_str).collect();
    let mut urls = BTreeMap::new();
    for piece in &design.pieces {
        let Some(type_id) = &piece.type_id else {
            continue;
        };
        let ty = types
            .iter()
            .find(|t| t.is(type_id))
            .ok_or_else(|| EngineError::not_found(EntityKind::Type, type_id))?;
        let representation = best_match(&ty.representations, &wanted)
            .ok_or_else(|| EngineError::not_found(EntityKind::Representation, type_id))?;
        urls.insert(piece.id.clone(), representation.url.clone());
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitgraph_model::{DesignId, Piece, TypeId};

    fn chair() -> Type {
        Type::builder("chair")
            .representation(Representation::new("chair.glb").with_tags(["3d", "detailed"]))
            .representation(Representation::new("chair-lod.glb").with_tags(["3d", "coarse"]))
            .representation(Representation::new("chair.svg").with_tags(["2d"]))
            .build()
            .unwrap()
    }

    fn room() -> Design {
        Design::builder("room")
            .piece(Piece::of_type("c1", TypeId::new("chair")))
            .piece(Piece::of_design("group", DesignId::new("corner")))
            .build()
            .unwrap()
    }

    fn pick(tags: &[&str]) -> String {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        get_piece_representation_urls(&room(), &[chair()], &tags).unwrap()["c1"].clone()
    }

    #[test]
    fn most_similar_tags_win() {
        assert_eq!(pick(&["2d"]), "chair.svg");
        assert_eq!(pick(&["3d", "coarse"]), "chair-lod.glb");
        assert_eq!(pick(&["3d"]), "chair.glb");
        assert_eq!(pick(&[]), "chair.glb");
    }

    #[test]
    fn design_pieces_are_skipped() {
        let urls = get_piece_representation_urls(&room(), &[chair()], &[]).unwrap();
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn missing_type_or_representation_fails() {
        let err = get_piece_representation_urls(&room(), &[], &[]).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: EntityKind::Type, .. }));
        let bare = Type::builder("chair").build().unwrap();
        let err = get_piece_representation_urls(&room(), &[bare], &[]).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: EntityKind::Representation, .. }));
    }
}
