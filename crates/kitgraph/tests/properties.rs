//! End-to-end properties of the engine on small kits.
//!
//! Each module exercises one engine through the public API only, the way an
//! editor would drive it.

#![allow(clippy::unwrap_used)]

use anyhow::Result;
use approx::assert_relative_eq;
use kitgraph::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn beam() -> Result<Type> {
    Ok(Type::builder("beam")
        .port(Port::new("top", Point::new(0.0, 1.0, 0.0), Vector::new(0.0, 1.0, 0.0)).with_family("joint"))
        .port(Port::new("bottom", Point::default(), Vector::new(0.0, -1.0, 0.0)).with_family("joint"))
        .representation(Representation::new("beam.glb").with_tags(["3d"]))
        .build()?)
}

fn stacked(a: &str, b: &str) -> Connection {
    Connection::new(Side::new(a, "top"), Side::new(b, "bottom"))
}

/// `a` fixed, then `b`, `c`, `d` stacked on top of each other.
fn tower() -> Result<Design> {
    Ok(Design::builder("tower")
        .piece(Piece::of_type("a", TypeId::new("beam")).with_plane(Plane::identity()))
        .piece(Piece::of_type("b", TypeId::new("beam")).with_center(Coord::new(0.0, 2.0)))
        .piece(Piece::of_type("c", TypeId::new("beam")).with_center(Coord::new(0.0, 4.0)))
        .piece(Piece::of_type("d", TypeId::new("beam")))
        .connection(stacked("a", "b"))
        .connection(stacked("b", "c").with_gap(0.5))
        .connection(stacked("c", "d").with_rotation(90.0))
        .build()?)
}

fn kit_with(design: Design) -> Result<Kit> {
    Ok(Kit::builder("test").with_type(beam()?).design(design).build()?)
}

fn plane_of(design: &Design, id: &str) -> Plane {
    design.piece(&id.into()).and_then(|p| p.plane).unwrap()
}

mod resolver {
    use super::*;

    #[test]
    fn gap_moves_along_the_rotated_port_normal() -> Result<()> {
        init_tracing();
        let turned = Plane::new(
            Point::new(1.0, 2.0, 3.0),
            Vector::new(0.0, 1.0, 0.0),
            Vector::new(-1.0, 0.0, 0.0),
        );
        let design = Design::builder("pair")
            .piece(Piece::of_type("a", TypeId::new("beam")).with_plane(turned))
            .piece(Piece::of_type("b", TypeId::new("beam")))
            .connection(stacked("a", "b").with_gap(10.0))
            .build()?;
        let kit = kit_with(design)?;
        let flat = flatten_design(&kit, &DesignId::new("pair"))?;
        assert!(flat.is_clean(), "{}", flat.summary());
        let b = plane_of(&flat.value, "b");
        assert_relative_eq!(b.origin.x, -10.0);
        assert_relative_eq!(b.origin.y, 2.0);
        assert_relative_eq!(b.origin.z, 3.0);
        assert_eq!(b.x_axis, Vector::new(0.0, 1.0, 0.0));
        Ok(())
    }

    #[test]
    fn piece_order_does_not_change_planes() -> Result<()> {
        let design = tower()?;
        let mut reversed = design.clone();
        reversed.pieces.reverse();
        reversed.connections.reverse();
        let first = flatten_design(&kit_with(design)?, &DesignId::new("tower"))?.value;
        let second = flatten_design(&kit_with(reversed)?, &DesignId::new("tower"))?.value;
        for piece in &first.pieces {
            let (p, q) = (piece.plane.unwrap(), plane_of(&second, &piece.id));
            for (x, y) in [
                (p.origin.x, q.origin.x),
                (p.origin.y, q.origin.y),
                (p.origin.z, q.origin.z),
                (p.x_axis.x, q.x_axis.x),
                (p.x_axis.z, q.x_axis.z),
                (p.y_axis.y, q.y_axis.y),
            ] {
                assert_eq!(x.to_bits(), y.to_bits(), "piece {}", piece.id);
            }
        }
        Ok(())
    }

    #[test]
    fn flattened_pieces_keep_existing_centers() -> Result<()> {
        let kit = kit_with(tower()?)?;
        let flat = flatten_design(&kit, &DesignId::new("tower"))?.value;
        assert_eq!(flat.piece(&"b".into()).unwrap().center, Some(Coord::new(0.0, 2.0)));
        assert_eq!(flat.piece(&"d".into()).unwrap().center, Some(Coord::new(0.0, 3.5)));
        assert_eq!(flat.connections, tower()?.connections);
        Ok(())
    }

    #[test]
    fn settings_from_toml_change_rounding() -> Result<()> {
        let settings = EngineSettings::from_toml_str("rounding_decimals = 1")?;
        let design = Design::builder("pair")
            .piece(Piece::of_type("a", TypeId::new("beam")).with_plane(Plane::identity()))
            .piece(Piece::of_type("b", TypeId::new("beam")))
            .connection(stacked("a", "b").with_gap(0.123))
            .build()?;
        let kit = kit_with(design)?;
        let flat = flatten_design_with(&kit, &DesignId::new("pair"), &settings)?;
        assert_eq!(plane_of(&flat.value, "b").origin, Point::new(0.0, 1.1, 0.0));
        Ok(())
    }
}

mod diffing {
    use super::*;

    fn edited() -> Result<Design> {
        let mut design = tower()?;
        design = remove_piece_from_design(&design, &"d".into())?;
        design = set_piece_in_design(&design, Piece::of_type("b", TypeId::new("beam")).with_center(Coord::new(9.0, 9.0)))?;
        design = add_piece_to_design(&design, Piece::of_type("e", TypeId::new("beam")))?;
        design = add_connection_to_design(&design, stacked("c", "e").with_gap(3.0))?;
        Ok(design)
    }

    #[test]
    fn applied_diff_reproduces_the_edit() -> Result<()> {
        let (base, edit) = (tower()?, edited()?);
        let diff = diff_designs(&base, &edit);
        let applied = apply_design_diff(&base, &diff, false);
        assert!(applied.is_clean(), "{}", applied.summary());
        assert!(applied.value.is_equivalent(&edit));
        assert_eq!(apply_design_diff(&applied.value, &diff, false).value, applied.value);
        Ok(())
    }

    #[test]
    fn inplace_result_is_a_superset() -> Result<()> {
        let (base, edit) = (tower()?, edited()?);
        let diff = diff_designs(&base, &edit);
        let applied = apply_design_diff(&base, &diff, false).value;
        let review = apply_design_diff(&base, &diff, true).value;
        for piece in &applied.pieces {
            assert!(review.piece(&piece.piece_id()).is_some());
        }
        for connection in &applied.connections {
            assert!(review.connection(&connection.connection_id()).is_some());
        }
        let d = review.piece(&"d".into()).unwrap();
        assert_eq!(DiffStatus::from_qualities(&d.qualities, "diff.status"), Some(DiffStatus::Removed));
        let removed = review.connection(&stacked("c", "d").connection_id()).unwrap();
        assert_eq!(
            DiffStatus::from_qualities(&removed.qualities, "diff.status"),
            Some(DiffStatus::Removed)
        );
        Ok(())
    }
}

mod clustering {
    use super::*;

    fn strip(design: &Design, prefix: &str) -> Design {
        let bare = |id: &PieceId| PieceId::new(id.as_str().strip_prefix(prefix).unwrap_or(id.as_str()));
        let mut out = design.clone();
        for piece in &mut out.pieces {
            piece.id = bare(&piece.piece_id()).id;
        }
        for connection in &mut out.connections {
            for side in [&mut connection.connected, &mut connection.connecting] {
                side.piece = bare(&side.piece);
            }
        }
        out
    }

    #[test]
    fn explode_undoes_cluster() -> Result<()> {
        init_tracing();
        let kit = kit_with(tower()?)?;
        let tower_id = DesignId::new("tower");
        let clustered = cluster_pieces_in_design(&kit, &tower_id, &["b".into(), "c".into()], &DesignId::new("mid"))?;
        let parent = find_design_in_kit(&clustered, &tower_id)?;
        assert_eq!(parent.pieces.len(), 3);
        assert!(parent.piece(&"mid".into()).is_some_and(Piece::is_design_piece));
        assert_eq!(find_design_in_kit(&clustered, &DesignId::new("mid"))?.pieces.len(), 2);

        let exploded = explode_piece_in_design(&clustered, &tower_id, &"mid".into())?;
        let restored = strip(find_design_in_kit(&exploded, &tower_id)?, "mid/");
        assert!(restored.is_equivalent(&tower()?));
        Ok(())
    }

    #[test]
    fn clustered_design_flattens_like_the_original() -> Result<()> {
        let kit = kit_with(tower()?)?;
        let tower_id = DesignId::new("tower");
        let original = flatten_design(&kit, &tower_id)?;
        let clustered = cluster_pieces_in_design(&kit, &tower_id, &["c".into(), "d".into()], &DesignId::new("top"))?;
        let flat = flatten_design(&clustered, &tower_id)?;
        assert!(flat.is_clean(), "{}", flat.summary());
        assert_eq!(plane_of(&flat.value, "top/c"), plane_of(&original.value, "c"));
        assert_eq!(plane_of(&flat.value, "top/d"), plane_of(&original.value, "d"));
        let meta = pieces_metadata(&clustered, &tower_id)?;
        assert_eq!(meta["top/d"].depth, 3);
        Ok(())
    }

    #[test]
    fn single_pieces_do_not_cluster() -> Result<()> {
        let design = tower()?;
        assert!(get_clusterable_groups(&design, &["a".into(), "c".into()]).is_empty());
        let err = cluster_group(&design, &["b".into()], &DesignId::new("x"), &"x".into()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidGroup(_)));
        Ok(())
    }
}

mod editing {
    use super::*;

    #[test]
    fn removing_pieces_cascades_to_connections() -> Result<()> {
        let kit = kit_with(tower()?)?;
        let design = remove_pieces_and_connections_from_design(&kit, &DesignId::new("tower"), &["c".into()], &[])?;
        assert_eq!(design.pieces.len(), 3);
        assert_eq!(design.connections, vec![stacked("a", "b")]);
        assert!(find_stale_connections_in_design(&design).is_empty());
        Ok(())
    }

    #[test]
    fn replacements_keep_the_design_resolvable() -> Result<()> {
        let post = Type::builder("post")
            .variant("short")
            .port(Port::new("up", Point::new(0.0, 0.5, 0.0), Vector::new(0.0, 1.0, 0.0)).with_family("joint"))
            .port(Port::new("down", Point::default(), Vector::new(0.0, -1.0, 0.0)).with_family("joint"))
            .build()?;
        let kit = add_type_to_kit(&kit_with(tower()?)?, post)?;
        let tower_id = DesignId::new("tower");
        let candidates = find_replacable_types_for_piece_in_design(&kit, &tower_id, &"b".into(), None)?;
        assert_eq!(candidates.len(), 2);
        for ty in candidates {
            let design = replace_piece_type_in_design(&kit, &tower_id, &"b".into(), &ty.type_id())?;
            let kit = set_design_in_kit(&kit, design)?;
            let flat = flatten_design(&kit, &tower_id)?;
            assert!(flat.is_clean(), "{}: {}", ty.type_id(), flat.summary());
        }
        Ok(())
    }

    #[test]
    fn kit_json_fixture_resolves() -> Result<()> {
        let json = r#"{
            "name": "fixture",
            "types": [{
                "name": "beam",
                "ports": [
                    {"id_": "top", "point": {"x": 0, "y": 1, "z": 0}, "direction": {"x": 0, "y": 1, "z": 0}},
                    {"id_": "bottom", "point": {"x": 0, "y": 0, "z": 0}, "direction": {"x": 0, "y": -1, "z": 0}}
                ]
            }],
            "designs": [{
                "name": "pair",
                "pieces": [
                    {"id_": "a", "type": {"name": "beam"},
                     "plane": {"origin": {"x": 0, "y": 0, "z": 0},
                               "xAxis": {"x": 1, "y": 0, "z": 0},
                               "yAxis": {"x": 0, "y": 1, "z": 0}}},
                    {"id_": "b", "type": {"name": "beam"}}
                ],
                "connections": [{
                    "connected": {"piece": {"id_": "a"}, "port": {"id_": "top"}},
                    "connecting": {"piece": {"id_": "b"}, "port": {"id_": "bottom"}},
                    "gap": 2
                }]
            }]
        }"#;
        let kit = Kit::from_json(json)?;
        let flat = flatten_design(&kit, &DesignId::new("pair"))?;
        assert_eq!(plane_of(&flat.value, "b").origin, Point::new(0.0, 3.0, 0.0));
        let urls = get_piece_representation_urls(&tower()?, &[beam()?], &["3d".to_string()])?;
        assert_eq!(urls.len(), 4);
        Ok(())
    }
}
