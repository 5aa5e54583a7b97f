//! Property tests for polyline stationing and adjacency parsing.

use proptest::prelude::*;

use pipegraph_model::geometry::dist;
use pipegraph_model::{format_adjacency, parse_adjacency, AdjacencyEdge, Polyline, Vertex};

fn arb_polyline() -> impl Strategy<Value = Polyline> {
    prop::collection::vec(
        (
            -100.0f64..100.0,
            -100.0f64..100.0,
            prop_oneof![Just(0.0f64), -0.9f64..0.9],
        ),
        2..6,
    )
    .prop_map(|pts| {
        let n = pts.len();
        Polyline::new(
            pts.into_iter()
                .enumerate()
                // The last vertex's bulge is ignored; keep it zero so
                // orientation round-trips compare cleanly.
                .map(|(i, (x, y, b))| Vertex::with_bulge(x, y, if i + 1 == n { 0.0 } else { b }))
                .collect(),
        )
    })
}

proptest! {
    #[test]
    fn projection_station_stays_on_axis(
        pl in arb_polyline(),
        px in -150.0f64..150.0,
        py in -150.0f64..150.0,
    ) {
        let len = pl.length();
        let pr = pl.project([px, py]).unwrap();
        prop_assert!(pr.station >= -1e-9);
        prop_assert!(pr.station <= len + 1e-9);
        prop_assert!(pr.distance >= 0.0);
        // The reported closest point really sits at the reported station.
        let at = pl.point_at(pr.station).unwrap();
        prop_assert!(dist(at, pr.point) < 1e-6);
    }

    #[test]
    fn reverse_is_an_involution(pl in arb_polyline()) {
        let mut twice = pl.clone();
        twice.reverse();
        twice.reverse();
        prop_assert_eq!(twice.vertices.len(), pl.vertices.len());
        for (a, b) in twice.vertices.iter().zip(pl.vertices.iter()) {
            prop_assert!(dist(a.position, b.position) < 1e-12);
            prop_assert!((a.bulge - b.bulge).abs() < 1e-12);
        }
        let mut once = pl.clone();
        once.reverse();
        prop_assert!((once.length() - pl.length()).abs() < 1e-6);
    }
}

fn arb_port() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,6}"
}

proptest! {
    #[test]
    fn adjacency_round_trips(
        edges in prop::collection::vec((arb_port(), arb_port(), 0u32..10_000), 0..8)
    ) {
        let edges: Vec<AdjacencyEdge> = edges
            .into_iter()
            .map(|(own_port, other_port, other_id)| AdjacencyEdge {
                own_port,
                other_port,
                other_id,
            })
            .collect();
        let raw = format_adjacency(&edges);
        let parsed = parse_adjacency(1, &raw).unwrap();
        prop_assert_eq!(parsed, edges);
    }
}
