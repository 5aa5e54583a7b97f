//! Workspace integration tests: a full reconstruction pass over a small
//! branching network (trunk + reducer + unreferenced lateral).

use std::collections::BTreeMap;

use pipegraph_model::{
    Document, EntityRecord, FittingInstance, FittingKind, PipeElement, PipeRun, Polyline, Port,
    PortRole, Snapshot, StockTable, Tolerances,
};
use pipegraph_topology::runner;

fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Trunk `T` (DN200 reduced to DN150 mid-way) with an unreferenced lateral
/// hanging off the DN150 side, authored against flow.
fn network() -> Document {
    let entities = vec![
        EntityRecord {
            id: 1,
            element: PipeElement::Run(PipeRun {
                curve: Polyline::from_points(&[[0.0, 0.0], [6.0, 0.0]]),
            }),
            attrs: attrs(&[
                ("pipeline", "T"),
                ("dn", "200"),
                ("system", "Steel"),
                ("series", "S1"),
            ]),
            adjacency: "End:P1:2".to_string(),
        },
        EntityRecord {
            id: 2,
            element: PipeElement::Fitting(FittingInstance {
                kind: FittingKind::Reducer,
                ports: vec![
                    Port {
                        name: "P1".to_string(),
                        position: [6.0, 0.0],
                        role: PortRole::Main,
                    },
                    Port {
                        name: "P2".to_string(),
                        position: [6.1, 0.0],
                        role: PortRole::Main,
                    },
                ],
            }),
            attrs: attrs(&[("pipeline", "T"), ("dn", "200"), ("dn2", "150")]),
            adjacency: "P2:Start:3".to_string(),
        },
        EntityRecord {
            id: 3,
            element: PipeElement::Run(PipeRun {
                curve: Polyline::from_points(&[[6.1, 0.0], [12.0, 0.0]]),
            }),
            attrs: attrs(&[
                ("pipeline", "T"),
                ("dn", "150"),
                ("system", "Steel"),
                ("series", "S1"),
            ]),
            adjacency: "Mid:P1:4".to_string(),
        },
        EntityRecord {
            id: 4,
            element: PipeElement::Fitting(FittingInstance {
                kind: FittingKind::Elbow,
                ports: vec![
                    Port {
                        name: "P1".to_string(),
                        position: [9.0, 0.0],
                        role: PortRole::Main,
                    },
                    Port {
                        name: "P2".to_string(),
                        position: [9.0, 0.2],
                        role: PortRole::Main,
                    },
                ],
            }),
            attrs: attrs(&[
                ("pipeline", "NA"),
                ("dn", "100"),
                ("system", "Steel"),
                ("series", "S1"),
            ]),
            adjacency: "P2:End:5".to_string(),
        },
        // Authored pointing into the trunk; normalization must flip it.
        EntityRecord {
            id: 5,
            element: PipeElement::Run(PipeRun {
                curve: Polyline::from_points(&[[9.0, 3.0], [9.0, 0.2]]),
            }),
            attrs: attrs(&[
                ("pipeline", "NA"),
                ("dn", "100"),
                ("system", "Steel"),
                ("series", "S1"),
            ]),
            adjacency: String::new(),
        },
    ];

    let snapshot = Snapshot {
        entities,
        reference_curves: [(
            "T".to_string(),
            Polyline::from_points(&[[0.0, 0.0], [12.0, 0.0]]),
        )]
        .into_iter()
        .collect(),
    };
    Document::from_snapshot(snapshot).unwrap()
}

fn stock() -> StockTable {
    let mut t = StockTable::default();
    t.insert("default", "Steel", "S1", "200", 3.0);
    t.insert("default", "Steel", "S1", "150", 2.95);
    t.insert("default", "Steel", "S1", "100", 1.4);
    t
}

#[test]
fn full_run_reconstructs_the_network() {
    let mut doc = network();
    let initial_entities = doc.len();
    let tol = Tolerances::default();

    let outcome = runner::full_run(&mut doc, &stock(), &tol).unwrap();

    // Two pipelines under one root.
    assert_eq!(outcome.report.pipelines, 2);
    assert_eq!(outcome.report.roots, 1);
    let root = outcome.forest.node(outcome.forest.roots[0]);
    assert_eq!(root.pipeline.name, "T");
    assert_eq!(root.children.len(), 1);

    // The lateral was authored against flow and got reversed.
    assert_eq!(outcome.report.reversed_runs, 1);
    assert!(outcome.report.direction_skipped.is_empty());
    assert_eq!(doc.run(5).unwrap().curve.start(), Some([9.0, 0.2]));

    // Size arrays: trunk splits at the reducer, lateral is uniform.
    let trunk_sizes = &outcome.size_arrays["T"];
    assert_eq!(trunk_sizes.len(), 2);
    assert!((trunk_sizes.entries[0].dn - 200.0).abs() < 1e-9);
    assert!((trunk_sizes.entries[1].dn - 150.0).abs() < 1e-9);
    assert!(trunk_sizes.partitions(root.pipeline.end_station, 1e-6));
    let lateral_sizes = &outcome.size_arrays["NA-1"];
    assert_eq!(lateral_sizes.len(), 1);
    assert!((lateral_sizes.entries[0].dn - 100.0).abs() < 1e-9);

    // All runs consume whole stock lengths.
    for report in &outcome.report.length {
        assert!(report.mismatches.is_empty(), "{report:?}");
    }

    // Welds were materialized into the document.
    assert!(outcome.report.welds_placed > 0);
    assert!(doc.len() > initial_entities);
    let weld_count = doc
        .ids()
        .filter(|&id| {
            matches!(
                doc.fitting(id).map(|f| &f.kind),
                Some(FittingKind::Weld)
            )
        })
        .count();
    assert_eq!(weld_count, outcome.report.welds_placed);
}

#[test]
fn snapshot_round_trips_after_a_run() {
    let mut doc = network();
    let tol = Tolerances::default();
    runner::full_run(&mut doc, &stock(), &tol).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    doc.save_atomic(&path).unwrap();

    let reloaded = Document::load(&path).unwrap();
    assert_eq!(reloaded.len(), doc.len());
    assert_eq!(
        reloaded.run(5).unwrap().curve.start(),
        doc.run(5).unwrap().curve.start()
    );
}

#[test]
fn unanchored_na_group_aborts_the_run() {
    let snapshot = Snapshot {
        entities: vec![EntityRecord {
            id: 1,
            element: PipeElement::Run(PipeRun {
                curve: Polyline::from_points(&[[0.0, 0.0], [5.0, 0.0]]),
            }),
            attrs: attrs(&[("pipeline", "NA"), ("dn", "100")]),
            adjacency: String::new(),
        }],
        reference_curves: BTreeMap::new(),
    };
    let mut doc = Document::from_snapshot(snapshot).unwrap();
    let before = doc.to_snapshot();

    let err = runner::full_run(&mut doc, &stock(), &Tolerances::default()).unwrap_err();
    assert!(err.to_string().contains("no connecting node"));
    // Fatal error: nothing was mutated.
    assert_eq!(doc.to_snapshot(), before);
}
