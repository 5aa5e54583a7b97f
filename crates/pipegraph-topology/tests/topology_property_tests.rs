//! Property tests for connectivity symmetry and the size-array partition
//! invariant.

use proptest::prelude::*;

use pipegraph_model::{
    Document, EntityRecord, FittingInstance, FittingKind, PipeElement, PipeRun, Polyline, Port,
    PortRole, Snapshot, Tolerances,
};
use pipegraph_topology::{is_connected_to, size_array, Pipeline};

fn arb_points() -> impl Strategy<Value = Vec<[f64; 2]>> {
    prop::collection::vec((-50.0f64..50.0, -50.0f64..50.0), 2..5)
        .prop_map(|pts| pts.into_iter().map(|(x, y)| [x, y]).collect())
}

fn pipeline_from(points: Vec<[f64; 2]>, name: &str) -> Pipeline {
    Pipeline::new(name.to_string(), Vec::new(), Polyline::from_points(&points), false)
}

proptest! {
    #[test]
    fn connectivity_is_symmetric(
        a in arb_points(),
        b in arb_points(),
        eps in 0.001f64..2.0,
    ) {
        let pa = pipeline_from(a, "A");
        let pb = pipeline_from(b, "B");
        prop_assert_eq!(
            is_connected_to(&pa, &pb, eps),
            is_connected_to(&pb, &pa, eps)
        );
    }
}

/// Build a straight pipeline of `lengths.len()` runs joined by reducers,
/// every run carrying full attributes.
fn chain_document(lengths: &[f64], dns: &[f64]) -> Document {
    let mut entities = Vec::new();
    let mut x = 0.0;
    let mut next_id = 1u32;

    for (i, (&len, &dn)) in lengths.iter().zip(dns.iter()).enumerate() {
        let run_id = next_id;
        next_id += 1;
        let adjacency = if i + 1 < lengths.len() {
            format!("End:P1:{}", next_id)
        } else {
            String::new()
        };
        entities.push(EntityRecord {
            id: run_id,
            element: PipeElement::Run(PipeRun {
                curve: Polyline::from_points(&[[x, 0.0], [x + len, 0.0]]),
            }),
            attrs: [
                ("pipeline".to_string(), "L".to_string()),
                ("dn".to_string(), format!("{dn}")),
                ("system".to_string(), "Steel".to_string()),
                ("series".to_string(), "S1".to_string()),
            ]
            .into_iter()
            .collect(),
            adjacency,
        });
        x += len;

        if i + 1 < lengths.len() {
            let reducer_id = next_id;
            next_id += 1;
            entities.push(EntityRecord {
                id: reducer_id,
                element: PipeElement::Fitting(FittingInstance {
                    kind: FittingKind::Reducer,
                    ports: vec![
                        Port {
                            name: "P1".to_string(),
                            position: [x, 0.0],
                            role: PortRole::Main,
                        },
                        Port {
                            name: "P2".to_string(),
                            position: [x, 0.0],
                            role: PortRole::Main,
                        },
                    ],
                }),
                attrs: [
                    ("pipeline".to_string(), "L".to_string()),
                    ("dn".to_string(), format!("{}", dn)),
                    ("dn2".to_string(), format!("{}", dns[i + 1])),
                ]
                .into_iter()
                .collect(),
                adjacency: format!("P2:Start:{}", next_id),
            });
        }
    }

    let total = x;
    let snapshot = Snapshot {
        entities,
        reference_curves: [(
            "L".to_string(),
            Polyline::from_points(&[[0.0, 0.0], [total, 0.0]]),
        )]
        .into_iter()
        .collect(),
    };
    Document::from_snapshot(snapshot).unwrap()
}

proptest! {
    #[test]
    fn size_entries_partition_the_station_axis(
        lengths in prop::collection::vec(1.0f64..10.0, 1..6),
        dn_seed in prop::collection::vec(0usize..4, 6),
    ) {
        let dn_table = [100.0, 150.0, 200.0, 250.0];
        let dns: Vec<f64> = dn_seed
            .iter()
            .take(lengths.len())
            .map(|&i| dn_table[i])
            .collect();

        let doc = chain_document(&lengths, &dns);
        let tol = Tolerances::default();
        let pipelines = pipegraph_topology::assemble(&doc, &tol).unwrap();
        let pipeline = pipelines.iter().find(|p| p.name == "L").unwrap();

        let sizes = size_array::compute(pipeline, &doc, &tol).unwrap();
        prop_assert!(sizes.partitions(pipeline.end_station, 1e-6));

        // Every station hits exactly one entry.
        let mut station = 0.05;
        while station < pipeline.end_station {
            let covering = sizes
                .entries
                .iter()
                .filter(|e| station >= e.start_station && station < e.end_station)
                .count();
            prop_assert_eq!(covering, 1);
            station += 0.5;
        }
    }
}
