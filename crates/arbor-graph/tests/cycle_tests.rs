use arbor_graph::{AncestorSnapshot, GraphTraversal, WorkQueueTraversal};
use arbor_model::{AgencyEdge, AgencyId, AncestorProjection, DocumentId, GraphCandidate, Unit};
use arbor_test_utils::{create_unit, setup_cycle_store, setup_service, setup_store, unit_graph};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::{Duration, Instant};

#[test]
fn test_two_cycle_values() {
    let store = setup_cycle_store();
    let report = setup_service(store.clone())
        .build_graph()
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(report.units.computed, 2);

    let u1 = unit_graph(&store, "u1");
    assert_eq!(
        u1.ancestor_unit_ids,
        BTreeSet::from([DocumentId::from("u1"), DocumentId::from("u2")])
    );
    assert_eq!(
        u1.depth_by_agency,
        BTreeMap::from([(AgencyId::from("A2"), 1), (AgencyId::from("A1"), 2)])
    );
    assert_eq!(u1.max_depth, 3);
    assert_eq!(u1.min_depth, 1);
    assert_eq!(
        u1.agency_edges,
        BTreeSet::from([
            AgencyEdge::new("A1".into(), "A2".into()),
            AgencyEdge::new("A2".into(), "A1".into()),
        ])
    );
    assert_eq!(
        u1.originating_agencies,
        BTreeSet::from([AgencyId::from("A1"), AgencyId::from("A2")])
    );

    // Symmetric for the other member
    let u2 = unit_graph(&store, "u2");
    assert_eq!(
        u2.depth_by_agency,
        BTreeMap::from([(AgencyId::from("A1"), 1), (AgencyId::from("A2"), 2)])
    );
    assert_eq!(u2.max_depth, 3);
}

#[test]
fn test_descendant_of_cycle_terminates() {
    let store = setup_store(
        vec![
            create_unit("a", "A", &["c"]),
            create_unit("b", "B", &["a"]),
            create_unit("c", "C", &["b"]),
            create_unit("leaf", "L", &["a"]),
        ],
        Vec::new(),
    );
    setup_service(store.clone()).build_graph().unwrap();

    let leaf = unit_graph(&store, "leaf");
    assert_eq!(leaf.ancestor_unit_ids.len(), 3);
    assert_eq!(leaf.depth_by_agency[&AgencyId::from("A")], 1);
    assert_eq!(leaf.depth_by_agency[&AgencyId::from("C")], 2);
    assert_eq!(leaf.depth_by_agency[&AgencyId::from("B")], 3);
    // The edge b -> a closing the cycle is the deepest relation
    assert_eq!(leaf.max_depth, 5);
}

#[test]
fn test_self_reference_terminates() {
    let store = setup_store(vec![create_unit("u1", "A1", &["u1"])], Vec::new());
    setup_service(store.clone()).build_graph().unwrap();

    let u1 = unit_graph(&store, "u1");
    assert_eq!(u1.ancestor_unit_ids, BTreeSet::from([DocumentId::from("u1")]));
    assert_eq!(u1.max_depth, 2);
}

#[test]
fn test_deep_chain_does_not_exhaust_stack() {
    let len = 5_000;
    let mut snapshot = AncestorSnapshot::default();
    for i in 0..len {
        let up = if i == 0 { Vec::new() } else { vec![DocumentId::from(format!("u{}", i - 1))] };
        snapshot.insert(AncestorProjection::new(format!("u{i}"), up, Some("A".into())));
    }
    let root = GraphCandidate::new("leaf", vec![format!("u{}", len - 1).into()], Some("A".into()));

    let relations = WorkQueueTraversal.traverse(&root, &snapshot).unwrap();
    assert_eq!(relations.len(), len);
    assert_eq!(relations.iter().map(|r| r.depth).max(), Some(5_000));
}

#[test]
fn test_large_cycle_is_linear() {
    // Ring where unit i has parents i+1 and i+2
    let len = 1_000;
    let mut snapshot = AncestorSnapshot::default();
    for i in 0..len {
        snapshot.insert(AncestorProjection::new(
            format!("r{i}"),
            vec![format!("r{}", (i + 1) % len).into(), format!("r{}", (i + 2) % len).into()],
            Some(format!("A{}", i % 7).into()),
        ));
    }
    let root = GraphCandidate::new("r0", vec!["r1".into(), "r2".into()], Some("A0".into()));

    let started = Instant::now();
    let relations = WorkQueueTraversal.traverse(&root, &snapshot).unwrap();
    let elapsed = started.elapsed();

    // Every unit is expanded once and emits its two parent edges
    assert_eq!(relations.len(), 2 * len);
    // r999 is reached at depth 500
    assert_eq!(relations.iter().map(|r| r.depth).max(), Some(501));
    assert!(elapsed < Duration::from_secs(2), "traversal took {elapsed:?}");
}

#[test]
fn test_batch_under_large_cycle() {
    let len = 1_000;
    let units = (0..len)
        .map(|i| {
            let up = [format!("r{:04}", (i + 1) % len), format!("r{:04}", (i + 2) % len)];
            Unit::new(format!("r{i:04}"), format!("A{}", i % 7)).with_up(up)
        })
        .collect();
    let store = setup_store(units, Vec::new());

    let started = Instant::now();
    let report = setup_service(store.clone())
        .build_graph()
        .unwrap()
        .completed()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(30));

    assert_eq!(report.units.computed, len);
    assert!(report.units.failures.is_empty());
    let graph = unit_graph(&store, "r0000");
    assert_eq!(graph.ancestor_unit_ids.len(), len);
    assert_eq!(graph.max_depth, 502);
    assert_eq!(graph.depth_by_agency[&AgencyId::from("A1")], 1);
}

/// Random hierarchy: unit `i` has parents `up[i]` and agency `agency[i]`
#[derive(Debug, Clone)]
struct Hierarchy {
    up: Vec<Vec<usize>>,
    agency: Vec<usize>,
}

impl Hierarchy {
    fn snapshot(&self) -> AncestorSnapshot {
        let mut snapshot = AncestorSnapshot::default();
        for (i, parents) in self.up.iter().enumerate() {
            snapshot.insert(AncestorProjection::new(
                id(i),
                parents.iter().map(|p| id(*p)).collect(),
                Some(agency(self.agency[i])),
            ));
        }
        snapshot
    }

    fn candidate(&self, i: usize) -> GraphCandidate {
        GraphCandidate::new(
            id(i),
            self.up[i].iter().map(|p| id(*p)).collect(),
            Some(agency(self.agency[i])),
        )
    }

    /// Shortest hop count from `root` to every reachable ancestor
    fn distances(&self, root: usize) -> HashMap<usize, u32> {
        let mut distances = HashMap::new();
        let mut queue: VecDeque<(usize, u32)> = self.up[root].iter().map(|p| (*p, 1)).collect();
        while let Some((node, depth)) = queue.pop_front() {
            if distances.contains_key(&node) {
                continue;
            }
            distances.insert(node, depth);
            queue.extend(self.up[node].iter().map(|p| (*p, depth + 1)));
        }
        distances
    }

    fn longest_path(&self, root: usize) -> u32 {
        self.up[root]
            .iter()
            .map(|p| 1 + self.longest_path(*p))
            .max()
            .unwrap_or(0)
    }
}

fn id(i: usize) -> DocumentId {
    DocumentId::from(format!("u{i:02}"))
}

fn agency(i: usize) -> AgencyId {
    AgencyId::from(format!("A{i}"))
}

fn any_hierarchy() -> impl Strategy<Value = Hierarchy> {
    (1..12usize).prop_flat_map(|n| {
        (
            prop::collection::vec(prop::collection::vec(0..n, 0..4), n),
            prop::collection::vec(0..3usize, n),
        )
            .prop_map(|(up, agency)| Hierarchy { up, agency })
    })
}

fn acyclic_hierarchy() -> impl Strategy<Value = Hierarchy> {
    any_hierarchy().prop_map(|mut h| {
        for (i, parents) in h.up.iter_mut().enumerate() {
            parents.retain(|p| *p < i);
        }
        h
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_traversal_terminates_and_finds_every_ancestor(h in any_hierarchy()) {
        let snapshot = h.snapshot();
        for root in 0..h.up.len() {
            let relations = WorkQueueTraversal.traverse(&h.candidate(root), &snapshot).unwrap();
            let distances = h.distances(root);

            let found: BTreeSet<DocumentId> = relations.iter().map(|r| r.parent_id.clone()).collect();
            let expected: BTreeSet<DocumentId> = distances.keys().map(|n| id(*n)).collect();
            prop_assert_eq!(found, expected);

            for relation in &relations {
                prop_assert!(relation.depth as usize <= distances.len() + 1);
            }

            // Smallest relation depth per agency is the shortest hop count
            let mut shortest: BTreeMap<AgencyId, u32> = BTreeMap::new();
            for (node, depth) in &distances {
                let entry = shortest.entry(agency(h.agency[*node])).or_insert(*depth);
                *entry = (*entry).min(*depth);
            }
            let mut observed: BTreeMap<AgencyId, u32> = BTreeMap::new();
            for relation in &relations {
                let entry = observed.entry(relation.parent_agency.clone()).or_insert(relation.depth);
                *entry = (*entry).min(relation.depth);
            }
            prop_assert_eq!(observed, shortest);
        }
    }

    #[test]
    fn prop_acyclic_max_depth_is_longest_path(h in acyclic_hierarchy()) {
        let snapshot = h.snapshot();
        for root in 0..h.up.len() {
            let relations = WorkQueueTraversal.traverse(&h.candidate(root), &snapshot).unwrap();
            let deepest = relations.iter().map(|r| r.depth).max().unwrap_or(0);
            prop_assert_eq!(deepest, h.longest_path(root));
        }
    }
}
