mod common;

use common::{fixture, sample_floor, Building, Floor};
use graft_core::footprint::{ENTRY_SIZE, INSTANCE_OVERHEAD};
use graft_core::{Address, Graph, IndexedScope, NodeId, Sweeper, WeakRef};

struct Site {
    graph: Graph,
    b: NodeId,
    f1: NodeId,
    f2: NodeId,
    annex: NodeId,
}

/// `b` owns two floors; the first weakly points at `annex`, which nothing
/// holds strongly.
fn site() -> Site {
    let f = fixture();
    let mut graph = Graph::new();
    let b = graph.insert_new(&f.building).unwrap();
    let annex = graph.insert(
        f.floor.clone(),
        Box::new(Floor {
            neighbor: Some(WeakRef::remote(Address::new("north", "1"))),
            ..Floor::default()
        }),
    );
    let f1 = graph.insert(
        f.floor.clone(),
        Box::new(Floor {
            building: Some(b),
            neighbor: Some(WeakRef::local(Address::new("east", "4"), annex)),
            ..Floor::default()
        }),
    );
    let f2 = graph.insert(
        f.floor.clone(),
        Box::new(Floor {
            building: Some(b),
            neighbor: Some(WeakRef::new(Address::new("west", "9"))),
            ..Floor::default()
        }),
    );
    let building = graph.get_mut::<Building>(b).unwrap();
    building.floors = Some(vec![Some(f1), None, Some(f2)]);
    building.lobby = Some(f1);
    Site {
        graph,
        b,
        f1,
        f2,
        annex,
    }
}

#[test]
fn sweep_is_breadth_first_and_cycle_safe() {
    let s = site();
    let mut sweeper = Sweeper::new(&s.graph);
    let order = sweeper.crawl(s.b).expect("sweep must succeed");
    assert_eq!(order, vec![s.b, s.f1, s.f2]);
    assert!(!sweeper.visited(s.annex));

    // A second crawl does not revisit what the first one saw.
    assert_eq!(sweeper.crawl(s.f2).unwrap(), Vec::<NodeId>::new());
    assert_eq!(sweeper.crawl(s.annex).unwrap(), vec![s.annex]);
}

#[test]
fn only_resolved_foreign_blocks_are_recorded() {
    let s = site();
    let mut sweeper = Sweeper::with_blocks(&s.graph, "main");
    sweeper.crawl(s.b).unwrap();
    let blocks = sweeper.into_blocks().expect("blocks are collected");
    assert_eq!(blocks.iter().collect::<Vec<_>>(), vec!["east"]);
    assert!(!blocks.contains("west"));

    let mut from_east = Sweeper::with_blocks(&s.graph, "east");
    from_east.crawl(s.b).unwrap();
    assert!(from_east.blocks().unwrap().is_empty());

    let mut remote = Sweeper::with_blocks(&s.graph, "main");
    remote.crawl(s.annex).unwrap();
    assert!(remote.blocks().unwrap().contains("north"));
}

#[test]
fn unresolved_weak_reference_makes_node_unresolved() {
    let s = site();
    let floor = s.graph.descriptor(s.f1).unwrap();
    assert!(floor.is_resolved(s.graph.node(s.f1).unwrap()).unwrap());
    assert!(!floor.is_resolved(s.graph.node(s.f2).unwrap()).unwrap());
    let building = s.graph.descriptor(s.b).unwrap();
    assert!(building.is_resolved(s.graph.node(s.b).unwrap()).unwrap());
}

#[test]
fn footprint_of_sample_floor() {
    let f = fixture();
    let fp = f.floor.footprint(&sample_floor()).unwrap();
    let values = 8 // x0
        + (INSTANCE_OVERHEAD + 2 * (INSTANCE_OVERHEAD + 1)) // tags
        + 4 // level
        + 1 // lit
        + (INSTANCE_OVERHEAD + 2 * 8) // heights
        + (INSTANCE_OVERHEAD + 3 * 2) // codes
        + (INSTANCE_OVERHEAD + 2) // switches
        + 8 // building
        + (INSTANCE_OVERHEAD + "north wing".len()); // notes
    assert_eq!(fp, INSTANCE_OVERHEAD + 10 * ENTRY_SIZE + values);
    assert_eq!(fp, 225);
}

#[test]
fn footprint_grows_with_content() {
    let f = fixture();
    let empty = f.floor.footprint(&Floor::default()).unwrap();
    let tagged = f
        .floor
        .footprint(&Floor {
            tags: Some(vec!["abc".into()]),
            ..Floor::default()
        })
        .unwrap();
    assert_eq!(tagged - empty, 2 * INSTANCE_OVERHEAD + 3);
}

#[test]
fn print_lists_every_field() {
    let s = site();
    let mut scope = IndexedScope::new();
    scope.insert("tower", s.b);

    let mut out = String::new();
    let floor = s.graph.descriptor(s.f1).unwrap();
    floor
        .print(s.graph.node(s.f1).unwrap(), &scope, &mut out)
        .expect("print must succeed");
    assert!(out.starts_with("Floor {\n"));
    assert!(out.contains("  (double) x0: 0\n"));
    assert!(out.contains("(string[]) tags: null"));
    assert!(out.contains("(obj<Building>) building: tower"));
    assert!(out.contains("(ref) neighbor: ref(east:4, #"));
    assert!(out.contains("(serial<notes>) notes: null"));
    assert!(out.ends_with('}'));

    let mut out = String::new();
    let f = fixture();
    let detached = Floor {
        building: Some(s.f2),
        ..sample_floor()
    };
    f.floor.print(&detached, &scope, &mut out).unwrap();
    assert!(out.contains("(double) x0: 3.5"));
    assert!(out.contains(r#"(string[]) tags: ["a", "b"]"#));
    assert!(out.contains("(obj<Building>) building: <unresolved>"));

    let mut out = String::new();
    let building = s.graph.descriptor(s.b).unwrap();
    building
        .print(s.graph.node(s.b).unwrap(), &scope, &mut out)
        .unwrap();
    assert!(out.contains("(obj[]) floors: [<unresolved>, null, <unresolved>]"));
}
