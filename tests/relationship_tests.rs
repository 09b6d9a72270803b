mod common;

use common::{company, graph, names, person, Company, Person};
use neogm::core::store::{Direction, GraphReader};
use neogm::prelude::*;

/// Never registered: resolving a field that points here must fail.
#[derive(Debug, Default, GraphModel)]
struct Ghost {
    state: EntityState,
}

#[derive(Debug, Default, GraphModel)]
struct Haunted {
    state: EntityState,
    name: String,
    #[graph(related_to)]
    ghosts: RelatedMany<Ghost>,
}

#[derive(Debug, Default, GraphModel)]
struct Town {
    state: EntityState,
    name: String,
    #[graph(related_to(rel_type = "ROAD", direction = "both"))]
    neighbours: RelatedMany<Town>,
}

fn town(graph: &Graph, name: &str) -> Town {
    let mut t = Town::default();
    t.set_name(name.to_owned());
    t.save(graph).unwrap();
    t
}

fn town_names(towns: &Traversal<Town>) -> Vec<String> {
    towns.iter().map(|t| t.unwrap().name().unwrap()).collect()
}

#[test]
fn test_person_company_scenario() {
    let (store, graph) = graph();
    let mut alice = person(&graph, "Alice", 30);
    let bob = person(&graph, "Bob", 41);
    let acme = company(&graph, "Acme");

    alice.relate_employer(&acme).unwrap();
    bob.relate_employer(&acme).unwrap();

    // the edge is stored person -> company
    let rels = store
        .relationships(acme.node().unwrap().id(), Some("WORKS_AT"), Direction::Incoming)
        .unwrap();
    assert_eq!(rels.len(), 2);

    assert_eq!(names(&acme.employees().unwrap()), vec!["Alice", "Bob"]);
    assert_eq!(alice.employer().unwrap().unwrap().name().unwrap(), "Acme");

    // fresh handles see the same graph
    let loaded = Company::get_by_key(&graph, acme.key().unwrap().unwrap()).unwrap();
    assert_eq!(loaded.employees().unwrap().count().unwrap(), 2);

    assert!(matches!(alice.delete(), Err(GraphError::Constraint { .. })));
    alice.unrelate_employer(&acme).unwrap();
    alice.delete().unwrap();
    assert_eq!(names(&acme.employees().unwrap()), vec!["Bob"]);
}

#[test]
fn test_one_hop_keeps_duplicates_in_store_order() {
    let (_, graph) = graph();
    let alice = person(&graph, "Alice", 30);
    let bob = person(&graph, "Bob", 41);
    let carol = person(&graph, "Carol", 22);

    alice.relate_friends(&bob).unwrap();
    alice.relate_friends(&carol).unwrap();
    alice.relate_friends(&bob).unwrap();

    let friends = alice.friends().unwrap();
    assert_eq!(friends.rel_type(), "KNOWS");
    assert_eq!(names(&friends), vec!["Bob", "Carol", "Bob"]);

    assert_eq!(alice.unrelate_friends(&bob).unwrap(), 2);
    assert_eq!(names(&friends), vec!["Carol"]);
    assert!(bob.friends().unwrap().is_empty().unwrap());
}

#[test]
fn test_traversal_visits_each_reachable_node_once() {
    let (_, graph) = graph();
    let a = person(&graph, "a", 1);
    let b = person(&graph, "b", 2);
    let c = person(&graph, "c", 3);
    let d = person(&graph, "d", 4);
    let e = person(&graph, "e", 5);

    a.relate_friends(&b).unwrap();
    a.relate_friends(&c).unwrap();
    b.relate_friends(&d).unwrap();
    c.relate_friends(&d).unwrap();
    d.relate_friends(&a).unwrap();
    e.relate_friends(&a).unwrap();

    // breadth first, start excluded, cycle through d -> a ignored
    assert_eq!(names(&a.network().unwrap()), vec!["b", "c", "d"]);
    assert_eq!(names(&d.network().unwrap()), vec!["a", "b", "c"]);
    assert!(b.network().unwrap().first().unwrap().is_some());

    // one hop only sees direct friends
    assert_eq!(names(&a.friends().unwrap()), vec!["b", "c"]);
}

#[test]
fn test_traversal_is_lazy() {
    let (_, graph) = graph();
    let a = person(&graph, "a", 1);
    let b = person(&graph, "b", 2);
    let network = a.network().unwrap();
    assert!(network.is_empty().unwrap());

    a.relate_friends(&b).unwrap();
    let mut iter = network.iter();
    let c = person(&graph, "c", 3);
    b.relate_friends(&c).unwrap();
    assert_eq!(iter.next().unwrap().unwrap().name().unwrap(), "b");
    assert_eq!(iter.next().unwrap().unwrap().name().unwrap(), "c");
    assert!(iter.next().is_none());
}

#[test]
fn test_unsaved_owner_has_no_relations() {
    let (_, graph) = graph();
    let acme = company(&graph, "Acme");
    let draft = Person::default();
    assert!(draft.friends().unwrap().to_vec().unwrap().is_empty());
    assert!(draft.employer().unwrap().is_none());
    assert!(matches!(draft.relate_employer(&acme), Err(GraphError::Unsaved { .. })));
    assert!(matches!(draft.unrelate_employer(&acme), Err(GraphError::Unsaved { .. })));
}

#[test]
fn test_unregistered_related_type() {
    let (_, graph) = graph();
    graph.register::<Haunted>();
    let mut house = Haunted::default();
    house.set_name("manor".into());
    house.save(&graph).unwrap();

    let err = house.ghosts().unwrap_err();
    match err {
        GraphError::Configuration(msg) => assert!(msg.contains("Ghost"), "got: {msg}"),
        other => panic!("expected Configuration, got: {other}"),
    }
    assert_eq!(Haunted::meta().relationship("ghosts").unwrap().relationship_type("Haunted"), "HAUNTED_GHOST");
}

#[test]
fn test_relating_entities_of_different_graphs_fails() {
    let (_, first) = graph();
    let (_, second) = graph();
    let alice = person(&first, "Alice", 30);
    let acme = company(&second, "Acme");
    assert!(matches!(alice.relate_employer(&acme), Err(GraphError::Configuration(_))));
}

#[test]
fn test_both_direction_sees_edges_from_either_end() {
    let (store, graph) = graph();
    graph.register::<Town>();
    let a = town(&graph, "a");
    let b = town(&graph, "b");
    let c = town(&graph, "c");

    a.relate_neighbours(&b).unwrap();
    c.relate_neighbours(&a).unwrap();

    // stored from the relating side
    let out = store.relationships(a.node().unwrap().id(), Some("ROAD"), Direction::Outgoing).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].end, b.node().unwrap().id());

    assert_eq!(town_names(&a.neighbours().unwrap()), vec!["b", "c"]);
    assert_eq!(town_names(&b.neighbours().unwrap()), vec!["a"]);
    assert_eq!(town_names(&c.neighbours().unwrap()), vec!["a"]);

    // either end can remove the edge
    assert_eq!(b.unrelate_neighbours(&a).unwrap(), 1);
    assert_eq!(town_names(&a.neighbours().unwrap()), vec!["c"]);
    assert!(b.neighbours().unwrap().is_empty().unwrap());
}
