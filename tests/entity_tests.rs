mod common;

use std::sync::{Arc, Mutex};

use common::{company, graph, names, person, Company, Person};
use neogm::core::store::{
    in_transaction, Direction, FailPoint, GraphReader, GraphStore, GraphTransaction, IndexConfig,
    NodeId, Relationship, StoreError,
};
use neogm::core::{naming, BoltType, GraphConfig, IntoPropertyValue};
use neogm::prelude::*;

/// Commits one pending relationship of its own right before handing out the
/// next transaction, like a concurrent writer that wins the race.
struct InterleavingStore {
    inner: MemoryGraph,
    pending: Mutex<Option<(NodeId, NodeId, &'static str)>>,
}

impl InterleavingStore {
    fn new() -> Self {
        InterleavingStore { inner: MemoryGraph::new(), pending: Mutex::new(None) }
    }

    fn relate_on_next_begin(&self, start: NodeId, end: NodeId, rel_type: &'static str) {
        *self.pending.lock().unwrap() = Some((start, end, rel_type));
    }
}

impl GraphReader for InterleavingStore {
    fn node_exists(&self, node: NodeId) -> Result<bool, StoreError> {
        self.inner.node_exists(node)
    }

    fn property(&self, node: NodeId, key: &str) -> Result<Option<BoltType>, StoreError> {
        self.inner.property(node, key)
    }

    fn property_keys(&self, node: NodeId) -> Result<Vec<String>, StoreError> {
        self.inner.property_keys(node)
    }

    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<Vec<Relationship>, StoreError> {
        self.inner.relationships(node, rel_type, direction)
    }

    fn index_get(&self, index: &str, term: &str) -> Result<Vec<NodeId>, StoreError> {
        self.inner.index_get(index, term)
    }

    fn index_config(&self, index: &str) -> Result<Option<IndexConfig>, StoreError> {
        self.inner.index_config(index)
    }
}

impl GraphStore for InterleavingStore {
    fn root(&self) -> NodeId {
        self.inner.root()
    }

    fn begin(&self) -> Result<Box<dyn GraphTransaction + '_>, StoreError> {
        let pending = self.pending.lock().unwrap().take();
        if let Some((start, end, rel_type)) = pending {
            in_transaction(&self.inner, |tx| tx.create_relationship(start, end, rel_type))?;
        }
        self.inner.begin()
    }
}

#[test]
fn test_save_and_load_round_trip() {
    let (_, graph) = graph();
    let mut alice = Person::default();
    alice.set_name("Alice".into());
    alice.set_age(34);
    alice.set_email(Some("alice@example.com".into()));
    let key = alice.save(&graph).unwrap();

    assert!(!alice.is_dirty());
    assert_eq!(alice.key().unwrap(), Some(key));

    let loaded = Person::get_by_key(&graph, key).unwrap();
    assert_eq!(loaded.name().unwrap(), "Alice");
    assert_eq!(loaded.age().unwrap(), 34);
    assert_eq!(loaded.email().unwrap().as_deref(), Some("alice@example.com"));
    assert_eq!(loaded.node(), alice.node());
}

#[test]
fn test_keys_are_unique_and_increasing() {
    let (_, graph) = graph();
    let keys: Vec<_> = (0..3)
        .map(|i| person(&graph, &format!("p{i}"), i).key().unwrap().unwrap())
        .collect();
    assert_eq!(keys, vec![1, 2, 3]);

    // a second type counts on its own
    assert_eq!(company(&graph, "Acme").key().unwrap(), Some(1));
}

#[test]
fn test_key_counter_skips_taken_keys() {
    let (store, graph) = graph();
    person(&graph, "a", 1);
    person(&graph, "b", 2);

    // rewind the counter on the reference node
    let root = store.root();
    let reference = store
        .relationships(root, Some(&naming::reference_type("Person")), Direction::Outgoing)
        .unwrap()[0]
        .end;
    in_transaction(store.as_ref(), |tx| tx.set_property(reference, "_next_key", 1i64.into_value().unwrap()))
        .unwrap();

    let c = person(&graph, "c", 3);
    assert_eq!(c.key().unwrap(), Some(3));
}

#[test]
fn test_get_by_key_missing() {
    let (_, graph) = graph();
    let err = Person::get_by_key(&graph, 99).unwrap_err();
    match err {
        GraphError::NotFound { index, value } => {
            assert_eq!(index, "Person_key");
            assert_eq!(value, "99");
        }
        other => panic!("expected NotFound, got: {other}"),
    }
}

#[test]
fn test_update_keeps_index_consistent() {
    let (_, graph) = graph();
    let mut p = person(&graph, "Alice", 30);
    p.set_name("Alicia".into());
    assert!(p.is_dirty());
    p.save(&graph).unwrap();

    let entities = graph.entities();
    assert!(entities.find_by::<Person>("name", "Alice").unwrap().is_empty());
    let found = entities.find_by::<Person>("name", "Alicia").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].node(), p.node());
}

#[test]
fn test_null_removes_property_and_index_entry() {
    let (store, graph) = graph();
    let mut p = person(&graph, "Bob", 40);
    p.set_email(Some("bob@example.com".into()));
    p.save(&graph).unwrap();
    assert_eq!(graph.entities().find_by::<Person>("email", "bob@example.com").unwrap().len(), 1);

    p.set_email(None);
    p.save(&graph).unwrap();
    let node = p.node().unwrap().id();
    assert!(store.property(node, "email").unwrap().is_none());
    assert!(graph.entities().find_by::<Person>("email", "bob@example.com").unwrap().is_empty());
    assert_eq!(p.email().unwrap(), None);
}

#[test]
fn test_find_by_requires_an_index() {
    let (_, graph) = graph();
    let err = graph.entities().find_by::<Person>("age", 3).unwrap_err();
    assert!(matches!(err, GraphError::Configuration(_)), "got: {err}");

    let err = graph.entities().find_by::<Person>("bio", "x").unwrap_err();
    assert!(matches!(err, GraphError::Configuration(_)), "got: {err}");
}

#[test]
fn test_fulltext_search() {
    let (_, graph) = graph();
    let mut a = Person::default();
    a.set_name("a".into());
    a.set_bio("Writes Rust and plays Go".into());
    a.save(&graph).unwrap();
    let mut b = Person::default();
    b.set_name("b".into());
    b.set_bio("Plays chess".into());
    b.save(&graph).unwrap();

    let hits = graph.entities().search::<Person>("bio", "PLAYS").unwrap();
    assert_eq!(hits.len(), 2);
    let hits = graph.entities().search::<Person>("bio", "rust plays").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name().unwrap(), "a");

    let err = graph.entities().search::<Person>("name", "a").unwrap_err();
    assert!(matches!(err, GraphError::Configuration(_)), "got: {err}");
}

#[test]
fn test_setter_only_overrides_its_own_field() {
    let (_, graph) = graph();
    let key = person(&graph, "Carol", 51).key().unwrap().unwrap();

    let mut loaded = Person::get_by_key(&graph, key).unwrap();
    loaded.set_age(52);
    assert_eq!(loaded.age().unwrap(), 52);
    // not staged: still read from the node, not from the default in memory
    assert_eq!(loaded.name().unwrap(), "Carol");

    loaded.save(&graph).unwrap();
    let reloaded = Person::get_by_key(&graph, key).unwrap();
    assert_eq!(reloaded.name().unwrap(), "Carol");
    assert_eq!(reloaded.age().unwrap(), 52);
}

#[test]
fn test_failed_create_leaves_store_unchanged() {
    let (store, graph) = graph();
    person(&graph, "first", 1);
    let nodes = store.node_count().unwrap();
    let rels = store.relationship_count().unwrap();

    let mut p = Person::default();
    p.set_name("second".into());
    store.fail_next(FailPoint::IndexAdd);
    let err = p.save(&graph).unwrap_err();
    assert!(matches!(err, GraphError::Store(StoreError::Injected(FailPoint::IndexAdd))), "got: {err}");

    assert_eq!(store.node_count().unwrap(), nodes);
    assert_eq!(store.relationship_count().unwrap(), rels);
    assert!(p.node().is_none());
    assert!(p.is_dirty());

    // the same entity saves cleanly afterwards, with the next free key
    assert_eq!(p.save(&graph).unwrap(), 2);
    assert_eq!(Person::find_all(&graph).unwrap().count().unwrap(), 2);
}

#[test]
fn test_failed_update_keeps_old_value_and_index() {
    let (store, graph) = graph();
    let mut p = person(&graph, "Dora", 20);
    p.set_name("Dorothy".into());
    store.fail_next(FailPoint::SetProperty);
    assert!(p.save(&graph).is_err());

    let key = p.key().unwrap().unwrap();
    assert_eq!(Person::get_by_key(&graph, key).unwrap().name().unwrap(), "Dora");
    assert_eq!(graph.entities().find_by::<Person>("name", "Dora").unwrap().len(), 1);
    assert!(graph.entities().find_by::<Person>("name", "Dorothy").unwrap().is_empty());
    assert!(p.is_dirty());
}

#[test]
fn test_delete_refused_while_related() {
    let (store, graph) = graph();
    let mut alice = person(&graph, "Alice", 30);
    let acme = company(&graph, "Acme");
    alice.relate_employer(&acme).unwrap();
    let nodes = store.node_count().unwrap();
    let rels = store.relationship_count().unwrap();

    let err = alice.delete().unwrap_err();
    match err {
        GraphError::Constraint { node, relationships } => {
            assert_eq!(Some(node), alice.node().map(|n| n.id()));
            assert_eq!(relationships, 1);
        }
        other => panic!("expected Constraint, got: {other}"),
    }
    assert_eq!(store.node_count().unwrap(), nodes);
    assert_eq!(store.relationship_count().unwrap(), rels);
    assert_eq!(alice.name().unwrap(), "Alice");

    assert_eq!(alice.unrelate_employer(&acme).unwrap(), 1);
    let key = alice.key().unwrap().unwrap();
    alice.delete().unwrap();
    assert_eq!(store.node_count().unwrap(), nodes - 1);
    assert!(matches!(Person::get_by_key(&graph, key), Err(GraphError::NotFound { .. })));
    assert!(graph.entities().find_by::<Person>("name", "Alice").unwrap().is_empty());
}

#[test]
fn test_delete_refused_while_related_incoming() {
    let (store, graph) = graph();
    let alice = person(&graph, "Alice", 30);
    let mut acme = company(&graph, "Acme");
    alice.relate_employer(&acme).unwrap();
    let nodes = store.node_count().unwrap();

    match acme.delete().unwrap_err() {
        GraphError::Constraint { relationships, .. } => assert_eq!(relationships, 1),
        other => panic!("expected Constraint, got: {other}"),
    }
    assert_eq!(store.node_count().unwrap(), nodes);
    assert_eq!(names(&acme.employees().unwrap()), vec!["Alice"]);
    assert_eq!(acme.name().unwrap(), "Acme");
}

#[test]
fn test_delete_guard_sees_relationship_committed_before_it() {
    common::init_tracing();
    let store = Arc::new(InterleavingStore::new());
    let graph = Graph::from_arc(store.clone());
    graph.register::<Person>().register::<Company>();
    let mut alice = person(&graph, "Alice", 30);
    let acme = company(&graph, "Acme");

    let alice_id = alice.node().unwrap().id();
    store.relate_on_next_begin(alice_id, acme.node().unwrap().id(), "WORKS_AT");
    let err = alice.delete().unwrap_err();
    match err {
        GraphError::Constraint { node, relationships } => {
            assert_eq!(node, alice_id);
            assert_eq!(relationships, 1);
        }
        other => panic!("expected Constraint, got: {other}"),
    }
    assert!(store.node_exists(alice_id).unwrap());
    assert_eq!(alice.employer().unwrap().unwrap().name().unwrap(), "Acme");
}

#[test]
fn test_failed_delete_leaves_entity_attached() {
    let (store, graph) = graph();
    let mut p = person(&graph, "Dora", 20);
    let key = p.key().unwrap().unwrap();
    let nodes = store.node_count().unwrap();
    let rels = store.relationship_count().unwrap();

    store.fail_next(FailPoint::DeleteNode);
    let err = p.delete().unwrap_err();
    assert!(matches!(err, GraphError::Store(StoreError::Injected(FailPoint::DeleteNode))), "got: {err}");

    assert_eq!(store.node_count().unwrap(), nodes);
    assert_eq!(store.relationship_count().unwrap(), rels);
    assert!(p.node().is_some());
    assert_eq!(p.name().unwrap(), "Dora");
    assert_eq!(Person::get_by_key(&graph, key).unwrap().name().unwrap(), "Dora");
    assert_eq!(graph.entities().find_by::<Person>("name", "Dora").unwrap().len(), 1);
    assert_eq!(Person::find_all(&graph).unwrap().count().unwrap(), 1);

    p.delete().unwrap();
    assert!(matches!(Person::get_by_key(&graph, key), Err(GraphError::NotFound { .. })));
}

#[test]
fn test_deleted_entity_is_detached() {
    let (_, graph) = graph();
    let mut p = person(&graph, "Eve", 25);
    p.delete().unwrap();

    assert!(matches!(p.name(), Err(GraphError::Detached { .. })));
    assert!(matches!(p.key(), Err(GraphError::Detached { .. })));
    assert!(matches!(p.friends(), Err(GraphError::Detached { .. })));
    assert!(matches!(p.save(&graph), Err(GraphError::Detached { .. })));
    assert!(matches!(p.delete(), Err(GraphError::Detached { .. })));
    assert_eq!(Person::find_all(&graph).unwrap().count().unwrap(), 0);
}

#[test]
fn test_delete_unsaved() {
    let mut p = Person::default();
    assert!(matches!(p.delete(), Err(GraphError::Unsaved { .. })));
}

#[test]
fn test_find_all_is_lazy_and_restartable() {
    let (_, graph) = graph();
    assert!(Person::find_all(&graph).unwrap().is_empty().unwrap());

    person(&graph, "a", 1);
    let all = Person::find_all(&graph).unwrap();
    person(&graph, "b", 2);
    // created after the sequence, seen because iteration walks the store
    assert_eq!(names(&all), vec!["a", "b"]);
    assert_eq!(names(&all), vec!["a", "b"]);

    person(&graph, "c", 3);
    let all = Person::find_all(&graph).unwrap();
    assert_eq!(names(all.iter().take(2)), vec!["a", "b"]);
    assert_eq!(all.count().unwrap(), 3);
    assert!(Company::find_all(&graph).unwrap().to_vec().unwrap().is_empty());
}

#[test]
fn test_get_by_node_uses_discriminator() {
    let (store, graph) = graph();
    let acme = company(&graph, "Acme");
    let node = acme.node().unwrap().clone();

    let any = graph.entities().get_by_node(&node).unwrap();
    assert_eq!(any.type_name(), "Company");

    let typed: Company = graph.entities().get_by_node_as(&node).unwrap();
    assert_eq!(typed.name().unwrap(), "Acme");

    let err = graph.entities().get_by_node_as::<Person>(&node).unwrap_err();
    assert!(matches!(err, GraphError::TypeMismatch { .. }), "got: {err}");

    let root = graph.node(store.root());
    let err = graph.entities().get_by_node(&root).unwrap_err();
    assert!(matches!(err, GraphError::MissingProperty { .. }), "got: {err}");
}

#[test]
fn test_get_by_node_unknown_type() {
    let (store, graph) = graph();
    let node = in_transaction(store.as_ref(), |tx| {
        let node = tx.create_node()?;
        tx.set_property(node, "_type", "Stranger".into_value().unwrap())?;
        Ok::<_, StoreError>(node)
    })
    .unwrap();
    let err = graph.entities().get_by_node(&graph.node(node)).unwrap_err();
    assert!(matches!(err, GraphError::Configuration(_)), "got: {err}");
}

#[test]
fn test_custom_discriminator_property() {
    let store = MemoryGraph::new();
    let graph = Graph::new(store).with_config(GraphConfig::default().with_type_property("kind"));
    let acme = company(&graph, "Acme");
    let node = acme.node().unwrap();
    assert_eq!(node.get::<String>("kind").unwrap(), "Company");
    assert!(node.property("_type").unwrap().is_none());
    assert_eq!(node.type_name().unwrap().as_deref(), Some("Company"));
}

#[test]
fn test_field_colliding_with_discriminator_is_rejected() {
    let store = Arc::new(MemoryGraph::new());
    let graph = Graph::from_arc(store.clone()).with_config(GraphConfig::default().with_type_property("name"));
    let nodes = store.node_count().unwrap();

    let mut acme = Company::default();
    acme.set_name("Acme".into());
    match acme.save(&graph).unwrap_err() {
        GraphError::Configuration(msg) => assert!(msg.contains("Company::name"), "got: {msg}"),
        other => panic!("expected Configuration, got: {other}"),
    }
    assert_eq!(store.node_count().unwrap(), nodes);
    assert!(acme.node().is_none());
}

#[test]
fn test_entity_from_another_graph_is_rejected() {
    let (_, first) = graph();
    let (_, second) = graph();
    let mut p = person(&first, "Frank", 60);
    p.set_age(61);
    let err = p.save(&second).unwrap_err();
    assert!(matches!(err, GraphError::Configuration(_)), "got: {err}");
}

#[test]
fn test_purge_orphans_spares_related_instances() {
    let (store, graph) = graph();
    let mut employed = person(&graph, "employed", 1);
    let acme = company(&graph, "Acme");
    employed.relate_employer(&acme).unwrap();
    person(&graph, "idle", 2);
    let nodes = store.node_count().unwrap();

    assert_eq!(graph.entities().purge_orphans::<Person>().unwrap(), 1);
    assert_eq!(store.node_count().unwrap(), nodes - 1);
    assert_eq!(names(&Person::find_all(&graph).unwrap()), vec!["employed"]);
    assert!(graph.entities().find_by::<Person>("name", "idle").unwrap().is_empty());
    assert_eq!(employed.name().unwrap(), "employed");
}

#[test]
fn test_clean_up_removes_the_type_subgraph() {
    let (store, graph) = graph();
    person(&graph, "a", 1);
    person(&graph, "b", 2);
    company(&graph, "Acme");
    let before = store.node_count().unwrap();

    // reference node + two instances
    assert_eq!(Person::clean_up(&graph).unwrap(), 3);
    assert_eq!(store.node_count().unwrap(), before - 3);
    assert!(Person::find_all(&graph).unwrap().to_vec().unwrap().is_empty());
    assert!(graph.entities().find_by::<Person>("name", "a").unwrap().is_empty());
    assert!(matches!(Person::get_by_key(&graph, 1), Err(GraphError::NotFound { .. })));

    assert_eq!(Company::find_all(&graph).unwrap().count().unwrap(), 1);
    assert_eq!(graph.entities().find_by::<Company>("name", "Acme").unwrap().len(), 1);

    // the type starts over afterwards
    assert_eq!(person(&graph, "c", 3).key().unwrap(), Some(1));
    assert_eq!(Person::clean_up(&Graph::new(MemoryGraph::new())).unwrap(), 0);
}
