#![allow(dead_code)]

use std::sync::Arc;

use neogm::prelude::*;

#[derive(Debug, Default, GraphModel)]
pub struct Person {
    state: EntityState,
    #[graph(index)]
    name: String,
    age: i64,
    #[graph(index)]
    email: Option<String>,
    #[graph(index(kind = "fulltext"))]
    bio: String,
    #[graph(related_to(rel_type = "WORKS_AT"))]
    employer: Related<Company>,
    #[graph(related_to(rel_type = "KNOWS"))]
    friends: RelatedMany<Person>,
    #[graph(related_via(rel_type = "KNOWS"))]
    network: RelatedMany<Person>,
}

#[derive(Debug, Default, GraphModel)]
pub struct Company {
    state: EntityState,
    #[graph(index)]
    name: String,
    #[graph(related_to(rel_type = "WORKS_AT", direction = "incoming"))]
    employees: RelatedMany<Person>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A fresh graph with both models registered, plus the store handle for
/// fault injection and counting.
pub fn graph() -> (Arc<MemoryGraph>, Graph) {
    init_tracing();
    let store = Arc::new(MemoryGraph::new());
    let graph = Graph::from_arc(store.clone());
    graph.register::<Person>().register::<Company>();
    (store, graph)
}

pub fn person(graph: &Graph, name: &str, age: i64) -> Person {
    let mut p = Person::default();
    p.set_name(name.to_owned());
    p.set_age(age);
    p.save(graph).unwrap();
    p
}

pub fn company(graph: &Graph, name: &str) -> Company {
    let mut c = Company::default();
    c.set_name(name.to_owned());
    c.save(graph).unwrap();
    c
}

pub fn names(people: impl IntoIterator<Item = Result<Person, GraphError>>) -> Vec<String> {
    people.into_iter().map(|p| p.unwrap().name().unwrap()).collect()
}
