#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use docsync::{bson::Bson, prelude::*};
use serde::{Deserialize, Serialize};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub age: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Document for User {
    fn collection_name() -> &'static str {
        "users"
    }
}

impl User {
    pub fn new(name: &str, age: i32) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            age,
            city: None,
        }
    }

    pub fn in_city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }
}

/// Generates `doc-0`, `doc-1`, ... so tests can predict identifiers.
pub fn sequential_ids() -> impl Fn() -> String + Send + Sync + 'static {
    let next = AtomicUsize::new(0);
    move || format!("doc-{}", next.fetch_add(1, Ordering::SeqCst))
}

/// Builder with predictable identifiers and a fixed clock.
pub fn builder(name: &str) -> CollectionBuilder {
    Collection::builder(name)
        .id_generator(sequential_ids())
        .clock(|| 1_700_000_000_000)
}

/// Returns the value of `field` for every record.
pub fn values(records: &[Record], field: &str) -> Vec<Bson> {
    records
        .iter()
        .filter_map(|record| record.get(field).map(|value| value.into_owned()))
        .collect()
}

pub fn ids(records: &[Record]) -> Vec<String> {
    records.iter().map(|record| record.id().to_string()).collect()
}

/// Collects every event delivered to a handler.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<CollectionEvent>>>,
}

impl EventLog {
    pub fn handler(&self) -> impl Fn(&CollectionEvent) + Send + Sync + 'static {
        let events = self.events.clone();
        move |event: &CollectionEvent| events.lock().unwrap().push(event.clone())
    }

    pub fn events(&self) -> Vec<CollectionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(CollectionEvent::kind).collect()
    }
}
