mod common;

use docsync::{bson::doc, prelude::*};
use futures::executor::block_on;
use serde::{Deserialize, Serialize};

use common::{User, builder};

fn users() -> TypedCollection<User> {
    let registry = Registry::new();
    block_on(registry.create_collection(builder("users").index("city"))).unwrap();
    block_on(registry.typed_collection::<User>()).unwrap()
}

#[derive(Serialize)]
struct AgePatch {
    age: i32,
}

#[test]
fn test_create_and_read() {
    let users = users();

    let id = block_on(users.create(&User::new("Alice", 30).in_city("Oslo"))).unwrap();
    let alice = users.read(&id).unwrap().unwrap();

    assert_eq!(alice.id, id);
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.city.as_deref(), Some("Oslo"));
    assert!(users.read("missing").unwrap().is_none());
    assert!(users.exists(&id));
}

#[test]
fn test_engine_owns_the_identifier() {
    let users = users();
    let mut forged = User::new("Mallory", 50);
    forged.id = "chosen-by-caller".to_string();

    let id = block_on(users.create(&forged)).unwrap();

    assert_eq!(id, "doc-0");
    assert!(!users.exists("chosen-by-caller"));
    assert_eq!(users.collection().read(&id).unwrap().fields(), &doc! { "name": "Mallory", "age": 50 });
}

#[test]
fn test_query_and_find_one() {
    let users = users();
    for user in [
        User::new("Alice", 30).in_city("Oslo"),
        User::new("Bob", 41).in_city("Rome"),
        User::new("Carol", 22).in_city("Oslo"),
    ] {
        block_on(users.create(&user)).unwrap();
    }

    let options = QueryOptions::builder().sort("age", SortDirection::Asc).build();
    let oslo = users.query(&Filter::eq("city", "Oslo"), &options).unwrap();
    assert_eq!(oslo.iter().map(|user| user.name.as_str()).collect::<Vec<_>>(), vec!["Carol", "Alice"]);

    let bob = users.find_one(&Filter::gt("age", 40)).unwrap().unwrap();
    assert_eq!(bob.name, "Bob");
    assert_eq!(users.count(Some(&Filter::eq("city", "Oslo"))), 2);

    let page = users.paginate(&Where::new(), &[Sort::desc("age")], PaginationParams::new(1, 2)).unwrap();
    assert_eq!(page.items.iter().map(|user| user.age).collect::<Vec<_>>(), vec![41, 30]);
    assert_eq!(page.next_page, Some(2));
}

#[test]
fn test_update_with_partial_patch() {
    let users = users();
    let id = block_on(users.create(&User::new("Alice", 30).in_city("Oslo"))).unwrap();

    let updated = block_on(users.update(&id, &AgePatch { age: 31 })).unwrap();

    assert_eq!(updated.age, 31);
    assert_eq!(updated.name, "Alice");
    assert_eq!(updated.city.as_deref(), Some("Oslo"));
}

#[test]
fn test_replace_and_remove() {
    let users = users();
    let id = block_on(users.create(&User::new("Alice", 30))).unwrap();

    let replaced = block_on(users.replace(&id, &User::new("Alicia", 31).in_city("Rome"))).unwrap();
    assert_eq!(replaced.name, "Alicia");
    assert_eq!(replaced.id, id);

    let without_city = block_on(users.replace(&id, &User::new("Alicia", 32))).unwrap();
    assert_eq!(without_city.city, None);
    assert_eq!(users.count(Some(&Filter::eq("city", "Rome"))), 0);
    assert_eq!(users.collection().read(&id).unwrap().fields(), &doc! { "name": "Alicia", "age": 32 });

    let removed = block_on(users.remove(&id)).unwrap();
    assert_eq!(removed.removed_id, id);
    assert!(users.read(&id).unwrap().is_none());
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    total: i64,
}

impl Document for Order {
    fn collection_name() -> &'static str {
        "users"
    }
}

#[test]
fn test_shape_mismatch_is_a_serialization_error() {
    let users = users();
    let id = block_on(users.create(&User::new("Alice", 30))).unwrap();

    let orders = users.with_type::<Order>();
    assert!(matches!(orders.read(&id), Err(DocumentStoreError::Serialization(_))));
    assert!(matches!(block_on(users.update(&id, &5)), Err(DocumentStoreError::Serialization(_))));
}
