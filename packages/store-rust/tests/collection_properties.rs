//! End-to-end behavior of collections over the in-memory store.

use std::sync::Arc;

use serde_json::{json, Value};
use voyage_core::types::into_document;
use voyage_core::{
    Document, FieldKind, OrderBy, Schema, SchemaNode, SequenceClock, SequentialIds, Where,
};
use voyage_store::storage::{LogSink, MemoryLogSink, NullLogSink};
use voyage_store::{
    register_travel_models, BatchOperation, Collection, CollectionContext, CollectionError,
    CollectionRegistry, DocumentStore, MemoryDocumentStore, ReadOptions, Relation, StoreConfig,
};

fn doc(value: Value) -> Document {
    into_document(value).unwrap()
}

fn string_schema(field: &str) -> Schema {
    Schema::new().field(field, SchemaNode::STRING)
}

fn context(store: &Arc<MemoryDocumentStore>) -> CollectionContext {
    CollectionContext::new(
        Arc::clone(store) as Arc<dyn DocumentStore>,
        Arc::new(NullLogSink),
    )
    .with_ids(Arc::new(SequentialIds::new("rec")))
    .with_clock(Arc::new(SequenceClock::default()))
}

fn id_of(record: &Document) -> String {
    record["id"].as_str().unwrap().to_string()
}

async fn create_id(collection: &Collection, data: Value) -> String {
    id_of(&collection.create(doc(data)).await.unwrap())
}

#[tokio::test]
async fn healing_twice_writes_nothing_the_second_time() {
    let store = Arc::new(MemoryDocumentStore::new());
    let user = doc(json!({ "name": "Sari" }));
    store.set("users", "u1", user).await.unwrap();
    let booking = doc(json!({ "user_id": "u1", "number_of_seats": 2 }));
    store.set("bookings", "b1", booking).await.unwrap();

    let first = register_travel_models(&CollectionRegistry::new(context(&store)))
        .await
        .unwrap();
    let healed = store.get("users", "u1").await.unwrap().unwrap();
    assert_eq!(healed["email"], "");
    assert_eq!(healed["id"], "u1");
    assert_eq!(healed["name"], "Sari");

    let commits = store.stats().commits;
    let second = register_travel_models(&CollectionRegistry::new(context(&store)))
        .await
        .unwrap();
    assert_eq!(store.stats().commits, commits);

    for collection in second.all() {
        assert_eq!(
            collection.heal().await.unwrap().healed,
            0,
            "{}",
            collection.name()
        );
    }
    assert_eq!(store.stats().commits, commits);
    drop(first);
}

#[tokio::test]
async fn create_echoes_extra_fields_but_stores_only_declared_ones() {
    let store = Arc::new(MemoryDocumentStore::new());
    let fleets = Collection::new(
        "fleets",
        Schema::new()
            .field("name", SchemaNode::STRING)
            .field("capacity", SchemaNode::NUMBER),
        context(&store),
    );

    let created = fleets
        .create(doc(json!({
            "name": "Bus 1",
            "capacity": 40,
            "color": "blue"
        })))
        .await
        .unwrap();
    assert_eq!(created["color"], "blue");

    let found = fleets
        .search("id", "==", json!(id_of(&created)))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(!found[0].contains_key("color"));
    for field in ["id", "name", "capacity", "created_at", "updated_at"] {
        assert_eq!(found[0][field], created[field], "{field}");
    }
}

#[tokio::test]
async fn update_with_undeclared_field_leaves_record_untouched() {
    let store = Arc::new(MemoryDocumentStore::new());
    let fleets = Collection::new("fleets", string_schema("name"), context(&store));
    let id = create_id(&fleets, json!({ "name": "Van" })).await;
    let before = store.get("fleets", &id).await.unwrap();

    let err = fleets
        .update(&id, doc(json!({ "name": "Minibus", "wheels": 6 })))
        .await
        .unwrap_err();
    let CollectionError::UndeclaredField { field } = err else {
        panic!("expected an undeclared field error");
    };
    assert_eq!(field, "wheels");
    assert_eq!(store.get("fleets", &id).await.unwrap(), before);
}

async fn owner_with_two_dependents(
    null_on_delete: bool,
) -> (Arc<MemoryDocumentStore>, String, [String; 2]) {
    let store = Arc::new(MemoryDocumentStore::new());
    let config = StoreConfig {
        heal_on_open: false,
        ..Default::default()
    };
    let registry = CollectionRegistry::new(context(&store).with_config(config));
    let packages = registry
        .open("packages", string_schema("name"))
        .await
        .unwrap();
    let schedules = registry
        .open("package_schedules", string_schema("package_id"))
        .await
        .unwrap();
    let relation = Relation::one_to_many("package_schedules", "package_id");
    let relation = if null_on_delete {
        relation.nulling_on_delete()
    } else {
        relation
    };
    packages.set_relation("package_schedules", relation);

    let package = create_id(&packages, json!({ "name": "Bali" })).await;
    let a = create_id(&schedules, json!({ "package_id": package })).await;
    let b = create_id(&schedules, json!({ "package_id": package })).await;

    packages.delete_with_relation(&package).await.unwrap();
    drop(registry);
    (store, package, [a, b])
}

#[tokio::test]
async fn on_delete_null_detaches_dependents() {
    let (store, package, dependents) = owner_with_two_dependents(true).await;
    assert!(store.get("packages", &package).await.unwrap().is_none());
    for id in dependents {
        let kept = store.get("package_schedules", &id).await.unwrap().unwrap();
        assert_eq!(kept["package_id"], Value::Null);
    }
}

#[tokio::test]
async fn one_to_many_without_null_cascades() {
    let (store, package, dependents) = owner_with_two_dependents(false).await;
    assert!(store.get("packages", &package).await.unwrap().is_none());
    for id in dependents {
        assert!(store.get("package_schedules", &id).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn many_to_many_cascades_through_array_keys() {
    let store = Arc::new(MemoryDocumentStore::new());
    let registry = CollectionRegistry::new(context(&store));
    let destinations = registry
        .open("destinations", string_schema("name"))
        .await
        .unwrap();
    let kind = SchemaNode::array_of(FieldKind::String);
    let tours = registry
        .open("tours", Schema::new().field("destination_ids", kind))
        .await
        .unwrap();
    destinations.set_relation("tours", Relation::many_to_many("tours", "destination_ids"));

    let bali = create_id(&destinations, json!({ "name": "Bali" })).await;
    let lombok = create_id(&destinations, json!({ "name": "Lombok" })).await;
    let both = create_id(&tours, json!({ "destination_ids": [bali, lombok] })).await;
    let only_lombok = create_id(&tours, json!({ "destination_ids": [lombok] })).await;

    destinations.delete_with_relation(&bali).await.unwrap();

    assert!(store.get("tours", &both).await.unwrap().is_none());
    assert!(store.get("tours", &only_lombok).await.unwrap().is_some());
    assert!(store.get("destinations", &lombok).await.unwrap().is_some());
}

#[tokio::test]
async fn cyclic_relations_terminate_with_visited_guard() {
    let store = Arc::new(MemoryDocumentStore::new());
    let user = doc(json!({ "id": "u1", "booking_id": "b1" }));
    store.set("users", "u1", user).await.unwrap();
    let booking = doc(json!({ "id": "b1", "user_id": "u1" }));
    store.set("bookings", "b1", booking).await.unwrap();

    let logs = Arc::new(MemoryLogSink::new());
    let sink = Arc::clone(&logs) as Arc<dyn LogSink>;
    let registry = CollectionRegistry::new(context(&store).with_log_sink(sink));
    let users = registry
        .open("users", string_schema("booking_id"))
        .await
        .unwrap();
    let bookings = registry
        .open("bookings", string_schema("user_id"))
        .await
        .unwrap();
    users.set_relation("bookings", Relation::one_to_many("bookings", "user_id"));
    bookings.set_relation(
        "owner",
        Relation::one_to_one("users", "id").with_local_key("user_id"),
    );

    let owned = users.get_related("u1", "bookings").await.unwrap();
    assert_eq!(owned.into_vec().len(), 1);
    let owner = bookings.get_related("b1", "owner").await.unwrap();
    assert_eq!(
        owner.into_vec()[0]["id"],
        "u1",
        "relation graph loops back to u1"
    );

    users.delete_with_relation("u1").await.unwrap();

    assert_eq!(store.partition_len("users"), 0);
    assert_eq!(store.partition_len("bookings"), 0);
    let deletions: Vec<String> = logs
        .messages()
        .into_iter()
        .filter(|message| message.starts_with("Deleted"))
        .collect();
    assert_eq!(
        deletions,
        [
            "Deleted data with ID: b1 with relations",
            "Deleted data with ID: u1 with relations",
        ],
        "u1 is deleted once even though b1 leads back to it"
    );
}

#[tokio::test]
async fn search_wheres_orders_by_creation_time_both_ways() {
    let store = Arc::new(MemoryDocumentStore::new());
    for (id, created) in [
        ("b", "2024-02-01"),
        ("c", "2024-03-01"),
        ("a", "2024-01-01"),
    ] {
        let invoice = doc(json!({
            "id": id,
            "status": "unpaid",
            "created_at": created,
            "updated_at": created
        }));
        store.set("invoices", id, invoice).await.unwrap();
    }
    let invoices = Collection::new("invoices", string_schema("status"), context(&store));
    let unpaid = [Where::parse("status", "==", json!("unpaid")).unwrap()];

    let ids = |docs: Vec<Document>| docs.iter().map(id_of).collect::<Vec<_>>();
    let ascending = invoices.search_wheres(&unpaid, None).await.unwrap();
    assert_eq!(ids(ascending), ["a", "b", "c"]);
    let descending = invoices
        .search_wheres(&unpaid, Some(&OrderBy::desc("created_at")))
        .await
        .unwrap();
    assert_eq!(ids(descending), ["c", "b", "a"]);
}

#[tokio::test]
async fn paginated_read_strips_excluded_fields() {
    let store = Arc::new(MemoryDocumentStore::new());
    let users = Collection::new(
        "users",
        Schema::new()
            .field("name", SchemaNode::STRING)
            .field("secret", SchemaNode::STRING),
        context(&store),
    );
    for n in 0..5 {
        users
            .create(doc(json!({
                "name": format!("user {n}"),
                "secret": "hunter2"
            })))
            .await
            .unwrap();
    }
    let all = users.read().await.unwrap();

    let page = users
        .read_with_options_and_fields(&ReadOptions::new(Some(1), Some(2)).without(["secret"]))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["id"], all[1]["id"]);
    assert_eq!(page[1]["id"], all[2]["id"]);
    assert!(page.iter().all(|record| !record.contains_key("secret")));
}

#[tokio::test]
async fn cache_serves_stale_reads_until_a_collection_write() {
    let store = Arc::new(MemoryDocumentStore::new());
    let fleets = Collection::new("fleets", string_schema("name"), context(&store));
    fleets.create(doc(json!({ "name": "Bus 1" }))).await.unwrap();
    assert_eq!(fleets.read().await.unwrap().len(), 1);

    let ferry = doc(json!({ "name": "Ferry" }));
    store.set("fleets", "outside", ferry).await.unwrap();
    assert_eq!(fleets.read().await.unwrap().len(), 1);

    fleets.create(doc(json!({ "name": "Bus 2" }))).await.unwrap();
    let names: Vec<Value> = fleets
        .read()
        .await
        .unwrap()
        .into_iter()
        .map(|record| record["name"].clone())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&json!("Ferry")));
}

#[tokio::test]
async fn unknown_operators_and_missing_fields_are_rejected() {
    let store = Arc::new(MemoryDocumentStore::new());
    let fleets = Collection::new("fleets", string_schema("name"), context(&store));
    fleets.create(doc(json!({ "name": "Bus 1" }))).await.unwrap();

    let err = fleets.search("name", "~=", json!("Bus")).await.unwrap_err();
    let CollectionError::UnsupportedOperator { operator } = err else {
        panic!("expected an unsupported operator error");
    };
    assert_eq!(operator, "~=");

    let err = fleets.search("capacity", ">", json!(10)).await.unwrap_err();
    let CollectionError::MissingField { field } = err else {
        panic!("expected a missing field error");
    };
    assert_eq!(field, "capacity");
}

/// Loads the cache, then writes a record behind the collection's back.
async fn stale_fleets(store: &Arc<MemoryDocumentStore>) -> (Collection, Vec<String>) {
    let fleets = Collection::new("fleets", string_schema("name"), context(store));
    let mut ids = Vec::new();
    for name in ["Bus 1", "Bus 2"] {
        ids.push(create_id(&fleets, json!({ "name": name })).await);
    }
    assert_eq!(fleets.read().await.unwrap().len(), 2);
    let ferry = doc(json!({ "id": "outside", "name": "Ferry" }));
    store.set("fleets", "outside", ferry).await.unwrap();
    assert_eq!(fleets.read().await.unwrap().len(), 2);
    (fleets, ids)
}

fn has_outside(records: &[Document]) -> bool {
    records.iter().any(|record| record["id"] == "outside")
}

#[tokio::test]
async fn update_drops_the_cache() {
    let store = Arc::new(MemoryDocumentStore::new());
    let (fleets, ids) = stale_fleets(&store).await;
    fleets
        .update(&ids[0], doc(json!({ "name": "Bus 1b" })))
        .await
        .unwrap();
    let records = fleets.read().await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(has_outside(&records));
}

#[tokio::test]
async fn delete_drops_the_cache() {
    let store = Arc::new(MemoryDocumentStore::new());
    let (fleets, ids) = stale_fleets(&store).await;
    fleets.delete(&ids[0]).await.unwrap();
    let records = fleets.read().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(has_outside(&records));
}

#[tokio::test]
async fn batch_write_drops_the_cache() {
    let store = Arc::new(MemoryDocumentStore::new());
    let (fleets, ids) = stale_fleets(&store).await;
    fleets
        .batch_write(vec![BatchOperation::delete(ids[1].clone())])
        .await
        .unwrap();
    let records = fleets.read().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(has_outside(&records));
}

#[tokio::test]
async fn cascade_delete_drops_owner_and_dependent_caches() {
    let store = Arc::new(MemoryDocumentStore::new());
    let registry = CollectionRegistry::new(context(&store));
    let packages = registry
        .open("packages", string_schema("name"))
        .await
        .unwrap();
    let schedules = registry
        .open("package_schedules", string_schema("package_id"))
        .await
        .unwrap();
    packages.set_relation(
        "package_schedules",
        Relation::one_to_many("package_schedules", "package_id").nulling_on_delete(),
    );

    let package = create_id(&packages, json!({ "name": "Bali" })).await;
    let schedule = create_id(&schedules, json!({ "package_id": package })).await;
    assert_eq!(packages.read().await.unwrap().len(), 1);
    assert_eq!(schedules.read().await.unwrap().len(), 1);

    let komodo = doc(json!({ "id": "outside", "name": "Komodo" }));
    store.set("packages", "outside", komodo).await.unwrap();
    let orphan = doc(json!({ "id": "outside", "package_id": "outside" }));
    store
        .set("package_schedules", "outside", orphan)
        .await
        .unwrap();

    packages.delete_with_relation(&package).await.unwrap();

    let remaining = packages.read().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(has_outside(&remaining));

    let detached = schedules.read().await.unwrap();
    assert_eq!(detached.len(), 2);
    assert!(has_outside(&detached));
    let ours = detached
        .iter()
        .find(|record| record["id"] == schedule.as_str())
        .unwrap();
    assert_eq!(ours["package_id"], Value::Null);
}
