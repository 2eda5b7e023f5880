//! Travel-booking entity schemas and their relation graph.
//!
//! [`register_travel_models`] opens all ten partitions in a registry and
//! wires the relations between them. The graph is cyclic
//! (`bookings -> package_schedules -> bookings`); cascading deletes rely on
//! the visited-set guard in [`Collection::delete_with_relation`].

use std::sync::Arc;

use voyage_core::{FieldKind, Schema, SchemaNode};

use crate::collection::{Collection, Relation};
use crate::error::Result;
use crate::registry::CollectionRegistry;

pub const USERS: &str = "users";
pub const BOOKINGS: &str = "bookings";
pub const PAYMENTS: &str = "payments";
pub const PAYMENT_METHODS: &str = "payment_methods";
pub const INVOICES: &str = "invoices";
pub const PACKAGES: &str = "packages";
pub const PACKAGE_SCHEDULES: &str = "package_schedules";
pub const FLEETS: &str = "fleets";
pub const DESTINATIONS: &str = "destinations";
pub const IMAGES: &str = "images";

fn schema<const N: usize>(fields: [(&str, SchemaNode); N]) -> Schema {
    fields.into_iter().collect()
}

#[must_use]
pub fn user_schema() -> Schema {
    schema([
        ("name", SchemaNode::STRING),
        ("email", SchemaNode::STRING),
        ("password", SchemaNode::STRING),
        ("phone", SchemaNode::STRING),
        ("role", SchemaNode::STRING),
    ])
}

#[must_use]
pub fn booking_schema() -> Schema {
    schema([
        ("user_id", SchemaNode::STRING),
        ("package_schedule_id", SchemaNode::STRING),
        ("booking_date", SchemaNode::STRING),
        ("number_of_seats", SchemaNode::NUMBER),
        ("total_price", SchemaNode::NUMBER),
        ("payment_status", SchemaNode::STRING),
    ])
}

#[must_use]
pub fn payment_schema() -> Schema {
    schema([
        ("booking_id", SchemaNode::STRING),
        ("payment_method_id", SchemaNode::STRING),
        ("payment_date", SchemaNode::STRING),
        ("payment_amount", SchemaNode::NUMBER),
        ("payment_proof", SchemaNode::STRING),
        ("status", SchemaNode::STRING),
        ("is_approved", SchemaNode::BOOLEAN),
        ("approved_by", SchemaNode::STRING),
        ("approved_at", SchemaNode::STRING),
    ])
}

#[must_use]
pub fn payment_method_schema() -> Schema {
    schema([
        ("name", SchemaNode::STRING),
        ("provider", SchemaNode::STRING),
        ("type", SchemaNode::STRING),
        ("account_number", SchemaNode::STRING),
        ("account_name", SchemaNode::STRING),
        ("is_active", SchemaNode::BOOLEAN),
    ])
}

#[must_use]
pub fn invoice_schema() -> Schema {
    schema([
        ("booking_id", SchemaNode::STRING),
        ("invoice_number", SchemaNode::STRING),
        ("issued_date", SchemaNode::STRING),
        ("due_date", SchemaNode::STRING),
        ("status", SchemaNode::STRING),
    ])
}

#[must_use]
pub fn package_schema() -> Schema {
    schema([
        ("name", SchemaNode::STRING),
        ("description", SchemaNode::STRING),
        ("destination", SchemaNode::STRING),
        ("price", SchemaNode::NUMBER),
        ("available_seats", SchemaNode::NUMBER),
        ("start_date", SchemaNode::STRING),
        ("end_date", SchemaNode::STRING),
    ])
}

#[must_use]
pub fn package_schedule_schema() -> Schema {
    schema([
        ("package_id", SchemaNode::STRING),
        ("destination_ids", SchemaNode::array_of(FieldKind::String)),
        ("fleet_id", SchemaNode::STRING),
        ("departure_date", SchemaNode::STRING),
        ("return_date", SchemaNode::STRING),
        ("departure_time", SchemaNode::STRING),
        ("available_seats", SchemaNode::NUMBER),
    ])
}

#[must_use]
pub fn fleet_schema() -> Schema {
    schema([
        ("name", SchemaNode::STRING),
        ("type", SchemaNode::STRING),
        ("plate_number", SchemaNode::STRING),
        ("capacity", SchemaNode::NUMBER),
        ("driver_name", SchemaNode::STRING),
        ("status", SchemaNode::STRING),
    ])
}

/// Gallery, location point and keywords are JSON-encoded strings.
#[must_use]
pub fn destination_schema() -> Schema {
    schema([
        ("name", SchemaNode::STRING),
        ("slug", SchemaNode::STRING),
        ("description", SchemaNode::STRING),
        ("location_point", SchemaNode::STRING),
        ("province", SchemaNode::STRING),
        ("city", SchemaNode::STRING),
        ("country", SchemaNode::STRING),
        ("category", SchemaNode::STRING),
        ("popularity", SchemaNode::NUMBER),
        ("featured", SchemaNode::BOOLEAN),
        ("image_id", SchemaNode::STRING),
        ("gallery", SchemaNode::STRING),
        ("average_rating", SchemaNode::NUMBER),
        ("review_count", SchemaNode::NUMBER),
        ("is_active", SchemaNode::BOOLEAN),
        ("meta_keywords", SchemaNode::STRING),
        ("meta_description", SchemaNode::STRING),
    ])
}

/// `FK` holds the id of whatever record owns the image.
#[must_use]
pub fn image_schema() -> Schema {
    schema([
        ("FK", SchemaNode::STRING),
        ("image_base64", SchemaNode::STRING),
    ])
}

/// Every travel partition with its caller schema, in open order.
#[must_use]
pub fn travel_schemas() -> Vec<(&'static str, Schema)> {
    vec![
        (USERS, user_schema()),
        (BOOKINGS, booking_schema()),
        (PAYMENTS, payment_schema()),
        (PAYMENT_METHODS, payment_method_schema()),
        (INVOICES, invoice_schema()),
        (PACKAGES, package_schema()),
        (PACKAGE_SCHEDULES, package_schedule_schema()),
        (FLEETS, fleet_schema()),
        (DESTINATIONS, destination_schema()),
        (IMAGES, image_schema()),
    ]
}

/// Handles to the opened travel collections.
///
/// Keeps the registry alive so relation targets stay resolvable.
#[derive(Debug, Clone)]
pub struct TravelModels {
    pub registry: Arc<CollectionRegistry>,
    pub users: Arc<Collection>,
    pub bookings: Arc<Collection>,
    pub payments: Arc<Collection>,
    pub payment_methods: Arc<Collection>,
    pub invoices: Arc<Collection>,
    pub packages: Arc<Collection>,
    pub package_schedules: Arc<Collection>,
    pub fleets: Arc<Collection>,
    pub destinations: Arc<Collection>,
    pub images: Arc<Collection>,
}

impl TravelModels {
    /// Handles in open order.
    #[must_use]
    pub fn all(&self) -> [&Arc<Collection>; 10] {
        [
            &self.users,
            &self.bookings,
            &self.payments,
            &self.payment_methods,
            &self.invoices,
            &self.packages,
            &self.package_schedules,
            &self.fleets,
            &self.destinations,
            &self.images,
        ]
    }
}

/// Opens every travel partition in `registry` and declares their relations.
///
/// # Errors
///
/// Propagates store failures from self-heal.
pub async fn register_travel_models(registry: &Arc<CollectionRegistry>) -> Result<TravelModels> {
    let models = TravelModels {
        registry: Arc::clone(registry),
        users: registry.open(USERS, user_schema()).await?,
        bookings: registry.open(BOOKINGS, booking_schema()).await?,
        payments: registry.open(PAYMENTS, payment_schema()).await?,
        payment_methods: registry.open(PAYMENT_METHODS, payment_method_schema()).await?,
        invoices: registry.open(INVOICES, invoice_schema()).await?,
        packages: registry.open(PACKAGES, package_schema()).await?,
        package_schedules: registry
            .open(PACKAGE_SCHEDULES, package_schedule_schema())
            .await?,
        fleets: registry.open(FLEETS, fleet_schema()).await?,
        destinations: registry.open(DESTINATIONS, destination_schema()).await?,
        images: registry.open(IMAGES, image_schema()).await?,
    };

    models
        .users
        .set_relation("bookings", Relation::one_to_many(BOOKINGS, "user_id"));

    models
        .bookings
        .set_relation("payments", Relation::one_to_many(PAYMENTS, "booking_id"));
    models
        .bookings
        .set_relation("invoices", Relation::one_to_many(INVOICES, "booking_id"));
    models.bookings.set_relation(
        "schedule",
        Relation::one_to_one(PACKAGE_SCHEDULES, "package_schedule_id"),
    );

    models.payment_methods.set_relation(
        "payments",
        Relation::one_to_many(PAYMENTS, "payment_method_id"),
    );

    models
        .packages
        .set_relation("bookings", Relation::one_to_many(BOOKINGS, "package_id"));
    models.packages.set_relation(
        "package_schedules",
        Relation::one_to_many(PACKAGE_SCHEDULES, "package_id"),
    );

    models.package_schedules.set_relation(
        "bookings",
        Relation::one_to_many(BOOKINGS, "package_schedule_id"),
    );

    models.fleets.set_relation(
        "package_schedules",
        Relation::one_to_many(PACKAGE_SCHEDULES, "fleet_id"),
    );

    models
        .destinations
        .set_relation("image", Relation::one_to_many(IMAGES, "FK"));
    models
        .destinations
        .set_relation("package", Relation::one_to_many(PACKAGES, "destination_id"));

    models.images.set_relation(
        "users",
        Relation::one_to_one(USERS, "image_id").nulling_on_delete(),
    );

    Ok(models)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use voyage_core::types::into_document;
    use voyage_core::Document;

    use super::*;
    use crate::collection::{CollectionContext, Related};
    use crate::storage::{DocumentStore, MemoryDocumentStore, NullLogSink};

    fn doc(value: serde_json::Value) -> Document {
        into_document(value).unwrap()
    }

    async fn open() -> (Arc<MemoryDocumentStore>, TravelModels) {
        let store = Arc::new(MemoryDocumentStore::new());
        let registry = CollectionRegistry::new(CollectionContext::new(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            Arc::new(NullLogSink),
        ));
        let models = register_travel_models(&registry).await.unwrap();
        (store, models)
    }

    #[test]
    fn every_schema_validates_its_own_defaults() {
        for (name, caller) in travel_schemas() {
            let effective = Schema::with_base_fields(caller);
            assert!(
                effective.validate(&effective.default_document()).is_ok(),
                "{name}"
            );
        }
    }

    #[tokio::test]
    async fn opens_all_partitions_with_relations() {
        let (_store, models) = open().await;
        let names: Vec<&str> = models.all().iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names[6], PACKAGE_SCHEDULES);

        let relations: Vec<String> = models
            .bookings
            .relations()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(relations, ["payments", "invoices", "schedule"]);
        assert!(models.invoices.relations().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_schedule_cascades_through_bookings() {
        let (store, models) = open().await;
        let schedule = models
            .package_schedules
            .create(doc(json!({
                "package_id": "p1",
                "destination_ids": ["d1"],
                "fleet_id": "f1",
                "departure_date": "2024-05-01",
                "return_date": "2024-05-03",
                "departure_time": "08:00:00",
                "available_seats": 20
            })))
            .await
            .unwrap();
        let schedule_id = schedule["id"].as_str().unwrap();

        let booking = models
            .bookings
            .create(doc(json!({
                "user_id": "u1",
                "package_schedule_id": schedule_id,
                "booking_date": "2024-04-01",
                "number_of_seats": 2,
                "total_price": 1_500_000,
                "payment_status": "pending"
            })))
            .await
            .unwrap();
        let booking_id = booking["id"].as_str().unwrap();

        models
            .invoices
            .create(doc(json!({
                "booking_id": booking_id,
                "invoice_number": "INV-1",
                "issued_date": "2024-04-01",
                "due_date": "2024-04-08",
                "status": "unpaid"
            })))
            .await
            .unwrap();

        let Related::Many(bookings) = models
            .package_schedules
            .get_related(schedule_id, "bookings")
            .await
            .unwrap()
        else {
            panic!("one-to-many returns many");
        };
        assert_eq!(bookings.len(), 1);

        models
            .package_schedules
            .delete_with_relation(schedule_id)
            .await
            .unwrap();

        assert_eq!(store.partition_len(PACKAGE_SCHEDULES), 0);
        assert_eq!(store.partition_len(BOOKINGS), 0);
        assert_eq!(store.partition_len(INVOICES), 0);
    }
}
