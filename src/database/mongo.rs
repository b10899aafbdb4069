// ==================== MONGODB (DOCUMENT STORE) ====================
// Native ids are ObjectIds minted here; timestamps are BSON datetimes.
// Free-text user search is filtered client-side over the matching set.

use super::{Store, StoreError, StoreKind, StoreResult, ValidationFailure};
use crate::config::MongoSettings;
use crate::mapper::document::id_to_bson;
use crate::mapper::fields::{self, document_name, FieldChange};
use crate::mapper::{newest_first, FilterFields, PatchFields, RecordMapping};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, NewAppointment, NewPayment, NewUser, Page,
    Pagination, Payment, PaymentFilter, PaymentPatch, User, UserFilter, UserPatch,
};
use crate::utils::time::{now_millis, to_bson};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, ConnectionString, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Duration;

const HEALTH_COLLECTION: &str = "_health";
/// Upper bound on documents scanned for a client-side search
const MAX_SEARCH_SCAN: usize = 5_000;
const DUPLICATE_KEY: i32 = 11000;
const DOCUMENT_VALIDATION_FAILURE: i32 = 121;
const NAMESPACE_EXISTS: i32 = 48;

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write)) => {
                classify_code(write.code, &write.message).unwrap_or_else(|| {
                    StoreError::Unavailable(err.to_string())
                })
            }
            ErrorKind::Command(command) => classify_code(command.code, &command.message)
                .unwrap_or_else(|| StoreError::Unavailable(err.to_string())),
            ErrorKind::BsonDeserialization(e) => StoreError::Malformed(e.to_string()),
            ErrorKind::BsonSerialization(e) => StoreError::Malformed(e.to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

fn classify_code(code: i32, message: &str) -> Option<StoreError> {
    match code {
        DUPLICATE_KEY => Some(StoreError::Validation(ValidationFailure::uniqueness(
            duplicate_field(message).as_deref(),
            "a record with this value already exists",
        ))),
        DOCUMENT_VALIDATION_FAILURE => Some(StoreError::Validation(ValidationFailure::schema(
            None,
            format!("document failed validation: {}", message),
        ))),
        _ => None,
    }
}

/// Pulls the field out of `E11000 ... dup key: { email: "a@b.com" }`
fn duplicate_field(message: &str) -> Option<String> {
    let rest = message.split("dup key: {").nth(1)?;
    let native = rest.split(':').next()?.trim();
    [fields::USER_FIELDS, fields::APPOINTMENT_FIELDS, fields::PAYMENT_FIELDS]
        .iter()
        .find_map(|table| fields::canonical_for_document(table, native))
        .map(str::to_string)
        .or_else(|| Some(native.to_string()).filter(|s| !s.is_empty()))
}

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
    use_transactions: bool,
}

impl MongoStore {
    /// Syntax check only; SRV records are not resolved
    pub fn validate_uri(uri: &str) -> StoreResult<()> {
        ConnectionString::parse(uri)
            .map(|_| ())
            .map_err(|e| StoreError::Malformed(format!("invalid MongoDB URI: {}", e)))
    }

    /// Resolves SRV records for `mongodb+srv://` URIs, so this needs DNS.
    /// Server connections are opened on first use.
    pub async fn connect(settings: &MongoSettings, timeout: Duration) -> StoreResult<Self> {
        let mut client_options = ClientOptions::parse(&settings.uri).await?;

        client_options.app_name = Some("cleaning-booking-service".to_string());
        client_options.max_pool_size = Some(settings.max_pool_size);
        client_options.min_pool_size = Some(1);
        client_options.max_idle_time = Some(Duration::from_secs(300));
        client_options.connect_timeout = Some(timeout);
        client_options.server_selection_timeout = Some(timeout);

        let client = Client::with_options(client_options)?;
        let db = client.database(&settings.database);

        log::info!(
            "🍃 MongoDB client ready (database: {}, transactions: {})",
            settings.database,
            if settings.transactions { "on" } else { "off" }
        );

        Ok(Self {
            client,
            db,
            use_transactions: settings.transactions,
        })
    }

    /// Collection validators and indexes; idempotent
    async fn create_schema(&self) -> StoreResult<()> {
        log::info!("🔧 Ensuring MongoDB validators and indexes...");

        self.ensure_validator(
            User::COLLECTION,
            doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["email", "firstName", "lastName", "role", "createdAt"],
                    "properties": {
                        "email": { "bsonType": "string" },
                        "role": { "enum": ["client", "admin", "provider"] },
                        "isVerified": { "bsonType": "bool" },
                        "createdAt": { "bsonType": "date" },
                    }
                }
            },
        )
        .await;

        self.ensure_validator(
            Appointment::COLLECTION,
            doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["userId", "serviceType", "appointmentDate", "status", "address", "createdAt"],
                    "properties": {
                        "status": { "enum": ["pending", "confirmed", "completed", "cancelled"] },
                        "appointmentDate": { "bsonType": "date" },
                    }
                }
            },
        )
        .await;

        self.ensure_validator(
            Payment::COLLECTION,
            doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["userId", "appointmentId", "amount", "currency", "status", "stripePaymentIntentId", "createdAt"],
                    "properties": {
                        "amount": { "bsonType": ["double", "int", "long", "decimal"], "minimum": 0 },
                        "currency": { "bsonType": "string", "pattern": "^[A-Za-z]{3}$" },
                        "status": { "enum": ["pending", "completed", "failed", "refunded"] },
                    }
                }
            },
        )
        .await;

        self.create_index(User::COLLECTION, doc! { "email": 1 }, true).await?;
        self.create_index(User::COLLECTION, doc! { "createdAt": -1, "_id": -1 }, false).await?;

        self.create_index(Appointment::COLLECTION, doc! { "userId": 1, "createdAt": -1 }, false)
            .await?;

        self.create_index(Payment::COLLECTION, doc! { "stripePaymentIntentId": 1 }, true)
            .await?;
        self.create_index(Payment::COLLECTION, doc! { "userId": 1, "createdAt": -1 }, false)
            .await?;
        self.create_index(Payment::COLLECTION, doc! { "appointmentId": 1 }, false)
            .await?;

        log::info!("✅ MongoDB schema ready");
        Ok(())
    }

    async fn ensure_validator(&self, name: &str, validator: Document) {
        match self.db.create_collection(name).validator(validator.clone()).await {
            Ok(_) => log::info!("   ✅ Collection created: {}", name),
            Err(e) if is_namespace_exists(&e) => {
                let result = self
                    .db
                    .run_command(doc! { "collMod": name, "validator": validator })
                    .await;
                match result {
                    Ok(_) => log::debug!("   ℹ️  Validator refreshed: {}", name),
                    Err(e) => log::warn!("   ⚠️  Could not refresh validator on {}: {}", name, e),
                }
            }
            Err(e) => log::warn!("   ⚠️  Could not create collection {}: {}", name, e),
        }
    }

    async fn create_index(&self, name: &str, keys: Document, unique: bool) -> StoreResult<()> {
        let model = IndexModel::builder()
            .keys(keys.clone())
            .options(IndexOptions::builder().unique(unique).build())
            .build();

        match self.db.collection::<Document>(name).create_index(model).await {
            Ok(_) => {
                log::info!("   ✅ Index ready: {}({:?})", name, keys.keys().collect::<Vec<_>>());
                Ok(())
            }
            // an existing unique index on dirty data is a real problem; anything else is noise
            Err(e) if unique => Err(e.into()),
            Err(e) => {
                log::debug!("   ℹ️  Index not created on {}: {}", name, e);
                Ok(())
            }
        }
    }

    fn collection<E: RecordMapping>(&self) -> Collection<E::Document> {
        self.db.collection(E::COLLECTION)
    }

    // ==================== GENERIC OPERATIONS ====================

    async fn insert<E: RecordMapping>(&self, entity: &E) -> StoreResult<()> {
        self.collection::<E>().insert_one(entity.to_document()).await?;
        Ok(())
    }

    async fn replace<E: RecordMapping>(&self, entity: &E) -> StoreResult<()> {
        self.collection::<E>()
            .replace_one(doc! { "_id": id_to_bson(entity.id()) }, entity.to_document())
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn find_one<E: RecordMapping>(&self, filter: Document) -> StoreResult<Option<E>> {
        self.collection::<E>()
            .find_one(filter)
            .await?
            .map(E::from_document)
            .transpose()
    }

    async fn find_by_id<E: RecordMapping>(&self, id: &str) -> StoreResult<Option<E>> {
        self.find_one(doc! { "_id": id_to_bson(id) }).await
    }

    async fn update_where<E: RecordMapping>(
        &self,
        filter: Document,
        changes: Vec<FieldChange>,
    ) -> StoreResult<Option<E>> {
        let mut set = set_document::<E>(changes)?;
        set.insert(document_name(E::FIELDS, "updatedAt")?, to_bson(&now_millis()));

        self.collection::<E>()
            .find_one_and_update(filter, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .map(E::from_document)
            .transpose()
    }

    async fn list<E, P>(
        &self,
        filter: Document,
        page: &Pagination,
        search: Option<(&str, P)>,
    ) -> StoreResult<Page<E>>
    where
        E: RecordMapping,
        P: Fn(&E, &str) -> bool,
    {
        let collection = self.collection::<E>();
        let sort = sort_document::<E>()?;

        match search {
            None => {
                let total = collection.count_documents(filter.clone()).await?;
                if page.limit == 0 {
                    // limit(0) means "no limit" to MongoDB
                    return Ok(Page { data: vec![], total });
                }

                let docs: Vec<E::Document> = collection
                    .find(filter)
                    .sort(sort)
                    .skip(u64::from(page.offset))
                    .limit(i64::from(page.limit))
                    .await?
                    .try_collect()
                    .await?;

                let data = docs
                    .into_iter()
                    .map(E::from_document)
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(Page { data, total })
            }
            Some((term, matches)) => {
                let docs: Vec<E::Document> = collection
                    .find(filter)
                    .sort(sort)
                    .limit(MAX_SEARCH_SCAN as i64)
                    .await?
                    .try_collect()
                    .await?;

                let scanned = docs
                    .into_iter()
                    .map(E::from_document)
                    .collect::<StoreResult<Vec<_>>>()?;

                let (result, capped) =
                    search_page(scanned, MAX_SEARCH_SCAN, page, |entity| matches(entity, term));
                if capped {
                    log::warn!(
                        "⚠️  {} search scanned the {} document cap; results may be partial",
                        E::ENTITY,
                        MAX_SEARCH_SCAN
                    );
                }
                Ok(result)
            }
        }
    }

    /// Deletes `steps` in order, inside one transaction when enabled.
    /// Returns how many documents the last step removed.
    async fn cascade_delete(&self, steps: Vec<(&'static str, Document)>) -> StoreResult<u64> {
        if !self.use_transactions {
            let mut last = 0;
            for (name, filter) in steps {
                last = self
                    .db
                    .collection::<Document>(name)
                    .delete_many(filter)
                    .await?
                    .deleted_count;
            }
            return Ok(last);
        }

        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let mut last = 0;
        for (name, filter) in steps {
            let result = self
                .db
                .collection::<Document>(name)
                .delete_many(filter)
                .session(&mut session)
                .await;

            match result {
                Ok(r) => last = r.deleted_count,
                Err(e) => {
                    if let Err(abort) = session.abort_transaction().await {
                        log::warn!("⚠️  Failed to abort cascade transaction: {}", abort);
                    }
                    return Err(e.into());
                }
            }
        }

        session.commit_transaction().await?;
        Ok(last)
    }
}

/// Filters the scanned entities, orders them newest first, then counts and
/// slices. The flag is set when the scan stopped at `cap`.
fn search_page<E: RecordMapping>(
    scanned: Vec<E>,
    cap: usize,
    page: &Pagination,
    matches: impl Fn(&E) -> bool,
) -> (Page<E>, bool) {
    let capped = scanned.len() >= cap;
    let mut matched: Vec<E> = scanned.into_iter().filter(|entity| matches(entity)).collect();
    newest_first(&mut matched);

    let result = Page {
        total: matched.len() as u64,
        data: page.slice(&matched),
    };
    (result, capped)
}

fn is_namespace_exists(err: &mongodb::error::Error) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Command(c) if c.code == NAMESPACE_EXISTS)
}

fn set_document<E: RecordMapping>(changes: Vec<FieldChange>) -> StoreResult<Document> {
    let mut set = Document::new();
    for (field, value) in changes {
        set.insert(document_name(E::FIELDS, field)?, value.to_bson());
    }
    Ok(set)
}

fn filter_document<E: RecordMapping>(conditions: Vec<FieldChange>) -> StoreResult<Document> {
    set_document::<E>(conditions)
}

fn sort_document<E: RecordMapping>() -> StoreResult<Document> {
    let mut sort = Document::new();
    sort.insert(document_name(E::FIELDS, "createdAt")?, -1);
    sort.insert(document_name(E::FIELDS, "id")?, -1);
    Ok(sort)
}

fn no_search<E>() -> Option<(&'static str, fn(&E, &str) -> bool)> {
    None
}

#[async_trait]
impl Store for MongoStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Mongo
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db
            .collection::<Document>(HEALTH_COLLECTION)
            .find_one(doc! { "_id": "probe" })
            .await?;
        Ok(())
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.create_schema().await
    }

    // ==================== USERS ====================

    async fn create_user(&self, input: &NewUser) -> StoreResult<User> {
        let user = input.clone().into_user(ObjectId::new().to_hex(), now_millis());
        self.insert(&user).await?;
        log::debug!("🍃 user {} created", user.id);
        Ok(user)
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.replace(user).await
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.find_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one(doc! { "email": email }).await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        self.update_where(doc! { "_id": id_to_bson(id) }, patch.changes())
            .await
    }

    async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        let deleted = self
            .cascade_delete(vec![
                (Payment::COLLECTION, doc! { "userId": id }),
                (Appointment::COLLECTION, doc! { "userId": id }),
                (User::COLLECTION, doc! { "_id": id_to_bson(id) }),
            ])
            .await?;
        Ok(deleted > 0)
    }

    async fn list_users(&self, filter: &UserFilter, page: &Pagination) -> StoreResult<Page<User>> {
        let query = filter_document::<User>(filter.conditions())?;
        match filter.search_term() {
            Some(term) => {
                self.list(query, page, Some((term, |u: &User, t: &str| u.matches_search(t))))
                    .await
            }
            None => self.list(query, page, no_search::<User>()).await,
        }
    }

    // ==================== APPOINTMENTS ====================

    async fn create_appointment(&self, input: &NewAppointment) -> StoreResult<Appointment> {
        let appointment = input
            .clone()
            .into_appointment(ObjectId::new().to_hex(), now_millis());
        self.insert(&appointment).await?;
        Ok(appointment)
    }

    async fn upsert_appointment(&self, appointment: &Appointment) -> StoreResult<()> {
        self.replace(appointment).await
    }

    async fn get_appointment_by_id(&self, id: &str) -> StoreResult<Option<Appointment>> {
        self.find_by_id(id).await
    }

    async fn update_appointment(
        &self,
        id: &str,
        patch: &AppointmentPatch,
    ) -> StoreResult<Option<Appointment>> {
        self.update_where(doc! { "_id": id_to_bson(id) }, patch.changes())
            .await
    }

    async fn delete_appointment(&self, id: &str) -> StoreResult<bool> {
        let deleted = self
            .cascade_delete(vec![
                (Payment::COLLECTION, doc! { "appointmentId": id }),
                (Appointment::COLLECTION, doc! { "_id": id_to_bson(id) }),
            ])
            .await?;
        Ok(deleted > 0)
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Appointment>> {
        let query = filter_document::<Appointment>(filter.conditions())?;
        self.list(query, page, no_search::<Appointment>()).await
    }

    // ==================== PAYMENTS ====================

    async fn create_payment(&self, input: &NewPayment) -> StoreResult<Payment> {
        let payment = input.clone().into_payment(ObjectId::new().to_hex(), now_millis());
        self.insert(&payment).await?;
        Ok(payment)
    }

    async fn upsert_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.replace(payment).await
    }

    async fn get_payment_by_id(&self, id: &str) -> StoreResult<Option<Payment>> {
        self.find_by_id(id).await
    }

    async fn get_payment_by_intent_id(&self, intent_id: &str) -> StoreResult<Option<Payment>> {
        self.find_one(doc! { "stripePaymentIntentId": intent_id }).await
    }

    async fn update_payment(&self, id: &str, patch: &PaymentPatch) -> StoreResult<Option<Payment>> {
        self.update_where(doc! { "_id": id_to_bson(id) }, patch.changes())
            .await
    }

    async fn update_payment_by_intent_id(
        &self,
        intent_id: &str,
        patch: &PaymentPatch,
    ) -> StoreResult<Option<Payment>> {
        self.update_where(doc! { "stripePaymentIntentId": intent_id }, patch.changes())
            .await
    }

    async fn delete_payment(&self, id: &str) -> StoreResult<bool> {
        let deleted = self
            .cascade_delete(vec![(Payment::COLLECTION, doc! { "_id": id_to_bson(id) })])
            .await?;
        Ok(deleted > 0)
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Payment>> {
        let query = filter_document::<Payment>(filter.conditions())?;
        self.list(query, page, no_search::<Payment>()).await
    }
}
