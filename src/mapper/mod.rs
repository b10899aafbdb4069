//! Record Mapper: the only place that knows both native conventions.
//!
//! Every canonical entity has a typed document form (MongoDB) and a typed row
//! form (PostgreSQL), plus a field table used to translate patches, filters
//! and sort keys. The stores are generic over [`RecordMapping`].

pub mod document;
pub mod fields;
pub mod relational;

pub use fields::{FieldMap, FieldValue, FilterFields, PatchFields};
pub use relational::SqlValue;

use crate::database::StoreResult;
use crate::models::{Appointment, Payment, User};
use chrono::{DateTime, Utc};
use document::{AppointmentDocument, PaymentDocument, UserDocument};
use relational::{AppointmentRow, PaymentRow, UserRow};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;

pub trait RecordMapping: Sized + Clone + Send + Sync + 'static {
    /// Singular name used in logs
    const ENTITY: &'static str;
    /// Collection and table name (identical in both stores)
    const COLLECTION: &'static str;
    const FIELDS: &'static [FieldMap];

    type Document: Serialize + DeserializeOwned + Send + Sync + Unpin;
    type Row: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin;

    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;

    fn to_document(&self) -> Self::Document;
    fn from_document(doc: Self::Document) -> StoreResult<Self>;

    fn to_row(&self) -> Self::Row;
    fn from_row(row: Self::Row) -> StoreResult<Self>;
    /// Row values in `FIELDS` order, for INSERT/UPSERT binds
    fn row_values(row: Self::Row) -> Vec<SqlValue>;
}

impl RecordMapping for User {
    const ENTITY: &'static str = "user";
    const COLLECTION: &'static str = "users";
    const FIELDS: &'static [FieldMap] = fields::USER_FIELDS;

    type Document = UserDocument;
    type Row = UserRow;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn to_document(&self) -> UserDocument {
        UserDocument::from(self)
    }

    fn from_document(doc: UserDocument) -> StoreResult<Self> {
        User::try_from(doc)
    }

    fn to_row(&self) -> UserRow {
        UserRow::from(self)
    }

    fn from_row(row: UserRow) -> StoreResult<Self> {
        User::try_from(row)
    }

    fn row_values(row: UserRow) -> Vec<SqlValue> {
        row.into_values()
    }
}

impl RecordMapping for Appointment {
    const ENTITY: &'static str = "appointment";
    const COLLECTION: &'static str = "appointments";
    const FIELDS: &'static [FieldMap] = fields::APPOINTMENT_FIELDS;

    type Document = AppointmentDocument;
    type Row = AppointmentRow;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn to_document(&self) -> AppointmentDocument {
        AppointmentDocument::from(self)
    }

    fn from_document(doc: AppointmentDocument) -> StoreResult<Self> {
        Appointment::try_from(doc)
    }

    fn to_row(&self) -> AppointmentRow {
        AppointmentRow::from(self)
    }

    fn from_row(row: AppointmentRow) -> StoreResult<Self> {
        Appointment::try_from(row)
    }

    fn row_values(row: AppointmentRow) -> Vec<SqlValue> {
        row.into_values()
    }
}

impl RecordMapping for Payment {
    const ENTITY: &'static str = "payment";
    const COLLECTION: &'static str = "payments";
    const FIELDS: &'static [FieldMap] = fields::PAYMENT_FIELDS;

    type Document = PaymentDocument;
    type Row = PaymentRow;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn to_document(&self) -> PaymentDocument {
        PaymentDocument::from(self)
    }

    fn from_document(doc: PaymentDocument) -> StoreResult<Self> {
        Payment::try_from(doc)
    }

    fn to_row(&self) -> PaymentRow {
        PaymentRow::from(self)
    }

    fn from_row(row: PaymentRow) -> StoreResult<Self> {
        Payment::try_from(row)
    }

    fn row_values(row: PaymentRow) -> Vec<SqlValue> {
        row.into_values()
    }
}

/// Newest-created first, id descending on ties; both stores page in this order
pub fn newest_first<E: RecordMapping>(items: &mut [E]) {
    items.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });
}
