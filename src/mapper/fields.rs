// Per-entity field tables: canonical name -> document field -> SQL column.
// Patches and filters are expressed in canonical names and translated here.

use crate::database::{StoreError, StoreResult};
use crate::models::{
    AppointmentFilter, AppointmentPatch, PaymentFilter, PaymentPatch, UserFilter, UserPatch,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub canonical: &'static str,
    pub document: &'static str,
    pub column: &'static str,
}

const fn field(canonical: &'static str, document: &'static str, column: &'static str) -> FieldMap {
    FieldMap {
        canonical,
        document,
        column,
    }
}

pub const USER_FIELDS: &[FieldMap] = &[
    field("id", "_id", "id"),
    field("email", "email", "email"),
    field("firstName", "firstName", "first_name"),
    field("lastName", "lastName", "last_name"),
    field("phone", "phone", "phone"),
    field("avatar", "avatar", "avatar"),
    field("role", "role", "role"),
    field("isVerified", "isVerified", "is_verified"),
    field("createdAt", "createdAt", "created_at"),
    field("updatedAt", "updatedAt", "updated_at"),
];

pub const APPOINTMENT_FIELDS: &[FieldMap] = &[
    field("id", "_id", "id"),
    field("userId", "userId", "user_id"),
    field("serviceType", "serviceType", "service_type"),
    field("appointmentDate", "appointmentDate", "appointment_date"),
    field("status", "status", "status"),
    field("address", "address", "address"),
    field("notes", "notes", "notes"),
    field("price", "price", "price"),
    field("createdAt", "createdAt", "created_at"),
    field("updatedAt", "updatedAt", "updated_at"),
];

pub const PAYMENT_FIELDS: &[FieldMap] = &[
    field("id", "_id", "id"),
    field("userId", "userId", "user_id"),
    field("appointmentId", "appointmentId", "appointment_id"),
    field("amount", "amount", "amount"),
    field("currency", "currency", "currency"),
    field("status", "status", "status"),
    field(
        "externalPaymentIntentId",
        "stripePaymentIntentId",
        "stripe_payment_intent_id",
    ),
    field("createdAt", "createdAt", "created_at"),
    field("updatedAt", "updatedAt", "updated_at"),
];

fn lookup(fields: &[FieldMap], canonical: &str) -> StoreResult<FieldMap> {
    fields
        .iter()
        .find(|f| f.canonical == canonical)
        .copied()
        .ok_or_else(|| StoreError::Malformed(format!("no store mapping for field '{}'", canonical)))
}

pub fn document_name(fields: &[FieldMap], canonical: &str) -> StoreResult<&'static str> {
    lookup(fields, canonical).map(|f| f.document)
}

pub fn column_name(fields: &[FieldMap], canonical: &str) -> StoreResult<&'static str> {
    lookup(fields, canonical).map(|f| f.column)
}

/// Reverse lookup, used to name the offending field in constraint errors
pub fn canonical_for_column(fields: &[FieldMap], column: &str) -> Option<&'static str> {
    fields.iter().find(|f| f.column == column).map(|f| f.canonical)
}

pub fn canonical_for_document(fields: &[FieldMap], document: &str) -> Option<&'static str> {
    fields.iter().find(|f| f.document == document).map(|f| f.canonical)
}

/// Comma-separated column list in table order
pub fn column_list(fields: &[FieldMap]) -> String {
    fields
        .iter()
        .map(|f| f.column)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Store-neutral value carried by patches and filters
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

pub type FieldChange = (&'static str, FieldValue);

/// Canonical field assignments for a partial update
pub trait PatchFields {
    fn changes(&self) -> Vec<FieldChange>;
}

/// Canonical exact-match conditions
pub trait FilterFields {
    fn conditions(&self) -> Vec<FieldChange>;
}

fn text(v: &str) -> FieldValue {
    FieldValue::Text(v.to_string())
}

impl PatchFields for UserPatch {
    fn changes(&self) -> Vec<FieldChange> {
        let mut out = Vec::new();
        if let Some(v) = &self.email {
            out.push(("email", text(v)));
        }
        if let Some(v) = &self.first_name {
            out.push(("firstName", text(v)));
        }
        if let Some(v) = &self.last_name {
            out.push(("lastName", text(v)));
        }
        if let Some(v) = &self.phone {
            out.push(("phone", text(v)));
        }
        if let Some(v) = &self.avatar {
            out.push(("avatar", text(v)));
        }
        if let Some(v) = self.role {
            out.push(("role", text(v.as_str())));
        }
        if let Some(v) = self.is_verified {
            out.push(("isVerified", FieldValue::Bool(v)));
        }
        out
    }
}

impl PatchFields for AppointmentPatch {
    fn changes(&self) -> Vec<FieldChange> {
        let mut out = Vec::new();
        if let Some(v) = &self.service_type {
            out.push(("serviceType", text(v)));
        }
        if let Some(v) = self.appointment_date {
            out.push(("appointmentDate", FieldValue::Timestamp(v)));
        }
        if let Some(v) = self.status {
            out.push(("status", text(v.as_str())));
        }
        if let Some(v) = &self.address {
            out.push(("address", text(v)));
        }
        if let Some(v) = &self.notes {
            out.push(("notes", text(v)));
        }
        if let Some(v) = self.price {
            out.push(("price", FieldValue::Float(v)));
        }
        out
    }
}

impl PatchFields for PaymentPatch {
    fn changes(&self) -> Vec<FieldChange> {
        let mut out = Vec::new();
        if let Some(v) = self.amount {
            out.push(("amount", FieldValue::Float(v)));
        }
        if let Some(v) = &self.currency {
            out.push(("currency", text(v)));
        }
        if let Some(v) = self.status {
            out.push(("status", text(v.as_str())));
        }
        out
    }
}

impl FilterFields for UserFilter {
    fn conditions(&self) -> Vec<FieldChange> {
        self.role
            .map(|role| vec![("role", text(role.as_str()))])
            .unwrap_or_default()
    }
}

impl FilterFields for AppointmentFilter {
    fn conditions(&self) -> Vec<FieldChange> {
        let mut out = Vec::new();
        if let Some(v) = &self.user_id {
            out.push(("userId", text(v)));
        }
        if let Some(v) = self.status {
            out.push(("status", text(v.as_str())));
        }
        out
    }
}

impl FilterFields for PaymentFilter {
    fn conditions(&self) -> Vec<FieldChange> {
        let mut out = Vec::new();
        if let Some(v) = &self.user_id {
            out.push(("userId", text(v)));
        }
        if let Some(v) = &self.appointment_id {
            out.push(("appointmentId", text(v)));
        }
        if let Some(v) = self.status {
            out.push(("status", text(v.as_str())));
        }
        out
    }
}
