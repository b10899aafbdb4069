// ==================== STORE LAYER ====================
// Two interchangeable backends behind one trait: MongoDB (document) and
// PostgreSQL (relational). Everything above this module speaks canonical models.

pub mod health;
pub mod lazy;
pub mod mongo;
pub mod postgres;
pub mod selector;

pub use health::HealthProber;
pub use lazy::LazyStore;
pub use mongo::MongoStore;
pub use postgres::PostgresStore;
pub use selector::{ActiveStoreSelector, FailoverPolicy};

use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, NewAppointment, NewPayment, NewUser, Page,
    Pagination, Payment, PaymentFilter, PaymentPatch, User, UserFilter, UserPatch,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Mongo,
    Postgres,
}

impl StoreKind {
    pub fn other(&self) -> StoreKind {
        match self {
            StoreKind::Mongo => StoreKind::Postgres,
            StoreKind::Postgres => StoreKind::Mongo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Mongo => "mongodb",
            StoreKind::Postgres => "postgres",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mongodb" | "mongo" | "document" => Ok(StoreKind::Mongo),
            "postgres" | "postgresql" | "supabase" | "relational" => Ok(StoreKind::Postgres),
            other => Err(format!("unknown store kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    /// Unique constraint (email, payment intent id)
    Uniqueness,
    /// Rejected by the store schema (check constraint, validator, type)
    Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub kind: ValidationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationFailure {
    pub fn uniqueness(field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Uniqueness,
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn schema(field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: ValidationKind::Schema,
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} ({})", self.message, field),
            None => f.write_str(&self.message),
        }
    }
}

/// Failure of a single call against one store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("validation failed: {0}")]
    Validation(ValidationFailure),
}

impl StoreError {
    /// Connectivity and decoding failures are worth a retry on the other store
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::Validation(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Native operations every backing store provides.
///
/// `create_*` assigns id and timestamps at the store; `upsert_*` writes a
/// record verbatim (same id, same timestamps) and is what mirroring uses.
/// Deletes cascade to dependent records inside the same store.
#[async_trait]
pub trait Store: Send + Sync {
    fn kind(&self) -> StoreKind;

    /// Cheapest possible read against the reserved `_health` record
    async fn ping(&self) -> StoreResult<()>;

    /// Idempotent schema setup: validators and indexes, or migrations
    async fn ensure_schema(&self) -> StoreResult<()>;

    async fn create_user(&self, input: &NewUser) -> StoreResult<User>;
    async fn upsert_user(&self, user: &User) -> StoreResult<()>;
    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, id: &str, patch: &UserPatch) -> StoreResult<Option<User>>;
    async fn delete_user(&self, id: &str) -> StoreResult<bool>;
    async fn list_users(&self, filter: &UserFilter, page: &Pagination) -> StoreResult<Page<User>>;

    async fn create_appointment(&self, input: &NewAppointment) -> StoreResult<Appointment>;
    async fn upsert_appointment(&self, appointment: &Appointment) -> StoreResult<()>;
    async fn get_appointment_by_id(&self, id: &str) -> StoreResult<Option<Appointment>>;
    async fn update_appointment(
        &self,
        id: &str,
        patch: &AppointmentPatch,
    ) -> StoreResult<Option<Appointment>>;
    async fn delete_appointment(&self, id: &str) -> StoreResult<bool>;
    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Appointment>>;

    async fn create_payment(&self, input: &NewPayment) -> StoreResult<Payment>;
    async fn upsert_payment(&self, payment: &Payment) -> StoreResult<()>;
    async fn get_payment_by_id(&self, id: &str) -> StoreResult<Option<Payment>>;
    async fn get_payment_by_intent_id(&self, intent_id: &str) -> StoreResult<Option<Payment>>;
    async fn update_payment(&self, id: &str, patch: &PaymentPatch) -> StoreResult<Option<Payment>>;
    async fn update_payment_by_intent_id(
        &self,
        intent_id: &str,
        patch: &PaymentPatch,
    ) -> StoreResult<Option<Payment>>;
    async fn delete_payment(&self, id: &str) -> StoreResult<bool>;
    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Payment>>;
}

/// Long-lived native store handles, built once at process start and shared
/// by the selector, the router and the mirror writer.
#[derive(Clone)]
pub struct StoreContext {
    primary: StoreKind,
    mongo: Arc<dyn Store>,
    postgres: Arc<dyn Store>,
}

impl StoreContext {
    pub fn new(
        primary: StoreKind,
        mongo: Arc<dyn Store>,
        postgres: Arc<dyn Store>,
    ) -> Result<Self, String> {
        if mongo.kind() != StoreKind::Mongo || postgres.kind() != StoreKind::Postgres {
            return Err(format!(
                "store handles wired to the wrong slots (got {} and {})",
                mongo.kind(),
                postgres.kind()
            ));
        }

        Ok(Self {
            primary,
            mongo,
            postgres,
        })
    }

    pub fn primary(&self) -> StoreKind {
        self.primary
    }

    pub fn store(&self, kind: StoreKind) -> &Arc<dyn Store> {
        match kind {
            StoreKind::Mongo => &self.mongo,
            StoreKind::Postgres => &self.postgres,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStore;

    #[test]
    fn test_store_kind_parsing() {
        assert_eq!("MongoDB".parse::<StoreKind>().unwrap(), StoreKind::Mongo);
        assert_eq!("supabase".parse::<StoreKind>().unwrap(), StoreKind::Postgres);
        assert!("firebird".parse::<StoreKind>().is_err());
        assert_eq!(StoreKind::Mongo.other(), StoreKind::Postgres);
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err = StoreError::Validation(ValidationFailure::uniqueness(Some("email"), "dup"));
        assert!(!err.is_retryable());
        assert!(StoreError::Unavailable("timeout".into()).is_retryable());
        assert!(StoreError::Malformed("bad".into()).is_retryable());
    }

    #[test]
    fn test_context_rejects_swapped_handles() {
        let mongo = FakeStore::shared(StoreKind::Mongo);
        let postgres = FakeStore::shared(StoreKind::Postgres);
        assert!(StoreContext::new(StoreKind::Mongo, postgres.clone(), mongo.clone()).is_err());

        let ctx = StoreContext::new(StoreKind::Postgres, mongo, postgres).unwrap();
        assert_eq!(ctx.primary(), StoreKind::Postgres);
        assert_eq!(ctx.store(ctx.primary()).kind(), StoreKind::Postgres);
        assert_eq!(ctx.store(StoreKind::Mongo).kind(), StoreKind::Mongo);
    }
}
