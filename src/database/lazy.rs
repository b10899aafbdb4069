// ==================== LAZY STORE ====================
// Wraps a native store whose client build or schema setup may fail while the
// node is down. Both steps are retried on later calls until they succeed;
// until then every call reports the store as unavailable.

use super::{Store, StoreKind, StoreResult};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, NewAppointment, NewPayment, NewUser, Page,
    Pagination, Payment, PaymentFilter, PaymentPatch, User, UserFilter, UserPatch,
};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

type Connector = Box<dyn Fn() -> BoxFuture<'static, StoreResult<Arc<dyn Store>>> + Send + Sync>;

pub struct LazyStore {
    kind: StoreKind,
    connector: Connector,
    handle: OnceCell<Arc<dyn Store>>,
    schema: OnceCell<()>,
}

impl LazyStore {
    /// `connect` runs on first use and again after every failure
    pub fn new<F, Fut>(kind: StoreKind, connect: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<Arc<dyn Store>>> + Send + 'static,
    {
        Self {
            kind,
            connector: Box::new(move || connect().boxed()),
            handle: OnceCell::new(),
            schema: OnceCell::new(),
        }
    }

    /// Client already built; only schema setup is deferred
    pub fn connected(store: Arc<dyn Store>) -> Self {
        let kind = store.kind();
        let ready = store.clone();
        Self {
            kind,
            connector: Box::new(move || {
                let store = ready.clone();
                async move { Ok(store) }.boxed()
            }),
            handle: OnceCell::new_with(Some(store)),
            schema: OnceCell::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.handle.initialized() && self.schema.initialized()
    }

    async fn ready(&self) -> StoreResult<&Arc<dyn Store>> {
        let store = self
            .handle
            .get_or_try_init(|| async {
                let result = (self.connector)().await;
                match &result {
                    Ok(_) => log::info!("🔌 {} client built", self.kind),
                    Err(e) => log::warn!("⚠️  {} client not built yet: {}", self.kind, e),
                }
                result
            })
            .await?;

        self.schema
            .get_or_try_init(|| async {
                let result = store.ensure_schema().await;
                if let Err(e) = &result {
                    log::warn!("⚠️  {} schema setup failed, will retry: {}", self.kind, e);
                }
                result
            })
            .await?;

        Ok(store)
    }
}

#[async_trait]
impl Store for LazyStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    async fn ping(&self) -> StoreResult<()> {
        self.ready().await?.ping().await
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.ready().await.map(|_| ())
    }

    async fn create_user(&self, input: &NewUser) -> StoreResult<User> {
        self.ready().await?.create_user(input).await
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.ready().await?.upsert_user(user).await
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.ready().await?.get_user_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.ready().await?.get_user_by_email(email).await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        self.ready().await?.update_user(id, patch).await
    }

    async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        self.ready().await?.delete_user(id).await
    }

    async fn list_users(&self, filter: &UserFilter, page: &Pagination) -> StoreResult<Page<User>> {
        self.ready().await?.list_users(filter, page).await
    }

    async fn create_appointment(&self, input: &NewAppointment) -> StoreResult<Appointment> {
        self.ready().await?.create_appointment(input).await
    }

    async fn upsert_appointment(&self, appointment: &Appointment) -> StoreResult<()> {
        self.ready().await?.upsert_appointment(appointment).await
    }

    async fn get_appointment_by_id(&self, id: &str) -> StoreResult<Option<Appointment>> {
        self.ready().await?.get_appointment_by_id(id).await
    }

    async fn update_appointment(
        &self,
        id: &str,
        patch: &AppointmentPatch,
    ) -> StoreResult<Option<Appointment>> {
        self.ready().await?.update_appointment(id, patch).await
    }

    async fn delete_appointment(&self, id: &str) -> StoreResult<bool> {
        self.ready().await?.delete_appointment(id).await
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Appointment>> {
        self.ready().await?.list_appointments(filter, page).await
    }

    async fn create_payment(&self, input: &NewPayment) -> StoreResult<Payment> {
        self.ready().await?.create_payment(input).await
    }

    async fn upsert_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.ready().await?.upsert_payment(payment).await
    }

    async fn get_payment_by_id(&self, id: &str) -> StoreResult<Option<Payment>> {
        self.ready().await?.get_payment_by_id(id).await
    }

    async fn get_payment_by_intent_id(&self, intent_id: &str) -> StoreResult<Option<Payment>> {
        self.ready().await?.get_payment_by_intent_id(intent_id).await
    }

    async fn update_payment(&self, id: &str, patch: &PaymentPatch) -> StoreResult<Option<Payment>> {
        self.ready().await?.update_payment(id, patch).await
    }

    async fn update_payment_by_intent_id(
        &self,
        intent_id: &str,
        patch: &PaymentPatch,
    ) -> StoreResult<Option<Payment>> {
        self.ready()
            .await?
            .update_payment_by_intent_id(intent_id, patch)
            .await
    }

    async fn delete_payment(&self, id: &str) -> StoreResult<bool> {
        self.ready().await?.delete_payment(id).await
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Payment>> {
        self.ready().await?.list_payments(filter, page).await
    }
}
