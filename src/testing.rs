// In-memory `Store` with failure injection and call counters.

use crate::database::{Store, StoreError, StoreKind, StoreResult, ValidationFailure};
use crate::mapper::newest_first;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, NewAppointment, NewPayment, NewUser, Page,
    Pagination, Payment, PaymentFilter, PaymentPatch, User, UserFilter, UserPatch,
};
use crate::utils::time::now_millis;
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    appointments: HashMap<String, Appointment>,
    payments: HashMap<String, Payment>,
}

pub struct FakeStore {
    kind: StoreKind,
    tables: Mutex<Tables>,
    ping_healthy: AtomicBool,
    ping_delay: Mutex<Duration>,
    ping_count: AtomicUsize,
    failing: AtomicBool,
    panic_on_write: AtomicBool,
    schema_failing: AtomicBool,
    schema_runs: AtomicUsize,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeStore {
    pub fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            tables: Mutex::new(Tables::default()),
            ping_healthy: AtomicBool::new(true),
            ping_delay: Mutex::new(Duration::ZERO),
            ping_count: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            panic_on_write: AtomicBool::new(false),
            schema_failing: AtomicBool::new(false),
            schema_runs: AtomicUsize::new(0),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared(kind: StoreKind) -> Arc<Self> {
        Arc::new(Self::new(kind))
    }

    pub fn set_ping_healthy(&self, healthy: bool) {
        self.ping_healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        *self.ping_delay.lock().unwrap() = delay;
    }

    /// Every data call (not ping) fails with `Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Upserts and deletes panic, to exercise the mirror task boundary
    pub fn set_panic_on_write(&self, panic: bool) {
        self.panic_on_write.store(panic, Ordering::SeqCst);
    }

    /// `ensure_schema` fails, as migrations do against an unreachable node
    pub fn set_schema_failing(&self, failing: bool) {
        self.schema_failing.store(failing, Ordering::SeqCst);
    }

    pub fn schema_runs(&self) -> usize {
        self.schema_runs.load(Ordering::SeqCst)
    }

    /// Takes the node down entirely
    pub fn go_down(&self) {
        self.set_ping_healthy(false);
        self.set_failing(true);
    }

    pub fn recover(&self) {
        self.set_ping_healthy(true);
        self.set_failing(false);
    }

    pub fn ping_count(&self) -> usize {
        self.ping_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn stored_user(&self, id: &str) -> Option<User> {
        self.tables.lock().unwrap().users.get(id).cloned()
    }

    pub fn stored_appointment(&self, id: &str) -> Option<Appointment> {
        self.tables.lock().unwrap().appointments.get(id).cloned()
    }

    pub fn stored_payment(&self, id: &str) -> Option<Payment> {
        self.tables.lock().unwrap().payments.get(id).cloned()
    }

    pub fn appointments_of(&self, user_id: &str) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.appointments.values().filter(|a| a.user_id == user_id).count()
    }

    pub fn payments_of(&self, user_id: &str) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.payments.values().filter(|p| p.user_id == user_id).count()
    }

    fn enter(&self, op: &'static str) -> StoreResult<()> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{} is down", self.kind)));
        }
        Ok(())
    }

    fn enter_write(&self, op: &'static str) -> StoreResult<()> {
        self.enter(op)?;
        if self.panic_on_write.load(Ordering::SeqCst) {
            panic!("{} exploded during {}", self.kind, op);
        }
        Ok(())
    }

    fn mint_id(&self) -> String {
        match self.kind {
            StoreKind::Mongo => ObjectId::new().to_hex(),
            StoreKind::Postgres => uuid::Uuid::new_v4().to_string(),
        }
    }

    fn check_email(tables: &Tables, email: &str, except: &str) -> StoreResult<()> {
        if tables.users.values().any(|u| u.email == email && u.id != except) {
            return Err(StoreError::Validation(ValidationFailure::uniqueness(
                Some("email"),
                "a record with this value already exists",
            )));
        }
        Ok(())
    }

    fn check_payment(tables: &Tables, payment: &Payment) -> StoreResult<()> {
        if payment.amount < 0.0 {
            return Err(StoreError::Validation(ValidationFailure::schema(
                Some("amount"),
                "amount must not be negative",
            )));
        }
        if payment.currency.len() != 3 || !payment.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(StoreError::Validation(ValidationFailure::schema(
                Some("currency"),
                "currency must be a 3-letter code",
            )));
        }
        if tables.payments.values().any(|p| {
            p.external_payment_intent_id == payment.external_payment_intent_id && p.id != payment.id
        }) {
            return Err(StoreError::Validation(ValidationFailure::uniqueness(
                Some("externalPaymentIntentId"),
                "a record with this value already exists",
            )));
        }
        Ok(())
    }
}

fn paged<E: crate::mapper::RecordMapping>(mut items: Vec<E>, page: &Pagination) -> Page<E> {
    newest_first(&mut items);
    Page {
        total: items.len() as u64,
        data: page.slice(&items),
    }
}

#[async_trait]
impl Store for FakeStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    async fn ping(&self) -> StoreResult<()> {
        self.ping_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.ping_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.ping_healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.schema_runs.fetch_add(1, Ordering::SeqCst);
        if self.schema_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("migration failed: connection refused".into()));
        }
        Ok(())
    }

    async fn create_user(&self, input: &NewUser) -> StoreResult<User> {
        self.enter("create_user")?;
        let mut tables = self.tables.lock().unwrap();
        Self::check_email(&tables, &input.email, "")?;
        let user = input.clone().into_user(self.mint_id(), now_millis());
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.enter_write("upsert_user")?;
        let mut tables = self.tables.lock().unwrap();
        Self::check_email(&tables, &user.email, &user.id)?;
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.enter("get_user_by_id")?;
        Ok(self.tables.lock().unwrap().users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.enter("get_user_by_email")?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        self.enter("update_user")?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(email) = &patch.email {
            Self::check_email(&tables, email, id)?;
        }
        Ok(tables.users.get_mut(id).map(|user| {
            patch.apply(user);
            user.updated_at = now_millis();
            user.clone()
        }))
    }

    async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        self.enter_write("delete_user")?;
        let mut tables = self.tables.lock().unwrap();
        tables.payments.retain(|_, p| p.user_id != id);
        tables.appointments.retain(|_, a| a.user_id != id);
        Ok(tables.users.remove(id).is_some())
    }

    async fn list_users(&self, filter: &UserFilter, page: &Pagination) -> StoreResult<Page<User>> {
        self.enter("list_users")?;
        let tables = self.tables.lock().unwrap();
        let matching = tables
            .users
            .values()
            .filter(|u| filter.role.map_or(true, |r| u.role == r))
            .filter(|u| filter.search_term().map_or(true, |t| u.matches_search(t)))
            .cloned()
            .collect();
        Ok(paged(matching, page))
    }

    async fn create_appointment(&self, input: &NewAppointment) -> StoreResult<Appointment> {
        self.enter("create_appointment")?;
        let appointment = input.clone().into_appointment(self.mint_id(), now_millis());
        let mut tables = self.tables.lock().unwrap();
        tables
            .appointments
            .insert(appointment.id.clone(), appointment.clone());
        Ok(appointment)
    }

    async fn upsert_appointment(&self, appointment: &Appointment) -> StoreResult<()> {
        self.enter_write("upsert_appointment")?;
        let mut tables = self.tables.lock().unwrap();
        tables
            .appointments
            .insert(appointment.id.clone(), appointment.clone());
        Ok(())
    }

    async fn get_appointment_by_id(&self, id: &str) -> StoreResult<Option<Appointment>> {
        self.enter("get_appointment_by_id")?;
        Ok(self.tables.lock().unwrap().appointments.get(id).cloned())
    }

    async fn update_appointment(
        &self,
        id: &str,
        patch: &AppointmentPatch,
    ) -> StoreResult<Option<Appointment>> {
        self.enter("update_appointment")?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.appointments.get_mut(id).map(|appointment| {
            patch.apply(appointment);
            appointment.updated_at = now_millis();
            appointment.clone()
        }))
    }

    async fn delete_appointment(&self, id: &str) -> StoreResult<bool> {
        self.enter_write("delete_appointment")?;
        let mut tables = self.tables.lock().unwrap();
        tables.payments.retain(|_, p| p.appointment_id != id);
        Ok(tables.appointments.remove(id).is_some())
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Appointment>> {
        self.enter("list_appointments")?;
        let tables = self.tables.lock().unwrap();
        let matching = tables
            .appointments
            .values()
            .filter(|a| filter.user_id.as_ref().map_or(true, |u| &a.user_id == u))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        Ok(paged(matching, page))
    }

    async fn create_payment(&self, input: &NewPayment) -> StoreResult<Payment> {
        self.enter("create_payment")?;
        let payment = input.clone().into_payment(self.mint_id(), now_millis());
        let mut tables = self.tables.lock().unwrap();
        Self::check_payment(&tables, &payment)?;
        tables.payments.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    async fn upsert_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.enter_write("upsert_payment")?;
        let mut tables = self.tables.lock().unwrap();
        Self::check_payment(&tables, payment)?;
        tables.payments.insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn get_payment_by_id(&self, id: &str) -> StoreResult<Option<Payment>> {
        self.enter("get_payment_by_id")?;
        Ok(self.tables.lock().unwrap().payments.get(id).cloned())
    }

    async fn get_payment_by_intent_id(&self, intent_id: &str) -> StoreResult<Option<Payment>> {
        self.enter("get_payment_by_intent_id")?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .payments
            .values()
            .find(|p| p.external_payment_intent_id == intent_id)
            .cloned())
    }

    async fn update_payment(&self, id: &str, patch: &PaymentPatch) -> StoreResult<Option<Payment>> {
        self.enter("update_payment")?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.payments.get_mut(id).map(|payment| {
            patch.apply(payment);
            payment.updated_at = now_millis();
            payment.clone()
        }))
    }

    async fn update_payment_by_intent_id(
        &self,
        intent_id: &str,
        patch: &PaymentPatch,
    ) -> StoreResult<Option<Payment>> {
        self.enter("update_payment_by_intent_id")?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .payments
            .values_mut()
            .find(|p| p.external_payment_intent_id == intent_id)
            .map(|payment| {
                patch.apply(payment);
                payment.updated_at = now_millis();
                payment.clone()
            }))
    }

    async fn delete_payment(&self, id: &str) -> StoreResult<bool> {
        self.enter_write("delete_payment")?;
        Ok(self.tables.lock().unwrap().payments.remove(id).is_some())
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Payment>> {
        self.enter("list_payments")?;
        let tables = self.tables.lock().unwrap();
        let matching = tables
            .payments
            .values()
            .filter(|p| filter.user_id.as_ref().map_or(true, |u| &p.user_id == u))
            .filter(|p| {
                filter
                    .appointment_id
                    .as_ref()
                    .map_or(true, |a| &p.appointment_id == a)
            })
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        Ok(paged(matching, page))
    }
}
