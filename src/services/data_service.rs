// ==================== DATA SERVICE (OPERATION ROUTER) ====================
// Every domain operation: pick the active store, run there, mirror writes to
// the other store, and retry once on the other store if the first attempt
// fails for a reason other than validation.

use super::mirror::{MirrorOp, MirrorWriter};
use crate::database::{
    ActiveStoreSelector, FailoverPolicy, HealthProber, Store, StoreContext, StoreError, StoreKind,
    StoreResult, ValidationFailure,
};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus, BulkFailure,
    BulkUpdateOutcome, NewAppointment, NewPayment, NewUser, Page, Pagination, Payment,
    PaymentFilter, PaymentPatch, PaymentStatus, User, UserFilter, UserOverview, UserPatch,
    UserStatistics,
};
use crate::utils::error::DataError;
use crate::utils::time::now_millis;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct DataService {
    ctx: StoreContext,
    selector: ActiveStoreSelector,
    mirror: MirrorWriter,
}

impl DataService {
    pub fn new(ctx: StoreContext, policy: FailoverPolicy, probe_timeout: Duration) -> Self {
        let prober = HealthProber::new(ctx.clone(), probe_timeout);
        Self {
            selector: ActiveStoreSelector::new(prober, policy),
            mirror: MirrorWriter::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    pub fn selector(&self) -> &ActiveStoreSelector {
        &self.selector
    }

    /// Runs `call` on the selected store, then once on the other store if it
    /// failed with a retryable error. Returns the value and the store that served it.
    async fn route<T, F, Fut>(&self, op: &'static str, call: F) -> Result<(T, StoreKind), DataError>
    where
        F: Fn(Arc<dyn Store>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let first = self.selector.select_active_store().await;

        let err = match call(self.ctx.store(first).clone()).await {
            Ok(value) => return Ok((value, first)),
            Err(StoreError::Validation(failure)) => return Err(DataError::Validation(failure)),
            Err(e) => e,
        };

        let fallback = first.other();
        log::warn!(
            "⚠️  {} failed on {}: {} (retrying on {})",
            op,
            first,
            err,
            fallback
        );

        match call(self.ctx.store(fallback).clone()).await {
            Ok(value) => {
                log::info!("🔁 {} served by fallback store {}", op, fallback);
                Ok((value, fallback))
            }
            Err(StoreError::Validation(failure)) => Err(DataError::Validation(failure)),
            Err(e) => {
                log::error!("❌ {} failed on {} and {}: {}", op, first, fallback, e);
                Err(DataError::exhausted(first, fallback, &e))
            }
        }
    }

    fn replicate(&self, op: MirrorOp, served_by: StoreKind) {
        // Detached: the router never waits on the mirror
        let _ = self.mirror.mirror(op, served_by.other());
    }

    // ==================== USERS ====================

    pub async fn create_user(&self, input: &NewUser) -> Result<User, DataError> {
        let (user, served_by) = self
            .route("create_user", |store| async move { store.create_user(input).await })
            .await?;

        log::info!("👤 User {} created on {}", user.id, served_by);
        self.replicate(MirrorOp::UpsertUser(user.clone()), served_by);
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, DataError> {
        self.route("get_user_by_id", |store| async move { store.get_user_by_id(id).await })
            .await
            .map(|(user, _)| user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DataError> {
        self.route("get_user_by_email", |store| async move {
            store.get_user_by_email(email).await
        })
        .await
        .map(|(user, _)| user)
    }

    pub async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<Option<User>, DataError> {
        let (user, served_by) = self
            .route("update_user", |store| async move { store.update_user(id, patch).await })
            .await?;

        if let Some(user) = &user {
            self.replicate(MirrorOp::UpsertUser(user.clone()), served_by);
        }
        Ok(user)
    }

    /// Removes the user with their appointments and payments
    pub async fn delete_user(&self, id: &str) -> Result<bool, DataError> {
        let (deleted, served_by) = self
            .route("delete_user", |store| async move { store.delete_user(id).await })
            .await?;

        if deleted {
            log::info!("🗑️  User {} deleted on {}", id, served_by);
            self.replicate(MirrorOp::DeleteUser(id.to_string()), served_by);
        }
        Ok(deleted)
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        page: &Pagination,
    ) -> Result<Page<User>, DataError> {
        self.route("list_users", |store| async move {
            store.list_users(filter, page).await
        })
        .await
        .map(|(page, _)| page)
    }

    /// Totals for the admin panel; spending counts completed payments only
    pub async fn user_statistics(&self, user_id: &str) -> Result<UserStatistics, DataError> {
        let appointments = self.list_user_appointments(user_id).await?;
        let payments = self.list_user_payments(user_id).await?;

        Ok(UserStatistics {
            total_appointments: appointments.len(),
            completed_appointments: appointments
                .iter()
                .filter(|a| a.status == AppointmentStatus::Completed)
                .count(),
            total_payments: payments.len(),
            total_spent: payments
                .iter()
                .filter(|p| p.status == PaymentStatus::Completed)
                .map(|p| p.amount)
                .sum(),
        })
    }

    /// Role, verification and recent-registration counts over every user
    pub async fn user_overview(&self) -> Result<UserOverview, DataError> {
        let users = self
            .list_users(&UserFilter::default(), &Pagination::unbounded())
            .await?;
        Ok(UserOverview::from_users(&users.data, users.total, now_millis()))
    }

    /// Applies one patch to every id concurrently. Each id is routed and
    /// mirrored on its own, so one failure does not stop the others.
    pub async fn bulk_update_users(
        &self,
        ids: &[String],
        patch: &UserPatch,
    ) -> Result<BulkUpdateOutcome, DataError> {
        if ids.is_empty() {
            return Err(DataError::Validation(ValidationFailure::schema(
                Some("userIds"),
                "at least one user id is required",
            )));
        }
        if patch.is_empty() {
            return Err(DataError::Validation(ValidationFailure::schema(
                Some("updates"),
                "no fields to update",
            )));
        }

        let results = join_all(ids.iter().map(|id| self.update_user(id, patch))).await;

        let mut outcome = BulkUpdateOutcome::default();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(Some(_)) => outcome.successful.push(id.clone()),
                Ok(None) => outcome.failed.push(BulkFailure {
                    id: id.clone(),
                    error: "User not found".to_string(),
                }),
                Err(e) => outcome.failed.push(BulkFailure {
                    id: id.clone(),
                    error: e.to_string(),
                }),
            }
        }

        log::info!(
            "👥 Bulk update: {} updated, {} failed",
            outcome.successful.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    // ==================== APPOINTMENTS ====================

    pub async fn create_appointment(
        &self,
        input: &NewAppointment,
    ) -> Result<Appointment, DataError> {
        let (appointment, served_by) = self
            .route("create_appointment", |store| async move {
                store.create_appointment(input).await
            })
            .await?;

        log::info!("📅 Appointment {} created on {}", appointment.id, served_by);
        self.replicate(MirrorOp::UpsertAppointment(appointment.clone()), served_by);
        Ok(appointment)
    }

    pub async fn get_appointment_by_id(&self, id: &str) -> Result<Option<Appointment>, DataError> {
        self.route("get_appointment_by_id", |store| async move {
            store.get_appointment_by_id(id).await
        })
        .await
        .map(|(appointment, _)| appointment)
    }

    pub async fn update_appointment(
        &self,
        id: &str,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>, DataError> {
        let (appointment, served_by) = self
            .route("update_appointment", |store| async move {
                store.update_appointment(id, patch).await
            })
            .await?;

        if let Some(appointment) = &appointment {
            self.replicate(MirrorOp::UpsertAppointment(appointment.clone()), served_by);
        }
        Ok(appointment)
    }

    pub async fn update_appointment_status(
        &self,
        id: &str,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, DataError> {
        self.update_appointment(id, &AppointmentPatch::status(status))
            .await
    }

    /// Removes the appointment with its payments
    pub async fn delete_appointment(&self, id: &str) -> Result<bool, DataError> {
        let (deleted, served_by) = self
            .route("delete_appointment", |store| async move {
                store.delete_appointment(id).await
            })
            .await?;

        if deleted {
            self.replicate(MirrorOp::DeleteAppointment(id.to_string()), served_by);
        }
        Ok(deleted)
    }

    pub async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: &Pagination,
    ) -> Result<Page<Appointment>, DataError> {
        self.route("list_appointments", |store| async move {
            store.list_appointments(filter, page).await
        })
        .await
        .map(|(page, _)| page)
    }

    pub async fn list_user_appointments(
        &self,
        user_id: &str,
    ) -> Result<Vec<Appointment>, DataError> {
        let filter = AppointmentFilter::for_user(user_id);
        self.list_appointments(&filter, &Pagination::unbounded())
            .await
            .map(|page| page.data)
    }

    // ==================== PAYMENTS ====================

    pub async fn create_payment(&self, input: &NewPayment) -> Result<Payment, DataError> {
        let (payment, served_by) = self
            .route("create_payment", |store| async move {
                store.create_payment(input).await
            })
            .await?;

        log::info!("💳 Payment {} created on {}", payment.id, served_by);
        self.replicate(MirrorOp::UpsertPayment(payment.clone()), served_by);
        Ok(payment)
    }

    pub async fn get_payment_by_id(&self, id: &str) -> Result<Option<Payment>, DataError> {
        self.route("get_payment_by_id", |store| async move {
            store.get_payment_by_id(id).await
        })
        .await
        .map(|(payment, _)| payment)
    }

    pub async fn get_payment_by_intent_id(
        &self,
        intent_id: &str,
    ) -> Result<Option<Payment>, DataError> {
        self.route("get_payment_by_intent_id", |store| async move {
            store.get_payment_by_intent_id(intent_id).await
        })
        .await
        .map(|(payment, _)| payment)
    }

    pub async fn update_payment(
        &self,
        id: &str,
        patch: &PaymentPatch,
    ) -> Result<Option<Payment>, DataError> {
        let (payment, served_by) = self
            .route("update_payment", |store| async move {
                store.update_payment(id, patch).await
            })
            .await?;

        if let Some(payment) = &payment {
            self.replicate(MirrorOp::UpsertPayment(payment.clone()), served_by);
        }
        Ok(payment)
    }

    /// Status change keyed by the payment provider's intent id
    pub async fn update_payment_status(
        &self,
        intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, DataError> {
        let patch = PaymentPatch::status(status);
        let (payment, served_by) = self
            .route("update_payment_status", |store| {
                let patch = &patch;
                async move { store.update_payment_by_intent_id(intent_id, patch).await }
            })
            .await?;

        if let Some(payment) = &payment {
            self.replicate(MirrorOp::UpsertPayment(payment.clone()), served_by);
        }
        Ok(payment)
    }

    pub async fn delete_payment(&self, id: &str) -> Result<bool, DataError> {
        let (deleted, served_by) = self
            .route("delete_payment", |store| async move {
                store.delete_payment(id).await
            })
            .await?;

        if deleted {
            self.replicate(MirrorOp::DeletePayment(id.to_string()), served_by);
        }
        Ok(deleted)
    }

    pub async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> Result<Page<Payment>, DataError> {
        self.route("list_payments", |store| async move {
            store.list_payments(filter, page).await
        })
        .await
        .map(|(page, _)| page)
    }

    pub async fn list_user_payments(&self, user_id: &str) -> Result<Vec<Payment>, DataError> {
        let filter = PaymentFilter::for_user(user_id);
        self.list_payments(&filter, &Pagination::unbounded())
            .await
            .map(|page| page.data)
    }
}
