// ==================== PAYMENT LIFECYCLE ====================
// Applies payment-intent status changes (confirmation calls and provider
// webhooks) to the payment and its appointment.

use super::data_service::DataService;
use crate::database::ValidationFailure;
use crate::models::{AppointmentStatus, Pagination, Payment, PaymentFilter, PaymentStatus};
use crate::utils::error::DataError;
use std::fmt;

pub const EVENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

/// Payment-intent status as reported by the payment provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Canceled,
    Processing,
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Other(String),
}

impl IntentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "succeeded" => IntentStatus::Succeeded,
            "canceled" => IntentStatus::Canceled,
            "processing" => IntentStatus::Processing,
            "requires_payment_method" => IntentStatus::RequiresPaymentMethod,
            "requires_confirmation" => IntentStatus::RequiresConfirmation,
            "requires_action" => IntentStatus::RequiresAction,
            other => IntentStatus::Other(other.to_string()),
        }
    }

    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            IntentStatus::Succeeded => PaymentStatus::Completed,
            IntentStatus::Canceled => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn appointment_status(&self) -> AppointmentStatus {
        match self {
            IntentStatus::Succeeded => AppointmentStatus::Confirmed,
            _ => AppointmentStatus::Pending,
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntentStatus::Succeeded => "succeeded",
            IntentStatus::Canceled => "canceled",
            IntentStatus::Processing => "processing",
            IntentStatus::RequiresPaymentMethod => "requires_payment_method",
            IntentStatus::RequiresConfirmation => "requires_confirmation",
            IntentStatus::RequiresAction => "requires_action",
            IntentStatus::Other(other) => other,
        };
        f.write_str(s)
    }
}

impl DataService {
    /// Records the intent outcome on the payment; a completed payment also
    /// confirms its appointment.
    pub async fn confirm_intent(
        &self,
        intent_id: &str,
        status: &IntentStatus,
    ) -> Result<Option<Payment>, DataError> {
        let payment = self
            .update_payment_status(intent_id, status.payment_status())
            .await?;

        let Some(payment) = payment else {
            log::warn!("⚠️  No payment found for intent {}", intent_id);
            return Ok(None);
        };

        if payment.status == PaymentStatus::Completed {
            self.update_appointment_status(&payment.appointment_id, status.appointment_status())
                .await?;
            log::info!(
                "✅ Payment {} completed, appointment {} confirmed",
                payment.id,
                payment.appointment_id
            );
        }

        Ok(Some(payment))
    }

    /// Handles a provider webhook. Unknown event types are ignored.
    pub async fn apply_webhook_event(
        &self,
        event_type: &str,
        intent_id: &str,
    ) -> Result<Option<Payment>, DataError> {
        match event_type {
            EVENT_INTENT_SUCCEEDED => self.confirm_intent(intent_id, &IntentStatus::Succeeded).await,
            EVENT_INTENT_FAILED => {
                let payment = self
                    .update_payment_status(intent_id, PaymentStatus::Failed)
                    .await?;
                log::info!("💳 Intent {} failed", intent_id);
                Ok(payment)
            }
            other => {
                log::info!("ℹ️  Ignoring webhook event {}", other);
                Ok(None)
            }
        }
    }

    /// Rejects a second pending or completed payment for the same appointment
    pub async fn ensure_no_open_payment(
        &self,
        user_id: &str,
        appointment_id: &str,
    ) -> Result<(), DataError> {
        let filter = PaymentFilter {
            user_id: Some(user_id.to_string()),
            appointment_id: Some(appointment_id.to_string()),
            status: None,
        };
        let existing = self
            .list_payments(&filter, &Pagination::unbounded())
            .await?;

        if existing.data.iter().any(|p| p.status.is_open()) {
            return Err(DataError::Validation(ValidationFailure::uniqueness(
                Some("appointmentId"),
                "an open payment already exists for this appointment",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{FailoverPolicy, StoreKind, ValidationKind};
    use crate::services::data_service::tests::{
        harness, new_appointment, new_payment, new_user,
    };

    #[test]
    fn test_intent_status_mapping() {
        let cases = [
            ("succeeded", PaymentStatus::Completed, AppointmentStatus::Confirmed),
            ("canceled", PaymentStatus::Failed, AppointmentStatus::Pending),
            ("processing", PaymentStatus::Pending, AppointmentStatus::Pending),
            ("requires_payment_method", PaymentStatus::Pending, AppointmentStatus::Pending),
            ("something_new", PaymentStatus::Pending, AppointmentStatus::Pending),
        ];
        for (raw, payment, appointment) in cases {
            let status = IntentStatus::parse(raw);
            assert_eq!(status.payment_status(), payment, "{}", raw);
            assert_eq!(status.appointment_status(), appointment, "{}", raw);
            assert_eq!(status.to_string(), raw);
        }
    }

    #[tokio::test]
    async fn test_succeeded_event_confirms_appointment() {
        let h = harness(StoreKind::Mongo, FailoverPolicy::PrimaryOnly);
        let user = h.service.create_user(&new_user("pay@example.com")).await.unwrap();
        let appointment = h
            .service
            .create_appointment(&new_appointment(&user.id))
            .await
            .unwrap();
        h.service
            .create_payment(&new_payment(&user.id, &appointment.id, "pi_ok"))
            .await
            .unwrap();

        let payment = h
            .service
            .apply_webhook_event(EVENT_INTENT_SUCCEEDED, "pi_ok")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        let appointment = h
            .service
            .get_appointment_by_id(&appointment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_failed_event_leaves_appointment_pending() {
        let h = harness(StoreKind::Postgres, FailoverPolicy::PrimaryOnly);
        let appointment = h
            .service
            .create_appointment(&new_appointment("u-fail"))
            .await
            .unwrap();
        h.service
            .create_payment(&new_payment("u-fail", &appointment.id, "pi_fail"))
            .await
            .unwrap();

        let payment = h
            .service
            .apply_webhook_event(EVENT_INTENT_FAILED, "pi_fail")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Failed);
        let appointment = h
            .service
            .get_appointment_by_id(&appointment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_event_and_intent_are_ignored() {
        let h = harness(StoreKind::Mongo, FailoverPolicy::PrimaryOnly);
        assert_eq!(
            h.service
                .apply_webhook_event("charge.refunded", "pi_x")
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            h.service
                .confirm_intent("pi_missing", &IntentStatus::Succeeded)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_open_payment_blocks_a_second_one() {
        let h = harness(StoreKind::Mongo, FailoverPolicy::PrimaryOnly);
        h.service.ensure_no_open_payment("u1", "a1").await.unwrap();

        h.service
            .create_payment(&new_payment("u1", "a1", "pi_first"))
            .await
            .unwrap();
        let err = h.service.ensure_no_open_payment("u1", "a1").await.unwrap_err();
        assert_eq!(err.validation().map(|f| f.kind), Some(ValidationKind::Uniqueness));

        h.service
            .update_payment_status("pi_first", PaymentStatus::Failed)
            .await
            .unwrap();
        assert!(h.service.ensure_no_open_payment("u1", "a1").await.is_ok());
    }
}
