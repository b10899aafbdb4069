// Relational shapes (PostgreSQL): flat snake_case columns, enums as text,
// timestamps as ISO-8601 strings written by this layer.

use crate::database::{StoreError, StoreResult};
use crate::mapper::fields::FieldValue;
use crate::models::{Appointment, Payment, User};
use crate::utils::time::{parse_iso, to_iso};
use std::str::FromStr;

/// Value bound into a SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    NullableText(Option<String>),
    Bool(bool),
    Float(f64),
    NullableFloat(Option<f64>),
}

impl FieldValue {
    pub fn to_sql(&self) -> SqlValue {
        match self {
            FieldValue::Text(v) => SqlValue::Text(v.clone()),
            FieldValue::Bool(v) => SqlValue::Bool(*v),
            FieldValue::Float(v) => SqlValue::Float(*v),
            FieldValue::Timestamp(v) => SqlValue::Text(to_iso(v)),
        }
    }
}

fn iso(value: &str) -> StoreResult<chrono::DateTime<chrono::Utc>> {
    parse_iso(value).map_err(StoreError::Malformed)
}

fn parse_enum<T: FromStr<Err = String>>(value: &str) -> StoreResult<T> {
    value.parse().map_err(StoreError::Malformed)
}

// ==================== USERS ====================

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub role: String,
    pub is_verified: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl UserRow {
    /// Bind values in `USER_FIELDS` column order
    pub fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.id),
            SqlValue::Text(self.email),
            SqlValue::Text(self.first_name),
            SqlValue::Text(self.last_name),
            SqlValue::NullableText(self.phone),
            SqlValue::NullableText(self.avatar),
            SqlValue::Text(self.role),
            SqlValue::Bool(self.is_verified),
            SqlValue::Text(self.created_at),
            SqlValue::NullableText(self.updated_at),
        ]
    }
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        UserRow {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            avatar: user.avatar.clone(),
            role: user.role.as_str().to_string(),
            is_verified: user.is_verified,
            created_at: to_iso(&user.created_at),
            updated_at: Some(to_iso(&user.updated_at)),
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let created_at = iso(&row.created_at)?;
        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            avatar: row.avatar,
            role: parse_enum(&row.role)?,
            is_verified: row.is_verified,
            created_at,
            updated_at: row.updated_at.as_deref().map(iso).transpose()?.unwrap_or(created_at),
        })
    }
}

// ==================== APPOINTMENTS ====================

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub user_id: String,
    pub service_type: String,
    pub appointment_date: String,
    pub status: String,
    pub address: String,
    pub notes: Option<String>,
    pub price: Option<f64>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl AppointmentRow {
    pub fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.id),
            SqlValue::Text(self.user_id),
            SqlValue::Text(self.service_type),
            SqlValue::Text(self.appointment_date),
            SqlValue::Text(self.status),
            SqlValue::Text(self.address),
            SqlValue::NullableText(self.notes),
            SqlValue::NullableFloat(self.price),
            SqlValue::Text(self.created_at),
            SqlValue::NullableText(self.updated_at),
        ]
    }
}

impl From<&Appointment> for AppointmentRow {
    fn from(a: &Appointment) -> Self {
        AppointmentRow {
            id: a.id.clone(),
            user_id: a.user_id.clone(),
            service_type: a.service_type.clone(),
            appointment_date: to_iso(&a.appointment_date),
            status: a.status.as_str().to_string(),
            address: a.address.clone(),
            notes: a.notes.clone(),
            price: a.price,
            created_at: to_iso(&a.created_at),
            updated_at: Some(to_iso(&a.updated_at)),
        }
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> StoreResult<Self> {
        let created_at = iso(&row.created_at)?;
        Ok(Appointment {
            id: row.id,
            user_id: row.user_id,
            service_type: row.service_type,
            appointment_date: iso(&row.appointment_date)?,
            status: parse_enum(&row.status)?,
            address: row.address,
            notes: row.notes,
            price: row.price,
            created_at,
            updated_at: row.updated_at.as_deref().map(iso).transpose()?.unwrap_or(created_at),
        })
    }
}

// ==================== PAYMENTS ====================

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: String,
    pub user_id: String,
    pub appointment_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub stripe_payment_intent_id: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl PaymentRow {
    pub fn into_values(self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.id),
            SqlValue::Text(self.user_id),
            SqlValue::Text(self.appointment_id),
            SqlValue::Float(self.amount),
            SqlValue::Text(self.currency),
            SqlValue::Text(self.status),
            SqlValue::Text(self.stripe_payment_intent_id),
            SqlValue::Text(self.created_at),
            SqlValue::NullableText(self.updated_at),
        ]
    }
}

impl From<&Payment> for PaymentRow {
    fn from(p: &Payment) -> Self {
        PaymentRow {
            id: p.id.clone(),
            user_id: p.user_id.clone(),
            appointment_id: p.appointment_id.clone(),
            amount: p.amount,
            currency: p.currency.clone(),
            status: p.status.as_str().to_string(),
            stripe_payment_intent_id: p.external_payment_intent_id.clone(),
            created_at: to_iso(&p.created_at),
            updated_at: Some(to_iso(&p.updated_at)),
        }
    }
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> StoreResult<Self> {
        let created_at = iso(&row.created_at)?;
        Ok(Payment {
            id: row.id,
            user_id: row.user_id,
            appointment_id: row.appointment_id,
            amount: row.amount,
            currency: row.currency,
            status: parse_enum(&row.status)?,
            external_payment_intent_id: row.stripe_payment_intent_id,
            created_at,
            updated_at: row.updated_at.as_deref().map(iso).transpose()?.unwrap_or(created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::fields::{APPOINTMENT_FIELDS, PAYMENT_FIELDS, USER_FIELDS};
    use crate::models::{AppointmentStatus, PaymentStatus, UserRole};
    use crate::utils::time::now_millis;
    use chrono::TimeZone;

    fn sample_appointment() -> Appointment {
        let now = now_millis();
        Appointment {
            id: "64f1c2a9e4b0a1b2c3d4e5f6".into(),
            user_id: "u1".into(),
            service_type: "deep-clean".into(),
            appointment_date: chrono::Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap(),
            status: AppointmentStatus::Confirmed,
            address: "12 Rue Sainte-Catherine".into(),
            notes: Some("Side door".into()),
            price: Some(149.0),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_appointment_row_is_snake_case_iso() {
        let appointment = sample_appointment();
        let row = AppointmentRow::from(&appointment);
        assert_eq!(row.appointment_date, "2024-06-03T09:30:00.000Z");
        assert_eq!(row.status, "confirmed");
        assert_eq!(Appointment::try_from(row).unwrap(), appointment);
    }

    #[test]
    fn test_unknown_enum_text_is_malformed() {
        let mut row = AppointmentRow::from(&sample_appointment());
        row.status = "rescheduled".into();
        assert!(matches!(Appointment::try_from(row), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_values_match_column_tables() {
        let now = now_millis();
        let user = User {
            id: "u1".into(),
            email: "a@b.com".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: None,
            avatar: None,
            role: UserRole::Client,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(UserRow::from(&user).into_values().len(), USER_FIELDS.len());
        assert_eq!(
            AppointmentRow::from(&sample_appointment()).into_values().len(),
            APPOINTMENT_FIELDS.len()
        );

        let payment = Payment {
            id: "p1".into(),
            user_id: "u1".into(),
            appointment_id: "a1".into(),
            amount: 10.0,
            currency: "usd".into(),
            status: PaymentStatus::Refunded,
            external_payment_intent_id: "pi_1".into(),
            created_at: now,
            updated_at: now,
        };
        let values = PaymentRow::from(&payment).into_values();
        assert_eq!(values.len(), PAYMENT_FIELDS.len());
        assert_eq!(values[5], SqlValue::Text("refunded".into()));
    }

    #[test]
    fn test_null_updated_at_falls_back_to_created_at() {
        let row = PaymentRow {
            id: "p1".into(),
            user_id: "u1".into(),
            appointment_id: "a1".into(),
            amount: 0.0,
            currency: "cad".into(),
            status: "pending".into(),
            stripe_payment_intent_id: "pi_9".into(),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: None,
        };
        let payment = Payment::try_from(row).unwrap();
        assert_eq!(payment.updated_at, payment.created_at);
    }

    #[test]
    fn test_timestamp_field_value_is_iso_text() {
        let dt = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            FieldValue::Timestamp(dt).to_sql(),
            SqlValue::Text("2024-01-02T03:04:05.000Z".into())
        );
    }
}
