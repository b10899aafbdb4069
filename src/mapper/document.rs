// Document-store shapes (MongoDB): camelCase fields, `_id` as ObjectId when the
// id is a native 24-hex token, BSON datetimes for every timestamp.

use crate::database::{StoreError, StoreResult};
use crate::mapper::fields::FieldValue;
use crate::models::{
    Appointment, AppointmentStatus, Payment, PaymentStatus, User, UserRole,
};
use crate::utils::time::{from_bson, to_bson};
use mongodb::bson::{oid::ObjectId, Bson, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Native ids become ObjectIds; ids minted by the relational store stay strings
pub fn id_to_bson(id: &str) -> Bson {
    match ObjectId::parse_str(id) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.to_string()),
    }
}

pub fn id_from_bson(value: &Bson) -> StoreResult<String> {
    match value {
        Bson::ObjectId(oid) => Ok(oid.to_hex()),
        Bson::String(s) => Ok(s.clone()),
        other => Err(StoreError::Malformed(format!(
            "expected ObjectId or string _id, got {:?}",
            other.element_type()
        ))),
    }
}

impl FieldValue {
    pub fn to_bson(&self) -> Bson {
        match self {
            FieldValue::Text(v) => Bson::String(v.clone()),
            FieldValue::Bool(v) => Bson::Boolean(*v),
            FieldValue::Float(v) => Bson::Double(*v),
            FieldValue::Timestamp(v) => Bson::DateTime(to_bson(v)),
        }
    }
}

fn timestamp(value: BsonDateTime) -> StoreResult<chrono::DateTime<chrono::Utc>> {
    from_bson(value).map_err(StoreError::Malformed)
}

// ==================== USERS ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: Bson,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub avatar: Option<String>,
    pub role: UserRole,
    #[serde(default)]
    pub is_verified: bool,
    pub created_at: BsonDateTime,
    /// Older documents were written without it
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<BsonDateTime>,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        UserDocument {
            id: id_to_bson(&user.id),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            is_verified: user.is_verified,
            created_at: to_bson(&user.created_at),
            updated_at: Some(to_bson(&user.updated_at)),
        }
    }
}

impl TryFrom<UserDocument> for User {
    type Error = StoreError;

    fn try_from(doc: UserDocument) -> StoreResult<Self> {
        let created_at = timestamp(doc.created_at)?;
        Ok(User {
            id: id_from_bson(&doc.id)?,
            email: doc.email,
            first_name: doc.first_name,
            last_name: doc.last_name,
            phone: doc.phone,
            avatar: doc.avatar,
            role: doc.role,
            is_verified: doc.is_verified,
            created_at,
            updated_at: doc.updated_at.map(timestamp).transpose()?.unwrap_or(created_at),
        })
    }
}

// ==================== APPOINTMENTS ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDocument {
    #[serde(rename = "_id")]
    pub id: Bson,
    pub user_id: String,
    pub service_type: String,
    pub appointment_date: BsonDateTime,
    pub status: AppointmentStatus,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<f64>,
    pub created_at: BsonDateTime,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<BsonDateTime>,
}

impl From<&Appointment> for AppointmentDocument {
    fn from(a: &Appointment) -> Self {
        AppointmentDocument {
            id: id_to_bson(&a.id),
            user_id: a.user_id.clone(),
            service_type: a.service_type.clone(),
            appointment_date: to_bson(&a.appointment_date),
            status: a.status,
            address: a.address.clone(),
            notes: a.notes.clone(),
            price: a.price,
            created_at: to_bson(&a.created_at),
            updated_at: Some(to_bson(&a.updated_at)),
        }
    }
}

impl TryFrom<AppointmentDocument> for Appointment {
    type Error = StoreError;

    fn try_from(doc: AppointmentDocument) -> StoreResult<Self> {
        let created_at = timestamp(doc.created_at)?;
        Ok(Appointment {
            id: id_from_bson(&doc.id)?,
            user_id: doc.user_id,
            service_type: doc.service_type,
            appointment_date: timestamp(doc.appointment_date)?,
            status: doc.status,
            address: doc.address,
            notes: doc.notes,
            price: doc.price,
            created_at,
            updated_at: doc.updated_at.map(timestamp).transpose()?.unwrap_or(created_at),
        })
    }
}

// ==================== PAYMENTS ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDocument {
    #[serde(rename = "_id")]
    pub id: Bson,
    pub user_id: String,
    pub appointment_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub stripe_payment_intent_id: String,
    pub created_at: BsonDateTime,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_at: Option<BsonDateTime>,
}

impl From<&Payment> for PaymentDocument {
    fn from(p: &Payment) -> Self {
        PaymentDocument {
            id: id_to_bson(&p.id),
            user_id: p.user_id.clone(),
            appointment_id: p.appointment_id.clone(),
            amount: p.amount,
            currency: p.currency.clone(),
            status: p.status,
            stripe_payment_intent_id: p.external_payment_intent_id.clone(),
            created_at: to_bson(&p.created_at),
            updated_at: Some(to_bson(&p.updated_at)),
        }
    }
}

impl TryFrom<PaymentDocument> for Payment {
    type Error = StoreError;

    fn try_from(doc: PaymentDocument) -> StoreResult<Self> {
        let created_at = timestamp(doc.created_at)?;
        Ok(Payment {
            id: id_from_bson(&doc.id)?,
            user_id: doc.user_id,
            appointment_id: doc.appointment_id,
            amount: doc.amount,
            currency: doc.currency,
            status: doc.status,
            external_payment_intent_id: doc.stripe_payment_intent_id,
            created_at,
            updated_at: doc.updated_at.map(timestamp).transpose()?.unwrap_or(created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::now_millis;
    use mongodb::bson::{doc, from_document, to_document};

    fn sample_user(id: &str) -> User {
        let now = now_millis();
        User {
            id: id.to_string(),
            email: "ana@example.com".into(),
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            phone: None,
            avatar: Some("https://cdn.example.com/a.png".into()),
            role: UserRole::Client,
            is_verified: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_native_ids_become_object_ids() {
        let oid = ObjectId::new();
        assert_eq!(id_to_bson(&oid.to_hex()), Bson::ObjectId(oid));

        let uuid = "5b0c8f0e-7a0c-4a54-9e43-5f5d1f0b8a11";
        assert_eq!(id_to_bson(uuid), Bson::String(uuid.to_string()));
        assert_eq!(id_from_bson(&id_to_bson(uuid)).unwrap(), uuid);
    }

    #[test]
    fn test_non_string_id_is_malformed() {
        assert!(matches!(id_from_bson(&Bson::Int32(7)), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn test_user_document_uses_camel_case() {
        let user = sample_user(&ObjectId::new().to_hex());
        let document = to_document(&UserDocument::from(&user)).unwrap();

        assert!(document.contains_key("_id"));
        assert!(document.contains_key("firstName"));
        assert!(document.contains_key("isVerified"));
        assert!(document.get_datetime("createdAt").is_ok());
        // absent optionals are not written as null
        assert!(!document.contains_key("phone"));
        assert_eq!(document.get_str("role").unwrap(), "client");
    }

    #[test]
    fn test_user_survives_document_form() {
        let user = sample_user("7f1b2c3d-0000-4000-8000-000000000001");
        let document = to_document(&UserDocument::from(&user)).unwrap();
        let back: UserDocument = from_document(document).unwrap();
        assert_eq!(User::try_from(back).unwrap(), user);
    }

    #[test]
    fn test_missing_updated_at_falls_back_to_created_at() {
        let created = BsonDateTime::from_millis(1_714_557_600_000);
        let raw = doc! {
            "_id": ObjectId::new(),
            "email": "old@example.com",
            "firstName": "Old",
            "lastName": "Record",
            "role": "admin",
            "createdAt": created,
        };
        let user = User::try_from(from_document::<UserDocument>(raw).unwrap()).unwrap();
        assert_eq!(user.updated_at, user.created_at);
        assert!(!user.is_verified);
        assert_eq!(user.role, UserRole::Admin);
    }

    #[test]
    fn test_payment_intent_field_is_renamed() {
        let now = now_millis();
        let payment = Payment {
            id: ObjectId::new().to_hex(),
            user_id: "u1".into(),
            appointment_id: "a1".into(),
            amount: 120.5,
            currency: "cad".into(),
            status: PaymentStatus::Pending,
            external_payment_intent_id: "pi_123".into(),
            created_at: now,
            updated_at: now,
        };
        let document = to_document(&PaymentDocument::from(&payment)).unwrap();
        assert_eq!(document.get_str("stripePaymentIntentId").unwrap(), "pi_123");
        assert_eq!(document.get_f64("amount").unwrap(), 120.5);
    }

    #[test]
    fn test_field_values_to_bson() {
        let now = now_millis();
        assert_eq!(FieldValue::Float(2.5).to_bson(), Bson::Double(2.5));
        assert_eq!(
            FieldValue::Timestamp(now).to_bson(),
            Bson::DateTime(to_bson(&now))
        );
    }
}
