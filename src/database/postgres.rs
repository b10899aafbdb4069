// ==================== POSTGRESQL (RELATIONAL STORE) ====================
// Supabase-compatible schema (see migrations/). Ids default to a UUID minted by
// the database; filtering, search and counting are all pushed into SQL.

use super::{Store, StoreError, StoreKind, StoreResult, ValidationFailure};
use crate::config::PostgresSettings;
use crate::mapper::fields::{
    self, canonical_for_column, column_list, column_name, FieldChange,
};
use crate::mapper::{FilterFields, PatchFields, RecordMapping, SqlValue};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentPatch, NewAppointment, NewPayment, NewUser, Page,
    Pagination, Payment, PaymentFilter, PaymentPatch, User, UserFilter, UserPatch,
};
use crate::utils::time::now_millis;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;

/// Columns searched by the free-text user filter
const USER_SEARCH_COLUMNS: &[&str] = &["first_name", "last_name", "email"];

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
                let field = db.constraint().and_then(constraint_field);
                classify_sqlstate(&code, field.as_deref(), db.message())
                    .unwrap_or_else(|| StoreError::Unavailable(err.to_string()))
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::Malformed(err.to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

fn classify_sqlstate(code: &str, field: Option<&str>, message: &str) -> Option<StoreError> {
    match code {
        // unique_violation
        "23505" => Some(StoreError::Validation(ValidationFailure::uniqueness(
            field,
            "a record with this value already exists",
        ))),
        // not_null_violation, check_violation, data exceptions (22xxx)
        "23502" | "23514" => Some(StoreError::Validation(ValidationFailure::schema(
            field,
            message.to_string(),
        ))),
        c if c.starts_with("22") => Some(StoreError::Validation(ValidationFailure::schema(
            field,
            message.to_string(),
        ))),
        _ => None,
    }
}

/// `payments_stripe_payment_intent_id_key` -> `externalPaymentIntentId`
fn constraint_field(constraint: &str) -> Option<String> {
    let tables = [
        (User::COLLECTION, fields::USER_FIELDS),
        (Appointment::COLLECTION, fields::APPOINTMENT_FIELDS),
        (Payment::COLLECTION, fields::PAYMENT_FIELDS),
    ];

    tables.iter().find_map(|(table, map)| {
        let rest = constraint.strip_prefix(table)?.strip_prefix('_')?;
        let column = rest
            .strip_suffix("_key")
            .or_else(|| rest.strip_suffix("_check"))
            .unwrap_or(rest);
        canonical_for_column(map, column).map(str::to_string)
    })
}

/// `%`, `_` and `\` are literal in user-supplied search terms
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: SqlValue) {
    match value {
        SqlValue::Text(v) => builder.push_bind(v),
        SqlValue::NullableText(v) => builder.push_bind(v),
        SqlValue::Bool(v) => builder.push_bind(v),
        SqlValue::Float(v) => builder.push_bind(v),
        SqlValue::NullableFloat(v) => builder.push_bind(v),
    };
}

/// Appends `WHERE ...` for exact conditions plus an optional ILIKE search
fn push_where<E: RecordMapping>(
    builder: &mut QueryBuilder<'_, Postgres>,
    conditions: &[FieldChange],
    search: Option<&str>,
) -> StoreResult<()> {
    let mut separator = " WHERE ";

    for (field, value) in conditions {
        builder.push(separator);
        separator = " AND ";
        builder.push(column_name(E::FIELDS, field)?);
        builder.push(" = ");
        push_value(builder, value.to_sql());
    }

    if let Some(term) = search {
        builder.push(separator);
        let pattern = like_pattern(term);
        builder.push("(");
        for (i, column) in USER_SEARCH_COLUMNS.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*column);
            builder.push(" ILIKE ");
            builder.push_bind(pattern.clone());
        }
        builder.push(")");
    }

    Ok(())
}

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Lazy pool: the process starts even while PostgreSQL is unreachable
    pub fn connect(settings: &PostgresSettings, timeout: Duration) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(timeout)
            .connect_lazy(&settings.url)?;

        log::info!(
            "🐘 PostgreSQL pool ready (max connections: {})",
            settings.max_connections
        );

        Ok(Self { pool })
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        log::info!("🔧 Running PostgreSQL migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;
        log::info!("✅ PostgreSQL schema ready");
        Ok(())
    }

    // ==================== GENERIC OPERATIONS ====================

    /// INSERT without the id column; the database mints it and RETURNING reads it back
    async fn insert_returning<E: RecordMapping>(&self, draft: &E) -> StoreResult<E> {
        let columns = &E::FIELDS[1..];
        let values = E::row_values(draft.to_row()).into_iter().skip(1);

        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO ");
        builder.push(E::COLLECTION);
        builder.push(" (");
        builder.push(columns.iter().map(|f| f.column).collect::<Vec<_>>().join(", "));
        builder.push(") VALUES (");
        for (i, value) in values.enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, value);
        }
        builder.push(") RETURNING ");
        builder.push(column_list(E::FIELDS));

        let row = builder
            .build_query_as::<E::Row>()
            .fetch_one(&self.pool)
            .await?;
        E::from_row(row)
    }

    async fn upsert<E: RecordMapping>(&self, entity: &E) -> StoreResult<()> {
        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO ");
        builder.push(E::COLLECTION);
        builder.push(" (");
        builder.push(column_list(E::FIELDS));
        builder.push(") VALUES (");
        for (i, value) in E::row_values(entity.to_row()).into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, value);
        }
        builder.push(") ON CONFLICT (id) DO UPDATE SET ");
        let assignments = E::FIELDS[1..]
            .iter()
            .map(|f| format!("{0} = EXCLUDED.{0}", f.column))
            .collect::<Vec<_>>()
            .join(", ");
        builder.push(assignments);

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn find_where<E: RecordMapping>(
        &self,
        canonical: &str,
        value: &str,
    ) -> StoreResult<Option<E>> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder.push(column_list(E::FIELDS));
        builder.push(" FROM ");
        builder.push(E::COLLECTION);
        builder.push(" WHERE ");
        builder.push(column_name(E::FIELDS, canonical)?);
        builder.push(" = ");
        builder.push_bind(value.to_string());
        builder.push(" LIMIT 1");

        builder
            .build_query_as::<E::Row>()
            .fetch_optional(&self.pool)
            .await?
            .map(E::from_row)
            .transpose()
    }

    async fn update_where<E: RecordMapping>(
        &self,
        canonical: &str,
        value: &str,
        changes: Vec<FieldChange>,
    ) -> StoreResult<Option<E>> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE ");
        builder.push(E::COLLECTION);
        builder.push(" SET ");
        for (field, change) in &changes {
            builder.push(column_name(E::FIELDS, field)?);
            builder.push(" = ");
            push_value(&mut builder, change.to_sql());
            builder.push(", ");
        }
        builder.push(column_name(E::FIELDS, "updatedAt")?);
        builder.push(" = ");
        push_value(
            &mut builder,
            fields::FieldValue::Timestamp(now_millis()).to_sql(),
        );
        builder.push(" WHERE ");
        builder.push(column_name(E::FIELDS, canonical)?);
        builder.push(" = ");
        builder.push_bind(value.to_string());
        builder.push(" RETURNING ");
        builder.push(column_list(E::FIELDS));

        builder
            .build_query_as::<E::Row>()
            .fetch_optional(&self.pool)
            .await?
            .map(E::from_row)
            .transpose()
    }

    async fn list<E: RecordMapping>(
        &self,
        conditions: Vec<FieldChange>,
        search: Option<&str>,
        page: &Pagination,
    ) -> StoreResult<Page<E>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
        count.push(E::COLLECTION);
        push_where::<E>(&mut count, &conditions, search)?;
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select.push(column_list(E::FIELDS));
        select.push(" FROM ");
        select.push(E::COLLECTION);
        push_where::<E>(&mut select, &conditions, search)?;
        select.push(" ORDER BY ");
        select.push(column_name(E::FIELDS, "createdAt")?);
        select.push(" DESC, id DESC LIMIT ");
        select.push_bind(i64::from(page.limit));
        select.push(" OFFSET ");
        select.push_bind(i64::from(page.offset));

        let rows = select
            .build_query_as::<E::Row>()
            .fetch_all(&self.pool)
            .await?;

        let data = rows
            .into_iter()
            .map(E::from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page {
            data,
            total: total.max(0) as u64,
        })
    }

    /// Runs `DELETE FROM table WHERE column = value` for each step in one transaction.
    /// Returns the rows removed by the last step.
    async fn cascade_delete(&self, steps: &[(&str, &str)], value: &str) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let mut last = 0;
        for (table, column) in steps {
            let sql = format!("DELETE FROM {} WHERE {} = $1", table, column);
            last = sqlx::query(&sql)
                .bind(value)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(last)
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Postgres
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1 FROM _health LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(())
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.run_migrations().await
    }

    // ==================== USERS ====================

    async fn create_user(&self, input: &NewUser) -> StoreResult<User> {
        let draft = input.clone().into_user(String::new(), now_millis());
        let user = self.insert_returning(&draft).await?;
        log::debug!("🐘 user {} created", user.id);
        Ok(user)
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.upsert(user).await
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.find_where("id", id).await
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_where("email", email).await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> StoreResult<Option<User>> {
        self.update_where("id", id, patch.changes()).await
    }

    async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        let deleted = self
            .cascade_delete(
                &[
                    (Payment::COLLECTION, "user_id"),
                    (Appointment::COLLECTION, "user_id"),
                    (User::COLLECTION, "id"),
                ],
                id,
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn list_users(&self, filter: &UserFilter, page: &Pagination) -> StoreResult<Page<User>> {
        self.list(filter.conditions(), filter.search_term(), page)
            .await
    }

    // ==================== APPOINTMENTS ====================

    async fn create_appointment(&self, input: &NewAppointment) -> StoreResult<Appointment> {
        let draft = input.clone().into_appointment(String::new(), now_millis());
        self.insert_returning(&draft).await
    }

    async fn upsert_appointment(&self, appointment: &Appointment) -> StoreResult<()> {
        self.upsert(appointment).await
    }

    async fn get_appointment_by_id(&self, id: &str) -> StoreResult<Option<Appointment>> {
        self.find_where("id", id).await
    }

    async fn update_appointment(
        &self,
        id: &str,
        patch: &AppointmentPatch,
    ) -> StoreResult<Option<Appointment>> {
        self.update_where("id", id, patch.changes()).await
    }

    async fn delete_appointment(&self, id: &str) -> StoreResult<bool> {
        let deleted = self
            .cascade_delete(
                &[
                    (Payment::COLLECTION, "appointment_id"),
                    (Appointment::COLLECTION, "id"),
                ],
                id,
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Appointment>> {
        self.list(filter.conditions(), None, page).await
    }

    // ==================== PAYMENTS ====================

    async fn create_payment(&self, input: &NewPayment) -> StoreResult<Payment> {
        let draft = input.clone().into_payment(String::new(), now_millis());
        self.insert_returning(&draft).await
    }

    async fn upsert_payment(&self, payment: &Payment) -> StoreResult<()> {
        self.upsert(payment).await
    }

    async fn get_payment_by_id(&self, id: &str) -> StoreResult<Option<Payment>> {
        self.find_where("id", id).await
    }

    async fn get_payment_by_intent_id(&self, intent_id: &str) -> StoreResult<Option<Payment>> {
        self.find_where("externalPaymentIntentId", intent_id).await
    }

    async fn update_payment(&self, id: &str, patch: &PaymentPatch) -> StoreResult<Option<Payment>> {
        self.update_where("id", id, patch.changes()).await
    }

    async fn update_payment_by_intent_id(
        &self,
        intent_id: &str,
        patch: &PaymentPatch,
    ) -> StoreResult<Option<Payment>> {
        self.update_where("externalPaymentIntentId", intent_id, patch.changes())
            .await
    }

    async fn delete_payment(&self, id: &str) -> StoreResult<bool> {
        let deleted = self
            .cascade_delete(&[(Payment::COLLECTION, "id")], id)
            .await?;
        Ok(deleted > 0)
    }

    async fn list_payments(
        &self,
        filter: &PaymentFilter,
        page: &Pagination,
    ) -> StoreResult<Page<Payment>> {
        self.list(filter.conditions(), None, page).await
    }
}
