use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Papel do usuário na plataforma
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Client,
    Admin,
    Provider,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Client => "client",
            UserRole::Admin => "admin",
            UserRole::Provider => "provider",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(UserRole::Client),
            "admin" => Ok(UserRole::Admin),
            "provider" => Ok(UserRole::Provider),
            other => Err(format!("unknown user role '{}'", other)),
        }
    }
}

/// Canonical user record, independent of the backing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub avatar: Option<String>,
    pub role: UserRole,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Case-insensitive substring match over name and email
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.first_name.to_lowercase().contains(&needle)
            || self.last_name.to_lowercase().contains(&needle)
            || self.email.to_lowercase().contains(&needle)
    }
}

/// Request para criar usuário (id e timestamps são atribuídos pelo store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default = "default_role")]
    pub role: UserRole,
    #[serde(default)]
    pub is_verified: bool,
}

fn default_role() -> UserRole {
    UserRole::Client
}

impl NewUser {
    pub fn into_user(self, id: String, now: DateTime<Utc>) -> User {
        User {
            id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            avatar: self.avatar,
            role: self.role,
            is_verified: self.is_verified,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub role: Option<UserRole>,
    pub is_verified: Option<bool>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self == &UserPatch::default()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(first_name) = &self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = Some(avatar.clone());
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(is_verified) = self.is_verified {
            user.is_verified = is_verified;
        }
    }
}

/// Estatísticas agregadas exibidas no painel admin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    pub total_appointments: usize,
    pub completed_appointments: usize,
    pub total_payments: usize,
    pub total_spent: f64,
}

/// Janela (em dias) de registros recentes na visão geral
pub const RECENT_REGISTRATION_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoleCounts {
    pub client: usize,
    pub admin: usize,
    pub provider: usize,
}

/// Visão geral da base de usuários para o painel admin
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    pub total: u64,
    pub by_role: RoleCounts,
    pub verified: usize,
    pub recent_registrations: usize,
}

impl UserOverview {
    /// Registrations inside the last `RECENT_REGISTRATION_DAYS` before `now` count as recent
    pub fn from_users(users: &[User], total: u64, now: DateTime<Utc>) -> Self {
        let since = now - chrono::Duration::days(RECENT_REGISTRATION_DAYS);
        let mut by_role = RoleCounts::default();
        for user in users {
            match user.role {
                UserRole::Client => by_role.client += 1,
                UserRole::Admin => by_role.admin += 1,
                UserRole::Provider => by_role.provider += 1,
            }
        }

        Self {
            total,
            by_role,
            verified: users.iter().filter(|u| u.is_verified).count(),
            recent_registrations: users.iter().filter(|u| u.created_at >= since).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
}

/// Resultado por id de uma atualização em massa
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkUpdateOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<BulkFailure>,
}
