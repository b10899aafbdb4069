use serde::{Deserialize, Serialize};

use super::{AppointmentStatus, PaymentStatus, UserRole};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Offset pagination; results are always newest-created first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    pub fn unbounded() -> Self {
        Self {
            limit: u32::MAX,
            offset: 0,
        }
    }

    pub fn end(&self) -> usize {
        (self.offset as usize).saturating_add(self.limit as usize)
    }

    /// Slice an already-sorted result set
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = (self.offset as usize).min(items.len());
        let end = self.end().min(items.len());
        items[start..end].to_vec()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self, pagination: &Pagination) -> bool {
        (pagination.end() as u64) < self.total
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    /// Free-text match over first name, last name and email
    pub search: Option<String>,
}

impl UserFilter {
    /// Trimmed, non-empty search term
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub user_id: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            status: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub user_id: Option<String>,
    pub appointment_id: Option<String>,
    pub status: Option<PaymentStatus>,
}

impl PaymentFilter {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        }
    }
}
