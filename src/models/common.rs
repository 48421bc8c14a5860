// Response envelope and pagination shared by every resource

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// `{ success, data, message }` envelope returned by every successful handler
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize, IntoParams, ToSchema)]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(query: &PaginationQuery, total: i64) -> Self {
        let limit = query.limit();
        Self {
            page: query.page(),
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, query: &PaginationQuery, total: i64) -> Self {
        Self {
            items,
            pagination: PaginationMeta::new(query, total),
        }
    }
}

/// Row counts grouped by a status column
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct StatusCounts {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

impl StatusCounts {
    pub fn from_counts(counts: Vec<(String, i64)>) -> Self {
        Self {
            total: counts.iter().map(|(_, n)| n).sum(),
            by_status: counts.into_iter().collect(),
        }
    }

    pub fn get(&self, status: &str) -> i64 {
        self.by_status.get(status).copied().unwrap_or(0)
    }
}

/// Count of rows touched by a bulk operation
#[derive(Debug, Serialize, ToSchema)]
pub struct AffectedCount {
    pub count: usize,
}

/// `%term%` pattern for ILIKE searches, with LIKE wildcards in the term escaped
diesel::define_sql_function! {
    /// SQL `LOWER(text)`, matching the `LOWER(email)` unique indexes
    fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

/// Emails are compared as `LOWER(email) = <this>`
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_bounds() {
        let q = PaginationQuery {
            page: None,
            limit: None,
        };
        assert_eq!((q.page(), q.limit(), q.offset()), (1, 20, 0));

        let q = PaginationQuery {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!((q.page(), q.limit(), q.offset()), (3, 100, 200));

        let q = PaginationQuery {
            page: Some(-2),
            limit: Some(0),
        };
        assert_eq!((q.page(), q.limit()), (1, 1));
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let q = PaginationQuery {
            page: Some(1),
            limit: Some(10),
        };
        assert_eq!(PaginationMeta::new(&q, 0).total_pages, 0);
        assert_eq!(PaginationMeta::new(&q, 10).total_pages, 1);
        assert_eq!(PaginationMeta::new(&q, 11).total_pages, 2);
    }

    #[test]
    fn test_status_counts_total() {
        let counts = StatusCounts::from_counts(vec![
            ("actif".to_string(), 12),
            ("prospect".to_string(), 3),
            ("en_attente".to_string(), 5),
        ]);
        assert_eq!(counts.total, 20);
        assert_eq!(counts.get("prospect"), 3);
        assert_eq!(counts.get("suspendu"), 0);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" dupont "), "%dupont%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_normalize_email_keeps_wildcard_characters() {
        assert_eq!(normalize_email("  John_X%@Probe.FR "), "john_x%@probe.fr");
    }

    #[test]
    fn test_envelope_skips_empty_fields() {
        let json = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "message": "done"}));
    }
}
