// Uploaded file metadata; the bytes live in a DocumentStorage backend

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::UserType;
use crate::models::common::PaginationQuery;
use crate::models::status::{DocumentCategory, DocumentStatus};
use crate::schema::{client_produits_eligibles, documents};

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/csv",
    "text/plain",
];

pub fn is_allowed_mime(mime_type: &str) -> bool {
    let mime = mime_type.trim().to_ascii_lowercase();
    ALLOWED_MIME_TYPES.contains(&mime.as_str())
}

/// Keeps the last path component and drops characters unsafe in headers or paths
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.chars().take(200).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, ToSchema)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DocumentFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_type: String,
    pub client_id: Option<Uuid>,
    pub client_produit_eligible_id: Option<Uuid>,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    #[serde(skip_serializing, default)]
    pub storage_path: String,
    pub checksum: String,
    pub category: String,
    pub description: Option<String>,
    pub status: String,
    pub validated_by: Option<Uuid>,
    pub validated_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing, default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocumentFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_type: String,
    pub client_id: Option<Uuid>,
    pub client_produit_eligible_id: Option<Uuid>,
    pub filename: String,
    pub mime_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub checksum: String,
    pub category: String,
    pub description: Option<String>,
    pub status: String,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = documents)]
pub struct DocumentUpdate {
    pub category: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub validated_by: Option<Option<Uuid>>,
    pub validated_at: Option<Option<DateTime<Utc>>>,
    pub rejection_reason: Option<Option<String>>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UploadDocumentRequest {
    #[validate(length(min = 1, max = 255, message = "Filename is required"))]
    pub filename: String,
    #[validate(length(min = 1, max = 255, message = "MIME type is required"))]
    pub mime_type: String,
    #[validate(length(min = 1, message = "File content is required"))]
    pub content_base64: String,
    #[serde(default = "default_category")]
    pub category: DocumentCategory,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    pub dossier_id: Option<Uuid>,
}

fn default_category() -> DocumentCategory {
    DocumentCategory::Autre
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateDocumentRequest {
    pub category: Option<DocumentCategory>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ValidateDocumentRequest {
    pub status: DocumentStatus,
    #[validate(length(max = 2000))]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct DocumentFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub dossier_id: Option<Uuid>,
}

/// Which documents a caller may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentScope {
    /// Documents owned by the user or attached to their client account
    Owner(UserType, Uuid),
    /// Documents attached to dossiers assigned to the expert, plus their own uploads
    Expert(Uuid),
    All,
}

impl DocumentFile {
    pub fn status_enum(&self) -> DocumentStatus {
        crate::models::status::parse_or(&self.status, DocumentStatus::Pending)
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id || self.client_id == Some(user_id)
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_doc: NewDocumentFile) -> QueryResult<Self> {
        diesel::insert_into(documents::table)
            .values(&new_doc)
            .returning(DocumentFile::as_returning())
            .get_result(conn)
            .await
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, document_id: Uuid) -> QueryResult<Self> {
        documents::table
            .filter(documents::id.eq(document_id))
            .filter(documents::deleted_at.is_null())
            .select(DocumentFile::as_select())
            .first(conn)
            .await
    }

    pub async fn update(
        conn: &mut AsyncPgConnection,
        document_id: Uuid,
        update: DocumentUpdate,
    ) -> QueryResult<Self> {
        diesel::update(
            documents::table
                .filter(documents::id.eq(document_id))
                .filter(documents::deleted_at.is_null()),
        )
        .set(&update)
        .returning(DocumentFile::as_returning())
        .get_result(conn)
        .await
    }

    pub async fn list_scoped(
        conn: &mut AsyncPgConnection,
        scope: DocumentScope,
        filter: &DocumentFilter,
        page: &PaginationQuery,
    ) -> QueryResult<(Vec<Self>, i64)> {
        let build = || {
            let mut query = documents::table
                .filter(documents::deleted_at.is_null())
                .into_boxed();
            match scope {
                DocumentScope::Owner(UserType::Client, user_id) => {
                    query = query.filter(
                        documents::owner_id
                            .eq(user_id)
                            .or(documents::client_id.eq(user_id)),
                    );
                }
                DocumentScope::Owner(_, user_id) => {
                    query = query.filter(documents::owner_id.eq(user_id));
                }
                DocumentScope::Expert(expert_id) => {
                    let dossier_ids = client_produits_eligibles::table
                        .filter(client_produits_eligibles::expert_id.eq(expert_id))
                        .select(client_produits_eligibles::id.nullable());
                    query = query.filter(
                        documents::owner_id
                            .eq(expert_id)
                            .or(documents::client_produit_eligible_id.eq_any(dossier_ids)),
                    );
                }
                DocumentScope::All => {}
            }
            if let Some(category) = &filter.category {
                query = query.filter(documents::category.eq(category.clone()));
            }
            if let Some(status) = &filter.status {
                query = query.filter(documents::status.eq(status.clone()));
            }
            if let Some(dossier_id) = filter.dossier_id {
                query = query.filter(documents::client_produit_eligible_id.eq(dossier_id));
            }
            query
        };

        let total: i64 = build().count().get_result(conn).await?;
        let items = build()
            .order(documents::created_at.desc())
            .limit(page.limit())
            .offset(page.offset())
            .select(DocumentFile::as_select())
            .load(conn)
            .await?;
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_allow_list() {
        assert!(is_allowed_mime("application/pdf"));
        assert!(is_allowed_mime(" Image/PNG "));
        assert!(!is_allowed_mime("application/x-msdownload"));
        assert!(!is_allowed_mime("text/html"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\Kbis 2024.pdf"), "Kbis 2024.pdf");
        assert_eq!(sanitize_filename("facture\"\r\n.pdf"), "facture___.pdf");
        assert_eq!(sanitize_filename("..."), "document");
    }

    #[test]
    fn test_upload_defaults_category() {
        let req: UploadDocumentRequest = serde_json::from_value(serde_json::json!({
            "filename": "kbis.pdf",
            "mime_type": "application/pdf",
            "content_base64": "JVBERi0="
        }))
        .unwrap();
        assert_eq!(req.category, DocumentCategory::Autre);
        assert!(req.validate().is_ok());
    }
}
