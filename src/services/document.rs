// Document upload, retrieval and validation on top of a DocumentStorage backend

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use diesel::OptionalExtension;
use diesel_async::AsyncPgConnection;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    db::DieselPool,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::UserType,
        client::Client,
        common::{Paginated, PaginationQuery},
        document::{
            is_allowed_mime, sanitize_filename, DocumentFile, DocumentFilter, DocumentScope,
            DocumentUpdate, NewDocumentFile, UpdateDocumentRequest, UploadDocumentRequest,
            ValidateDocumentRequest,
        },
        dossier::ClientProduitEligible,
        notification::{kinds, NewNotification},
        status::{DocumentStatus, NotificationPriority},
    },
    services::{
        dossier::ensure_dossier_access, notification::NotificationService,
        storage::DocumentStorage,
    },
    utils::{
        audit_logger::{AuditAction, AuditLogger},
        service_error::{OrNotFound, ServiceError, ServiceResult},
    },
};

/// Decoded upload ready to be stored
#[derive(Debug)]
pub struct DecodedUpload {
    pub bytes: Vec<u8>,
    pub checksum: String,
}

/// Base64 decoding plus the size limit. Data-URL prefixes are tolerated.
pub fn decode_content(content_base64: &str, max_bytes: usize) -> ServiceResult<DecodedUpload> {
    let payload = match content_base64.split_once(";base64,") {
        Some((_, data)) => data,
        None => content_base64,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    // Reject before decoding: base64 grows the payload by a third
    if compact.len() / 4 * 3 > max_bytes + 3 {
        return Err(ServiceError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            max_bytes
        )));
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ServiceError::ValidationError(format!("Invalid base64 content: {}", e)))?;
    if bytes.is_empty() {
        return Err(ServiceError::ValidationError("File is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(ServiceError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            max_bytes
        )));
    }

    let checksum = format!("{:x}", Sha256::digest(&bytes));
    Ok(DecodedUpload { bytes, checksum })
}

/// Request body cap for uploads: the base64 form of `max_bytes` plus room
/// for the JSON fields around it
pub fn upload_body_limit(max_bytes: usize) -> usize {
    max_bytes.div_ceil(3) * 4 + 64 * 1024
}

pub fn storage_key(owner_type: UserType, owner_id: Uuid, document_id: Uuid, filename: &str) -> String {
    format!("{}/{}/{}-{}", owner_type.as_str(), owner_id, document_id, filename)
}

/// `Content-Disposition` value for a download
pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", sanitize_filename(filename))
}

pub fn document_scope(user: &AuthenticatedUser) -> DocumentScope {
    match user.user_type {
        UserType::Admin => DocumentScope::All,
        UserType::Expert => DocumentScope::Expert(user.user_id),
        other => DocumentScope::Owner(other, user.user_id),
    }
}

pub struct DocumentDownload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub struct DocumentService {
    diesel_pool: DieselPool,
    storage: Arc<dyn DocumentStorage>,
    max_upload_bytes: usize,
}

impl DocumentService {
    pub fn new(state: &AppState) -> Self {
        Self {
            diesel_pool: state.diesel_pool.clone(),
            storage: state.storage.clone(),
            max_upload_bytes: state.config.storage.max_upload_bytes,
        }
    }

    /// Client the document belongs to, after checking the caller may attach to it
    async fn resolve_attachment(
        conn: &mut AsyncPgConnection,
        user: &AuthenticatedUser,
        request: &UploadDocumentRequest,
    ) -> ServiceResult<(Option<Uuid>, Option<Uuid>)> {
        if let Some(dossier_id) = request.dossier_id {
            let dossier = ClientProduitEligible::find_by_id(conn, dossier_id)
                .await
                .or_not_found("Dossier")?;
            ensure_dossier_access(conn, user, &dossier).await?;
            return Ok((Some(dossier.client_id), Some(dossier.id)));
        }

        match (user.user_type, request.client_id) {
            (UserType::Client, _) => Ok((Some(user.user_id), None)),
            (_, None) => Ok((None, None)),
            (UserType::Admin, Some(client_id)) => {
                Client::find_by_id(conn, client_id)
                    .await
                    .or_not_found("Client")?;
                Ok((Some(client_id), None))
            },
            (UserType::Apporteur, Some(client_id)) => {
                let client = Client::find_by_id(conn, client_id)
                    .await
                    .or_not_found("Client")?;
                if client.apporteur_id != Some(user.user_id) {
                    return Err(ServiceError::Forbidden(
                        "This client is not one of your prospects".to_string(),
                    ));
                }
                Ok((Some(client_id), None))
            },
            (UserType::Expert, Some(_)) => Err(ServiceError::ValidationError(
                "Experts attach documents through a dossier".to_string(),
            )),
        }
    }

    async fn can_read(
        conn: &mut AsyncPgConnection,
        user: &AuthenticatedUser,
        document: &DocumentFile,
    ) -> ServiceResult<bool> {
        if user.is_admin() || document.is_owned_by(user.user_id) {
            return Ok(true);
        }
        match (user.user_type, document.client_produit_eligible_id) {
            (UserType::Expert, Some(dossier_id)) => {
                let dossier = ClientProduitEligible::find_by_id(conn, dossier_id)
                    .await
                    .optional()?;
                Ok(dossier.is_some_and(|d| d.expert_id == Some(user.user_id)))
            },
            (UserType::Apporteur, _) => match document.client_id {
                Some(client_id) => {
                    let client = Client::find_by_id(conn, client_id).await.optional()?;
                    Ok(client.and_then(|c| c.apporteur_id) == Some(user.user_id))
                },
                None => Ok(false),
            },
            _ => Ok(false),
        }
    }

    async fn load_readable(
        conn: &mut AsyncPgConnection,
        user: &AuthenticatedUser,
        document_id: Uuid,
    ) -> ServiceResult<DocumentFile> {
        let document = DocumentFile::find_by_id(conn, document_id)
            .await
            .or_not_found("Document")?;
        if !Self::can_read(conn, user, &document).await? {
            return Err(ServiceError::Forbidden(
                "You do not have access to this document".to_string(),
            ));
        }
        Ok(document)
    }

    fn ensure_owner_or_admin(user: &AuthenticatedUser, document: &DocumentFile) -> ServiceResult<()> {
        if user.is_admin() || document.owner_id == user.user_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Only the uploader or an administrator can modify this document".to_string(),
            ))
        }
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id, filename = %request.filename))]
    pub async fn upload(
        &self,
        user: &AuthenticatedUser,
        request: UploadDocumentRequest,
    ) -> ServiceResult<DocumentFile> {
        request.validate()?;
        let mime_type = request.mime_type.trim().to_ascii_lowercase();
        if !is_allowed_mime(&mime_type) {
            return Err(ServiceError::ValidationError(format!(
                "File type {} is not allowed",
                mime_type
            )));
        }
        let upload = decode_content(&request.content_base64, self.max_upload_bytes)?;

        let mut conn = self.diesel_pool.get().await?;
        let (client_id, dossier_id) = Self::resolve_attachment(&mut conn, user, &request).await?;

        let document_id = Uuid::new_v4();
        let filename = sanitize_filename(&request.filename);
        let key = storage_key(user.user_type, user.user_id, document_id, &filename);
        self.storage.put(&key, &upload.bytes).await?;

        let created = DocumentFile::create(
            &mut conn,
            NewDocumentFile {
                id: document_id,
                owner_id: user.user_id,
                owner_type: user.user_type.as_str().to_string(),
                client_id,
                client_produit_eligible_id: dossier_id,
                filename,
                mime_type,
                file_size: upload.bytes.len() as i64,
                storage_path: key.clone(),
                checksum: upload.checksum,
                category: request.category.as_str().to_string(),
                description: request.description,
                status: DocumentStatus::Pending.as_str().to_string(),
            },
        )
        .await;

        let document = match created {
            Ok(document) => document,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&key).await {
                    warn!(key = %key, error = %cleanup, "Failed to remove orphaned upload");
                }
                return Err(e.into());
            },
        };

        AuditLogger::log_action(
            AuditAction::DocumentUploaded,
            user.actor(),
            "document",
            Some(document.id),
            Some(json!({ "size": document.file_size, "mime_type": document.mime_type })),
        )
        .await;
        info!(document_id = %document.id, size = document.file_size, "Document uploaded");
        Ok(document)
    }

    pub async fn list(
        &self,
        user: &AuthenticatedUser,
        filter: &DocumentFilter,
        page: &PaginationQuery,
    ) -> ServiceResult<Paginated<DocumentFile>> {
        let mut conn = self.diesel_pool.get().await?;
        let (items, total) =
            DocumentFile::list_scoped(&mut conn, document_scope(user), filter, page).await?;
        Ok(Paginated::new(items, page, total))
    }

    pub async fn get(&self, user: &AuthenticatedUser, document_id: Uuid) -> ServiceResult<DocumentFile> {
        let mut conn = self.diesel_pool.get().await?;
        Self::load_readable(&mut conn, user, document_id).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn download(
        &self,
        user: &AuthenticatedUser,
        document_id: Uuid,
    ) -> ServiceResult<DocumentDownload> {
        let document = {
            let mut conn = self.diesel_pool.get().await?;
            Self::load_readable(&mut conn, user, document_id).await?
        };
        let bytes = self.storage.get(&document.storage_path).await?;
        Ok(DocumentDownload {
            filename: document.filename,
            mime_type: document.mime_type,
            bytes,
        })
    }

    pub async fn update(
        &self,
        user: &AuthenticatedUser,
        document_id: Uuid,
        request: UpdateDocumentRequest,
    ) -> ServiceResult<DocumentFile> {
        request.validate()?;
        let mut conn = self.diesel_pool.get().await?;
        let document = DocumentFile::find_by_id(&mut conn, document_id)
            .await
            .or_not_found("Document")?;
        Self::ensure_owner_or_admin(user, &document)?;

        Ok(DocumentFile::update(
            &mut conn,
            document_id,
            DocumentUpdate {
                category: request.category.map(|c| c.as_str().to_string()),
                description: request.description.map(Some),
                updated_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?)
    }

    /// Assigned expert of the dossier or an admin; the client hears about the outcome
    #[instrument(skip(self, user, request), fields(user_id = %user.user_id))]
    pub async fn validate(
        &self,
        user: &AuthenticatedUser,
        document_id: Uuid,
        request: ValidateDocumentRequest,
    ) -> ServiceResult<DocumentFile> {
        request.validate()?;
        let reason = request
            .rejection_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);
        match request.status {
            DocumentStatus::Pending => {
                return Err(ServiceError::ValidationError(
                    "Status must be validated or rejected".to_string(),
                ))
            },
            DocumentStatus::Rejected if reason.is_none() => {
                return Err(ServiceError::ValidationError(
                    "A rejection reason is required".to_string(),
                ))
            },
            _ => {},
        }

        let mut conn = self.diesel_pool.get().await?;
        let document = DocumentFile::find_by_id(&mut conn, document_id)
            .await
            .or_not_found("Document")?;

        if !user.is_admin() {
            let assigned = match (user.user_type, document.client_produit_eligible_id) {
                (UserType::Expert, Some(dossier_id)) => ClientProduitEligible::find_by_id(
                    &mut conn, dossier_id,
                )
                .await
                .optional()?
                .is_some_and(|d| d.expert_id == Some(user.user_id)),
                _ => false,
            };
            if !assigned {
                return Err(ServiceError::Forbidden(
                    "Only the assigned expert or an administrator can validate documents"
                        .to_string(),
                ));
            }
        }

        let now = Utc::now();
        let validated = DocumentFile::update(
            &mut conn,
            document_id,
            DocumentUpdate {
                status: Some(request.status.as_str().to_string()),
                validated_by: Some(Some(user.user_id)),
                validated_at: Some(Some(now)),
                rejection_reason: Some(reason.clone()),
                updated_at: Some(now),
                ..Default::default()
            },
        )
        .await?;

        let recipient = validated
            .client_id
            .map(|id| (id, UserType::Client))
            .or_else(|| {
                validated
                    .owner_type
                    .parse::<UserType>()
                    .ok()
                    .map(|t| (validated.owner_id, t))
            });
        if let Some((recipient_id, recipient_type)) = recipient {
            let (kind, title, message) = if request.status == DocumentStatus::Validated {
                (
                    kinds::DOCUMENT_VALIDATED,
                    "Document validé".to_string(),
                    format!("Votre document « {} » a été validé.", validated.filename),
                )
            } else {
                (
                    kinds::DOCUMENT_REJECTED,
                    "Document refusé".to_string(),
                    format!(
                        "Votre document « {} » a été refusé : {}",
                        validated.filename,
                        reason.as_deref().unwrap_or_default()
                    ),
                )
            };
            NotificationService::notify(
                &mut conn,
                NewNotification::new(recipient_id, recipient_type, kind, title, message)
                    .priority(NotificationPriority::High)
                    .action_url(format!("/documents/{}", document_id))
                    .metadata(json!({ "document_id": document_id })),
            )
            .await?;
        }

        AuditLogger::log_action(
            AuditAction::DocumentValidated,
            user.actor(),
            "document",
            Some(document_id),
            Some(json!({ "status": request.status.as_str() })),
        )
        .await;
        Ok(validated)
    }

    /// Soft delete; the stored bytes are removed as well
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete(&self, user: &AuthenticatedUser, document_id: Uuid) -> ServiceResult<()> {
        let mut conn = self.diesel_pool.get().await?;
        let document = DocumentFile::find_by_id(&mut conn, document_id)
            .await
            .or_not_found("Document")?;
        Self::ensure_owner_or_admin(user, &document)?;

        let now = Utc::now();
        DocumentFile::update(
            &mut conn,
            document_id,
            DocumentUpdate {
                deleted_at: Some(Some(now)),
                updated_at: Some(now),
                ..Default::default()
            },
        )
        .await?;

        if let Err(e) = self.storage.delete(&document.storage_path).await {
            warn!(document_id = %document_id, error = %e, "Stored bytes could not be removed");
        }

        AuditLogger::log_action(
            AuditAction::DocumentDeleted,
            user.actor(),
            "document",
            Some(document_id),
            None,
        )
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_and_checksum() {
        let upload = decode_content("aGVsbG8=", 1024).unwrap();
        assert_eq!(upload.bytes, b"hello");
        assert_eq!(
            upload.checksum,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_decode_accepts_data_url() {
        let upload = decode_content("data:text/plain;base64,aGVs\nbG8=", 1024).unwrap();
        assert_eq!(upload.bytes, b"hello");
    }

    #[test]
    fn test_decode_rejects_invalid_and_oversized() {
        assert!(matches!(
            decode_content("not base64!!", 1024),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            decode_content("aGVsbG8=", 3),
            Err(ServiceError::PayloadTooLarge(_))
        ));
        let big = STANDARD.encode(vec![0u8; 4096]);
        assert!(matches!(
            decode_content(&big, 1024),
            Err(ServiceError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_body_limit_fits_largest_encoded_upload() {
        let max = 10 * 1024 * 1024;
        let encoded = STANDARD.encode(vec![0u8; max]);
        assert!(encoded.len() < upload_body_limit(max));
        assert!(decode_content(&encoded, max).is_ok());
    }

    #[test]
    fn test_storage_key_and_disposition() {
        let owner = Uuid::nil();
        let doc = Uuid::nil();
        assert_eq!(
            storage_key(UserType::Client, owner, doc, "kbis.pdf"),
            format!("client/{}/{}-kbis.pdf", owner, doc)
        );
        assert_eq!(
            content_disposition("facture\"2024\".pdf"),
            "attachment; filename=\"facture_2024_.pdf\""
        );
    }
}
