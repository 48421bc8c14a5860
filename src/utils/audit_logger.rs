// Audit trail for account and dossier operations
// One JSON line per event on the `audit` tracing target
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum AuditAction {
    AccountRegistered,
    AccountCreated,
    AccountUpdated,
    AccountDeleted,
    AccountStatusChanged,
    PasswordChanged,
    ExpertApproved,
    ExpertRejected,
    ProspectCreated,
    ProspectConverted,
    CredentialsIssued,
    SessionMigrated,
    DossierCreated,
    DossierStatusChanged,
    DossierExpertAssigned,
    ProduitChanged,
    DocumentUploaded,
    DocumentValidated,
    DocumentDeleted,
    RdvDeleted,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub actor_id: Option<Uuid>,
    pub actor_type: Option<String>,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

pub struct AuditLogger;

impl AuditLogger {
    /// Record an operation performed by `actor` (None for anonymous simulator visitors)
    pub async fn log_action(
        action: AuditAction,
        actor: Option<(Uuid, &str)>,
        resource_type: &str,
        resource_id: Option<Uuid>,
        details: Option<serde_json::Value>,
    ) {
        let audit_log = AuditLog {
            id: Uuid::new_v4(),
            action,
            actor_id: actor.map(|(id, _)| id),
            actor_type: actor.map(|(_, kind)| kind.to_string()),
            resource_type: resource_type.to_string(),
            resource_id,
            details,
            timestamp: Utc::now(),
        };

        let json_log = serde_json::to_string(&audit_log).unwrap_or_else(|e| {
            warn!("Failed to serialize audit log: {}", e);
            format!("{:?}", audit_log)
        });

        info!(target: "audit", "{}", json_log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_serializes_action_name() {
        let log = AuditLog {
            id: Uuid::nil(),
            action: AuditAction::ExpertApproved,
            actor_id: Some(Uuid::nil()),
            actor_type: Some("admin".to_string()),
            resource_type: "expert".to_string(),
            resource_id: None,
            details: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["action"], "ExpertApproved");
        assert_eq!(json["actor_type"], "admin");
    }
}
