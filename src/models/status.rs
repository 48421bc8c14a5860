// Closed string sets stored in VARCHAR columns.
// Rows keep the raw string; these enums validate input and drive business rules.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: '{}'", stringify!($name), s)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Lifecycle of a client account
    ClientStatut {
        Actif => "actif",
        EnAttente => "en_attente",
        Prospect => "prospect",
        Suspendu => "suspendu",
        Inactif => "inactif",
    }
);

impl ClientStatut {
    /// `en_attente` is the state right after a simulator migration; those clients may log in
    pub fn can_login(&self) -> bool {
        matches!(self, ClientStatut::Actif | ClientStatut::EnAttente)
    }
}

text_enum!(
    ClientSource {
        Direct => "direct",
        Apporteur => "apporteur",
        SimulatorMigration => "simulator_migration",
        Admin => "admin",
    }
);

text_enum!(
    ExpertStatus {
        Active => "active",
        Inactive => "inactive",
        Suspended => "suspended",
    }
);

text_enum!(
    ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

text_enum!(
    ApporteurStatus {
        Candidature => "candidature",
        Active => "active",
        Suspended => "suspended",
        Inactive => "inactive",
    }
);

text_enum!(
    /// Progress of a client's dossier for one product
    DossierStatut {
        Eligible => "eligible",
        EnCours => "en_cours",
        Termine => "termine",
        Annule => "annule",
        NonEligible => "non_eligible",
    }
);

impl DossierStatut {
    pub fn can_transition_to(&self, next: DossierStatut) -> bool {
        use DossierStatut::*;
        matches!(
            (self, next),
            (Eligible, EnCours)
                | (Eligible, Annule)
                | (Eligible, NonEligible)
                | (EnCours, Termine)
                | (EnCours, Annule)
                | (NonEligible, Eligible)
        )
    }

    pub fn is_final(&self) -> bool {
        matches!(self, DossierStatut::Termine | DossierStatut::Annule)
    }
}

text_enum!(
    ProduitType {
        Financier => "financier",
        Qualitatif => "qualitatif",
    }
);

text_enum!(
    QuestionType {
        ChoixUnique => "choix_unique",
        ChoixMultiple => "choix_multiple",
        Nombre => "nombre",
        OuiNon => "oui_non",
    }
);

text_enum!(
    RdvStatus {
        Proposed => "proposed",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
        Rescheduled => "rescheduled",
    }
);

impl RdvStatus {
    /// Calendar colour per status
    pub fn color(&self) -> &'static str {
        match self {
            RdvStatus::Proposed => "#F59E0B",
            RdvStatus::Confirmed => "#10B981",
            RdvStatus::Completed => "#3B82F6",
            RdvStatus::Cancelled => "#EF4444",
            RdvStatus::Rescheduled => "#8B5CF6",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, RdvStatus::Completed | RdvStatus::Cancelled)
    }
}

text_enum!(
    MeetingType {
        Physical => "physical",
        Video => "video",
        Phone => "phone",
    }
);

impl MeetingType {
    pub fn label(&self) -> &'static str {
        match self {
            MeetingType::Physical => "Physique",
            MeetingType::Video => "Visio",
            MeetingType::Phone => "Téléphone",
        }
    }
}

text_enum!(
    RdvCategory {
        ClientRdv => "client_rdv",
        ExpertConsultation => "expert_consultation",
        Qualification => "qualification",
        Presentation => "presentation",
        FollowUp => "follow_up",
    }
);

text_enum!(
    NotificationPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
);

text_enum!(
    NotificationStatus {
        Unread => "unread",
        Read => "read",
        Archived => "archived",
    }
);

text_enum!(
    DocumentStatus {
        Pending => "pending",
        Validated => "validated",
        Rejected => "rejected",
    }
);

text_enum!(
    DocumentCategory {
        Kbis => "kbis",
        Facture => "facture",
        Contrat => "contrat",
        Fiscal => "fiscal",
        Social => "social",
        Identite => "identite",
        Rapport => "rapport",
        Autre => "autre",
    }
);

text_enum!(
    /// Kind of work a generated dossier step represents
    StepType {
        Validation => "validation",
        Documentation => "documentation",
        Expertise => "expertise",
        Approval => "approval",
        Payment => "payment",
    }
);

text_enum!(
    StepStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Overdue => "overdue",
    }
);

text_enum!(
    /// What a dossier timeline entry records
    TimelineEventType {
        DossierCreated => "dossier_created",
        StatusChanged => "status_changed",
        ExpertAssigned => "expert_assigned",
        StepUpdated => "step_updated",
        Comment => "comment",
        Document => "document",
        Manual => "manual",
    }
);

text_enum!(
    CommentCategory {
        General => "general",
        Alert => "alert",
        Document => "document",
        RdvEvent => "rdv_event",
        StatusChange => "status_change",
        ExpertAction => "expert_action",
        ApporteurAction => "apporteur_action",
        AdminAction => "admin_action",
    }
);

text_enum!(
    /// `manual` comments are written by people; `system` ones by the workflow
    CommentType {
        Manual => "manual",
        System => "system",
    }
);

/// Parse a raw column value, falling back (with a warning) when the row holds an unknown string
pub fn parse_or<T: std::str::FromStr<Err = String>>(raw: &str, fallback: T) -> T {
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!("{}; using fallback", e);
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_trip_all_variants() {
        for statut in DossierStatut::ALL {
            assert_eq!(DossierStatut::from_str(statut.as_str()), Ok(*statut));
        }
        for status in RdvStatus::ALL {
            assert_eq!(status.as_str().parse::<RdvStatus>(), Ok(*status));
        }
    }

    #[test]
    fn test_serde_uses_column_text() {
        assert_eq!(
            serde_json::to_string(&ClientStatut::EnAttente).unwrap(),
            "\"en_attente\""
        );
        let parsed: RdvCategory = serde_json::from_str("\"client_rdv\"").unwrap();
        assert_eq!(parsed, RdvCategory::ClientRdv);
    }

    #[test]
    fn test_client_login_rule() {
        assert!(ClientStatut::Actif.can_login());
        assert!(ClientStatut::EnAttente.can_login());
        assert!(!ClientStatut::Prospect.can_login());
        assert!(!ClientStatut::Suspendu.can_login());
        assert!(!ClientStatut::Inactif.can_login());
    }

    #[test]
    fn test_dossier_transitions() {
        use DossierStatut::*;
        assert!(Eligible.can_transition_to(EnCours));
        assert!(EnCours.can_transition_to(Termine));
        assert!(NonEligible.can_transition_to(Eligible));
        assert!(!Termine.can_transition_to(EnCours));
        assert!(!Annule.can_transition_to(Eligible));
        assert!(!Eligible.can_transition_to(Termine));
        assert!(Termine.is_final() && Annule.is_final());
    }

    #[test]
    fn test_rdv_colors_and_labels() {
        assert_eq!(RdvStatus::Proposed.color(), "#F59E0B");
        assert_eq!(RdvStatus::Cancelled.color(), "#EF4444");
        assert_eq!(MeetingType::Video.label(), "Visio");
    }

    #[test]
    fn test_workflow_enums_use_snake_case_text() {
        assert_eq!(StepStatus::InProgress.as_str(), "in_progress");
        assert_eq!("rdv_event".parse::<CommentCategory>(), Ok(CommentCategory::RdvEvent));
        assert!("done".parse::<StepStatus>().is_err());
        assert_eq!(TimelineEventType::ALL.len(), 7);
    }

    #[test]
    fn test_parse_or_fallback() {
        assert_eq!(parse_or("weird", ExpertStatus::Inactive), ExpertStatus::Inactive);
        assert_eq!(parse_or("active", ExpertStatus::Inactive), ExpertStatus::Active);
    }
}
