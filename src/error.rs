use crate::requirement::RequirementStatus;

#[derive(thiserror::Error, Debug)]
pub enum ComplianceError {
    #[error("No authenticated caller")]
    NotAuthenticated,
    #[error("User {user_id} may not access compliance records of company {company_id}")]
    PermissionDenied { user_id: String, company_id: String },
    #[error("User {0} is not a platform superadmin")]
    PlatformAdminRequired(String),
    #[error("Requirement {0} not found")]
    NotFound(String),
    #[error(
        "Cannot move requirement from '{current}' to '{requested}'. Allowed: [{}]",
        join_statuses(.allowed)
    )]
    InvalidTransition {
        current: RequirementStatus,
        requested: RequirementStatus,
        allowed: Vec<RequirementStatus>,
    },
    #[error("Invalid requirement: {0}")]
    InvalidRequirement(String),
    #[error("Unknown requirement status '{0}'")]
    UnknownStatus(String),
    #[error("Unknown recurrence kind '{0}'")]
    UnknownRecurrence(String),
    #[error("Unknown year convention '{0}'")]
    UnknownYearConvention(String),
    #[error("Store read failed: {0}")]
    StoreReadFailed(#[source] anyhow::Error),
    #[error("Store write failed: {0}")]
    StoreWriteFailed(#[source] anyhow::Error),
    #[error("Failed to mint identifier: {0}")]
    Identifier(#[source] anyhow::Error),
    #[error("Invalid service configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Procedure '{procedure}' failed: {source}")]
    ProcedureFailed {
        procedure: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

// Side-effect failures. These are logged and reported, never returned to the caller
// of a status update.
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Admin lookup for company {company_id} failed: {source}")]
    RecipientLookupFailed {
        company_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Notification for user {user_id} failed: {source}")]
    NotificationFailed {
        user_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Email queue entry for {email} failed: {source}")]
    EmailQueueFailed {
        email: String,
        #[source]
        source: anyhow::Error,
    },
}

fn join_statuses(statuses: &[RequirementStatus]) -> String {
    statuses
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
