use super::error::ComplianceError;
use super::notify::DispatchPolicy;
use super::period::YearConvention;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Used when neither the requirement nor its company names a convention.
    pub default_year_convention: YearConvention,
    pub dispatch: DispatchMode,
    pub notify_on_blocked_completion: bool,
    pub email_on_status_change: bool,
}

/// Where notification and email side effects run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// On the calling thread, after the status write.
    #[default]
    Inline,
    /// On a detached worker thread; the caller never waits.
    Detached,
}

impl ServiceConfig {
    pub fn from_json(raw: &str) -> Result<Self, ComplianceError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            notify_on_blocked_completion: self.notify_on_blocked_completion,
            email_on_status_change: self.email_on_status_change,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_year_convention: YearConvention::Financial,
            dispatch: DispatchMode::Inline,
            notify_on_blocked_completion: true,
            email_on_status_change: true,
        }
    }
}
