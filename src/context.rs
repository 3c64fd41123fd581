//! Per-request caller identity and clock
use super::error::ComplianceError;
use super::requirement::TimeStamp;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    // platform operators may edit any company and run template procedures
    pub is_platform_superadmin: bool,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: Option<Caller>,
    pub now: TimeStamp<Utc>, // used for filed_on
}

impl Caller {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            is_platform_superadmin: false,
        }
    }

    pub fn platform_superadmin(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            is_platform_superadmin: true,
        }
    }
}

impl RequestContext {
    pub fn new(caller: Option<Caller>) -> Self {
        Self {
            caller,
            now: TimeStamp::new(),
        }
    }

    pub fn for_user(user_id: &str) -> Self {
        Self::new(Some(Caller::new(user_id)))
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    /// Pin the clock, mostly for tests.
    pub fn at(mut self, now: TimeStamp<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn require_caller(&self) -> Result<&Caller, ComplianceError> {
        self.caller.as_ref().ok_or(ComplianceError::NotAuthenticated)
    }
}
