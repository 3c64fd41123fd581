//! Requirement status state machine
//!
//! ```text
//! not_started -> upcoming | pending | overdue | completed
//! upcoming    -> pending | overdue | completed
//! pending     -> overdue | completed
//! overdue     -> pending | completed
//! completed   -> pending
//! ```
//!
//! A self-transition is always legal and changes nothing. Moving an upcoming
//! requirement to overdue by date is the job of an external sweep that goes
//! through this same table.
use super::error::ComplianceError;
use super::requirement::RequirementStatus;

pub fn allowed_transitions(from: RequirementStatus) -> &'static [RequirementStatus] {
    use RequirementStatus::*;

    match from {
        NotStarted => &[Upcoming, Pending, Overdue, Completed],
        Upcoming => &[Pending, Overdue, Completed],
        Pending => &[Overdue, Completed],
        Overdue => &[Pending, Completed],
        Completed => &[Pending],
    }
}

pub fn is_transition_allowed(current: RequirementStatus, requested: RequirementStatus) -> bool {
    current == requested || allowed_transitions(current).contains(&requested)
}

/// Rejections carry the allowed set so callers can tell the user where to go next.
pub fn validate_transition(
    current: RequirementStatus,
    requested: RequirementStatus,
) -> Result<(), ComplianceError> {
    if is_transition_allowed(current, requested) {
        return Ok(());
    }

    Err(ComplianceError::InvalidTransition {
        current,
        requested,
        allowed: allowed_transitions(current).to_vec(),
    })
}
