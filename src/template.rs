//! Recurring requirement templates and the remote procedures around them
//!
//! Matching templates to companies, bulk application, and the date-driven overdue
//! sweep run as server-side procedures. They are modelled as traits so the service
//! can orchestrate them without knowing how they work.
use super::error::ComplianceError;
use super::period::{RecurrenceKind, YearConvention};
use super::requirement::{ComplianceRequirement, Penalty, RequirementDraft, RequirementStatus};
use chrono::NaiveDate;

/// A reusable requirement definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceTemplate {
    pub id: String,
    pub category: String,
    pub requirement_name: String,
    pub description: Option<String>,
    pub recurrence: RecurrenceKind,
    pub year_convention: Option<YearConvention>,
    pub required_documents: Vec<String>,
    pub is_critical: bool,
    pub penalty: Option<Penalty>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyMatch {
    pub company_id: String,
    pub reason: Option<String>,
}

/// A requirement the overdue sweep moved to `overdue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueChange {
    pub requirement_id: String,
    pub company_id: String,
    pub requirement_name: String,
    pub previous_status: RequirementStatus,
}

pub trait TemplateProcedures {
    fn match_companies_to_template(&self, template_id: &str) -> anyhow::Result<Vec<CompanyMatch>>;
    /// Returns how many requirements were created.
    fn apply_template_to_companies(
        &self,
        template_id: &str,
        company_ids: &[String],
    ) -> anyhow::Result<usize>;
}

pub trait OverdueProcedures {
    fn update_overdue_statuses(&self, as_of: NaiveDate) -> anyhow::Result<Vec<OverdueChange>>;
}

impl ComplianceTemplate {
    /// Generate a requirement for one company, linked back to this template.
    pub fn instantiate(
        &self,
        company_id: &str,
        due_date: NaiveDate,
    ) -> Result<ComplianceRequirement, ComplianceError> {
        let mut draft = RequirementDraft::new()
            .set_company(company_id)
            .set_template(&self.id)
            .set_category(&self.category)
            .set_name(&self.requirement_name)
            .set_recurrence(self.recurrence)
            .set_due_date(due_date)
            .set_required_documents(self.required_documents.iter().map(String::as_str))
            .set_critical(self.is_critical);

        if let Some(description) = &self.description {
            draft = draft.set_description(description);
        }
        if let Some(convention) = self.year_convention {
            draft = draft.set_year_convention(convention);
        }
        if let Some(penalty) = &self.penalty {
            draft = draft.set_penalty(penalty.clone());
        }

        draft.finalise()
    }
}
