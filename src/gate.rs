//! Document-completeness gate
//!
//! Completing a requirement that lists required documents only sticks when every
//! one of them has a matching upload for the requirement's period. Matching is by
//! normalized label: exact, or substring containment in either direction. That is
//! permissive on purpose ("GST Return" is satisfied by "GST Return Draft"), and an
//! upload tagged with a different period never counts.
use super::period::{PeriodKey, YearConvention, compute_period_key};
use super::requirement::{ComplianceRequirement, RequirementStatus, TimeStamp};
use chrono::Utc;
use std::collections::HashSet;
use tracing::debug;

pub const MISSING_DOCUMENTS_PREFIX: &str = "Missing documents: ";

/// A document file attached to a company. Uploads happen elsewhere, this is read-only here.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub company_id: String,
    #[n(2)]
    pub document_type: String, // free text label
    #[n(3)]
    pub period_key: Option<String>, // None applies to every period
    #[n(4)]
    pub uploaded_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub final_status: RequirementStatus,
    pub status_reason: Option<String>,
    pub missing_documents: Vec<String>,
    // None when nothing had to be matched
    pub period_key: Option<PeriodKey>,
}

impl UploadedDocument {
    pub fn new(id: &str, company_id: &str, document_type: &str, period_key: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            company_id: company_id.to_string(),
            document_type: document_type.to_string(),
            period_key: period_key.map(str::to_string),
            uploaded_at: TimeStamp::new(),
        }
    }

    fn counts_for(&self, period_key: &PeriodKey) -> bool {
        match self.period_key.as_deref() {
            None => true,
            Some(key) => period_key == key,
        }
    }
}

impl CompletionOutcome {
    pub fn is_blocked(&self) -> bool {
        !self.missing_documents.is_empty()
    }
}

/// Lowercase, drop everything but letters, digits and whitespace, then collapse
/// whitespace runs.
pub fn normalize_document_label(label: &str) -> String {
    let kept: String = label
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn label_matches(required: &str, available: &HashSet<String>) -> bool {
    available.contains(required)
        || available
            .iter()
            .any(|label| label.contains(required) || required.contains(label.as_str()))
}

/// Decide whether a completion request for `requirement` can stand.
///
/// `convention` must already be resolved (requirement, then company, then default).
/// A blocked attempt is downgraded to `pending` with a reason naming the missing
/// documents; it is not an error.
pub fn attempt_completion(
    requirement: &ComplianceRequirement,
    convention: YearConvention,
    uploaded: &[UploadedDocument],
) -> CompletionOutcome {
    if requirement.required_documents.is_empty() {
        return CompletionOutcome {
            final_status: RequirementStatus::Completed,
            status_reason: None,
            missing_documents: vec![],
            period_key: None,
        };
    }

    let period_key = compute_period_key(requirement.recurrence, requirement.due_date(), convention);

    // empty labels would substring-match everything
    let available: HashSet<String> = uploaded
        .iter()
        .filter(|doc| doc.company_id == requirement.company_id && doc.counts_for(&period_key))
        .map(|doc| normalize_document_label(&doc.document_type))
        .filter(|label| !label.is_empty())
        .collect();

    let missing_documents: Vec<String> = requirement
        .required_documents
        .iter()
        // a name with nothing left after normalization can never be matched
        .filter(|name| {
            let required = normalize_document_label(name);
            required.is_empty() || !label_matches(&required, &available)
        })
        .cloned()
        .collect();

    debug!(
        requirement_id = %requirement.id,
        period_key = %period_key,
        candidates = available.len(),
        missing = missing_documents.len(),
        "checked required documents"
    );

    if missing_documents.is_empty() {
        CompletionOutcome {
            final_status: RequirementStatus::Completed,
            status_reason: None,
            missing_documents,
            period_key: Some(period_key),
        }
    } else {
        CompletionOutcome {
            final_status: RequirementStatus::Pending,
            status_reason: Some(format!(
                "{MISSING_DOCUMENTS_PREFIX}{}",
                missing_documents.join(", ")
            )),
            missing_documents,
            period_key: Some(period_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::RecurrenceKind;
    use crate::requirement::RequirementDraft;
    use chrono::NaiveDate;

    fn requirement(
        kind: RecurrenceKind,
        due: (i32, u32, u32),
        docs: &[&str],
    ) -> ComplianceRequirement {
        RequirementDraft::new()
            .set_company("acme")
            .set_name("Filing")
            .set_recurrence(kind)
            .set_due_date(NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap())
            .set_required_documents(docs.iter().copied())
            .finalise()
            .unwrap()
    }

    fn doc(label: &str, period: Option<&str>) -> UploadedDocument {
        UploadedDocument::new("doc_1", "acme", label, period)
    }

    const FY: YearConvention = YearConvention::Financial;

    #[test]
    fn normalizes_labels() {
        assert_eq!(normalize_document_label("  GST-Return (Filed)\tCopy "), "gstreturn filed copy");
        assert_eq!(normalize_document_label("Audited   Financials 2024-25"), "audited financials 202425");
        assert_eq!(normalize_document_label("--"), "");
    }

    #[test]
    fn empty_required_list_always_completes() {
        let req = requirement(RecurrenceKind::Monthly, (2025, 1, 15), &[]);
        let outcome = attempt_completion(&req, FY, &[]);

        assert_eq!(outcome.final_status, RequirementStatus::Completed);
        assert!(outcome.period_key.is_none());
        assert!(!outcome.is_blocked());
    }

    #[test]
    fn exact_match_completes() {
        let req = requirement(RecurrenceKind::Monthly, (2025, 4, 15), &["Bank Statement"]);
        let outcome = attempt_completion(&req, FY, &[doc("bank statement", Some("2025-04"))]);

        assert_eq!(outcome.final_status, RequirementStatus::Completed);
        assert_eq!(outcome.period_key.unwrap(), "2025-04");
    }

    #[test]
    fn period_agnostic_upload_matches_any_period() {
        let req = requirement(RecurrenceKind::Annual, (2025, 6, 30), &["Trade License"]);
        let outcome = attempt_completion(&req, FY, &[doc("Trade License", None)]);

        assert_eq!(outcome.final_status, RequirementStatus::Completed);
    }

    #[test]
    fn other_period_does_not_count() {
        let req = requirement(RecurrenceKind::Monthly, (2025, 4, 15), &["Bank Statement"]);
        let outcome = attempt_completion(&req, FY, &[doc("Bank Statement", Some("2025-03"))]);

        assert_eq!(outcome.final_status, RequirementStatus::Pending);
        assert_eq!(outcome.missing_documents, vec!["Bank Statement".to_string()]);
    }

    #[test]
    fn substring_match_in_either_direction() {
        let req = requirement(RecurrenceKind::Monthly, (2025, 4, 15), &["GST Return"]);
        let outcome = attempt_completion(&req, FY, &[doc("gst return filed copy", Some("2025-04"))]);
        assert_eq!(outcome.final_status, RequirementStatus::Completed);

        let req = requirement(RecurrenceKind::Monthly, (2025, 4, 15), &["GST Return Acknowledgement"]);
        let outcome = attempt_completion(&req, FY, &[doc("GST Return", Some("2025-04"))]);
        assert_eq!(outcome.final_status, RequirementStatus::Completed);
    }

    #[test]
    fn draft_upload_satisfies_final_requirement() {
        // permissive matching: a draft is accepted as the return
        let req = requirement(RecurrenceKind::Monthly, (2025, 4, 15), &["GST Return"]);
        let outcome = attempt_completion(&req, FY, &[doc("GST Return Draft", Some("2025-04"))]);

        assert_eq!(outcome.final_status, RequirementStatus::Completed);
    }

    #[test]
    fn one_upload_can_satisfy_several_requirements() {
        let req = requirement(
            RecurrenceKind::Monthly,
            (2025, 4, 15),
            &["Payroll", "Payroll Register"],
        );
        let outcome = attempt_completion(&req, FY, &[doc("Payroll Register April", None)]);

        assert_eq!(outcome.final_status, RequirementStatus::Completed);
    }

    #[test]
    fn partial_upload_downgrades_with_reason() {
        let req = requirement(
            RecurrenceKind::Quarterly,
            (2025, 7, 31),
            &["TDS Return", "Form 16A"],
        );
        let outcome = attempt_completion(&req, FY, &[doc("TDS Return", Some("Q2-2025"))]);

        assert_eq!(outcome.final_status, RequirementStatus::Pending);
        assert_eq!(outcome.missing_documents, vec!["Form 16A".to_string()]);
        assert_eq!(outcome.status_reason.as_deref(), Some("Missing documents: Form 16A"));
    }

    #[test]
    fn punctuation_only_upload_matches_nothing() {
        let req = requirement(RecurrenceKind::Monthly, (2025, 4, 15), &["Invoice"]);
        let outcome = attempt_completion(&req, FY, &[doc("***", None)]);

        assert!(outcome.is_blocked());
    }

    #[test]
    fn punctuation_only_requirement_is_reported_missing() {
        // stored rows can predate draft validation
        let mut req = requirement(RecurrenceKind::Monthly, (2025, 4, 15), &["Invoice"]);
        req.required_documents = vec!["\u{2014}".to_string()];
        let outcome = attempt_completion(&req, FY, &[]);

        assert_eq!(outcome.final_status, RequirementStatus::Pending);
        assert_eq!(outcome.missing_documents, vec!["\u{2014}".to_string()]);

        let outcome = attempt_completion(&req, FY, &[doc("Invoice", None)]);
        assert!(outcome.is_blocked());
    }

    #[test]
    fn uploads_of_other_companies_are_ignored() {
        let req = requirement(RecurrenceKind::Monthly, (2025, 4, 15), &["Invoice"]);
        let foreign = UploadedDocument::new("doc_2", "globex", "Invoice", None);
        let outcome = attempt_completion(&req, FY, &[foreign]);

        assert!(outcome.is_blocked());
    }
}
