//! Service layer API for compliance requirement operations
use super::config::{DispatchMode, ServiceConfig};
use super::context::{Caller, RequestContext};
use super::error::ComplianceError;
use super::gate::{CompletionOutcome, attempt_completion};
use super::notify::{DispatchSummary, NotificationDispatcher, StatusEvent};
use super::period::{PeriodKey, YearConvention, resolve_year_convention};
use super::requirement::{
    ComplianceRequirement, RequirementDraft, RequirementStatus, StatusChange, TimeStamp,
};
use super::store::RecordStore;
use super::template::{ComplianceTemplate, OverdueChange, OverdueProcedures, TemplateProcedures};
use super::transition::validate_transition;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a status request ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// Requested status equals the current one. Nothing was written.
    Unchanged,
    /// Completion was requested but documents are missing; the requirement was
    /// parked in `pending` instead.
    CompletionBlocked { missing_documents: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub requirement_id: String,
    pub previous_status: RequirementStatus,
    pub requested_status: RequirementStatus,
    pub final_status: RequirementStatus,
    pub status_reason: Option<String>,
    pub filed_on: Option<TimeStamp<Utc>>,
    pub filed_by: Option<String>,
    pub period_key: Option<PeriodKey>,
    pub resolution: Resolution,
    /// Side-effect counts when dispatch ran inline. `None` when nothing was
    /// dispatched or the work went to a detached worker.
    pub dispatched: Option<DispatchSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Edit,
}

pub struct ComplianceService<S> {
    store: Arc<S>,
    config: ServiceConfig,
    dispatcher: NotificationDispatcher<S>,
}

impl StatusUpdate {
    pub fn is_blocked(&self) -> bool {
        matches!(self.resolution, Resolution::CompletionBlocked { .. })
    }

    pub fn missing_documents(&self) -> &[String] {
        match &self.resolution {
            Resolution::CompletionBlocked { missing_documents } => missing_documents,
            _ => &[],
        }
    }
}

impl<S> ComplianceService<S>
where
    S: RecordStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: ServiceConfig) -> Self {
        let dispatcher = NotificationDispatcher::new(Arc::clone(&store), config.dispatch_policy());
        Self {
            store,
            config,
            dispatcher,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_requirement(
        &self,
        requirement_id: &str,
    ) -> Result<ComplianceRequirement, ComplianceError> {
        self.store
            .get_requirement(requirement_id)
            .map_err(ComplianceError::StoreReadFailed)?
            .ok_or_else(|| ComplianceError::NotFound(requirement_id.to_string()))
    }

    fn authorize(
        &self,
        caller: &Caller,
        company_id: &str,
        access: Access,
    ) -> Result<(), ComplianceError> {
        if caller.is_platform_superadmin {
            return Ok(());
        }

        let role = self
            .store
            .member_role(company_id, &caller.user_id)
            .map_err(ComplianceError::StoreReadFailed)?;

        let allowed = match (role, access) {
            (Some(_), Access::Read) => true,
            (Some(role), Access::Edit) => role.can_edit(),
            (None, _) => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(ComplianceError::PermissionDenied {
                user_id: caller.user_id.clone(),
                company_id: company_id.to_string(),
            })
        }
    }

    fn year_convention_for(
        &self,
        requirement: &ComplianceRequirement,
    ) -> Result<YearConvention, ComplianceError> {
        if let Some(convention) = requirement.year_convention {
            return Ok(convention);
        }

        let company = self
            .store
            .get_company_year_convention(&requirement.company_id)
            .map_err(ComplianceError::StoreReadFailed)?;

        Ok(resolve_year_convention(
            None,
            company,
            self.config.default_year_convention,
        ))
    }

    fn check_completion(
        &self,
        requirement: &ComplianceRequirement,
    ) -> Result<CompletionOutcome, ComplianceError> {
        if requirement.required_documents.is_empty() {
            return Ok(attempt_completion(
                requirement,
                self.config.default_year_convention,
                &[],
            ));
        }

        let convention = self.year_convention_for(requirement)?;
        // fetched unfiltered, the gate scopes by period
        let uploaded = self
            .store
            .list_uploaded_documents(&requirement.company_id)
            .map_err(ComplianceError::StoreReadFailed)?;

        Ok(attempt_completion(requirement, convention, &uploaded))
    }

    fn dispatch(&self, events: Vec<StatusEvent>) -> Option<DispatchSummary> {
        if events.is_empty() {
            return None;
        }

        match self.config.dispatch {
            DispatchMode::Inline => Some(self.dispatcher.dispatch(&events).summary()),
            DispatchMode::Detached => {
                if let Err(err) = self.dispatcher.spawn(events) {
                    warn!(error = %err, "could not start dispatch worker, side effects dropped");
                }
                None
            }
        }
    }

    /// Validate and persist a manually created requirement.
    pub fn create_requirement(
        &self,
        ctx: &RequestContext,
        draft: RequirementDraft,
    ) -> Result<ComplianceRequirement, ComplianceError> {
        let caller = ctx.require_caller()?;
        let requirement = draft.finalise()?;
        self.authorize(caller, &requirement.company_id, Access::Edit)?;

        self.store
            .insert_requirement(&requirement)
            .map_err(ComplianceError::StoreWriteFailed)?;

        info!(
            requirement_id = %requirement.id,
            company_id = %requirement.company_id,
            "created requirement"
        );
        Ok(requirement)
    }

    /// Generate and persist one company's requirement from a template.
    pub fn instantiate_template(
        &self,
        ctx: &RequestContext,
        template: &ComplianceTemplate,
        company_id: &str,
        due_date: NaiveDate,
    ) -> Result<ComplianceRequirement, ComplianceError> {
        let caller = ctx.require_caller()?;
        self.authorize(caller, company_id, Access::Edit)?;

        let requirement = template.instantiate(company_id, due_date)?;
        self.store
            .insert_requirement(&requirement)
            .map_err(ComplianceError::StoreWriteFailed)?;

        info!(
            requirement_id = %requirement.id,
            template_id = %template.id,
            company_id,
            "instantiated template"
        );
        Ok(requirement)
    }

    /// Move a requirement to `requested`.
    ///
    /// Auth and transition checks happen before any write. A completion request
    /// can come back with `final_status == Pending` and
    /// [`Resolution::CompletionBlocked`]; callers have to inspect the result.
    /// Notification and email failures never surface here.
    pub fn update_requirement_status(
        &self,
        ctx: &RequestContext,
        requirement_id: &str,
        requested: RequirementStatus,
    ) -> Result<StatusUpdate, ComplianceError> {
        let caller = ctx.require_caller()?;
        let requirement = self.load_requirement(requirement_id)?;
        self.authorize(caller, &requirement.company_id, Access::Edit)?;

        let current = requirement.status;
        validate_transition(current, requested)?;

        if current == requested {
            debug!(requirement_id, status = %current, "status unchanged");
            return Ok(StatusUpdate {
                requirement_id: requirement.id,
                previous_status: current,
                requested_status: requested,
                final_status: current,
                status_reason: requirement.status_reason,
                filed_on: requirement.filed_on,
                filed_by: requirement.filed_by,
                period_key: None,
                resolution: Resolution::Unchanged,
                dispatched: None,
            });
        }

        let (change, period_key, resolution) = if requested == RequirementStatus::Completed {
            let outcome = self.check_completion(&requirement)?;
            if outcome.is_blocked() {
                let change = StatusChange::to(outcome.final_status, outcome.status_reason);
                let resolution = Resolution::CompletionBlocked {
                    missing_documents: outcome.missing_documents,
                };
                (change, outcome.period_key, resolution)
            } else {
                let change = StatusChange::completed(ctx.now.clone(), &caller.user_id);
                (change, outcome.period_key, Resolution::Applied)
            }
        } else {
            (StatusChange::to(requested, None), None, Resolution::Applied)
        };

        self.store
            .persist_status(&requirement.id, &change)
            .map_err(ComplianceError::StoreWriteFailed)?;

        let mut events = vec![];
        if let Resolution::CompletionBlocked { missing_documents } = &resolution {
            warn!(
                requirement_id,
                company_id = %requirement.company_id,
                missing = %missing_documents.join(", "),
                "completion blocked"
            );
            events.push(StatusEvent::CompletionBlocked {
                requirement_id: requirement.id.clone(),
                company_id: requirement.company_id.clone(),
                requirement_name: requirement.requirement_name.clone(),
                missing_documents: missing_documents.clone(),
            });
        }
        if change.status != current {
            info!(
                requirement_id,
                company_id = %requirement.company_id,
                from = %current,
                to = %change.status,
                "requirement status changed"
            );
            events.push(StatusEvent::StatusChanged {
                requirement_id: requirement.id.clone(),
                company_id: requirement.company_id.clone(),
                requirement_name: requirement.requirement_name.clone(),
                from: current,
                to: change.status,
                changed_by: Some(caller.user_id.clone()),
            });
        }
        let dispatched = self.dispatch(events);

        Ok(StatusUpdate {
            requirement_id: requirement.id,
            previous_status: current,
            requested_status: requested,
            final_status: change.status,
            status_reason: change.status_reason,
            filed_on: change.filed_on,
            filed_by: change.filed_by,
            period_key,
            resolution,
            dispatched,
        })
    }

    /// What completing the requirement right now would report, without writing.
    pub fn missing_documents(
        &self,
        ctx: &RequestContext,
        requirement_id: &str,
    ) -> Result<CompletionOutcome, ComplianceError> {
        let caller = ctx.require_caller()?;
        let requirement = self.load_requirement(requirement_id)?;
        self.authorize(caller, &requirement.company_id, Access::Read)?;

        self.check_completion(&requirement)
    }

    /// Match a template against every company and apply it to the matches.
    /// Returns the number of requirements the procedure created.
    pub fn apply_template<P: TemplateProcedures>(
        &self,
        ctx: &RequestContext,
        procedures: &P,
        template_id: &str,
    ) -> Result<usize, ComplianceError> {
        let caller = ctx.require_caller()?;
        if !caller.is_platform_superadmin {
            return Err(ComplianceError::PlatformAdminRequired(caller.user_id.clone()));
        }

        let matches = procedures
            .match_companies_to_template(template_id)
            .map_err(|source| ComplianceError::ProcedureFailed {
                procedure: "match_companies_to_template",
                source,
            })?;
        if matches.is_empty() {
            debug!(template_id, "template matched no companies");
            return Ok(0);
        }

        let company_ids: Vec<String> = matches.into_iter().map(|m| m.company_id).collect();
        let created = procedures
            .apply_template_to_companies(template_id, &company_ids)
            .map_err(|source| ComplianceError::ProcedureFailed {
                procedure: "apply_template_to_companies",
                source,
            })?;

        info!(
            template_id,
            companies = company_ids.len(),
            created,
            "applied template"
        );
        Ok(created)
    }

    /// Run the overdue sweep and announce every requirement it moved.
    pub fn refresh_overdue<P: OverdueProcedures>(
        &self,
        procedures: &P,
        as_of: NaiveDate,
    ) -> Result<Vec<OverdueChange>, ComplianceError> {
        let changes = procedures
            .update_overdue_statuses(as_of)
            .map_err(|source| ComplianceError::ProcedureFailed {
                procedure: "update_overdue_statuses",
                source,
            })?;

        info!(%as_of, moved = changes.len(), "overdue sweep finished");

        let events = changes
            .iter()
            .filter(|c| c.previous_status != RequirementStatus::Overdue)
            .map(|c| StatusEvent::StatusChanged {
                requirement_id: c.requirement_id.clone(),
                company_id: c.company_id.clone(),
                requirement_name: c.requirement_name.clone(),
                from: c.previous_status,
                to: RequirementStatus::Overdue,
                changed_by: None,
            })
            .collect();
        if let Some(summary) = self.dispatch(events) {
            debug!(
                notifications = summary.notifications_written,
                emails = summary.emails_queued,
                failures = summary.failures,
                "announced overdue requirements"
            );
        }

        Ok(changes)
    }
}
