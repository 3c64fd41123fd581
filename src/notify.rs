//! Notification and email fan-out after a status change
//!
//! Everything here is best effort. Failures are logged and collected into a
//! [`DispatchReport`]; a status change that already persisted is never undone.
//! Emails are not sent from here: entries go to a queue drained by a separate
//! batch sender.
use super::error::DispatchError;
use super::requirement::{RequirementStatus, TimeStamp};
use super::store::{CompanyMember, RecordStore};
use super::utils;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    #[n(0)]
    CompletionBlocked,
    #[n(1)]
    StatusChanged,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub company_id: String,
    #[n(2)]
    pub user_id: String,
    #[n(3)]
    pub kind: NotificationKind,
    #[n(4)]
    pub title: String,
    #[n(5)]
    pub message: String,
    #[n(6)]
    pub metadata: String, // json
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
    #[n(8)]
    pub read: bool,
}

// key is the hash of this struct encoded into cbor
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct EmailBatchEntry {
    #[n(0)]
    pub user_id: String,
    #[n(1)]
    pub email: String,
    #[n(2)]
    pub company_id: String,
    #[n(3)]
    pub payload: String, // json
    #[n(4)]
    pub queued_at: TimeStamp<Utc>,
    #[n(5)]
    pub sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    CompletionBlocked {
        requirement_id: String,
        company_id: String,
        requirement_name: String,
        missing_documents: Vec<String>,
    },
    StatusChanged {
        requirement_id: String,
        company_id: String,
        requirement_name: String,
        from: RequirementStatus,
        to: RequirementStatus,
        changed_by: Option<String>,
    },
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub notifications_written: usize,
    pub emails_queued: usize,
    pub failures: Vec<DispatchError>,
}

/// Counts from a [`DispatchReport`], detached from the errors themselves.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub notifications_written: usize,
    pub emails_queued: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub notify_on_blocked_completion: bool,
    pub email_on_status_change: bool,
}

pub struct NotificationDispatcher<S> {
    store: Arc<S>,
    policy: DispatchPolicy,
}

impl EmailBatchEntry {
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

impl StatusEvent {
    pub fn company_id(&self) -> &str {
        match self {
            StatusEvent::CompletionBlocked { company_id, .. }
            | StatusEvent::StatusChanged { company_id, .. } => company_id,
        }
    }

    fn kind(&self) -> NotificationKind {
        match self {
            StatusEvent::CompletionBlocked { .. } => NotificationKind::CompletionBlocked,
            StatusEvent::StatusChanged { .. } => NotificationKind::StatusChanged,
        }
    }

    fn title(&self) -> String {
        match self {
            StatusEvent::CompletionBlocked {
                requirement_name, ..
            } => format!("Completion blocked: {requirement_name}"),
            StatusEvent::StatusChanged {
                requirement_name, ..
            } => format!("Status updated: {requirement_name}"),
        }
    }

    fn message(&self) -> String {
        match self {
            StatusEvent::CompletionBlocked {
                requirement_name,
                missing_documents,
                ..
            } => format!(
                "'{requirement_name}' could not be completed. Missing documents: {}",
                missing_documents.join(", ")
            ),
            StatusEvent::StatusChanged {
                requirement_name,
                from,
                to,
                ..
            } => format!("'{requirement_name}' moved from {from} to {to}"),
        }
    }

    fn metadata(&self) -> serde_json::Value {
        match self {
            StatusEvent::CompletionBlocked {
                requirement_id,
                missing_documents,
                ..
            } => serde_json::json!({
                "requirement_id": requirement_id,
                "missing_documents": missing_documents,
            }),
            StatusEvent::StatusChanged {
                requirement_id,
                requirement_name,
                from,
                to,
                changed_by,
                ..
            } => serde_json::json!({
                "requirement_id": requirement_id,
                "requirement_name": requirement_name,
                "old_status": from.as_str(),
                "new_status": to.as_str(),
                "changed_by": changed_by,
            }),
        }
    }
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            notifications_written: self.notifications_written,
            emails_queued: self.emails_queued,
            failures: self.failures.len(),
        }
    }

    fn absorb(&mut self, other: DispatchReport) {
        self.notifications_written += other.notifications_written;
        self.emails_queued += other.emails_queued;
        self.failures.extend(other.failures);
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            notify_on_blocked_completion: true,
            email_on_status_change: true,
        }
    }
}

impl<S> NotificationDispatcher<S>
where
    S: RecordStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, policy: DispatchPolicy) -> Self {
        Self { store, policy }
    }

    /// Run every event on the calling thread.
    pub fn dispatch(&self, events: &[StatusEvent]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            report.absorb(self.dispatch_one(event));
        }

        for failure in &report.failures {
            warn!(error = %failure, "status side effect failed");
        }
        debug!(
            notifications = report.notifications_written,
            emails = report.emails_queued,
            failures = report.failures.len(),
            "dispatched status events"
        );

        report
    }

    /// Run the events on a detached worker thread. The returned handle may be dropped.
    pub fn spawn(
        &self,
        events: Vec<StatusEvent>,
    ) -> std::io::Result<std::thread::JoinHandle<DispatchReport>> {
        let worker = NotificationDispatcher {
            store: Arc::clone(&self.store),
            policy: self.policy,
        };

        std::thread::Builder::new()
            .name("compliance-dispatch".into())
            .spawn(move || worker.dispatch(&events))
    }

    fn dispatch_one(&self, event: &StatusEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        let send_notifications = match event {
            StatusEvent::CompletionBlocked { .. } => self.policy.notify_on_blocked_completion,
            StatusEvent::StatusChanged { from, to, .. } => from != to,
        };
        if !send_notifications {
            return report;
        }

        let admins = match self.store.list_company_admins(event.company_id()) {
            Ok(admins) => admins,
            Err(source) => {
                report.failures.push(DispatchError::RecipientLookupFailed {
                    company_id: event.company_id().to_string(),
                    source,
                });
                return report;
            }
        };

        self.notify_admins(event, &admins, &mut report);

        if self.policy.email_on_status_change && matches!(event, StatusEvent::StatusChanged { .. }) {
            self.queue_emails(event, &admins, &mut report);
        }

        report
    }

    fn notify_admins(
        &self,
        event: &StatusEvent,
        admins: &[CompanyMember],
        report: &mut DispatchReport,
    ) {
        let metadata = event.metadata().to_string();

        for admin in admins {
            let id = match utils::new_bech32_id(utils::NOTIFICATION_HRP) {
                Ok(id) => id,
                Err(source) => {
                    report.failures.push(DispatchError::NotificationFailed {
                        user_id: admin.user_id.clone(),
                        source,
                    });
                    continue;
                }
            };

            let notification = Notification {
                id,
                company_id: event.company_id().to_string(),
                user_id: admin.user_id.clone(),
                kind: event.kind(),
                title: event.title(),
                message: event.message(),
                metadata: metadata.clone(),
                created_at: TimeStamp::new(),
                read: false,
            };

            match self.store.write_notification(&notification) {
                Ok(()) => report.notifications_written += 1,
                Err(source) => report.failures.push(DispatchError::NotificationFailed {
                    user_id: admin.user_id.clone(),
                    source,
                }),
            }
        }
    }

    // one entry per distinct address
    fn queue_emails(
        &self,
        event: &StatusEvent,
        admins: &[CompanyMember],
        report: &mut DispatchReport,
    ) {
        let mut seen = HashSet::new();
        let payload = serde_json::json!({
            "type": "status_change",
            "title": event.title(),
            "message": event.message(),
            "details": event.metadata(),
        })
        .to_string();

        for admin in admins {
            let Some(email) = admin.email.as_deref().filter(|e| !e.trim().is_empty()) else {
                continue;
            };
            if !seen.insert(utils::email_dedup_key(email)) {
                continue;
            }

            let entry = EmailBatchEntry {
                user_id: admin.user_id.clone(),
                email: email.trim().to_string(),
                company_id: event.company_id().to_string(),
                payload: payload.clone(),
                queued_at: TimeStamp::new(),
                sent: false,
            };

            match self.store.enqueue_email(&entry) {
                Ok(()) => report.emails_queued += 1,
                Err(source) => report.failures.push(DispatchError::EmailQueueFailed {
                    email: entry.email,
                    source,
                }),
            }
        }
    }
}
