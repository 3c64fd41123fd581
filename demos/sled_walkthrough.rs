//! Walk one annual filing through a blocked and then a successful completion.
//!
//! cargo run --example sled_walkthrough

use chrono::NaiveDate;
use compliance_tracker::{
    context::RequestContext,
    gate::UploadedDocument,
    period::{RecurrenceKind, YearConvention, compute_period_key},
    requirement::{RequirementDraft, RequirementStatus},
    service::ComplianceService,
    store::{Company, CompanyMember, MemberRole, SledStore},
    utils,
};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let temp_dir = tempfile::tempdir()?;
    let db = sled::open(temp_dir.path().join("walkthrough.db"))?;
    let store = Arc::new(SledStore::open(Arc::new(db))?);

    store.upsert_company(&Company {
        id: "acme".into(),
        name: "Acme Pvt Ltd".into(),
        year_convention: Some(YearConvention::Financial),
    })?;
    store.add_member(&CompanyMember {
        company_id: "acme".into(),
        user_id: "user_cfo".into(),
        email: Some("cfo@acme.test".into()),
        role: MemberRole::Admin,
    })?;

    let service = ComplianceService::new(store.clone());
    let ctx = RequestContext::for_user("user_cfo");

    let due = NaiveDate::from_ymd_opt(2025, 3, 20).ok_or(anyhow::anyhow!("bad due date"))?;
    let req = service.create_requirement(
        &ctx,
        RequirementDraft::new()
            .set_company("acme")
            .set_category("Annual filings")
            .set_name("Statutory audit")
            .set_recurrence(RecurrenceKind::Annual)
            .set_due_date(due)
            .require_document("Audited Financials"),
    )?;
    service.update_requirement_status(&ctx, &req.id, RequirementStatus::Pending)?;

    let attempt = service.update_requirement_status(&ctx, &req.id, RequirementStatus::Completed)?;
    println!(
        "first attempt: {} (missing: {:?})",
        attempt.final_status,
        attempt.missing_documents()
    );

    // tag the upload with the period the requirement falls into
    let period = compute_period_key(RecurrenceKind::Annual, due, YearConvention::Financial);
    store.record_document(&UploadedDocument::new(
        &utils::new_bech32_id(utils::DOCUMENT_HRP)?,
        "acme",
        "Audited Financials FY 2024-25",
        Some(period.as_str()),
    ))?;

    let attempt = service.update_requirement_status(&ctx, &req.id, RequirementStatus::Completed)?;
    println!("second attempt: {} for {period}", attempt.final_status);

    for notification in store.notifications_for("acme")? {
        println!("notification -> {}: {}", notification.user_id, notification.message);
    }
    println!("queued emails: {}", store.queued_emails()?.len());

    store.flush()?;
    Ok(())
}
