//! Directory and record store boundary, plus an embedded sled implementation
use super::gate::UploadedDocument;
use super::notify::{EmailBatchEntry, Notification};
use super::period::YearConvention;
use super::requirement::{ComplianceRequirement, StatusChange};
use sled::{Db, Tree};
use std::sync::Arc;

/// Everything the compliance core reads and writes goes through here.
///
/// Each call is independent; no multi-row transaction is assumed.
pub trait RecordStore {
    fn get_requirement(&self, id: &str) -> anyhow::Result<Option<ComplianceRequirement>>;
    fn insert_requirement(&self, requirement: &ComplianceRequirement) -> anyhow::Result<()>;
    fn get_company_year_convention(
        &self,
        company_id: &str,
    ) -> anyhow::Result<Option<YearConvention>>;
    fn list_uploaded_documents(&self, company_id: &str) -> anyhow::Result<Vec<UploadedDocument>>;
    /// Single-row update. Last writer wins.
    fn persist_status(&self, requirement_id: &str, change: &StatusChange) -> anyhow::Result<()>;
    fn member_role(&self, company_id: &str, user_id: &str) -> anyhow::Result<Option<MemberRole>>;
    fn list_company_admins(&self, company_id: &str) -> anyhow::Result<Vec<CompanyMember>>;
    fn write_notification(&self, notification: &Notification) -> anyhow::Result<()>;
    fn enqueue_email(&self, entry: &EmailBatchEntry) -> anyhow::Result<()>;
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Company {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub year_convention: Option<YearConvention>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemberRole {
    #[n(0)]
    Viewer,
    #[n(1)]
    Editor,
    #[n(2)]
    Admin,
    #[n(3)]
    Superadmin,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CompanyMember {
    #[n(0)]
    pub company_id: String,
    #[n(1)]
    pub user_id: String,
    #[n(2)]
    pub email: Option<String>,
    #[n(3)]
    pub role: MemberRole,
}

pub struct SledStore {
    instance: Arc<Db>,
    requirements: Tree,
    companies: Tree,
    documents: Tree,     // company/document
    members: Tree,       // company/user
    notifications: Tree, // company/notification
    email_queue: Tree,   // sha256 of the cbor entry
}

impl MemberRole {
    pub fn can_edit(&self) -> bool {
        *self >= MemberRole::Editor
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Superadmin)
    }
}

// The scope is length-prefixed so one company id can never be a key prefix of
// another, even when ids contain the separator.
fn scoped_key(scope: &str, id: &str) -> Vec<u8> {
    let mut key = scope_prefix(scope);
    key.extend_from_slice(id.as_bytes());
    key
}

fn scope_prefix(scope: &str) -> Vec<u8> {
    format!("{}:{scope}/", scope.len()).into_bytes()
}

fn decode_all<T>(tree: &Tree, prefix: &[u8]) -> anyhow::Result<Vec<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    let mut out = vec![];
    for entry in tree.scan_prefix(prefix) {
        let (_, value) = entry?;
        out.push(minicbor::decode(&value)?);
    }
    Ok(out)
}

impl SledStore {
    pub fn open(instance: Arc<Db>) -> anyhow::Result<Self> {
        Ok(Self {
            requirements: instance.open_tree("requirements")?,
            companies: instance.open_tree("companies")?,
            documents: instance.open_tree("documents")?,
            members: instance.open_tree("members")?,
            notifications: instance.open_tree("notifications")?,
            email_queue: instance.open_tree("email_queue")?,
            instance,
        })
    }

    pub fn upsert_company(&self, company: &Company) -> anyhow::Result<()> {
        self.companies
            .insert(company.id.as_bytes(), minicbor::to_vec(company)?)?;
        Ok(())
    }

    pub fn add_member(&self, member: &CompanyMember) -> anyhow::Result<()> {
        self.members.insert(
            scoped_key(&member.company_id, &member.user_id),
            minicbor::to_vec(member)?,
        )?;
        Ok(())
    }

    pub fn record_document(&self, document: &UploadedDocument) -> anyhow::Result<()> {
        self.documents.insert(
            scoped_key(&document.company_id, &document.id),
            minicbor::to_vec(document)?,
        )?;
        Ok(())
    }

    pub fn notifications_for(&self, company_id: &str) -> anyhow::Result<Vec<Notification>> {
        let notifications: Vec<Notification> =
            decode_all(&self.notifications, &scope_prefix(company_id))?;
        Ok(notifications
            .into_iter()
            .filter(|n| n.company_id == company_id)
            .collect())
    }

    pub fn queued_emails(&self) -> anyhow::Result<Vec<EmailBatchEntry>> {
        decode_all(&self.email_queue, &[])
    }

    /// Block until every pending write is on disk.
    pub fn flush(&self) -> anyhow::Result<usize> {
        Ok(self.instance.flush()?)
    }
}

impl RecordStore for SledStore {
    fn get_requirement(&self, id: &str) -> anyhow::Result<Option<ComplianceRequirement>> {
        match self.requirements.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn insert_requirement(&self, requirement: &ComplianceRequirement) -> anyhow::Result<()> {
        self.requirements
            .insert(requirement.id.as_bytes(), minicbor::to_vec(requirement)?)?;
        Ok(())
    }

    fn get_company_year_convention(
        &self,
        company_id: &str,
    ) -> anyhow::Result<Option<YearConvention>> {
        let Some(bytes) = self.companies.get(company_id.as_bytes())? else {
            return Ok(None);
        };
        let company: Company = minicbor::decode(&bytes)?;
        Ok(company.year_convention)
    }

    fn list_uploaded_documents(&self, company_id: &str) -> anyhow::Result<Vec<UploadedDocument>> {
        let documents: Vec<UploadedDocument> =
            decode_all(&self.documents, &scope_prefix(company_id))?;
        Ok(documents
            .into_iter()
            .filter(|d| d.company_id == company_id)
            .collect())
    }

    fn persist_status(&self, requirement_id: &str, change: &StatusChange) -> anyhow::Result<()> {
        let Some(bytes) = self.requirements.get(requirement_id.as_bytes())? else {
            return Err(anyhow::anyhow!("requirement {requirement_id} does not exist"));
        };
        let mut requirement: ComplianceRequirement = minicbor::decode(&bytes)?;
        change.apply_to(&mut requirement);

        self.requirements
            .insert(requirement_id.as_bytes(), minicbor::to_vec(&requirement)?)?;
        Ok(())
    }

    fn member_role(&self, company_id: &str, user_id: &str) -> anyhow::Result<Option<MemberRole>> {
        match self.members.get(scoped_key(company_id, user_id))? {
            Some(bytes) => {
                let member: CompanyMember = minicbor::decode(&bytes)?;
                Ok(Some(member.role))
            }
            None => Ok(None),
        }
    }

    fn list_company_admins(&self, company_id: &str) -> anyhow::Result<Vec<CompanyMember>> {
        let members: Vec<CompanyMember> = decode_all(&self.members, &scope_prefix(company_id))?;
        Ok(members
            .into_iter()
            .filter(|m| m.company_id == company_id && m.role.is_admin())
            .collect())
    }

    fn write_notification(&self, notification: &Notification) -> anyhow::Result<()> {
        self.notifications.insert(
            scoped_key(&notification.company_id, &notification.id),
            minicbor::to_vec(notification)?,
        )?;
        Ok(())
    }

    fn enqueue_email(&self, entry: &EmailBatchEntry) -> anyhow::Result<()> {
        let (hash, cbor) = entry.build()?;
        self.email_queue.insert(hash.as_bytes(), cbor)?;
        Ok(())
    }
}
