//! Unified `Storage` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::intake::Session;
use crate::model::{Application, InviteLink, Manager, Member, NewApplication};

/// Backend-agnostic storage trait covering sessions, applications,
/// members, managers, and invite links.
#[async_trait]
pub trait Storage: Send + Sync {
    // ── Sessions ────────────────────────────────────────────────────

    /// Load the in-progress session for an applicant, if any.
    async fn get_session(&self, applicant_id: i64) -> Result<Option<Session>, DatabaseError>;

    /// Persist (insert or replace) an applicant's session.
    async fn put_session(&self, applicant_id: i64, session: &Session)
        -> Result<(), DatabaseError>;

    /// Delete an applicant's session. Deleting a missing session is not
    /// an error.
    async fn clear_session(&self, applicant_id: i64) -> Result<(), DatabaseError>;

    // ── Applications ────────────────────────────────────────────────

    /// Insert a finished application. Rows are immutable once written.
    async fn insert_application(
        &self,
        new: NewApplication,
    ) -> Result<Application, DatabaseError>;

    /// Look up an application by the member it belongs to.
    async fn application_by_member(
        &self,
        member_id: Uuid,
    ) -> Result<Option<Application>, DatabaseError>;

    // ── Members ─────────────────────────────────────────────────────

    /// Record a member who joined through an invite link.
    async fn insert_member(
        &self,
        telegram_id: i64,
        first_name: &str,
        last_name: Option<&str>,
        username: Option<&str>,
        invite_link_id: Uuid,
    ) -> Result<Member, DatabaseError>;

    async fn member_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Member>, DatabaseError>;

    // ── Managers ────────────────────────────────────────────────────

    async fn manager_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<Manager>, DatabaseError>;

    async fn manager_by_id(&self, id: Uuid) -> Result<Option<Manager>, DatabaseError>;

    /// Register a manager. Used by seeding scripts and tests.
    async fn insert_manager(
        &self,
        telegram_id: i64,
        name: &str,
    ) -> Result<Manager, DatabaseError>;

    // ── Invite links ────────────────────────────────────────────────

    /// Record a freshly issued invite link.
    async fn insert_invite_link(
        &self,
        link: &str,
        manager_id: Uuid,
        member_name: &str,
    ) -> Result<InviteLink, DatabaseError>;

    async fn invite_link_by_id(&self, id: Uuid) -> Result<Option<InviteLink>, DatabaseError>;

    /// Look up a link by its URL (when someone joins through it).
    async fn invite_link_by_url(&self, url: &str)
        -> Result<Option<InviteLink>, DatabaseError>;

    async fn mark_invite_link_used(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Delete all never-used links. Returns how many were deleted.
    async fn delete_unused_invite_links(&self) -> Result<usize, DatabaseError>;
}
