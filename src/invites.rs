//! Invite issuance and membership bookkeeping.
//!
//! Managers mint single-use invite links; when someone joins through one,
//! the link is burned and the member is recorded with her manager
//! attribution. The intake flow later reads that attribution at session
//! creation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::InviteError;
use crate::model::{InviteLink, Member};
use crate::store::Storage;
use crate::transport::InviteLinkCreator;

/// Invite links stop working this long after issuance.
const LINK_EXPIRE_HOURS: i64 = 24;

/// Telegram caps invite link names at 32 characters.
const LINK_NAME_MAX: usize = 32;

/// Issues invite links and records who joined through them.
pub struct InviteService {
    store: Arc<dyn Storage>,
    links: Arc<dyn InviteLinkCreator>,
    group_chat_id: i64,
}

impl InviteService {
    pub fn new(
        store: Arc<dyn Storage>,
        links: Arc<dyn InviteLinkCreator>,
        group_chat_id: i64,
    ) -> Self {
        Self {
            store,
            links,
            group_chat_id,
        }
    }

    /// Create a single-use, 24-hour invite link for a named invitee,
    /// attributed to the requesting manager.
    ///
    /// Fails with [`InviteError::NotManager`] unless the sender is a known,
    /// active manager.
    pub async fn create_invite_link(
        &self,
        manager_telegram_id: i64,
        member_name: &str,
    ) -> Result<InviteLink, InviteError> {
        let manager = self
            .store
            .manager_by_telegram_id(manager_telegram_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or(InviteError::NotManager(manager_telegram_id))?;

        let expire_at = Utc::now() + Duration::hours(LINK_EXPIRE_HOURS);
        let url = self
            .links
            .create_invite_link(self.group_chat_id, &shorten_name(member_name), expire_at)
            .await?;
        debug!(manager = %manager.name, member_name, "Created invite link");

        let invite = self
            .store
            .insert_invite_link(&url, manager.id, member_name)
            .await?;
        info!(invite_id = %invite.id, manager = %manager.name, "Invite link recorded");

        Ok(invite)
    }

    /// Record a member who joined the group through an invite link.
    ///
    /// Joins through links the bot did not issue are logged and skipped.
    pub async fn handle_member_joined(
        &self,
        telegram_id: i64,
        first_name: &str,
        last_name: Option<&str>,
        username: Option<&str>,
        invite_url: &str,
    ) -> Result<Option<Member>, InviteError> {
        let Some(invite) = self.store.invite_link_by_url(invite_url).await? else {
            warn!(invite_url, "Join through unknown invite link");
            return Ok(None);
        };

        self.store.mark_invite_link_used(invite.id).await?;

        let member = self
            .store
            .insert_member(telegram_id, first_name, last_name, username, invite.id)
            .await?;
        info!(member_id = %member.id, first_name, "New member joined");

        Ok(Some(member))
    }

    /// Sweep links that were never used. Telegram stops honoring them after
    /// the 24-hour window anyway; this drops the stale rows. Returns how
    /// many were removed.
    pub async fn sweep_unused_links(&self) -> Result<usize, InviteError> {
        let deleted = self.store.delete_unused_invite_links().await?;
        if deleted > 0 {
            info!(deleted, "Deleted unused invite links");
        }
        Ok(deleted)
    }
}

/// Shorten a full name for the invite-link label: surname in full, the
/// remaining words as initials.
///
/// "Karimova Malika Rustamovna" → "Karimova M.R."
pub fn shorten_name(full_name: &str) -> String {
    let parts: Vec<&str> = full_name.split_whitespace().collect();

    let short = match parts.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [surname, rest @ ..] => {
            let initials: String = rest
                .iter()
                .take(2)
                .filter_map(|word| word.chars().next())
                .map(|c| format!("{c}."))
                .collect();
            format!("{surname} {initials}")
        }
    };

    short.chars().take(LINK_NAME_MAX).collect()
}

// ── Manager-facing replies ──────────────────────────────────────────

pub fn link_created_reply(member_name: &str, url: &str) -> String {
    format!(
        "✅ Link for: {member_name}\n\n\
         ⏰ Valid for: 24 hours\n\
         👤 Can be used once\n\n\
         {url}\n\n\
         👆 Copy the link and send it over"
    )
}

pub fn usage_reply() -> &'static str {
    "Usage: /invite <full name of the invitee>"
}

pub fn no_permission_reply() -> &'static str {
    "❌ You are not allowed to create invite links"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_is_kept_as_is() {
        assert_eq!(shorten_name("Karimova"), "Karimova");
    }

    #[test]
    fn two_words_become_surname_and_initial() {
        assert_eq!(shorten_name("Karimova Malika"), "Karimova M.");
    }

    #[test]
    fn three_words_become_surname_and_two_initials() {
        assert_eq!(
            shorten_name("Karimova Malika Rustamovna"),
            "Karimova M.R."
        );
    }

    #[test]
    fn long_names_are_truncated_to_the_platform_limit() {
        let name = "Konstantinopolskaya Alexandra Vladimirovna Extra";
        assert!(shorten_name(name).chars().count() <= 32);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(shorten_name(""), "");
        assert_eq!(shorten_name("   "), "");
    }
}
