use std::sync::Arc;

use futures::StreamExt;

use intake_bot::config::BotConfig;
use intake_bot::error::InviteError;
use intake_bot::intake::{EntryMode, IntakeEngine};
use intake_bot::invites::{self, InviteService};
use intake_bot::store::{LibSqlBackend, Storage};
use intake_bot::transport::{
    InviteLinkCreator, Messenger, TelegramMessenger, Update,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🤖 intake-bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Bot: @{}", config.bot_username);
    eprintln!("   Group: {}", config.group_chat_id);
    eprintln!("   Database: {}", config.db_path.display());

    let db: Arc<dyn Storage> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    let telegram = Arc::new(TelegramMessenger::new(config.bot_token.clone()));
    telegram.health_check().await?;

    let engine = IntakeEngine::new(
        Arc::clone(&db),
        Arc::clone(&telegram) as Arc<dyn Messenger>,
        config.bot_username.clone(),
    );
    let invite_service = InviteService::new(
        Arc::clone(&db),
        Arc::clone(&telegram) as Arc<dyn InviteLinkCreator>,
        config.group_chat_id,
    );

    let mut updates = telegram.start_polling();
    while let Some(update) = updates.next().await {
        match update {
            Update::DeepLink {
                applicant_id,
                payload,
            } => {
                let Some(mode) = EntryMode::from_payload(&payload) else {
                    continue;
                };
                if let Err(e) = engine.start_or_resume(applicant_id, mode).await {
                    tracing::error!(applicant_id, error = %e, "Entry handling failed");
                }
            }

            Update::Applicant {
                applicant_id,
                event,
            } => {
                if let Err(e) = engine.handle_event(applicant_id, event).await {
                    tracing::error!(applicant_id, error = %e, "Event handling failed");
                }
            }

            Update::GroupCommand {
                chat_id,
                thread_id,
                sender_id,
                text,
            } => {
                handle_group_command(
                    &invite_service,
                    &telegram,
                    &config,
                    chat_id,
                    thread_id,
                    sender_id,
                    &text,
                )
                .await;
            }

            Update::MemberJoined {
                telegram_id,
                first_name,
                last_name,
                username,
                invite_link,
            } => {
                if let Err(e) = invite_service
                    .handle_member_joined(
                        telegram_id,
                        &first_name,
                        last_name.as_deref(),
                        username.as_deref(),
                        &invite_link,
                    )
                    .await
                {
                    tracing::error!(telegram_id, error = %e, "Member bookkeeping failed");
                }
            }
        }
    }

    Ok(())
}

/// Manager commands in the group. Only `/invite <name>` is understood, and
/// only in the configured commands thread.
async fn handle_group_command(
    invite_service: &InviteService,
    telegram: &TelegramMessenger,
    config: &BotConfig,
    chat_id: i64,
    thread_id: Option<i64>,
    sender_id: i64,
    text: &str,
) {
    let Some(rest) = text.strip_prefix("/invite") else {
        return;
    };
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        // Some other command that merely shares the prefix.
        return;
    }
    if config.commands_thread_id.is_some() && thread_id != config.commands_thread_id {
        return;
    }

    let member_name = rest.trim();
    let reply = if member_name.is_empty() {
        invites::usage_reply().to_string()
    } else {
        match invite_service.create_invite_link(sender_id, member_name).await {
            Ok(invite) => invites::link_created_reply(member_name, &invite.link),
            Err(InviteError::NotManager(_)) => invites::no_permission_reply().to_string(),
            Err(e) => {
                tracing::error!(sender_id, error = %e, "Invite creation failed");
                return;
            }
        }
    };

    if let Err(e) = telegram.send_in_thread(chat_id, thread_id, &reply).await {
        tracing::warn!(chat_id, error = %e, "Failed to reply to manager command");
    }
}
