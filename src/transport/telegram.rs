//! Telegram transport — Bot API over HTTPS, updates via long-polling.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::transport::{Choice, InviteLinkCreator, Keyboard, MessageRef, Messenger};

use super::Event;

/// A decoded Bot API update, already sorted by where it must be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// `/start <payload>` deep-link activation in a private chat.
    DeepLink { applicant_id: i64, payload: String },
    /// Any other private-chat input from an applicant.
    Applicant { applicant_id: i64, event: Event },
    /// A slash command in a group chat (manager commands).
    GroupCommand {
        chat_id: i64,
        thread_id: Option<i64>,
        sender_id: i64,
        text: String,
    },
    /// Someone became a group member through an invite link.
    MemberJoined {
        telegram_id: i64,
        first_name: String,
        last_name: Option<String>,
        username: Option<String>,
        invite_link: String,
    },
}

/// Stream of decoded updates from the long-poll loop.
pub type UpdateStream = Pin<Box<dyn Stream<Item = Update> + Send>>;

/// Telegram messenger — connects to the Bot API.
#[derive(Clone)]
pub struct TelegramMessenger {
    token: Arc<SecretString>,
    client: reqwest::Client,
}

impl TelegramMessenger {
    pub fn new(token: SecretString) -> Self {
        Self {
            token: Arc::new(token),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.token.expose_secret()
        )
    }

    /// POST a Bot API method and unwrap the `result` payload.
    async fn call(&self, method: &str, body: Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::InvalidResponse(e.to_string()))?;

        let ok = data.get("ok").and_then(Value::as_bool).unwrap_or(false);
        if !status.is_success() || !ok {
            let detail = data
                .get("description")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| status.to_string());
            return Err(ChannelError::Api {
                method: method.to_string(),
                detail,
            });
        }

        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Verify the token against `getMe`.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let me = self.call("getMe", json!({})).await?;
        let username = me.get("username").and_then(Value::as_str).unwrap_or("?");
        info!(bot = username, "Telegram token verified");
        Ok(())
    }

    /// Send a message into a specific forum topic/thread of a group.
    pub async fn send_in_thread(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
    ) -> Result<(), ChannelError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(thread_id) = thread_id {
            body["message_thread_id"] = json!(thread_id);
        }
        self.call("sendMessage", body).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) {
        let body = json!({ "callback_query_id": callback_id });
        if let Err(e) = self.call("answerCallbackQuery", body).await {
            debug!(error = %e, "answerCallbackQuery failed");
        }
    }

    /// Spawn the long-poll loop and return the decoded update stream.
    ///
    /// Button presses are acknowledged here so the client stops showing a
    /// spinner even if the engine later ignores the event.
    pub fn start_polling(&self) -> UpdateStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let messenger = self.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;
            info!("Telegram long-poll loop started");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query", "chat_member"],
                });

                let batch = match messenger.call("getUpdates", body).await {
                    Ok(Value::Array(updates)) => updates,
                    Ok(other) => {
                        warn!(?other, "Unexpected getUpdates payload");
                        Vec::new()
                    }
                    Err(e) => {
                        warn!(error = %e, "Telegram poll error, backing off");
                        let jitter = rand::thread_rng().gen_range(0..2000);
                        tokio::time::sleep(std::time::Duration::from_millis(3000 + jitter)).await;
                        continue;
                    }
                };

                for raw in batch {
                    if let Some(id) = raw.get("update_id").and_then(Value::as_i64) {
                        offset = id + 1;
                    }

                    if let Some(id) = raw
                        .get("callback_query")
                        .and_then(|cb| cb.get("id"))
                        .and_then(Value::as_str)
                    {
                        messenger.answer_callback(id).await;
                    }

                    let Some(update) = parse_update(&raw) else {
                        continue;
                    };
                    if tx.send(update).is_err() {
                        info!("Telegram update stream closed");
                        return;
                    }
                }
            }
        });

        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|u| (u, rx))
        }))
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_to_reply_markup(&keyboard);
        }

        let result = self.call("sendMessage", body).await.map_err(|e| {
            ChannelError::SendFailed {
                chat_id,
                reason: e.to_string(),
            }
        })?;

        let message_id = result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                ChannelError::InvalidResponse("sendMessage result without message_id".into())
            })?;

        Ok(MessageRef {
            chat_id,
            message_id,
        })
    }

    async fn clear_choices(&self, message: &MessageRef) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
        });
        self.call("editMessageReplyMarkup", body).await?;
        Ok(())
    }
}

#[async_trait]
impl InviteLinkCreator for TelegramMessenger {
    async fn create_invite_link(
        &self,
        chat_id: i64,
        name: &str,
        expire_at: DateTime<Utc>,
    ) -> Result<String, ChannelError> {
        let body = json!({
            "chat_id": chat_id,
            "name": name,
            "member_limit": 1,
            "expire_date": expire_at.timestamp(),
        });
        let result = self.call("createChatInviteLink", body).await?;
        result
            .get("invite_link")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                ChannelError::InvalidResponse("createChatInviteLink result without link".into())
            })
    }
}

// ── Wire helpers ────────────────────────────────────────────────────

/// Build the `reply_markup` JSON for a keyboard.
fn keyboard_to_reply_markup(keyboard: &Keyboard) -> Value {
    match keyboard {
        Keyboard::Inline(rows) => {
            let rows: Vec<Value> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|Choice { label, tag }| {
                            json!({ "text": label, "callback_data": tag })
                        })
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": rows })
        }
        Keyboard::ContactRequest(label) => json!({
            "keyboard": [[{ "text": label, "request_contact": true }]],
            "resize_keyboard": true,
            "one_time_keyboard": true,
        }),
        Keyboard::Remove => json!({ "remove_keyboard": true }),
    }
}

/// Decode one raw Bot API update into a routed [`Update`].
///
/// Returns `None` for update types the bot does not consume (edited
/// messages, channel posts, media in private chats, and so on).
fn parse_update(raw: &Value) -> Option<Update> {
    if let Some(message) = raw.get("message") {
        return parse_message(message);
    }

    if let Some(callback) = raw.get("callback_query") {
        let tag = callback.get("data").and_then(Value::as_str)?;
        let applicant_id = callback
            .get("from")
            .and_then(|f| f.get("id"))
            .and_then(Value::as_i64)?;
        let message = callback.get("message")?;
        if message.get("chat").and_then(|c| c.get("type")).and_then(Value::as_str)
            != Some("private")
        {
            return None;
        }
        let callback_ref = MessageRef {
            chat_id: message.get("chat")?.get("id").and_then(Value::as_i64)?,
            message_id: message.get("message_id").and_then(Value::as_i64)?,
        };
        return Some(Update::Applicant {
            applicant_id,
            event: Event::button(tag, Some(callback_ref)),
        });
    }

    if let Some(chat_member) = raw.get("chat_member") {
        let new = chat_member.get("new_chat_member")?;
        if new.get("status").and_then(Value::as_str) != Some("member") {
            return None;
        }
        let invite_link = chat_member
            .get("invite_link")
            .and_then(|l| l.get("invite_link"))
            .and_then(Value::as_str)?;
        let user = new.get("user")?;
        return Some(Update::MemberJoined {
            telegram_id: user.get("id").and_then(Value::as_i64)?,
            first_name: user
                .get("first_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            last_name: user
                .get("last_name")
                .and_then(Value::as_str)
                .map(String::from),
            username: user
                .get("username")
                .and_then(Value::as_str)
                .map(String::from),
            invite_link: invite_link.to_string(),
        });
    }

    None
}

fn parse_message(message: &Value) -> Option<Update> {
    let chat = message.get("chat")?;
    let chat_id = chat.get("id").and_then(Value::as_i64)?;
    let chat_type = chat.get("type").and_then(Value::as_str)?;
    let sender_id = message
        .get("from")
        .and_then(|f| f.get("id"))
        .and_then(Value::as_i64)?;

    if chat_type == "private" {
        if let Some(contact) = message.get("contact") {
            let phone = contact.get("phone_number").and_then(Value::as_str)?;
            return Some(Update::Applicant {
                applicant_id: sender_id,
                event: Event::contact(phone),
            });
        }

        let text = message.get("text").and_then(Value::as_str)?;
        if let Some(rest) = text.strip_prefix("/start") {
            return Some(Update::DeepLink {
                applicant_id: sender_id,
                payload: rest.trim().to_string(),
            });
        }
        return Some(Update::Applicant {
            applicant_id: sender_id,
            event: Event::text(text),
        });
    }

    // Group chats: only slash commands are interesting.
    let text = message.get("text").and_then(Value::as_str)?;
    if !text.starts_with('/') {
        return None;
    }
    Some(Update::GroupCommand {
        chat_id,
        thread_id: message.get("message_thread_id").and_then(Value::as_i64),
        sender_id,
        text: text.to_string(),
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_keyboard_markup_shape() {
        let kb = Keyboard::Inline(vec![
            vec![Choice::new("Yes", "confirm:yes")],
            vec![Choice::new("A", "x:a"), Choice::new("B", "x:b")],
        ]);
        let markup = keyboard_to_reply_markup(&kb);
        assert_eq!(markup["inline_keyboard"][0][0]["text"], "Yes");
        assert_eq!(markup["inline_keyboard"][0][0]["callback_data"], "confirm:yes");
        assert_eq!(markup["inline_keyboard"][1][1]["callback_data"], "x:b");
    }

    #[test]
    fn contact_request_markup_shape() {
        let markup = keyboard_to_reply_markup(&Keyboard::ContactRequest("Share".into()));
        assert_eq!(markup["keyboard"][0][0]["request_contact"], true);
        assert_eq!(markup["resize_keyboard"], true);
    }

    #[test]
    fn remove_markup_shape() {
        let markup = keyboard_to_reply_markup(&Keyboard::Remove);
        assert_eq!(markup["remove_keyboard"], true);
    }

    #[test]
    fn parses_private_text() {
        let raw = serde_json::json!({
            "update_id": 1,
            "message": {
                "chat": { "id": 42, "type": "private" },
                "from": { "id": 42 },
                "text": "hello"
            }
        });
        assert_eq!(
            parse_update(&raw),
            Some(Update::Applicant {
                applicant_id: 42,
                event: Event::text("hello"),
            })
        );
    }

    #[test]
    fn parses_deep_link_payload() {
        let raw = serde_json::json!({
            "message": {
                "chat": { "id": 42, "type": "private" },
                "from": { "id": 42 },
                "text": "/start apply"
            }
        });
        assert_eq!(
            parse_update(&raw),
            Some(Update::DeepLink {
                applicant_id: 42,
                payload: "apply".to_string(),
            })
        );
    }

    #[test]
    fn parses_contact_share() {
        let raw = serde_json::json!({
            "message": {
                "chat": { "id": 42, "type": "private" },
                "from": { "id": 42 },
                "contact": { "phone_number": "998901234567" }
            }
        });
        assert_eq!(
            parse_update(&raw),
            Some(Update::Applicant {
                applicant_id: 42,
                event: Event::contact("998901234567"),
            })
        );
    }

    #[test]
    fn parses_callback_query_with_message_ref() {
        let raw = serde_json::json!({
            "callback_query": {
                "id": "cb1",
                "from": { "id": 42 },
                "data": "children:3",
                "message": {
                    "message_id": 7,
                    "chat": { "id": 42, "type": "private" }
                }
            }
        });
        let update = parse_update(&raw).unwrap();
        assert_eq!(
            update,
            Update::Applicant {
                applicant_id: 42,
                event: Event::button(
                    "children:3",
                    Some(MessageRef {
                        chat_id: 42,
                        message_id: 7
                    })
                ),
            }
        );
    }

    #[test]
    fn parses_member_joined_via_invite_link() {
        let raw = serde_json::json!({
            "chat_member": {
                "new_chat_member": {
                    "status": "member",
                    "user": { "id": 9, "first_name": "Malika", "username": "mk" }
                },
                "invite_link": { "invite_link": "https://t.me/+abc" }
            }
        });
        assert_eq!(
            parse_update(&raw),
            Some(Update::MemberJoined {
                telegram_id: 9,
                first_name: "Malika".to_string(),
                last_name: None,
                username: Some("mk".to_string()),
                invite_link: "https://t.me/+abc".to_string(),
            })
        );
    }

    #[test]
    fn ignores_join_without_invite_link() {
        let raw = serde_json::json!({
            "chat_member": {
                "new_chat_member": {
                    "status": "member",
                    "user": { "id": 9, "first_name": "Malika" }
                }
            }
        });
        assert_eq!(parse_update(&raw), None);
    }

    #[test]
    fn parses_group_command_with_thread() {
        let raw = serde_json::json!({
            "message": {
                "chat": { "id": -100123, "type": "supergroup" },
                "from": { "id": 100 },
                "message_thread_id": 5,
                "text": "/invite Karimova Malika"
            }
        });
        assert_eq!(
            parse_update(&raw),
            Some(Update::GroupCommand {
                chat_id: -100123,
                thread_id: Some(5),
                sender_id: 100,
                text: "/invite Karimova Malika".to_string(),
            })
        );
    }

    #[test]
    fn ignores_group_chatter() {
        let raw = serde_json::json!({
            "message": {
                "chat": { "id": -100123, "type": "supergroup" },
                "from": { "id": 100 },
                "text": "hello everyone"
            }
        });
        assert_eq!(parse_update(&raw), None);
    }
}
