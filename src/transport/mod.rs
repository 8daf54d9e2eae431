//! Messaging transport abstraction — what the intake flow needs from the
//! messaging platform, and nothing more.

pub mod telegram;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ChannelError;

pub use telegram::{TelegramMessenger, Update, UpdateStream};

/// Reference to a sent message, used to edit it later (keyboard removal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// One tappable choice: a visible label and the callback tag it sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub tag: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tag: tag.into(),
        }
    }
}

/// Keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Inline buttons under the message, as rows of choices.
    Inline(Vec<Vec<Choice>>),
    /// A single reply button that shares the user's contact.
    ContactRequest(String),
    /// Remove any previously shown reply keyboard.
    Remove,
}

/// What arrived from the applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Free-typed text.
    Text(String),
    /// A shared contact; the value is the raw phone number.
    Contact(String),
    /// An inline button press; the value is the button's callback tag.
    Button(String),
}

/// An inbound applicant event, routed by current step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// For button presses: the message carrying the pressed keyboard,
    /// so its now-stale choices can be cleared.
    pub callback: Option<MessageRef>,
}

impl Event {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Text(s.into()),
            callback: None,
        }
    }

    pub fn contact(phone: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Contact(phone.into()),
            callback: None,
        }
    }

    pub fn button(tag: impl Into<String>, callback: Option<MessageRef>) -> Self {
        Self {
            kind: EventKind::Button(tag.into()),
            callback,
        }
    }
}

/// Outbound messaging primitive.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message, optionally with a keyboard.
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, ChannelError>;

    /// Remove the inline keyboard from a previously sent message.
    async fn clear_choices(&self, message: &MessageRef) -> Result<(), ChannelError>;
}

/// Creates single-use group invite links. Split from [`Messenger`] so the
/// invite service can be exercised without the live Bot API.
#[async_trait]
pub trait InviteLinkCreator: Send + Sync {
    /// Create a one-member invite link into `chat_id`, labeled `name`,
    /// expiring at `expire_at`. Returns the link URL.
    async fn create_invite_link(
        &self,
        chat_id: i64,
        name: &str,
        expire_at: DateTime<Utc>,
    ) -> Result<String, ChannelError>;
}
