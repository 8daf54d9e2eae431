//! IntakeEngine — drives the application form conversation.
//!
//! Every inbound event is dispatched on `(current step, event kind)`.
//! Events that don't match the expected kind for the step are ignored, so
//! a stale button press or stray text can never corrupt a session.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::model::{
    ApplicationStatus, BloodType, CountAnswer, NewApplication, region_by_index,
};
use crate::store::Storage;
use crate::transport::{Event, EventKind, Keyboard, MessageRef, Messenger};

use super::keyboard;
use super::prompts;
use super::session::Session;
use super::step::{EditField, Step};
use super::validators::{
    AgeValidation, CesareanValidation, normalize_contact_phone, parse_children, validate_age,
    validate_cesarean, validate_full_name, validate_height, validate_phone, validate_weight,
};

/// How a deep-link entry was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Start a new form, or resume one already in progress.
    Apply,
    /// Discard any progress and start over.
    Reset,
}

impl EntryMode {
    /// Parse a deep-link payload. Unknown payloads are ignored upstream.
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload {
            "apply" => Some(Self::Apply),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Why an application was disqualified. Logged, not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooOld(u16),
    NoChildren,
    TooManyCesareans(CountAnswer),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooOld(age) => write!(f, "age={age}"),
            Self::NoChildren => write!(f, "no_children"),
            Self::TooManyCesareans(count) => write!(f, "cesarean={}", count.encode()),
        }
    }
}

/// The application intake state machine.
pub struct IntakeEngine {
    store: Arc<dyn Storage>,
    messenger: Arc<dyn Messenger>,
    bot_username: String,
}

impl IntakeEngine {
    pub fn new(
        store: Arc<dyn Storage>,
        messenger: Arc<dyn Messenger>,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            store,
            messenger,
            bot_username: bot_username.into(),
        }
    }

    /// Deep-link entry point.
    ///
    /// `Apply` resumes an in-progress session at its current step; otherwise
    /// it checks the preconditions (group member, no application on file)
    /// and opens a fresh session. `Reset` always discards any session first.
    pub async fn start_or_resume(&self, applicant_id: i64, mode: EntryMode) -> Result<()> {
        if mode == EntryMode::Apply {
            if let Some(session) = self.store.get_session(applicant_id).await? {
                debug!(applicant_id, step = %session.current_step, "Resuming session");
                return self.send_step_prompt(applicant_id, &session).await;
            }
        }

        self.store.clear_session(applicant_id).await?;

        let Some(member) = self.store.member_by_telegram_id(applicant_id).await? else {
            self.messenger
                .send(applicant_id, prompts::not_member(), None)
                .await?;
            return Ok(());
        };

        if let Some(existing) = self.store.application_by_member(member.id).await? {
            let reply = match existing.status {
                ApplicationStatus::Rejected => prompts::rejected_previously(),
                ApplicationStatus::Completed => prompts::already_filled(),
            };
            self.messenger.send(applicant_id, reply, None).await?;
            return Ok(());
        }

        let Some(invite) = self.store.invite_link_by_id(member.invite_link_id).await? else {
            error!(applicant_id, member_id = %member.id, "Invite link not found for member");
            self.messenger
                .send(applicant_id, prompts::generic_failure(), None)
                .await?;
            return Ok(());
        };

        let session = Session::new(member.id, invite.manager_id);
        self.store.put_session(applicant_id, &session).await?;
        info!(applicant_id, member_id = %member.id, "Session started");
        self.send_step_prompt(applicant_id, &session).await
    }

    /// Route one applicant event through the `(step, event kind)` table.
    ///
    /// Events from applicants with no active session are ignored; the
    /// deep-link entry is the only way in.
    pub async fn handle_event(&self, applicant_id: i64, event: Event) -> Result<()> {
        let Some(mut session) = self.store.get_session(applicant_id).await? else {
            debug!(applicant_id, "Event with no active session, ignoring");
            return Ok(());
        };

        match (session.current_step, &event.kind) {
            (Step::ConfirmInstructions, EventKind::Button(tag))
                if tag == "instructions:confirm" =>
            {
                self.dismiss_keyboard(event.callback.as_ref()).await;
                self.store_and_advance(applicant_id, session).await
            }

            (Step::TelegramPhone, EventKind::Contact(phone)) => {
                let phone = normalize_contact_phone(phone);
                debug!(applicant_id, "Telegram contact received");
                session.fields.telegram_phone = Some(phone);
                self.store_and_advance(applicant_id, session).await
            }

            (Step::TypedPhone, EventKind::Text(text)) => match validate_phone(text) {
                Some(phone) => {
                    session.fields.phones = vec![phone];
                    self.store_and_advance(applicant_id, session).await
                }
                None => self.reprompt(applicant_id, prompts::invalid_phone()).await,
            },

            (Step::FullName, EventKind::Text(text)) => match validate_full_name(text) {
                Some(name) => {
                    session.fields.full_name = Some(name);
                    self.store_and_advance(applicant_id, session).await
                }
                None => {
                    self.reprompt(applicant_id, prompts::invalid_full_name())
                        .await
                }
            },

            (Step::City, EventKind::Button(tag)) if tag.starts_with("region:") => {
                let region = tag["region:".len()..]
                    .parse::<usize>()
                    .ok()
                    .and_then(region_by_index);
                let Some(region) = region else {
                    warn!(applicant_id, tag, "Region index out of range, ignoring");
                    return Ok(());
                };
                self.dismiss_keyboard(event.callback.as_ref()).await;
                session.fields.city = Some(region.to_string());
                self.store_and_advance(applicant_id, session).await
            }

            (Step::Age, EventKind::Text(text)) => match validate_age(text) {
                AgeValidation::Valid(age) => {
                    session.fields.age = Some(age);
                    self.store_and_advance(applicant_id, session).await
                }
                AgeValidation::BadFormat => {
                    self.reprompt(applicant_id, prompts::invalid_age_format())
                        .await
                }
                AgeValidation::TooYoung(_) => {
                    self.reprompt(applicant_id, prompts::age_too_young()).await
                }
                AgeValidation::TooOld(age) => {
                    session.fields.age = Some(age);
                    self.reject(
                        applicant_id,
                        session,
                        RejectReason::TooOld(age),
                        prompts::age_too_old(),
                    )
                    .await
                }
            },

            (Step::Height, EventKind::Text(text)) => match validate_height(text) {
                Some(height) => {
                    session.fields.height = Some(height);
                    self.store_and_advance(applicant_id, session).await
                }
                None => self.reprompt(applicant_id, prompts::invalid_height()).await,
            },

            (Step::Weight, EventKind::Text(text)) => match validate_weight(text) {
                Some(weight) => {
                    session.fields.weight = Some(weight);
                    self.store_and_advance(applicant_id, session).await
                }
                None => self.reprompt(applicant_id, prompts::invalid_weight()).await,
            },

            (Step::Children, EventKind::Button(tag)) if tag.starts_with("children:") => {
                let Some(answer) = parse_children(&tag["children:".len()..]) else {
                    warn!(applicant_id, tag, "Unrecognized children value, ignoring");
                    return Ok(());
                };
                self.dismiss_keyboard(event.callback.as_ref()).await;
                session.fields.children = Some(answer);
                if answer == CountAnswer::Exact(0) {
                    return self
                        .reject(
                            applicant_id,
                            session,
                            RejectReason::NoChildren,
                            prompts::no_children_rejected(),
                        )
                        .await;
                }
                self.store_and_advance(applicant_id, session).await
            }

            (Step::Cesarean, EventKind::Button(tag)) if tag.starts_with("cesarean:") => {
                let Some(validation) = validate_cesarean(&tag["cesarean:".len()..]) else {
                    warn!(applicant_id, tag, "Unrecognized cesarean value, ignoring");
                    return Ok(());
                };
                self.dismiss_keyboard(event.callback.as_ref()).await;
                match validation {
                    CesareanValidation::Valid(answer) => {
                        session.fields.cesarean = Some(answer);
                        self.store_and_advance(applicant_id, session).await
                    }
                    CesareanValidation::TooMany(answer) => {
                        session.fields.cesarean = Some(answer);
                        self.reject(
                            applicant_id,
                            session,
                            RejectReason::TooManyCesareans(answer),
                            prompts::cesarean_too_many(),
                        )
                        .await
                    }
                }
            }

            (Step::BloodType, EventKind::Button(tag)) if tag.starts_with("blood:") => {
                let Some(blood) = BloodType::from_key(&tag["blood:".len()..]) else {
                    warn!(applicant_id, tag, "Unrecognized blood type, ignoring");
                    return Ok(());
                };
                self.dismiss_keyboard(event.callback.as_ref()).await;
                session.fields.blood_type = Some(blood);
                self.store_and_advance(applicant_id, session).await
            }

            (Step::FinalConfirmation, EventKind::Button(tag)) if tag == "confirm:yes" => {
                self.dismiss_keyboard(event.callback.as_ref()).await;
                self.confirm(applicant_id, session).await
            }

            (Step::FinalConfirmation, EventKind::Button(tag)) if tag.starts_with("edit:") => {
                let Some(field) = EditField::from_tag_value(&tag["edit:".len()..]) else {
                    warn!(applicant_id, tag, "Unrecognized edit field, ignoring");
                    return Ok(());
                };
                self.dismiss_keyboard(event.callback.as_ref()).await;
                self.begin_edit(applicant_id, session, field).await
            }

            (step, kind) => {
                debug!(
                    applicant_id,
                    step = %step,
                    kind = ?kind,
                    "Input does not match the current step, ignoring"
                );
                Ok(())
            }
        }
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Persist the session and move on: to the linear successor, or straight
    /// back to the summary when a single field was being corrected.
    async fn store_and_advance(&self, applicant_id: i64, mut session: Session) -> Result<()> {
        if session.editing {
            session.editing = false;
            session.current_step = Step::FinalConfirmation;
        } else {
            let Some(next) = session.current_step.next() else {
                warn!(applicant_id, step = %session.current_step, "No linear successor");
                return Ok(());
            };
            session.current_step = next;
        }

        self.store.put_session(applicant_id, &session).await?;
        debug!(applicant_id, step = %session.current_step, "Advanced");
        self.send_step_prompt(applicant_id, &session).await
    }

    /// Enter the edit sub-flow for one field from the summary screen.
    async fn begin_edit(
        &self,
        applicant_id: i64,
        mut session: Session,
        field: EditField,
    ) -> Result<()> {
        session.editing = true;
        if field == EditField::Phones {
            // Rebuild the list rather than appending to it.
            session.fields.phones.clear();
        }
        session.current_step = field.step();
        self.store.put_session(applicant_id, &session).await?;
        debug!(applicant_id, step = %session.current_step, "Editing field");
        self.send_step_prompt(applicant_id, &session).await
    }

    /// Final confirmation: write the completed record and end the session.
    async fn confirm(&self, applicant_id: i64, session: Session) -> Result<()> {
        let f = session.fields;
        self.store
            .insert_application(NewApplication {
                member_id: Some(f.member_id),
                manager_id: f.manager_id,
                full_name: f.full_name,
                telegram_phone: f.telegram_phone,
                phones: f.phones,
                city: f.city,
                age: f.age,
                height: f.height,
                weight: f.weight,
                children: f.children,
                cesarean: f.cesarean,
                blood_type: f.blood_type,
                status: ApplicationStatus::Completed,
            })
            .await?;
        self.store.clear_session(applicant_id).await?;
        info!(applicant_id, "Application saved");
        self.notify(applicant_id, prompts::application_saved()).await;
        Ok(())
    }

    /// Disqualification: record whatever was collected and end the session.
    /// Terminates even mid-edit.
    async fn reject(
        &self,
        applicant_id: i64,
        session: Session,
        reason: RejectReason,
        message: &str,
    ) -> Result<()> {
        let f = session.fields;
        self.store
            .insert_application(NewApplication {
                member_id: Some(f.member_id),
                manager_id: f.manager_id,
                full_name: f.full_name,
                telegram_phone: f.telegram_phone,
                phones: f.phones,
                city: f.city,
                age: f.age,
                height: f.height,
                weight: f.weight,
                children: f.children,
                cesarean: f.cesarean,
                blood_type: f.blood_type,
                status: ApplicationStatus::Rejected,
            })
            .await?;
        self.store.clear_session(applicant_id).await?;
        info!(applicant_id, %reason, "Application rejected");
        self.notify(applicant_id, message).await;
        Ok(())
    }

    // ── Prompts ─────────────────────────────────────────────────────

    /// Emit the prompt (and keyboard) for the session's current step.
    ///
    /// Doubles as the resume dispatcher: re-entry with an active session
    /// calls this directly, so the resumed prompt is byte-identical to the
    /// one sent when the step was first reached. Reads nothing but the
    /// session, so calling it twice sends the same prompt twice.
    async fn send_step_prompt(&self, applicant_id: i64, session: &Session) -> Result<()> {
        let (text, keyboard) = match session.current_step {
            Step::ConfirmInstructions => (
                prompts::instructions(&self.bot_username),
                Some(keyboard::instructions()),
            ),
            Step::TelegramPhone => (
                prompts::ask_telegram_phone().to_string(),
                Some(keyboard::share_phone()),
            ),
            // Also drops the contact-share reply keyboard.
            Step::TypedPhone => (prompts::ask_phone().to_string(), Some(Keyboard::Remove)),
            Step::FullName => (prompts::ask_full_name().to_string(), None),
            Step::City => (prompts::ask_region().to_string(), Some(keyboard::regions())),
            Step::Age => (prompts::ask_age().to_string(), None),
            Step::Height => (prompts::ask_height().to_string(), None),
            Step::Weight => (prompts::ask_weight().to_string(), None),
            Step::Children => (
                prompts::ask_children().to_string(),
                Some(keyboard::children()),
            ),
            Step::Cesarean => (
                prompts::ask_cesarean().to_string(),
                Some(keyboard::cesarean()),
            ),
            Step::BloodType => (
                prompts::ask_blood_type().to_string(),
                Some(keyboard::blood_type()),
            ),
            Step::FinalConfirmation => {
                let manager = self.store.manager_by_id(session.fields.manager_id).await?;
                (
                    prompts::summary(&session.fields, manager.as_ref().map(|m| m.name.as_str())),
                    Some(keyboard::confirmation()),
                )
            }
        };

        self.messenger.send(applicant_id, &text, keyboard).await?;
        Ok(())
    }

    /// Correction message for invalid input. No state change.
    async fn reprompt(&self, applicant_id: i64, message: &str) -> Result<()> {
        self.messenger.send(applicant_id, message, None).await?;
        Ok(())
    }

    /// Best-effort terminal notification — state is already final, so a
    /// delivery failure is logged rather than propagated.
    async fn notify(&self, applicant_id: i64, message: &str) {
        if let Err(e) = self.messenger.send(applicant_id, message, None).await {
            warn!(applicant_id, error = %e, "Failed to deliver notification");
        }
    }

    /// Best-effort removal of a pressed inline keyboard.
    async fn dismiss_keyboard(&self, message: Option<&MessageRef>) {
        if let Some(message) = message {
            if let Err(e) = self.messenger.clear_choices(message).await {
                debug!(error = %e, "Failed to clear keyboard");
            }
        }
    }
}
