//! Per-applicant session — the working memory of a form in progress.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{BloodType, CountAnswer};

use super::step::Step;

/// Field values collected so far. All optional except the identifiers
/// seeded at session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    /// Member row of the applicant. Set at creation, immutable.
    pub member_id: Uuid,
    /// Manager attributed via the invite link. Set at creation, immutable.
    pub manager_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_phone: Option<String>,
    /// Callback numbers, in the order entered. Currently at most one.
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<CountAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cesarean: Option<CountAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<BloodType>,
}

impl FieldSet {
    fn new(member_id: Uuid, manager_id: Uuid) -> Self {
        Self {
            member_id,
            manager_id,
            telegram_phone: None,
            phones: Vec::new(),
            full_name: None,
            city: None,
            age: None,
            height: None,
            weight: None,
            children: None,
            cesarean: None,
            blood_type: None,
        }
    }
}

/// Session state persisted after every transition.
///
/// Stored as JSON in the `sessions` table, keyed by the applicant's
/// Telegram id, so an interrupted form survives process restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub current_step: Step,
    /// True only while one field is being corrected from the summary screen.
    #[serde(default)]
    pub editing: bool,
    pub fields: FieldSet,
}

impl Session {
    /// Fresh session at the first step, with identity seeded from the
    /// member record and her invite link.
    pub fn new(member_id: Uuid, manager_id: Uuid) -> Self {
        Self {
            current_step: Step::ConfirmInstructions,
            editing: false,
            fields: FieldSet::new(member_id, manager_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_instructions() {
        let session = Session::new(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(session.current_step, Step::ConfirmInstructions);
        assert!(!session.editing);
        assert!(session.fields.phones.is_empty());
        assert!(session.fields.age.is_none());
    }

    #[test]
    fn session_serde_roundtrip() {
        let mut session = Session::new(Uuid::new_v4(), Uuid::new_v4());
        session.current_step = Step::Cesarean;
        session.editing = true;
        session.fields.full_name = Some("Karimova Malika".to_string());
        session.fields.phones = vec!["+998901234567".to_string()];
        session.fields.age = Some(25);
        session.fields.children = Some(CountAnswer::MoreThan(5));

        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
    }

    #[test]
    fn missing_optional_fields_deserialize_to_defaults() {
        // A minimal persisted blob from an older session must still load.
        let json = format!(
            r#"{{"current_step":"age","fields":{{"member_id":"{}","manager_id":"{}"}}}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.current_step, Step::Age);
        assert!(!parsed.editing);
        assert!(parsed.fields.telegram_phone.is_none());
    }
}
