//! Intake form steps — which question the applicant is on.

use serde::{Deserialize, Serialize};

/// The steps of the application form, in the order they are asked.
///
/// Progresses linearly from `ConfirmInstructions` to `FinalConfirmation`.
/// The two terminal outcomes (confirmed, disqualified) are not steps — both
/// clear the session instead of transitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Applicant must acknowledge the instructions before the form starts.
    ConfirmInstructions,
    /// Waiting for the applicant to share her Telegram contact.
    TelegramPhone,
    /// Waiting for a typed callback phone number.
    TypedPhone,
    FullName,
    City,
    Age,
    Height,
    Weight,
    Children,
    Cesarean,
    BloodType,
    /// Summary shown; waiting for "confirm" or an "edit <field>" choice.
    FinalConfirmation,
}

impl Step {
    pub const ALL: [Step; 12] = [
        Self::ConfirmInstructions,
        Self::TelegramPhone,
        Self::TypedPhone,
        Self::FullName,
        Self::City,
        Self::Age,
        Self::Height,
        Self::Weight,
        Self::Children,
        Self::Cesarean,
        Self::BloodType,
        Self::FinalConfirmation,
    ];

    /// The fixed linear successor, if any.
    pub fn next(&self) -> Option<Step> {
        use Step::*;
        match self {
            ConfirmInstructions => Some(TelegramPhone),
            TelegramPhone => Some(TypedPhone),
            TypedPhone => Some(FullName),
            FullName => Some(City),
            City => Some(Age),
            Age => Some(Height),
            Height => Some(Weight),
            Weight => Some(Children),
            Children => Some(Cesarean),
            Cesarean => Some(BloodType),
            BloodType => Some(FinalConfirmation),
            FinalConfirmation => None,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConfirmInstructions => "confirm_instructions",
            Self::TelegramPhone => "telegram_phone",
            Self::TypedPhone => "typed_phone",
            Self::FullName => "full_name",
            Self::City => "city",
            Self::Age => "age",
            Self::Height => "height",
            Self::Weight => "weight",
            Self::Children => "children",
            Self::Cesarean => "cesarean",
            Self::BloodType => "blood_type",
            Self::FinalConfirmation => "final_confirmation",
        };
        write!(f, "{s}")
    }
}

/// A field the applicant can revise from the confirmation screen.
///
/// Telegram phone is deliberately absent — it comes from the contact share
/// and is not editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    FullName,
    Phones,
    City,
    Age,
    Height,
    Weight,
    Children,
    Cesarean,
    BloodType,
}

impl EditField {
    /// Callback value used in `edit:<value>` button tags.
    pub fn tag_value(&self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::Phones => "phones",
            Self::City => "city",
            Self::Age => "age",
            Self::Height => "height",
            Self::Weight => "weight",
            Self::Children => "children",
            Self::Cesarean => "cesarean",
            Self::BloodType => "blood_type",
        }
    }

    pub fn from_tag_value(s: &str) -> Option<Self> {
        let all = [
            Self::FullName,
            Self::Phones,
            Self::City,
            Self::Age,
            Self::Height,
            Self::Weight,
            Self::Children,
            Self::Cesarean,
            Self::BloodType,
        ];
        all.into_iter().find(|f| f.tag_value() == s)
    }

    /// The step that re-asks this field.
    pub fn step(&self) -> Step {
        match self {
            Self::FullName => Step::FullName,
            Self::Phones => Step::TypedPhone,
            Self::City => Step::City,
            Self::Age => Step::Age,
            Self::Height => Step::Height,
            Self::Weight => Step::Weight,
            Self::Children => Step::Children,
            Self::Cesarean => Step::Cesarean,
            Self::BloodType => Step::BloodType,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_all_steps_in_order() {
        let mut current = Step::ConfirmInstructions;
        for expected in &Step::ALL[1..] {
            let next = current.next().unwrap();
            assert_eq!(next, *expected);
            current = next;
        }
        assert!(current.next().is_none());
    }

    #[test]
    fn display_matches_serde() {
        for step in Step::ALL {
            let display = format!("{step}");
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(format!("\"{display}\""), json);
        }
    }

    #[test]
    fn serde_roundtrip() {
        for step in Step::ALL {
            let json = serde_json::to_string(&step).unwrap();
            let parsed: Step = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, step);
        }
    }

    #[test]
    fn edit_field_tags_roundtrip() {
        let fields = [
            EditField::FullName,
            EditField::Phones,
            EditField::City,
            EditField::Age,
            EditField::Height,
            EditField::Weight,
            EditField::Children,
            EditField::Cesarean,
            EditField::BloodType,
        ];
        for field in fields {
            assert_eq!(EditField::from_tag_value(field.tag_value()), Some(field));
        }
        assert_eq!(EditField::from_tag_value("telegram_phone"), None);
    }

    #[test]
    fn edit_returns_to_a_real_step() {
        // Every editable field maps to a step that eventually reaches
        // the confirmation screen again.
        assert_eq!(EditField::Phones.step(), Step::TypedPhone);
        assert_eq!(EditField::BloodType.step(), Step::BloodType);
    }
}
