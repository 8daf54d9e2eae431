//! Message texts for the intake conversation.
//!
//! Kept in one place so the wording can be revised (or translated) without
//! touching the flow logic.

use crate::model::CountAnswer;

use super::session::FieldSet;

/// Placeholder shown in the summary for a field with no stored value.
const EMPTY_FIELD: &str = "—";

// ── Entry and preconditions ─────────────────────────────────────────

pub fn instructions(bot_username: &str) -> String {
    format!(
        "📋 How to fill in the application\n\n\
         1️⃣ Telegram number\n\
         Tap \"Share my number\" — it is only visible to us.\n\n\
         2️⃣ Callback number\n\
         Type a number starting with +.\n\
         Example: +998901234567\n\n\
         3️⃣ Full name, region, age, height, weight\n\
         Just type them. Height in cm, weight in kg.\n\n\
         4️⃣ Children, C-sections and blood type\n\
         Pick the answer with a button.\n\n\
         —\n\n\
         ✏️ At the end you will see all your answers and can change any field.\n\
         You have about 5 minutes to review and edit.\n\n\
         🔄 Stuck, or want to start over?\n\
         Tap https://t.me/{bot_username}?start=reset and the form restarts \
         from the beginning."
    )
}

pub fn not_member() -> &'static str {
    "❌ You are not a member of the group.\n\n\
     To fill in the application, first join the group through a manager's \
     invitation."
}

pub fn already_filled() -> &'static str {
    "✅ You have already filled in the application.\n\n\
     Our manager will contact you soon."
}

pub fn rejected_previously() -> &'static str {
    "❌ Unfortunately, you cannot take part in the program.\n\n\
     If you believe this is a mistake, contact your manager."
}

pub fn generic_failure() -> &'static str {
    "Something went wrong. Please try again later."
}

// ── Per-step prompts and corrections ────────────────────────────────

pub fn ask_telegram_phone() -> &'static str {
    "📱 Please share your Telegram number.\n\n\
     It is safe — the number is only visible to us."
}

pub fn ask_phone() -> &'static str {
    "📞 Enter a mobile number we can call you on.\n\n\
     Format: +998XXXXXXXXX\n\
     Example: +998901234567"
}

pub fn invalid_phone() -> &'static str {
    "❌ That doesn't look like a valid number.\n\n\
     Enter the number starting with +.\n\
     Example: +998901234567"
}

pub fn ask_full_name() -> &'static str {
    "👤 Enter your full name in Latin letters:\n\
     Surname Given-name Patronymic\n\n\
     Example: Karimova Malika Rustamovna"
}

pub fn invalid_full_name() -> &'static str {
    "❌ Please enter your full name in Latin letters, at least two words.\n\n\
     Example: Karimova Malika Rustamovna"
}

pub fn ask_region() -> &'static str {
    "🏙 Which region do you live in?"
}

pub fn ask_age() -> &'static str {
    "📅 How old are you?"
}

pub fn invalid_age_format() -> &'static str {
    "❌ Please enter a number only.\nExample: 25"
}

pub fn age_too_young() -> &'static str {
    "❌ Unfortunately, you can only take part in the program from age 18."
}

pub fn age_too_old() -> &'static str {
    "😔 Unfortunately, we cannot enroll you in the program.\n\n\
     The medical requirements limit participants to under 40 years of age.\n\
     Thank you for your interest!"
}

pub fn ask_height() -> &'static str {
    "📏 Your height in centimeters?\nExample: 165"
}

pub fn invalid_height() -> &'static str {
    "❌ Enter a number between 140 and 200.\nExample: 165"
}

pub fn ask_weight() -> &'static str {
    "⚖️ Your weight in kilograms?\nExample: 55"
}

pub fn invalid_weight() -> &'static str {
    "❌ Enter a number between 40 and 150.\nExample: 55"
}

pub fn ask_children() -> &'static str {
    "👶 How many children do you have?"
}

pub fn no_children_rejected() -> &'static str {
    "😔 Unfortunately, we cannot enroll you in the program.\n\n\
     Participants must have at least one child.\n\
     Thank you for your interest!"
}

pub fn ask_cesarean() -> &'static str {
    "🏥 How many C-sections have you had?"
}

pub fn cesarean_too_many() -> &'static str {
    "😔 Unfortunately, we cannot enroll you in the program.\n\n\
     For medical reasons, participants may have had at most one C-section.\n\
     This is about the risks to your own health.\n\n\
     Thank you for your interest!"
}

pub fn ask_blood_type() -> &'static str {
    "🩸 What is your blood type?"
}

pub fn application_saved() -> &'static str {
    "✅ Your application has been saved!\n\n\
     Our manager will contact you soon.\n\
     Thank you for your interest in the program! 💜"
}

// ── Confirmation summary ────────────────────────────────────────────

/// Render the review checklist. Every row is always present; fields not
/// collected yet show a placeholder.
pub fn summary(fields: &FieldSet, manager_name: Option<&str>) -> String {
    let phones = if fields.phones.is_empty() {
        EMPTY_FIELD.to_string()
    } else {
        fields.phones.join(", ")
    };

    let children = match fields.children {
        Some(CountAnswer::Exact(n)) => n.to_string(),
        Some(CountAnswer::MoreThan(n)) => format!("more than {n}"),
        None => EMPTY_FIELD.to_string(),
    };

    let cesarean = match fields.cesarean {
        Some(CountAnswer::Exact(0)) => "none".to_string(),
        Some(CountAnswer::Exact(n)) => n.to_string(),
        Some(CountAnswer::MoreThan(n)) => format!("more than {n}"),
        None => EMPTY_FIELD.to_string(),
    };

    let blood = match fields.blood_type {
        Some(bt) => bt.label().to_string(),
        None => EMPTY_FIELD.to_string(),
    };

    let text = |v: &Option<String>| v.clone().unwrap_or_else(|| EMPTY_FIELD.to_string());
    let num = |v: Option<u16>, unit: &str| match v {
        Some(n) => format!("{n}{unit}"),
        None => EMPTY_FIELD.to_string(),
    };

    format!(
        "📋 Please check your details:\n\n\
         👤 Full name: {}\n\
         📱 Telegram: {}\n\
         📞 Phone: {}\n\
         🏙 Region: {}\n\
         📅 Age: {}\n\
         📏 Height: {}\n\
         ⚖️ Weight: {}\n\
         👶 Children: {}\n\
         🏥 C-sections: {}\n\
         🩸 Blood type: {}\n\
         💼 Recruiter: {}\n\n\
         All correct? Tap \"Confirm\", or pick a field to change.",
        text(&fields.full_name),
        text(&fields.telegram_phone),
        phones,
        text(&fields.city),
        num(fields.age, ""),
        num(fields.height, " cm"),
        num(fields.weight, " kg"),
        children,
        cesarean,
        blood,
        manager_name.unwrap_or(EMPTY_FIELD),
    )
}
