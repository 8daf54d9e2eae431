//! Domain models — applicants, managers, invite links, and the
//! application record the intake flow produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal status of an application record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// The applicant reviewed the summary and confirmed.
    Completed,
    /// A disqualifying answer ended the flow early.
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An answer to a "how many" question asked with a closed button set.
///
/// The button sets cap out with a "more" option, so the answer is either an
/// exact count or "more than n" — never a bare string sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountAnswer {
    Exact(u8),
    MoreThan(u8),
}

impl CountAnswer {
    /// Stable storage encoding: `"3"` for exact, `">5"` for more-than.
    pub fn encode(&self) -> String {
        match self {
            Self::Exact(n) => n.to_string(),
            Self::MoreThan(n) => format!(">{n}"),
        }
    }

    pub fn decode(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_prefix('>') {
            rest.parse().ok().map(Self::MoreThan)
        } else {
            s.parse().ok().map(Self::Exact)
        }
    }
}

/// Blood type — eight clinical types plus "don't know".
///
/// Storage keys use the numeral/Rh form shown on the buttons (`i+` … `iv-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloodType {
    IPos,
    INeg,
    IiPos,
    IiNeg,
    IiiPos,
    IiiNeg,
    IvPos,
    IvNeg,
    Unknown,
}

impl BloodType {
    pub const ALL: [BloodType; 9] = [
        Self::IPos,
        Self::INeg,
        Self::IiPos,
        Self::IiNeg,
        Self::IiiPos,
        Self::IiiNeg,
        Self::IvPos,
        Self::IvNeg,
        Self::Unknown,
    ];

    /// Storage key, also used as the button callback value.
    pub fn key(&self) -> &'static str {
        match self {
            Self::IPos => "i+",
            Self::INeg => "i-",
            Self::IiPos => "ii+",
            Self::IiNeg => "ii-",
            Self::IiiPos => "iii+",
            Self::IiiNeg => "iii-",
            Self::IvPos => "iv+",
            Self::IvNeg => "iv-",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.key() == s)
    }

    /// Human-readable label shown on buttons and in the summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IPos => "I (O)+",
            Self::INeg => "I (O)−",
            Self::IiPos => "II (A)+",
            Self::IiNeg => "II (A)−",
            Self::IiiPos => "III (B)+",
            Self::IiiNeg => "III (B)−",
            Self::IvPos => "IV (AB)+",
            Self::IvNeg => "IV (AB)−",
            Self::Unknown => "don't know",
        }
    }
}

/// The fixed, ordered list of regions an applicant chooses from.
/// Keyboard callbacks carry the positional index into this list.
pub const REGIONS: [&str; 14] = [
    "Tashkent region",
    "Samarkand region",
    "Bukhara region",
    "Fergana region",
    "Andijan region",
    "Namangan region",
    "Kashkadarya region",
    "Surkhandarya region",
    "Khorezm region",
    "Navoi region",
    "Jizzakh region",
    "Syrdarya region",
    "Karakalpakstan",
    "Tashkent city",
];

/// Look up a region by keyboard index. Out-of-range indices are rejected.
pub fn region_by_index(index: usize) -> Option<&'static str> {
    REGIONS.get(index).copied()
}

/// A recruiter allowed to issue invite links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manager {
    pub id: Uuid,
    pub telegram_id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A single-use invite link issued by a manager for a named invitee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteLink {
    pub id: Uuid,
    pub link: String,
    pub manager_id: Uuid,
    pub member_name: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

/// A group member who joined through a tracked invite link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub invite_link_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

/// A finished application — completed or rejected. Immutable once written.
///
/// All form fields are optional: a rejection can happen at any step, and the
/// record keeps whatever was collected up to that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub member_id: Option<Uuid>,
    pub manager_id: Uuid,
    pub full_name: Option<String>,
    pub telegram_phone: Option<String>,
    pub phones: Vec<String>,
    pub city: Option<String>,
    pub age: Option<u16>,
    pub height: Option<u16>,
    pub weight: Option<u16>,
    pub children: Option<CountAnswer>,
    pub cesarean: Option<CountAnswer>,
    pub blood_type: Option<BloodType>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new application row. The repository assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub member_id: Option<Uuid>,
    pub manager_id: Uuid,
    pub full_name: Option<String>,
    pub telegram_phone: Option<String>,
    pub phones: Vec<String>,
    pub city: Option<String>,
    pub age: Option<u16>,
    pub height: Option<u16>,
    pub weight: Option<u16>,
    pub children: Option<CountAnswer>,
    pub cesarean: Option<CountAnswer>,
    pub blood_type: Option<BloodType>,
    pub status: ApplicationStatus,
}
