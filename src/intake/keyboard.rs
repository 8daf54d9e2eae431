//! Choice keyboards for the discrete-choice steps.
//!
//! Callback tags are `<topic>:<value>`; the engine matches on the topic
//! prefix and parses the value.

use crate::model::{BloodType, REGIONS};
use crate::transport::{Choice, Keyboard};

use super::step::EditField;

pub fn instructions() -> Keyboard {
    Keyboard::Inline(vec![vec![Choice::new("Got it ✓", "instructions:confirm")]])
}

pub fn share_phone() -> Keyboard {
    Keyboard::ContactRequest("📱 Share my number".to_string())
}

/// Regions in two columns, tagged by positional index.
pub fn regions() -> Keyboard {
    let rows = REGIONS
        .chunks(2)
        .enumerate()
        .map(|(row, pair)| {
            pair.iter()
                .enumerate()
                .map(|(col, name)| Choice::new(*name, format!("region:{}", row * 2 + col)))
                .collect()
        })
        .collect();
    Keyboard::Inline(rows)
}

pub fn children() -> Keyboard {
    Keyboard::Inline(vec![
        vec![Choice::new("No children", "children:0")],
        vec![
            Choice::new("1", "children:1"),
            Choice::new("2", "children:2"),
            Choice::new("3", "children:3"),
        ],
        vec![
            Choice::new("4", "children:4"),
            Choice::new("5", "children:5"),
            Choice::new("More", "children:more"),
        ],
    ])
}

pub fn cesarean() -> Keyboard {
    Keyboard::Inline(vec![
        vec![Choice::new("None", "cesarean:0")],
        vec![
            Choice::new("1", "cesarean:1"),
            Choice::new("2", "cesarean:2"),
            Choice::new("More", "cesarean:more"),
        ],
    ])
}

/// Blood types in pairs, "don't know" on its own row.
pub fn blood_type() -> Keyboard {
    let mut rows: Vec<Vec<Choice>> = BloodType::ALL[..8]
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|bt| Choice::new(bt.label(), format!("blood:{}", bt.key())))
                .collect()
        })
        .collect();
    rows.push(vec![Choice::new(
        BloodType::Unknown.label(),
        format!("blood:{}", BloodType::Unknown.key()),
    )]);
    Keyboard::Inline(rows)
}

/// Confirm on top, then the editable fields two per row.
pub fn confirmation() -> Keyboard {
    let edit = |label: &str, field: EditField| {
        Choice::new(label, format!("edit:{}", field.tag_value()))
    };
    Keyboard::Inline(vec![
        vec![Choice::new("✅ Confirm", "confirm:yes")],
        vec![
            edit("👤 Full name", EditField::FullName),
            edit("📞 Phone", EditField::Phones),
        ],
        vec![edit("🏙 Region", EditField::City), edit("📅 Age", EditField::Age)],
        vec![
            edit("📏 Height", EditField::Height),
            edit("⚖️ Weight", EditField::Weight),
        ],
        vec![
            edit("👶 Children", EditField::Children),
            edit("🏥 C-sections", EditField::Cesarean),
        ],
        vec![edit("🩸 Blood type", EditField::BloodType)],
    ])
}
