//! Action lines and local log lines.
//!
//! An action is a third-person line the host renders in the room ("Ann
//! waves"). Templates carry pronoun placeholders that are replaced with
//! the acting player's pronouns before sending:
//!
//! | token              | She/Her   | otherwise  |
//! |--------------------|-----------|------------|
//! | `<Possessive>`     | `Her`     | `His`      |
//! | `<Intensive>`      | `Her`     | `Him`      |
//! | `<SelfIntensive>`  | `Herself` | `Himself`  |
//! | `<Pronoun>`        | `She`     | `He`       |
//!
//! Lower-case tokens (`<possessive>` ...) give lower-case forms. The
//! replacement is purely literal: `"<selfIntensive>ly"` becomes
//! `"herselfly"`.

use modlink_session::Pronouns;
use modlink_transport::{ChatKind, LocalLine, OutgoingChat, PeerId};
use serde_json::{Value, json};

use crate::ModData;

/// `Content` of every custom action message.
pub const ACTION_CONTENT: &str = "ZC_CUSTOM_ACTION";
/// Dictionary tag the host substitutes with the action text.
pub const ACTION_TAG: &str = "MISSING TEXT IN \"Interface.csv\": ZC_CUSTOM_ACTION";

/// Replaces the pronoun tokens in `template`.
pub fn substitute_pronouns(template: &str, pronouns: Pronouns) -> String {
    let forms = [
        ("Possessive", "possessive", pronouns.possessive()),
        ("Intensive", "intensive", pronouns.intensive()),
        ("SelfIntensive", "selfIntensive", pronouns.self_intensive()),
        ("Pronoun", "pronoun", pronouns.subject()),
    ];

    let mut text = template.to_string();
    for (upper, lower, form) in forms {
        text = text
            .replace(&format!("<{upper}>"), form)
            .replace(&format!("<{lower}>"), &form.to_lowercase());
    }
    text
}

/// Builds the action message for already-substituted `text`.
///
/// `extra` entries are appended to the dictionary after the action tag.
pub fn action_message(text: &str, target: Option<PeerId>, extra: Vec<Value>) -> OutgoingChat {
    let mut dictionary = Vec::with_capacity(extra.len() + 1);
    dictionary.push(json!({ "Tag": ACTION_TAG, "Text": text }));
    dictionary.extend(extra);

    OutgoingChat {
        content: ACTION_CONTENT.to_string(),
        kind: ChatKind::Action,
        dictionary: Some(Value::Array(dictionary)),
        target,
    }
}

/// Builds a local log line styled from the mod's data.
pub fn local_line(html: &str, sender: PeerId, mod_data: &ModData) -> LocalLine {
    LocalLine {
        html: html.to_string(),
        sender,
        background: mod_data.message_background().to_string(),
        color: mod_data.message_color().to_string(),
        font_family: mod_data.font_family.clone(),
    }
}
