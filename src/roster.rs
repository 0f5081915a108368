use std::collections::HashMap;

use crate::types::ChatMessage;
use crate::utils::strip_non_ascii;

/// Sender ids the platform uses for automated posts. Never part of the
/// member universe; their messages are skipped during aggregation.
pub const RESERVED_SENDER_IDS: [&str; 2] = ["system", "calendar"];

/// Sender id of the platform's automated assistant, filtered when
/// `exclude_assistant` is set.
pub const ASSISTANT_SENDER_ID: &str = "copilot";

/// Maps raw sender ids to canonical display names and fixes the member
/// universe for a run.
///
/// A member's canonical name is the first display name ever observed for
/// their id, with non-ASCII characters stripped. Later renames are recorded
/// as variants but never change the canonical name.
#[derive(Debug, Clone)]
pub struct Roster {
    id_to_name: HashMap<String, String>,
    id_to_variants: HashMap<String, Vec<String>>,
    members: Vec<String>,
}

impl Roster {
    /// Walk the full message sequence once and build the id/name mapping.
    pub fn build(messages: &[ChatMessage], exclude_assistant: bool) -> Self {
        let mut id_to_variants: HashMap<String, Vec<String>> = HashMap::new();

        for message in messages {
            if Self::is_reserved(&message.user_id, exclude_assistant) {
                continue;
            }
            let variants = id_to_variants.entry(message.user_id.clone()).or_default();
            if !variants.contains(&message.name) {
                variants.push(message.name.clone());
            }
        }

        let id_to_name: HashMap<String, String> = id_to_variants
            .iter()
            .map(|(id, variants)| (id.clone(), strip_non_ascii(&variants[0])))
            .collect();

        // The member universe is the sorted set of canonical names; every
        // per-member structure is keyed in this order for the whole run.
        let mut members: Vec<String> = id_to_name.values().cloned().collect();
        members.sort();
        members.dedup();

        Self {
            id_to_name,
            id_to_variants,
            members,
        }
    }

    fn is_reserved(sender_id: &str, exclude_assistant: bool) -> bool {
        RESERVED_SENDER_IDS.contains(&sender_id)
            || (exclude_assistant && sender_id == ASSISTANT_SENDER_ID)
    }

    /// Canonical name for a sender id. `None` means the sender is filtered
    /// (reserved account) or never appeared as a poster; callers skip the
    /// update, this is not an error.
    pub fn resolve(&self, sender_id: &str) -> Option<&str> {
        self.id_to_name.get(sender_id).map(String::as_str)
    }

    /// Every display name variant observed for a sender id, in first-seen
    /// order.
    pub fn variants(&self, sender_id: &str) -> &[String] {
        self.id_to_variants
            .get(sender_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The fixed member universe, sorted.
    pub fn members(&self) -> &[String] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(user_id: &str, name: &str) -> ChatMessage {
        ChatMessage {
            id: 1,
            attachments: Vec::new(),
            source_guid: None,
            created_at: 1700000000,
            user_id: user_id.to_string(),
            group_id: None,
            avatar_url: None,
            name: name.to_string(),
            text: None,
            favorited_by: Vec::new(),
            reactions: None,
        }
    }

    #[test]
    fn first_seen_name_is_canonical() {
        let messages = vec![
            message("1001", "Alice"),
            message("1001", "Alice the Great"),
            message("1001", "Alice"),
        ];
        let roster = Roster::build(&messages, true);

        assert_eq!(roster.resolve("1001"), Some("Alice"));
        assert_eq!(roster.variants("1001"), ["Alice", "Alice the Great"]);
        assert_eq!(roster.members(), ["Alice"]);
    }

    #[test]
    fn canonical_names_are_ascii_trimmed() {
        let messages = vec![message("1001", " Alice \u{1F600} ")];
        let roster = Roster::build(&messages, true);
        assert_eq!(roster.resolve("1001"), Some("Alice"));
    }

    #[test]
    fn reserved_senders_are_excluded() {
        let messages = vec![
            message("system", "GroupMe"),
            message("calendar", "Calendar"),
            message("1001", "Alice"),
        ];
        let roster = Roster::build(&messages, true);

        assert_eq!(roster.resolve("system"), None);
        assert_eq!(roster.resolve("calendar"), None);
        assert_eq!(roster.members(), ["Alice"]);
    }

    #[test]
    fn assistant_exclusion_is_configurable() {
        let messages = vec![message(ASSISTANT_SENDER_ID, "Assistant"), message("1001", "Alice")];

        let excluded = Roster::build(&messages, true);
        assert_eq!(excluded.resolve(ASSISTANT_SENDER_ID), None);
        assert_eq!(excluded.members(), ["Alice"]);

        let included = Roster::build(&messages, false);
        assert_eq!(included.resolve(ASSISTANT_SENDER_ID), Some("Assistant"));
        assert_eq!(included.members(), ["Alice", "Assistant"]);
    }

    #[test]
    fn member_universe_is_sorted_and_deduped() {
        // Two ids collapsing to the same ASCII name share one universe slot.
        let messages = vec![
            message("2002", "Zo\u{00EB}"),
            message("1001", "Zo"),
            message("3003", "Ben"),
        ];
        let roster = Roster::build(&messages, true);
        assert_eq!(roster.members(), ["Ben", "Zo"]);
        assert_eq!(roster.resolve("2002"), Some("Zo"));
        assert_eq!(roster.resolve("1001"), Some("Zo"));
    }
}
