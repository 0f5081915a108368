use chrono::{DateTime, Local, TimeZone};
use phf::phf_map;
use serde::{Deserialize, Serialize};

/// Attachment types the GroupMe API emits. All variants round-trip through
/// serialization even though only a few are counted during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    Reply,
    Image,
    Poll,
    Event,
    Mentions,
    Video,
    Emoji,
    File,
    Location,
    LinkedImage,
    Audio,
    Copilot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_reply_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loci: Option<Vec<Vec<i64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charmap: Option<Vec<Vec<i64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peaks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

impl Default for AttachmentType {
    fn default() -> Self {
        AttachmentType::Reply
    }
}

/// One reaction group on a message: an emoji code plus everyone who used it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(rename = "type")]
    pub kind: String,
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_index: Option<String>,
}

/// A single message as stored in the chat export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_guid: Option<String>,
    /// Seconds since epoch.
    pub created_at: i64,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub favorited_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactions: Option<Vec<Reaction>>,
}

impl ChatMessage {
    /// Posting time in the machine's local timezone. `None` for timestamps
    /// that don't map to a local wall-clock time.
    pub fn posted_at_local(&self) -> Option<DateTime<Local>> {
        Local.timestamp_opt(self.created_at, 0).earliest()
    }

    /// Number of words in the message text, splitting on single spaces.
    /// Consecutive spaces count empty pieces; empty or missing text is zero.
    pub fn word_count(&self) -> u64 {
        match self.text.as_deref() {
            None | Some("") => 0,
            Some(text) => text.split(' ').count() as u64,
        }
    }
}

/// How a reaction emoji is read during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionClass {
    Like,
    Dislike,
    Other,
}

static REACTION_CLASSES: phf::Map<&'static str, ReactionClass> = phf_map! {
    // Like-class: heart, thumbs-up, fire
    "\u{2764}\u{FE0F}" => ReactionClass::Like,
    "\u{1F44D}" => ReactionClass::Like,
    "\u{1F525}" => ReactionClass::Like,
    // Dislike-class: thumbs-down, question mark
    "\u{1F44E}" => ReactionClass::Dislike,
    "\u{2753}" => ReactionClass::Dislike,
};

/// Classify a reaction code. Codes outside the table (custom emoji packs,
/// arbitrary unicode) are `Other` and ignored by the counters.
pub fn classify_reaction(code: &str) -> ReactionClass {
    REACTION_CLASSES
        .get(code)
        .copied()
        .unwrap_or(ReactionClass::Other)
}

/// Human labels for hour-of-day buckets, index 0 = midnight.
pub const HOUR_LABELS: [&str; 24] = [
    "12:00 AM", "1:00 AM", "2:00 AM", "3:00 AM", "4:00 AM", "5:00 AM", "6:00 AM", "7:00 AM",
    "8:00 AM", "9:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM", "2:00 PM", "3:00 PM",
    "4:00 PM", "5:00 PM", "6:00 PM", "7:00 PM", "8:00 PM", "9:00 PM", "10:00 PM", "11:00 PM",
];

/// Human labels for weekday buckets, index 0 = Monday.
pub const DAY_LABELS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
