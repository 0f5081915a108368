use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::types::{DAY_LABELS, HOUR_LABELS};

/// Accumulated counters for one chat member, plus the fields derived from
/// them once the aggregation pass is complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberStats {
    pub messages_sent: u64,
    /// Raw word total; averaged at finalization.
    pub word_count: u64,
    pub average_word_count: f64,
    pub reactions_given: u64,
    pub reactions_received: u64,
    pub reactions_received_by_sender: BTreeMap<String, u64>,
    pub hearts_given: u64,
    pub hearts_received: u64,
    pub heart_message_ratio: f64,
    pub hearts_received_by_sender: BTreeMap<String, u64>,
    pub hearts_given_by_receiver: BTreeMap<String, u64>,
    pub dislikes_given: u64,
    pub dislikes_received: u64,
    pub dislikes_received_by_sender: BTreeMap<String, u64>,
    pub biggest_fan: String,
    pub biggest_supporter_of: String,
    pub most_active_day: String,
    pub most_active_hour: String,
    pub images_sent: u64,
    pub polls_made: u64,
    /// Hour-of-day of every post, collected for the mode computation.
    pub hours_posted: Vec<u32>,
    /// Weekday (0 = Monday) of every post.
    pub days_posted: Vec<u32>,
}

impl MemberStats {
    /// Zero the relational tables for every member in the universe so argmax
    /// lookups are always defined, including for members nobody reacted to.
    pub fn init_tables(&mut self, members: &[String]) {
        for name in members {
            self.hearts_received_by_sender.insert(name.clone(), 0);
            self.hearts_given_by_receiver.insert(name.clone(), 0);
            self.reactions_received_by_sender.insert(name.clone(), 0);
            self.dislikes_received_by_sender.insert(name.clone(), 0);
        }
    }

    /// Compute the derived fields from the raw counters. Reads only this
    /// record; safe to run per member in parallel, and idempotent.
    pub fn finalize(&mut self) {
        // A member can exist in the universe without ever posting. Leave
        // the sentinels (0.0 ratios, empty labels) instead of dividing.
        if self.messages_sent == 0 {
            return;
        }

        self.average_word_count = self.word_count as f64 / self.messages_sent as f64;
        self.heart_message_ratio = self.hearts_received as f64 / self.messages_sent as f64;

        if let Some(hour) = mode(&self.hours_posted, HOUR_LABELS.len()) {
            self.most_active_hour = HOUR_LABELS[hour].to_string();
        }
        if let Some(day) = mode(&self.days_posted, DAY_LABELS.len()) {
            self.most_active_day = DAY_LABELS[day].to_string();
        }

        if let Some((name, count)) = argmax(&self.hearts_received_by_sender) {
            self.biggest_fan = format!("{name} - {count}");
        }
        if let Some((name, count)) = argmax(&self.hearts_given_by_receiver) {
            self.biggest_supporter_of = format!("{name} - {count}");
        }
    }
}

/// Chat-wide totals mirroring the member counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatStats {
    pub num_messages: u64,
    pub word_count: u64,
    pub average_word_count: f64,
    pub total_reactions: u64,
    pub total_likes: u64,
    pub total_dislikes: u64,
    pub total_image_attachments: u64,
    pub total_polls: u64,
}

impl ChatStats {
    pub fn finalize(&mut self) {
        if self.num_messages > 0 {
            self.average_word_count = self.word_count as f64 / self.num_messages as f64;
        }
    }
}

/// One entry in the most-liked-messages ranking. Immutable once built;
/// equality over all fields is what keeps duplicates out of the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSuperlative {
    pub poster: String,
    pub created_at: DateTime<Local>,
    pub text: Option<String>,
    pub image_attachment: Option<String>,
    /// Canonical names of everyone who like-reacted.
    pub likers: Vec<String>,
    pub total_likes: u64,
}

/// Statistical mode over bucketed values; ties resolve to the lowest bucket.
/// `None` when no values were recorded.
pub fn mode(values: &[u32], bucket_count: usize) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut counts = vec![0u64; bucket_count];
    for &value in values {
        if let Some(slot) = counts.get_mut(value as usize) {
            *slot += 1;
        }
    }
    let mut best = 0;
    for (bucket, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = bucket;
        }
    }
    Some(best)
}

/// First entry with the maximum count, in table (member universe) order.
/// Always defined for a pre-populated table; all-zero ties fall back to the
/// first member with a count of 0.
fn argmax(table: &BTreeMap<String, u64>) -> Option<(&str, u64)> {
    let mut best: Option<(&str, u64)> = None;
    for (name, &count) in table {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((name.as_str(), count)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_breaks_ties_toward_lowest_bucket() {
        assert_eq!(mode(&[3, 1, 3, 1], 24), Some(1));
        assert_eq!(mode(&[5, 5, 2], 24), Some(5));
        assert_eq!(mode(&[], 24), None);
        // Out-of-range values are ignored rather than panicking.
        assert_eq!(mode(&[99, 2], 24), Some(2));
    }

    #[test]
    fn finalize_derives_ratios_and_labels() {
        let mut member = MemberStats::default();
        member.init_tables(&["Alice".to_string(), "Bob".to_string()]);
        member.messages_sent = 4;
        member.word_count = 10;
        member.hearts_received = 6;
        member.hours_posted = vec![22, 22, 9, 14];
        member.days_posted = vec![0, 5, 5, 5];
        *member
            .hearts_received_by_sender
            .get_mut("Bob")
            .expect("Bob") = 3;
        *member
            .hearts_given_by_receiver
            .get_mut("Alice")
            .expect("Alice") = 2;

        member.finalize();

        assert_eq!(member.average_word_count, 2.5);
        assert_eq!(member.heart_message_ratio, 1.5);
        assert_eq!(member.most_active_hour, "10:00 PM");
        assert_eq!(member.most_active_day, "Saturday");
        assert_eq!(member.biggest_fan, "Bob - 3");
        assert_eq!(member.biggest_supporter_of, "Alice - 2");
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut member = MemberStats::default();
        member.init_tables(&["Alice".to_string()]);
        member.messages_sent = 2;
        member.word_count = 7;
        member.hours_posted = vec![8, 8];
        member.days_posted = vec![2, 2];

        member.finalize();
        let once = member.clone();
        member.finalize();
        assert_eq!(member, once);
    }

    #[test]
    fn zero_message_member_keeps_sentinels() {
        let mut member = MemberStats::default();
        member.init_tables(&["Alice".to_string()]);
        member.finalize();

        assert_eq!(member.average_word_count, 0.0);
        assert_eq!(member.heart_message_ratio, 0.0);
        assert_eq!(member.most_active_hour, "");
        assert_eq!(member.biggest_fan, "");
    }

    #[test]
    fn argmax_ties_resolve_in_universe_order() {
        let mut member = MemberStats::default();
        member.init_tables(&["Bob".to_string(), "Alice".to_string(), "Cleo".to_string()]);
        member.messages_sent = 1;
        *member
            .hearts_received_by_sender
            .get_mut("Cleo")
            .expect("Cleo") = 2;
        *member
            .hearts_received_by_sender
            .get_mut("Bob")
            .expect("Bob") = 2;

        member.finalize();
        // BTreeMap order is the universe order; Bob sorts before Cleo.
        assert_eq!(member.biggest_fan, "Bob - 2");
        // All-zero table still yields a defined label.
        assert_eq!(member.biggest_supporter_of, "Alice - 0");
    }

    #[test]
    fn chat_stats_average_guards_empty_chat() {
        let mut chat = ChatStats::default();
        chat.finalize();
        assert_eq!(chat.average_word_count, 0.0);

        chat.num_messages = 4;
        chat.word_count = 6;
        chat.finalize();
        assert_eq!(chat.average_word_count, 1.5);
    }
}
