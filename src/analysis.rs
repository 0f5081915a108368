use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{Datelike, Timelike};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Config;
use crate::debug_log;
use crate::keywords::KeywordTally;
use crate::ranking::SuperlativeList;
use crate::roster::Roster;
use crate::stats::{ChatStats, MemberStats, MessageSuperlative};
use crate::types::{AttachmentType, ChatMessage, ReactionClass, classify_reaction};
use crate::utils::{strip_non_ascii, warn_once};

/// Finalized results of one analysis run, handed to the presentation and
/// serialization collaborators. Read-only from here on.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub chat_name: String,
    pub member_stats: BTreeMap<String, MemberStats>,
    pub chat_stats: ChatStats,
    pub best_messages: Vec<MessageSuperlative>,
    /// keyword group -> member -> occurrences; empty when no keywords are
    /// configured.
    pub keyword_counts: BTreeMap<String, BTreeMap<String, u64>>,
}

/// The aggregation driver: one sequential pass over the message stream,
/// fanning each message out to the member store, chat totals, keyword tally
/// and superlative ranking, followed by a finalization pass.
pub struct Analysis {
    roster: Roster,
    member_stats: BTreeMap<String, MemberStats>,
    chat_stats: ChatStats,
    best_messages: SuperlativeList,
    keyword_tally: Option<KeywordTally>,
}

impl Analysis {
    /// Run the full pipeline over a finite batch of messages.
    pub fn run(config: &Config, messages: &[ChatMessage]) -> Result<AnalysisReport> {
        let mut analysis = Self::new(config, messages)?;
        analysis.aggregate(messages);
        analysis.finalize();
        Ok(analysis.into_report(config.chat.name.clone()))
    }

    /// Resolve identities and pre-populate every per-member structure for
    /// the fixed member universe. Must complete before the pass begins.
    fn new(config: &Config, messages: &[ChatMessage]) -> Result<Self> {
        let roster = Roster::build(messages, config.analysis.exclude_assistant);

        let mut member_stats = BTreeMap::new();
        for name in roster.members() {
            let mut stats = MemberStats::default();
            stats.init_tables(roster.members());
            member_stats.insert(name.clone(), stats);
        }

        let keyword_tally = match &config.analysis.keywords {
            Some(groups) => Some(KeywordTally::new(groups, roster.members())?),
            None => None,
        };

        debug_log::log(
            "ANALYSIS",
            "init",
            &format!(
                "member universe of {} from {} messages",
                roster.members().len(),
                messages.len()
            ),
        );

        Ok(Self {
            roster,
            member_stats,
            chat_stats: ChatStats::default(),
            best_messages: SuperlativeList::new(config.analysis.num_messages_rank),
            keyword_tally,
        })
    }

    /// The single aggregation pass. Messages from filtered senders are
    /// skipped entirely, with no side effects.
    fn aggregate(&mut self, messages: &[ChatMessage]) {
        for message in messages {
            let Some(poster) = self.roster.resolve(&message.user_id) else {
                continue;
            };
            let poster = poster.to_string();

            self.record_message(&poster, message);
            self.record_favorites(&poster, message);
            self.record_reactions(&poster, message);
            if let Some(text) = message.text.as_deref()
                && let Some(tally) = self.keyword_tally.as_mut()
            {
                tally.record(&poster, text);
            }
            self.offer_superlative(&poster, message);
        }

        debug_log::log(
            "ANALYSIS",
            "pass",
            &format!("aggregated {} chat messages", self.chat_stats.num_messages),
        );
    }

    /// Message, word, attachment and posting-time counters.
    fn record_message(&mut self, poster: &str, message: &ChatMessage) {
        let Some(member) = self.member_stats.get_mut(poster) else {
            return;
        };

        member.messages_sent += 1;
        self.chat_stats.num_messages += 1;

        for attachment in &message.attachments {
            match attachment.kind {
                AttachmentType::Poll => {
                    member.polls_made += 1;
                    self.chat_stats.total_polls += 1;
                }
                AttachmentType::Image => {
                    member.images_sent += 1;
                    self.chat_stats.total_image_attachments += 1;
                }
                _ => {}
            }
        }

        let words = message.word_count();
        member.word_count += words;
        self.chat_stats.word_count += words;

        if let Some(posted) = message.posted_at_local() {
            member.hours_posted.push(posted.hour());
            member.days_posted.push(posted.weekday().num_days_from_monday());
        }
    }

    /// The plain favorited-by list: generic reaction counters, independent
    /// of the heart/dislike reaction groups.
    fn record_favorites(&mut self, poster: &str, message: &ChatMessage) {
        let favorites = message.favorited_by.len() as u64;
        if let Some(member) = self.member_stats.get_mut(poster) {
            member.reactions_received += favorites;
        }
        self.chat_stats.total_reactions += favorites;

        for reacter_id in &message.favorited_by {
            let Some(reacter) = self.roster.resolve(reacter_id) else {
                warn_once(format!(
                    "Skipping favorite from unresolvable sender id {reacter_id}"
                ));
                continue;
            };
            if let Some(giver) = self.member_stats.get_mut(reacter) {
                giver.reactions_given += 1;
            }
            let reacter = reacter.to_string();
            if let Some(member) = self.member_stats.get_mut(poster) {
                *member
                    .reactions_received_by_sender
                    .entry(reacter)
                    .or_insert(0) += 1;
            }
        }
    }

    /// Heart/dislike reaction groups, including the relational tables in
    /// both directions for likes.
    fn record_reactions(&mut self, poster: &str, message: &ChatMessage) {
        let Some(reactions) = &message.reactions else {
            return;
        };

        for reaction in reactions {
            let givers = reaction.user_ids.len() as u64;
            match classify_reaction(&reaction.code) {
                ReactionClass::Like => {
                    if let Some(member) = self.member_stats.get_mut(poster) {
                        member.hearts_received += givers;
                    }
                    self.chat_stats.total_likes += givers;

                    for reacter_id in &reaction.user_ids {
                        let Some(reacter) = self.roster.resolve(reacter_id) else {
                            warn_once(format!(
                                "Skipping like from unresolvable sender id {reacter_id}"
                            ));
                            continue;
                        };
                        let reacter = reacter.to_string();
                        if let Some(giver) = self.member_stats.get_mut(&reacter) {
                            giver.hearts_given += 1;
                            *giver
                                .hearts_given_by_receiver
                                .entry(poster.to_string())
                                .or_insert(0) += 1;
                        }
                        if let Some(member) = self.member_stats.get_mut(poster) {
                            *member
                                .hearts_received_by_sender
                                .entry(reacter)
                                .or_insert(0) += 1;
                        }
                    }
                }
                ReactionClass::Dislike => {
                    if let Some(member) = self.member_stats.get_mut(poster) {
                        member.dislikes_received += givers;
                    }
                    self.chat_stats.total_dislikes += givers;

                    for reacter_id in &reaction.user_ids {
                        let Some(reacter) = self.roster.resolve(reacter_id) else {
                            warn_once(format!(
                                "Skipping dislike from unresolvable sender id {reacter_id}"
                            ));
                            continue;
                        };
                        let reacter = reacter.to_string();
                        if let Some(giver) = self.member_stats.get_mut(&reacter) {
                            giver.dislikes_given += 1;
                        }
                        if let Some(member) = self.member_stats.get_mut(poster) {
                            *member
                                .dislikes_received_by_sender
                                .entry(reacter)
                                .or_insert(0) += 1;
                        }
                    }
                }
                ReactionClass::Other => {}
            }
        }
    }

    /// Build a superlative record for this message and offer it to the
    /// bounded ranking. Zero-liker messages compete like any other.
    fn offer_superlative(&mut self, poster: &str, message: &ChatMessage) {
        let Some(created_at) = message.posted_at_local() else {
            return;
        };

        // Distinct likers: a member using several like-class emoji on the
        // same message still appears once.
        let mut likers: Vec<String> = Vec::new();
        if let Some(reactions) = &message.reactions {
            for reaction in reactions {
                if classify_reaction(&reaction.code) != ReactionClass::Like {
                    continue;
                }
                for reacter_id in &reaction.user_ids {
                    match self.roster.resolve(reacter_id) {
                        Some(name) => {
                            if !likers.iter().any(|liker| liker == name) {
                                likers.push(name.to_string());
                            }
                        }
                        None => warn_once(format!(
                            "Skipping like from unresolvable sender id {reacter_id}"
                        )),
                    }
                }
            }
        }

        let image_attachment = message
            .attachments
            .iter()
            .find(|a| a.kind == AttachmentType::Image)
            .and_then(|a| a.url.clone());

        let total_likes = likers.len() as u64;
        self.best_messages.offer(MessageSuperlative {
            poster: poster.to_string(),
            created_at,
            text: message.text.as_deref().map(strip_non_ascii),
            image_attachment,
            likers,
            total_likes,
        });
    }

    /// Derive ratios, modes and superlative labels from the accumulated
    /// counters. Each member's finalization touches only its own record, so
    /// members finalize in parallel; the chat totals finalize inline.
    fn finalize(&mut self) {
        self.chat_stats.finalize();
        self.member_stats
            .par_iter_mut()
            .for_each(|(_, member)| member.finalize());
    }

    fn into_report(self, chat_name: String) -> AnalysisReport {
        AnalysisReport {
            chat_name,
            member_stats: self.member_stats,
            chat_stats: self.chat_stats,
            best_messages: self.best_messages.into_entries(),
            keyword_counts: self
                .keyword_tally
                .map(KeywordTally::into_counts)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordGroup;
    use crate::types::{Attachment, Reaction};

    const HEART: &str = "\u{2764}\u{FE0F}";
    const THUMBS_DOWN: &str = "\u{1F44E}";

    fn message(id: u64, user_id: &str, name: &str, text: Option<&str>) -> ChatMessage {
        ChatMessage {
            id,
            attachments: Vec::new(),
            source_guid: None,
            created_at: 1700000000 + id as i64,
            user_id: user_id.to_string(),
            group_id: None,
            avatar_url: None,
            name: name.to_string(),
            text: text.map(str::to_string),
            favorited_by: Vec::new(),
            reactions: None,
        }
    }

    fn reaction(code: &str, user_ids: &[&str]) -> Reaction {
        Reaction {
            kind: "unicode".to_string(),
            user_ids: user_ids.iter().map(|id| id.to_string()).collect(),
            code: code.to_string(),
            pack_id: None,
            pack_index: None,
        }
    }

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn heart_reaction_updates_both_sides() {
        // Alice posts, Bob hearts it. Bob has to post once to be a member.
        let mut alice_msg = message(1, "1001", "Alice", Some("good night good night"));
        alice_msg.reactions = Some(vec![reaction(HEART, &["1002"])]);
        let bob_msg = message(2, "1002", "Bob", Some("sleep well"));

        let report = Analysis::run(&config(), &[alice_msg, bob_msg]).expect("analysis");

        let alice = &report.member_stats["Alice"];
        assert_eq!(alice.messages_sent, 1);
        assert_eq!(alice.word_count, 4);
        assert_eq!(alice.average_word_count, 4.0);
        assert_eq!(alice.hearts_received, 1);
        assert_eq!(alice.hearts_received_by_sender["Bob"], 1);
        assert_eq!(alice.heart_message_ratio, 1.0);
        assert_eq!(alice.biggest_fan, "Bob - 1");

        let bob = &report.member_stats["Bob"];
        assert_eq!(bob.hearts_given, 1);
        assert_eq!(bob.hearts_given_by_receiver["Alice"], 1);
        assert_eq!(bob.biggest_supporter_of, "Alice - 1");

        assert_eq!(report.chat_stats.total_likes, 1);
    }

    #[test]
    fn message_totals_balance_and_exclude_filtered_senders() {
        let messages = vec![
            message(1, "1001", "Alice", Some("hi")),
            message(2, "system", "GroupMe", Some("Alice changed the topic")),
            message(3, "1002", "Bob", Some("hello")),
            message(4, "1001", "Alice", None),
        ];

        let report = Analysis::run(&config(), &messages).expect("analysis");

        let per_member: u64 = report
            .member_stats
            .values()
            .map(|m| m.messages_sent)
            .sum();
        assert_eq!(per_member, report.chat_stats.num_messages);
        assert_eq!(report.chat_stats.num_messages, 3);
        assert!(!report.member_stats.contains_key("GroupMe"));
    }

    #[test]
    fn like_totals_balance_across_givers_and_receivers() {
        let mut m1 = message(1, "1001", "Alice", Some("one"));
        m1.reactions = Some(vec![reaction(HEART, &["1002", "1003"])]);
        let mut m2 = message(2, "1002", "Bob", Some("two"));
        m2.reactions = Some(vec![reaction("\u{1F44D}", &["1001"])]);
        let m3 = message(3, "1003", "Cleo", Some("three"));

        let report = Analysis::run(&config(), &[m1, m2, m3]).expect("analysis");

        let given: u64 = report.member_stats.values().map(|m| m.hearts_given).sum();
        let received: u64 = report
            .member_stats
            .values()
            .map(|m| m.hearts_received)
            .sum();
        assert_eq!(given, received);
        assert_eq!(given, report.chat_stats.total_likes);
        assert_eq!(report.chat_stats.total_likes, 3);
    }

    #[test]
    fn dislikes_are_symmetric_with_likes() {
        let mut m1 = message(1, "1001", "Alice", Some("bad take"));
        m1.reactions = Some(vec![reaction(THUMBS_DOWN, &["1002", "1003"])]);
        let m2 = message(2, "1002", "Bob", None);
        let m3 = message(3, "1003", "Cleo", None);

        let report = Analysis::run(&config(), &[m1, m2, m3]).expect("analysis");

        let alice = &report.member_stats["Alice"];
        assert_eq!(alice.dislikes_received, 2);
        assert_eq!(alice.dislikes_received_by_sender["Bob"], 1);
        assert_eq!(alice.dislikes_received_by_sender["Cleo"], 1);
        assert_eq!(report.member_stats["Bob"].dislikes_given, 1);
        assert_eq!(report.chat_stats.total_dislikes, 2);
    }

    #[test]
    fn favorites_are_tracked_separately_from_reaction_groups() {
        let mut m1 = message(1, "1001", "Alice", Some("pic"));
        m1.favorited_by = vec!["1002".to_string()];
        m1.reactions = Some(vec![reaction(HEART, &["1002"])]);
        let m2 = message(2, "1002", "Bob", None);

        let report = Analysis::run(&config(), &[m1, m2]).expect("analysis");

        let alice = &report.member_stats["Alice"];
        assert_eq!(alice.reactions_received, 1);
        assert_eq!(alice.hearts_received, 1);
        assert_eq!(alice.reactions_received_by_sender["Bob"], 1);
        assert_eq!(report.member_stats["Bob"].reactions_given, 1);
        assert_eq!(report.chat_stats.total_reactions, 1);
        assert_eq!(report.chat_stats.total_likes, 1);
    }

    #[test]
    fn unresolvable_reactors_skip_only_their_update() {
        let mut m1 = message(1, "1001", "Alice", Some("hi"));
        m1.reactions = Some(vec![reaction(HEART, &["ghost", "1002"])]);
        m1.favorited_by = vec!["ghost".to_string()];
        let m2 = message(2, "1002", "Bob", None);

        let report = Analysis::run(&config(), &[m1, m2]).expect("analysis");

        let alice = &report.member_stats["Alice"];
        // Counter updates that don't need identity resolution still apply.
        assert_eq!(alice.hearts_received, 2);
        assert_eq!(alice.reactions_received, 1);
        // Relational updates only for the resolvable giver.
        assert_eq!(alice.hearts_received_by_sender["Bob"], 1);
        assert_eq!(alice.hearts_received_by_sender.len(), 2);
        // The ranking only lists resolvable likers.
        assert_eq!(report.best_messages[0].likers, ["Bob"]);
        assert_eq!(report.best_messages[0].total_likes, 1);
    }

    #[test]
    fn repeat_likers_count_once_in_the_superlative() {
        // Bob hearts and fires the same message; both are like-class.
        let mut m1 = message(1, "1001", "Alice", Some("hot take"));
        m1.reactions = Some(vec![
            reaction(HEART, &["1002"]),
            reaction("\u{1F525}", &["1002"]),
        ]);
        let m2 = message(2, "1002", "Bob", None);

        let report = Analysis::run(&config(), &[m1, m2]).expect("analysis");

        assert_eq!(report.best_messages[0].likers, ["Bob"]);
        assert_eq!(report.best_messages[0].total_likes, 1);
        // The reaction counters still see one heart and one fire.
        assert_eq!(report.member_stats["Alice"].hearts_received, 2);
    }

    #[test]
    fn attachments_and_polls_are_counted() {
        let mut m1 = message(1, "1001", "Alice", None);
        m1.attachments = vec![
            Attachment {
                kind: AttachmentType::Image,
                url: Some("https://i.groupme.com/a".to_string()),
                ..Attachment::default()
            },
            Attachment {
                kind: AttachmentType::Poll,
                poll_id: Some("p1".to_string()),
                ..Attachment::default()
            },
            Attachment {
                kind: AttachmentType::Reply,
                ..Attachment::default()
            },
        ];

        let report = Analysis::run(&config(), &[m1]).expect("analysis");

        let alice = &report.member_stats["Alice"];
        assert_eq!(alice.images_sent, 1);
        assert_eq!(alice.polls_made, 1);
        assert_eq!(report.chat_stats.total_image_attachments, 1);
        assert_eq!(report.chat_stats.total_polls, 1);
        // The superlative record carries the image url.
        assert_eq!(
            report.best_messages[0].image_attachment.as_deref(),
            Some("https://i.groupme.com/a")
        );
    }

    #[test]
    fn keyword_counts_flow_into_the_report() {
        let mut cfg = config();
        cfg.analysis.keywords = Some(vec![KeywordGroup {
            name: "gn".to_string(),
            aliases: vec!["good night".to_string(), "gn".to_string()],
        }]);

        let messages = vec![
            message(1, "1001", "Alice", Some("GN! good night all")),
            message(2, "1002", "Bob", Some("morning")),
        ];

        let report = Analysis::run(&cfg, &messages).expect("analysis");
        assert_eq!(report.keyword_counts["gn"]["Alice"], 1);
        assert_eq!(report.keyword_counts["gn"]["Bob"], 0);
    }

    #[test]
    fn ranking_is_bounded_and_ordered() {
        let mut cfg = config();
        cfg.analysis.num_messages_rank = 2;

        let mut m1 = message(1, "1001", "Alice", Some("first"));
        m1.reactions = Some(vec![reaction(HEART, &["1002", "1003"])]);
        let mut m2 = message(2, "1002", "Bob", Some("second"));
        m2.reactions = Some(vec![reaction(HEART, &["1001", "1003", "1002"])]);
        let m3 = message(3, "1003", "Cleo", Some("third"));

        let report = Analysis::run(&cfg, &[m1, m2, m3]).expect("analysis");

        assert_eq!(report.best_messages.len(), 2);
        assert_eq!(report.best_messages[0].poster, "Bob");
        assert_eq!(report.best_messages[0].total_likes, 3);
        assert_eq!(report.best_messages[1].poster, "Alice");
    }

    #[test]
    fn empty_message_batch_produces_an_empty_report() {
        let report = Analysis::run(&config(), &[]).expect("analysis");
        assert!(report.member_stats.is_empty());
        assert_eq!(report.chat_stats.num_messages, 0);
        assert_eq!(report.chat_stats.average_word_count, 0.0);
        assert!(report.best_messages.is_empty());
        assert!(report.keyword_counts.is_empty());
    }
}
