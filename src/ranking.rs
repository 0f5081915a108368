use crate::stats::MessageSuperlative;

/// Bounded top-K ranking of the most-liked messages, ordered most- to
/// least-liked with stable insertion-order tie-breaking.
///
/// Insertion is an O(capacity) front-scan; capacity is small (default 10),
/// so the simple list beats a heap on clarity and is plenty fast.
#[derive(Debug, Clone)]
pub struct SuperlativeList {
    entries: Vec<MessageSuperlative>,
    capacity: usize,
}

impl SuperlativeList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Offer a candidate to the ranking. Every message is a valid candidate,
    /// including ones with zero likers. Field-for-field duplicates of an
    /// existing entry are never inserted.
    pub fn offer(&mut self, candidate: MessageSuperlative) {
        if self.entries.contains(&candidate) {
            return;
        }

        // Insert before the first strictly weaker entry, so equal-count
        // candidates land behind earlier arrivals.
        match self
            .entries
            .iter()
            .position(|entry| candidate.total_likes > entry.total_likes)
        {
            Some(index) => {
                self.entries.insert(index, candidate);
                self.entries.truncate(self.capacity);
            }
            None if self.entries.len() < self.capacity => {
                self.entries.push(candidate);
            }
            None => {}
        }
    }

    pub fn entries(&self) -> &[MessageSuperlative] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<MessageSuperlative> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn record(poster: &str, total_likes: u64) -> MessageSuperlative {
        MessageSuperlative {
            poster: poster.to_string(),
            created_at: Local.timestamp_opt(1700000000, 0).single().expect("time"),
            text: Some(format!("{poster} says hi")),
            image_attachment: None,
            likers: Vec::new(),
            total_likes,
        }
    }

    fn posters(list: &SuperlativeList) -> Vec<&str> {
        list.entries().iter().map(|e| e.poster.as_str()).collect()
    }

    #[test]
    fn mid_insert_bumps_weakest_entry() {
        let mut list = SuperlativeList::new(2);
        list.offer(record("X", 5));
        list.offer(record("Y", 3));
        list.offer(record("Z", 4));

        assert_eq!(posters(&list), ["X", "Z"]);
    }

    #[test]
    fn under_capacity_insert_keeps_all_entries() {
        let mut list = SuperlativeList::new(5);
        list.offer(record("X", 5));
        list.offer(record("Y", 3));
        list.offer(record("Z", 4));

        assert_eq!(posters(&list), ["X", "Z", "Y"]);
    }

    #[test]
    fn identical_records_are_not_duplicated() {
        let mut list = SuperlativeList::new(5);
        list.offer(record("X", 0));
        list.offer(record("X", 0));

        assert_eq!(list.entries().len(), 1);
    }

    #[test]
    fn equal_counts_keep_insertion_order() {
        let mut list = SuperlativeList::new(5);
        list.offer(record("A", 2));
        list.offer(record("B", 2));
        list.offer(record("C", 1));
        list.offer(record("D", 2));

        assert_eq!(posters(&list), ["A", "B", "D", "C"]);
    }

    #[test]
    fn ranking_never_exceeds_capacity_and_stays_sorted() {
        let mut list = SuperlativeList::new(3);
        for (i, likes) in [0, 7, 2, 9, 4, 4, 1].into_iter().enumerate() {
            list.offer(record(&format!("p{i}"), likes));
            assert!(list.entries().len() <= 3);
        }

        let counts: Vec<u64> = list.entries().iter().map(|e| e.total_likes).collect();
        assert_eq!(counts, [9, 7, 4]);
    }

    #[test]
    fn zero_like_messages_compete_normally() {
        let mut list = SuperlativeList::new(2);
        list.offer(record("quiet", 0));
        assert_eq!(posters(&list), ["quiet"]);

        list.offer(record("loud", 3));
        list.offer(record("louder", 5));
        assert_eq!(posters(&list), ["louder", "loud"]);
    }
}
