use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::config::KeywordGroup;

/// Per-group, per-member occurrence counts for configured keyword groups.
///
/// Counts are pre-populated with zero for every known member and group, so
/// downstream consumers never hit a missing key.
#[derive(Debug, Clone)]
pub struct KeywordTally {
    groups: Vec<KeywordGroup>,
    counts: BTreeMap<String, BTreeMap<String, u64>>,
}

impl KeywordTally {
    /// Build a tally for the given groups and member universe. A group with
    /// no aliases is a configuration contract violation and fails fast.
    pub fn new(groups: &[KeywordGroup], members: &[String]) -> Result<Self> {
        let mut counts = BTreeMap::new();
        for group in groups {
            if group.aliases.is_empty() {
                bail!("keyword group {:?} has no aliases to match", group.name);
            }
            let per_member: BTreeMap<String, u64> =
                members.iter().map(|name| (name.clone(), 0)).collect();
            counts.insert(group.name.clone(), per_member);
        }

        Ok(Self {
            groups: groups.to_vec(),
            counts,
        })
    }

    /// Tally keyword occurrences in one message. A message increments each
    /// matching group at most once, no matter how many aliases it hits.
    pub fn record(&mut self, poster: &str, text: &str) {
        let lowered = text.to_lowercase();
        for group in &self.groups {
            if group.aliases.iter().any(|alias| lowered.contains(alias.as_str()))
                && let Some(count) = self
                    .counts
                    .get_mut(&group.name)
                    .and_then(|members| members.get_mut(poster))
            {
                *count += 1;
            }
        }
    }

    /// group name -> member name -> occurrence count.
    pub fn counts(&self) -> &BTreeMap<String, BTreeMap<String, u64>> {
        &self.counts
    }

    pub fn into_counts(self) -> BTreeMap<String, BTreeMap<String, u64>> {
        self.counts
    }
}
