//! Text search over one entity.
//!
//! Case-insensitive matching over every textual field. A record ranks by its
//! best field: exact, then prefix, then substring, then (when fuzzy) an
//! ordered-subsequence match.

use super::DataHub;
use crate::{FieldValue, HubError, Record};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// How well a record matched. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRank {
    Exact,
    Prefix,
    Substring,
    Fuzzy,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub rank: MatchRank,
    /// Field that produced the best match.
    pub field: String,
    pub record: Record,
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut remaining = haystack.chars();
    needle
        .chars()
        .all(|wanted| remaining.by_ref().any(|c| c == wanted))
}

fn rank_text(term: &str, text: &str, fuzzy: bool) -> Option<MatchRank> {
    let text = text.to_lowercase();
    if text == term {
        Some(MatchRank::Exact)
    } else if text.starts_with(term) {
        Some(MatchRank::Prefix)
    } else if text.contains(term) {
        Some(MatchRank::Substring)
    } else if fuzzy && is_subsequence(term, &text) {
        Some(MatchRank::Fuzzy)
    } else {
        None
    }
}

fn best_match(record: &Record, term: &str, fuzzy: bool) -> Option<(MatchRank, String)> {
    record
        .fields
        .iter()
        .filter_map(|(name, value)| match value {
            FieldValue::Text(text) => rank_text(term, text, fuzzy).map(|r| (r, name.clone())),
            _ => None,
        })
        .min_by(|a, b| a.0.cmp(&b.0))
}

impl DataHub {
    /// Rank records of `entity` against `term`. At most `limit` hits, best
    /// first, ties in id order.
    pub fn search(
        &self,
        entity: &str,
        term: &str,
        fuzzy: bool,
        limit: usize,
    ) -> Result<Vec<SearchHit>, HubError> {
        self.registry.get(entity)?;
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Err(HubError::InvalidQuery("search term is empty".to_string()));
        }
        let started = Instant::now();
        let records = self.store.scan(entity)?;
        self.metrics.record_execution(started.elapsed());

        let mut hits: Vec<SearchHit> = records
            .into_iter()
            .filter_map(|record| {
                best_match(&record, &term, fuzzy).map(|(rank, field)| SearchHit {
                    rank,
                    field,
                    record,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.record.id.cmp(&b.record.id)));
        hits.truncate(limit);
        tracing::debug!(entity, found = hits.len(), "search executed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::mutation::DataMutation;
    use crate::schema::EntityRegistry;
    use crate::storage::MemoryStore;
    use crate::Fields;
    use std::sync::Arc;

    fn hub_with_titles(titles: &[(&str, &str)]) -> DataHub {
        let hub = DataHub::new(
            HubConfig::default(),
            EntityRegistry::legal_defaults(),
            Arc::new(MemoryStore::new()),
        );
        for (id, title) in titles {
            let mut fields = Fields::new();
            fields.insert("title".into(), FieldValue::text(*title));
            hub.mutate(&DataMutation::create("Case", fields).with_id(*id))
                .expect("seed");
        }
        hub
    }

    #[test]
    fn ranks_exact_before_prefix_before_substring() {
        let hub = hub_with_titles(&[
            ("k1", "Smith v. Jones"),
            ("k2", "Smith"),
            ("k3", "Estate of Smith"),
            ("k4", "Unrelated"),
        ]);
        let hits = hub.search("Case", "smith", false, 10).expect("search");
        let ranked: Vec<(&str, MatchRank)> =
            hits.iter().map(|h| (h.record.id.as_str(), h.rank)).collect();
        assert_eq!(
            ranked,
            vec![
                ("k2", MatchRank::Exact),
                ("k1", MatchRank::Prefix),
                ("k3", MatchRank::Substring),
            ]
        );
    }

    #[test]
    fn fuzzy_matches_ordered_subsequence() {
        let hub = hub_with_titles(&[("k1", "Negligence claim")]);
        assert!(hub.search("Case", "ngclm", false, 10).expect("strict").is_empty());
        let hits = hub.search("Case", "ngclm", true, 10).expect("fuzzy");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rank, MatchRank::Fuzzy);
        assert_eq!(hits[0].field, "title");
    }

    #[test]
    fn limit_truncates_results() {
        let hub = hub_with_titles(&[("k1", "alpha"), ("k2", "alpha two"), ("k3", "alpha three")]);
        assert_eq!(hub.search("Case", "alpha", false, 2).expect("search").len(), 2);
    }

    #[test]
    fn empty_term_is_rejected() {
        let hub = hub_with_titles(&[]);
        let err = hub.search("Case", "  ", false, 10).expect_err("empty");
        assert_eq!(err.kind(), "invalid_query");
    }
}
