//! Deterministic cache-key derivation.
//!
//! A key is `<ns>:<kind>:|E1|E2|:<hash>` where the bar-delimited list names
//! every entity whose data may appear in the cached value and `<hash>` is a
//! truncated BLAKE3 digest of the normalized request shape. Mutating `E`
//! invalidates `<ns>:*|E|*`, which reaches every such key.

use crate::analytics::AnalyticsQuery;
use crate::context::DataContext;
use crate::primitives::KEY_HASH_LEN;
use crate::query::{DataQuery, Filter, Filters, OrderBy};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// What a cached value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Query,
    Analytics,
    Context,
}

impl KeyKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Analytics => "analytics",
            Self::Context => "context",
        }
    }
}

#[derive(Serialize)]
struct QueryShape<'a> {
    entity: &'a str,
    filters: BTreeMap<&'a str, Filter>,
    relations: BTreeSet<&'a str>,
    order_by: &'a [OrderBy],
    limit: Option<usize>,
    offset: Option<usize>,
}

fn normalize(filters: &Filters) -> BTreeMap<&str, Filter> {
    filters
        .iter()
        .map(|(field, filter)| (field.as_str(), filter.normalized()))
        .collect()
}

/// Key factory bound to one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    namespace: String,
}

impl CacheKeys {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn digest<T: Serialize>(shape: &T) -> String {
        // Serializing plain data structures to JSON cannot fail; an empty
        // input still yields a stable digest.
        let bytes = serde_json::to_vec(shape).unwrap_or_default();
        let hex = blake3::hash(&bytes).to_hex();
        hex.as_str()[..KEY_HASH_LEN].to_string()
    }

    fn compose(&self, kind: KeyKind, touched: &BTreeSet<String>, hash: &str) -> String {
        let mut tags = String::from("|");
        for entity in touched {
            tags.push_str(entity);
            tags.push('|');
        }
        format!("{}:{}:{}:{}", self.namespace, kind.as_str(), tags, hash)
    }

    /// Key for a row read. Cache flags and TTL do not affect the key.
    #[must_use]
    pub fn query(&self, query: &DataQuery, touched: &BTreeSet<String>) -> String {
        let shape = QueryShape {
            entity: &query.entity,
            filters: normalize(&query.filters),
            relations: query.relations.iter().map(String::as_str).collect(),
            order_by: &query.order_by,
            limit: query.limit,
            offset: query.offset,
        };
        self.compose(KeyKind::Query, touched, &Self::digest(&shape))
    }

    /// Key for an aggregation.
    #[must_use]
    pub fn analytics(&self, query: &AnalyticsQuery, touched: &BTreeSet<String>) -> String {
        let mut normalized = query.clone();
        normalized.filters = query
            .filters
            .iter()
            .map(|(k, v)| (k.clone(), v.normalized()))
            .collect();
        self.compose(KeyKind::Analytics, touched, &Self::digest(&normalized))
    }

    /// Key for contextual data assembled for a request context.
    #[must_use]
    pub fn context(&self, context: &DataContext, touched: &BTreeSet<String>) -> String {
        self.compose(KeyKind::Context, touched, &Self::digest(context))
    }

    /// Key for a relationship hint. Not entity-tagged: hints survive mutations.
    #[must_use]
    pub fn relationship(
        &self,
        from_entity: &str,
        from_id: &str,
        kind: &str,
        to_entity: &str,
        to_id: &str,
    ) -> String {
        format!(
            "{}:relationship:{}:{}:{}:{}:{}",
            self.namespace, from_entity, from_id, kind, to_entity, to_id
        )
    }

    /// Pattern over every relationship hint originating at a record. The id
    /// is escaped, so `*` or `[` in it match literally.
    #[must_use]
    pub fn relationships_from(&self, entity: &str, id: &str) -> String {
        format!(
            "{}:relationship:{}:{}:*",
            self.namespace,
            entity,
            globset::escape(id)
        )
    }

    /// Pattern over every entity-tagged key that may hold data of `entity`.
    #[must_use]
    pub fn entity_pattern(&self, entity: &str) -> String {
        format!("{}:*|{}|*", self.namespace, entity)
    }

    /// Pattern over every key this hub owns.
    #[must_use]
    pub fn namespace_pattern(&self) -> String {
        format!("{}:*", self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldValue;
    use crate::cache::KeyPattern;

    fn glob_match(pattern: &str, key: &str) -> bool {
        KeyPattern::new(pattern).expect("pattern").matches(key)
    }

    fn touched(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_shapes_share_a_key() {
        let keys = CacheKeys::new("hub");
        let a = DataQuery::new("Client").eq("status", "ACTIVE").limit(25);
        let b = DataQuery::new("Client")
            .eq("status", "ACTIVE")
            .limit(25)
            .cached(true);
        let t = touched(&["Client"]);
        assert_eq!(keys.query(&a, &t), keys.query(&b, &t));
    }

    #[test]
    fn different_limits_get_different_keys() {
        let keys = CacheKeys::new("hub");
        let t = touched(&["Client"]);
        let a = DataQuery::new("Client").limit(25);
        let b = DataQuery::new("Client").limit(10);
        assert_ne!(keys.query(&a, &t), keys.query(&b, &t));
    }

    #[test]
    fn relation_order_does_not_matter() {
        let keys = CacheKeys::new("hub");
        let t = touched(&["Case", "Client", "Contract"]);
        let a = DataQuery::new("Client").relation("cases").relation("contracts");
        let b = DataQuery::new("Client").relation("contracts").relation("cases");
        assert_eq!(keys.query(&a, &t), keys.query(&b, &t));
    }

    #[test]
    fn membership_order_does_not_matter() {
        let keys = CacheKeys::new("hub");
        let t = touched(&["Case"]);
        let a = DataQuery::new("Case").filter(
            "id",
            Filter::In(vec![FieldValue::text("b"), FieldValue::text("a")]),
        );
        let b = DataQuery::new("Case").filter(
            "id",
            Filter::In(vec![FieldValue::text("a"), FieldValue::text("b")]),
        );
        assert_eq!(keys.query(&a, &t), keys.query(&b, &t));
    }

    #[test]
    fn bool_and_int_filters_do_not_collide() {
        let keys = CacheKeys::new("hub");
        let t = touched(&["Case"]);
        let a = DataQuery::new("Case").eq("flag", true);
        let b = DataQuery::new("Case").eq("flag", -1i64);
        assert_ne!(keys.query(&a, &t), keys.query(&b, &t));
    }

    #[test]
    fn keys_are_tagged_with_every_touched_entity() {
        let keys = CacheKeys::new("hub");
        let key = keys.query(
            &DataQuery::new("Client").relation("cases"),
            &touched(&["Case", "Client"]),
        );
        assert!(key.starts_with("hub:query:|Case|Client|:"));
        assert!(glob_match(&keys.entity_pattern("Case"), &key));
        assert!(glob_match(&keys.entity_pattern("Client"), &key));
        assert!(!glob_match(&keys.entity_pattern("Document"), &key));
    }

    #[test]
    fn relationship_hints_escape_entity_patterns() {
        let keys = CacheKeys::new("hub");
        let key = keys.relationship("Case", "k1", "cites", "Document", "d1");
        assert!(!glob_match(&keys.entity_pattern("Case"), &key));
        assert!(glob_match(&keys.relationships_from("Case", "k1"), &key));
    }

    #[test]
    fn relationship_pattern_escapes_glob_characters_in_ids() {
        let keys = CacheKeys::new("hub");
        let odd = keys.relationship("Case", "k[1]*", "cites", "Document", "d1");
        let other = keys.relationship("Case", "k1x", "cites", "Document", "d1");
        let pattern = keys.relationships_from("Case", "k[1]*");
        assert!(glob_match(&pattern, &odd));
        assert!(!glob_match(&pattern, &other));
    }
}
