//! # Query Module
//!
//! Structured read requests for the hub and the in-memory plan that
//! executes them against scanned records.
//!
//! - Filters: scalar → equality, list → membership, `{operator, value}` → comparator
//! - Ordering: applied in list order, nulls first
//! - Pagination: offset then limit, bounded by `MAX_QUERY_LIMIT`

use crate::primitives::{MAX_CACHE_TTL_SECS, MAX_QUERY_LIMIT};
use crate::{FieldValue, HubError, Record};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// FILTERS
// =============================================================================

/// Explicit comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Case-insensitive substring match on text.
    Like,
}

/// A filter applied to one field.
///
/// Untagged so JSON callers can write `"ACTIVE"`, `["A","B"]` or
/// `{"operator":"gte","value":10}`. Variant order matters for decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    Condition {
        operator: Comparator,
        value: FieldValue,
    },
    In(Vec<FieldValue>),
    Equals(FieldValue),
}

impl Filter {
    /// Check a (possibly absent) field value against this filter.
    #[must_use]
    pub fn matches(&self, actual: Option<&FieldValue>) -> bool {
        let actual = actual.unwrap_or(&FieldValue::Null);
        match self {
            Self::Equals(expected) => actual.loosely_equals(expected),
            Self::In(candidates) => candidates.iter().any(|c| actual.loosely_equals(c)),
            Self::Condition { operator, value } => match operator {
                Comparator::Eq => actual.loosely_equals(value),
                Comparator::Ne => !actual.loosely_equals(value),
                Comparator::Gt => actual.compare(value) == Some(Ordering::Greater),
                Comparator::Gte => matches!(
                    actual.compare(value),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                Comparator::Lt => actual.compare(value) == Some(Ordering::Less),
                Comparator::Lte => {
                    matches!(actual.compare(value), Some(Ordering::Less | Ordering::Equal))
                }
                Comparator::Like => match (actual.as_str(), value.as_str()) {
                    (Some(haystack), Some(needle)) => haystack
                        .to_lowercase()
                        .contains(&needle.to_lowercase()),
                    _ => false,
                },
            },
        }
    }

    /// Normalized form used for cache keys: membership lists sorted and
    /// deduplicated so `[B, A, A]` and `[A, B]` address the same entry.
    #[must_use]
    pub fn normalized(&self) -> Self {
        match self {
            Self::In(values) => {
                let mut values = values.clone();
                values.sort_by(FieldValue::sort_cmp);
                values.dedup_by(|a, b| a.loosely_equals(b));
                Self::In(values)
            }
            other => other.clone(),
        }
    }
}

/// Field name to filter. A `BTreeMap` keeps iteration order deterministic.
pub type Filters = BTreeMap<String, Filter>;

/// Check a record against every filter (logical AND).
#[must_use]
pub fn matches_all(record: &Record, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(field, filter)| filter.matches(record.field(field).as_deref()))
}

// =============================================================================
// ORDERING
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

/// One ordering clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl OrderBy {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Sort records by the clauses in order. Stable, so ties keep storage order.
pub fn sort_records(records: &mut [Record], order_by: &[OrderBy]) {
    if order_by.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for clause in order_by {
            let left = a.field(&clause.field);
            let right = b.field(&clause.field);
            let null = FieldValue::Null;
            let ordering = left
                .as_deref()
                .unwrap_or(&null)
                .sort_cmp(right.as_deref().unwrap_or(&null));
            let ordering = match clause.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

// =============================================================================
// DATA QUERY
// =============================================================================

fn default_true() -> bool {
    true
}

/// A read request against one entity. Never mutates state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub entity: String,
    #[serde(default)]
    pub filters: Filters,
    /// Relation paths to join, e.g. `cases` or `cases.documents`.
    #[serde(default)]
    pub relations: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
    /// Read through the cache. On by default.
    #[serde(default = "default_true")]
    pub cache: bool,
    /// Overrides the hub's default TTL for this result.
    #[serde(default, rename = "cacheTTL")]
    pub cache_ttl: Option<u64>,
}

impl DataQuery {
    /// Create an unfiltered, cached query for an entity.
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: Filters::new(),
            relations: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            cache: true,
            cache_ttl: None,
        }
    }

    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, filter: Filter) -> Self {
        self.filters.insert(field.into(), filter);
        self
    }

    /// Add an equality filter.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.filter(field, Filter::Equals(value.into()))
    }

    /// Join a relation path.
    #[must_use]
    pub fn relation(mut self, path: impl Into<String>) -> Self {
        self.relations.push(path.into());
        self
    }

    /// Append an ordering clause.
    #[must_use]
    pub fn order(mut self, clause: OrderBy) -> Self {
        self.order_by.push(clause);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Enable or disable read-through caching.
    #[must_use]
    pub fn cached(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Validate bounds before execution.
    pub fn validate(&self) -> Result<(), HubError> {
        if let Some(limit) = self.limit
            && limit > MAX_QUERY_LIMIT
        {
            return Err(HubError::InvalidQuery(format!(
                "limit {} exceeds maximum {}",
                limit, MAX_QUERY_LIMIT
            )));
        }
        if let Some(ttl) = self.cache_ttl
            && ttl > MAX_CACHE_TTL_SECS
        {
            return Err(HubError::InvalidQuery(format!(
                "cacheTTL {} exceeds maximum {}",
                ttl, MAX_CACHE_TTL_SECS
            )));
        }
        Ok(())
    }

    /// Filter, order and paginate scanned records.
    ///
    /// Relation joins happen after this step so they only touch the page.
    #[must_use]
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut matched: Vec<Record> = records
            .into_iter()
            .filter(|r| matches_all(r, &self.filters))
            .collect();
        sort_records(&mut matched, &self.order_by);
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(MAX_QUERY_LIMIT).min(MAX_QUERY_LIMIT);
        matched.into_iter().skip(offset).take(limit).collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
