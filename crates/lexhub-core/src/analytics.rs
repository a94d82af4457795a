//! # Analytics
//!
//! Aggregations over one entity, grouped by dimension fields.
//!
//! Results are cached by the hub with a longer TTL than plain reads.

use crate::query::{Filters, matches_all};
use crate::{CREATED_AT_FIELD, FieldValue, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric name that counts records instead of reading a field.
pub const COUNT_ALL: &str = "*";

/// Aggregation applied to every metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Avg,
    #[default]
    Count,
    Max,
    Min,
}

fn default_time_field() -> String {
    CREATED_AT_FIELD.to_string()
}

/// Inclusive time window over a timestamp field (unix millis).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    #[serde(default = "default_time_field")]
    pub field: String,
    #[serde(default)]
    pub from: Option<i64>,
    #[serde(default)]
    pub to: Option<i64>,
}

impl TimeRange {
    #[must_use]
    pub fn between(from: Option<i64>, to: Option<i64>) -> Self {
        Self {
            field: default_time_field(),
            from,
            to,
        }
    }

    fn contains(&self, record: &Record) -> bool {
        let Some(at) = record.field(&self.field).and_then(|v| v.as_f64()) else {
            return false;
        };
        let at = at as i64;
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// An aggregation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    /// Entity aggregated over.
    pub entity: String,
    pub metrics: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl AnalyticsQuery {
    /// Count records of an entity grouped by `dimensions`.
    #[must_use]
    pub fn count_by(entity: impl Into<String>, dimensions: Vec<String>) -> Self {
        Self {
            entity: entity.into(),
            metrics: vec![COUNT_ALL.to_string()],
            dimensions,
            filters: Filters::new(),
            time_range: None,
            aggregation: Aggregation::Count,
        }
    }

    /// Aggregate scanned records.
    #[must_use]
    pub fn aggregate(&self, records: &[Record]) -> AnalyticsResult {
        let selected: Vec<&Record> = records
            .iter()
            .filter(|r| matches_all(r, &self.filters))
            .filter(|r| self.time_range.as_ref().is_none_or(|t| t.contains(r)))
            .collect();

        let mut groups: BTreeMap<Vec<String>, (BTreeMap<String, FieldValue>, Vec<&Record>)> =
            BTreeMap::new();
        for record in &selected {
            let mut dims = BTreeMap::new();
            let mut group_key = Vec::with_capacity(self.dimensions.len());
            for dimension in &self.dimensions {
                let value = record
                    .field(dimension)
                    .map(|v| v.into_owned())
                    .unwrap_or_default();
                group_key.push(serde_json::to_string(&value).unwrap_or_default());
                dims.insert(dimension.clone(), value);
            }
            groups
                .entry(group_key)
                .or_insert_with(|| (dims, Vec::new()))
                .1
                .push(record);
        }

        let rows = groups
            .into_values()
            .map(|(dimensions, members)| {
                let values = self
                    .metrics
                    .iter()
                    .map(|metric| (metric.clone(), self.reduce(metric, &members)))
                    .collect();
                AnalyticsRow {
                    dimensions,
                    count: members.len(),
                    values,
                }
            })
            .collect();

        AnalyticsResult {
            entity: self.entity.clone(),
            aggregation: self.aggregation,
            total_records: selected.len(),
            rows,
        }
    }

    fn reduce(&self, metric: &str, members: &[&Record]) -> Option<f64> {
        if metric == COUNT_ALL {
            return Some(members.len() as f64);
        }
        let present: Vec<&FieldValue> = members
            .iter()
            .filter_map(|r| r.fields.get(metric))
            .filter(|v| !v.is_null())
            .collect();
        if self.aggregation == Aggregation::Count {
            return Some(present.len() as f64);
        }
        let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
        if numbers.is_empty() {
            return match self.aggregation {
                Aggregation::Sum => Some(0.0),
                _ => None,
            };
        }
        match self.aggregation {
            Aggregation::Sum => Some(numbers.iter().sum()),
            Aggregation::Avg => Some(numbers.iter().sum::<f64>() / numbers.len() as f64),
            Aggregation::Max => numbers.iter().copied().reduce(f64::max),
            Aggregation::Min => numbers.iter().copied().reduce(f64::min),
            Aggregation::Count => Some(numbers.len() as f64),
        }
    }
}

/// One dimension group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRow {
    pub dimensions: BTreeMap<String, FieldValue>,
    /// Records in the group.
    pub count: usize,
    /// Metric name to aggregated value; `None` when nothing numeric was found.
    pub values: BTreeMap<String, Option<f64>>,
}

/// Aggregated result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub entity: String,
    pub aggregation: Aggregation,
    pub total_records: usize,
    pub rows: Vec<AnalyticsRow>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fields;

    fn case(id: &str, status: &str, hours: i64, created_at: i64) -> Record {
        let mut fields = Fields::new();
        fields.insert("status".into(), FieldValue::text(status));
        fields.insert("hours".into(), FieldValue::Int(hours));
        let mut record = Record::new("Case", id, fields);
        record.created_at = created_at;
        record
    }

    fn sample() -> Vec<Record> {
        vec![
            case("a", "OPEN", 4, 100),
            case("b", "OPEN", 6, 200),
            case("c", "CLOSED", 10, 300),
        ]
    }

    #[test]
    fn count_grouped_by_dimension() {
        let result = AnalyticsQuery::count_by("Case", vec!["status".into()]).aggregate(&sample());
        assert_eq!(result.total_records, 3);
        assert_eq!(result.rows.len(), 2);
        let open = result
            .rows
            .iter()
            .find(|r| r.dimensions["status"] == FieldValue::text("OPEN"))
            .expect("open group");
        assert_eq!(open.values[COUNT_ALL], Some(2.0));
    }

    #[test]
    fn avg_and_sum_over_numeric_metric() {
        let mut query = AnalyticsQuery::count_by("Case", vec![]);
        query.metrics = vec!["hours".into()];
        query.aggregation = Aggregation::Avg;
        let avg = query.aggregate(&sample());
        assert_eq!(avg.rows[0].values["hours"], Some(20.0 / 3.0));

        query.aggregation = Aggregation::Sum;
        assert_eq!(query.aggregate(&sample()).rows[0].values["hours"], Some(20.0));

        query.aggregation = Aggregation::Max;
        assert_eq!(query.aggregate(&sample()).rows[0].values["hours"], Some(10.0));
    }

    #[test]
    fn time_range_is_inclusive() {
        let mut query = AnalyticsQuery::count_by("Case", vec![]);
        query.time_range = Some(TimeRange::between(Some(200), Some(300)));
        let result = query.aggregate(&sample());
        assert_eq!(result.total_records, 2);
    }

    #[test]
    fn missing_metric_yields_none_except_sum() {
        let mut query = AnalyticsQuery::count_by("Case", vec![]);
        query.metrics = vec!["fee".into()];
        query.aggregation = Aggregation::Min;
        assert_eq!(query.aggregate(&sample()).rows[0].values["fee"], None);
        query.aggregation = Aggregation::Sum;
        assert_eq!(query.aggregate(&sample()).rows[0].values["fee"], Some(0.0));
    }

    #[test]
    fn empty_input_has_no_rows() {
        let result = AnalyticsQuery::count_by("Case", vec!["status".into()]).aggregate(&[]);
        assert_eq!(result.total_records, 0);
        assert!(result.rows.is_empty());
    }
}
