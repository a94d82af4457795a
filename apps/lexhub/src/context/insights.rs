//! Module analytics insights.
//!
//! Generators are pluggable per module. The defaults are simple heuristics
//! over the aggregated counts; nothing here is a fixed contract.

use lexhub_core::{AnalyticsResult, ModuleRequirements};
use serde::{Deserialize, Serialize};

/// Share of records in one group above which a concentration alert fires.
pub const CONCENTRATION_THRESHOLD: f64 = 0.8;

/// Records needed before concentration is meaningful.
pub const CONCENTRATION_MIN_RECORDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Trend,
    Recommendation,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub entity: String,
    pub message: String,
}

/// What a generator sees.
#[derive(Debug, Clone, Copy)]
pub struct InsightInput<'a> {
    pub module: &'a ModuleRequirements,
    /// One result per primary entity for the requested range.
    pub current: &'a [AnalyticsResult],
    /// Same shape for the preceding range of equal length. Empty when the
    /// request had no bounded range.
    pub previous: &'a [AnalyticsResult],
}

pub trait InsightGenerator: Send + Sync {
    fn generate(&self, input: &InsightInput<'_>) -> Vec<Insight>;
}

/// Compares record volume against the preceding period.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeTrend;

impl InsightGenerator for VolumeTrend {
    fn generate(&self, input: &InsightInput<'_>) -> Vec<Insight> {
        input
            .current
            .iter()
            .filter_map(|now| {
                let before = input.previous.iter().find(|p| p.entity == now.entity)?;
                let message = match now.total_records.cmp(&before.total_records) {
                    std::cmp::Ordering::Greater => format!(
                        "{} volume rose from {} to {}",
                        now.entity, before.total_records, now.total_records
                    ),
                    std::cmp::Ordering::Less => format!(
                        "{} volume fell from {} to {}",
                        now.entity, before.total_records, now.total_records
                    ),
                    std::cmp::Ordering::Equal => {
                        format!("{} volume steady at {}", now.entity, now.total_records)
                    }
                };
                Some(Insight {
                    kind: InsightKind::Trend,
                    entity: now.entity.clone(),
                    message,
                })
            })
            .collect()
    }
}

/// Suggests the module's first action when an entity has no data yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDataRecommendation;

impl InsightGenerator for EmptyDataRecommendation {
    fn generate(&self, input: &InsightInput<'_>) -> Vec<Insight> {
        let Some(action) = input.module.suggested_actions.first() else {
            return Vec::new();
        };
        input
            .current
            .iter()
            .filter(|result| result.total_records == 0)
            .map(|result| Insight {
                kind: InsightKind::Recommendation,
                entity: result.entity.clone(),
                message: format!("no {} records yet, try '{}'", result.entity, action),
            })
            .collect()
    }
}

/// Flags one dimension group holding most of an entity's records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcentrationAlert;

impl InsightGenerator for ConcentrationAlert {
    fn generate(&self, input: &InsightInput<'_>) -> Vec<Insight> {
        input
            .current
            .iter()
            .filter(|result| result.total_records >= CONCENTRATION_MIN_RECORDS)
            .filter_map(|result| {
                let top = result.rows.iter().max_by_key(|row| row.count)?;
                let share = top.count as f64 / result.total_records as f64;
                if share < CONCENTRATION_THRESHOLD || top.dimensions.is_empty() {
                    return None;
                }
                let group = serde_json::to_string(&top.dimensions).unwrap_or_default();
                Some(Insight {
                    kind: InsightKind::Alert,
                    entity: result.entity.clone(),
                    message: format!(
                        "{:.0}% of {} records share {}",
                        share * 100.0,
                        result.entity,
                        group
                    ),
                })
            })
            .collect()
    }
}

/// Runs several generators and concatenates their output.
pub struct CompositeInsights {
    generators: Vec<Box<dyn InsightGenerator>>,
}

impl CompositeInsights {
    #[must_use]
    pub fn new(generators: Vec<Box<dyn InsightGenerator>>) -> Self {
        Self { generators }
    }

    /// Trend, recommendation and alert heuristics.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(VolumeTrend),
            Box::new(EmptyDataRecommendation),
            Box::new(ConcentrationAlert),
        ])
    }
}

impl InsightGenerator for CompositeInsights {
    fn generate(&self, input: &InsightInput<'_>) -> Vec<Insight> {
        self.generators
            .iter()
            .flat_map(|g| g.generate(input))
            .collect()
    }
}
