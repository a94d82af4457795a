//! # API Request/Response Types
//!
//! JSON bodies of the HTTP API that are not core types.

use crate::adapters::ModuleRequest;
use crate::context::SearchOptions;
use lexhub_core::{
    DataMutation, Fields, HubError, MutationOp, MutationOptions, PerformanceMetrics, TimeRange,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH / METRICS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub metrics: PerformanceMetrics,
    pub modules: Vec<String>,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable snake_case error kind.
    pub kind: String,
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn from_error(error: &HubError) -> Self {
        Self {
            success: false,
            kind: error.kind().to_string(),
            error: error.to_string(),
        }
    }
}

// =============================================================================
// HUB REQUESTS
// =============================================================================

/// Raw mutation body. The operation stays a string until validated so an
/// unsupported one is a client error, not a decoding failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateRequest {
    pub entity: String,
    pub operation: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "data")]
    pub payload: Fields,
    #[serde(default)]
    pub options: MutationOptions,
}

impl MutateRequest {
    pub fn to_mutation(self) -> Result<DataMutation, HubError> {
        let operation: MutationOp = self.operation.parse()?;
        let mut mutation =
            DataMutation::new(self.entity, operation, self.payload).with_options(self.options);
        mutation.id = self.id;
        Ok(mutation)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClearCacheRequest {
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// =============================================================================
// MODULE REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMutateRequest {
    #[serde(flatten)]
    pub request: ModuleRequest,
    pub entity: String,
    pub operation: String,
    #[serde(default)]
    pub data: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSearchRequest {
    #[serde(flatten)]
    pub request: ModuleRequest,
    pub term: String,
    #[serde(default)]
    pub options: SearchOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleAnalyticsRequest {
    #[serde(flatten)]
    pub request: ModuleRequest,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}
