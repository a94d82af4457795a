//! # Data Context
//!
//! The per-request bundle of who is asking, from which module, for what.
//! Constructed fresh for every call and never persisted.

use crate::query::{Filters, OrderBy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-user presentation and paging preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub default_page_size: usize,
    pub preferred_order_by: Vec<OrderBy>,
    /// Fields stripped from records before they reach the user.
    pub hidden_fields: Vec<String>,
    /// Named filter sets the user saved.
    pub favorite_filters: BTreeMap<String, Filters>,
    pub auto_refresh: bool,
    pub real_time_notifications: bool,
}

impl UserPreferences {
    /// Defaults materialized on first access, newest records first.
    #[must_use]
    pub fn defaults(page_size: usize) -> Self {
        Self {
            default_page_size: page_size,
            preferred_order_by: vec![OrderBy::desc(crate::CREATED_AT_FIELD)],
            hidden_fields: Vec::new(),
            favorite_filters: BTreeMap::new(),
            auto_refresh: false,
            real_time_notifications: true,
        }
    }
}

/// Who is asking, from which module, for what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContext {
    pub user_id: String,
    pub user_role: String,
    pub module: String,
    pub action: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub filters: Option<Filters>,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
}

impl DataContext {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        user_role: impl Into<String>,
        module: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_role: user_role.into(),
            module: module.into(),
            action: action.into(),
            entity_id: None,
            filters: None,
            preferences: None,
        }
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }

    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }
}
