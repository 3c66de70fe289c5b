use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::error::PanelError;
use crate::schema::FilterConfig;

/// The caller's last committed filter set. Never mutated here.
pub type AppliedFilters = BTreeMap<String, String>;

/// Filter values keyed by field key. Produced by [`initialize`], so it
/// holds exactly one entry per field of the config it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterValues(BTreeMap<String, String>);

impl FilterValues {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Number of fields carrying a non-empty value.
    pub fn active_count(&self) -> usize {
        active_filter_count(&self.0)
    }
}

impl From<FilterValues> for BTreeMap<String, String> {
    fn from(values: FilterValues) -> Self {
        values.0
    }
}

pub fn active_filter_count(values: &BTreeMap<String, String>) -> usize {
    values.values().filter(|value| !value.is_empty()).count()
}

/// Seeds one value per field: the applied value if present, else the
/// config default, else the empty string.
#[instrument(skip_all, fields(config = %config.title()))]
pub fn initialize(config: &FilterConfig, applied: &AppliedFilters) -> FilterValues {
    let values: BTreeMap<String, String> = config
        .keys()
        .map(|key| {
            let value = applied
                .get(key)
                .or_else(|| config.defaults().get(key))
                .cloned()
                .unwrap_or_default();
            (key.to_string(), value)
        })
        .collect();

    let ignored: Vec<&str> = applied
        .keys()
        .map(String::as_str)
        .filter(|key| !values.contains_key(*key))
        .collect();
    if !ignored.is_empty() {
        debug!(?ignored, "applied filters name keys outside the config");
    }

    FilterValues(values)
}

/// Editable buffer for one open panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStore {
    values: FilterValues,
}

impl FilterStore {
    pub fn new(config: &FilterConfig, applied: &AppliedFilters) -> Self {
        Self {
            values: initialize(config, applied),
        }
    }

    /// Re-seeds the buffer after the config or the applied filters changed.
    pub fn reset(&mut self, config: &FilterConfig, applied: &AppliedFilters) {
        self.values = initialize(config, applied);
    }

    pub fn values(&self) -> &FilterValues {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key)
    }

    /// Overwrites a declared field's value. Values are opaque strings; only
    /// undeclared keys are refused, so the buffer never grows.
    pub fn set_value(&mut self, key: &str, value: impl Into<String>) -> Result<(), PanelError> {
        let slot = self.values.0.get_mut(key).ok_or_else(|| PanelError::UnknownField {
            key: key.to_string(),
        })?;
        *slot = value.into();
        trace!(key, value = %slot, "set filter value");
        Ok(())
    }

    pub fn apply(&self) -> FilterValues {
        self.values.clone()
    }

    /// Blanks every value. Defaults are not restored.
    pub fn clear(&mut self) {
        for value in self.values.0.values_mut() {
            value.clear();
        }
    }

    /// Whether the buffer differs from what a fresh open would show.
    pub fn is_dirty(&self, config: &FilterConfig, applied: &AppliedFilters) -> bool {
        self.values != initialize(config, applied)
    }
}
