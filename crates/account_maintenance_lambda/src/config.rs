//! Deploy-time settings read from the Lambda environment at cold start.
//!
//! Every variable is optional; unset values fall back to the defaults in
//! `account_maintenance_core::contract`. Loaders take a lookup function so
//! tests never touch the process environment.

use account_maintenance_core::contract::{
    DEFAULT_AGGREGATE_MAX_ATTEMPTS, DEFAULT_AGGREGATE_OBJECT_KEY,
};
use account_maintenance_core::fleet::InstanceSelector;
use account_maintenance_core::retention::RetentionPolicy;
use thiserror::Error;

use crate::handlers::aggregator::AggregatorConfig;

pub const RETENTION_DAYS_VAR: &str = "SNAPSHOT_RETENTION_DAYS";
pub const FLEET_TAG_KEY_VAR: &str = "FLEET_TAG_KEY";
pub const FLEET_TAG_VALUES_VAR: &str = "FLEET_TAG_VALUES";
pub const AGGREGATE_OBJECT_KEY_VAR: &str = "AGGREGATE_OBJECT_KEY";
pub const AGGREGATE_MAX_ATTEMPTS_VAR: &str = "AGGREGATE_MAX_ATTEMPTS";
pub const AGGREGATE_CONDITIONAL_WRITES_VAR: &str = "AGGREGATE_CONDITIONAL_WRITES";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}={value:?} is invalid: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
    pub reason: &'static str,
}

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub fn load_retention_policy(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RetentionPolicy, ConfigError> {
    let mut policy = RetentionPolicy::default();
    if let Some(value) = non_empty(&lookup, RETENTION_DAYS_VAR) {
        policy.retention_days = value.parse().map_err(|_| ConfigError {
            name: RETENTION_DAYS_VAR,
            value,
            reason: "expected a non-negative whole number of days",
        })?;
    }
    Ok(policy)
}

pub fn load_instance_selector(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<InstanceSelector, ConfigError> {
    let mut selector = InstanceSelector::default();
    if let Some(tag_key) = non_empty(&lookup, FLEET_TAG_KEY_VAR) {
        selector.tag_key = tag_key;
    }
    if let Some(raw) = non_empty(&lookup, FLEET_TAG_VALUES_VAR) {
        let values: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            return Err(ConfigError {
                name: FLEET_TAG_VALUES_VAR,
                value: raw,
                reason: "expected a comma-separated list with at least one value",
            });
        }
        selector.tag_values = values;
    }
    Ok(selector)
}

pub fn load_aggregator_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AggregatorConfig, ConfigError> {
    let aggregate_key = non_empty(&lookup, AGGREGATE_OBJECT_KEY_VAR)
        .unwrap_or_else(|| DEFAULT_AGGREGATE_OBJECT_KEY.to_string());

    let max_attempts = match non_empty(&lookup, AGGREGATE_MAX_ATTEMPTS_VAR) {
        Some(value) => match value.parse::<u32>() {
            Ok(attempts) if attempts > 0 => attempts,
            _ => {
                return Err(ConfigError {
                    name: AGGREGATE_MAX_ATTEMPTS_VAR,
                    value,
                    reason: "expected a positive whole number",
                })
            }
        },
        None => DEFAULT_AGGREGATE_MAX_ATTEMPTS,
    };

    let conditional_writes = match non_empty(&lookup, AGGREGATE_CONDITIONAL_WRITES_VAR) {
        Some(value) => parse_flag(&value).ok_or(ConfigError {
            name: AGGREGATE_CONDITIONAL_WRITES_VAR,
            value,
            reason: "expected true or false",
        })?,
        None => true,
    };

    Ok(AggregatorConfig {
        aggregate_key,
        max_attempts,
        conditional_writes,
    })
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
