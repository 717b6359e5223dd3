use serde::{Deserialize, Serialize};

use crate::fleet::FleetAction;

pub const DEFAULT_RETENTION_DAYS: u32 = 14;
pub const DEFAULT_ENVIRONMENT_TAG_KEY: &str = "Environment";
pub const DEFAULT_ENVIRONMENT_TAG_VALUES: [&str; 2] = ["dev", "development"];
pub const DEFAULT_AGGREGATE_OBJECT_KEY: &str = "count/count.txt";
pub const DEFAULT_AGGREGATE_MAX_ATTEMPTS: u32 = 5;

pub const NO_MATCHING_INSTANCES_MESSAGE: &str = "No matching instances found.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionReport {
    pub deleted_count: usize,
    pub skipped_count: usize,
    pub deleted_snapshots: Vec<String>,
    pub failed_snapshots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RetentionResponse {
    Success(RetentionReport),
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FleetSummary {
    Applied {
        action: FleetAction,
        instances: Vec<String>,
    },
    NothingToDo {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FleetResponse {
    Success(FleetSummary),
    Error { message: String },
}

/// HTTP-style envelope returned by the word-count aggregator. `body` holds a
/// JSON-encoded string, so the sentence arrives quoted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregatorResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl AggregatorResponse {
    pub fn processed(key: &str, word_count: usize) -> Self {
        Self::with_text(200, format!("Processed file {key} with {word_count} words."))
    }

    /// Returned when the triggering object is the aggregate itself.
    pub fn skipped(key: &str) -> Self {
        Self::with_text(200, format!("Skipped aggregate file {key}."))
    }

    pub fn failed(key: &str, message: impl std::fmt::Display) -> Self {
        Self::with_text(500, format!("Error processing file {key}: {message}"))
    }

    fn with_text(status_code: u16, text: String) -> Self {
        Self {
            status_code,
            body: serde_json::Value::String(text).to_string(),
        }
    }
}
