use account_maintenance_core::aggregate::{
    count_words, format_record, EventError, ObjectCreated,
};
use account_maintenance_core::contract::{
    AggregatorResponse, DEFAULT_AGGREGATE_MAX_ATTEMPTS, DEFAULT_AGGREGATE_OBJECT_KEY,
};
use chrono::NaiveDateTime;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adapters::object_store::{ObjectStore, ObjectStoreError, WritePrecondition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub aggregate_key: String,
    pub max_attempts: u32,
    /// When false the aggregate is rewritten unconditionally (last writer wins).
    pub conditional_writes: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            aggregate_key: DEFAULT_AGGREGATE_OBJECT_KEY.to_string(),
            max_attempts: DEFAULT_AGGREGATE_MAX_ATTEMPTS,
            conditional_writes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Event(#[from] EventError),
    #[error("could not download object: {0}")]
    Download(#[source] ObjectStoreError),
    #[error("object {key} is not valid UTF-8 text")]
    Decode { key: String },
    #[error("could not read aggregate: {0}")]
    ReadAggregate(#[source] ObjectStoreError),
    #[error("could not write aggregate: {0}")]
    WriteAggregate(#[source] ObjectStoreError),
    #[error("aggregate {key} kept changing during {attempts} write attempts")]
    Contended { key: String, attempts: u32 },
}

/// Entry point for S3 object-created notifications.
pub fn handle_object_created(
    event: &Value,
    config: &AggregatorConfig,
    recorded_at: NaiveDateTime,
    store: &impl ObjectStore,
) -> AggregatorResponse {
    info!(event = "aggregator_triggered", payload = %event, "received object-created event");

    match ObjectCreated::from_s3_event(event) {
        Ok(created) if created.key == config.aggregate_key => {
            info!(
                event = "aggregate_self_trigger_skipped",
                bucket = %created.bucket,
                key = %created.key,
                "ignoring notification for the aggregate object"
            );
            AggregatorResponse::skipped(&created.key)
        }
        Ok(created) => {
            aggregate_word_count(&created.bucket, &created.key, config, recorded_at, store)
        }
        Err(invalid) => {
            let key = ObjectCreated::raw_key(event).unwrap_or("<unknown>");
            into_error_response(key, AggregateError::from(invalid))
        }
    }
}

/// Counts the words of `bucket/key` and appends one record to the aggregate
/// object in the same bucket.
pub fn aggregate_word_count(
    bucket: &str,
    key: &str,
    config: &AggregatorConfig,
    recorded_at: NaiveDateTime,
    store: &impl ObjectStore,
) -> AggregatorResponse {
    info!(event = "object_processing", bucket, key, "processing object");

    match process_object(bucket, key, config, recorded_at, store) {
        Ok(word_count) => AggregatorResponse::processed(key, word_count),
        Err(failure) => into_error_response(key, failure),
    }
}

fn into_error_response(key: &str, failure: AggregateError) -> AggregatorResponse {
    error!(event = "object_processing_failed", key, error = %failure, "failed to process object");
    AggregatorResponse::failed(key, failure)
}

fn process_object(
    bucket: &str,
    key: &str,
    config: &AggregatorConfig,
    recorded_at: NaiveDateTime,
    store: &impl ObjectStore,
) -> Result<usize, AggregateError> {
    let object = store
        .get_object(bucket, key)
        .map_err(AggregateError::Download)?;
    let content = String::from_utf8(object.body).map_err(|_| AggregateError::Decode {
        key: key.to_string(),
    })?;
    info!(event = "object_read", key, bytes = content.len(), "read object");

    let word_count = count_words(&content);
    info!(event = "object_counted", key, word_count, "counted words");

    let record = format_record(key, word_count, recorded_at);
    let attempts = append_record(bucket, &record, config, store)?;
    info!(
        event = "aggregate_updated",
        aggregate_key = %config.aggregate_key,
        attempts,
        "appended record to aggregate"
    );
    Ok(word_count)
}

/// Read-modify-write of the aggregate, guarded by the ETag observed on read.
/// A lost race re-reads and re-appends; returns the number of attempts used.
fn append_record(
    bucket: &str,
    record: &str,
    config: &AggregatorConfig,
    store: &impl ObjectStore,
) -> Result<u32, AggregateError> {
    let aggregate_key = config.aggregate_key.as_str();

    for attempt in 1..=config.max_attempts {
        let (previous, precondition) = match store.get_object(bucket, aggregate_key) {
            Ok(existing) => {
                let previous = String::from_utf8(existing.body).map_err(|_| {
                    AggregateError::Decode {
                        key: aggregate_key.to_string(),
                    }
                })?;
                info!(
                    event = "aggregate_found",
                    aggregate_key,
                    length = previous.len(),
                    "found existing aggregate"
                );
                let precondition = match existing.etag {
                    Some(etag) if config.conditional_writes => WritePrecondition::IfMatch(etag),
                    _ => WritePrecondition::Unconditional,
                };
                (previous, precondition)
            }
            Err(ObjectStoreError::NotFound { .. }) => {
                warn!(
                    event = "aggregate_missing",
                    aggregate_key,
                    "no existing aggregate, creating a new one"
                );
                let precondition = if config.conditional_writes {
                    WritePrecondition::IfAbsent
                } else {
                    WritePrecondition::Unconditional
                };
                (String::new(), precondition)
            }
            Err(failure) => return Err(AggregateError::ReadAggregate(failure)),
        };

        let updated = previous + record;
        match store.put_object(bucket, aggregate_key, updated.as_bytes(), precondition) {
            Ok(()) => return Ok(attempt),
            Err(ObjectStoreError::PreconditionFailed { .. }) => {
                warn!(
                    event = "aggregate_write_conflict",
                    aggregate_key,
                    attempt,
                    "aggregate changed concurrently, retrying"
                );
            }
            Err(failure) => return Err(AggregateError::WriteAggregate(failure)),
        }
    }

    Err(AggregateError::Contended {
        key: aggregate_key.to_string(),
        attempts: config.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use serde_json::json;

    use crate::adapters::object_store::StoredObject;

    use super::*;

    /// In-memory bucket whose ETags change on every write.
    struct MemoryStore {
        objects: Mutex<HashMap<(String, String), (Vec<u8>, u64)>>,
        writes: Mutex<Vec<WritePrecondition>>,
        failing_reads: Vec<String>,
        /// Number of upcoming conditional writes to reject as if another writer won.
        forced_conflicts: Mutex<u32>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                writes: Mutex::new(Vec::new()),
                failing_reads: Vec::new(),
                forced_conflicts: Mutex::new(0),
            }
        }

        fn seed_object(&self, bucket: &str, key: &str, body: &[u8]) {
            let mut objects = self.objects.lock().expect("poisoned mutex");
            let version = objects.len() as u64 + 1;
            objects.insert((bucket.to_string(), key.to_string()), (body.to_vec(), version));
        }

        fn text(&self, bucket: &str, key: &str) -> Option<String> {
            self.objects
                .lock()
                .expect("poisoned mutex")
                .get(&(bucket.to_string(), key.to_string()))
                .map(|(body, _)| String::from_utf8(body.clone()).expect("utf-8 fixture"))
        }

        fn writes(&self) -> Vec<WritePrecondition> {
            self.writes.lock().expect("poisoned mutex").clone()
        }
    }

    impl ObjectStore for MemoryStore {
        fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, ObjectStoreError> {
            if self.failing_reads.iter().any(|failing| failing == key) {
                return Err(ObjectStoreError::Request("access denied".to_string()));
            }
            self.objects
                .lock()
                .expect("poisoned mutex")
                .get(&(bucket.to_string(), key.to_string()))
                .map(|(body, version)| StoredObject {
                    body: body.clone(),
                    etag: Some(format!("\"v{version}\"")),
                })
                .ok_or_else(|| ObjectStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
        }

        fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: &[u8],
            precondition: WritePrecondition,
        ) -> Result<(), ObjectStoreError> {
            self.writes
                .lock()
                .expect("poisoned mutex")
                .push(precondition.clone());

            let mut forced = self.forced_conflicts.lock().expect("poisoned mutex");
            let conflict = || ObjectStoreError::PreconditionFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
            };
            if *forced > 0 && precondition != WritePrecondition::Unconditional {
                *forced -= 1;
                return Err(conflict());
            }

            let mut objects = self.objects.lock().expect("poisoned mutex");
            let slot = (bucket.to_string(), key.to_string());
            let current = objects.get(&slot).map(|(_, version)| format!("\"v{version}\""));
            let admitted = match &precondition {
                WritePrecondition::Unconditional => true,
                WritePrecondition::IfAbsent => current.is_none(),
                WritePrecondition::IfMatch(etag) => current.as_ref() == Some(etag),
            };
            if !admitted {
                return Err(conflict());
            }
            let version = objects.values().map(|(_, version)| *version).max().unwrap_or(0) + 1;
            objects.insert(slot, (body.to_vec(), version));
            Ok(())
        }
    }

    fn recorded_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 1)
            .and_then(|date| date.and_hms_opt(8, 15, 0))
            .expect("valid fixture time")
    }

    fn s3_event(bucket: &str, key: &str) -> Value {
        json!({
            "Records": [{
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {"bucket": {"name": bucket}, "object": {"key": key}}
            }]
        })
    }

    #[test]
    fn creates_aggregate_on_first_object() {
        let store = MemoryStore::new();
        store.seed_object("bucket", "in/a.txt", b"a b  c\n");

        let response = handle_object_created(
            &s3_event("bucket", "in/a.txt"),
            &AggregatorConfig::default(),
            recorded_at(),
            &store,
        );

        assert_eq!(
            response,
            AggregatorResponse {
                status_code: 200,
                body: "\"Processed file in/a.txt with 3 words.\"".to_string(),
            }
        );
        assert_eq!(
            store.text("bucket", "count/count.txt").as_deref(),
            Some("File: in/a.txt, Words: 3, Time: 2026-04-01 08:15:00\n")
        );
        assert_eq!(store.writes(), vec![WritePrecondition::IfAbsent]);
    }

    #[test]
    fn appends_records_in_processing_order() {
        let store = MemoryStore::new();
        store.seed_object("bucket", "key1", b"one two");
        store.seed_object("bucket", "key2", b"");
        let config = AggregatorConfig::default();

        aggregate_word_count("bucket", "key1", &config, recorded_at(), &store);
        let second = aggregate_word_count("bucket", "key2", &config, recorded_at(), &store);

        assert_eq!(second.body, "\"Processed file key2 with 0 words.\"");
        assert_eq!(
            store.text("bucket", "count/count.txt").as_deref(),
            Some(
                "File: key1, Words: 2, Time: 2026-04-01 08:15:00\n\
                 File: key2, Words: 0, Time: 2026-04-01 08:15:00\n"
            )
        );
        assert!(matches!(
            store.writes().last(),
            Some(WritePrecondition::IfMatch(_))
        ));
    }

    #[test]
    fn decodes_event_key_before_use() {
        let store = MemoryStore::new();
        store.seed_object("bucket", "in/my notes.txt", b"hello world");

        let response = handle_object_created(
            &s3_event("bucket", "in/my+notes.txt"),
            &AggregatorConfig::default(),
            recorded_at(),
            &store,
        );

        assert_eq!(response.body, "\"Processed file in/my notes.txt with 2 words.\"");
    }

    #[test]
    fn ignores_notifications_for_the_aggregate_itself() {
        let store = MemoryStore::new();
        store.seed_object("bucket", "count/count.txt", b"File: a, Words: 1, Time: t\n");

        let response = handle_object_created(
            &s3_event("bucket", "count/count.txt"),
            &AggregatorConfig::default(),
            recorded_at(),
            &store,
        );

        assert_eq!(
            response,
            AggregatorResponse {
                status_code: 200,
                body: "\"Skipped aggregate file count/count.txt.\"".to_string(),
            }
        );
        assert!(store.writes().is_empty());
        assert_eq!(
            store.text("bucket", "count/count.txt").as_deref(),
            Some("File: a, Words: 1, Time: t\n")
        );
    }

    #[test]
    fn retries_after_losing_a_write_race() {
        let store = MemoryStore::new();
        store.seed_object("bucket", "doc", b"x y z");
        *store.forced_conflicts.lock().expect("poisoned mutex") = 2;

        let response = aggregate_word_count(
            "bucket",
            "doc",
            &AggregatorConfig::default(),
            recorded_at(),
            &store,
        );

        assert_eq!(response.status_code, 200);
        assert_eq!(store.writes().len(), 3);
        assert_eq!(
            store.text("bucket", "count/count.txt").as_deref(),
            Some("File: doc, Words: 3, Time: 2026-04-01 08:15:00\n")
        );
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let store = MemoryStore::new();
        store.seed_object("bucket", "doc", b"x");
        *store.forced_conflicts.lock().expect("poisoned mutex") = 10;
        let config = AggregatorConfig {
            max_attempts: 2,
            ..AggregatorConfig::default()
        };

        let response = aggregate_word_count("bucket", "doc", &config, recorded_at(), &store);

        assert_eq!(response.status_code, 500);
        assert!(response.body.starts_with("\"Error processing file doc: "));
        assert!(response.body.contains("2 write attempts"));
        assert_eq!(store.text("bucket", "count/count.txt"), None);
    }

    #[test]
    fn unconditional_mode_skips_preconditions() {
        let store = MemoryStore::new();
        store.seed_object("bucket", "doc", b"x");
        store.seed_object("bucket", "count/count.txt", b"earlier\n");
        let config = AggregatorConfig {
            conditional_writes: false,
            ..AggregatorConfig::default()
        };

        let response = aggregate_word_count("bucket", "doc", &config, recorded_at(), &store);

        assert_eq!(response.status_code, 200);
        assert_eq!(store.writes(), vec![WritePrecondition::Unconditional]);
        assert_eq!(
            store.text("bucket", "count/count.txt").as_deref(),
            Some("earlier\nFile: doc, Words: 1, Time: 2026-04-01 08:15:00\n")
        );
    }

    #[test]
    fn missing_source_object_is_an_error() {
        let store = MemoryStore::new();

        let response = aggregate_word_count(
            "bucket",
            "gone.txt",
            &AggregatorConfig::default(),
            recorded_at(),
            &store,
        );

        assert_eq!(response.status_code, 500);
        assert!(response
            .body
            .starts_with("\"Error processing file gone.txt: could not download object"));
        assert!(store.writes().is_empty());
    }

    #[test]
    fn binary_object_is_a_decode_error() {
        let store = MemoryStore::new();
        store.seed_object("bucket", "blob.bin", &[0xff, 0xfe, 0x00]);

        let response = aggregate_word_count(
            "bucket",
            "blob.bin",
            &AggregatorConfig::default(),
            recorded_at(),
            &store,
        );

        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("not valid UTF-8"));
        assert!(store.writes().is_empty());
    }

    #[test]
    fn aggregate_read_failure_other_than_missing_is_fatal() {
        let mut store = MemoryStore::new();
        store.seed_object("bucket", "doc", b"words here");
        store.failing_reads = vec!["count/count.txt".to_string()];

        let response = aggregate_word_count(
            "bucket",
            "doc",
            &AggregatorConfig::default(),
            recorded_at(),
            &store,
        );

        assert_eq!(response.status_code, 500);
        assert!(response.body.contains("could not read aggregate"));
        assert!(store.writes().is_empty());
    }

    #[test]
    fn malformed_event_reports_unknown_key() {
        let store = MemoryStore::new();

        let response = handle_object_created(
            &json!({"Records": []}),
            &AggregatorConfig::default(),
            recorded_at(),
            &store,
        );

        assert_eq!(response.status_code, 500);
        assert!(response.body.starts_with("\"Error processing file <unknown>: "));
    }
}
