use chrono::NaiveDateTime;
use serde_json::Value;
use thiserror::Error;

pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The bucket and decoded key named by an object-created notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectCreated {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("object-created event must include a non-empty Records array")]
    MissingRecord,
    #[error("object-created record is missing {0}")]
    MissingField(&'static str),
    #[error("object key {raw:?} is not valid percent-encoded UTF-8")]
    InvalidKeyEncoding { raw: String },
}

impl ObjectCreated {
    /// Reads the first record of an S3 notification. Keys arrive
    /// form-encoded (`+` for space, `%XX` escapes) and are decoded here.
    pub fn from_s3_event(event: &Value) -> Result<Self, EventError> {
        let record = event
            .get("Records")
            .and_then(Value::as_array)
            .and_then(|records| records.first())
            .ok_or(EventError::MissingRecord)?;
        let entity = record.get("s3").ok_or(EventError::MissingField("s3"))?;

        let bucket = entity
            .pointer("/bucket/name")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("s3.bucket.name"))?;
        let raw_key = entity
            .pointer("/object/key")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("s3.object.key"))?;

        Ok(Self {
            bucket: bucket.to_string(),
            key: decode_object_key(raw_key)?,
        })
    }

    /// Raw key for error reporting when the event could not be decoded.
    pub fn raw_key(event: &Value) -> Option<&str> {
        event
            .pointer("/Records/0/s3/object/key")
            .and_then(Value::as_str)
    }
}

pub fn decode_object_key(raw: &str) -> Result<String, EventError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| EventError::InvalidKeyEncoding {
            raw: raw.to_string(),
        })
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn format_record(key: &str, word_count: usize, recorded_at: NaiveDateTime) -> String {
    format!(
        "File: {key}, Words: {word_count}, Time: {}\n",
        recorded_at.format(RECORD_TIME_FORMAT)
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    #[test]
    fn counts_whitespace_delimited_tokens() {
        assert_eq!(count_words("a b  c\n"), 3);
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words(" \t\n "), 0);
        assert_eq!(count_words("  leading and trailing  "), 3);
    }

    #[test]
    fn formats_record_line() {
        let recorded_at = NaiveDate::from_ymd_opt(2026, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 5))
            .expect("valid fixture time");
        assert_eq!(
            format_record("uploads/a.txt", 12, recorded_at),
            "File: uploads/a.txt, Words: 12, Time: 2026-01-02 03:04:05\n"
        );
    }

    #[test]
    fn decodes_form_encoded_keys() {
        assert_eq!(
            decode_object_key("reports/q1+summary%282%29.txt").expect("key should decode"),
            "reports/q1 summary(2).txt"
        );
        assert_eq!(
            decode_object_key("caf%C3%A9.txt").expect("utf-8 key should decode"),
            "café.txt"
        );
        assert!(decode_object_key("bad%FF.txt").is_err());
    }

    #[test]
    fn reads_first_record_of_s3_event() {
        let event = json!({
            "Records": [{
                "eventSource": "aws:s3",
                "s3": {
                    "bucket": {"name": "ingest-bucket"},
                    "object": {"key": "incoming/my+file.txt", "size": 12}
                }
            }]
        });

        assert_eq!(
            ObjectCreated::from_s3_event(&event).expect("event should parse"),
            ObjectCreated {
                bucket: "ingest-bucket".to_string(),
                key: "incoming/my file.txt".to_string(),
            }
        );
    }

    #[test]
    fn rejects_events_without_records_or_fields() {
        assert_eq!(
            ObjectCreated::from_s3_event(&json!({"Records": []})),
            Err(EventError::MissingRecord)
        );
        assert_eq!(
            ObjectCreated::from_s3_event(&json!({"Records": [{"s3": {"object": {"key": "k"}}}]})),
            Err(EventError::MissingField("s3.bucket.name"))
        );
    }
}
