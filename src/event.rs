//! Object-created event notifications.
//!
//! Parses the notification document delivered when a file lands in the
//! billing bucket:
//!
//! ```json
//! {
//!   "Records": [
//!     { "s3": { "bucket": { "name": "billing" }, "object": { "key": "jan+2023.csv" } } }
//!   ]
//! }
//! ```
//!
//! Object keys arrive form-URL-encoded; [`ObjectCreatedEvent::source`]
//! returns the decoded key.

use serde::Deserialize;

use crate::models::ObjectRef;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event contains no records")]
    NoRecords,

    #[error("object key is not valid percent-encoded UTF-8: {0}")]
    BadKey(String),
}

/// An object-created notification.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl ObjectCreatedEvent {
    pub fn from_json(json: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The object named by the first record, with its key decoded.
    pub fn source(&self) -> Result<ObjectRef, EventError> {
        let record = self.records.first().ok_or(EventError::NoRecords)?;
        if self.records.len() > 1 {
            tracing::warn!(
                records = self.records.len(),
                "event carries several records; only the first is processed"
            );
        }
        let key = decode_key(&record.s3.object.key)?;
        tracing::debug!(
            bucket = %record.s3.bucket.name,
            %key,
            event = record.event_name.as_deref().unwrap_or("unknown"),
            size = ?record.s3.object.size,
            "object-created notification"
        );
        Ok(ObjectRef::new(record.s3.bucket.name.clone(), key))
    }
}

/// Decode a form-URL-encoded object key (`+` is a space, `%XX` is a byte).
fn decode_key(raw: &str) -> Result<String, EventError> {
    let bad = || EventError::BadKey(raw.to_string());
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = raw
                    .get(i + 1..i + 3)
                    .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                    .ok_or_else(bad)?;
                out.push(u8::from_str_radix(hex, 16).map_err(|_| bad())?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).map_err(|_| bad())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "Records": [
            {
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "billing-bucket", "arn": "arn:aws:s3:::billing-bucket" },
                    "object": { "key": "uploads/jan+2023%281%29.csv", "size": 512 }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_notification() {
        let event = ObjectCreatedEvent::from_json(EVENT).unwrap();
        assert_eq!(event.records.len(), 1);
        assert_eq!(event.records[0].event_name.as_deref(), Some("ObjectCreated:Put"));
        assert_eq!(event.records[0].s3.object.size, Some(512));
        assert_eq!(
            event.source().unwrap(),
            ObjectRef::new("billing-bucket", "uploads/jan 2023(1).csv")
        );
    }

    #[test]
    fn test_event_name_and_size_are_optional() {
        let json = r#"{"Records":[{"s3":{"bucket":{"name":"b"},"object":{"key":"k.csv"}}}]}"#;
        let event = ObjectCreatedEvent::from_json(json).unwrap();
        assert_eq!(event.records[0].event_name, None);
        assert_eq!(event.records[0].s3.object.size, None);
        assert_eq!(event.source().unwrap(), ObjectRef::new("b", "k.csv"));
    }

    #[test]
    fn test_no_records() {
        let event = ObjectCreatedEvent::from_json(r#"{"Records": []}"#).unwrap();
        assert!(matches!(event.source(), Err(EventError::NoRecords)));
        let event = ObjectCreatedEvent::from_json("{}").unwrap();
        assert!(matches!(event.source(), Err(EventError::NoRecords)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ObjectCreatedEvent::from_json("not json"),
            Err(EventError::Json(_))
        ));
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("plain.csv").unwrap(), "plain.csv");
        assert_eq!(decode_key("caf%C3%A9.csv").unwrap(), "café.csv");
        assert!(matches!(decode_key("bad%2"), Err(EventError::BadKey(_))));
        assert!(matches!(decode_key("bad%zz"), Err(EventError::BadKey(_))));
        assert!(matches!(decode_key("%FF"), Err(EventError::BadKey(_))));
    }
}
