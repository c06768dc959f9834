//! Conversation-log archival.
//!
//! The log subscription delivers batches as base64-encoded gzip JSON. Each log
//! event in a batch becomes one object in blob storage; there is no other logic.

use std::io::Read;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::errors::ApplicationError;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Upper bound on a decompressed batch. Subscription batches are far smaller.
pub const MAX_DECODED_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("log payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("log payload could not be decompressed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("log payload expands beyond {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("log payload is not a valid log batch: {0}")]
    Json(#[from] serde_json::Error),
    #[error("object key `{key}` is not allowed: {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("blob write for `{key}` failed: {message}")]
    Write { key: String, message: String },
}

impl From<ArchiveError> for ApplicationError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value.to_string())
    }
}

/// Subscription envelope as delivered to the archiver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSubscriptionEvent {
    pub awslogs: LogSubscriptionData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSubscriptionData {
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBatch {
    #[serde(default)]
    pub log_group: String,
    #[serde(default)]
    pub log_stream: String,
    #[serde(default)]
    pub log_events: Vec<LogEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: String,
    pub timestamp: i64,
    pub message: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str)
        -> Result<(), ArchiveError>;
}

pub fn decode_batch(data: &str) -> Result<LogBatch, ArchiveError> {
    decode_batch_within(data, MAX_DECODED_BYTES)
}

/// Decodes a batch, refusing to inflate more than `limit` bytes.
pub fn decode_batch_within(data: &str, limit: u64) -> Result<LogBatch, ArchiveError> {
    let compressed = STANDARD.decode(data.trim())?;
    let mut decompressed = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .take(limit.saturating_add(1))
        .read_to_end(&mut decompressed)
        .map_err(ArchiveError::Decompress)?;
    if decompressed.len() as u64 > limit {
        return Err(ArchiveError::TooLarge { limit });
    }
    Ok(serde_json::from_slice(&decompressed)?)
}

pub fn object_key(prefix: &str, event: &LogEvent) -> String {
    format!("{prefix}log_{}_{}.json", event.id, event.timestamp)
}

pub struct LogArchiver<B> {
    store: B,
    prefix: String,
    max_decoded_bytes: u64,
}

impl<B> LogArchiver<B>
where
    B: BlobStore,
{
    pub fn new(store: B, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into(), max_decoded_bytes: MAX_DECODED_BYTES }
    }

    pub fn with_max_decoded_bytes(mut self, limit: u64) -> Self {
        self.max_decoded_bytes = limit;
        self
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    /// Writes every event of the batch in order and returns the keys written.
    /// Stops at the first failed write.
    pub async fn archive(&self, event: &LogSubscriptionEvent) -> Result<Vec<String>, ArchiveError> {
        let batch = decode_batch_within(&event.awslogs.data, self.max_decoded_bytes)?;
        let mut keys = Vec::with_capacity(batch.log_events.len());

        for log_event in &batch.log_events {
            let key = object_key(&self.prefix, log_event);
            let body = serde_json::to_vec(&log_event.message)?;
            self.store.put_object(&key, body, JSON_CONTENT_TYPE).await?;
            info!(
                event_name = "archive.log_event.stored",
                log_group = %batch.log_group,
                key = %key,
                "stored log event"
            );
            keys.push(key);
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use flate2::{write::GzEncoder, Compression};
    use serde_json::json;

    use super::{
        decode_batch, decode_batch_within, object_key, ArchiveError, BlobStore, LogArchiver,
        LogEvent, LogSubscriptionData, LogSubscriptionEvent,
    };

    #[derive(Default)]
    struct MemoryBlobs {
        objects: Mutex<Vec<(String, Vec<u8>, String)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobs {
        async fn put_object(
            &self,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> Result<(), ArchiveError> {
            if self.fail_on.as_deref() == Some(key) {
                return Err(ArchiveError::Write {
                    key: key.to_string(),
                    message: "access denied".to_string(),
                });
            }
            self.objects.lock().expect("lock").push((
                key.to_string(),
                body,
                content_type.to_string(),
            ));
            Ok(())
        }
    }

    fn encode(value: serde_json::Value) -> String {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(value.to_string().as_bytes()).expect("gzip write");
        STANDARD.encode(encoder.finish().expect("gzip finish"))
    }

    fn subscription(value: serde_json::Value) -> LogSubscriptionEvent {
        LogSubscriptionEvent { awslogs: LogSubscriptionData { data: encode(value) } }
    }

    fn two_events() -> serde_json::Value {
        json!({
            "logGroup": "/aws/lex/brickbot",
            "logStream": "stream-1",
            "logEvents": [
                { "id": "e1", "timestamp": 1700000000000_i64, "message": "{\"turn\":1}" },
                { "id": "e2", "timestamp": 1700000000500_i64, "message": "plain line" }
            ]
        })
    }

    #[test]
    fn decode_round_trips_compressed_batch() {
        let batch = decode_batch(&encode(two_events())).expect("decode");

        assert_eq!(batch.log_group, "/aws/lex/brickbot");
        assert_eq!(batch.log_events.len(), 2);
        assert_eq!(batch.log_events[1].message, "plain line");
    }

    #[test]
    fn decode_rejects_bad_base64_and_non_gzip() {
        assert!(matches!(decode_batch("not base64!!"), Err(ArchiveError::Base64(_))));
        let plain = STANDARD.encode(b"{\"logEvents\":[]}");
        assert!(matches!(decode_batch(&plain), Err(ArchiveError::Decompress(_))));
    }

    #[test]
    fn decode_refuses_batches_that_inflate_past_the_limit() {
        let padding = "x".repeat(64 * 1024);
        let data = encode(json!({ "logGroup": padding, "logEvents": [] }));
        assert!(data.len() < 4 * 1024);

        let error = decode_batch_within(&data, 16 * 1024).expect_err("too large");

        assert!(matches!(error, ArchiveError::TooLarge { limit: 16384 }));
        assert!(decode_batch_within(&data, 128 * 1024).is_ok());
    }

    #[tokio::test]
    async fn oversized_batch_writes_nothing() {
        let archiver = LogArchiver::new(MemoryBlobs::default(), "").with_max_decoded_bytes(64);

        let error = archiver.archive(&subscription(two_events())).await.expect_err("too large");

        assert!(matches!(error, ArchiveError::TooLarge { limit: 64 }));
        assert!(archiver.store().objects.lock().expect("lock").is_empty());
    }

    #[test]
    fn object_key_uses_prefix_id_and_timestamp() {
        let event = LogEvent { id: "abc".to_string(), timestamp: 42, message: String::new() };
        assert_eq!(object_key("lex-logs/", &event), "lex-logs/log_abc_42.json");
        assert_eq!(object_key("", &event), "log_abc_42.json");
    }

    #[tokio::test]
    async fn archive_writes_one_json_object_per_event() {
        let archiver = LogArchiver::new(MemoryBlobs::default(), "logs/");

        let keys = archiver.archive(&subscription(two_events())).await.expect("archive");

        assert_eq!(keys, vec!["logs/log_e1_1700000000000.json", "logs/log_e2_1700000000500.json"]);
        let objects = archiver.store().objects.lock().expect("lock").clone();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].1, b"\"plain line\"".to_vec());
        assert_eq!(objects[0].2, "application/json");
    }

    #[tokio::test]
    async fn archive_stops_at_first_failed_write() {
        let store = MemoryBlobs {
            fail_on: Some("log_e1_1700000000000.json".to_string()),
            ..MemoryBlobs::default()
        };
        let archiver = LogArchiver::new(store, "");

        let error = archiver.archive(&subscription(two_events())).await.expect_err("write fails");

        assert!(matches!(error, ArchiveError::Write { .. }));
        assert!(archiver.store().objects.lock().expect("lock").is_empty());
    }
}
