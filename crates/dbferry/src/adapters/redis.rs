//! Redis adapter: verify, keyspace copy and archive export.
//!
//! Keys are moved with DUMP/RESTORE so every value type, encoding and TTL
//! survives without per-type handling. The keyspace is walked with cursor
//! SCAN pages; because SCAN's count is a hint and DBSIZE is a point-in-time
//! estimate, reported progress is capped below completion until the cursor
//! actually closes.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{cmd, pipe, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::Backend;
use crate::archive::ArchiveBuilder;
use crate::error::{FerryError, Result};
use crate::jobs::{JobContext, JobStats};

use super::{percent, CONNECT_TIMEOUT, SCAN_COUNT, DbAdapter};

/// Progress ceiling while the scan cursor is still open.
const SCAN_PROGRESS_CAP: f64 = 99.0;

/// One exported key, serialized as a line of the archive's jsonl entry.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRecord {
    pub key: String,
    /// Base64 of the serialized value returned by DUMP.
    pub value: String,
    /// Remaining TTL in milliseconds, -1 when the key never expires.
    pub ttl: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A scanned key with its dump payload, TTL and value type.
struct DumpedKey {
    key: Vec<u8>,
    payload: Vec<u8>,
    ttl: i64,
    kind: String,
}

/// Pair up a page of keys with the interleaved DUMP/PTTL/TYPE replies of
/// its pipeline. Keys that vanished between SCAN and DUMP come back nil
/// and are dropped.
fn collect_dumped(keys: &[Vec<u8>], results: &[Value]) -> Vec<DumpedKey> {
    let mut dumped = Vec::with_capacity(keys.len());
    for (key, replies) in keys.iter().zip(results.chunks(3)) {
        let payload = match replies.first() {
            Some(Value::Data(bytes)) => bytes.clone(),
            _ => continue,
        };
        let ttl = match replies.get(1) {
            Some(Value::Int(ms)) => *ms,
            _ => -1,
        };
        let kind = match replies.get(2) {
            Some(Value::Status(s)) => s.clone(),
            Some(Value::Data(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        };
        dumped.push(DumpedKey {
            key: key.clone(),
            payload,
            ttl,
            kind,
        });
    }
    dumped
}

/// Redis adapter.
pub struct RedisAdapter;

impl RedisAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn connect(uri: &str, context: &str) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(uri).map_err(|e| FerryError::connection(context, e))?;
        client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| FerryError::connection(context, e))
    }

    /// One SCAN page: next cursor plus the keys it yielded.
    async fn scan_page(
        conn: &mut MultiplexedConnection,
        cursor: u64,
    ) -> Result<(u64, Vec<Vec<u8>>)> {
        let (next, keys): (u64, Vec<Vec<u8>>) = cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg("*")
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(conn)
            .await?;
        Ok((next, keys))
    }

    /// DUMP, PTTL and TYPE for a page of keys in one pipelined round trip.
    async fn dump_page(
        conn: &mut MultiplexedConnection,
        keys: &[Vec<u8>],
    ) -> Result<Vec<DumpedKey>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipeline = pipe();
        for key in keys {
            pipeline.cmd("DUMP").arg(key);
            pipeline.cmd("PTTL").arg(key);
            pipeline.cmd("TYPE").arg(key);
        }
        let results: Vec<Value> = pipeline.query_async(conn).await?;
        Ok(collect_dumped(keys, &results))
    }

    /// RESTORE REPLACE one key on the target. PTTL's negative sentinels map
    /// to a zero (persistent) TTL.
    async fn restore_key(conn: &mut MultiplexedConnection, dumped: &DumpedKey) -> Result<()> {
        let ttl = dumped.ttl.max(0);
        cmd("RESTORE")
            .arg(&dumped.key)
            .arg(ttl)
            .arg(&dumped.payload)
            .arg("REPLACE")
            .query_async::<_, ()>(conn)
            .await?;
        Ok(())
    }

    /// Restore a page in one pipelined round trip; if the pipeline fails,
    /// retry key by key so one bad key only skips itself.
    async fn restore_page(
        ctx: &JobContext,
        conn: &mut MultiplexedConnection,
        dumped: &[DumpedKey],
    ) -> u64 {
        if dumped.is_empty() {
            return 0;
        }
        let mut pipeline = pipe();
        for key in dumped {
            pipeline
                .cmd("RESTORE")
                .arg(&key.key)
                .arg(key.ttl.max(0))
                .arg(&key.payload)
                .arg("REPLACE");
        }
        if pipeline.query_async::<_, ()>(conn).await.is_ok() {
            return dumped.len() as u64;
        }

        let mut restored = 0;
        for key in dumped {
            match Self::restore_key(conn, key).await {
                Ok(()) => restored += 1,
                Err(e) => {
                    ctx.log(format!(
                        "Error restoring key {}: {e}",
                        String::from_utf8_lossy(&key.key)
                    ));
                }
            }
        }
        restored
    }
}

impl Default for RedisAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DbAdapter for RedisAdapter {
    fn backend(&self) -> Backend {
        Backend::Redis
    }

    async fn verify_connection(&self, uri: &str) -> bool {
        let probe = async {
            let mut conn = Self::connect(uri, "verifying connection").await?;
            cmd("PING").query_async::<_, String>(&mut conn).await?;
            Ok::<_, FerryError>(())
        };
        match tokio::time::timeout(CONNECT_TIMEOUT, probe).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("redis verification failed: {e}");
                false
            }
            Err(_) => {
                debug!("redis verification timed out");
                false
            }
        }
    }

    async fn run_copy(&self, ctx: &JobContext, source_uri: &str, target_uri: &str) -> Result<()> {
        ctx.running();
        ctx.log("Starting Redis migration...");

        ctx.log("Connecting to source database...");
        let mut source = Self::connect(source_uri, "connecting to source").await?;
        ctx.log("Connecting to target database...");
        let mut target = Self::connect(target_uri, "connecting to target").await?;
        ctx.log("Connected to both databases.");

        let total_keys: u64 = cmd("DBSIZE").query_async(&mut source).await?;
        ctx.log(format!("Found {total_keys} keys to migrate"));
        if total_keys == 0 {
            ctx.log("Source keyspace is empty.");
            ctx.complete();
            return Ok(());
        }

        let mut cursor: u64 = 0;
        let mut pages: u64 = 0;
        let mut restored: u64 = 0;
        loop {
            let (next, keys) = Self::scan_page(&mut source, cursor).await?;
            let dumped = Self::dump_page(&mut source, &keys).await?;
            restored += Self::restore_page(ctx, &mut target, &dumped).await;
            pages += 1;
            cursor = next;

            // DBSIZE is an estimate; never report done while the cursor is
            // still open.
            let pct = percent(restored as usize, total_keys as usize).min(SCAN_PROGRESS_CAP);
            ctx.progress(pct);
            ctx.stats(JobStats::new(pages, restored).with_total(total_keys));

            if cursor == 0 {
                break;
            }
        }

        ctx.progress(100.0);
        ctx.log(format!("Migrated {restored} keys."));
        ctx.log("Migration completed successfully!");
        ctx.complete();
        Ok(())
    }

    async fn run_export(
        &self,
        ctx: &JobContext,
        source_uri: &str,
        archive: &mut ArchiveBuilder,
    ) -> Result<()> {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        ctx.running();
        let mut source = Self::connect(source_uri, "connecting to source").await?;
        let total_keys: u64 = cmd("DBSIZE").query_async(&mut source).await?;

        let mut entry = archive.start_entry("redis_dump.jsonl").await?;
        let mut cursor: u64 = 0;
        let mut pages: u64 = 0;
        let mut exported: u64 = 0;
        loop {
            let (next, keys) = Self::scan_page(&mut source, cursor).await?;
            let dumped = Self::dump_page(&mut source, &keys).await?;
            for key in &dumped {
                let record = KeyRecord {
                    key: String::from_utf8_lossy(&key.key).into_owned(),
                    value: STANDARD.encode(&key.payload),
                    ttl: key.ttl,
                    kind: key.kind.clone(),
                };
                let mut line = serde_json::to_vec(&record)?;
                line.push(b'\n');
                entry.write_all(&line).await?;
                exported += 1;
            }
            pages += 1;
            cursor = next;

            let pct = percent(exported as usize, total_keys as usize).min(SCAN_PROGRESS_CAP);
            ctx.progress(pct);
            ctx.stats(JobStats::new(pages, exported).with_total(total_keys));

            if cursor == 0 {
                break;
            }
        }
        entry.close().await?;
        ctx.progress(100.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_record_serializes_type_field() {
        let record = KeyRecord {
            key: "session:42".to_string(),
            value: "AAECAw==".to_string(),
            ttl: 30_000,
            kind: "string".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["key"], "session:42");
        assert_eq!(json["type"], "string");
        assert_eq!(json["ttl"], 30_000);

        let back: KeyRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_collect_dumped_parses_interleaved_replies() {
        let keys = vec![b"alive".to_vec(), b"gone".to_vec(), b"hash:1".to_vec()];
        let results = vec![
            // alive: payload, 30s ttl, string type
            Value::Data(vec![1, 2, 3]),
            Value::Int(30_000),
            Value::Status("string".to_string()),
            // gone: vanished between SCAN and DUMP
            Value::Nil,
            Value::Int(-2),
            Value::Status("none".to_string()),
            // hash:1: persistent
            Value::Data(vec![9]),
            Value::Int(-1),
            Value::Status("hash".to_string()),
        ];

        let dumped = collect_dumped(&keys, &results);
        assert_eq!(dumped.len(), 2);
        assert_eq!(dumped[0].key, b"alive");
        assert_eq!(dumped[0].payload, vec![1, 2, 3]);
        assert_eq!(dumped[0].ttl, 30_000);
        assert_eq!(dumped[0].kind, "string");
        assert_eq!(dumped[1].key, b"hash:1");
        assert_eq!(dumped[1].ttl, -1);
        assert_eq!(dumped[1].kind, "hash");
    }

    #[test]
    fn test_progress_capped_while_cursor_open() {
        // Even with more keys restored than the stale DBSIZE estimate,
        // the cap keeps the bar short of done.
        let pct = percent(150, 100).min(SCAN_PROGRESS_CAP);
        assert_eq!(pct, SCAN_PROGRESS_CAP);
        let pct = percent(50, 100).min(SCAN_PROGRESS_CAP);
        assert_eq!(pct, 50.0);
    }

    #[test]
    fn test_negative_ttl_becomes_persistent() {
        for sentinel in [-1i64, -2] {
            assert_eq!(sentinel.max(0), 0);
        }
        assert_eq!(45_000i64.max(0), 45_000);
    }
}
