//! MySQL/MariaDB adapter: verify, streaming copy and archive export.
//!
//! Table structure is cloned verbatim with `SHOW CREATE TABLE`, so engine,
//! charset and index definitions carry over without reconstruction. Rows are
//! moved as opaque driver values; nothing is re-encoded in between.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Params, Row, Value};
use tracing::debug;

use crate::api::Backend;
use crate::archive::ArchiveBuilder;
use crate::error::{FerryError, Result};
use crate::jobs::{JobContext, JobStats};

use super::{db_name_from_uri, insert_chunk_rows, percent, BATCH_SIZE, CONNECT_TIMEOUT, DbAdapter};

/// Quote a MySQL identifier.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Archive payload for a table whose export failed.
fn error_entry(message: &str) -> serde_json::Value {
    serde_json::json!({ "error": format!("Failed to export: {message}") })
}

/// Archive payload marking a database with no tables.
fn empty_manifest() -> serde_json::Value {
    serde_json::json!({ "tables": [] })
}

/// JSON representation of a driver value, used by the export path.
///
/// Byte payloads that are valid UTF-8 render as strings (the text protocol
/// returns most column types this way); anything else is base64.
fn value_to_json(value: &Value) -> serde_json::Value {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;
    match value {
        Value::NULL => serde_json::Value::Null,
        Value::Int(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => json!(s),
            Err(_) => json!(STANDARD.encode(bytes)),
        },
        Value::Date(y, mo, d, h, mi, s, us) => {
            if *us > 0 {
                json!(format!(
                    "{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}.{us:06}"
                ))
            } else {
                json!(format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}"))
            }
        }
        Value::Time(neg, d, h, mi, s, us) => {
            let sign = if *neg { "-" } else { "" };
            let hours = u32::from(*h) + d * 24;
            if *us > 0 {
                json!(format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}"))
            } else {
                json!(format!("{sign}{hours:02}:{mi:02}:{s:02}"))
            }
        }
    }
}

/// MySQL adapter.
pub struct MysqlAdapter;

impl MysqlAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn connect(uri: &str, context: &str) -> Result<Conn> {
        let opts = Opts::from_url(uri).map_err(|e| FerryError::connection(context, e))?;
        Conn::new(opts)
            .await
            .map_err(|e| FerryError::connection(context, e))
    }

    /// Create the target database if missing, via a connection with no
    /// default schema.
    async fn ensure_database(ctx: &JobContext, target_uri: &str, db_name: &str) -> Result<()> {
        let opts = Opts::from_url(target_uri)
            .map_err(|e| FerryError::connection("parsing target URI", e))?;
        let admin_opts = OptsBuilder::from_opts(opts).db_name(None::<String>);
        let mut admin = Conn::new(admin_opts)
            .await
            .map_err(|e| FerryError::connection("connecting to target server", e))?;
        admin
            .query_drop(format!(
                "CREATE DATABASE IF NOT EXISTS {}",
                quote_ident(db_name)
            ))
            .await?;
        ctx.log(format!("Ensured target database exists: {db_name}"));
        admin.disconnect().await?;
        Ok(())
    }

    async fn list_tables(conn: &mut Conn) -> Result<Vec<String>> {
        let tables: Vec<String> = conn.query("SHOW TABLES").await?;
        Ok(tables)
    }

    async fn column_names(conn: &mut Conn, table: &str) -> Result<Vec<String>> {
        let rows: Vec<Row> = conn
            .query(format!("DESCRIBE {}", quote_ident(table)))
            .await?;
        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name: Option<String> = row.get(0);
            names.push(name.ok_or_else(|| FerryError::unit(table, "unreadable column name"))?);
        }
        Ok(names)
    }

    /// Recreate the table on the target from the source's own DDL, then
    /// stream rows across. Returns the number of rows copied.
    async fn copy_table(
        ctx: &JobContext,
        source: &mut Conn,
        target: &mut Conn,
        table: &str,
        units_done: usize,
        records_before: u64,
    ) -> Result<u64> {
        let ddl: Option<(String, String)> = source
            .query_first(format!("SHOW CREATE TABLE {}", quote_ident(table)))
            .await?;
        let (_, create_sql) =
            ddl.ok_or_else(|| FerryError::unit(table, "SHOW CREATE TABLE returned nothing"))?;

        target
            .query_drop(format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .await?;
        target.query_drop(create_sql).await?;
        ctx.log(format!("Created table structure: {table}"));

        let columns = Self::column_names(source, table).await?;
        if columns.is_empty() {
            return Err(FerryError::unit(table, "no columns found"));
        }
        let col_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let chunk_rows = insert_chunk_rows(columns.len());
        let select_sql = format!("SELECT * FROM {} LIMIT ? OFFSET ?", quote_ident(table));

        let mut offset: u64 = 0;
        let mut table_rows: u64 = 0;
        loop {
            let rows: Vec<Row> = source
                .exec(&select_sql, (BATCH_SIZE as u64, offset))
                .await?;
            if rows.is_empty() {
                break;
            }
            let fetched = rows.len();
            let values: Vec<Vec<Value>> = rows.into_iter().map(Row::unwrap).collect();

            for chunk in values.chunks(chunk_rows) {
                let row_ph = format!(
                    "({})",
                    vec!["?"; columns.len()].join(", ")
                );
                let placeholders = vec![row_ph; chunk.len()].join(", ");
                let insert_sql = format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    quote_ident(table),
                    col_list,
                    placeholders
                );
                let params: Vec<Value> = chunk.iter().flatten().cloned().collect();
                match target.exec_drop(&insert_sql, Params::Positional(params)).await {
                    Ok(()) => {}
                    Err(e) if e.to_string().contains("Duplicate entry") => {
                        ctx.log(format!("Skipping duplicate rows in {table}: {e}"));
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            table_rows += fetched as u64;
            offset += BATCH_SIZE as u64;
            ctx.stats(JobStats::new(
                units_done as u64,
                records_before + table_rows,
            ));
            if fetched < BATCH_SIZE {
                break;
            }
        }
        ctx.log(format!("Copied {table_rows} rows from table: {table}"));
        Ok(table_rows)
    }

    /// Read a whole table as JSON objects keyed by column name.
    async fn export_table(source: &mut Conn, table: &str) -> Result<Vec<serde_json::Value>> {
        let columns = Self::column_names(source, table).await?;
        let rows: Vec<Row> = source
            .query(format!("SELECT * FROM {}", quote_ident(table)))
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let values = row.unwrap();
            let mut object = serde_json::Map::with_capacity(columns.len());
            for (name, value) in columns.iter().zip(values.iter()) {
                object.insert(name.clone(), value_to_json(value));
            }
            out.push(serde_json::Value::Object(object));
        }
        Ok(out)
    }
}

impl Default for MysqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DbAdapter for MysqlAdapter {
    fn backend(&self) -> Backend {
        Backend::Mysql
    }

    async fn verify_connection(&self, uri: &str) -> bool {
        let probe = async {
            let mut conn = Self::connect(uri, "verifying connection").await?;
            conn.query_drop("SELECT 1").await?;
            conn.disconnect().await?;
            Ok::<_, FerryError>(())
        };
        match tokio::time::timeout(CONNECT_TIMEOUT, probe).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("mysql verification failed: {e}");
                false
            }
            Err(_) => {
                debug!("mysql verification timed out");
                false
            }
        }
    }

    async fn run_copy(&self, ctx: &JobContext, source_uri: &str, target_uri: &str) -> Result<()> {
        ctx.running();
        ctx.log("Starting MySQL migration...");

        if let Some(db_name) = db_name_from_uri(target_uri) {
            Self::ensure_database(ctx, target_uri, &db_name).await?;
        }

        ctx.log("Connecting to source database...");
        let mut source = Self::connect(source_uri, "connecting to source").await?;
        ctx.log("Connecting to target database...");
        let mut target = Self::connect(target_uri, "connecting to target").await?;
        ctx.log("Connected to both databases.");

        let tables = Self::list_tables(&mut source).await?;
        if tables.is_empty() {
            ctx.log("No tables found in source database.");
            source.disconnect().await?;
            target.disconnect().await?;
            ctx.complete();
            return Ok(());
        }
        ctx.log(format!(
            "Found {} tables to migrate: {}",
            tables.len(),
            tables.join(", ")
        ));

        let total = tables.len();
        let mut processed = 0usize;
        let mut records: u64 = 0;
        for table in &tables {
            ctx.log(format!("Processing table: {table}"));
            match Self::copy_table(ctx, &mut source, &mut target, table, processed, records).await {
                Ok(rows) => {
                    records += rows;
                    ctx.log(format!("Finished table: {table}"));
                }
                Err(e) => {
                    ctx.log(format!("Error processing table {table}: {e}"));
                }
            }
            processed += 1;
            ctx.progress(percent(processed, total));
            ctx.stats(JobStats::new(processed as u64, records));
        }

        source.disconnect().await?;
        target.disconnect().await?;
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
        ctx.running();
        let mut source = Self::connect(source_uri, "connecting to source").await?;
        let tables = Self::list_tables(&mut source).await?;
        let total = tables.len();

        if tables.is_empty() {
            let payload = serde_json::to_vec(&empty_manifest())?;
            archive.append("_manifest.json", &payload).await?;
        }

        let mut records: u64 = 0;
        for (done, table) in tables.iter().enumerate() {
            // One bad table costs its own entry, never the whole archive
            match Self::export_table(&mut source, table).await {
                Ok(out) => {
                    records += out.len() as u64;
                    let payload = serde_json::to_vec(&out)?;
                    archive.append(&format!("{table}.json"), &payload).await?;
                }
                Err(e) => {
                    ctx.log(format!("Error exporting table {table}: {e}"));
                    let payload = serde_json::to_vec(&error_entry(&e.to_string()))?;
                    archive
                        .append(&format!("{table}_ERROR.json"), &payload)
                        .await?;
                }
            }

            ctx.progress(percent(done + 1, total));
            ctx.stats(JobStats::new((done + 1) as u64, records));
        }
        source.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("orders"), "`orders`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_value_to_json_scalars() {
        assert_eq!(value_to_json(&Value::NULL), serde_json::Value::Null);
        assert_eq!(value_to_json(&Value::Int(-5)), serde_json::json!(-5));
        assert_eq!(
            value_to_json(&Value::Bytes(b"hello".to_vec())),
            serde_json::json!("hello")
        );
        // Invalid UTF-8 falls back to base64
        assert_eq!(
            value_to_json(&Value::Bytes(vec![0xff, 0xfe])),
            serde_json::json!("//4=")
        );
    }

    #[test]
    fn test_export_failure_entries() {
        let entry = error_entry("table is marked as crashed");
        assert_eq!(
            entry["error"],
            "Failed to export: table is marked as crashed"
        );

        let manifest = empty_manifest();
        assert_eq!(manifest, serde_json::json!({ "tables": [] }));
    }

    #[test]
    fn test_value_to_json_temporal() {
        assert_eq!(
            value_to_json(&Value::Date(2024, 3, 9, 14, 30, 0, 0)),
            serde_json::json!("2024-03-09 14:30:00")
        );
        assert_eq!(
            value_to_json(&Value::Time(false, 1, 2, 3, 4, 0)),
            serde_json::json!("26:03:04")
        );
    }
}
