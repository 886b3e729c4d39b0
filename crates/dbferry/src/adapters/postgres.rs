//! PostgreSQL adapter: verify, streaming copy and archive export.
//!
//! The copy algorithm is a full destructive sync per table: enum type
//! definitions are migrated first (table columns may reference them), then
//! each table is dropped and recreated on the target and its rows streamed
//! in fixed-size batches using offset pagination and multi-row parameterized
//! INSERTs sized to stay under the 65 535 parameter ceiling.

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::Backend;
use crate::archive::ArchiveBuilder;
use crate::error::{FerryError, Result};
use crate::jobs::{JobContext, JobStats};

use super::{db_name_from_uri, insert_chunk_rows, percent, BATCH_SIZE, CONNECT_TIMEOUT, DbAdapter};

/// Dynamically typed PostgreSQL value for row passthrough.
///
/// Covers the column types the copy path reads back out of a `SELECT`;
/// anything else is reported as a per-table error and the table is skipped.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::I16(v) => v.to_sql(ty, out),
            PgValue::I32(v) => v.to_sql(ty, out),
            PgValue::I64(v) => v.to_sql(ty, out),
            PgValue::F32(v) => v.to_sql(ty, out),
            PgValue::F64(v) => v.to_sql(ty, out),
            PgValue::Decimal(v) => v.to_sql(ty, out),
            PgValue::Text(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Timestamp(v) => v.to_sql(ty, out),
            PgValue::TimestampTz(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl PgValue {
    /// Extract the value at `idx` from a row, using the wire type to pick
    /// the representation. Enum columns are cast to text in the SELECT list
    /// before they reach this point.
    fn from_row(row: &Row, idx: usize) -> Result<Self> {
        let ty = row.columns()[idx].type_();
        let name = row.columns()[idx].name().to_string();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx)?.map(PgValue::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(idx)?.map(PgValue::I16)
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)?.map(PgValue::I32)
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)?.map(PgValue::I64)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(idx)?.map(PgValue::F32)
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(idx)?.map(PgValue::F64)
        } else if *ty == Type::NUMERIC {
            row.try_get::<_, Option<Decimal>>(idx)?.map(PgValue::Decimal)
        } else if *ty == Type::TEXT
            || *ty == Type::VARCHAR
            || *ty == Type::BPCHAR
            || *ty == Type::NAME
            || *ty == Type::UNKNOWN
        {
            row.try_get::<_, Option<String>>(idx)?.map(PgValue::Text)
        } else if *ty == Type::BYTEA {
            row.try_get::<_, Option<Vec<u8>>>(idx)?.map(PgValue::Bytes)
        } else if *ty == Type::UUID {
            row.try_get::<_, Option<Uuid>>(idx)?.map(PgValue::Uuid)
        } else if *ty == Type::TIMESTAMP {
            row.try_get::<_, Option<NaiveDateTime>>(idx)?
                .map(PgValue::Timestamp)
        } else if *ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<DateTime<Utc>>>(idx)?
                .map(PgValue::TimestampTz)
        } else if *ty == Type::DATE {
            row.try_get::<_, Option<NaiveDate>>(idx)?.map(PgValue::Date)
        } else if *ty == Type::TIME {
            row.try_get::<_, Option<NaiveTime>>(idx)?.map(PgValue::Time)
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            row.try_get::<_, Option<serde_json::Value>>(idx)?
                .map(PgValue::Json)
        } else {
            return Err(FerryError::unit(
                name,
                format!("unsupported column type '{}'", ty.name()),
            ));
        };
        Ok(value.unwrap_or(PgValue::Null))
    }

    /// JSON representation used by the export path.
    fn to_json(&self) -> serde_json::Value {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        use serde_json::{json, Value};
        match self {
            PgValue::Null => Value::Null,
            PgValue::Bool(v) => json!(v),
            PgValue::I16(v) => json!(v),
            PgValue::I32(v) => json!(v),
            PgValue::I64(v) => json!(v),
            PgValue::F32(v) => json!(v),
            PgValue::F64(v) => json!(v),
            PgValue::Decimal(v) => json!(v.to_string()),
            PgValue::Text(v) => json!(v),
            PgValue::Bytes(v) => json!(STANDARD.encode(v)),
            PgValue::Uuid(v) => json!(v.to_string()),
            PgValue::Timestamp(v) => json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            PgValue::TimestampTz(v) => json!(v.to_rfc3339()),
            PgValue::Date(v) => json!(v.to_string()),
            PgValue::Time(v) => json!(v.to_string()),
            PgValue::Json(v) => v.clone(),
        }
    }
}

/// Column metadata introspected from `information_schema.columns`.
#[derive(Debug, Clone)]
struct PgColumn {
    name: String,
    udt_name: String,
    max_length: i32,
    precision: i32,
    scale: i32,
    is_nullable: bool,
    default: Option<String>,
    is_enum: bool,
}

impl PgColumn {
    /// Render this column's definition for CREATE TABLE on the target.
    fn render_ddl(&self) -> String {
        let mut def = format!("{} ", quote_ident(&self.name));
        match self.udt_name.as_str() {
            "varchar" => {
                if self.max_length > 0 {
                    def.push_str(&format!("VARCHAR({})", self.max_length));
                } else {
                    def.push_str("VARCHAR");
                }
            }
            "bpchar" => def.push_str(&format!("CHAR({})", self.max_length.max(1))),
            "numeric" => {
                if self.precision > 0 && self.scale > 0 {
                    def.push_str(&format!("NUMERIC({},{})", self.precision, self.scale));
                } else if self.precision > 0 {
                    def.push_str(&format!("NUMERIC({})", self.precision));
                } else {
                    def.push_str("NUMERIC");
                }
            }
            _ if self.is_enum => def.push_str(&quote_ident(&self.udt_name)),
            other => def.push_str(&other.to_uppercase()),
        }
        if !self.is_nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            def.push_str(&format!(" DEFAULT {default}"));
        }
        def
    }
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape a string literal for embedding in DDL.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// SELECT column list with enum columns cast to text so the copy path can
/// read them with a plain string decoder.
fn select_list(columns: &[PgColumn]) -> String {
    columns
        .iter()
        .map(|c| {
            if c.is_enum {
                format!("{}::text", quote_ident(&c.name))
            } else {
                quote_ident(&c.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// PostgreSQL adapter.
pub struct PostgresAdapter;

impl PostgresAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Connect and spawn the connection driver task.
    async fn connect(uri: &str, context: &str) -> Result<Client> {
        let config: tokio_postgres::Config = uri
            .parse()
            .map_err(|e| FerryError::connection(context, e))?;
        Self::connect_config(&config, context).await
    }

    async fn connect_config(config: &tokio_postgres::Config, context: &str) -> Result<Client> {
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| FerryError::connection(context, e))?;
        let context = context.to_string();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("postgres connection closed ({context}): {e}");
            }
        });
        Ok(client)
    }

    /// Create the target database when it does not exist; "already exists"
    /// is success.
    async fn ensure_database(ctx: &JobContext, target_uri: &str, db_name: &str) -> Result<()> {
        let mut admin_config: tokio_postgres::Config = target_uri
            .parse()
            .map_err(|e| FerryError::connection("parsing target URI", e))?;
        admin_config.dbname("postgres");
        let admin = Self::connect_config(&admin_config, "connecting to target server").await?;

        let exists = admin
            .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])
            .await?
            .is_some();

        if exists {
            ctx.log(format!("Target database already exists: {db_name}"));
            return Ok(());
        }

        ctx.log(format!("Creating target database: {db_name}"));
        // Database names cannot be parameterized
        let sql = format!("CREATE DATABASE {}", quote_ident(db_name));
        match admin.execute(&sql, &[]).await {
            Ok(_) => {
                ctx.log(format!("Database created successfully: {db_name}"));
                Ok(())
            }
            Err(e) if e.to_string().contains("already exists") => {
                ctx.log(format!("Database already exists: {db_name}"));
                Ok(())
            }
            Err(e) => Err(FerryError::connection("creating target database", e)),
        }
    }

    /// Migrate enum type definitions before tables; table columns may
    /// reference them. Idempotent, and individual failures are non-fatal.
    async fn migrate_enum_types(ctx: &JobContext, source: &Client, target: &Client) -> Result<()> {
        ctx.log("Checking for custom types (ENUMs)...");
        let rows = source
            .query(
                r#"
                SELECT t.typname, array_agg(e.enumlabel ORDER BY e.enumsortorder)
                FROM pg_type t
                JOIN pg_enum e ON t.oid = e.enumtypid
                JOIN pg_namespace n ON n.oid = t.typnamespace
                WHERE n.nspname = 'public'
                GROUP BY t.typname
                "#,
                &[],
            )
            .await?;

        if rows.is_empty() {
            ctx.log("No custom types found.");
            return Ok(());
        }
        ctx.log(format!("Found {} custom types to migrate", rows.len()));

        for row in rows {
            let type_name: String = row.get(0);
            let labels: Vec<String> = row.get(1);

            let exists = target
                .query_opt(
                    r#"
                    SELECT 1 FROM pg_type t
                    JOIN pg_namespace n ON n.oid = t.typnamespace
                    WHERE t.typname = $1 AND n.nspname = 'public'
                    "#,
                    &[&type_name],
                )
                .await?
                .is_some();
            if exists {
                ctx.log(format!("Custom type already exists: {type_name}"));
                continue;
            }

            let labels_sql = labels
                .iter()
                .map(|l| format!("'{}'", escape_literal(l)))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "CREATE TYPE {} AS ENUM ({})",
                quote_ident(&type_name),
                labels_sql
            );
            match target.execute(&sql, &[]).await {
                Ok(_) => ctx.log(format!("Created custom type: {type_name}")),
                Err(e) if e.to_string().contains("already exists") => {
                    ctx.log(format!("Custom type already exists: {type_name}"));
                }
                Err(e) => {
                    ctx.log(format!(
                        "Warning: Could not create custom type {type_name}: {e}"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Enumerate user tables in the source's public schema.
    async fn list_tables(client: &Client) -> Result<Vec<String>> {
        let rows = client
            .query(
                r#"
                SELECT table_name
                FROM information_schema.tables
                WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
                ORDER BY table_name
                "#,
                &[],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn load_columns(client: &Client, table: &str) -> Result<Vec<PgColumn>> {
        let rows = client
            .query(
                r#"
                SELECT
                    column_name,
                    udt_name,
                    data_type,
                    COALESCE(character_maximum_length, 0)::int4,
                    COALESCE(numeric_precision, 0)::int4,
                    COALESCE(numeric_scale, 0)::int4,
                    CASE WHEN is_nullable = 'YES' THEN true ELSE false END,
                    column_default
                FROM information_schema.columns
                WHERE table_schema = 'public' AND table_name = $1
                ORDER BY ordinal_position
                "#,
                &[&table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let data_type: String = row.get(2);
                PgColumn {
                    name: row.get(0),
                    udt_name: row.get(1),
                    is_enum: data_type == "USER-DEFINED",
                    max_length: row.get(3),
                    precision: row.get(4),
                    scale: row.get(5),
                    is_nullable: row.get(6),
                    default: row.get(7),
                }
            })
            .collect())
    }

    /// Drop-and-recreate the table on the target, then stream rows across
    /// in batches. Returns the number of rows copied.
    async fn copy_table(
        ctx: &JobContext,
        source: &Client,
        target: &Client,
        table: &str,
        units_done: usize,
        records_before: u64,
    ) -> Result<u64> {
        let columns = Self::load_columns(source, table).await?;
        if columns.is_empty() {
            return Err(FerryError::unit(table, "no columns found"));
        }

        target
            .execute(
                &format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(table)),
                &[],
            )
            .await?;

        let col_defs: Vec<String> = columns.iter().map(|c| c.render_ddl()).collect();
        let create_sql = format!(
            "CREATE TABLE {} ({})",
            quote_ident(table),
            col_defs.join(", ")
        );
        target.execute(&create_sql, &[]).await?;
        ctx.log(format!("Created table structure: {table}"));

        let col_names = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let select_sql = format!(
            "SELECT {} FROM {} LIMIT $1 OFFSET $2",
            select_list(&columns),
            quote_ident(table)
        );
        let chunk_rows = insert_chunk_rows(columns.len());

        let mut offset: i64 = 0;
        let mut table_rows: u64 = 0;
        loop {
            let rows = source
                .query(&select_sql, &[&(BATCH_SIZE as i64), &offset])
                .await?;
            if rows.is_empty() {
                break;
            }
            let fetched = rows.len();

            let mut values: Vec<Vec<PgValue>> = Vec::with_capacity(fetched);
            for row in &rows {
                let mut record = Vec::with_capacity(columns.len());
                for idx in 0..columns.len() {
                    record.push(PgValue::from_row(row, idx)?);
                }
                values.push(record);
            }

            for chunk in values.chunks(chunk_rows) {
                let mut placeholders = Vec::with_capacity(chunk.len());
                let mut param_idx = 1;
                for _ in chunk {
                    let row_ph: Vec<String> = (0..columns.len())
                        .map(|_| {
                            let ph = format!("${param_idx}");
                            param_idx += 1;
                            ph
                        })
                        .collect();
                    placeholders.push(format!("({})", row_ph.join(", ")));
                }
                let insert_sql = format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    quote_ident(table),
                    col_names,
                    placeholders.join(", ")
                );
                let params: Vec<&(dyn ToSql + Sync)> = chunk
                    .iter()
                    .flat_map(|r| r.iter().map(|v| v as &(dyn ToSql + Sync)))
                    .collect();
                match target.execute(&insert_sql, &params).await {
                    Ok(_) => {}
                    Err(e) if e.to_string().contains("duplicate key") => {
                        ctx.log(format!("Skipping duplicate rows in {table}: {e}"));
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            table_rows += fetched as u64;
            offset += BATCH_SIZE as i64;
            ctx.stats(JobStats::new(
                units_done as u64,
                records_before + table_rows,
            ));
            if fetched < BATCH_SIZE {
                break;
            }
        }
        ctx.log(format!("Copied {table_rows} rows from table: {table}"));

        Self::copy_indexes(ctx, source, target, table).await;
        Ok(table_rows)
    }

    /// Recreate non-primary-key indexes; conflicts are logged, never fatal.
    async fn copy_indexes(ctx: &JobContext, source: &Client, target: &Client, table: &str) {
        let rows = match source
            .query(
                "SELECT indexname, indexdef FROM pg_indexes \
                 WHERE schemaname = 'public' AND tablename = $1",
                &[&table],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("failed to list indexes for {table}: {e}");
                return;
            }
        };

        for row in rows {
            let name: String = row.get(0);
            let def: String = row.get(1);
            if def.contains("PRIMARY KEY") {
                continue;
            }
            match target.execute(&def, &[]).await {
                Ok(_) => ctx.log(format!("Created index: {name}")),
                Err(e) => warn!("failed to create index {name}: {e}"),
            }
        }
    }
}

impl Default for PostgresAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DbAdapter for PostgresAdapter {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn verify_connection(&self, uri: &str) -> bool {
        let probe = async {
            let client = Self::connect(uri, "verifying connection").await?;
            client.simple_query("SELECT 1").await?;
            Ok::<_, FerryError>(())
        };
        match tokio::time::timeout(CONNECT_TIMEOUT, probe).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("postgres verification failed: {e}");
                false
            }
            Err(_) => {
                debug!("postgres verification timed out");
                false
            }
        }
    }

    async fn run_copy(&self, ctx: &JobContext, source_uri: &str, target_uri: &str) -> Result<()> {
        ctx.running();
        ctx.log("Starting PostgreSQL migration...");

        ctx.log("Connecting to source database...");
        let source = Self::connect(source_uri, "connecting to source").await?;
        ctx.log("Connected to source.");

        if let Some(db_name) = db_name_from_uri(target_uri) {
            ctx.log(format!("Checking if target database exists: {db_name}"));
            Self::ensure_database(ctx, target_uri, &db_name).await?;
        }

        ctx.log("Connecting to target database...");
        let target = Self::connect(target_uri, "connecting to target").await?;
        ctx.log("Connected to target.");

        Self::migrate_enum_types(ctx, &source, &target).await?;

        let tables = Self::list_tables(&source).await?;
        if tables.is_empty() {
            ctx.log("No tables found in source database.");
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
            match Self::copy_table(ctx, &source, &target, table, processed, records).await {
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
        let source = Self::connect(source_uri, "connecting to source").await?;
        let tables = Self::list_tables(&source).await?;
        let total = tables.len();

        let mut exported: u64 = 0;
        for (done, table) in tables.iter().enumerate() {
            let columns = Self::load_columns(&source, table).await?;
            let select_sql = format!(
                "SELECT {} FROM {}",
                select_list(&columns),
                quote_ident(table)
            );
            let rows = source.query(&select_sql, &[]).await?;

            // Materialized per table; exports are smaller-scope than copies
            let mut records = Vec::with_capacity(rows.len());
            for row in &rows {
                let mut object = serde_json::Map::with_capacity(columns.len());
                for (idx, col) in columns.iter().enumerate() {
                    object.insert(col.name.clone(), PgValue::from_row(row, idx)?.to_json());
                }
                records.push(serde_json::Value::Object(object));
            }
            exported += records.len() as u64;
            let payload = serde_json::to_vec(&records)?;
            archive.append(&format!("{table}.json"), &payload).await?;

            ctx.stats(JobStats::new((done + 1) as u64, exported));
            ctx.progress(percent(done + 1, total));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, udt: &str) -> PgColumn {
        PgColumn {
            name: name.to_string(),
            udt_name: udt.to_string(),
            max_length: 0,
            precision: 0,
            scale: 0,
            is_nullable: true,
            default: None,
            is_enum: false,
        }
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_render_ddl_sized_types() {
        let mut varchar = column("name", "varchar");
        varchar.max_length = 100;
        varchar.is_nullable = false;
        assert_eq!(varchar.render_ddl(), "\"name\" VARCHAR(100) NOT NULL");

        let mut numeric = column("price", "numeric");
        numeric.precision = 10;
        numeric.scale = 2;
        assert_eq!(numeric.render_ddl(), "\"price\" NUMERIC(10,2)");

        let mut ts = column("created_at", "timestamptz");
        ts.default = Some("now()".to_string());
        assert_eq!(ts.render_ddl(), "\"created_at\" TIMESTAMPTZ DEFAULT now()");
    }

    #[test]
    fn test_render_ddl_enum_uses_quoted_type_name() {
        let mut status = column("status", "order_status");
        status.is_enum = true;
        assert_eq!(status.render_ddl(), "\"status\" \"order_status\"");
    }

    #[test]
    fn test_select_list_casts_enums_to_text() {
        let mut status = column("status", "order_status");
        status.is_enum = true;
        let cols = vec![column("id", "int4"), status];
        assert_eq!(select_list(&cols), "\"id\", \"status\"::text");
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("it's"), "it''s");
    }

    #[test]
    fn test_pg_value_json_shapes() {
        assert_eq!(PgValue::Null.to_json(), serde_json::Value::Null);
        assert_eq!(PgValue::I64(7).to_json(), serde_json::json!(7));
        assert_eq!(
            PgValue::Decimal("12.50".parse().unwrap()).to_json(),
            serde_json::json!("12.50")
        );
        assert_eq!(
            PgValue::Bytes(vec![1, 2, 3]).to_json(),
            serde_json::json!("AQID")
        );
    }
}
