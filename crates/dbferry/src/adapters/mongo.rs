//! MongoDB adapter: verify, streaming copy and archive export.
//!
//! The copy walks every database visible on the source (or just the one named
//! in the URI path), drops each target collection and re-inserts documents in
//! unordered batches so duplicate-key collisions skip individual documents
//! instead of aborting the batch.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, InsertManyOptions};
use mongodb::Client;
use tracing::debug;

use crate::api::Backend;
use crate::archive::ArchiveBuilder;
use crate::error::{FerryError, Result};
use crate::jobs::{JobContext, JobStats};

use super::{db_name_from_uri, percent, BATCH_SIZE, CONNECT_TIMEOUT, DbAdapter};

/// Server-side databases never copied or exported.
const SYSTEM_DATABASES: &[&str] = &["admin", "local", "config"];

/// MongoDB adapter.
pub struct MongoAdapter;

impl MongoAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn connect(uri: &str, context: &str) -> Result<Client> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| FerryError::connection(context, e))?;
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);
        Client::with_options(options).map_err(|e| FerryError::connection(context, e))
    }

    /// Databases to process: the one named in the URI path, or everything
    /// except the server-side system databases.
    async fn list_databases(client: &Client, uri: &str) -> Result<Vec<String>> {
        if let Some(name) = db_name_from_uri(uri) {
            return Ok(vec![name]);
        }
        let names = client.list_database_names(None, None).await?;
        Ok(names
            .into_iter()
            .filter(|n| !SYSTEM_DATABASES.contains(&n.as_str()))
            .collect())
    }

    async fn list_collections(client: &Client, db: &str) -> Result<Vec<String>> {
        let names = client.database(db).list_collection_names(None).await?;
        Ok(names
            .into_iter()
            .filter(|n| !n.starts_with("system."))
            .collect())
    }

    /// Insert a batch unordered; batches whose only failures are
    /// duplicate-key collisions are treated as partial success.
    async fn insert_batch(
        ctx: &JobContext,
        target: &mongodb::Collection<Document>,
        batch: &[Document],
        collection: &str,
    ) -> Result<u64> {
        let options = InsertManyOptions::builder().ordered(false).build();
        match target.insert_many(batch, options).await {
            Ok(result) => Ok(result.inserted_ids.len() as u64),
            Err(e) => match *e.kind {
                ErrorKind::BulkWrite(ref failure)
                    if failure
                        .write_errors
                        .as_ref()
                        .is_some_and(|errs| errs.iter().all(|w| w.code == 11000)) =>
                {
                    let dupes = failure.write_errors.as_ref().map_or(0, |errs| errs.len());
                    ctx.log(format!(
                        "Skipped {dupes} duplicate documents in {collection}"
                    ));
                    Ok(batch.len() as u64 - dupes as u64)
                }
                _ => Err(e.into()),
            },
        }
    }

    /// Database a source database's contents land in: the one named in the
    /// target URI, or the source's own name when the URI has none.
    fn target_database<'a>(target_db: Option<&'a str>, source_db: &'a str) -> &'a str {
        target_db.unwrap_or(source_db)
    }

    /// Drop-and-refill one collection on the target. Returns documents
    /// copied.
    async fn copy_collection(
        ctx: &JobContext,
        source: &Client,
        target: &Client,
        source_db: &str,
        target_db: &str,
        collection: &str,
    ) -> Result<u64> {
        let source_coll = source.database(source_db).collection::<Document>(collection);
        let target_coll = target.database(target_db).collection::<Document>(collection);

        target_coll.drop(None).await?;

        let mut cursor = source_coll.find(None, None).await?;
        let mut batch: Vec<Document> = Vec::with_capacity(BATCH_SIZE);
        let mut copied: u64 = 0;
        while let Some(doc) = cursor.try_next().await? {
            batch.push(doc);
            if batch.len() >= BATCH_SIZE {
                copied += Self::insert_batch(ctx, &target_coll, &batch, collection).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            copied += Self::insert_batch(ctx, &target_coll, &batch, collection).await?;
        }
        Ok(copied)
    }
}

impl Default for MongoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DbAdapter for MongoAdapter {
    fn backend(&self) -> Backend {
        Backend::Mongodb
    }

    async fn verify_connection(&self, uri: &str) -> bool {
        let probe = async {
            let client = Self::connect(uri, "verifying connection").await?;
            client
                .database("admin")
                .run_command(mongodb::bson::doc! { "ping": 1 }, None)
                .await?;
            Ok::<_, FerryError>(())
        };
        match tokio::time::timeout(CONNECT_TIMEOUT, probe).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!("mongodb verification failed: {e}");
                false
            }
            Err(_) => {
                debug!("mongodb verification timed out");
                false
            }
        }
    }

    async fn run_copy(&self, ctx: &JobContext, source_uri: &str, target_uri: &str) -> Result<()> {
        ctx.running();
        ctx.log("Starting MongoDB migration...");

        ctx.log("Connecting to source database...");
        let source = Self::connect(source_uri, "connecting to source").await?;
        ctx.log("Connecting to target database...");
        let target = Self::connect(target_uri, "connecting to target").await?;
        ctx.log("Connected to both databases.");

        let databases = Self::list_databases(&source, source_uri).await?;
        if databases.is_empty() {
            ctx.log("No databases found on source.");
            ctx.complete();
            return Ok(());
        }

        // Sizing pass so progress has a denominator before any data moves
        let mut plan: Vec<(String, Vec<String>)> = Vec::with_capacity(databases.len());
        let mut total = 0usize;
        for db in &databases {
            let collections = Self::list_collections(&source, db).await?;
            total += collections.len();
            plan.push((db.clone(), collections));
        }
        ctx.log(format!(
            "Found {} collections across {} databases",
            total,
            plan.len()
        ));
        if total == 0 {
            ctx.log("Nothing to copy.");
            ctx.complete();
            return Ok(());
        }

        let target_db = db_name_from_uri(target_uri);
        let mut processed = 0usize;
        let mut records: u64 = 0;
        for (db, collections) in &plan {
            let dest = Self::target_database(target_db.as_deref(), db);
            for collection in collections {
                ctx.log(format!(
                    "Copying collection: {db}.{collection} -> {dest}.{collection}"
                ));
                match Self::copy_collection(ctx, &source, &target, db, dest, collection).await {
                    Ok(docs) => {
                        records += docs;
                        ctx.log(format!(
                            "Copied {docs} documents from {db}.{collection}"
                        ));
                    }
                    Err(e) => {
                        ctx.log(format!("Error copying {db}.{collection}: {e}"));
                    }
                }
                processed += 1;
                ctx.progress(percent(processed, total));
                ctx.stats(JobStats::new(processed as u64, records));
            }
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
        let databases = Self::list_databases(&source, source_uri).await?;

        let mut plan: Vec<(String, Vec<String>)> = Vec::with_capacity(databases.len());
        let mut total = 0usize;
        for db in &databases {
            let collections = Self::list_collections(&source, db).await?;
            total += collections.len();
            plan.push((db.clone(), collections));
        }

        let mut processed = 0usize;
        let mut records: u64 = 0;
        for (db, collections) in &plan {
            for collection in collections {
                // Each collection becomes one JSON-array entry, streamed
                // document by document so large collections never live in
                // memory whole.
                let mut entry = archive.start_entry(&format!("{db}/{collection}.json")).await?;
                entry.write_all(b"[").await?;

                let coll = source.database(db).collection::<Document>(collection);
                let mut cursor = coll.find(None, None).await?;
                let mut first = true;
                while let Some(doc) = cursor.try_next().await? {
                    if !first {
                        entry.write_all(b",").await?;
                    }
                    first = false;
                    entry.write_all(&serde_json::to_vec(&doc)?).await?;
                    records += 1;
                }
                entry.write_all(b"]").await?;
                entry.close().await?;

                processed += 1;
                ctx.progress(percent(processed, total));
                ctx.stats(JobStats::new(processed as u64, records));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_databases_are_filtered() {
        let names = ["admin", "local", "config", "store", "analytics"];
        let kept: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !SYSTEM_DATABASES.contains(n))
            .collect();
        assert_eq!(kept, vec!["store", "analytics"]);
    }

    #[test]
    fn test_copy_lands_in_target_uri_database() {
        // Target URI names a database: everything lands there
        let target = db_name_from_uri("mongodb://host:27017/mydb");
        assert_eq!(
            MongoAdapter::target_database(target.as_deref(), "store"),
            "mydb"
        );
        // No database in the target URI: source name carries over
        let target = db_name_from_uri("mongodb://host:27017");
        assert_eq!(
            MongoAdapter::target_database(target.as_deref(), "store"),
            "store"
        );
    }

    #[test]
    fn test_uri_database_overrides_enumeration() {
        assert_eq!(
            db_name_from_uri("mongodb://u:p@host:27017/store").as_deref(),
            Some("store")
        );
        assert_eq!(db_name_from_uri("mongodb://host:27017"), None);
        assert_eq!(db_name_from_uri("mongodb://host:27017/"), None);
    }
}
