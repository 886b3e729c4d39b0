//! Streaming zip archive construction for export jobs.
//!
//! Wraps a destination byte sink in a deflate-compressed zip writer. Entries
//! can be appended whole (relational tables, already materialized as JSON) or
//! written incrementally through [`EntryWriter`] (document cursors, key-value
//! dumps), in which case backpressure from the sink suspends the producer at
//! each write.
//!
//! The archive is finalized only after all entries are appended; a failure at
//! any point leaves the sink truncated, which the transport layer observes as
//! a failed response body.

use async_zip::base::write::{EntryStreamWriter, ZipFileWriter};
use async_zip::{Compression, ZipEntryBuilder};
use futures::io::AsyncWriteExt as _;
use tokio::io::AsyncWriteExt as _;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::error::Result;

/// Destination for an export archive, typically an HTTP response body.
pub type ArchiveSink = Box<dyn tokio::io::AsyncWrite + Send + Unpin>;

/// Streaming zip writer over an [`ArchiveSink`].
pub struct ArchiveBuilder {
    writer: ZipFileWriter<Compat<ArchiveSink>>,
    entries: usize,
}

impl ArchiveBuilder {
    /// Wrap a sink in a new, empty archive.
    pub fn new(sink: ArchiveSink) -> Self {
        Self {
            writer: ZipFileWriter::new(sink.compat_write()),
            entries: 0,
        }
    }

    fn entry(name: &str) -> ZipEntryBuilder {
        ZipEntryBuilder::new(name.to_string().into(), Compression::Deflate)
    }

    /// Append a complete entry in one call.
    pub async fn append(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.writer
            .write_entry_whole(Self::entry(name), data)
            .await?;
        self.entries += 1;
        debug!(entry = name, bytes = data.len(), "appended archive entry");
        Ok(())
    }

    /// Open an entry for incremental writing.
    ///
    /// The returned writer must be closed before the next entry is started.
    pub async fn start_entry(&mut self, name: &str) -> Result<EntryWriter<'_>> {
        let inner = self.writer.write_entry_stream(Self::entry(name)).await?;
        self.entries += 1;
        Ok(EntryWriter { inner })
    }

    /// Number of entries appended so far.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Write the central directory and flush the sink.
    pub async fn finalize(self) -> Result<()> {
        let compat = self.writer.close().await?;
        let mut sink = compat.into_inner();
        sink.shutdown().await?;
        debug!(entries = self.entries, "finalized archive");
        Ok(())
    }
}

/// Incremental writer for a single archive entry.
pub struct EntryWriter<'a> {
    inner: EntryStreamWriter<'a, Compat<ArchiveSink>>,
}

impl EntryWriter<'_> {
    /// Write a chunk, suspending on sink backpressure.
    pub async fn write_all(&mut self, chunk: &[u8]) -> Result<()> {
        self.inner.write_all(chunk).await?;
        Ok(())
    }

    /// Finish the entry and write its data descriptor.
    pub async fn close(self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn build_archive<F, Fut>(build: F) -> Vec<u8>
    where
        F: FnOnce(ArchiveBuilder) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send,
    {
        let (tx, mut rx) = tokio::io::duplex(64 * 1024);
        let producer = tokio::spawn(async move {
            let builder = ArchiveBuilder::new(Box::new(tx));
            build(builder).await
        });

        let mut bytes = Vec::new();
        rx.read_to_end(&mut bytes).await.unwrap();
        producer.await.unwrap().unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_whole_entries_produce_zip_container() {
        let bytes = build_archive(|mut builder| async move {
            builder.append("users.json", br#"[{"id":1}]"#).await?;
            builder.append("orders.json", b"[]").await?;
            assert_eq!(builder.entry_count(), 2);
            builder.finalize().await
        })
        .await;

        // Local file header signature, then end-of-central-directory present
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        assert!(bytes.windows(4).any(|w| w == b"PK\x05\x06"));
    }

    #[tokio::test]
    async fn test_streamed_entry_written_in_chunks() {
        let bytes = build_archive(|mut builder| async move {
            let mut entry = builder.start_entry("dump.jsonl").await?;
            for i in 0..50 {
                entry
                    .write_all(format!("{{\"key\":\"k{i}\"}}\n").as_bytes())
                    .await?;
            }
            entry.close().await?;
            builder.finalize().await
        })
        .await;

        assert_eq!(&bytes[..4], b"PK\x03\x04");
        assert!(bytes.len() > 64);
    }
}
