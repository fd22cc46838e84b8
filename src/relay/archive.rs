//! Streams a multipart upload to the downloader as a zip archive.
//!
//! Each file part is copied chunk by chunk into its own archive entry and
//! the compressed bytes are forwarded as they are produced; nothing is
//! written to disk and no part is held in memory whole.

use anyhow::{anyhow, Context, Result};
use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Multipart form name that marks a part as a file payload.
pub const FILE_FIELD: &str = "file";

/// Channel items feeding the download response body.
pub type ArchiveChunk = io::Result<Bytes>;

/// Names of the entries written to the archive, in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: Vec<String>,
    pub bytes_in: u64,
}

/// `Write` sink the zip encoder fills and the async side drains.
#[derive(Clone, Default)]
struct PendingBytes(Arc<Mutex<Vec<u8>>>);

impl PendingBytes {
    fn take(&self) -> Bytes {
        let mut pending = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Bytes::from(std::mem::take(&mut *pending))
    }
}

impl Write for PendingBytes {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut pending = self
            .0
            .lock()
            .map_err(|_| io::Error::other("archive buffer poisoned"))?;
        pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reads `source` part by part and sends the zip stream into `tx`.
///
/// Non-file parts are skipped. Any read or encode error aborts the archive;
/// bytes already sent stay sent.
pub async fn write_archive(
    mut source: Multipart,
    tx: mpsc::Sender<ArchiveChunk>,
) -> Result<ArchiveSummary> {
    let pending = PendingBytes::default();
    let mut zip = ZipWriter::new_stream(pending.clone());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut names = HashSet::new();
    let mut summary = ArchiveSummary::default();

    while let Some(mut field) = source
        .next_field()
        .await
        .context("Failed to read multipart part")?
    {
        if field.name() != Some(FILE_FIELD) {
            tracing::debug!(field = ?field.name(), "skipping non-file part");
            continue;
        }

        let entry = unique_entry_name(field.file_name(), &mut names);
        zip.start_file(entry.as_str(), options)
            .with_context(|| format!("Failed to start zip entry {entry}"))?;

        while let Some(chunk) = field
            .chunk()
            .await
            .with_context(|| format!("Failed to read part {entry}"))?
        {
            summary.bytes_in += chunk.len() as u64;
            zip.write_all(&chunk)
                .with_context(|| format!("Failed to add {entry} to zip"))?;
            forward(&pending, &tx).await?;
        }

        tracing::debug!(entry = %entry, "archived part");
        summary.entries.push(entry);
    }

    zip.finish().context("Failed to finalize zip archive")?;
    forward(&pending, &tx).await?;
    Ok(summary)
}

async fn forward(pending: &PendingBytes, tx: &mpsc::Sender<ArchiveChunk>) -> Result<()> {
    let bytes = pending.take();
    if bytes.is_empty() {
        return Ok(());
    }
    tx.send(Ok(bytes))
        .await
        .map_err(|_| anyhow!("downloader went away"))
}

/// Entry name for an uploaded filename: last path segment only, `file` when
/// empty, and `-2`, `-3`... suffixes on collisions.
fn unique_entry_name(file_name: Option<&str>, names: &mut HashSet<String>) -> String {
    let wanted = file_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("file")
        .to_string();

    if names.insert(wanted.clone()) {
        return wanted;
    }

    let path = Path::new(&wanted);
    let stem = path.file_stem().and_then(|x| x.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|x| x.to_str());

    let mut idx = 2usize;
    loop {
        let candidate = match ext {
            Some(ext) if !ext.is_empty() => format!("{}-{}.{}", stem, idx, ext),
            _ => format!("{}-{}", stem, idx),
        };
        if names.insert(candidate.clone()) {
            return candidate;
        }
        idx += 1;
    }
}
