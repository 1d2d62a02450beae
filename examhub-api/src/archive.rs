//! Streaming ZIP archive builder
//!
//! Entries are compressed on a blocking worker and leave through a bounded
//! channel as they are produced, so at most one entry is held in memory and
//! the HTTP response can start before the last file has been fetched.

use axum::body::{Body, Bytes};
use examhub_common::{Error, Result};
use std::collections::HashSet;
use std::io::{self, Write};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Compressed chunks waiting for the client
const CHUNK_BUFFER: usize = 16;

type Chunk = io::Result<Bytes>;

/// `Write` sink that forwards every chunk to the response body
struct ChunkWriter {
    tx: mpsc::Sender<Chunk>,
}

impl Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive client went away"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Entry {
    name: String,
    bytes: Vec<u8>,
}

/// Handle used to feed entries into an open archive
pub struct ArchiveBuilder {
    entries: mpsc::Sender<Entry>,
    worker: JoinHandle<io::Result<usize>>,
}

/// Byte stream of the archive being built
pub struct ArchiveStream {
    chunks: ReceiverStream<Chunk>,
}

impl ArchiveStream {
    pub fn into_body(self) -> Body {
        Body::from_stream(self.chunks)
    }
}

impl ArchiveBuilder {
    /// Start a new archive; must be called within a tokio runtime
    pub fn open() -> (ArchiveBuilder, ArchiveStream) {
        let (chunk_tx, chunk_rx) = mpsc::channel::<Chunk>(CHUNK_BUFFER);
        let (entry_tx, entry_rx) = mpsc::channel::<Entry>(1);

        let worker = tokio::task::spawn_blocking(move || write_archive(entry_rx, chunk_tx));

        (
            ArchiveBuilder {
                entries: entry_tx,
                worker,
            },
            ArchiveStream {
                chunks: ReceiverStream::new(chunk_rx),
            },
        )
    }

    /// Queue one file; waits while the previous entry is still compressing
    pub async fn append(&self, name: impl Into<String>, bytes: Vec<u8>) -> Result<()> {
        self.entries
            .send(Entry {
                name: name.into(),
                bytes,
            })
            .await
            .map_err(|_| Error::Upstream("Archive writer stopped".to_string()))
    }

    /// Write the central directory and close the stream
    pub async fn finalize(self) -> Result<usize> {
        drop(self.entries);

        let written = self
            .worker
            .await
            .map_err(|e| Error::Upstream(format!("Archive worker failed: {}", e)))??;
        debug!("Archive finished with {} entries", written);
        Ok(written)
    }
}

fn write_archive(mut entries: mpsc::Receiver<Entry>, chunks: mpsc::Sender<Chunk>) -> io::Result<usize> {
    let error_tx = chunks.clone();

    let result = write_entries(&mut entries, chunks);
    if let Err(e) = &result {
        warn!("Archive aborted: {}", e);
        // Surface the failure to the client as a broken body
        let _ = error_tx.blocking_send(Err(io::Error::new(e.kind(), e.to_string())));
    }

    result
}

fn write_entries(entries: &mut mpsc::Receiver<Entry>, chunks: mpsc::Sender<Chunk>) -> io::Result<usize> {
    let mut zip = ZipWriter::new_stream(ChunkWriter { tx: chunks });
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut names = HashSet::new();
    let mut written = 0;

    while let Some(entry) = entries.blocking_recv() {
        zip.start_file(unique_name(entry.name, &mut names), options)?;
        zip.write_all(&entry.bytes)?;
        written += 1;
    }
    zip.finish()?;

    Ok(written)
}

/// Entry names must be distinct; repeats get `_2`, `_3`... before the extension
fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name.as_str(), None),
    };
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
