//! Span-indexed disk cache.
//!
//! Layout: `<cache_root>/<track_ref>/<offset>.span` plus an `index.json` at
//! the root. A missing or unparsable index is rebuilt by directory scan. A
//! span file that cannot be read, or whose on-disk length disagrees with the
//! index, is dropped and the range is treated as a miss; it is never fatal.
//!
//! One internal lock guards the index. Listener callbacks fire while the
//! lock is held (adds before eviction-driven removals from the same write)
//! and must not call back into the cache.

use super::evictor::CacheEvictor;
use super::listener::CacheListener;
use super::span::SpanIndex;
use crate::error::{Result, StreamingError};
use crate::TrackRef;
use bridge_traits::{BridgeError, FileSystemAccess};
use bytes::{Bytes, BytesMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const INDEX_FILE: &str = "index.json";
const SPAN_EXTENSION: &str = "span";

struct CacheInner {
    index: SpanIndex,
    listeners: Vec<Arc<dyn CacheListener>>,
    evictor: Box<dyn CacheEvictor>,
}

/// Content-addressed byte-range store keyed by track reference.
pub struct DiskCache {
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
    inner: Mutex<CacheInner>,
}

impl DiskCache {
    /// Open the cache under `<platform cache dir>/<directory>`.
    ///
    /// Performs the legacy-layout migration and loads or rebuilds the index.
    #[instrument(skip(fs, evictor))]
    pub async fn open(
        fs: Arc<dyn FileSystemAccess>,
        directory: &str,
        evictor: Box<dyn CacheEvictor>,
    ) -> Result<Self> {
        let cache_dir = fs.get_cache_directory().await.map_err(cache_err)?;
        let root = cache_dir.join(directory);
        fs.create_dir_all(&root).await.map_err(cache_err)?;

        migrate_legacy_layout(fs.as_ref(), &root).await;

        let index = load_or_rebuild_index(fs.as_ref(), &root).await;
        info!(
            root = %root.display(),
            spans = index.span_count(),
            total_bytes = index.total_bytes(),
            "Disk cache opened"
        );

        Ok(Self {
            fs,
            root,
            inner: Mutex::new(CacheInner {
                index,
                listeners: Vec::new(),
                evictor,
            }),
        })
    }

    /// Register a listener for span add/remove/touch notifications.
    pub async fn add_listener(&self, listener: Arc<dyn CacheListener>) {
        self.inner.lock().await.listeners.push(listener);
    }

    /// Returns `true` if `[offset, offset + length)` is fully on disk.
    pub async fn is_cached(&self, track: &TrackRef, offset: u64, length: u64) -> bool {
        self.inner.lock().await.index.is_covered(track, offset, length)
    }

    /// Read a fully cached range, or `None` on any miss.
    ///
    /// A corrupted span encountered along the way is dropped from the index
    /// and the whole range reported as a miss so the pipeline re-fetches.
    pub async fn read(&self, track: &TrackRef, offset: u64, length: u64) -> Result<Option<Bytes>> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let Some(covering) = inner.index.covering_spans(track, offset, length) else {
            return Ok(None);
        };

        let end = offset + length;
        let mut assembled = BytesMut::with_capacity(length as usize);

        for (start, meta) in &covering {
            let path = self.span_path(track, *start);
            let data = match self.fs.read_file(&path).await {
                Ok(data) if data.len() as u64 == meta.length => data,
                Ok(data) => {
                    warn!(
                        track = %track,
                        offset = start,
                        expected = meta.length,
                        actual = data.len(),
                        "Span length mismatch, dropping span"
                    );
                    self.drop_corrupted_span(inner, track, *start).await;
                    return Ok(None);
                }
                Err(e) => {
                    warn!(track = %track, offset = start, error = %e, "Unreadable span, dropping");
                    self.drop_corrupted_span(inner, track, *start).await;
                    return Ok(None);
                }
            };

            let from = offset.max(*start) - start;
            let to = end.min(start + meta.length) - start;
            assembled.extend_from_slice(&data[from as usize..to as usize]);
        }

        // Recency stamps are persisted with the next structural write.
        for (start, meta) in &covering {
            inner.index.touch(track, *start);
            for listener in &inner.listeners {
                listener.span_touched(track, *start, meta.length);
            }
        }

        Ok(Some(assembled.freeze()))
    }

    /// Write-through of fetched bytes starting at `offset`.
    ///
    /// Idempotent: already-covered subranges are skipped, so spans never
    /// overlap and identical rewrites store nothing new. Eviction runs after
    /// the write if the configured policy says the cache is over budget.
    #[instrument(skip(self, data), fields(track = %track, offset, len = data.len()))]
    pub async fn write_span(&self, track: &TrackRef, offset: u64, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let gaps = inner.index.uncovered(track, offset, data.len() as u64);
        if gaps.is_empty() {
            debug!("Range already cached, nothing to write");
            return Ok(());
        }

        self.fs
            .create_dir_all(&self.track_dir(track))
            .await
            .map_err(cache_err)?;

        for (gap_offset, gap_length) in &gaps {
            let from = (gap_offset - offset) as usize;
            let slice = data.slice(from..from + *gap_length as usize);
            let path = self.span_path(track, *gap_offset);
            self.fs.write_file(&path, slice).await.map_err(cache_err)?;

            inner.index.insert_span(track.clone(), *gap_offset, *gap_length);
            for listener in &inner.listeners {
                listener.span_added(track, *gap_offset, *gap_length);
            }
        }

        let plan = inner.evictor.plan_eviction(&inner.index);
        for (victim_track, victim_offset) in plan {
            let Some(meta) = inner.index.remove_span(&victim_track, victim_offset) else {
                continue;
            };
            let path = self.span_path(&victim_track, victim_offset);
            if let Err(e) = self.fs.delete_file(&path).await {
                warn!(track = %victim_track, offset = victim_offset, error = %e, "Failed to delete evicted span file");
            }
            for listener in &inner.listeners {
                listener.span_removed(&victim_track, victim_offset, meta.length);
            }
        }

        self.persist_index(&inner.index).await
    }

    /// Remove every cached span of one track. Returns bytes freed.
    #[instrument(skip(self), fields(track = %track))]
    pub async fn remove_track(&self, track: &TrackRef) -> Result<u64> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let removed = inner.index.remove_track(track);
        if removed.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.fs.delete_dir_all(&self.track_dir(track)).await {
            warn!(track = %track, error = %e, "Failed to delete track cache directory");
        }

        let mut freed = 0;
        for (offset, meta) in &removed {
            freed += meta.length;
            for listener in &inner.listeners {
                listener.span_removed(track, *offset, meta.length);
            }
        }

        self.persist_index(&inner.index).await?;
        info!(bytes_freed = freed, "Removed cached track");
        Ok(freed)
    }

    /// Total cached bytes for one track.
    pub async fn cached_bytes(&self, track: &TrackRef) -> u64 {
        self.inner.lock().await.index.cached_bytes(track)
    }

    /// Total cached bytes across all tracks.
    pub async fn total_bytes(&self) -> u64 {
        self.inner.lock().await.index.total_bytes()
    }

    /// Number of spans on disk.
    pub async fn span_count(&self) -> usize {
        self.inner.lock().await.index.span_count()
    }

    fn track_dir(&self, track: &TrackRef) -> PathBuf {
        self.root.join(track.as_str())
    }

    fn span_path(&self, track: &TrackRef, offset: u64) -> PathBuf {
        self.track_dir(track).join(format!("{offset}.{SPAN_EXTENSION}"))
    }

    async fn drop_corrupted_span(&self, inner: &mut CacheInner, track: &TrackRef, offset: u64) {
        let Some(meta) = inner.index.remove_span(track, offset) else {
            return;
        };
        let path = self.span_path(track, offset);
        if let Err(e) = self.fs.delete_file(&path).await {
            debug!(track = %track, offset, error = %e, "Corrupted span file not deleted");
        }
        for listener in &inner.listeners {
            listener.span_removed(track, offset, meta.length);
        }
        if let Err(e) = self.persist_index(&inner.index).await {
            warn!(error = %e, "Failed to persist index after dropping corrupted span");
        }
    }

    async fn persist_index(&self, index: &SpanIndex) -> Result<()> {
        let json = serde_json::to_vec(index)
            .map_err(|e| StreamingError::Cache(format!("Failed to encode cache index: {e}")))?;
        self.fs
            .write_file(&self.root.join(INDEX_FILE), Bytes::from(json))
            .await
            .map_err(cache_err)
    }
}

fn cache_err(e: BridgeError) -> StreamingError {
    StreamingError::Cache(e.to_string())
}

/// Migrate the prior platform cache layout: single-digit bucket directories
/// whose files are moved up into the root (rename, delete on failure), and
/// stray `*.uid` marker files which are simply deleted.
async fn migrate_legacy_layout(fs: &dyn FileSystemAccess, root: &Path) {
    let entries = match fs.list_directory(root).await {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries {
        let name = match entry.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        if name.ends_with(".uid") {
            if let Err(e) = fs.delete_file(&entry).await {
                warn!(file = %entry.display(), error = %e, "Failed to delete legacy uid file");
            }
            continue;
        }

        let is_digit_bucket = name.len() == 1 && name.chars().all(|c| c.is_ascii_digit());
        if !is_digit_bucket {
            continue;
        }
        let Ok(meta) = fs.metadata(&entry).await else {
            continue;
        };
        if !meta.is_directory {
            continue;
        }

        let files = fs.list_directory(&entry).await.unwrap_or_default();
        // A digit-named directory already holding spans belongs to a track.
        let holds_spans = files.iter().any(|f| {
            f.extension().and_then(|e| e.to_str()) == Some(SPAN_EXTENSION)
        });
        if holds_spans {
            continue;
        }

        info!(bucket = %entry.display(), "Migrating legacy cache bucket");
        for file in files {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let target = root.join(file_name);
            if let Err(e) = fs.rename(&file, &target).await {
                warn!(file = %file.display(), error = %e, "Rename failed, deleting legacy file");
                if let Err(e) = fs.delete_file(&file).await {
                    warn!(file = %file.display(), error = %e, "Failed to delete legacy file");
                }
            }
        }
        if let Err(e) = fs.delete_dir_all(&entry).await {
            warn!(bucket = %entry.display(), error = %e, "Failed to remove legacy bucket");
        }
    }
}

async fn load_or_rebuild_index(fs: &dyn FileSystemAccess, root: &Path) -> SpanIndex {
    let index_path = root.join(INDEX_FILE);
    if let Ok(data) = fs.read_file(&index_path).await {
        match serde_json::from_slice::<SpanIndex>(&data) {
            Ok(index) => return index,
            Err(e) => warn!(error = %e, "Cache index unparsable, rebuilding from disk"),
        }
    }
    rebuild_index(fs, root).await
}

/// Rebuild the index by scanning `<root>/<track>/<offset>.span` files.
async fn rebuild_index(fs: &dyn FileSystemAccess, root: &Path) -> SpanIndex {
    let mut index = SpanIndex::new();
    let entries = match fs.list_directory(root).await {
        Ok(entries) => entries,
        Err(_) => return index,
    };

    for entry in entries {
        let Ok(meta) = fs.metadata(&entry).await else {
            continue;
        };
        if !meta.is_directory {
            continue;
        }
        let Some(track_name) = entry.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let track = TrackRef::new(track_name);

        let files = fs.list_directory(&entry).await.unwrap_or_default();
        for file in files {
            if file.extension().and_then(|e| e.to_str()) != Some(SPAN_EXTENSION) {
                continue;
            }
            let Some(offset) = file
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };
            let Ok(file_meta) = fs.metadata(&file).await else {
                continue;
            };
            if file_meta.size > 0 {
                index.insert_span(track.clone(), offset, file_meta.size);
            }
        }
    }

    debug!(spans = index.span_count(), "Rebuilt cache index from disk");
    index
}
