//! Shared test doubles: an in-memory filesystem, a ranged HTTP client
//! serving from a fixed blob, and a fixed network monitor.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    BridgeError, FileMetadata, FileSystemAccess, HttpClient, HttpRequest, HttpResponse,
    NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType, Result as BridgeResult,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory [`FileSystemAccess`] with a fixed cache root.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, Bytes>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_root() -> PathBuf {
        PathBuf::from("/cache")
    }

    /// Overwrite a stored file directly, bypassing the trait. Used to
    /// simulate on-disk corruption.
    pub fn corrupt(&self, path: &Path, data: Bytes) {
        self.files.lock().insert(path.to_path_buf(), data);
    }

    /// Remove a stored file directly, simulating external deletion.
    pub fn vanish(&self, path: &Path) {
        self.files.lock().remove(path);
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }

    fn record_parents(&self, path: &Path) {
        let mut dirs = self.dirs.lock();
        let mut cursor = path.parent();
        while let Some(dir) = cursor {
            if dir.as_os_str().is_empty() {
                break;
            }
            dirs.insert(dir.to_path_buf());
            cursor = dir.parent();
        }
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
        Ok(Self::cache_root())
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        if let Some(data) = self.files.lock().get(path) {
            return Ok(FileMetadata {
                size: data.len() as u64,
                modified_at: None,
                is_directory: false,
            });
        }
        if self.dirs.lock().contains(path) {
            return Ok(FileMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(BridgeError::NotAvailable(format!(
            "no such path: {}",
            path.display()
        )))
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.dirs.lock().insert(path.to_path_buf());
        self.record_parents(path);
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::NotAvailable(format!("no such file: {}", path.display())))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.record_parents(path);
        self.files.lock().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::NotAvailable(format!("no such file: {}", path.display())))
    }

    async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()> {
        let mut files = self.files.lock();
        let doomed: Vec<PathBuf> = files
            .keys()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();
        for p in doomed {
            files.remove(&p);
        }
        let mut dirs = self.dirs.lock();
        let doomed: Vec<PathBuf> = dirs.iter().filter(|p| p.starts_with(path)).cloned().collect();
        for p in doomed {
            dirs.remove(&p);
        }
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        let mut entries = BTreeSet::new();
        for file in self.files.lock().keys() {
            if file.parent() == Some(path) {
                entries.insert(file.clone());
            }
        }
        for dir in self.dirs.lock().iter() {
            if dir.parent() == Some(path) {
                entries.insert(dir.clone());
            }
        }
        Ok(entries.into_iter().collect())
    }

    async fn rename(&self, from: &Path, to: &Path) -> BridgeResult<()> {
        let mut files = self.files.lock();
        if let Some(data) = files.remove(from) {
            files.insert(to.to_path_buf(), data);
            return Ok(());
        }
        drop(files);

        // Directory move: re-prefix every path under `from`.
        let mut dirs = self.dirs.lock();
        if !dirs.contains(from) {
            return Err(BridgeError::NotAvailable(format!(
                "no such path: {}",
                from.display()
            )));
        }
        let moved: Vec<PathBuf> = dirs.iter().filter(|p| p.starts_with(from)).cloned().collect();
        for dir in moved {
            dirs.remove(&dir);
            let suffix = dir.strip_prefix(from).unwrap_or(&dir).to_path_buf();
            dirs.insert(to.join(suffix));
        }
        drop(dirs);

        let mut files = self.files.lock();
        let moved: Vec<PathBuf> = files
            .keys()
            .filter(|p| p.starts_with(from))
            .cloned()
            .collect();
        for file in moved {
            if let Some(data) = files.remove(&file) {
                let suffix = file.strip_prefix(from).unwrap_or(&file).to_path_buf();
                files.insert(to.join(suffix), data);
            }
        }
        Ok(())
    }
}

/// Serves byte ranges from a fixed blob, with optional scripted failures.
pub struct BlobHttpClient {
    blob: Bytes,
    requests: AtomicUsize,
    failures: Mutex<VecDeque<BridgeError>>,
}

impl BlobHttpClient {
    pub fn new(blob: Bytes) -> Self {
        Self {
            blob,
            requests: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue failures returned before any byte is served.
    pub fn fail_next(&self, errors: Vec<BridgeError>) {
        self.failures.lock().extend(errors);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for BlobHttpClient {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable(
            "BlobHttpClient only serves ranges".to_string(),
        ))
    }

    async fn download_range(&self, _url: &str, offset: u64, length: u64) -> BridgeResult<Bytes> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        let start = (offset as usize).min(self.blob.len());
        let end = ((offset + length) as usize).min(self.blob.len());
        if start >= end {
            return Err(BridgeError::OperationFailed(
                "range out of bounds".to_string(),
            ));
        }
        Ok(self.blob.slice(start..end))
    }
}

/// Reports a fixed network state.
pub struct FixedNetworkMonitor {
    info: Mutex<NetworkInfo>,
}

impl FixedNetworkMonitor {
    pub fn excellent() -> Self {
        Self {
            info: Mutex::new(NetworkInfo {
                status: NetworkStatus::Connected,
                network_type: Some(NetworkType::WiFi),
                is_metered: false,
                is_validated: true,
            }),
        }
    }

    pub fn offline() -> Self {
        Self {
            info: Mutex::new(NetworkInfo::disconnected()),
        }
    }

    pub fn set(&self, info: NetworkInfo) {
        *self.info.lock() = info;
    }
}

#[async_trait]
impl NetworkMonitor for FixedNetworkMonitor {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        Ok(self.info.lock().clone())
    }
}
