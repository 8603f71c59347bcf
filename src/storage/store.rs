//! Concurrent URL to resource map backed by the output directory
//!
//! The map lock guards a single get-or-insert at a time and is never held
//! across disk I/O. A `save` reserves its entry first, writes the file, and
//! drops the reservation again if the write fails.

use crate::storage::paths::local_path_for;
use crate::storage::{Resource, StorageError, StorageResult};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Maps normalized URLs to resources persisted under an output root
#[derive(Debug)]
pub struct ResourceStore {
    root: PathBuf,
    resources: Mutex<HashMap<String, Arc<Resource>>>,
}

impl ResourceStore {
    /// Opens a store rooted at `root`, creating the directory if needed
    ///
    /// # Returns
    ///
    /// * `Ok(ResourceStore)` - Store ready for use
    /// * `Err(StorageError)` - The output root could not be created
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;

        Ok(Self {
            root,
            resources: Mutex::new(HashMap::new()),
        })
    }

    /// The output root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derives the local path of a URL without requiring a prior fetch
    pub fn local_path_for(&self, url: &Url) -> String {
        local_path_for(url)
    }

    /// Looks up a previously saved resource
    ///
    /// An entry is registered before its file is written, so while a `save`
    /// is still in flight this can return a resource that is not on disk yet
    /// and that is dropped again if the write fails. Once `save` has returned
    /// `Ok`, the file holds the registered content.
    pub fn get(&self, url: &Url) -> Option<Arc<Resource>> {
        self.lock().get(url.as_str()).cloned()
    }

    /// Number of resources registered in the store
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no resource has been saved yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Registers a resource and writes it to disk
    ///
    /// Saving a URL that is already known is a no-op: nothing is written and
    /// the resource registered first is returned.
    /// That includes a URL whose first save is still writing, see [`Self::get`].
    pub async fn save(&self, resource: Resource) -> StorageResult<Arc<Resource>> {
        let resource = Arc::new(resource);

        {
            let mut resources = self.lock();
            if let Some(existing) = resources.get(resource.key()) {
                tracing::trace!("{} already stored, skipping write", resource.key());
                return Ok(Arc::clone(existing));
            }
            resources.insert(resource.key().to_string(), Arc::clone(&resource));
        }

        if let Err(e) = self.write(&resource).await {
            self.lock().remove(resource.key());
            return Err(e);
        }

        tracing::debug!("Saved {} -> {}", resource.source_url, resource.local_path);
        Ok(resource)
    }

    /// Overwrites a stored resource with new content
    ///
    /// This is the re-save path used after a document's links are rewritten.
    pub async fn replace(&self, resource: Resource) -> StorageResult<Arc<Resource>> {
        let resource = Arc::new(resource);
        self.write(&resource).await?;
        self.lock()
            .insert(resource.key().to_string(), Arc::clone(&resource));

        tracing::debug!("Re-saved {} -> {}", resource.source_url, resource.local_path);
        Ok(resource)
    }

    /// Absolute path of a local path under the output root
    pub fn absolute_path(&self, local_path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(local_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if local_path.is_empty() || escapes {
            return Err(StorageError::PathEscape(local_path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn write(&self, resource: &Resource) -> StorageResult<()> {
        let full = self.absolute_path(&resource.local_path)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&full, &resource.content)
            .await
            .map_err(|source| StorageError::Io { path: full, source })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Resource>>> {
        self.resources
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn html(url: &str, body: &str) -> Resource {
        Resource::new(Url::parse(url).unwrap(), body.as_bytes().to_vec(), "text/html")
    }

    #[tokio::test]
    async fn test_save_writes_file_and_registers() {
        let dir = TempDir::new().unwrap();
        let store = ResourceStore::open(dir.path()).unwrap();

        let saved = store
            .save(html("https://example.com/path", "<html></html>"))
            .await
            .unwrap();

        let on_disk = std::fs::read(dir.path().join(&saved.local_path)).unwrap();
        assert_eq!(on_disk, b"<html></html>");

        let url = Url::parse("https://example.com/path").unwrap();
        let got = store.get(&url).unwrap();
        assert_eq!(got.local_path, saved.local_path);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ResourceStore::open(dir.path()).unwrap();

        store
            .save(html("https://example.com/", "first"))
            .await
            .unwrap();
        let second = store
            .save(html("https://example.com/", "second"))
            .await
            .unwrap();

        assert_eq!(second.content, b"first");
        let on_disk = std::fs::read(dir.path().join("example.com/index.html")).unwrap();
        assert_eq!(on_disk, b"first");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = ResourceStore::open(dir.path()).unwrap();

        let saved = store
            .save(html("https://example.com/", "before"))
            .await
            .unwrap();
        store
            .replace(saved.with_content(b"after".to_vec()))
            .await
            .unwrap();

        let on_disk = std::fs::read(dir.path().join("example.com/index.html")).unwrap();
        assert_eq!(on_disk, b"after");

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(store.get(&url).unwrap().content, b"after");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let store = ResourceStore::open(dir.path()).unwrap();

        // A regular file where the host directory should be
        std::fs::write(dir.path().join("example.com"), b"blocker").unwrap();

        let result = store.save(html("https://example.com/a", "x")).await;
        assert!(matches!(result, Err(StorageError::Io { .. })));

        let url = Url::parse("https://example.com/a").unwrap();
        assert!(store.get(&url).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_register_once() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ResourceStore::open(dir.path()).unwrap());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .save(html("https://example.com/shared", &format!("body {}", i)))
                    .await
                    .unwrap()
            }));
        }

        let mut bodies = Vec::new();
        for handle in handles {
            bodies.push(handle.await.unwrap().content.clone());
        }

        assert_eq!(store.len(), 1);
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_settled_save_matches_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ResourceStore::open(dir.path()).unwrap());
        let url = Url::parse("https://example.com/racy").unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .save(html("https://example.com/racy", &format!("body {}", i)))
                    .await
            }));
        }

        // Readers racing the writers may see the entry before its file
        for _ in 0..8 {
            if let Some(seen) = store.get(&url) {
                assert_eq!(seen.local_path, "example.com/racy.html");
            }
            tokio::task::yield_now().await;
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let registered = store.get(&url).unwrap();
        let on_disk = std::fs::read(dir.path().join(&registered.local_path)).unwrap();
        assert_eq!(on_disk, registered.content);
    }

    #[test]
    fn test_absolute_path_rejects_escape() {
        let dir = TempDir::new().unwrap();
        let store = ResourceStore::open(dir.path()).unwrap();

        assert!(store.absolute_path("example.com/a.html").is_ok());
        assert!(matches!(
            store.absolute_path("../outside.html"),
            Err(StorageError::PathEscape(_))
        ));
        assert!(store.absolute_path("/etc/passwd").is_err());
        assert!(store.absolute_path("").is_err());
    }

    #[test]
    fn test_open_creates_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested/output");
        let store = ResourceStore::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }
}
