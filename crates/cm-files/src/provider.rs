//! Storage Providers
//!
//! Pluggable backends that durably persist the files promoted out of a work area.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{FileServiceError, FileServiceResult};
use crate::work_area::FileWorkArea;

/// Storage provider trait - unified interface for durable backends
#[async_trait]
pub trait FileServiceProvider: Send + Sync {
    /// Read a resource by name, `None` when it does not exist
    async fn get_resource(&self, name: &str) -> FileServiceResult<Option<Bytes>>;

    /// Remove a resource by name, returning whether something was removed
    async fn remove_resource(&self, name: &str) -> FileServiceResult<bool>;

    /// Persist a batch of files staged in `work_area`.
    ///
    /// Files are already validated to live inside the work area. The whole
    /// batch is handed over at once so a provider may write it in bulk.
    async fn add_or_update_resources(
        &self,
        work_area: &FileWorkArea,
        files: &[PathBuf],
    ) -> FileServiceResult<()>;

    /// Provider name for logging and registry lookup
    fn name(&self) -> &str;
}

/// Strip leading separators so names are always provider-relative
pub fn normalize_resource_name(name: &str) -> String {
    name.replace('\\', "/").trim_start_matches('/').to_string()
}

fn resource_name_for(work_area: &FileWorkArea, file: &Path) -> FileServiceResult<String> {
    work_area.resource_name(file).ok_or_else(|| {
        FileServiceError::InvalidOperation(format!(
            "File {} is not in work area {}",
            file.display(),
            work_area.path().display()
        ))
    })
}

/// Local filesystem provider
///
/// Resources are sharded into two levels of directories derived from the md5
/// of their name, so `img/logo.png` lands in `<root>/ab/cd/img/logo.png`.
pub struct LocalFileServiceProvider {
    root: PathBuf,
}

impl LocalFileServiceProvider {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a resource name to its location on disk
    fn resolve_path(&self, name: &str) -> FileServiceResult<PathBuf> {
        let name = normalize_resource_name(name);

        // Prevent directory traversal
        if name.is_empty() || name.split('/').any(|segment| segment == "..") {
            return Err(FileServiceError::InvalidOperation(format!(
                "Invalid resource name: {}",
                name
            )));
        }

        let digest = format!("{:x}", md5::compute(name.as_bytes()));
        Ok(self.root.join(&digest[0..2]).join(&digest[2..4]).join(name))
    }

    /// Copy `source` to `target` through a temporary sibling so readers never
    /// observe a partially written resource.
    async fn write_atomically(source: &Path, target: &Path) -> FileServiceResult<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FileServiceError::io("create storage directory", parent, e))?;
        }

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = target.with_file_name(format!(".{}.{}.part", file_name, Uuid::new_v4()));

        if let Err(e) = fs::copy(source, &partial).await {
            return Err(FileServiceError::io("copy resource to", &partial, e));
        }
        if let Err(e) = fs::rename(&partial, target).await {
            let _ = fs::remove_file(&partial).await;
            return Err(FileServiceError::io("publish resource", target, e));
        }

        Ok(())
    }
}

#[async_trait]
impl FileServiceProvider for LocalFileServiceProvider {
    #[instrument(skip(self), fields(provider = "local"))]
    async fn get_resource(&self, name: &str) -> FileServiceResult<Option<Bytes>> {
        let path = self.resolve_path(name)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FileServiceError::io("read resource", &path, e)),
        }
    }

    #[instrument(skip(self), fields(provider = "local"))]
    async fn remove_resource(&self, name: &str) -> FileServiceResult<bool> {
        let path = self.resolve_path(name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = ?path, "Resource removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FileServiceError::io("remove resource", &path, e)),
        }
    }

    #[instrument(skip(self, work_area, files), fields(provider = "local", count = files.len()))]
    async fn add_or_update_resources(
        &self,
        work_area: &FileWorkArea,
        files: &[PathBuf],
    ) -> FileServiceResult<()> {
        for file in files {
            let name = resource_name_for(work_area, file)?;
            let target = self.resolve_path(&name)?;

            Self::write_atomically(file, &target).await?;
            debug!(name = %name, target = ?target, "Resource stored");
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// In-memory provider for testing and dry runs
pub struct MemoryFileServiceProvider {
    name: String,
    resources: RwLock<HashMap<String, Bytes>>,
    batches: RwLock<Vec<Vec<String>>>,
}

impl Default for MemoryFileServiceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileServiceProvider {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: RwLock::new(HashMap::new()),
            batches: RwLock::new(Vec::new()),
        }
    }

    /// Resource names of every batch received, in call order
    pub async fn batches(&self) -> Vec<Vec<String>> {
        self.batches.read().await.clone()
    }

    pub async fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Store a resource directly, bypassing a work area
    pub async fn insert(&self, name: &str, data: impl Into<Bytes>) {
        self.resources
            .write()
            .await
            .insert(normalize_resource_name(name), data.into());
    }
}

#[async_trait]
impl FileServiceProvider for MemoryFileServiceProvider {
    async fn get_resource(&self, name: &str) -> FileServiceResult<Option<Bytes>> {
        let resources = self.resources.read().await;
        Ok(resources.get(&normalize_resource_name(name)).cloned())
    }

    async fn remove_resource(&self, name: &str) -> FileServiceResult<bool> {
        let mut resources = self.resources.write().await;
        Ok(resources.remove(&normalize_resource_name(name)).is_some())
    }

    async fn add_or_update_resources(
        &self,
        work_area: &FileWorkArea,
        files: &[PathBuf],
    ) -> FileServiceResult<()> {
        // Read everything first so a failure leaves the store untouched
        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            let name = resource_name_for(work_area, file)?;
            let data = fs::read(file)
                .await
                .map_err(|e| FileServiceError::io("read staged file", file, e))?;
            staged.push((name, Bytes::from(data)));
        }

        let names: Vec<String> = staged.iter().map(|(name, _)| name.clone()).collect();
        let mut resources = self.resources.write().await;
        for (name, data) in staged {
            if resources.insert(name.clone(), data).is_some() {
                warn!(name = %name, provider = %self.name, "Overwriting existing resource");
            }
        }
        self.batches.write().await.push(names);

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
