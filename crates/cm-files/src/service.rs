//! File Service
//!
//! Allocates work areas, promotes their files to the selected storage
//! provider and reclaims the temporary directories afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use cm_core::{FileServiceConfig, Site};
use rand::Rng;
use tokio::fs;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{FileServiceError, FileServiceResult};
use crate::provider::{normalize_resource_name, FileServiceProvider};
use crate::registry::ProviderRegistry;
use crate::static_resources::{SharedResourceStream, StaticResources};
use crate::work_area::FileWorkArea;

/// Upper bound on random directory levels appended to a work area
pub const MAX_GENERATED_DIRECTORY_DEPTH: usize = 4;

/// Attempts at finding an unused leaf directory before giving up
const MAX_ALLOCATION_ATTEMPTS: usize = 16;

/// Work area manager
pub struct FileService {
    config: FileServiceConfig,
    registry: ProviderRegistry,
    static_resources: StaticResources,
    generated_depth: usize,
}

impl FileService {
    /// Create a service promoting to a single default provider
    pub fn new(config: FileServiceConfig, provider: Arc<dyn FileServiceProvider>) -> Self {
        Self::with_registry(config, ProviderRegistry::new(provider))
    }

    pub fn with_registry(config: FileServiceConfig, registry: ProviderRegistry) -> Self {
        let configured = config.max_generated_directory_depth;
        let generated_depth = if configured > MAX_GENERATED_DIRECTORY_DEPTH {
            warn!(
                configured,
                max = MAX_GENERATED_DIRECTORY_DEPTH,
                "Max generated directory depth set too high, capping"
            );
            MAX_GENERATED_DIRECTORY_DEPTH
        } else {
            configured
        };

        let static_resources = StaticResources::new(config.static_resource_directory.clone());

        info!(
            base = ?config.work_area_base(),
            generated_depth,
            provider = registry.select().name(),
            "File service initialized"
        );

        Self {
            config,
            registry,
            static_resources,
            generated_depth,
        }
    }

    pub fn config(&self) -> &FileServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Random directory levels applied to each new work area
    pub fn generated_depth(&self) -> usize {
        self.generated_depth
    }

    /// Create a work area for further operations.
    ///
    /// With a generated depth of zero the work area is the base directory
    /// itself; otherwise the leaf directory is created exclusively so no two
    /// live work areas share a root.
    #[instrument(skip(self, site), fields(site = site.map(|s| s.id)))]
    pub async fn initialize_work_area(&self, site: Option<&Site>) -> FileServiceResult<FileWorkArea> {
        let base = self.base_directory(site);

        if self.generated_depth == 0 {
            fs::create_dir_all(&base)
                .await
                .map_err(|e| FileServiceError::io("create temporary working directory", &base, e))?;
            trace!(path = ?base, "Work area initialized");
            return Ok(FileWorkArea::new(base, 0));
        }

        for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let root = self.generate_temp_directory(&base);
            if let Some(parent) = root.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    FileServiceError::io("create temporary working directory", parent, e)
                })?;
            }

            match fs::create_dir(&root).await {
                Ok(()) => {
                    trace!(path = ?root, "Work area initialized");
                    return Ok(FileWorkArea::new(root, self.generated_depth));
                }
                // Taken by a live work area, or the parent was reclaimed by a
                // concurrent close in between
                Err(e)
                    if e.kind() == std::io::ErrorKind::AlreadyExists
                        || e.kind() == std::io::ErrorKind::NotFound =>
                {
                    debug!(path = ?root, attempt, "Work area directory unavailable, retrying");
                }
                Err(e) => {
                    return Err(FileServiceError::io(
                        "create temporary working directory",
                        &root,
                        e,
                    ))
                }
            }
        }

        Err(FileServiceError::storage(format!(
            "Unable to allocate a unique working directory under {}",
            base.display()
        )))
    }

    /// Delete the work area and every generated ancestor left empty by it.
    ///
    /// Closing an already closed work area is a no-op.
    #[instrument(skip(self, work_area), fields(path = ?work_area.path()))]
    pub async fn close_work_area(&self, work_area: &FileWorkArea) -> FileServiceResult<()> {
        let root = work_area.path();

        match fs::remove_dir_all(root).await {
            Ok(()) => debug!("Work area deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!("Work area already deleted")
            }
            Err(e) => {
                return Err(FileServiceError::io(
                    "delete temporary working directory",
                    root,
                    e,
                ))
            }
        }

        let mut current = root.to_path_buf();
        for _ in 1..work_area.generated_depth() {
            let parent = match current.parent() {
                Some(parent) => parent.to_path_buf(),
                None => break,
            };

            match is_empty_dir(&parent).await {
                Ok(true) => {
                    if let Err(e) = fs::remove_dir(&parent).await {
                        if e.kind() == std::io::ErrorKind::NotFound {
                            // reclaimed concurrently
                        } else if matches!(is_empty_dir(&parent).await, Ok(false)) {
                            // a new work area appeared in the meantime
                            break;
                        } else {
                            return Err(FileServiceError::io(
                                "delete temporary working directory",
                                &parent,
                                e,
                            ));
                        }
                    }
                }
                Ok(false) => break,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(FileServiceError::io(
                        "inspect temporary working directory",
                        &parent,
                        e,
                    ))
                }
            }

            current = parent;
        }

        Ok(())
    }

    /// Read a resource from the selected provider
    pub async fn get_resource(&self, name: &str) -> FileServiceResult<Option<Bytes>> {
        let name = normalize_resource_name(name);
        self.select_provider().get_resource(&name).await
    }

    /// Remove a resource from the selected provider
    pub async fn remove_resource(&self, name: &str) -> FileServiceResult<bool> {
        let name = normalize_resource_name(name);
        self.select_provider().remove_resource(&name).await
    }

    /// Open a bundled static resource, `None` when absent or unreadable
    pub async fn get_static_resource(&self, name: &str) -> Option<SharedResourceStream> {
        self.static_resources.get(name).await
    }

    /// Promote a single file of the work area
    pub async fn add_or_update_resource(
        &self,
        work_area: &FileWorkArea,
        file: impl AsRef<Path>,
    ) -> FileServiceResult<()> {
        self.add_or_update_resources(work_area, &[file.as_ref().to_path_buf()])
            .await
    }

    /// Promote every file currently present in the work area
    pub async fn add_or_update_all_resources(&self, work_area: &FileWorkArea) -> FileServiceResult<()> {
        let files = build_file_list(work_area.path()).await?;
        self.add_or_update_resources(work_area, &files).await
    }

    /// Validate `files` and hand them to the selected provider as one batch.
    ///
    /// Every file must be an existing regular file inside the work area;
    /// otherwise `InvalidOperation` is returned before the provider is called.
    /// An empty batch is accepted and never reaches the provider.
    #[instrument(skip(self, work_area, files), fields(count = files.len()))]
    pub async fn add_or_update_resources(
        &self,
        work_area: &FileWorkArea,
        files: &[PathBuf],
    ) -> FileServiceResult<()> {
        check_files(work_area, files).await?;

        if files.is_empty() {
            debug!("Nothing to promote");
            return Ok(());
        }

        let provider = self.select_provider();
        provider.add_or_update_resources(work_area, files).await?;
        debug!(provider = provider.name(), "Work area files promoted");

        Ok(())
    }

    fn select_provider(&self) -> &Arc<dyn FileServiceProvider> {
        self.registry.select()
    }

    /// Base directory for new work areas, namespaced per site when given.
    ///
    /// Site directories are bucketed by the first two hex characters of the
    /// md5 of their name to bound the fan-out of the base directory.
    pub fn base_directory(&self, site: Option<&Site>) -> PathBuf {
        let base = self.config.work_area_base();

        match site {
            Some(site) => {
                let directory = site.directory_name();
                let hash = format!("{:x}", md5::compute(directory.as_bytes()));
                base.join(&hash[0..2]).join(directory)
            }
            None => base,
        }
    }

    fn generate_temp_directory(&self, base: &Path) -> PathBuf {
        let mut rng = rand::rng();
        let mut path = base.to_path_buf();
        for _ in 0..self.generated_depth {
            path.push(format!("{:02x}", rng.random::<u8>()));
        }
        path
    }
}

impl std::fmt::Debug for FileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileService")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("generated_depth", &self.generated_depth)
            .finish()
    }
}

async fn check_files(work_area: &FileWorkArea, files: &[PathBuf]) -> FileServiceResult<()> {
    for file in files {
        if !work_area.contains(file) {
            return Err(FileServiceError::InvalidOperation(format!(
                "File operation attempted on file that is not in provided work area. {}. Work area = {}",
                file.display(),
                work_area.path().display()
            )));
        }

        match fs::metadata(file).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(FileServiceError::InvalidOperation(format!(
                    "Add or update resource called with a path that is not a file. {}",
                    file.display()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FileServiceError::InvalidOperation(format!(
                    "Add or update resource called with filename that does not exist. {}",
                    file.display()
                )))
            }
            Err(e) => return Err(FileServiceError::io("inspect staged file", file, e)),
        }
    }

    Ok(())
}

/// Every file below `root`, depth first. Sibling order is unspecified.
async fn build_file_list(root: &Path) -> FileServiceResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| FileServiceError::io("list work area directory", &dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FileServiceError::io("list work area directory", &dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| FileServiceError::io("inspect", &entry.path(), e))?;

            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_symlink() {
                // linked files are promoted, linked directories are not walked
                match fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => files.push(path),
                    Ok(_) => debug!(path = ?path, "Skipping symlink to a directory"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!(path = ?path, "Skipping dangling symlink")
                    }
                    Err(e) => return Err(FileServiceError::io("inspect", &path, e)),
                }
            } else {
                files.push(path);
            }
        }
    }

    Ok(files)
}

async fn is_empty_dir(path: &Path) -> std::io::Result<bool> {
    let mut entries = fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_none())
}
