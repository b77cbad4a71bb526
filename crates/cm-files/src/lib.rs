//! # cm-files
//!
//! File work areas and storage providers for Commerce RS.
//!
//! ## Workflow
//!
//! 1. Call [`FileService::initialize_work_area`] to get a private temporary directory
//! 2. Create files and directories under [`FileWorkArea::path`]
//! 3. Promote them with [`FileService::add_or_update_all_resources`] (or a subset with
//!    [`FileService::add_or_update_resources`])
//! 4. Always call [`FileService::close_work_area`] to reclaim the temporary files
//!
//! ## Example
//!
//! ```rust,ignore
//! use cm_files::{FileService, LocalFileServiceProvider};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(LocalFileServiceProvider::new("/var/commerce/assets"));
//! let service = FileService::new(config.files.clone(), provider);
//!
//! let work_area = service.initialize_work_area(None).await?;
//! tokio::fs::write(work_area.path().join("sitemap.xml"), xml).await?;
//! let promoted = service.add_or_update_all_resources(&work_area).await;
//! service.close_work_area(&work_area).await?;
//! promoted?;
//! ```

pub mod error;
pub mod provider;
pub mod registry;
pub mod service;
pub mod static_resources;
pub mod work_area;

pub use error::{FileServiceError, FileServiceResult};
pub use provider::{
    normalize_resource_name, FileServiceProvider, LocalFileServiceProvider,
    MemoryFileServiceProvider,
};
pub use registry::ProviderRegistry;
pub use service::{FileService, MAX_GENERATED_DIRECTORY_DEPTH};
pub use static_resources::{SharedResourceStream, StaticResources};
pub use work_area::FileWorkArea;
