//! Bundled static resources
//!
//! Read-only assets shipped with the application (demo images, default
//! templates) looked up under a configured directory prefix.

use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, error, trace};

use crate::provider::normalize_resource_name;

/// Lookup of bundled resources. Disabled when no directory is configured.
#[derive(Debug, Clone, Default)]
pub struct StaticResources {
    directory: Option<PathBuf>,
}

impl StaticResources {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }

    pub fn disabled() -> Self {
        Self { directory: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Open a bundled resource.
    ///
    /// Absence and read failures both yield `None`; failures are logged.
    pub async fn get(&self, name: &str) -> Option<SharedResourceStream> {
        let directory = self.directory.as_ref()?;
        let name = normalize_resource_name(name);

        if name.is_empty() || name.split('/').any(|segment| segment == "..") {
            debug!(name = %name, "Rejected static resource name");
            return None;
        }

        let path = directory.join(&name);
        match fs::read(&path).await {
            Ok(data) => {
                trace!(path = ?path, size = data.len(), "Static resource loaded");
                Some(SharedResourceStream::new(Bytes::from(data)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                error!(path = ?path, error = %e, "Error getting static resource");
                None
            }
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }
}

/// Buffered, rewindable stream over a bundled resource.
///
/// Bundled resources are shared by every site, so derived files (resized
/// images and the like) may be named without a site-specific prefix.
#[derive(Debug, Clone)]
pub struct SharedResourceStream {
    cursor: Cursor<Bytes>,
}

impl SharedResourceStream {
    pub fn new(data: Bytes) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Rewind to the beginning of the resource
    pub fn reset(&mut self) {
        self.cursor.set_position(0);
    }

    pub fn is_globally_shared(&self) -> bool {
        true
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full content regardless of the read position
    pub fn bytes(&self) -> Bytes {
        self.cursor.get_ref().clone()
    }
}

impl Read for SharedResourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl BufRead for SharedResourceStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

impl Seek for SharedResourceStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disabled_lookup() {
        let resources = StaticResources::disabled();
        assert!(!resources.is_enabled());
        assert!(resources.get("img/logo.png").await.is_none());
    }

    #[tokio::test]
    async fn test_get_and_reset() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/logo.png"), b"logo").unwrap();

        let resources = StaticResources::new(Some(dir.path().to_path_buf()));
        let mut stream = resources.get("/img/logo.png").await.unwrap();
        assert!(stream.is_globally_shared());

        let mut first = String::new();
        stream.read_to_string(&mut first).unwrap();
        assert_eq!(first, "logo");

        stream.reset();
        let mut second = Vec::new();
        stream.read_to_end(&mut second).unwrap();
        assert_eq!(second, b"logo");
        assert_eq!(stream.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_and_unreadable_resources() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("img")).unwrap();
        let resources = StaticResources::new(Some(dir.path().to_path_buf()));

        assert!(resources.get("missing.png").await.is_none());
        // Reading a directory fails with something other than NotFound
        assert!(resources.get("img").await.is_none());
        assert!(resources.get("../secret").await.is_none());
    }
}
