//! File Work Area
//!
//! A private temporary directory tree in which callers stage files before
//! promoting them to a storage provider.

use std::path::{Component, Path, PathBuf};

/// Handle to an allocated work area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWorkArea {
    root: PathBuf,
    generated_depth: usize,
}

impl FileWorkArea {
    /// Wrap an existing directory. `generated_depth` is the number of trailing
    /// path segments that were generated for this work area and may be
    /// removed again on close.
    pub fn new(root: impl Into<PathBuf>, generated_depth: usize) -> Self {
        Self {
            root: root.into(),
            generated_depth,
        }
    }

    /// Root directory of the work area
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn generated_depth(&self) -> usize {
        self.generated_depth
    }

    /// Path of `relative` inside the work area
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Whether `path` is an absolute path located under the work area root.
    ///
    /// The check is lexical; paths containing `..` are never accepted.
    pub fn contains(&self, path: &Path) -> bool {
        path.is_absolute()
            && !path.components().any(|c| matches!(c, Component::ParentDir))
            && path.starts_with(&self.root)
            && path != self.root
    }

    /// Provider-relative resource name for a file inside the work area,
    /// always `/`-separated and without a leading separator.
    pub fn resource_name(&self, path: &Path) -> Option<String> {
        if !self.contains(path) {
            return None;
        }

        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(segments.join("/"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_area() -> FileWorkArea {
        FileWorkArea::new("/tmp/commerce/1f/a0", 2)
    }

    #[test]
    fn test_contains() {
        let wa = work_area();

        assert!(wa.contains(Path::new("/tmp/commerce/1f/a0/sitemap.xml")));
        assert!(wa.contains(Path::new("/tmp/commerce/1f/a0/img/small/logo.png")));
        assert!(!wa.contains(Path::new("/tmp/commerce/1f/a0")));
        assert!(!wa.contains(Path::new("/tmp/commerce/1f/a00/file.txt")));
        assert!(!wa.contains(Path::new("/tmp/commerce/1f/other.txt")));
        assert!(!wa.contains(Path::new("sitemap.xml")));
        assert!(!wa.contains(Path::new("/tmp/commerce/1f/a0/../../../etc/passwd")));
    }

    #[test]
    fn test_resource_name() {
        let wa = work_area();

        assert_eq!(
            wa.resource_name(&wa.resolve("img/small/logo.png")).as_deref(),
            Some("img/small/logo.png")
        );
        assert_eq!(wa.resource_name(Path::new("/etc/passwd")), None);
    }
}
