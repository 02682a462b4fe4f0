//! Read access to a checked-out image filesystem.
//!
//! Paths are container paths: `/etc/os-release` resolves inside the checkout.
//! Only a single leading `/` is stripped; `..` segments are not rejected, so a
//! path can still escape the checkout.

use crate::error::{ImageError, Result};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// How [`ImageFilesystem::open_file`] opens a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    Write,
    Append,
    ReadWrite,
}

impl OpenMode {
    fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::ReadWrite => options.read(true).write(true),
        };
        options
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFilesystem {
    root: PathBuf,
}

impl ImageFilesystem {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute host path of a container path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.strip_prefix('/').unwrap_or(path);
        let resolved = self.root.join(relative);
        debug!("path = {}", resolved.display());
        resolved
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        std::fs::read_to_string(self.resolve(path)).map_err(|source| {
            error!("error while accessing file {}: {}", path, source);
            ImageError::FileAccess {
                path: path.to_string(),
                source,
            }
        })
    }

    pub fn open_file(&self, path: &str, mode: OpenMode) -> Result<File> {
        mode.options()
            .open(self.resolve(path))
            .map_err(|source| ImageError::FileAccess {
                path: path.to_string(),
                source,
            })
    }

    /// `Ok(false)` when nothing is there; an error when something is there
    /// but is not a regular file.
    pub fn file_exists(&self, path: &str) -> Result<bool> {
        match std::fs::metadata(self.resolve(path)) {
            Ok(metadata) if metadata.is_file() => Ok(true),
            Ok(_) => Err(ImageError::NotAFile(path.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ImageError::FileAccess {
                path: path.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn checkout() -> (tempfile::TempDir, ImageFilesystem) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        std::fs::write(dir.path().join("etc/os-release"), "ID=fedora\n").unwrap();
        let fs = ImageFilesystem::new(dir.path().to_path_buf());
        (dir, fs)
    }

    #[test]
    fn resolve_strips_one_leading_separator() {
        let fs = ImageFilesystem::new(PathBuf::from("/stage/checkout"));
        assert_eq!(fs.resolve("/etc/passwd"), PathBuf::from("/stage/checkout/etc/passwd"));
        assert_eq!(fs.resolve("etc/passwd"), PathBuf::from("/stage/checkout/etc/passwd"));
        // Only the first separator goes, so the rest still joins as absolute.
        assert_eq!(fs.resolve("//etc"), PathBuf::from("/etc"));
    }

    #[test]
    fn resolve_does_not_reject_parent_segments() {
        let fs = ImageFilesystem::new(PathBuf::from("/stage/checkout"));
        assert_eq!(
            fs.resolve("/../../secret"),
            PathBuf::from("/stage/checkout/../../secret")
        );
    }

    #[test]
    fn read_file_returns_content() {
        let (_dir, fs) = checkout();
        assert_eq!(fs.read_file("/etc/os-release").unwrap(), "ID=fedora\n");
    }

    #[test]
    fn read_file_failure_wraps_path() {
        let (_dir, fs) = checkout();
        match fs.read_file("/etc/missing") {
            Err(ImageError::FileAccess { path, source }) => {
                assert_eq!(path, "/etc/missing");
                assert_eq!(source.kind(), ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn file_exists_distinguishes_missing_and_directories() {
        let (_dir, fs) = checkout();
        assert!(fs.file_exists("/etc/os-release").unwrap());
        assert!(!fs.file_exists("/etc/shadow").unwrap());
        assert!(matches!(fs.file_exists("/etc"), Err(ImageError::NotAFile(p)) if p == "/etc"));
    }

    #[test]
    fn open_file_honours_mode() {
        let (_dir, fs) = checkout();
        {
            let mut file = fs.open_file("/etc/motd", OpenMode::Write).unwrap();
            file.write_all(b"hello").unwrap();
        }
        {
            let mut file = fs.open_file("/etc/motd", OpenMode::Append).unwrap();
            file.write_all(b" world").unwrap();
        }
        let mut content = String::new();
        fs.open_file("etc/motd", OpenMode::default())
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hello world");

        assert!(matches!(
            fs.open_file("/nope", OpenMode::Read),
            Err(ImageError::FileAccess { .. })
        ));
    }
}
