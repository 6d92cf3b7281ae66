//! Cache keys.
//!
//! A record is keyed on the file's absolute path and is only valid for the
//! modification time it was created from.

use exn::ResultExt;
use std::path::{Component, Path, PathBuf};
use time::UtcDateTime;

use crate::error::{ErrorKind, Result};

/// An image file at a specific point in its modification history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    path: PathBuf,
    /// Milliseconds since the Unix epoch.
    last_modified: i64,
    length: Option<u64>,
}
impl FileIdentity {
    /// Build an identity from an already-known timestamp.
    ///
    /// The path must be absolute; it is normalized lexically (see [`normalize`]).
    pub fn new(path: impl AsRef<Path>, last_modified: i64) -> Result<Self> {
        Ok(Self { path: normalize(path)?, last_modified, length: None })
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    /// Stat `path` and build its current identity.
    ///
    /// Relative paths are resolved against the current working directory.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).or_raise(|| ErrorKind::InvalidPath(path.to_path_buf()))?;
        let metadata = tokio::fs::metadata(&absolute).await.or_raise(|| ErrorKind::Io)?;
        let modified = metadata.modified().or_raise(|| ErrorKind::Io)?;
        Ok(Self::new(absolute, unix_millis(modified.into())?)?.with_length(metadata.len()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// Path as stored in the key column.
    pub(crate) fn key(&self) -> Result<String> {
        key(&self.path)
    }
}

/// Path-keyed operations accept an identity wherever they accept a path.
impl AsRef<Path> for FileIdentity {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

fn unix_millis(datetime: UtcDateTime) -> Result<i64> {
    i64::try_from(datetime.unix_timestamp_nanos() / 1_000_000).or_raise(|| ErrorKind::InvalidData("modification time"))
}

/// Normalize an absolute path without touching the filesystem.
///
/// `.` components are dropped and `..` components pop their parent, so two
/// spellings of the same file share one cache record. Symlinks are *not*
/// resolved. Relative paths, null bytes, and `..` above the root are rejected.
pub fn normalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    if !original.is_absolute() {
        exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
    }
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in original.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                if depth == 0 {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                normalized.pop();
                depth -= 1;
            },
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate
                // the path once it reaches a syscall.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                normalized.push(s);
                depth += 1;
            },
        }
    }
    Ok(normalized)
}

/// Normalized key column value for `path`.
pub(crate) fn key(path: impl AsRef<Path>) -> Result<String> {
    let normalized = normalize(path)?;
    // sqlx can't bind paths, and a lossy conversion would merge distinct keys.
    match normalized.into_os_string().into_string() {
        Ok(key) => Ok(key),
        Err(raw) => exn::bail!(ErrorKind::InvalidPath(PathBuf::from(raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[cfg(unix)]
    #[rstest]
    #[case("/photos/2024/img.jpg", "/photos/2024/img.jpg")]
    #[case("/photos//2024/./img.jpg", "/photos/2024/img.jpg")]
    #[case("/photos/raw/../2024/img.jpg", "/photos/2024/img.jpg")]
    #[case("/photos/2024/", "/photos/2024")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input).unwrap(), Path::new(expected));
    }

    #[cfg(unix)]
    #[rstest]
    #[case("photos/img.jpg")]
    #[case("./img.jpg")]
    #[case("/../img.jpg")]
    #[case("/photos/../../img.jpg")]
    #[case("/photos/a\0b.jpg")]
    fn test_normalize_rejects(#[case] input: &str) {
        let err = normalize(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_identity_keys_on_normalized_path() {
        let a = FileIdentity::new("/photos/./img.jpg", 42).unwrap();
        let b = FileIdentity::new("/photos/img.jpg", 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key().unwrap(), "/photos/img.jpg");
    }

    #[tokio::test]
    async fn test_from_path_reads_metadata() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("img.jpg");
        std::fs::write(&file, b"0123456789").unwrap();
        let identity = FileIdentity::from_path(&file).await.unwrap();
        assert_eq!(identity.length(), Some(10));
        assert!(identity.last_modified() > 0);
        assert!(identity.path().is_absolute());
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = FileIdentity::from_path(temp_dir.path().join("missing.jpg")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io));
    }
}
