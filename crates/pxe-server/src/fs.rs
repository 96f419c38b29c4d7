//! Filesystem access for the TFTP engine and the boot file selector.
//!
//! Every path handed to a client is resolved against a root directory with
//! [`resolve_path`]; the engine never touches anything outside of it.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncRead, BufReader};

use crate::error::TransferError;

/// Sequential reader over an opened boot file.
pub trait BlockReader: AsyncRead + Send + Sync + Unpin {}

impl<T: AsyncRead + Send + Sync + Unpin> BlockReader for T {}

/// Filesystem primitives consumed by the TFTP engine.
///
/// All methods take paths previously returned by [`FileStore::resolve`].
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Directory every request is resolved against.
    fn root(&self) -> &Path;

    /// Maps a client supplied file name onto a path below [`FileStore::root`].
    ///
    /// # Errors
    ///
    /// See [`resolve_path`].
    fn resolve(&self, name: &str) -> Result<PathBuf, TransferError> {
        resolve_path(self.root(), name)
    }

    async fn exists(&self, path: &Path) -> bool;

    async fn size(&self, path: &Path) -> io::Result<u64>;

    /// Opens `path` for buffered reading, positioned at its first byte.
    async fn open(&self, path: &Path) -> io::Result<Box<dyn BlockReader>>;
}

/// Resolves `name` below `root`.
///
/// Windows clients (WDS) ask for `Boot\x86\wdsnbp.com`, so backslashes are
/// treated as separators. Leading separators and `.` segments are ignored.
///
/// # Errors
///
/// * [`TransferError::NotFound`] if nothing but separators is left of `name`
/// * [`TransferError::AccessViolation`] if `name` has `..` or a drive prefix
pub fn resolve_path(root: &Path, name: &str) -> Result<PathBuf, TransferError> {
    let normalized = name.replace('\\', "/");
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(normalized.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(segment);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TransferError::AccessViolation(name.to_string()));
            }
        }
    }

    if depth == 0 {
        return Err(TransferError::NotFound(name.to_string()));
    }
    Ok(resolved)
}

/// [`FileStore`] backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    read_buffer: usize,
}

impl LocalFileStore {
    /// # Arguments
    /// * `root` - TFTP root directory
    /// * `read_buffer` - capacity of the buffered reader wrapped around each opened file
    pub fn new(root: impl Into<PathBuf>, read_buffer: usize) -> Self {
        Self {
            root: root.into(),
            read_buffer: read_buffer.max(1),
        }
    }

    /// Creates the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok_and(|meta| meta.is_file())
    }

    async fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    async fn open(&self, path: &Path) -> io::Result<Box<dyn BlockReader>> {
        let file = fs::File::open(path).await?;
        Ok(Box::new(BufReader::with_capacity(self.read_buffer, file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_resolve_plain_and_windows_paths() {
        let root = Path::new("/srv/tftp");
        assert_eq!(
            resolve_path(root, "boot.bin").unwrap(),
            PathBuf::from("/srv/tftp/boot.bin")
        );
        assert_eq!(
            resolve_path(root, "\\Boot\\x86\\wdsnbp.com").unwrap(),
            PathBuf::from("/srv/tftp/Boot/x86/wdsnbp.com")
        );
        assert_eq!(
            resolve_path(root, "/./pxelinux.0").unwrap(),
            PathBuf::from("/srv/tftp/pxelinux.0")
        );
    }

    #[test]
    fn test_resolve_rejects_empty_and_traversal() {
        let root = Path::new("/srv/tftp");
        assert!(matches!(resolve_path(root, ""), Err(TransferError::NotFound(_))));
        assert!(matches!(resolve_path(root, "//"), Err(TransferError::NotFound(_))));
        assert!(matches!(
            resolve_path(root, "../etc/passwd"),
            Err(TransferError::AccessViolation(_))
        ));
        assert!(matches!(
            resolve_path(root, "Boot\\..\\..\\secret"),
            Err(TransferError::AccessViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("boot.bin"), b"0123456789").unwrap();

        let store = LocalFileStore::new(dir.path(), 4);
        let path = store.resolve("boot.bin").unwrap();
        assert!(store.exists(&path).await);
        assert_eq!(store.size(&path).await.unwrap(), 10);

        let mut reader = store.open(&path).await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"0123456789");

        assert!(!store.exists(&store.resolve("missing.bin").unwrap()).await);
        assert!(!store.exists(dir.path()).await, "Directories are not files");
    }

    #[tokio::test]
    async fn test_ensure_root_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().join("TFTPRoot"), 512);
        store.ensure_root().await.unwrap();
        assert!(dir.path().join("TFTPRoot").is_dir());
    }
}
