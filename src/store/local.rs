use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File as TkFile;

use super::{sanitize_path, File, Listing, Node, ServeFileSystem, INDEX};

/// Creates a store over the directory at `root`.
///
/// The directory is not checked here. A missing `root` simply makes every
/// lookup fail, so it may be created after the filter is built.
///
/// A directory without an `index.html` is only served (as a listing) when
/// `indexes` is `true`.
///
/// # Example
///
/// ```
/// let route = warp_static::serve("/static", warp_static::local_file("/www/static", false));
/// ```
pub fn local_file(root: impl Into<PathBuf>, indexes: bool) -> LocalFileSystem {
    LocalFileSystem {
        root: root.into(),
        indexes,
    }
}

/// A [`ServeFileSystem`] over a directory of the local disk.
#[derive(Clone, Debug)]
pub struct LocalFileSystem {
    root: PathBuf,
    indexes: bool,
}

impl LocalFileSystem {
    /// The directory files are served from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether directories without an index file are listed.
    pub fn indexes(&self) -> bool {
        self.indexes
    }

    async fn read_listing(&self, dir: &Path) -> io::Result<Listing> {
        if !self.indexes {
            return Ok(Listing::default());
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        Ok(Listing::new(names))
    }
}

#[async_trait]
impl ServeFileSystem for LocalFileSystem {
    async fn open(&self, path: &str) -> io::Result<Node> {
        let buf = sanitize_path(&self.root, path)?;
        tracing::trace!("local: open {:?}", buf);

        if tokio::fs::metadata(&buf).await?.is_dir() {
            return self.read_listing(&buf).await.map(Node::Dir);
        }

        let file = TkFile::open(&buf).await?;
        let metadata = file.metadata().await?;
        Ok(Node::File(File::disk(file, &metadata)))
    }

    async fn exists(&self, prefix: &str, path: &str) -> bool {
        let rest = match path.strip_prefix(prefix) {
            Some(rest) => rest,
            None => return false,
        };

        let name = match sanitize_path(&self.root, rest) {
            Ok(name) => name,
            Err(_) => return false,
        };

        let metadata = match tokio::fs::metadata(&name).await {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::trace!("local: stat {:?} failed: {}", name, err);
                return false;
            }
        };

        if metadata.is_dir() && !self.indexes {
            let index = name.join(INDEX);
            let found = tokio::fs::metadata(&index).await.is_ok();
            if !found {
                tracing::debug!("local: directory {:?} has no {}", name, INDEX);
            }
            return found;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_root_is_lazy() {
        let store = local_file("definitely/not/a/real/root", true);
        assert_eq!(store.root(), Path::new("definitely/not/a/real/root"));
        assert!(!store.exists("/", "/").await);

        let err = store.open("/anything").await.expect_err("missing root");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn prefix_must_match() {
        let store = local_file("src", false);
        assert!(store.exists("/src/", "/src/lib.rs").await);
        assert!(!store.exists("/assets/", "/src/lib.rs").await);
    }

    #[tokio::test]
    async fn traversal_is_not_servable() {
        let store = local_file("src", true);
        assert!(!store.exists("/", "/../Cargo.toml").await);

        let err = store.open("/../Cargo.toml").await.expect_err("dot dot");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
