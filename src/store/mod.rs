//! File stores
//!
//! A [`ServeFileSystem`] is anything the [`serve`](crate::serve) filter can
//! read files out of. Two stores ship with this crate:
//!
//! - [`LocalFileSystem`], a directory on the local disk, created with
//!   [`local_file`].
//! - [`EmbedFolder`], a tree of files compiled into the binary with
//!   [`include_dir!`](include_dir::include_dir), created with
//!   [`embed_folder`].

use std::cmp;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs::File as TkFile;

pub use self::embed::{embed_folder, EmbedFolder};
pub use self::local::{local_file, LocalFileSystem};

mod embed;
mod local;

/// The file every directory is checked for before listing it.
pub const INDEX: &str = "index.html";

/// A backing store that files can be served from.
///
/// `exists` decides whether a request is handled at all. When it returns
/// `true`, an `open` of the request path with `prefix` stripped must succeed,
/// unless the store changes in between.
#[async_trait]
pub trait ServeFileSystem: Send + Sync + 'static {
    /// Opens `path`, relative to the root of the store, for reading.
    ///
    /// Fails with [`io::ErrorKind::NotFound`] when nothing lives at `path`.
    async fn open(&self, path: &str) -> io::Result<Node>;

    /// Whether the request path `path`, mounted under `prefix`, can be served.
    ///
    /// Failures of any kind are reported as `false`.
    async fn exists(&self, prefix: &str, path: &str) -> bool;
}

/// An opened entry of a store.
#[derive(Debug)]
pub enum Node {
    /// A regular file.
    File(File),
    /// A directory, with the entries it is allowed to show.
    Dir(Listing),
}

/// A readable file handle.
///
/// Disk-backed handles hold an open file descriptor, released when the
/// `File` is dropped.
pub struct File {
    len: u64,
    modified: Option<SystemTime>,
    buf_size: usize,
    content: Content,
}

pub(crate) enum Content {
    Disk(TkFile),
    Static(&'static [u8]),
}

impl File {
    pub(crate) fn disk(file: TkFile, metadata: &std::fs::Metadata) -> File {
        File {
            len: metadata.len(),
            modified: metadata.modified().ok(),
            buf_size: optimal_buf_size(metadata),
            content: Content::Disk(file),
        }
    }

    pub(crate) fn embedded(contents: &'static [u8]) -> File {
        File {
            len: contents.len() as u64,
            modified: None,
            buf_size: DEFAULT_READ_BUF_SIZE,
            content: Content::Static(contents),
        }
    }

    /// Length of the file in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the file has no content.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Last modification time, if the store knows it.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub(crate) fn buf_size(&self) -> usize {
        self.buf_size
    }

    pub(crate) fn into_content(self) -> Content {
        self.content
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.content {
            Content::Disk(_) => "disk",
            Content::Static(_) => "embedded",
        };
        f.debug_struct("File")
            .field("len", &self.len)
            .field("modified", &self.modified)
            .field("source", &source)
            .finish()
    }
}

/// Names inside a directory, sorted. Subdirectories end in `/`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing {
    entries: Vec<String>,
}

impl Listing {
    pub(crate) fn new(mut entries: Vec<String>) -> Listing {
        entries.sort();
        Listing { entries }
    }

    /// The entry names of this directory.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

/// Joins a request path onto `base`, refusing segments that could climb out
/// of it.
pub(crate) fn sanitize_path(base: impl AsRef<Path>, path: &str) -> io::Result<PathBuf> {
    let mut buf = PathBuf::from(base.as_ref());
    tracing::trace!("sanitize: base={:?}, path={:?}", base.as_ref(), path);
    for seg in path.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        } else if seg.starts_with("..") {
            tracing::warn!("sanitize: rejecting segment starting with '..'");
            return Err(invalid_path());
        } else if seg.contains('\\') {
            tracing::warn!("sanitize: rejecting segment containing backslash (\\)");
            return Err(invalid_path());
        } else if cfg!(windows) && seg.contains(':') {
            tracing::warn!("sanitize: rejecting segment containing colon (:)");
            return Err(invalid_path());
        } else {
            buf.push(seg);
        }
    }
    Ok(buf)
}

fn invalid_path() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "invalid character in file path")
}

const DEFAULT_READ_BUF_SIZE: usize = 8_192;

fn optimal_buf_size(metadata: &std::fs::Metadata) -> usize {
    let block_size = get_block_size(metadata);

    // A file shorter than a block doesn't need a block-sized buffer.
    cmp::max(cmp::min(block_size as u64, metadata.len()) as usize, 1)
}

#[cfg(unix)]
fn get_block_size(metadata: &std::fs::Metadata) -> usize {
    use std::os::unix::fs::MetadataExt;

    cmp::max(metadata.blksize() as usize, DEFAULT_READ_BUF_SIZE)
}

#[cfg(not(unix))]
fn get_block_size(_metadata: &std::fs::Metadata) -> usize {
    DEFAULT_READ_BUF_SIZE
}

#[cfg(test)]
mod tests {
    use super::{sanitize_path, Listing};
    use std::io;
    use std::path::Path;

    #[test]
    fn test_sanitize_path() {
        let base = "/var/www";

        assert_eq!(
            sanitize_path(base, "/foo.html").unwrap(),
            Path::new("/var/www/foo.html")
        );
        assert_eq!(
            sanitize_path(base, "css//./app.css").unwrap(),
            Path::new("/var/www/css/app.css")
        );
        assert_eq!(sanitize_path(base, "/").unwrap(), Path::new("/var/www"));

        // bad paths
        let err = sanitize_path(base, "/../foo.html").expect_err("dot dot");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        sanitize_path(base, "/C:\\/foo.html").expect_err("C:\\");
    }

    #[test]
    fn listing_is_sorted() {
        let listing = Listing::new(vec!["b.txt".into(), "a/".into(), "c.js".into()]);
        assert_eq!(listing.entries(), ["a/", "b.txt", "c.js"]);
    }
}
