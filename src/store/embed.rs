use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use include_dir::{Dir, DirEntry};

use super::{File, Listing, Node, ServeFileSystem};

/// Creates a store over a bundle of files embedded with
/// [`include_dir!`](include_dir::include_dir).
///
/// With an empty `sub_path` the whole bundle is exposed. Otherwise the bundle
/// is re-rooted at `sub_path`, so `sub_path/app.js` is served as `app.js`.
///
/// # Errors
///
/// Fails with [`io::ErrorKind::NotFound`] if `sub_path` is not part of the
/// bundle. The check happens here rather than on the first request.
///
/// # Example
///
/// ```
/// use include_dir::{include_dir, Dir};
///
/// static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/src");
///
/// let store = warp_static::embed_folder(&ASSETS, "store").expect("embedded store");
/// let route = warp_static::serve("/", store);
/// ```
pub fn embed_folder(bundle: &'static Dir<'static>, sub_path: &str) -> io::Result<EmbedFolder> {
    let target = sub_path.trim();
    if target.is_empty() {
        return Ok(EmbedFolder {
            bundle,
            root: PathBuf::new(),
        });
    }

    // Re-rooting is only a path join, so a missing sub path would otherwise
    // surface as a 404 on every request.
    let root = match resolve(Path::new(""), target) {
        Some(root) if lookup(bundle, &root).is_some() => root,
        _ => {
            tracing::debug!("embed: sub path {:?} is not in the bundle", target);
            return Err(not_exist(target));
        }
    };

    Ok(EmbedFolder { bundle, root })
}

/// A [`ServeFileSystem`] over a tree of files compiled into the binary.
#[derive(Clone, Debug)]
pub struct EmbedFolder {
    bundle: &'static Dir<'static>,
    root: PathBuf,
}

impl EmbedFolder {
    /// Where in the bundle this store is rooted. Empty for the whole bundle.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, path: &str) -> io::Result<Entry> {
        let name = resolve(&self.root, path).ok_or_else(|| not_exist(path))?;
        lookup(self.bundle, &name).ok_or_else(|| not_exist(path))
    }
}

#[async_trait]
impl ServeFileSystem for EmbedFolder {
    async fn open(&self, path: &str) -> io::Result<Node> {
        let node = match self.entry(path)? {
            Entry::File(file) => Node::File(File::embedded(file.contents())),
            Entry::Dir(dir) => Node::Dir(listing(dir)),
        };
        Ok(node)
    }

    async fn exists(&self, prefix: &str, path: &str) -> bool {
        match path.strip_prefix(prefix) {
            Some(rest) => self.entry(rest).is_ok(),
            None => false,
        }
    }
}

enum Entry {
    File(&'static include_dir::File<'static>),
    Dir(&'static Dir<'static>),
}

// Entries of an include_dir bundle are addressed by their full path from the
// top of the bundle, whatever directory they are looked up from.
fn lookup(bundle: &'static Dir<'static>, name: &Path) -> Option<Entry> {
    if name.as_os_str().is_empty() {
        return Some(Entry::Dir(bundle));
    }
    match bundle.get_entry(name)? {
        DirEntry::File(file) => Some(Entry::File(file)),
        DirEntry::Dir(dir) => Some(Entry::Dir(dir)),
    }
}

fn resolve(root: &Path, path: &str) -> Option<PathBuf> {
    let mut buf = root.to_path_buf();
    for seg in path.split('/') {
        match seg {
            "" | "." => continue,
            ".." => return None,
            _ if seg.contains('\\') => return None,
            _ => buf.push(seg),
        }
    }
    // `push` of an absolute-looking segment would replace the root.
    if buf.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(buf)
}

fn listing(dir: &'static Dir<'static>) -> Listing {
    let names = dir
        .entries()
        .iter()
        .filter_map(|entry| {
            let name = entry.path().file_name()?.to_string_lossy().into_owned();
            Some(match entry {
                DirEntry::Dir(_) => name + "/",
                DirEntry::File(_) => name,
            })
        })
        .collect();
    Listing::new(names)
}

fn not_exist(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("open {}: file does not exist", name),
    )
}
