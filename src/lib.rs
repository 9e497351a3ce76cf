#![doc(html_root_url = "https://docs.rs/warp-static/0.1.0")]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

//! # warp-static
//!
//! Static file filters for [warp](https://docs.rs/warp), serving either a
//! directory on disk or files compiled into the binary.
//!
//! A store answers two questions: can this request path be served, and what
//! is at this path. The [`serve`] filter asks the first question and rejects
//! with "not found" when the answer is no, so routes combined after it with
//! `or` still run. Otherwise the file is sent with the usual static file
//! behavior: `index.html` for directories, redirects to canonical paths,
//! `Content-Type` from the extension, conditional requests and byte ranges.
//!
//! ## Stores
//!
//! - [`local_file`]: a directory on the local disk. Directories without an
//!   `index.html` are only listed when asked for.
//! - [`embed_folder`]: a directory embedded with
//!   [`include_dir!`](include_dir::include_dir), optionally re-rooted at a sub
//!   folder.
//!
//! ## Example
//!
//! ```no_run
//! use include_dir::{include_dir, Dir};
//! use warp::{http::Uri, Filter};
//!
//! static PUBLIC: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/src");
//!
//! #[tokio::main]
//! async fn main() {
//!     let uploads = warp_static::serve("/uploads/", warp_static::local_file("uploads", true));
//!     let site = warp_static::serve_embed("store", &PUBLIC);
//!     let fallback = warp::any().map(|| warp::redirect(Uri::from_static("/")));
//!
//!     warp::serve(uploads.or(site).or(fallback))
//!         .run(([127, 0, 0, 1], 3030))
//!         .await;
//! }
//! ```

#[macro_use]
mod macros;
mod filters;
pub mod store;

pub use self::filters::fs::{config, Config, FileOpenError, FilePermissionError};
pub use self::filters::serve::{serve, serve_embed};
pub use self::store::{
    embed_folder, local_file, EmbedFolder, LocalFileSystem, ServeFileSystem,
};
