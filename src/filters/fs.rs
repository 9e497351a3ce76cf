//! File transfer
//!
//! Turns an entry of a [`ServeFileSystem`] into a response: index files,
//! directory listings, canonical redirects, conditional requests and byte
//! ranges.

use std::fmt::Write as _;
use std::io;
use std::pin::Pin;
use std::task::Poll;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use futures_util::future::Either;
use futures_util::{future, ready, stream, FutureExt, Stream, StreamExt};
use headers::{
    AcceptRanges, ContentLength, ContentRange, ContentType, ETag, HeaderMapExt, IfMatch,
    IfModifiedSince, IfNoneMatch, IfRange, IfUnmodifiedSince, LastModified, Range,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tokio::fs::File as TkFile;
use tokio::io::AsyncSeekExt;
use tokio_util::io::poll_read_buf;
use warp::http::header::{IntoHeaderName, CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use warp::http::{HeaderMap, HeaderValue, Method, StatusCode};
use warp::hyper::Body;
use warp::reject::{self, Rejection};
use warp::reply::Response;

use crate::store::{Content, File, Listing, Node, ServeFileSystem, INDEX};

/// Configuration for the [`serve`](crate::serve) filters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Set a specific read buffer size (default auto detect)
    pub read_buffer_size: Option<usize>,
    /// Include the LastModified header in the response
    pub last_modified: bool,
    /// Include a weak Etag header in the response
    pub etag: bool,
    /// extra headers to add to every file response
    pub headers: HeaderMap<HeaderValue>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_buffer_size: None,
            last_modified: true,
            etag: false,
            headers: HeaderMap::new(),
        }
    }
}

impl Config {
    /// Override the read buffer size used for files on disk
    pub fn read_buffer_size(mut self, size: Option<usize>) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Override the last_modified exposure
    pub fn last_modified(mut self, last_modified: bool) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Override the etag exposure
    pub fn etag(mut self, etag: bool) -> Self {
        self.etag = etag;
        self
    }

    /// Add additional headers
    pub fn add_header(mut self, key: impl IntoHeaderName, value: HeaderValue) -> Self {
        self.headers.insert(key, value);
        self
    }
}

/// Creates a new configuration for a filter that serves a store.
///
/// # Example
///
/// ```
/// use warp::http::HeaderValue;
///
/// let route = warp_static::config()
///     .etag(true)
///     .add_header("cache-control", HeaderValue::from_static("max-age=3600"))
///     .serve("/assets/", warp_static::local_file("/www/assets", false));
/// ```
pub fn config() -> Config {
    Config::default()
}

#[derive(Debug, Default)]
pub(crate) struct Conditionals {
    if_modified_since: Option<IfModifiedSince>,
    if_unmodified_since: Option<IfUnmodifiedSince>,
    if_range: Option<IfRange>,
    range: Option<Range>,
    if_match: Option<IfMatch>,
    if_none_match: Option<IfNoneMatch>,
}

enum Cond {
    NoBody(Response),
    WithBody(Option<Range>),
}

impl Conditionals {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Conditionals {
        Conditionals {
            if_modified_since: headers.typed_get(),
            if_unmodified_since: headers.typed_get(),
            if_range: headers.typed_get(),
            range: headers.typed_get(),
            if_match: headers.typed_get(),
            if_none_match: headers.typed_get(),
        }
    }

    fn check(self, config: &Config, etag: Option<&ETag>, last_modified: Option<LastModified>) -> Cond {
        if let Some(tag_match) = self.if_match {
            let precondition = etag
                .map(|tag| tag_match.precondition_passes(tag))
                .unwrap_or(false);

            tracing::trace!(
                "if-match? header = {:?}, file = {:?}, result = {}",
                tag_match,
                etag,
                precondition
            );
            if !precondition {
                return Cond::NoBody(status(StatusCode::PRECONDITION_FAILED));
            }
        }

        if let Some(tag_match) = self.if_none_match {
            // no etag means its always unmatched
            let matched = etag.filter(|tag| !tag_match.precondition_passes(tag));

            tracing::trace!(
                "if-none-match? header = {:?}, file = {:?}, result = {}",
                tag_match,
                etag,
                matched.is_some()
            );
            if let Some(tag) = matched {
                let mut res = status(StatusCode::NOT_MODIFIED);
                res.headers_mut().typed_insert(tag.clone());
                if let Some(cache) = config.headers.get(CACHE_CONTROL) {
                    res.headers_mut().insert(CACHE_CONTROL, cache.clone());
                }
                return Cond::NoBody(res);
            }
        }

        if let Some(since) = self.if_unmodified_since {
            let precondition = last_modified
                .map(|time| since.precondition_passes(time.into()))
                .unwrap_or(false);

            tracing::trace!(
                "if-unmodified-since? header = {:?}, file = {:?}, result = {}",
                since,
                last_modified,
                precondition
            );
            if !precondition {
                return Cond::NoBody(status(StatusCode::PRECONDITION_FAILED));
            }
        }

        if let Some(since) = self.if_modified_since {
            // no last_modified means its always modified
            let unmodified = last_modified
                .map(|time| !since.is_modified(time.into()))
                .unwrap_or(false);

            tracing::trace!(
                "if-modified-since? header = {:?}, file = {:?}, result = {}",
                since,
                last_modified,
                unmodified
            );
            if unmodified {
                return Cond::NoBody(status(StatusCode::NOT_MODIFIED));
            }
        }

        if let Some(if_range) = self.if_range {
            let can_range = !if_range.is_modified(etag, last_modified.as_ref());

            tracing::trace!(
                "if-range? header = {:?}, file = {:?},{:?}, result = {}",
                if_range,
                etag,
                last_modified,
                can_range
            );

            if !can_range {
                return Cond::WithBody(None);
            }
        }

        Cond::WithBody(self.range)
    }
}

/// Serves `path` out of `store`.
///
/// `request_path` is the full decoded path of the request, used to build
/// redirects. `path` is the same path with the mount prefix removed.
pub(crate) async fn reply(
    store: &dyn ServeFileSystem,
    method: &Method,
    request_path: &str,
    path: &str,
    conditionals: Conditionals,
    config: &Config,
) -> Result<Response, Rejection> {
    // The stripped path is rooted at `/`, so a text prefix like `/static`
    // still collapses `/staticindex.html`. The redirect goes to `./`.
    if path == INDEX || path.ends_with(&format!("/{}", INDEX)) {
        let parent = request_path
            .rfind('/')
            .map_or("/", |at| &request_path[..=at]);
        tracing::debug!("fs: collapsing {:?} to {:?}", request_path, parent);
        return Ok(redirect(parent));
    }

    let listing = match open(store, path).await? {
        Node::File(file) => {
            if request_path.len() > 1 && request_path.ends_with('/') {
                let canonical = request_path.trim_end_matches('/');
                return Ok(redirect(if canonical.is_empty() { "/" } else { canonical }));
            }
            return Ok(file_reply(file, method, path, conditionals, config));
        }
        Node::Dir(listing) => listing,
    };

    if !request_path.ends_with('/') {
        return Ok(redirect(&format!("{}/", request_path)));
    }

    let index = format!("{}/{}", path.trim_end_matches('/'), INDEX);
    match store.open(&index).await {
        Ok(Node::File(file)) => Ok(file_reply(file, method, &index, conditionals, config)),
        Ok(Node::Dir(_)) | Err(_) => {
            tracing::trace!("fs: no {} in {:?}, listing", INDEX, path);
            Ok(listing_reply(method, &listing))
        }
    }
}

async fn open(store: &dyn ServeFileSystem, path: &str) -> Result<Node, Rejection> {
    store.open(path).await.map_err(|err| match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => {
            tracing::debug!("file not found: {:?}", path);
            reject::not_found()
        }
        io::ErrorKind::PermissionDenied => {
            tracing::warn!("file permission denied: {:?}", path);
            reject::custom(FilePermissionError::new())
        }
        _ => {
            tracing::error!("file open error (path={:?}): {} ", path, err);
            reject::custom(FileOpenError::new())
        }
    })
}

fn file_reply(
    file: File,
    method: &Method,
    name: &str,
    conditionals: Conditionals,
    config: &Config,
) -> Response {
    let mut len = file.len();
    let modified = file.modified().map(LastModified::from);
    let etag = if config.etag {
        file.modified().and_then(|modified| weak_etag(len, modified))
    } else {
        None
    };

    let range = match conditionals.check(config, etag.as_ref(), modified) {
        Cond::NoBody(resp) => return resp,
        Cond::WithBody(range) => range,
    };

    let (start, end) = match bytes_range(range, len) {
        Ok(range) => range,
        Err(BadRange) => {
            let mut resp = status(StatusCode::RANGE_NOT_SATISFIABLE);
            resp.headers_mut()
                .typed_insert(ContentRange::unsatisfied_bytes(len));
            return resp;
        }
    };

    let sub_len = end - start;
    let body = if *method == Method::HEAD {
        Body::empty()
    } else {
        let buf_size = config.read_buffer_size.unwrap_or_else(|| file.buf_size());
        match file.into_content() {
            Content::Disk(f) => Body::wrap_stream(file_stream(f, buf_size, (start, end))),
            Content::Static(bytes) => {
                Body::from(Bytes::from_static(&bytes[start as usize..end as usize]))
            }
        }
    };

    let mut resp = Response::new(body);

    if sub_len != len {
        *resp.status_mut() = StatusCode::PARTIAL_CONTENT;
        if let Ok(content_range) = ContentRange::bytes(start..end, len) {
            resp.headers_mut().typed_insert(content_range);
        }
        len = sub_len;
    }

    let content_type = ContentType::from(mime_guess::from_path(name).first_or_octet_stream());

    resp.headers_mut().typed_insert(ContentLength(len));
    resp.headers_mut().typed_insert(content_type);
    resp.headers_mut().typed_insert(AcceptRanges::bytes());

    if config.last_modified {
        if let Some(last_modified) = modified {
            resp.headers_mut().typed_insert(last_modified);
        }
    }

    if let Some(etag) = etag {
        resp.headers_mut().typed_insert(etag);
    }

    for (k, v) in config.headers.iter() {
        resp.headers_mut().insert(k, v.clone());
    }

    resp
}

// do a quick weak etag based on size and modified stamp
fn weak_etag(len: u64, modified: SystemTime) -> Option<ETag> {
    let since = modified.duration_since(SystemTime::UNIX_EPOCH).ok()?;
    format!("W/\"{:x}-{:x}{:08x}\"", len, since.as_secs(), since.subsec_nanos())
        .parse()
        .ok()
}

fn status(status: StatusCode) -> Response {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = status;
    res
}

// Characters escaped when a decoded path goes back into a header or href.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn redirect(location: &str) -> Response {
    let mut res = status(StatusCode::MOVED_PERMANENTLY);
    let location = utf8_percent_encode(location, PATH).to_string();
    if let Ok(value) = HeaderValue::from_str(&location) {
        res.headers_mut().insert(LOCATION, value);
    }
    res
}

fn listing_reply(method: &Method, listing: &Listing) -> Response {
    let html = render_listing(listing);
    let len = html.len() as u64;
    let mut res = if *method == Method::HEAD {
        Response::new(Body::empty())
    } else {
        Response::new(Body::from(html))
    };
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    res.headers_mut().typed_insert(ContentLength(len));
    res
}

fn render_listing(listing: &Listing) -> String {
    let mut html = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for name in listing.entries() {
        let href = utf8_percent_encode(name, PATH);
        let _ = writeln!(html, "<a href=\"{}\">{}</a>", href, escape_html(name));
    }
    html.push_str("</pre>\n");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

struct BadRange;

fn bytes_range(range: Option<Range>, max_len: u64) -> Result<(u64, u64), BadRange> {
    use std::ops::Bound;

    let range = if let Some(range) = range {
        range
    } else {
        return Ok((0, max_len));
    };

    let ret = range
        .iter()
        .map(|(start, end)| {
            let start = match start {
                Bound::Unbounded => 0,
                Bound::Included(s) => s,
                Bound::Excluded(s) => match s.checked_add(1) {
                    Some(s) => s,
                    None => return Err(BadRange),
                },
            };

            let end = match end {
                Bound::Unbounded => max_len,
                Bound::Included(s) => {
                    // For the special case where s == the file size
                    if s == max_len {
                        s
                    } else {
                        s.saturating_add(1)
                    }
                }
                Bound::Excluded(s) => s,
            };

            if start < end && end <= max_len {
                Ok((start, end))
            } else {
                tracing::trace!("unsatisfiable byte range: {}-{}/{}", start, end, max_len);
                Err(BadRange)
            }
        })
        .next()
        .unwrap_or(Ok((0, max_len)));
    ret
}

fn file_stream(
    mut file: TkFile,
    buf_size: usize,
    (start, end): (u64, u64),
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send {
    use std::io::SeekFrom;

    let seek = async move {
        if start != 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }
        Ok(file)
    };

    seek.into_stream()
        .map(move |result| {
            let mut buf = BytesMut::new();
            let mut len = end - start;
            let mut f = match result {
                Ok(f) => f,
                Err(f) => return Either::Left(stream::once(future::err(f))),
            };

            Either::Right(stream::poll_fn(move |cx| {
                if len == 0 {
                    return Poll::Ready(None);
                }
                reserve_at_least(&mut buf, buf_size);

                let n = match ready!(poll_read_buf(Pin::new(&mut f), cx, &mut buf)) {
                    Ok(n) => n as u64,
                    Err(err) => {
                        tracing::debug!("file read error: {}", err);
                        return Poll::Ready(Some(Err(err)));
                    }
                };

                if n == 0 {
                    tracing::debug!("file read found EOF before expected length");
                    return Poll::Ready(None);
                }

                let mut chunk = buf.split().freeze();
                if n > len {
                    chunk = chunk.split_to(len as usize);
                    len = 0;
                } else {
                    len -= n;
                }

                Poll::Ready(Some(Ok(chunk)))
            }))
        })
        .flatten()
}

fn reserve_at_least(buf: &mut BytesMut, cap: usize) {
    if buf.capacity() - buf.len() < cap {
        buf.reserve(cap);
    }
}

// ===== Rejections =====

unit_error! {
    /// A file existed but could not be opened.
    pub FileOpenError: "file open error"
}

unit_error! {
    /// A file existed but the process may not read it.
    pub FilePermissionError: "file permission error"
}
