//! Serve filters

use std::sync::Arc;

use include_dir::Dir;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use warp::filters::BoxedFilter;
use warp::http::{HeaderMap, Method, StatusCode};
use warp::path::FullPath;
use warp::reject::{self, Rejection};
use warp::reply::Response;
use warp::{Filter, Reply};

use super::fs::{self, config, Conditionals, Config};
use crate::store::{embed_folder, ServeFileSystem};

/// Creates a `Filter` that serves files of `store` under `prefix`.
///
/// `prefix` is stripped from the request path as plain text before asking the
/// store for a file; it is not matched segment by segment.
///
/// Requests the store can't serve are rejected as not found, so any filter
/// combined after this one with `or` gets a chance to handle them. Only `GET`
/// and `HEAD` are served.
///
/// See also [config]
///
/// # Example
///
/// ```
/// use warp::Filter;
///
/// // `GET /static/app.js` serves `/www/static/app.js`,
/// // everything else falls through to `fallback`.
/// let fallback = warp::any().map(|| "fallback");
/// let route = warp_static::serve("/static/", warp_static::local_file("/www/static", false))
///     .or(fallback);
/// ```
pub fn serve(
    prefix: &str,
    store: impl ServeFileSystem,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    config().serve(prefix, store)
}

/// Creates a `Filter` that serves the `sub_path` folder of an embedded bundle
/// at `/`.
///
/// This never fails. If `sub_path` is not in the bundle, the error is logged
/// and every request is answered with a `500 Internal Server Error` carrying
/// the error as JSON:
///
/// ```json
/// {"message":"initialization of embed folder failed","error":"open public/page: file does not exist"}
/// ```
///
/// # Example
///
/// ```
/// use include_dir::{include_dir, Dir};
///
/// static PUBLIC: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/src");
///
/// let route = warp_static::serve_embed("store", &PUBLIC);
/// ```
pub fn serve_embed(sub_path: &str, bundle: &'static Dir<'static>) -> BoxedFilter<(Response,)> {
    match embed_folder(bundle, sub_path) {
        Ok(store) => serve("/", store).boxed(),
        Err(err) => {
            tracing::error!("initialization of embed folder failed: {}", err);
            let failure = InitFailure {
                message: "initialization of embed folder failed",
                error: err.to_string(),
            };
            warp::any()
                .map(move || failure.reply())
                .boxed()
        }
    }
}

impl Config {
    /// Creates a `Filter` that serves files of `store` under `prefix`, using
    /// this configuration.
    ///
    /// See [serve] for the matching rules.
    pub fn serve(
        self,
        prefix: &str,
        store: impl ServeFileSystem,
    ) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        let mount = Arc::new(Mount {
            prefix: prefix.to_owned(),
            store: Arc::new(store),
            config: self,
        });
        tracing::debug!("serve: mounting store at {:?}", mount.prefix);

        warp::method()
            .and(warp::path::full())
            .and(warp::header::headers_cloned())
            .and_then(move |method: Method, full: FullPath, headers: HeaderMap| {
                let mount = mount.clone();
                async move { mount.handle(method, full, headers).await }
            })
    }
}

// A store bound to the URL prefix it answers for.
struct Mount {
    prefix: String,
    store: Arc<dyn ServeFileSystem>,
    config: Config,
}

impl Mount {
    async fn handle(
        &self,
        method: Method,
        full: FullPath,
        headers: HeaderMap,
    ) -> Result<Response, Rejection> {
        if method != Method::GET && method != Method::HEAD {
            return Err(reject::not_found());
        }

        let path = match percent_decode_str(full.as_str()).decode_utf8() {
            Ok(path) => path,
            Err(err) => {
                tracing::debug!("serve: failed to decode route={:?}: {:?}", full.as_str(), err);
                return Err(reject::not_found());
            }
        };

        if !self.store.exists(&self.prefix, &path).await {
            tracing::trace!("serve: {:?} is not servable under {:?}", path, self.prefix);
            return Err(reject::not_found());
        }

        let rest = path
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(reject::not_found)?;

        fs::reply(
            &*self.store,
            &method,
            &path,
            rest,
            Conditionals::from_headers(&headers),
            &self.config,
        )
        .await
    }
}

#[derive(Clone, Debug, Serialize)]
struct InitFailure {
    message: &'static str,
    error: String,
}

impl InitFailure {
    fn reply(&self) -> Response {
        warp::reply::with_status(warp::reply::json(self), StatusCode::INTERNAL_SERVER_ERROR)
            .into_response()
    }
}
