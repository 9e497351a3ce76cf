use include_dir::{include_dir, Dir};
use warp::{http::Uri, Filter};

static EMBED: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/demos/public");

/// Serves `demos/public/page` from the binary at `/`.
///
/// Try `curl -i http://127.0.0.1:8080/`, `/style.css`, `/index.html` and
/// `/missing`. Run with `RUST_LOG=warp_static=trace` to see the decisions.
#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let ping = warp::path("ping").and(warp::path::end()).map(|| "test");

    // `serve_embed("", &EMBED)` would expose the bundle as `/page/...` instead.
    let page = warp_static::serve_embed("page", &EMBED);

    let no_route = warp::any().map(|| warp::redirect(Uri::from_static("/")));

    let routes = ping.or(page).or(no_route).with(warp::log("embed"));

    warp::serve(routes).run(([127, 0, 0, 1], 8080)).await;
}
