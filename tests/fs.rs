#![deny(warnings)]

use std::fs;

use warp::http::HeaderValue;

fn data() -> warp_static::LocalFileSystem {
    warp_static::local_file("tests/data/server", false)
}

#[tokio::test]
async fn index_html_redirects_to_directory() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::serve("/", data());

    let res = warp::test::request().path("/index.html").reply(&route).await;
    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "/");

    let res = warp::test::request()
        .path("/docs/index.html")
        .reply(&route)
        .await;
    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "/docs/");
}

#[tokio::test]
async fn file_with_trailing_slash_redirects() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::serve("/", data());

    let res = warp::test::request().path("/static.html/").reply(&route).await;
    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "/static.html");
}

#[tokio::test]
async fn redirect_location_is_encoded() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::serve("/", warp_static::local_file("tests/data", false));

    let res = warp::test::request()
        .path("/server/hello%20world.txt/")
        .reply(&route)
        .await;
    assert_eq!(res.status(), 301);
    assert_eq!(res.headers()["location"], "/server/hello%20world.txt");
}

#[tokio::test]
async fn etag_and_if_none_match() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::config()
        .etag(true)
        .add_header("cache-control", HeaderValue::from_static("max-age=60"))
        .serve("/", data());

    let res = warp::test::request().path("/static.html").reply(&route).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["cache-control"], "max-age=60");
    let etag = res.headers()["etag"].to_str().expect("etag").to_owned();
    assert!(etag.starts_with("W/\""), "weak etag: {}", etag);

    let res = warp::test::request()
        .path("/static.html")
        .header("if-none-match", etag.as_str())
        .reply(&route)
        .await;
    assert_eq!(res.status(), 304);
    assert_eq!(res.headers()["etag"], etag.as_str());
    assert_eq!(res.headers()["cache-control"], "max-age=60");
    assert!(res.body().is_empty());

    let res = warp::test::request()
        .path("/static.html")
        .header("if-match", "\"something-else\"")
        .reply(&route)
        .await;
    assert_eq!(res.status(), 412);
}

#[tokio::test]
async fn if_modified_since() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::serve("/", data());

    let res = warp::test::request().path("/static.html").reply(&route).await;
    assert_eq!(res.status(), 200);
    let modified = res.headers()["last-modified"]
        .to_str()
        .expect("last-modified")
        .to_owned();

    let res = warp::test::request()
        .path("/static.html")
        .header("if-modified-since", modified.as_str())
        .reply(&route)
        .await;
    assert_eq!(res.status(), 304);
    assert!(res.body().is_empty());

    let res = warp::test::request()
        .path("/static.html")
        .header("if-modified-since", "Sun, 06 Nov 1994 08:49:37 GMT")
        .reply(&route)
        .await;
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn last_modified_can_be_disabled() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::config()
        .last_modified(false)
        .serve("/", data());

    let res = warp::test::request().path("/static.html").reply(&route).await;
    assert_eq!(res.status(), 200);
    assert!(!res.headers().contains_key("last-modified"));
}

#[tokio::test]
async fn byte_ranges_from_disk() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::config()
        .read_buffer_size(Some(2))
        .serve("/", data());

    let res = warp::test::request()
        .path("/static.html")
        .header("range", "bytes=4-8")
        .reply(&route)
        .await;
    assert_eq!(res.status(), 206);
    assert_eq!(res.headers()["content-length"], "5");
    assert_eq!(res.headers()["content-range"], "bytes 4-8/25");
    assert_eq!(res.body(), "Hello");

    let res = warp::test::request()
        .path("/static.html")
        .header("range", "bytes=20-")
        .reply(&route)
        .await;
    assert_eq!(res.status(), 206);
    assert_eq!(res.body(), "</h1>");

    let contents = fs::read("tests/data/server/static.html").expect("fs::read static.html");
    let res = warp::test::request().path("/static.html").reply(&route).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.body(), &*contents);
}

#[tokio::test]
async fn head_from_disk() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::serve("/", data());

    let res = warp::test::request()
        .method("HEAD")
        .path("/")
        .reply(&route)
        .await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-length"], "20");
    assert_eq!(res.headers()["content-type"], "text/html");
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn oversized_range_is_unsatisfiable() {
    let _ = pretty_env_logger::try_init();

    let route = warp_static::serve("/", data());

    let res = warp::test::request()
        .path("/static.html")
        .header("range", "bytes=0-18446744073709551615")
        .reply(&route)
        .await;
    assert_eq!(res.status(), 416);
    assert_eq!(res.headers()["content-range"], "bytes */25");
}
