//! Stylesheet fetching against a local mock server.

use skinforge_runtime::acquisition::assets::{write_stylesheets, INLINE_STYLES_FILE};
use skinforge_runtime::acquisition::{fetch_all, HttpClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetch_keeps_order_and_marks_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/css/main-1.0.0.380.css"))
        .respond_with(ResponseTemplate::new(200).set_body_string(".document{width:595px}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/css/all.min.css"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/css/print.css"))
        .respond_with(ResponseTemplate::new(200).set_body_string("@media print{}"))
        .mount(&server)
        .await;

    let urls = vec![
        format!("{}/css/main-1.0.0.380.css", server.uri()),
        format!("{}/css/all.min.css", server.uri()),
        // nothing listens on port 9
        "http://127.0.0.1:9/css/unreachable.css".to_string(),
        format!("{}/css/print.css", server.uri()),
    ];

    let client = HttpClient::new(2_000);
    let assets = fetch_all(&client, &urls, 2).await;

    assert_eq!(assets.len(), 4);
    for (asset, url) in assets.iter().zip(&urls) {
        assert_eq!(&asset.url, url);
    }
    assert_eq!(assets[0].content.as_deref(), Some(".document{width:595px}"));
    assert_eq!(assets[1].content, None);
    assert_eq!(assets[2].content, None);
    assert_eq!(assets[3].content.as_deref(), Some("@media print{}"));

    let dir = tempfile::tempdir().unwrap();
    let written = write_stylesheets(dir.path(), &assets, ".skn-t000{}").unwrap();
    assert_eq!(written.len(), 3);
    assert!(dir.path().join("main-1.0.0.380.css").exists());
    assert!(dir.path().join("print.css").exists());
    assert!(!dir.path().join("all.min.css").exists());
    assert!(dir.path().join(INLINE_STYLES_FILE).exists());
}

#[tokio::test]
async fn retries_recover_from_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.css"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.css"))
        .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
        .mount(&server)
        .await;

    let urls = vec![format!("{}/flaky.css", server.uri())];

    let assets = fetch_all(&HttpClient::new(2_000).with_retries(1), &urls, 1).await;
    assert_eq!(assets[0].content.as_deref(), Some("body{}"));
}

#[tokio::test]
async fn no_retries_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down.css"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let urls = vec![format!("{}/down.css", server.uri())];
    let assets = fetch_all(&HttpClient::new(2_000), &urls, 1).await;
    assert_eq!(assets[0].content, None);
}
