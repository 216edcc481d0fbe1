use base64::Engine;
use mockito::{Matcher, Server, ServerGuard};
use sentinel_core::config::RepositoryHostConfig;
use sentinel_core::error::ScanError;
use sentinel_core::model::{ContentOrigin, Provenance, RepositoryReference};
use sentinel_core::{GitHubFetcher, RepositorySource};
use serde_json::json;

fn reference() -> RepositoryReference {
    RepositoryReference {
        owner: "octocat".into(),
        name: "demo".into(),
    }
}

fn fetcher(server: &ServerGuard, token: Option<&str>) -> GitHubFetcher {
    GitHubFetcher::new(&RepositoryHostConfig {
        api_base: server.url(),
        token: token.map(str::to_string),
        ..RepositoryHostConfig::default()
    })
    .unwrap()
}

fn metadata() -> String {
    json!({
        "full_name": "octocat/demo",
        "description": "A demo repository",
        "stargazers_count": 42,
        "forks_count": 7,
        "language": "Python",
        "updated_at": "2025-04-01T10:00:00Z"
    })
    .to_string()
}

fn file_entry(server: &ServerGuard, name: &str) -> serde_json::Value {
    json!({
        "type": "file",
        "name": name,
        "path": name,
        "download_url": format!("{}/raw/{}", server.url(), name)
    })
}

async fn mock_metadata(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/repos/octocat/demo")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(metadata())
        .create_async()
        .await
}

async fn mock_readme(server: &mut ServerGuard, text: &str) -> mockito::Mock {
    // GitHub 返回的 base64 内容带换行
    let encoded = base64::engine::general_purpose::STANDARD.encode(text);
    let wrapped = encoded
        .as_bytes()
        .chunks(60)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    server
        .mock("GET", "/repos/octocat/demo/readme")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "path": "README.md", "content": wrapped, "encoding": "base64" }).to_string())
        .create_async()
        .await
}

async fn mock_listing(server: &mut ServerGuard, entries: serde_json::Value) -> mockito::Mock {
    server
        .mock("GET", "/repos/octocat/demo/contents")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(entries.to_string())
        .create_async()
        .await
}

async fn mock_raw(server: &mut ServerGuard, name: &str, status: usize, body: &str) -> mockito::Mock {
    server
        .mock("GET", format!("/raw/{}", name).as_str())
        .with_status(status)
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn fetches_readme_and_qualifying_files_in_listing_order() {
    let mut server = Server::new_async().await;
    let _meta = mock_metadata(&mut server).await;
    let _readme = mock_readme(&mut server, &"R".repeat(1500)).await;
    let entries = json!([
        file_entry(&server, "a.py"),
        file_entry(&server, "b.md"),
        file_entry(&server, "c.exe"),
        { "type": "dir", "name": "src", "path": "src", "download_url": null },
        file_entry(&server, "d.js"),
    ]);
    let _listing = mock_listing(&mut server, entries).await;
    let _a = mock_raw(&mut server, "a.py", 200, &"x".repeat(10_000)).await;
    let _b = mock_raw(&mut server, "b.md", 200, "# notes").await;
    let _d = mock_raw(&mut server, "d.js", 200, "eval(input)").await;
    let exe = server
        .mock("GET", "/raw/c.exe")
        .expect(0)
        .create_async()
        .await;

    let fetched = fetcher(&server, None).fetch(&reference()).await.unwrap();

    assert_eq!(fetched.provenance, Provenance::Repository);
    assert_eq!(fetched.summary.full_name, "octocat/demo");
    assert_eq!(fetched.summary.star_count, 42);
    assert_eq!(fetched.summary.primary_language.as_deref(), Some("Python"));

    let paths: Vec<&str> = fetched.units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(paths, vec!["README.md", "a.py", "b.md", "d.js"]);
    assert_eq!(fetched.units[0].origin, ContentOrigin::Readme);
    assert_eq!(fetched.units[0].text.chars().count(), 1000);
    assert_eq!(fetched.units[1].text.chars().count(), 8000);
    assert_eq!(fetched.file_count(), 3);
    exe.assert_async().await;
}

#[tokio::test]
async fn missing_metadata_fails_before_listing() {
    let mut server = Server::new_async().await;
    let _meta = server
        .mock("GET", "/repos/octocat/demo")
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/repos/octocat/demo/contents")
        .expect(0)
        .create_async()
        .await;

    let err = fetcher(&server, None).fetch(&reference()).await.unwrap_err();
    assert!(matches!(err, ScanError::RepositoryUnavailable { status: 404 }));
    listing.assert_async().await;
}

#[tokio::test]
async fn missing_readme_is_not_an_error() {
    let mut server = Server::new_async().await;
    let _meta = mock_metadata(&mut server).await;
    let _readme = server
        .mock("GET", "/repos/octocat/demo/readme")
        .with_status(404)
        .create_async()
        .await;
    let entries = json!([file_entry(&server, "app.go")]);
    let _listing = mock_listing(&mut server, entries).await;
    let _app = mock_raw(&mut server, "app.go", 200, "package main").await;

    let fetched = fetcher(&server, None).fetch(&reference()).await.unwrap();
    assert_eq!(fetched.units.len(), 1);
    assert_eq!(fetched.units[0].origin, ContentOrigin::File);
    assert_eq!(fetched.units[0].text, "package main");
}

#[tokio::test]
async fn listing_failure_is_content_unavailable() {
    let mut server = Server::new_async().await;
    let _meta = mock_metadata(&mut server).await;
    let _readme = mock_readme(&mut server, "hello").await;
    let _listing = server
        .mock("GET", "/repos/octocat/demo/contents")
        .with_status(500)
        .create_async()
        .await;

    let err = fetcher(&server, None).fetch(&reference()).await.unwrap_err();
    assert!(matches!(err, ScanError::ContentUnavailable(_)));
}

#[tokio::test]
async fn failed_file_is_skipped_without_pulling_in_another() {
    let mut server = Server::new_async().await;
    let _meta = mock_metadata(&mut server).await;
    let _readme = mock_readme(&mut server, "readme").await;
    let entries = json!([
        file_entry(&server, "1.py"),
        file_entry(&server, "2.py"),
        file_entry(&server, "3.py"),
        file_entry(&server, "4.py"),
        file_entry(&server, "5.py"),
        file_entry(&server, "6.py"),
    ]);
    let _listing = mock_listing(&mut server, entries).await;
    let _f1 = mock_raw(&mut server, "1.py", 200, "one").await;
    let _f2 = mock_raw(&mut server, "2.py", 500, "boom").await;
    let _f3 = mock_raw(&mut server, "3.py", 200, "three").await;
    let _f4 = mock_raw(&mut server, "4.py", 200, "four").await;
    let _f5 = mock_raw(&mut server, "5.py", 200, "five").await;
    let sixth = server
        .mock("GET", "/raw/6.py")
        .expect(0)
        .create_async()
        .await;

    let fetched = fetcher(&server, None).fetch(&reference()).await.unwrap();
    let paths: Vec<&str> = fetched.units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(paths, vec!["README.md", "1.py", "3.py", "4.py", "5.py"]);
    sixth.assert_async().await;
}

#[tokio::test]
async fn no_qualifying_files_falls_back_to_samples() {
    let mut server = Server::new_async().await;
    let _meta = mock_metadata(&mut server).await;
    let _readme = mock_readme(&mut server, "docs only").await;
    let entries = json!([file_entry(&server, "logo.png"), file_entry(&server, "LICENSE")]);
    let _listing = mock_listing(&mut server, entries).await;

    let fetched = fetcher(&server, None).fetch(&reference()).await.unwrap();
    assert_eq!(fetched.provenance, Provenance::Fallback);
    assert_eq!(fetched.units[0].origin, ContentOrigin::Readme);
    assert!(fetched.units[1..]
        .iter()
        .all(|unit| unit.origin == ContentOrigin::Synthetic));
    assert_eq!(fetched.file_count(), 0);
}

#[tokio::test]
async fn token_is_sent_as_bearer_credential() {
    let mut server = Server::new_async().await;
    let meta = server
        .mock("GET", "/repos/octocat/demo")
        .match_header("authorization", "Bearer secret-token")
        .match_header("accept", Matcher::Regex("github".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(metadata())
        .create_async()
        .await;
    let _readme = mock_readme(&mut server, "readme").await;
    let entries = json!([file_entry(&server, "main.py")]);
    let _listing = mock_listing(&mut server, entries).await;
    let _main = mock_raw(&mut server, "main.py", 200, "print(1)").await;

    fetcher(&server, Some("secret-token"))
        .fetch(&reference())
        .await
        .unwrap();
    meta.assert_async().await;
}

#[tokio::test]
async fn all_file_downloads_failing_falls_back_to_samples() {
    let mut server = Server::new_async().await;
    let _meta = mock_metadata(&mut server).await;
    let _readme = mock_readme(&mut server, "readme").await;
    let entries = json!([file_entry(&server, "app.py"), file_entry(&server, "util.js")]);
    let _listing = mock_listing(&mut server, entries).await;
    let _app = mock_raw(&mut server, "app.py", 500, "boom").await;
    let _util = mock_raw(&mut server, "util.js", 404, "gone").await;

    let fetched = fetcher(&server, None).fetch(&reference()).await.unwrap();

    assert_eq!(fetched.provenance, Provenance::Fallback);
    assert_eq!(fetched.file_count(), 0);
    let paths: Vec<&str> = fetched.units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "README.md",
            "sentinel-samples/user_lookup.py",
            "sentinel-samples/payments.py"
        ]
    );
}
