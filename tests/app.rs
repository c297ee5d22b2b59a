use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use lucky_draw::app::{AppState, router};
use lucky_draw::Entry;
use lucky_draw::config::Config;
use lucky_draw::saving::{SnapshotError, SnapshotStorage};
use lucky_draw::session::MemorySessionStore;
use rust_xlsxwriter::Workbook;
use std::fs;
use std::io::{Error, ErrorKind};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "lucky-draw-test-boundary";

struct TestApp {
    router: Router,
    dir: TempDir,
}

/// Snapshot storage on a disk that refuses every write
struct BrokenSnapshot;

impl SnapshotStorage for BrokenSnapshot {
    fn write(&self, _entries: &[Entry]) -> Result<(), SnapshotError> {
        Err(Error::new(ErrorKind::PermissionDenied, "read-only disk").into())
    }

    fn read(&self) -> Result<Option<Vec<Entry>>, SnapshotError> {
        Ok(None)
    }
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(|config| config)
    }

    fn with_config(configure: impl FnOnce(Config) -> Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = configure(Config {
            upload_dir: dir.path().join("uploads"),
            ..Config::default()
        });
        let state = AppState::from_config(config).unwrap();

        TestApp {
            router: router(Arc::new(state)),
            dir,
        }
    }

    fn snapshot_path(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads").join("entries.json")
    }

    fn snapshot(&self) -> Option<Vec<String>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return None;
        }
        Some(serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap())
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Build an xlsx whose first column holds `column` (`None` leaves the cell unwritten)
fn xlsx(column: &[Option<&str>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (row, value) in column.iter().enumerate() {
        if let Some(value) = value {
            sheet.write_string(row as u32, 0, *value).unwrap();
        }
        // Keep every row inside the used range
        sheet.write_number(row as u32, 1, row as f64).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

fn upload(filename: &str, content: &[u8], cookie: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` pair of the session cookie set by a response
fn session_cookie(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response sets the session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn winner(page: &str) -> Option<String> {
    let start = page.find("<p id=\"winner\">")? + "<p id=\"winner\">".len();
    let end = page[start..].find("</p>")? + start;
    Some(page[start..end].to_string())
}

fn names() -> Vec<&'static str> {
    vec!["Alice", "Bob", "Carol"]
}

#[tokio::test]
async fn upload_draws_a_winner_and_writes_snapshot() {
    let app = TestApp::new();
    let content = xlsx(&[Some("Alice"), Some("Bob"), Some("Carol")]);

    let response = app.send(upload("names.xlsx", &content, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    let winner = winner(&page).expect("page shows a winner");
    assert!(names().contains(&winner.as_str()), "unexpected winner {}", winner);

    assert_eq!(app.snapshot(), Some(vec!["Alice".to_string(), "Bob".to_string(), "Carol".to_string()]));
}

#[tokio::test]
async fn upload_keeps_duplicates_and_skips_blanks() {
    let app = TestApp::new();
    let content = xlsx(&[Some("A"), Some("A"), Some(""), Some("B"), None]);

    let response = app.send(upload("list.XLSX", &content, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        app.snapshot(),
        Some(vec!["A".to_string(), "A".to_string(), "B".to_string()])
    );
}

#[tokio::test]
async fn session_cookie_is_lax_and_http_only() {
    let app = TestApp::new();

    let response = app.send(request("GET", "/", None)).await;
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    assert!(set_cookie.starts_with("session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Max-Age=604800"));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn redraw_uses_session_entries() {
    let app = TestApp::new();
    let content = xlsx(&[Some("Alice"), Some("Bob"), Some("Carol")]);

    let response = app.send(upload("names.xlsx", &content, None)).await;
    let cookie = session_cookie(&response);

    // Another client replaces the shared snapshot; this session keeps its own list
    fs::write(app.snapshot_path(), r#"["Mallory"]"#).unwrap();

    for _ in 0..10 {
        let response = app.send(request("POST", "/redraw", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let winner = winner(&body_text(response).await).expect("page shows a winner");
        assert!(names().contains(&winner.as_str()));
    }
}

#[tokio::test]
async fn redraw_falls_back_to_snapshot() {
    let app = TestApp::new();
    let content = xlsx(&[Some("Dana")]);
    app.send(upload("names.xlsx", &content, None)).await;

    // No cookie: a brand new session, as after a restart
    let response = app.send(request("POST", "/redraw", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(winner(&body_text(response).await), Some("Dana".to_string()));
}

#[tokio::test]
async fn redraw_without_entries_shows_message() {
    let app = TestApp::new();

    let response = app.send(request("POST", "/redraw", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert_eq!(winner(&page), None);
    assert!(page.contains("No entries found for re-draw. Please upload an Excel file first."));
}

#[tokio::test]
async fn redraw_with_corrupt_snapshot_shows_message() {
    let app = TestApp::new();
    fs::create_dir_all(app.snapshot_path().parent().unwrap()).unwrap();
    fs::write(app.snapshot_path(), "{ not json").unwrap();

    let response = app.send(request("POST", "/redraw", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert_eq!(winner(&page), None);
    assert!(page.contains("Error reading saved entries file. Please upload an Excel file again."));
}

#[tokio::test]
async fn redraw_with_empty_snapshot_shows_message() {
    let app = TestApp::new();
    fs::create_dir_all(app.snapshot_path().parent().unwrap()).unwrap();
    fs::write(app.snapshot_path(), "[]").unwrap();

    let response = app.send(request("POST", "/redraw", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert_eq!(winner(&page), None);
    assert!(page.contains("No valid entries found for re-draw. Please upload an Excel file first."));
}

#[tokio::test]
async fn failed_snapshot_write_still_draws_and_warns() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        upload_dir: dir.path().join("uploads"),
        ..Config::default()
    };
    let sessions = Arc::new(MemorySessionStore::new(config.session_lifetime));
    let state = AppState::new(config, sessions, Arc::new(BrokenSnapshot)).unwrap();
    let app = router(Arc::new(state));

    let content = xlsx(&[Some("Alice"), Some("Bob"), Some("Carol")]);
    let response = app.clone().oneshot(upload("names.xlsx", &content, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);

    let page = body_text(response).await;
    let drawn = winner(&page).expect("page shows a winner");
    assert!(names().contains(&drawn.as_str()), "unexpected winner {}", drawn);
    assert!(page.contains("Entries could not be saved for later re-draws: read-only disk"));

    // The session still holds the list
    let response = app.oneshot(request("POST", "/redraw", Some(&cookie))).await.unwrap();
    let page = body_text(response).await;
    assert!(winner(&page).is_some());
    assert!(!page.contains("Entries could not be saved"));
}

#[tokio::test]
async fn show_form_clears_session_entries_but_not_snapshot() {
    let app = TestApp::new();
    let content = xlsx(&[Some("Alice"), Some("Bob")]);

    let response = app.send(upload("names.xlsx", &content, None)).await;
    let cookie = session_cookie(&response);

    for _ in 0..2 {
        let response = app.send(request("GET", "/", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(winner(&body_text(response).await), None);
    }

    // Session entries are gone, so the snapshot is used; it was not touched
    fs::write(app.snapshot_path(), r#"["Erin"]"#).unwrap();
    let response = app.send(request("POST", "/redraw", Some(&cookie))).await;
    assert_eq!(winner(&body_text(response).await), Some("Erin".to_string()));
}

async fn rejected_upload_message(app: &TestApp, rejected: Request<Body>) -> String {
    let response = app.send(rejected).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    let cookie = session_cookie(&response);

    let form = app.send(request("GET", "/", Some(&cookie))).await;
    let page = body_text(form).await;
    assert_eq!(winner(&page), None);
    page
}

#[tokio::test]
async fn text_file_is_rejected() {
    let app = TestApp::new();

    let page = rejected_upload_message(&app, upload("names.txt", b"Alice\nBob\n", None)).await;
    assert!(page.contains("Invalid file type. Please upload an .xlsx or .xls file."));
    assert_eq!(app.snapshot(), None);
}

#[tokio::test]
async fn blank_first_column_is_rejected() {
    let app = TestApp::new();
    let content = xlsx(&[Some(""), None, Some("")]);

    let page = rejected_upload_message(&app, upload("names.xlsx", &content, None)).await;
    assert!(page.contains("No valid entries found in the first column."));
    assert_eq!(app.snapshot(), None);
}

#[tokio::test]
async fn empty_workbook_is_rejected() {
    let app = TestApp::new();
    let mut workbook = Workbook::new();
    workbook.add_worksheet();
    let content = workbook.save_to_buffer().unwrap();

    let page = rejected_upload_message(&app, upload("names.xlsx", &content, None)).await;
    assert!(page.contains("The Excel file is empty."));
    assert_eq!(app.snapshot(), None);
}

#[tokio::test]
async fn corrupt_spreadsheet_is_rejected() {
    let app = TestApp::new();

    let page = rejected_upload_message(&app, upload("names.xlsx", b"PK not really a zip", None)).await;
    assert!(page.contains("An error occurred: "));
    assert_eq!(app.snapshot(), None);
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let app = TestApp::new();

    let page = rejected_upload_message(&app, upload("", b"", None)).await;
    assert!(page.contains("No selected file"));

    let not_multipart = request("POST", "/upload", None);
    let page = rejected_upload_message(&app, not_multipart).await;
    assert!(page.contains("No selected file"));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = TestApp::with_config(|config| Config {
        max_upload_bytes: 64,
        ..config
    });
    let entrants: Vec<String> = (0..200).map(|i| format!("Entrant number {}", i)).collect();
    let column: Vec<Option<&str>> = entrants.iter().map(|name| Some(name.as_str())).collect();
    let content = xlsx(&column);
    assert!(content.len() > 64);

    let page = rejected_upload_message(&app, upload("names.xlsx", &content, None)).await;
    assert!(page.contains("An error occurred: "));
    assert_eq!(app.snapshot(), None);
}

#[tokio::test]
async fn flash_is_shown_only_once() {
    let app = TestApp::new();

    let response = app.send(upload("names.txt", b"", None)).await;
    let cookie = session_cookie(&response);

    let first = body_text(app.send(request("GET", "/", Some(&cookie))).await).await;
    assert!(first.contains("Invalid file type"));

    let second = body_text(app.send(request("GET", "/", Some(&cookie))).await).await;
    assert!(!second.contains("Invalid file type"));
}

#[tokio::test]
async fn stylesheet_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("static");
    let config = Config {
        upload_dir: dir.path().join("uploads"),
        static_dir,
        ..Config::default()
    };
    let app = router(Arc::new(AppState::from_config(config).unwrap()));

    let response = app.oneshot(request("GET", "/static/style.css", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
