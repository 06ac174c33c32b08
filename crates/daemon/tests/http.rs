//! Request-level tests against the full router

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use burrow_daemon::assets::build_overlay;
use burrow_daemon::database::Database;
use burrow_daemon::http_server;
use burrow_daemon::identity::{Identity, IdentityError, IdentityProvider};
use burrow_daemon::ServiceState;
use common::prelude::*;

const FILES: &[(&str, &str)] = &[
    ("docs/readme.md", "hello"),
    ("docs/guide.md", "guide"),
    ("etc/passwd", "root:x:0:0"),
    ("music/song.ogg", "la la"),
];

/// Accepts the code `ok:<name>` and nothing else.
#[derive(Debug)]
struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn id(&self) -> &str {
        "fake"
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> Url {
        let mut url = Url::parse("https://idp.example.com/authorize").unwrap();
        url.query_pairs_mut()
            .append_pair("state", state)
            .append_pair("redirect_uri", redirect_uri);
        url
    }

    async fn exchange(&self, code: &str, _redirect_uri: &str) -> Result<Identity, IdentityError> {
        match code.strip_prefix("ok:") {
            Some(name) => Ok(Identity {
                external_id: format!("fake:{}", name),
                display_name: name.to_string(),
            }),
            None => Err(IdentityError::Rejected("bad code".to_string())),
        }
    }
}

struct TestApp {
    root: TempDir,
    _db_dir: TempDir,
    state: ServiceState,
    app: Router,
}

impl TestApp {
    async fn new(files: &[(&str, &str)]) -> Self {
        Self::with_base(files, "/", 250).await
    }

    async fn with_base(files: &[(&str, &str)], base: &str, search_limit: usize) -> Self {
        let root = tempfile::tempdir().unwrap();
        for (path, body) in files {
            write(root.path(), path, body);
        }
        let db_dir = tempfile::tempdir().unwrap();
        let database = Database::connect(&db_dir.path().join("db.sqlite"))
            .await
            .unwrap();
        let index = FileIndex::scan(root.path()).unwrap();

        let state = ServiceState::from_parts(
            database,
            index,
            build_overlay(&[], None).unwrap(),
            Arc::new(FakeProvider),
            base,
            search_limit,
        );
        let app = http_server::router(state.clone());

        Self {
            root,
            _db_dir: db_dir,
            state,
            app,
        }
    }

    /// Sign in `name` directly and return the cookie header value.
    async fn login(&self, name: &str, admin: bool) -> (i64, String) {
        let db = self.state.database();
        let user = db.upsert_login(&format!("fake:{}", name), name).await.unwrap();
        if admin {
            db.set_admin(user.id, true).await.unwrap();
        }
        let session = self.state.sessions().create(user.id);
        (user.id, format!("burrow_session={}", session))
    }

    async fn grant(&self, user_id: i64, path: &str) {
        self.state
            .database()
            .create_grant(user_id, &TreePath::parse(path).unwrap())
            .await
            .unwrap();
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().uri(uri).header(header::HOST, "files.test");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn get_json(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder()
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.app
            .clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(&self, uri: &str, cookie: &str, body: Value) -> Response {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.app.clone().oneshot(req).await.unwrap()
    }
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

async fn text(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str<'a>(resp: &'a Response, name: header::HeaderName) -> &'a str {
    resp.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn test_health_probes() {
    let app = TestApp::new(FILES).await;
    assert_eq!(app.get("/_status/livez", None).await.status(), StatusCode::OK);
    assert_eq!(app.get("/_status/readyz", None).await.status(), StatusCode::OK);

    app.state.index().mark_degraded("test");
    let resp = app.get("/_status/readyz", None).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["status"], "failure");
}

#[tokio::test]
async fn test_every_response_names_the_server() {
    let app = TestApp::new(FILES).await;
    for uri in ["/", "/_status/livez", "/no/such/route", "/files/"] {
        let resp = app.get(uri, None).await;
        assert_eq!(header_str(&resp, header::SERVER), "burrow", "{}", uri);
    }
}

#[tokio::test]
async fn test_ui_assets_come_from_the_overlay() {
    let app = TestApp::new(FILES).await;

    let resp = app.get("/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header_str(&resp, header::CONTENT_TYPE).starts_with("text/html"));

    let resp = app.get("/static/style.css", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header_str(&resp, header::CONTENT_TYPE).starts_with("text/css"));

    let resp = app.get_json("/static/missing.css", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await, json!({"msg": "not found"}));
}

#[tokio::test]
async fn test_guest_sees_nothing() {
    let app = TestApp::new(FILES).await;
    assert_eq!(app.get("/files/", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        app.get("/files/docs/readme.md", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_user_browses_within_grants() {
    let app = TestApp::new(FILES).await;
    let (alice, cookie) = app.login("alice", false).await;
    app.grant(alice, "/docs").await;

    let resp = app.get("/files/", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listing = json_body(resp).await;
    assert_eq!(listing["visible"], false);
    let names: Vec<_> = listing["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["docs"]);

    let resp = app.get("/files/docs", Some(&cookie)).await;
    let listing = json_body(resp).await;
    assert_eq!(listing["visible"], true);
    assert_eq!(listing["entries"][0]["name"], "guide.md");
    assert_eq!(listing["entries"][0]["size_formatted"], "5 B");

    let resp = app.get("/files/docs/readme.md", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp).await, "hello");
}

#[tokio::test]
async fn test_denied_and_missing_look_the_same() {
    let app = TestApp::new(FILES).await;
    let (alice, cookie) = app.login("alice", false).await;
    app.grant(alice, "/docs").await;

    let denied = app.get_json("/files/etc/passwd", Some(&cookie)).await;
    let missing = app.get_json("/files/docs/nope.md", Some(&cookie)).await;
    let escaped = app
        .get_json("/files/docs/../etc/passwd", Some(&cookie))
        .await;

    assert_eq!(denied.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(escaped.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(denied).await, json_body(missing).await);
}

#[tokio::test]
async fn test_file_range_requests() {
    let app = TestApp::new(FILES).await;
    let (_, cookie) = app.login("root", true).await;

    let req = Request::builder()
        .uri("/files/etc/passwd")
        .header(header::COOKIE, &cookie)
        .header(header::RANGE, "bytes=0-3")
        .body(Body::empty())
        .unwrap();
    let resp = app.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(text(resp).await, "root");
}

#[tokio::test]
async fn test_grant_crud_is_admin_only() {
    let app = TestApp::new(FILES).await;
    let (_, admin) = app.login("root", true).await;
    let (bob, bob_cookie) = app.login("bob", false).await;

    let resp = app
        .post("/api/access/create", &bob_cookie, json!({"user": bob, "path": "/"}))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .post("/api/access/create", &admin, json!({"user": bob, "path": "/music"}))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let grant = json_body(resp).await;
    assert_eq!(grant["path"], "/music");

    // takes effect on bob's next request
    let resp = app.get("/files/music/song.ogg", Some(&bob_cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .post("/api/access/update", &admin, json!({"id": grant["id"], "path": "/docs"}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.get("/files/music/song.ogg", Some(&bob_cookie)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .post("/api/access/delete", &admin, json!({"id": grant["id"]}))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app
        .post("/api/access/delete", &admin, json!({"id": grant["id"]}))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .post("/api/access/create", &admin, json!({"user": 9999, "path": "/"}))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_share_link_round_trip() {
    let app = TestApp::new(FILES).await;
    let (alice, cookie) = app.login("alice", false).await;
    app.grant(alice, "/docs").await;

    let resp = app
        .post("/api/share/create", &cookie, json!({"path": "/etc/passwd"}))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .post("/api/share/create", &cookie, json!({"path": "/docs"}))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let link = json_body(resp).await;
    let token = link["token"].as_str().unwrap().to_string();
    assert_eq!(link["url"], format!("/open/{}", token));

    // anonymous, no cookie
    let resp = app.get(&format!("/open/{}/readme.md", token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp).await, "hello");

    let resp = app.get(&format!("/open/{}", token), None).await;
    let listing = json_body(resp).await;
    assert_eq!(listing["entries"].as_array().unwrap().len(), 2);
    // the link does not reveal where the share lives
    assert_eq!(listing["path"], "/");
    assert_eq!(listing["entries"][1]["path"], "/readme.md");

    let resp = app
        .get(&format!("/open/{}/../etc/passwd", token), None)
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app.get(&format!("/open/{}/readme.md", "0".repeat(32)), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .post("/api/share/update", &cookie, json!({"token": token, "path": "/docs/guide.md"}))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.get(&format!("/open/{}", token), None).await;
    assert_eq!(text(resp).await, "guide");

    let resp = app
        .post("/api/share/delete", &cookie, json!({"token": token}))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app.get(&format!("/open/{}", token), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_is_scoped_and_capped() {
    let app = TestApp::with_base(FILES, "/", 1).await;
    let (alice, cookie) = app.login("alice", false).await;
    app.grant(alice, "/docs").await;

    let resp = app.get("/api/search?q=md", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["query"], "md");
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["truncated"], true);

    let body = json_body(app.get("/api/search?q=passwd", Some(&cookie)).await).await;
    assert!(body["results"].as_array().unwrap().is_empty());

    let body = json_body(app.get("/api/search?q=passwd", None).await).await;
    assert!(body["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_overview_and_user_update() {
    let app = TestApp::new(FILES).await;
    let (root, admin) = app.login("root", true).await;
    let (bob, bob_cookie) = app.login("bob", false).await;

    assert_eq!(
        app.get("/api/admin", Some(&bob_cookie)).await.status(),
        StatusCode::FORBIDDEN
    );
    let overview = json_body(app.get("/api/admin", Some(&admin)).await).await;
    assert_eq!(overview["users"].as_array().unwrap().len(), 2);

    let resp = app
        .post("/api/user/update", &admin, json!({"id": bob, "admin": true}))
        .await;
    assert_eq!(json_body(resp).await["admin"], true);
    // promotion is visible immediately
    assert_eq!(
        app.get("/files/etc/passwd", Some(&bob_cookie)).await.status(),
        StatusCode::OK
    );

    let resp = app
        .post("/api/user/update", &admin, json!({"id": root, "admin": false}))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_flow() {
    let app = TestApp::new(FILES).await;

    let resp = app.get("/login", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = Url::parse(header_str(&resp, header::LOCATION)).unwrap();
    assert_eq!(location.host_str(), Some("idp.example.com"));
    let query: std::collections::HashMap<_, _> = location.query_pairs().into_owned().collect();
    assert_eq!(query["redirect_uri"], "http://files.test/callback");
    let state = query["state"].clone();

    let set_cookie = header_str(&resp, header::SET_COOKIE);
    assert!(set_cookie.starts_with(&format!("burrow_oauth_state={}", state)));

    // wrong state is refused
    let resp = app
        .get(
            "/callback?code=ok:alice&state=forged",
            Some(&format!("burrow_oauth_state={}", state)),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // bad code is refused
    let resp = app
        .get(
            &format!("/callback?code=nope&state={}", state),
            Some(&format!("burrow_oauth_state={}", state)),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .get(
            &format!("/callback?code=ok:alice&state={}", state),
            Some(&format!("burrow_oauth_state={}", state)),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_str(&resp, header::LOCATION), "/files/");
    let session = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("burrow_session="))
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();

    let user = app
        .state
        .database()
        .user_by_external_id("fake:alice")
        .await
        .unwrap()
        .unwrap();
    app.grant(user.id, "/docs").await;
    assert_eq!(
        app.get("/files/docs/readme.md", Some(&session)).await.status(),
        StatusCode::OK
    );

    let resp = app.get("/logout", Some(&session)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        app.get("/files/docs/readme.md", Some(&session)).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_mounted_under_a_base_path() {
    let app = TestApp::with_base(FILES, "/share-site/", 250).await;
    let (_, admin) = app.login("root", true).await;

    assert_eq!(
        app.get("/share-site/files/docs/readme.md", Some(&admin)).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        app.get("/files/docs/readme.md", Some(&admin)).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.get("/_status/livez", None).await.status(), StatusCode::OK);

    let resp = app.get("/share-site/login", None).await;
    let location = Url::parse(header_str(&resp, header::LOCATION)).unwrap();
    let redirect = location
        .query_pairs()
        .find(|(k, _)| k == "redirect_uri")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    assert_eq!(redirect, "http://files.test/share-site/callback");
}

#[tokio::test]
async fn test_new_files_show_up_after_index_events() {
    let app = TestApp::new(FILES).await;
    let (_, admin) = app.login("root", true).await;

    write(app.root.path(), "docs/new.md", "fresh");
    app.state
        .index()
        .apply_all(IndexEvent::Created(TreePath::parse("/docs/new.md").unwrap()));

    let resp = app.get("/files/docs/new.md", Some(&admin)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp).await, "fresh");
}
