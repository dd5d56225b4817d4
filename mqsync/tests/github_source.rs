//! HTTP-level tests for the GitHub contents client against a local mock server.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use mqsync::core::types::{FileEntry, Listing, RepositoryLocation};
use mqsync::discover::discover;
use mqsync::io::source::{GithubSource, HttpStatusError, RemoteSource, response_body};

#[derive(Debug, Clone)]
struct Recorded {
    request_line: String,
    headers: Vec<(String, String)>,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Route key: (path without query, raw content requested).
type Routes = HashMap<(String, bool), (u16, String)>;

struct MockServer {
    base: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    fn start(routes: Routes) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                let mut headers = Vec::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).is_err() || line == "\r\n" || line.is_empty() {
                        break;
                    }
                    if let Some((key, value)) = line.trim_end().split_once(':') {
                        headers.push((key.trim().to_string(), value.trim().to_string()));
                    }
                }
                let request = Recorded {
                    request_line: request_line.trim_end().to_string(),
                    headers,
                };

                let target = request.request_line.split(' ').nth(1).unwrap_or("");
                let path = target.split('?').next().unwrap_or("").to_string();
                let raw = request
                    .header("accept")
                    .is_some_and(|accept| accept.contains("raw"));
                let (status, body) = routes
                    .get(&(path, raw))
                    .cloned()
                    .unwrap_or((404, r#"{"message":"Not Found"}"#.to_string()));
                recorded.lock().expect("lock").push(request);

                let response = format!(
                    "HTTP/1.1 {status} Mock\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\
                     \r\n\
                     {body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        Self { base, requests }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("lock").clone()
    }
}

fn location(root_path: &str) -> RepositoryLocation {
    RepositoryLocation {
        owner: "acme".to_string(),
        repo: "mq-config".to_string(),
        root_path: root_path.to_string(),
        reference: "release-1".to_string(),
    }
}

fn route(routes: &mut Routes, path: &str, raw: bool, status: u16, body: &str) {
    routes.insert((path.to_string(), raw), (status, body.to_string()));
}

fn client(server: &MockServer, token: &str) -> GithubSource {
    GithubSource::new(
        server.base.clone(),
        token,
        &location("cfg"),
        Duration::from_secs(5),
    )
}

#[test]
fn list_sends_ref_auth_and_parses_directory() {
    let mut routes = Routes::new();
    route(
        &mut routes,
        "/repos/acme/mq-config/contents/cfg",
        false,
        200,
        r#"[{"name":"a.mqsc","path":"cfg/a.mqsc","type":"file"},{"name":"sub","path":"cfg/sub","type":"dir"}]"#,
    );
    let server = MockServer::start(routes);

    let listing = client(&server, "s3cret")
        .list("cfg", "release-1")
        .expect("list");

    assert_eq!(
        listing,
        Listing::Directory(vec![
            FileEntry::file("cfg/a.mqsc"),
            FileEntry::dir("cfg/sub")
        ])
    );
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].request_line,
        "GET /repos/acme/mq-config/contents/cfg?ref=release-1 HTTP/1.1"
    );
    assert_eq!(requests[0].header("authorization"), Some("Bearer s3cret"));
    assert_eq!(
        requests[0].header("accept"),
        Some("application/vnd.github+json")
    );
}

#[test]
fn empty_token_sends_no_authorization_header() {
    let mut routes = Routes::new();
    route(
        &mut routes,
        "/repos/acme/mq-config/contents/cfg/a.mqsc",
        false,
        200,
        r#"{"name":"a.mqsc","path":"cfg/a.mqsc","type":"file","content":""}"#,
    );
    let server = MockServer::start(routes);

    let listing = client(&server, "").list("cfg/a.mqsc", "release-1").expect("list");

    assert_eq!(listing, Listing::File(FileEntry::file("cfg/a.mqsc")));
    assert_eq!(server.requests()[0].header("authorization"), None);
}

#[test]
fn fetch_requests_raw_media_type() {
    let mut routes = Routes::new();
    route(
        &mut routes,
        "/repos/acme/mq-config/contents/cfg/a.mqsc",
        true,
        200,
        "DEFINE QLOCAL(APP.IN) REPLACE\n",
    );
    let server = MockServer::start(routes);

    let bytes = client(&server, "t")
        .fetch("cfg/a.mqsc", "release-1")
        .expect("fetch");

    assert_eq!(bytes, b"DEFINE QLOCAL(APP.IN) REPLACE\n");
    assert_eq!(
        server.requests()[0].header("accept"),
        Some("application/vnd.github.raw")
    );
}

#[test]
fn error_status_keeps_response_body() {
    let server = MockServer::start(Routes::new());

    let err = client(&server, "t")
        .fetch("cfg/missing.mqsc", "release-1")
        .unwrap_err();

    let status = err
        .downcast_ref::<HttpStatusError>()
        .expect("status error");
    assert_eq!(status.status, 404);
    assert_eq!(response_body(&err), Some(r#"{"message":"Not Found"}"#));
}

#[test]
fn discover_walks_nested_directories_over_http() {
    let mut routes = Routes::new();
    route(
        &mut routes,
        "/repos/acme/mq-config/contents/cfg",
        false,
        200,
        r#"[
            {"path":"cfg/a.mqsc","type":"file"},
            {"path":"cfg/sub","type":"dir"},
            {"path":"cfg/readme.txt","type":"file"},
            {"path":"cfg/z.mqsc","type":"file"}
        ]"#,
    );
    route(
        &mut routes,
        "/repos/acme/mq-config/contents/cfg/sub",
        false,
        200,
        r#"[{"path":"cfg/sub/b.mqsc","type":"file"}]"#,
    );
    let server = MockServer::start(routes);

    let found = discover(&client(&server, "t"), &location("cfg"), ".mqsc").expect("discover");

    assert_eq!(found, vec!["cfg/a.mqsc", "cfg/sub/b.mqsc", "cfg/z.mqsc"]);
}
