//! Minimal HTTP/1.1 server that answers GET requests from a route table.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Routes = Arc<Mutex<HashMap<String, (u16, String)>>>;
type Stalled = Arc<Mutex<HashSet<String>>>;

/// Local stand-in for the flood-monitoring API, mounted under `/flood-monitoring`.
pub struct MockApi {
    pub base_url: String,
    routes: Routes,
    stalled: Stalled,
    hits: Arc<Mutex<Vec<String>>>,
}

impl MockApi {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should bind mock API listener");
        let addr = listener.local_addr().expect("Should have local address");

        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let stalled: Stalled = Arc::new(Mutex::new(HashSet::new()));
        let hits = Arc::new(Mutex::new(Vec::new()));

        let server_routes = Arc::clone(&routes);
        let server_stalled = Arc::clone(&stalled);
        let server_hits = Arc::clone(&hits);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let routes = Arc::clone(&server_routes);
                let stalled = Arc::clone(&server_stalled);
                let hits = Arc::clone(&server_hits);
                tokio::spawn(handle(socket, routes, stalled, hits));
            }
        });

        MockApi {
            base_url: format!("http://{}/flood-monitoring", addr),
            routes,
            stalled,
            hits,
        }
    }

    /// Answer `GET /flood-monitoring{path}` with `status` and `body`.
    pub fn route(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("/flood-monitoring{}", path), (status, body.to_string()));
    }

    pub fn station(&self, id: &str, body: &str) {
        self.route(&format!("/id/stations/{}.json", id), 200, body);
    }

    pub fn readings(&self, id: &str, status: u16, body: &str) {
        self.route(&format!("/id/stations/{}/readings?latest", id), status, body);
    }

    /// Accept requests for `path` but never answer them. Takes precedence over routes.
    pub fn stall(&self, path: &str) {
        self.stalled
            .lock()
            .unwrap()
            .insert(format!("/flood-monitoring{}", path));
    }

    pub fn stall_readings(&self, id: &str) {
        self.stall(&format!("/id/stations/{}/readings?latest", id));
    }

    /// Number of requests received for `path` (relative to the API root).
    pub fn hits(&self, path: &str) -> usize {
        let target = format!("/flood-monitoring{}", path);
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|hit| **hit == target)
            .count()
    }
}

async fn handle(
    mut socket: TcpStream,
    routes: Routes,
    stalled: Stalled,
    hits: Arc<Mutex<Vec<String>>>,
) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }

    let request = String::from_utf8_lossy(&request);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    hits.lock().unwrap().push(target.clone());

    if stalled.lock().unwrap().contains(&target) {
        // Hold the connection open; the client has to give up on its own.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        return;
    }

    let (status, body) = routes
        .lock()
        .unwrap()
        .get(&target)
        .cloned()
        .unwrap_or_else(|| (404, r#"{"error":"not found"}"#.to_string()));

    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}
