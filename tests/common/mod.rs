//! In-process stand-in for the media service.
//!
//! An axum router on a loopback port, running on its own tokio runtime in a
//! background thread so the blocking client under test can talk to it. Every
//! request is recorded and answered by a caller supplied handler.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;

/// A request as the fake service saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercase.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Canned answer.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply { status: 200, body: body.to_string() }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Reply { status, body: body.to_string() }
    }
}

type Handler = Arc<Mutex<dyn FnMut(&RecordedRequest) -> Reply + Send>>;

#[derive(Clone)]
struct FakeState {
    handler: Handler,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct FakeServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeServer {
    /// Start serving on a free port. Every method and path reaches `handler`.
    pub fn start<H>(handler: H) -> Self
    where
        H: FnMut(&RecordedRequest) -> Reply + Send + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            handler: Arc::new(Mutex::new(handler)),
            requests: Arc::clone(&requests),
        };
        let (addr_tx, addr_rx) = mpsc::channel::<SocketAddr>();

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("build tokio runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind loopback");
                addr_tx
                    .send(listener.local_addr().expect("local addr"))
                    .expect("report address");

                let app = Router::new().fallback(record).with_state(state);
                axum::serve(listener, app).await.expect("serve fake service");
            });
        });

        let addr = addr_rx.recv().expect("fake service did not start");
        FakeServer {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `METHOD /path` for every request so far, in order.
    pub fn routes(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

async fn record(
    State(state): State<FakeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: body.to_vec(),
    };

    let reply = {
        let mut handler = state.handler.lock().unwrap();
        (&mut *handler)(&request)
    };
    state.requests.lock().unwrap().push(request);

    let status = StatusCode::from_u16(reply.status).expect("valid status code");
    (status, [(header::CONTENT_TYPE, "application/json")], reply.body).into_response()
}
