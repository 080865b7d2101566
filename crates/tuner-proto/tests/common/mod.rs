//! Local stand-in for an Icecast server: serves `status-json.xsl` from a
//! scripted list of bodies, repeating the last one.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{extract::State, http::StatusCode, routing::get, Router};

#[derive(Clone)]
struct Script {
    bodies: Arc<Mutex<Vec<(StatusCode, String)>>>,
    hits: Arc<Mutex<usize>>,
}

pub struct FakeIcecast {
    pub addr: SocketAddr,
    hits: Arc<Mutex<usize>>,
}

impl FakeIcecast {
    pub fn base(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn hits(&self) -> usize {
        *self.hits.lock().unwrap()
    }
}

async fn status(State(script): State<Script>) -> (StatusCode, String) {
    *script.hits.lock().unwrap() += 1;
    let mut bodies = script.bodies.lock().unwrap();
    if bodies.len() > 1 {
        bodies.remove(0)
    } else {
        bodies
            .first()
            .cloned()
            .unwrap_or((StatusCode::NOT_FOUND, String::new()))
    }
}

pub async fn serve(bodies: Vec<(StatusCode, &str)>) -> FakeIcecast {
    let hits = Arc::new(Mutex::new(0));
    let script = Script {
        bodies: Arc::new(Mutex::new(
            bodies.into_iter().map(|(c, b)| (c, b.to_string())).collect(),
        )),
        hits: hits.clone(),
    };
    let app = Router::new()
        .route("/status-json.xsl", get(status))
        .with_state(script);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake icecast");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake icecast server");
    });
    FakeIcecast { addr, hits }
}

pub fn status_json(sources: &[(&str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = sources
        .iter()
        .map(|(url, title)| serde_json::json!({ "listenurl": url, "title": title, "listeners": 1 }))
        .collect();
    serde_json::json!({ "icestats": { "admin": "icemaster@localhost", "source": entries } })
        .to_string()
}
