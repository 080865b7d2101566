use crate::core::CoreEvent;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tuner_proto::protocol::{NowPlaying, Station};
use tuner_proto::state::StateStore;

#[derive(Clone)]
struct HttpState {
    store: Arc<StateStore>,
    event_tx: mpsc::Sender<CoreEvent>,
}

#[derive(Serialize)]
struct ApiState {
    stations: Vec<Station>,
    current: Option<String>,
    now_playing: Option<NowPlaying>,
    location: String,
}

fn router(store: Arc<StateStore>, event_tx: mpsc::Sender<CoreEvent>) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/select/:id", get(select_station).post(select_station))
        .route("/api/stop", get(stop).post(stop))
        .with_state(HttpState { store, event_tx })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    store: Arc<StateStore>,
    event_tx: mpsc::Sender<CoreEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, router(store, event_tx)).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    let player = state.store.get_state().await;
    Json(ApiState {
        stations: player.stations,
        current: player.current,
        now_playing: player.now_playing,
        location: player.location,
    })
}

async fn send(state: &HttpState, evt: CoreEvent) -> StatusCode {
    if state.event_tx.send(evt).await.is_err() {
        error!("HTTP API: core is gone");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::OK
}

async fn select_station(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    info!("HTTP API: select {}", id);
    if id.is_empty() {
        return StatusCode::BAD_REQUEST;
    }
    send(&state, CoreEvent::Select(id)).await
}

async fn stop(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: stop");
    send(&state, CoreEvent::Stop).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_proto::protocol::PlayerState;

    async fn serve(
        initial: PlayerState,
    ) -> (String, mpsc::Receiver<CoreEvent>) {
        let store = Arc::new(StateStore::new(initial));
        let (tx, rx) = mpsc::channel(8);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(store, tx)).await.unwrap();
        });
        (format!("http://{}", addr), rx)
    }

    #[tokio::test]
    async fn test_state_reports_selection_and_location() {
        let initial = PlayerState {
            rev: 2,
            stations: vec![Station {
                id: "jazz".into(),
                name: "Jazz FM".into(),
                title: "Jazz FM - Take Five".into(),
                listenurl: "http://ice:8000/jazz".into(),
            }],
            current: Some("jazz".into()),
            now_playing: Some(NowPlaying::from_title("Jazz FM - Take Five")),
            location: "http://ice:8000/#jazz".into(),
            ..Default::default()
        };
        let (base, _rx) = serve(initial).await;

        let body: serde_json::Value = reqwest::get(format!("{}/api/state", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["current"], "jazz");
        assert_eq!(body["location"], "http://ice:8000/#jazz");
        assert_eq!(body["stations"][0]["name"], "Jazz FM");
        assert_eq!(body["now_playing"]["window_title"], "Jazz FM - Take Five");
    }

    #[tokio::test]
    async fn test_select_and_stop_reach_the_core() {
        let (base, mut rx) = serve(PlayerState::default()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/select/rock", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(matches!(rx.recv().await, Some(CoreEvent::Select(id)) if id == "rock"));

        let resp = client.get(format!("{}/api/stop", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(matches!(rx.recv().await, Some(CoreEvent::Stop)));
    }
}
