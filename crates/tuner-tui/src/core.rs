//! PlayerCore: single-owner event loop for all mutable playback state.
//!
//! The TUI, the HTTP API and the refresh timer send `CoreEvent`s here.  The
//! core owns the `PlaybackController` (and through it the mpv sink)
//! exclusively, publishes snapshots to the `StateStore`, and broadcasts
//! `StateUpdated` after every change.
//!
//! Directory polls for the metadata refresh are spawned so a slow server
//! never stalls the loop; the result comes back as `DirectoryFetched`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tuner_proto::config::Config;
use tuner_proto::controller::{MediaSink, PlaybackController};
use tuner_proto::directory::{HttpDirectory, StationSource};
use tuner_proto::location::Location;
use tuner_proto::protocol::Station;
use tuner_proto::state::StateStore;

use crate::mpv::{MpvEvent, MpvSink};
use crate::pcm::spawn_pcm_tap;
use crate::BroadcastMessage;

/// All inputs into the core loop.
#[derive(Debug)]
pub enum CoreEvent {
    Select(String),
    Stop,
    Volume(f32),
    /// Metadata refresh timer fired.
    RefreshTick,
    /// A spawned directory poll finished.
    DirectoryFetched(Vec<Station>),
    Mpv(MpvEvent),
    Shutdown,
}

pub struct PlayerCore<M = MpvSink> {
    controller: PlaybackController<Arc<HttpDirectory>, M>,
    store: Arc<StateStore>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    event_tx: mpsc::Sender<CoreEvent>,
    pcm_task: Option<tokio::task::AbortHandle>,
    sample_rate: u32,
    refresh_interval: Duration,
    cancel: CancellationToken,
}

impl PlayerCore<MpvSink> {
    pub fn new(
        config: &Config,
        location: Location,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> anyhow::Result<Self> {
        // Forward mpv events into our own loop.
        let (mpv_tx, mut mpv_rx) = mpsc::channel::<MpvEvent>(64);
        let core_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = mpv_rx.recv().await {
                if core_tx.send(CoreEvent::Mpv(evt)).await.is_err() {
                    break;
                }
            }
        });

        let sink = MpvSink::new(config.audio.default_volume, mpv_tx);
        Self::with_sink(config, location, sink, broadcast_tx, event_tx)
    }
}

impl<M: MediaSink + 'static> PlayerCore<M> {
    pub fn with_sink(
        config: &Config,
        location: Location,
        sink: M,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> anyhow::Result<Self> {
        let directory = Arc::new(HttpDirectory::new(location.base())?);
        let controller = PlaybackController::new(
            directory,
            sink,
            location,
            config.server.icons_dir.clone(),
            config.audio.default_volume,
        );
        let store = Arc::new(StateStore::new(controller.snapshot()));

        Ok(Self {
            controller,
            store,
            broadcast_tx,
            event_tx,
            pcm_task: None,
            sample_rate: config.audio.sample_rate,
            refresh_interval: Duration::from_secs(config.server.refresh_interval_secs.max(1)),
            cancel: CancellationToken::new(),
        })
    }

    pub fn state_store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    /// Run until `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("core: starting, server {}", self.controller.location().base());

        match self.controller.load_directory().await {
            Ok(stations) => {
                let count = stations.len();
                self.log(format!("{} stations", count));
            }
            Err(e) => {
                warn!("core: initial directory load failed: {}", e);
                self.log(format!("directory unavailable: {}", e));
            }
        }
        self.publish().await;

        if let Some(id) = self.controller.location().fragment().map(str::to_string) {
            info!("core: restoring selection #{}", id);
            self.select(&id).await;
        }

        spawn_refresh_timer(self.refresh_interval, self.event_tx.clone(), self.cancel.clone());

        while let Some(evt) = event_rx.recv().await {
            match evt {
                CoreEvent::Shutdown => {
                    info!("core: shutdown requested");
                    break;
                }
                CoreEvent::Select(id) => self.select(&id).await,
                CoreEvent::Stop => self.stop().await,
                CoreEvent::Volume(v) => {
                    if let Err(e) = self.controller.set_volume(v).await {
                        warn!("core: set_volume failed: {}", e);
                    }
                    self.publish().await;
                }
                CoreEvent::RefreshTick => self.spawn_refresh(),
                CoreEvent::DirectoryFetched(stations) => {
                    if self.controller.apply_poll(stations) {
                        if let Some(np) = self.controller.now_playing() {
                            let title = np.window_title.clone();
                            self.log(format!("now playing: {}", title));
                        }
                    }
                    self.publish().await;
                }
                CoreEvent::Mpv(evt) => self.handle_mpv_event(evt),
            }
        }

        self.cleanup().await;
        Ok(())
    }

    /// Fire-and-forget directory poll for the current selection.
    fn spawn_refresh(&self) {
        if self.controller.selection().is_none() {
            return;
        }
        let directory = Arc::clone(self.controller.source());
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            match directory.fetch_stations().await {
                Ok(stations) => {
                    let _ = tx.send(CoreEvent::DirectoryFetched(stations)).await;
                }
                Err(e) => warn!("refresh: directory fetch failed: {}", e),
            }
        });
    }

    /// The metadata fetch runs in the background and comes back as
    /// `DirectoryFetched`, so the loop keeps serving events meanwhile.
    async fn select(&mut self, id: &str) {
        self.stop_pcm_tap();
        self.controller.activate(id).await;
        self.spawn_refresh();

        if self.controller.is_playing() {
            let url = self.controller.location().stream_url(id);
            self.pcm_task = Some(spawn_pcm_tap(
                url,
                self.sample_rate,
                self.broadcast_tx.clone(),
            ));
            self.log(format!("playing {}", id));
        } else {
            self.log(format!("could not start {}", id));
        }
        self.publish().await;
    }

    async fn stop(&mut self) {
        self.stop_pcm_tap();
        if let Err(e) = self.controller.stop().await {
            warn!("core: stop failed: {}", e);
        }
        self.publish().await;
    }

    fn stop_pcm_tap(&mut self) {
        if let Some(h) = self.pcm_task.take() {
            h.abort();
        }
    }

    fn handle_mpv_event(&mut self, evt: MpvEvent) {
        if let Some(reason) = evt.end_file_error() {
            warn!("mpv: playback error: {}", reason);
            self.log(format!("playback error: {}", reason));
        } else {
            debug!("mpv event: {:?}", evt.raw);
        }
    }

    async fn publish(&self) {
        if self.store.publish(self.controller.snapshot()).await {
            let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
        }
    }

    fn log(&self, msg: String) {
        let _ = self.broadcast_tx.send(BroadcastMessage::Log(msg));
    }

    async fn cleanup(&mut self) {
        self.cancel.cancel();
        self.stop_pcm_tap();
        self.controller.sink_mut().shutdown().await;
    }
}

/// Sends `RefreshTick` every `period`, first one `period` from now.
fn spawn_refresh_timer(
    period: Duration,
    tx: mpsc::Sender<CoreEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if tx.send(CoreEvent::RefreshTick).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("core: refresh timer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use axum::{extract::State, routing::get, Router};
    use tuner_proto::protocol::PlayerState;

    /// Sink without a decoder: playback never starts, so no pcm tap is spawned.
    struct NoDecoder;

    impl MediaSink for NoDecoder {
        async fn set_source(&mut self, _url: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn play(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("no decoder")
        }

        async fn stop(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn set_volume(&mut self, _volume: f32) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct Icecast {
        hits: Arc<AtomicUsize>,
        bodies: Arc<Mutex<Vec<String>>>,
        /// Requests from this hit number on are answered after `delay`.
        slow_from: usize,
        delay: Duration,
    }

    async fn status(State(ice): State<Icecast>) -> String {
        let hit = ice.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if hit >= ice.slow_from {
            tokio::time::sleep(ice.delay).await;
        }
        let mut bodies = ice.bodies.lock().unwrap();
        if bodies.len() > 1 {
            bodies.remove(0)
        } else {
            bodies[0].clone()
        }
    }

    fn status_json(title: &str) -> String {
        serde_json::json!({
            "icestats": { "source": [
                { "listenurl": "http://ice/jazz", "title": title },
                { "listenurl": "http://ice/rock", "title": "Rock FM - Paranoid" }
            ]}
        })
        .to_string()
    }

    async fn icecast(bodies: Vec<String>, slow_from: usize, delay: Duration) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let ice = Icecast {
            hits: hits.clone(),
            bodies: Arc::new(Mutex::new(bodies)),
            slow_from,
            delay,
        };
        let app = Router::new()
            .route("/status-json.xsl", get(status))
            .with_state(ice);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/", addr), hits)
    }

    struct Running {
        store: Arc<StateStore>,
        tx: mpsc::Sender<CoreEvent>,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(url: &str) -> Running {
        let (broadcast_tx, _) = broadcast::channel(64);
        let (tx, rx) = mpsc::channel(64);
        let core = PlayerCore::with_sink(
            &Config::default(),
            Location::parse(url).unwrap(),
            NoDecoder,
            broadcast_tx,
            tx.clone(),
        )
        .unwrap();
        let store = core.state_store();
        let task = tokio::spawn(async move {
            core.run(rx).await.unwrap();
        });
        Running { store, tx, task }
    }

    async fn wait_for(store: &StateStore, within: Duration, cond: impl Fn(&PlayerState) -> bool) -> bool {
        tokio::time::timeout(within, async {
            while !cond(&store.get_state().await) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }

    fn title(state: &PlayerState) -> Option<&str> {
        state.now_playing.as_ref().map(|np| np.window_title.as_str())
    }

    #[tokio::test]
    async fn test_fragment_restores_selection_at_startup() {
        let (base, hits) = icecast(vec![status_json("Jazz FM - Take Five")], usize::MAX, Duration::ZERO).await;
        let core = start(&format!("{}#jazz", base));

        assert!(
            wait_for(&core.store, Duration::from_secs(3), |s| {
                title(s) == Some("Jazz FM - Take Five")
            })
            .await
        );
        let state = core.store.get_state().await;
        assert_eq!(state.current.as_deref(), Some("jazz"));
        assert!(state.location.ends_with("/#jazz"));
        // initial directory load + the refresh that follows select
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        core.tx.send(CoreEvent::Shutdown).await.unwrap();
        core.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_tick_polls_only_with_selection() {
        let (base, hits) = icecast(
            vec![
                status_json("Jazz FM - Take Five"),
                status_json("Jazz FM - Take Five"),
                status_json("Jazz FM - Blue in Green"),
            ],
            usize::MAX,
            Duration::ZERO,
        )
        .await;
        let core = start(&base);
        assert!(wait_for(&core.store, Duration::from_secs(3), |s| s.stations.len() == 2).await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Nothing selected: the tick is dropped.  The volume change marks
        // the point where the tick has been handled.
        core.tx.send(CoreEvent::RefreshTick).await.unwrap();
        core.tx.send(CoreEvent::Volume(0.2)).await.unwrap();
        assert!(wait_for(&core.store, Duration::from_secs(1), |s| s.volume == 0.2).await);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        core.tx.send(CoreEvent::Select("jazz".into())).await.unwrap();
        assert!(
            wait_for(&core.store, Duration::from_secs(3), |s| {
                title(s) == Some("Jazz FM - Take Five")
            })
            .await
        );
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        core.tx.send(CoreEvent::RefreshTick).await.unwrap();
        assert!(
            wait_for(&core.store, Duration::from_secs(3), |s| {
                title(s) == Some("Jazz FM - Blue in Green")
            })
            .await
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        core.tx.send(CoreEvent::Shutdown).await.unwrap();
        core.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_select_does_not_wait_for_directory() {
        // First request (startup load) is fast, everything after takes 3 s.
        let (base, _hits) = icecast(vec![status_json("Jazz FM - Take Five")], 2, Duration::from_secs(3)).await;
        let core = start(&base);
        assert!(wait_for(&core.store, Duration::from_secs(3), |s| s.stations.len() == 2).await);

        core.tx.send(CoreEvent::Select("jazz".into())).await.unwrap();
        core.tx.send(CoreEvent::Volume(0.3)).await.unwrap();
        assert!(
            wait_for(&core.store, Duration::from_millis(1000), |s| s.volume == 0.3).await,
            "volume change waited on the directory fetch"
        );
        let state = core.store.get_state().await;
        assert_eq!(state.current.as_deref(), Some("jazz"));
        assert!(state.now_playing.is_none());

        core.tx.send(CoreEvent::Shutdown).await.unwrap();
        core.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_timer_fires_once_per_period() {
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let period = Duration::from_secs(5);
        let timer = spawn_refresh_timer(period, tx, cancel.clone());
        // Let the task arm its interval before moving the clock.
        tokio::task::yield_now().await;

        tokio::time::advance(period - Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(matches!(rx.recv().await, Some(CoreEvent::RefreshTick)));
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        timer.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
