//! App: component-based terminal event loop.
//!
//! - `App` owns the components and `AppState`.
//! - An `mpsc` channel carries `AppMessage`s in from the keyboard thread and
//!   the broadcast forwarder.
//! - A frame ticker at `spectrum.fps` drives the spectrum render loop.
//! - Components return `Vec<Action>`; the App dispatches them, sending
//!   playback intents to the PlayerCore.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Position, Rect},
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use tuner_proto::config::Config;
use tuner_proto::protocol::PlayerState;
use tuner_proto::state::StateStore;

use crate::core::CoreEvent;
use crate::BroadcastMessage;
use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::{now_playing::NowPlayingPane, spectrum_panel::SpectrumPanel, station_list::StationList},
    widgets::status_bar::draw_status_bar,
};

const VOLUME_STEP: f32 = 0.05;

#[derive(Debug)]
pub enum AppMessage {
    Event(Event),
    StateUpdated(PlayerState),
    Log(String),
    PcmChunk(Arc<Vec<f32>>),
}

#[derive(Debug, Default, Clone, Copy)]
struct PaneAreas {
    stations: Rect,
    now_playing: Rect,
    spectrum: Rect,
}

pub struct App {
    event_tx: mpsc::Sender<CoreEvent>,
    store: Arc<StateStore>,
    state: AppState,
    station_list: StationList,
    now_playing: NowPlayingPane,
    spectrum: SpectrumPanel,
    focus: ComponentId,
    areas: PaneAreas,
    frame_interval: Duration,
    /// Title last written to the terminal.
    window_title: Option<String>,
    should_quit: bool,
}

fn step_volume(current: f32, delta: f32) -> f32 {
    ((current + delta) * 100.0).round().clamp(0.0, 100.0) / 100.0
}

fn hit(r: Rect, col: u16, row: u16) -> bool {
    r.contains(Position { x: col, y: row })
}

impl App {
    pub fn new(
        config: &Config,
        event_tx: mpsc::Sender<CoreEvent>,
        store: Arc<StateStore>,
    ) -> anyhow::Result<Self> {
        let fps = config.spectrum.fps.clamp(1, 120);
        Ok(Self {
            event_tx,
            store,
            state: AppState::default(),
            station_list: StationList::new(),
            now_playing: NowPlayingPane::new(),
            spectrum: SpectrumPanel::new(config)?,
            focus: ComponentId::StationList,
            areas: PaneAreas::default(),
            frame_interval: Duration::from_millis(1000 / fps as u64),
            window_title: None,
            should_quit: false,
        })
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal ready, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Keyboard/mouse reader ─────────────────────────────────────────────
        // Polls so the thread notices when the loop is gone.
        let input_tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            while !input_tx.is_closed() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => match event::read() {
                        Ok(ev) => {
                            if input_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        });

        // ── Broadcast forwarder (PlayerCore → AppMessage) ─────────────────────
        let bc_tx = tx.clone();
        let bc_store = self.store.clone();
        tokio::spawn(async move {
            loop {
                let msg = match broadcast_rx.recv().await {
                    Ok(BroadcastMessage::StateUpdated) => {
                        AppMessage::StateUpdated(bc_store.get_state().await)
                    }
                    Ok(BroadcastMessage::Log(s)) => AppMessage::Log(s),
                    Ok(BroadcastMessage::PcmChunk(c)) => AppMessage::PcmChunk(c),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if bc_tx.send(msg).await.is_err() {
                    break;
                }
            }
        });

        // Stations may already be loaded before we subscribed.
        let initial = self.store.get_state().await;
        self.handle_message(AppMessage::StateUpdated(initial)).await;

        let mut frame_tick = tokio::time::interval(self.frame_interval);
        frame_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if let Some(title) = self.take_title_change() {
                execute!(terminal.backend_mut(), SetTitle(title))?;
            }

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg).await;
                    for _ in 0..MAX_DRAIN {
                        match rx.try_recv() {
                            Ok(next) => redraw |= self.handle_message(next).await,
                            Err(_) => break,
                        }
                    }
                    needs_redraw = redraw;
                }

                _ = frame_tick.tick() => {
                    self.spectrum.render_frame();
                    needs_redraw = true;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        info!("ui: closed after {} spectrum frames", self.spectrum.frames());

        Ok(())
    }

    /// Returns true when the screen needs a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                for action in self.handle_key(key) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Mouse(mouse)) => {
                for action in self.handle_mouse(mouse) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Resize(_, _)) => true,
            AppMessage::Event(_) => false,
            AppMessage::StateUpdated(next) => {
                self.on_state_updated(next);
                true
            }
            AppMessage::Log(line) => {
                self.state.last_log = Some(line);
                true
            }
            AppMessage::PcmChunk(chunk) => {
                if self.state.player.is_playing {
                    self.spectrum.push_pcm(&chunk);
                }
                false
            }
        }
    }

    fn on_state_updated(&mut self, next: PlayerState) {
        let selection_changed = next.current != self.state.player.current;
        if self.state.apply_player_state(next) {
            self.spectrum.reset();
        }
        if selection_changed {
            self.station_list.follow_current(&self.state);
        }
    }

    /// The new window title, if it differs from what the terminal shows.
    fn take_title_change(&mut self) -> Option<String> {
        let title = self.state.window_title()?;
        if self.window_title.as_deref() == Some(title) {
            return None;
        }
        self.window_title = Some(title.to_string());
        self.window_title.clone()
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return vec![Action::Quit];
        }
        let volume = self.state.player.volume;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => vec![Action::Quit],
            KeyCode::Tab => vec![Action::FocusNext],
            KeyCode::BackTab => vec![Action::FocusPrev],
            KeyCode::Char('1') => vec![Action::FocusPane(ComponentId::StationList)],
            KeyCode::Char('2') => vec![Action::FocusPane(ComponentId::NowPlaying)],
            KeyCode::Char('3') => vec![Action::FocusPane(ComponentId::Spectrum)],
            KeyCode::Char('s') => vec![Action::Stop],
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right => {
                vec![Action::Volume(step_volume(volume, VOLUME_STEP))]
            }
            KeyCode::Char('-') | KeyCode::Left => {
                vec![Action::Volume(step_volume(volume, -VOLUME_STEP))]
            }
            _ => {
                let state = &self.state;
                match self.focus {
                    ComponentId::StationList => self.station_list.handle_key(key, state),
                    ComponentId::NowPlaying => self.now_playing.handle_key(key, state),
                    ComponentId::Spectrum => self.spectrum.handle_key(key, state),
                }
            }
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        let (col, row) = (event.column, event.row);
        let state = &self.state;
        if hit(self.areas.stations, col, row) {
            self.station_list
                .handle_mouse(event, self.areas.stations, state)
        } else if hit(self.areas.now_playing, col, row) {
            self.now_playing
                .handle_mouse(event, self.areas.now_playing, state)
        } else if hit(self.areas.spectrum, col, row) {
            self.spectrum.handle_mouse(event, self.areas.spectrum, state)
        } else {
            vec![]
        }
    }

    async fn dispatch(&mut self, action: Action) {
        match action {
            Action::Select(id) => self.send_core(CoreEvent::Select(id)).await,
            Action::Stop => self.send_core(CoreEvent::Stop).await,
            Action::Volume(v) => self.send_core(CoreEvent::Volume(v)).await,
            Action::FocusNext => self.focus = self.focus.next(),
            Action::FocusPrev => self.focus = self.focus.prev(),
            Action::FocusPane(id) => self.focus = id,
            Action::Quit => self.should_quit = true,
        }
    }

    async fn send_core(&self, evt: CoreEvent) {
        if self.event_tx.send(evt).await.is_err() {
            warn!("ui: core event channel closed");
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(2)])
            .split(frame.area());
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(outer[0]);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(7), Constraint::Min(4)])
            .split(columns[1]);

        self.areas = PaneAreas {
            stations: columns[0],
            now_playing: right[0],
            spectrum: right[1],
        };

        let state = &self.state;
        self.station_list.draw(
            frame,
            self.areas.stations,
            self.focus == ComponentId::StationList,
            state,
        );
        self.now_playing.draw(
            frame,
            self.areas.now_playing,
            self.focus == ComponentId::NowPlaying,
            state,
        );
        self.spectrum.draw(
            frame,
            self.areas.spectrum,
            self.focus == ComponentId::Spectrum,
            state,
        );
        draw_status_bar(frame, outer[1], state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_proto::protocol::{NowPlaying, Station};

    fn app() -> (App, mpsc::Receiver<CoreEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let store = Arc::new(StateStore::new(PlayerState::default()));
        (App::new(&Config::default(), tx, store).unwrap(), rx)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn player(current: Option<&str>, playing: bool) -> PlayerState {
        PlayerState {
            rev: 2,
            stations: vec![
                Station {
                    id: "jazz".into(),
                    name: "Jazz FM".into(),
                    ..Default::default()
                },
                Station {
                    id: "rock".into(),
                    name: "Rock FM".into(),
                    ..Default::default()
                },
            ],
            current: current.map(str::to_string),
            is_playing: playing,
            volume: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_step_volume_clamps() {
        assert_eq!(step_volume(0.5, 0.05), 0.55);
        assert_eq!(step_volume(0.98, 0.05), 1.0);
        assert_eq!(step_volume(0.02, -0.05), 0.0);
    }

    #[tokio::test]
    async fn test_global_keys() {
        let (mut app, _rx) = app();
        app.on_state_updated(player(None, false));
        assert_eq!(app.handle_key(press(KeyCode::Char('q'))), vec![Action::Quit]);
        assert_eq!(app.handle_key(press(KeyCode::Char('s'))), vec![Action::Stop]);
        assert_eq!(
            app.handle_key(press(KeyCode::Char('+'))),
            vec![Action::Volume(0.55)]
        );
        assert_eq!(
            app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            vec![Action::Quit]
        );
    }

    #[tokio::test]
    async fn test_enter_on_station_reaches_core() {
        let (mut app, mut rx) = app();
        app.on_state_updated(player(None, false));

        app.handle_message(AppMessage::Event(Event::Key(press(KeyCode::Down))))
            .await;
        app.handle_message(AppMessage::Event(Event::Key(press(KeyCode::Enter))))
            .await;
        assert!(matches!(rx.recv().await, Some(CoreEvent::Select(id)) if id == "rock"));
    }

    #[tokio::test]
    async fn test_keys_go_to_focused_pane_only() {
        let (mut app, mut rx) = app();
        app.on_state_updated(player(None, false));
        app.dispatch(Action::FocusPane(ComponentId::Spectrum)).await;
        assert!(app.handle_key(press(KeyCode::Enter)).is_empty());
        app.dispatch(Action::FocusNext).await;
        assert_eq!(app.focus, ComponentId::StationList);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_title_follows_now_playing() {
        let (mut app, _rx) = app();
        let mut next = player(Some("jazz"), true);
        next.now_playing = Some(NowPlaying::from_title("Jazz FM - Take Five"));
        app.on_state_updated(next.clone());

        assert_eq!(app.take_title_change().as_deref(), Some("Jazz FM - Take Five"));
        assert_eq!(app.take_title_change(), None);

        next.rev = 3;
        next.now_playing = Some(NowPlaying::from_title("Jazz FM - So What"));
        app.on_state_updated(next);
        assert_eq!(app.take_title_change().as_deref(), Some("Jazz FM - So What"));
    }

    #[tokio::test]
    async fn test_pcm_ignored_while_stopped() {
        let (mut app, _rx) = app();
        app.on_state_updated(player(Some("jazz"), false));
        let redraw = app
            .handle_message(AppMessage::PcmChunk(Arc::new(vec![0.5; 1024])))
            .await;
        assert!(!redraw);
    }
}
