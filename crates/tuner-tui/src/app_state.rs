//! AppState: read-only data handed to every component at draw/event time.
//!
//! Only the App loop writes it, from `StateUpdated` and `Log` broadcasts.

use std::path::Path;

use tuner_proto::protocol::PlayerState;

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub player: PlayerState,
    /// Last status line from the core.
    pub last_log: Option<String>,
    /// Whether the current icon file exists on disk.
    pub icon_exists: bool,
}

impl AppState {
    /// Take a new snapshot.  Returns true when the playing stream changed
    /// (different station, or playback stopped), so the spectrum can reset.
    pub fn apply_player_state(&mut self, next: PlayerState) -> bool {
        let stream_changed = next.current != self.player.current
            || next.is_playing != self.player.is_playing;
        self.icon_exists = next
            .icon
            .as_deref()
            .map(|p| Path::new(p).is_file())
            .unwrap_or(false);
        self.player = next;
        stream_changed
    }

    pub fn window_title(&self) -> Option<&str> {
        self.player
            .now_playing
            .as_ref()
            .map(|np| np.window_title.as_str())
    }
}
