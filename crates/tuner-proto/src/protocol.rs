use serde::{Deserialize, Serialize};

/// Separator Icecast sources use between the station label and the song in
/// their `title` metadata.
pub const TITLE_SEPARATOR: &str = " - ";

/// Document served at `{base}status-json.xsl`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusDocument {
    pub icestats: IceStats,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IceStats {
    /// Icecast writes a bare object when exactly one mount is live and drops
    /// the key entirely when none are.
    #[serde(default)]
    pub source: SourceList,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceList {
    Many(Vec<IcecastSource>),
    One(IcecastSource),
}

impl Default for SourceList {
    fn default() -> Self {
        SourceList::Many(Vec::new())
    }
}

impl SourceList {
    pub fn into_vec(self) -> Vec<IcecastSource> {
        match self {
            SourceList::Many(v) => v,
            SourceList::One(s) => vec![s],
        }
    }
}

/// One `icestats.source` entry.  Only the fields we read are modelled; the
/// server sends many more (bitrate, listeners, genre, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct IcecastSource {
    pub listenurl: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// A playable stream as shown in the station list.  Rebuilt on every poll;
/// only `id` carries identity between polls.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Station {
    /// Last path segment of `listenurl`.
    pub id: String,
    /// Display label: the part of `title` before the first separator, or `id`.
    pub name: String,
    /// Raw title metadata.
    pub title: String,
    pub listenurl: String,
}

/// What the now-playing pane and the window title show.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NowPlaying {
    /// One entry per `" - "`-separated segment of the title.
    pub lines: Vec<String>,
    /// Raw title, used as the terminal window title.
    pub window_title: String,
}

impl NowPlaying {
    pub fn from_title(title: &str) -> Self {
        Self {
            lines: title.split(TITLE_SEPARATOR).map(str::to_string).collect(),
            window_title: title.to_string(),
        }
    }

    /// The display text, separators replaced by line breaks.
    pub fn display_text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Snapshot of the player published to the UI and the control API.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerState {
    /// Incremented on every change.
    pub rev: u64,
    pub stations: Vec<Station>,
    pub current: Option<String>,
    pub now_playing: Option<NowPlaying>,
    /// Icon path for the current selection (may not exist on disk).
    pub icon: Option<String>,
    /// `{base}#{id}` address of the session.
    pub location: String,
    pub volume: f32,
    pub is_playing: bool,
}

impl PlayerState {
    pub fn current_station(&self) -> Option<&Station> {
        let id = self.current.as_deref()?;
        self.stations.iter().find(|s| s.id == id)
    }
}
