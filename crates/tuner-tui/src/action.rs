//! Action enum: user intents produced by components and global keys.

/// Focusable panes, in Tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    StationList,
    NowPlaying,
    Spectrum,
}

impl ComponentId {
    pub fn next(self) -> Self {
        match self {
            Self::StationList => Self::NowPlaying,
            Self::NowPlaying => Self::Spectrum,
            Self::Spectrum => Self::StationList,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::StationList => Self::Spectrum,
            Self::NowPlaying => Self::StationList,
            Self::Spectrum => Self::NowPlaying,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    /// Play the station with this id.
    Select(String),
    Stop,
    /// Absolute volume, 0..=1.
    Volume(f32),

    // ── Navigation ───────────────────────────────────────────────────────────
    FocusNext,
    FocusPrev,
    FocusPane(ComponentId),

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
}
