//! PlaybackController: owns the current selection, the session location and
//! the now-playing display.
//!
//! The controller never touches the network or the decoder directly; it talks
//! to a [`StationSource`] and a [`MediaSink`].  The TUI core owns exactly one
//! controller and is the only thing that mutates it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::directory::{DirectoryError, StationSource};
use crate::location::{icon_path, Location};
use crate::protocol::{NowPlaying, PlayerState, Station};

/// The playable media element: something that can be pointed at a URL and
/// told to play.
pub trait MediaSink: Send {
    fn set_source(&mut self, url: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn play(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn stop(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;
    fn set_volume(&mut self, volume: f32) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Release whatever backs the sink.  Called once on exit.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl<T: StationSource> StationSource for Arc<T> {
    fn fetch_stations(&self) -> impl Future<Output = Result<Vec<Station>, DirectoryError>> + Send {
        T::fetch_stations(self)
    }
}

pub struct PlaybackController<S, M> {
    source: S,
    sink: M,
    location: Location,
    icons_dir: PathBuf,
    selection: Option<String>,
    icon: Option<PathBuf>,
    now_playing: Option<NowPlaying>,
    stations: Vec<Station>,
    volume: f32,
    is_playing: bool,
    rev: u64,
}

impl<S: StationSource, M: MediaSink> PlaybackController<S, M> {
    pub fn new(source: S, sink: M, location: Location, icons_dir: PathBuf, volume: f32) -> Self {
        Self {
            source,
            sink,
            location,
            icons_dir,
            selection: None,
            icon: None,
            now_playing: None,
            stations: Vec::new(),
            volume: volume.clamp(0.0, 1.0),
            is_playing: false,
            rev: 1,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &M {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut M {
        &mut self.sink
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn icon(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn rev(&self) -> u64 {
        self.rev
    }

    /// Initial directory load for the station list.  Errors propagate; the
    /// caller decides whether an empty list is acceptable.
    pub async fn load_directory(&mut self) -> Result<&[Station], DirectoryError> {
        let stations = self.source.fetch_stations().await?;
        info!("directory: loaded {} stations", stations.len());
        self.stations = stations;
        self.rev += 1;
        Ok(&self.stations)
    }

    /// Switch to `id`: icon, media source, play, selection, fragment, then an
    /// immediate metadata refresh.
    pub async fn select(&mut self, id: &str) {
        self.activate(id).await;
        self.refresh_metadata().await;
    }

    /// Every step of [`select`](Self::select) except the metadata fetch.
    /// Callers that must not wait on the network run the refresh themselves.
    ///
    /// Decoder failures are logged and do not abort the remaining steps.
    pub async fn activate(&mut self, id: &str) {
        info!("select: {}", id);

        self.icon = Some(icon_path(&self.icons_dir, id));

        let url = self.location.stream_url(id);
        let mut ok = true;
        if let Err(e) = self.sink.set_source(&url).await {
            warn!("select: set_source {} failed: {}", url, e);
            ok = false;
        }
        if let Err(e) = self.sink.play().await {
            warn!("select: play {} failed: {}", url, e);
            ok = false;
        }
        self.is_playing = ok;

        self.selection = Some(id.to_string());
        self.location.set_fragment(id);
        self.rev += 1;
    }

    /// Re-fetch the directory and update the display for the current
    /// selection.  Returns true when the display changed.
    pub async fn refresh_metadata(&mut self) -> bool {
        if self.selection.is_none() {
            return false;
        }
        match self.source.fetch_stations().await {
            Ok(stations) => self.apply_poll(stations),
            Err(e) => {
                warn!("refresh: directory fetch failed: {}", e);
                false
            }
        }
    }

    /// Apply a directory poll fetched elsewhere.  The first station whose id
    /// matches the selection wins; no match leaves the display untouched.
    ///
    /// `rev` only moves when the station list or the display changed.
    pub fn apply_poll(&mut self, stations: Vec<Station>) -> bool {
        if stations != self.stations {
            self.stations = stations;
            self.rev += 1;
        }

        let Some(current) = self.selection.as_deref() else {
            return false;
        };
        let Some(station) = self.stations.iter().find(|s| s.id == current) else {
            debug!("refresh: {} not in poll", current);
            return false;
        };

        let np = NowPlaying::from_title(&station.title);
        if self.now_playing.as_ref() == Some(&np) {
            return false;
        }
        info!("now playing: {}", np.window_title);
        self.now_playing = Some(np);
        self.rev += 1;
        true
    }

    pub async fn stop(&mut self) -> anyhow::Result<()> {
        self.sink.stop().await?;
        self.is_playing = false;
        self.rev += 1;
        Ok(())
    }

    pub async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        self.volume = volume.clamp(0.0, 1.0);
        self.rev += 1;
        self.sink.set_volume(self.volume).await
    }

    pub fn snapshot(&self) -> PlayerState {
        PlayerState {
            rev: self.rev,
            stations: self.stations.clone(),
            current: self.selection.clone(),
            now_playing: self.now_playing.clone(),
            icon: self.icon.as_ref().map(|p| p.display().to_string()),
            location: self.location.to_string(),
            volume: self.volume,
            is_playing: self.is_playing,
        }
    }
}
