mod action;
mod app;
mod app_state;
mod component;
mod components;
mod core;
mod http;
mod mpv;
mod pcm;
mod theme;
mod widgets;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use tuner_proto::config::Config;
use tuner_proto::location::Location;
use tuner_proto::state::StateStore;

use crate::core::{CoreEvent, PlayerCore};

/// What the PlayerCore broadcasts to the UI.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// The published PlayerState changed; receivers read the StateStore.
    StateUpdated,
    /// One line for the status bar.
    Log(String),
    /// Mono f32 PCM (-1..1) from the ffmpeg tap, at `audio.sample_rate`.
    PcmChunk(Arc<Vec<f32>>),
}

#[derive(Parser, Debug)]
#[command(name = "icetune")]
#[command(version)]
#[command(about = "Browse and play Icecast streams with a live spectrum", long_about = None)]
struct Cli {
    /// Icecast base URL, optionally with a station fragment (http://host:8000/#jazz)
    #[arg(short, long)]
    server: Option<String>,

    /// Station id to start playing
    #[arg(long)]
    station: Option<String>,

    /// Directory holding {id}.png station icons
    #[arg(long)]
    icons: Option<std::path::PathBuf>,

    /// Run without the terminal UI and print now-playing changes
    #[arg(long)]
    no_tui: bool,
}

fn resolve_location(cli: &Cli, config: &Config) -> anyhow::Result<Location> {
    let server = cli.server.as_deref().unwrap_or(&config.server.base_url);
    let mut location = Location::parse(server)?;
    if let Some(id) = cli.station.as_deref().filter(|id| !id.is_empty()) {
        location.set_fragment(id);
    }
    Ok(location)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = tuner_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("icetune.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; otherwise debug for us, quiet HTTP client internals.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("icetune log: {}", log_path.display());
    info!("icetune starting…");

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("config: load failed ({}), using defaults", e);
        Config::default()
    });
    if let Some(icons) = cli.icons.clone() {
        config.server.icons_dir = icons;
    }
    let location = resolve_location(&cli, &config)?;

    // PlayerCore → UI
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);
    // UI / HTTP / timers → PlayerCore
    let (event_tx, event_rx) = mpsc::channel::<CoreEvent>(1024);

    let core = PlayerCore::new(&config, location, broadcast_tx.clone(), event_tx.clone())?;
    let store = core.state_store();

    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            store.clone(),
            event_tx.clone(),
        );
    }

    let core_task = tokio::spawn(async move {
        if let Err(e) = core.run(event_rx).await {
            tracing::error!("PlayerCore exited with error: {}", e);
        }
    });

    if cli.no_tui {
        run_headless(store, broadcast_rx).await?;
    } else {
        let app = app::App::new(&config, event_tx.clone(), store)?;
        app.run(broadcast_rx).await?;
    }

    let _ = event_tx.send(CoreEvent::Shutdown).await;
    let _ = core_task.await;
    info!("icetune exiting");
    Ok(())
}

/// Print each new now-playing title until Ctrl-C.
async fn run_headless(
    store: Arc<StateStore>,
    mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
) -> anyhow::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_title: Option<String> = None;
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                break;
            }
            msg = broadcast_rx.recv() => match msg {
                Ok(BroadcastMessage::StateUpdated) => {
                    let state = store.get_state().await;
                    let title = state.now_playing.map(|np| np.window_title);
                    if title != last_title {
                        if let Some(t) = &title {
                            println!("{}", t);
                        }
                        last_title = title;
                    }
                }
                Ok(BroadcastMessage::Log(line)) => info!("{}", line),
                Ok(BroadcastMessage::PcmChunk(_)) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("headless: broadcast lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("icetune").chain(args.iter().copied()))
    }

    #[test]
    fn test_location_from_config_base() {
        let config = Config::default();
        let loc = resolve_location(&cli(&[]), &config).unwrap();
        assert_eq!(loc.base(), "http://localhost:8000/");
        assert_eq!(loc.fragment(), None);
    }

    #[test]
    fn test_server_fragment_selects_station() {
        let config = Config::default();
        let loc = resolve_location(&cli(&["--server", "http://ice:8000/#jazz"]), &config).unwrap();
        assert_eq!(loc.base(), "http://ice:8000/");
        assert_eq!(loc.fragment(), Some("jazz"));
    }

    #[test]
    fn test_station_flag_overrides_fragment() {
        let config = Config::default();
        let loc = resolve_location(
            &cli(&["--server", "http://ice:8000/#jazz", "--station", "rock"]),
            &config,
        )
        .unwrap();
        assert_eq!(loc.fragment(), Some("rock"));
    }

    #[test]
    fn test_bad_scheme_is_rejected() {
        let config = Config::default();
        assert!(resolve_location(&cli(&["--server", "ftp://ice/"]), &config).is_err());
    }
}
