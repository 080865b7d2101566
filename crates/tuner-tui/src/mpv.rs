//! mpv IPC driver: the playable media element behind the controller.
//!
//! ```text
//!   MpvDriver::spawn_and_connect()
//!         │
//!         ├── writer_task   ← PendingRequest via mpsc → socket
//!         └── reader_task   ← JSON lines from socket
//!                                ├── response (request_id) → oneshot
//!                                └── event                 → event_tx
//! ```
//!
//! `MpvSink` wraps the driver and implements `MediaSink`; mpv is spawned
//! lazily on the first `set_source` and respawned if it died.
//!
//! Unix uses a domain socket, Windows a named pipe `\\.\pipe\<name>`.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use tuner_proto::controller::MediaSink;

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

type Reply = oneshot::Sender<anyhow::Result<Value>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: Reply,
}

/// Commands written to mpv that are still waiting for their `request_id`.
#[derive(Clone, Default)]
struct Replies {
    waiting: Arc<Mutex<HashMap<u64, Reply>>>,
}

impl Replies {
    /// Must run before the command is written, or a fast reply is lost.
    async fn expect(&self, req_id: u64, reply: Reply) {
        self.waiting.lock().await.insert(req_id, reply);
    }

    async fn resolve(&self, req_id: u64, result: anyhow::Result<Value>) {
        match self.waiting.lock().await.remove(&req_id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!("mpv: reply for unknown req={}", req_id),
        }
    }

    /// The connection is gone: every waiter gets `why`.
    async fn close(&self, why: &str) {
        for (_, tx) in self.waiting.lock().await.drain() {
            let _ = tx.send(Err(anyhow::anyhow!("{}", why)));
        }
    }
}

/// One JSON line from mpv.
#[derive(Debug)]
enum Incoming {
    Reply(u64, anyhow::Result<Value>),
    Event(MpvEvent),
}

fn decode_line(line: &str) -> Option<Incoming> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let val: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!("mpv: invalid json '{}': {}", line, e);
            return None;
        }
    };
    match val.get("request_id").and_then(Value::as_u64) {
        Some(req_id) => {
            let result = if val["error"].as_str() == Some("success") {
                Ok(val)
            } else {
                let err = val["error"].as_str().unwrap_or("unknown error");
                Err(anyhow::anyhow!("mpv error: {}", err))
            };
            Some(Incoming::Reply(req_id, result))
        }
        None => Some(Incoming::Event(MpvEvent { raw: val })),
    }
}

/// Unsolicited mpv event (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// `Some(reason)` for an `end-file` that ended in an error.
    pub fn end_file_error(&self) -> Option<&str> {
        if self.event_name()? != "end-file" {
            return None;
        }
        if self.raw.get("reason")?.as_str()? != "error" {
            return None;
        }
        Some(
            self.raw
                .get("file_error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error"),
        )
    }
}

/// Build the JSON line for one IPC command.
fn encode_command(req_id: u64, command: &Value) -> anyhow::Result<String> {
    let msg = json!({ "command": command, "request_id": req_id });
    let mut raw = serde_json::to_string(&msg)?;
    raw.push('\n');
    Ok(raw)
}

fn volume_percent(volume: f32) -> f64 {
    (volume as f64 * 100.0).clamp(0.0, 100.0).round()
}

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let payload = encode_command(req_id, &command)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub async fn load_stream(&self, url: &str) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", url);
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, volume: f32) -> anyhow::Result<()> {
        self.send(json!(["set_property", "volume", volume_percent(volume)]))
            .await?;
        Ok(())
    }
}

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: tuner_proto::platform::mpv_socket_name(),
            process: None,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("mpv process exited: {}", status);
                false
            }
            Err(e) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn spawn_process(&mut self, volume: f32) -> anyhow::Result<()> {
        let mpv_binary = tuner_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let stderr_path = tuner_proto::platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--quiet")
            .arg(tuner_proto::platform::mpv_socket_arg(&self.socket_name))
            .arg(format!("--volume={}", volume_percent(volume)))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!(
            "mpv: spawned {:?} pid {:?}, stderr -> {:?}",
            mpv_binary,
            child.id(),
            stderr_path
        );
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        volume: f32,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        self.spawn_process(volume)?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to {}", self.socket_name);
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        volume: f32,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.spawn_process(volume)?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to {}", pipe_path);
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let replies = Replies::default();
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, replies.clone()));
    tokio::spawn(reader_task(read_half, replies, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn reader_task<R>(read: R, replies: Replies, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(read).lines();
    let why = loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_line(&line) {
                Some(Incoming::Reply(req_id, result)) => replies.resolve(req_id, result).await,
                Some(Incoming::Event(evt)) => {
                    let _ = event_tx.send(evt).await;
                }
                None => {}
            },
            Ok(None) => break "mpv IPC connection closed",
            Err(e) => {
                warn!("mpv reader: {}", e);
                break "mpv IPC read error";
            }
        }
    };
    debug!("mpv reader: {}", why);
    replies.close(why).await;
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, replies: Replies)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        replies.expect(req.req_id, req.reply).await;
        debug!("mpv writer: req={} {}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: {}", e);
            replies
                .resolve(req.req_id, Err(anyhow::anyhow!("mpv write error: {}", e)))
                .await;
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

/// `MediaSink` backed by an mpv child process.
pub struct MpvSink {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    event_tx: mpsc::Sender<MpvEvent>,
    source: Option<String>,
    volume: f32,
}

impl MpvSink {
    pub fn new(volume: f32, event_tx: mpsc::Sender<MpvEvent>) -> Self {
        Self {
            driver: MpvDriver::new(),
            handle: None,
            event_tx,
            source: None,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    async fn ensure_handle(&mut self) -> anyhow::Result<MpvHandle> {
        if self.handle.is_some() && !self.driver.process_alive() {
            warn!("mpv: process died, respawning");
            self.handle = None;
        }
        if let Some(h) = &self.handle {
            return Ok(h.clone());
        }
        let handle = self
            .driver
            .spawn_and_connect(self.volume, self.event_tx.clone())
            .await?;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

}

impl MediaSink for MpvSink {
    async fn set_source(&mut self, url: &str) -> anyhow::Result<()> {
        let handle = self.ensure_handle().await?;
        self.source = Some(url.to_string());
        handle.load_stream(url).await
    }

    async fn play(&mut self) -> anyhow::Result<()> {
        let handle = self.ensure_handle().await?;
        if self.source.is_none() {
            anyhow::bail!("no source loaded");
        }
        handle.set_pause(false).await?;
        handle.set_volume(self.volume).await
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.source = None;
        match &self.handle {
            Some(h) => h.stop().await,
            None => Ok(()),
        }
    }

    async fn set_volume(&mut self, volume: f32) -> anyhow::Result<()> {
        self.volume = volume.clamp(0.0, 1.0);
        match &self.handle {
            Some(h) => h.set_volume(self.volume).await,
            None => Ok(()),
        }
    }

    async fn shutdown(&mut self) {
        self.handle = None;
        self.driver.kill().await;
    }
}
