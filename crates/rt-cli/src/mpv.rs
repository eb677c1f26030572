//! mpv IPC bridge with separated reader/writer tasks.
//!
//! Architecture:
//!
//! ```text
//!   MpvDriver::connect(spawn)
//!         │
//!         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
//!         └── reader_task   ← reads JSON lines from socket
//!                                ├── response (has request_id) → matched oneshot::Sender
//!                                └── event / property-change   → dropped (trace log)
//! ```
//!
//! The mpv process is started idle with an IPC socket and deliberately
//! outlives the `rt` invocation that spawned it; later invocations reconnect
//! to the same socket. Stream ids are mpv playlist entry ids.
//!
//! Platform notes:
//! - Unix:   Unix domain sockets
//! - Windows: Named pipes  \\.\pipe\<name>

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, trace, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

use crate::bridge::{Bridge, BridgeError, TrackStatus};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

type Reply = Result<Value, BridgeError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<Reply>,
}

// ── handle ────────────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.  Use `send()` to fire a command
/// and await the response.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> Reply {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)
            .map_err(|e| BridgeError::CommandFailed(e.to_string()))?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BridgeError::Unavailable("mpv writer task gone".to_string()))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| BridgeError::Unavailable(format!("mpv IPC timeout for req={}", req_id)))?
            .map_err(|_| BridgeError::Unavailable(format!("mpv reply channel dropped req={}", req_id)))?
    }

    async fn playlist(&self) -> Result<Vec<PlaylistEntry>, BridgeError> {
        let resp = self.send(json!(["get_property", "playlist"])).await?;
        let entries = serde_json::from_value(resp["data"].clone())
            .map_err(|e| BridgeError::CommandFailed(format!("unexpected playlist: {}", e)))?;
        Ok(entries)
    }

    /// Position and entry of the stream with mpv playlist id `stream_id`.
    async fn find_entry(&self, stream_id: &str) -> Result<(usize, PlaylistEntry), BridgeError> {
        let playlist = self.playlist().await?;
        playlist
            .into_iter()
            .enumerate()
            .find(|(_, e)| e.id.map(|id| id.to_string()).as_deref() == Some(stream_id))
            .ok_or_else(|| BridgeError::NotFound(stream_id.to_string()))
    }

    async fn set_pause(&self, paused: bool) -> Result<(), BridgeError> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    async fn get_bool(&self, property: &str) -> Result<bool, BridgeError> {
        let resp = self.send(json!(["get_property", property])).await?;
        Ok(resp["data"].as_bool().unwrap_or(false))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PlaylistEntry {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    current: bool,
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Finds or starts the shared mpv process.
pub struct MpvDriver {
    socket_name: String,
    volume: f32,
}

impl MpvDriver {
    pub fn new(volume: f32) -> Self {
        Self {
            socket_name: rt_proto::platform::mpv_socket_name(),
            volume,
        }
    }

    /// Connect to a running mpv, spawning one first when `spawn` is set.
    /// Returns `Ok(None)` when nothing is running and spawning was not asked for.
    pub async fn connect(&self, spawn: bool) -> Result<Option<MpvHandle>, BridgeError> {
        if let Some(handle) = self.try_connect().await {
            return Ok(Some(handle));
        }
        if !spawn {
            debug!("mpv: no running instance");
            return Ok(None);
        }
        self.spawn_and_connect().await.map(Some)
    }

    fn spawn_process(&self) -> Result<(), BridgeError> {
        info!("mpv: spawning new process");
        let mpv_binary = rt_proto::platform::find_mpv_binary()
            .ok_or_else(|| BridgeError::Unavailable("mpv binary not found".to_string()))?;

        let vol_arg = format!(
            "--volume={}",
            (self.volume * 100.0).clamp(0.0, 100.0).round() as i64
        );
        let ipc_arg = rt_proto::platform::mpv_socket_arg();

        let mut cmd = std::process::Command::new(mpv_binary);
        cmd.arg("--no-video")
            .arg("--idle=yes")
            .arg("--force-window=no")
            .arg(&ipc_arg)
            .arg("--quiet")
            .arg(vol_arg)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        // Own process group so the player survives the terminal that launched us.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        // The child handle is dropped on purpose; mpv keeps running.
        cmd.spawn()
            .map_err(|e| BridgeError::Unavailable(format!("failed to launch mpv: {}", e)))?;
        Ok(())
    }

    #[cfg(unix)]
    async fn try_connect(&self) -> Option<MpvHandle> {
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        if !socket_path.exists() {
            return None;
        }
        match UnixStream::connect(&socket_path).await {
            Ok(stream) => {
                debug!("mpv: connected to existing IPC socket");
                Some(Self::start_io_tasks(stream))
            }
            Err(e) => {
                warn!("mpv: stale IPC socket {:?}: {}", socket_path, e);
                None
            }
        }
    }

    #[cfg(unix)]
    async fn spawn_and_connect(&self) -> Result<MpvHandle, BridgeError> {
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        self.spawn_process()?;

        // Wait for socket to appear
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            return Err(BridgeError::Unavailable(
                "mpv IPC socket did not appear".to_string(),
            ));
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| BridgeError::Unavailable(format!("mpv IPC connect failed: {}", e)))?;
        info!("mpv: connected to IPC socket");
        Ok(Self::start_io_tasks(stream))
    }

    #[cfg(unix)]
    fn start_io_tasks(stream: UnixStream) -> MpvHandle {
        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);

        // pending map: req_id → reply channel.  Shared between writer (inserts) and reader (resolves).
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

        tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
        tokio::spawn(reader_task(reader, pending));

        MpvHandle { tx: cmd_tx }
    }

    // ── Windows ───────────────────────────────────────────────────────────────

    #[cfg(windows)]
    async fn try_connect(&self) -> Option<MpvHandle> {
        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        match ClientOptions::new().open(&pipe_path) {
            Ok(client) => {
                debug!("mpv: connected to existing named pipe");
                Some(Self::start_io_tasks_windows(client))
            }
            Err(_) => None,
        }
    }

    #[cfg(windows)]
    async fn spawn_and_connect(&self) -> Result<MpvHandle, BridgeError> {
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                return Ok(Self::start_io_tasks_windows(client));
            }
        }
        Err(BridgeError::Unavailable(
            "mpv named pipe did not appear".to_string(),
        ))
    }

    #[cfg(windows)]
    fn start_io_tasks_windows(pipe: tokio::net::windows::named_pipe::NamedPipeClient) -> MpvHandle {
        let (read_half, write_half) = tokio::io::split(pipe);
        let reader = BufReader::new(read_half);

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

        tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
        tokio::spawn(reader_task(reader, pending));

        MpvHandle { tx: cmd_tx }
    }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(BridgeError::Unavailable(
                        "mpv IPC connection closed".to_string(),
                    )));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let _ = tx.send(response_result(req_id, val));
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    trace!("mpv reader: event {}", trimmed);
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(BridgeError::Unavailable(format!(
                        "mpv IPC read error: {}",
                        e
                    ))));
                }
                break;
            }
        }
    }
}

fn response_result(req_id: u64, val: Value) -> Reply {
    if val["error"].as_str() == Some("success") {
        debug!("mpv reader: response req={} ok", req_id);
        Ok(val)
    } else {
        let err = val["error"]
            .as_str()
            .unwrap_or("unknown error")
            .to_string();
        debug!("mpv reader: response req={} err={}", req_id, err);
        Err(BridgeError::CommandFailed(err))
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register reply channel before writing so reader can match it
        {
            let mut map = pending.lock().await;
            map.insert(req.req_id, req.reply);
        }
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&req.req_id) {
                let _ = tx.send(Err(BridgeError::Unavailable(format!(
                    "mpv write error: {}",
                    e
                ))));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── Bridge implementation ─────────────────────────────────────────────────────

/// `Bridge` over a shared, long-lived mpv process.
pub struct MpvBridge {
    driver: MpvDriver,
    handle: Mutex<Option<MpvHandle>>,
}

impl MpvBridge {
    pub fn new(volume: f32) -> Self {
        Self {
            driver: MpvDriver::new(volume),
            handle: Mutex::new(None),
        }
    }

    /// Cached connection, established on first use.
    async fn handle(&self, spawn: bool) -> Result<Option<MpvHandle>, BridgeError> {
        let mut slot = self.handle.lock().await;
        if let Some(h) = slot.as_ref() {
            return Ok(Some(h.clone()));
        }
        let handle = self.driver.connect(spawn).await?;
        *slot = handle.clone();
        Ok(handle)
    }

    async fn running(&self) -> Result<MpvHandle, BridgeError> {
        self.handle(false)
            .await?
            .ok_or_else(|| BridgeError::Unavailable("mpv is not running".to_string()))
    }
}

impl Bridge for MpvBridge {
    async fn start_stream(&self, url: &str, label: &str) -> Result<String, BridgeError> {
        let mpv = self
            .handle(true)
            .await?
            .ok_or_else(|| BridgeError::Unavailable("mpv could not be started".to_string()))?;

        let before: Vec<u64> = mpv
            .playlist()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|e| e.id)
            .collect();

        // `replace` drops whatever was loaded before.
        let resp = mpv.send(json!(["loadfile", url, "replace"])).await?;
        let id = match resp["data"]["playlist_entry_id"].as_u64() {
            Some(id) => Some(id),
            None => mpv
                .playlist()
                .await?
                .into_iter()
                .find(|e| e.filename == url && e.id.map_or(false, |id| !before.contains(&id)))
                .and_then(|e| e.id),
        };
        let id = id.ok_or_else(|| {
            BridgeError::CommandFailed("stream did not appear in the playlist".to_string())
        })?;

        if let Err(e) = mpv
            .send(json!(["set_property", "force-media-title", label]))
            .await
        {
            warn!("mpv: could not set stream title: {}", e);
        }
        mpv.set_pause(false).await?;
        info!("mpv: streaming {} as entry {}", url, id);
        Ok(id.to_string())
    }

    async fn play(&self, stream_id: &str) -> Result<(), BridgeError> {
        let mpv = self.running().await?;
        let (idx, entry) = mpv.find_entry(stream_id).await?;
        if !entry.current {
            mpv.send(json!(["playlist-play-index", idx])).await?;
        }
        mpv.set_pause(false).await
    }

    async fn pause(&self) -> Result<(), BridgeError> {
        self.running().await?.set_pause(true).await
    }

    async fn remove(&self, stream_id: &str) -> Result<(), BridgeError> {
        let Some(mpv) = self.handle(false).await? else {
            return Err(BridgeError::NotFound(stream_id.to_string()));
        };
        let (idx, _) = mpv.find_entry(stream_id).await?;
        mpv.send(json!(["playlist-remove", idx])).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<(), BridgeError> {
        let Some(mpv) = self.handle(false).await? else {
            return Ok(());
        };
        mpv.send(json!(["stop"])).await?;
        Ok(())
    }

    async fn probe(&self, stream_id: &str) -> Result<TrackStatus, BridgeError> {
        let Some(mpv) = self.handle(false).await? else {
            return Ok(TrackStatus::Missing);
        };
        let entry = match mpv.find_entry(stream_id).await {
            Ok((_, entry)) => entry,
            Err(BridgeError::NotFound(_)) => return Ok(TrackStatus::Missing),
            Err(e) => return Err(e),
        };
        if !entry.current || mpv.get_bool("idle-active").await? {
            return Ok(TrackStatus::Missing);
        }
        if mpv.get_bool("pause").await? {
            Ok(TrackStatus::Paused)
        } else {
            Ok(TrackStatus::Playing)
        }
    }
}
