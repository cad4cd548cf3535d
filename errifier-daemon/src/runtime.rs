use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use errifier_core::{
    tail_async, NotifyEventSource, WatchConfig, WatchRegistry, WatchState,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use crate::error::{io_err, DaemonError};
use crate::paths::{errifier_root, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::sink::daemon_sink;

/// Everything a socket client can reach.
pub struct DaemonState {
    pub registry: Arc<WatchRegistry>,
    pub config: WatchConfig,
    pub socket: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl DaemonState {
    pub fn new(registry: Arc<WatchRegistry>, config: WatchConfig, socket: PathBuf) -> Self {
        Self {
            registry,
            config,
            socket,
            started_at: Utc::now(),
        }
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime until ctrl-c or a `stop` request.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let config = WatchConfig::load_at(&home)?;
    ensure_runtime_dirs(&home)?;

    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;
    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    let registry = Arc::new(WatchRegistry::new(
        &config,
        Arc::new(NotifyEventSource::new()),
        daemon_sink(&config),
    ));
    tracing::info!(
        socket = %socket.display(),
        capacity = config.capacity,
        "errifier daemon started",
    );
    let state = Arc::new(DaemonState::new(registry.clone(), config, socket.clone()));

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(listener, state, shutdown.clone(), shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);

    registry.shutdown().await;
    remove_socket(&socket);
    tracing::info!("errifier daemon stopped");

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    listener: UnixListener,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err("daemon socket accept", e))?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = dispatch(&state, &request, &shutdown_tx).await;
        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

/// Execute one request against the registry.
async fn dispatch(
    state: &DaemonState,
    request: &DaemonRequest,
    shutdown_tx: &broadcast::Sender<()>,
) -> DaemonResponse {
    let registry = &state.registry;
    tracing::debug!(cmd = %request.cmd, "daemon request");

    match request.cmd.as_str() {
        "add" => {
            let (Some(path), Some(label)) = (&request.path, &request.label) else {
                return DaemonResponse::error("add requires 'path' and 'label'");
            };
            match registry.add_watch(path, label).await {
                Ok(id) => DaemonResponse::ok(json!({ "id": id })),
                Err(err) => DaemonResponse::error(err.to_string()),
            }
        }
        "toggle" => {
            let Some(id) = request.id else {
                return DaemonResponse::error("toggle requires 'id'");
            };
            match registry.toggle(id) {
                Ok(new_state) => DaemonResponse::ok(json!({ "id": id, "state": new_state })),
                Err(err) => DaemonResponse::error(err.to_string()),
            }
        }
        "list" => DaemonResponse::ok(json!({ "watches": registry.describe() })),
        "tail" => {
            let path = match (&request.id, &request.path) {
                (Some(id), _) => match registry.get(*id) {
                    Ok(snapshot) => snapshot.path,
                    Err(err) => return DaemonResponse::error(err.to_string()),
                },
                (None, Some(path)) => path.clone(),
                (None, None) => return DaemonResponse::error("tail requires 'path' or 'id'"),
            };
            let n = request.lines.unwrap_or(state.config.tail_lines);
            match tail_async(path.clone(), n).await {
                Ok(lines) => DaemonResponse::ok(json!({ "path": path, "lines": lines })),
                Err(err) => DaemonResponse::error(err.to_string()),
            }
        }
        "remove" => {
            let Some(id) = request.id else {
                return DaemonResponse::error("remove requires 'id'");
            };
            match registry.remove(id).await {
                Ok(snapshot) => DaemonResponse::ok(json!({ "removed": snapshot })),
                Err(err) => DaemonResponse::error(err.to_string()),
            }
        }
        "status" => DaemonResponse::ok(build_status_payload(state)),
        "stop" => {
            let _ = shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

fn build_status_payload(state: &DaemonState) -> serde_json::Value {
    let watches = state.registry.describe();
    let paused = watches
        .iter()
        .filter(|w| w.state == WatchState::Paused)
        .count();
    let detached = watches.iter().filter(|w| !w.attached).count();

    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at": state.started_at.to_rfc3339(),
        "capacity": state.registry.capacity(),
        "watches": watches.len(),
        "active": watches.len() - paused,
        "paused": paused,
        "detached": detached,
        "socket": state.socket.display().to_string(),
    })
}

/// Refuse to start next to a live daemon; clear a socket file left by a dead one.
fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::AlreadyRunning {
                socket: socket.to_path_buf(),
            });
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn remove_socket(socket: &Path) {
    match fs::remove_file(socket) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(socket = %socket.display(), error = %err, "failed to remove socket"),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = errifier_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
