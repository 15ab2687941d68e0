use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};

use relay_core::config::{self, relay_root};
use relay_core::{Command, RelayConfig, RelayResult, BACKGROUND_FETCH_METHOD};

use crate::channel::SocketChannel;
use crate::error::{io_err, DaemonError};
use crate::paths::{handler_socket_path, socket_path};
use crate::protocol::{TriggerRequest, TriggerResponse};
use crate::relay::Relay;

/// Outcome of the most recent dispatch, reported by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub command: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// State shared by every socket client task.
struct ServerContext {
    home: PathBuf,
    relay: Arc<Relay>,
    config: RelayConfig,
    started_at_unix: u64,
    last_dispatch: RwLock<Option<DispatchRecord>>,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    let config = config::load_at(home)?;
    init_tracing(&config.log_level);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let config = config::load_at(&home)?;
    config.validate()?;
    ensure_runtime_dirs(&home)?;

    let handler = Arc::new(SocketChannel::new(handler_socket_path(&home)));
    let relay = Arc::new(Relay::with_handler(&config, handler));
    tracing::info!(
        channel = %config.channel,
        dispatch_timeout_ms = config.dispatch_timeout_ms,
        background_ceiling_ms = config.background_ceiling_ms,
        "relay daemon starting",
    );

    let context = Arc::new(ServerContext {
        home,
        relay,
        config,
        started_at_unix: unix_seconds_now(),
        last_dispatch: RwLock::new(None),
    });

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let context = context.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(context, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
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

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("relay daemon stopped");
    Ok(())
}

async fn socket_server_task(
    context: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&context.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening for triggers");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let context = context.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, context, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    context: Arc<ServerContext>,
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

        let request: TriggerRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &TriggerResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let stop = request.cmd == "stop";
        let response = handle_request(&context, request, &shutdown_tx).await;
        write_response(&mut writer, &response).await?;
        if stop {
            break;
        }
    }

    Ok(())
}

async fn handle_request(
    context: &ServerContext,
    request: TriggerRequest,
    shutdown_tx: &broadcast::Sender<()>,
) -> TriggerResponse {
    match request.cmd.as_str() {
        "status" => TriggerResponse::ok(build_status_payload(context).await),
        "stop" => {
            let _ = shutdown_tx.send(());
            TriggerResponse::ok(json!({ "stopping": true }))
        }
        BACKGROUND_FETCH_METHOD => {
            let outcome = context.relay.background_fetch().await;
            record_dispatch(context, BACKGROUND_FETCH_METHOD, outcome.as_str(), None).await;
            TriggerResponse::ok(json!({ "outcome": outcome }))
        }
        name => match Command::parse(name, request.params) {
            Ok(command) => {
                let label = command.to_string();
                let result = context.relay.dispatch(command).await;
                log_result(&label, &result);
                record_dispatch(
                    context,
                    &label,
                    result.label(),
                    result.detail().map(str::to_string),
                )
                .await;
                TriggerResponse::ok(json!(result))
            }
            Err(err) => TriggerResponse::error(err.to_string()),
        },
    }
}

fn log_result(command: &str, result: &RelayResult) {
    match result {
        RelayResult::Accepted(message) => {
            tracing::info!(command, message = %message, "dispatch accepted")
        }
        RelayResult::Rejected(reason) => {
            tracing::info!(command, reason = %reason, "dispatch rejected")
        }
        RelayResult::TimedOut => tracing::warn!(command, "dispatch timed out"),
        RelayResult::Failed(error) => tracing::error!(command, error = %error, "dispatch failed"),
    }
}

async fn record_dispatch(
    context: &ServerContext,
    command: &str,
    outcome: &str,
    detail: Option<String>,
) {
    let record = DispatchRecord {
        command: command.to_string(),
        outcome: outcome.to_string(),
        detail,
        finished_at: Utc::now(),
    };
    *context.last_dispatch.write().await = Some(record);
}

async fn build_status_payload(context: &ServerContext) -> Value {
    let last_dispatch = context.last_dispatch.read().await.clone();
    let handler_socket = handler_socket_path(&context.home);

    json!({
        "running": true,
        "label": crate::paths::DAEMON_LABEL,
        "started_at_unix": context.started_at_unix,
        "busy": context.relay.is_busy(),
        "pending": context.relay.pending(),
        "channel": context.config.channel,
        "dispatch_timeout_ms": context.config.dispatch_timeout_ms,
        "background_ceiling_ms": context.config.background_ceiling_ms,
        "socket": socket_path(&context.home).display().to_string(),
        "handler_socket": handler_socket.display().to_string(),
        "handler_listening": handler_socket.exists(),
        "last_dispatch": last_dispatch,
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
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

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = relay_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &TriggerResponse,
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

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
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
