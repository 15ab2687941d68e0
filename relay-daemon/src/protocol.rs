use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use relay_core::{Command, FetchOutcome, Params, RelayResult, BACKGROUND_FETCH_METHOD};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

/// JSON newline-delimited request from a trigger source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

impl TriggerRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            params: Params::new(),
        }
    }

    pub fn for_command(command: &Command) -> Self {
        Self {
            cmd: command.name().as_str().to_string(),
            params: command.params().clone(),
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(home: &Path, request: &TriggerRequest) -> Result<TriggerResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: TriggerResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// Ask the daemon to dispatch `command` and wait for its terminal result.
pub fn request_dispatch(home: &Path, command: &Command) -> Result<RelayResult, DaemonError> {
    let response = send_request(home, &TriggerRequest::for_command(command))?;
    let data = response_into_data(response)?;
    Ok(serde_json::from_value(data)?)
}

pub fn request_background_fetch(home: &Path) -> Result<FetchOutcome, DaemonError> {
    let response = send_request(home, &TriggerRequest::new(BACKGROUND_FETCH_METHOD))?;
    let data = response_into_data(response)?;
    let outcome = data.get("outcome").cloned().ok_or_else(|| {
        DaemonError::Protocol("background fetch response missing 'outcome'".to_string())
    })?;
    Ok(serde_json::from_value(outcome)?)
}

/// Daemon status, retrying briefly while the socket comes up.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let request = TriggerRequest::new("status");

    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(home, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    let response = send_request(home, &TriggerRequest::new("stop"))?;
    response_into_data(response).map(|_| ())
}

fn response_into_data(response: TriggerResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn request_for_command_carries_params() {
        let command = Command::sync_config("Photos").expect("valid");
        let encoded = serde_json::to_value(TriggerRequest::for_command(&command)).expect("encode");
        assert_eq!(
            encoded,
            json!({"cmd": "syncconfig", "params": {"configName": "Photos"}})
        );
    }

    #[test]
    fn request_without_params_omits_them() {
        let encoded = serde_json::to_string(&TriggerRequest::new("status")).expect("encode");
        assert_eq!(encoded, r#"{"cmd":"status"}"#);
        let decoded: TriggerRequest = serde_json::from_str(&encoded).expect("decode");
        assert!(decoded.params.is_empty());
    }

    #[test]
    fn missing_socket_reports_daemon_not_running() {
        let home = TempDir::new().expect("home");
        let err = request_stop(home.path()).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }), "got: {err}");
    }

    #[test]
    fn error_response_becomes_protocol_error() {
        let err = response_into_data(TriggerResponse::error("unknown command 'x'")).unwrap_err();
        assert_eq!(err.to_string(), "daemon protocol error: unknown command 'x'");
    }
}
