//! Downstream method channel toward the managed application.
//!
//! The relay talks to the managed application through [`MethodHandler`].
//! [`SocketChannel`] is the production implementation: one newline-delimited
//! JSON call per connection on the application's Unix socket.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Error code the managed application uses for methods it does not handle.
pub const NOT_IMPLEMENTED_CODE: &str = "not_implemented";

/// One remote-procedure-style call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub channel: String,
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Error payload carried by a failed [`MethodReply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The managed application's answer to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl MethodReply {
    pub fn success(result: Option<Value>) -> Self {
        Self {
            ok: true,
            result,
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(RemoteError {
                code: code.into(),
                message: Some(message.into()),
            }),
        }
    }

    pub fn into_result(self) -> Result<Option<Value>, HandlerError> {
        if self.ok {
            return Ok(self.result);
        }
        let error = self.error.unwrap_or(RemoteError {
            code: "unknown".to_string(),
            message: None,
        });
        if error.code == NOT_IMPLEMENTED_CODE {
            return Err(HandlerError::NotImplemented(
                error.message.unwrap_or_default(),
            ));
        }
        Err(HandlerError::Remote {
            code: error.code,
            message: error.message.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The managed application is not listening (not yet initialized).
    #[error("handler unavailable: {0}")]
    Unavailable(String),

    #[error("handler error {code}: {message}")]
    Remote { code: String, message: String },

    #[error("method not implemented by handler: {0}")]
    NotImplemented(String),

    /// The connection broke or carried something that is not a reply.
    #[error("handler transport error: {0}")]
    Transport(String),
}

/// Downstream handler seam. `Ok(None)` is a reply without a value.
#[async_trait]
pub trait MethodHandler: Send + Sync + 'static {
    async fn invoke(&self, call: MethodCall) -> Result<Option<Value>, HandlerError>;
}

/// Method channel over the managed application's Unix socket.
#[derive(Debug, Clone)]
pub struct SocketChannel {
    socket: PathBuf,
}

impl SocketChannel {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }
}

#[async_trait]
impl MethodHandler for SocketChannel {
    async fn invoke(&self, call: MethodCall) -> Result<Option<Value>, HandlerError> {
        let stream = UnixStream::connect(&self.socket).await.map_err(|err| {
            if matches!(
                err.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
            ) {
                HandlerError::Unavailable(format!("{}: {err}", self.socket.display()))
            } else {
                HandlerError::Transport(err.to_string())
            }
        })?;

        let (reader, mut writer) = stream.into_split();
        let payload =
            serde_json::to_string(&call).map_err(|e| HandlerError::Transport(e.to_string()))?;
        writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| HandlerError::Transport(e.to_string()))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| HandlerError::Transport(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| HandlerError::Transport(e.to_string()))?;

        let mut line = String::new();
        let read = BufReader::new(reader)
            .read_line(&mut line)
            .await
            .map_err(|e| HandlerError::Transport(e.to_string()))?;
        if read == 0 {
            return Err(HandlerError::Transport(
                "handler closed connection before replying".to_string(),
            ));
        }

        let reply: MethodReply = serde_json::from_str(line.trim_end())
            .map_err(|e| HandlerError::Transport(format!("invalid reply JSON: {e}")))?;
        tracing::debug!(method = %call.method, ok = reply.ok, "handler replied");
        reply.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    fn call(method: &str) -> MethodCall {
        MethodCall {
            channel: "com.webdav-sync/shortcuts".to_string(),
            method: method.to_string(),
            arguments: json!({"command": "syncall", "params": {}}),
        }
    }

    async fn serve_once(listener: UnixListener, reply: &'static str) -> MethodCall {
        let (stream, _) = listener.accept().await.expect("accept");
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let line = lines.next_line().await.expect("read").expect("line");
        writer.write_all(reply.as_bytes()).await.expect("write");
        writer.write_all(b"\n").await.expect("newline");
        serde_json::from_str(&line).expect("decode call")
    }

    #[tokio::test]
    async fn missing_socket_is_unavailable() {
        let dir = TempDir::new().expect("dir");
        let channel = SocketChannel::new(dir.path().join("handler.sock"));
        let err = channel.invoke(call("handleShortcutCommand")).await.unwrap_err();
        assert!(matches!(err, HandlerError::Unavailable(_)), "got: {err}");
    }

    #[tokio::test]
    async fn successful_reply_returns_result_and_call_is_forwarded_verbatim() {
        let dir = TempDir::new().expect("dir");
        let path = dir.path().join("handler.sock");
        let listener = UnixListener::bind(&path).expect("bind");
        let server = tokio::spawn(serve_once(
            listener,
            r#"{"ok":true,"result":{"message":"queued"}}"#,
        ));

        let reply = SocketChannel::new(&path)
            .invoke(call("handleShortcutCommand"))
            .await
            .expect("reply");
        assert_eq!(reply, Some(json!({"message": "queued"})));

        let received = server.await.expect("server task");
        assert_eq!(received, call("handleShortcutCommand"));
    }

    #[tokio::test]
    async fn remote_errors_are_classified() {
        let dir = TempDir::new().expect("dir");
        let path = dir.path().join("handler.sock");

        let listener = UnixListener::bind(&path).expect("bind");
        let server = tokio::spawn(serve_once(
            listener,
            r#"{"ok":false,"error":{"code":"not_implemented","message":"handleBackgroundFetch"}}"#,
        ));
        let err = SocketChannel::new(&path)
            .invoke(call("handleBackgroundFetch"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            HandlerError::NotImplemented("handleBackgroundFetch".to_string())
        );
        server.await.expect("server task");
    }

    #[test]
    fn error_reply_without_payload_is_remote_unknown() {
        let reply = MethodReply {
            ok: false,
            result: None,
            error: None,
        };
        assert_eq!(
            reply.into_result(),
            Err(HandlerError::Remote {
                code: "unknown".to_string(),
                message: String::new(),
            })
        );
    }
}
