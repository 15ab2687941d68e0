//! Single-flight command relay.
//!
//! At most one command is in flight at any time. A dispatch that finds the
//! relay busy is rejected on the spot; it is never queued. The busy flag is
//! owned by a guard, so every exit path (reply, downstream error, deadline,
//! caller cancellation) releases it exactly once.
//!
//! The downstream call runs on its own task. When the deadline fires the task
//! is abandoned rather than aborted; whatever it eventually returns is logged
//! and dropped without touching relay state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use relay_core::{Command, CommandName, FetchOutcome, RelayConfig, RelayError, RelayResult};

use crate::channel::{HandlerError, MethodCall, MethodHandler};

/// The command currently holding the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCommand {
    pub id: u64,
    pub command: CommandName,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RelayState {
    busy: bool,
    pending: Option<PendingCommand>,
}

pub struct Relay {
    channel: String,
    timeout: Duration,
    handler: RwLock<Option<Arc<dyn MethodHandler>>>,
    state: Mutex<RelayState>,
    next_id: AtomicU64,
}

/// Releases the busy flag on drop.
struct BusyGuard<'a> {
    state: &'a Mutex<RelayState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.busy = false;
        state.pending = None;
    }
}

impl Relay {
    /// A relay with no downstream handler attached yet.
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            channel: config.channel.clone(),
            timeout: config.dispatch_timeout(),
            handler: RwLock::new(None),
            state: Mutex::new(RelayState::default()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn with_handler(config: &RelayConfig, handler: Arc<dyn MethodHandler>) -> Self {
        let relay = Self::new(config);
        relay.attach(handler);
        relay
    }

    /// Install the downstream handler, replacing any previous one.
    pub fn attach(&self, handler: Arc<dyn MethodHandler>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Remove the downstream handler; later dispatches fail as unavailable.
    pub fn detach(&self) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().busy
    }

    pub fn pending(&self) -> Option<PendingCommand> {
        self.lock_state().pending.clone()
    }

    /// Forward `command` if the relay is idle.
    ///
    /// `getstatus` is answered by [`Relay::current_status`] and never contends
    /// for the busy flag.
    pub async fn dispatch(&self, command: Command) -> RelayResult {
        if command.name() == CommandName::GetStatus {
            return self.current_status().await;
        }
        match self.single_flight(&command).await {
            Ok(reply) => RelayResult::Accepted(command.reply_message(reply.as_ref())),
            Err(err) => RelayResult::from(err),
        }
    }

    /// Status probe. Always forwarded, busy or not.
    pub async fn current_status(&self) -> RelayResult {
        let command = Command::get_status();
        match self.forward(&command).await {
            Ok(reply) => RelayResult::Accepted(command.reply_message(reply.as_ref())),
            Err(err) => RelayResult::from(err),
        }
    }

    /// Background-refresh path: always resolves to a [`FetchOutcome`] before
    /// the configured deadline.
    pub async fn background_fetch(&self) -> FetchOutcome {
        let outcome = match self.single_flight(&Command::background_fetch()).await {
            Ok(reply) => FetchOutcome::from_reply(reply.as_ref()),
            // A silent handler is still reported as new data.
            Err(RelayError::Timeout { .. }) => FetchOutcome::NewData,
            Err(RelayError::HandlerUnavailable) => FetchOutcome::Failed,
            Err(RelayError::AlreadyBusy) | Err(RelayError::Downstream(_)) => FetchOutcome::NoData,
        };
        tracing::info!(outcome = %outcome, "background fetch resolved");
        outcome
    }

    async fn single_flight(&self, command: &Command) -> Result<Option<Value>, RelayError> {
        let _guard = self.acquire(command)?;
        self.forward(command).await
    }

    fn acquire(&self, command: &Command) -> Result<BusyGuard<'_>, RelayError> {
        let mut state = self.lock_state();
        if state.busy {
            tracing::info!(
                command = %command.name(),
                in_flight = ?state.pending.as_ref().map(|pending| pending.command),
                "rejecting dispatch, relay busy",
            );
            return Err(RelayError::AlreadyBusy);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        state.busy = true;
        state.pending = Some(PendingCommand {
            id,
            command: command.name(),
            started_at: Utc::now(),
        });
        Ok(BusyGuard { state: &self.state })
    }

    async fn forward(&self, command: &Command) -> Result<Option<Value>, RelayError> {
        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(RelayError::HandlerUnavailable)?;

        let call = MethodCall {
            channel: self.channel.clone(),
            method: command.method().to_string(),
            arguments: command.arguments(),
        };
        let label = command.to_string();
        tracing::info!(command = %label, method = %call.method, "forwarding to handler");

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let label = label.clone();
            tokio::spawn(async move {
                let reply = handler.invoke(call).await;
                if reply_tx.send(reply).is_err() {
                    tracing::warn!(command = %label, "discarding handler reply, caller stopped waiting");
                }
            });
        }

        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(Ok(reply))) => Ok(reply),
            Ok(Ok(Err(err))) => {
                tracing::error!(command = %label, error = %err, "handler call failed");
                Err(match err {
                    HandlerError::Unavailable(_) => RelayError::HandlerUnavailable,
                    other => RelayError::Downstream(other.to_string()),
                })
            }
            Ok(Err(_)) => Err(RelayError::Downstream(
                "handler task ended without replying".to_string(),
            )),
            Err(_) => {
                tracing::warn!(
                    command = %label,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "handler did not reply before deadline",
                );
                Err(RelayError::Timeout {
                    after: self.timeout,
                })
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
