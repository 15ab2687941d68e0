//! Relay daemon: single-flight command relay, downstream method channel,
//! trigger socket server.

pub mod channel;
mod error;
pub mod paths;
pub mod protocol;
pub mod relay;
mod runtime;

pub use channel::{HandlerError, MethodCall, MethodHandler, MethodReply, SocketChannel};
pub use error::DaemonError;
pub use protocol::{
    request_background_fetch, request_dispatch, request_status, request_stop, send_request,
    TriggerRequest, TriggerResponse,
};
pub use relay::{PendingCommand, Relay};
pub use runtime::{run, start_blocking, DispatchRecord};
