//! Host integration over line-delimited JSON envelopes.

pub mod channel;
pub mod contract;
pub mod log;
pub mod stdio;

pub use channel::{ChannelTransport, HostTransport, host_channel, validate_link};
pub use contract::{
    DisplayMode, EVENT_VERSION, HostContext, HostEnvelope, InboundKind, LogLevel,
    OutboundEnvelope, OutboundKind, UserAction, checkpoint_id_of,
};
pub use log::DiagnosticLog;
