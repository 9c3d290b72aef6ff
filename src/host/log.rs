//! Diagnostic log capability.
//!
//! Components that report to the host receive a [`DiagnosticLog`] at
//! construction. Every message goes to `tracing`; when a transport is
//! attached it is also forwarded to the host as a `send_log` notification.

use std::sync::Arc;

use super::channel::HostTransport;
use super::contract::LogLevel;

#[derive(Clone, Default)]
pub struct DiagnosticLog {
    transport: Option<Arc<dyn HostTransport>>,
    component: &'static str,
}

impl std::fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("component", &self.component)
            .field("forwarding", &self.transport.is_some())
            .finish()
    }
}

impl DiagnosticLog {
    /// Log that only reaches `tracing`.
    pub fn local() -> Self {
        Self::default()
    }

    /// Log that also forwards to the host.
    pub fn forwarding(transport: Arc<dyn HostTransport>) -> Self {
        Self {
            transport: Some(transport),
            component: "",
        }
    }

    /// Same sink, tagged with a component name.
    #[must_use]
    pub fn scoped(&self, component: &'static str) -> Self {
        Self {
            transport: self.transport.clone(),
            component,
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let component = self.component;
        match level {
            LogLevel::Debug => tracing::debug!(component, "{message}"),
            LogLevel::Info => tracing::info!(component, "{message}"),
            LogLevel::Warning => tracing::warn!(component, "{message}"),
            LogLevel::Error => tracing::error!(component, "{message}"),
        }

        let Some(transport) = &self.transport else {
            return;
        };
        let forwarded = if component.is_empty() {
            transport.send_log(level, message)
        } else {
            transport.send_log(level, &format!("[{component}] {message}"))
        };
        if let Err(e) = forwarded {
            tracing::trace!(error = %e, "host log forwarding failed");
        }
    }
}
