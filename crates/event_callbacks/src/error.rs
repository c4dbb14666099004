//! Error types for the host bus and the callback registry.

/// Errors raised by the host event bus.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Listeners and lifecycle hooks can only be attached for enabled plugins
    #[error("Plugin not enabled: {0}")]
    PluginNotEnabled(String),
    /// The fired event is not the type the executor was attached for
    #[error("Event type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// An executor panicked or reported failure while handling an event
    #[error("Executor failed: {0}")]
    ExecutorFailed(String),
}

/// Errors raised by [`EventCallbacks`](crate::EventCallbacks) and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The owning plugin name is empty
    #[error("Invalid plugin name: owner name must not be empty")]
    InvalidPluginName,
    /// The host bus refused an attachment
    #[error("Host event bus error: {0}")]
    Host(#[from] EventError),
    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    /// Configuration could not be rendered back to TOML
    #[error("Configuration write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
