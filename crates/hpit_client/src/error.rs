use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Failures reported by a [`Transport`](crate::transport::Transport).
///
/// The plugin never retries these; they are surfaced to whoever made the call.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The hub answered with a non-success status.
    #[error("hub returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The response body was not the JSON we expected.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any other transport specific failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Errors a [`Plugin`](crate::plugin::Plugin) can return.
#[derive(Error, Debug)]
pub enum PluginError {
    /// A supplied callback is not something that can be invoked.
    /// Raised at registration time, nothing is stored.
    #[error("bad callback for '{target}': {value} is not callable")]
    BadCallback { target: String, value: Value },

    /// A message arrived for an event that has no runnable handler
    /// and no wildcard to fall back to.
    #[error("no callback resolved for event '{event}'")]
    PollError { event: String },

    /// The registry held a placeholder value instead of a handler
    /// for this event. Discovered when the message is dispatched.
    #[error("callback for event '{event}' is not callable: {value}")]
    NotCallable { event: String, value: Value },

    /// The handler itself failed.
    #[error("handler for event '{event}' failed: {source}")]
    Handler {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    /// The initial subscribe during construction failed.
    #[error("could not connect to the hub: {0}")]
    Connection(#[source] TransportError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl PluginError {
    /// The event name the error is about, if any.
    pub fn event(&self) -> Option<&str> {
        match self {
            PluginError::PollError { event }
            | PluginError::NotCallable { event, .. }
            | PluginError::Handler { event, .. } => Some(event),
            PluginError::BadCallback { target, .. } => Some(target),
            PluginError::Connection(_) | PluginError::Transport(_) => None,
        }
    }
}
