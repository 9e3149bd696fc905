pub mod callback;
pub mod dispatcher;
pub mod error;
pub mod http_transport;
pub mod identity;
pub mod message;
pub mod plugin;
pub mod registry;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod plugin_test_util;

pub use callback::{Callback, Handler, Hook};
pub use error::{PluginError, TransportError};
pub use identity::Identity;
pub use message::Message;
pub use plugin::{Plugin, PluginBuilder};
pub use transport::Transport;
