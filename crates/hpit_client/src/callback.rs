use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::{error::PluginError, message::Message};

/// A function that handles one message.
///
/// Errors returned by a handler are not swallowed by the dispatcher, they
/// travel back to whoever is polling.
pub type Handler = Arc<dyn Fn(&Message) -> anyhow::Result<()> + Send + Sync>;

/// A zero argument predicate run around polling and dispatching.
/// Returning `false` stops the current pass.
pub type Hook = Box<dyn FnMut() -> bool + Send + Sync>;

pub fn always() -> Hook {
    Box::new(|| true)
}

/// What the registry holds for an event name.
///
/// `Unresolved` marks a name we know about (subscribed locally or reported by
/// the hub) that has nothing bound to it yet. `Invalid` keeps a raw placeholder
/// value that is not a handler; the mismatch only surfaces when a message for
/// that event is dispatched.
#[derive(Clone, Default)]
pub enum Callback {
    #[default]
    Unresolved,
    Handler(Handler),
    Invalid(Value),
}

impl Callback {
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Callback::Handler(Arc::new(f))
    }

    pub fn invalid(value: impl Into<Value>) -> Self {
        Callback::Invalid(value.into())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Callback::Handler(_))
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Callback::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// Rejects placeholder values at registration time.
    /// `Unresolved` is accepted, a name may be subscribed without a handler.
    pub(crate) fn check_registrable(&self, target: &str) -> Result<(), PluginError> {
        match self {
            Callback::Invalid(value) => Err(PluginError::BadCallback {
                target: target.to_string(),
                value: value.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Like [`check_registrable`](Self::check_registrable) but a handler is required.
    pub(crate) fn require_handler(&self, target: &str) -> Result<Handler, PluginError> {
        match self {
            Callback::Handler(h) => Ok(h.clone()),
            Callback::Unresolved => Err(PluginError::BadCallback {
                target: target.to_string(),
                value: Value::Null,
            }),
            Callback::Invalid(value) => Err(PluginError::BadCallback {
                target: target.to_string(),
                value: value.clone(),
            }),
        }
    }
}

impl From<Handler> for Callback {
    fn from(h: Handler) -> Self {
        Callback::Handler(h)
    }
}

impl From<Option<Handler>> for Callback {
    fn from(h: Option<Handler>) -> Self {
        h.map(Callback::Handler).unwrap_or(Callback::Unresolved)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Unresolved => f.write_str("Unresolved"),
            Callback::Handler(h) => write!(f, "Handler({:p})", Arc::as_ptr(h)),
            Callback::Invalid(v) => f.debug_tuple("Invalid").field(v).finish(),
        }
    }
}

// handlers compare by identity
impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callback::Unresolved, Callback::Unresolved) => true,
            (Callback::Handler(a), Callback::Handler(b)) => Arc::ptr_eq(a, b),
            (Callback::Invalid(a), Callback::Invalid(b)) => a == b,
            _ => false,
        }
    }
}
