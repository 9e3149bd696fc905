//! Routes a fetched batch to the handlers held in a [`CallbackRegistry`].
//!
//! Resolution order for each message:
//! * `transaction` messages go to the transaction slot when one is set
//! * a named entry with a handler runs that handler
//! * no entry at all falls back to the wildcard handler
//! * anything else aborts the batch with an error
//!
//! The batch is processed in order and the first failure stops it.

use tracing::{debug, trace, warn};

use crate::{
    callback::{always, Callback, Handler, Hook},
    error::PluginError,
    message::Message,
    registry::CallbackRegistry,
};

pub struct Dispatcher {
    pre_dispatch: Hook,
    post_dispatch: Hook,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(always(), always())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Dispatcher")
    }
}

impl Dispatcher {
    pub fn new(pre_dispatch: Hook, post_dispatch: Hook) -> Self {
        Self { pre_dispatch, post_dispatch }
    }

    /// Runs the hooks and every message of `batch`.
    ///
    /// `Ok(false)` means a hook asked to stop; errors mean a message could not
    /// be resolved or its handler failed.
    pub fn dispatch(&mut self, registry: &CallbackRegistry, batch: &[Message]) -> Result<bool, PluginError> {
        if !(self.pre_dispatch)() {
            debug!(batch = batch.len(), "pre_dispatch declined the batch");
            return Ok(false);
        }

        for message in batch {
            let handler = resolve(registry, message)?;
            trace!(message_id = %message.message_id, event = %message.event_name, "invoking handler");
            handler(message).map_err(|source| PluginError::Handler {
                event: message.event_name.clone(),
                source,
            })?;
        }

        if !(self.post_dispatch)() {
            debug!(batch = batch.len(), "post_dispatch reported failure");
            return Ok(false);
        }
        Ok(true)
    }
}

fn resolve<'a>(registry: &'a CallbackRegistry, message: &Message) -> Result<&'a Handler, PluginError> {
    let event = &message.event_name;

    if message.is_transaction() {
        if let Some(handler) = registry.transaction() {
            return Ok(handler);
        }
    }

    match registry.get(event) {
        Some(Callback::Handler(handler)) => Ok(handler),
        Some(Callback::Unresolved) => {
            warn!(event = %event, "subscription has no handler bound");
            Err(PluginError::PollError { event: event.clone() })
        }
        Some(Callback::Invalid(value)) => Err(PluginError::NotCallable {
            event: event.clone(),
            value: value.clone(),
        }),
        None => match registry.wildcard() {
            Callback::Handler(handler) => {
                debug!(event = %event, "falling back to wildcard handler");
                Ok(handler)
            }
            _ => {
                warn!(event = %event, "no handler and no wildcard for event");
                Err(PluginError::PollError { event: event.clone() })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use serde_json::{json, Map};

    use super::*;

    fn test_batch() -> Vec<Message> {
        let mut payload = Map::new();
        payload.insert("thing".into(), json!("test message"));
        vec![Message::new("1234", "4567", "test_event", payload)]
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = counter.clone();
        Callback::handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn hook(value: bool) -> Hook {
        Box::new(move || value)
    }

    #[test]
    fn pre_dispatch_false_skips_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();
        registry.insert("test_event", counting(&calls));

        let mut dispatcher = Dispatcher::new(hook(false), hook(true));
        assert!(!dispatcher.dispatch(&registry, &test_batch()).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn post_dispatch_false_runs_handler_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();
        registry.insert("test_event", counting(&calls));

        let mut dispatcher = Dispatcher::new(hook(true), hook(false));
        assert!(!dispatcher.dispatch(&registry, &test_batch()).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_entry_without_wildcard_is_poll_error() {
        let registry = CallbackRegistry::new();
        let mut dispatcher = Dispatcher::default();
        let err = dispatcher.dispatch(&registry, &test_batch()).unwrap_err();
        assert!(matches!(err, PluginError::PollError { ref event } if event == "test_event"));
    }

    #[test]
    fn missing_entry_with_placeholder_wildcard_is_poll_error() {
        let mut registry = CallbackRegistry::new();
        registry.set_wildcard(Callback::invalid(4));
        let mut dispatcher = Dispatcher::default();
        let err = dispatcher.dispatch(&registry, &test_batch()).unwrap_err();
        assert!(matches!(err, PluginError::PollError { .. }));
    }

    #[test]
    fn missing_entry_uses_wildcard() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();
        registry.set_wildcard(counting(&calls));

        let mut dispatcher = Dispatcher::default();
        assert!(dispatcher.dispatch(&registry, &test_batch()).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unresolved_entry_is_poll_error_even_with_wildcard() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();
        registry.insert("test_event", Callback::Unresolved);
        registry.set_wildcard(counting(&calls));

        let mut dispatcher = Dispatcher::default();
        let err = dispatcher.dispatch(&registry, &test_batch()).unwrap_err();
        assert!(matches!(err, PluginError::PollError { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn placeholder_entry_is_not_callable() {
        let mut registry = CallbackRegistry::new();
        registry.insert("test_event", Callback::invalid(4));

        let mut dispatcher = Dispatcher::default();
        let err = dispatcher.dispatch(&registry, &test_batch()).unwrap_err();
        match err {
            PluginError::NotCallable { event, value } => {
                assert_eq!(event, "test_event");
                assert_eq!(value, json!(4));
            }
            other => panic!("expected NotCallable, got {other:?}"),
        }
    }

    #[test]
    fn valid_handler_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();
        registry.insert("test_event", counting(&calls));

        let mut dispatcher = Dispatcher::default();
        assert!(dispatcher.dispatch(&registry, &test_batch()).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn first_failure_stops_the_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();
        registry.insert("ok", counting(&calls));

        let batch = vec![
            Message::new("1", "s", "ok", Map::new()),
            Message::new("2", "s", "unknown", Map::new()),
            Message::new("3", "s", "ok", Map::new()),
        ];
        let mut dispatcher = Dispatcher::default();
        assert!(dispatcher.dispatch(&registry, &batch).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_errors_propagate() {
        let mut registry = CallbackRegistry::new();
        registry.insert("test_event", Callback::handler(|_| Err(anyhow::anyhow!("boom"))));

        let mut dispatcher = Dispatcher::default();
        let err = dispatcher.dispatch(&registry, &test_batch()).unwrap_err();
        assert!(matches!(err, PluginError::Handler { ref event, .. } if event == "test_event"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn transaction_messages_use_their_own_slot() {
        let tx_calls = Arc::new(AtomicUsize::new(0));
        let wildcard_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();
        registry.set_transaction(counting(&tx_calls)).unwrap();
        registry.set_wildcard(counting(&wildcard_calls));

        let batch = vec![Message::new("9", "s", "transaction", Map::new())];
        let mut dispatcher = Dispatcher::default();
        assert!(dispatcher.dispatch(&registry, &batch).unwrap());
        assert_eq!(tx_calls.load(Ordering::SeqCst), 1);
        assert_eq!(wildcard_calls.load(Ordering::SeqCst), 0);

        // with the slot cleared the message resolves like any other name
        registry.clear_transaction();
        assert!(dispatcher.dispatch(&registry, &batch).unwrap());
        assert_eq!(wildcard_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_batch_only_runs_hooks() {
        let registry = CallbackRegistry::new();
        let mut dispatcher = Dispatcher::default();
        assert!(dispatcher.dispatch(&registry, &[]).unwrap());
    }
}
