//! Local table of event name → callback, plus the wildcard and transaction slots.
//!
//! Nothing in here talks to the hub. [`Plugin`](crate::plugin::Plugin) pairs every
//! remote subscribe/unsubscribe with the matching registry call.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use tracing::debug;

use crate::{
    callback::{Callback, Handler},
    error::PluginError,
    message::TRANSACTION_MESSAGE_NAME,
};

#[derive(Default, Clone)]
pub struct CallbackRegistry {
    callbacks: BTreeMap<String, Callback>,
    wildcard: Callback,
    transaction: Option<Handler>,
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.callbacks)
            .field("wildcard", &self.wildcard)
            .field("transaction", &self.transaction.is_some())
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores any callback value, placeholders included. No validation.
    pub fn insert(&mut self, name: impl Into<String>, callback: Callback) -> Option<Callback> {
        self.callbacks.insert(name.into(), callback)
    }

    pub fn get(&self, name: &str) -> Option<&Callback> {
        self.callbacks.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Callback> {
        self.callbacks.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.callbacks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// A copy of the current mapping.
    pub fn snapshot(&self) -> BTreeMap<String, Callback> {
        self.callbacks.clone()
    }

    /// Validates every pair before touching the table, then inserts them all.
    ///
    /// Returns the names that should be pushed to the hub. A single bad value
    /// rejects the whole batch and leaves the table as it was.
    pub fn register<I, S>(&mut self, entries: I) -> Result<BTreeSet<String>, PluginError>
    where
        I: IntoIterator<Item = (S, Callback)>,
        S: Into<String>,
    {
        let entries: Vec<(String, Callback)> =
            entries.into_iter().map(|(name, cb)| (name.into(), cb)).collect();

        for (name, callback) in &entries {
            callback.check_registrable(name)?;
        }

        let mut names = BTreeSet::new();
        for (name, callback) in entries {
            debug!(event = %name, resolved = callback.is_resolved(), "registering callback");
            names.insert(name.clone());
            self.callbacks.insert(name, callback);
        }
        Ok(names)
    }

    /// Removes whatever is present and reports which names were actually there.
    pub fn unregister<I, S>(&mut self, names: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.callbacks.remove(name).map(|_| name.to_string())
            })
            .collect()
    }

    /// Adds hub-known names we have no entry for as unresolved.
    /// Existing entries are left untouched. Returns how many names were added.
    pub fn merge_server_names<I>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for name in names {
            if !self.callbacks.contains_key(&name) {
                debug!(event = %name, "hub reports subscription with no local handler");
                self.callbacks.insert(name, Callback::Unresolved);
                added += 1;
            }
        }
        added
    }

    // ── wildcard ──────────────────────────────────────────────────

    pub fn set_wildcard(&mut self, callback: Callback) {
        self.wildcard = callback;
    }

    pub fn clear_wildcard(&mut self) {
        self.wildcard = Callback::Unresolved;
    }

    pub fn wildcard(&self) -> &Callback {
        &self.wildcard
    }

    // ── transaction ───────────────────────────────────────────────

    /// Fails with `BadCallback` unless `callback` is a handler; the slot is
    /// untouched on failure.
    pub fn set_transaction(&mut self, callback: Callback) -> Result<(), PluginError> {
        let handler = callback.require_handler(TRANSACTION_MESSAGE_NAME)?;
        self.transaction = Some(handler);
        Ok(())
    }

    pub fn clear_transaction(&mut self) {
        self.transaction = None;
    }

    pub fn transaction(&self) -> Option<&Handler> {
        self.transaction.as_ref()
    }
}
