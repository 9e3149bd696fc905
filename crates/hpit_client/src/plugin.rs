//! The plugin facade: identity + transport + callback registry + dispatcher.
//!
//! Usage:
//! ```ignore
//! use hpit_client::{callback::Callback, http_transport::HttpTransport, identity::Identity, plugin::Plugin};
//!
//! let transport = HttpTransport::new("http://127.0.0.1:8000", Duration::from_secs(30))?;
//! let mut plugin = Plugin::builder(Identity::new("my-entity", "my-key"))
//!     .handler("echo", Callback::handler(|msg| { println!("{msg:?}"); Ok(()) }))
//!     .connect(transport)
//!     .await?;
//!
//! let batch = plugin.poll().await?;
//! plugin.dispatch(&batch)?;
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    callback::{always, Callback, Handler, Hook},
    dispatcher::Dispatcher,
    error::PluginError,
    identity::Identity,
    message::Message,
    registry::CallbackRegistry,
    transport::Transport,
};

/// Collects everything a [`Plugin`] is constructed with.
///
/// All hooks default to "always true".
pub struct PluginBuilder {
    identity: Identity,
    initial: Vec<(String, Callback)>,
    wildcard: Callback,
    pre_dispatch: Hook,
    post_dispatch: Hook,
    pre_poll: Hook,
    post_poll: Hook,
}

impl PluginBuilder {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            initial: vec![],
            wildcard: Callback::Unresolved,
            pre_dispatch: always(),
            post_dispatch: always(),
            pre_poll: always(),
            post_poll: always(),
        }
    }

    /// Names to subscribe to on the hub when connecting.
    /// They land in the local table as unresolved unless a handler is given for them.
    pub fn subscribe_to<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial
            .extend(names.into_iter().map(|name| (name.into(), Callback::Unresolved)));
        self
    }

    /// A named handler that is registered locally and subscribed on connect.
    pub fn handler(mut self, name: impl Into<String>, callback: Callback) -> Self {
        self.initial.push((name.into(), callback));
        self
    }

    pub fn wildcard(mut self, callback: Callback) -> Self {
        self.wildcard = callback;
        self
    }

    pub fn pre_dispatch(mut self, hook: impl FnMut() -> bool + Send + Sync + 'static) -> Self {
        self.pre_dispatch = Box::new(hook);
        self
    }

    pub fn post_dispatch(mut self, hook: impl FnMut() -> bool + Send + Sync + 'static) -> Self {
        self.post_dispatch = Box::new(hook);
        self
    }

    pub fn pre_poll(mut self, hook: impl FnMut() -> bool + Send + Sync + 'static) -> Self {
        self.pre_poll = Box::new(hook);
        self
    }

    pub fn post_poll(mut self, hook: impl FnMut() -> bool + Send + Sync + 'static) -> Self {
        self.post_poll = Box::new(hook);
        self
    }

    /// Builds the plugin and subscribes to the initial names.
    ///
    /// With no initial names nothing is sent and the plugin stays
    /// disconnected. Otherwise a failed subscribe fails construction.
    pub async fn connect<T: Transport>(self, transport: T) -> Result<Plugin<T>, PluginError> {
        let mut registry = CallbackRegistry::new();
        registry.set_wildcard(self.wildcard);

        let mut names = BTreeSet::new();
        let mut handlers = vec![];
        for (name, callback) in self.initial {
            callback.check_registrable(&name)?;
            names.insert(name.clone());
            if !matches!(callback, Callback::Unresolved) {
                handlers.push((name, callback));
            }
        }
        registry.register(handlers)?;
        // a handler given for the same name wins, whatever the builder order
        for name in &names {
            if !registry.contains(name) {
                registry.insert(name.clone(), Callback::Unresolved);
            }
        }

        let mut plugin = Plugin {
            identity: self.identity,
            transport,
            registry,
            dispatcher: Dispatcher::new(self.pre_dispatch, self.post_dispatch),
            pre_poll: self.pre_poll,
            post_poll: self.post_poll,
            connected: false,
        };

        if names.is_empty() {
            debug!(entity_id = %plugin.identity.entity_id(), "no initial subscriptions, not connecting");
            return Ok(plugin);
        }

        plugin
            .transport
            .subscribe(&plugin.identity, &names)
            .await
            .map_err(|e| {
                error!(entity_id = %plugin.identity.entity_id(), error = %e, "❌ initial subscribe failed");
                PluginError::Connection(e)
            })?;
        plugin.connected = true;
        info!(entity_id = %plugin.identity.entity_id(), subscriptions = names.len(), "✅ plugin connected");
        Ok(plugin)
    }
}

pub struct Plugin<T> {
    identity: Identity,
    transport: T,
    registry: CallbackRegistry,
    dispatcher: Dispatcher,
    pre_poll: Hook,
    post_poll: Hook,
    connected: bool,
}

impl<T> std::fmt::Debug for Plugin<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("identity", &self.identity)
            .field("registry", &self.registry)
            .field("connected", &self.connected)
            .finish()
    }
}

impl Plugin<()> {
    pub fn builder(identity: Identity) -> PluginBuilder {
        PluginBuilder::new(identity)
    }
}

impl<T: Transport> Plugin<T> {
    /// Shortcut for a plugin with default hooks and no handlers yet.
    pub async fn new<I, S>(identity: Identity, initial: I, transport: T) -> Result<Self, PluginError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PluginBuilder::new(identity).subscribe_to(initial).connect(transport).await
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn entity_id(&self) -> &str {
        self.identity.entity_id()
    }

    pub fn api_key(&self) -> &str {
        self.identity.api_key()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Direct access to the local table. Changes made here are not sent to the hub.
    pub fn registry_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.registry
    }

    // ── subscriptions ─────────────────────────────────────────────

    /// Registers every pair locally, then subscribes to all of them on the hub.
    ///
    /// A `BadCallback` rejects the whole call before anything is stored. A
    /// transport failure is returned, but the local entries stay in place.
    pub async fn subscribe<I, S>(&mut self, entries: I) -> Result<(), PluginError>
    where
        I: IntoIterator<Item = (S, Callback)>,
        S: Into<String>,
    {
        let names = self.registry.register(entries)?;
        if names.is_empty() {
            return Ok(());
        }
        info!(events = ?names, "subscribing");
        self.transport
            .subscribe(&self.identity, &names)
            .await
            .inspect_err(|e| warn!(error = %e, "subscribe failed, local table keeps the new entries"))?;
        Ok(())
    }

    /// Drops the names that are present; unknown names are ignored.
    /// Only names that existed locally are sent to the hub.
    pub async fn unsubscribe<I, S>(&mut self, names: I) -> Result<(), PluginError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = self.registry.unregister(names);
        if removed.is_empty() {
            debug!("nothing to unsubscribe");
            return Ok(());
        }
        info!(events = ?removed, "unsubscribing");
        self.transport.unsubscribe(&self.identity, &removed).await?;
        Ok(())
    }

    /// Merges the hub's subscription list into the local table and returns it.
    /// Names only the hub knows about come back unresolved.
    pub async fn list_subscriptions(&mut self) -> Result<BTreeMap<String, Callback>, PluginError> {
        let server_names = self.transport.list_subscriptions(&self.identity).await?;
        let added = self.registry.merge_server_names(server_names);
        debug!(added, total = self.registry.len(), "reconciled subscriptions with hub");
        Ok(self.registry.snapshot())
    }

    // ── singleton slots ───────────────────────────────────────────

    pub fn register_transaction_callback(&mut self, callback: Callback) -> Result<(), PluginError> {
        self.registry.set_transaction(callback)
    }

    pub fn clear_transaction_callback(&mut self) {
        self.registry.clear_transaction();
    }

    pub fn transaction_callback(&self) -> Option<&Handler> {
        self.registry.transaction()
    }

    pub fn set_wildcard_callback(&mut self, callback: Callback) {
        self.registry.set_wildcard(callback);
    }

    // ── polling ───────────────────────────────────────────────────

    /// Fetches whatever is pending. An empty batch is `Ok(vec![])`.
    pub async fn poll(&self) -> Result<Vec<Message>, PluginError> {
        let batch = self.transport.fetch_pending_messages(&self.identity).await?;
        debug!(batch = batch.len(), "polled hub");
        Ok(batch)
    }

    pub fn dispatch(&mut self, batch: &[Message]) -> Result<bool, PluginError> {
        self.dispatcher.dispatch(&self.registry, batch)
    }

    pub async fn send_response(&self, message_id: &str, payload: &Value) -> Result<(), PluginError> {
        self.transport
            .send_response(&self.identity, message_id, payload)
            .await?;
        debug!(%message_id, "response sent");
        Ok(())
    }

    /// Polls and dispatches every `poll_wait` until told to stop.
    ///
    /// The loop ends cleanly when `stop` fires (or its sender goes away), when a
    /// poll hook returns false or when dispatch returns false. Poll and dispatch
    /// errors end the loop and are returned.
    pub async fn start(&mut self, poll_wait: Duration, mut stop: watch::Receiver<()>) -> Result<(), PluginError> {
        info!(entity_id = %self.identity.entity_id(), ?poll_wait, "▶️ poll loop started");
        loop {
            if !(self.pre_poll)() {
                info!("pre_poll hook stopped the loop");
                break;
            }
            let batch = self.poll().await.inspect_err(|e| error!(error = %e, "❌ poll failed"))?;
            if !(self.post_poll)() {
                info!("post_poll hook stopped the loop");
                break;
            }
            if !self.dispatch(&batch).inspect_err(|e| error!(error = %e, "❌ dispatch failed"))? {
                info!("dispatch returned false, stopping");
                break;
            }

            tokio::select! {
                _ = stop.changed() => {
                    info!("🛑 poll loop received stop signal");
                    break;
                }
                _ = tokio::time::sleep(poll_wait) => {}
            }
        }
        Ok(())
    }
}
