use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::{error::TransportError, identity::Identity, message::Message};

/// The remote calls a plugin needs from the hub.
///
/// Implementations attach the identity to every call and report failures as
/// they happen; retrying is up to them, the plugin never retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn subscribe(&self, identity: &Identity, names: &BTreeSet<String>) -> Result<(), TransportError>;
    async fn unsubscribe(&self, identity: &Identity, names: &BTreeSet<String>) -> Result<(), TransportError>;
    async fn list_subscriptions(&self, identity: &Identity) -> Result<BTreeSet<String>, TransportError>;
    async fn fetch_pending_messages(&self, identity: &Identity) -> Result<Vec<Message>, TransportError>;
    async fn send_response(
        &self,
        identity: &Identity,
        message_id: &str,
        payload: &Value,
    ) -> Result<(), TransportError>;
}
