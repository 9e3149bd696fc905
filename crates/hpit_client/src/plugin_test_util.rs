//! In-memory [`Transport`] for tests.
//!
//! Records every call, serves scripted batches and subscription lists, and can
//! be told to fail the next call.

use std::{
    collections::{BTreeSet, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{error::TransportError, identity::Identity, message::Message, transport::Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Subscribe(BTreeSet<String>),
    Unsubscribe(BTreeSet<String>),
    ListSubscriptions,
    FetchPendingMessages,
    SendResponse(String, Value),
}

#[derive(Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    server_subscriptions: BTreeSet<String>,
    batches: VecDeque<Vec<Message>>,
    fail_next: Option<String>,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().await.calls.clone()
    }

    /// What `list_subscriptions` reports, on top of anything subscribed through the mock.
    pub async fn set_server_subscriptions<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().await.server_subscriptions = names.into_iter().map(Into::into).collect();
    }

    /// Queue a batch for a later `fetch_pending_messages`.
    pub async fn push_batch(&self, batch: Vec<Message>) {
        self.state.lock().await.batches.push_back(batch);
    }

    /// Make the next call fail with `TransportError::Other(reason)`.
    pub async fn fail_next(&self, reason: impl Into<String>) {
        self.state.lock().await.fail_next = Some(reason.into());
    }

    async fn record(&self, call: RecordedCall) -> Result<tokio::sync::MutexGuard<'_, MockState>, TransportError> {
        let mut state = self.state.lock().await;
        if let Some(reason) = state.fail_next.take() {
            return Err(TransportError::Other(reason));
        }
        state.calls.push(call);
        Ok(state)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn subscribe(&self, _: &Identity, names: &BTreeSet<String>) -> Result<(), TransportError> {
        let mut state = self.record(RecordedCall::Subscribe(names.clone())).await?;
        state.server_subscriptions.extend(names.iter().cloned());
        Ok(())
    }

    async fn unsubscribe(&self, _: &Identity, names: &BTreeSet<String>) -> Result<(), TransportError> {
        let mut state = self.record(RecordedCall::Unsubscribe(names.clone())).await?;
        state.server_subscriptions.retain(|n| !names.contains(n));
        Ok(())
    }

    async fn list_subscriptions(&self, _: &Identity) -> Result<BTreeSet<String>, TransportError> {
        let state = self.record(RecordedCall::ListSubscriptions).await?;
        Ok(state.server_subscriptions.clone())
    }

    async fn fetch_pending_messages(&self, _: &Identity) -> Result<Vec<Message>, TransportError> {
        let mut state = self.record(RecordedCall::FetchPendingMessages).await?;
        Ok(state.batches.pop_front().unwrap_or_default())
    }

    async fn send_response(&self, _: &Identity, message_id: &str, payload: &Value) -> Result<(), TransportError> {
        self.record(RecordedCall::SendResponse(message_id.to_string(), payload.clone()))
            .await
            .map(drop)
    }
}
