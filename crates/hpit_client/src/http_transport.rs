//! [`Transport`] over the hub's REST API.

use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::{AsRefStr, EnumIter};
use tracing::{debug, error, warn};

use crate::{error::TransportError, identity::Identity, message::Message, transport::Transport};

pub const DEFAULT_URL_ROOT: &str = "http://127.0.0.1:8000";

/// Paths relative to the hub's url root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter)]
pub enum Endpoint {
    #[strum(serialize = "plugin/subscribe")]
    Subscribe,
    #[strum(serialize = "plugin/unsubscribe")]
    Unsubscribe,
    #[strum(serialize = "plugin/subscription/list")]
    SubscriptionList,
    #[strum(serialize = "plugin/message/list")]
    MessageList,
    #[strum(serialize = "response")]
    Response,
}

#[derive(Serialize)]
struct NamesBody<'a> {
    message_names: &'a BTreeSet<String>,
}

// The hub has been seen answering with a bare string instead of a list,
// so both fields are read leniently and anything that is not an array is empty.
#[derive(Deserialize, Default)]
struct SubscriptionListBody {
    #[serde(default)]
    subscriptions: Value,
}

#[derive(Deserialize, Default)]
struct MessageListBody {
    #[serde(default)]
    messages: Value,
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url_root: String,
}

impl HttpTransport {
    pub fn new(url_root: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url_root))
    }

    pub fn with_client(client: Client, url_root: impl Into<String>) -> Self {
        let url_root = url_root.into().trim_end_matches('/').to_string();
        Self { client, url_root }
    }

    pub fn url_root(&self) -> &str {
        &self.url_root
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.url_root, endpoint.as_ref())
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        identity: &Identity,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<(), TransportError> {
        let url = self.url(endpoint);
        debug!(%url, "POST");
        let rsp = self
            .client
            .post(&url)
            .basic_auth(identity.entity_id(), Some(identity.api_key()))
            .json(body)
            .send()
            .await?;
        check_status(rsp).await?;
        Ok(())
    }

    async fn get<R: DeserializeOwned>(&self, identity: &Identity, endpoint: Endpoint) -> Result<R, TransportError> {
        let url = self.url(endpoint);
        debug!(%url, "GET");
        let rsp = self
            .client
            .get(&url)
            .basic_auth(identity.entity_id(), Some(identity.api_key()))
            .send()
            .await?;
        let bytes = check_status(rsp).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn check_status(rsp: Response) -> Result<Response, TransportError> {
    let status = rsp.status();
    if status.is_success() {
        return Ok(rsp);
    }
    let body = rsp.text().await.unwrap_or_default();
    error!(%status, %body, "❌ hub rejected request");
    Err(TransportError::Status { status, body })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn subscribe(&self, identity: &Identity, names: &BTreeSet<String>) -> Result<(), TransportError> {
        self.post(identity, Endpoint::Subscribe, &NamesBody { message_names: names })
            .await
    }

    async fn unsubscribe(&self, identity: &Identity, names: &BTreeSet<String>) -> Result<(), TransportError> {
        self.post(identity, Endpoint::Unsubscribe, &NamesBody { message_names: names })
            .await
    }

    async fn list_subscriptions(&self, identity: &Identity) -> Result<BTreeSet<String>, TransportError> {
        let body: SubscriptionListBody = self.get(identity, Endpoint::SubscriptionList).await?;
        let names = match body.subscriptions {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => BTreeSet::new(),
        };
        Ok(names)
    }

    async fn fetch_pending_messages(&self, identity: &Identity) -> Result<Vec<Message>, TransportError> {
        let body: MessageListBody = self.get(identity, Endpoint::MessageList).await?;
        let Value::Array(items) = body.messages else {
            return Ok(vec![]);
        };
        // one malformed entry must not cost the rest of the batch
        let batch = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Message>(item) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, "⚠️ skipping malformed message from hub");
                    None
                }
            })
            .collect();
        Ok(batch)
    }

    async fn send_response(
        &self,
        identity: &Identity,
        message_id: &str,
        payload: &Value,
    ) -> Result<(), TransportError> {
        let body = json!({
            "message_id": message_id,
            "payload": payload,
        });
        self.post(identity, Endpoint::Response, &body).await
    }
}
