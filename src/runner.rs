//! Wires a plugin to a transport and keeps it polling until stopped.

use std::time::Duration;

use anyhow::{anyhow, Result};
use hpit_client::{Callback, Identity, Message, Plugin, Transport};
use serde_json::Value;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{error, info};

type Reply = (String, Value);

/// What `hpit run` does once settings are resolved.
pub struct RunOptions {
    pub subscriptions: Vec<String>,
    pub echo: bool,
    pub poll_wait: Duration,
}

/// Logs every message it sees; with a reply channel it also queues the
/// message payload as the response.
pub fn logging_handler(replies: Option<mpsc::UnboundedSender<Reply>>) -> Callback {
    Callback::handler(move |msg: &Message| {
        let payload = Value::Object(msg.payload.clone());
        info!(
            message_id = %msg.message_id,
            sender = %msg.sender_entity_id,
            event = %msg.event_name,
            "📥 {payload}"
        );
        if let Some(tx) = &replies {
            tx.send((msg.message_id.clone(), payload))
                .map_err(|_| anyhow!("response queue closed"))?;
        }
        Ok(())
    })
}

/// Sends queued replies one by one until every sender is gone.
///
/// Handlers run synchronously inside dispatch, so they cannot await the
/// transport themselves.
pub fn spawn_responder<T>(transport: T, identity: Identity, mut rx: mpsc::UnboundedReceiver<Reply>) -> JoinHandle<()>
where
    T: Transport + 'static,
{
    tokio::spawn(async move {
        while let Some((message_id, payload)) = rx.recv().await {
            match transport.send_response(&identity, &message_id, &payload).await {
                Ok(()) => info!(%message_id, "📤 response sent"),
                Err(e) => error!(%message_id, error = %e, "❌ could not send response"),
            }
        }
    })
}

/// Connects, then polls until `stop` fires or the loop ends on its own.
pub async fn run_plugin<T>(transport: T, identity: Identity, options: RunOptions, stop: watch::Receiver<()>) -> Result<()>
where
    T: Transport + Clone + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let responder = options
        .echo
        .then(|| spawn_responder(transport.clone(), identity.clone(), rx));
    let handler = logging_handler(options.echo.then_some(tx));

    // subscribed names get the handler directly, anything else the hub sends lands on the wildcard
    let builder = options
        .subscriptions
        .into_iter()
        .fold(Plugin::builder(identity), |builder, name| builder.handler(name, handler.clone()));
    let mut plugin = builder.wildcard(handler).connect(transport).await?;

    let result = plugin.start(options.poll_wait, stop).await;

    // the handlers own the last sender, dropping the plugin lets the responder drain and exit
    drop(plugin);
    if let Some(responder) = responder {
        responder.await?;
    }
    result?;
    info!("plugin stopped");
    Ok(())
}
