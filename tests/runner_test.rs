use std::time::Duration;

use hpit::runner::{logging_handler, run_plugin, RunOptions};
use hpit_client::{
    plugin_test_util::{MockTransport, RecordedCall},
    Identity, Message, Plugin,
};
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, watch};

fn ping(id: &str) -> Message {
    let mut payload = Map::new();
    payload.insert("text".into(), json!("ping"));
    Message::new(id, "sender-1", "ping", payload)
}

fn options(echo: bool) -> RunOptions {
    RunOptions {
        subscriptions: vec!["ping".into()],
        echo,
        poll_wait: Duration::from_millis(5),
    }
}

async fn run_briefly(mock: MockTransport, echo: bool) {
    let (stop_tx, stop_rx) = watch::channel(());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = stop_tx.send(());
    });
    tokio::time::timeout(
        Duration::from_secs(5),
        run_plugin(mock, Identity::new("1234", "4567"), options(echo), stop_rx),
    )
    .await
    .expect("runner did not stop")
    .unwrap();
}

#[tokio::test]
async fn echo_replies_with_the_payload() {
    let mock = MockTransport::new();
    mock.push_batch(vec![ping("m-1"), ping("m-2")]).await;

    run_briefly(mock.clone(), true).await;

    let calls = mock.calls().await;
    assert_eq!(calls[0], RecordedCall::Subscribe(["ping".to_string()].into()));
    let responses: Vec<_> = calls
        .into_iter()
        .filter_map(|c| match c {
            RecordedCall::SendResponse(id, payload) => Some((id, payload)),
            _ => None,
        })
        .collect();
    assert_eq!(
        responses,
        vec![
            ("m-1".to_string(), json!({"text": "ping"})),
            ("m-2".to_string(), json!({"text": "ping"})),
        ]
    );
}

#[tokio::test]
async fn without_echo_nothing_is_sent_back() {
    let mock = MockTransport::new();
    mock.push_batch(vec![ping("m-1")]).await;

    run_briefly(mock.clone(), false).await;

    let calls = mock.calls().await;
    assert!(calls.contains(&RecordedCall::FetchPendingMessages));
    assert!(!calls.iter().any(|c| matches!(c, RecordedCall::SendResponse(..))));
}

#[tokio::test]
async fn failed_connect_is_reported() {
    let mock = MockTransport::new();
    mock.fail_next("hub down").await;
    let (_stop_tx, stop_rx) = watch::channel(());

    let err = run_plugin(mock, Identity::new("1234", "4567"), options(false), stop_rx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("could not connect"));
}

#[tokio::test]
async fn logging_handler_queues_replies() {
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Value)>();
    let mut plugin = Plugin::builder(Identity::new("1234", "4567"))
        .wildcard(logging_handler(Some(tx)))
        .connect(MockTransport::new())
        .await
        .unwrap();

    assert!(plugin.dispatch(&[ping("m-9")]).unwrap());
    assert_eq!(rx.recv().await, Some(("m-9".to_string(), json!({"text": "ping"}))));
}

#[tokio::test]
async fn unsubscribed_events_fall_back_to_the_wildcard() {
    let mock = MockTransport::new();
    let mut other = ping("m-3");
    other.event_name = "pong".into();
    mock.push_batch(vec![ping("m-1"), other]).await;

    run_briefly(mock.clone(), true).await;

    let replied: Vec<_> = mock
        .calls()
        .await
        .into_iter()
        .filter_map(|c| match c {
            RecordedCall::SendResponse(id, _) => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(replied, vec!["m-1".to_string(), "m-3".to_string()]);
}
