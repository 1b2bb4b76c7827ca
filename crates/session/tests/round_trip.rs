//! Full login → token exchange → connect → register sequence against a mock
//! auth server and a local hub.

use std::{sync::Arc, time::Duration};

use {
    futures::StreamExt,
    mockito::{Matcher, Server},
    serde_json::json,
    tether_auth::AuthClient,
    tether_config::{AuthConfig, HubConfig, SessionConfig},
    tether_session::{ConnectionPhase, ControlSession},
    tokio::{net::TcpListener, sync::oneshot, time::timeout},
    tokio_tungstenite::{accept_async, tungstenite::Message},
};

const WAIT: Duration = Duration::from_secs(5);

/// Accepts one hub connection and hands back its first text frame.
async fn spawn_hub() -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let mut tx = Some(tx);
        while let Some(Ok(msg)) = ws.next().await {
            if let (Message::Text(text), Some(tx)) = (msg, tx.take()) {
                let _ = tx.send(text.as_str().to_owned());
            }
        }
    });

    (url, rx)
}

#[tokio::test]
async fn login_exchange_and_register() {
    let mut auth = Server::new_async().await;
    let login = auth
        .mock("POST", "/login")
        .match_body(Matcher::Json(json!({"username": "alice", "password": "pw"})))
        .with_body(r#"{"message":{"authtoken":{"token":"T1"}}}"#)
        .create_async()
        .await;
    let tokens = auth
        .mock("POST", "/tokens")
        .match_body(Matcher::Json(json!({"username": "alice", "authtoken": "T1"})))
        .with_body(
            r#"{"message":{"accesstokens":[{"token":"AT1","host":"h1","type":"x","port":1234,"expiration":999}]}}"#,
        )
        .create_async()
        .await;

    let client = AuthClient::new(&AuthConfig {
        origin: auth.url(),
        timeout_secs: 5,
    })
    .unwrap();
    let auth_token = client.authenticate("alice", "pw").await.unwrap();
    assert_eq!(auth_token, "T1");

    let (hub_url, registration) = spawn_hub().await;
    let session = ControlSession::new(
        Arc::new(client),
        HubConfig {
            url: hub_url,
            connect_timeout_secs: 5,
        },
        &SessionConfig::default(),
    );

    session.start("alice", &auth_token).unwrap();
    let frame = timeout(WAIT, registration).await.unwrap().unwrap();
    assert_eq!(
        frame,
        r#"{"command":"register","hostname":"h1","port":1234,"accesstoken":"AT1","dbid":"nil"}"#
    );

    let mut phase = session.watch_phase();
    timeout(WAIT, phase.wait_for(|p| *p == ConnectionPhase::Active))
        .await
        .unwrap()
        .unwrap();

    login.assert_async().await;
    tokens.assert_async().await;

    session.stop_and_wait().await;
    assert_eq!(session.phase(), ConnectionPhase::Idle);
}
