//! WebSocket link to the hub.

use std::time::Duration;

use {
    tether_config::HubConfig,
    thiserror::Error,
    tokio::net::TcpStream,
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite},
    tracing::debug,
};

pub(crate) type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub(crate) enum ConnectError {
    #[error("hub connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("hub connect failed: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// Open the hub connection, bounded by the configured connect timeout.
pub(crate) async fn connect(hub: &HubConfig) -> Result<HubStream, ConnectError> {
    let timeout = hub.connect_timeout();
    let (stream, response) = tokio::time::timeout(timeout, connect_async(hub.url.as_str()))
        .await
        .map_err(|_| ConnectError::Timeout(timeout))??;
    debug!(url = %hub.url, status = %response.status(), "hub handshake complete");
    Ok(stream)
}

/// Best-effort close handshake.
pub(crate) async fn close(stream: &mut HubStream) {
    if let Err(e) = stream.close(None).await {
        debug!(error = %e, "hub close did not complete cleanly");
    }
}
