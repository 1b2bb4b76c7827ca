//! Session lifecycle: `start` spawns one background worker per attempt that
//! exchanges tokens, connects, registers and then relays hub frames until the
//! connection ends or `stop` is called.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use {
    futures::{SinkExt, StreamExt},
    secrecy::{ExposeSecret, Secret},
    tether_auth::AccessToken,
    tether_config::{HubConfig, SessionConfig},
    thiserror::Error,
    tokio::{
        sync::{broadcast, watch},
        runtime::Handle,
        task::JoinHandle,
    },
    tokio_tungstenite::tungstenite::{Error as WsError, Message, error::ProtocolError},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, trace, warn},
};

use crate::{
    event::{AcquisitionError, InboundFrame, SessionEvent},
    hub::{self, HubStream},
    register::RegistrationFrame,
    source::TokenSource,
    state::{ConnectionPhase, SessionState},
};

/// Close code reported when the hub connection ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported for a close frame with no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Why `start` refused to begin an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("user id is empty")]
    MissingUserId,

    #[error("credential token is empty")]
    MissingCredential,

    #[error("a session attempt is already in progress")]
    AlreadyStarted,

    #[error("no tokio runtime available to run the session")]
    NoRuntime,
}

// ── Shared state ─────────────────────────────────────────────────────────────

struct Slot {
    /// Bumped by every start and stop; workers holding an older value are stale.
    epoch: u64,
    state: Option<SessionState>,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    slot: Mutex<Slot>,
    events: broadcast::Sender<SessionEvent>,
    phase: watch::Sender<ConnectionPhase>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Control session ──────────────────────────────────────────────────────────

/// Orchestrates authenticate → exchange → connect → register for one user.
///
/// All state lives behind a single mutex shared with the worker; events are
/// only published while holding it, so nothing is delivered for an attempt
/// once `stop` has returned.
///
/// `start` spawns onto the current tokio runtime and returns
/// [`StartError::NoRuntime`] when called outside one; `stop` works anywhere.
pub struct ControlSession {
    shared: Arc<Shared>,
    source: Arc<dyn TokenSource>,
    hub: HubConfig,
}

impl ControlSession {
    pub fn new(source: Arc<dyn TokenSource>, hub: HubConfig, config: &SessionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (phase, _) = watch::channel(ConnectionPhase::Idle);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    epoch: 0,
                    state: None,
                    cancel: None,
                    worker: None,
                }),
                events,
                phase,
            }),
            source,
            hub,
        }
    }

    /// Begin a session attempt without blocking.
    ///
    /// Accepted from `Idle`, `Disconnected` or `Failed`; the latter two start
    /// over with fresh state. Fails with [`StartError::NoRuntime`] outside a
    /// tokio runtime, leaving the session untouched.
    pub fn start(&self, user_id: &str, credential_token: &str) -> Result<(), StartError> {
        if user_id.is_empty() {
            return Err(StartError::MissingUserId);
        }
        if credential_token.is_empty() {
            return Err(StartError::MissingCredential);
        }
        let runtime = Handle::try_current().map_err(|_| StartError::NoRuntime)?;

        let mut slot = self.shared.lock();
        let current = slot
            .state
            .as_ref()
            .map_or(ConnectionPhase::Idle, SessionState::phase);
        if !current.can_start() {
            debug!(phase = ?current, "rejecting start, attempt in progress");
            return Err(StartError::AlreadyStarted);
        }

        // A terminal attempt's worker is finished or about to be.
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        slot.worker = None;
        slot.epoch += 1;

        let mut state = SessionState::new(user_id, Secret::new(credential_token.to_owned()));
        state.advance(ConnectionPhase::AcquiringTokens);
        slot.state = Some(state);
        self.shared
            .phase
            .send_replace(ConnectionPhase::AcquiringTokens);

        let cancel = CancellationToken::new();
        let attempt = Attempt {
            shared: Arc::clone(&self.shared),
            epoch: slot.epoch,
            cancel: cancel.clone(),
        };
        let worker = runtime.spawn(run_attempt(
            attempt,
            Arc::clone(&self.source),
            self.hub.clone(),
            user_id.to_owned(),
            Secret::new(credential_token.to_owned()),
        ));
        slot.cancel = Some(cancel);
        slot.worker = Some(worker);

        info!(user = user_id, epoch = slot.epoch, "control session starting");
        Ok(())
    }

    /// Cancel the current attempt, close any open connection and reset to
    /// `Idle`. No-op when already idle. Safe to call from any thread.
    pub fn stop(&self) {
        // Dropping the handle detaches the worker; it exits on cancellation.
        drop(self.halt());
    }

    /// Like [`stop`](Self::stop), but also waits for the worker to finish
    /// closing the connection.
    pub async fn stop_and_wait(&self) {
        if let Some(worker) = self.halt()
            && let Err(e) = worker.await
            && e.is_panic()
        {
            warn!(error = %e, "session worker panicked");
        }
    }

    fn halt(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.shared.lock();
        if slot.state.is_none() {
            return None;
        }
        slot.epoch += 1;
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        slot.state = None;
        self.shared.phase.send_replace(ConnectionPhase::Idle);
        info!("control session stopped");
        slot.worker.take()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.shared
            .lock()
            .state
            .as_ref()
            .map_or(ConnectionPhase::Idle, SessionState::phase)
    }

    /// All access tokens of the current attempt, in server order.
    ///
    /// Only the first is used for the connection; the rest are exposed so a
    /// caller can implement its own fallback.
    pub fn access_tokens(&self) -> Vec<AccessToken> {
        self.shared
            .lock()
            .state
            .as_ref()
            .map(|s| s.access_tokens().to_vec())
            .unwrap_or_default()
    }

    /// The token the connection was opened with.
    pub fn active_token(&self) -> Option<AccessToken> {
        self.shared
            .lock()
            .state
            .as_ref()
            .and_then(|s| s.active_token().cloned())
    }

    pub fn user_id(&self) -> Option<String> {
        self.shared
            .lock()
            .state
            .as_ref()
            .map(|s| s.user_id().to_owned())
    }

    /// Subscribe to session events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Observe phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<ConnectionPhase> {
        self.shared.phase.subscribe()
    }
}

impl Drop for ControlSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Worker ───────────────────────────────────────────────────────────────────

/// The worker's handle on the shared state, valid while its epoch is current.
struct Attempt {
    shared: Arc<Shared>,
    epoch: u64,
    cancel: CancellationToken,
}

impl Attempt {
    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState, &Shared) -> R) -> Option<R> {
        let mut slot = self.shared.lock();
        if slot.epoch != self.epoch {
            return None;
        }
        let state = slot.state.as_mut()?;
        Some(f(state, &*self.shared))
    }

    fn advance(&self, next: ConnectionPhase) -> bool {
        self.with_state(|state, shared| {
            let moved = state.advance(next);
            if moved {
                debug!(phase = ?next, "session phase changed");
                shared.phase.send_replace(next);
            }
            moved
        })
        .unwrap_or(false)
    }

    fn accept_tokens(&self, tokens: Vec<AccessToken>) -> Option<AccessToken> {
        self.with_state(|state, shared| {
            if !state.accept_tokens(tokens) {
                return None;
            }
            debug!(phase = ?ConnectionPhase::Connecting, "session phase changed");
            shared.phase.send_replace(ConnectionPhase::Connecting);
            state.active_token().cloned()
        })
        .flatten()
    }

    /// Publish an event; false once the attempt is stale.
    fn emit(&self, event: SessionEvent) -> bool {
        self.with_state(|_, shared| {
            // No subscribers is fine.
            let _ = shared.events.send(event);
        })
        .is_some()
    }

    /// Enter a terminal phase and publish the event explaining it.
    fn finish(&self, phase: ConnectionPhase, event: SessionEvent) {
        self.with_state(|state, shared| {
            if state.advance(phase) {
                debug!(phase = ?phase, "session phase changed");
                shared.phase.send_replace(phase);
            }
            let _ = shared.events.send(event);
        });
    }

    fn fail_transport(&self, detail: String) {
        self.finish(ConnectionPhase::Failed, SessionEvent::TransportError {
            detail,
        });
    }
}

async fn run_attempt(
    attempt: Attempt,
    source: Arc<dyn TokenSource>,
    hub: HubConfig,
    user_id: String,
    credential: Secret<String>,
) {
    let exchange = source.request_access_tokens(&user_id, credential.expose_secret());
    let result = tokio::select! {
        () = attempt.cancel.cancelled() => {
            debug!("session cancelled during token exchange");
            return;
        },
        result = exchange => result,
    };

    let tokens = match result {
        Ok(tokens) if tokens.is_empty() => {
            warn!(user = %user_id, "token exchange returned no access tokens");
            attempt.finish(
                ConnectionPhase::Failed,
                SessionEvent::AcquisitionFailed(AcquisitionError::NoAccessTokens),
            );
            return;
        },
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(user = %user_id, error = %e, "token exchange failed");
            attempt.finish(
                ConnectionPhase::Failed,
                SessionEvent::AcquisitionFailed(e.into()),
            );
            return;
        },
    };

    let Some(active) = attempt.accept_tokens(tokens) else {
        return;
    };
    info!(host = %active.host, port = active.port, hub = %hub.url, "connecting to hub");

    let connected = tokio::select! {
        () = attempt.cancel.cancelled() => {
            debug!("session cancelled while connecting");
            return;
        },
        connected = hub::connect(&hub) => connected,
    };
    let mut stream = match connected {
        Ok(stream) => stream,
        Err(e) => {
            warn!(hub = %hub.url, error = %e, "hub connection failed");
            attempt.fail_transport(e.to_string());
            return;
        },
    };

    if !attempt.advance(ConnectionPhase::Registering) {
        hub::close(&mut stream).await;
        return;
    }
    if let Err(detail) = register(&mut stream, &active).await {
        warn!(error = %detail, "registration failed");
        attempt.fail_transport(detail);
        hub::close(&mut stream).await;
        return;
    }
    if !attempt.advance(ConnectionPhase::Active) {
        hub::close(&mut stream).await;
        return;
    }
    info!(host = %active.host, port = active.port, "registered with hub");

    relay(&attempt, stream).await;
}

async fn register(stream: &mut HubStream, token: &AccessToken) -> Result<(), String> {
    let frame = RegistrationFrame::for_token(token)
        .to_json()
        .map_err(|e| format!("failed to encode registration: {e}"))?;
    stream
        .send(Message::text(frame))
        .await
        .map_err(|e| format!("failed to send registration: {e}"))
}

/// Forward hub frames until the connection ends or the attempt is cancelled.
async fn relay(attempt: &Attempt, mut stream: HubStream) {
    loop {
        let next = tokio::select! {
            () = attempt.cancel.cancelled() => {
                debug!("session cancelled, closing hub connection");
                hub::close(&mut stream).await;
                return;
            },
            next = stream.next() => next,
        };

        let frame = match next {
            Some(Ok(Message::Text(text))) => InboundFrame::Text(text.as_str().to_owned()),
            Some(Ok(Message::Binary(data))) => InboundFrame::Binary(data.to_vec()),
            Some(Ok(Message::Close(close))) => {
                let (code, reason) = close.map_or((NO_STATUS_RECEIVED, String::new()), |f| {
                    (u16::from(f.code), f.reason.as_str().to_owned())
                });
                info!(code, reason = %reason, "hub closed connection");
                attempt.finish(
                    ConnectionPhase::Disconnected,
                    SessionEvent::Disconnected { code, reason },
                );
                hub::close(&mut stream).await;
                return;
            },
            // Ping/pong are answered by the transport.
            Some(Ok(_)) => continue,
            Some(Err(
                WsError::ConnectionClosed
                | WsError::AlreadyClosed
                | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake),
            ))
            | None => {
                info!("hub connection ended without close frame");
                attempt.finish(ConnectionPhase::Disconnected, SessionEvent::Disconnected {
                    code: ABNORMAL_CLOSURE,
                    reason: String::new(),
                });
                return;
            },
            Some(Err(e)) => {
                warn!(error = %e, "hub connection error");
                attempt.fail_transport(e.to_string());
                return;
            },
        };

        trace!(frame = ?frame, "hub -> client");
        if !attempt.emit(SessionEvent::MessageReceived(frame)) {
            hub::close(&mut stream).await;
            return;
        }
    }
}
