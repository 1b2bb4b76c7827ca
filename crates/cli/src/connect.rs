use std::sync::Arc;

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    secrecy::{ExposeSecret, Secret},
    tether_auth::AuthClient,
    tether_config::TetherConfig,
    tether_session::{ControlSession, InboundFrame, SessionEvent},
    tokio::sync::broadcast::error::RecvError,
    tracing::warn,
};

#[derive(Args)]
pub struct ConnectArgs {
    #[arg(long)]
    user: String,
    /// Existing auth token; skips the login exchange.
    #[arg(long, env = "TETHER_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,
    /// Password used to obtain an auth token when none is given.
    #[arg(long, env = "TETHER_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

pub async fn run(config: &TetherConfig, args: ConnectArgs) -> Result<()> {
    let client = AuthClient::new(&config.auth)?;

    let auth_token = resolve_auth_token(
        &client,
        &args.user,
        args.auth_token.map(Secret::new),
        args.password.map(Secret::new),
    )
    .await?;

    let session = ControlSession::new(Arc::new(client), config.hub.clone(), &config.session);
    let mut events = session.subscribe();
    session.start(&args.user, auth_token.expose_secret())?;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = events.recv() => match event {
                Ok(SessionEvent::MessageReceived(InboundFrame::Text(text))) => println!("{text}"),
                Ok(SessionEvent::MessageReceived(InboundFrame::Binary(data))) => {
                    println!("<{} bytes>", data.len());
                },
                Ok(SessionEvent::Disconnected { code, reason }) => {
                    println!("disconnected ({code}) {reason}");
                    break Ok(());
                },
                Ok(SessionEvent::TransportError { detail }) => {
                    break Err(anyhow::anyhow!("hub connection failed: {detail}"));
                },
                Ok(SessionEvent::AcquisitionFailed(e)) => {
                    break Err(anyhow::Error::new(e).context("could not acquire access tokens"));
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped session events"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    session.stop_and_wait().await;
    outcome
}

/// Use the given auth token, or log in with the password to obtain one.
async fn resolve_auth_token(
    client: &AuthClient,
    user: &str,
    auth_token: Option<Secret<String>>,
    password: Option<Secret<String>>,
) -> Result<Secret<String>> {
    match (auth_token, password) {
        (Some(token), _) => Ok(token),
        (None, Some(password)) => client
            .authenticate(user, password.expose_secret())
            .await
            .map(Secret::new)
            .with_context(|| format!("login failed for {user}")),
        (None, None) => bail!("either --auth-token or --password is required"),
    }
}
