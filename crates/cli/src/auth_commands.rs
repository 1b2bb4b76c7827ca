use {
    anyhow::{Context, Result},
    clap::Args,
    secrecy::{ExposeSecret, Secret},
    tether_auth::AuthClient,
    tether_config::TetherConfig,
};

#[derive(Args)]
pub struct LoginArgs {
    #[arg(long)]
    username: String,
    /// Password; read from TETHER_PASSWORD when omitted.
    #[arg(long, env = "TETHER_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args)]
pub struct TokensArgs {
    #[arg(long)]
    user: String,
    #[arg(long, env = "TETHER_AUTH_TOKEN", hide_env_values = true)]
    auth_token: String,
}

pub async fn login(config: &TetherConfig, args: LoginArgs) -> Result<()> {
    let client = AuthClient::new(&config.auth)?;
    let password = Secret::new(args.password);
    let token = client
        .authenticate(&args.username, password.expose_secret())
        .await
        .with_context(|| format!("login failed for {}", args.username))?;
    println!("{token}");
    Ok(())
}

pub async fn tokens(config: &TetherConfig, args: TokensArgs) -> Result<()> {
    let client = AuthClient::new(&config.auth)?;
    let auth_token = Secret::new(args.auth_token);
    let tokens = client
        .request_access_tokens(&args.user, auth_token.expose_secret())
        .await
        .with_context(|| format!("token exchange failed for {}", args.user))?;

    if tokens.is_empty() {
        println!("No access tokens issued.");
        return Ok(());
    }
    for (i, token) in tokens.iter().enumerate() {
        println!(
            "{i}\t{}:{}\ttype={}\texpiration={}",
            token.host, token.port, token.kind, token.expiration
        );
    }
    Ok(())
}
