//! The `relaycord` binary: loads configuration, then serves the chat
//! socket and the auth endpoints until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rand::Rng;
use relaycord::http::auth_router;
use relaycord::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(version, about = "Relays Minecraft chat to Discord channels")]
struct Args {
    /// TOML config file; `RELAYCORD_*` environment variables override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, default_value = "false")]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(filter)
        .init();
}

/// 32 random bytes, hex encoded.
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.debug);

    let config = Config::load(args.config.as_deref())?;

    let secret = match &config.auth_secret {
        Some(secret) => secret.clone(),
        None => {
            tracing::warn!("auth_secret not set; credentials will not survive a restart");
            generate_secret()
        }
    };
    let signer = TokenSigner::new(&secret);

    let directory = config.directory(&Resolver::from_system()).await;
    if directory.bindings().is_empty() {
        tracing::warn!("no relay channels bound; chat will not be relayed");
    }
    let platform = DiscordRest::new(&config.discord.token, &config.discord.api_base);

    let server = RelayServerBuilder::new()
        .bind(&config.ws_bind)
        .session_config(config.session_config())
        .templates(config.templates.clone())
        .build(signer.clone(), directory, platform)
        .await?;

    let handshake = Arc::new(Handshake::new(
        signer,
        MojangSessionService::new(&config.session_service_url),
    ));
    let listener = tokio::net::TcpListener::bind(&config.http_bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "auth endpoints listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "unable to listen for Ctrl-C");
                return;
            }
            tracing::info!("shutting down");
            shutdown.cancel();
        }
    });

    // Whichever listener stops first takes the other down with it.
    let ws = async {
        let result = server.run_until_cancelled(shutdown.clone()).await;
        shutdown.cancel();
        result
    };
    let http = async {
        let stopping = shutdown.clone();
        let result = axum::serve(listener, auth_router(handshake))
            .with_graceful_shutdown(async move { stopping.cancelled().await })
            .await;
        shutdown.cancel();
        result
    };
    let (ws, http) = tokio::join!(ws, http);
    ws?;
    http?;
    Ok(())
}
