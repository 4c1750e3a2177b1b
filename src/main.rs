use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use chat_gateway::api::HttpServerApi;
use chat_gateway::config::{self, AccountConfig, GatewayConfig};
use chat_gateway::gateway::start_account;
use chat_gateway::pipeline::{EchoPipeline, ReplyPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config_path = std::env::var("CHAT_GATEWAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./gateway.toml"));

    let (config, mut accounts): (GatewayConfig, Vec<AccountConfig>) = if config_path.exists() {
        config::load_file(&config_path)?
    } else {
        (GatewayConfig::default(), Vec::new())
    };

    // A single env-configured account supplements (or replaces) the file.
    if let Some(account) = config::account_from_env()? {
        accounts.retain(|a| a.name != account.name);
        accounts.push(account);
    }

    if accounts.is_empty() {
        anyhow::bail!(
            "no accounts configured: provide {} or set CHAT_GATEWAY_SERVER_URL / \
             CHAT_GATEWAY_EMAIL / CHAT_GATEWAY_API_KEY",
            config_path.display()
        );
    }

    eprintln!("chat-gateway v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Accounts: {}",
        accounts
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    eprintln!(
        "   Poll timeout: {:?}, backoff: {:?}, backfill: {}",
        config.poll_timeout,
        config.error_backoff,
        if config.backfill_enabled { "on" } else { "off" },
    );

    // The echo pipeline stands in for the real downstream reply system;
    // deployments swap in their own `ReplyPipeline` implementation here.
    let pipeline: Arc<dyn ReplyPipeline> = Arc::new(EchoPipeline);

    let cancel = CancellationToken::new();
    let mut sessions = tokio::task::JoinSet::new();

    for account in accounts {
        let api = Arc::new(HttpServerApi::new(&account));
        let name = account.name.clone();
        let config = config.clone();
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.child_token();

        sessions.spawn(async move {
            let result = start_account(account, config, api, pipeline, cancel).await;
            (name, result)
        });
    }

    // Shut down all sessions on ctrl-c; latency is bounded by one long poll.
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    let mut failed = false;
    while let Some(joined) = sessions.join_next().await {
        match joined {
            Ok((name, Ok(()))) => tracing::info!(account = %name, "session exited"),
            Ok((name, Err(e))) => {
                tracing::error!(account = %name, error = %e, "session failed to start");
                failed = true;
            }
            Err(e) => {
                tracing::error!(error = %e, "session task panicked");
                failed = true;
            }
        }
    }

    if failed {
        anyhow::bail!("one or more account sessions failed");
    }
    Ok(())
}
