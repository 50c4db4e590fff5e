//! Entry point for the sysdash agent. Parses args and serves the dashboard.

use anyhow::Context;
use std::sync::Arc;
use sysdash_agent::actions::SystemRunner;
use sysdash_agent::api::router;
use sysdash_agent::config::{self, usage, Parsed};
use sysdash_agent::provider::host::HostProvider;
use sysdash_agent::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match config::from_env() {
        Ok(Parsed::Run(cfg)) => cfg,
        Ok(Parsed::Help(text)) => {
            println!("{text}");
            return Ok(());
        }
        Err(e) => {
            eprintln!("sysdash_agent: {e}");
            eprintln!("{}", usage("sysdash_agent"));
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sysdash_agent=info,tower_http=info")),
        )
        .init();

    if !cfg.actions.enabled {
        info!("host actions disabled");
    } else if cfg.actions.allow_user_kill {
        warn!("logoff may kill every process of the current user, including this agent");
    }

    // Baseline refresh happens here so the first request has CPU deltas.
    let provider = tokio::task::spawn_blocking(HostProvider::new)
        .await
        .context("initialising host provider")?;
    let state = AppState::new(Arc::new(provider), Arc::new(SystemRunner), &cfg);
    let app = router(state);

    let addr = cfg.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("sysdash agent running at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("serving http")?;
    Ok(())
}
