//! Entry point for cgtop_agent: parse config, start the sampler, serve.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cgtop_agent::config::{parse_args, Parsed};
use cgtop_agent::sampler::spawn_sampler;
use cgtop_agent::state::AppState;
use cgtop_agent::{server, tls};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match parse_args(std::env::args(), |k| std::env::var(k).ok()) {
        Ok(Parsed::Run(cfg)) => cfg,
        Ok(Parsed::Help(text)) => {
            println!("{text}");
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if !cfg.root.is_dir() {
        warn!("cgroup root {} is not a directory; views will be empty", cfg.root.display());
    }

    let addr: SocketAddr = format!("{}:{}", cfg.bind, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.bind, cfg.port))?;
    let use_tls = cfg.tls;
    let state = AppState::new(cfg);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler = spawn_sampler(state.clone(), shutdown_rx.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    if use_tls {
        let (cert, key) = tls::ensure_self_signed_cert()?;
        info!("cgtop_agent listening on wss://{addr}/ws");
        server::serve_tls(addr, cert, key, state, shutdown_rx).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        info!("cgtop_agent listening on ws://{}/ws", listener.local_addr()?);
        server::serve(listener, state, shutdown_rx).await?;
    }

    let _ = sampler.await;
    Ok(())
}
