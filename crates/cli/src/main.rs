// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `stevedore` - per-host container execution agent.
//!
//! Binds the HTTP API, wires the registry to a backend, and drains
//! gracefully on SIGINT/SIGTERM. Exits 0 on graceful shutdown, non-zero on
//! bind failure or an unusable backend.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stevedore_core::{to_megabytes, ExecutorResources, SystemClock};
use stevedore_daemon::{serve, DaemonConfig, Executor, HostBackend, TracingEmitter};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stevedore", about = "Per-host container execution agent", version)]
struct Args {
    /// Address the HTTP API listens on
    #[arg(long, default_value = "0.0.0.0:1700")]
    listen_addr: String,

    /// Total memory available for containers (e.g. "1024M", "4G")
    #[arg(long, default_value = "1G")]
    memory: String,

    /// Total disk available for containers (e.g. "2048M", "8G")
    #[arg(long, default_value = "1G")]
    disk: String,

    /// Maximum number of live containers
    #[arg(long, default_value_t = 256)]
    containers: u64,

    /// Largest single log message, in bytes
    #[arg(long, default_value_t = 4096)]
    max_log_message_size: usize,

    /// Owner name the backend tags containers with
    #[arg(long, default_value = "stevedore")]
    container_owner_name: String,

    /// Backend cpu shares corresponding to a cpu_weight of 100
    #[arg(long, default_value_t = 1024)]
    container_max_cpu_shares: u64,

    /// Seconds before completed containers are garbage collected (0 disables)
    #[arg(long, default_value_t = 300)]
    completed_ttl_secs: u64,

    /// Directory the host backend keeps container scratch space in
    #[arg(long)]
    container_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = DaemonConfig {
        total_capacity: ExecutorResources {
            memory_mb: to_megabytes(&args.memory)
                .with_context(|| format!("--memory {:?}", args.memory))?,
            disk_mb: to_megabytes(&args.disk)
                .with_context(|| format!("--disk {:?}", args.disk))?,
            containers: args.containers,
        },
        max_log_message_size: args.max_log_message_size,
        container_owner_name: args.container_owner_name.clone(),
        container_max_cpu_shares: args.container_max_cpu_shares,
        completed_ttl: Duration::from_secs(args.completed_ttl_secs),
        ..DaemonConfig::default()
    };

    let container_dir = args
        .container_dir
        .unwrap_or_else(|| std::env::temp_dir().join("stevedore-containers"));
    std::fs::create_dir_all(&container_dir)
        .with_context(|| format!("creating container dir {}", container_dir.display()))?;

    let executor = Executor::new(
        config,
        Arc::new(HostBackend::new(&container_dir)),
        Arc::new(TracingEmitter),
        SystemClock,
    );

    let listener = tokio::net::TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("binding {}", args.listen_addr))?;
    info!(
        addr = %args.listen_addr,
        container_dir = %container_dir.display(),
        "starting agent"
    );

    let drainer = executor.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        drainer.drain();
    });

    serve(executor, listener).await.context("serving HTTP API")?;
    info!("agent drained; exiting");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => return tokio::signal::ctrl_c().await.unwrap_or_default(),
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
