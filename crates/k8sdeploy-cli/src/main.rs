//! k8sdeploy-agent
//!
//! 起動の流れ:
//! 1. 設定を読み込み、tracing を初期化
//! 2. キュー情報を取得（静的設定 or オーケストレーターとのハンドシェイク）
//! 3. Kubernetes に接続し、AgentBuilder でワイヤリング
//! 4. health サーバーとシグナル監視を起動し、poll ループを実行

mod config;
mod health;
mod signal;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use k8sdeploy_core::actions::builtin_keys;
use k8sdeploy_core::app::AgentBuilder;
use k8sdeploy_http::RabbitHttpTransport;
use k8sdeploy_kube::KubeGateway;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Cli;

const BUILD_VERSION: &str = match option_env!("BUILD_VERSION") {
    Some(version) => version,
    None => "dev",
};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let access = cli
        .credential_source()?
        .queue_access()
        .await
        .context("failed to obtain queue access")?;

    let transport = RabbitHttpTransport::new(
        &cli.rabbit_host,
        cli.vhost(&access.routes),
        access.credentials.clone(),
    )?;
    let gateway = KubeGateway::connect(cli.development, cli.kube_context.clone())
        .await
        .context("failed to connect to kubernetes")?;

    let agent = AgentBuilder::new()
        .with_builtin_actions()?
        .gateway(Arc::new(gateway))
        .transport(Arc::new(transport))
        .queue_access(access)
        .scheduler_config(cli.scheduler_config())
        .self_update(cli.self_update_config(BUILD_VERSION))
        .expect_actions(&builtin_keys())
        .build()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(signal::forward(shutdown_tx));

    if !cli.development {
        let listener = health::bind(cli.http_port)
            .await
            .with_context(|| format!("failed to bind health port {}", cli.http_port))?;
        let health_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(listener, health_rx).await {
                error!(error = %e, "health server stopped");
            }
        });
    }

    agent.run(shutdown_rx).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    info!(version = BUILD_VERSION, development = cli.development, "starting k8sdeploy-agent");

    if let Err(err) = run(cli).await {
        error!("agent stopped: {err:#}");
        return Err(err);
    }
    info!("agent stopped");
    Ok(())
}
