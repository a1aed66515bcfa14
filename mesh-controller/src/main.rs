//! `traefik-mesh` daemon entrypoint. Grounded on `operator/src/main.rs`'s
//! shape (tracing init, `Client::try_default`, `tokio::select!` over the
//! long-running tasks) but with a real `clap` CLI in front of it, matching
//! the workspace's existing `clap` dependency and the derive style the root
//! manifest already commits to.

mod api;
mod error;
mod eventloop;
mod health;
mod listers;
mod metrics;
mod porttable_store;
mod shadow;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;
use mesh_core::filter::ResourceFilter;
use mesh_core::provider::{Config as ProviderConfig, TrafficType};
use std::collections::BTreeMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "traefik-mesh", about = "Traefik Mesh control-plane daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Reject HTTP traffic with no matching TrafficTarget/TrafficSplit.
    #[arg(long)]
    acl: bool,

    #[arg(long, default_value = "http")]
    default_traffic_type: String,

    #[arg(long, default_value_t = 15000)]
    min_http_port: u16,

    #[arg(long, default_value_t = 25000)]
    max_http_port: u16,

    #[arg(long, default_value = "traefik-mesh")]
    mesh_namespace: String,

    /// Comma-separated list of namespaces the Topology Builder ignores entirely.
    #[arg(long, value_delimiter = ',')]
    ignored_namespaces: Vec<String>,

    /// Ignore any resource carrying the `mesh.traefik.io/ignore: "true"` label.
    #[arg(long)]
    ignore_labeled: bool,

    #[arg(long, default_value_t = 8080)]
    readiness_port: u16,

    #[arg(long, default_value_t = 9000)]
    api_port: u16,

    #[arg(long)]
    kubeconfig: Option<String>,

    #[arg(long, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Patches cluster DNS so mesh traffic routes through the proxy.
    /// Out of scope here (spec.md §1): the DNS patcher is a separate
    /// component this daemon does not implement.
    Prepare,
}

const IGNORE_LABEL_KEY: &str = "mesh.traefik.io/ignore";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_format);

    if matches!(cli.command, Some(Command::Prepare)) {
        info!("prepare subcommand invoked; DNS patching is out of scope for this daemon");
        return Ok(());
    }

    let default_traffic_type = TrafficType::parse(&cli.default_traffic_type)
        .with_context(|| format!("invalid --default-traffic-type {:?}", cli.default_traffic_type))?;

    if cli.min_http_port >= cli.max_http_port {
        bail!(
            "--min-http-port ({}) must be less than --max-http-port ({})",
            cli.min_http_port,
            cli.max_http_port
        );
    }

    info!(mesh_namespace = %cli.mesh_namespace, "starting traefik-mesh");

    let client = if let Some(path) = &cli.kubeconfig {
        let kubeconfig = kube::config::Kubeconfig::read_from(path)
            .with_context(|| format!("failed to read kubeconfig at {path}"))?;
        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default()).await?;
        Client::try_from(config)?
    } else {
        Client::try_default().await.context("failed to build default Kubernetes client")?
    };
    info!("connected to Kubernetes cluster");

    let mut ignored_labels = BTreeMap::new();
    if cli.ignore_labeled {
        ignored_labels.insert(IGNORE_LABEL_KEY.to_string(), "true".to_string());
    }
    let filter = ResourceFilter::new(cli.ignored_namespaces.clone(), ignored_labels);

    let provider_config = ProviderConfig {
        acl: cli.acl,
        default_traffic_type,
        min_http_port: cli.min_http_port,
        max_http_port: cli.max_http_port,
        mesh_namespace: cli.mesh_namespace.clone(),
    };

    let health_status = health::HealthStatus::new();
    let published = api::PublishedConfig::new();
    let port_store = porttable_store::PortTableStore::new(
        client.clone(),
        &cli.mesh_namespace,
        "traefik-mesh-port-table",
    );

    let event_loop = eventloop::EventLoop {
        client: client.clone(),
        filter,
        provider_config,
        mesh_namespace: cli.mesh_namespace.clone(),
        port_store,
        published: published.clone(),
        health: health_status.clone(),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let health_addr = format!("0.0.0.0:{}", cli.readiness_port);
    let api_addr = format!("0.0.0.0:{}", cli.api_port);

    tokio::select! {
        _ = event_loop.run(shutdown_rx) => {
            info!("event loop stopped");
        }
        result = serve(health_addr, health::router(health_status)) => {
            result?;
        }
        result = serve(api_addr, api::router(published)) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    }

    Ok(())
}

async fn serve(addr: String, router: axum::Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, router).await.context("server exited")?;
    Ok(())
}

fn init_tracing(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
