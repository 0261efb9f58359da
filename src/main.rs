use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ixscale::cli::{format_dry_run, Args};
use ixscale::config::load_cloud_config;
use ixscale::gateway::IksApiClient;
use ixscale::registry::NodeGroupRegistry;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    if let Err(e) = args.validate_mode() {
        error!("{}", e);
        process::exit(1);
    }

    // Dry-run mode: print the reconciler setup and exit
    if args.dry_run {
        let output = format_dry_run(&args);
        println!("{}", output);
        return;
    }

    let cloud_config = match load_cloud_config(&args.cloud_config) {
        Ok(config) => config,
        Err(e) => {
            error!(
                "Failed to load cloud config {}: {}",
                args.cloud_config.display(),
                e
            );
            process::exit(1);
        }
    };

    // Shutdown signal shared with in-flight gateway calls.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    let client = match IksApiClient::new(&cloud_config) {
        Ok(client) => client.with_shutdown(stop_rx.clone()),
        Err(e) => {
            error!("Failed to build IKS API client: {}", e);
            process::exit(1);
        }
    };
    let gateway: Arc<dyn ixscale::NodeGroupGateway> = Arc::new(client);

    let registry = if !args.node_groups.is_empty() {
        NodeGroupRegistry::from_static_specs(gateway, &args.cluster_id, &args.node_groups).await
    } else {
        NodeGroupRegistry::with_auto_discovery(
            gateway,
            &args.cluster_id,
            &args.auto_discovery,
            Duration::from_secs(args.refresh_interval),
        )
        .await
    };
    let registry = match registry {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to build node group registry: {}", e);
            process::exit(1);
        }
    };

    info!(
        cluster = %args.cluster_id,
        groups = registry.list_groups().len(),
        "Starting ixscale reconciler"
    );
    for group in registry.list_groups() {
        info!("  {}", group.debug_string());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.tick_interval));
    let mut stop_rx = stop_rx;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = registry.refresh().await {
                    error!("Node group refresh failed: {}", e);
                }
            }
            result = stop_rx.wait_for(|stop| *stop) => {
                if result.is_ok() {
                    info!("Shutdown signal received, stopping reconciler");
                }
                break;
            }
        }
    }
}
