use anyhow::{Context, Result};
use clap::Parser;
use ddnsbridge::config::LogFormat;
use ddnsbridge::error::Error;
use ddnsbridge::{Config, Handler, KubeEndpointStore};
use is_terminal::IsTerminal;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    tracing_init(&config);
    config.validate()?;
    let dns_addr = config.dns_bind_addr()?;

    info!(
        "starting ddnsbridge: zones {:?}, key \"{}\" ({:?}), namespace \"{}\"",
        config.zones().collect::<Vec<_>>(),
        config.tsig_key,
        config.tsig_algorithm,
        config.namespace
    );

    let store = KubeEndpointStore::try_default(&config.namespace)
        .await
        .context("failed to create kubernetes client")?;
    let handler = Handler::from_config(&config, Arc::new(store))?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let dns_server = ddnsbridge::new_dns(dns_addr, handler, config.tcp_timeout).await?;
    let mut dns_handle = tokio::spawn(dns_server.run(shutdown_tx.subscribe()));

    let mut api_handle = match config.health_bind_addr {
        Some(addr) => tokio::spawn(ddnsbridge::serve_http(addr, shutdown_tx.subscribe())),
        None => {
            let mut shutdown = shutdown_tx.subscribe();
            tokio::spawn(async move {
                shutdown.recv().await.ok();
                Ok::<(), Error>(())
            })
        }
    };

    let (mut dns_running, mut api_running) = (true, true);
    tokio::select! {
        () = shutdown_signal() => {
            info!("quitting from signal");
        },
        dns_res = &mut dns_handle => {
            dns_running = false;
            dns_res?.context("DNS server failed")?;
        }
        api_res = &mut api_handle => {
            api_running = false;
            api_res?.context("health API failed")?;
        }
    }

    // Whatever is still running finishes its in-flight work before the process exits.
    shutdown_tx.send(()).ok();
    if dns_running {
        dns_handle.await?.context("DNS server failed")?;
    }
    if api_running {
        api_handle.await?.context("health API failed")?;
    }
    info!("goodbye");
    Ok(())
}

fn tracing_init(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(std::io::stdout().is_terminal())
                .compact()
                .init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("unable to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
