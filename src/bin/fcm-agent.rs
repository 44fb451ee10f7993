use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use fcm_agent::cache::token_manager::TokenManager;
use fcm_agent::config::projects::ServiceConfig;
use fcm_agent::credentials::registry::ProjectRegistry;
use fcm_agent::messaging::client::{build_http_client, FcmClient};
use fcm_agent::messaging::error::ErrorResponse;
use fcm_agent::messaging::operation::{Dispatcher, OperationRequest};
use fcm_agent::server;
use fcm_agent::utils::config_loader;
use fcm_agent::utils::constants::DEFAULT_CONFIG_PATH;
use fcm_agent::utils::logging;
use fcm_agent::utils::logging::LogLevel;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the configuration and every service account
    Validate,
    /// Execute the operation request(s) in a JSON file and print the result
    Send {
        #[arg(short, long)]
        request: PathBuf,
    },
    /// Keep tokens warm and serve metrics until Ctrl-C
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let service_config = match config_loader::run(&args.config).await {
        Ok(config) => config,
        Err(err) => {
            logging::run(None, args.log_level);
            error!("{}", err);
            return Err(err);
        }
    };
    logging::run(Some(&service_config), args.log_level);

    match args.command {
        Command::Validate => {
            info!(
                "config '{}' is valid: {} projects",
                args.config,
                service_config.projects.len()
            );
            Ok(())
        }
        Command::Send { request } => send(&service_config, &request).await,
        Command::Serve => serve(&service_config).await,
    }
}

/// -------------------------------
/// Build the shared handles: one token manager, one http client
/// -------------------------------
fn build_dispatcher(service_config: &ServiceConfig) -> Result<Dispatcher> {
    let client = build_http_client(service_config.settings.http_timeout_ms)?;
    let projects = ProjectRegistry::from_config(service_config, &client)?;
    let tokens = TokenManager::with_settings(service_config.settings.token_cache.to_settings());
    let fcm = FcmClient::with_base_urls(
        client,
        service_config.endpoints.fcm_base_url.as_str(),
        service_config.endpoints.iid_base_url.as_str(),
    );
    Ok(Dispatcher::new(tokens, fcm, Arc::new(projects)))
}

async fn send(service_config: &ServiceConfig, request_path: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(request_path)
        .await
        .with_context(|| format!("failed to read request file {}", request_path.display()))?;
    let requests = parse_requests(&raw)?;
    let dispatcher = build_dispatcher(service_config)?;

    let mut results = Vec::with_capacity(requests.len());
    for request in &requests {
        match dispatcher.execute(request).await {
            Ok(output) => results.push(serde_json::to_value(output)?),
            Err(err) => {
                error!("{} failed: {}", request.operation.as_str(), err);
                let response = ErrorResponse::operation_failed(&err);
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Err(anyhow!(response.error));
            }
        }
    }

    let printed = match results.len() {
        1 => results.remove(0),
        _ => Value::Array(results),
    };
    println!("{}", serde_json::to_string_pretty(&printed)?);
    Ok(())
}

/// A request file holds one operation object or an array of them.
fn parse_requests(raw: &str) -> Result<Vec<OperationRequest>> {
    let value: Value = serde_json::from_str(raw).context("request file is not valid JSON")?;
    let requests = match value {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<OperationRequest>, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };
    if requests.is_empty() {
        return Err(anyhow!("request file contains no operations"));
    }
    Ok(requests)
}

async fn serve(service_config: &ServiceConfig) -> Result<()> {
    let dispatcher = build_dispatcher(service_config)?;
    let tokens = dispatcher.tokens().clone();
    let projects = Arc::new(dispatcher.projects().clone());

    // -------------------------------
    // 2. Pre-warm the token cache
    // -------------------------------

    let registry = projects.clone();
    tokens
        .initialize_projects(projects.project_ids(), move |project_id| {
            let source = registry.resolve(Some(&project_id)).cloned();
            async move {
                match source {
                    Some(source) => source.fetch_token().await,
                    None => Err(anyhow!("project '{}' is not registered", project_id)),
                }
            }
        })
        .await;

    // -------------------------------
    // 3. Periodic sweep of expired tokens
    // -------------------------------

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let cleanup_interval = service_config.settings.token_cache.cleanup_interval();
    let sweeper = {
        let tokens = tokens.clone();
        tokio::spawn(async move {
            let mut ticker = interval(cleanup_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = tokens.cleanup_expired_tokens().await;
                        debug!("cleanup sweep removed {} tokens", removed);
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        })
    };

    // -------------------------------
    // 4. Metrics server, stop on Ctrl-C
    // -------------------------------

    let mut server_shutdown = shutdown_tx.subscribe();
    let http_server = server::server::start(&service_config.settings, async move {
        let _ = server_shutdown.changed().await;
    });

    info!("Service starting...");
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
        Ok::<(), anyhow::Error>(())
    };
    tokio::try_join!(http_server, ctrl_c)?;
    // a disabled server returns at once; keep sweeping until Ctrl-C
    sweeper.await?;

    Ok(())
}
