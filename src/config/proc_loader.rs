use std::{fs, path::Path, sync::LazyLock};
use crate::config::settings::{LogFormat, LoggingConfig};
use crate::config::projects::ServiceConfig;
use crate::observability::metrics::get_metrics;
use anyhow::{bail, Result};
use regex::Regex;
use tracing::{debug, error};
use crate::config::proc_validator;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}").unwrap());

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path)?;

    let expanded = expand_env_vars(&content);
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let metrics = get_metrics().await;
    let mut service_config: ServiceConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| {
            error!("parse config error: {}", e);
            metrics.config_validation_errors.inc();
        })?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig{level: "info".to_owned(), format: LogFormat::Compact});
    }
    if service_config.default_project.is_none() && service_config.projects.len() == 1 {
        service_config.default_project = service_config.projects.keys().next().cloned();
    }

    debug!("validation config ...");
    if let Err(errors) = proc_validator::validate_service_config(&service_config).await {
        bail!("config is not valid: {}", errors.join("; "));
    }

    Ok(service_config)
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}
