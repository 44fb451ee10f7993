//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * logging level / format
//!   * metrics path and server address
//!   * token cache refresh buffer vs. token lifetime
//!   * every project has exactly one usable service account source
//!   * service account contents (same checks as credential validation)
//!   * default project and endpoint URLs

use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info};

use crate::config::projects::{EndpointsConfig, ProjectConfig, ServiceConfig};
use crate::config::settings::{SettingsConfig, TokenCacheConfig};
use crate::observability::metrics::get_metrics;

const ALLOWED_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const TOKEN_LIFETIME_MINUTES: u64 = 60;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_endpoints(&cfg.endpoints, &mut errors);

    if cfg.projects.is_empty() {
        errors.push("config: 'projects' is empty; at least one project required".to_string());
    }

    // project name -> project id, for default_project lookup and duplicates
    let mut project_ids: HashMap<String, String> = HashMap::new();
    for (name, project) in &cfg.projects {
        if let Some(project_id) = validate_project(name, project, &mut errors) {
            if let Some((other, _)) = project_ids.iter().find(|(_, id)| **id == project_id) {
                info!(
                    "projects '{}' and '{}' share project id '{}', the first registered key is reused",
                    other, name, project_id
                );
            }
            project_ids.insert(name.to_owned(), project_id);
        }
    }

    if let Some(default_project) = &cfg.default_project {
        let known = cfg.projects.contains_key(default_project)
            || project_ids.values().any(|id| id == default_project);
        if !known {
            errors.push(format!(
                "default_project '{}' does not match any project name or project id",
                default_project
            ));
        }
    }

    if errors.is_empty() {
        info!("config validated: {} projects", cfg.projects.len());
        Ok(())
    } else {
        let metrics = get_metrics().await;
        metrics.config_validation_errors.inc_by(errors.len() as u64);
        for e in &errors {
            error!("config validation: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(logging) = &settings.logging {
        let level = logging.level.to_lowercase();
        if !ALLOWED_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, ALLOWED_LOG_LEVELS
            ));
        }
    }

    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }

    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' is not a valid port",
            settings.server.port
        ));
    }

    if settings.http_timeout_ms == 0 {
        errors.push("settings.http_timeout_ms must be > 0".to_string());
    }

    validate_token_cache(&settings.token_cache, errors);
}

fn validate_token_cache(token_cache: &TokenCacheConfig, errors: &mut Vec<String>) {
    if token_cache.refresh_buffer_minutes >= TOKEN_LIFETIME_MINUTES {
        errors.push(format!(
            "settings.token_cache.refresh_buffer_minutes ({}) must be lower than the token lifetime ({} minutes)",
            token_cache.refresh_buffer_minutes, TOKEN_LIFETIME_MINUTES
        ));
    }
    if token_cache.cleanup_interval_seconds == 0 {
        errors.push("settings.token_cache.cleanup_interval_seconds must be > 0".to_string());
    }
}

fn validate_endpoints(endpoints: &EndpointsConfig, errors: &mut Vec<String>) {
    let urls = [
        ("fcm_base_url", Some(&endpoints.fcm_base_url)),
        ("iid_base_url", Some(&endpoints.iid_base_url)),
        ("token_uri", endpoints.token_uri.as_ref()),
    ];
    for (field, url) in urls {
        if let Some(url) = url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(format!("endpoints.{} '{}' must be an http(s) URL", field, url));
            }
        }
    }
}

/// Returns the project id when the service account is usable.
fn validate_project(name: &str, project: &ProjectConfig, errors: &mut Vec<String>) -> Option<String> {
    let inline = project
        .service_account_json
        .as_ref()
        .filter(|raw| !raw.trim().is_empty());

    match (inline, &project.service_account_path) {
        (None, None) => {
            errors.push(format!(
                "projects['{}']: one of 'service_account_path' or 'service_account_json' is required",
                name
            ));
            return None;
        }
        (Some(_), Some(_)) => {
            errors.push(format!(
                "projects['{}']: 'service_account_path' and 'service_account_json' are mutually exclusive",
                name
            ));
            return None;
        }
        (None, Some(path)) if !Path::new(path).is_absolute() => {
            errors.push(format!(
                "projects['{}'].service_account_path '{}' must be absolute",
                name, path
            ));
            return None;
        }
        _ => {}
    }

    if let Some(url) = &project.database_url {
        if !url.starts_with("https://") {
            errors.push(format!(
                "projects['{}'].database_url '{}' must be an https URL",
                name, url
            ));
        }
    }

    match project.load_key() {
        Ok(key) => Some(key.project_id),
        Err(err) => {
            errors.push(format!("projects['{}']: {}", name, err));
            None
        }
    }
}
