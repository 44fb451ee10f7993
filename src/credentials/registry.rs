use std::collections::HashMap;

use anyhow::{anyhow, Result};
use reqwest::Client;
use tracing::info;

use crate::config::projects::ServiceConfig;
use crate::credentials::service_account::ServiceAccountKey;
use crate::credentials::token_source::ServiceAccountTokenSource;

/// Token sources keyed by project id, with configured project names as aliases.
///
/// Registering a project id twice keeps the first source.
#[derive(Debug, Default, Clone)]
pub struct ProjectRegistry {
    sources: HashMap<String, ServiceAccountTokenSource>,
    aliases: HashMap<String, String>,
    order: Vec<String>,
    default_project: Option<String>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ServiceConfig, client: &Client) -> Result<Self> {
        let mut registry = Self::new();
        for (name, project) in &config.projects {
            let key = project
                .load_key()
                .map_err(|err| anyhow!("project '{}': {}", name, err))?;
            registry.register_key(name, key, client, config.endpoints.token_uri.as_deref());
        }
        if let Some(default_project) = &config.default_project {
            registry.set_default(default_project)?;
        }
        Ok(registry)
    }

    pub fn register_key(
        &mut self,
        alias: &str,
        key: ServiceAccountKey,
        client: &Client,
        token_uri: Option<&str>,
    ) -> &ServiceAccountTokenSource {
        let mut source = ServiceAccountTokenSource::new(key, client.clone());
        if let Some(token_uri) = token_uri {
            source = source.with_token_uri(token_uri);
        }
        self.register(alias, source)
    }

    /// Register `source` under its project id, or return the one already there.
    pub fn register(&mut self, alias: &str, source: ServiceAccountTokenSource) -> &ServiceAccountTokenSource {
        let project_id = source.project_id().to_owned();
        self.aliases.insert(alias.to_owned(), project_id.clone());
        if !self.sources.contains_key(&project_id) {
            info!("registered project '{}' as '{}'", project_id, alias);
            self.order.push(project_id.clone());
            self.sources.insert(project_id.clone(), source);
        }
        &self.sources[&project_id]
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        let project_id = self
            .resolve_id(name)
            .ok_or_else(|| anyhow!("default project '{}' is not registered", name))?
            .to_owned();
        self.default_project = Some(project_id);
        Ok(())
    }

    /// Look up by project id or alias; `None` selects the default project,
    /// or the only one registered.
    pub fn resolve(&self, name: Option<&str>) -> Option<&ServiceAccountTokenSource> {
        let project_id = match name {
            Some(name) => self.resolve_id(name)?,
            None => self
                .default_project
                .as_deref()
                .or_else(|| match self.order.as_slice() {
                    [only] => Some(only.as_str()),
                    _ => None,
                })?,
        };
        self.sources.get(project_id)
    }

    pub fn project_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn resolve_id(&self, name: &str) -> Option<&str> {
        if self.sources.contains_key(name) {
            return self.sources.get_key_value(name).map(|(id, _)| id.as_str());
        }
        self.aliases.get(name).map(String::as_str)
    }
}
