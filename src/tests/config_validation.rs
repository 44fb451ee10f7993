#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use serial_test::serial;
    use tempfile::NamedTempFile;

    use crate::config::proc_loader::{expand_env_vars, file_to_config, parse_config};
    use crate::config::proc_validator::validate_service_config;
    use crate::config::projects::{Region, ServiceConfig};
    use crate::config::settings::LogFormat;
    use crate::credentials::registry::ProjectRegistry;
    use crate::tests::common::{build_reqwest_client, FIXTURE_PROJECT_ID, SERVICE_ACCOUNT_FIXTURE};

    fn service_account_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(SERVICE_ACCOUNT_FIXTURE.as_bytes()).expect("write fixture");
        file
    }

    fn config_file(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write config");
        file
    }

    #[tokio::test]
    async fn minimal_config_gets_defaults() -> Result<()> {
        let key_file = service_account_file();
        let yaml = format!(
            r#"
projects:
  demo:
    service_account_path: "{}"
"#,
            key_file.path().display()
        );
        let config = file_to_config(config_file(&yaml).path()).await?;

        let logging = config.settings.logging.as_ref().expect("default logging");
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, LogFormat::Compact);
        assert_eq!(config.default_project.as_deref(), Some("demo"));
        assert!(config.settings.token_cache.enabled);
        assert_eq!(config.settings.token_cache.refresh_buffer_minutes, 5);
        assert_eq!(config.settings.http_timeout_ms, 5000);
        assert_eq!(config.projects["demo"].region, Region::UsCentral1);
        assert_eq!(config.endpoints.fcm_base_url, "https://fcm.googleapis.com");
        Ok(())
    }

    #[tokio::test]
    async fn missing_settings_section_uses_field_defaults() {
        let key_file = service_account_file();
        let yaml = format!(
            r#"
projects:
  demo:
    service_account_path: "{}"
"#,
            key_file.path().display()
        );
        let config: ServiceConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(config.settings.http_timeout_ms, 5000);
        assert_eq!(config.settings.server.host, "127.0.0.1");
        assert_eq!(config.settings.server.port, "9100");
        assert_eq!(config.settings.metrics.path, "/metrics");
        assert_eq!(config.settings.token_cache.cleanup_interval_seconds, 60);
        assert!(validate_service_config(&config).await.is_ok());
    }

    #[test]
    fn partial_server_block_keeps_defaults() {
        let yaml = r#"
settings:
  server:
    host: 0.0.0.0
projects: {}
"#;
        let config: ServiceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settings.server.host, "0.0.0.0");
        assert_eq!(config.settings.server.port, "9100");

        let config: ServiceConfig = serde_yaml::from_str("settings:\n  server:\n    port: \"9300\"\nprojects: {}\n").unwrap();
        assert_eq!(config.settings.server.host, "127.0.0.1");
        assert_eq!(config.settings.server.port, "9300");
    }

    #[tokio::test]
    async fn full_config_builds_registry() -> Result<()> {
        let key_file = service_account_file();
        let yaml = format!(
            r#"
settings:
  logging:
    level: debug
    format: json
  metrics:
    is_enabled: true
    path: /metrics
  server:
    host: 0.0.0.0
    port: "9200"
  token_cache:
    enabled: true
    refresh_buffer_minutes: 10
    cleanup_interval_seconds: 30
  http_timeout_ms: 2000
projects:
  marketing:
    service_account_path: "{path}"
    region: europe-west1
    database_url: https://demo-push.firebaseio.com
  transactional:
    service_account_json: '{json}'
default_project: {project_id}
endpoints:
  token_uri: http://127.0.0.1:9999/token
"#,
            path = key_file.path().display(),
            json = SERVICE_ACCOUNT_FIXTURE.replace('\n', " "),
            project_id = FIXTURE_PROJECT_ID,
        );
        let config = file_to_config(config_file(&yaml).path()).await?;
        let settings = config.settings.token_cache.to_settings();
        assert_eq!(settings.invalidate_after().as_secs(), 50 * 60);
        assert_eq!(config.settings.token_cache.cleanup_interval().as_secs(), 30);

        let registry = ProjectRegistry::from_config(&config, &build_reqwest_client())?;
        // both projects use the same service account
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(Some("marketing")).is_some());
        assert!(registry.resolve(Some("transactional")).is_some());
        assert_eq!(registry.resolve(None).map(|s| s.project_id()), Some(FIXTURE_PROJECT_ID));
        Ok(())
    }

    #[tokio::test]
    #[should_panic(expected = "config is not valid")]
    async fn invalid_config_is_rejected_on_load() {
        let yaml = r#"
projects:
  demo:
    service_account_path: relative/key.json
"#;
        parse_config(yaml.to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_config_reports_all_errors() {
        let key_file = service_account_file();
        let yaml = format!(
            r#"
settings:
  logging:
    level: loud
    format: compact
  metrics:
    is_enabled: true
    path: metrics
  server:
    host: 127.0.0.1
    port: not-a-port
  token_cache:
    refresh_buffer_minutes: 60
    cleanup_interval_seconds: 0
projects:
  both:
    service_account_path: "{path}"
    service_account_json: '{{"type": "service_account"}}'
  neither:
    region: us-central1
  relative:
    service_account_path: keys/sa.json
  broken:
    service_account_json: '{{"type": "service_account"}}'
  insecure:
    service_account_path: "{path}"
    database_url: http://demo-push.firebaseio.com
default_project: nobody
endpoints:
  fcm_base_url: fcm.googleapis.com
"#,
            path = key_file.path().display()
        );
        let config: ServiceConfig = serde_yaml::from_str(&yaml).unwrap();

        let errors = validate_service_config(&config).await.unwrap_err();
        let expect = |needle: &str| {
            assert!(
                errors.iter().any(|e| e.contains(needle)),
                "expected an error containing '{}', got {:#?}",
                needle,
                errors
            )
        };
        expect("settings.logging.level 'loud'");
        expect("settings.metrics.path 'metrics'");
        expect("settings.server.port 'not-a-port'");
        expect("refresh_buffer_minutes (60)");
        expect("cleanup_interval_seconds must be > 0");
        expect("endpoints.fcm_base_url");
        expect("projects['both']: 'service_account_path' and 'service_account_json' are mutually exclusive");
        expect("projects['neither']: one of");
        expect("projects['relative'].service_account_path 'keys/sa.json' must be absolute");
        expect("projects['broken']: Service Account JSON is missing required fields");
        expect("projects['insecure'].database_url");
        expect("default_project 'nobody'");
    }

    #[test]
    #[serial]
    fn env_vars_are_expanded_with_defaults() {
        std::env::set_var("FCM_AGENT_TEST_PORT", "9300");
        std::env::remove_var("FCM_AGENT_TEST_MISSING");

        let expanded = expand_env_vars("port: ${FCM_AGENT_TEST_PORT}\nhost: ${FCM_AGENT_TEST_MISSING:127.0.0.1}\nx: ${FCM_AGENT_TEST_MISSING}");
        assert_eq!(expanded, "port: 9300\nhost: 127.0.0.1\nx: ");

        std::env::remove_var("FCM_AGENT_TEST_PORT");
    }

    #[tokio::test]
    #[serial]
    async fn inline_service_account_from_env() -> Result<()> {
        std::env::set_var("FCM_AGENT_TEST_SA", SERVICE_ACCOUNT_FIXTURE.replace('\n', " "));
        let yaml = r#"
projects:
  demo:
    service_account_json: '${FCM_AGENT_TEST_SA}'
"#;
        let config = file_to_config(config_file(yaml).path()).await?;
        std::env::remove_var("FCM_AGENT_TEST_SA");

        let key = config.projects["demo"].load_key()?;
        assert_eq!(key.project_id, FIXTURE_PROJECT_ID);
        Ok(())
    }
}
