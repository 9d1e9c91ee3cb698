use std::{fs, path::Path, sync::LazyLock};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::proc_initiateor::initiate_default_values;
use crate::config::proc_validator;
use crate::config::settings::{LogFormat, LoggingConfig};
use crate::config::sources::ServiceConfig;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}").unwrap());

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file '{}'", path.display()))?;

    let expanded = expand_env_vars(&content);
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let mut service_config: ServiceConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| error!("parse config error: {}", e))?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::new("info".to_owned(), LogFormat::Compact));
    }
    service_config = initiate_default_values(service_config);

    debug!("validating config ...");
    proc_validator::validate_service_config(&service_config)
        .await
        .map_err(|errors| {
            anyhow!(
                "config is not valid, total errors: {}\n{}",
                errors.len(),
                errors.join("\n")
            )
        })?;

    Ok(service_config)
}

/// Replaces `${VAR}` and `${VAR:default}` with the environment value.
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

