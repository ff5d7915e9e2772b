use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

use crate::filtering::FilterDefaults;

pub const SETTINGS_FILE: &str = "casectl.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientSettings {
    pub server_url: String,
    pub api_key: Option<String>,
    pub page_size: usize,
    pub group_tasks: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:9000".into(),
            api_key: None,
            page_size: FilterDefaults::case_tasks().page_size,
            group_tasks: false,
        }
    }
}

impl ClientSettings {
    /// Task list filter defaults with the configured page size.
    pub fn task_filter_defaults(&self) -> FilterDefaults {
        FilterDefaults {
            page_size: self.page_size,
            ..FilterDefaults::case_tasks()
        }
    }

    pub fn validate(&self) -> anyhow::Result<Url> {
        let url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server_url '{}'", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("server_url '{}' must use http or https", self.server_url);
        }
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        Ok(url)
    }
}

/// Defaults, then `casectl.toml` in the working directory, then `APP__*`
/// environment variables.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    }
    apply_env(&mut settings, |name| std::env::var(name).ok());

    settings.validate()?;
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, raw: &str) -> anyhow::Result<()> {
    let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)?;
    if let Some(v) = file_cfg.get("server_url").and_then(toml::Value::as_str) {
        settings.server_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("api_key").and_then(toml::Value::as_str) {
        settings.api_key = Some(v.to_string());
    }
    if let Some(v) = file_cfg.get("page_size").and_then(toml::Value::as_integer) {
        settings.page_size = usize::try_from(v).context("page_size must not be negative")?;
    }
    if let Some(v) = file_cfg.get("group_tasks").and_then(toml::Value::as_bool) {
        settings.group_tasks = v;
    }
    Ok(())
}

fn apply_env(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__API_KEY").filter(|v| !v.is_empty()) {
        settings.api_key = Some(v);
    }
    if let Some(parsed) = lookup("APP__PAGE_SIZE").and_then(|v| v.parse::<usize>().ok()) {
        settings.page_size = parsed;
    }
    if let Some(v) = lookup("APP__GROUP_TASKS") {
        settings.group_tasks = matches!(v.as_str(), "1" | "true" | "yes");
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
