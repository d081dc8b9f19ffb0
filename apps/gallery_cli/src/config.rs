use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use gallery_core::DEFAULT_PAGE_SIZE;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "gallery.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub page_size: usize,
    pub token_path: PathBuf,
    pub log_filter: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000/api".into(),
            page_size: DEFAULT_PAGE_SIZE,
            token_path: default_token_path(),
            log_filter: "warn".into(),
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Keys accepted in `gallery.toml`. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    page_size: Option<usize>,
    token_path: Option<PathBuf>,
    log_filter: Option<String>,
    request_timeout_secs: Option<u64>,
}

pub fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gallery")
        .join("token")
}

/// Defaults, then the config file, then the process environment.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let mut settings = Settings::default();
    apply_file(&mut settings, path, config_path.is_some())?;
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// A missing default file is fine; a missing file the user named is not.
fn apply_file(settings: &mut Settings, path: &Path, required: bool) -> anyhow::Result<()> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => return Ok(()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config '{}'", path.display()))
        }
    };
    let file_cfg: FileSettings = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config '{}'", path.display()))?;

    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = page_size_or_default(v);
    }
    if let Some(v) = file_cfg.token_path {
        settings.token_path = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("GALLERY_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = var("APP__PAGE_SIZE") {
        if let Ok(parsed) = v.trim().parse::<usize>() {
            settings.page_size = page_size_or_default(parsed);
        }
    }

    if let Some(v) = var("GALLERY_TOKEN_PATH") {
        settings.token_path = PathBuf::from(v);
    }

    if let Some(v) = var("GALLERY_LOG") {
        settings.log_filter = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}

fn page_size_or_default(page_size: usize) -> usize {
    if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
