use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const API_URL_ENV: &str = "RITUALIST_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

pub struct Config {
    pub session_path: PathBuf,
    pub api_url: String,
}

impl Config {
    pub fn load(api_url_flag: Option<String>) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "ritualist").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let session_path = data_dir.join("session.json");
        let api_url = resolve_api_url(api_url_flag, std::env::var(API_URL_ENV).ok());

        Ok(Config {
            session_path,
            api_url,
        })
    }
}

/// Flag beats environment beats the local development default.
pub(crate) fn resolve_api_url(flag: Option<String>, env: Option<String>) -> String {
    flag.or(env)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}
