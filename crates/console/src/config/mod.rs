use std::path::PathBuf;

use chrono_tz::Tz;
use clap::Parser;
use serde::Deserialize;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_PATH: &str = "config/console.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    /// Bearer token handed over by the session manager. When absent the
    /// console starts on the login screen.
    pub token: Option<String>,
    pub timezone: String,
    pub page_size: u32,
    pub export_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
    /// Per-request timeout. `None` keeps the transport defaults.
    pub request_timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            token: None,
            timezone: "Asia/Seoul".to_string(),
            page_size: 20,
            export_dir: PathBuf::from("exports"),
            log_file: PathBuf::from("logs/receipt_console.log"),
            log_level: "info".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl AppConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| AppError::InvalidConfig(format!("invalid timezone {}: {err}", self.timezone)))
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(AppError::InvalidConfig("page_size must be greater than 0".to_string()));
        }
        self.tz()?;
        Ok(())
    }
}

#[derive(Debug, Parser)]
#[command(name = "receipt_console", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override base URL (e.g. http://localhost:8080/api).
    #[arg(long)]
    base_url: Option<String>,
    /// Bearer token; prefer RECEIPT_CONSOLE_TOKEN to keep it out of shell history.
    #[arg(long)]
    token: Option<String>,
    /// Override timezone (IANA name) used for "today".
    #[arg(long)]
    timezone: Option<String>,
    /// Rows per page.
    #[arg(long)]
    page_size: Option<u32>,
    /// Directory where downloads and exports are written.
    #[arg(long)]
    export_dir: Option<PathBuf>,
    /// Log file path.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

pub fn load() -> Result<AppConfig> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("RECEIPT_CONSOLE"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(token) = args.token {
        settings.token = Some(token);
    }
    if let Some(timezone) = args.timezone {
        settings.timezone = timezone;
    }
    if let Some(page_size) = args.page_size {
        settings.page_size = page_size;
    }
    if let Some(export_dir) = args.export_dir {
        settings.export_dir = export_dir;
    }
    if let Some(log_file) = args.log_file {
        settings.log_file = log_file;
    }

    settings.token = settings
        .token
        .take()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    settings.validate()?;
    Ok(settings)
}
