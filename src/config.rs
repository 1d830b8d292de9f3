//! Dashboard configuration
//!
//! Values come from three layers, later ones winning:
//! environment variables, an optional JSON config file, then command-line
//! flags. Sheet layouts start from the embedded `layouts.json` and a config
//! file may replace individual layouts by name.
//!
//! Environment variables:
//! - `SHEETS_SPREADSHEET_ID` (required unless the config file sets it)
//! - `SHEETS_WEBAPP_URL` (needed for writes)
//! - `SHEETS_WRITE_MODE`: `opaque` (default) or `confirmed`
//! - `SHEETS_AUTH_TIMEOUT_MS`: users-sheet read deadline, default 10000
//! - `SHEETS_SESSION_FILE`: default `.sheet_session.json`

use crate::gsheets::auth::DEFAULT_AUTH_TIMEOUT;
use crate::gsheets::error::{Result, SheetError};
use crate::gsheets::layouts::{embedded, LayoutRegistry, SheetLayout};
use crate::gsheets::session::DEFAULT_SESSION_FILE;
use crate::gsheets::{SheetsClient, WriteMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// One partial source of configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub webapp_url: Option<String>,
    #[serde(default)]
    pub write_mode: Option<String>,
    #[serde(default)]
    pub auth_timeout_ms: Option<u64>,
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    /// Layouts replacing embedded ones of the same name
    #[serde(default)]
    pub layouts: Vec<SheetLayout>,
}

impl ConfigLayer {
    /// Read the `SHEETS_*` variables through `lookup`; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let auth_timeout_ms = get("SHEETS_AUTH_TIMEOUT_MS")
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| {
                    SheetError::Config(format!(
                        "SHEETS_AUTH_TIMEOUT_MS must be a number of milliseconds, got '{}'",
                        raw
                    ))
                })
            })
            .transpose()?;

        Ok(ConfigLayer {
            spreadsheet_id: get("SHEETS_SPREADSHEET_ID"),
            webapp_url: get("SHEETS_WEBAPP_URL"),
            write_mode: get("SHEETS_WRITE_MODE"),
            auth_timeout_ms,
            session_file: get("SHEETS_SESSION_FILE").map(PathBuf::from),
            layouts: Vec::new(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let layer = serde_json::from_str(&raw).map_err(|e| {
            SheetError::Config(format!("invalid config file {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "config file loaded");
        Ok(layer)
    }

    /// Values set in `other` replace ours; layouts accumulate
    pub fn overlay(mut self, other: ConfigLayer) -> Self {
        self.spreadsheet_id = other.spreadsheet_id.or(self.spreadsheet_id);
        self.webapp_url = other.webapp_url.or(self.webapp_url);
        self.write_mode = other.write_mode.or(self.write_mode);
        self.auth_timeout_ms = other.auth_timeout_ms.or(self.auth_timeout_ms);
        self.session_file = other.session_file.or(self.session_file);
        self.layouts.extend(other.layouts);
        self
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub spreadsheet_id: String,
    pub webapp_url: Option<String>,
    pub write_mode: WriteMode,
    pub auth_timeout: Duration,
    pub session_file: PathBuf,
    pub layouts: LayoutRegistry,
}

impl DashboardConfig {
    /// Resolve a merged layer, applying defaults
    pub fn resolve(layer: ConfigLayer) -> Result<Self> {
        let spreadsheet_id = layer.spreadsheet_id.ok_or_else(|| {
            SheetError::Config("SHEETS_SPREADSHEET_ID environment variable not set".into())
        })?;

        let write_mode = match layer.write_mode {
            Some(raw) => raw.parse()?,
            None => WriteMode::default(),
        };

        let auth_timeout = layer
            .auth_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_AUTH_TIMEOUT);
        if auth_timeout.is_zero() {
            return Err(SheetError::Config("auth timeout must be positive".into()));
        }

        let mut layouts = embedded().clone();
        for layout in layer.layouts {
            debug!(layout = %layout.name, "layout overridden");
            layouts.insert(layout)?;
        }

        Ok(DashboardConfig {
            spreadsheet_id,
            webapp_url: layer.webapp_url,
            write_mode,
            auth_timeout,
            session_file: layer
                .session_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE)),
            layouts,
        })
    }

    /// Configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::resolve(ConfigLayer::from_env()?)
    }

    /// Environment, then the optional config file, then `overrides`
    pub fn load(file: Option<&Path>, overrides: ConfigLayer) -> Result<Self> {
        let mut layer = ConfigLayer::from_env()?;
        if let Some(path) = file {
            layer = layer.overlay(ConfigLayer::from_file(path)?);
        }
        Self::resolve(layer.overlay(overrides))
    }

    pub fn layout(&self, name: &str) -> Result<&SheetLayout> {
        self.layouts.get(name)
    }

    /// HTTP client for the configured spreadsheet
    pub fn client(&self) -> Result<SheetsClient> {
        SheetsClient::connect(self.spreadsheet_id.clone(), self.webapp_url.as_deref())
    }
}
