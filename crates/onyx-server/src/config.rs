// File: src/config.rs
// Purpose: Configuration parsing from onyx.toml

use anyhow::{Context, Result};
use onyx_router::{MaskEngine, PatternError, RouteKind, RouteMaskOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::module::LoadingPolicy;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub loading: LoadingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub dev: DevConfig,

    #[serde(default)]
    pub masks: Vec<MaskConfig>,
}

/// Strategy for routes that export a `loader` without a strategy suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoaderMode {
    #[default]
    Ssg,
    Ssr,
}

impl From<LoaderMode> for RouteKind {
    fn from(mode: LoaderMode) -> Self {
        match mode {
            LoaderMode::Ssg => RouteKind::Ssg,
            LoaderMode::Ssr => RouteKind::Ssr,
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Directory containing route files (default: "app")
    #[serde(default = "default_routes_dir")]
    pub dir: String,

    #[serde(default)]
    pub default_loader_mode: LoaderMode,

    /// Request path prefixes left to other handlers (dev tooling, HMR)
    #[serde(default = "default_ignore_prefixes")]
    pub ignore_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Blocking,
    Instant,
    Timed,
}

/// Default loading policy for routes that do not declare one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadingConfig {
    #[serde(default)]
    pub policy: PolicyKind,

    /// Upper bound on the wait for `timed` (default: 200)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Body served when no route and no `+not-found` boundary applies
    #[serde(default = "default_not_found_html")]
    pub not_found_html: String,
}

/// Development configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    #[serde(default = "default_true")]
    pub watch: bool,
}

/// One `[[masks]]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskConfig {
    pub from: String,
    pub to: String,

    #[serde(default = "default_true")]
    pub params: bool,

    #[serde(default)]
    pub unmask_on_reload: bool,

    #[serde(default)]
    pub use_search_param: bool,
}

// Default values
fn default_routes_dir() -> String {
    "app".to_string()
}

fn default_ignore_prefixes() -> Vec<String> {
    vec!["/@".to_string(), "/__hmr".to_string()]
}

fn default_timeout_ms() -> u64 {
    200
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_not_found_html() -> String {
    "<!DOCTYPE html><html><body><h1>404</h1><p>Page not found</p></body></html>".to_string()
}

fn default_true() -> bool {
    true
}

// Default implementations
impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            dir: default_routes_dir(),
            default_loader_mode: LoaderMode::default(),
            ignore_prefixes: default_ignore_prefixes(),
        }
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            not_found_html: default_not_found_html(),
        }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self { watch: true }
    }
}

impl LoadingConfig {
    pub fn policy(&self) -> LoadingPolicy {
        match self.policy {
            PolicyKind::Blocking => LoadingPolicy::Blocking,
            PolicyKind::Instant => LoadingPolicy::Instant,
            PolicyKind::Timed => LoadingPolicy::Timed(Duration::from_millis(self.timeout_ms)),
        }
    }
}

impl From<&MaskConfig> for RouteMaskOptions {
    fn from(mask: &MaskConfig) -> Self {
        RouteMaskOptions::new(mask.from.clone(), mask.to.clone())
            .with_params(mask.params)
            .with_unmask_on_reload(mask.unmask_on_reload)
            .with_search_param(mask.use_search_param)
    }
}

impl Config {
    /// Load configuration from onyx.toml
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // If file doesn't exist or is empty, return default config
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from default path (./onyx.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("onyx.toml")
    }

    /// Compiles the `[[masks]]` tables, in declaration order.
    pub fn mask_engine(&self) -> std::result::Result<MaskEngine, PatternError> {
        MaskEngine::from_options(self.masks.iter().map(RouteMaskOptions::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.routing.dir, "app");
        assert_eq!(config.routing.default_loader_mode, LoaderMode::Ssg);
        assert_eq!(config.routing.ignore_prefixes, vec!["/@", "/__hmr"]);
        assert_eq!(config.loading.policy(), LoadingPolicy::Blocking);
        assert_eq!(config.server.port, 3000);
        assert!(config.dev.watch);
        assert!(config.masks.is_empty());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load("/definitely/not/here/onyx.toml").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [routing]
            dir = "routes"
            default_loader_mode = "ssr"

            [loading]
            policy = "timed"
            timeout_ms = 50

            [dev]
            watch = false

            [[masks]]
            from = "/photos/[id]/modal"
            to = "/photos/[id]"
            use_search_param = true

            [[masks]]
            from = "/settings/[tab]"
            to = "/settings"
            params = false
            "#,
        )
        .unwrap();

        assert_eq!(config.routing.dir, "routes");
        assert_eq!(RouteKind::from(config.routing.default_loader_mode), RouteKind::Ssr);
        assert_eq!(config.routing.ignore_prefixes, vec!["/@", "/__hmr"]);
        assert_eq!(
            config.loading.policy(),
            LoadingPolicy::Timed(Duration::from_millis(50))
        );
        assert!(!config.dev.watch);
        assert!(config.masks[0].params);
        assert!(!config.masks[1].params);

        let engine = config.mask_engine().unwrap();
        let found = engine.find("/photos/9/modal").unwrap();
        assert!(found.masked_path.starts_with("/photos/9__"));
        assert_eq!(engine.find("/settings/profile").unwrap().masked_path, "/settings");
    }

    #[test]
    fn test_bad_mask_is_reported() {
        let config: Config = toml::from_str(
            r#"
            [[masks]]
            from = "/photos/[]"
            to = "/photos"
            "#,
        )
        .unwrap();
        assert!(config.mask_engine().is_err());
    }
}
