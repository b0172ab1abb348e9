use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use harbor_core::{DEFAULT_DEBOUNCE, DEFAULT_PORTAL_TARGET};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "HARBOR_CONFIG";

#[derive(Parser, Debug)]
#[command(name = "harbor-shell")]
#[command(about = "Headless run of the Harbor application shell")]
pub struct Args {
    /// JSON settings file; every field is optional
    #[arg(short, long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Sign out before exiting
    #[arg(long)]
    pub logout: bool,
}

/// Shell settings. Every field has a default, so `{}` is a valid file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// JSON file backing the durable store.
    pub storage_path: PathBuf,
    pub debounce_ms: u64,
    /// Visible fraction of the sentinel that triggers the next page.
    pub visibility_threshold: f32,
    pub page_size: usize,
    pub portal_target: String,
    pub fetch_on_mount: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("harbor-state.json"),
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            visibility_threshold: 1.0,
            page_size: 10,
            portal_target: DEFAULT_PORTAL_TARGET.to_string(),
            fetch_on_mount: false,
        }
    }
}

impl ShellConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_json::from_str(text).context("invalid shell config")?;
        cfg.validate()
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Load the file named on the command line (or by `HARBOR_CONFIG`);
    /// defaults when there is none.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                log::debug!("no config given, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(self) -> anyhow::Result<Self> {
        anyhow::ensure!(self.page_size > 0, "page_size must be positive");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.visibility_threshold),
            "visibility_threshold must be within 0..=1, got {}",
            self.visibility_threshold
        );
        anyhow::ensure!(!self.portal_target.is_empty(), "portal_target is empty");
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn empty_object_is_defaults() {
        assert_eq!(ShellConfig::from_json("{}").unwrap(), ShellConfig::default());
        assert_eq!(ShellConfig::default().debounce(), Duration::from_millis(500));
    }

    #[test]
    fn partial_override() {
        let cfg = ShellConfig::from_json(r#"{"page_size": 3, "fetch_on_mount": true}"#).unwrap();
        assert_eq!(cfg.page_size, 3);
        assert!(cfg.fetch_on_mount);
        assert_eq!(cfg.portal_target, "portal-root");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ShellConfig::from_json(r#"{"page_size": 0}"#).is_err());
        assert!(ShellConfig::from_json(r#"{"visibility_threshold": 1.5}"#).is_err());
        assert!(ShellConfig::from_json("[").is_err());
    }

    #[test]
    fn config_flag_loads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell.json");
        std::fs::write(&path, r#"{"page_size": 7}"#).unwrap();

        let args = Args::try_parse_from([
            OsStr::new("harbor-shell"),
            OsStr::new("--config"),
            path.as_os_str(),
            OsStr::new("--logout"),
        ])
        .unwrap();
        assert!(args.logout);
        assert_eq!(args.config.as_deref(), Some(path.as_path()));
        let cfg = ShellConfig::resolve(args.config.as_deref()).unwrap();
        assert_eq!(cfg.page_size, 7);
    }

    #[test]
    fn missing_or_unreadable_config() {
        assert_eq!(ShellConfig::resolve(None).unwrap(), ShellConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let err = ShellConfig::resolve(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(err.to_string().contains("absent.json"));

        assert!(Args::try_parse_from(["harbor-shell", "--config"]).is_err());
        assert!(Args::try_parse_from(["harbor-shell", "--bogus"]).is_err());
    }
}
