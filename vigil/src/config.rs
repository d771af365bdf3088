use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG: &str = "vigil.yaml";

/// Optional YAML file; every key can also be given on the command line.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub database: Option<PathBuf>,
    pub store_timeout_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub qps: Option<u32>,
    pub cert_warning_days: Option<i64>,
    pub user_agent: Option<String>,
}

/// Loads `path`, or `./vigil.yaml` when no path is given and that file exists.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(cfg))
}

/// Values from the command line that take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub store_timeout_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub qps: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub store_timeout: Duration,
    pub probe_timeout: Duration,
    pub concurrency: usize,
    pub qps: u32,
    pub cert_warning_days: i64,
    pub user_agent: Option<String>,
}

impl Settings {
    pub fn resolve(file: Option<Config>, cli: Overrides) -> Self {
        let file = file.unwrap_or_default();
        Settings {
            database: cli.database.or(file.database).unwrap_or_else(|| PathBuf::from("vigil.db")),
            store_timeout: Duration::from_millis(cli.store_timeout_ms.or(file.store_timeout_ms).unwrap_or(3_000)),
            probe_timeout: Duration::from_millis(cli.probe_timeout_ms.or(file.probe_timeout_ms).unwrap_or(10_000)),
            concurrency: cli.concurrency.or(file.concurrency).unwrap_or(16).max(1),
            qps: cli.qps.or(file.qps).unwrap_or(0),
            cert_warning_days: file.cert_warning_days.unwrap_or(30),
            user_agent: file.user_agent,
        }
    }
}
