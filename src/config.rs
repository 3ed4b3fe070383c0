use crate::linkage::LinkageTable;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const PROJECT_ENV: &str = "ROSTERFORGE_PROJECT";
pub const LINKAGE_ENV: &str = "ROSTERFORGE_LINKAGE";
pub const LOG_ENV: &str = "ROSTERFORGE_LOG";
pub const DEFAULT_PROJECT_PATH: &str = "project.rfproj.json";
pub const DEFAULT_LOG_FILTER: &str = "warn";

fn normalized_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Explicit value first, then the environment variable; blank counts as unset.
pub fn configured_or_env<F>(configured: Option<&str>, env_var: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    configured
        .and_then(normalized_non_empty)
        .or_else(|| lookup(env_var).and_then(|v| normalized_non_empty(&v)))
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub project_path: PathBuf,
    pub linkage_path: Option<String>,
}

impl Settings {
    pub fn resolve(cli_project: Option<&str>, cli_linkage: Option<&str>) -> Self {
        Self::resolve_with(cli_project, cli_linkage, process_env)
    }

    pub fn resolve_with<F>(cli_project: Option<&str>, cli_linkage: Option<&str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_path = configured_or_env(cli_project, PROJECT_ENV, &lookup)
            .unwrap_or_else(|| DEFAULT_PROJECT_PATH.to_string());
        Self {
            project_path: PathBuf::from(project_path),
            linkage_path: configured_or_env(cli_linkage, LINKAGE_ENV, &lookup),
        }
    }

    pub fn linkage_table(&self) -> anyhow::Result<LinkageTable> {
        match &self.linkage_path {
            Some(path) => LinkageTable::from_json_file(path),
            None => Ok(LinkageTable::builtin().clone()),
        }
    }
}

/// Installs the stderr log subscriber; stdout is reserved for JSON payloads.
pub fn init_logging() {
    let filter = process_env(LOG_ENV)
        .and_then(|v| normalized_non_empty(&v))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
