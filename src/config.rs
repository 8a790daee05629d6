use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{self, Component, Path, PathBuf};
use tracing::warn;

pub const DEFAULT_DATABASE_PATH: &str = "filetracker.db";
pub const DEFAULT_COMMIT_INTERVAL_SECS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub root_paths: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub database_path: String,
    /// Seconds between time-triggered commits during a scan.
    pub commit_interval_secs: u64,
    /// Also commit after this many files, if set.
    pub commit_every_files: Option<usize>,
    pub parallel: bool,
    /// Append one line per failed file here, if set.
    pub error_log_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cwd = std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| ".".to_string());
        Self {
            root_paths: vec![cwd],
            ignore_patterns: Vec::new(),
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            commit_interval_secs: DEFAULT_COMMIT_INTERVAL_SECS,
            commit_every_files: None,
            parallel: true,
            error_log_path: None,
        }
    }
}

/// Load `Config.toml` (optional) overlaid by `PAST_FILES_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from("Config")
}

pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("PAST_FILES")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("root_paths")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Resolve each root against the working directory and drop `.` and `..`
/// components, so stored paths do not depend on how a root was typed.
pub fn absolute_roots(dirs: Vec<String>) -> Vec<String> {
    dirs.into_iter()
        .filter_map(|dir| match path::absolute(&dir) {
            Ok(abs) => Some(lexically_normal(&abs).to_string_lossy().into_owned()),
            Err(err) => {
                warn!("Cannot resolve root path '{}': {}", dir, err);
                None
            }
        })
        .collect()
}

fn lexically_normal(path: &Path) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other),
        }
    }
    normal
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|kept| dir_path.starts_with(Path::new(kept))) {
            continue;
        }
        result.retain(|kept| !Path::new(kept).starts_with(dir_path));
        result.push(dir);
    }

    result
}
