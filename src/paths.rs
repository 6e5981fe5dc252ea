//! Application path management.
//!
//! Resolution order:
//!
//! - an explicit `--data-dir` wins;
//! - **Dev mode** (debug builds): `config.yaml` in the working directory
//!   makes that directory the data directory;
//! - **Portable mode**: a `.portable` marker next to the executable keeps
//!   everything beside it;
//! - **Installed mode** (default): the platform data dir, e.g.
//!   `~/.local/share/BeamCommander` or `%APPDATA%\BeamCommander`.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "BeamCommander";

/// Application paths for config, documents and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding the mapping and cue documents
    pub data_dir: PathBuf,
    /// Path to the configuration file
    pub config: PathBuf,
    pub logs_dir: PathBuf,
    pub is_portable: bool,
}

impl AppPaths {
    /// Paths rooted at an explicit directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            config: dir.join("config.yaml"),
            logs_dir: dir.join("logs"),
            data_dir: dir,
            is_portable: true,
        }
    }

    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr.
    pub fn detect(data_dir: Option<&Path>) -> Self {
        if let Some(dir) = data_dir {
            return Self::in_dir(dir);
        }

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join("config.yaml").exists() {
                eprintln!("[paths] DEV mode (config.yaml found in {})", cwd.display());
                return Self::in_dir(cwd);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] PORTABLE mode (.portable marker found)");
            return Self::in_dir(exe_dir);
        }

        let app_data = dirs::data_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no platform data dir, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        Self {
            config: app_data.join("config.yaml"),
            logs_dir: app_data.join("logs"),
            data_dir: app_data,
            is_portable: false,
        }
    }

    /// Resolve a configured document path; relative paths land in the data dir
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Ensure the data and log directories exist
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.data_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_explicit_data_dir() {
        let paths = AppPaths::detect(Some(Path::new("/srv/show")));
        assert_eq!(paths.data_dir, PathBuf::from("/srv/show"));
        assert_eq!(paths.config, PathBuf::from("/srv/show/config.yaml"));
        assert_eq!(paths.logs_dir, PathBuf::from("/srv/show/logs"));
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let paths = AppPaths::in_dir("/srv/show");
        assert_eq!(
            paths.resolve(Path::new("cues.json")),
            PathBuf::from("/srv/show/cues.json")
        );
        assert_eq!(
            paths.resolve(Path::new("/tmp/cues.json")),
            PathBuf::from("/tmp/cues.json")
        );
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        let paths = AppPaths::in_dir(dir.path().join("data"));
        paths.ensure_directories().unwrap();
        assert!(paths.data_dir.is_dir());
        assert!(paths.logs_dir.is_dir());
    }
}
