use directories::ProjectDirs;
use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration loaded from a TOML config file.
/// All fields have defaults — the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of parallel workers. 0 = auto-detect (all cores).
    pub workers: usize,
    /// FFT window size used when the CLI does not override it.
    pub window_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            window_size: crate::DEFAULT_WINDOW_SIZE,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/wavemark/config.toml`.
    /// Returns the defaults if the file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Resolve worker count: CLI flag > config > all available cores.
    pub fn resolve_workers(&self, cli: usize) -> usize {
        if cli > 0 {
            cli
        } else if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// Resolve the FFT window size: CLI flag > config > built-in default.
    pub fn resolve_window(&self, cli: Option<usize>) -> usize {
        cli.unwrap_or(self.window_size)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.window_size, 2048);
        assert!(config.resolve_workers(0) >= 1);
    }

    #[test]
    fn cli_overrides_win() {
        let config = AppConfig { workers: 4, window_size: 4096 };
        assert_eq!(config.resolve_workers(8), 8);
        assert_eq!(config.resolve_workers(0), 4);
        assert_eq!(config.resolve_window(Some(1024)), 1024);
        assert_eq!(config.resolve_window(None), 4096);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: AppConfig = toml::from_str("workers = 3").unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.window_size, 2048);
    }
}
