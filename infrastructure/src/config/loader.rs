//! Configuration loader with multi-source merging

use super::FileConfig;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use std::path::PathBuf;

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Explicit config path (if provided)
    /// 2. Project root: `./relaykit.toml` or `./.relaykit.toml`
    /// 3. XDG config: `$XDG_CONFIG_HOME/relaykit/config.toml`
    /// 4. Fallback: `~/.config/relaykit/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(&global_path).nested());
            }
        }

        for filename in &["relaykit.toml", ".relaykit.toml"] {
            let path = PathBuf::from(filename);
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
                break;
            }
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path).nested());
        }

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for `--no-config`)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Returns `$XDG_CONFIG_HOME/relaykit/config.toml` if set, otherwise
    /// `~/.config/relaykit/config.toml`.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("relaykit").join("config.toml"))
    }

    pub fn project_config_path() -> Option<PathBuf> {
        for filename in &["relaykit.toml", ".relaykit.toml"] {
            let path = PathBuf::from(filename);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_defaults_matches_struct_default() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.gateway.port, 8787);
        assert_eq!(config.app.default_app, "default");
    }

    #[test]
    fn global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("relaykit"));
    }
}
