//! Site configuration module.
//!
//! Handles loading and validating `postsmith.toml`. Every key is optional:
//! stock defaults are used for anything the file leaves out, and a missing
//! file means "all defaults".
//!
//! ## Configuration Options
//!
//! ```toml
//! posts_path = "posts"                     # Root of the article tree
//! article_extension = "md"                 # Which files are articles
//! output_path = "dist"                     # Where the site is written
//! site_name = "My Blog"                    # Title of the index page
//! template_path = "templates/article.tpl"  # Shared page template
//! components_path = "compiled"             # Embeddable component output
//! component_extension = "vue"
//! plugin_file = "vue_in_posts.js"          # Component registration file
//!
//! [download]
//! timeout_secs = 30                        # Per-image download timeout
//! ```
//!
//! Relative paths are resolved against the directory holding the config
//! file (see [`SiteConfig::rooted_at`]). Unknown keys are rejected to catch
//! typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "postsmith.toml";

/// Subdirectory of the posts tree holding localized images.
pub const ASSET_DIR: &str = "images";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `postsmith.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Root of the article tree. The asset store lives at `<posts_path>/images`.
    pub posts_path: PathBuf,
    /// Extension (without the dot) that marks a file as an article.
    pub article_extension: String,
    /// Root of the generated site.
    pub output_path: PathBuf,
    /// Display name, used as the index page title.
    pub site_name: String,
    /// Template shared by article pages and the index page.
    pub template_path: PathBuf,
    /// Directory receiving embeddable components and the plugin file.
    pub components_path: PathBuf,
    /// Extension (without the dot) of component files.
    pub component_extension: String,
    /// Name of the generated plugin-registration file inside `components_path`.
    pub plugin_file: String,
    /// Remote image download settings.
    pub download: DownloadConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            posts_path: PathBuf::from("posts"),
            article_extension: "md".to_string(),
            output_path: PathBuf::from("dist"),
            site_name: "My Blog".to_string(),
            template_path: PathBuf::from("templates/article.tpl"),
            components_path: PathBuf::from("compiled"),
            component_extension: "vue".to_string(),
            plugin_file: "vue_in_posts.js".to_string(),
            download: DownloadConfig::default(),
        }
    }
}

/// Remote image download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Upper bound for a single download, connect to last byte.
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.article_extension.is_empty() || self.article_extension.starts_with('.') {
            return Err(ConfigError::Validation(
                "article_extension must be non-empty and given without a leading dot".into(),
            ));
        }
        if self.component_extension.is_empty() || self.component_extension.starts_with('.') {
            return Err(ConfigError::Validation(
                "component_extension must be non-empty and given without a leading dot".into(),
            ));
        }
        if self.plugin_file.is_empty() {
            return Err(ConfigError::Validation(
                "plugin_file must not be empty".into(),
            ));
        }
        if self.download.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "download.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Resolve every relative path against `base`.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        for path in [
            &mut self.posts_path,
            &mut self.output_path,
            &mut self.template_path,
            &mut self.components_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    /// Directory of the content-addressed asset store.
    pub fn asset_store_path(&self) -> PathBuf {
        self.posts_path.join(ASSET_DIR)
    }

    /// Full path of the plugin-registration file.
    pub fn plugin_path(&self) -> PathBuf {
        self.components_path.join(&self.plugin_file)
    }
}

/// Load a config file, falling back to stock defaults when it doesn't exist.
///
/// Relative paths inside the file are resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let config = if path.exists() {
        let content = fs::read_to_string(path)?;
        toml::from_str::<SiteConfig>(&content)?
    } else {
        SiteConfig::default()
    };
    config.validate()?;
    Ok(config.rooted_at(base))
}

/// Returns a fully-commented stock `postsmith.toml` with all keys explained.
///
/// Printed by `postsmith --print-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# postsmith configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Relative paths are resolved against the directory holding this file.
# Unknown keys will cause an error.

# Root of the article tree. Remote images referenced by articles are
# downloaded into <posts_path>/images/ and the articles are rewritten
# to point at the local copies.
posts_path = "posts"

# Files with this extension (no leading dot) are articles.
article_extension = "md"

# Root of the generated site. Article pages keep their directory layout.
output_path = "dist"

# Title of the index page.
site_name = "My Blog"

# Template shared by article pages and the index page. When the file is
# missing a built-in template is used.
template_path = "templates/article.tpl"

# Components extracted from ```vue <Name> blocks are written here, along
# with the plugin file registering them.
components_path = "compiled"
component_extension = "vue"
plugin_file = "vue_in_posts.js"

# ---------------------------------------------------------------------------
# Remote image downloads
# ---------------------------------------------------------------------------
[download]
# Seconds before a single download is abandoned. A timed-out download
# fails the article that referenced it.
timeout_secs = 30
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.posts_path, PathBuf::from("posts"));
        assert_eq!(config.article_extension, "md");
        assert_eq!(config.output_path, PathBuf::from("dist"));
        assert_eq!(config.plugin_file, "vue_in_posts.js");
        assert_eq!(config.download.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
site_name = "Notes"

[download]
timeout_secs = 5
"##;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.site_name, "Notes");
        assert_eq!(config.download.timeout_secs, 5);
        // Defaults preserved
        assert_eq!(config.article_extension, "md");
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("post_path = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.posts_path, defaults.posts_path);
        assert_eq!(config.site_name, defaults.site_name);
        assert_eq!(config.download.timeout_secs, defaults.download.timeout_secs);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_dotted_extension() {
        let config = SiteConfig {
            article_extension: ".md".into(),
            ..SiteConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = SiteConfig::default();
        config.download.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_defaults_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.posts_path, tmp.path().join("posts"));
        assert_eq!(config.output_path, tmp.path().join("dist"));
    }

    #[test]
    fn load_config_resolves_relative_paths_against_file_dir() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "posts_path = \"content\"\noutput_path = \"/srv/site\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.posts_path, tmp.path().join("content"));
        assert_eq!(config.output_path, PathBuf::from("/srv/site"));
        assert_eq!(config.asset_store_path(), tmp.path().join("content/images"));
    }

    #[test]
    fn load_config_reports_bad_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "site_name = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }
}
