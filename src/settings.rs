use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_DPI, DEFAULT_PADDING, DEFAULT_PAGE_SIZE, DEFAULT_PREFIX};

/// User-editable packing settings, read from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasSettings {
    /// Width and height of every new page, in pixels
    #[serde(default = "default_page_size")]
    pub page_size: i32,

    /// Pixels per logical unit
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Transparent margin around every frame, in pixels
    #[serde(default = "default_padding")]
    pub padding: i32,

    /// Name prefix of managed pages
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Placement heuristic name, e.g. "best-area-fit" or "bssf"
    #[serde(default = "default_heuristic")]
    pub heuristic: String,

    /// Directory holding the page files
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

fn default_dpi() -> u32 {
    DEFAULT_DPI
}

fn default_padding() -> i32 {
    DEFAULT_PADDING
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_heuristic() -> String {
    "best-area-fit".to_string()
}

fn default_output_dir() -> String {
    "atlas".to_string()
}

impl Default for AtlasSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            dpi: default_dpi(),
            padding: default_padding(),
            prefix: default_prefix(),
            heuristic: default_heuristic(),
            output_dir: default_output_dir(),
        }
    }
}

impl AtlasSettings {
    /// Default settings file location
    /// On macOS: ~/Library/Application Support/SpriteAtlas/settings.yaml
    /// On Linux: ~/.config/SpriteAtlas/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\SpriteAtlas\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("SpriteAtlas").join("settings.yaml")
    }

    /// Load settings from `custom_path`, or the default location. A missing or
    /// unreadable file yields defaults.
    pub fn load(custom_path: Option<&Path>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p.display());
                p.to_path_buf()
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str::<AtlasSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    debug!(
                        "Settings: page_size={}, dpi={}, padding={}, prefix={}, heuristic={}",
                        settings.page_size, settings.dpi, settings.padding, settings.prefix, settings.heuristic
                    );
                    settings
                }
                Err(e) => {
                    error!("Failed to parse settings file at {:?}: {}", path, e);
                    warn!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Save to `path`, keeping comments of an existing file intact.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => {
                    let updated = self.update_yaml_values(&contents);
                    fs::write(path, updated).map_err(|e| format!("Failed to write settings file: {}", e))?;
                    info!("Saved settings to {:?} (comments preserved)", path);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to read existing settings file for comment preservation: {}", e);
                }
            }
        }

        fs::write(path, self.to_yaml_with_comments()).map_err(|e| format!("Failed to write settings file: {}", e))?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    fn update_yaml_values(&self, yaml_content: &str) -> String {
        let mut result = yaml_content.to_string();

        result = Self::replace_yaml_value(&result, "page_size", &self.page_size.to_string());
        result = Self::replace_yaml_value(&result, "dpi", &self.dpi.to_string());
        result = Self::replace_yaml_value(&result, "padding", &self.padding.to_string());
        result = Self::replace_yaml_value(&result, "prefix", &format!("\"{}\"", self.prefix));
        result = Self::replace_yaml_value(&result, "heuristic", &format!("\"{}\"", self.heuristic));
        result = Self::replace_yaml_value(&result, "output_dir", &format!("\"{}\"", self.output_dir));

        result
    }

    /// Replace a top-level key's value, leaving the rest of the file alone.
    fn replace_yaml_value(yaml: &str, key: &str, new_value: &str) -> String {
        let pattern = format!(r"(?m)^(\s*{}\s*:\s*).*$", regex::escape(key));
        let replacement = format!("${{1}}{}", new_value.replace('$', "$$"));

        match regex::Regex::new(&pattern) {
            Ok(re) => re.replace_all(yaml, replacement.as_str()).to_string(),
            Err(e) => {
                warn!("Failed to create regex for key '{}': {}", key, e);
                yaml.to_string()
            }
        }
    }

    fn to_yaml_with_comments(&self) -> String {
        format!(
            r#"# Sprite Atlas Settings
# Values given here override the built-in defaults.

# Width and height of new atlas pages, in pixels
page_size: {}

# Pixels per logical content unit
dpi: {}

# Transparent margin around every frame, in pixels
padding: {}

# Name prefix of pages created by the packer
prefix: "{}"

# Placement heuristic: "best-area-fit" (baf), "best-short-side-fit" (bssf),
# "best-long-side-fit" (blsf), "bottom-left" (bl) or "contact-point" (cp)
heuristic: "{}"

# Directory holding the page files
output_dir: "{}"
"#,
            self.page_size, self.dpi, self.padding, self.prefix, self.heuristic, self.output_dir
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: AtlasSettings = serde_yaml::from_str("dpi: 72\n").unwrap();
        assert_eq!(settings.dpi, 72);
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.prefix, DEFAULT_PREFIX);
    }

    #[test]
    fn test_save_preserves_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "# keep me\npage_size: 512 # inline\ndpi: 10\n").unwrap();

        let settings = AtlasSettings { page_size: 2048, ..AtlasSettings::default() };
        settings.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# keep me\n"));
        assert!(text.contains("page_size: 2048"));
        assert!(text.contains("dpi: 96"));
    }

    #[test]
    fn test_new_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");
        let settings = AtlasSettings { heuristic: "bssf".to_string(), ..AtlasSettings::default() };
        settings.save(&path).unwrap();
        assert_eq!(AtlasSettings::load(Some(&path)), settings);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "page_size: [not, a, number]\n").unwrap();
        assert_eq!(AtlasSettings::load(Some(&path)), AtlasSettings::default());
    }
}
