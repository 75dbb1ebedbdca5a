use std::path::PathBuf;

use crate::atlas::allocator::Heuristic;
use crate::error::AtlasError;
use crate::settings::AtlasSettings;

// Fallback values, also used for "reset to defaults"
pub const DEFAULT_PAGE_SIZE: i32 = 1024;
pub const DEFAULT_DPI: u32 = 96;
pub const DEFAULT_PADDING: i32 = 4;
pub const DEFAULT_PREFIX: &str = "auto_atlas";

/// Smallest page that still has a pixel inside the guard border.
pub const MIN_PAGE_SIZE: i32 = 3;

/// Validated settings owned by one manager.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasConfig {
    pub page_width: i32,  // Size of newly created pages
    pub page_height: i32,
    pub dpi: u32,         // Pixels per logical unit
    pub padding: i32,     // Per-frame transparent margin
    pub prefix: String,   // Managed page name prefix
    pub heuristic: Heuristic,
    pub output_dir: PathBuf,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            page_width: DEFAULT_PAGE_SIZE,
            page_height: DEFAULT_PAGE_SIZE,
            dpi: DEFAULT_DPI,
            padding: DEFAULT_PADDING,
            prefix: DEFAULT_PREFIX.to_string(),
            heuristic: Heuristic::BestAreaFit,
            output_dir: PathBuf::from("atlas"),
        }
    }
}

impl AtlasConfig {
    pub fn from_settings(settings: &AtlasSettings) -> Result<Self, AtlasError> {
        if settings.page_size < MIN_PAGE_SIZE {
            return Err(AtlasError::Settings(format!(
                "page_size must be at least {}, got {}",
                MIN_PAGE_SIZE, settings.page_size
            )));
        }
        if settings.dpi == 0 {
            return Err(AtlasError::Settings("dpi must be positive".to_string()));
        }
        if settings.padding < 0 {
            return Err(AtlasError::Settings(format!("padding must not be negative, got {}", settings.padding)));
        }
        if settings.prefix.is_empty() {
            return Err(AtlasError::Settings("prefix must not be empty".to_string()));
        }
        let heuristic = settings.heuristic.parse::<Heuristic>().map_err(AtlasError::Settings)?;

        Ok(Self {
            page_width: settings.page_size,
            page_height: settings.page_size,
            dpi: settings.dpi,
            padding: settings.padding,
            prefix: settings.prefix.clone(),
            heuristic,
            output_dir: PathBuf::from(&settings.output_dir),
        })
    }

    /// Config for square pages of `size` pixels, other values default.
    pub fn with_page_size(size: i32) -> Self {
        Self { page_width: size, page_height: size, ..Self::default() }
    }
}
