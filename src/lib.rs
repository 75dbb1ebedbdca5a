pub mod atlas;
pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod render;
pub mod settings;
pub mod store;

pub use atlas::{AtlasManager, AtlasPage, Heuristic, Placement, RebuildReport, Rect, RectAllocator, Size};
pub use config::AtlasConfig;
pub use content::{Content, ContentItem, ContentRegistry};
pub use error::AtlasError;
pub use render::{RenderTarget, Renderer, SolidRenderer};
pub use settings::AtlasSettings;
pub use store::{FileStore, MemoryStore, PageStore};
