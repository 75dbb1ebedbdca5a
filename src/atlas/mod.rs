// Atlas Module
//
// Packs content frame strips into fixed-size pages. The allocator decides
// where a rect goes inside one page, the page owns pixels and placements, and
// the manager decides which page gets what and when pages are rebuilt.

pub mod allocator;
pub mod entry;
pub mod manager;
pub mod page;
pub mod rect;
pub mod registry;

pub use allocator::{Heuristic, RectAllocator};
pub use entry::AtlasRect;
pub use manager::{AtlasManager, Placement, RebuildReport};
pub use page::{AtlasPage, ExportQuad, PageHeader, MAX_RECTS_PER_PAGE};
pub use rect::{Bounds, PixelBounds, Rect, Size};
pub use registry::PageRegistry;
