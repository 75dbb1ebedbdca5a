// Page persistence.
//
// The manager never touches files directly. Everything it needs to keep pages
// across sessions goes through a `PageStore`.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use image::RgbaImage;

use crate::atlas::entry::AtlasRect;
use crate::atlas::page::{AtlasPage, PageHeader};
use crate::error::AtlasError;

/// Everything a store knows about one saved page.
#[derive(Debug, Clone)]
pub struct StoredPage {
    pub header: PageHeader,
    pub rects: Vec<AtlasRect>,
    /// `None` when the pixels were never saved.
    pub pixels: Option<RgbaImage>,
}

impl StoredPage {
    pub fn from_page(page: &AtlasPage) -> Self {
        Self {
            header: *page.header(),
            rects: page.valid_rects().cloned().collect(),
            pixels: Some(page.pixels().clone()),
        }
    }
}

pub trait PageStore {
    /// Names of every page the store holds, managed or not.
    fn page_names(&self) -> Result<Vec<String>, AtlasError>;

    /// Reserve a new, empty page.
    fn create_page(&mut self, name: &str, header: &PageHeader) -> Result<(), AtlasError>;

    fn load_page(&self, name: &str) -> Result<StoredPage, AtlasError>;

    /// Write header, entries and pixels of `page`.
    fn save_page(&mut self, page: &AtlasPage) -> Result<(), AtlasError>;

    fn delete_page(&mut self, name: &str) -> Result<(), AtlasError>;
}
