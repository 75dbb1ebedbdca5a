use std::collections::BTreeMap;
use std::io;

#[allow(unused_imports)]
use log::{debug, warn};

use crate::atlas::page::{AtlasPage, PageHeader};
use crate::error::AtlasError;
use crate::store::{PageStore, StoredPage};

/// In-process store. Useful for tools that never persist and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pages: BTreeMap<String, StoredPage>,
    fail_creates: bool,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `create_page` always fails, as a full disk would.
    pub fn failing_creates() -> Self {
        Self { fail_creates: true, ..Self::default() }
    }

    pub fn set_fail_creates(&mut self, fail: bool) {
        self.fail_creates = fail;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pages.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&StoredPage> {
        self.pages.get(name)
    }

    /// Number of successful `save_page` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// Seed a page directly, bypassing the manager.
    pub fn insert(&mut self, name: &str, page: StoredPage) {
        self.pages.insert(name.to_string(), page);
    }
}

impl PageStore for MemoryStore {
    fn page_names(&self) -> Result<Vec<String>, AtlasError> {
        Ok(self.pages.keys().cloned().collect())
    }

    fn create_page(&mut self, name: &str, header: &PageHeader) -> Result<(), AtlasError> {
        if self.fail_creates {
            return Err(AtlasError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("page creation disabled for '{}'", name),
            )));
        }
        debug!("MemoryStore: created page '{}'", name);
        self.pages.insert(
            name.to_string(),
            StoredPage { header: *header, rects: Vec::new(), pixels: None },
        );
        Ok(())
    }

    fn load_page(&self, name: &str) -> Result<StoredPage, AtlasError> {
        self.pages
            .get(name)
            .cloned()
            .ok_or_else(|| AtlasError::UnknownPage(name.to_string()))
    }

    fn save_page(&mut self, page: &AtlasPage) -> Result<(), AtlasError> {
        self.pages.insert(page.name().to_string(), StoredPage::from_page(page));
        self.saves += 1;
        Ok(())
    }

    fn delete_page(&mut self, name: &str) -> Result<(), AtlasError> {
        if self.pages.remove(name).is_none() {
            warn!("MemoryStore: deleting unknown page '{}'", name);
        }
        Ok(())
    }
}
